use chrono::{DateTime, Utc};

/// Linear blending factor for an output time between two snapshot times.
///
/// Returns 0 at or before `t1`, 1 at or after `t2`, and the linear
/// fraction in between. Always within [0, 1] regardless of argument
/// ordering.
pub fn generate_time_weight(
    t1: DateTime<Utc>,
    t2: DateTime<Utc>,
    t_out: DateTime<Utc>,
) -> f64 {
    if t_out <= t1 {
        0.0
    } else if t_out >= t2 {
        1.0
    } else {
        let span = (t2 - t1).num_milliseconds() as f64;
        (t_out - t1).num_milliseconds() as f64 / span
    }
}

/// Hours spanned by two timestamps.
pub fn hours_between(t1: DateTime<Utc>, t2: DateTime<Utc>) -> f64 {
    (t2 - t1).num_milliseconds() as f64 / 3_600_000.0
}
