//! Upstream forecast systems and their wire conventions.
//!
//! Each source carries a fixed per-variable record name and unit scaling,
//! resolved statically at driver construction.

/// Numerical weather prediction systems with known record layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Gfs,
    Gefs,
    Nam,
    Hwrf,
    Coamps,
    HrrrConus,
    HrrrAlaska,
    Wpc,
    Hafs,
}

/// Surface and single-level variables the resampler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetVariable {
    Pressure,
    WindU,
    WindV,
    Precipitation,
    Temperature,
    Humidity,
    Ice,
}

impl MetVariable {
    /// Fill value used for destination cells with no source coverage.
    pub fn background(&self) -> f64 {
        match self {
            MetVariable::Pressure => 1013.0,
            _ => 0.0,
        }
    }
}

/// Affine unit conversion applied after time blending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub offset: f64,
    pub factor: f64,
}

impl Scaling {
    pub const IDENTITY: Scaling = Scaling {
        offset: 0.0,
        factor: 1.0,
    };

    pub fn apply(&self, value: f64) -> f64 {
        self.offset + self.factor * value
    }
}

impl SourceKind {
    /// Record short name used to locate a variable in a source file.
    pub fn short_name(&self, var: MetVariable) -> &'static str {
        use MetVariable::*;
        use SourceKind::*;
        match (self, var) {
            (HrrrConus | HrrrAlaska, Pressure) => "mslma",
            (_, Pressure) => "prmsl",
            (_, WindU) => "10u",
            (_, WindV) => "10v",
            (Gfs | HrrrConus | HrrrAlaska | Hafs, Precipitation) => "prate",
            (Nam, Precipitation) => "acpcp",
            (_, Precipitation) => "tp",
            (_, Temperature) => "2t",
            (_, Humidity) => "2r",
            (_, Ice) => "ci",
        }
    }

    /// Unit conversion for a variable as this source reports it: pressure
    /// arrives in Pa except from COAMPS (already hPa), precipitation as a
    /// per-second rate.
    pub fn scaling(&self, var: MetVariable) -> Scaling {
        use MetVariable::*;
        match var {
            Pressure => {
                if matches!(self, SourceKind::Coamps) {
                    Scaling::IDENTITY
                } else {
                    Scaling {
                        offset: 0.0,
                        factor: 0.01,
                    }
                }
            }
            Precipitation => Scaling {
                offset: 0.0,
                factor: 3600.0,
            },
            _ => Scaling::IDENTITY,
        }
    }

    /// Whether this source reports precipitation accumulated over the
    /// forecast cycle rather than an instantaneous rate.
    pub fn accumulated_precipitation(&self) -> bool {
        matches!(
            self,
            SourceKind::Nam | SourceKind::Gefs | SourceKind::Hwrf | SourceKind::Wpc
        )
    }
}

/// Output product groupings, dispatched by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableGroup {
    /// u, v and mean sea-level pressure on one grid.
    WindPressure,
    Rainfall,
    Temperature,
    Humidity,
    Ice,
}

impl VariableGroup {
    /// Number of field components this group produces.
    pub fn components(&self) -> usize {
        match self {
            VariableGroup::WindPressure => 3,
            _ => 1,
        }
    }

    /// Variables resampled for this group, in component order.
    pub fn variables(&self) -> &'static [MetVariable] {
        match self {
            VariableGroup::WindPressure => {
                &[MetVariable::WindU, MetVariable::WindV, MetVariable::Pressure]
            }
            VariableGroup::Rainfall => &[MetVariable::Precipitation],
            VariableGroup::Temperature => &[MetVariable::Temperature],
            VariableGroup::Humidity => &[MetVariable::Humidity],
            VariableGroup::Ice => &[MetVariable::Ice],
        }
    }
}
