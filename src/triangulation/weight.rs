use rayon::prelude::*;

/// Barycentric interpolation weights for one query point.
///
/// When valid, `vertices` holds the input indices of the three corners of
/// the containing face and `weights` their barycentric coordinates (first
/// weight multiplies the first vertex, and so on; the three sum to 1).
/// Weights may dip slightly negative for points located exactly on an edge.
/// An invalid weight means the query fell outside the triangulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationWeight {
    vertices: [u32; 3],
    weights: [f64; 3],
    valid: bool,
}

impl InterpolationWeight {
    pub(crate) fn new(vertices: [u32; 3], weights: [f64; 3]) -> Self {
        Self {
            vertices,
            weights,
            valid: true,
        }
    }

    /// A weight for a point with no coverage.
    pub fn invalid() -> Self {
        Self {
            vertices: [0; 3],
            weights: [0.0; 3],
            valid: false,
        }
    }

    pub fn vertices(&self) -> [u32; 3] {
        self.vertices
    }

    pub fn weights(&self) -> [f64; 3] {
        self.weights
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Weighted combination of the three referenced values, or NaN when the
    /// weight is invalid.
    pub fn apply(&self, values: &[f64]) -> f64 {
        if !self.valid {
            return f64::NAN;
        }
        self.weights[0] * values[self.vertices[0] as usize]
            + self.weights[1] * values[self.vertices[1] as usize]
            + self.weights[2] * values[self.vertices[2] as usize]
    }
}

impl Default for InterpolationWeight {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Bulk evaluation of many weights against one value array.
pub fn apply_many(weights: &[InterpolationWeight], values: &[f64]) -> Vec<f64> {
    weights.par_iter().map(|w| w.apply(values)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_combines_referenced_values() {
        let w = InterpolationWeight::new([0, 2, 3], [0.5, 0.25, 0.25]);
        let values = [8.0, 100.0, 4.0, 12.0];
        assert!((w.apply(&values) - (4.0 + 1.0 + 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_weight_yields_nan() {
        let w = InterpolationWeight::invalid();
        assert!(!w.is_valid());
        assert!(w.apply(&[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn test_apply_many() {
        let weights = [
            InterpolationWeight::new([0, 1, 2], [1.0, 0.0, 0.0]),
            InterpolationWeight::invalid(),
            InterpolationWeight::new([0, 1, 2], [0.0, 0.5, 0.5]),
        ];
        let values = [10.0, 20.0, 30.0];
        let out = apply_many(&weights, &values);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 10.0).abs() < 1e-12);
        assert!(out[1].is_nan());
        assert!((out[2] - 25.0).abs() < 1e-12);
    }
}
