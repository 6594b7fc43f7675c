use kd_tree::KdTree2;
use ordered_float::OrderedFloat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpatialError {
    #[error("coordinate arrays differ in length: {x} x-values vs {y} y-values")]
    SizeMismatch { x: usize, y: usize },

    #[error("cannot build a spatial index over an empty point set")]
    Empty,
}

/// Static nearest-neighbor index over a 2-D point cloud.
///
/// Queries are read-only once built and safe to share across threads. Input
/// order is preserved: every query reports positions by the index the point
/// had in the arrays passed to [`SpatialIndex::build`].
pub struct SpatialIndex {
    tree: KdTree2<(u32, [f64; 2])>,
    len: usize,
    extent: f64,
}

impl SpatialIndex {
    pub fn build(x: &[f64], y: &[f64]) -> Result<Self, SpatialError> {
        if x.len() != y.len() {
            return Err(SpatialError::SizeMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if x.is_empty() {
            return Err(SpatialError::Empty);
        }

        let items: Vec<(u32, [f64; 2])> = x
            .iter()
            .zip(y.iter())
            .enumerate()
            .map(|(i, (&xi, &yi))| (i as u32, [xi, yi]))
            .collect();

        let extent = span(x).max(span(y));
        let tree = KdTree2::build_by_key(items, |item, k| OrderedFloat(item.1[k]));
        Ok(Self {
            tree,
            len: x.len(),
            extent,
        })
    }

    pub fn size(&self) -> usize {
        self.len
    }

    /// Index of the closest point by Euclidean distance. Exact ties resolve
    /// to the lowest input index.
    pub fn find_nearest(&self, x: f64, y: f64) -> usize {
        let hit = self
            .tree
            .nearest_by(&[x, y], |item, k| item.1[k])
            .expect("index is never empty");
        let d2 = dist2(hit.item.1, x, y);
        let r = d2.sqrt();
        let mut best = (d2, hit.item.0);
        for item in self
            .tree
            .within_by(&[[x - r, y - r], [x + r, y + r]], |item, k| item.1[k])
        {
            let d2 = dist2(item.1, x, y);
            if d2 < best.0 || (d2 == best.0 && item.0 < best.1) {
                best = (d2, item.0);
            }
        }
        best.1 as usize
    }

    /// The `k` closest points as `(index, distance)` pairs, sorted by
    /// ascending distance. `k` is clamped to the size of the index.
    pub fn find_k_nearest(&self, x: f64, y: f64, k: usize) -> Vec<(usize, f64)> {
        let k = k.min(self.len);
        if k == 0 {
            return Vec::new();
        }

        // Widen an axis-aligned window until it contains k candidates whose
        // k-th distance is covered by the window.
        let mut r = self.initial_radius(x, y);
        loop {
            let mut hits: Vec<(usize, f64)> = self
                .tree
                .within_by(&[[x - r, y - r], [x + r, y + r]], |item, k| item.1[k])
                .into_iter()
                .map(|item| (item.0 as usize, dist2(item.1, x, y).sqrt()))
                .collect();
            hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

            if (hits.len() >= k && hits[k - 1].1 <= r) || hits.len() == self.len {
                hits.truncate(k);
                return hits;
            }
            r *= 2.0;
        }
    }

    /// Indices of all points within Euclidean distance `radius` of the query.
    pub fn find_within_radius(&self, x: f64, y: f64, radius: f64) -> Vec<usize> {
        let r2 = radius * radius;
        self.tree
            .within_by(&[[x - radius, y - radius], [x + radius, y + radius]], |item, k| {
                item.1[k]
            })
            .into_iter()
            .filter(|item| dist2(item.1, x, y) <= r2)
            .map(|item| item.0 as usize)
            .collect()
    }

    fn initial_radius(&self, x: f64, y: f64) -> f64 {
        let d2 = self
            .tree
            .nearest_by(&[x, y], |item, k| item.1[k])
            .map(|hit| dist2(hit.item.1, x, y))
            .unwrap_or(0.0);
        if d2 > 0.0 {
            d2.sqrt() * 2.0
        } else {
            self.extent.max(f64::EPSILON)
        }
    }
}

fn dist2(p: [f64; 2], x: f64, y: f64) -> f64 {
    let dx = p[0] - x;
    let dy = p[1] - y;
    dx * dx + dy * dy
}

fn span(v: &[f64]) -> f64 {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &x in v {
        lo = lo.min(x);
        hi = hi.max(x);
    }
    hi - lo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_index() -> SpatialIndex {
        // 4x4 lattice on [0, 3]^2, row-major
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                xs.push(i as f64);
                ys.push(j as f64);
            }
        }
        SpatialIndex::build(&xs, &ys).unwrap()
    }

    #[test]
    fn test_build_rejects_mismatched_arrays() {
        let err = SpatialIndex::build(&[0.0, 1.0], &[0.0]).unwrap_err();
        assert!(matches!(err, SpatialError::SizeMismatch { x: 2, y: 1 }));
    }

    #[test]
    fn test_build_rejects_empty_input() {
        assert!(matches!(
            SpatialIndex::build(&[], &[]),
            Err(SpatialError::Empty)
        ));
    }

    #[test]
    fn test_find_nearest() {
        let index = grid_index();
        // point (2, 1) has linear index 2*4 + 1 = 9
        assert_eq!(index.find_nearest(2.1, 0.9), 9);
        assert_eq!(index.find_nearest(2.0, 1.0), 9);
        // far outside the cloud snaps to the nearest corner
        assert_eq!(index.find_nearest(100.0, 100.0), 15);
    }

    #[test]
    fn test_find_nearest_breaks_ties_toward_lower_index() {
        // two coincident points; the query sits on top of both
        let index = SpatialIndex::build(&[1.0, 1.0, 5.0], &[2.0, 2.0, 2.0]).unwrap();
        assert_eq!(index.find_nearest(1.0, 2.0), 0);
        // equidistant from indices 0/1 at (1,2) and index 2 at (5,2)
        let index = SpatialIndex::build(&[1.0, 5.0], &[2.0, 2.0]).unwrap();
        assert_eq!(index.find_nearest(3.0, 2.0), 0);
    }

    #[test]
    fn test_find_k_nearest_sorted_and_clamped() {
        let index = grid_index();
        let hits = index.find_k_nearest(0.0, 0.0, 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0], (0, 0.0));
        // neighbors (0,1) and (1,0) are both at distance 1; lower index first
        assert_eq!(hits[1].0, 1);
        assert_eq!(hits[2].0, 4);
        assert!((hits[1].1 - 1.0).abs() < 1e-12);

        let all = index.find_k_nearest(0.0, 0.0, 100);
        assert_eq!(all.len(), 16);
        for pair in all.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn test_find_within_radius() {
        let index = grid_index();
        let mut hits = index.find_within_radius(0.0, 0.0, 1.0);
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1, 4]);

        let hits = index.find_within_radius(10.0, 10.0, 0.5);
        assert!(hits.is_empty());

        // radius covering the diagonal neighbor as well
        let mut hits = index.find_within_radius(0.0, 0.0, 1.5);
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1, 4, 5]);
    }
}
