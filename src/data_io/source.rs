use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

use log::debug;
use ndarray::ArrayView2;
use thiserror::Error;

use super::decoder::{DecodeError, DecoderContext, RecordReader};
use crate::geometry::{Point, Polygon};
use crate::spatial::{SpatialError, SpatialIndex};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

/// One decoded forecast snapshot on its native grid.
///
/// Wraps a record reader with the grid geometry derived on load: normalized
/// longitudes, the four coverage corners, a nearest-neighbor index over the
/// coordinates, and a cache of value arrays already read.
pub struct SourceField {
    reader: Box<dyn RecordReader>,
    ni: usize,
    nj: usize,
    size: usize,
    longitude: Vec<f64>,
    latitude: Vec<f64>,
    corners: [Point; 4],
    coverage: Polygon,
    index: SpatialIndex,
    cache: HashMap<String, Vec<f64>>,
}

impl SourceField {
    pub fn new(ctx: &DecoderContext, path: &Path) -> Result<Self, SourceError> {
        let reader = ctx.open(path)?;
        Self::from_reader(reader, ctx)
    }

    /// Builds the field from an already-open reader. Used directly by
    /// callers that decode from something other than a file.
    pub fn from_reader(
        mut reader: Box<dyn RecordReader>,
        ctx: &DecoderContext,
    ) -> Result<Self, SourceError> {
        let (ni, nj, size) = reader.dims();
        let latitude = read_checked(&mut *reader, "latitudes", size)?;
        let mut longitude = read_checked(&mut *reader, "longitudes", size)?;
        if ctx.normalize_longitudes {
            for v in &mut longitude {
                *v = normalize_longitude(*v);
            }
        }

        let corners = find_corners(&longitude, &latitude, ni);
        let coverage = Polygon::new(corners.to_vec());
        let index = SpatialIndex::build(&longitude, &latitude)?;
        debug!("loaded source grid: {} x {} ({} points)", ni, nj, size);

        Ok(Self {
            reader,
            ni,
            nj,
            size,
            longitude,
            latitude,
            corners,
            coverage,
            index,
            cache: HashMap::new(),
        })
    }

    pub fn ni(&self) -> usize {
        self.ni
    }

    pub fn nj(&self) -> usize {
        self.nj
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn longitude_1d(&self) -> &[f64] {
        &self.longitude
    }

    pub fn latitude_1d(&self) -> &[f64] {
        &self.latitude
    }

    pub fn longitude_2d(&self) -> ArrayView2<'_, f64> {
        ArrayView2::from_shape((self.ni, self.nj), &self.longitude)
            .expect("coordinate arrays are ni*nj long")
    }

    pub fn latitude_2d(&self) -> ArrayView2<'_, f64> {
        ArrayView2::from_shape((self.ni, self.nj), &self.latitude)
            .expect("coordinate arrays are ni*nj long")
    }

    /// Corner points of the coverage quadrilateral. An axis-aligned
    /// min/max over the outermost grid rows; under-reports coverage for
    /// grids rotated relative to the coordinate axes.
    pub fn corners(&self) -> [Point; 4] {
        self.corners
    }

    pub fn coverage(&self) -> &Polygon {
        &self.coverage
    }

    /// Flat value array for a variable, row-major with `k = i*nj + j`.
    /// Read on first request per name and cached for the lifetime of the
    /// field.
    pub fn values_1d(&mut self, name: &str) -> Result<&[f64], SourceError> {
        let size = self.size;
        match self.cache.entry(name.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let values = self.reader.read_f64_array(name)?;
                if values.len() != size {
                    return Err(DecodeError::ShortRecord {
                        name: name.to_string(),
                        actual: values.len(),
                        expected: size,
                    }
                    .into());
                }
                debug!("read record '{}' ({} values)", name, size);
                Ok(e.insert(values))
            }
        }
    }

    /// Already-cached value array for a variable, if any. Lets callers
    /// hold several arrays at once after warming the cache with
    /// [`SourceField::values_1d`].
    pub fn cached(&self, name: &str) -> Option<&[f64]> {
        self.cache.get(name).map(Vec::as_slice)
    }

    /// Reshape view of [`SourceField::values_1d`] as `(ni, nj)`.
    pub fn values_2d(&mut self, name: &str) -> Result<ArrayView2<'_, f64>, SourceError> {
        let (ni, nj) = (self.ni, self.nj);
        let flat = self.values_1d(name)?;
        Ok(ArrayView2::from_shape((ni, nj), flat).expect("cache entries are ni*nj long"))
    }

    /// Input index of the source point closest to the query coordinate.
    pub fn nearest(&self, lon: f64, lat: f64) -> usize {
        self.index.find_nearest(lon, lat)
    }

    pub fn point_inside(&self, lon: f64, lat: f64) -> bool {
        self.coverage.is_inside(Point::new(lon, lat))
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn index_to_ij(&self, k: usize) -> (usize, usize) {
        (k / self.nj, k % self.nj)
    }
}

fn read_checked(
    reader: &mut dyn RecordReader,
    name: &str,
    size: usize,
) -> Result<Vec<f64>, DecodeError> {
    let values = reader.read_f64_array(name)?;
    if values.len() != size {
        return Err(DecodeError::ShortRecord {
            name: name.to_string(),
            actual: values.len(),
            expected: size,
        });
    }
    Ok(values)
}

/// Wraps a longitude into [-180, 180).
pub fn normalize_longitude(v: f64) -> f64 {
    (v + 180.0).rem_euclid(360.0) - 180.0
}

/// Coverage corners from the min/max coordinates of the first and last
/// `ni` grid points, counter-clockwise for north-to-south scan order.
fn find_corners(lon: &[f64], lat: &[f64], ni: usize) -> [Point; 4] {
    let n = lon.len();
    let (xtl, xtr) = min_max(&lon[..ni]);
    let (xll, xlr) = min_max(&lon[n - ni..]);
    let (ytl, ytr) = min_max(&lat[..ni]);
    let (yll, ylr) = min_max(&lat[n - ni..]);
    [
        Point::new(xll, yll),
        Point::new(xlr, ylr),
        Point::new(xtr, ytr),
        Point::new(xtl, ytl),
    ]
}

fn min_max(v: &[f64]) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &x in v {
        lo = lo.min(x);
        hi = hi.max(x);
    }
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_longitude() {
        assert_eq!(normalize_longitude(0.0), 0.0);
        assert!((normalize_longitude(190.0) - -170.0).abs() < 1e-12);
        assert!((normalize_longitude(359.5) - -0.5).abs() < 1e-12);
        assert!((normalize_longitude(-190.0) - 170.0).abs() < 1e-12);
        assert_eq!(normalize_longitude(180.0), -180.0);
        for v in [-720.0, -359.9, -180.0, -0.1, 0.0, 179.9, 180.0, 360.0, 725.0] {
            let n = normalize_longitude(v);
            assert!((-180.0..180.0).contains(&n), "{} mapped to {}", v, n);
        }
    }

    #[test]
    fn test_find_corners_on_regular_grid() {
        // 3 rows of 3 points scanned north to south
        let lon = vec![10.0, 11.0, 12.0, 10.0, 11.0, 12.0, 10.0, 11.0, 12.0];
        let lat = vec![42.0, 42.0, 42.0, 41.0, 41.0, 41.0, 40.0, 40.0, 40.0];
        let corners = find_corners(&lon, &lat, 3);
        assert_eq!(corners[0], Point::new(10.0, 40.0));
        assert_eq!(corners[1], Point::new(12.0, 40.0));
        assert_eq!(corners[2], Point::new(12.0, 42.0));
        assert_eq!(corners[3], Point::new(10.0, 42.0));
    }
}
