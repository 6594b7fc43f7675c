use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use metmesh::data_io::{
    DecodeError, DecoderContext, RecordReader, SourceField, SourceKind, VariableGroup,
};
use metmesh::driver::field::{MetField, WindField};
use metmesh::driver::Meteorology;
use metmesh::grid::OutputGrid;
use metmesh::time_utils::generate_time_weight;

/// In-memory decoded snapshot for driving the resampler without files.
struct MemoryReader {
    ni: usize,
    nj: usize,
    records: HashMap<String, Vec<f64>>,
}

impl MemoryReader {
    fn new(ni: usize, nj: usize) -> Self {
        Self {
            ni,
            nj,
            records: HashMap::new(),
        }
    }

    fn with_record(mut self, name: &str, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), self.ni * self.nj);
        self.records.insert(name.to_string(), values);
        self
    }
}

impl RecordReader for MemoryReader {
    fn dims(&self) -> (usize, usize, usize) {
        (self.ni, self.nj, self.ni * self.nj)
    }

    fn read_f64_array(&mut self, name: &str) -> Result<Vec<f64>, DecodeError> {
        self.records
            .get(name)
            .cloned()
            .ok_or_else(|| DecodeError::MissingRecord(name.to_string()))
    }
}

/// A 5x5 degree snapshot scanned north to south: lon 0..4 by column,
/// lat 4..0 by row, row-major `k = i*nj + j`.
fn snapshot(pressure: f64) -> SourceField {
    let n = 5;
    let mut lon = Vec::new();
    let mut lat = Vec::new();
    for i in 0..n {
        for j in 0..n {
            lon.push(j as f64);
            lat.push((n - 1 - i) as f64);
        }
    }
    let size = n * n;
    let reader = MemoryReader::new(n, n)
        .with_record("longitudes", lon)
        .with_record("latitudes", lat)
        .with_record("prmsl", vec![pressure; size])
        .with_record("10u", vec![0.0; size])
        .with_record("10v", vec![0.0; size]);
    SourceField::from_reader(Box::new(reader), &DecoderContext::default()).unwrap()
}

/// Like [`snapshot`] but carrying a single uniform precipitation record.
fn rain_snapshot(name: &str, total: f64) -> SourceField {
    let n = 5;
    let mut lon = Vec::new();
    let mut lat = Vec::new();
    for i in 0..n {
        for j in 0..n {
            lon.push(j as f64);
            lat.push((n - 1 - i) as f64);
        }
    }
    let reader = MemoryReader::new(n, n)
        .with_record("longitudes", lon)
        .with_record("latitudes", lat)
        .with_record(name, vec![total; n * n]);
    SourceField::from_reader(Box::new(reader), &DecoderContext::default()).unwrap()
}

fn t(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, h, 0, 0).unwrap()
}

fn wind_driver(grid: OutputGrid, backfill: bool) -> Meteorology {
    let mut met = Meteorology::new(grid, SourceKind::Gfs, VariableGroup::WindPressure, backfill);
    met.set_next_snapshot(t(0), snapshot(100_000.0));
    met.set_next_snapshot(t(6), snapshot(102_000.0));
    met
}

#[test]
fn test_midpoint_time_interpolation() {
    // destination well inside the source footprint
    let grid = OutputGrid::new(1.0, 1.0, 0.5, 0.5, 5, 5, 4326).unwrap();
    let mut met = wind_driver(grid, false);

    let alpha = met.time_weight(t(3)).unwrap();
    assert!((alpha - 0.5).abs() < 1e-12);

    let field: WindField = met.to_wind_grid(alpha).unwrap();
    assert_eq!(field.dims(), (5, 5));
    for i in 0..5 {
        for j in 0..5 {
            assert!(
                (field.get(WindField::P, i, j) - 1010.0).abs() < 1e-9,
                "pressure at ({}, {}) = {}",
                i,
                j,
                field.get(WindField::P, i, j)
            );
            assert_eq!(field.get(WindField::U, i, j), 0.0);
            assert_eq!(field.get(WindField::V, i, j), 0.0);
        }
    }
}

#[test]
fn test_uncovered_cells_get_background() {
    // rows i < 2 sit west of the source footprint
    let grid = OutputGrid::new(-2.0, 1.0, 1.0, 1.0, 5, 3, 4326).unwrap();
    let mut met = wind_driver(grid, false);
    let field = met.to_wind_grid(0.5).unwrap();
    for i in 0..5 {
        for j in 0..3 {
            let x = -2.0 + i as f64;
            let p = field.get(WindField::P, i, j);
            if x < 0.0 {
                assert_eq!(p, 1013.0, "cell ({}, {}) should be background", i, j);
            } else {
                assert!((p - 1010.0).abs() < 1e-9, "cell ({}, {}) = {}", i, j, p);
            }
        }
    }
}

#[test]
fn test_backfill_fills_uncovered_cells_from_nearest() {
    let grid = OutputGrid::new(-2.0, 1.0, 1.0, 1.0, 5, 3, 4326).unwrap();
    let mut met = wind_driver(grid, true);
    let field = met.to_wind_grid(0.5).unwrap();
    for i in 0..5 {
        for j in 0..3 {
            // uniform source pressure, so nearest-neighbor backfill blends
            // to the same value as interior interpolation
            assert!(
                (field.get(WindField::P, i, j) - 1010.0).abs() < 1e-9,
                "cell ({}, {}) = {}",
                i,
                j,
                field.get(WindField::P, i, j)
            );
        }
    }
}

#[test]
fn test_scalar_group_reproduces_linear_field() {
    let n = 5;
    let mut lon = Vec::new();
    let mut lat = Vec::new();
    for i in 0..n {
        for j in 0..n {
            lon.push(j as f64);
            lat.push((n - 1 - i) as f64);
        }
    }
    let temp: Vec<f64> = lon
        .iter()
        .zip(lat.iter())
        .map(|(x, y)| 2.0 * x + 3.0 * y)
        .collect();
    let make = || {
        let reader = MemoryReader::new(n, n)
            .with_record("longitudes", lon.clone())
            .with_record("latitudes", lat.clone())
            .with_record("2t", temp.clone());
        SourceField::from_reader(Box::new(reader), &DecoderContext::default()).unwrap()
    };

    let grid = OutputGrid::new(0.5, 0.5, 0.25, 0.25, 9, 9, 4326).unwrap();
    let mut met = Meteorology::new(grid, SourceKind::Gfs, VariableGroup::Temperature, false);
    met.set_next_snapshot(t(0), make());
    met.set_next_snapshot(t(6), make());

    let field: MetField<1> = met.to_grid(0.25).unwrap();
    for i in 0..9 {
        for j in 0..9 {
            let x = 0.5 + i as f64 * 0.25;
            let y = 0.5 + j as f64 * 0.25;
            assert!(
                (field.get(0, i, j) - (2.0 * x + 3.0 * y)).abs() < 1e-9,
                "cell ({}, {}) = {}",
                i,
                j,
                field.get(0, i, j)
            );
        }
    }
}

#[test]
fn test_rainfall_rate_scaling_override() {
    let grid = OutputGrid::new(1.0, 1.0, 0.5, 0.5, 4, 4, 4326).unwrap();
    let mut met = Meteorology::new(grid, SourceKind::Gefs, VariableGroup::Rainfall, false);
    met.set_next_snapshot(t(0), rain_snapshot("tp", 0.002));
    met.set_next_snapshot(t(6), rain_snapshot("tp", 0.004));
    met.set_rate_scaling(0.5, 0.25);

    let field: MetField<1> = met.to_grid(0.5).unwrap();
    // 0.5*(0.002*0.5) + 0.5*(0.004*0.25) = 0.001, times the per-hour factor
    for i in 0..4 {
        for j in 0..4 {
            assert!(
                (field.get(0, i, j) - 3.6).abs() < 1e-9,
                "cell ({}, {}) = {}",
                i,
                j,
                field.get(0, i, j)
            );
        }
    }
}

#[test]
fn test_accumulated_precipitation_spread_over_snapshot_spacing() {
    let grid = OutputGrid::new(1.0, 1.0, 0.5, 0.5, 4, 4, 4326).unwrap();

    // GEFS reports six-hour accumulated totals; with no override the
    // driver divides by the snapshot spacing
    let mut met = Meteorology::new(grid.clone(), SourceKind::Gefs, VariableGroup::Rainfall, false);
    met.set_next_snapshot(t(0), rain_snapshot("tp", 0.006));
    met.set_next_snapshot(t(6), rain_snapshot("tp", 0.006));
    let field = met.to_grid(0.5).unwrap();
    assert!((field.get(0, 0, 0) - 0.006 / 6.0 * 3600.0).abs() < 1e-9);

    // a rate-reporting source is left alone
    let mut met = Meteorology::new(grid, SourceKind::Gfs, VariableGroup::Rainfall, false);
    met.set_next_snapshot(t(0), rain_snapshot("prate", 0.001));
    met.set_next_snapshot(t(6), rain_snapshot("prate", 0.001));
    let field = met.to_grid(0.5).unwrap();
    assert!((field.get(0, 0, 0) - 3.6).abs() < 1e-9);
}

#[test]
fn test_snapshot_rotation() {
    let grid = OutputGrid::new(1.0, 1.0, 1.0, 1.0, 2, 2, 4326).unwrap();
    let mut met = Meteorology::new(grid, SourceKind::Gfs, VariableGroup::WindPressure, false);
    met.set_next_snapshot(t(0), snapshot(100_000.0));
    assert_eq!(met.t1(), Some(t(0)));
    assert_eq!(met.t2(), None);

    met.set_next_snapshot(t(6), snapshot(100_500.0));
    assert_eq!((met.t1(), met.t2()), (Some(t(0)), Some(t(6))));

    met.set_next_snapshot(t(12), snapshot(101_000.0));
    assert_eq!((met.t1(), met.t2()), (Some(t(6)), Some(t(12))));

    // resampling still works against the rotated pair
    let field = met.to_wind_grid(1.0).unwrap();
    assert!((field.get(WindField::P, 0, 0) - 1010.0).abs() < 1e-9);
}

#[test]
fn test_time_weight_scenarios() {
    assert_eq!(generate_time_weight(t(0), t(6), t(0)), 0.0);
    assert_eq!(generate_time_weight(t(0), t(6), t(6)), 1.0);
    assert!((generate_time_weight(t(0), t(6), t(3)) - 0.5).abs() < 1e-12);
    // output times beyond the bracket clamp instead of extrapolating
    assert_eq!(generate_time_weight(t(0), t(6), t(23)), 1.0);
}

#[test]
fn test_index_roundtrip() {
    let field = snapshot(100_000.0);
    let (ni, nj) = (field.ni(), field.nj());
    for k in 0..field.size() {
        let (i, j) = field.index_to_ij(k);
        assert_eq!(i * nj + j, k);
        assert!(i < ni && j < nj);
    }
}

#[test]
fn test_longitudes_are_normalized_on_load() {
    let n = 5;
    let mut lon = Vec::new();
    let mut lat = Vec::new();
    for i in 0..n {
        for j in 0..n {
            // 0..360 convention on the wire
            lon.push(350.0 + (j as f64) * 2.5);
            lat.push((n - 1 - i) as f64);
        }
    }
    let reader = MemoryReader::new(n, n)
        .with_record("longitudes", lon)
        .with_record("latitudes", lat);
    let field = SourceField::from_reader(Box::new(reader), &DecoderContext::default()).unwrap();
    for &v in field.longitude_1d() {
        assert!((-180.0..180.0).contains(&v), "{} not normalized", v);
    }
    // 350 E wraps to -10
    assert!((field.longitude_1d()[0] - -10.0).abs() < 1e-12);
}

#[test]
fn test_source_field_queries() {
    let field = snapshot(100_000.0);
    // (lon, lat) = (2, 2) is the grid center, index i=2, j=2
    assert_eq!(field.nearest(2.1, 2.1), 2 * 5 + 2);
    assert!(field.point_inside(2.0, 2.0));
    assert!(!field.point_inside(-1.0, 2.0));
    assert_eq!(field.corners()[0].x, 0.0);
    assert_eq!(field.corners()[2].x, 4.0);

    // wider neighborhood queries through the spatial index
    let index = field.spatial_index();
    let near = index.find_k_nearest(2.0, 2.0, 3);
    assert_eq!(near[0], (12, 0.0));
    // the four axis neighbors tie at distance 1; lowest indices win
    assert_eq!(near[1].0, 7);
    assert_eq!(near[2].0, 11);
    assert!((near[1].1 - 1.0).abs() < 1e-12);

    let mut ring = index.find_within_radius(2.0, 2.0, 1.0);
    ring.sort_unstable();
    assert_eq!(ring, vec![7, 11, 12, 13, 17]);
}
