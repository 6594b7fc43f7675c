//! Temporal/spatial resampling driver.
//!
//! Holds the two source snapshots bracketing the requested output time,
//! triangulates each source grid once, and blends spatially interpolated
//! values with a linear time weight onto the destination grid.

pub mod field;

use chrono::{DateTime, Utc};
use log::debug;
use thiserror::Error;

use crate::data_io::{MetVariable, SourceError, SourceField, SourceKind, VariableGroup};
use crate::geometry::Point;
use crate::grid::OutputGrid;
use crate::triangulation::weight::InterpolationWeight;
use crate::triangulation::{Triangulation, TriangulationError};
use field::{MetField, WindField};

#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Triangulation(#[from] TriangulationError),

    #[error("driver holds {0} snapshot(s); two are required")]
    MissingSnapshots(usize),

    #[error("{0:?} is not a single-component variable group")]
    NotScalar(VariableGroup),

    #[error("wind resampling requires the wind/pressure group, not {0:?}")]
    NotWindPressure(VariableGroup),
}

/// Coordinate transform from destination grid space into the source
/// coordinate system, supplied by the caller when the EPSG codes differ.
pub type Projection = Box<dyn Fn(Point) -> Point + Send + Sync>;

struct Snapshot {
    time: DateTime<Utc>,
    field: SourceField,
    /// One weight per destination cell, built lazily and kept for every
    /// later output step against this snapshot.
    weights: Option<Vec<InterpolationWeight>>,
}

/// Resamples a pair of adjacent forecast snapshots onto a destination grid.
pub struct Meteorology {
    grid: OutputGrid,
    source: SourceKind,
    group: VariableGroup,
    backfill: bool,
    /// Destination positions in source coordinates, row-major.
    positions: Vec<Point>,
    rate_scaling: Option<(f64, f64)>,
    snap1: Option<Snapshot>,
    snap2: Option<Snapshot>,
}

impl Meteorology {
    pub fn new(grid: OutputGrid, source: SourceKind, group: VariableGroup, backfill: bool) -> Self {
        let positions = grid.positions();
        Self {
            grid,
            source,
            group,
            backfill,
            positions,
            rate_scaling: None,
            snap1: None,
            snap2: None,
        }
    }

    /// Reprojects the destination grid into the source coordinate system.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.positions = self
            .grid
            .positions()
            .into_iter()
            .map(|p| projection(p))
            .collect();
        self
    }

    pub fn grid(&self) -> &OutputGrid {
        &self.grid
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn group(&self) -> VariableGroup {
        self.group
    }

    pub fn backfill(&self) -> bool {
        self.backfill
    }

    pub fn t1(&self) -> Option<DateTime<Utc>> {
        self.snap1.as_ref().map(|s| s.time)
    }

    pub fn t2(&self) -> Option<DateTime<Utc>> {
        self.snap2.as_ref().map(|s| s.time)
    }

    /// Overrides the per-snapshot multipliers converting precipitation
    /// totals into hourly rates. Without an override, sources that report
    /// accumulated precipitation spread each total over the snapshot
    /// spacing; rate-reporting sources are left alone.
    pub fn set_rate_scaling(&mut self, first: f64, second: f64) {
        self.rate_scaling = Some((first, second));
    }

    /// Per-snapshot multipliers applied to precipitation before time
    /// blending.
    fn precipitation_rates(&self) -> (f64, f64) {
        if let Some(rates) = self.rate_scaling {
            return rates;
        }
        if !self.source.accumulated_precipitation() {
            return (1.0, 1.0);
        }
        match (self.t1(), self.t2()) {
            (Some(t1), Some(t2)) if t2 > t1 => {
                let rate = 1.0 / crate::time_utils::hours_between(t1, t2);
                (rate, rate)
            }
            _ => (1.0, 1.0),
        }
    }

    /// Installs the next snapshot in time order. The first two calls fill
    /// the bracketing slots; later calls shift the newer snapshot down
    /// and take its place, carrying cached interpolation state along.
    pub fn set_next_snapshot(&mut self, time: DateTime<Utc>, field: SourceField) {
        let snap = Snapshot {
            time,
            field,
            weights: None,
        };
        if self.snap1.is_none() {
            self.snap1 = Some(snap);
        } else if self.snap2.is_none() {
            self.snap2 = Some(snap);
        } else {
            self.snap1 = self.snap2.take();
            self.snap2 = Some(snap);
        }
    }

    /// Linear blending factor for an output time between two snapshot
    /// times; see [`crate::time_utils::generate_time_weight`].
    pub fn generate_time_weight(
        t1: DateTime<Utc>,
        t2: DateTime<Utc>,
        t_out: DateTime<Utc>,
    ) -> f64 {
        crate::time_utils::generate_time_weight(t1, t2, t_out)
    }

    /// Blending factor for `t_out` against the loaded snapshot times.
    pub fn time_weight(&self, t_out: DateTime<Utc>) -> Result<f64, DriverError> {
        match (self.t1(), self.t2()) {
            (Some(t1), Some(t2)) => Ok(Self::generate_time_weight(t1, t2, t_out)),
            _ => Err(DriverError::MissingSnapshots(self.snapshot_count())),
        }
    }

    /// Resamples a single-component variable group.
    pub fn to_grid(&mut self, time_weight: f64) -> Result<MetField<1>, DriverError> {
        if self.group.components() != 1 {
            return Err(DriverError::NotScalar(self.group));
        }
        self.ensure_weights()?;
        let var = self.group.variables()[0];
        let values = self.component_values(var, time_weight.clamp(0.0, 1.0))?;
        let (ni, nj) = (self.grid.ni(), self.grid.nj());
        let mut out = MetField::new(ni, nj, [var.background()]);
        fill(&mut out, 0, &values, ni, nj);
        Ok(out)
    }

    /// Resamples u, v and pressure into a three-component field.
    pub fn to_wind_grid(&mut self, time_weight: f64) -> Result<WindField, DriverError> {
        if self.group != VariableGroup::WindPressure {
            return Err(DriverError::NotWindPressure(self.group));
        }
        self.ensure_weights()?;
        let alpha = time_weight.clamp(0.0, 1.0);
        let (ni, nj) = (self.grid.ni(), self.grid.nj());
        let mut out = WindField::new(ni, nj, WindField::wind_background());
        for (c, &var) in self.group.variables().iter().enumerate() {
            let values = self.component_values(var, alpha)?;
            fill(&mut out, c, &values, ni, nj);
        }
        Ok(out)
    }

    fn snapshot_count(&self) -> usize {
        self.snap1.is_some() as usize + self.snap2.is_some() as usize
    }

    fn ensure_weights(&mut self) -> Result<(), DriverError> {
        if self.snapshot_count() != 2 {
            return Err(DriverError::MissingSnapshots(self.snapshot_count()));
        }
        if let Some(s1) = self.snap1.as_mut() {
            if s1.weights.is_none() {
                let shared = self.snap2.as_ref().and_then(|s2| {
                    same_geometry(&s1.field, &s2.field)
                        .then(|| s2.weights.clone())
                        .flatten()
                });
                s1.weights = Some(match shared {
                    Some(w) => w,
                    None => build_weights(&s1.field, &self.positions)?,
                });
            }
        }
        if let Some(s2) = self.snap2.as_mut() {
            if s2.weights.is_none() {
                let shared = self.snap1.as_ref().and_then(|s1| {
                    same_geometry(&s1.field, &s2.field)
                        .then(|| s1.weights.clone())
                        .flatten()
                });
                s2.weights = Some(match shared {
                    Some(w) => w,
                    None => build_weights(&s2.field, &self.positions)?,
                });
            }
        }
        Ok(())
    }

    /// One blended, scaled value per destination cell for a variable.
    fn component_values(&mut self, var: MetVariable, alpha: f64) -> Result<Vec<f64>, DriverError> {
        let name = self.source.short_name(var);
        let scaling = self.source.scaling(var);
        let background = var.background();
        let (rate1, rate2) = if var == MetVariable::Precipitation {
            self.precipitation_rates()
        } else {
            (1.0, 1.0)
        };
        let have = self.snapshot_count();
        let (Some(s1), Some(s2)) = (self.snap1.as_mut(), self.snap2.as_mut()) else {
            return Err(DriverError::MissingSnapshots(have));
        };

        let Snapshot {
            field: f1,
            weights: w1,
            ..
        } = s1;
        let Snapshot {
            field: f2,
            weights: w2,
            ..
        } = s2;
        f1.values_1d(name)?;
        f2.values_1d(name)?;
        let v1 = f1.cached(name).expect("record cached above");
        let v2 = f2.cached(name).expect("record cached above");
        let w1 = w1.as_deref().expect("weights are built before resampling");
        let w2 = w2.as_deref().expect("weights are built before resampling");

        let mut out = Vec::with_capacity(self.positions.len());
        for (k, p) in self.positions.iter().enumerate() {
            let a = w1[k].apply(v1) * rate1;
            let b = w2[k].apply(v2) * rate2;
            let value = if a.is_nan() && b.is_nan() {
                if self.backfill {
                    let raw = (1.0 - alpha) * v1[f1.nearest(p.x, p.y)] * rate1
                        + alpha * v2[f2.nearest(p.x, p.y)] * rate2;
                    scaling.apply(raw)
                } else {
                    background
                }
            } else if a.is_nan() {
                scaling.apply(b)
            } else if b.is_nan() {
                scaling.apply(a)
            } else {
                scaling.apply((1.0 - alpha) * a + alpha * b)
            };
            out.push(value);
        }
        Ok(out)
    }
}

fn fill<const N: usize>(out: &mut MetField<N>, c: usize, values: &[f64], ni: usize, nj: usize) {
    for i in 0..ni {
        for j in 0..nj {
            out.set(c, i, j, values[i * nj + j]);
        }
    }
}

fn same_geometry(a: &SourceField, b: &SourceField) -> bool {
    a.longitude_1d() == b.longitude_1d() && a.latitude_1d() == b.latitude_1d()
}

/// Triangulates a source grid, constrains it to its coverage footprint,
/// and evaluates interpolation weights at every destination position.
fn build_weights(
    field: &SourceField,
    positions: &[Point],
) -> Result<Vec<InterpolationWeight>, DriverError> {
    debug!("triangulating source grid ({} points)", field.size());
    let mut tri = Triangulation::new(field.longitude_1d(), field.latitude_1d())?;
    let corners = field.corners();
    let xs: Vec<f64> = corners.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = corners.iter().map(|p| p.y).collect();
    tri.apply_constraint_polygon(&xs, &ys)?;
    Ok(tri.interpolate_many(positions))
}
