use thiserror::Error;

use crate::geometry::{Point, Polygon};

#[derive(Error, Debug)]
pub enum GridError {
    #[error("grid spacing must be positive")]
    InvalidSpacing,

    #[error("grid must have at least one point along each axis")]
    Empty,
}

/// Destination grid specification.
///
/// A planar grid with origin `(x0, y0)`, spacing `(dx, dy)`, counts
/// `(ni, nj)` and an EPSG code. Cells are addressed row-major: linear
/// index `k = i*nj + j`. An optional rotation (degrees, counter-clockwise
/// about the origin) tilts the grid axes.
#[derive(Debug, Clone)]
pub struct OutputGrid {
    x0: f64,
    y0: f64,
    dx: f64,
    dy: f64,
    ni: usize,
    nj: usize,
    epsg: u32,
    rotation: f64,
    dxx: f64,
    dxy: f64,
    dyx: f64,
    dyy: f64,
    corners: [Point; 4],
}

impl OutputGrid {
    pub fn new(
        x0: f64,
        y0: f64,
        dx: f64,
        dy: f64,
        ni: usize,
        nj: usize,
        epsg: u32,
    ) -> Result<Self, GridError> {
        Self::with_rotation(x0, y0, dx, dy, ni, nj, epsg, 0.0)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_rotation(
        x0: f64,
        y0: f64,
        dx: f64,
        dy: f64,
        ni: usize,
        nj: usize,
        epsg: u32,
        rotation_deg: f64,
    ) -> Result<Self, GridError> {
        if dx <= 0.0 || dy <= 0.0 {
            return Err(GridError::InvalidSpacing);
        }
        if ni == 0 || nj == 0 {
            return Err(GridError::Empty);
        }
        let theta = rotation_deg.to_radians();
        let mut grid = Self {
            x0,
            y0,
            dx,
            dy,
            ni,
            nj,
            epsg,
            rotation: rotation_deg,
            dxx: dx * theta.cos(),
            dxy: dx * theta.sin(),
            dyx: dy * theta.sin(),
            dyy: dy * theta.cos(),
            corners: [Point::default(); 4],
        };
        grid.corners = [
            grid.corner(0, 0),
            grid.corner(ni - 1, 0),
            grid.corner(ni - 1, nj - 1),
            grid.corner(0, nj - 1),
        ];
        Ok(grid)
    }

    pub fn ni(&self) -> usize {
        self.ni
    }

    pub fn nj(&self) -> usize {
        self.nj
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn dy(&self) -> f64 {
        self.dy
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Grid point at `(i, j)`.
    pub fn corner(&self, i: usize, j: usize) -> Point {
        assert!(i < self.ni && j < self.nj);
        let i = i as f64;
        let j = j as f64;
        Point::new(
            self.x0 + i * self.dxx - j * self.dyx,
            self.y0 + j * self.dyy + i * self.dxy,
        )
    }

    /// Grid point by linear index.
    pub fn corner_at(&self, k: usize) -> Point {
        self.corner(k / self.nj, k % self.nj)
    }

    /// All grid points in row-major order.
    pub fn positions(&self) -> Vec<Point> {
        let mut out = Vec::with_capacity(self.ni * self.nj);
        for i in 0..self.ni {
            for j in 0..self.nj {
                out.push(self.corner(i, j));
            }
        }
        out
    }

    /// Center of the cell whose lower-left corner is `(i, j)`.
    pub fn center(&self, i: usize, j: usize) -> Point {
        assert!(i + 1 < self.ni && j + 1 < self.nj);
        let a = self.corner(i, j);
        let b = self.corner(i + 1, j + 1);
        Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }

    /// Extreme grid points, counter-clockwise from the origin corner.
    pub fn corners(&self) -> [Point; 4] {
        self.corners
    }

    pub fn point_inside(&self, p: Point) -> bool {
        Polygon::new(self.corners.to_vec()).is_inside(p)
    }
}
