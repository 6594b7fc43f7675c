use ndarray::Array2;

/// Mean sea-level pressure assumed where no source covers a cell (hPa).
pub const BACKGROUND_PRESSURE: f64 = 1013.0;

/// N-component per-cell values on a destination grid.
///
/// Each component is an `(ni, nj)` matrix initialized to its background
/// value. Out-of-bounds access is a programming error and panics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetField<const N: usize> {
    ni: usize,
    nj: usize,
    data: [Array2<f64>; N],
}

impl<const N: usize> MetField<N> {
    pub fn new(ni: usize, nj: usize, background: [f64; N]) -> Self {
        Self {
            ni,
            nj,
            data: std::array::from_fn(|c| Array2::from_elem((ni, nj), background[c])),
        }
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.ni, self.nj)
    }

    pub fn get(&self, component: usize, i: usize, j: usize) -> f64 {
        assert!(component < N && i < self.ni && j < self.nj);
        self.data[component][[i, j]]
    }

    pub fn set(&mut self, component: usize, i: usize, j: usize, value: f64) {
        assert!(component < N && i < self.ni && j < self.nj);
        self.data[component][[i, j]] = value;
    }

    pub fn component(&self, component: usize) -> &Array2<f64> {
        assert!(component < N);
        &self.data[component]
    }
}

/// Wind and pressure on one grid: components u, v, pressure.
pub type WindField = MetField<3>;

impl MetField<3> {
    pub const U: usize = 0;
    pub const V: usize = 1;
    pub const P: usize = 2;

    pub fn wind_background() -> [f64; 3] {
        [0.0, 0.0, BACKGROUND_PRESSURE]
    }

    pub fn u(&self) -> &Array2<f64> {
        self.component(Self::U)
    }

    pub fn v(&self) -> &Array2<f64> {
        self.component(Self::V)
    }

    pub fn p(&self) -> &Array2<f64> {
        self.component(Self::P)
    }
}
