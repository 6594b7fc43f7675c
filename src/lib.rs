pub mod data_io;
pub mod driver;
pub mod geometry;
pub mod grid;
pub mod spatial;
pub mod time_utils;
pub mod triangulation;

pub use time_utils::*;
