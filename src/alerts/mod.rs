pub mod normalizer;
pub mod payload;

pub use normalizer::{normalize, NormalizeOptions, OutputRow};
