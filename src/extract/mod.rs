//! Reductions from cached signals to plain results.
//!
//! Extractors only read the signal arrays; nothing here copies or mutates
//! cached data beyond the reduced output.

pub mod image;
pub mod peak;
pub mod spectrum;

pub use image::{DataRange, ImageResult};
pub use peak::PeakMetrics;
pub use spectrum::{Region, SpectrumResult};
