//! Detector bank construction: filter rendering and quantized lookup.

pub mod bank;
pub mod geometry;

pub use bank::{DetectorBank, Kind, Range};
