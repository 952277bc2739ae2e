//! Features Module - telemetry record to classifier input

pub mod layout;
pub mod vector;

pub use layout::LayoutInfo;
pub use vector::FeatureVector;
