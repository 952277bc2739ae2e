//! Data models

pub mod record;
pub mod stats;

pub use record::*;
pub use stats::*;
