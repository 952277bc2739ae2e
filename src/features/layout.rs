//! Feature Layout - Centralized Feature Definition
//!
//! Order here is the order the classifier sees. Reordering or renaming a
//! feature invalidates every trained artifact, so bump `FEATURE_VERSION`.

use serde::Serialize;

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

/// Telemetry field names in exact vector order
pub const FEATURE_LAYOUT: &[&str] = &[
    "keyPressCount",        // 0: keydown events on the page
    "clickCount",           // 1: click events on the page
    "scrollDepth",          // 2: deepest scroll position (ratio or px)
    "hardwareConcurrency",  // 3: navigator.hardwareConcurrency
    "deviceMemory",         // 4: navigator.deviceMemory (GB)
];

/// Length of the vector derived directly from a record
pub const NATURAL_FEATURE_COUNT: usize = 5;

/// Layout summary for status output
#[derive(Debug, Clone, Serialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            feature_count: NATURAL_FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Whether a trained artifact's declared feature names start with our layout.
///
/// Extra trailing names are the padded positions; they only agree if the
/// artifact was trained with zeros there, which we cannot know.
pub fn layout_prefix_matches(declared: &[String]) -> bool {
    declared.len() >= NATURAL_FEATURE_COUNT
        && FEATURE_LAYOUT
            .iter()
            .zip(declared.iter())
            .all(|(ours, theirs)| *ours == theirs.as_str())
}

/// Get feature index by name
#[cfg(test)]
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}
