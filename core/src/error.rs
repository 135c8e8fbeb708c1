//! Error types for configuring the filter state.
//!
//! Runtime numerical conditions (an out-of-range depth selector, a near-zero
//! inverse depth) are corrected in place and logged, so they never show up
//! here. These errors only describe a configuration that cannot be turned into
//! a consistent state layout.

use thiserror::Error;

/// Errors raised while validating a [`crate::config::FilterConfig`] or
/// converting raw configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid depth parameterization selector: {0} (expected 0..=3)")]
    InvalidDepthType(i32),

    #[error("At least one camera is required, got {0}")]
    NoCameras(usize),

    #[error("At least one feature slot is required, got {0}")]
    NoFeatureSlots(usize),

    #[error("Expected {expected} camera extrinsics entries, got {found}")]
    ExtrinsicsCount { expected: usize, found: usize },

    #[error("Camera {0} rotation quaternion has zero norm")]
    DegenerateRotation(usize),

    #[error("Variance for block '{block}' must be finite and non-negative, got {value}")]
    InvalidVariance { block: &'static str, value: f64 },
}
