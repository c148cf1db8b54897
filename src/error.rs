// Errors raised while building maps and distributing fluids

use thiserror::Error;

/// Contract violations detected by the distribution core.
///
/// None of these are recoverable: they signal invalid input or a modelling
/// inconsistency, and retrying the same call yields the same error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("invalid level-to-volume map: {reason}")]
    InvalidMap { reason: String },

    #[error("invalid {name} density: {value}")]
    InvalidDensity { name: &'static str, value: f64 },

    #[error("oil to gas level ratio {ratio} is not within (0, 1)")]
    InvalidDensityRatio { ratio: f64 },

    #[error("scale factors must be strictly positive, got ({level}, {volume})")]
    InvalidScale { level: f64, volume: f64 },

    #[error("segment search for the {what} fell outside the map")]
    SegmentOutOfRange { what: &'static str },

    #[error("numerically implausible {what}: {value}")]
    NumericalImplausibility { what: &'static str, value: f64 },
}
