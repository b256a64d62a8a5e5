use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ChoroplethError {
    #[error("invalid color '{0}', expected #RRGGBB")]
    InvalidColor(String),

    #[error("threshold table is empty")]
    EmptyThresholds,

    #[error("threshold bound {0} must be finite and greater than zero")]
    InvalidBound(f64),

    #[error("threshold bounds must be strictly decreasing ({previous} then {next})")]
    UnsortedThresholds { previous: f64, next: f64 },

    #[error("GeoJSON must be a FeatureCollection")]
    NotFeatureCollection,

    #[error("feature {feature} is missing required field '{field}'")]
    MissingField { feature: String, field: String },
}
