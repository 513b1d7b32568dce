//! Error types for the feed ranker
//!
//! Most of these never reach a caller of the public API: insufficient data,
//! degenerate training sets and malformed request parameters are logged and
//! turned into a weaker fallback strategy inside the crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankerError {
    /// Not enough interactions (or no vocabulary) to score anything
    #[error("insufficient data: {interactions} interactions, {required} required")]
    InsufficientData { interactions: usize, required: usize },

    /// Training produced zero usable feature rows
    #[error("degenerate training set: {0}")]
    DegenerateTrainingSet(String),

    /// Content request parameters could not be decoded
    #[error("malformed request parameter `{param}`: {message}")]
    MalformedParameters { param: String, message: String },

    /// Invalid configuration value
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        key: Option<String>,
    },

    /// The content source boundary failed
    #[error("content source error: {0}")]
    Source(String),

    /// Tensor shape mismatch inside the classifier
    #[error("model error: {0}")]
    Model(#[from] ndarray::ShapeError),

    /// Feature vector length differs from the model input
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<config::ConfigError> for RankerError {
    fn from(err: config::ConfigError) -> Self {
        RankerError::Configuration {
            message: err.to_string(),
            key: None,
        }
    }
}

impl RankerError {
    pub fn config(message: impl Into<String>, key: &str) -> Self {
        RankerError::Configuration {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RankerError::InsufficientData {
            interactions: 3,
            required: 10,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data: 3 interactions, 10 required"
        );

        let err = RankerError::config("must be positive", "classifier.learning_rate");
        match err {
            RankerError::Configuration { key, .. } => {
                assert_eq!(key.as_deref(), Some("classifier.learning_rate"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
