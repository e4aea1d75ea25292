//! ## Custom Errors for Tabular Pipeline
//!
//! This module defines the error type shared by the transformers, the pipeline, and the builder.
//! It uses the `thiserror` crate to derive the `Error` trait.
//!
//! Errors fall into a few groups:
//!
//! - configuration errors ([`PipelineError::UnknownStep`], [`PipelineError::InvalidConfig`],
//!   [`PipelineError::EmptyPipeline`]) raised while a pipeline is built,
//! - precondition violations ([`PipelineError::FitNotCalled`]) raised when a stateful
//!   transformer is used before it was fitted,
//! - wrapped engine errors from DataFusion, Arrow and `serde_json`.
//!
//! The `PipelineResult` type alias is the result type used throughout the library.
//!
//! ### Example
//!
//! ```rust
//! use tabular_pipeline::exceptions::{PipelineError, PipelineResult};
//!
//! fn resolve(kind: &str) -> PipelineResult<()> {
//!     Err(PipelineError::UnknownStep { index: 0, kind: kind.to_string() })
//! }
//! ```

use thiserror::Error;

/// Errors specific to the Tabular Pipeline library.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Wraps errors from DataFusion.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    /// Wraps errors from Arrow.
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Wraps errors raised while converting a generic configuration value.
    #[error("Configuration decode error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Indicates that an invalid parameter was provided (e.g., unsupported value or incorrect data type).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Indicates that the specified column does not exist in the DataFrame.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Indicates the transform method was called before calling fit for a stateful transformer.
    #[error("Transform called before fit for stateful transformer")]
    FitNotCalled,

    /// A step kind in the configuration does not name a registered transformer.
    #[error("Unknown preprocessing step '{kind}' at position {index}")]
    UnknownStep { index: usize, kind: String },

    /// A step's parameters are missing or malformed.
    #[error("Invalid configuration for step '{step}': {message}")]
    InvalidConfig { step: String, message: String },

    /// The pipeline has no steps.
    #[error("No valid preprocessing steps configured")]
    EmptyPipeline,

    /// An error raised inside a named pipeline step.
    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Wraps `self` with the name of the pipeline step that produced it.
    pub fn in_step(self, step: &str) -> Self {
        PipelineError::Step {
            step: step.to_string(),
            source: Box::new(self),
        }
    }
}

/// A convenient result type for Tabular Pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_datafusion_error() {
        let df_err = datafusion::error::DataFusionError::Plan("test plan error".into());
        let err: PipelineError = df_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("DataFusion error:"));
        assert!(err_msg.contains("test plan error"));
    }

    #[test]
    fn test_arrow_error() {
        let arrow_err = arrow::error::ArrowError::ComputeError("test compute error".into());
        let err: PipelineError = arrow_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Arrow error:"));
        assert!(err_msg.contains("test compute error"));
    }

    #[test]
    fn test_serde_json_error() {
        let json_err = serde_json::from_str::<u32>("\"not a number\"").unwrap_err();
        let err: PipelineError = json_err.into();
        assert!(format!("{}", err).contains("Configuration decode error:"));
    }

    #[test]
    fn test_unknown_step_error() {
        let err = PipelineError::UnknownStep {
            index: 2,
            kind: "pca".into(),
        };
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("'pca'"));
        assert!(err_msg.contains("position 2"));
    }

    #[test]
    fn test_invalid_config_error() {
        let err = PipelineError::InvalidConfig {
            step: "imputation".into(),
            message: "missing parameters".into(),
        };
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("'imputation'"));
        assert!(err_msg.contains("missing parameters"));
    }

    #[test]
    fn test_fit_not_called_error() {
        let err = PipelineError::FitNotCalled;
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Transform called before fit for stateful transformer"));
    }

    #[test]
    fn test_step_error_keeps_source() {
        let err = PipelineError::FitNotCalled.in_step("scaling");
        assert!(format!("{}", err).starts_with("Step 'scaling' failed:"));
        let source = err.source().expect("step error has a source");
        assert!(source.to_string().contains("before fit"));
    }
}
