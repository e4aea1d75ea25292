//! # Transformer Implementations
//!
//! The submodules contain the preprocessing steps a pipeline can be built from.

pub mod categorical_encoding;
pub mod feature_creation;
pub mod feature_selection;
pub mod imputation;
pub mod outlier_handling;
pub mod scaling_and_normalization;
