//! ## Pipeline Configuration
//!
//! Typed model of the `preprocessing` section of a configuration document. Loading and parsing
//! the document (YAML, TOML, ...) is the caller's job; this module starts from an already
//! decoded `serde_json::Value` or any other serde source.
//!
//! ```json
//! {
//!   "preprocessing": {
//!     "drop_columns": ["PoolQC"],
//!     "categorical_transforms": { "FireplaceQu": { "mapping": { "Ex": 1, "Fa": 0 }, "null_value": 0 } },
//!     "scaling": { "strategy": "standard", "exclude_columns": ["Id", "SalePrice"] },
//!     "pipeline": [
//!       { "step": "drop_columns" },
//!       { "step": "categorical_transforms" },
//!       { "step": "scaling", "name": "scale" }
//!     ]
//!   }
//! }
//! ```

use crate::exceptions::PipelineResult;
use crate::transformers::categorical_encoding::CategoryMapping;
use crate::transformers::feature_creation::FeatureEngineeringConfig;
use crate::transformers::feature_selection::FeatureSelectionConfig;
use crate::transformers::imputation::ImputationConfig;
use crate::transformers::outlier_handling::OutlierBounds;
use crate::transformers::scaling_and_normalization::ScalingConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root of the configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
}

impl PipelineConfig {
    /// Decodes a generic nested mapping.
    pub fn from_value(value: serde_json::Value) -> PipelineResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// The ordered step list plus one parameter block per step kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pipeline: Vec<StepSpec>,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    #[serde(default)]
    pub categorical_transforms: BTreeMap<String, CategoryMapping>,
    #[serde(default)]
    pub imputation: Option<ImputationConfig>,
    #[serde(default)]
    pub scaling: Option<ScalingConfig>,
    #[serde(default)]
    pub feature_engineering: Option<FeatureEngineeringConfig>,
    #[serde(default)]
    pub feature_selection: Option<FeatureSelectionConfig>,
    #[serde(default)]
    pub remove_outliers: BTreeMap<String, OutlierBounds>,
}

impl PreprocessingConfig {
    pub fn with_steps<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pipeline = kinds.into_iter().map(StepSpec::new).collect();
        self
    }
}

/// One entry of the ordered step list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step kind, e.g. `imputation`.
    pub step: String,
    /// Step name in the pipeline; defaults to the canonical kind.
    #[serde(default)]
    pub name: Option<String>,
    /// Inline parameters, taking precedence over the per-kind block.
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

impl StepSpec {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            name: None,
            params: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }
}
