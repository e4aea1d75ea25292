//! ## Pipeline Builder
//!
//! Turns a [`PipelineConfig`] into a [`Pipeline`]. Each step kind string resolves to exactly one
//! [`StepKind`]; its parameters are decoded into the matching [`StepDefinition`], which then
//! constructs the transformer.
//!
//! - Unknown kinds fail immediately with [`PipelineError::UnknownStep`].
//! - Missing or malformed parameters fail with [`PipelineError::InvalidConfig`].
//! - `remove_outliers` is skipped with a warning. Row filtering changes the row count and has to
//!   run on the full table before features and target are split, see
//!   [`remove_outliers`](crate::transformers::outlier_handling::remove_outliers).
//! - A configuration that resolves to no steps fails with [`PipelineError::EmptyPipeline`].

use crate::config::{PipelineConfig, PreprocessingConfig, StepSpec};
use crate::exceptions::{PipelineError, PipelineResult};
use crate::pipeline::{BoxedTransformer, Pipeline};
use crate::transformers::categorical_encoding::{CategoricalMapper, CategoryMapping};
use crate::transformers::feature_creation::{FeatureEngineer, FeatureEngineeringConfig};
use crate::transformers::feature_selection::{DropColumns, FeatureSelectionConfig, FeatureSelector};
use crate::transformers::imputation::{ImputationConfig, Imputer};
use crate::transformers::outlier_handling::OutlierBounds;
use crate::transformers::scaling_and_normalization::{Scaler, ScalingConfig};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// The registered step kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    DropColumns,
    CategoricalTransforms,
    Imputation,
    Scaling,
    FeatureEngineering,
    FeatureSelection,
    RemoveOutliers,
}

impl StepKind {
    /// Canonical name, also the default step name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::DropColumns => "drop_columns",
            StepKind::CategoricalTransforms => "categorical_transforms",
            StepKind::Imputation => "imputation",
            StepKind::Scaling => "scaling",
            StepKind::FeatureEngineering => "feature_engineering",
            StepKind::FeatureSelection => "feature_selection",
            StepKind::RemoveOutliers => "remove_outliers",
        }
    }
}

impl FromStr for StepKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop_columns" => Ok(StepKind::DropColumns),
            "categorical_transforms" | "categorical_map" => Ok(StepKind::CategoricalTransforms),
            "imputation" => Ok(StepKind::Imputation),
            "scaling" => Ok(StepKind::Scaling),
            "feature_engineering" => Ok(StepKind::FeatureEngineering),
            "feature_selection" => Ok(StepKind::FeatureSelection),
            "remove_outliers" | "outlier_removal" => Ok(StepKind::RemoveOutliers),
            other => Err(PipelineError::UnknownStep {
                index: 0,
                kind: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inline drop parameters: a bare list or `{ "columns": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum DropParams {
    List(Vec<String>),
    Object { columns: Vec<String> },
}

/// Inline mapping parameters: the mapping itself or `{ "transforms": {...} }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum MappingParams {
    Wrapped {
        transforms: BTreeMap<String, CategoryMapping>,
    },
    Plain(BTreeMap<String, CategoryMapping>),
}

/// A step kind together with its typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum StepDefinition {
    DropColumns(Vec<String>),
    CategoricalTransforms(BTreeMap<String, CategoryMapping>),
    Imputation(ImputationConfig),
    Scaling(ScalingConfig),
    FeatureEngineering(FeatureEngineeringConfig),
    FeatureSelection(FeatureSelectionConfig),
    RemoveOutliers(BTreeMap<String, OutlierBounds>),
}

impl StepDefinition {
    /// Resolves the parameters of `entry`: inline `params` first, then the per-kind block.
    pub fn resolve(
        kind: StepKind,
        entry: &StepSpec,
        config: &PreprocessingConfig,
        step_name: &str,
    ) -> PipelineResult<Self> {
        let inline = entry.params.as_ref();
        let definition = match kind {
            StepKind::DropColumns => {
                let columns = match inline {
                    Some(v) => match decode::<DropParams>(v, step_name)? {
                        DropParams::List(columns) | DropParams::Object { columns } => columns,
                    },
                    None => config.drop_columns.clone(),
                };
                StepDefinition::DropColumns(columns)
            }
            StepKind::CategoricalTransforms => {
                let mappings = match inline {
                    Some(v) => match decode::<MappingParams>(v, step_name)? {
                        MappingParams::Wrapped { transforms } => transforms,
                        MappingParams::Plain(mappings) => mappings,
                    },
                    None => config.categorical_transforms.clone(),
                };
                StepDefinition::CategoricalTransforms(mappings)
            }
            StepKind::Imputation => {
                StepDefinition::Imputation(typed(inline, config.imputation.as_ref(), step_name)?)
            }
            StepKind::Scaling => {
                StepDefinition::Scaling(typed(inline, config.scaling.as_ref(), step_name)?)
            }
            StepKind::FeatureEngineering => StepDefinition::FeatureEngineering(typed(
                inline,
                config.feature_engineering.as_ref(),
                step_name,
            )?),
            StepKind::FeatureSelection => StepDefinition::FeatureSelection(typed(
                inline,
                config.feature_selection.as_ref(),
                step_name,
            )?),
            StepKind::RemoveOutliers => {
                let bounds = match inline {
                    Some(v) => decode(v, step_name)?,
                    None => config.remove_outliers.clone(),
                };
                StepDefinition::RemoveOutliers(bounds)
            }
        };
        Ok(definition)
    }

    pub fn kind(&self) -> StepKind {
        match self {
            StepDefinition::DropColumns(_) => StepKind::DropColumns,
            StepDefinition::CategoricalTransforms(_) => StepKind::CategoricalTransforms,
            StepDefinition::Imputation(_) => StepKind::Imputation,
            StepDefinition::Scaling(_) => StepKind::Scaling,
            StepDefinition::FeatureEngineering(_) => StepKind::FeatureEngineering,
            StepDefinition::FeatureSelection(_) => StepKind::FeatureSelection,
            StepDefinition::RemoveOutliers(_) => StepKind::RemoveOutliers,
        }
    }

    /// Constructs the transformer, or `None` for a step the pipeline does not run.
    pub fn into_transformer(self) -> Option<BoxedTransformer> {
        match self {
            StepDefinition::DropColumns(columns) => Some(Box::new(DropColumns::new(columns))),
            StepDefinition::CategoricalTransforms(mappings) if mappings.is_empty() => None,
            StepDefinition::CategoricalTransforms(mappings) => {
                Some(Box::new(CategoricalMapper::new(mappings)))
            }
            StepDefinition::Imputation(config) => Some(Box::new(Imputer::new(config))),
            StepDefinition::Scaling(config) => Some(Box::new(Scaler::new(config))),
            StepDefinition::FeatureEngineering(config) => {
                Some(Box::new(FeatureEngineer::new(config)))
            }
            StepDefinition::FeatureSelection(config) => {
                Some(Box::new(FeatureSelector::new(config)))
            }
            StepDefinition::RemoveOutliers(_) => None,
        }
    }
}

fn decode<T: DeserializeOwned>(value: &serde_json::Value, step: &str) -> PipelineResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| PipelineError::InvalidConfig {
        step: step.to_string(),
        message: e.to_string(),
    })
}

fn typed<T: DeserializeOwned + Clone>(
    inline: Option<&serde_json::Value>,
    block: Option<&T>,
    step: &str,
) -> PipelineResult<T> {
    match (inline, block) {
        (Some(v), _) => decode(v, step),
        (None, Some(block)) => Ok(block.clone()),
        (None, None) => Err(PipelineError::InvalidConfig {
            step: step.to_string(),
            message: "no parameters configured".to_string(),
        }),
    }
}

/// Builds pipelines from a configuration.
pub struct PipelineBuilder<'a> {
    config: &'a PipelineConfig,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Resolves every configured step, in order, to its typed definition.
    pub fn definitions(&self) -> PipelineResult<Vec<(String, StepDefinition)>> {
        let pre = &self.config.preprocessing;
        pre.pipeline
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let kind: StepKind = entry.step.parse().map_err(|_| PipelineError::UnknownStep {
                    index,
                    kind: entry.step.clone(),
                })?;
                let name = entry
                    .name
                    .clone()
                    .unwrap_or_else(|| kind.as_str().to_string());
                let definition = StepDefinition::resolve(kind, entry, pre, &name)?;
                Ok((name, definition))
            })
            .collect()
    }

    pub fn build(&self) -> PipelineResult<Pipeline> {
        debug!(
            "Building pipeline '{}'",
            self.config
                .preprocessing
                .name
                .as_deref()
                .unwrap_or("custom")
        );
        let mut steps = Vec::new();
        for (name, definition) in self.definitions()? {
            let kind = definition.kind();
            match definition.into_transformer() {
                Some(transformer) => {
                    debug!("Added step '{}' ({})", name, kind);
                    steps.push((name, transformer));
                }
                None if kind == StepKind::RemoveOutliers => warn!(
                    "Step '{}' skipped: outliers must be removed before the feature/target split",
                    name
                ),
                None => warn!("Step '{}' skipped: no {} configured", name, kind),
            }
        }
        if steps.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }
        debug!("Pipeline created with {} steps", steps.len());
        Ok(Pipeline::new(steps))
    }
}

/// Builds the pipeline described by `config`.
pub fn build(config: &PipelineConfig) -> PipelineResult<Pipeline> {
    PipelineBuilder::new(config).build()
}
