//! ## Transformers for imputing missing values
//!
//! This module provides the **Imputer**, which fills missing values column by column using one
//! strategy for numeric columns and another for categorical (string) columns.
//!
//! Numeric strategies: mean, median, most frequent, constant. Categorical strategies: most
//! frequent (alias `mode`) and constant. Fill values are learned during `fit` and replayed by
//! `transform`; columns listed in `exclude_columns` are never touched.
//!
//! Errors are returned as `PipelineError` and results are wrapped in `PipelineResult`.

use crate::exceptions::{PipelineError, PipelineResult};
use crate::impl_transformer;
use crate::stats;
use crate::table::{self, is_categorical, is_numeric};
use datafusion::logical_expr::{ident, lit, not, Case as DFCase, Expr};
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Constructs an expression equivalent to SQL COALESCE(col, fallback).
/// This is implemented as a CASE expression: if `col` is not null then return it, otherwise return `fallback`.
fn coalesce_expr_for(name: &str, fallback: Expr) -> Expr {
    Expr::Case(DFCase {
        expr: None,
        when_then_expr: vec![(Box::new(not(ident(name).is_null())), Box::new(ident(name)))],
        else_expr: Some(Box::new(fallback)),
    })
}

/// Imputation strategy for numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericStrategy {
    Mean,
    Median,
    #[serde(alias = "mode")]
    MostFrequent,
    Constant,
}

impl NumericStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumericStrategy::Mean => "mean",
            NumericStrategy::Median => "median",
            NumericStrategy::MostFrequent => "most_frequent",
            NumericStrategy::Constant => "constant",
        }
    }
}

impl FromStr for NumericStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(NumericStrategy::Mean),
            "median" => Ok(NumericStrategy::Median),
            "most_frequent" | "mode" => Ok(NumericStrategy::MostFrequent),
            "constant" => Ok(NumericStrategy::Constant),
            other => Err(PipelineError::InvalidParameter(format!(
                "Unsupported numerical imputation strategy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for NumericStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Imputation strategy for categorical columns. `mode` is accepted as an alias of most frequent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalStrategy {
    #[serde(alias = "mode")]
    MostFrequent,
    Constant,
}

impl CategoricalStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoricalStrategy::MostFrequent => "most_frequent",
            CategoricalStrategy::Constant => "constant",
        }
    }
}

impl FromStr for CategoricalStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "most_frequent" | "mode" => Ok(CategoricalStrategy::MostFrequent),
            "constant" => Ok(CategoricalStrategy::Constant),
            other => Err(PipelineError::InvalidParameter(format!(
                "Unsupported categorical imputation strategy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CategoricalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_categorical_fill() -> String {
    "missing_value".to_string()
}

/// Configuration of an [`Imputer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationConfig {
    pub numerical_strategy: NumericStrategy,
    pub categorical_strategy: CategoricalStrategy,
    #[serde(default)]
    pub exclude_columns: Vec<String>,
    /// Fill value of the numeric `constant` strategy.
    #[serde(default)]
    pub numerical_fill_value: f64,
    /// Fill value of the categorical `constant` strategy.
    #[serde(default = "default_categorical_fill")]
    pub categorical_fill_value: String,
}

impl ImputationConfig {
    pub fn new(numerical_strategy: NumericStrategy, categorical_strategy: CategoricalStrategy) -> Self {
        Self {
            numerical_strategy,
            categorical_strategy,
            exclude_columns: Vec::new(),
            numerical_fill_value: 0.0,
            categorical_fill_value: default_categorical_fill(),
        }
    }

    /// Parses strategy names, rejecting anything outside the supported set.
    pub fn from_names(numerical: &str, categorical: &str) -> PipelineResult<Self> {
        Ok(Self::new(numerical.parse()?, categorical.parse()?))
    }

    pub fn with_exclude_columns(mut self, exclude_columns: Vec<String>) -> Self {
        self.exclude_columns = exclude_columns;
        self
    }
}

/// Fills missing values per column type with fitted values.
pub struct Imputer {
    pub config: ImputationConfig,
    /// Fitted fill values of numeric columns.
    pub numeric_fill: BTreeMap<String, f64>,
    /// Fitted fill values of categorical columns.
    pub categorical_fill: BTreeMap<String, String>,
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    fitted: bool,
}

impl Imputer {
    pub fn new(config: ImputationConfig) -> Self {
        Self {
            config,
            numeric_fill: BTreeMap::new(),
            categorical_fill: BTreeMap::new(),
            numeric_columns: Vec::new(),
            categorical_columns: Vec::new(),
            fitted: false,
        }
    }

    /// Numeric columns (after exclusions) seen by the last `fit`.
    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    /// Categorical columns (after exclusions) seen by the last `fit`.
    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    /// Partitions the columns by type and computes one fill value per column.
    pub async fn fit(&mut self, df: &DataFrame) -> PipelineResult<()> {
        self.numeric_columns.clear();
        self.categorical_columns.clear();
        for field in df.schema().fields() {
            let name = field.name();
            if self.config.exclude_columns.contains(name) {
                continue;
            }
            if is_numeric(field.data_type()) {
                self.numeric_columns.push(name.clone());
            } else if is_categorical(field.data_type()) {
                self.categorical_columns.push(name.clone());
            }
        }

        self.numeric_fill = if self.numeric_columns.is_empty() {
            BTreeMap::new()
        } else {
            self.fit_numeric(df).await?
        };
        self.categorical_fill = if self.categorical_columns.is_empty() {
            BTreeMap::new()
        } else {
            self.fit_categorical(df).await?
        };
        debug!(
            "Imputer fitted {} numeric and {} categorical columns",
            self.numeric_fill.len(),
            self.categorical_fill.len()
        );
        self.fitted = true;
        Ok(())
    }

    async fn fit_numeric(&self, df: &DataFrame) -> PipelineResult<BTreeMap<String, f64>> {
        let strategy = self.config.numerical_strategy;
        if strategy == NumericStrategy::Constant {
            return Ok(self
                .numeric_columns
                .iter()
                .map(|c| (c.clone(), self.config.numerical_fill_value))
                .collect());
        }
        let data = table::numeric_columns(df, &self.numeric_columns).await?;
        let mut fills = BTreeMap::new();
        for name in &self.numeric_columns {
            let values = data.get(name).map(|v| stats::observed(v)).unwrap_or_default();
            let fill = match strategy {
                NumericStrategy::Mean => stats::mean(&values),
                NumericStrategy::Median => stats::median(&values),
                NumericStrategy::MostFrequent => stats::most_frequent(&values),
                NumericStrategy::Constant => Some(self.config.numerical_fill_value),
            };
            match fill {
                Some(v) => {
                    fills.insert(name.clone(), v);
                }
                None => warn!(
                    "Column '{}' has no observed values, {} imputation skipped",
                    name, strategy
                ),
            }
        }
        Ok(fills)
    }

    async fn fit_categorical(&self, df: &DataFrame) -> PipelineResult<BTreeMap<String, String>> {
        let strategy = self.config.categorical_strategy;
        if strategy == CategoricalStrategy::Constant {
            return Ok(self
                .categorical_columns
                .iter()
                .map(|c| (c.clone(), self.config.categorical_fill_value.clone()))
                .collect());
        }
        let data = table::string_columns(df, &self.categorical_columns).await?;
        let mut fills = BTreeMap::new();
        for name in &self.categorical_columns {
            match data.get(name).and_then(|v| stats::most_frequent_str(v)) {
                Some(v) => {
                    fills.insert(name.clone(), v);
                }
                None => warn!(
                    "Column '{}' has no observed values, {} imputation skipped",
                    name, strategy
                ),
            }
        }
        Ok(fills)
    }

    /// Returns a new DataFrame where missing values of the fitted columns are replaced.
    pub fn transform(&self, df: DataFrame) -> PipelineResult<DataFrame> {
        if !self.fitted {
            return Err(PipelineError::FitNotCalled);
        }
        table::replace_columns(df, |name| {
            if let Some(v) = self.numeric_fill.get(name) {
                Some(coalesce_expr_for(name, lit(*v)))
            } else {
                self.categorical_fill
                    .get(name)
                    .map(|v| coalesce_expr_for(name, lit(v.clone())))
            }
        })
    }

    fn fitted_params(&self) -> Option<serde_json::Value> {
        if !self.fitted {
            return None;
        }
        Some(json!({
            "numerical_strategy": self.config.numerical_strategy.as_str(),
            "categorical_strategy": self.config.categorical_strategy.as_str(),
            "exclude_columns": self.config.exclude_columns,
            "numerical_columns": self.numeric_columns,
            "categorical_columns": self.categorical_columns,
            "numerical_fill_values": self.numeric_fill,
            "categorical_fill_values": self.categorical_fill,
        }))
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(Imputer, metadata);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_alias_maps_to_most_frequent() {
        assert_eq!(
            "mode".parse::<CategoricalStrategy>().unwrap(),
            CategoricalStrategy::MostFrequent
        );
        let config: ImputationConfig = serde_json::from_value(json!({
            "numerical_strategy": "median",
            "categorical_strategy": "mode",
        }))
        .unwrap();
        assert_eq!(config.categorical_strategy, CategoricalStrategy::MostFrequent);
        assert_eq!(config.categorical_fill_value, "missing_value");
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!(ImputationConfig::from_names("average", "mode").is_err());
        assert!(ImputationConfig::from_names("mean", "median").is_err());
        let result = serde_json::from_value::<ImputationConfig>(json!({
            "numerical_strategy": "interpolate",
            "categorical_strategy": "constant",
        }));
        assert!(result.is_err());
    }
}
