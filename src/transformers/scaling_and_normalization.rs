//! ## Scaling Transformers
//!
//! This module provides the **Scaler**, which standardizes numeric columns to zero mean and unit
//! variance: `(x - mean) / std` with the population standard deviation learned during `fit`.
//!
//! A column whose standard deviation is zero (or numerically negligible) keeps a scale of 1.0, so
//! it is only centered and never divided by zero. Scaled columns are Float64; nulls stay null.

use crate::exceptions::{PipelineError, PipelineResult};
use crate::impl_transformer;
use crate::stats;
use crate::table::{self, is_numeric};
use approx::abs_diff_eq;
use arrow::datatypes::DataType;
use datafusion::prelude::*;
use datafusion_expr::{cast, ident, lit};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// Scaling strategy. Only standardization is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingStrategy {
    #[default]
    #[serde(alias = "standardization", alias = "standard_scaler")]
    Standard,
}

impl ScalingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingStrategy::Standard => "standard",
        }
    }
}

impl FromStr for ScalingStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" | "standardization" | "standard_scaler" => Ok(ScalingStrategy::Standard),
            other => Err(PipelineError::InvalidParameter(format!(
                "Unsupported scaling strategy '{}'",
                other
            ))),
        }
    }
}

/// Configuration of a [`Scaler`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScalingConfig {
    #[serde(default)]
    pub strategy: ScalingStrategy,
    #[serde(default)]
    pub exclude_columns: Vec<String>,
}

impl ScalingConfig {
    pub fn new(strategy: ScalingStrategy, exclude_columns: Vec<String>) -> Self {
        Self {
            strategy,
            exclude_columns,
        }
    }
}

/// Fitted statistics of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnScale {
    pub mean: f64,
    /// Divisor applied after centering; 1.0 for degenerate columns.
    pub scale: f64,
}

/// Standardizes numeric, non-excluded columns.
pub struct Scaler {
    pub config: ScalingConfig,
    pub params: BTreeMap<String, ColumnScale>,
    fitted: bool,
}

impl Scaler {
    pub fn new(config: ScalingConfig) -> Self {
        Self {
            config,
            params: BTreeMap::new(),
            fitted: false,
        }
    }

    /// Computes mean and population standard deviation of every numeric, non-excluded column.
    pub async fn fit(&mut self, df: &DataFrame) -> PipelineResult<()> {
        let columns: Vec<String> = df
            .schema()
            .fields()
            .iter()
            .filter(|f| is_numeric(f.data_type()))
            .map(|f| f.name().to_string())
            .filter(|name| !self.config.exclude_columns.contains(name))
            .collect();
        self.params.clear();
        if columns.is_empty() {
            debug!("Scaler found no numeric columns, scaling is a no-op");
            self.fitted = true;
            return Ok(());
        }
        let data = table::numeric_columns(df, &columns).await?;
        for name in &columns {
            let values = data.get(name).map(|v| stats::observed(v)).unwrap_or_default();
            let Some(mean) = stats::mean(&values) else {
                debug!("Column '{}' has no observed values, not scaled", name);
                continue;
            };
            let std = stats::variance(&values, 0).map(f64::sqrt).unwrap_or(0.0);
            let scale = if !std.is_finite()
                || abs_diff_eq!(std, 0.0, epsilon = 1e-12 * mean.abs().max(1.0))
            {
                1.0
            } else {
                std
            };
            self.params.insert(name.clone(), ColumnScale { mean, scale });
        }
        self.fitted = true;
        Ok(())
    }

    /// Returns a new DataFrame with the fitted columns standardized.
    pub fn transform(&self, df: DataFrame) -> PipelineResult<DataFrame> {
        if !self.fitted {
            return Err(PipelineError::FitNotCalled);
        }
        if self.params.is_empty() {
            return Ok(df);
        }
        table::replace_columns(df, |name| {
            self.params.get(name).map(|p| {
                (cast(ident(name), DataType::Float64) - lit(p.mean)) / lit(p.scale)
            })
        })
    }

    fn fitted_params(&self) -> Option<serde_json::Value> {
        if !self.fitted {
            return None;
        }
        Some(json!({
            "strategy": self.config.strategy.as_str(),
            "exclude_columns": self.config.exclude_columns,
            "columns": self.params,
        }))
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(Scaler, metadata);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_aliases() {
        for name in ["standard", "standardization", "standard_scaler"] {
            assert_eq!(name.parse::<ScalingStrategy>().unwrap(), ScalingStrategy::Standard);
            let parsed: ScalingStrategy = serde_json::from_value(json!(name)).unwrap();
            assert_eq!(parsed, ScalingStrategy::Standard);
        }
        assert!("minmax".parse::<ScalingStrategy>().is_err());
    }

    #[test]
    fn test_unfitted_scaler_reports_nothing() {
        let scaler = Scaler::new(ScalingConfig::default());
        assert!(scaler.fitted_params().is_none());
    }
}
