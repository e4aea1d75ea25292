//! ## Feature Selection Transformers
//!
//! This module provides transformers that reduce the set of columns of a table.
//!
//! ### Available Transformers
//!
//! - [`DropColumns`]: Removes named columns; names that are not present are ignored.
//! - [`FeatureSelector`]: Keeps the columns that pass a statistical criterion relative to a
//!   numeric target column (absolute Pearson correlation, variance threshold, or normalized
//!   mutual information).
//!
//! ### Assumptions
//!
//! - The DataFrame is fully materialized (`collect()`) for computing statistics.
//! - Only numeric columns are scored. Non-numeric candidates are always retained.
//!
//! Each transformer returns a new DataFrame with the selected features.
//! Errors are returned as [`PipelineError`], and results are wrapped in [`PipelineResult`].

use crate::exceptions::{PipelineError, PipelineResult};
use crate::impl_transformer;
use crate::stats;
use crate::table::{self, column_names, is_numeric};
use datafusion::dataframe::DataFrame;
use datafusion_expr::{ident, Expr};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Removes the specified columns from the DataFrame.
///
/// Dropping is best-effort: names that are not present in the input are ignored.
pub struct DropColumns {
    pub columns: Vec<String>,
    n_features_in: Option<usize>,
}

impl DropColumns {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            n_features_in: None,
        }
    }

    /// Number of input columns seen by the last `fit`.
    pub fn n_features_in(&self) -> Option<usize> {
        self.n_features_in
    }

    pub async fn fit(&mut self, df: &DataFrame) -> PipelineResult<()> {
        self.n_features_in = Some(df.schema().fields().len());
        Ok(())
    }

    pub fn transform(&self, df: DataFrame) -> PipelineResult<DataFrame> {
        if !self.columns.iter().any(|c| table::has_column(&df, c)) {
            return Ok(df);
        }
        table::project_without(df, |name| self.columns.iter().any(|c| c == name))
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

/// Statistical criterion used by [`FeatureSelector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Absolute Pearson correlation with the target, kept when `>= threshold`.
    Correlation,
    /// Sample variance, kept when `> threshold`.
    VarianceThreshold,
    /// Mutual information with the target normalized by the best score, kept when `>= threshold`.
    #[serde(alias = "mutual_information")]
    MutualInfo,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::Correlation => "correlation",
            SelectionMethod::VarianceThreshold => "variance_threshold",
            SelectionMethod::MutualInfo => "mutual_info",
        }
    }

    /// Threshold used when the configuration does not set one.
    pub fn default_threshold(&self) -> f64 {
        match self {
            SelectionMethod::Correlation | SelectionMethod::MutualInfo => 0.5,
            SelectionMethod::VarianceThreshold => 0.0,
        }
    }

    fn needs_target_values(&self) -> bool {
        !matches!(self, SelectionMethod::VarianceThreshold)
    }
}

impl fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "correlation" => Ok(SelectionMethod::Correlation),
            "variance_threshold" => Ok(SelectionMethod::VarianceThreshold),
            "mutual_info" | "mutual_information" => Ok(SelectionMethod::MutualInfo),
            other => Err(PipelineError::InvalidParameter(format!(
                "Unsupported feature selection method '{}'",
                other
            ))),
        }
    }
}

fn default_n_neighbors() -> usize {
    3
}

/// Method-specific knobs of [`FeatureSelectionConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionParams {
    /// Defaults to [`SelectionMethod::default_threshold`].
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Neighbour count of the mutual information estimator.
    #[serde(default = "default_n_neighbors")]
    pub n_neighbors: usize,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            threshold: None,
            n_neighbors: default_n_neighbors(),
        }
    }
}

/// Configuration of a [`FeatureSelector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelectionConfig {
    pub method: SelectionMethod,
    #[serde(default)]
    pub params: SelectionParams,
    /// Without a target (or when it is absent from the table) every column is kept.
    #[serde(default)]
    pub target_column: Option<String>,
    /// Columns that are never scored and always kept.
    #[serde(default)]
    pub exclude_columns: Vec<String>,
}

impl FeatureSelectionConfig {
    pub fn new(method: SelectionMethod, target_column: Option<String>) -> Self {
        Self {
            method,
            params: SelectionParams::default(),
            target_column,
            exclude_columns: Vec::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.params.threshold = Some(threshold);
        self
    }

    pub fn with_exclude_columns(mut self, exclude_columns: Vec<String>) -> Self {
        self.exclude_columns = exclude_columns;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.params
            .threshold
            .unwrap_or_else(|| self.method.default_threshold())
    }
}

/// Keeps the columns that pass the configured statistical criterion against the target.
///
/// The selected set is: the passing numeric candidates, every non-numeric candidate, the target,
/// and the excluded columns, limited to columns present at fit time and kept in input order.
pub struct FeatureSelector {
    pub config: FeatureSelectionConfig,
    pub selected_features: Vec<String>,
    pub scores: BTreeMap<String, f64>,
    n_features_in: Option<usize>,
    fitted: bool,
}

impl FeatureSelector {
    pub fn new(config: FeatureSelectionConfig) -> Self {
        Self {
            config,
            selected_features: Vec::new(),
            scores: BTreeMap::new(),
            n_features_in: None,
            fitted: false,
        }
    }

    pub fn n_features_in(&self) -> Option<usize> {
        self.n_features_in
    }

    pub async fn fit(&mut self, df: &DataFrame) -> PipelineResult<()> {
        let columns = column_names(df);
        self.n_features_in = Some(columns.len());
        self.scores.clear();

        let target = match &self.config.target_column {
            Some(target) if columns.contains(target) => target.clone(),
            _ => {
                debug!("No target column available, keeping all {} columns", columns.len());
                self.selected_features = columns;
                self.fitted = true;
                return Ok(());
            }
        };

        let candidates: Vec<String> = columns
            .iter()
            .filter(|c| **c != target && !self.config.exclude_columns.contains(*c))
            .cloned()
            .collect();
        let (numeric, non_numeric): (Vec<String>, Vec<String>) =
            candidates.into_iter().partition(|c| {
                table::column_type(df, c).is_some_and(|dt| is_numeric(&dt))
            });

        let passing = if numeric.is_empty() {
            HashSet::new()
        } else {
            self.score_numeric(df, &target, &numeric).await?
        };

        self.selected_features = columns
            .iter()
            .filter(|c| {
                passing.contains(*c)
                    || non_numeric.contains(*c)
                    || **c == target
                    || self.config.exclude_columns.contains(*c)
            })
            .cloned()
            .collect();
        debug!(
            "Feature selection ({}) kept {} of {} columns",
            self.config.method,
            self.selected_features.len(),
            columns.len()
        );
        self.fitted = true;
        Ok(())
    }

    /// Scores the numeric candidates, stores their scores, and returns the passing ones.
    async fn score_numeric(
        &mut self,
        df: &DataFrame,
        target: &str,
        numeric: &[String],
    ) -> PipelineResult<HashSet<String>> {
        let method = self.config.method;
        let threshold = self.config.threshold();

        let mut names = numeric.to_vec();
        if method.needs_target_values() {
            let is_numeric_target =
                table::column_type(df, target).is_some_and(|dt| is_numeric(&dt));
            if !is_numeric_target {
                return Err(PipelineError::InvalidParameter(format!(
                    "Feature selection method '{}' requires a numeric target, '{}' is not numeric",
                    method, target
                )));
            }
            names.push(target.to_string());
        }
        // Target and candidates come from one collect so rows stay paired across partitions.
        let mut data = table::numeric_columns(df, &names).await?;
        let target_values = if method.needs_target_values() {
            data.remove(target).unwrap_or_default()
        } else {
            Vec::new()
        };

        if method == SelectionMethod::MutualInfo {
            let n_samples = target_values.len();
            if n_samples < self.config.params.n_neighbors {
                debug!(
                    "Only {} samples for {} neighbours, keeping all candidates",
                    n_samples, self.config.params.n_neighbors
                );
                return Ok(numeric.iter().cloned().collect());
            }
        }

        let n_neighbors = self.config.params.n_neighbors;
        let raw: Vec<(String, Option<f64>)> = numeric
            .par_iter()
            .map(|name| {
                let values = data.get(name).map(Vec::as_slice).unwrap_or(&[]);
                let score = match method {
                    SelectionMethod::Correlation => {
                        let (x, y) = stats::paired(values, &target_values);
                        stats::pearson(&x, &y).map(f64::abs)
                    }
                    SelectionMethod::VarianceThreshold => {
                        stats::variance(&stats::observed(values), 1)
                    }
                    SelectionMethod::MutualInfo => {
                        let (x, y) = stats::paired(values, &target_values);
                        stats::mutual_info_knn(&x, &y, n_neighbors)
                    }
                };
                (name.clone(), score)
            })
            .collect();

        let mut scores: HashMap<String, f64> = raw
            .into_iter()
            .filter_map(|(name, score)| score.map(|s| (name, s)))
            .collect();

        if method == SelectionMethod::MutualInfo {
            let max = scores.values().cloned().fold(0.0_f64, f64::max);
            if max > 0.0 {
                scores.values_mut().for_each(|s| *s /= max);
            }
        }

        let passing = scores
            .iter()
            .filter(|(_, score)| match method {
                SelectionMethod::VarianceThreshold => **score > threshold,
                SelectionMethod::Correlation | SelectionMethod::MutualInfo => **score >= threshold,
            })
            .map(|(name, _)| name.clone())
            .collect();
        self.scores = scores.into_iter().collect();
        Ok(passing)
    }

    pub fn transform(&self, df: DataFrame) -> PipelineResult<DataFrame> {
        if !self.fitted {
            return Err(PipelineError::FitNotCalled);
        }
        let keep: Vec<Expr> = self
            .selected_features
            .iter()
            .filter(|c| table::has_column(&df, c))
            .map(ident)
            .collect();
        if keep.is_empty() {
            return Err(PipelineError::InvalidParameter(
                "None of the selected features are present in the DataFrame.".to_string(),
            ));
        }
        df.select(keep).map_err(PipelineError::from)
    }

    fn fitted_params(&self) -> Option<serde_json::Value> {
        if !self.fitted {
            return None;
        }
        Some(json!({
            "method": self.config.method.as_str(),
            "threshold": self.config.threshold(),
            "target_column": self.config.target_column,
            "exclude_columns": self.config.exclude_columns,
            "selected_features": self.selected_features,
            "scores": self.scores,
        }))
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(DropColumns);
impl_transformer!(FeatureSelector, metadata);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_from_str() {
        assert_eq!(
            "variance_threshold".parse::<SelectionMethod>().unwrap(),
            SelectionMethod::VarianceThreshold
        );
        assert_eq!(
            "mutual_information".parse::<SelectionMethod>().unwrap(),
            SelectionMethod::MutualInfo
        );
        assert!("chi2".parse::<SelectionMethod>().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config: FeatureSelectionConfig = serde_json::from_value(json!({
            "method": "mutual_info",
            "target_column": "SalePrice"
        }))
        .unwrap();
        assert_eq!(config.params.n_neighbors, 3);
        assert_eq!(config.threshold(), 0.5);
        assert!(config.exclude_columns.is_empty());

        let variance = FeatureSelectionConfig::new(SelectionMethod::VarianceThreshold, None);
        assert_eq!(variance.threshold(), 0.0);
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let result = serde_json::from_value::<FeatureSelectionConfig>(json!({
            "method": "lasso",
        }));
        assert!(result.is_err());
    }
}
