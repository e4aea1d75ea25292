//! ## Outlier Removal
//!
//! This module removes rows whose values fall outside user-defined bounds.
//!
//! - [`remove_outliers`]: drops rows violating per-column bounds.
//! - [`OutlierFilter`]: the same operation behind the [`Transformer`](crate::pipeline::Transformer)
//!   interface.
//!
//! Removing rows changes the row count, so it must run on the full table **before** features
//! and target are split apart; otherwise feature rows and target values lose their alignment.
//! For this reason the pipeline builder never places outlier removal inside a pipeline.
//!
//! Bounds use the configuration's naming: `greaterthan` is the upper bound (rows with larger
//! values are removed) and `lessthan` is the lower bound (rows with smaller values are removed).
//! Rows with a missing value in a bounded column are removed as well. Columns absent from the
//! table are skipped.

use crate::exceptions::{PipelineError, PipelineResult};
use crate::impl_transformer;
use crate::table;
use datafusion::prelude::*;
use datafusion_expr::{ident, lit, Expr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Bounds for one column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    /// Rows with values above this bound are removed.
    #[serde(default)]
    pub greaterthan: Option<f64>,
    /// Rows with values below this bound are removed.
    #[serde(default)]
    pub lessthan: Option<f64>,
}

impl OutlierBounds {
    pub fn new(lessthan: Option<f64>, greaterthan: Option<f64>) -> Self {
        Self {
            greaterthan,
            lessthan,
        }
    }

    fn keep_predicate(&self, name: &str) -> Option<Expr> {
        let upper = self.greaterthan.map(|u| ident(name).lt_eq(lit(u)));
        let lower = self.lessthan.map(|l| ident(name).gt_eq(lit(l)));
        match (upper, lower) {
            (Some(u), Some(l)) => Some(u.and(l)),
            (Some(p), None) | (None, Some(p)) => Some(p),
            (None, None) => None,
        }
    }
}

/// Returns a DataFrame without the rows that violate any of the bounds.
pub fn remove_outliers(
    df: DataFrame,
    bounds: &BTreeMap<String, OutlierBounds>,
) -> PipelineResult<DataFrame> {
    let predicate = bounds
        .iter()
        .filter(|(name, _)| {
            let present = table::has_column(&df, name);
            if !present {
                debug!("Outlier bounds for missing column '{}' skipped", name);
            }
            present
        })
        .filter_map(|(name, b)| b.keep_predicate(name))
        .reduce(|acc, expr| acc.and(expr));
    match predicate {
        Some(predicate) => df.filter(predicate).map_err(PipelineError::from),
        None => Ok(df),
    }
}

/// Removes rows with values outside per-column bounds.
pub struct OutlierFilter {
    pub bounds: BTreeMap<String, OutlierBounds>,
}

impl OutlierFilter {
    pub fn new(bounds: BTreeMap<String, OutlierBounds>) -> Self {
        Self { bounds }
    }

    /// This transformer is stateless, so fit does nothing.
    pub async fn fit(&mut self, _df: &DataFrame) -> PipelineResult<()> {
        Ok(())
    }

    pub fn transform(&self, df: DataFrame) -> PipelineResult<DataFrame> {
        remove_outliers(df, &self.bounds)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(OutlierFilter);
