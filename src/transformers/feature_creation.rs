//! ## Transformers for creating new features
//!
//! This module provides the **FeatureEngineer**, which derives new columns from existing ones.
//! One configuration groups four kinds of derived features, applied in this order:
//!
//! - **Polynomial features:** the source raised to each configured degree, named
//!   `{column}_squared`, `{column}_cubed` or `{column}_pow{degree}`.
//! - **Binary indicators:** a 0/1 Int64 column per comparison condition.
//! - **Log transforms:** `ln(1 + x)` of the source, named `{column}_log`.
//! - **Interactions:** the elementwise product of several columns under a given name.
//!
//! A derived column replaces an existing column of the same name, and later features can use
//! the output of earlier ones. A feature whose source column is missing is skipped on its own.

use crate::exceptions::{PipelineError, PipelineResult};
use crate::impl_transformer;
use crate::table;
use arrow::datatypes::DataType;
use datafusion::prelude::*;
use datafusion_expr::{cast, ident, lit, when, Expr};
use datafusion_functions::math;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Wrapper function wrapping math's power UDF.
fn power_expr(e: Expr, p: f64) -> Expr {
    math::power().call(vec![e, lit(p)])
}

/// Wrapper function wrapping math's natural logarithm UDF.
fn ln_expr(e: Expr) -> Expr {
    math::ln().call(vec![e])
}

fn as_float(name: &str) -> Expr {
    cast(ident(name), DataType::Float64)
}

/// Powers of one source column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialFeature {
    pub column: String,
    pub degrees: Vec<i32>,
}

impl PolynomialFeature {
    /// Name of the column holding `column ^ degree`.
    pub fn output_name(&self, degree: i32) -> String {
        match degree {
            2 => format!("{}_squared", self.column),
            3 => format!("{}_cubed", self.column),
            d => format!("{}_pow{}", self.column, d),
        }
    }
}

/// Comparison operator of a binary indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
}

impl ComparisonOperator {
    fn apply(&self, left: Expr, right: Expr) -> Expr {
        match self {
            ComparisonOperator::Gt => left.gt(right),
            ComparisonOperator::GtEq => left.gt_eq(right),
            ComparisonOperator::Lt => left.lt(right),
            ComparisonOperator::LtEq => left.lt_eq(right),
            ComparisonOperator::Eq => left.eq(right),
            ComparisonOperator::NotEq => left.not_eq(right),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ComparisonOperator::Gt => ">",
            ComparisonOperator::GtEq => ">=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::LtEq => "<=",
            ComparisonOperator::Eq => "==",
            ComparisonOperator::NotEq => "!=",
        };
        f.write_str(symbol)
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub operator: ComparisonOperator,
    pub value: ConditionValue,
}

impl Condition {
    /// Boolean expression of the condition; a null source only satisfies `!=`.
    fn predicate(&self) -> Expr {
        let (left, right) = match &self.value {
            ConditionValue::Number(v) => (as_float(&self.column), lit(*v)),
            ConditionValue::Text(v) => (cast(ident(&self.column), DataType::Utf8), lit(v.clone())),
        };
        let predicate = self.operator.apply(left, right);
        if self.operator == ComparisonOperator::NotEq {
            ident(&self.column).is_null().or(predicate)
        } else {
            predicate
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryIndicator {
    pub name: String,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub columns: Vec<String>,
    pub name: String,
}

/// Configuration of a [`FeatureEngineer`]. Every group is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureEngineeringConfig {
    #[serde(default)]
    pub polynomial_features: Vec<PolynomialFeature>,
    #[serde(default)]
    pub binary_indicators: Vec<BinaryIndicator>,
    #[serde(default)]
    pub log_transforms: Vec<String>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

/// Adds polynomial, indicator, log and interaction features.
pub struct FeatureEngineer {
    pub config: FeatureEngineeringConfig,
    n_features_in: Option<usize>,
}

impl FeatureEngineer {
    pub fn new(config: FeatureEngineeringConfig) -> Self {
        Self {
            config,
            n_features_in: None,
        }
    }

    pub fn n_features_in(&self) -> Option<usize> {
        self.n_features_in
    }

    /// This transformer is stateless; fit only records the input width.
    pub async fn fit(&mut self, df: &DataFrame) -> PipelineResult<()> {
        self.n_features_in = Some(df.schema().fields().len());
        Ok(())
    }

    /// Returns a new DataFrame with the derived features added.
    pub fn transform(&self, df: DataFrame) -> PipelineResult<DataFrame> {
        let mut df = df;

        for poly in &self.config.polynomial_features {
            if !table::has_column(&df, &poly.column) {
                debug!("Polynomial source column '{}' not found, skipped", poly.column);
                continue;
            }
            for degree in &poly.degrees {
                let expr = power_expr(as_float(&poly.column), f64::from(*degree));
                df = df.with_column(&poly.output_name(*degree), expr)?;
            }
        }

        for indicator in &self.config.binary_indicators {
            if !table::has_column(&df, &indicator.condition.column) {
                debug!(
                    "Indicator '{}' source column '{}' not found, skipped",
                    indicator.name, indicator.condition.column
                );
                continue;
            }
            let expr = when(indicator.condition.predicate(), lit(1_i64))
                .otherwise(lit(0_i64))
                .map_err(PipelineError::from)?;
            df = df.with_column(&indicator.name, expr)?;
        }

        for column in &self.config.log_transforms {
            if !table::has_column(&df, column) {
                debug!("Log transform source column '{}' not found, skipped", column);
                continue;
            }
            let expr = ln_expr(lit(1.0_f64) + as_float(column));
            df = df.with_column(&format!("{}_log", column), expr)?;
        }

        for interaction in &self.config.interactions {
            if let Some(missing) = interaction
                .columns
                .iter()
                .find(|c| !table::has_column(&df, c))
            {
                debug!(
                    "Interaction '{}' source column '{}' not found, skipped",
                    interaction.name, missing
                );
                continue;
            }
            let Some(expr) = interaction
                .columns
                .iter()
                .map(|c| as_float(c))
                .reduce(|acc, e| acc * e)
            else {
                debug!("Interaction '{}' has no columns, skipped", interaction.name);
                continue;
            };
            df = df.with_column(&interaction.name, expr)?;
        }

        Ok(df)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(FeatureEngineer);
