//! # Categorical Encoding Transformers
//!
//! This module provides the **CategoricalMapper**, which replaces the values of categorical
//! columns with numeric codes taken from configured dictionaries (for example quality grades
//! `Ex`, `Gd`, `Fa` mapped to ordinal scores).
//!
//! Per column, missing values are first replaced with the configured `null_value` code, then the
//! values are translated through the mapping; values without a mapping entry also fall back to
//! `null_value`. Because the null fill happens first, the canonical rendering of `null_value`
//! (e.g. `"0"` for `0.0`) may itself be a mapping key. Numeric columns match numeric keys by
//! value, so a Float64 `1.0` is translated by the key `"1"`.

use crate::exceptions::{PipelineError, PipelineResult};
use crate::impl_transformer;
use crate::table;
use arrow::datatypes::DataType;
use datafusion::prelude::*;
use datafusion_expr::{cast, ident, lit, when, Expr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping of one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapping {
    /// Category value to numeric code.
    pub mapping: BTreeMap<String, f64>,
    /// Code used for missing and unmapped values.
    #[serde(default)]
    pub null_value: f64,
}

impl CategoryMapping {
    pub fn new(mapping: BTreeMap<String, f64>, null_value: f64) -> Self {
        Self {
            mapping,
            null_value,
        }
    }

    /// Code assigned to missing values: the null code itself goes through the mapping first.
    pub fn code_for_missing(&self) -> f64 {
        self.mapping
            .get(&render_code(self.null_value))
            .copied()
            .unwrap_or(self.null_value)
    }

    /// Numeric sources match numeric keys by value (`1.0` matches `"1"`); everything else is
    /// compared through its Utf8 rendering.
    fn case_expr(&self, name: &str, source_type: &DataType) -> PipelineResult<Expr> {
        let numeric_source = table::is_numeric(source_type);
        let text = cast(ident(name), DataType::Utf8);
        let mut builder = when(ident(name).is_null(), lit(self.code_for_missing()));
        for (category, code) in &self.mapping {
            let matches = match category.trim().parse::<f64>() {
                Ok(key) if numeric_source => cast(ident(name), DataType::Float64).eq(lit(key)),
                _ => text.clone().eq(lit(category.clone())),
            };
            builder = builder.when(matches, lit(*code));
        }
        builder
            .otherwise(lit(self.null_value))
            .map_err(PipelineError::from)
    }
}

/// Renders a code the way an integral configuration literal is written (`0.0` -> `"0"`).
fn render_code(code: f64) -> String {
    if code.fract() == 0.0 && code.abs() < 1e15 {
        format!("{}", code as i64)
    } else {
        code.to_string()
    }
}

/// Replaces categorical values with numeric codes from per-column dictionaries.
///
/// Columns that are configured but absent from the input are skipped.
pub struct CategoricalMapper {
    pub mappings: BTreeMap<String, CategoryMapping>,
    n_features_in: Option<usize>,
}

impl CategoricalMapper {
    pub fn new(mappings: BTreeMap<String, CategoryMapping>) -> Self {
        Self {
            mappings,
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

    /// Returns a new DataFrame where every configured column present in the input holds Float64 codes.
    pub fn transform(&self, df: DataFrame) -> PipelineResult<DataFrame> {
        let mut exprs: BTreeMap<&str, Expr> = BTreeMap::new();
        for (name, mapping) in &self.mappings {
            if let Some(source_type) = table::column_type(&df, name) {
                exprs.insert(name.as_str(), mapping.case_expr(name, &source_type)?);
            }
        }
        if exprs.is_empty() {
            return Ok(df);
        }
        table::replace_columns(df, |name| exprs.get(name).cloned())
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(CategoricalMapper);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_code() {
        assert_eq!(render_code(0.0), "0");
        assert_eq!(render_code(-3.0), "-3");
        assert_eq!(render_code(1.5), "1.5");
    }

    #[test]
    fn test_null_code_can_be_a_mapping_key() {
        let mapping = CategoryMapping::new(
            BTreeMap::from([("Ex".to_string(), 5.0), ("0".to_string(), 2.0)]),
            0.0,
        );
        assert_eq!(mapping.code_for_missing(), 2.0);

        let plain = CategoryMapping::new(BTreeMap::from([("Ex".to_string(), 5.0)]), -1.0);
        assert_eq!(plain.code_for_missing(), -1.0);
    }

    #[test]
    fn test_null_value_defaults_to_zero() {
        let mapping: CategoryMapping =
            serde_json::from_value(serde_json::json!({ "mapping": { "Ex": 1, "Fa": 0 } })).unwrap();
        assert_eq!(mapping.null_value, 0.0);
        assert_eq!(mapping.mapping.get("Ex"), Some(&1.0));
    }
}
