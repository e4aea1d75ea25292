//! ## Table Helpers
//!
//! The table type of this library is a DataFusion [`DataFrame`]. This module holds the small
//! amount of glue the transformers share: column-kind detection on the schema and helpers that
//! execute a projection and materialize columns as plain Rust vectors for computing statistics.

use crate::exceptions::{PipelineError, PipelineResult};
use arrow::array::{Array, Float64Array, StringArray};
use arrow::datatypes::DataType;
use datafusion::dataframe::DataFrame;
use datafusion_expr::{cast, ident, Expr};
use std::collections::HashMap;

/// Returns true for integer, float and decimal columns.
pub fn is_numeric(dt: &DataType) -> bool {
    dt.is_numeric()
}

/// Returns true for string columns.
pub fn is_categorical(dt: &DataType) -> bool {
    matches!(dt, DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View)
}

/// Column names of the DataFrame in schema order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.schema().fields().iter().any(|f| f.name() == name)
}

/// Returns the data type of the named column, if present.
pub fn column_type(df: &DataFrame, name: &str) -> Option<DataType> {
    df.schema()
        .fields()
        .iter()
        .find(|f| f.name() == name)
        .map(|f| f.data_type().clone())
}

/// Builds a projection keeping every column for which `exclude` returns false.
pub(crate) fn project_without<F>(df: DataFrame, exclude: F) -> PipelineResult<DataFrame>
where
    F: Fn(&str) -> bool,
{
    let keep: Vec<Expr> = df
        .schema()
        .fields()
        .iter()
        .filter(|f| !exclude(f.name().as_str()))
        .map(|f| ident(f.name()))
        .collect();
    if keep.is_empty() {
        return Err(PipelineError::InvalidParameter(
            "The projection would result in an empty DataFrame.".to_string(),
        ));
    }
    df.select(keep).map_err(PipelineError::from)
}

/// Builds a projection that replaces the named columns with new expressions and keeps the others.
pub(crate) fn replace_columns<F>(df: DataFrame, replacement: F) -> PipelineResult<DataFrame>
where
    F: Fn(&str) -> Option<Expr>,
{
    let exprs: Vec<Expr> = df
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            match replacement(name.as_str()) {
                Some(expr) => expr.alias(name),
                None => ident(name),
            }
        })
        .collect();
    df.select(exprs).map_err(PipelineError::from)
}

fn ensure_columns(df: &DataFrame, names: &[String]) -> PipelineResult<()> {
    for name in names {
        if !has_column(df, name) {
            return Err(PipelineError::MissingColumn(format!(
                "Column '{}' not found in DataFrame",
                name
            )));
        }
    }
    Ok(())
}

/// Materializes the named columns cast to Float64. Nulls become `None`.
///
/// All columns come from a single projection and `collect`, so index `i` is the same row in
/// every returned vector.
pub async fn numeric_columns(
    df: &DataFrame,
    names: &[String],
) -> PipelineResult<HashMap<String, Vec<Option<f64>>>> {
    let mut out: HashMap<String, Vec<Option<f64>>> =
        names.iter().map(|n| (n.clone(), Vec::new())).collect();
    if names.is_empty() {
        return Ok(out);
    }
    ensure_columns(df, names)?;
    let exprs: Vec<Expr> = names
        .iter()
        .map(|n| cast(ident(n), DataType::Float64).alias(n))
        .collect();
    let batches = df.clone().select(exprs)?.collect().await?;
    for batch in &batches {
        for (i, name) in names.iter().enumerate() {
            let array = batch
                .column(i)
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    PipelineError::InvalidParameter(format!(
                        "Expected Float64 array for column {}",
                        name
                    ))
                })?;
            if let Some(values) = out.get_mut(name) {
                values.extend(array.iter());
            }
        }
    }
    Ok(out)
}

/// Materializes the named columns cast to Utf8.
pub async fn string_columns(
    df: &DataFrame,
    names: &[String],
) -> PipelineResult<HashMap<String, Vec<Option<String>>>> {
    let mut out: HashMap<String, Vec<Option<String>>> =
        names.iter().map(|n| (n.clone(), Vec::new())).collect();
    if names.is_empty() {
        return Ok(out);
    }
    ensure_columns(df, names)?;
    let exprs: Vec<Expr> = names
        .iter()
        .map(|n| cast(ident(n), DataType::Utf8).alias(n))
        .collect();
    let batches = df.clone().select(exprs)?.collect().await?;
    for batch in &batches {
        for (i, name) in names.iter().enumerate() {
            let array = batch
                .column(i)
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| {
                    PipelineError::InvalidParameter(format!(
                        "Expected Utf8 array for column {}",
                        name
                    ))
                })?;
            if let Some(values) = out.get_mut(name) {
                values.extend((0..array.len()).map(|row| {
                    (!array.is_null(row)).then(|| array.value(row).to_string())
                }));
            }
        }
    }
    Ok(out)
}

/// Counts the rows of the DataFrame.
pub async fn row_count(df: &DataFrame) -> PipelineResult<usize> {
    df.clone().count().await.map_err(PipelineError::from)
}
