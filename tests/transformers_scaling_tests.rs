use std::sync::Arc;

use approx::assert_abs_diff_eq;
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;

use tabular_pipeline::exceptions::{PipelineError, PipelineResult};
use tabular_pipeline::pipeline::Transformer;
use tabular_pipeline::transformers::scaling_and_normalization::{
    Scaler, ScalingConfig, ScalingStrategy,
};

async fn create_dataframe() -> DataFrame {
    let schema = Arc::new(Schema::new(vec![
        Field::new("Id", DataType::Int64, false),
        Field::new("x", DataType::Float64, true),
        Field::new("constant", DataType::Float64, false),
        Field::new("label", DataType::Utf8, false),
    ]));
    let id: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5]));
    let x: ArrayRef = Arc::new(Float64Array::from(vec![
        Some(2.0),
        Some(4.0),
        Some(6.0),
        Some(8.0),
        Some(10.0),
    ]));
    let constant: ArrayRef = Arc::new(Float64Array::from(vec![7.0; 5]));
    let label: ArrayRef = Arc::new(StringArray::from(vec!["a", "b", "c", "d", "e"]));
    let batch = RecordBatch::try_new(schema.clone(), vec![id, x, constant, label]).unwrap();

    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    ctx.table("t").await.unwrap()
}

fn float_values(batches: &[RecordBatch], name: &str) -> Vec<f64> {
    let mut out = Vec::new();
    for batch in batches {
        let array = batch
            .column(batch.schema().index_of(name).unwrap())
            .as_any()
            .downcast_ref::<Float64Array>()
            .expect("Expected Float64Array");
        out.extend(array.iter().flatten());
    }
    out
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[tokio::test]
async fn test_standardization_zero_mean_unit_std() -> PipelineResult<()> {
    let df = create_dataframe().await;
    let mut scaler = Scaler::new(ScalingConfig::new(
        ScalingStrategy::Standard,
        vec!["Id".to_string()],
    ));
    scaler.fit(&df).await?;

    let batches = scaler.transform(df)?.collect().await?;

    let (mean, std) = mean_and_std(&float_values(&batches, "x"));
    assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(std, 1.0, epsilon = 1e-9);

    // Excluded column is unchanged, including its type.
    let batch = &batches[0];
    let id = batch
        .column(batch.schema().index_of("Id").unwrap())
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("Expected Int64Array");
    assert_eq!(id.values().to_vec(), vec![1, 2, 3, 4, 5]);
    Ok(())
}

#[tokio::test]
async fn test_constant_column_is_finite() -> PipelineResult<()> {
    let df = create_dataframe().await;
    let mut scaler = Scaler::new(ScalingConfig::default());
    scaler.fit(&df).await?;
    assert_eq!(scaler.params["constant"].scale, 1.0);

    let batches = scaler.transform(df)?.collect().await?;
    let constant = float_values(&batches, "constant");
    assert_eq!(constant.len(), 5);
    assert!(constant.iter().all(|v| v.is_finite() && *v == 0.0));
    Ok(())
}

#[tokio::test]
async fn test_no_numeric_columns_is_noop() -> PipelineResult<()> {
    let df = create_dataframe().await.select_columns(&["label"])?;
    let mut scaler = Scaler::new(ScalingConfig::default());
    scaler.fit(&df).await?;
    assert!(scaler.params.is_empty());

    let batches = scaler.transform(df)?.collect().await?;
    assert_eq!(batches[0].num_columns(), 1);
    Ok(())
}

#[tokio::test]
async fn test_scaler_requires_fit() {
    let df = create_dataframe().await;
    let scaler = Scaler::new(ScalingConfig::default());
    assert!(matches!(scaler.transform(df), Err(PipelineError::FitNotCalled)));
}

#[tokio::test]
async fn test_scaler_metadata() -> PipelineResult<()> {
    let df = create_dataframe().await;
    let mut scaler = Scaler::new(ScalingConfig::new(
        ScalingStrategy::Standard,
        vec!["Id".to_string()],
    ));
    Transformer::fit(&mut scaler, &df).await?;
    let metadata = Transformer::metadata(&scaler).expect("fitted scaler reports metadata");
    assert_eq!(metadata["strategy"], "standard");
    assert_eq!(metadata["columns"]["x"]["mean"], 6.0);
    assert!(metadata["columns"].get("Id").is_none());
    Ok(())
}
