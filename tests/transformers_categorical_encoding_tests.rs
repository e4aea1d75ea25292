use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;

use tabular_pipeline::exceptions::PipelineResult;
use tabular_pipeline::transformers::categorical_encoding::{CategoricalMapper, CategoryMapping};

async fn create_dataframe() -> DataFrame {
    let schema = Arc::new(Schema::new(vec![
        Field::new("FireplaceQu", DataType::Utf8, true),
        Field::new("Rooms", DataType::Int64, true),
    ]));
    let quality: ArrayRef = Arc::new(StringArray::from(vec![
        Some("Ex"),
        None,
        Some("Fa"),
        Some("Po"),
    ]));
    let rooms: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), Some(2), None, Some(3)]));
    let batch = RecordBatch::try_new(schema.clone(), vec![quality, rooms]).unwrap();

    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    ctx.table("t").await.unwrap()
}

fn mapping(entries: &[(&str, f64)], null_value: f64) -> CategoryMapping {
    CategoryMapping::new(
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        null_value,
    )
}

fn float_column(batches: &[RecordBatch], name: &str) -> Vec<Option<f64>> {
    let mut out = Vec::new();
    for batch in batches {
        let array = batch
            .column(batch.schema().index_of(name).unwrap())
            .as_any()
            .downcast_ref::<Float64Array>()
            .expect("Expected Float64Array");
        out.extend(array.iter());
    }
    out
}

#[tokio::test]
async fn test_mapping_with_null_and_unknown_values() -> PipelineResult<()> {
    let df = create_dataframe().await;
    let mapper = CategoricalMapper::new(BTreeMap::from([(
        "FireplaceQu".to_string(),
        mapping(&[("Ex", 1.0), ("Fa", 0.0)], -1.0),
    )]));
    let batches = mapper.transform(df)?.collect().await?;

    // Null and unmapped ("Po") values both take the null code.
    assert_eq!(
        float_column(&batches, "FireplaceQu"),
        vec![Some(1.0), Some(-1.0), Some(0.0), Some(-1.0)]
    );
    Ok(())
}

#[tokio::test]
async fn test_null_code_is_mapped_first() -> PipelineResult<()> {
    let df = create_dataframe().await;
    let mapper = CategoricalMapper::new(BTreeMap::from([(
        "FireplaceQu".to_string(),
        mapping(&[("Ex", 5.0), ("0", 2.0)], 0.0),
    )]));
    let batches = mapper.transform(df)?.collect().await?;

    assert_eq!(
        float_column(&batches, "FireplaceQu"),
        vec![Some(5.0), Some(2.0), Some(0.0), Some(0.0)]
    );
    Ok(())
}

#[tokio::test]
async fn test_numeric_source_maps_through_string_keys() -> PipelineResult<()> {
    let df = create_dataframe().await;
    let mapper = CategoricalMapper::new(BTreeMap::from([(
        "Rooms".to_string(),
        mapping(&[("1", 10.0), ("3", 30.0)], 0.0),
    )]));
    let batches = mapper.transform(df)?.collect().await?;

    assert_eq!(
        float_column(&batches, "Rooms"),
        vec![Some(10.0), Some(0.0), Some(0.0), Some(30.0)]
    );
    Ok(())
}

#[tokio::test]
async fn test_absent_column_is_skipped() -> PipelineResult<()> {
    let df = create_dataframe().await;
    let mut mapper = CategoricalMapper::new(BTreeMap::from([(
        "PoolQC".to_string(),
        mapping(&[("Ex", 1.0)], 0.0),
    )]));
    mapper.fit(&df).await?;
    assert_eq!(mapper.n_features_in(), Some(2));

    let batches = mapper.transform(df)?.collect().await?;
    assert_eq!(batches[0].num_columns(), 2);
    assert_eq!(batches[0].schema().field(0).data_type(), &DataType::Utf8);
    Ok(())
}

#[tokio::test]
async fn test_float_source_matches_integral_keys_by_value() -> PipelineResult<()> {
    let schema = Arc::new(Schema::new(vec![Field::new(
        "OverallQual",
        DataType::Float64,
        true,
    )]));
    let quality: ArrayRef = Arc::new(Float64Array::from(vec![
        Some(1.0),
        Some(2.5),
        None,
        Some(3.0),
    ]));
    let batch = RecordBatch::try_new(schema.clone(), vec![quality]).unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    let df = ctx.table("t").await?;

    let mapper = CategoricalMapper::new(BTreeMap::from([(
        "OverallQual".to_string(),
        mapping(&[("1", 10.0), ("2.5", 25.0)], 0.0),
    )]));
    let batches = mapper.transform(df)?.collect().await?;

    // 1.0 renders as "1.0" in Utf8 but still matches the key "1".
    assert_eq!(
        float_column(&batches, "OverallQual"),
        vec![Some(10.0), Some(25.0), Some(0.0), Some(0.0)]
    );
    Ok(())
}
