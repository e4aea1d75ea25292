//! # Tabular Pipeline
//!
//! A configuration-driven preprocessing pipeline for tabular data built on Apache DataFusion.
//!
//! A declarative step list (see [`config`]) is turned into an ordered [`pipeline::Pipeline`]
//! of stateful transformers by [`builder::build`]. Fitting the pipeline learns per-step state
//! (imputation values, scaling statistics, selected features) that is replayed unchanged when
//! the same pipeline transforms new data.
//!
//! ```rust,no_run
//! use tabular_pipeline::builder::build;
//! use tabular_pipeline::config::PipelineConfig;
//! # async fn run(df: datafusion::prelude::DataFrame) -> tabular_pipeline::exceptions::PipelineResult<()> {
//! let config = PipelineConfig::from_value(serde_json::json!({
//!     "preprocessing": {
//!         "drop_columns": ["PoolQC"],
//!         "scaling": { "strategy": "standard", "exclude_columns": ["Id"] },
//!         "pipeline": [{ "step": "drop_columns" }, { "step": "scaling" }]
//!     }
//! }))?;
//! let mut pipeline = build(&config)?;
//! let transformed = pipeline.fit(&df).await?;
//! let metadata = pipeline.metadata();
//! # let _ = (transformed, metadata);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod exceptions;
mod logging;
pub mod pipeline;
pub mod stats;
pub mod table;
pub mod transformers;
