//! ## Preprocessing Pipeline
//!
//! This module provides the core abstractions for fitting and replaying preprocessing steps.
//!
//! ### Overview
//!
//! - The [`Transformer`] trait defines the common interface of every preprocessing step,
//!   supporting both stateful (requiring fitting) and stateless transformations, and optional
//!   reporting of fitted parameters.
//! - The [`Pipeline`] struct chains named transformers. Fitting feeds each step the output of the
//!   previous (already fitted) step, and the fitted pipeline replays the same chain on new data.
//! - Macros [`crate::impl_transformer`] and [`crate::make_pipeline`] simplify the implementation
//!   of transformers and the creation of pipelines.

use crate::exceptions::{PipelineError, PipelineResult};
use async_trait::async_trait;
use datafusion::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

/// Trait for components used in the data transformation pipeline.
///
/// Every transformer must provide a `fit` method (which may collect data to compute parameters)
/// and a `transform` method (which updates the DataFrame's logical plan without triggering execution).
/// `transform` takes `&self`: fitted state is only ever written by `fit`.
#[async_trait]
pub trait Transformer {
    /// Fit the transformer given a DataFrame.
    ///
    /// # Arguments
    ///
    /// * `df` - The input DataFrame.
    ///
    /// # Returns
    ///
    /// * `PipelineResult<()>` - Returns Ok if successful, or an error otherwise.
    async fn fit(&mut self, df: &DataFrame) -> PipelineResult<()>;

    /// Transform the input DataFrame, returning a new DataFrame with the transformation applied.
    ///
    /// # Arguments
    ///
    /// * `df` - The input DataFrame.
    ///
    /// # Returns
    ///
    /// * `PipelineResult<DataFrame>` - The transformed DataFrame or an error if transformation fails.
    fn transform(&self, df: DataFrame) -> PipelineResult<DataFrame>;

    /// Returns true if the transformer is stateful (i.e. requires a call to fit before transform can be called).
    fn is_stateful(&self) -> bool;

    /// Fitted parameters exposed by this transformer, if it reports any.
    ///
    /// Returns `None` for transformers without reporting and for reporting transformers that
    /// have not been fitted yet.
    fn metadata(&self) -> Option<serde_json::Value> {
        None
    }
}

/// Macro to implement the [`Transformer`] trait for the library's transformers.
///
/// The type must already have inherent methods:
/// - `async fn fit(&mut self, &DataFrame) -> PipelineResult<()>`
/// - `fn transform(&self, DataFrame) -> PipelineResult<DataFrame>`
/// - `fn inherent_is_stateful(&self) -> bool`
///
/// With the `metadata` form, the type must also provide
/// `fn fitted_params(&self) -> Option<serde_json::Value>`.
///
/// # Example
///
/// ```rust,no_run
/// use tabular_pipeline::exceptions::PipelineResult;
/// use datafusion::prelude::DataFrame;
/// use tabular_pipeline::impl_transformer;
///
/// pub struct Passthrough;
///
/// impl Passthrough {
///     pub async fn fit(&mut self, _df: &DataFrame) -> PipelineResult<()> {
///         Ok(())
///     }
///
///     pub fn transform(&self, df: DataFrame) -> PipelineResult<DataFrame> {
///         Ok(df)
///     }
///
///     fn inherent_is_stateful(&self) -> bool {
///         false
///     }
/// }
///
/// impl_transformer!(Passthrough);
/// ```
#[macro_export]
macro_rules! impl_transformer {
    ($ty:ty) => {
        $crate::impl_transformer!(@impl $ty, {});
    };
    ($ty:ty, metadata) => {
        $crate::impl_transformer!(@impl $ty, {
            fn metadata(&self) -> Option<serde_json::Value> {
                <$ty>::fitted_params(self)
            }
        });
    };
    (@impl $ty:ty, { $($extra:tt)* }) => {
        #[async_trait::async_trait]
        impl $crate::pipeline::Transformer for $ty {
            async fn fit(
                &mut self,
                df: &datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::PipelineResult<()> {
                <$ty>::fit(self, df).await
            }
            fn transform(
                &self,
                df: datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::PipelineResult<datafusion::prelude::DataFrame> {
                <$ty>::transform(self, df)
            }
            fn is_stateful(&self) -> bool {
                <$ty>::inherent_is_stateful(self)
            }
            $($extra)*
        }
    };
}

/// A boxed transformer as stored in a [`Pipeline`].
pub type BoxedTransformer = Box<dyn Transformer + Send + Sync>;

/// A pipeline that chains a sequence of named transformers.
///
/// Each transformer's output (a new logical plan) is passed as input to the next transformer.
/// This design allows lazy chaining of transformations until a terminal action (like `collect`) is called.
pub struct Pipeline {
    steps: Vec<(String, BoxedTransformer)>,
}

impl Pipeline {
    /// Creates a new pipeline.
    ///
    /// # Arguments
    ///
    /// * `steps` - A vector of (name, transformer) pairs (each transformer is already boxed).
    pub fn new(steps: Vec<(String, BoxedTransformer)>) -> Self {
        Self { steps }
    }

    /// Fits each transformer in order and returns the output of the last one.
    ///
    /// Step `i` is fitted on the transformed output of steps `0..i`, so every step sees exactly the
    /// data it will see when the fitted pipeline is replayed with [`Pipeline::transform`].
    pub async fn fit(&mut self, df: &DataFrame) -> PipelineResult<DataFrame> {
        if self.steps.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }
        debug!("Fitting pipeline with {} steps", self.steps.len());
        let mut current_df = df.clone();
        for (name, step) in self.steps.iter_mut() {
            let start = Instant::now();
            step.fit(&current_df).await.map_err(|e| e.in_step(name))?;
            current_df = step.transform(current_df).map_err(|e| e.in_step(name))?;
            debug!("Step '{}' fitted in {:?}", name, start.elapsed());
        }
        debug!("Pipeline fitting complete");
        Ok(current_df)
    }

    /// Applies the `transform` method of each transformer (without fitting).
    ///
    /// Stateful steps that were never fitted fail with [`PipelineError::FitNotCalled`].
    pub fn transform(&self, df: DataFrame) -> PipelineResult<DataFrame> {
        if self.steps.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }
        debug!("Transforming data through {} steps", self.steps.len());
        let mut current_df = df;
        for (name, step) in self.steps.iter() {
            current_df = step.transform(current_df).map_err(|e| e.in_step(name))?;
        }
        Ok(current_df)
    }

    /// Convenience method to call `fit` and then return the final transformed DataFrame.
    pub async fn fit_transform(&mut self, df: &DataFrame) -> PipelineResult<DataFrame> {
        self.fit(df).await
    }

    /// Fitted parameters per step name, for the steps that report them.
    ///
    /// Computed on each call from the current step state. Steps without reporting, and reporting
    /// steps that are not fitted yet, are absent rather than present with an empty entry.
    pub fn metadata(&self) -> BTreeMap<String, serde_json::Value> {
        self.steps
            .iter()
            .filter_map(|(name, step)| step.metadata().map(|m| (name.clone(), m)))
            .collect()
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn steps(&self) -> &[(String, BoxedTransformer)] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Macro to simplify pipeline creation by automatically boxing transformers.
///
/// # Example
///
/// ```rust,no_run
/// use tabular_pipeline::make_pipeline;
/// use tabular_pipeline::transformers::feature_selection::DropColumns;
///
/// // Create a pipeline with a single step.
/// let pipeline = make_pipeline!(
///     ("drop_columns", DropColumns::new(vec!["PoolQC".to_string()])),
/// );
/// ```
#[macro_export]
macro_rules! make_pipeline {
    ($(($name:expr, $transformer:expr)),+ $(,)?) => {
        {
            let steps: Vec<(String, $crate::pipeline::BoxedTransformer)> = vec![
                $(
                    ($name.to_string(), Box::new($transformer)),
                )+
            ];
            $crate::pipeline::Pipeline::new(steps)
        }
    };
}
