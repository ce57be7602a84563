/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::sync::Arc;

use tracing::info;

use crate::{
    backend::Backend,
    config::{IndexTiming, InsertConfig, QueryConfig, RunConfig},
    dataset::Dataset,
    params::{HnswConfig, SearchParameters},
};

/// Creates backends of one kind, ready to benchmark.
///
/// Each store implements this once. The factory is the only place that knows how to
/// connect to the store and how to express an [`HnswConfig`] in the store's own terms.
pub trait TaskFactory {
    type Backend: Backend;
    type Parameters: SearchParameters;

    /// The kind tag of the backends this factory creates.
    fn kind(&self) -> &str;

    /// The index timing actually used when `requested` is asked for.
    ///
    /// Stores that build their index on insert, or that cannot query without one, override
    /// this to substitute the timing they support.
    ///
    /// # Provided Implementation
    ///
    /// Returns `requested`.
    fn index_timing(&self, requested: IndexTiming) -> IndexTiming {
        requested
    }

    /// Connect to the store and create whatever schema or collection `dataset` needs.
    ///
    /// Returns the bound backend and the live parameter handle the query sweep will use to
    /// change `ef`.
    fn bootstrap(
        &self,
        dataset: &Dataset,
        config: &HnswConfig,
    ) -> anyhow::Result<(Self::Backend, Self::Parameters)>;
}

/// One backend bound to one dataset and one run configuration.
///
/// Consumed by [`crate::runner::run`]. The backend's connection lives exactly as long as
/// the task.
#[derive(Debug)]
pub struct Task<B, P> {
    backend: B,
    parameters: P,
    dataset: Arc<Dataset>,
    insert: InsertConfig,
    query: QueryConfig,
}

impl<B, P> Task<B, P>
where
    B: Backend,
    P: SearchParameters,
{
    /// Validate `config` against `dataset`, then bootstrap a backend through `factory`.
    ///
    /// Configuration errors are returned before the factory is called, so a bad request
    /// never reaches the store.
    pub fn new<F>(factory: &F, dataset: Arc<Dataset>, config: &RunConfig) -> anyhow::Result<Self>
    where
        F: TaskFactory<Backend = B, Parameters = P> + ?Sized,
    {
        config.validate_for(&dataset)?;

        let (mut insert, query) = config.split();
        let timing = factory.index_timing(insert.index_timing);
        if timing != insert.index_timing {
            info!(
                backend = factory.kind(),
                requested = %insert.index_timing,
                using = %timing,
                "index timing overridden"
            );
            insert.index_timing = timing;
        }

        let (backend, parameters) = factory.bootstrap(&dataset, &config.hnsw)?;
        info!(
            backend = backend.kind(),
            dataset = dataset.name(),
            vectors = dataset.data().len(),
            queries = dataset.num_queries(),
            "task created"
        );

        Ok(Self {
            backend,
            parameters,
            dataset,
            insert,
            query,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn parameters(&self) -> &P {
        &self.parameters
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn insert_config(&self) -> &InsertConfig {
        &self.insert
    }

    pub fn query_config(&self) -> &QueryConfig {
        &self.query
    }

    pub(crate) fn into_parts(self) -> (B, P, Arc<Dataset>, InsertConfig, QueryConfig) {
        (
            self.backend,
            self.parameters,
            self.dataset,
            self.insert,
            self.query,
        )
    }
}

///////////
// Tests //
///////////
