/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Loading a dataset into a backend and building its index.

use std::time::Duration;

use hnswbench_runner::{timed, utils::AsSeconds};
use tracing::info;

use crate::{
    backend::Backend,
    config::{ConfigError, IndexTiming, InsertConfig, QueryMode},
    dataset::Dataset,
    result::InsertResult,
};

/// Sequences the bulk insert and index build according to an [`IndexTiming`].
///
/// Each phase is timed on its own. The reported total is the sum of both, so results for
/// [`IndexTiming::PreIndex`] and [`IndexTiming::PostIndex`] sit on the same "time until
/// queryable" axis.
#[derive(Debug)]
pub struct InsertOrchestrator<'a, B: ?Sized> {
    backend: &'a mut B,
    timing: IndexTiming,
    vectors: &'a [Vec<f32>],
    metadata: Option<&'a [String]>,
}

impl<'a, B> InsertOrchestrator<'a, B>
where
    B: Backend + ?Sized,
{
    /// Prepare to load `dataset` into `backend`.
    ///
    /// Per-vector metadata is only passed to the backend when `config` requests
    /// [`QueryMode::Filtered`], so that stores charging for metadata storage are not
    /// penalized in runs that never filter. Returns an error if filtering is requested but
    /// the dataset has no metadata.
    pub fn new(
        backend: &'a mut B,
        config: &InsertConfig,
        dataset: &'a Dataset,
    ) -> Result<Self, ConfigError> {
        let metadata = if config.sends_metadata() {
            match dataset.metadata() {
                Some(metadata) => Some(metadata),
                None => {
                    return Err(ConfigError::MissingDatasetField {
                        mode: QueryMode::Filtered,
                        field: "metadata",
                    })
                }
            }
        } else {
            None
        };

        Ok(Self {
            backend,
            timing: config.index_timing,
            vectors: dataset.data(),
            metadata,
        })
    }

    pub fn timing(&self) -> IndexTiming {
        self.timing
    }

    /// Run both phases in the configured order.
    ///
    /// A backend failure in either phase aborts immediately. Nothing is rolled back.
    pub fn run(self) -> anyhow::Result<InsertResult> {
        let Self {
            backend,
            timing,
            vectors,
            metadata,
        } = self;

        let (insert_time, index_time) = match timing {
            IndexTiming::PreIndex => {
                let index_time = create_index(backend)?;
                (insert(backend, vectors, metadata)?, index_time)
            }
            IndexTiming::PostIndex => {
                let insert_time = insert(backend, vectors, metadata)?;
                (insert_time, create_index(backend)?)
            }
            IndexTiming::NoIndex => (insert(backend, vectors, metadata)?, Duration::ZERO),
        };

        Ok(InsertResult {
            elapsed_seconds: (insert_time + index_time).as_seconds(),
            insert_seconds: insert_time.as_seconds(),
            index_seconds: index_time.as_seconds(),
        })
    }
}

fn insert<B>(
    backend: &mut B,
    vectors: &[Vec<f32>],
    metadata: Option<&[String]>,
) -> anyhow::Result<Duration>
where
    B: Backend + ?Sized,
{
    let (elapsed, result) = timed!(backend.insert(vectors, metadata, 0));
    result?;
    info!(
        vectors = vectors.len(),
        with_metadata = metadata.is_some(),
        seconds = elapsed.as_seconds(),
        "insert finished"
    );
    Ok(elapsed)
}

fn create_index<B>(backend: &mut B) -> anyhow::Result<Duration>
where
    B: Backend + ?Sized,
{
    let (elapsed, result) = timed!(backend.create_index());
    result?;
    info!(seconds = elapsed.as_seconds(), "index build finished");
    Ok(elapsed)
}

///////////
// Tests //
///////////
