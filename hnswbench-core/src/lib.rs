/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Orchestration for benchmarking HNSW search across vector stores.
//!
//! This crate does not search anything itself. It drives an opaque [`Backend`] through a
//! fixed measurement protocol and records what it observes:
//!
//! 1. A [`TaskFactory`] binds a backend to a [`Dataset`] and a [`RunConfig`], producing a
//!    [`Task`].
//! 2. [`run`] executes the task: the [`insert`] phase loads the data and builds the index in
//!    the configured [`IndexTiming`] order, the [`sweep`] issues every query for each
//!    requested [`QueryMode`] and each `ef`, and the backend's storage footprint is probed.
//! 3. The resulting [`RunResult`] is persisted with [`codec::save`] and can be reloaded
//!    later with [`codec::load`] without a live backend.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use hnswbench_core::{
//!     codec, run, Backend, Dataset, HnswConfig, HnswParameters, Metric, RunConfig, Task,
//!     TaskFactory,
//! };
//!
//! // A store that always answers with the first `k` ids.
//! struct FirstK;
//!
//! impl Backend for FirstK {
//!     fn kind(&self) -> &str {
//!         "first-k"
//!     }
//!     fn insert(&mut self, _: &[Vec<f32>], _: Option<&[String]>, _: u64) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//!     fn create_index(&mut self) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//!     fn query(&mut self, _: &[f32], k: usize) -> anyhow::Result<Vec<u64>> {
//!         Ok((0..k as u64).collect())
//!     }
//!     fn filtered_query(&mut self, q: &[f32], k: usize, _: &str) -> anyhow::Result<Vec<u64>> {
//!         self.query(q, k)
//!     }
//!     fn ranged_query(&mut self, q: &[f32], k: usize, _: f32) -> anyhow::Result<Vec<u64>> {
//!         self.query(q, k)
//!     }
//!     fn disk_storage(&mut self) -> anyhow::Result<f64> {
//!         Ok(0.0)
//!     }
//!     fn index_storage(&mut self) -> anyhow::Result<f64> {
//!         Ok(0.0)
//!     }
//! }
//!
//! struct Factory;
//!
//! impl TaskFactory for Factory {
//!     type Backend = FirstK;
//!     type Parameters = HnswParameters;
//!
//!     fn kind(&self) -> &str {
//!         "first-k"
//!     }
//!     fn bootstrap(
//!         &self,
//!         _: &Dataset,
//!         config: &HnswConfig,
//!     ) -> anyhow::Result<(FirstK, HnswParameters)> {
//!         Ok((FirstK, HnswParameters::new(config)))
//!     }
//! }
//!
//! let dataset = Dataset::new(
//!     "toy",
//!     1,
//!     Metric::L2,
//!     vec![vec![0.0], vec![1.0], vec![2.0]],
//!     vec![vec![0.1], vec![0.2]],
//!     vec![vec![0, 1], vec![0, 2]],
//! )?;
//!
//! let task = Task::new(&Factory, Arc::new(dataset), &RunConfig::default())?;
//! let result = run(task, &mut hnswbench_runner::output::Sink::new())?;
//!
//! let plain = &result.query_result.mode_results[0];
//! assert_eq!(plain.ef_results.len(), 4);
//! assert_eq!(plain.ef_results[0].avg_recall, 0.75);
//!
//! let decoded = codec::from_transport(&codec::to_transport(&result))?;
//! assert_eq!(decoded, result);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod dataset;
pub mod insert;
pub mod params;
pub mod recall;
pub mod result;
pub mod runner;
pub mod sweep;
pub mod task;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{Backend, Placeholder};
pub use codec::DecodeError;
pub use config::{ConfigError, IndexTiming, InsertConfig, QueryConfig, QueryMode, RunConfig};
pub use dataset::{Dataset, DatasetError, Metric};
pub use params::{HnswConfig, HnswParameters, ParameterSnapshot, SearchParameters};
pub use result::{EfResult, InsertResult, ModeResult, QueryResult, RunResult};
pub use runner::run;
pub use task::{Task, TaskFactory};
