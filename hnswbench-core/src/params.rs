/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! HNSW construction and search parameters.
//!
//! [`HnswConfig`] is the user-facing description of the parameter space. Backends turn it
//! into a live [`SearchParameters`] implementation whose `ef` can be changed between query
//! batches. [`HnswParameters`] is the ready-made implementation for backends that read `ef`
//! from shared state on every query.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ConfigError;

/// The tunable construction parameters and the list of search-time `ef` values to sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum out-degree of each graph node.
    #[serde(rename = "M", default = "HnswConfig::default_m")]
    pub m: usize,
    /// Candidate list size used while building the graph.
    #[serde(default = "HnswConfig::default_ef_construction")]
    pub ef_construction: usize,
    /// Search-time candidate list sizes, swept in the given order.
    #[serde(default = "HnswConfig::default_ef_search")]
    pub ef_search: Vec<usize>,
}

impl HnswConfig {
    const fn default_m() -> usize {
        24
    }

    const fn default_ef_construction() -> usize {
        200
    }

    fn default_ef_search() -> Vec<usize> {
        vec![120, 200, 400, 800]
    }

    /// Ensure every parameter is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.m == 0 {
            return Err(ConfigError::ZeroParameter("M"));
        }
        if self.ef_construction == 0 {
            return Err(ConfigError::ZeroParameter("ef_construction"));
        }
        if self.ef_search.is_empty() {
            return Err(ConfigError::EmptyEfSearch);
        }
        if self.ef_search.contains(&0) {
            return Err(ConfigError::ZeroParameter("ef_search"));
        }
        Ok(())
    }

}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: Self::default_m(),
            ef_construction: Self::default_ef_construction(),
            ef_search: Self::default_ef_search(),
        }
    }
}

/// The live search-parameter state of a bound backend.
///
/// The query sweep calls [`Self::set_search_ef`] before each batch. Implementations must
/// make the new value visible to the backend before the next query it receives.
pub trait SearchParameters {
    /// Parameters the index was (or will be) built with.
    fn construction_params(&self) -> Map<String, Value>;

    /// Parameters currently in effect for queries.
    fn search_params(&self) -> Map<String, Value>;

    fn set_search_ef(&mut self, ef: usize) -> anyhow::Result<()>;
}

/// A [`SearchParameters`] whose `ef` lives in shared state.
///
/// Clones share the same `ef`. A backend keeps one clone and reads [`Self::ef`] on every
/// query while the sweep owns the other.
#[derive(Debug, Clone)]
pub struct HnswParameters {
    m: usize,
    ef_construction: usize,
    ef: Arc<AtomicUsize>,
}

impl HnswParameters {
    /// Create parameters from `config`. The initial `ef` is the first swept value.
    pub fn new(config: &HnswConfig) -> Self {
        let ef = config.ef_search.first().copied().unwrap_or(0);
        Self {
            m: config.m,
            ef_construction: config.ef_construction,
            ef: Arc::new(AtomicUsize::new(ef)),
        }
    }

    /// The `ef` the next query should run with.
    pub fn ef(&self) -> usize {
        // Sweep mutation and query issuance are strictly sequential, but the backend may
        // sit on another thread.
        self.ef.load(Ordering::Acquire)
    }
}

impl SearchParameters for HnswParameters {
    fn construction_params(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("M".into(), self.m.into());
        map.insert("ef_construction".into(), self.ef_construction.into());
        map
    }

    fn search_params(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("ef".into(), self.ef().into());
        map
    }

    fn set_search_ef(&mut self, ef: usize) -> anyhow::Result<()> {
        self.ef.store(ef, Ordering::Release);
        Ok(())
    }
}

/// The recorded parameters of a finished run.
///
/// This is what a decoded result carries in place of live backend parameters. Changing
/// `ef` on a snapshot does nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSnapshot {
    pub construction: Map<String, Value>,
    pub search: Map<String, Value>,
}

impl ParameterSnapshot {
    /// Capture the current state of `params`.
    pub fn capture<P>(params: &P) -> Self
    where
        P: SearchParameters + ?Sized,
    {
        Self {
            construction: params.construction_params(),
            search: params.search_params(),
        }
    }
}

impl SearchParameters for ParameterSnapshot {
    fn construction_params(&self) -> Map<String, Value> {
        self.construction.clone()
    }

    fn search_params(&self) -> Map<String, Value> {
        self.search.clone()
    }

    fn set_search_ef(&mut self, _ef: usize) -> anyhow::Result<()> {
        Ok(())
    }
}

///////////
// Tests //
///////////
