/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! In-memory backends for exercising the orchestration without a live store.
//!
//! * [`Recording`]: answers queries from a script and records every call it receives,
//!   along with the `ef` in effect at the time.
//! * [`Exhaustive`]: a brute-force store that answers every query shape exactly.
//!
//! Both come with a [`TaskFactory`] so that they can be driven through a full run.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use crate::{
    backend::Backend,
    config::IndexTiming,
    dataset::{Dataset, Metric},
    params::{HnswConfig, HnswParameters},
    task::TaskFactory,
};

const MB: f64 = 1024.0 * 1024.0;

//////////
// Call //
//////////

/// A backend call as seen by [`Recording`].
///
/// Queries carry the `ef` the backend would have searched with.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Insert {
        len: usize,
        metadata: bool,
        start_id: u64,
    },
    CreateIndex,
    Load,
    Query {
        ef: usize,
        k: usize,
    },
    FilteredQuery {
        ef: usize,
        k: usize,
        keyword: String,
    },
    RangedQuery {
        ef: usize,
        k: usize,
        max_distance: f32,
    },
    DiskStorage,
    IndexStorage,
}

///////////////
// Recording //
///////////////

/// A scripted backend that records how it is driven.
///
/// Clones share one call log, so a test can keep a clone while the original is moved into
/// a task and inspect the log after the run.
///
/// Queries are answered from a list of responses taken in rotation: the `i`th query of the
/// whole run receives `responses[i % responses.len()]`. With no responses configured, each
/// query receives the ids `0..k`.
#[derive(Debug, Clone)]
pub struct Recording {
    kind: String,
    parameters: HnswParameters,
    calls: Arc<Mutex<Vec<Call>>>,
    responses: Vec<Vec<u64>>,
    queries: usize,
    insert_delay: Duration,
    index_delay: Duration,
    query_delay: Duration,
    fail_create_index: Option<String>,
    fail_query: Option<(usize, String)>,
    index_storage_mb: f64,
    disk_storage_mb: f64,
}

impl Recording {
    pub fn new(kind: impl Into<String>) -> Self {
        Self::with_parameters(kind, HnswParameters::new(&HnswConfig::default()))
    }

    /// Create a backend that reads `ef` from `parameters` on every query.
    pub fn with_parameters(kind: impl Into<String>, parameters: HnswParameters) -> Self {
        Self {
            kind: kind.into(),
            parameters,
            calls: Arc::new(Mutex::new(Vec::new())),
            responses: Vec::new(),
            queries: 0,
            insert_delay: Duration::ZERO,
            index_delay: Duration::ZERO,
            query_delay: Duration::ZERO,
            fail_create_index: None,
            fail_query: None,
            index_storage_mb: 1.5,
            disk_storage_mb: 4.0,
        }
    }

    pub fn with_responses(mut self, responses: Vec<Vec<u64>>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = delay;
        self
    }

    pub fn with_index_delay(mut self, delay: Duration) -> Self {
        self.index_delay = delay;
        self
    }

    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    pub fn with_storage(mut self, index_storage_mb: f64, disk_storage_mb: f64) -> Self {
        self.index_storage_mb = index_storage_mb;
        self.disk_storage_mb = disk_storage_mb;
        self
    }

    /// Make `create_index` fail with `message`.
    pub fn fail_create_index(mut self, message: impl Into<String>) -> Self {
        self.fail_create_index = Some(message.into());
        self
    }

    /// Make the query with zero-based position `nth` (counted across the whole run) fail
    /// with `message`.
    pub fn fail_query(mut self, nth: usize, message: impl Into<String>) -> Self {
        self.fail_query = Some((nth, message.into()));
        self
    }

    /// The shared parameters this backend reads `ef` from.
    pub fn parameters(&self) -> &HnswParameters {
        &self.parameters
    }

    /// A copy of every call received so far, by this backend or any clone of it.
    pub fn calls(&self) -> Vec<Call> {
        self.log().clone()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: Call) {
        self.log().push(call);
    }

    fn answer(&mut self, call: Call, k: usize) -> anyhow::Result<Vec<u64>> {
        self.record(call);
        let position = self.queries;
        self.queries += 1;

        if let Some((nth, message)) = &self.fail_query {
            if *nth == position {
                anyhow::bail!("{}", message);
            }
        }
        if !self.query_delay.is_zero() {
            std::thread::sleep(self.query_delay);
        }

        if self.responses.is_empty() {
            Ok((0..k as u64).collect())
        } else {
            Ok(self.responses[position % self.responses.len()].clone())
        }
    }
}

impl Backend for Recording {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn insert(
        &mut self,
        vectors: &[Vec<f32>],
        metadata: Option<&[String]>,
        start_id: u64,
    ) -> anyhow::Result<()> {
        self.record(Call::Insert {
            len: vectors.len(),
            metadata: metadata.is_some(),
            start_id,
        });
        if !self.insert_delay.is_zero() {
            std::thread::sleep(self.insert_delay);
        }
        Ok(())
    }

    fn create_index(&mut self) -> anyhow::Result<()> {
        self.record(Call::CreateIndex);
        if let Some(message) = &self.fail_create_index {
            anyhow::bail!("{}", message);
        }
        if !self.index_delay.is_zero() {
            std::thread::sleep(self.index_delay);
        }
        Ok(())
    }

    fn load(&mut self) -> anyhow::Result<()> {
        self.record(Call::Load);
        Ok(())
    }

    fn query(&mut self, _query: &[f32], k: usize) -> anyhow::Result<Vec<u64>> {
        let ef = self.parameters.ef();
        self.answer(Call::Query { ef, k }, k)
    }

    fn filtered_query(
        &mut self,
        _query: &[f32],
        k: usize,
        keyword: &str,
    ) -> anyhow::Result<Vec<u64>> {
        let ef = self.parameters.ef();
        let call = Call::FilteredQuery {
            ef,
            k,
            keyword: keyword.to_string(),
        };
        self.answer(call, k)
    }

    fn ranged_query(
        &mut self,
        _query: &[f32],
        k: usize,
        max_distance: f32,
    ) -> anyhow::Result<Vec<u64>> {
        let ef = self.parameters.ef();
        let call = Call::RangedQuery {
            ef,
            k,
            max_distance,
        };
        self.answer(call, k)
    }

    fn disk_storage(&mut self) -> anyhow::Result<f64> {
        self.record(Call::DiskStorage);
        Ok(self.disk_storage_mb)
    }

    fn index_storage(&mut self) -> anyhow::Result<f64> {
        self.record(Call::IndexStorage);
        Ok(self.index_storage_mb)
    }
}

/// Builds [`Recording`] backends from a template.
///
/// Every bootstrap clones the template, sharing its call log, and binds the clone to fresh
/// parameters built from the run configuration.
#[derive(Debug, Clone)]
pub struct RecordingFactory {
    template: Recording,
    forced_timing: Option<IndexTiming>,
}

impl RecordingFactory {
    pub fn new(template: Recording) -> Self {
        Self {
            template,
            forced_timing: None,
        }
    }

    /// Behave like a store that only supports one index timing.
    pub fn force_timing(mut self, timing: IndexTiming) -> Self {
        self.forced_timing = Some(timing);
        self
    }
}

impl TaskFactory for RecordingFactory {
    type Backend = Recording;
    type Parameters = HnswParameters;

    fn kind(&self) -> &str {
        &self.template.kind
    }

    fn index_timing(&self, requested: IndexTiming) -> IndexTiming {
        self.forced_timing.unwrap_or(requested)
    }

    fn bootstrap(
        &self,
        _dataset: &Dataset,
        config: &HnswConfig,
    ) -> anyhow::Result<(Recording, HnswParameters)> {
        let parameters = HnswParameters::new(config);
        let mut backend = self.template.clone();
        backend.parameters = parameters.clone();
        Ok((backend, parameters))
    }
}

////////////////
// Exhaustive //
////////////////

/// A brute-force store: every query scans every inserted vector.
///
/// Answers are exact regardless of `ef`, which makes it a convenient reference for
/// checking recall arithmetic on real data.
#[derive(Debug, Clone)]
pub struct Exhaustive {
    metric: Metric,
    vectors: HashMap<u64, (Vec<f32>, Option<String>)>,
    indexed: bool,
}

impl Exhaustive {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            vectors: HashMap::new(),
            indexed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot = || std::iter::zip(a, b).map(|(x, y)| x * y).sum::<f32>();
        match self.metric {
            Metric::L2 => std::iter::zip(a, b).map(|(x, y)| (x - y) * (x - y)).sum(),
            Metric::InnerProduct => -dot(),
            Metric::Cosine => {
                let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
                let denominator = norm(a) * norm(b);
                if denominator == 0.0 {
                    1.0
                } else {
                    1.0 - dot() / denominator
                }
            }
        }
    }

    // Candidates sorted nearest first, ties broken by id.
    fn scan<F>(&self, query: &[f32], mut keep: F) -> Vec<(u64, f32)>
    where
        F: FnMut(&Option<String>, f32) -> bool,
    {
        let mut candidates: Vec<(u64, f32)> = self
            .vectors
            .iter()
            .filter_map(|(&id, (v, meta))| {
                let d = self.distance(query, v);
                keep(meta, d).then_some((id, d))
            })
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        candidates
    }

    fn top_k(candidates: Vec<(u64, f32)>, k: usize) -> Vec<u64> {
        candidates.into_iter().take(k).map(|(id, _)| id).collect()
    }

    fn bytes(&self) -> usize {
        self.vectors
            .values()
            .map(|(v, meta)| {
                std::mem::size_of::<u64>()
                    + std::mem::size_of_val(v.as_slice())
                    + meta.as_ref().map_or(0, String::len)
            })
            .sum()
    }
}

impl Backend for Exhaustive {
    fn kind(&self) -> &str {
        "exhaustive"
    }

    fn insert(
        &mut self,
        vectors: &[Vec<f32>],
        metadata: Option<&[String]>,
        start_id: u64,
    ) -> anyhow::Result<()> {
        if let Some(metadata) = metadata {
            if metadata.len() != vectors.len() {
                anyhow::bail!(
                    "got {} metadata entries for {} vectors",
                    metadata.len(),
                    vectors.len()
                );
            }
        }
        for (i, v) in vectors.iter().enumerate() {
            let meta = metadata.map(|m| m[i].clone());
            self.vectors.insert(start_id + i as u64, (v.clone(), meta));
        }
        Ok(())
    }

    fn create_index(&mut self) -> anyhow::Result<()> {
        self.indexed = true;
        Ok(())
    }

    fn query(&mut self, query: &[f32], k: usize) -> anyhow::Result<Vec<u64>> {
        Ok(Self::top_k(self.scan(query, |_, _| true), k))
    }

    fn filtered_query(
        &mut self,
        query: &[f32],
        k: usize,
        keyword: &str,
    ) -> anyhow::Result<Vec<u64>> {
        let candidates = self.scan(query, |meta, _| meta.as_deref() == Some(keyword));
        Ok(Self::top_k(candidates, k))
    }

    fn ranged_query(
        &mut self,
        query: &[f32],
        k: usize,
        max_distance: f32,
    ) -> anyhow::Result<Vec<u64>> {
        let candidates = self.scan(query, |_, d| d <= max_distance);
        Ok(Self::top_k(candidates, k))
    }

    fn disk_storage(&mut self) -> anyhow::Result<f64> {
        Ok(self.bytes() as f64 / MB)
    }

    fn index_storage(&mut self) -> anyhow::Result<f64> {
        Ok(if self.indexed {
            (self.vectors.len() * std::mem::size_of::<u64>()) as f64 / MB
        } else {
            0.0
        })
    }
}

/// Builds [`Exhaustive`] backends for the dataset's metric.
///
/// A brute-force store has nothing to build ahead of time, so every run is turned into
/// [`IndexTiming::PostIndex`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveFactory;

impl TaskFactory for ExhaustiveFactory {
    type Backend = Exhaustive;
    type Parameters = HnswParameters;

    fn kind(&self) -> &str {
        "exhaustive"
    }

    fn index_timing(&self, _requested: IndexTiming) -> IndexTiming {
        IndexTiming::PostIndex
    }

    fn bootstrap(
        &self,
        dataset: &Dataset,
        config: &HnswConfig,
    ) -> anyhow::Result<(Exhaustive, HnswParameters)> {
        Ok((Exhaustive::new(dataset.metric()), HnswParameters::new(config)))
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_script() {
        let mut backend = Recording::new("mock")
            .with_responses(vec![vec![1], vec![2]])
            .fail_query(3, "boom");

        assert_eq!(backend.query(&[0.0], 1).unwrap(), vec![1]);
        assert_eq!(backend.query(&[0.0], 1).unwrap(), vec![2]);
        assert_eq!(backend.query(&[0.0], 1).unwrap(), vec![1]);
        assert_eq!(backend.query(&[0.0], 1).unwrap_err().to_string(), "boom");
        assert_eq!(backend.calls().len(), 4);

        let mut backend = Recording::new("mock");
        assert_eq!(backend.query(&[0.0], 3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_exhaustive_l2() {
        let mut backend = Exhaustive::new(Metric::L2);
        assert!(backend.is_empty());
        backend
            .insert(
                &[vec![0.0, 0.0], vec![3.0, 0.0], vec![1.0, 0.0], vec![0.0, 2.0]],
                Some(&["a".into(), "b".into(), "b".into(), "a".into()]),
                10,
            )
            .unwrap();
        assert_eq!(backend.len(), 4);

        assert_eq!(backend.query(&[0.0, 0.0], 2).unwrap(), vec![10, 12]);
        assert_eq!(
            backend.filtered_query(&[0.0, 0.0], 2, "b").unwrap(),
            vec![12, 11]
        );
        // Squared distances: 0, 9, 1, 4.
        assert_eq!(
            backend.ranged_query(&[0.0, 0.0], 10, 4.0).unwrap(),
            vec![10, 12, 13]
        );
        assert_eq!(backend.ranged_query(&[0.0, 0.0], 1, 4.0).unwrap(), vec![10]);
    }

    #[test]
    fn test_exhaustive_similarity_metrics() {
        let vectors = [vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, 2.0]];

        let mut ip = Exhaustive::new(Metric::InnerProduct);
        ip.insert(&vectors, None, 0).unwrap();
        assert_eq!(ip.query(&[1.0, 0.0], 3).unwrap(), vec![2, 0, 1]);

        let mut cosine = Exhaustive::new(Metric::Cosine);
        cosine.insert(&vectors, None, 0).unwrap();
        assert_eq!(cosine.query(&[1.0, 0.0], 3).unwrap(), vec![0, 2, 1]);
    }

    #[test]
    fn test_exhaustive_storage() {
        let mut backend = Exhaustive::new(Metric::L2);
        backend.insert(&[vec![0.0; 4]], None, 0).unwrap();
        assert_eq!(backend.index_storage().unwrap(), 0.0);
        assert!(!backend.is_indexed());

        backend.create_index().unwrap();
        assert!(backend.is_indexed());
        assert_eq!(backend.index_storage().unwrap(), 8.0 / MB);
        assert_eq!(backend.disk_storage().unwrap(), 24.0 / MB);

        let err = backend
            .insert(&[vec![0.0; 4]], Some(&[]), 1)
            .unwrap_err();
        assert!(err.to_string().contains("metadata entries"));
    }
}
