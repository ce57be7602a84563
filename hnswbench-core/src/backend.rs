/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The capability set every vector store must provide to be benchmarked.

/// A vector store under test.
///
/// Implementations own their connection or session and translate each call into whatever
/// the store needs. The orchestration never inspects a concrete backend; it only calls
/// through this trait and measures how long the calls take.
///
/// Errors returned from any method abort the run and reach the caller unchanged.
pub trait Backend {
    /// A stable tag naming the kind of store, used to label results.
    fn kind(&self) -> &str;

    /// Insert `vectors` with consecutive ids starting at `start_id`.
    ///
    /// `metadata`, when provided, has one entry per vector.
    fn insert(
        &mut self,
        vectors: &[Vec<f32>],
        metadata: Option<&[String]>,
        start_id: u64,
    ) -> anyhow::Result<()>;

    /// Build the HNSW index over whatever has been inserted so far (or over data inserted
    /// later, for stores that index incrementally).
    fn create_index(&mut self) -> anyhow::Result<()>;

    /// Warm up before the first query, for example by loading the index into memory.
    ///
    /// # Provided Implementation
    ///
    /// Does nothing.
    fn load(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Return the ids of the `k` nearest neighbors of `query`, nearest first.
    fn query(&mut self, query: &[f32], k: usize) -> anyhow::Result<Vec<u64>>;

    /// Like [`Self::query`], restricted to vectors whose metadata equals `keyword`.
    fn filtered_query(&mut self, query: &[f32], k: usize, keyword: &str)
        -> anyhow::Result<Vec<u64>>;

    /// Return the ids of at most `k` vectors within `max_distance` of `query`.
    fn ranged_query(
        &mut self,
        query: &[f32],
        k: usize,
        max_distance: f32,
    ) -> anyhow::Result<Vec<u64>>;

    /// Total on-disk footprint of the store in megabytes.
    fn disk_storage(&mut self) -> anyhow::Result<f64>;

    /// Footprint of the HNSW index alone in megabytes.
    fn index_storage(&mut self) -> anyhow::Result<f64>;
}

/// Stand-in for a backend that is no longer reachable.
///
/// Decoded results carry one of these so that they can be inspected and plotted without a
/// live store. Every capability returns an error naming the backend kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    kind: String,
}

impl Placeholder {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    fn unavailable<T>(&self, operation: &str) -> anyhow::Result<T> {
        Err(anyhow::anyhow!(
            "{} is unavailable: \"{}\" is a placeholder for a recorded result",
            operation,
            self.kind
        ))
    }
}

impl Backend for Placeholder {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn insert(&mut self, _: &[Vec<f32>], _: Option<&[String]>, _: u64) -> anyhow::Result<()> {
        self.unavailable("insert")
    }

    fn create_index(&mut self) -> anyhow::Result<()> {
        self.unavailable("create_index")
    }

    fn load(&mut self) -> anyhow::Result<()> {
        self.unavailable("load")
    }

    fn query(&mut self, _: &[f32], _: usize) -> anyhow::Result<Vec<u64>> {
        self.unavailable("query")
    }

    fn filtered_query(&mut self, _: &[f32], _: usize, _: &str) -> anyhow::Result<Vec<u64>> {
        self.unavailable("filtered_query")
    }

    fn ranged_query(&mut self, _: &[f32], _: usize, _: f32) -> anyhow::Result<Vec<u64>> {
        self.unavailable("ranged_query")
    }

    fn disk_storage(&mut self) -> anyhow::Result<f64> {
        self.unavailable("disk_storage")
    }

    fn index_storage(&mut self) -> anyhow::Result<f64> {
        self.unavailable("index_storage")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder() {
        let mut backend = Placeholder::new("redis");
        assert_eq!(backend.kind(), "redis");

        let err = backend.query(&[0.0], 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "query is unavailable: \"redis\" is a placeholder for a recorded result"
        );
        assert!(backend.insert(&[], None, 0).is_err());
        assert!(backend.create_index().is_err());
        assert!(backend.load().is_err());
        assert!(backend.filtered_query(&[0.0], 1, "a").is_err());
        assert!(backend.ranged_query(&[0.0], 1, 1.0).is_err());
        assert!(backend.disk_storage().is_err());
        assert!(backend.index_storage().is_err());
    }
}
