/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{fmt, num::NonZeroUsize, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The distance function a dataset's ground truth was computed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "L2")]
    L2,
    #[serde(rename = "COSINE")]
    Cosine,
    #[serde(rename = "IP")]
    InnerProduct,
}

impl Metric {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L2 => "L2",
            Self::Cosine => "COSINE",
            Self::InnerProduct => "IP",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown metric \"{0}\", expected one of L2, COSINE, IP")]
pub struct UnknownMetric(String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "L2" | "EUCLIDEAN" => Ok(Self::L2),
            "COSINE" => Ok(Self::Cosine),
            "IP" | "INNER_PRODUCT" => Ok(Self::InnerProduct),
            _ => Err(UnknownMetric(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("dataset dimension must be non-zero")]
    ZeroDimension,
    #[error("{kind} vector {index} has length {len} but the dataset dimension is {dim}")]
    RaggedVector {
        kind: &'static str,
        index: usize,
        len: usize,
        dim: usize,
    },
    #[error("dataset has no queries")]
    NoQueries,
    #[error("ground truth has {0} rows but there are {1} queries")]
    GroundTruthMismatch(usize, usize),
    #[error("the first ground truth row is empty, cannot infer k")]
    EmptyGroundTruth,
    #[error("ground truth row {index} has {len} ids but every row must have k = {k}")]
    RaggedGroundTruth { index: usize, len: usize, k: usize },
    #[error("{kind} has {len} entries but must align with {expected} {aligned_to}")]
    Misaligned {
        kind: &'static str,
        len: usize,
        expected: usize,
        aligned_to: &'static str,
    },
}

/// Everything a benchmark run measures against: base vectors, queries, their true nearest
/// neighbors, and the optional extras needed by filtered and ranged queries.
///
/// A `Dataset` is validated on construction and immutable afterwards. Readers for concrete
/// file formats live outside this crate.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    dim: NonZeroUsize,
    metric: Metric,
    data: Vec<Vec<f32>>,
    queries: Vec<Vec<f32>>,
    groundtruth: Vec<Vec<u64>>,
    // Aligned with `data`.
    metadata: Option<Vec<String>>,
    // Aligned with `queries`.
    keyword_filter: Option<Vec<String>>,
    distance: Option<Vec<f32>>,
}

impl Dataset {
    /// Construct a new dataset with no filter or range extras.
    ///
    /// Returns an error if `dim` is zero, any vector has a length other than `dim`, there
    /// are no queries, the ground truth does not have one row per query, or the ground truth
    /// rows are empty or differ in length (every query is scored against the same `k`).
    pub fn new(
        name: impl Into<String>,
        dim: usize,
        metric: Metric,
        data: Vec<Vec<f32>>,
        queries: Vec<Vec<f32>>,
        groundtruth: Vec<Vec<u64>>,
    ) -> Result<Self, DatasetError> {
        let dim = NonZeroUsize::new(dim).ok_or(DatasetError::ZeroDimension)?;
        check_lengths("data", &data, dim.get())?;
        check_lengths("query", &queries, dim.get())?;

        if queries.is_empty() {
            return Err(DatasetError::NoQueries);
        }
        if groundtruth.len() != queries.len() {
            return Err(DatasetError::GroundTruthMismatch(
                groundtruth.len(),
                queries.len(),
            ));
        }
        let k = groundtruth.first().map_or(0, |row| row.len());
        if k == 0 {
            return Err(DatasetError::EmptyGroundTruth);
        }
        if let Some(index) = groundtruth.iter().position(|row| row.len() != k) {
            return Err(DatasetError::RaggedGroundTruth {
                index,
                len: groundtruth[index].len(),
                k,
            });
        }

        Ok(Self {
            name: name.into(),
            dim,
            metric,
            data,
            queries,
            groundtruth,
            metadata: None,
            keyword_filter: None,
            distance: None,
        })
    }

    /// Attach per-vector metadata and the per-query keyword used by filtered queries.
    pub fn with_filters(
        mut self,
        metadata: Vec<String>,
        keyword_filter: Vec<String>,
    ) -> Result<Self, DatasetError> {
        check_aligned("metadata", metadata.len(), self.data.len(), "data vectors")?;
        check_aligned(
            "keyword_filter",
            keyword_filter.len(),
            self.queries.len(),
            "queries",
        )?;
        self.metadata = Some(metadata);
        self.keyword_filter = Some(keyword_filter);
        Ok(self)
    }

    /// Attach the per-query maximum distance used by ranged queries.
    pub fn with_distances(mut self, distance: Vec<f32>) -> Result<Self, DatasetError> {
        check_aligned("distance", distance.len(), self.queries.len(), "queries")?;
        self.distance = Some(distance);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dim(&self) -> NonZeroUsize {
        self.dim
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn data(&self) -> &[Vec<f32>] {
        &self.data
    }

    pub fn queries(&self) -> &[Vec<f32>] {
        &self.queries
    }

    pub fn groundtruth(&self) -> &[Vec<u64>] {
        &self.groundtruth
    }

    pub fn metadata(&self) -> Option<&[String]> {
        self.metadata.as_deref()
    }

    pub fn keyword_filter(&self) -> Option<&[String]> {
        self.keyword_filter.as_deref()
    }

    pub fn distance(&self) -> Option<&[f32]> {
        self.distance.as_deref()
    }

    pub fn num_queries(&self) -> usize {
        self.queries.len()
    }

    /// The number of neighbors requested per query: the width of the first ground truth
    /// row.
    pub fn k(&self) -> usize {
        self.groundtruth.first().map_or(0, |row| row.len())
    }
}

fn check_lengths(kind: &'static str, vectors: &[Vec<f32>], dim: usize) -> Result<(), DatasetError> {
    match vectors.iter().position(|v| v.len() != dim) {
        Some(index) => Err(DatasetError::RaggedVector {
            kind,
            index,
            len: vectors[index].len(),
            dim,
        }),
        None => Ok(()),
    }
}

fn check_aligned(
    kind: &'static str,
    len: usize,
    expected: usize,
    aligned_to: &'static str,
) -> Result<(), DatasetError> {
    if len == expected {
        Ok(())
    } else {
        Err(DatasetError::Misaligned {
            kind,
            len,
            expected,
            aligned_to,
        })
    }
}

///////////
// Tests //
///////////
