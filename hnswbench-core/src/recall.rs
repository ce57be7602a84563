/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{collections::HashSet, hash::Hash};

/// Compute recall@k for a single query: the fraction of the first `k` ground truth ids that
/// appear anywhere in `returned`.
///
/// The denominator is always `k`, not the number of ids returned. A backend that returns
/// fewer than `k` ids is penalized for the missing ones, and duplicate ids in `returned`
/// count once. The result lies in `[0, 1]`.
///
/// Returns `0.0` if `k` is zero.
pub fn recall_at_k<T>(groundtruth: &[T], returned: &[T], k: usize) -> f64
where
    T: Eq + Hash,
{
    if k == 0 {
        return 0.0;
    }

    let returned: HashSet<&T> = returned.iter().collect();
    let truth: HashSet<&T> = groundtruth.iter().take(k).collect();
    let hits = truth.intersection(&returned).count();
    hits as f64 / k as f64
}

/// Running totals for the recall and latency of one batch of queries.
#[derive(Debug, Default, Clone)]
pub(crate) struct Accumulator {
    total_recall: f64,
    latencies: Vec<std::time::Duration>,
}

impl Accumulator {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            total_recall: 0.0,
            latencies: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, recall: f64, latency: std::time::Duration) {
        self.total_recall += recall;
        self.latencies.push(latency);
    }

    pub(crate) fn len(&self) -> usize {
        self.latencies.len()
    }

    pub(crate) fn average_recall(&self) -> f64 {
        match self.len() {
            0 => 0.0,
            n => self.total_recall / n as f64,
        }
    }

    pub(crate) fn latencies_mut(&mut self) -> &mut [std::time::Duration] {
        &mut self.latencies
    }
}

///////////
// Tests //
///////////
