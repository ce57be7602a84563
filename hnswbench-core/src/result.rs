/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The record a finished run leaves behind.
//!
//! All times are in seconds and all storage figures in megabytes. Values are assembled by
//! the runner and not modified afterwards; see [`crate::codec`] for the persisted form.

use std::fmt;

use hnswbench_runner::utils::fmt::Table;

use crate::{backend::Placeholder, config::QueryMode, params::ParameterSnapshot};

//////////////////
// InsertResult //
//////////////////

/// Cost of making the dataset queryable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertResult {
    /// Wall-clock total of the insert and index phases, whichever order they ran in.
    pub elapsed_seconds: f64,
    pub insert_seconds: f64,
    /// Zero when no index was built.
    pub index_seconds: f64,
}

impl fmt::Display for InsertResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Insert + Index: {:.3}s (insert {:.3}s, index {:.3}s)",
            self.elapsed_seconds, self.insert_seconds, self.index_seconds
        )
    }
}

//////////////
// EfResult //
//////////////

/// Aggregate measurements for one pass over all queries at a single `ef`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfResult {
    pub ef: usize,
    /// Mean recall@k over all queries.
    pub avg_recall: f64,
    /// Sum of per-query latencies divided by the number of queries.
    pub avg_query_latency: f64,
    pub p99_query_latency: f64,
    /// `num_queries / total_elapsed`.
    pub queries_per_second: f64,
    /// Wall-clock time around the whole batch.
    pub total_elapsed: f64,
    pub num_queries: usize,
    pub k: usize,
}

/// Render `seconds` in microseconds with one decimal place.
fn micros(seconds: f64) -> String {
    format!("{:.1}us", seconds * 1e6)
}

////////////////
// ModeResult //
////////////////

/// The sweep over every `ef` for one query mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeResult {
    pub mode: QueryMode,
    /// In sweep order.
    pub ef_results: Vec<EfResult>,
}

impl fmt::Display for ModeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Query Mode: {}", self.mode)?;
        if self.ef_results.is_empty() {
            return writeln!(f, "(no results)");
        }

        let header = [
            "ef",
            "k",
            "Recall",
            "Avg Latency",
            "p99 Latency",
            "QPS",
            "Batch Time",
        ];
        let mut table = Table::new(header, self.ef_results.len());
        for (i, r) in self.ef_results.iter().enumerate() {
            let mut row = table.row(i);
            row.insert(r.ef, 0);
            row.insert(r.k, 1);
            row.insert(format!("{:.5}", r.avg_recall), 2);
            row.insert(micros(r.avg_query_latency), 3);
            row.insert(micros(r.p99_query_latency), 4);
            row.insert(format!("{:.1}", r.queries_per_second), 5);
            row.insert(format!("{:.3}s", r.total_elapsed), 6);
        }
        write!(f, "{}", table)
    }
}

/////////////////
// QueryResult //
/////////////////

/// One [`ModeResult`] per requested mode, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub mode_results: Vec<ModeResult>,
}

impl QueryResult {
    /// Find the results for `mode`, if it was measured.
    pub fn mode(&self, mode: QueryMode) -> Option<&ModeResult> {
        self.mode_results.iter().find(|m| m.mode == mode)
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, mode) in self.mode_results.iter().enumerate() {
            if i != 0 {
                writeln!(f)?;
            }
            write!(f, "{}", mode)?;
        }
        Ok(())
    }
}

///////////////
// RunResult //
///////////////

/// Everything measured for one backend over one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// The kind tag of the backend that produced this result.
    pub backend: String,
    /// The backend's parameters as they stood when the sweep finished.
    pub parameters: ParameterSnapshot,
    pub insert_result: InsertResult,
    pub query_result: QueryResult,
    pub index_storage_mb: f64,
    pub disk_storage_mb: f64,
}

impl RunResult {
    /// A non-functional backend standing in for the one that produced this result.
    pub fn placeholder_backend(&self) -> Placeholder {
        Placeholder::new(self.backend.clone())
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Backend: {}", self.backend)?;
        writeln!(
            f,
            "Construction: {}",
            serde_json::Value::Object(self.parameters.construction.clone())
        )?;
        write!(f, "{}", self.insert_result)?;
        writeln!(
            f,
            "Index Storage: {:.3} MB, Disk Storage: {:.3} MB",
            self.index_storage_mb, self.disk_storage_mb
        )?;
        writeln!(f)?;
        write!(f, "{}", self.query_result)
    }
}

///////////
// Tests //
///////////
