/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The query sweep: every requested [`QueryMode`] crossed with every `ef`.
//!
//! For each mode (in request order) and each `ef` (in configured order, never sorted) the
//! sweep:
//!
//! 1. Pushes `ef` to the backend through [`SearchParameters::set_search_ef`].
//! 2. Issues every query of the dataset once, in dataset order, timing each one.
//! 3. Scores each answer with [`recall_at_k`] against the ground truth.
//!
//! Two clocks run during a batch. Per-query latencies are summed into
//! [`EfResult::avg_query_latency`], while a wall clock around the whole loop gives
//! [`EfResult::total_elapsed`] and [`EfResult::queries_per_second`]. The gap between the
//! two is sequencing overhead, which is reported rather than hidden.
//!
//! The first backend error aborts the sweep. There is no skip-and-continue.

use std::time::Instant;

use hnswbench_runner::{
    timed,
    utils::{percentiles, AsSeconds},
    Output,
};
use tracing::{debug, info};

use crate::{
    backend::Backend,
    config::{check_modes, ConfigError, QueryConfig, QueryMode},
    dataset::Dataset,
    params::SearchParameters,
    recall::{recall_at_k, Accumulator},
    result::{EfResult, ModeResult, QueryResult},
};

/// The query issued for each dataset query, with the per-query extra it needs.
#[derive(Debug, Clone, Copy)]
enum Workload<'a> {
    Plain,
    Filtered(&'a [String]),
    Ranged(&'a [f32]),
}

impl<'a> Workload<'a> {
    fn new(mode: QueryMode, dataset: &'a Dataset) -> Result<Self, ConfigError> {
        mode.check(dataset)?;
        let missing = |field| ConfigError::MissingDatasetField { mode, field };
        match mode {
            QueryMode::Plain => Ok(Self::Plain),
            QueryMode::Filtered => dataset
                .keyword_filter()
                .map(Self::Filtered)
                .ok_or_else(|| missing("keyword_filter")),
            QueryMode::Ranged => dataset
                .distance()
                .map(Self::Ranged)
                .ok_or_else(|| missing("distance")),
        }
    }

    fn issue<B>(
        self,
        backend: &mut B,
        index: usize,
        query: &[f32],
        k: usize,
    ) -> anyhow::Result<Vec<u64>>
    where
        B: Backend + ?Sized,
    {
        match self {
            Self::Plain => backend.query(query, k),
            Self::Filtered(keywords) => backend.filtered_query(query, k, &keywords[index]),
            Self::Ranged(distances) => backend.ranged_query(query, k, distances[index]),
        }
    }
}

/// Drives the query workload against a bound backend.
///
/// The sweep holds the only mutable reference to the live search parameters for its
/// whole lifetime, so no other party can change `ef` between batches.
#[derive(Debug)]
pub struct QuerySweep<'a, B: ?Sized, P: ?Sized> {
    backend: &'a mut B,
    parameters: &'a mut P,
    dataset: &'a Dataset,
    config: &'a QueryConfig,
}

impl<'a, B, P> QuerySweep<'a, B, P>
where
    B: Backend + ?Sized,
    P: SearchParameters + ?Sized,
{
    /// Prepare a sweep, checking every requested mode against `dataset` first.
    ///
    /// Returns an error without touching the backend if any mode lacks the dataset field
    /// it needs, no modes were requested, or `ef_search` is empty or contains a zero.
    pub fn new(
        backend: &'a mut B,
        parameters: &'a mut P,
        dataset: &'a Dataset,
        config: &'a QueryConfig,
    ) -> Result<Self, ConfigError> {
        check_modes(&config.query_modes, dataset)?;
        if config.ef_search.is_empty() {
            return Err(ConfigError::EmptyEfSearch);
        }
        if config.ef_search.contains(&0) {
            return Err(ConfigError::ZeroParameter("ef_search"));
        }

        Ok(Self {
            backend,
            parameters,
            dataset,
            config,
        })
    }

    /// Run every mode and return one [`ModeResult`] per mode in request order.
    pub fn run(mut self, output: &dyn Output) -> anyhow::Result<QueryResult> {
        let config = self.config;
        let mode_results = config
            .query_modes
            .iter()
            .map(|&mode| self.run_mode(mode, output))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(QueryResult { mode_results })
    }

    fn run_mode(&mut self, mode: QueryMode, output: &dyn Output) -> anyhow::Result<ModeResult> {
        let config = self.config;
        let workload = Workload::new(mode, self.dataset)?;
        let ef_results = config
            .ef_search
            .iter()
            .map(|&ef| self.run_batch(mode, workload, ef, output))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(ModeResult { mode, ef_results })
    }

    fn run_batch(
        &mut self,
        mode: QueryMode,
        workload: Workload<'_>,
        ef: usize,
        output: &dyn Output,
    ) -> anyhow::Result<EfResult> {
        self.parameters.set_search_ef(ef)?;
        debug!(%mode, ef, search_params = ?self.parameters.search_params(), "ef updated");

        let dataset = self.dataset;
        let k = dataset.k();
        let num_queries = dataset.num_queries();

        let mut accumulator = Accumulator::with_capacity(num_queries);
        let progress = output.progress_bar(num_queries, format!("{} ef={}", mode, ef))?;

        let start = Instant::now();
        for (index, (query, truth)) in
            std::iter::zip(dataset.queries(), dataset.groundtruth()).enumerate()
        {
            let (latency, ids) = timed!(workload.issue(&mut *self.backend, index, query, k));
            let ids = ids?;
            accumulator.push(recall_at_k(truth, &ids, k), latency);
            progress.inc(1);
        }
        let total_elapsed = start.elapsed().as_seconds();
        progress.finish_and_clear();

        let avg_recall = accumulator.average_recall();
        let latencies = percentiles::compute_percentiles(accumulator.latencies_mut())?;
        let queries_per_second = num_queries as f64 / total_elapsed;

        info!(
            %mode,
            ef,
            recall = avg_recall,
            qps = queries_per_second,
            "sweep step finished"
        );

        Ok(EfResult {
            ef,
            avg_recall,
            avg_query_latency: latencies.mean,
            p99_query_latency: latencies.p99.as_seconds(),
            queries_per_second,
            total_elapsed,
            num_queries,
            k,
        })
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use hnswbench_runner::output::Sink;

    use crate::{
        dataset::Metric,
        params::{HnswConfig, HnswParameters},
        testing::{Call, Recording},
    };

    // Two queries with k = 2 and identical ground truth.
    fn dataset() -> Dataset {
        Dataset::new(
            "sweep",
            2,
            Metric::L2,
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![vec![0.1, 0.0], vec![0.0, 0.1]],
            vec![vec![0, 1], vec![0, 1]],
        )
        .unwrap()
    }

    fn config(ef_search: &[usize], query_modes: &[QueryMode]) -> QueryConfig {
        QueryConfig {
            ef_search: ef_search.to_vec(),
            query_modes: query_modes.to_vec(),
        }
    }

    fn sweep(
        backend: &mut Recording,
        dataset: &Dataset,
        config: &QueryConfig,
    ) -> anyhow::Result<QueryResult> {
        let mut parameters = backend.parameters().clone();
        QuerySweep::new(backend, &mut parameters, dataset, config)?.run(&Sink::new())
    }

    #[test]
    fn test_perfect_recall() {
        let dataset = dataset();
        let config = config(&[10, 20, 40], &[QueryMode::Plain]);
        let mut backend = Recording::new("mock").with_responses(vec![vec![0, 1], vec![1, 0]]);

        let result = sweep(&mut backend, &dataset, &config).unwrap();
        assert_eq!(result.mode_results.len(), 1);
        let mode = &result.mode_results[0];
        assert_eq!(mode.mode, QueryMode::Plain);
        for r in &mode.ef_results {
            assert_eq!(r.avg_recall, 1.0);
            assert_eq!(r.k, 2);
            assert_eq!(r.num_queries, 2);
        }
    }

    #[test]
    fn test_partial_recall() {
        let dataset = dataset();
        let config = config(&[10], &[QueryMode::Plain]);
        let mut backend = Recording::new("mock").with_responses(vec![vec![0, 1], vec![0, 2]]);

        let result = sweep(&mut backend, &dataset, &config).unwrap();
        assert_eq!(result.mode_results[0].ef_results[0].avg_recall, 0.75);
    }

    #[test]
    fn test_ef_order_and_visibility() {
        let dataset = dataset();
        let config = config(&[200, 10, 40], &[QueryMode::Plain]);
        let mut backend = Recording::new("mock");

        let result = sweep(&mut backend, &dataset, &config).unwrap();
        let efs: Vec<_> = result.mode_results[0]
            .ef_results
            .iter()
            .map(|r| r.ef)
            .collect();
        assert_eq!(efs, vec![200, 10, 40], "ef values must not be reordered");

        // Every query observed the `ef` of its own batch.
        let seen: Vec<_> = backend
            .calls()
            .iter()
            .map(|call| match call {
                Call::Query { ef, k } => {
                    assert_eq!(*k, 2);
                    *ef
                }
                other => panic!("unexpected call {:?}", other),
            })
            .collect();
        assert_eq!(seen, vec![200, 200, 10, 10, 40, 40]);
    }

    #[test]
    fn test_timers() {
        let dataset = dataset();
        let config = config(&[10, 20], &[QueryMode::Plain]);
        let mut backend = Recording::new("slow").with_query_delay(Duration::from_millis(5));

        let result = sweep(&mut backend, &dataset, &config).unwrap();
        for r in &result.mode_results[0].ef_results {
            assert_eq!(r.queries_per_second, r.num_queries as f64 / r.total_elapsed);
            assert!(r.avg_query_latency >= 0.005);
            assert!(r.p99_query_latency >= r.avg_query_latency * 0.5);
            // The batch clock spans every query.
            assert!(r.total_elapsed >= r.avg_query_latency * r.num_queries as f64 * 0.99);
        }
    }

    #[test]
    fn test_missing_extras_fail_before_any_call() {
        let dataset = dataset();
        let mut backend = Recording::new("mock");
        let mut parameters = HnswParameters::new(&HnswConfig::default());

        for mode in [QueryMode::Filtered, QueryMode::Ranged] {
            let config = config(&[10], &[QueryMode::Plain, mode]);
            let err =
                QuerySweep::new(&mut backend, &mut parameters, &dataset, &config).unwrap_err();
            assert!(matches!(err, ConfigError::MissingDatasetField { mode: m, .. } if m == mode));
        }

        let config = config(&[], &[QueryMode::Plain]);
        let err = QuerySweep::new(&mut backend, &mut parameters, &dataset, &config).unwrap_err();
        assert_eq!(err, ConfigError::EmptyEfSearch);

        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_filtered_and_ranged_extras() {
        let dataset = dataset()
            .with_filters(
                vec!["x".into(), "y".into(), "x".into()],
                vec!["x".into(), "y".into()],
            )
            .unwrap()
            .with_distances(vec![0.5, 1.5])
            .unwrap();
        let config = config(&[10], &[QueryMode::Ranged, QueryMode::Filtered]);
        let mut backend = Recording::new("mock");

        let result = sweep(&mut backend, &dataset, &config).unwrap();
        let modes: Vec<_> = result.mode_results.iter().map(|m| m.mode).collect();
        assert_eq!(modes, vec![QueryMode::Ranged, QueryMode::Filtered]);

        assert_eq!(
            backend.calls(),
            &[
                Call::RangedQuery {
                    ef: 10,
                    k: 2,
                    max_distance: 0.5
                },
                Call::RangedQuery {
                    ef: 10,
                    k: 2,
                    max_distance: 1.5
                },
                Call::FilteredQuery {
                    ef: 10,
                    k: 2,
                    keyword: "x".into()
                },
                Call::FilteredQuery {
                    ef: 10,
                    k: 2,
                    keyword: "y".into()
                },
            ]
        );
    }

    #[test]
    fn test_backend_error_aborts_sweep() {
        let dataset = dataset();
        let config = config(&[10, 20], &[QueryMode::Plain]);
        // Fail on the third query: the first query of the second batch.
        let mut backend = Recording::new("mock").fail_query(2, "connection reset");

        let err = sweep(&mut backend, &dataset, &config).unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(backend.calls().len(), 3, "no queries after the failure");
    }
}
