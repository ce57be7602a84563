/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::io::Write;

use hnswbench_runner::{utils::fmt::Banner, Output};
use tracing::info;

use crate::{
    backend::Backend,
    insert::InsertOrchestrator,
    params::{ParameterSnapshot, SearchParameters},
    result::RunResult,
    sweep::QuerySweep,
    task::Task,
};

/// Execute `task` from start to finish.
///
/// The phases run strictly in sequence:
///
/// 1. Insert and index build, ordered by the task's index timing.
/// 2. The backend's warm-up hook.
/// 3. The query sweep over every requested mode and `ef`.
/// 4. Index and disk storage probes.
///
/// Any error ends the run and is returned unchanged. A run either produces a complete
/// [`RunResult`] or nothing. Progress and intermediate results are written to `output`.
pub fn run<B, P>(task: Task<B, P>, mut output: &mut dyn Output) -> anyhow::Result<RunResult>
where
    B: Backend,
    P: SearchParameters,
{
    let (mut backend, mut parameters, dataset, insert_config, query_config) = task.into_parts();
    let kind = backend.kind().to_string();

    let title = format!("{} on {}", kind, dataset.name());
    writeln!(output, "{}", Banner::new(&title))?;

    info!(backend = %kind, timing = %insert_config.index_timing, "insert phase started");
    writeln!(output, "{}", Banner::new("Insert"))?;
    writeln!(output, "Index Timing: {}", insert_config.index_timing)?;
    let insert_result = InsertOrchestrator::new(&mut backend, &insert_config, &dataset)?.run()?;
    write!(output, "{}", insert_result)?;

    backend.load()?;

    info!(backend = %kind, "query phase started");
    writeln!(output)?;
    writeln!(output, "{}", Banner::new("Query"))?;
    let query_result =
        QuerySweep::new(&mut backend, &mut parameters, &dataset, &query_config)?.run(&*output)?;
    write!(output, "{}", query_result)?;

    let index_storage_mb = backend.index_storage()?;
    let disk_storage_mb = backend.disk_storage()?;
    info!(
        backend = %kind,
        index_storage_mb,
        disk_storage_mb,
        "storage probed"
    );

    Ok(RunResult {
        backend: kind,
        parameters: ParameterSnapshot::capture(&parameters),
        insert_result,
        query_result,
        index_storage_mb,
        disk_storage_mb,
    })
}

///////////
// Tests //
///////////
