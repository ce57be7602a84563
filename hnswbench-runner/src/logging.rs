/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Subscriber setup for the `tracing` events emitted while a benchmark runs.

use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

fn filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

/// Install a global subscriber logging to `stderr` and respecting the `RUST_LOG` environment
/// variable.
///
/// If the environment variable is not set - then the "info" level will be used. Logs go to
/// `stderr` so they do not interleave with reports printed to `stdout`.
pub fn init_subscriber() {
    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter())
        .with(fmt_layer)
        .init();
}

/// Create a subscriber for tests.
///
/// The returned guard only installs the subscriber for the current thread, allowing test
/// threads to have non-conflicting subscribers.
pub fn init_test_subscriber() -> ::tracing::subscriber::DefaultGuard {
    let fmt_layer = fmt::layer().with_target(true).with_test_writer();

    tracing_subscriber::registry()
        .with(filter())
        .with(fmt_layer)
        .set_default()
}
