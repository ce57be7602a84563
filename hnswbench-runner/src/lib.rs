/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Shared plumbing for HNSW benchmark runs.
//!
//! Nothing in this crate knows about vector stores. It provides the pieces that every run
//! needs regardless of the backend under test:
//!
//! * [`timed!`]: scope a clock around an expression and keep both its value and the elapsed
//!   [`std::time::Duration`].
//! * [`utils::percentiles`]: mean and tail latencies over a batch of measurements.
//! * [`utils::fmt`]: fixed-width tables and banners for console reports.
//! * [`output`]: where prints and progress bars go.
//! * [`files`]: atomic saving and loading of JSON documents.
//! * [`logging`]: `tracing` subscriber setup for binaries and tests.

pub mod files;
pub mod logging;
pub mod output;
pub mod utils;

pub use output::Output;
