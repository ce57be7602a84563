/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{io::Write, path::PathBuf};

use clap::{Parser, Subcommand};
use hnswbench_core::{codec, RunConfig};
use hnswbench_runner::{utils::fmt::Banner, Output};

/// Parsed command line options.
#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Print saved benchmark results as tables.
    Show {
        /// Result files written by a benchmark run.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print an example run configuration.
    Skeleton,
    /// Parse a run configuration and report whether it is valid.
    Check {
        /// The configuration file to check.
        config: PathBuf,
    },
}

/// Inspect HNSW benchmark results and run configurations.
#[derive(Debug, Parser)]
#[command(version, about)]
pub(crate) struct App {
    #[command(subcommand)]
    command: Commands,
}

impl App {
    pub(crate) fn parse() -> Self {
        <Self as Parser>::parse()
    }

    #[cfg(test)]
    pub(crate) fn from_commands(command: Commands) -> Self {
        Self { command }
    }

    pub(crate) fn run(&self, mut output: &mut dyn Output) -> anyhow::Result<()> {
        match &self.command {
            Commands::Show { files } => {
                for (i, path) in files.iter().enumerate() {
                    let result = codec::load(path)?;
                    if i != 0 {
                        writeln!(output)?;
                    }
                    writeln!(output, "{}", Banner::new(&path.display().to_string()))?;
                    write!(output, "{}", result)?;
                }
            }
            Commands::Skeleton => {
                writeln!(output, "Skeleton run configuration:")?;
                writeln!(
                    output,
                    "{}",
                    serde_json::to_string_pretty(&RunConfig::example())?
                )?;
            }
            Commands::Check { config } => {
                let parsed = RunConfig::load(config)?;
                writeln!(
                    output,
                    "{} is valid: {} ef values, index timing {}, modes [{}]",
                    config.display(),
                    parsed.hnsw.ef_search.len(),
                    parsed.index_timing,
                    parsed
                        .query_modes
                        .iter()
                        .map(|m| m.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                )?;
            }
        }
        Ok(())
    }
}

///////////
// Tests //
///////////
