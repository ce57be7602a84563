/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Run configuration: when the index is built, which query shapes are measured, and the
//! HNSW parameter space.

use std::{fmt, path::Path, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{dataset::Dataset, params::HnswConfig};

/// Problems with a run configuration.
///
/// These are raised before any backend is touched and are never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown index timing \"{0}\", expected one of PRE_INDEX, POST_INDEX, NO_INDEX")]
    UnknownIndexTiming(String),
    #[error("unknown query mode \"{0}\", expected one of PLAIN, FILTERED, RANGED")]
    UnknownQueryMode(String),
    #[error("query mode {mode} requires the dataset to provide \"{field}\"")]
    MissingDatasetField {
        mode: QueryMode,
        field: &'static str,
    },
    #[error("at least one query mode must be requested")]
    NoQueryModes,
    #[error("ef_search must contain at least one value")]
    EmptyEfSearch,
    #[error("{0} must be greater than zero")]
    ZeroParameter(&'static str),
}

// Implement `Serialize` and `Deserialize` through the symbolic name so that configuration
// and result files stay readable and accept any capitalization.
macro_rules! symbolic_serde {
    ($T:ty) => {
        impl Serialize for $T {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $T {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

//////////////////
// Index Timing //
//////////////////

/// When the index is built relative to the bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IndexTiming {
    /// Build the index, then insert.
    #[default]
    PreIndex,
    /// Insert, then build the index.
    PostIndex,
    /// Insert only. The index either already exists or is maintained by the store itself.
    NoIndex,
}

impl IndexTiming {
    pub const ALL: [Self; 3] = [Self::PreIndex, Self::PostIndex, Self::NoIndex];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreIndex => "PRE_INDEX",
            Self::PostIndex => "POST_INDEX",
            Self::NoIndex => "NO_INDEX",
        }
    }
}

impl FromStr for IndexTiming {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownIndexTiming(s.to_string()))
    }
}

symbolic_serde!(IndexTiming);

////////////////
// Query Mode //
////////////////

/// The shape of the queries issued during a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// Unrestricted top-k.
    #[default]
    Plain,
    /// Top-k among vectors whose metadata equals the query's keyword.
    Filtered,
    /// Vectors within the query's maximum distance, capped at k.
    Ranged,
}

impl QueryMode {
    pub const ALL: [Self; 3] = [Self::Plain, Self::Filtered, Self::Ranged];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Filtered => "FILTERED",
            Self::Ranged => "RANGED",
        }
    }

    /// Longer names accepted when parsing.
    const fn alias(self) -> &'static str {
        match self {
            Self::Plain => "QUERY",
            Self::Filtered => "FILTERED_QUERY",
            Self::Ranged => "RANGED_QUERY",
        }
    }

    /// Check that `dataset` carries what this mode needs.
    pub fn check(self, dataset: &Dataset) -> Result<(), ConfigError> {
        let missing = |field| ConfigError::MissingDatasetField { mode: self, field };
        match self {
            Self::Plain => Ok(()),
            Self::Filtered => {
                if dataset.keyword_filter().is_none() {
                    Err(missing("keyword_filter"))
                } else if dataset.metadata().is_none() {
                    Err(missing("metadata"))
                } else {
                    Ok(())
                }
            }
            Self::Ranged => match dataset.distance() {
                Some(_) => Ok(()),
                None => Err(missing("distance")),
            },
        }
    }
}

impl FromStr for QueryMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s) || m.alias().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownQueryMode(s.to_string()))
    }
}

symbolic_serde!(QueryMode);

/// Validate a requested list of modes against `dataset`.
///
/// Every mode is checked up front so that a bad request fails before the first backend
/// call rather than after earlier modes have already run.
pub fn check_modes(modes: &[QueryMode], dataset: &Dataset) -> Result<(), ConfigError> {
    if modes.is_empty() {
        return Err(ConfigError::NoQueryModes);
    }
    modes.iter().try_for_each(|mode| mode.check(dataset))
}

////////////////
// Run Config //
////////////////

/// Everything about a run except the dataset and the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub hnsw: HnswConfig,
    #[serde(default)]
    pub index_timing: IndexTiming,
    #[serde(default = "RunConfig::default_query_modes")]
    pub query_modes: Vec<QueryMode>,
}

impl RunConfig {
    fn default_query_modes() -> Vec<QueryMode> {
        vec![QueryMode::Plain]
    }

    /// Load a configuration from a JSON file and validate everything that does not depend on
    /// a dataset.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: Self = hnswbench_runner::files::load_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// A fully populated configuration suitable for printing as a starting point.
    pub fn example() -> Self {
        Self {
            hnsw: HnswConfig::default(),
            index_timing: IndexTiming::PostIndex,
            query_modes: vec![QueryMode::Plain, QueryMode::Filtered],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hnsw.validate()?;
        if self.query_modes.is_empty() {
            return Err(ConfigError::NoQueryModes);
        }
        Ok(())
    }

    /// Validate against the dataset the run will use.
    pub fn validate_for(&self, dataset: &Dataset) -> Result<(), ConfigError> {
        self.validate()?;
        check_modes(&self.query_modes, dataset)
    }

    /// Split into the insert-phase and query-phase halves.
    pub fn split(&self) -> (InsertConfig, QueryConfig) {
        (
            InsertConfig {
                index_timing: self.index_timing,
                query_modes: self.query_modes.clone(),
            },
            QueryConfig {
                ef_search: self.hnsw.ef_search.clone(),
                query_modes: self.query_modes.clone(),
            },
        )
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            hnsw: HnswConfig::default(),
            index_timing: IndexTiming::default(),
            query_modes: Self::default_query_modes(),
        }
    }
}

/// What the insert phase needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertConfig {
    pub index_timing: IndexTiming,
    /// Metadata is only sent to the backend when [`QueryMode::Filtered`] is among these.
    pub query_modes: Vec<QueryMode>,
}

impl InsertConfig {
    pub fn sends_metadata(&self) -> bool {
        self.query_modes.contains(&QueryMode::Filtered)
    }
}

/// What the query sweep needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    pub ef_search: Vec<usize>,
    pub query_modes: Vec<QueryMode>,
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    use crate::dataset::Metric;

    fn dataset() -> Dataset {
        Dataset::new(
            "tiny",
            1,
            Metric::L2,
            vec![vec![0.0], vec![1.0]],
            vec![vec![0.0]],
            vec![vec![0]],
        )
        .unwrap()
    }

    #[test]
    fn test_index_timing_names() {
        for t in IndexTiming::ALL {
            assert_eq!(t.as_str().parse::<IndexTiming>().unwrap(), t);
            assert_eq!(t.to_string(), t.as_str());
        }
        assert_eq!(
            "post_index".parse::<IndexTiming>().unwrap(),
            IndexTiming::PostIndex
        );
        assert_eq!(
            "LATE_INDEX".parse::<IndexTiming>().unwrap_err(),
            ConfigError::UnknownIndexTiming("LATE_INDEX".into())
        );
    }

    #[test]
    fn test_query_mode_names() {
        for m in QueryMode::ALL {
            assert_eq!(m.as_str().parse::<QueryMode>().unwrap(), m);
            assert_eq!(m.alias().parse::<QueryMode>().unwrap(), m);
        }
        assert_eq!("ranged".parse::<QueryMode>().unwrap(), QueryMode::Ranged);
        assert!(matches!(
            "HYBRID".parse::<QueryMode>().unwrap_err(),
            ConfigError::UnknownQueryMode(_)
        ));
    }

    #[test]
    fn test_mode_requirements() {
        let plain = dataset();
        assert!(QueryMode::Plain.check(&plain).is_ok());
        assert_eq!(
            QueryMode::Filtered.check(&plain).unwrap_err(),
            ConfigError::MissingDatasetField {
                mode: QueryMode::Filtered,
                field: "keyword_filter"
            }
        );
        assert_eq!(
            QueryMode::Ranged.check(&plain).unwrap_err(),
            ConfigError::MissingDatasetField {
                mode: QueryMode::Ranged,
                field: "distance"
            }
        );

        let full = dataset()
            .with_filters(vec!["a".into(), "b".into()], vec!["a".into()])
            .unwrap()
            .with_distances(vec![0.5])
            .unwrap();
        check_modes(&QueryMode::ALL, &full).unwrap();

        assert_eq!(
            check_modes(&[], &full).unwrap_err(),
            ConfigError::NoQueryModes
        );
    }

    #[test]
    fn test_run_config_serde() {
        let config: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.index_timing, IndexTiming::PreIndex);
        assert_eq!(config.query_modes, vec![QueryMode::Plain]);

        let config: RunConfig = serde_json::from_str(
            r#"{ "index_timing": "no_index", "query_modes": ["QUERY", "RANGED"] }"#,
        )
        .unwrap();
        assert_eq!(config.index_timing, IndexTiming::NoIndex);
        assert_eq!(config.query_modes, vec![QueryMode::Plain, QueryMode::Ranged]);

        let err = serde_json::from_str::<RunConfig>(r#"{ "index_timing": "SOMETIMES" }"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown index timing"));

        let example = serde_json::to_value(RunConfig::example()).unwrap();
        assert_eq!(example["index_timing"], "POST_INDEX");
        assert_eq!(example["query_modes"][1], "FILTERED");
        assert_eq!(example["hnsw"]["M"], 24);
    }

    #[test]
    fn test_validate_and_split() {
        let config = RunConfig {
            query_modes: vec![QueryMode::Plain, QueryMode::Filtered],
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate_for(&dataset()).unwrap_err(),
            ConfigError::MissingDatasetField { .. }
        ));

        let (insert, query) = config.split();
        assert!(insert.sends_metadata());
        assert_eq!(query.ef_search, config.hnsw.ef_search);

        let (insert, _) = RunConfig::default().split();
        assert!(!insert.sends_metadata());

        let config = RunConfig {
            query_modes: vec![],
            ..RunConfig::default()
        };
        assert_eq!(config.validate().unwrap_err(), ConfigError::NoQueryModes);
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        hnswbench_runner::files::atomic_save(&path, &RunConfig::example()).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), RunConfig::example());

        std::fs::write(&path, r#"{ "hnsw": { "ef_search": [] } }"#).unwrap();
        let err = RunConfig::load(&path).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::EmptyEfSearch)
        );
    }
}
