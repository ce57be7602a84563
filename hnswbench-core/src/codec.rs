/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The persisted form of a [`RunResult`].
//!
//! Results are written as JSON documents shaped like the result tree:
//!
//! ```text
//! {
//!   "backend_identity": "redis",
//!   "search_parameter_snapshot": { "construction_params": {..}, "search_params": {..} },
//!   "insert_result": { "elapsed_seconds": .., "insert_seconds": .., "index_seconds": .. },
//!   "query_result": {
//!     "mode_results": [
//!       { "mode": "PLAIN", "ef_results": [ { "ef": .., "avg_recall": .., .. } ] }
//!     ]
//!   },
//!   "index_storage_mb": ..,
//!   "disk_storage_mb": ..
//! }
//! ```
//!
//! Each record has a hand-written encoder and decoder so that the document layout is a
//! contract of its own rather than a mirror of the Rust field names. The backend is stored
//! as its kind tag and the search parameters as the mappings they report. Decoding needs
//! no live backend.
//!
//! Floats that are not finite have no JSON representation. Infinities are written as the
//! strings `"inf"` and `"-inf"`, and NaN as `null`, so every float survives a round trip.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::{
    config::{ConfigError, QueryMode},
    params::ParameterSnapshot,
    result::{EfResult, InsertResult, ModeResult, QueryResult, RunResult},
};

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("missing field \"{0}\"")]
    MissingField(String),
    #[error("field \"{path}\" should be {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
    },
    #[error("field \"{path}\" is invalid: {source}")]
    UnknownSymbol { path: String, source: ConfigError },
    #[error("field \"{0}\" is out of range")]
    OutOfRange(String),
}

////////////
// Encode //
////////////

const INFINITY: &str = "inf";
const NEG_INFINITY: &str = "-inf";

fn float(x: f64) -> Value {
    match Number::from_f64(x) {
        Some(n) => Value::Number(n),
        None if x == f64::INFINITY => INFINITY.into(),
        None if x == f64::NEG_INFINITY => NEG_INFINITY.into(),
        None => Value::Null,
    }
}

fn object<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Object(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn encode_insert(r: &InsertResult) -> Value {
    object([
        ("elapsed_seconds", float(r.elapsed_seconds)),
        ("insert_seconds", float(r.insert_seconds)),
        ("index_seconds", float(r.index_seconds)),
    ])
}

fn encode_ef(r: &EfResult) -> Value {
    object([
        ("ef", r.ef.into()),
        ("avg_recall", float(r.avg_recall)),
        ("avg_query_latency", float(r.avg_query_latency)),
        ("p99_query_latency", float(r.p99_query_latency)),
        ("queries_per_second", float(r.queries_per_second)),
        ("total_elapsed", float(r.total_elapsed)),
        ("num_queries", r.num_queries.into()),
        ("k", r.k.into()),
    ])
}

fn encode_mode(r: &ModeResult) -> Value {
    object([
        ("mode", r.mode.as_str().into()),
        (
            "ef_results",
            Value::Array(r.ef_results.iter().map(encode_ef).collect()),
        ),
    ])
}

fn encode_query(r: &QueryResult) -> Value {
    object([(
        "mode_results",
        Value::Array(r.mode_results.iter().map(encode_mode).collect()),
    )])
}

fn encode_parameters(p: &ParameterSnapshot) -> Value {
    object([
        ("construction_params", Value::Object(p.construction.clone())),
        ("search_params", Value::Object(p.search.clone())),
    ])
}

/// Convert `result` to its transport mapping.
pub fn to_transport(result: &RunResult) -> Value {
    object([
        ("backend_identity", result.backend.as_str().into()),
        (
            "search_parameter_snapshot",
            encode_parameters(&result.parameters),
        ),
        ("insert_result", encode_insert(&result.insert_result)),
        ("query_result", encode_query(&result.query_result)),
        ("index_storage_mb", float(result.index_storage_mb)),
        ("disk_storage_mb", float(result.disk_storage_mb)),
    ])
}

////////////
// Decode //
////////////

// A JSON object together with its location in the document, for error messages.
struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Fields<'a> {
    fn new(value: &'a Value, path: String) -> Result<Self, DecodeError> {
        match value {
            Value::Object(map) => Ok(Self { map, path }),
            _ => Err(DecodeError::WrongType {
                path: if path.is_empty() { "<root>".into() } else { path },
                expected: "an object",
            }),
        }
    }

    fn path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn get(&self, key: &str) -> Result<&'a Value, DecodeError> {
        self.map
            .get(key)
            .ok_or_else(|| DecodeError::MissingField(self.path(key)))
    }

    fn wrong_type(&self, key: &str, expected: &'static str) -> DecodeError {
        DecodeError::WrongType {
            path: self.path(key),
            expected,
        }
    }

    fn f64(&self, key: &str) -> Result<f64, DecodeError> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64().ok_or_else(|| self.wrong_type(key, "a number")),
            Value::Null => Ok(f64::NAN),
            Value::String(s) if s == INFINITY => Ok(f64::INFINITY),
            Value::String(s) if s == NEG_INFINITY => Ok(f64::NEG_INFINITY),
            _ => Err(self.wrong_type(key, "a number")),
        }
    }

    fn usize(&self, key: &str) -> Result<usize, DecodeError> {
        let n = match self.get(key)? {
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| self.wrong_type(key, "a non-negative integer"))?,
            _ => return Err(self.wrong_type(key, "a non-negative integer")),
        };
        usize::try_from(n).map_err(|_| DecodeError::OutOfRange(self.path(key)))
    }

    fn str(&self, key: &str) -> Result<&'a str, DecodeError> {
        self.get(key)?
            .as_str()
            .ok_or_else(|| self.wrong_type(key, "a string"))
    }

    fn map(&self, key: &str) -> Result<&'a Map<String, Value>, DecodeError> {
        self.get(key)?
            .as_object()
            .ok_or_else(|| self.wrong_type(key, "an object"))
    }

    fn object(&self, key: &str) -> Result<Fields<'a>, DecodeError> {
        Fields::new(self.get(key)?, self.path(key))
    }

    /// Decode every element of the array at `key` with `f`.
    fn array<T, F>(&self, key: &str, f: F) -> Result<Vec<T>, DecodeError>
    where
        F: Fn(Fields<'a>) -> Result<T, DecodeError>,
    {
        let items = self
            .get(key)?
            .as_array()
            .ok_or_else(|| self.wrong_type(key, "an array"))?;

        let base = self.path(key);
        items
            .iter()
            .enumerate()
            .map(|(i, item)| f(Fields::new(item, format!("{}[{}]", base, i))?))
            .collect()
    }
}

fn decode_insert(fields: Fields<'_>) -> Result<InsertResult, DecodeError> {
    Ok(InsertResult {
        elapsed_seconds: fields.f64("elapsed_seconds")?,
        insert_seconds: fields.f64("insert_seconds")?,
        index_seconds: fields.f64("index_seconds")?,
    })
}

fn decode_ef(fields: Fields<'_>) -> Result<EfResult, DecodeError> {
    Ok(EfResult {
        ef: fields.usize("ef")?,
        avg_recall: fields.f64("avg_recall")?,
        avg_query_latency: fields.f64("avg_query_latency")?,
        p99_query_latency: fields.f64("p99_query_latency")?,
        queries_per_second: fields.f64("queries_per_second")?,
        total_elapsed: fields.f64("total_elapsed")?,
        num_queries: fields.usize("num_queries")?,
        k: fields.usize("k")?,
    })
}

fn decode_mode(fields: Fields<'_>) -> Result<ModeResult, DecodeError> {
    let mode = fields
        .str("mode")?
        .parse::<QueryMode>()
        .map_err(|source| DecodeError::UnknownSymbol {
            path: fields.path("mode"),
            source,
        })?;

    Ok(ModeResult {
        mode,
        ef_results: fields.array("ef_results", decode_ef)?,
    })
}

fn decode_query(fields: Fields<'_>) -> Result<QueryResult, DecodeError> {
    Ok(QueryResult {
        mode_results: fields.array("mode_results", decode_mode)?,
    })
}

fn decode_parameters(fields: Fields<'_>) -> Result<ParameterSnapshot, DecodeError> {
    Ok(ParameterSnapshot {
        construction: fields.map("construction_params")?.clone(),
        search: fields.map("search_params")?.clone(),
    })
}

/// Reconstruct a [`RunResult`] from its transport mapping.
///
/// The result's backend and parameters are inert: see
/// [`RunResult::placeholder_backend`] and [`ParameterSnapshot`].
pub fn from_transport(value: &Value) -> Result<RunResult, DecodeError> {
    let fields = Fields::new(value, String::new())?;
    Ok(RunResult {
        backend: fields.str("backend_identity")?.to_string(),
        parameters: decode_parameters(fields.object("search_parameter_snapshot")?)?,
        insert_result: decode_insert(fields.object("insert_result")?)?,
        query_result: decode_query(fields.object("query_result")?)?,
        index_storage_mb: fields.f64("index_storage_mb")?,
        disk_storage_mb: fields.f64("disk_storage_mb")?,
    })
}

/////////////////
// Persistence //
/////////////////

/// Atomically write `result` to `path` as pretty-printed JSON.
pub fn save(result: &RunResult, path: &Path) -> anyhow::Result<()> {
    hnswbench_runner::files::atomic_save(path, &to_transport(result))
}

/// Save `result` into `directory` under a timestamped name and return the full path.
///
/// Files are named `<YYYY-MM-DD-HH-MM-SS>-<backend>-result.json` using local time. Characters
/// of the backend kind other than ASCII letters, digits, `-`, `_` and `.` are replaced with
/// `_`, so the file always lands directly in `directory`.
pub fn save_in(result: &RunResult, directory: &Path) -> anyhow::Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let path = directory.join(format!(
        "{}-{}-result.json",
        stamp,
        file_name_safe(&result.backend)
    ));
    save(result, &path)?;
    Ok(path)
}

fn file_name_safe(kind: &str) -> String {
    kind.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Load a result previously written by [`save`].
pub fn load(path: &Path) -> anyhow::Result<RunResult> {
    let value: Value = hnswbench_runner::files::load_json(path)?;
    from_transport(&value).with_context(|| format!("could not decode {}", path.display()))
}

///////////
// Tests //
///////////
