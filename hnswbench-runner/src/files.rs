/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Reading and writing JSON documents.

use std::path::Path;

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};

/// Atomically save the serializable `object` to a pretty-printed JSON file at `path`.
///
/// This function works by first serializing to `format!("{}.temp", path)` and then using
/// `std::fs::rename`, making the operation safe from interrupts. A reader never observes a
/// half-written document.
///
/// This can fail for a number of reasons:
///
/// 1. `path` is not an valid file path.
/// 2. The temporary file `format!("{}.temp", path)` already exists.
/// 3. Serialization fails.
/// 4. Renaming fails.
pub fn atomic_save<T>(path: &Path, object: &T) -> anyhow::Result<()>
where
    T: Serialize + ?Sized,
{
    let temp = format!("{}.temp", path.display());
    if Path::new(&temp).exists() {
        anyhow::bail!("Temporary file {} already exists. Aborting!", temp);
    }

    let buffer = std::fs::File::create(&temp)
        .with_context(|| format!("could not create temporary file {}", temp))?;
    let writer = std::io::BufWriter::new(buffer);
    serde_json::to_writer_pretty(writer, object)?;
    std::fs::rename(&temp, path)
        .with_context(|| format!("could not move {} to {}", temp, path.display()))?;
    Ok(())
}

/// Load a JSON document from `path`.
pub fn load_json<T>(path: &Path) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let file = std::fs::File::open(path)
        .with_context(|| format!("could not open {}", path.display()))?;
    let reader = std::io::BufReader::new(file);
    serde_json::from_reader(reader).with_context(|| format!("could not parse {}", path.display()))
}

///////////
// Tests //
///////////
