//! Readers for source dumps
//!
//! JSON inputs may be a single array, line-delimited objects, or plain
//! concatenated objects; all three decode to the same record list.

use crate::error::{ConvertError, ConvertResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Fail with [`ConvertError::InputNotReadable`] unless `path` is a readable file
pub fn ensure_readable(path: &Path) -> ConvertResult<()> {
    let readable = path.is_file() && File::open(path).is_ok();
    if !readable {
        return Err(ConvertError::InputNotReadable(path.to_path_buf()));
    }
    Ok(())
}

/// Decode every JSON record in `path`
///
/// A top-level array contributes its elements; any other top-level value is
/// one record.
pub fn read_json_records<T: DeserializeOwned>(path: &Path) -> ConvertResult<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for value in serde_json::Deserializer::from_reader(reader).into_iter::<Value>() {
        match value? {
            Value::Array(items) => {
                for item in items {
                    records.push(serde_json::from_value(item)?);
                }
            }
            other => records.push(serde_json::from_value(other)?),
        }
    }

    debug!(path = %path.display(), count = records.len(), "Read JSON records");
    Ok(records)
}

/// Decode every row of a headed CSV file
pub fn read_csv_records<T: DeserializeOwned>(path: &Path) -> ConvertResult<Vec<T>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;
    collect_csv(reader, path)
}

/// Like [`read_csv_records`], for dumps that escape quotes as `\"`.
///
/// The file is rewritten in memory to standard doubled quotes first.
pub fn read_escaped_csv_records<T: DeserializeOwned>(path: &Path) -> ConvertResult<Vec<T>> {
    let raw = fs::read_to_string(path)?;
    let normalized = normalize_escaped_quotes(&raw);
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(normalized.as_bytes());
    collect_csv(reader, path)
}

fn collect_csv<R: std::io::Read, T: DeserializeOwned>(
    mut reader: csv::Reader<R>,
    path: &Path,
) -> ConvertResult<Vec<T>> {
    let records = reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()?;
    debug!(path = %path.display(), count = records.len(), "Read CSV records");
    Ok(records)
}

/// Replace backslash-escaped quotes with CSV doubled quotes
pub fn normalize_escaped_quotes(raw: &str) -> String {
    raw.replace("\\\"", "\"\"")
}
