//! Local record of every photo uploaded so far, kept as a pretty-printed JSON
//! array of `{"file_name", "size"}` objects.
//!
//! Appends are read-modify-write of the whole array. The rewrite goes through
//! a `.part` file and a rename so an interrupted run leaves the previous
//! ledger intact. There is no locking; one process owns the file.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::BackupError;
use crate::model::LedgerEntry;

/// Creates an empty ledger unless the file is already there.
pub fn ensure_exists(path: &Path) -> Result<(), BackupError> {
    if path.exists() {
        return Ok(());
    }

    write_replacing(path, b"[]")?;
    info!("created empty ledger {}", path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<Vec<LedgerEntry>, BackupError> {
    let raw = fs::read(path).map_err(|e| BackupError::io("load_ledger", path, e))?;
    serde_json::from_slice(&raw).map_err(|source| BackupError::Json {
        op: "load_ledger",
        source,
    })
}

pub fn append(entry: &LedgerEntry, path: &Path) -> Result<(), BackupError> {
    let mut entries = load(path)?;
    entries.push(entry.clone());

    let body = to_pretty_json(&entries).map_err(|source| BackupError::Json {
        op: "append_ledger",
        source,
    })?;
    write_replacing(path, &body)?;
    debug!(
        "ledger {} now holds {} entries",
        path.display(),
        entries.len()
    );
    Ok(())
}

/// Body of the `<name>.json` sidecar uploaded next to each photo.
pub fn sidecar(entry: &LedgerEntry) -> Result<Vec<u8>, BackupError> {
    to_pretty_json(&[entry]).map_err(|source| BackupError::Json {
        op: "sidecar",
        source,
    })
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut body = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut body, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(body)
}

fn part_path(path: &Path) -> PathBuf {
    let mut part = OsString::from(path.as_os_str());
    part.push(".part");
    PathBuf::from(part)
}

fn write_replacing(path: &Path, body: &[u8]) -> Result<(), BackupError> {
    let part = part_path(path);
    fs::write(&part, body).map_err(|e| BackupError::io("write_ledger", &part, e))?;
    fs::rename(&part, path).map_err(|e| BackupError::io("write_ledger", path, e))
}
