//! JSON file reading and crash-safe rewriting.
//!
//! Writes go to a temporary file in the target's directory, are flushed and
//! fsynced, then renamed over the target. A crash at any point leaves either
//! the old file or the complete new one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::debug;

/// Errors from reading or writing a JSON document.
#[derive(Debug, thiserror::Error)]
pub enum JsonFileError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize JSON for {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Options for [`write_json_atomic`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Copy the previous file to `<name>.bak` before replacing it.
    pub backup: bool,
}

/// Read and parse a JSON document.
///
/// # Errors
///
/// Returns [`JsonFileError::Read`] or [`JsonFileError::Parse`] with the path
/// attached.
pub fn read_json(path: &Path) -> Result<Value, JsonFileError> {
    let raw = fs::read_to_string(path).map_err(|source| JsonFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| JsonFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Render a value the way record files are stored: tab-indented, trailing
/// newline.
///
/// # Errors
///
/// Returns the serializer error (only possible for non-string map keys).
pub fn to_pretty_bytes(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Atomically replace `path` with `value`.
///
/// # Errors
///
/// Returns [`JsonFileError::Write`] on any filesystem failure. The target is
/// left untouched in that case and the temporary file is removed.
pub fn write_json_atomic(
    path: &Path,
    value: &Value,
    options: WriteOptions,
) -> Result<(), JsonFileError> {
    let write_err = |source| JsonFileError::Write {
        path: path.to_path_buf(),
        source,
    };

    let bytes = to_pretty_bytes(value).map_err(|source| JsonFileError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".temp.")
        .suffix(".json")
        .tempfile_in(&parent)
        .map_err(write_err)?;
    tmp.write_all(&bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    if options.backup && path.exists() {
        let mut bak = path.as_os_str().to_owned();
        bak.push(".bak");
        fs::copy(path, PathBuf::from(bak)).map_err(write_err)?;
    }

    tmp.persist(path).map_err(|e| write_err(e.error))?;
    sync_dir(&parent).map_err(write_err)?;

    debug!(path = %path.display(), bytes = bytes.len(), "wrote json");
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
