//! JSON persistence for the final dataset and the geocode cache.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// How a document is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Compact,
    Pretty,
}

/// Reads and deserializes a JSON document.
///
/// Returns `Ok(None)` when the file does not exist; any other I/O or parse
/// failure is an error and left to the caller to judge.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()))
        }
    };

    let value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

/// Serializes `value` and replaces the file at `path` in one step.
///
/// The document is first written next to the target and then renamed over it,
/// so an interrupted write never leaves a truncated file behind.
pub async fn write_json<T: Serialize>(path: &Path, value: &T, layout: Layout) -> Result<()> {
    let body = match layout {
        Layout::Compact => serde_json::to_vec(value)?,
        Layout::Pretty => serde_json::to_vec_pretty(value)?,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let staging = staging_path(path);
    fs::write(&staging, &body)
        .await
        .with_context(|| format!("Failed to write {}", staging.display()))?;
    fs::rename(&staging, path)
        .await
        .with_context(|| format!("Failed to move {} into place", path.display()))?;

    debug!("Wrote {} bytes to {}", body.len(), path.display());
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
