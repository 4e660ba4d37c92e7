//! Config file read/write with atomic backup rotation.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::ConfigError;

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Number of rolling backups to keep.
pub const MAX_BACKUPS: usize = 5;

/// Resolve the tessera config directory.
/// Priority: `TESSERA_CONFIG_DIR` env > `~/.tessera/` > `./.tessera`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TESSERA_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".tessera"),
        None => PathBuf::from(".tessera"),
    }
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read a YAML file into a JSON tree.
///
/// A missing or empty file yields an empty mapping (first run).
pub async fn read_yaml(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; starting empty");
        return Ok(Value::Object(Map::new()));
    }

    let raw = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
        action: "read",
        path: path.to_path_buf(),
        source,
    })?;

    let value: Value = serde_yaml::from_str(&raw)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    let value = match value {
        Value::Null => Value::Object(Map::new()),
        Value::Object(_) => value,
        _ => return Err(ConfigError::NotAMapping),
    };

    info!(path = %path.display(), "Loaded config");
    Ok(value)
}

/// Write a JSON tree to disk as YAML, atomically (temp file, then rename).
///
/// The previous file, if any, is kept as `<file>.bak.1`; older backups shift
/// up to `.bak.5`.
pub async fn write_yaml(value: &Value, path: &Path) -> Result<(), ConfigError> {
    let io_err = |action: &'static str, path: &Path| {
        let path = path.to_path_buf();
        move |source| ConfigError::Io { action, path, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_err("create directory for", parent))?;
    }

    if path.exists() {
        rotate_backups(path).await;
    }

    let yaml = serde_yaml::to_string(value)?;

    let tmp_path = sibling(path, ".tmp");
    fs::write(&tmp_path, yaml.as_bytes()).await.map_err(io_err("write", &tmp_path))?;
    fs::rename(&tmp_path, path).await.map_err(io_err("replace", path))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

/// `config.yaml` + `.bak.1` -> `config.yaml.bak.1`
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Rotate backups: .bak.1 -> .bak.2 -> ... -> .bak.N, then copy current to .bak.1.
/// Failures are logged; a missing backup never blocks a write.
async fn rotate_backups(path: &Path) {
    for i in (1..MAX_BACKUPS).rev() {
        let old = sibling(path, &format!(".bak.{i}"));
        let new = sibling(path, &format!(".bak.{}", i + 1));
        if old.exists() {
            if let Err(e) = fs::rename(&old, &new).await {
                warn!(backup = %old.display(), error = %e, "Failed to rotate config backup");
            }
        }
    }

    let bak = sibling(path, ".bak.1");
    if let Err(e) = fs::copy(path, &bak).await {
        warn!(backup = %bak.display(), error = %e, "Failed to create config backup");
    }
}
