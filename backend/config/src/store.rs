use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tessera_core::json::{get_path, merge_patch, remove_path, set_path};
use tracing::{debug, warn};

use crate::env::resolve_env_vars;
use crate::error::ConfigError;
use crate::io::{read_yaml, write_yaml};
use crate::redact::redact;
use crate::settings::{RuntimeSettings, SETTINGS_KEY};

/// Hierarchical configuration addressed by dot paths such as
/// `runtime.logging.level`.
///
/// Reads and writes are short and never block on io; `load`/`save` do io
/// outside the lock.
#[derive(Debug)]
pub struct Config {
    data: RwLock<Value>,
    path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// An empty, in-memory config.
    pub fn new() -> Self {
        Self { data: RwLock::new(Value::Object(Map::new())), path: None }
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(_) => Ok(Self { data: RwLock::new(value), path: None }),
            _ => Err(ConfigError::NotAMapping),
        }
    }

    /// Read `path` (missing file = empty config) and substitute `${VAR}`
    /// references from the environment.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = read_yaml(path).await?;
        let resolved = resolve_env_vars(&raw)?;
        Ok(Self { data: RwLock::new(resolved), path: Some(path.to_path_buf()) })
    }

    /// The file this config was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Typed value at `key`, or `default` if absent or of another type.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.try_get(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!(key = %key, error = %e, "Config value has unexpected type; using default");
                default
            }
        }
    }

    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.get_value(key) else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|source| ConfigError::Type { key: key.to_string(), source })
    }

    /// Raw value at `key`. An empty key returns the whole tree.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        get_path(&self.data.read(), key).filter(|v| !v.is_null()).cloned()
    }

    /// Set `key`, creating intermediate mappings.
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<(), ConfigError> {
        let value =
            serde_json::to_value(value).map_err(|source| ConfigError::Type { key: key.to_string(), source })?;
        if key.is_empty() && !value.is_object() {
            return Err(ConfigError::NotAMapping);
        }
        set_path(&mut self.data.write(), key, value);
        debug!(key = %key, "Config value set");
        Ok(())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = remove_path(&mut self.data.write(), key);
        if removed.is_some() {
            debug!(key = %key, "Config value removed");
        }
        removed
    }

    /// Apply an RFC 7396 merge patch to the whole tree.
    pub fn merge(&self, patch: &Value) -> Result<(), ConfigError> {
        if !patch.is_object() {
            return Err(ConfigError::NotAMapping);
        }
        merge_patch(&mut self.data.write(), patch);
        Ok(())
    }

    /// Deep copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.data.read().clone()
    }

    /// Deep copy with sensitive values masked, safe to log.
    pub fn redacted(&self) -> Value {
        redact(&self.data.read())
    }

    /// Typed `runtime` section, defaults filled in.
    pub fn settings(&self) -> RuntimeSettings {
        self.get(SETTINGS_KEY, RuntimeSettings::default())
    }

    /// Write back to the file this config was loaded from.
    pub async fn save(&self) -> Result<(), ConfigError> {
        let path = self.path.as_deref().ok_or(ConfigError::NoPath)?;
        self.save_to(path).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let snapshot = self.snapshot();
        write_yaml(&snapshot, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config_file_path;
    use serde_json::json;

    #[test]
    fn test_get_set_by_dot_path() {
        let config = Config::new();
        config.set("translation.engine", "deepl").unwrap();
        config.set("translation.autoDetect", true).unwrap();

        assert_eq!(config.get("translation.engine", String::new()), "deepl");
        assert!(config.get("translation.autoDetect", false));
        assert_eq!(config.get("translation.timeoutMs", 3000u64), 3000);
        assert!(config.has("translation"));
        assert!(!config.has("proxy.host"));
        assert_eq!(config.get_value("translation"), Some(json!({ "engine": "deepl", "autoDetect": true })));
    }

    #[test]
    fn test_wrong_type_falls_back_to_default_but_try_get_reports() {
        let config = Config::from_value(json!({ "port": "eighty" })).unwrap();
        assert_eq!(config.get("port", 80u16), 80);
        assert!(matches!(config.try_get::<u16>("port"), Err(ConfigError::Type { .. })));
        assert_eq!(config.try_get::<u16>("missing").unwrap(), None);
    }

    #[test]
    fn test_set_replaces_scalars_on_the_way() {
        let config = Config::from_value(json!({ "proxy": "off" })).unwrap();
        config.set("proxy.host", "10.0.0.1").unwrap();
        assert_eq!(config.snapshot(), json!({ "proxy": { "host": "10.0.0.1" } }));
    }

    #[test]
    fn test_remove_and_merge() {
        let config = Config::from_value(json!({ "a": { "b": 1, "c": 2 }, "d": 3 })).unwrap();
        assert_eq!(config.remove("a.b"), Some(json!(1)));
        assert_eq!(config.remove("a.b"), None);

        config.merge(&json!({ "a": { "e": 5 }, "d": null })).unwrap();
        assert_eq!(config.snapshot(), json!({ "a": { "c": 2, "e": 5 } }));
        assert!(config.merge(&json!([1])).is_err());
    }

    #[test]
    fn test_root_must_stay_a_mapping() {
        assert!(matches!(Config::from_value(json!(3)), Err(ConfigError::NotAMapping)));
        let config = Config::new();
        assert!(config.set("", 3).is_err());
        config.set("", json!({ "fresh": true })).unwrap();
        assert!(config.get("fresh", false));
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let config = Config::from_value(json!({ "proxy": { "proxyPassword": "pw", "port": 8080 } })).unwrap();
        assert_eq!(config.redacted()["proxy"]["proxyPassword"], "***");
        assert_eq!(config.snapshot()["proxy"]["proxyPassword"], "pw");
    }

    #[test]
    fn test_settings_read_runtime_section() {
        let config = Config::from_value(json!({
            "runtime": { "logging": { "level": "debug" }, "eventBus": { "historyRetentionSecs": 60 } }
        }))
        .unwrap();
        let settings = config.settings();
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.event_bus.history_retention_secs, 60);
        assert_eq!(settings.event_bus.max_history_size, 100);

        assert_eq!(Config::new().settings(), RuntimeSettings::default());
    }

    #[tokio::test]
    async fn test_load_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        std::fs::write(&path, "accounts:\n  - name: work\n    enabled: true\n").unwrap();

        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.path(), Some(path.as_path()));
        assert_eq!(config.get_value("accounts"), Some(json!([{ "name": "work", "enabled": true }])));

        config.set("runtime.logging.level", "warn").unwrap();
        config.save().await.unwrap();

        let reloaded = Config::load(&path).await.unwrap();
        assert_eq!(reloaded.settings().logging.level, "warn");
        assert!(path.with_file_name("config.yaml.bak.1").exists());
    }

    #[tokio::test]
    async fn test_load_fails_on_missing_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.yaml");
        std::fs::write(&path, "token: ${TESSERA_TEST_UNSET_VARIABLE}\n").unwrap();

        let err = Config::load(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
        assert!(err.to_string().contains("TESSERA_TEST_UNSET_VARIABLE"));
    }

    #[tokio::test]
    async fn test_save_without_path_fails() {
        assert!(matches!(Config::new().save().await, Err(ConfigError::NoPath)));
    }
}
