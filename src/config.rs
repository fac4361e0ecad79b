//! Core configuration (C1): `.config.yaml` plus environment overrides.
//!
//! Layering, highest priority first:
//! 1. Environment variables read once in [`Config::load`].
//! 2. `$XDG_CONFIG_HOME/codetracer/.config.yaml`.
//! 3. Built-in defaults (sharing disabled).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::paths::Paths;

/// Config file keys, matching spec.md §4.1 / §6 exactly.
#[derive(Debug, Clone)]
pub struct Config {
    pub trace_sharing_enabled: bool,
    pub base_url: String,
    pub upload_api: String,
    pub download_api: String,
    pub delete_api: String,
    pub default_build: String,
    pub web_api_root: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            trace_sharing_enabled: false,
            base_url: String::new(),
            upload_api: String::new(),
            download_api: String::new(),
            delete_api: String::new(),
            default_build: String::new(),
            web_api_root: String::new(),
        }
    }
}

/// Raw YAML shape, using the field names as they appear on disk
/// (camelCase, per spec.md §6) before being folded into [`Config`].
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(rename = "traceSharingEnabled")]
    trace_sharing_enabled: Option<bool>,
    #[serde(rename = "baseUrl")]
    base_url: Option<String>,
    #[serde(rename = "uploadApi")]
    upload_api: Option<String>,
    #[serde(rename = "downloadApi")]
    download_api: Option<String>,
    #[serde(rename = "deleteApi")]
    delete_api: Option<String>,
    #[serde(rename = "defaultBuild")]
    default_build: Option<String>,
    #[serde(rename = "webApiRoot")]
    web_api_root: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config file: {e}"),
            ConfigError::Yaml(e) => write!(f, "cannot parse config file: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Path to the config file, honoring `$XDG_CONFIG_HOME` via `paths`.
    pub fn config_file_path(paths: &Paths) -> PathBuf {
        paths.config_dir.join(".config.yaml")
    }

    /// Loads config file + environment overrides. Never fails: a missing or
    /// unreadable config file just means "use defaults", logged at `warn!`.
    /// A present-but-invalid file is a genuine configuration error (§7).
    pub fn load(paths: &Paths) -> Result<Config, ConfigError> {
        let path = Self::config_file_path(paths);
        let mut cfg = if path.exists() {
            Self::load_file(&path)?
        } else {
            log::warn!(
                "no config file at {} — using built-in defaults",
                path.display()
            );
            Config::default()
        };

        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn load_file(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let raw: RawConfig = serde_yaml::from_str(&contents).map_err(ConfigError::Yaml)?;
        let default = Config::default();
        Ok(Config {
            trace_sharing_enabled: raw.trace_sharing_enabled.unwrap_or(default.trace_sharing_enabled),
            base_url: raw.base_url.unwrap_or(default.base_url),
            upload_api: raw.upload_api.unwrap_or(default.upload_api),
            download_api: raw.download_api.unwrap_or(default.download_api),
            delete_api: raw.delete_api.unwrap_or(default.delete_api),
            default_build: raw.default_build.unwrap_or(default.default_build),
            web_api_root: raw.web_api_root.unwrap_or(default.web_api_root),
        })
    }

    /// `CODETRACER_*` overrides that affect config-level behaviour. The
    /// broader set of env vars in spec.md §4.1 (shell integration, wrapper
    /// pid, …) are read directly where they are used (recorder, process
    /// supervisor) rather than funneled through `Config`.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CODETRACER_TRACE_SHARING_ENABLED") {
            self.trace_sharing_enabled = matches!(val.as_str(), "1" | "true" | "yes");
        }
    }
}

/// Human-readable creation timestamp for `Trace::date` (spec.md §3).
pub fn now_human_readable() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sharing_disabled() {
        let cfg = Config::default();
        assert!(!cfg.trace_sharing_enabled);
    }

    #[test]
    fn load_file_parses_known_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".config.yaml");
        std::fs::write(
            &path,
            "traceSharingEnabled: true\nbaseUrl: https://example.test\nuploadApi: /upload\ndownloadApi: /download\ndeleteApi: /delete\ndefaultBuild: cargo build\nwebApiRoot: https://example.test/api\n",
        )
        .unwrap();

        let cfg = Config::load_file(&path).unwrap();
        assert!(cfg.trace_sharing_enabled);
        assert_eq!(cfg.base_url, "https://example.test");
        assert_eq!(cfg.default_build, "cargo build");
    }

    #[test]
    fn load_file_missing_keys_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".config.yaml");
        std::fs::write(&path, "baseUrl: https://example.test\n").unwrap();

        let cfg = Config::load_file(&path).unwrap();
        assert!(!cfg.trace_sharing_enabled);
        assert_eq!(cfg.base_url, "https://example.test");
    }
}
