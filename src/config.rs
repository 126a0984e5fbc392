//! Engine configuration (`scrubseq.json`) and its location.
//!
//! Config path priority:
//! 1. CLI `--config <FILE>`
//! 2. `SCRUBSEQ_CONFIG_DIR` environment variable (`<dir>/scrubseq.json`)
//! 3. Platform config directory from dirs-next
//!
//! Platform paths:
//! - Linux: ~/.config/scrubseq/scrubseq.json
//! - macOS: ~/Library/Application Support/scrubseq/scrubseq.json
//! - Windows: %APPDATA%\scrubseq\scrubseq.json

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::controller::SequenceOptions;
use crate::core::input::MappingPolicy;
use crate::core::loader::DEFAULT_INITIAL_BATCH;
use crate::core::workers::Workers;
use crate::entities::VariantCatalog;

pub const CONFIG_FILE: &str = "scrubseq.json";
pub const CONFIG_DIR_ENV: &str = "SCRUBSEQ_CONFIG_DIR";

/// Overrides for the config directory
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    pub fn from_env() -> Self {
        Self {
            config_dir: std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from),
        }
    }
}

/// Path to a file in the config directory
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    config_dir(config).join(name)
}

fn config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Some(dir) = dirs_next::config_dir() {
        return dir.join("scrubseq");
    }
    PathBuf::from(".")
}

/// Resolve the config file: explicit path wins, then env/platform
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    match cli_path {
        Some(path) => path.to_path_buf(),
        None => config_file(CONFIG_FILE, &PathConfig::from_env()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames fetched before input is accepted
    pub initial_batch: usize,
    pub mapping: MappingPolicy,
    /// Fetch worker threads; None = 3/4 of the cores
    pub workers: Option<usize>,
    pub variants: VariantCatalog,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_batch: DEFAULT_INITIAL_BATCH,
            mapping: MappingPolicy::default(),
            workers: None,
            variants: VariantCatalog::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `path`. A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        debug!(
            "Loaded config from {}: batch={}, {} variants",
            path.display(),
            config.initial_batch,
            config.variants.len()
        );
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        info!("Config written to {}", path.display());
        Ok(())
    }

    pub fn sequence_options(&self) -> SequenceOptions {
        SequenceOptions {
            initial_batch: self.initial_batch.max(1),
            mapping: self.mapping.sanitized(),
        }
    }

    pub fn worker_threads(&self) -> usize {
        self.workers
            .filter(|&n| n > 0)
            .unwrap_or_else(Workers::default_threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("scrubseq_config_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(config_file("x.json", &config), PathBuf::from("/custom/x.json"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let p = resolve_config_path(Some(Path::new("/etc/seq.json")));
        assert_eq!(p, PathBuf::from("/etc/seq.json"));
        assert!(resolve_config_path(None).ends_with(CONFIG_FILE));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let cfg = EngineConfig::load(&temp_path("missing.json")).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.initial_batch, 30);
        assert!(cfg.mapping.is_damped());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let path = temp_path("partial.json");
        fs::write(
            &path,
            r#"{
                "mapping": { "mode": "absolute" },
                "variants": [
                    { "id": "day", "url_template": "day/f_000.jpg", "frame_count": 120 },
                    {
                        "id": "night",
                        "name": "Night",
                        "url_template": "night/f_000.jpg",
                        "frame_count": 90
                    }
                ]
            }"#,
        )
        .unwrap();

        let cfg = EngineConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(cfg.initial_batch, 30);
        assert_eq!(cfg.mapping, MappingPolicy::Absolute);
        assert_eq!(cfg.variants.len(), 2);
        assert_eq!(cfg.variants.get(1).unwrap().name(), "Night");
        assert_eq!(cfg.variants.get(0).unwrap().frame_url(7), "day/f_007.jpg");
    }

    #[test]
    fn test_invalid_variant_is_an_error() {
        let path = temp_path("bad.json");
        fs::write(
            &path,
            r#"{ "variants": [ { "id": "x", "url_template": "x.jpg", "frame_count": 3 } ] }"#,
        )
        .unwrap();

        let err = EngineConfig::load(&path).unwrap_err();
        let _ = fs::remove_file(&path);
        assert!(format!("{:#}", err).contains("Failed to parse config"));
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = temp_path("nested");
        let path = dir.join("deep").join(CONFIG_FILE);
        let cfg = EngineConfig {
            initial_batch: 12,
            workers: Some(2),
            ..Default::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), cfg);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_options_are_sanitized() {
        let cfg = EngineConfig {
            initial_batch: 0,
            workers: Some(0),
            mapping: MappingPolicy::Damped {
                sensitivity: 4000.0,
                damping: 5.0,
                epsilon: 0.01,
            },
            ..Default::default()
        };
        let opts = cfg.sequence_options();
        assert_eq!(opts.initial_batch, 1);
        assert_eq!(opts.mapping, cfg.mapping.sanitized());
        assert!(cfg.worker_threads() >= 1);
    }
}
