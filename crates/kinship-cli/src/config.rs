//! CLI configuration, stored as TOML

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use kinship_sync::ProcessorRegistry;
use serde::{Deserialize, Serialize};

const PROCESSOR_PREFIX: &str = "processors.";

/// Default config file location
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kinship")
        .join("config.toml")
}

/// Get default vault directory
pub fn default_vault_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Contacts")
}

/// Configuration for the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory of contact documents
    pub vault: PathBuf,
    /// Heading of the related-list section
    pub heading: String,
    /// Quiet window before a changed document is synced
    pub debounce_ms: u64,
    /// Seconds between consistency sweeps in `watch`; 0 disables them
    pub check_interval_secs: u64,
    /// Write `stable-id:` references where possible
    pub prefer_stable_id: bool,
    /// Processor setting overrides
    pub processors: BTreeMap<String, bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault: default_vault_dir(),
            heading: kinship_core::related_list::DEFAULT_HEADING.to_string(),
            debounce_ms: 500,
            check_interval_secs: 300,
            prefer_stable_id: true,
            processors: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Every settable key, processors included
    pub fn keys() -> Vec<String> {
        let mut keys: Vec<String> = ["vault", "heading", "debounce_ms", "check_interval_secs", "prefer_stable_id"]
            .iter()
            .map(|k| k.to_string())
            .collect();
        if let Ok(registry) = ProcessorRegistry::standard() {
            keys.extend(
                registry
                    .descriptors()
                    .iter()
                    .map(|d| format!("{PROCESSOR_PREFIX}{}", d.setting_key)),
            );
        }
        keys
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "vault" => Some(self.vault.display().to_string()),
            "heading" => Some(self.heading.clone()),
            "debounce_ms" => Some(self.debounce_ms.to_string()),
            "check_interval_secs" => Some(self.check_interval_secs.to_string()),
            "prefer_stable_id" => Some(self.prefer_stable_id.to_string()),
            _ => {
                let setting = key.strip_prefix(PROCESSOR_PREFIX)?;
                if let Some(value) = self.processors.get(setting) {
                    return Some(value.to_string());
                }
                let registry = ProcessorRegistry::standard().ok()?;
                let defaults = registry.default_settings();
                let value = defaults
                    .iter()
                    .find(|(k, _)| *k == setting)
                    .map(|(_, enabled)| enabled.to_string());
                value
            }
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "vault" => self.vault = PathBuf::from(value),
            "heading" => {
                let heading = value.trim().trim_start_matches('#').trim();
                anyhow::ensure!(!heading.is_empty(), "heading cannot be empty");
                self.heading = heading.to_string();
            }
            "debounce_ms" => self.debounce_ms = value.parse().context("debounce_ms must be a number")?,
            "check_interval_secs" => {
                self.check_interval_secs = value.parse().context("check_interval_secs must be a number")?
            }
            "prefer_stable_id" => self.prefer_stable_id = parse_bool(value)?,
            _ => {
                let Some(setting) = key.strip_prefix(PROCESSOR_PREFIX) else {
                    anyhow::bail!("Unknown config key: {}", key);
                };
                let enabled = parse_bool(value)?;
                let mut overrides = self.processors.clone();
                overrides.insert(setting.to_string(), enabled);
                // rejects settings no processor owns
                ProcessorRegistry::standard()?.settings(&overrides)?;
                self.processors = overrides;
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => anyhow::bail!("expected true or false, got '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_set_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kinship/config.toml");
        let mut config = Config::default();
        config.set("vault", "/tmp/contacts").unwrap();
        config.set("heading", "## People").unwrap();
        config.set("processors.consistency_processor", "on").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.vault, PathBuf::from("/tmp/contacts"));
        assert_eq!(loaded.heading, "People");
        assert_eq!(loaded.get("processors.consistency_processor").as_deref(), Some("true"));
        assert_eq!(loaded.get("processors.uid_processor").as_deref(), Some("true"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let mut config = Config::default();
        assert!(config.set("colour", "blue").is_err());
        assert!(config.set("processors.nope", "true").is_err());
        assert!(config.set("debounce_ms", "soon").is_err());
        assert!(config.processors.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "debounce_ms = 50\n\n[processors]\ngender_render_processor = false\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.heading, "Related");
        assert_eq!(config.processors.get("gender_render_processor"), Some(&false));
    }
}
