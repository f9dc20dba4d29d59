//! Configuration types.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::catalog::Catalog;
use crate::conversation::Script;
use crate::eligibility::Ranking;
use crate::error::{ConfigError, Result};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// How matched programs are ordered.
    pub ranking: Ranking,
    /// JSON catalog replacing the built-in one.
    pub catalog_path: Option<PathBuf>,
    /// JSON conversation script replacing the built-in one.
    pub script_path: Option<PathBuf>,
    /// Capacity of the outbound session event channel.
    pub event_capacity: usize,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ranking: Ranking::Catalog,
            catalog_path: None,
            script_path: None,
            event_capacity: 64,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `NAVIGATOR_*` environment variables.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ranking) = lookup("NAVIGATOR_RANKING") {
            config.ranking = match ranking.trim().to_lowercase().as_str() {
                "catalog" => Ranking::Catalog,
                "specificity" => Ranking::Specificity,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "NAVIGATOR_RANKING".to_string(),
                        message: format!("expected catalog or specificity, got {other:?}"),
                    });
                }
            };
        }
        if let Some(path) = lookup("NAVIGATOR_CATALOG").filter(|p| !p.trim().is_empty()) {
            config.catalog_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("NAVIGATOR_SCRIPT").filter(|p| !p.trim().is_empty()) {
            config.script_path = Some(PathBuf::from(path));
        }
        if let Some(capacity) = lookup("NAVIGATOR_EVENT_CAPACITY") {
            config.event_capacity = match capacity.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "NAVIGATOR_EVENT_CAPACITY".to_string(),
                        message: format!("expected a positive integer, got {capacity:?}"),
                    });
                }
            };
        }
        if let Some(filter) = lookup("NAVIGATOR_LOG").filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }

        Ok(config)
    }

    /// The configured catalog, or the built-in one.
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => {
                let catalog = Catalog::from_json(&read(path)?)?;
                info!(path = %path.display(), programs = catalog.len(), "Loaded catalog");
                Ok(catalog)
            }
            None => Ok(Catalog::builtin()?),
        }
    }

    /// The configured conversation script, or the built-in one.
    pub fn load_script(&self) -> Result<Script> {
        match &self.script_path {
            Some(path) => {
                let script = Script::from_json(&read(path)?)?;
                info!(path = %path.display(), fields = script.fields().len(), "Loaded script");
                Ok(script)
            }
            None => Ok(Script::builtin()?),
        }
    }
}

fn read(path: &Path) -> std::result::Result<String, ConfigError> {
    Ok(std::fs::read_to_string(path)?)
}
