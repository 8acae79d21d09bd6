// Configuration loading and validation (config/leaderdraft.toml).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use leaderdraft_core::{DraftStrategy, ShuffleLimits, StrategyRegistry};
use serde::Deserialize;
use thiserror::Error;

use crate::service::EngineKind;

const CONFIG_FILE: &str = "leaderdraft.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub draft: DraftConfig,
    pub shuffle: ShuffleLimits,
    pub catalog: CatalogConfig,
    pub roster: RosterConfig,
    pub strategies: Vec<DraftStrategy>,
}

impl Config {
    pub fn strategy(&self, name: &str) -> Option<&DraftStrategy> {
        self.strategies.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DraftConfig {
    #[serde(default)]
    pub engine: EngineKind,
    pub strategy: String,
    /// Upper bound on every repository round trip of one draft.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Fixed seed for reproducible draws; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    /// Leader CSV imported on startup.
    pub csv: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterConfig {
    /// Player names registered on startup.
    #[serde(default)]
    pub players: Vec<String>,
}

// Raw TOML shape.

#[derive(Debug, Deserialize)]
struct ConfigFile {
    database: DatabaseSection,
    draft: DraftConfig,
    #[serde(default)]
    shuffle: ShuffleLimits,
    #[serde(default)]
    catalog: CatalogConfig,
    #[serde(default)]
    roster: RosterConfig,
    #[serde(default)]
    strategies: Vec<DraftStrategy>,
}

#[derive(Debug, Deserialize)]
struct DatabaseSection {
    path: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load `config/leaderdraft.toml` relative to `base_dir` without copying
/// defaults. Prefer [`load_config`].
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let config = Config {
        db_path: file.database.path,
        draft: file.draft,
        shuffle: file.shuffle,
        catalog: file.catalog,
        roster: file.roster,
        strategies: file.strategies,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy `defaults/leaderdraft.toml` into `config/` unless a copy is
/// already there. Returns the path written, if any.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let config_dir = base_dir.join("config");
    let target = config_dir.join(CONFIG_FILE);
    if target.exists() {
        return Ok(None);
    }

    let source = base_dir.join("defaults").join(CONFIG_FILE);
    if !source.is_file() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "{CONFIG_FILE} found in neither config/ nor defaults/ under {}",
                base_dir.display()
            ),
        });
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;
    std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to copy {}: {e}", source.display()),
    })?;
    Ok(Some(target))
}

/// Load config relative to the current working directory, copying defaults
/// first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_file(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.db_path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }
    if config.draft.timeout_ms == 0 {
        return Err(invalid("draft.timeout_ms", "must be greater than 0"));
    }
    if config.shuffle.max_attempts == 0 {
        return Err(invalid("shuffle.max_attempts", "must be greater than 0"));
    }
    if config.shuffle.max_player_attempts == 0 {
        return Err(invalid("shuffle.max_player_attempts", "must be greater than 0"));
    }

    let mut names = HashSet::new();
    for (i, strategy) in config.strategies.iter().enumerate() {
        if !names.insert(strategy.name.as_str()) {
            return Err(invalid(
                format!("strategies[{i}].name"),
                format!("duplicate strategy `{}`", strategy.name),
            ));
        }
        strategy
            .validate()
            .map_err(|e| invalid(format!("strategies[{i}]"), e.to_string()))?;
    }

    let selected = &config.draft.strategy;
    if config.strategy(selected).is_none() {
        return Err(invalid(
            "draft.strategy",
            format!("`{selected}` is not a configured strategy"),
        ));
    }
    if config.draft.engine == EngineKind::Shuffler {
        let registry = StrategyRegistry::with_builtins();
        if !registry.contains(selected) {
            return Err(invalid(
                "draft.strategy",
                format!(
                    "the shuffler has no strategy `{selected}` (known: {})",
                    registry.names().join(", ")
                ),
            ));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
