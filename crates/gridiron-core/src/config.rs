// Configuration loading and parsing (config/gridiron.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{Position, RosterSlots, ScoringMode, SUPPORTED_CAPACITIES};

pub const CONFIG_FILE: &str = "gridiron.toml";

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
// gridiron.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub league_defaults: LeagueDefaults,
    #[serde(default)]
    pub data: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "gridiron_core=info,gridiron=info,warn".into(),
        }
    }
}

/// Settings applied to `league create` when the command line leaves them out.
#[derive(Debug, Clone, Deserialize)]
pub struct LeagueDefaults {
    pub capacity: u32,
    pub scoring_mode: ScoringMode,
    pub roster: RosterSlots,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub players: String,
}

impl Default for DataPaths {
    fn default() -> Self {
        DataPaths {
            players: "data/players.json".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate `config/gridiron.toml` relative to `base_dir`.
///
/// Does not copy defaults; prefer `load_config()` for that.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
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

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database.path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    let defaults = &config.league_defaults;
    if !SUPPORTED_CAPACITIES.contains(&defaults.capacity) {
        return Err(ConfigError::ValidationError {
            field: "league_defaults.capacity".into(),
            message: format!(
                "must be one of {:?}, got {}",
                SUPPORTED_CAPACITIES, defaults.capacity
            ),
        });
    }

    // Every fixed position needs a starter; FLEX and BENCH may be 0.
    for pos in Position::ALL {
        if defaults.roster.required(pos) == 0 {
            return Err(ConfigError::ValidationError {
                field: format!("league_defaults.roster.{}", pos.display_str()),
                message: "must be >= 1".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Workspace root holding `defaults/`, found from this crate's manifest.
    fn project_root() -> PathBuf {
        let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        manifest
            .ancestors()
            .find(|dir| dir.join("defaults").join(CONFIG_FILE).exists())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| panic!("Cannot locate defaults/ above {:?}", manifest))
    }

    /// Scratch dir with `config/gridiron.toml` holding `contents`.
    fn scratch_with(name: &str, contents: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config").join(CONFIG_FILE), contents).unwrap();
        tmp
    }

    fn default_text() -> String {
        fs::read_to_string(project_root().join("defaults").join(CONFIG_FILE)).unwrap()
    }

    #[test]
    fn load_valid_config_from_defaults() {
        let tmp = std::env::temp_dir().join("gridiron_config_test_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults").join(CONFIG_FILE), default_text()).unwrap();

        ensure_config_files(&tmp).expect("should copy default configs");
        let config = load_config_from(&tmp).expect("should load valid config");

        assert_eq!(config.database.path, "gridiron.db");
        assert_eq!(config.league_defaults.capacity, 10);
        assert_eq!(config.league_defaults.scoring_mode, ScoringMode::Ppr);
        assert_eq!(config.league_defaults.roster, RosterSlots::default());
        assert_eq!(config.league_defaults.roster.total(), 14);
        assert_eq!(config.data.players, "data/players.json");
        assert!(config.logging.filter.contains("gridiron_core=info"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn optional_sections_fall_back() {
        let tmp = scratch_with(
            "gridiron_config_test_optional",
            r#"
[database]
path = "league.db"

[league_defaults]
capacity = 8
scoring_mode = "standard"

[league_defaults.roster]
QB = 1
RB = 2
WR = 3
TE = 1
K = 1
DEF = 1
BENCH = 5
"#,
        );

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.league_defaults.roster.flex, 0);
        assert_eq!(config.league_defaults.roster.wr, 3);
        assert_eq!(config.data.players, "data/players.json");
        assert_eq!(config.logging.filter, LoggingConfig::default().filter);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unsupported_capacity() {
        let text = default_text().replace("capacity = 10", "capacity = 9");
        let tmp = scratch_with("gridiron_config_test_capacity", &text);

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "league_defaults.capacity");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_position_without_starter() {
        let text = default_text().replace("K = 1", "K = 0");
        let tmp = scratch_with("gridiron_config_test_kicker", &text);

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "league_defaults.roster.K");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_database_path() {
        let text = default_text().replace("path = \"gridiron.db\"", "path = \"\"");
        let tmp = scratch_with("gridiron_config_test_db_path", &text);

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "database.path"),
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = scratch_with("gridiron_config_test_invalid", "this is not valid [[[ toml");

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected ParseError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_unknown_scoring_mode() {
        let text = default_text().replace("scoring_mode = \"ppr\"", "scoring_mode = \"half\"");
        let tmp = scratch_with("gridiron_config_test_scoring", &text);
        assert!(matches!(
            load_config_from(&tmp),
            Err(ConfigError::ParseError { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_config() {
        let tmp = std::env::temp_dir().join("gridiron_config_test_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_and_skips_existing() {
        let tmp = std::env::temp_dir().join("gridiron_config_test_ensure");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::write(defaults_dir.join(CONFIG_FILE), default_text()).unwrap();
        fs::write(defaults_dir.join("gridiron.toml.example"), "# template\n").unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(tmp.join("config").join(CONFIG_FILE).exists());
        assert!(!tmp.join("config/gridiron.toml.example").exists());

        fs::write(tmp.join("config").join(CONFIG_FILE), "# custom\n").unwrap();
        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert!(copied.is_empty());
        let content = fs::read_to_string(tmp.join("config").join(CONFIG_FILE)).unwrap();
        assert_eq!(content, "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("gridiron_config_test_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        match ensure_config_files(&tmp).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("neither defaults/ nor config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }
}
