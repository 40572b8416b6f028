//! External configuration loader.
//!
//! Reads `robologic.toml` from the working directory (or the executable's
//! directory), or an explicit `--config` path. Missing files and missing keys
//! fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use robologic_core::{GRID_SIZE, scheduler::Pacing, session::SessionConfig};

pub const CONFIG_FILE_NAME: &str = "robologic.toml";

// ── Public Config Struct ──

#[derive(Clone, Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    pub pacing: PacingConfig,
    pub game: GameplayConfig,
    pub generator: GeneratorConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PacingConfig {
    pub first_delay_ms: u64,
    pub interval_ms: u64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameplayConfig {
    pub difficulty: String,
}

/// Connection settings for the generative level and hint service.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Empty means no service; levels and hints fall back offline.
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: PathBuf,
    /// Used when `RUST_LOG` is not set.
    pub filter: String,
}

// ── Defaults ──

impl Default for PacingConfig {
    fn default() -> Self {
        let pacing = Pacing::default();
        PacingConfig {
            first_delay_ms: pacing.first_delay.as_millis() as u64,
            interval_ms: pacing.interval.as_millis() as u64,
        }
    }
}

impl Default for GameplayConfig {
    fn default() -> Self {
        GameplayConfig {
            difficulty: "Medium".into(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            api_key: String::new(),
            model: "gemini-2.5-flash".into(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            file: PathBuf::from("robologic.log"),
            filter: "info".into(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Loads `path` if given; otherwise searches the working directory and
    /// then the executable's directory for `robologic.toml`.
    ///
    /// An explicit path must exist and parse. A file found by searching that
    /// fails to parse is reported on stderr and replaced by defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        for dir in candidate_dirs() {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return match Self::from_file(&candidate) {
                    Ok(config) => Ok(config),
                    Err(e) => {
                        eprintln!("Warning: {e:#}");
                        eprintln!("Using default settings.");
                        Ok(GameConfig::default())
                    }
                };
            }
        }
        Ok(GameConfig::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("{} parse error", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            first_delay: Duration::from_millis(self.pacing.first_delay_ms),
            interval: Duration::from_millis(self.pacing.interval_ms.max(1)),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            difficulty: self.game.difficulty.clone(),
            grid_size: GRID_SIZE,
            pacing: self.pacing(),
        }
    }
}

/// Candidate directories to search: CWD, then the executable's directory.
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            if !dirs.iter().any(|d| d == parent) {
                dirs.push(parent.to_path_buf());
            }
        }
    }

    dirs
}
