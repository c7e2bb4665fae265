use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use crate::aggregate::RoundPlan;
use crate::errors::BenchError;

pub const DEFAULT_COUNT: usize = 10_000;
pub const DEFAULT_ROUNDS: usize = 10;
pub const DEFAULT_WARMUP: usize = 1;

/// Values read from a TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub count: Option<usize>,
    pub rounds: Option<usize>,
    pub warmup: Option<usize>,
    pub find_repeat: Option<usize>,
    pub db_path: Option<PathBuf>,
}

/// Resolved benchmark parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Users inserted per round.
    pub count: usize,
    /// Measured rounds, not counting warm-up.
    pub rounds: usize,
    pub warmup: usize,
    pub find_repeat: usize,
    pub db_path: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            count: DEFAULT_COUNT,
            rounds: DEFAULT_ROUNDS,
            warmup: DEFAULT_WARMUP,
            find_repeat: 1,
            db_path: default_db_path(),
        }
    }
}

impl BenchConfig {
    /// Layer `file` over the defaults, then `overrides` over that.
    pub fn resolve(file: FileConfig, overrides: FileConfig) -> Self {
        let defaults = BenchConfig::default();
        BenchConfig {
            count: overrides.count.or(file.count).unwrap_or(defaults.count),
            rounds: overrides.rounds.or(file.rounds).unwrap_or(defaults.rounds),
            warmup: overrides.warmup.or(file.warmup).unwrap_or(defaults.warmup),
            find_repeat: overrides
                .find_repeat
                .or(file.find_repeat)
                .unwrap_or(defaults.find_repeat),
            db_path: overrides
                .db_path
                .or(file.db_path)
                .unwrap_or(defaults.db_path),
        }
    }

    pub fn plan(&self) -> Result<RoundPlan, BenchError> {
        RoundPlan::measured(self.rounds, self.warmup)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.find_repeat == 0 {
            return Err(BenchError::ZeroRepeat {
                op: "find".to_string(),
            });
        }
        self.plan().map(|_| ())
    }
}

fn default_db_path() -> PathBuf {
    std::env::temp_dir().join("crudbench.sqlite")
}

/// `$XDG_CONFIG_HOME/crudbench/config.toml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("crudbench").join("config.toml"))
}

/// Read `path`, or the default location when `path` is `None`.
///
/// A missing default file is not an error; a missing explicit file is.
pub fn load_file(path: Option<&Path>) -> Result<FileConfig> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) if p.is_file() => (p, false),
            _ => return Ok(FileConfig::default()),
        },
    };

    debug!(path = %path.display(), explicit, "loading config file");
    let text = std::fs::read_to_string(&path).map_err(|source| BenchError::ConfigRead {
        path: path.clone(),
        source,
    })?;
    parse(&text, &path)
}

fn parse(text: &str, path: &Path) -> Result<FileConfig> {
    toml::from_str(text).map_err(|e| {
        BenchError::ConfigParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        }
        .into()
    })
}
