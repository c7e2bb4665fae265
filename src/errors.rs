use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("Wrong backend provided: '{name}'. Supported: memory, sqlite, sqlite-file")]
    UnknownBackend { name: String },

    #[error("Invalid round plan: {total} total rounds with {warmup} warm-up rounds (need total > warm-up)")]
    InvalidPlan { total: usize, warmup: usize },

    #[error("Too many rounds: {measured} measured plus {warmup} warm-up rounds overflows the round counter")]
    TooManyRounds { measured: usize, warmup: usize },

    #[error("No rounds left to aggregate after discarding warm-up rounds")]
    NoRetainedRounds,

    #[error("Repeat count for '{op}' must be at least 1")]
    ZeroRepeat { op: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    #[error("Storage error during {operation}: {detail}")]
    Storage { operation: String, detail: String },
}
