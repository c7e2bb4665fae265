use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Serialize;

use crate::errors::BenchError;

/// A timed operation within a round, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Insert,
    Find,
    Update,
    Remove,
}

impl Op {
    pub const ALL: [Op; 4] = [Op::Insert, Op::Find, Op::Update, Op::Remove];

    pub fn name(self) -> &'static str {
        match self {
            Op::Insert => "insert",
            Op::Find => "find",
            Op::Update => "update",
            Op::Remove => "remove",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage backend selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    Memory,
    Sqlite,
    SqliteFile,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Sqlite => "sqlite",
            Backend::SqliteFile => "sqlite-file",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Backend::Memory),
            "sqlite" => Ok(Backend::Sqlite),
            "sqlite-file" => Ok(Backend::SqliteFile),
            _ => Err(BenchError::UnknownBackend {
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// The benchmarked entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Assigned by the store on insert; zero until persisted.
    pub id: i64,
    pub id2: i64,
    pub ready: bool,
    pub priority: i64,
    pub name: String,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        User {
            id: 0,
            id2: 0,
            ready: false,
            priority: 0,
            name: name.into(),
        }
    }

    /// The `i`-th fresh user created by an insert round.
    pub fn fixture(i: usize) -> Self {
        let mut user = User::new(format!("Peter {}", i));
        user.id2 = i as i64;
        user.ready = true;
        user.priority = 5;
        user
    }
}
