//! Settings type definitions.
//!
//! Every section is `#[serde(default)]`, so a settings file only needs the
//! keys it changes.

mod server;

pub use server::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000, "idle_timeout_ms": 30000 },
///   "logging": { "level": "debug", "modules": { "maze_store": "warn" } }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MazeSettings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

/// Where mazes, groups and progress records live.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite file path. `:memory:` keeps everything in process memory.
    pub database_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: crate::loader::maze_home()
                .join("maze.db")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

impl StorageSettings {
    pub fn is_in_memory(&self) -> bool {
        self.database_path == ":memory:"
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level. `RUST_LOG` takes precedence when set.
    pub level: String,
    /// JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-module level overrides, e.g. `{"maze_engine": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
            modules: BTreeMap::new(),
        }
    }
}

impl LoggingSettings {
    pub fn module_pairs(&self) -> Vec<(String, String)> {
        self.modules
            .iter()
            .map(|(m, l)| (m.clone(), l.clone()))
            .collect()
    }
}
