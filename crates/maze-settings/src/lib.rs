//! # maze-settings
//!
//! Layered configuration for the maze server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`MazeSettings::default()`]
//! 2. **User file**: `~/.maze/settings.json` or the `--config` path
//! 3. **Environment variables**: `MAZE_*` overrides
//!
//! ```no_run
//! let settings = maze_settings::load_settings().unwrap_or_default();
//! println!("listening on port {}", settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, maze_home, settings_path};
pub use types::*;
