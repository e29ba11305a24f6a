//! Tracing subscriber setup for the maze server.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "maze_engine" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit one JSON object per event instead of human-readable lines.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: true,
        }
    }
}

impl TelemetryConfig {
    /// Build from the string form used in settings files. Unknown level names
    /// fall back to INFO and are reported after the subscriber is installed.
    pub fn from_strings(level: &str, modules: &[(String, String)], json: bool) -> (Self, Vec<String>) {
        let mut rejected = Vec::new();
        let log_level = Level::from_str(level).unwrap_or_else(|_| {
            rejected.push(level.to_string());
            Level::INFO
        });
        let module_levels = modules
            .iter()
            .filter_map(|(module, lvl)| match Level::from_str(lvl) {
                Ok(l) => Some((module.clone(), l)),
                Err(_) => {
                    rejected.push(format!("{module}={lvl}"));
                    None
                }
            })
            .collect();
        (
            Self {
                log_level,
                module_levels,
                json,
            },
            rejected,
        )
    }

    /// Filter directive string derived from the config, e.g. `info,maze_engine=debug`.
    pub fn filter_directives(&self) -> String {
        let mut filter_str = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter_str.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter_str
    }
}

/// Returned by [`init_telemetry`]; keep it alive for the life of the process.
pub struct TelemetryGuard {
    installed: bool,
    module_levels: Vec<(String, Level)>,
}

impl TelemetryGuard {
    /// False when another global subscriber was already set (common in tests).
    pub fn installed(&self) -> bool {
        self.installed
    }

    /// Per-module log level overrides in effect at startup.
    pub fn module_levels(&self) -> &[(String, Level)] {
        &self.module_levels
    }
}

/// Initialize the telemetry subsystem. Call once at startup.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let filter_str = config.filter_directives();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(env_filter)
            .boxed()
    };

    let installed = tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_ok();

    TelemetryGuard {
        installed,
        module_levels: config.module_levels,
    }
}
