//! # maze
//!
//! Maze traversal server binary: loads settings, opens the database and
//! serves the REST + WebSocket surface until Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use maze_server::MazeDefinition;
use maze_settings::MazeSettings;
use maze_store::Database;
use maze_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "maze", about = "Maze traversal session server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP/WebSocket server.
    Serve {
        /// Settings file (defaults to `~/.maze/settings.json`).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind (overrides settings).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, 0 for auto-assign (overrides settings).
        #[arg(long)]
        port: Option<u16>,

        /// `SQLite` database path or `:memory:` (overrides settings).
        #[arg(long)]
        db_path: Option<String>,
    },
    /// Validate a maze definition file and print a summary.
    CheckMaze {
        /// JSON file in the `/labirinto` request format.
        file: PathBuf,
    },
}

fn load(config: Option<&PathBuf>) -> Result<MazeSettings> {
    let settings = match config {
        Some(path) => maze_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => maze_settings::load_settings().context("Failed to load settings")?,
    };
    Ok(settings)
}

/// Command-line values win over the settings file and `MAZE_*` env vars.
fn apply_overrides(
    mut settings: MazeSettings,
    host: Option<String>,
    port: Option<u16>,
    db_path: Option<String>,
) -> MazeSettings {
    if let Some(host) = host {
        settings.server.host = host;
    }
    if let Some(port) = port {
        settings.server.port = port;
    }
    if let Some(db_path) = db_path {
        settings.storage.database_path = db_path;
    }
    settings
}

async fn serve(settings: MazeSettings) -> Result<()> {
    let (telemetry, rejected) = TelemetryConfig::from_strings(
        &settings.logging.level,
        &settings.logging.module_pairs(),
        settings.logging.json,
    );
    let telemetry = init_telemetry(telemetry);
    for level in rejected {
        tracing::warn!(level = %level, "unknown log level in settings, using info");
    }
    for (module, level) in telemetry.module_levels() {
        tracing::debug!(module = %module, %level, "module log level override");
    }

    let db = Database::open_configured(&settings.storage.database_path)
        .context("Failed to open database")?;
    if settings.storage.is_in_memory() {
        tracing::warn!("using an in-memory database; progress is lost on exit");
    }

    let handle = maze_server::start(settings.server, db)
        .await
        .context("Failed to start server")?;
    tracing::info!(port = handle.port(), "listening");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("shutting down");
    handle.shutdown(Some(Duration::from_secs(10))).await;
    Ok(())
}

fn check_maze(file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let definition: MazeDefinition =
        serde_json::from_str(&content).context("Maze file is not valid JSON")?;
    let graph = definition.to_graph().context("Maze is invalid")?;

    let unreachable: Vec<i64> = graph
        .unreachable_from_entrance()
        .into_iter()
        .map(|v| v.get())
        .collect();
    let summary = json!({
        "vertices": graph.vertex_count(),
        "edges": graph.edge_count(),
        "entrance": graph.entrance().get(),
        "exits": graph.exits().iter().map(|v| v.get()).collect::<Vec<_>>(),
        "unreachable": unreachable,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            db_path,
        } => {
            let settings = apply_overrides(load(config.as_ref())?, host, port, db_path);
            serve(settings).await
        }
        Command::CheckMaze { file } => check_maze(&file),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::parse_from(["maze", "serve", "--port", "0", "--db-path", ":memory:"]);
        match cli.command {
            Command::Serve { port, db_path, .. } => {
                assert_eq!(port, Some(0));
                assert_eq!(db_path.as_deref(), Some(":memory:"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_overrides_reach_server_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server":{{"host":"10.0.0.1","port":9000,"idle_timeout_ms":1500}}}}"#
        )
        .unwrap();
        let loaded = maze_settings::load_settings_from_path(file.path()).unwrap();
        let settings = apply_overrides(loaded, None, Some(0), Some(":memory:".into()));

        assert_eq!(settings.server.host, "10.0.0.1");
        assert_eq!(settings.server.port, 0);
        assert_eq!(settings.server.idle_timeout_ms, 1500);
        assert!(settings.storage.is_in_memory());
    }

    #[test]
    fn absent_overrides_keep_loaded_values() {
        let settings = apply_overrides(MazeSettings::default(), None, None, None);
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn check_maze_accepts_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"vertices":[{{"id":0,"tipo":1}},{{"id":1,"tipo":2}}],
                "arestas":[{{"origemId":0,"destinoId":1,"peso":1}}],
                "entrada":0}}"#
        )
        .unwrap();
        assert!(check_maze(file.path()).is_ok());
    }

    #[test]
    fn check_maze_rejects_missing_exit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"vertices":[{{"id":0,"tipo":1}}],"arestas":[],"entrada":0}}"#
        )
        .unwrap();
        let err = check_maze(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("no exit vertex"));
    }
}
