/// SQL DDL for the maze database.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS mazes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entrance INTEGER NOT NULL,
    difficulty TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vertices (
    maze_id INTEGER NOT NULL REFERENCES mazes(id) ON DELETE CASCADE,
    id INTEGER NOT NULL,
    kind INTEGER NOT NULL,
    seq INTEGER NOT NULL,
    PRIMARY KEY (maze_id, id)
);

CREATE TABLE IF NOT EXISTS edges (
    maze_id INTEGER NOT NULL REFERENCES mazes(id) ON DELETE CASCADE,
    origin INTEGER NOT NULL,
    dest INTEGER NOT NULL,
    weight INTEGER NOT NULL,
    seq INTEGER NOT NULL,
    PRIMARY KEY (maze_id, origin, dest)
);

CREATE TABLE IF NOT EXISTS groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS completed_mazes (
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    maze_id INTEGER NOT NULL REFERENCES mazes(id) ON DELETE CASCADE,
    completed_at TEXT NOT NULL,
    PRIMARY KEY (group_id, maze_id)
);

CREATE TABLE IF NOT EXISTS group_progress (
    group_id TEXT NOT NULL,
    maze_id INTEGER NOT NULL,
    session_id INTEGER NOT NULL,
    steps INTEGER NOT NULL,
    exploration REAL,
    flagged INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (group_id, maze_id)
);

CREATE INDEX IF NOT EXISTS idx_vertices_maze_seq ON vertices(maze_id, seq);
CREATE INDEX IF NOT EXISTS idx_edges_maze_seq ON edges(maze_id, seq);
CREATE INDEX IF NOT EXISTS idx_progress_group ON group_progress(group_id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
