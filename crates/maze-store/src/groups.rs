use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use maze_core::{CompletionLedger, GroupId, MazeError, MazeId};

use crate::database::Database;
use crate::error::StoreError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    pub id: GroupId,
    pub name: String,
    /// Completed maze ids in completion order.
    pub completed: Vec<MazeId>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct GroupRepo {
    db: Database,
}

impl GroupRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub fn create(&self, name: &str) -> Result<GroupRow, StoreError> {
        let id = GroupId::new();
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO groups (id, name, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id.to_string(), name, now],
            )?;
            Ok(())
        })?;
        tracing::info!(group_id = %id, "group registered");
        Ok(GroupRow {
            id,
            name: name.to_string(),
            completed: Vec::new(),
            created_at: now,
        })
    }

    #[instrument(skip(self), fields(group_id = %id))]
    pub fn exists(&self, id: GroupId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let found: Option<String> = conn
                .query_row(
                    "SELECT id FROM groups WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// All groups in registration order, each with its completed set.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<GroupRow>, StoreError> {
        let heads = self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, created_at FROM groups ORDER BY created_at, rowid")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        heads
            .into_iter()
            .map(|(raw_id, name, created_at)| {
                let id = parse_group_id(&raw_id)?;
                Ok(GroupRow {
                    id,
                    name,
                    completed: self.completed(id)?,
                    created_at,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(group_id = %id))]
    pub fn completed(&self, id: GroupId) -> Result<Vec<MazeId>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT maze_id FROM completed_mazes WHERE group_id = ?1 ORDER BY completed_at, rowid",
            )?;
            let rows = stmt
                .query_map([id.to_string()], |row| Ok(MazeId::new(row.get(0)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    #[instrument(skip(self), fields(group_id = %group, maze_id = %maze))]
    pub fn is_completed(&self, group: GroupId, maze: MazeId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT maze_id FROM completed_mazes WHERE group_id = ?1 AND maze_id = ?2",
                    rusqlite::params![group.to_string(), maze.get()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Idempotent union into the completed set. Returns `true` when the maze
    /// was not already present.
    #[instrument(skip(self), fields(group_id = %group, maze_id = %maze))]
    pub fn mark_completed(&self, group: GroupId, maze: MazeId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO completed_mazes (group_id, maze_id, completed_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![group.to_string(), maze.get(), Utc::now().to_rfc3339()],
            )?;
            Ok(changed > 0)
        })
    }
}

fn parse_group_id(raw: &str) -> Result<GroupId, StoreError> {
    Uuid::parse_str(raw)
        .map(GroupId::from_uuid)
        .map_err(|e| StoreError::CorruptRow {
            table: "groups",
            detail: format!("bad id {raw}: {e}"),
        })
}

impl CompletionLedger for GroupRepo {
    fn group_exists(&self, group_id: GroupId) -> Result<bool, MazeError> {
        Ok(self.exists(group_id)?)
    }

    fn is_completed(&self, group_id: GroupId, maze_id: MazeId) -> Result<bool, MazeError> {
        Ok(GroupRepo::is_completed(self, group_id, maze_id)?)
    }

    fn mark_completed(&self, group_id: GroupId, maze_id: MazeId) -> Result<bool, MazeError> {
        Ok(GroupRepo::mark_completed(self, group_id, maze_id)?)
    }
}
