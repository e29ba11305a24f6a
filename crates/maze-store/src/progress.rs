use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use maze_core::{GroupId, MazeError, MazeId, OutcomeSink, SessionOutcome};

use crate::database::Database;
use crate::error::StoreError;

/// Latest recorded traversal of one maze by one group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressRow {
    pub maze_id: MazeId,
    pub difficulty: String,
    pub completed: bool,
    pub steps: u64,
    pub exploration: Option<f64>,
    pub flagged: bool,
    pub updated_at: String,
}

#[derive(Clone)]
pub struct ProgressRepo {
    db: Database,
}

impl ProgressRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Overwrite the (group, maze) record with this outcome.
    #[instrument(skip(self, outcome), fields(
        group_id = %outcome.group_id,
        maze_id = %outcome.maze_id,
        session_id = %outcome.session_id,
    ))]
    pub fn upsert(&self, outcome: &SessionOutcome) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO group_progress
                    (group_id, maze_id, session_id, steps, exploration, flagged, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (group_id, maze_id) DO UPDATE SET
                    session_id = excluded.session_id,
                    steps = excluded.steps,
                    exploration = excluded.exploration,
                    flagged = excluded.flagged,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    outcome.group_id.to_string(),
                    outcome.maze_id.get(),
                    outcome.session_id.get() as i64,
                    outcome.steps as i64,
                    outcome.exploration,
                    outcome.flagged,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Progress rows for a group, joined with maze difficulty and the
    /// group's completed set. Ordered by maze id.
    #[instrument(skip(self), fields(group_id = %group))]
    pub fn list_for_group(&self, group: GroupId) -> Result<Vec<ProgressRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.maze_id, m.difficulty,
                        EXISTS (SELECT 1 FROM completed_mazes c
                                WHERE c.group_id = p.group_id AND c.maze_id = p.maze_id),
                        p.steps, p.exploration, p.flagged, p.updated_at
                 FROM group_progress p
                 JOIN mazes m ON m.id = p.maze_id
                 WHERE p.group_id = ?1
                 ORDER BY p.maze_id",
            )?;
            let rows = stmt
                .query_map([group.to_string()], |row| {
                    Ok(ProgressRow {
                        maze_id: MazeId::new(row.get(0)?),
                        difficulty: row.get(1)?,
                        completed: row.get(2)?,
                        steps: row.get::<_, i64>(3)?.max(0) as u64,
                        exploration: row.get(4)?,
                        flagged: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

impl OutcomeSink for ProgressRepo {
    fn record_session_outcome(&self, outcome: &SessionOutcome) -> Result<(), MazeError> {
        Ok(self.upsert(outcome)?)
    }
}
