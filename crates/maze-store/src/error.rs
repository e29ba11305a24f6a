use maze_core::MazeError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    /// A stored row no longer satisfies the domain invariants.
    #[error("corrupt row in {table}: {detail}")]
    CorruptRow { table: &'static str, detail: String },

    #[error("IO error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<StoreError> for MazeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CorruptRow { .. } => MazeError::Inconsistent(e.to_string()),
            other => MazeError::Storage(other.to_string()),
        }
    }
}
