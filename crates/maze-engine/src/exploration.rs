//! Step count and exploration ratio for a finished session.

use maze_core::{MazeError, SessionOutcome};

use crate::session::Session;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Metrics {
    pub steps: u64,
    /// `steps / total_vertices`, uncapped: revisits push it past 1.0.
    pub exploration: f64,
}

pub fn compute(history_len: usize, total_vertices: usize) -> Result<Metrics, MazeError> {
    if total_vertices == 0 {
        return Err(MazeError::Inconsistent(
            "maze has zero vertices".to_string(),
        ));
    }
    let steps = history_len.saturating_sub(1) as u64;
    Ok(Metrics {
        steps,
        exploration: steps as f64 / total_vertices as f64,
    })
}

/// Build the record handed to the outcome sink. A metrics failure or an
/// earlier fatal error yields a flagged record instead of an error.
pub fn outcome_for(session: &Session, flagged: bool) -> SessionOutcome {
    let (steps, exploration, flagged) =
        match compute(session.history().len(), session.graph().vertex_count()) {
            Ok(m) => (m.steps, Some(m.exploration), flagged),
            Err(e) => {
                tracing::error!(session_id = %session.id(), error = %e, "exploration metrics unavailable");
                (session.steps(), None, true)
            }
        };
    SessionOutcome {
        group_id: session.group_id(),
        maze_id: session.maze_id(),
        session_id: session.id(),
        steps,
        exploration,
        flagged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_exact_and_uncapped() {
        // 4 vertices, 6 moves
        let m = compute(7, 4).unwrap();
        assert_eq!(m.steps, 6);
        assert_eq!(m.exploration, 1.5);
    }

    #[test]
    fn fresh_session_has_zero_steps() {
        let m = compute(1, 3).unwrap();
        assert_eq!(m.steps, 0);
        assert_eq!(m.exploration, 0.0);
    }

    #[test]
    fn zero_vertices_is_inconsistent() {
        let err = compute(3, 0).unwrap_err();
        assert!(err.is_fatal_for_session());
    }
}
