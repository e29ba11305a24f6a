//! Text protocol spoken over the traversal WebSocket.

use std::fmt::Write as _;

use maze_core::{MazeError, MazeId, SessionId, VertexId, VertexKind};

use crate::hub::Role;

pub const NOTICE_UNRECOGNIZED: &str =
    "Comando não reconhecido. Use 'ir: id_do_vertice' para se mover.";
pub const NOTICE_MALFORMED_MOVE: &str = "Comando inválido. Use 'ir: id_do_vertice'";
pub const NOTICE_INVALID_VERTEX: &str = "Vértice inválido.";
pub const NOTICE_OBSERVER_MOVE: &str = "Observadores não podem se mover.";
pub const NOTICE_IDLE: &str = "Conexão encerrada por inatividade.";
pub const NOTICE_SESSION_CLOSED: &str = "Sessão encerrada.";
pub const NOTICE_SESSION_NOT_FOUND: &str = "Sessão não encontrada.";
pub const NOTICE_MAZE_NOT_FOUND: &str = "Labirinto não encontrado.";
pub const NOTICE_VERTEX_ERROR: &str = "Erro ao acessar o vértice desejado.";

const MOVE_PREFIX: &str = "ir:";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `ir:<vertexId>`
    Move(VertexId),
    /// `historico`
    History,
    /// `labirinto`
    CurrentMaze,
    /// Anything else; answered with the usage notice.
    Unrecognized,
}

/// Parse one inbound frame. Only a move with a non-integer target is an error.
pub fn parse_command(raw: &str) -> Result<Command, MazeError> {
    let text = raw.trim();
    if let Some(arg) = text.strip_prefix(MOVE_PREFIX) {
        return arg
            .parse::<VertexId>()
            .map(Command::Move)
            .map_err(|_| MazeError::MalformedCommand(text.to_string()));
    }
    Ok(match text {
        "historico" => Command::History,
        "labirinto" => Command::CurrentMaze,
        _ => Command::Unrecognized,
    })
}

pub fn render_open(session_id: SessionId, role: Role) -> String {
    format!("Sessão: {session_id}, Papel: {}", role.label())
}

/// `Vértice atual: 1, Tipo: 0, Adjacentes(Vertice, Peso): [(2, 1), (3, 4)]`
pub fn render_state(vertex: VertexId, kind: VertexKind, adjacent: &[(VertexId, u32)]) -> String {
    let mut out = format!(
        "Vértice atual: {vertex}, Tipo: {}, Adjacentes(Vertice, Peso): [",
        kind.code()
    );
    for (i, (dest, weight)) in adjacent.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "({dest}, {weight})");
    }
    out.push(']');
    out
}

/// `[0, 1, 2]`
pub fn render_history(history: &[VertexId]) -> String {
    let items: Vec<String> = history.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}

pub fn render_current_maze(maze_id: MazeId) -> String {
    format!("Labirinto atual: {maze_id}")
}

/// The literal reply for an error surfaced to a client.
pub fn notice_for(err: &MazeError) -> &'static str {
    match err {
        MazeError::IllegalRole => NOTICE_OBSERVER_MOVE,
        MazeError::InvalidMove { .. } => NOTICE_INVALID_VERTEX,
        MazeError::MalformedCommand(_) => NOTICE_MALFORMED_MOVE,
        MazeError::SessionClosed(_) => NOTICE_SESSION_CLOSED,
        MazeError::SessionNotFound(_) => NOTICE_SESSION_NOT_FOUND,
        MazeError::GraphNotFound(_) => NOTICE_MAZE_NOT_FOUND,
        MazeError::VertexNotFound { .. }
        | MazeError::Inconsistent(_)
        | MazeError::Storage(_)
        | MazeError::InvalidGraph(_)
        | MazeError::GroupNotFound(_)
        | MazeError::PathRejected(_) => NOTICE_VERTEX_ERROR,
    }
}
