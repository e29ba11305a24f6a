//! Traversal engine: attach, command dispatch, detach and finalization.
//!
//! Every operation locks exactly one session cell. State changes and the
//! broadcast that announces them happen inside that lock, and the outcome
//! record is written after the lock is released.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use maze_core::{ConnectionId, GroupId, MazeError, MazeId, OutcomeSink, SessionId, SessionOutcome};

use crate::graph_store::GraphStore;
use crate::hub::{Outbox, Role};
use crate::movement;
use crate::protocol::{self, Command};
use crate::registry::{SessionCell, SessionRegistry, SessionSnapshot};

/// Parameters of a WebSocket attach.
#[derive(Clone, Debug)]
pub struct AttachRequest {
    pub group_id: GroupId,
    pub maze_id: MazeId,
    /// Resume this session instead of creating one.
    pub session_id: Option<SessionId>,
    pub observer: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attached {
    pub session_id: SessionId,
    pub role: Role,
}

pub struct TraversalEngine {
    graphs: Arc<GraphStore>,
    registry: SessionRegistry,
    sink: Arc<dyn OutcomeSink>,
}

impl TraversalEngine {
    pub fn new(graphs: Arc<GraphStore>, sink: Arc<dyn OutcomeSink>) -> Self {
        Self {
            graphs,
            registry: SessionRegistry::new(),
            sink,
        }
    }

    pub fn graphs(&self) -> &Arc<GraphStore> {
        &self.graphs
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Create or join a session and register `outbox` with it. The new
    /// member receives the current state followed by the open notice.
    #[instrument(skip_all, fields(
        group_id = %req.group_id,
        maze_id = %req.maze_id,
        connection_id = %outbox.id(),
    ))]
    pub fn attach(&self, req: AttachRequest, outbox: Outbox) -> Result<Attached, MazeError> {
        let conn = outbox.id().clone();
        match req.session_id {
            None => {
                let graph = self.graphs.load(req.maze_id)?;
                let (session_id, shared, greeted) =
                    self.registry
                        .create_session_with(req.group_id, graph, |cell| {
                            let role = cell.members.attach(outbox, req.observer);
                            greet(cell, &conn, role).map(|()| role)
                        });
                let role = match greeted {
                    Ok(role) => role,
                    Err(e) => {
                        let outcome = {
                            let mut cell = shared.lock();
                            cell.flagged = true;
                            self.registry.retire(&mut cell)
                        };
                        self.record(outcome);
                        return Err(e);
                    }
                };
                info!(%session_id, role = role.label(), "session created");
                let outcome = {
                    let mut cell = shared.lock();
                    self.settle(&mut cell)
                };
                self.record(outcome);
                Ok(Attached { session_id, role })
            }
            Some(session_id) => {
                let shared = self.registry.get(session_id)?;
                let (result, outcome) = {
                    let mut cell = shared.lock();
                    if cell.session.is_closed() {
                        return Err(MazeError::SessionClosed(session_id));
                    }
                    if cell.session.group_id() != req.group_id
                        || cell.session.maze_id() != req.maze_id
                    {
                        warn!(%session_id, "resume rejected: group or maze mismatch");
                        return Err(MazeError::SessionNotFound(session_id));
                    }
                    let role = cell.members.attach(outbox, req.observer);
                    match greet(&mut cell, &conn, role) {
                        Ok(()) => {
                            info!(%session_id, role = role.label(), "session joined");
                            (Ok(Attached { session_id, role }), self.settle(&mut cell))
                        }
                        Err(e) => {
                            let outcome = self.fail(&mut cell, &e);
                            (Err(e), outcome)
                        }
                    }
                };
                self.record(outcome);
                result
            }
        }
    }

    /// Handle one inbound text frame from `conn`.
    ///
    /// Local rejections and query answers are sent to the requester and
    /// return `Ok`. An `Err` means the requester's connection is done: the
    /// session is gone, or a fatal error just closed it.
    #[instrument(skip_all, fields(session_id = %session_id, connection_id = %conn))]
    pub fn handle_command(
        &self,
        session_id: SessionId,
        conn: &ConnectionId,
        raw: &str,
    ) -> Result<(), MazeError> {
        let shared = self.registry.get(session_id)?;
        let (result, outcome) = {
            let mut cell = shared.lock();
            if cell.session.is_closed() {
                return Err(MazeError::SessionClosed(session_id));
            }
            let result = self.dispatch(&mut cell, conn, raw);
            let outcome = match &result {
                Err(e) if e.is_fatal_for_session() => self.fail(&mut cell, e),
                _ => self.settle(&mut cell),
            };
            (result, outcome)
        };
        self.record(outcome);
        result
    }

    fn dispatch(
        &self,
        cell: &mut SessionCell,
        conn: &ConnectionId,
        raw: &str,
    ) -> Result<(), MazeError> {
        let session_id = cell.session.id();
        let command = match protocol::parse_command(raw) {
            Ok(command) => command,
            Err(e) => {
                debug!(error_kind = e.error_kind(), "rejected command");
                cell.members.send_to(session_id, conn, protocol::notice_for(&e).into());
                return Ok(());
            }
        };

        let reply = match command {
            Command::Move(target) => match movement::apply_move(cell, conn, target) {
                Ok(state) => {
                    debug!(vertex = %target, steps = cell.session.steps(), "moved");
                    let state: Arc<str> = state.into();
                    let _ = cell.members.broadcast(session_id, &state);
                    return Ok(());
                }
                Err(e) if e.is_local() => {
                    debug!(error_kind = e.error_kind(), "move rejected");
                    protocol::notice_for(&e).to_string()
                }
                Err(e) => return Err(e),
            },
            Command::History => protocol::render_history(cell.session.history()),
            Command::CurrentMaze => protocol::render_current_maze(cell.session.maze_id()),
            Command::Unrecognized => protocol::NOTICE_UNRECOGNIZED.to_string(),
        };
        cell.members.send_to(session_id, conn, reply.into());
        Ok(())
    }

    /// Detach `conn`. Idempotent; the last member out finalizes the session.
    /// Returns `true` if this call finalized it.
    #[instrument(skip_all, fields(session_id = %session_id, connection_id = %conn))]
    pub fn detach(&self, session_id: SessionId, conn: &ConnectionId) -> bool {
        let Ok(shared) = self.registry.get(session_id) else {
            return false;
        };
        let outcome = {
            let mut cell = shared.lock();
            if cell.session.is_closed() {
                return false;
            }
            if let Some(role) = cell.members.detach(conn) {
                debug!(role = role.label(), remaining = cell.members.len(), "detached");
            }
            self.settle(&mut cell)
        };
        let finalized = outcome.is_some();
        self.record(outcome);
        finalized
    }

    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.registry.snapshot()
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    /// Retire the session if its membership has emptied.
    fn settle(&self, cell: &mut SessionCell) -> Option<SessionOutcome> {
        if cell.members.is_empty() {
            self.registry.retire(cell)
        } else {
            None
        }
    }

    /// Tell everyone, close the session and flag its record.
    fn fail(&self, cell: &mut SessionCell, err: &MazeError) -> Option<SessionOutcome> {
        let session_id = cell.session.id();
        error!(%session_id, error = %err, error_kind = err.error_kind(), "closing session after fatal error");
        let notice: Arc<str> = protocol::notice_for(err).into();
        let _ = cell.members.broadcast(session_id, &notice);
        cell.flagged = true;
        self.registry.retire(cell)
    }

    fn record(&self, outcome: Option<SessionOutcome>) {
        let Some(outcome) = outcome else { return };
        info!(
            session_id = %outcome.session_id,
            group_id = %outcome.group_id,
            maze_id = %outcome.maze_id,
            steps = outcome.steps,
            exploration = outcome.exploration,
            flagged = outcome.flagged,
            "session finalized"
        );
        if let Err(e) = self.sink.record_session_outcome(&outcome) {
            error!(session_id = %outcome.session_id, error = %e, "failed to record session outcome");
        }
    }
}

/// State then open notice, to the new member only. The first frame a
/// client reads is always the current vertex.
fn greet(cell: &mut SessionCell, conn: &ConnectionId, role: Role) -> Result<(), MazeError> {
    let session_id = cell.session.id();
    let state = movement::state_message(&cell.session)?;
    if cell.members.send_to(session_id, conn, state.into()) {
        let _ = cell.members.send_to(session_id, conn, protocol::render_open(session_id, role).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use maze_core::{VertexId, VertexKind};

    use super::*;
    use crate::graph_store::test_support::{line_source, MemorySource};
    use crate::protocol::*;

    #[derive(Default)]
    struct RecordingSink {
        outcomes: Mutex<Vec<SessionOutcome>>,
    }

    impl OutcomeSink for RecordingSink {
        fn record_session_outcome(&self, outcome: &SessionOutcome) -> Result<(), MazeError> {
            self.outcomes.lock().push(outcome.clone());
            Ok(())
        }
    }

    struct Client {
        id: ConnectionId,
        rx: mpsc::Receiver<Arc<str>>,
        cancel: CancellationToken,
    }

    impl Client {
        fn new(name: &str) -> (Self, Outbox) {
            Self::with_capacity(name, 16)
        }

        fn with_capacity(name: &str, capacity: usize) -> (Self, Outbox) {
            let (tx, rx) = mpsc::channel(capacity);
            let cancel = CancellationToken::new();
            let id = ConnectionId::from_raw(name);
            let outbox = Outbox::new(id.clone(), tx, cancel.clone());
            (Self { id, rx, cancel }, outbox)
        }

        fn next(&mut self) -> String {
            self.rx.try_recv().map(|m| m.to_string()).unwrap_or_default()
        }

        fn drain(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(m) = self.rx.try_recv() {
                out.push(m.to_string());
            }
            out
        }
    }

    fn engine_with(source: MemorySource) -> (TraversalEngine, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let graphs = Arc::new(GraphStore::new(Arc::new(source)));
        (TraversalEngine::new(graphs, sink.clone()), sink)
    }

    fn req(group: GroupId, session_id: Option<SessionId>, observer: bool) -> AttachRequest {
        AttachRequest {
            group_id: group,
            maze_id: MazeId::new(1),
            session_id,
            observer,
        }
    }

    #[test]
    fn attach_sends_state_then_open() {
        let (engine, _) = engine_with(line_source());
        let (mut p, outbox) = Client::new("p");
        let attached = engine.attach(req(GroupId::new(), None, false), outbox).unwrap();
        assert_eq!(attached.role, Role::Player);
        assert_eq!(p.next(), "Vértice atual: 0, Tipo: 1, Adjacentes(Vertice, Peso): [(1, 1)]");
        assert_eq!(p.next(), "Sessão: 1, Papel: jogador");
        assert_eq!(engine.active_sessions(), 1);
    }

    #[test]
    fn unknown_maze_fails_attach() {
        let (engine, _) = engine_with(line_source());
        let (_c, outbox) = Client::new("c");
        let mut r = req(GroupId::new(), None, false);
        r.maze_id = MazeId::new(42);
        assert_eq!(
            engine.attach(r, outbox).unwrap_err(),
            MazeError::GraphNotFound(MazeId::new(42))
        );
        assert_eq!(engine.active_sessions(), 0);
    }

    #[test]
    fn observer_cannot_move_and_player_move_is_broadcast() {
        let (engine, _) = engine_with(line_source());
        let group = GroupId::new();
        let (mut p, outbox) = Client::new("p");
        let sid = engine.attach(req(group, None, false), outbox).unwrap().session_id;
        let (mut o, outbox) = Client::new("o");
        let joined = engine.attach(req(group, Some(sid), true), outbox).unwrap();
        assert_eq!(joined.role, Role::Observer);
        p.drain();
        o.drain();

        engine.handle_command(sid, &o.id, "ir:1").unwrap();
        assert_eq!(o.drain(), vec![NOTICE_OBSERVER_MOVE.to_string()]);
        assert!(p.drain().is_empty());

        engine.handle_command(sid, &p.id, "ir: 1").unwrap();
        let state = "Vértice atual: 1, Tipo: 0, Adjacentes(Vertice, Peso): [(2, 1)]";
        assert_eq!(p.drain(), vec![state.to_string()]);
        assert_eq!(o.drain(), vec![state.to_string()]);
    }

    #[test]
    fn malformed_move_then_valid_move() {
        let (engine, _) = engine_with(line_source());
        let (mut p, outbox) = Client::new("p");
        let sid = engine.attach(req(GroupId::new(), None, false), outbox).unwrap().session_id;
        p.drain();

        engine.handle_command(sid, &p.id, "ir:abc").unwrap();
        assert_eq!(p.drain(), vec![NOTICE_MALFORMED_MOVE.to_string()]);
        engine.handle_command(sid, &p.id, "historico").unwrap();
        assert_eq!(p.next(), "[0]");

        engine.handle_command(sid, &p.id, "ir:1").unwrap();
        p.drain();
        engine.handle_command(sid, &p.id, "historico").unwrap();
        assert_eq!(p.next(), "[0, 1]");
    }

    #[test]
    fn queries_reach_requester_only() {
        let (engine, _) = engine_with(line_source());
        let group = GroupId::new();
        let (mut p, outbox) = Client::new("p");
        let sid = engine.attach(req(group, None, false), outbox).unwrap().session_id;
        let (mut o, outbox) = Client::new("o");
        engine.attach(req(group, Some(sid), true), outbox).unwrap();
        p.drain();
        o.drain();

        engine.handle_command(sid, &o.id, "labirinto").unwrap();
        assert_eq!(o.drain(), vec!["Labirinto atual: 1".to_string()]);
        engine.handle_command(sid, &o.id, "pular").unwrap();
        assert_eq!(o.drain(), vec![NOTICE_UNRECOGNIZED.to_string()]);
        engine.handle_command(sid, &p.id, "ir:2").unwrap();
        assert_eq!(p.drain(), vec![NOTICE_INVALID_VERTEX.to_string()]);
        assert!(o.drain().is_empty());
    }

    #[test]
    fn last_detach_records_exactly_once() {
        let (engine, sink) = engine_with(line_source());
        let group = GroupId::new();
        let (p, outbox) = Client::new("p");
        let sid = engine.attach(req(group, None, false), outbox).unwrap().session_id;
        let (o, outbox) = Client::new("o");
        engine.attach(req(group, Some(sid), true), outbox).unwrap();
        engine.handle_command(sid, &p.id, "ir:1").unwrap();

        assert!(!engine.detach(sid, &p.id));
        assert!(sink.outcomes.lock().is_empty());
        assert!(engine.detach(sid, &o.id));
        assert!(!engine.detach(sid, &o.id));

        let outcomes = sink.outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].steps, 1);
        assert_eq!(outcomes[0].exploration, Some(1.0 / 3.0));
        assert!(!outcomes[0].flagged);
        assert_eq!(engine.active_sessions(), 0);
    }

    #[test]
    fn closed_session_rejects_commands_and_resume() {
        let (engine, _) = engine_with(line_source());
        let group = GroupId::new();
        let (p, outbox) = Client::new("p");
        let sid = engine.attach(req(group, None, false), outbox).unwrap().session_id;
        engine.detach(sid, &p.id);

        assert_eq!(
            engine.handle_command(sid, &p.id, "ir:1").unwrap_err(),
            MazeError::SessionClosed(sid)
        );
        let (_c, outbox) = Client::new("late");
        assert_eq!(
            engine.attach(req(group, Some(sid), false), outbox).unwrap_err(),
            MazeError::SessionClosed(sid)
        );
        let (_c, outbox) = Client::new("stray");
        assert_eq!(
            engine
                .attach(req(group, Some(SessionId::new(99)), false), outbox)
                .unwrap_err(),
            MazeError::SessionNotFound(SessionId::new(99))
        );
    }

    #[test]
    fn resume_with_other_group_is_not_found() {
        let (engine, _) = engine_with(line_source());
        let (_p, outbox) = Client::new("p");
        let sid = engine.attach(req(GroupId::new(), None, false), outbox).unwrap().session_id;
        let (_x, outbox) = Client::new("x");
        assert_eq!(
            engine.attach(req(GroupId::new(), Some(sid), true), outbox).unwrap_err(),
            MazeError::SessionNotFound(sid)
        );
    }

    #[test]
    fn player_slot_reopens_after_player_leaves() {
        let (engine, _) = engine_with(line_source());
        let group = GroupId::new();
        let (p, outbox) = Client::new("p");
        let sid = engine.attach(req(group, None, false), outbox).unwrap().session_id;
        let (o, outbox) = Client::new("o");
        assert_eq!(
            engine.attach(req(group, Some(sid), false), outbox).unwrap().role,
            Role::Observer
        );
        engine.detach(sid, &p.id);

        // Existing observer keeps its role.
        engine.handle_command(sid, &o.id, "ir:1").unwrap();
        let (_n, outbox) = Client::new("n");
        assert_eq!(
            engine.attach(req(group, Some(sid), false), outbox).unwrap().role,
            Role::Player
        );
    }

    #[test]
    fn failed_delivery_detaches_and_last_failure_finalizes() {
        let (engine, sink) = engine_with(line_source());
        let group = GroupId::new();
        let (p, outbox) = Client::new("p");
        let sid = engine.attach(req(group, None, false), outbox).unwrap().session_id;
        let (o, outbox) = Client::new("o");
        engine.attach(req(group, Some(sid), true), outbox).unwrap();

        drop(o.rx);
        engine.handle_command(sid, &p.id, "ir:1").unwrap();
        assert!(o.cancel.is_cancelled());
        assert_eq!(engine.snapshot()[0].connections, 1);

        drop(p.rx);
        engine.handle_command(sid, &p.id, "historico").unwrap();
        assert_eq!(sink.outcomes.lock().len(), 1);
        assert_eq!(engine.active_sessions(), 0);
    }

    #[test]
    fn fatal_error_closes_only_that_session() {
        let source = line_source();
        source.insert(
            2,
            &[(0, VertexKind::Entrance), (1, VertexKind::Exit)],
            &[(0, 1, 1)],
        );
        let (engine, sink) = engine_with(source);
        let group = GroupId::new();

        let (mut a, outbox) = Client::new("a");
        let mut r = req(group, None, false);
        r.maze_id = MazeId::new(2);
        let doomed = engine.attach(r, outbox).unwrap().session_id;
        let (_b, outbox) = Client::new("b");
        let healthy = engine.attach(req(group, None, false), outbox).unwrap().session_id;
        a.drain();

        // Drive the fatal path with an error the session itself produces.
        let cell = engine.registry().get(doomed).unwrap();
        let err = cell.lock().session.append_move(VertexId::new(77)).unwrap_err();
        assert!(err.is_fatal_for_session());
        let outcome = {
            let mut guard = cell.lock();
            engine.fail(&mut guard, &err)
        };
        engine.record(outcome);

        assert_eq!(a.drain(), vec![NOTICE_VERTEX_ERROR.to_string()]);
        assert!(a.cancel.is_cancelled());
        let outcomes = sink.outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].flagged);
        assert_eq!(outcomes[0].session_id, doomed);
        assert!(engine.registry().get(healthy).is_ok());
    }

    #[test]
    fn snapshot_lists_live_sessions() {
        let (engine, _) = engine_with(line_source());
        let group = GroupId::new();
        let (p, outbox) = Client::new("p");
        let sid = engine.attach(req(group, None, false), outbox).unwrap().session_id;
        let (_o, outbox) = Client::new("o");
        engine.attach(req(group, Some(sid), true), outbox).unwrap();
        engine.handle_command(sid, &p.id, "ir:1").unwrap();

        let snap = engine.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].group_id, group);
        assert_eq!(snap[0].current_vertex, VertexId::new(1));
        assert_eq!(snap[0].connections, 2);
        assert_eq!(snap[0].observers, 1);
        assert!(snap[0].has_player);
    }

    #[test]
    fn concurrent_moves_on_one_session_are_linearized() {
        const THREADS: usize = 8;
        const MOVES: usize = 50;

        // Entrance and Exit joined both ways: every move flips position.
        let source = MemorySource::with(
            1,
            &[(0, VertexKind::Entrance), (1, VertexKind::Exit)],
            &[(0, 1, 1), (1, 0, 1)],
        );
        let (engine, _) = engine_with(source);
        let (mut p, outbox) = Client::with_capacity("p", THREADS * MOVES + 8);
        let sid = engine.attach(req(GroupId::new(), None, false), outbox).unwrap().session_id;
        p.drain();

        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let engine = &engine;
                let pid = p.id.clone();
                scope.spawn(move || {
                    for i in 0..MOVES {
                        let target = (t + i) % 2;
                        engine.handle_command(sid, &pid, &format!("ir:{target}")).unwrap();
                    }
                });
            }
        });

        let replies = p.drain();
        let broadcast: Vec<VertexId> = replies
            .iter()
            .filter_map(|m| m.strip_prefix("Vértice atual: "))
            .map(|rest| rest.split(',').next().unwrap().parse().unwrap())
            .collect();
        let rejected = replies.iter().filter(|m| *m == NOTICE_INVALID_VERTEX).count();
        assert_eq!(broadcast.len() + rejected, THREADS * MOVES);

        let cell = engine.registry().get(sid).unwrap();
        let guard = cell.lock();
        let history = guard.session.history();
        let graph = guard.session.graph();
        assert_eq!(history.len(), 1 + broadcast.len());
        assert_eq!(history[0], VertexId::new(0));
        assert!(history.windows(2).all(|w| graph.has_edge(w[0], w[1])));
        // Broadcasts leave the lock in mutation order.
        assert_eq!(&history[1..], broadcast.as_slice());
        assert_eq!(guard.session.current(), *history.last().unwrap());
    }

    #[test]
    fn live_session_keeps_its_graph_across_reload() {
        let source = Arc::new(line_source());
        let graphs = Arc::new(GraphStore::new(source.clone()));
        let sink = Arc::new(RecordingSink::default());
        let engine = TraversalEngine::new(Arc::clone(&graphs), sink.clone());
        let (mut p, outbox) = Client::new("p");
        let sid = engine.attach(req(GroupId::new(), None, false), outbox).unwrap().session_id;
        p.drain();

        source.insert(1, &[(0, VertexKind::Entrance), (9, VertexKind::Exit)], &[(0, 9, 1)]);
        assert_eq!(graphs.reload(MazeId::new(1)).unwrap().vertex_count(), 2);
        assert_eq!(graphs.entrance_of(MazeId::new(1)).unwrap(), VertexId::new(0));

        engine.handle_command(sid, &p.id, "ir:1").unwrap();
        assert!(p.next().starts_with("Vértice atual: 1,"));
        assert!(engine.detach(sid, &p.id));
        assert_eq!(graphs.total_vertex_count(MazeId::new(1)).unwrap(), 2);
        // Exploration is measured against the pinned three-vertex graph.
        assert_eq!(sink.outcomes.lock()[0].exploration, Some(1.0 / 3.0));
    }
}
