//! One WebSocket connection from upgrade to detach.

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use maze_core::ConnectionId;
use maze_engine::protocol::{self, NOTICE_IDLE};
use maze_engine::{AttachRequest, Outbox};

use super::writer::run_writer;
use crate::server::AppState;

/// What the reader saw next on the socket.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// Peer closed, or the stream errored.
    Closed,
    /// No text frame arrived before the deadline.
    Idle,
    /// The connection was cancelled from our side.
    Cancelled,
}

/// Wait for the next text frame. Control frames and non-UTF-8 binary frames
/// are skipped without extending the idle deadline.
pub async fn next_inbound<St, E>(
    stream: &mut St,
    idle_timeout: Duration,
    cancel: &CancellationToken,
) -> Inbound
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let deadline = Instant::now() + idle_timeout;
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => return Inbound::Cancelled,
            frame = tokio::time::timeout_at(deadline, stream.next()) => frame,
        };
        let msg = match frame {
            Err(_) => return Inbound::Idle,
            Ok(None) => return Inbound::Closed,
            Ok(Some(Err(e))) => {
                debug!(error = %e, "socket read failed");
                return Inbound::Closed;
            }
            Ok(Some(Ok(msg))) => msg,
        };
        match msg {
            Message::Text(text) => return Inbound::Text(text.to_string()),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => return Inbound::Text(text.to_string()),
                Err(_) => debug!(len = data.len(), "ignoring non-UTF-8 binary frame"),
            },
            Message::Close(_) => return Inbound::Closed,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

/// Keeps the live-connection gauge accurate across every exit path.
struct LiveConnection(Arc<AtomicUsize>);

impl LiveConnection {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        let _ = counter.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        let _ = self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Attach to a session, pump commands until idle, close or cancel, then
/// detach. The writer task owns the socket's sending half.
#[instrument(skip_all, fields(
    connection_id = %connection_id,
    group_id = %req.group_id,
    maze_id = %req.maze_id,
))]
pub async fn run_connection(
    socket: WebSocket,
    connection_id: ConnectionId,
    req: AttachRequest,
    state: AppState,
) {
    let _live = LiveConnection::enter(&state.connections);
    let (sink, mut stream) = socket.split();
    let cancel = state.shutdown.connection_token();
    let (tx, rx) = mpsc::channel::<Arc<str>>(state.settings.max_send_queue);
    let writer = tokio::spawn(run_writer(
        sink,
        rx,
        cancel.clone(),
        state.settings.send_timeout(),
    ));

    let outbox = Outbox::new(connection_id.clone(), tx.clone(), cancel.clone());
    let session_id = match state.engine.attach(req, outbox) {
        Ok(attached) => {
            info!(session_id = %attached.session_id, role = attached.role.label(), "connection attached");
            attached.session_id
        }
        Err(e) => {
            warn!(error = %e, error_kind = e.error_kind(), "attach failed");
            let _ = tx.try_send(protocol::notice_for(&e).into());
            drop(tx);
            let _ = writer.await;
            return;
        }
    };

    let idle_timeout = state.settings.idle_timeout();
    let reason = loop {
        match next_inbound(&mut stream, idle_timeout, &cancel).await {
            Inbound::Text(text) => {
                if let Err(e) = state.engine.handle_command(session_id, &connection_id, &text) {
                    // Fatal errors were already announced to the whole session.
                    if !e.is_fatal_for_session() {
                        let _ = tx.try_send(protocol::notice_for(&e).into());
                    }
                    break e.error_kind();
                }
            }
            Inbound::Idle => {
                let _ = tx.try_send(NOTICE_IDLE.into());
                break "idle";
            }
            Inbound::Closed => break "closed",
            Inbound::Cancelled => break "cancelled",
        }
    };

    let finalized = state.engine.detach(session_id, &connection_id);
    info!(%session_id, reason, finalized, "connection detached");
    drop(tx);
    let _ = writer.await;
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    type Frame = Result<Message, std::io::Error>;

    #[tokio::test]
    async fn returns_text_and_skips_control_frames() {
        let frames: Vec<Frame> = vec![
            Ok(Message::Ping(Vec::new().into())),
            Ok(Message::Binary(vec![0xff, 0xfe].into())),
            Ok(Message::Text("ir:1".into())),
        ];
        let mut s = stream::iter(frames);
        let cancel = CancellationToken::new();
        assert_eq!(
            next_inbound(&mut s, Duration::from_secs(1), &cancel).await,
            Inbound::Text("ir:1".into())
        );
        assert_eq!(
            next_inbound(&mut s, Duration::from_secs(1), &cancel).await,
            Inbound::Closed
        );
    }

    #[tokio::test]
    async fn utf8_binary_is_text() {
        let frames: Vec<Frame> = vec![Ok(Message::Binary(b"historico".to_vec().into()))];
        let mut s = stream::iter(frames);
        assert_eq!(
            next_inbound(&mut s, Duration::from_secs(1), &CancellationToken::new()).await,
            Inbound::Text("historico".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_goes_idle() {
        let mut s = stream::pending::<Frame>();
        let started = Instant::now();
        assert_eq!(
            next_inbound(&mut s, Duration::from_secs(60), &CancellationToken::new()).await,
            Inbound::Idle
        );
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn pings_do_not_extend_the_deadline() {
        let pings = stream::iter(0..)
            .then(|_| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, std::io::Error>(Message::Ping(Vec::new().into()))
            })
            .boxed();
        let mut s = pings;
        let started = Instant::now();
        assert_eq!(
            next_inbound(&mut s, Duration::from_secs(25), &CancellationToken::new()).await,
            Inbound::Idle
        );
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn cancellation_wins() {
        let mut s = stream::pending::<Frame>();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            next_inbound(&mut s, Duration::from_secs(60), &cancel).await,
            Inbound::Cancelled
        );
    }

    #[tokio::test]
    async fn stream_error_is_closed() {
        let frames: Vec<Frame> = vec![Err(std::io::Error::other("reset"))];
        let mut s = stream::iter(frames);
        assert_eq!(
            next_inbound(&mut s, Duration::from_secs(1), &CancellationToken::new()).await,
            Inbound::Closed
        );
    }

    #[test]
    fn live_connection_gauge() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let _a = LiveConnection::enter(&counter);
            let _b = LiveConnection::enter(&counter);
            assert_eq!(counter.load(Ordering::Relaxed), 2);
        }
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }
}
