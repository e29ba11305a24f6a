//! Outbound half of a connection.
//!
//! Drains the connection's bounded queue into the socket. Each frame gets
//! `send_timeout` to complete; a stalled or failed write cancels the
//! connection.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs until every sender is dropped or `cancel` fires. On cancel, frames
/// already queued are still flushed, then a Close frame is sent.
pub async fn run_writer<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<str>>,
    cancel: CancellationToken,
    send_timeout: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Some(text) => {
                    if !send_frame(&mut sink, &text, send_timeout, &cancel).await {
                        return;
                    }
                }
                None => break,
            },
            () = cancel.cancelled() => {
                while let Ok(text) = rx.try_recv() {
                    if !send_frame(&mut sink, &text, send_timeout, &cancel).await {
                        return;
                    }
                }
                break;
            }
        }
    }
    if tokio::time::timeout(send_timeout, sink.send(Message::Close(None)))
        .await
        .is_err()
    {
        debug!("close frame timed out");
    }
}

async fn send_frame<S>(
    sink: &mut S,
    text: &str,
    send_timeout: Duration,
    cancel: &CancellationToken,
) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match tokio::time::timeout(send_timeout, sink.send(Message::Text(text.to_string().into()))).await
    {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "socket write failed");
            cancel.cancel();
            false
        }
        Err(_) => {
            warn!(
                timeout_ms = send_timeout.as_millis() as u64,
                "socket write timed out, closing connection"
            );
            cancel.cancel();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc as fmpsc;
    use futures::StreamExt;

    use super::*;

    fn text(msg: Option<Message>) -> String {
        match msg {
            Some(Message::Text(t)) => t.to_string(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn forwards_in_order_then_closes() {
        let (sink, mut frames) = fmpsc::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        tx.send(Arc::from("a")).await.unwrap();
        tx.send(Arc::from("b")).await.unwrap();
        drop(tx);

        run_writer(sink, rx, cancel.clone(), Duration::from_secs(1)).await;
        assert_eq!(text(frames.next().await), "a");
        assert_eq!(text(frames.next().await), "b");
        assert!(matches!(frames.next().await, Some(Message::Close(None))));
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_flushes_queued_frames() {
        let (sink, mut frames) = fmpsc::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        tx.send(Arc::from("last words")).await.unwrap();
        cancel.cancel();

        run_writer(sink, rx, cancel, Duration::from_secs(1)).await;
        assert_eq!(text(frames.next().await), "last words");
        assert!(matches!(frames.next().await, Some(Message::Close(None))));
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_socket_times_out_and_cancels() {
        // Zero-capacity channel nobody reads: the second frame never completes.
        let (sink, _frames) = fmpsc::channel::<Message>(0);
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        for msg in ["one", "two", "three"] {
            tx.send(Arc::from(msg)).await.unwrap();
        }

        run_writer(sink, rx, cancel.clone(), Duration::from_millis(200)).await;
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn broken_socket_cancels() {
        let (sink, frames) = fmpsc::unbounded::<Message>();
        drop(frames);
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        tx.send(Arc::from("lost")).await.unwrap();

        run_writer(sink, rx, cancel.clone(), Duration::from_secs(1)).await;
        assert!(cancel.is_cancelled());
    }
}
