//! Connection pumps: one read task and one write task per socket.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use parley_protocol::{Frame, FrameCodec};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::dispatch::DisconnectReason;
use crate::hub::Event;
use crate::session::{Outbox, Peer, SessionId};

/// Per-connection settings.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// Largest payload accepted from the peer. Outbound frames are only
    /// bounded by the protocol cap.
    pub max_payload: usize,
    pub send_buffer: usize,
}

/// Spawns the read and write pumps for an accepted socket.
///
/// The hub learns about the connection through an [`Event::Connected`]
/// carrying the [`Peer`] handle, followed by one [`Event::Frame`] per
/// decoded frame and finally exactly one [`Event::Disconnected`].
///
/// `shutdown` is the server-wide token: it stops the read pump and makes
/// the write pump give up on a peer that no longer reads. A failed write
/// cancels the connection, so the hub always hears `Disconnected`.
pub fn spawn_connection<S>(
    stream: S,
    id: SessionId,
    addr: SocketAddr,
    limits: ConnectionLimits,
    events: mpsc::Sender<Event>,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (outbox, rx) = Outbox::channel(limits.send_buffer);
    let cancel = shutdown.child_token();
    let peer = Peer::new(addr, outbox, cancel.clone());

    tokio::spawn(write_pump(
        FramedWrite::new(writer, FrameCodec::new()),
        rx,
        id,
        cancel.clone(),
        shutdown,
    ));

    tokio::spawn(async move {
        if events.send(Event::Connected { id, peer }).await.is_err() {
            return;
        }
        let frames = FramedRead::new(reader, FrameCodec::with_max_payload(limits.max_payload));
        let reason = read_pump(frames, id, &events, &cancel).await;
        tracing::info!(session = %id, %addr, "connection closed: {reason}");
        let _ = events.send(Event::Disconnected { id, reason }).await;
    });
}

/// Write pump: drains the outbound queue in order.
///
/// Exits once every [`Outbox`] handle is gone and the queue is empty, so
/// frames queued right before a close still reach the peer.
async fn write_pump<W>(
    mut sink: FramedWrite<W, FrameCodec>,
    mut rx: mpsc::Receiver<Frame>,
    id: SessionId,
    cancel: CancellationToken,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        tracing::warn!(session = %id, "write pump send error: {e}");
                        cancel.cancel();
                        break;
                    }
                }
                None => break,
            },

            _ = shutdown.cancelled() => break,
        }
    }

    // Best-effort flush and FIN.
    let _ = sink.close().await;
    tracing::trace!(session = %id, "write pump finished");
}

/// Read pump: forwards decoded frames to the hub until the stream ends.
async fn read_pump<R>(
    mut frames: FramedRead<R, FrameCodec>,
    id: SessionId,
    events: &mpsc::Sender<Event>,
    cancel: &CancellationToken,
) -> DisconnectReason
where
    R: AsyncRead + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return DisconnectReason::Closed,

            next = frames.next() => match next {
                Some(Ok(frame)) => {
                    if events.send(Event::Frame { id, frame }).await.is_err() {
                        return DisconnectReason::Closed;
                    }
                }
                Some(Err(e)) => return e.into(),
                None => return DisconnectReason::Eof,
            },
        }
    }
}
