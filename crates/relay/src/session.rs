//! Per-connection state: the outbound queue handle and the admitted session.

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Local};
use parley_protocol::{Frame, Nickname};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::negotiator::MAX_PENDING_OFFERS;

/// Identifier assigned to every accepted connection, in accept order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error returned when the outbound queue is full or closed.
#[derive(Debug, thiserror::Error)]
#[error("send failed: buffer full or connection closed")]
pub struct SendError;

/// Handle for queueing frames to a connection's write pump.
///
/// Cloneable; wraps an `mpsc::Sender`. The write pump exits
/// once every clone is dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Frame>,
}

impl Outbox {
    /// Creates an outbox and the receiving end for its write pump.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queues a frame without waiting.
    ///
    /// A slow peer must not stall the hub, so a full queue drops the frame.
    pub fn send(&self, frame: Frame) -> Result<(), SendError> {
        self.tx.try_send(frame).map_err(|e| {
            tracing::warn!("send buffer full or closed, dropping frame: {e}");
            SendError
        })
    }

    /// Returns `true` if the write pump is still running.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// A live connection as seen by the hub, before or after registration.
#[derive(Debug)]
pub struct Peer {
    addr: SocketAddr,
    connected_at: DateTime<Local>,
    outbox: Outbox,
    cancel: CancellationToken,
}

impl Peer {
    pub fn new(addr: SocketAddr, outbox: Outbox, cancel: CancellationToken) -> Self {
        Self {
            addr,
            connected_at: Local::now(),
            outbox,
            cancel,
        }
    }

    /// Builds a peer backed by a plain channel, with no socket behind it.
    pub fn detached(addr: SocketAddr, capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (outbox, rx) = Outbox::channel(capacity);
        (Self::new(addr, outbox, CancellationToken::new()), rx)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn connected_at(&self) -> DateTime<Local> {
        self.connected_at
    }

    /// Queues a frame; returns `false` if it was dropped.
    pub fn send(&self, frame: Frame) -> bool {
        let sent = self.outbox.send(frame).is_ok();
        if !sent {
            tracing::debug!(addr = %self.addr, "frame dropped");
        }
        sent
    }

    /// Stops the read pump and releases the outbound queue.
    ///
    /// Frames queued before the call are still written before the socket
    /// is shut down.
    pub fn close(self) {
        self.cancel.cancel();
    }

    pub fn is_connected(&self) -> bool {
        self.outbox.is_connected() && !self.cancel.is_cancelled()
    }
}

/// An admitted, registered client.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    nickname: Nickname,
    channel: Option<String>,
    /// Senders awaiting this session's accept/reject answer, oldest first.
    offers: Vec<Nickname>,
    peer: Peer,
}

impl Session {
    pub fn new(id: SessionId, nickname: Nickname, peer: Peer) -> Self {
        Self {
            id,
            nickname,
            channel: None,
            offers: Vec::new(),
            peer,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn nickname(&self) -> &Nickname {
        &self.nickname
    }

    pub fn addr(&self) -> SocketAddr {
        self.peer.addr()
    }

    pub fn connected_at(&self) -> DateTime<Local> {
        self.peer.connected_at()
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn in_channel(&self, name: &str) -> bool {
        self.channel.as_deref() == Some(name)
    }

    pub fn pending_offers(&self) -> &[Nickname] {
        &self.offers
    }

    pub fn send(&self, frame: Frame) -> bool {
        self.peer.send(frame)
    }

    pub fn close(self) {
        self.peer.close();
    }

    pub(crate) fn set_nickname(&mut self, nickname: Nickname) {
        self.nickname = nickname;
    }

    pub(crate) fn set_channel(&mut self, channel: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.channel, channel)
    }

    /// Records `sender` as the most recent pending offer.
    ///
    /// A repeated offer from the same sender moves to the top; the oldest
    /// offer is evicted when the stack is full.
    pub(crate) fn push_offer(&mut self, sender: Nickname) {
        self.offers.retain(|n| *n != sender);
        if self.offers.len() >= MAX_PENDING_OFFERS {
            let evicted = self.offers.remove(0);
            tracing::warn!(session = %self.id, %evicted, "evicting oldest pending file offer");
        }
        self.offers.push(sender);
    }

    pub(crate) fn pop_offer(&mut self) -> Option<Nickname> {
        self.offers.pop()
    }
}
