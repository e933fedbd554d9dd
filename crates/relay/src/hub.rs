//! The hub task: sole owner of the chat state.
//!
//! Connection tasks never touch the registries. They report what happened
//! as [`Event`]s over one mpsc queue and the hub applies them in order,
//! each to completion before the next.

use std::collections::HashMap;

use parley_protocol::Frame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dispatch::{ChatState, DisconnectReason};
use crate::session::{Peer, SessionId};

/// Something that happened on a connection.
#[derive(Debug)]
pub enum Event {
    /// A socket was accepted; the peer has not registered yet.
    Connected { id: SessionId, peer: Peer },
    /// A complete frame arrived.
    Frame { id: SessionId, frame: Frame },
    /// The connection ended. Always the last event for `id`.
    Disconnected {
        id: SessionId,
        reason: DisconnectReason,
    },
}

pub struct Hub {
    state: ChatState,
    /// Accepted connections still waiting for their first frame.
    pending: HashMap<SessionId, Peer>,
}

impl Hub {
    pub fn new(state: ChatState) -> Self {
        Self {
            state,
            pending: HashMap::new(),
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Applies one event.
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Connected { id, peer } => {
                debug!(session = %id, addr = %peer.addr(), "awaiting registration");
                self.pending.insert(id, peer);
            }
            Event::Frame { id, frame } => {
                if let Some(peer) = self.pending.remove(&id) {
                    self.state.admit(id, peer, frame);
                } else {
                    self.state.dispatch(id, frame);
                }
            }
            Event::Disconnected { id, reason } => {
                if let Some(peer) = self.pending.remove(&id) {
                    debug!(session = %id, addr = %peer.addr(), "left before registering: {reason}");
                    peer.close();
                } else {
                    self.state.disconnect(id, &reason);
                }
            }
        }
    }

    /// Processes events until the queue closes or `cancel` fires.
    ///
    /// Dropping the hub on return releases every outbox, which lets the
    /// write pumps flush and exit.
    pub async fn run(mut self, mut events: mpsc::Receiver<Event>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }
        info!(
            clients = self.state.clients().len(),
            channels = self.state.channels().len(),
            "hub stopped"
        );
    }
}
