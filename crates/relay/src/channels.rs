//! Channel registry.
//!
//! Channels are plain names; membership is derived from each session's
//! current channel. A channel whose last member leaves (quit, join
//! elsewhere, create elsewhere, disconnect) is removed in the same step.

use std::collections::BTreeSet;

use parley_protocol::constants::CHANNEL_NAME_MAX;
use tracing::info;

use crate::clients::ClientRegistry;
use crate::session::SessionId;

/// Errors from channel operations. None of them is fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("invalid channel name '{0}': {1}")]
    InvalidName(String, &'static str),

    #[error("channel '{0}' already exists")]
    AlreadyExists(String),

    #[error("channel '{0}' does not exist")]
    NotFound(String),

    #[error("you are already in channel '{0}'")]
    AlreadyMember(String),

    #[error("you are not in channel '{0}'")]
    NotMember(String),

    #[error("you are not in any channel")]
    NoChannel,

    #[error("channel limit reached ({0} channels)")]
    LimitReached(usize),

    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}

/// A channel a session just left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vacated {
    pub channel: String,
    /// `true` when the session was the last member and the channel is gone.
    pub deleted: bool,
}

/// Result of moving a session into a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moved {
    pub joined: String,
    pub left: Option<Vacated>,
}

/// Validates a channel name presented by a client.
pub fn validate_channel_name(name: &str) -> Result<(), ChannelError> {
    let invalid = |why| ChannelError::InvalidName(name.to_owned(), why);

    if name.is_empty() {
        return Err(invalid("empty"));
    }
    if name.len() > CHANNEL_NAME_MAX {
        return Err(invalid("too long"));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("contains whitespace or control characters"));
    }
    Ok(())
}

/// The set of existing channel names.
#[derive(Debug)]
pub struct ChannelRegistry {
    names: BTreeSet<String>,
    max_channels: usize,
}

impl ChannelRegistry {
    pub fn new(max_channels: usize) -> Self {
        Self {
            names: BTreeSet::new(),
            max_channels,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Channel names in lexical order.
    pub fn list(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Registers a new, still empty channel.
    ///
    /// Callers must assign a member in the same step; see
    /// [`create_and_join`](Self::create_and_join).
    pub fn create(&mut self, name: &str) -> Result<(), ChannelError> {
        validate_channel_name(name)?;
        if self.exists(name) {
            return Err(ChannelError::AlreadyExists(name.to_owned()));
        }
        if self.names.len() >= self.max_channels {
            return Err(ChannelError::LimitReached(self.max_channels));
        }
        self.names.insert(name.to_owned());
        info!(channel = name, "channel created");
        Ok(())
    }

    pub fn member_count(&self, clients: &ClientRegistry, name: &str) -> usize {
        clients.all().filter(|s| s.in_channel(name)).count()
    }

    /// Members of `name` in connection order.
    pub fn members(&self, clients: &ClientRegistry, name: &str) -> Vec<SessionId> {
        clients
            .all()
            .filter(|s| s.in_channel(name))
            .map(|s| s.id())
            .collect()
    }

    /// Moves a session into an existing channel.
    ///
    /// The previous channel, if any, is vacated first and deleted when it
    /// became empty. Joining a missing channel changes nothing.
    pub fn assign(
        &mut self,
        clients: &mut ClientRegistry,
        id: SessionId,
        name: &str,
    ) -> Result<Moved, ChannelError> {
        let session = clients.get(id).ok_or(ChannelError::UnknownSession(id))?;
        if session.in_channel(name) {
            return Err(ChannelError::AlreadyMember(name.to_owned()));
        }
        if !self.exists(name) {
            return Err(ChannelError::NotFound(name.to_owned()));
        }

        let left = self.vacate(clients, id);
        if let Some(session) = clients.get_mut(id) {
            session.set_channel(Some(name.to_owned()));
        }
        Ok(Moved {
            joined: name.to_owned(),
            left,
        })
    }

    /// Creates a channel and moves its creator into it.
    ///
    /// The creator's previous channel is vacated first, so a creator who was
    /// alone elsewhere frees that slot for the limit check.
    pub fn create_and_join(
        &mut self,
        clients: &mut ClientRegistry,
        id: SessionId,
        name: &str,
    ) -> Result<Moved, ChannelError> {
        validate_channel_name(name)?;
        if self.exists(name) {
            return Err(ChannelError::AlreadyExists(name.to_owned()));
        }

        let session = clients.get(id).ok_or(ChannelError::UnknownSession(id))?;
        let frees_slot = session
            .channel()
            .is_some_and(|current| self.member_count(clients, current) == 1);
        if self.names.len() >= self.max_channels && !frees_slot {
            return Err(ChannelError::LimitReached(self.max_channels));
        }

        let left = self.vacate(clients, id);
        self.create(name)?;
        if let Some(session) = clients.get_mut(id) {
            session.set_channel(Some(name.to_owned()));
        }
        Ok(Moved {
            joined: name.to_owned(),
            left,
        })
    }

    /// Takes a session out of its channel, deleting the channel if empty.
    pub fn vacate(&mut self, clients: &mut ClientRegistry, id: SessionId) -> Option<Vacated> {
        let channel = clients.get_mut(id)?.set_channel(None)?;
        let deleted = self.collect_if_empty(clients, &channel);
        Some(Vacated { channel, deleted })
    }

    /// Removes `name` if no session is in it any more.
    pub(crate) fn collect_if_empty(&mut self, clients: &ClientRegistry, name: &str) -> bool {
        if self.member_count(clients, name) > 0 {
            return false;
        }
        let removed = self.names.remove(name);
        if removed {
            info!(channel = name, "channel deleted: last member left");
        }
        removed
    }
}
