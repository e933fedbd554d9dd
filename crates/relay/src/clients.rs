//! Client registry: the single owner of every admitted [`Session`].

use std::collections::{BTreeMap, HashMap};

use parley_protocol::constants::SERVER_SENDER;
use parley_protocol::{Frame, MessageKind, Nickname};
use tracing::info;

use crate::channels::{ChannelRegistry, Vacated};
use crate::session::{Session, SessionId};

/// Errors from nickname registration and renaming.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("nickname '{0}' is already in use")]
    DuplicateNickname(String),

    #[error("invalid nickname '{0}': {1}")]
    InvalidNickname(String, &'static str),

    #[error("server is full ({0} clients)")]
    Full(usize),

    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}

/// A session taken out of the registry, and the channel it left.
#[derive(Debug)]
pub struct Removed {
    pub session: Session,
    pub vacated: Option<Vacated>,
}

/// Validates a nickname presented by a client.
///
/// Nicknames are non-empty, contain no whitespace or control characters,
/// fit the header field, and never impersonate the server.
pub fn validate_nickname(raw: &str) -> Result<Nickname, RegistryError> {
    let invalid = |why| RegistryError::InvalidNickname(raw.to_owned(), why);

    if raw.is_empty() {
        return Err(invalid("empty"));
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("contains whitespace or control characters"));
    }
    if raw.eq_ignore_ascii_case(SERVER_SENDER) {
        return Err(invalid("reserved"));
    }
    Nickname::new(raw).map_err(|_| invalid("too long"))
}

/// Connected sessions indexed by id and by nickname.
///
/// Iteration follows connection order.
#[derive(Debug)]
pub struct ClientRegistry {
    sessions: BTreeMap<SessionId, Session>,
    by_nick: HashMap<String, SessionId>,
    max_clients: usize,
}

impl ClientRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            by_nick: HashMap::new(),
            max_clients,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.max_clients
    }

    pub fn is_taken(&self, nickname: &str) -> bool {
        self.by_nick.contains_key(nickname)
    }

    /// Admits a session under its nickname.
    ///
    /// On failure the connection is rejected outright: the client receives
    /// a duplicate-nickname notice (or an error notice when the server is
    /// full) and is closed.
    pub fn register(&mut self, session: Session) -> Result<SessionId, RegistryError> {
        let nick = session.nickname().as_str().to_owned();

        let rejection = if self.by_nick.contains_key(&nick) {
            Some((
                MessageKind::NicknameDuplicate,
                RegistryError::DuplicateNickname(nick.clone()),
            ))
        } else if self.is_full() {
            Some((MessageKind::Error, RegistryError::Full(self.max_clients)))
        } else {
            None
        };

        if let Some((kind, err)) = rejection {
            info!(session = %session.id(), %nick, "registration rejected: {err}");
            session.send(
                Frame::new(kind)
                    .with_sender(session.nickname().clone())
                    .with_info_text(&err.to_string()),
            );
            session.close();
            return Err(err);
        }

        let id = session.id();
        self.by_nick.insert(nick, id);
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Changes a session's nickname, returning the previous one.
    ///
    /// A session renaming to its own current nickname is not a collision.
    pub fn rename(&mut self, id: SessionId, new_nickname: &str) -> Result<Nickname, RegistryError> {
        let nickname = validate_nickname(new_nickname)?;
        if let Some(owner) = self.by_nick.get(new_nickname) {
            if *owner != id {
                return Err(RegistryError::DuplicateNickname(new_nickname.to_owned()));
            }
        }

        let Some(session) = self.sessions.get_mut(&id) else {
            return Err(RegistryError::UnknownSession(id));
        };

        let old = session.nickname().clone();
        session.set_nickname(nickname);
        self.by_nick.remove(old.as_str());
        self.by_nick.insert(new_nickname.to_owned(), id);
        Ok(old)
    }

    /// Removes a session and garbage-collects the channel it was in.
    pub fn remove(&mut self, id: SessionId, channels: &mut ChannelRegistry) -> Option<Removed> {
        let mut session = self.sessions.remove(&id)?;
        self.by_nick.remove(session.nickname().as_str());

        let vacated = session.set_channel(None).map(|channel| {
            let deleted = channels.collect_if_empty(self, &channel);
            Vacated { channel, deleted }
        });

        Some(Removed { session, vacated })
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn find(&self, nickname: &str) -> Option<&Session> {
        self.by_nick
            .get(nickname)
            .and_then(|id| self.sessions.get(id))
    }

    pub(crate) fn find_mut(&mut self, nickname: &str) -> Option<&mut Session> {
        let id = *self.by_nick.get(nickname)?;
        self.sessions.get_mut(&id)
    }

    /// All sessions in connection order.
    pub fn all(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Snapshot of session ids, safe to hold while mutating sessions.
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }
}
