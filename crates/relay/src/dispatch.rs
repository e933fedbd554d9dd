//! Protocol dispatcher: applies decoded frames to the chat state.
//!
//! [`ChatState`] owns both registries. Every method runs to completion
//! against a consistent state and reports back through the sessions'
//! outboxes; nothing here awaits.

use std::fmt;

use parley_protocol::constants::{MAX_PAYLOAD_LEN, SERVER_SENDER};
use parley_protocol::{Frame, MessageKind, Nickname, ProtocolError};
use tracing::{debug, info, trace, warn};

use crate::channels::{ChannelError, ChannelRegistry, Vacated};
use crate::clients::{ClientRegistry, RegistryError, Removed, validate_nickname};
use crate::negotiator::{self, NegotiationError};
use crate::session::{Peer, Session, SessionId};

/// Whether the connection survives the frame it just sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Closed,
}

/// Why a connection went away.
#[derive(Debug)]
pub enum DisconnectReason {
    /// Peer closed the stream between frames.
    Eof,
    /// The server closed the connection itself.
    Closed,
    /// Socket error.
    Transport(std::io::Error),
    /// Malformed or truncated frame.
    Protocol(ProtocolError),
}

impl From<ProtocolError> for DisconnectReason {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => Self::Transport(e),
            other => Self::Protocol(other),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => f.write_str("connection closed by peer"),
            Self::Closed => f.write_str("connection closed by server"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Protocol(e) => write!(f, "protocol violation: {e}"),
        }
    }
}

fn server_nick() -> Nickname {
    Nickname::truncated(SERVER_SENDER)
}

/// A frame from the server itself.
fn notice(kind: MessageKind, text: &str) -> Frame {
    Frame::new(kind)
        .with_sender(server_nick())
        .with_info_text(text)
}

/// Renders names as the `" - name\n"` lines used by listings.
fn listing<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for name in names {
        let line = format!(" - {name}\n");
        if out.len() + line.len() > MAX_PAYLOAD_LEN {
            debug!(len = out.len(), "listing cut at the payload cap");
            break;
        }
        out.push_str(&line);
    }
    out
}

/// The state shared by every connection.
#[derive(Debug)]
pub struct ChatState {
    clients: ClientRegistry,
    channels: ChannelRegistry,
}

impl ChatState {
    pub fn new(max_clients: usize, max_channels: usize) -> Self {
        Self {
            clients: ClientRegistry::new(max_clients),
            channels: ChannelRegistry::new(max_channels),
        }
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// Handles the first frame of a connection, which must register a
    /// nickname. Anything else closes the connection.
    pub fn admit(&mut self, id: SessionId, peer: Peer, frame: Frame) -> Disposition {
        if frame.kind != MessageKind::NicknameNew {
            warn!(session = %id, addr = %peer.addr(), kind = %frame.kind, "frame before registration");
            peer.send(notice(MessageKind::Error, "register a nickname first"));
            peer.close();
            return Disposition::Closed;
        }

        let requested = if frame.sender.is_empty() {
            frame.info.as_str()
        } else {
            frame.sender.as_str()
        };
        let nickname = match validate_nickname(requested) {
            Ok(nickname) => nickname,
            Err(err) => {
                info!(session = %id, addr = %peer.addr(), "registration rejected: {err}");
                peer.send(notice(MessageKind::Error, &err.to_string()));
                peer.close();
                return Disposition::Closed;
            }
        };

        let addr = peer.addr();
        let session = Session::new(id, nickname.clone(), peer);
        if self.clients.register(session).is_err() {
            return Disposition::Closed;
        }

        info!(session = %id, nick = %nickname, %addr, online = self.clients.len(), "client registered");
        self.reply(
            id,
            notice(MessageKind::NicknameNew, nickname.as_str()),
        );
        Disposition::Continue
    }

    /// Applies one frame from a registered session.
    pub fn dispatch(&mut self, id: SessionId, frame: Frame) -> Disposition {
        let Some(session) = self.clients.get(id) else {
            debug!(session = %id, kind = %frame.kind, "frame for unknown session");
            return Disposition::Closed;
        };
        trace!(session = %id, nick = %session.nickname(), kind = %frame.kind, len = frame.payload.len(), "dispatch");

        match frame.kind {
            MessageKind::NicknameNew => self.fail(id, "already registered"),
            MessageKind::NicknameChanged => return self.change_nickname(id, frame.info.as_str()),
            MessageKind::NicknameList => self.list_users(id),
            MessageKind::NicknameInfos => self.whois(id, frame.info.as_str()),
            MessageKind::EchoSend => self.echo(id, frame),
            MessageKind::UnicastSend => self.unicast(id, frame),
            MessageKind::BroadcastSend => self.broadcast(id, frame),
            MessageKind::MulticastCreate => self.create_channel(id, frame.info.as_str()),
            MessageKind::MulticastList => self.list_channels(id),
            MessageKind::MulticastJoin => self.join_channel(id, frame.info.as_str()),
            MessageKind::MulticastQuit => self.quit_channel(id, frame.info.as_str()),
            MessageKind::MulticastSend => self.channel_send(id, frame),
            MessageKind::FileRequest => self.file_request(id, frame),
            MessageKind::FileAccept | MessageKind::FileReject => self.file_answer(id, frame),
            other => debug!(session = %id, kind = %other, "ignoring frame"),
        }
        Disposition::Continue
    }

    /// Removes a session after its connection ended, telling the members
    /// of its channel. Returns `false` if the session was already gone.
    pub fn disconnect(&mut self, id: SessionId, reason: &DisconnectReason) -> bool {
        if let DisconnectReason::Protocol(err) = reason {
            self.fail(id, err);
        }

        let Some(Removed { session, vacated }) = self.clients.remove(id, &mut self.channels) else {
            return false;
        };
        info!(session = %id, nick = %session.nickname(), online = self.clients.len(), "client left: {reason}");

        let text = format!("{} has disconnected", session.nickname());
        self.announce_departure(session.nickname(), vacated.as_ref(), &text);
        session.close();
        true
    }

    fn reply(&self, id: SessionId, frame: Frame) {
        if let Some(session) = self.clients.get(id) {
            session.send(frame);
        }
    }

    fn fail(&self, id: SessionId, err: impl fmt::Display) {
        let text = err.to_string();
        debug!(session = %id, "request failed: {text}");
        self.reply(id, notice(MessageKind::Error, &text));
    }

    fn nickname(&self, id: SessionId) -> Nickname {
        self.clients
            .get(id)
            .map(|s| s.nickname().clone())
            .unwrap_or_default()
    }

    /// Sends a channel notification about `subject` to every member of
    /// `channel` other than `except`.
    fn notify_channel(&self, channel: &str, subject: &Nickname, text: &str, except: Option<SessionId>) {
        for member in self.channels.members(&self.clients, channel) {
            if Some(member) == except {
                continue;
            }
            if let Some(session) = self.clients.get(member) {
                session.send(
                    Frame::new(MessageKind::MulticastNotification)
                        .with_sender(subject.clone())
                        .with_info_text(channel)
                        .with_payload(text.to_owned()),
                );
            }
        }
    }

    /// Tells the remaining members of a channel someone left it.
    fn announce_departure(&self, who: &Nickname, vacated: Option<&Vacated>, text: &str) {
        match vacated {
            Some(v) if !v.deleted => self.notify_channel(&v.channel, who, text, None),
            _ => {}
        }
    }

    fn change_nickname(&mut self, id: SessionId, requested: &str) -> Disposition {
        match self.clients.rename(id, requested) {
            Ok(old) => {
                info!(session = %id, %old, new = requested, "nickname changed");
                self.reply(id, notice(MessageKind::NicknameChanged, requested));

                let channel = self
                    .clients
                    .get(id)
                    .and_then(|s| s.channel().map(str::to_owned));
                if let Some(channel) = channel {
                    let new = self.nickname(id);
                    let text = format!("{old} is now known as {new}");
                    self.notify_channel(&channel, &new, &text, Some(id));
                }
                Disposition::Continue
            }
            Err(err @ RegistryError::DuplicateNickname(_)) => {
                info!(session = %id, "rename rejected: {err}, closing");
                self.reply(
                    id,
                    Frame::new(MessageKind::NicknameDuplicate)
                        .with_sender(Nickname::truncated(requested))
                        .with_info_text(&err.to_string()),
                );
                self.disconnect(id, &DisconnectReason::Closed);
                Disposition::Closed
            }
            Err(err) => {
                self.fail(id, err);
                Disposition::Continue
            }
        }
    }

    fn list_users(&self, id: SessionId) {
        let count = self.clients.len();
        let names = listing(self.clients.all().map(|s| s.nickname().as_str()));
        self.reply(
            id,
            notice(MessageKind::NicknameList, &format!("{count} users online")).with_payload(names),
        );
    }

    fn whois(&self, id: SessionId, target: &str) {
        let Some(session) = self.clients.find(target) else {
            self.fail(id, format!("user '{target}' not found"));
            return;
        };

        let addr = session.addr();
        let text = format!(
            "{} connected since {} with IP address {} and port number {}",
            session.nickname(),
            session.connected_at().format("%Y/%m/%d@%H:%M"),
            addr.ip(),
            addr.port(),
        );
        self.reply(id, notice(MessageKind::NicknameInfos, &text));
    }

    fn echo(&self, id: SessionId, frame: Frame) {
        let sender = self.nickname(id);
        self.reply(
            id,
            Frame::new(MessageKind::EchoSend)
                .with_sender(sender)
                .with_info(frame.info)
                .with_payload(frame.payload),
        );
    }

    fn unicast(&self, id: SessionId, frame: Frame) {
        let target = frame.info.as_str();
        let Some(recipient) = self.clients.find(target) else {
            self.fail(id, format!("recipient '{target}' not found"));
            return;
        };

        recipient.send(
            Frame::new(MessageKind::UnicastSend)
                .with_sender(self.nickname(id))
                .with_info(frame.info.clone())
                .with_payload(frame.payload),
        );
    }

    fn broadcast(&self, id: SessionId, frame: Frame) {
        let outgoing = Frame::new(MessageKind::BroadcastSend)
            .with_sender(self.nickname(id))
            .with_payload(frame.payload);

        for session in self.clients.all().filter(|s| s.id() != id) {
            session.send(outgoing.clone());
        }
    }

    fn create_channel(&mut self, id: SessionId, name: &str) {
        match self.channels.create_and_join(&mut self.clients, id, name) {
            Ok(moved) => {
                let nick = self.nickname(id);
                info!(session = %id, %nick, channel = name, "channel created by client");
                let text = format!("{nick} left the channel");
                self.announce_departure(&nick, moved.left.as_ref(), &text);

                let ack = match &moved.left {
                    Some(Vacated {
                        channel,
                        deleted: true,
                    }) => notice(MessageKind::MulticastCreateQuit, name)
                        .with_payload(channel.clone()),
                    _ => notice(MessageKind::MulticastCreate, name),
                };
                self.reply(id, ack);
            }
            Err(err) => {
                debug!(session = %id, channel = name, "create failed: {err}");
                self.reply(
                    id,
                    notice(MessageKind::MulticastCreateFailed, &err.to_string()),
                );
            }
        }
    }

    fn list_channels(&self, id: SessionId) {
        let count = self.channels.len();
        let names = listing(self.channels.list());
        self.reply(
            id,
            notice(MessageKind::MulticastList, &format!("{count} channels")).with_payload(names),
        );
    }

    fn join_channel(&mut self, id: SessionId, name: &str) {
        let moved = match self.channels.assign(&mut self.clients, id, name) {
            Ok(moved) => moved,
            Err(err) => return self.fail(id, err),
        };

        let nick = self.nickname(id);
        let left_text = format!("{nick} left the channel");
        self.announce_departure(&nick, moved.left.as_ref(), &left_text);

        let text = match &moved.left {
            Some(Vacated {
                channel,
                deleted: true,
            }) => format!(
                "You joined '{name}'. Your previous channel '{channel}' was deleted because it was empty."
            ),
            _ => format!("You joined '{name}'."),
        };
        self.reply(id, notice(MessageKind::MulticastJoin, name).with_payload(text));
        self.notify_channel(name, &nick, &format!("{nick} joined the channel"), Some(id));
    }

    fn quit_channel(&mut self, id: SessionId, name: &str) {
        let member = self.clients.get(id).is_some_and(|s| s.in_channel(name));
        if !member {
            return self.fail(id, ChannelError::NotMember(name.to_owned()));
        }

        let nick = self.nickname(id);
        let Some(vacated) = self.channels.vacate(&mut self.clients, id) else {
            return;
        };

        let text = if vacated.deleted {
            format!("You left '{name}', which was deleted because you were its last member.")
        } else {
            format!("You left '{name}'.")
        };
        self.reply(id, notice(MessageKind::MulticastQuit, name).with_payload(text));
        self.announce_departure(&nick, Some(&vacated), &format!("{nick} left the channel"));
    }

    fn channel_send(&self, id: SessionId, frame: Frame) {
        let Some(channel) = self.clients.get(id).and_then(|s| s.channel()) else {
            return self.fail(id, ChannelError::NoChannel);
        };

        let outgoing = Frame::new(MessageKind::MulticastSend)
            .with_sender(self.nickname(id))
            .with_info_text(channel)
            .with_payload(frame.payload);

        for member in self.channels.members(&self.clients, channel) {
            if member == id {
                continue;
            }
            if let Some(session) = self.clients.get(member) {
                session.send(outgoing.clone());
            }
        }
    }

    fn file_request(&mut self, id: SessionId, frame: Frame) {
        let recipient = frame.info.as_str();
        match negotiator::request_transfer(&mut self.clients, id, recipient, frame.payload) {
            Ok(()) => {}
            Err(NegotiationError::RecipientNotFound(nick)) => {
                debug!(session = %id, recipient = %nick, "file offer to absent recipient dropped");
            }
            Err(err) => warn!(session = %id, "file offer failed: {err}"),
        }
    }

    fn file_answer(&mut self, id: SessionId, frame: Frame) {
        let accepted = frame.kind == MessageKind::FileAccept;
        if let Err(err) = negotiator::resolve(&mut self.clients, id, accepted, frame.info) {
            debug!(session = %id, accepted, "file answer not routed: {err}");
        }
    }
}
