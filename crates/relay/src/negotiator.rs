//! File-transfer negotiation.
//!
//! The server never carries file contents. It forwards a sender's offer to
//! the recipient, remembers who is waiting for an answer, and routes the
//! recipient's accept/reject (with its connection details in `info`) back.
//!
//! Each recipient keeps a stack of pending offers. An answer always resolves
//! the most recent one; earlier offers stay answerable afterwards.

use bytes::Bytes;
use parley_protocol::{Frame, Info, MessageKind, Nickname};
use tracing::{debug, info};

use crate::clients::ClientRegistry;
use crate::session::SessionId;

/// Upper bound on offers awaiting an answer from one recipient.
pub const MAX_PENDING_OFFERS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    #[error("recipient '{0}' not found")]
    RecipientNotFound(String),

    #[error("no pending file offer")]
    NoPendingOffer,

    #[error("'{0}' is no longer connected")]
    RequesterGone(Nickname),

    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}

/// Forwards a file offer from `sender` to `recipient`.
pub fn request_transfer(
    clients: &mut ClientRegistry,
    sender: SessionId,
    recipient: &str,
    path: Bytes,
) -> Result<(), NegotiationError> {
    let from = clients
        .get(sender)
        .ok_or(NegotiationError::UnknownSession(sender))?
        .nickname()
        .clone();
    let target = clients
        .find_mut(recipient)
        .ok_or_else(|| NegotiationError::RecipientNotFound(recipient.to_owned()))?;

    target.send(
        Frame::new(MessageKind::FileRequest)
            .with_sender(from.clone())
            .with_info_text(recipient)
            .with_payload(path),
    );
    info!(%from, to = recipient, "file offer forwarded");
    target.push_offer(from);
    Ok(())
}

/// Answers the most recent pending offer made to `responder`.
///
/// Returns the nickname of the requester the answer was routed to.
pub fn resolve(
    clients: &mut ClientRegistry,
    responder: SessionId,
    accepted: bool,
    details: Info,
) -> Result<Nickname, NegotiationError> {
    let session = clients
        .get_mut(responder)
        .ok_or(NegotiationError::UnknownSession(responder))?;
    let requester = session
        .pop_offer()
        .ok_or(NegotiationError::NoPendingOffer)?;
    let from = session.nickname().clone();

    let Some(target) = clients.find(requester.as_str()) else {
        debug!(%from, %requester, "requester left before the answer, dropping it");
        return Err(NegotiationError::RequesterGone(requester));
    };

    let kind = if accepted {
        MessageKind::FileAccept
    } else {
        MessageKind::FileReject
    };
    target.send(Frame::new(kind).with_sender(from.clone()).with_info(details));
    info!(%from, to = %requester, accepted, "file offer answered");
    Ok(requester)
}
