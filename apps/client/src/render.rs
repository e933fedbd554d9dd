//! Client-side view of the session and rendering of incoming frames.

use parley_protocol::{Frame, MessageKind};

/// What the server has confirmed about this client so far.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClientState {
    pub nickname: Option<String>,
    pub channel: Option<String>,
}

impl ClientState {
    pub fn is_registered(&self) -> bool {
        self.nickname.is_some()
    }

    pub fn prompt(&self) -> String {
        match (&self.nickname, &self.channel) {
            (Some(nick), Some(channel)) => format!("% {nick}[{channel}]> "),
            (Some(nick), None) => format!("% {nick}> "),
            (None, _) => "% ".to_owned(),
        }
    }

    /// Tracks nickname and channel from server acknowledgements.
    pub fn apply(&mut self, frame: &Frame) {
        let info = frame.info.as_str();
        match frame.kind {
            MessageKind::NicknameNew | MessageKind::NicknameChanged => {
                self.nickname = Some(info.to_owned());
            }
            MessageKind::MulticastCreate
            | MessageKind::MulticastCreateQuit
            | MessageKind::MulticastJoin => {
                self.channel = Some(info.to_owned());
            }
            MessageKind::MulticastQuit if self.channel.as_deref() == Some(info) => {
                self.channel = None;
            }
            _ => {}
        }
    }
}

/// Formats an incoming frame for display. `None` for frames not meant
/// for the user.
pub fn render(frame: &Frame) -> Option<String> {
    let sender = frame.sender.as_str();
    let info = frame.info.as_str();
    let text = frame.payload_text();

    let line = match frame.kind {
        MessageKind::NicknameNew | MessageKind::NicknameChanged => {
            format!("Your nickname is now: {info}")
        }
        MessageKind::NicknameDuplicate => {
            format!("The nickname {sender} is already taken by another user.")
        }
        MessageKind::NicknameList | MessageKind::MulticastList => {
            format!("[{sender}] : {info}:\n{}", text.trim_end())
        }
        MessageKind::NicknameInfos => format!("[{sender}] : {info}"),
        MessageKind::EchoSend => format!("[echo] : {text}"),
        MessageKind::BroadcastSend => format!("[{sender}] : {text}"),
        MessageKind::UnicastSend => format!("[{sender}] (private) : {text}"),
        MessageKind::MulticastCreate => {
            format!("Channel '{info}' created. You have joined it.")
        }
        MessageKind::MulticastCreateQuit => format!(
            "Channel '{info}' created. You have joined it. Your previous channel '{text}' was deleted because it was empty."
        ),
        MessageKind::MulticastCreateFailed => format!("[{sender}] : {info}"),
        MessageKind::MulticastJoin | MessageKind::MulticastQuit => text,
        MessageKind::MulticastNotification => format!("[{info}] {text}"),
        MessageKind::MulticastSend => format!("[{info}] {sender}> {text}"),
        MessageKind::FileRequest => format!(
            "{sender} wants to send you the file '{text}'. Answer with /accept or /reject."
        ),
        MessageKind::FileAccept if info.is_empty() => {
            format!("{sender} accepted your file transfer.")
        }
        MessageKind::FileAccept => format!("{sender} accepted your file transfer ({info})."),
        MessageKind::FileReject => format!("{sender} declined your file transfer."),
        MessageKind::Error => format!("[{sender}] : error: {info}"),
        _ => return None,
    };
    Some(line)
}
