use std::fmt;

use serde::{Deserialize, Serialize};

/// Message kind tag carried in every frame header.
///
/// Tags `0..=20` keep the numbering of the legacy C protocol; `21` is the
/// generic error notice. Unknown tags decode as [`MessageKind::Other`] so a
/// peer speaking a newer revision never desynchronises the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    // Nicknames
    NicknameNew,
    NicknameList,
    NicknameInfos,
    NicknameDuplicate,
    NicknameChanged,

    // Direct messaging
    EchoSend,
    UnicastSend,
    BroadcastSend,

    // Channels
    MulticastCreate,
    MulticastCreateFailed,
    MulticastCreateQuit,
    MulticastList,
    MulticastJoin,
    MulticastSend,
    MulticastQuit,
    MulticastNotification,

    // File transfer negotiation
    FileRequest,
    FileAccept,
    FileReject,
    FileSend,
    FileAck,

    // Administrative
    Error,

    Other(u32),
}

impl MessageKind {
    /// Returns the wire tag for this kind.
    pub fn tag(self) -> u32 {
        match self {
            MessageKind::NicknameNew => 0,
            MessageKind::NicknameList => 1,
            MessageKind::NicknameInfos => 2,
            MessageKind::NicknameDuplicate => 3,
            MessageKind::NicknameChanged => 4,
            MessageKind::EchoSend => 5,
            MessageKind::UnicastSend => 6,
            MessageKind::BroadcastSend => 7,
            MessageKind::MulticastCreate => 8,
            MessageKind::MulticastCreateFailed => 9,
            MessageKind::MulticastCreateQuit => 10,
            MessageKind::MulticastList => 11,
            MessageKind::MulticastJoin => 12,
            MessageKind::MulticastSend => 13,
            MessageKind::MulticastQuit => 14,
            MessageKind::MulticastNotification => 15,
            MessageKind::FileRequest => 16,
            MessageKind::FileAccept => 17,
            MessageKind::FileReject => 18,
            MessageKind::FileSend => 19,
            MessageKind::FileAck => 20,
            MessageKind::Error => 21,
            MessageKind::Other(tag) => tag,
        }
    }

    /// Maps a wire tag back to a kind.
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            0 => MessageKind::NicknameNew,
            1 => MessageKind::NicknameList,
            2 => MessageKind::NicknameInfos,
            3 => MessageKind::NicknameDuplicate,
            4 => MessageKind::NicknameChanged,
            5 => MessageKind::EchoSend,
            6 => MessageKind::UnicastSend,
            7 => MessageKind::BroadcastSend,
            8 => MessageKind::MulticastCreate,
            9 => MessageKind::MulticastCreateFailed,
            10 => MessageKind::MulticastCreateQuit,
            11 => MessageKind::MulticastList,
            12 => MessageKind::MulticastJoin,
            13 => MessageKind::MulticastSend,
            14 => MessageKind::MulticastQuit,
            15 => MessageKind::MulticastNotification,
            16 => MessageKind::FileRequest,
            17 => MessageKind::FileAccept,
            18 => MessageKind::FileReject,
            19 => MessageKind::FileSend,
            20 => MessageKind::FileAck,
            21 => MessageKind::Error,
            other => MessageKind::Other(other),
        }
    }

    /// Replaces an `Other` holding a known tag with the named kind.
    pub fn normalized(self) -> Self {
        match self {
            MessageKind::Other(tag) => MessageKind::from_tag(tag),
            known => known,
        }
    }

    /// Legacy upper-case name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::NicknameNew => "NICKNAME_NEW",
            MessageKind::NicknameList => "NICKNAME_LIST",
            MessageKind::NicknameInfos => "NICKNAME_INFOS",
            MessageKind::NicknameDuplicate => "NICKNAME_DOUBLON",
            MessageKind::NicknameChanged => "NICKNAME_CHANGEMENT",
            MessageKind::EchoSend => "ECHO_SEND",
            MessageKind::UnicastSend => "UNICAST_SEND",
            MessageKind::BroadcastSend => "BROADCAST_SEND",
            MessageKind::MulticastCreate => "MULTICAST_CREATE",
            MessageKind::MulticastCreateFailed => "MULTICAST_CREATE_FAILED",
            MessageKind::MulticastCreateQuit => "MULTICAST_CREATE_QUIT",
            MessageKind::MulticastList => "MULTICAST_LIST",
            MessageKind::MulticastJoin => "MULTICAST_JOIN",
            MessageKind::MulticastSend => "MULTICAST_SEND",
            MessageKind::MulticastQuit => "MULTICAST_QUIT",
            MessageKind::MulticastNotification => "MULTICAST_NOTIFICATION",
            MessageKind::FileRequest => "FILE_REQUEST",
            MessageKind::FileAccept => "FILE_ACCEPT",
            MessageKind::FileReject => "FILE_REJECT",
            MessageKind::FileSend => "FILE_SEND",
            MessageKind::FileAck => "FILE_ACK",
            MessageKind::Error => "ERROR",
            MessageKind::Other(_) => "UNKNOWN",
        }
    }
}

impl From<u32> for MessageKind {
    fn from(tag: u32) -> Self {
        MessageKind::from_tag(tag)
    }
}

impl From<MessageKind> for u32 {
    fn from(kind: MessageKind) -> Self {
        kind.tag()
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Other(tag) => write!(f, "UNKNOWN({tag})"),
            kind => f.write_str(kind.as_str()),
        }
    }
}
