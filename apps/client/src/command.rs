//! Parsing of user input lines into commands and frames.

use bytes::Bytes;
use parley_protocol::{FieldError, Frame, Info, MessageKind, Nickname};

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nick(String),
    Who,
    Whois(String),
    MsgAll(String),
    Msg { to: String, text: String },
    Create(String),
    ChannelList,
    Join(String),
    /// `/quit <channel>`.
    Leave(String),
    /// `/quit` on its own.
    Exit,
    Send { to: String, path: String },
    Accept,
    Reject,
    Help,
    /// Anything not starting with `/`.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command '{0}', type /help for the list")]
    Unknown(String),

    #[error("{0}")]
    Field(#[from] FieldError),
}

pub const HELP: &str = "\
/nick <name>           register or change your nickname
/who                   list connected users
/whois <nick>          show connection details of a user
/msgall <text>         send to everyone
/msg <nick> <text>     send a private message
/create <channel>      create a channel and join it
/channel_list          list channels
/join <channel>        join a channel
/quit <channel>        leave a channel
/send <nick> <path>    offer a file to a user
/accept, /reject       answer the latest file offer
/quit                  disconnect
/help                  show this help
Plain text goes to your current channel, or is echoed back when you are in none.";

/// Splits `rest` into one word and the remaining text.
fn word_and_rest(rest: &str) -> Option<(&str, &str)> {
    let (word, tail) = rest.split_once(char::is_whitespace)?;
    let tail = tail.trim();
    (!word.is_empty() && !tail.is_empty()).then_some((word, tail))
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(Command::Text(line.to_owned())));
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    let one_arg = |usage| {
        if rest.is_empty() || rest.contains(char::is_whitespace) {
            Err(CommandError::Usage(usage))
        } else {
            Ok(rest.to_owned())
        }
    };

    let command = match name {
        "/nick" => Command::Nick(one_arg("/nick <name>")?),
        "/who" => Command::Who,
        "/whois" => Command::Whois(one_arg("/whois <nick>")?),
        "/msgall" if !rest.is_empty() => Command::MsgAll(rest.to_owned()),
        "/msgall" => return Err(CommandError::Usage("/msgall <text>")),
        "/msg" => {
            let (to, text) = word_and_rest(rest).ok_or(CommandError::Usage("/msg <nick> <text>"))?;
            Command::Msg {
                to: to.to_owned(),
                text: text.to_owned(),
            }
        }
        "/create" => Command::Create(one_arg("/create <channel>")?),
        "/channel_list" => Command::ChannelList,
        "/join" => Command::Join(one_arg("/join <channel>")?),
        "/quit" if rest.is_empty() => Command::Exit,
        "/quit" => Command::Leave(one_arg("/quit [channel]")?),
        "/send" => {
            let (to, path) = word_and_rest(rest).ok_or(CommandError::Usage("/send <nick> <path>"))?;
            Command::Send {
                to: to.to_owned(),
                path: path.to_owned(),
            }
        }
        "/accept" => Command::Accept,
        "/reject" => Command::Reject,
        "/help" => Command::Help,
        other => return Err(CommandError::Unknown(other.to_owned())),
    };
    Ok(Some(command))
}

/// What the client knows about its own session when building frames.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub nickname: Option<&'a str>,
    pub channel: Option<&'a str>,
    /// Sent along with file-offer answers.
    pub local_addr: &'a str,
}

fn frame(
    kind: MessageKind,
    ctx: &Context<'_>,
    info: &str,
    payload: impl Into<Bytes>,
) -> Result<Frame, CommandError> {
    Ok(Frame::new(kind)
        .with_sender(Nickname::new(ctx.nickname.unwrap_or_default())?)
        .with_info(Info::new(info)?)
        .with_payload(payload))
}

impl Command {
    /// Builds the frame for this command, or `None` for purely local ones.
    ///
    /// Before registration, `/nick` becomes the registration request.
    pub fn to_frame(&self, ctx: &Context<'_>) -> Result<Option<Frame>, CommandError> {
        let built = match self {
            Command::Nick(name) if ctx.nickname.is_none() => Frame::new(MessageKind::NicknameNew)
                .with_sender(Nickname::new(name.as_str())?),
            Command::Nick(name) => frame(MessageKind::NicknameChanged, ctx, name, Bytes::new())?,
            Command::Who => frame(MessageKind::NicknameList, ctx, "", Bytes::new())?,
            Command::Whois(nick) => frame(MessageKind::NicknameInfos, ctx, nick, Bytes::new())?,
            Command::MsgAll(text) => frame(MessageKind::BroadcastSend, ctx, "", text.clone())?,
            Command::Msg { to, text } => frame(MessageKind::UnicastSend, ctx, to, text.clone())?,
            Command::Create(name) => frame(MessageKind::MulticastCreate, ctx, name, Bytes::new())?,
            Command::ChannelList => frame(MessageKind::MulticastList, ctx, "", Bytes::new())?,
            Command::Join(name) => frame(MessageKind::MulticastJoin, ctx, name, Bytes::new())?,
            Command::Leave(name) => frame(MessageKind::MulticastQuit, ctx, name, Bytes::new())?,
            Command::Send { to, path } => frame(MessageKind::FileRequest, ctx, to, path.clone())?,
            Command::Accept => frame(MessageKind::FileAccept, ctx, ctx.local_addr, Bytes::new())?,
            Command::Reject => frame(MessageKind::FileReject, ctx, "", Bytes::new())?,
            Command::Text(text) => match ctx.channel {
                Some(channel) => frame(MessageKind::MulticastSend, ctx, channel, text.clone())?,
                None => frame(MessageKind::EchoSend, ctx, "", text.clone())?,
            },
            Command::Exit | Command::Help => return Ok(None),
        };
        Ok(Some(built))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> Command {
        parse(line).unwrap().unwrap()
    }

    const REGISTERED: Context<'static> = Context {
        nickname: Some("alice"),
        channel: None,
        local_addr: "127.0.0.1:40000",
    };

    #[test]
    fn parses_commands() {
        assert_eq!(parsed("/nick bob"), Command::Nick("bob".into()));
        assert_eq!(parsed("/who"), Command::Who);
        assert_eq!(parsed("/whois bob"), Command::Whois("bob".into()));
        assert_eq!(parsed("/msgall hello  world"), Command::MsgAll("hello  world".into()));
        assert_eq!(
            parsed("/msg bob see you at 5"),
            Command::Msg {
                to: "bob".into(),
                text: "see you at 5".into()
            }
        );
        assert_eq!(parsed("/create dev"), Command::Create("dev".into()));
        assert_eq!(parsed("/channel_list"), Command::ChannelList);
        assert_eq!(parsed("/join dev"), Command::Join("dev".into()));
        assert_eq!(parsed("/quit dev"), Command::Leave("dev".into()));
        assert_eq!(parsed("/quit"), Command::Exit);
        assert_eq!(
            parsed("/send bob /tmp/my file.txt"),
            Command::Send {
                to: "bob".into(),
                path: "/tmp/my file.txt".into()
            }
        );
        assert_eq!(parsed("/accept"), Command::Accept);
        assert_eq!(parsed("/reject"), Command::Reject);
        assert_eq!(parsed("/help"), Command::Help);
        assert_eq!(parsed("just chatting\n"), Command::Text("just chatting".into()));
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   \n").unwrap(), None);
    }

    #[test]
    fn usage_errors() {
        assert!(matches!(parse("/nick"), Err(CommandError::Usage(_))));
        assert!(matches!(parse("/nick two words"), Err(CommandError::Usage(_))));
        assert!(matches!(parse("/msg bob"), Err(CommandError::Usage(_))));
        assert!(matches!(parse("/msgall"), Err(CommandError::Usage(_))));
        assert!(matches!(parse("/send bob"), Err(CommandError::Usage(_))));
        assert_eq!(
            parse("/dance").unwrap_err(),
            CommandError::Unknown("/dance".into())
        );
    }

    #[test]
    fn nick_registers_first_then_renames() {
        let unregistered = Context {
            nickname: None,
            ..REGISTERED
        };
        let hello = parsed("/nick bob").to_frame(&unregistered).unwrap().unwrap();
        assert_eq!(hello.kind, MessageKind::NicknameNew);
        assert_eq!(hello.sender, "bob");

        let rename = parsed("/nick bob").to_frame(&REGISTERED).unwrap().unwrap();
        assert_eq!(rename.kind, MessageKind::NicknameChanged);
        assert_eq!(rename.sender, "alice");
        assert_eq!(rename.info, "bob");
    }

    #[test]
    fn plain_text_targets_channel_or_echo() {
        let echo = parsed("hi").to_frame(&REGISTERED).unwrap().unwrap();
        assert_eq!(echo.kind, MessageKind::EchoSend);

        let in_dev = Context {
            channel: Some("dev"),
            ..REGISTERED
        };
        let send = parsed("hi").to_frame(&in_dev).unwrap().unwrap();
        assert_eq!(send.kind, MessageKind::MulticastSend);
        assert_eq!(send.info, "dev");
        assert_eq!(send.payload_text(), "hi");
    }

    #[test]
    fn frames_carry_arguments() {
        let msg = parsed("/msg bob hey").to_frame(&REGISTERED).unwrap().unwrap();
        assert_eq!(msg.kind, MessageKind::UnicastSend);
        assert_eq!(msg.info, "bob");
        assert_eq!(msg.payload_text(), "hey");

        let offer = parsed("/send bob /tmp/a").to_frame(&REGISTERED).unwrap().unwrap();
        assert_eq!(offer.kind, MessageKind::FileRequest);
        assert_eq!(offer.payload_text(), "/tmp/a");

        let accept = parsed("/accept").to_frame(&REGISTERED).unwrap().unwrap();
        assert_eq!(accept.kind, MessageKind::FileAccept);
        assert_eq!(accept.info, "127.0.0.1:40000");
    }

    #[test]
    fn local_commands_have_no_frame() {
        assert!(Command::Help.to_frame(&REGISTERED).unwrap().is_none());
        assert!(Command::Exit.to_frame(&REGISTERED).unwrap().is_none());
    }

    #[test]
    fn overlong_nickname_is_refused() {
        let unregistered = Context {
            nickname: None,
            ..REGISTERED
        };
        let long = format!("/nick {}", "n".repeat(200));
        let err = parsed(&long).to_frame(&unregistered).unwrap_err();
        assert!(matches!(err, CommandError::Field(_)));
    }
}
