//! End-to-end scenarios against a real server over loopback TCP.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parley_protocol::{Frame, FrameCodec, Info, MessageKind, Nickname};
use parley_relay::{ChatServer, ServerConfig};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(150);

struct TestServer {
    server: Arc<ChatServer>,
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        Self::with_config(ServerConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..ServerConfig::default()
        })
        .await
    }

    async fn with_config(config: ServerConfig) -> Self {
        let server = ChatServer::new(config);
        let runner = Arc::clone(&server);
        let task = tokio::spawn(async move {
            runner.run().await.unwrap();
        });

        // Poll until the listener is bound.
        let addr = timeout(WAIT, async {
            loop {
                if let Some(addr) = server.local_addr().await {
                    return addr;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("server did not bind");

        Self { server, addr, task }
    }

    async fn connect(&self) -> Client {
        let stream = TcpStream::connect(self.addr).await.unwrap();
        Client {
            framed: Framed::new(stream, FrameCodec::new()),
        }
    }

    /// Connects and registers, consuming the acknowledgement.
    async fn login(&self, nick: &str) -> Client {
        let mut client = self.connect().await;
        client.send(MessageKind::NicknameNew, nick, "", "").await;
        let ack = client.recv().await;
        assert_eq!(ack.kind, MessageKind::NicknameNew);
        assert_eq!(ack.info, nick);
        client
    }

    async fn stop(self) {
        self.server.shutdown();
        timeout(WAIT, self.task).await.unwrap().unwrap();
    }
}

struct Client {
    framed: Framed<TcpStream, FrameCodec>,
}

impl Client {
    async fn send(&mut self, kind: MessageKind, sender: &str, info: &str, payload: &str) {
        let frame = Frame::new(kind)
            .with_sender(Nickname::new(sender).unwrap())
            .with_info(Info::new(info).unwrap())
            .with_payload(payload.to_owned());
        self.framed.send(frame).await.unwrap();
    }

    async fn recv(&mut self) -> Frame {
        timeout(WAIT, self.framed.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .expect("decode error")
    }

    /// Asserts nothing arrives for a short while.
    async fn assert_silent(&mut self) {
        if let Ok(Some(frame)) = timeout(QUIET, self.framed.next()).await {
            panic!("unexpected frame: {frame:?}");
        }
    }

    /// Waits for the server to close the connection.
    async fn assert_closed(&mut self) {
        let next = timeout(WAIT, self.framed.next())
            .await
            .expect("connection was not closed");
        assert!(next.is_none(), "expected EOF, got {next:?}");
    }

    /// Round-trips an echo so every earlier frame has been processed.
    async fn sync(&mut self) {
        self.send(MessageKind::EchoSend, "", "", "sync").await;
        let frame = self.recv().await;
        assert_eq!(frame.kind, MessageKind::EchoSend);
    }
}

#[tokio::test]
async fn duplicate_nickname_is_rejected_and_closed() {
    let server = TestServer::start().await;
    let mut x = server.login("alice").await;

    let mut y = server.connect().await;
    y.send(MessageKind::NicknameNew, "alice", "", "").await;
    assert_eq!(y.recv().await.kind, MessageKind::NicknameDuplicate);
    y.assert_closed().await;

    x.send(MessageKind::NicknameList, "alice", "", "").await;
    let list = x.recv().await;
    assert_eq!(list.info, "1 users online");
    assert_eq!(list.payload_text(), " - alice\n");

    server.stop().await;
}

#[tokio::test]
async fn channel_is_deleted_with_its_last_member() {
    let server = TestServer::start().await;
    let mut x = server.login("x").await;
    let mut y = server.login("y").await;

    x.send(MessageKind::MulticastCreate, "x", "dev", "").await;
    assert_eq!(x.recv().await.kind, MessageKind::MulticastCreate);

    y.send(MessageKind::MulticastJoin, "y", "dev", "").await;
    assert_eq!(y.recv().await.kind, MessageKind::MulticastJoin);
    assert_eq!(x.recv().await.kind, MessageKind::MulticastNotification);

    x.send(MessageKind::MulticastQuit, "x", "dev", "").await;
    assert_eq!(x.recv().await.kind, MessageKind::MulticastQuit);
    assert_eq!(y.recv().await.kind, MessageKind::MulticastNotification);

    x.send(MessageKind::MulticastList, "x", "", "").await;
    assert_eq!(x.recv().await.payload_text(), " - dev\n");

    y.send(MessageKind::MulticastQuit, "y", "dev", "").await;
    assert_eq!(y.recv().await.kind, MessageKind::MulticastQuit);

    x.send(MessageKind::MulticastList, "x", "", "").await;
    let list = x.recv().await;
    assert_eq!(list.info, "0 channels");
    assert!(list.payload.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn channel_messages_reach_every_other_member_once() {
    let server = TestServer::start().await;
    let mut x = server.login("x").await;
    let mut y = server.login("y").await;
    let mut z = server.login("z").await;

    x.send(MessageKind::MulticastCreate, "x", "dev", "").await;
    x.recv().await;
    y.send(MessageKind::MulticastJoin, "y", "dev", "").await;
    y.recv().await;
    x.recv().await;
    z.send(MessageKind::MulticastJoin, "z", "dev", "").await;
    z.recv().await;
    x.recv().await;
    y.recv().await;

    x.send(MessageKind::MulticastSend, "x", "dev", "hello dev").await;
    for member in [&mut y, &mut z] {
        let frame = member.recv().await;
        assert_eq!(frame.kind, MessageKind::MulticastSend);
        assert_eq!(frame.sender, "x");
        assert_eq!(frame.info, "dev");
        assert_eq!(frame.payload_text(), "hello dev");
        member.assert_silent().await;
    }
    x.assert_silent().await;

    server.stop().await;
}

#[tokio::test]
async fn unicast_to_unknown_nickname_reports_error_only_to_sender() {
    let server = TestServer::start().await;
    let mut x = server.login("x").await;
    let mut y = server.login("y").await;

    x.send(MessageKind::UnicastSend, "x", "bob", "are you there?").await;
    let reply = x.recv().await;
    assert_eq!(reply.kind, MessageKind::Error);
    assert!(reply.info.as_str().contains("not found"));
    y.assert_silent().await;

    // The sender's session survives.
    x.sync().await;

    server.stop().await;
}

#[tokio::test]
async fn file_answers_route_to_latest_offer_first() {
    let server = TestServer::start().await;
    let mut x = server.login("x").await;
    let mut w = server.login("w").await;
    let mut v = server.login("v").await;

    w.send(MessageKind::FileRequest, "w", "x", "/home/w/a.txt").await;
    let first = x.recv().await;
    assert_eq!(first.kind, MessageKind::FileRequest);
    assert_eq!(first.sender, "w");
    assert_eq!(first.payload_text(), "/home/w/a.txt");

    v.send(MessageKind::FileRequest, "v", "x", "/home/v/b.txt").await;
    assert_eq!(x.recv().await.sender, "v");

    x.send(MessageKind::FileAccept, "x", "127.0.0.1:9999", "").await;
    let accepted = v.recv().await;
    assert_eq!(accepted.kind, MessageKind::FileAccept);
    assert_eq!(accepted.sender, "x");
    assert_eq!(accepted.info, "127.0.0.1:9999");
    w.assert_silent().await;

    x.send(MessageKind::FileReject, "x", "", "").await;
    assert_eq!(w.recv().await.kind, MessageKind::FileReject);

    server.stop().await;
}

#[tokio::test]
async fn disconnect_notifies_channel_members() {
    let server = TestServer::start().await;
    let mut x = server.login("x").await;
    let mut y = server.login("y").await;

    x.send(MessageKind::MulticastCreate, "x", "dev", "").await;
    x.recv().await;
    y.send(MessageKind::MulticastJoin, "y", "dev", "").await;
    y.recv().await;
    x.recv().await;

    drop(x);
    let notice = y.recv().await;
    assert_eq!(notice.kind, MessageKind::MulticastNotification);
    assert_eq!(notice.sender, "x");
    assert!(notice.payload_text().contains("disconnected"));

    y.send(MessageKind::NicknameList, "y", "", "").await;
    assert_eq!(y.recv().await.info, "1 users online");

    server.stop().await;
}

#[tokio::test]
async fn frame_before_registration_closes_connection() {
    let server = TestServer::start().await;
    let mut c = server.connect().await;

    c.send(MessageKind::BroadcastSend, "", "", "hi").await;
    assert_eq!(c.recv().await.kind, MessageKind::Error);
    c.assert_closed().await;

    server.stop().await;
}

#[tokio::test]
async fn oversized_payload_closes_only_offender() {
    let server = TestServer::with_config(ServerConfig {
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        max_payload: 16,
        ..ServerConfig::default()
    })
    .await;
    let mut x = server.login("x").await;
    let mut y = server.login("y").await;

    // The client codec allows more than the server does.
    x.send(MessageKind::BroadcastSend, "x", "", &"a".repeat(64)).await;

    y.assert_silent().await;
    y.send(MessageKind::NicknameList, "y", "", "").await;
    let list = y.recv().await;
    assert_eq!(list.info, "1 users online");
    assert_eq!(list.payload_text(), " - y\n");
    drop(x);

    server.stop().await;
}

#[tokio::test]
async fn server_notices_ignore_the_inbound_payload_limit() {
    let server = TestServer::with_config(ServerConfig {
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        max_payload: 16,
        ..ServerConfig::default()
    })
    .await;
    let mut x = server.login("x").await;
    let mut y = server.login("y").await;

    x.send(MessageKind::MulticastCreate, "x", "dev", "").await;
    assert_eq!(x.recv().await.kind, MessageKind::MulticastCreate);

    // Both the acknowledgement and the notification exceed 16 bytes.
    y.send(MessageKind::MulticastJoin, "y", "dev", "").await;
    let ack = y.recv().await;
    assert_eq!(ack.kind, MessageKind::MulticastJoin);
    assert!(ack.payload.len() > 16);
    let notice = x.recv().await;
    assert_eq!(notice.kind, MessageKind::MulticastNotification);
    y.sync().await;

    drop(y);
    assert_eq!(x.recv().await.kind, MessageKind::MulticastNotification);
    x.send(MessageKind::NicknameList, "x", "", "").await;
    let list = x.recv().await;
    assert_eq!(list.info, "1 users online");

    server.stop().await;
}

#[tokio::test]
async fn broadcast_fans_out_to_everyone_else() {
    let server = TestServer::start().await;
    let mut x = server.login("x").await;
    let mut y = server.login("y").await;
    let mut z = server.login("z").await;

    x.send(MessageKind::BroadcastSend, "x", "", "hi all").await;
    for other in [&mut y, &mut z] {
        let frame = other.recv().await;
        assert_eq!(frame.kind, MessageKind::BroadcastSend);
        assert_eq!(frame.sender, "x");
    }
    x.assert_silent().await;

    server.stop().await;
}
