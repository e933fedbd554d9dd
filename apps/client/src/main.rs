//! Parley interactive chat client.

mod command;
mod render;

use std::io::Write;

use anyhow::Context as _;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use parley_protocol::{FrameCodec, MessageKind};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing_subscriber::EnvFilter;

use crate::command::{Command, Context, HELP};
use crate::render::{ClientState, render};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server host name or address.
    host: String,

    /// Server port.
    port: u16,
}

fn show_prompt(state: &ClientState) {
    print!("{}", state.prompt());
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let stream = TcpStream::connect((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", args.host, args.port))?;
    let local_addr = stream.local_addr()?.to_string();
    tracing::info!(host = %args.host, port = args.port, %local_addr, "connected");

    let mut server = Framed::new(stream, FrameCodec::new());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut state = ClientState::default();

    println!("Connected. Please register with /nick <name> (type /help for commands).");
    show_prompt(&state);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = match command::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => {
                        show_prompt(&state);
                        continue;
                    }
                    Err(e) => {
                        println!("{e}");
                        show_prompt(&state);
                        continue;
                    }
                };

                match command {
                    Command::Exit => break,
                    Command::Help => println!("{HELP}"),
                    Command::Nick(_) => {}
                    _ if !state.is_registered() => {
                        println!("Please register first with /nick <name>.");
                        show_prompt(&state);
                        continue;
                    }
                    _ => {}
                }

                let ctx = Context {
                    nickname: state.nickname.as_deref(),
                    channel: state.channel.as_deref(),
                    local_addr: &local_addr,
                };
                match command.to_frame(&ctx) {
                    Ok(Some(frame)) => server.send(frame).await?,
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
                show_prompt(&state);
            }

            frame = server.next() => {
                let Some(frame) = frame else {
                    println!("\nThe server closed the connection.");
                    break;
                };
                let frame = frame.context("connection to server failed")?;
                state.apply(&frame);
                if let Some(line) = render(&frame) {
                    println!("\n{line}");
                }
                if frame.kind == MessageKind::NicknameDuplicate {
                    anyhow::bail!("nickname rejected by server");
                }
                show_prompt(&state);
            }
        }
    }

    let _ = server.close().await;
    println!("Disconnected from server.");
    Ok(())
}
