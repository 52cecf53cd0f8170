//! Chat Relay terminal client.
//!
//! Connects to the server, logs in, and then runs one loop that multiplexes
//! two sources:
//!
//! ```text
//! main()
//!  └─ ServerConnection::connect() + login()
//!  └─ reader task: read_response() -> mpsc channel
//!  └─ select! loop
//!       ├─ stdin line      -> parse_command() -> RequestWriter::send()
//!       └─ inbound frame   -> render_response() -> stdout
//! ```
//!
//! Frames are read on their own task because a half-read frame cannot be
//! abandoned when a stdin line arrives first.
//!
//! The client exits after the server acknowledges EXIT, when the server
//! closes the connection, or after stdin ends and the EXIT ack arrives.

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use chat_client::application::command::parse_command;
use chat_client::application::render::{render_response, welcome_banner};
use chat_client::infrastructure::connection::{ClientError, ServerConnection};
use chat_core::{Request, Response, ResponseType};

/// Chat Relay terminal client.
#[derive(Debug, Parser)]
#[command(name = "chat-client", about = "Terminal client for Chat Relay", version)]
struct Cli {
    /// Server host name or IP address.
    #[arg(long, default_value = "127.0.0.1", env = "CHAT_SERVER_HOST")]
    host: String,

    /// Server TCP port.
    #[arg(long, default_value_t = 9034, env = "CHAT_SERVER_PORT")]
    port: u16,

    /// Display name to log in with.  Prompted for when omitted.
    #[arg(long, env = "CHAT_NAME")]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let name = match cli.name {
        Some(name) => name,
        None => {
            prompt("Enter user name: ")?;
            lines
                .next_line()
                .await?
                .map(|line| line.trim().to_string())
                .context("no user name given")?
        }
    };

    let mut conn = ServerConnection::connect(&cli.host, cli.port).await?;
    conn.login(&name)
        .await
        .with_context(|| format!("could not log in as '{name}'"))?;
    info!("logged in to {}:{} as {name}", cli.host, cli.port);
    println!("{}", welcome_banner(&name));

    let (mut reader, mut writer) = conn.into_split();

    let (frame_tx, mut frame_rx) = mpsc::channel::<Result<Response, ClientError>>(64);
    tokio::spawn(async move {
        loop {
            let result = reader.read_response().await;
            let stop = result.is_err();
            if frame_tx.send(result).await.is_err() || stop {
                break;
            }
        }
    });

    let mut stdin_open = true;
    prompt("> ")?;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        match parse_command(&line) {
                            Ok(Some(request)) => match writer.send(&request).await {
                                Ok(()) => {}
                                Err(ClientError::Protocol(e)) => println!("{e}"),
                                Err(e) => return Err(e.into()),
                            },
                            Ok(None) => {}
                            Err(e) => println!("{e}"),
                        }
                        prompt("> ")?;
                    }
                    None => {
                        debug!("stdin closed; logging out");
                        stdin_open = false;
                        writer.send(&Request::Exit).await?;
                    }
                }
            }
            frame = frame_rx.recv() => {
                match frame {
                    Some(Ok(response)) => {
                        let text = render_response(&response, &name);
                        if !text.is_empty() {
                            println!("\n{text}");
                        }
                        if ends_session(&response) {
                            break;
                        }
                        prompt("> ")?;
                    }
                    Some(Err(ClientError::Closed)) | None => {
                        println!("\nServer closed the connection");
                        break;
                    }
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("shutdown after logout failed: {e}");
    }
    Ok(())
}

/// True for frames after which the server will not talk to us again.
fn ends_session(response: &Response) -> bool {
    matches!(
        response,
        Response::Exit
            | Response::Failure {
                kind: ResponseType::Error,
                ..
            }
    )
}

fn prompt(text: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{text}")?;
    stdout.flush()
}
