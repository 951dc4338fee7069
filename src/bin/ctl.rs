use anyhow::{Context, Result};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};

// Stand-in controller for driving a bridge by hand: listens where the real
// controller would, waits for the bridge to dial in, then turns stdin lines
// into frames.

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on for the bridge
    #[arg(short, long, default_value = "127.0.0.1:8082")]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    println!("Waiting for bridge on {}...", args.listen);

    let (stream, peer) = listener.accept().await?;
    let mut ws = accept_async(stream)
        .await
        .context("websocket handshake failed")?;
    println!("Bridge connected from {peer}.");
    println!("Type a shell command, or ':file <path> <content>' (\\n for newlines). 'exit' quits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == "exit" {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                match frame_for(line) {
                    Some(frame) => ws.send(Message::Text(frame)).await?,
                    None => println!("usage: ':file <path> <content>'"),
                }
            }
            incoming = ws.next() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => ws.send(Message::Pong(payload)).await?,
                    Some(Ok(Message::Close(_))) | None => {
                        println!("Bridge disconnected.");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        eprintln!("Websocket error: {err}");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn frame_for(line: &str) -> Option<String> {
    if let Some(rest) = line.strip_prefix(":file ") {
        let (path, content) = rest.split_once(' ')?;
        Some(
            json!({
                "type": "file-update",
                "fullPath": path,
                "fileContent": content.replace("\\n", "\n"),
            })
            .to_string(),
        )
    } else {
        Some(
            json!({
                "type": "terminal-update",
                "shellCommand": line,
            })
            .to_string(),
        )
    }
}
