use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use genie_bridge::Bridge;
use genie_bridge::editor::BufferEditor;
use genie_bridge::terminal::PtyTerminalHost;
use genie_bridge::writer::RENDER_TICK;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Controller websocket address
    #[arg(short, long, default_value = "ws://localhost:8082")]
    url: String,

    /// Workspace root that relative file paths resolve against
    /// (defaults to the current directory)
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Milliseconds between two render steps of a file update
    #[arg(long, default_value_t = RENDER_TICK.as_millis() as u64)]
    tick_ms: u64,
}

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let workspace = match args.workspace {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };
    info!(url = %args.url, workspace = %workspace.display(), "starting bridge");

    let bridge = Bridge::new(
        Arc::new(BufferEditor::new()),
        Arc::new(PtyTerminalHost),
        workspace,
        Duration::from_millis(args.tick_ms),
    );

    let mut delay = Duration::from_secs(1);
    loop {
        match run_connection(&args.url, &bridge).await {
            Ok(()) => {
                info!("connection closed, reconnecting");
                delay = Duration::from_secs(1);
            }
            Err(err) => {
                warn!(error = %err, delay_secs = delay.as_secs(), "connection failed, backing off");
            }
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(MAX_RECONNECT_DELAY);
    }
}

async fn run_connection(url: &str, bridge: &Bridge) -> Result<()> {
    let (ws, _) = connect_async(url)
        .await
        .context("failed to connect to controller")?;
    info!("connected to controller");

    let (mut sink, mut stream) = ws.split();
    while let Some(frame) = stream.next().await {
        match frame.context("websocket read failed")? {
            Message::Text(text) => bridge.handle_frame(&text),
            Message::Ping(payload) => {
                let _ = sink.send(Message::Pong(payload)).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}
