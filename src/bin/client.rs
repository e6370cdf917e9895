//! `dashstream` Client Binary
//!
//! Minimal WebSocket client: sends one command and prints the replies.
//!
//! ## Usage
//!
//! ```bash
//! # One snapshot from a local server
//! cargo run --bin dashstream-client
//!
//! # Follow the stream for five snapshots
//! cargo run --bin dashstream-client -- --command start_stream --count 5
//!
//! # Echo
//! cargo run --bin dashstream-client -- --command hello
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use dashstream::protocol::command::GET_DASHBOARD_DATA;
use dashstream::protocol::{DashboardSnapshot, DEFAULT_PORT, WS_PATH};

/// Dashboard WebSocket client
#[derive(Parser, Debug)]
#[command(name = "dashstream-client")]
#[command(version, about = "Send a command to a dashstream server", long_about = None)]
struct Args {
    /// Server host
    #[arg(short = 'H', long = "host", default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Command (or any text to echo)
    #[arg(short = 'c', long = "command", default_value = GET_DASHBOARD_DATA)]
    command: String,

    /// Exit after this many replies
    #[arg(short = 'n', long = "count", default_value_t = 1)]
    count: usize,

    /// Print raw JSON instead of a summary
    #[arg(long = "raw")]
    raw: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let url = format!("ws://{}:{}{WS_PATH}", args.host, args.port);

    let (mut socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;

    socket
        .send(Message::Text(args.command.clone()))
        .await
        .context("failed to send command")?;

    let mut received = 0;
    while received < args.count {
        let Some(frame) = socket.next().await else {
            bail!("connection ended after {received} replies");
        };
        match frame.context("websocket error")? {
            Message::Text(text) => {
                received += 1;
                print_reply(&text, args.raw);
            }
            Message::Binary(data) => {
                received += 1;
                println!("<binary {} bytes>", data.len());
            }
            Message::Close(frame) => {
                match frame {
                    Some(f) => println!("closed by server: {} ({})", u16::from(f.code), f.reason),
                    None => println!("closed by server"),
                }
                return Ok(());
            }
            _ => {}
        }
    }

    socket.close(None).await.ok();
    Ok(())
}

fn print_reply(text: &str, raw: bool) {
    if raw {
        println!("{text}");
        return;
    }
    match serde_json::from_str::<DashboardSnapshot>(text) {
        Ok(snapshot) => {
            println!("snapshot @ {}", snapshot.timestamp.to_rfc3339());
            for metric in &snapshot.metrics {
                println!(
                    "  {:<20} {:>10.2} / {:<8} {}",
                    metric.name, metric.value, metric.max_value, metric.unit
                );
            }
            for row in &snapshot.table_data {
                println!(
                    "  #{:<3} {:<12} {:<8} {:>8.2}",
                    row.id, row.name, row.status, row.value
                );
            }
        }
        Err(_) => println!("{text}"),
    }
}
