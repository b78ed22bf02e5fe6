//! Console event source.
//!
//! Stands in for the wire-level IRC client so `run` works end-to-end
//! without a network: stdin lines become operator PRIVMSGs, outbound
//! lines print to stdout.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use hubbub_core::{BotRegistry, dispatch};
use hubbub_types::Event;

/// Print the lines a connection queues for the wire.
pub fn spawn_outbound_printer(server_id: String, mut rx: mpsc::Receiver<String>) {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("[{server_id}] >> {line}");
        }
    });
}

/// Read stdin lines as operator messages: each line is dispatched as a
/// PRIVMSG from `operator` in `#console` on every connection. `/quit`
/// (or end of input) exits.
pub async fn run(registry: Arc<BotRegistry>) {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if line == "/quit" {
                    break;
                }
                for bot in registry.snapshot().iter() {
                    dispatch(bot, Event::privmsg("operator", "#console", line.clone())).await;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("stdin read failed: {e}");
                break;
            }
        }
    }
}
