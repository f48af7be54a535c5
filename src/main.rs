//! LiveStock feed viewer — binary entrypoint.
//! Connects to the backend's SSE stream and prints the deduplicated event window
//! whenever it changes. Commands on stdin: `start`, `stop`, `status`, `quit`.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use livestock_feed::{display, metrics, telemetry};
use livestock_feed::{ClientConfig, FeedControl, FeedSession, SseTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; harmless when absent.
    let _ = dotenvy::dotenv();

    let cfg = ClientConfig::load_default().context("loading client config")?;
    telemetry::init(cfg.log_format);

    if let Some(addr) = cfg.metrics_addr.as_deref() {
        metrics::install_exporter(addr)?;
    }

    let transport = SseTransport::from_config(&cfg)?;
    let control = FeedControl::from_config(&cfg);
    tracing::info!(url = transport.url(), capacity = cfg.capacity, "starting feed viewer");

    let (session, handle) = FeedSession::new(&cfg, Arc::new(transport), Some(control.clone()));
    let session_task = tokio::spawn(session.run());

    // Redraw on every published view.
    let mut views = handle.subscribe();
    let printer = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            println!("{}", display::render_view(&view));
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else { break };
                match line.trim().to_ascii_lowercase().as_str() {
                    "start" => handle.start_feed().await?,
                    "stop" => handle.stop_feed().await?,
                    "status" => match control.status().await {
                        Ok(s) => println!("backend feed running: {}", s.running),
                        Err(e) => tracing::warn!(error = ?e, "status request failed"),
                    },
                    "quit" | "exit" => break,
                    "" => {}
                    other => println!("unknown command '{other}' (start | stop | status | quit)"),
                }
            }
        }
    }

    handle.shutdown().await;
    let store = session_task.await.context("feed session task")?;
    printer.abort();
    tracing::info!(held = store.len(), "bye");
    Ok(())
}
