//! Pulsebar Monitor
//!
//! Prints one JSON line per audio state change on stdout and accepts
//! control lines on stdin. Logs go to stderr; filter them with `RUST_LOG`.
//!
//! Usage: `pulsebar-monitor [config.json]`

mod commands;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use crossbeam_channel::{bounded, select, Sender};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use commands::ControlLine;
use pulsebar_core::{AudioSnapshot, BackendConfig};
use pulsebar_platform::{get_backend, AudioControl};

/// One line of monitor output
#[derive(Serialize)]
struct StatusLine<'a> {
    backend: &'static str,
    connected: bool,
    bluetooth: bool,
    #[serde(flatten)]
    snapshot: &'a AudioSnapshot,
}

fn print_status(backend: &dyn AudioControl) -> anyhow::Result<()> {
    let snapshot = backend.snapshot();
    let line = StatusLine {
        backend: backend.name(),
        connected: snapshot.is_connected(),
        bluetooth: snapshot.output.is_bluetooth(),
        snapshot: &snapshot,
    };

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &line)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

fn read_controls(control_tx: Sender<ControlLine>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        };
        match commands::parse(&line) {
            Ok(Some(command)) => {
                if control_tx.send(command).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{:#}", e),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pulsebar=info")),
        )
        .with_writer(io::stderr)
        .init();

    info!("Starting Pulsebar monitor");

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => BackendConfig::load_from(&path)
            .with_context(|| format!("failed to load configuration from {:?}", path))?,
        None => BackendConfig::load(),
    };

    // Rendering is coalesced: one pending wake-up is enough to print the latest state
    let (update_tx, update_rx) = bounded::<()>(1);
    let backend = get_backend(
        config,
        Arc::new(move || {
            let _ = update_tx.try_send(());
        }),
    )
    .context("failed to start audio backend")?;

    let (control_tx, control_rx) = bounded::<ControlLine>(16);
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || read_controls(control_tx))
        .context("failed to spawn stdin reader")?;

    print_status(backend.as_ref())?;

    loop {
        select! {
            recv(update_rx) -> msg => {
                if msg.is_err() {
                    break;
                }
                print_status(backend.as_ref())?;
            }
            recv(control_rx) -> msg => match msg {
                Ok(ControlLine::Quit) | Err(_) => break,
                Ok(command) => commands::apply(&command, backend.as_ref()),
            }
        }
    }

    info!("Pulsebar monitor exiting");
    Ok(())
}
