//! Headless mode runner - main event loop without a UI
//!
//! Reads command lines from stdin, feeds them to the engine and emits JSON
//! events for commands, telemetry and errors until the session closes.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;

use rclink_app::{Engine, Message, Outcome, Settings};
use rclink_channel::{ReceiverExit, SessionEvent};
use rclink_core::prelude::*;

use super::HeadlessEvent;

/// Lines buffered between the stdin thread and the event loop
const STDIN_BUFFER: usize = 32;

/// Run in headless mode - connect, then drive the vehicle from stdin
pub async fn run_headless(settings: Settings, credential: Option<&str>) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("rclink starting in HEADLESS mode");
    info!(
        "Vehicle: {}:{}",
        settings.connection.host, settings.connection.port
    );
    info!("═══════════════════════════════════════════════════════");

    let mut engine = match Engine::connect(settings, credential).await {
        Ok(engine) => engine,
        Err(e) => {
            HeadlessEvent::error(e.to_string(), true).emit();
            return Err(e);
        }
    };
    let events = match engine.start() {
        Ok(events) => events,
        Err(e) => {
            HeadlessEvent::error(e.to_string(), true).emit();
            return Err(e);
        }
    };
    HeadlessEvent::connected(engine.session().peer()).emit();

    let (line_tx, line_rx) = mpsc::channel(STDIN_BUFFER);
    std::thread::spawn(move || {
        spawn_stdin_reader_blocking(line_tx);
    });

    let result = headless_event_loop(&mut engine, events, line_rx, |event| event.emit()).await;

    info!("rclink headless mode exiting");
    result
}

/// Main headless event loop
///
/// `events` must be subscribed before the session started, see
/// [`Engine::start`]. Returns once the session is closed, by `quit`, end of input or the
/// vehicle hanging up. A fatal command error closes the session and is
/// returned.
pub async fn headless_event_loop<F>(
    engine: &mut Engine,
    mut events: broadcast::Receiver<SessionEvent>,
    mut lines: mpsc::Receiver<String>,
    mut emit: F,
) -> Result<()>
where
    F: FnMut(HeadlessEvent),
{
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    info!("Stdin closed");
                    let stats = engine.shutdown().await;
                    emit(HeadlessEvent::disconnected("input closed", stats.as_ref()));
                    return Ok(());
                };

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let message = match trimmed.parse::<Message>() {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Bad stdin command {:?}: {}", trimmed, e);
                        emit(HeadlessEvent::error(e.to_string(), false));
                        continue;
                    }
                };

                match engine.process_message(message).await {
                    Ok(Outcome::Sent { key, value }) => {
                        emit(HeadlessEvent::command_sent(key, value));
                    }
                    Ok(Outcome::Unchanged) => {}
                    Ok(Outcome::Status(dashboard)) => emit(HeadlessEvent::status(dashboard)),
                    Ok(Outcome::Closed { stats }) => {
                        emit(HeadlessEvent::disconnected("quit", stats.as_ref()));
                        return Ok(());
                    }
                    Err(e) if e.is_fatal() => {
                        error!("Fatal session error: {}", e);
                        emit(HeadlessEvent::error(e.to_string(), true));
                        let stats = engine.shutdown().await;
                        emit(HeadlessEvent::disconnected("session error", stats.as_ref()));
                        return Err(e);
                    }
                    Err(e) => emit(HeadlessEvent::error(e.to_string(), false)),
                }
            }

            event = events.recv() => match event {
                Ok(SessionEvent::DataReceived { sequence, keys }) => {
                    let dashboard = engine.dashboard().await;
                    emit(HeadlessEvent::telemetry(sequence, keys, dashboard));
                }
                Ok(SessionEvent::ReceiverStopped { exit }) => {
                    let reason = match exit {
                        ReceiverExit::StreamClosed => "vehicle closed the connection".to_string(),
                        ReceiverExit::ReadFailed { message } => message,
                    };
                    info!("Receiver stopped: {}", reason);
                    let stats = engine.shutdown().await;
                    emit(HeadlessEvent::disconnected(reason, stats.as_ref()));
                    return Ok(());
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} session events", skipped);
                }
                Err(RecvError::Closed) => {
                    let stats = engine.shutdown().await;
                    emit(HeadlessEvent::disconnected("session closed", stats.as_ref()));
                    return Ok(());
                }
            },
        }
    }
}

/// Forward stdin lines to the event loop (blocking; run on its own thread)
fn spawn_stdin_reader_blocking(line_tx: mpsc::Sender<String>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        match line {
            Ok(line) => {
                let quit = line.trim() == "quit";
                if line_tx.blocking_send(line).is_err() || quit {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    info!("Stdin reader exiting");
}
