//! Inbound event channel and the producers that feed it.
//!
//! Producers only enqueue [`AppEvent`]s; the event loop in [`crate::app`] is
//! the single consumer. A producer's threading model therefore never leaks into
//! the coordinator.

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use crate::notify::{NotificationSink, Notifier};

/// Something the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    ToggleBlocking,
    ToggleOverlay,
    Exit,
}

/// Map one console line to an event. `None` for unrecognised input.
pub fn parse_command(line: &str) -> Option<AppEvent> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "t" | "toggle" => Some(AppEvent::ToggleBlocking),
        "o" | "overlay" => Some(AppEvent::ToggleOverlay),
        "q" | "quit" | "exit" => Some(AppEvent::Exit),
        _ => None,
    }
}

pub const COMMAND_HELP: &str = "Commands: [Enter]/t = toggle, o = overlay, q = quit";

/// Starts the event producers.
///
/// Producers are started in order:
/// 1. Signal listener (Ctrl+C / SIGTERM → Exit), so shutdown works even if
///    the console is unavailable
/// 2. Console reader (stdin lines → events; help text for anything else)
pub struct InputServices;

impl InputServices {
    pub fn start(tx: mpsc::Sender<AppEvent>, notifier: Notifier) {
        Self::start_signal_listener(tx.clone());
        Self::start_console_reader(tx, notifier);
    }

    fn start_signal_listener(tx: mpsc::Sender<AppEvent>) {
        tokio::spawn(async move {
            wait_for_termination().await;
            tracing::debug!("Termination signal received");
            let _ = tx.send(AppEvent::Exit).await;
        });
    }

    fn start_console_reader(tx: mpsc::Sender<AppEvent>, notifier: Notifier) {
        tokio::spawn(async move {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            forward_commands(stdin, &tx, &notifier).await;
        });
    }
}

/// Turn input lines into events until the input ends, a read fails, or the
/// receiver is gone.
async fn forward_commands<R>(input: R, tx: &mpsc::Sender<AppEvent>, notifier: &Notifier)
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_command(&line) {
                Some(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                None => notifier.print_line(COMMAND_HELP),
            },
            Ok(None) => {
                tracing::debug!("Console input closed; console commands disabled");
                break;
            }
            Err(e) => {
                tracing::warn!("Failed to read console input: {e}");
                break;
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl+C handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
}
