//! Unix signal handling for the live `run` command.
//!
//! A dedicated thread turns signals into [`HostEvent`]s and sends them over a
//! channel that the host's event loop waits on:
//!
//! - `SIGUSR1` toggles ambient mode
//! - `SIGUSR2` toggles visibility
//! - `SIGINT`, `SIGTERM` and `SIGHUP` stop the run

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use crate::host::HostEvent;

/// Channel ends shared between the signal thread and the main loop.
pub struct SignalState {
    /// Events produced by signals, consumed by the host
    pub receiver: Receiver<HostEvent>,
    /// Extra sender so other producers can inject events
    pub sender: Sender<HostEvent>,
}

/// Map a raw signal number to the host event it requests.
pub fn event_for_signal(signal: i32) -> Option<HostEvent> {
    match signal {
        SIGUSR1 => Some(HostEvent::ToggleAmbient),
        SIGUSR2 => Some(HostEvent::ToggleVisible),
        SIGINT | SIGTERM | SIGHUP => Some(HostEvent::Shutdown),
        _ => None,
    }
}

/// Register signal handlers and spawn the thread that forwards them.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let (sender, receiver) = channel::<HostEvent>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;

    let thread_sender = sender.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            let Some(event) = event_for_signal(sig) else {
                continue;
            };

            if debug_enabled {
                log_pipe!();
                log_debug!("Signal {sig} received, forwarding {event:?}");
            }

            let shutdown = event == HostEvent::Shutdown;
            if thread_sender.send(event).is_err() || shutdown {
                // Receiver gone or stop requested; the main loop exits on its own
                break;
            }
        }
    });

    Ok(SignalState { receiver, sender })
}
