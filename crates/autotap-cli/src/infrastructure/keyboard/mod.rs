//! Keyboard control adapter.
//!
//! Translates terminal key presses into the three abstract control signals
//! the scheduler understands:
//!
//! | Key              | Signal        |
//! |------------------|---------------|
//! | `p` / `P`        | `TogglePause` |
//! | `r` / `R`        | `Resume`      |
//! | `q` / `Q` / `^C` | `Quit`        |
//!
//! The terminal runs in raw mode so single key presses arrive without a
//! newline.  Raw mode is restored on [`KeyboardListener::stop`] and again
//! on drop, so a panic elsewhere does not leave the operator's terminal
//! unusable.
//!
//! crossterm's `event::read` is blocking, so the read loop lives on a
//! blocking task and forwards signals over an mpsc channel, the same
//! typed-channel shape every other input to the scheduler uses.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use autotap_core::ControlSignal;

/// Maps one key event to a control signal, if any.
///
/// Key releases are ignored (Windows terminals report both edges).
pub fn map_key(event: &KeyEvent) -> Option<ControlSignal> {
    if event.kind == KeyEventKind::Release {
        return None;
    }
    match event.code {
        KeyCode::Char('p') | KeyCode::Char('P') => Some(ControlSignal::TogglePause),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(ControlSignal::Resume),
        KeyCode::Char('q') | KeyCode::Char('Q') => Some(ControlSignal::Quit),
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(ControlSignal::Quit)
        }
        _ => None,
    }
}

/// Owns the raw-mode terminal and the blocking read loop.
pub struct KeyboardListener {
    raw_mode: bool,
}

impl KeyboardListener {
    /// Enables raw mode and starts forwarding control signals.
    ///
    /// The returned receiver closes when the read loop ends (after a
    /// `Quit` was forwarded, or on a terminal read error).
    pub fn start() -> (Self, mpsc::Receiver<ControlSignal>) {
        let raw_mode = match terminal::enable_raw_mode() {
            Ok(()) => true,
            Err(error) => {
                // Still usable when stdin is not a tty (e.g. under a
                // supervisor); line-buffered keys just need Enter.
                warn!(%error, "could not enable raw terminal mode");
                false
            }
        };

        let (tx, rx) = mpsc::channel(8);

        // In raw mode Ctrl-C arrives as a key event; without it, it
        // arrives as SIGINT.  Bridge the signal so Quit works either way.
        let sigint_tx = tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = sigint_tx.send(ControlSignal::Quit).await;
            }
        });

        tokio::task::spawn_blocking(move || read_loop(tx));

        (Self { raw_mode }, rx)
    }

    /// Restores the terminal.  Safe to call more than once.
    pub fn stop(&mut self) {
        if self.raw_mode {
            self.raw_mode = false;
            if let Err(error) = terminal::disable_raw_mode() {
                warn!(%error, "could not restore terminal mode");
            }
        }
    }
}

impl Drop for KeyboardListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop(tx: mpsc::Sender<ControlSignal>) {
    // Poll with a timeout instead of blocking in read(): a task stuck in
    // read() would stall runtime shutdown, and polling lets the loop
    // notice the receiver going away once the run ends.
    loop {
        if tx.is_closed() {
            return;
        }
        match event::poll(std::time::Duration::from_millis(200)) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(error) => {
                warn!(%error, "keyboard poll failed; stopping listener");
                return;
            }
        }
        let event = match event::read() {
            Ok(event) => event,
            Err(error) => {
                warn!(%error, "keyboard read failed; stopping listener");
                return;
            }
        };
        let Event::Key(key) = event else {
            continue;
        };
        let Some(signal) = map_key(&key) else {
            continue;
        };
        debug!(?signal, "control signal");
        let quit = signal == ControlSignal::Quit;
        if tx.blocking_send(signal).is_err() {
            // Receiver gone; the run is over.
            return;
        }
        if quit {
            return;
        }
    }
}
