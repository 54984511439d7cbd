//! ControlSession: the persistent control channel to the device.
//!
//! One session owns one device-facing channel (an `adb shell` child) for
//! its whole lifetime; the *channel* may be torn down and reopened many
//! times as the device comes and goes, the session object survives until
//! `cleanup()`.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──connect──► Connecting ──two probes ok──► Connected
//!       ▲                                                     │
//!       └──────── write error / EOF / ack timeout ────────────┘
//! ```
//!
//! Connecting is a two-phase check: write a probe, wait a short settle
//! delay, write a second probe.  A freshly spawned `adb shell` accepts the
//! first write even when no device is attached; only a second write after
//! the settle delay reliably fails, so a single probe would flap.
//!
//! While connected, a heartbeat probe is written on a fixed interval.  Any
//! failure (heartbeat write error, child exit, stdout EOF, command ack
//! timeout) routes through the same disconnect path: `Disconnected` is
//! emitted exactly once per outage, and a fixed-interval reconnect loop
//! (emitting `Reconnecting` per attempt) runs until the handshake passes
//! again or the session is cleaned up.
//!
//! # Command serialization
//!
//! The channel cannot demultiplex concurrent responses, so commands are
//! strictly serialized: callers' requests flow through one mpsc queue and
//! the worker completes the in-flight command (ack or timeout) before it
//! takes the next.  FIFO order and the at-most-one-in-flight invariant are
//! structural, not locked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use autotap_core::{is_ack, parse_screen_size, BridgeCommand, ScreenSize, SessionEvent};

use crate::application::scheduler::ActionDispatcher;

use super::channel::{BridgeChannel, ChannelFactory};

/// Timing knobs for the session.  The defaults match the cadence the
/// bridge tolerates well in practice; all are overridable for tests.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between liveness probes while connected.
    pub heartbeat_interval: Duration,
    /// Interval between reconnection attempts while disconnected.
    pub reconnect_interval: Duration,
    /// Delay between the two handshake probes.
    pub settle_delay: Duration,
    /// How long an executed command may wait for its ack.
    pub command_timeout: Duration,
    /// How long a query may wait for parseable output.
    pub query_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(1000),
            reconnect_interval: Duration::from_millis(3000),
            settle_delay: Duration::from_millis(500),
            command_timeout: Duration::from_millis(5000),
            query_timeout: Duration::from_millis(3000),
        }
    }
}

/// A request travelling from a caller to the session worker.
enum Request {
    /// Write the line, wait for the ack marker, reply success.
    Execute {
        line: String,
        reply: oneshot::Sender<bool>,
    },
    /// Write the line, accumulate output until `matched` accepts it (or
    /// the query timeout), reply with the accumulated output.
    Query {
        line: String,
        matched: Box<dyn Fn(&str) -> bool + Send>,
        reply: oneshot::Sender<Option<String>>,
    },
}

impl Request {
    /// Fail-fast reply used when the channel is down.
    fn refuse(self) {
        match self {
            Request::Execute { reply, .. } => {
                let _ = reply.send(false);
            }
            Request::Query { reply, .. } => {
                let _ = reply.send(None);
            }
        }
    }
}

struct WorkerHandle {
    requests: mpsc::Sender<Request>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// The persistent control channel session.  See the module docs.
pub struct ControlSession {
    config: SessionConfig,
    factory: Arc<dyn ChannelFactory>,
    connected: Arc<AtomicBool>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl ControlSession {
    pub fn new(config: SessionConfig, factory: Arc<dyn ChannelFactory>) -> Self {
        Self {
            config,
            factory,
            connected: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Starts the connection lifecycle and returns the event stream.
    ///
    /// First call wins: calling `start` while a worker is already running
    /// tears the previous worker (and its channel) down before the new one
    /// takes over.
    pub fn start(&self) -> mpsc::Receiver<SessionEvent> {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (request_tx, request_rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = SessionWorker {
            config: self.config.clone(),
            factory: Arc::clone(&self.factory),
            connected: Arc::clone(&self.connected),
            events: event_tx,
            requests: request_rx,
            shutdown: shutdown_rx,
        };
        let join = tokio::spawn(worker.run());

        let previous = self.worker.lock().unwrap().replace(WorkerHandle {
            requests: request_tx,
            shutdown: shutdown_tx,
            join,
        });
        if let Some(previous) = previous {
            warn!("session started twice; tearing down the previous worker");
            let _ = previous.shutdown.send(true);
            previous.join.abort();
            self.connected.store(false, Ordering::Relaxed);
        }

        event_rx
    }

    /// Whether the channel currently accepts commands.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Executes one command, waiting for its ack.
    ///
    /// Fails fast with `false` when the channel is down.  Otherwise the
    /// request queues behind any in-flight command and `true` means the
    /// ack marker arrived before the command timeout.
    pub async fn execute(&self, command: BridgeCommand) -> bool {
        debug_assert!(command.expects_ack(), "read commands go through query()");
        if !self.is_connected() {
            debug!(%command, "command skipped; channel not connected");
            return false;
        }
        let Some(sender) = self.request_sender() else {
            return false;
        };
        let (tx, rx) = oneshot::channel();
        let request = Request::Execute {
            line: command.shell_line(),
            reply: tx,
        };
        if sender.send(request).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// One-shot read: writes the command, accumulates channel output, and
    /// returns the first non-`None` result of `parse`, or `None` once the
    /// query timeout elapses.
    pub async fn query<T, F>(&self, command: BridgeCommand, parse: F) -> Option<T>
    where
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        if !self.is_connected() {
            debug!(%command, "query skipped; channel not connected");
            return None;
        }
        let sender = self.request_sender()?;
        let parse = Arc::new(parse);
        let matched = {
            let parse = Arc::clone(&parse);
            Box::new(move |output: &str| parse(output).is_some()) as Box<dyn Fn(&str) -> bool + Send>
        };
        let (tx, rx) = oneshot::channel();
        let request = Request::Query {
            line: command.shell_line(),
            matched,
            reply: tx,
        };
        sender.send(request).await.ok()?;
        let output = rx.await.ok().flatten()?;
        parse(&output)
    }

    /// Reports the device's physical display size.
    pub async fn screen_size(&self) -> Option<ScreenSize> {
        self.query(BridgeCommand::ScreenSize, parse_screen_size).await
    }

    /// Tears everything down: worker task, timers, channel, queued
    /// requests.  Safe to call repeatedly and from any state.
    pub async fn cleanup(&self) {
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.shutdown.send(true);
            let _ = handle.join.await;
        }
        self.connected.store(false, Ordering::Relaxed);
    }

    fn request_sender(&self) -> Option<mpsc::Sender<Request>> {
        self.worker
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| handle.requests.clone())
    }
}

#[async_trait]
impl ActionDispatcher for ControlSession {
    fn is_connected(&self) -> bool {
        ControlSession::is_connected(self)
    }

    async fn dispatch(&self, command: BridgeCommand) -> bool {
        self.execute(command).await
    }
}

// ── Worker ────────────────────────────────────────────────────────────────────

enum ServeEnd {
    /// The channel failed; reconnect.
    Lost,
    /// Cleanup requested; stop for good.
    Shutdown,
}

enum AckWait {
    Acked,
    Lost,
    Shutdown,
}

/// The session worker task: owns the channel exclusively and runs the
/// connect / serve / reconnect loop.
struct SessionWorker {
    config: SessionConfig,
    factory: Arc<dyn ChannelFactory>,
    connected: Arc<AtomicBool>,
    events: mpsc::Sender<SessionEvent>,
    requests: mpsc::Receiver<Request>,
    shutdown: watch::Receiver<bool>,
}

impl SessionWorker {
    async fn run(mut self) {
        let mut attempt: u64 = 0;
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            if attempt > 0 {
                self.emit(SessionEvent::Reconnecting).await;
                debug!(attempt, "reconnecting to the device channel");
            }
            attempt += 1;

            match self.establish().await {
                Some(chan) => {
                    self.connected.store(true, Ordering::Relaxed);
                    self.emit(SessionEvent::Connected).await;
                    info!("device channel connected");

                    let end = self.serve(chan).await;
                    self.connected.store(false, Ordering::Relaxed);
                    match end {
                        ServeEnd::Shutdown => break,
                        ServeEnd::Lost => {
                            self.emit(SessionEvent::Disconnected).await;
                            warn!("device channel lost; will retry");
                            self.fail_queued();
                        }
                    }
                }
                None => {
                    debug!("connection attempt failed");
                }
            }

            if !self.wait_before_retry().await {
                break;
            }
        }
        self.connected.store(false, Ordering::Relaxed);
        debug!("session worker stopped");
    }

    /// Runs the two-probe handshake.  Returns the live channel, or `None`
    /// when any step fails (the channel, if opened, is closed again).
    async fn establish(&mut self) -> Option<Box<dyn BridgeChannel>> {
        let mut chan = match self.factory.open().await {
            Ok(chan) => chan,
            Err(error) => {
                debug!(%error, "failed to open device channel");
                return None;
            }
        };
        let probe = BridgeCommand::Probe.shell_line();

        if let Err(error) = chan.write_line(&probe).await {
            debug!(%error, "first probe failed");
            chan.close().await;
            return None;
        }

        // Settle before the confirming probe; bail out early on cleanup.
        tokio::select! {
            _ = self.shutdown.changed() => {
                chan.close().await;
                return None;
            }
            _ = time::sleep(self.config.settle_delay) => {}
        }

        if let Err(error) = chan.write_line(&probe).await {
            debug!(%error, "confirming probe failed");
            chan.close().await;
            return None;
        }

        Some(chan)
    }

    /// Serves a connected channel until it is lost or cleanup arrives.
    async fn serve(&mut self, mut chan: Box<dyn BridgeChannel>) -> ServeEnd {
        let probe = BridgeCommand::Probe.shell_line();
        let mut heartbeat = time::interval_at(
            Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.changed() => {
                    chan.close().await;
                    return ServeEnd::Shutdown;
                }

                _ = heartbeat.tick() => {
                    if let Err(error) = chan.write_line(&probe).await {
                        warn!(%error, "heartbeat probe failed");
                        chan.close().await;
                        return ServeEnd::Lost;
                    }
                }

                // Drain idle output (heartbeat acks) ahead of new requests
                // so a stale marker cannot answer the next command.
                chunk = chan.read_chunk() => match chunk {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        debug!("device channel reached EOF");
                        chan.close().await;
                        return ServeEnd::Lost;
                    }
                    Err(error) => {
                        warn!(%error, "device channel read failed");
                        chan.close().await;
                        return ServeEnd::Lost;
                    }
                },

                request = self.requests.recv() => match request {
                    None => {
                        chan.close().await;
                        return ServeEnd::Shutdown;
                    }
                    Some(Request::Execute { line, reply }) => {
                        let deadline = Instant::now() + self.config.command_timeout;
                        match self.await_ack(chan.as_mut(), &line, deadline).await {
                            AckWait::Acked => {
                                let _ = reply.send(true);
                            }
                            AckWait::Lost => {
                                let _ = reply.send(false);
                                chan.close().await;
                                return ServeEnd::Lost;
                            }
                            AckWait::Shutdown => {
                                let _ = reply.send(false);
                                chan.close().await;
                                return ServeEnd::Shutdown;
                            }
                        }
                    }
                    Some(Request::Query { line, matched, reply }) => {
                        match self.run_query(chan.as_mut(), &line, matched).await {
                            Ok(result) => {
                                let _ = reply.send(result);
                            }
                            Err(end) => {
                                let _ = reply.send(None);
                                chan.close().await;
                                return end;
                            }
                        }
                    }
                },
            }
        }
    }

    /// Writes a command line and waits for its ack marker.
    async fn await_ack(
        &mut self,
        chan: &mut dyn BridgeChannel,
        line: &str,
        deadline: Instant,
    ) -> AckWait {
        if let Err(error) = chan.write_line(line).await {
            warn!(%error, "command write failed");
            return AckWait::Lost;
        }

        let mut output = String::new();
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.changed() => return AckWait::Shutdown,

                _ = time::sleep_until(deadline) => {
                    warn!("command timed out waiting for ack");
                    return AckWait::Lost;
                }

                chunk = chan.read_chunk() => match chunk {
                    Ok(Some(text)) => {
                        output.push_str(&text);
                        if is_ack(&output) {
                            return AckWait::Acked;
                        }
                    }
                    Ok(None) | Err(_) => return AckWait::Lost,
                },
            }
        }
    }

    /// Writes a query line and accumulates output until `matched` accepts
    /// it.  `Ok(None)` is a timeout; the session stays connected, and only
    /// write failures and EOF count as a lost channel.
    async fn run_query(
        &mut self,
        chan: &mut dyn BridgeChannel,
        line: &str,
        matched: Box<dyn Fn(&str) -> bool + Send>,
    ) -> Result<Option<String>, ServeEnd> {
        if let Err(error) = chan.write_line(line).await {
            warn!(%error, "query write failed");
            return Err(ServeEnd::Lost);
        }

        let deadline = Instant::now() + self.config.query_timeout;
        let mut output = String::new();
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.changed() => return Err(ServeEnd::Shutdown),

                _ = time::sleep_until(deadline) => {
                    debug!("query timed out");
                    return Ok(None);
                }

                chunk = chan.read_chunk() => match chunk {
                    Ok(Some(text)) => {
                        output.push_str(&text);
                        if matched(&output) {
                            return Ok(Some(output));
                        }
                    }
                    Ok(None) | Err(_) => return Err(ServeEnd::Lost),
                },
            }
        }
    }

    /// Waits out the reconnect interval, refusing any requests that race
    /// in while the channel is down.  Returns `false` on shutdown.
    async fn wait_before_retry(&mut self) -> bool {
        let deadline = Instant::now() + self.config.reconnect_interval;
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.changed() => return false,

                _ = time::sleep_until(deadline) => return true,

                request = self.requests.recv() => match request {
                    None => return false,
                    Some(request) => request.refuse(),
                },
            }
        }
    }

    /// Refuses everything already sitting in the queue.
    fn fail_queued(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            request.refuse();
        }
    }

    async fn emit(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.events.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_heartbeat_is_one_second() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.heartbeat_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_default_reconnect_interval_is_three_seconds() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.reconnect_interval, Duration::from_millis(3000));
    }

    #[test]
    fn test_default_command_timeout_exceeds_settle_delay() {
        // The handshake must be able to complete within one command slot.
        let cfg = SessionConfig::default();
        assert!(cfg.command_timeout > cfg.settle_delay);
    }
}
