//! ActionScheduler: the timing state machine driving automated actions.
//!
//! One continuously re-armed deadline drives all progress; the scheduler
//! never polls.  Each loop turn waits for exactly one of two things: the
//! armed deadline expiring, or an operator control signal.  The `biased`
//! select ordering processes signals first, which is what makes "manual
//! pause wins over a simultaneous timer expiry" a structural guarantee
//! rather than a race.
//!
//! # Modes
//!
//! ```text
//! Idle ──start──► Scheduled ──timer──► Executing ──done──► Scheduled
//!                     │                                        │
//!                     │ rest deadline crossed                  │
//!                     ▼                                        │
//!                  Resting ──rest elapsed──────────────────────┘
//!
//! any mode ──pause signal──► ManuallyPaused ──resume──► Scheduled/Resting
//! ```
//!
//! # Suspended time
//!
//! Two situations suspend the timing plan: a manual pause, and the device
//! channel being down at a tick.  Both capture the outstanding rest timing
//! into `RestCarry` so it can be replayed unchanged afterwards:
//!
//! - a rest that was *counting down* keeps its original absolute end time
//!   (resuming never stretches a rest), and
//! - a rest that was merely *planned* keeps its remaining lead time.
//!
//! A rest that comes due while the channel is down stays deferred; the due
//! check only runs on a connected tick.
//!
//! # Dependencies
//!
//! The scheduler depends on two traits injected at construction:
//! [`ActionDispatcher`] (issue a command, report connectivity; implemented
//! by the bridge session) and [`TargetSelector`] (choose the next action;
//! the randomized area strategy by default).  Tests inject recording
//! doubles and run the loop on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use autotap_core::{ActionConfig, BridgeCommand, ControlSignal, NormalSampler};

/// Fixed re-check delay while the device channel is down.
pub const LINK_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Issues actions to the device and reports channel availability.
///
/// Implemented by the bridge `ControlSession`; tests use recording doubles.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Whether the control channel currently accepts commands.
    fn is_connected(&self) -> bool;

    /// Executes one action.  `false` means the action did not happen:
    /// channel down, write failure, or ack timeout; the scheduler treats
    /// all of those as a transient suspension, never as fatal.
    async fn dispatch(&self, command: BridgeCommand) -> bool;
}

/// Chooses the next action to issue.
///
/// The default implementation draws tap coordinates from the configured
/// area; alternative strategies (fixed key events, screen-content-driven
/// targeting) plug in here without touching the timing machine.
#[cfg_attr(test, mockall::automock)]
pub trait TargetSelector: Send {
    fn next_action(&mut self) -> BridgeCommand;
}

/// Scheduler mode.  All timing decisions key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Constructed but not started.
    Idle,
    /// An action delay (or link retry) is armed.
    Scheduled,
    /// An action is in flight on the channel.
    Executing,
    /// Operator pause; nothing proceeds until resume.
    ManuallyPaused,
    /// A rest countdown is armed.
    Resting,
}

/// Rest timing captured while the plan is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestCarry {
    /// A rest was counting down; it still ends at this original instant.
    InProgress { ends_at: Instant },
    /// A rest was planned; this much lead time remains.
    Pending { remaining: Duration },
}

/// The action scheduler.  One per automation run; consumed by [`run`].
///
/// [`run`]: ActionScheduler::run
pub struct ActionScheduler {
    config: ActionConfig,
    sampler: NormalSampler,
    dispatcher: Arc<dyn ActionDispatcher>,
    selector: Box<dyn TargetSelector>,

    mode: Mode,
    /// Absolute time of the next planned rest; `None` when rests are
    /// disabled or a rest plan is suspended/being consumed.
    next_rest_deadline: Option<Instant>,
    /// Suspended rest timing, present only while paused (either kind).
    rest_carry: Option<RestCarry>,
    /// Set while actions are held because the channel is down.
    link_paused: bool,
    /// The single armed timer.  Re-created every loop turn, so a
    /// superseded deadline can never fire.
    deadline: Option<Instant>,
}

impl ActionScheduler {
    pub fn new(
        config: ActionConfig,
        sampler: NormalSampler,
        dispatcher: Arc<dyn ActionDispatcher>,
        selector: Box<dyn TargetSelector>,
    ) -> Self {
        Self {
            config,
            sampler,
            dispatcher,
            selector,
            mode: Mode::Idle,
            next_rest_deadline: None,
            rest_carry: None,
            link_paused: false,
            deadline: None,
        }
    }

    /// Drives the run to completion.
    ///
    /// Returns when a [`ControlSignal::Quit`] arrives or the signal source
    /// closes.  The caller owns session/keyboard teardown after that.
    pub async fn run(mut self, mut signals: mpsc::Receiver<ControlSignal>) {
        self.begin();
        loop {
            tokio::select! {
                // Signals first: a pause queued behind an expired timer
                // must win over the tick.
                biased;

                signal = signals.recv() => match signal {
                    Some(ControlSignal::TogglePause) => {
                        if self.mode == Mode::ManuallyPaused {
                            self.resume();
                        } else {
                            self.pause();
                        }
                    }
                    Some(ControlSignal::Resume) => {
                        // No-op unless actually paused.
                        if self.mode == Mode::ManuallyPaused {
                            self.resume();
                        }
                    }
                    Some(ControlSignal::Quit) | None => break,
                },

                _ = Self::until(self.deadline) => self.on_tick().await,
            }
        }
        self.deadline = None;
        info!("run finished");
    }

    // ── Transitions ───────────────────────────────────────────────────────────

    /// `Idle → Scheduled`: plan the first rest and arm the first delay.
    fn begin(&mut self) {
        self.schedule_rest_deadline();
        let delay = self.next_click_delay();
        self.arm_action(delay);
    }

    /// Handles the armed deadline expiring.
    async fn on_tick(&mut self) {
        self.deadline = None;
        match self.mode {
            Mode::Resting => {
                // Rest elapsed: plan the next one, then act immediately.
                self.schedule_rest_deadline();
                self.run_action().await;
            }
            Mode::Scheduled => {
                if !self.dispatcher.is_connected() {
                    self.suspend_for_link();
                    return;
                }
                if self.link_paused {
                    self.restore_after_link();
                }
                if self
                    .next_rest_deadline
                    .is_some_and(|at| Instant::now() >= at)
                {
                    self.begin_rest();
                    return;
                }
                self.run_action().await;
            }
            // Idle, Executing and ManuallyPaused never hold an armed timer.
            Mode::Idle | Mode::Executing | Mode::ManuallyPaused => {}
        }
    }

    /// `Scheduled → Executing → Scheduled`: issue one action and re-arm.
    async fn run_action(&mut self) {
        self.mode = Mode::Executing;
        let command = self.selector.next_action();
        let next_delay = self.next_click_delay();

        if self.dispatcher.dispatch(command.clone()).await {
            debug!(%command, next_delay_ms = next_delay, "action dispatched");
            self.arm_action(next_delay);
        } else {
            warn!(%command, "action did not complete; holding until the channel returns");
            self.suspend_for_link();
        }
    }

    /// `Scheduled/Executing → Resting`.
    fn begin_rest(&mut self) {
        let duration = self
            .sampler
            .sample(self.config.rest_duration_min, self.config.rest_duration_max);
        self.next_rest_deadline = None;
        self.mode = Mode::Resting;
        self.deadline = Some(Instant::now() + Duration::from_millis(duration));
        info!(duration_ms = duration, "resting");
    }

    /// `any → ManuallyPaused`: cancel the timer, capture rest timing.
    fn pause(&mut self) {
        let armed = self.deadline.take();
        if self.mode == Mode::Resting {
            if let Some(ends_at) = armed {
                self.rest_carry = Some(RestCarry::InProgress { ends_at });
            }
        } else if let Some(at) = self.next_rest_deadline.take() {
            let remaining = at.saturating_duration_since(Instant::now());
            self.rest_carry = Some(RestCarry::Pending { remaining });
        }
        self.mode = Mode::ManuallyPaused;
        info!("paused; press p to resume");
    }

    /// `ManuallyPaused → Scheduled/Resting`: replay the captured timing.
    fn resume(&mut self) {
        info!("resumed");
        match self.rest_carry.take() {
            Some(RestCarry::InProgress { ends_at }) => {
                if Instant::now() >= ends_at {
                    // The pause outlasted the rest; reschedule normally.
                    self.schedule_rest_deadline();
                    let delay = self.next_click_delay();
                    self.arm_action(delay);
                } else {
                    // Residual rest: still ends at the original instant.
                    let remaining = ends_at.saturating_duration_since(Instant::now());
                    info!(remaining_ms = remaining.as_millis() as u64, "resuming rest");
                    self.mode = Mode::Resting;
                    self.deadline = Some(ends_at);
                }
            }
            Some(RestCarry::Pending { remaining }) => {
                self.next_rest_deadline = Some(Instant::now() + remaining);
                info!(
                    remaining_ms = remaining.as_millis() as u64,
                    "rest plan restored"
                );
                let delay = self.next_click_delay();
                self.arm_action(delay);
            }
            None => {
                let delay = self.next_click_delay();
                self.arm_action(delay);
            }
        }
    }

    /// Holds actions while the channel is down; retried on a fixed delay.
    fn suspend_for_link(&mut self) {
        if !self.link_paused {
            self.link_paused = true;
            if let Some(at) = self.next_rest_deadline.take() {
                let remaining = at.saturating_duration_since(Instant::now());
                self.rest_carry = Some(RestCarry::Pending { remaining });
            }
            info!("device unavailable; retrying until the channel returns");
        }
        self.mode = Mode::Scheduled;
        self.deadline = Some(Instant::now() + LINK_RETRY_DELAY);
    }

    /// First connected tick after an outage: replay the held rest plan.
    fn restore_after_link(&mut self) {
        self.link_paused = false;
        if let Some(RestCarry::Pending { remaining }) = self.rest_carry.take() {
            self.next_rest_deadline = Some(Instant::now() + remaining);
            info!(
                remaining_ms = remaining.as_millis() as u64,
                "channel restored; rest plan resumed"
            );
        } else {
            info!("channel restored");
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn schedule_rest_deadline(&mut self) {
        if !self.config.rests_enabled() {
            self.next_rest_deadline = None;
            return;
        }
        let interval = self
            .sampler
            .sample(self.config.rest_interval_min, self.config.rest_interval_max);
        self.next_rest_deadline = Some(Instant::now() + Duration::from_millis(interval));
        info!(interval_ms = interval, "next rest planned");
    }

    fn next_click_delay(&mut self) -> u64 {
        if self.config.click_delay_max == 0 {
            return 0;
        }
        self.sampler
            .sample(self.config.click_delay_min, self.config.click_delay_max)
    }

    fn arm_action(&mut self, delay_ms: u64) {
        self.mode = Mode::Scheduled;
        self.deadline = Some(Instant::now() + Duration::from_millis(delay_ms));
    }

    /// Resolves to the armed deadline, or never when nothing is armed.
    async fn until(deadline: Option<Instant>) {
        match deadline {
            Some(at) => time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    // ── Test doubles ──────────────────────────────────────────────────────────

    /// Records every dispatched command with its (paused-clock) timestamp.
    struct RecordingDispatcher {
        connected: AtomicBool,
        calls: Mutex<Vec<(BridgeCommand, Instant)>>,
        /// Flip to disconnected after this many successful dispatches.
        drop_after: std::sync::atomic::AtomicUsize,
    }

    impl RecordingDispatcher {
        fn with_connected(up: bool) -> Arc<Self> {
            Arc::new(Self {
                connected: AtomicBool::new(up),
                calls: Mutex::new(Vec::new()),
                drop_after: std::sync::atomic::AtomicUsize::new(usize::MAX),
            })
        }

        fn connected() -> Arc<Self> {
            Self::with_connected(true)
        }

        fn disconnected() -> Arc<Self> {
            Self::with_connected(false)
        }

        fn set_connected(&self, up: bool) {
            self.connected.store(up, Ordering::Relaxed);
        }

        fn drop_link_after(&self, n: usize) {
            self.drop_after.store(n, Ordering::Relaxed);
        }

        fn timestamps_since(&self, base: Instant) -> Vec<u64> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(_, at)| at.duration_since(base).as_millis() as u64)
                .collect()
        }

        fn count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ActionDispatcher for RecordingDispatcher {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Relaxed)
        }

        async fn dispatch(&self, command: BridgeCommand) -> bool {
            if !self.is_connected() {
                return false;
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push((command, Instant::now()));
            if calls.len() >= self.drop_after.load(Ordering::Relaxed) {
                self.set_connected(false);
            }
            true
        }
    }

    struct FixedSelector;

    impl TargetSelector for FixedSelector {
        fn next_action(&mut self) -> BridgeCommand {
            BridgeCommand::Tap { x: 10, y: 20 }
        }
    }

    /// Config with degenerate (min == max) ranges so timing is exact.
    fn fixed_config(delay: u64, rest_interval: u64, rest_duration: u64) -> ActionConfig {
        ActionConfig {
            click_delay_min: delay,
            click_delay_max: delay,
            x_min: 0,
            x_max: 100,
            y_min: 0,
            y_max: 100,
            rest_interval_min: rest_interval,
            rest_interval_max: rest_interval,
            rest_duration_min: rest_duration,
            rest_duration_max: rest_duration,
        }
    }

    fn spawn_scheduler(
        config: ActionConfig,
        dispatcher: Arc<RecordingDispatcher>,
    ) -> (tokio::task::JoinHandle<()>, mpsc::Sender<ControlSignal>) {
        let scheduler = ActionScheduler::new(
            config,
            NormalSampler::seeded(7),
            dispatcher,
            Box::new(FixedSelector),
        );
        let (tx, rx) = mpsc::channel(8);
        (tokio::spawn(scheduler.run(rx)), tx)
    }

    // ── Cadence ───────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_actions_follow_the_configured_cadence() {
        let dispatcher = RecordingDispatcher::connected();
        let base = Instant::now();
        let (handle, tx) = spawn_scheduler(fixed_config(50, 0, 0), Arc::clone(&dispatcher));

        time::sleep(Duration::from_millis(260)).await;
        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        assert_eq!(dispatcher.timestamps_since(base), vec![50, 100, 150, 200, 250]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rest_boundary_withholds_actions_then_resumes() {
        // 50 ms cadence, rest after 1000 ms for 200 ms: actions at
        // 50..=950, nothing across the rest, immediate action at 1200,
        // cadence resumes.
        let dispatcher = RecordingDispatcher::connected();
        let base = Instant::now();
        let (handle, tx) = spawn_scheduler(fixed_config(50, 1000, 200), Arc::clone(&dispatcher));

        time::sleep(Duration::from_millis(1360)).await;
        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        let stamps = dispatcher.timestamps_since(base);
        let expected: Vec<u64> = (1..=19)
            .map(|i| i * 50)
            .chain([1200, 1250, 1300, 1350])
            .collect();
        assert_eq!(stamps, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_rests_never_interrupt_the_cadence() {
        let dispatcher = RecordingDispatcher::connected();
        let base = Instant::now();
        // rest_interval_max == 0 disables rests no matter the duration pair.
        let (handle, tx) = spawn_scheduler(fixed_config(100, 0, 30_000), Arc::clone(&dispatcher));

        time::sleep(Duration::from_millis(5_010)).await;
        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        let stamps = dispatcher.timestamps_since(base);
        assert_eq!(stamps.len(), 50);
        assert!(stamps
            .windows(2)
            .all(|pair| pair[1] - pair[0] == 100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_click_delay_means_no_wait() {
        let dispatcher = RecordingDispatcher::connected();
        // Drop the channel after ten actions so the back-to-back loop
        // yields and the test can observe it.
        dispatcher.drop_link_after(10);
        let base = Instant::now();
        let (handle, tx) = spawn_scheduler(fixed_config(0, 0, 0), Arc::clone(&dispatcher));

        time::sleep(Duration::from_millis(5)).await;
        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        // All ten actions ran with zero delay between them.
        let stamps = dispatcher.timestamps_since(base);
        assert_eq!(stamps.len(), 10);
        assert!(stamps.iter().all(|&t| t == 0));
    }

    // ── Manual pause ──────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_no_actions_while_manually_paused() {
        let dispatcher = RecordingDispatcher::connected();
        let (handle, tx) = spawn_scheduler(fixed_config(50, 300, 100), Arc::clone(&dispatcher));

        time::sleep(Duration::from_millis(120)).await;
        tx.send(ControlSignal::TogglePause).await.unwrap();
        // Sleep well past several action delays and the rest boundary.
        time::sleep(Duration::from_millis(2_000)).await;
        let while_paused = dispatcher.count();

        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        // Only the two pre-pause actions (t=50, t=100) ever ran.
        assert_eq!(while_paused, 2);
        assert_eq!(dispatcher.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_when_not_paused_is_a_noop() {
        let dispatcher = RecordingDispatcher::connected();
        let base = Instant::now();
        let (handle, tx) = spawn_scheduler(fixed_config(50, 0, 0), Arc::clone(&dispatcher));

        time::sleep(Duration::from_millis(60)).await;
        tx.send(ControlSignal::Resume).await.unwrap();
        time::sleep(Duration::from_millis(200)).await;
        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        assert_eq!(dispatcher.timestamps_since(base), vec![50, 100, 150, 200, 250]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumed_rest_ends_at_its_original_time() {
        // Rest starts at t=1000 and would end at t=1200.  Pause at t=1050,
        // resume at t=1100: the rest must still end at t=1200, so the first
        // post-rest action lands exactly there, not at t=1300 as a
        // restarted full-length rest would produce.
        let dispatcher = RecordingDispatcher::connected();
        let base = Instant::now();
        let (handle, tx) = spawn_scheduler(fixed_config(50, 1000, 200), Arc::clone(&dispatcher));

        time::sleep(Duration::from_millis(1050)).await;
        tx.send(ControlSignal::TogglePause).await.unwrap();
        time::sleep(Duration::from_millis(50)).await;
        tx.send(ControlSignal::TogglePause).await.unwrap();
        time::sleep(Duration::from_millis(160)).await;
        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        let stamps = dispatcher.timestamps_since(base);
        let post_rest: Vec<u64> = stamps.iter().copied().filter(|&t| t > 950).collect();
        assert_eq!(post_rest, vec![1200, 1250]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_outlasting_the_rest_reschedules_normally() {
        // Pause at t=1050 (mid-rest, original end t=1200), resume at
        // t=1500: the rest is over, so scheduling resumes directly with a
        // fresh action delay: first action at t=1550.
        let dispatcher = RecordingDispatcher::connected();
        let base = Instant::now();
        let (handle, tx) = spawn_scheduler(fixed_config(50, 1000, 200), Arc::clone(&dispatcher));

        time::sleep(Duration::from_millis(1050)).await;
        tx.send(ControlSignal::TogglePause).await.unwrap();
        time::sleep(Duration::from_millis(450)).await;
        tx.send(ControlSignal::TogglePause).await.unwrap();
        time::sleep(Duration::from_millis(60)).await;
        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        let stamps = dispatcher.timestamps_since(base);
        let post_rest: Vec<u64> = stamps.iter().copied().filter(|&t| t > 950).collect();
        assert_eq!(post_rest, vec![1550]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_pending_rest_keeps_its_lead_time() {
        // Rest planned for t=1000.  Pause at t=520 (480 ms of lead left),
        // resume at t=2020: the rest deadline becomes t=2500.  Actions run
        // 2070..=2470; the tick at t=2520 crosses the deadline, so the rest
        // holds actions until t=2720.
        let dispatcher = RecordingDispatcher::connected();
        let base = Instant::now();
        let (handle, tx) = spawn_scheduler(fixed_config(50, 1000, 200), Arc::clone(&dispatcher));

        time::sleep(Duration::from_millis(520)).await;
        tx.send(ControlSignal::TogglePause).await.unwrap();
        time::sleep(Duration::from_millis(1500)).await;
        tx.send(ControlSignal::TogglePause).await.unwrap();
        time::sleep(Duration::from_millis(710)).await;
        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        let stamps = dispatcher.timestamps_since(base);
        let post_resume: Vec<u64> = stamps.iter().copied().filter(|&t| t > 520).collect();
        let expected: Vec<u64> = (0..=8).map(|i| 2070 + i * 50).chain([2720]).collect();
        assert_eq!(post_resume, expected);
    }

    // ── Connectivity suspension ───────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_ticks_retry_without_dispatching() {
        let dispatcher = RecordingDispatcher::disconnected();
        let (handle, tx) = spawn_scheduler(fixed_config(50, 0, 0), Arc::clone(&dispatcher));

        time::sleep(Duration::from_millis(4_000)).await;
        assert_eq!(dispatcher.count(), 0);

        dispatcher.set_connected(true);
        time::sleep(Duration::from_millis(2_000)).await;
        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        assert!(dispatcher.count() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rest_plan_survives_a_channel_outage() {
        // Rest planned for t=1000.  Channel drops before the t=500 tick and
        // returns at t=2000.  The 500 ms of remaining lead is preserved:
        // once reconnected (tick at t=2450 after retries), the rest fires
        // 500 ms of *action time* later, not at the stale t=1000.
        let dispatcher = RecordingDispatcher::connected();
        let base = Instant::now();
        let (handle, tx) = spawn_scheduler(fixed_config(50, 1000, 200), Arc::clone(&dispatcher));

        time::sleep(Duration::from_millis(460)).await;
        dispatcher.set_connected(false);
        time::sleep(Duration::from_millis(1540)).await;
        dispatcher.set_connected(true);
        time::sleep(Duration::from_millis(1_200)).await;
        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        let stamps = dispatcher.timestamps_since(base);
        // Pre-outage actions at 50..=450.
        assert!(stamps.contains(&450));
        // Nothing dispatched during the outage window.
        assert!(stamps.iter().all(|&t| t <= 460 || t >= 2000));
        // The restored rest deadline defers actions only after ~500 ms of
        // post-restore scheduling, so actions resume promptly on reconnect.
        let first_after = *stamps.iter().find(|&&t| t >= 2000).unwrap();
        assert!(first_after < 2600, "resumed too late: {first_after}");
    }

    // ── Selector wiring ───────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_selector_chooses_the_dispatched_command() {
        let dispatcher = RecordingDispatcher::connected();
        let mut selector = MockTargetSelector::new();
        selector
            .expect_next_action()
            .returning(|| BridgeCommand::KeyEvent { code: 26 });

        let scheduler = ActionScheduler::new(
            fixed_config(50, 0, 0),
            NormalSampler::seeded(7),
            Arc::clone(&dispatcher) as Arc<dyn ActionDispatcher>,
            Box::new(selector),
        );
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(scheduler.run(rx));

        time::sleep(Duration::from_millis(120)).await;
        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();

        let calls = dispatcher.calls.lock().unwrap();
        assert!(!calls.is_empty());
        assert!(calls
            .iter()
            .all(|(cmd, _)| *cmd == BridgeCommand::KeyEvent { code: 26 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_stops_the_run() {
        let dispatcher = RecordingDispatcher::connected();
        let (handle, tx) = spawn_scheduler(fixed_config(50, 0, 0), Arc::clone(&dispatcher));

        tx.send(ControlSignal::Quit).await.unwrap();
        handle.await.unwrap();
        let n = dispatcher.count();

        // The task is gone; no further actions can accrue.
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(dispatcher.count(), n);
    }
}
