//! Toggle coordinator: owns the blocking flag and serializes firewall changes.
//!
//! Requests arrive from the event loop and return immediately. An accepted
//! request spawns one worker on the runtime; while it runs, further requests
//! are rejected (not queued). Requests closer together than the debounce
//! interval are dropped before the in-flight check.
//!
//! The flag is never persisted. [`ToggleCoordinator::start`] always removes the
//! managed rules and begins `Inactive`, whatever a previous process left behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::firewall::FirewallRules;
use crate::notify::{Cue, NotificationSink, Notifier};
use crate::settings::SettingsStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    Inactive,
    Activating,
    Blocking,
    Deactivating,
    /// Reported briefly before reverting to the previous stable state.
    Failed,
}

impl ToggleState {
    pub fn label(self) -> &'static str {
        match self {
            ToggleState::Inactive => "INACTIVE",
            ToggleState::Activating => "ACTIVATING...",
            ToggleState::Blocking => "BLOCKING",
            ToggleState::Deactivating => "DEACTIVATING...",
            ToggleState::Failed => "FAILED",
        }
    }
}

/// Read-only view of the coordinator's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockingSnapshot {
    pub active: bool,
    pub state: ToggleState,
}

/// Outcome of [`ToggleCoordinator::request_toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleRequest {
    Accepted,
    Debounced,
    InFlight,
    ShuttingDown,
}

/// Outcome of [`ToggleCoordinator::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    AlreadyStopping,
    CleanupDisabled,
    NothingToClean,
    RulesRemoved,
    CleanupFailed,
}

struct Inner {
    active: bool,
    state: ToggleState,
    last_request: Option<Instant>,
    in_flight: Option<JoinHandle<()>>,
}

pub struct ToggleCoordinator {
    inner: Mutex<Inner>,
    stopping: AtomicBool,
    firewall: FirewallRules,
    settings: Arc<SettingsStore>,
    notifier: Notifier,
    debounce: Duration,
    runtime: Handle,
}

impl ToggleCoordinator {
    /// Build the coordinator and force a clean start.
    pub async fn start(
        firewall: FirewallRules,
        settings: Arc<SettingsStore>,
        notifier: Notifier,
        debounce: Duration,
    ) -> Arc<Self> {
        let coordinator = Arc::new(Self {
            inner: Mutex::new(Inner {
                active: false,
                state: ToggleState::Inactive,
                last_request: None,
                in_flight: None,
            }),
            stopping: AtomicBool::new(false),
            firewall,
            settings,
            notifier,
            debounce,
            runtime: Handle::current(),
        });
        coordinator.ensure_clean_start().await;
        coordinator
    }

    pub fn snapshot(&self) -> BlockingSnapshot {
        let inner = self.lock();
        BlockingSnapshot {
            active: inner.active,
            state: inner.state,
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Remove any managed rules and reset to `Inactive`.
    async fn ensure_clean_start(&self) {
        if !self.firewall.remove_rules().await {
            tracing::warn!("Initial firewall cleanup failed");
        }
        self.set_state(ToggleState::Inactive, false);
        self.notifier
            .print_line("Firewall rules cleared - traffic is NOT blocked");
    }

    /// Ask for the blocking state to flip. Never blocks on the firewall.
    pub fn request_toggle(self: &Arc<Self>) -> ToggleRequest {
        if self.is_stopping() {
            return ToggleRequest::ShuttingDown;
        }

        let mut inner = self.lock();
        let now = Instant::now();
        if let Some(last) = inner.last_request {
            if now.duration_since(last) < self.debounce {
                tracing::debug!("Toggle ignored due to debounce window");
                return ToggleRequest::Debounced;
            }
        }
        inner.last_request = Some(now);

        if inner.in_flight.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("Toggle already in progress; ignoring new request");
            return ToggleRequest::InFlight;
        }

        let this = Arc::clone(self);
        inner.in_flight = Some(self.runtime.spawn(async move { this.run_toggle().await }));
        ToggleRequest::Accepted
    }

    /// Wait for the in-flight toggle, if any, to finish.
    pub async fn wait_idle(&self) {
        let handle = self.lock().in_flight.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Toggle worker panicked: {e}");
            }
        }
    }

    async fn run_toggle(&self) {
        if self.is_stopping() {
            tracing::debug!("Shutdown started before the toggle ran; skipping");
            return;
        }
        let was_active = self.lock().active;
        if was_active {
            self.deactivate().await;
        } else {
            self.activate().await;
        }
    }

    async fn activate(&self) {
        self.set_state(ToggleState::Activating, false);
        let ips = self.settings.blocked_ips();
        if !self.firewall.create_rules(&ips).await {
            self.report_failure(ToggleState::Inactive, false, "Failed to activate blocking");
            return;
        }

        // Shutdown may have cleaned up while the rules were being created.
        if self.is_stopping() && self.settings.auto_cleanup_on_exit() {
            self.withdraw_after_shutdown().await;
            return;
        }

        self.set_state(ToggleState::Blocking, true);
        self.notifier
            .print_line(&format!("BLOCKING ACTIVE - {}", timestamp()));
        self.cue(Cue::ACTIVATE);
        tracing::info!("Blocking activated for {} address(es)", ips.len());
    }

    async fn withdraw_after_shutdown(&self) {
        if self.firewall.remove_rules().await {
            self.set_state(ToggleState::Inactive, false);
            tracing::info!("Rules created during shutdown were removed");
        } else {
            self.set_state(ToggleState::Blocking, true);
            self.notifier.print_line("Unable to confirm firewall cleanup");
            tracing::warn!("Failed to remove rules created during shutdown");
        }
    }

    async fn deactivate(&self) {
        self.set_state(ToggleState::Deactivating, true);
        if self.firewall.remove_rules().await {
            self.set_state(ToggleState::Inactive, false);
            self.notifier
                .print_line(&format!("BLOCKING REMOVED - {}", timestamp()));
            self.cue(Cue::DEACTIVATE);
            tracing::info!("Blocking removed");
        } else {
            self.report_failure(ToggleState::Blocking, true, "Failed to remove blocking");
        }
    }

    /// Show `Failed`, then fall back to the last stable state without waiting.
    fn report_failure(&self, stable: ToggleState, active: bool, message: &str) {
        self.set_state(ToggleState::Failed, active);
        self.notifier.print_line(message);
        tracing::warn!("{message}");
        self.set_state(stable, active);
    }

    /// Stop accepting toggles and, if enabled, remove active rules.
    ///
    /// Only the first call does anything. Does not wait for an in-flight
    /// toggle; cleanup is bounded by the firewall timeout.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return ShutdownOutcome::AlreadyStopping;
        }
        self.notifier.print_line("Shutting down...");

        if !self.settings.auto_cleanup_on_exit() {
            tracing::info!("Automatic cleanup disabled; leaving firewall rules as they are");
            return ShutdownOutcome::CleanupDisabled;
        }

        let snapshot = self.snapshot();
        if !snapshot.active && snapshot.state != ToggleState::Activating {
            return ShutdownOutcome::NothingToClean;
        }

        if self.firewall.remove_rules().await {
            self.set_state(ToggleState::Inactive, false);
            self.notifier.print_line("Firewall rules removed");
            tracing::info!("Firewall rules removed during cleanup");
            ShutdownOutcome::RulesRemoved
        } else {
            self.notifier.print_line("Unable to confirm firewall cleanup");
            tracing::warn!("Failed to remove firewall rules during cleanup");
            ShutdownOutcome::CleanupFailed
        }
    }

    fn set_state(&self, state: ToggleState, active: bool) {
        {
            let mut inner = self.lock();
            inner.state = state;
            inner.active = active;
        }
        self.notifier.set_status(active, state.label());
        self.notifier.update_indicator(active);
    }

    fn cue(&self, cue: Cue) {
        if !self.settings.sound_enabled() {
            return;
        }
        let notifier = self.notifier.clone();
        self.runtime.spawn_blocking(move || notifier.play_cue(cue));
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
