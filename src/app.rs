//! Wiring and the interactive event loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config;
use crate::coordinator::{ToggleCoordinator, ToggleRequest};
use crate::events::{AppEvent, InputServices, COMMAND_HELP};
use crate::firewall::{CommandRunner, FirewallRules, PowerShellRunner};
use crate::notify::{self, NotificationSink, Notifier, StatusBoard, Surfaces};
use crate::settings::model::KEY_OVERLAY_VISIBLE;
use crate::settings::SettingsStore;

/// Everything the app needs from the command line.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub config_path: PathBuf,
    pub debounce: Duration,
    pub firewall_timeout: Duration,
    pub surfaces: Surfaces,
    pub hotkeys: bool,
}

pub struct App {
    coordinator: Arc<ToggleCoordinator>,
    settings: Arc<SettingsStore>,
    notifier: Notifier,
    overlay: Option<Arc<StatusBoard>>,
}

/// Build everything, run until an exit request, then clean up.
pub async fn run(options: AppOptions) -> anyhow::Result<()> {
    if let Some(dir) = options.config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create settings directory {}", dir.display()))?;
    }

    let settings = Arc::new(SettingsStore::new(&options.config_path));
    let selected = notify::select_surfaces(options.surfaces);
    let runner: Arc<dyn CommandRunner> = Arc::new(PowerShellRunner);

    let app = App::start(
        FirewallRules::new(runner, options.firewall_timeout),
        settings,
        selected.notifier,
        selected.overlay,
        options.debounce,
    )
    .await;

    let (tx, rx) = mpsc::channel(config::EVENT_CHANNEL_CAPACITY);
    InputServices::start(tx, app.notifier.clone());
    app.print_banner(options.hotkeys);

    app.event_loop(rx).await;
    app.coordinator.shutdown().await;
    Ok(())
}

impl App {
    pub async fn start(
        firewall: FirewallRules,
        settings: Arc<SettingsStore>,
        notifier: Notifier,
        overlay: Option<Arc<StatusBoard>>,
        debounce: Duration,
    ) -> Self {
        let loaded = settings.load();
        tracing::debug!("Blocking addresses: {:?}", loaded.blocked_ips.normalized());
        if overlay.is_some() {
            tracing::debug!(
                "Overlay {} at ({}, {})",
                if loaded.overlay_visible { "visible" } else { "hidden" },
                loaded.overlay_position.x,
                loaded.overlay_position.y
            );
        }

        let coordinator =
            ToggleCoordinator::start(firewall, Arc::clone(&settings), notifier.clone(), debounce)
                .await;

        Self {
            coordinator,
            settings,
            notifier,
            overlay,
        }
    }

    pub fn coordinator(&self) -> &Arc<ToggleCoordinator> {
        &self.coordinator
    }

    /// Consume events until `Exit` or until every producer has gone away.
    pub async fn event_loop(&self, mut rx: mpsc::Receiver<AppEvent>) {
        while let Some(event) = rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
    }

    /// Returns `false` when the loop should stop.
    pub fn handle_event(&self, event: AppEvent) -> bool {
        match event {
            AppEvent::ToggleBlocking => {
                let outcome = self.coordinator.request_toggle();
                if outcome != ToggleRequest::Accepted {
                    tracing::debug!("Toggle request not accepted: {outcome:?}");
                }
                true
            }
            AppEvent::ToggleOverlay => {
                self.toggle_overlay();
                true
            }
            AppEvent::Exit => false,
        }
    }

    fn toggle_overlay(&self) {
        if self.overlay.is_none() {
            self.notifier
                .print_line("Overlay not available in headless mode");
            return;
        }
        let visible = !self.settings.overlay_visible();
        if let Err(e) = self.settings.set(KEY_OVERLAY_VISIBLE, Value::Bool(visible)) {
            tracing::warn!("Failed to update overlay visibility: {e}");
            return;
        }
        self.notifier
            .print_line(if visible { "Overlay shown" } else { "Overlay hidden" });
    }

    fn print_banner(&self, hotkeys: bool) {
        let rule = "=".repeat(50);
        let mut lines = vec![
            String::new(),
            rule.clone(),
            format!(" {} v{}", config::APP_NAME, env!("CARGO_PKG_VERSION")),
            rule.clone(),
            String::new(),
            "Controls:".to_string(),
            format!("  - {COMMAND_HELP}"),
        ];
        if hotkeys {
            for (slot, combo) in self.settings.hotkeys() {
                lines.push(format!("  - Hotkey ({slot}): [{}]", combo.to_uppercase()));
            }
        } else {
            lines.push("  - Hotkeys disabled".to_string());
        }
        lines.push(format!(
            "  - Blocking: {}",
            self.settings.blocked_ips().join(", ")
        ));
        lines.push(String::new());
        lines.push("Status: INACTIVE (traffic not blocked)".to_string());
        lines.push(rule);
        for line in lines {
            self.notifier.print_line(&line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ToggleState;
    use crate::firewall::testing::FakeFirewall;
    use crate::notify::testing::RecordingSink;
    use serde_json::json;
    use tempfile::TempDir;

    async fn app_with(overlay: bool) -> (App, Arc<RecordingSink>, TempDir) {
        let dir = TempDir::new().unwrap();
        let settings = Arc::new(SettingsStore::new(dir.path().join("config.json")));
        settings.set("sound_enabled", json!(false)).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let app = App::start(
            FirewallRules::new(Arc::new(FakeFirewall::new()), Duration::from_secs(5)),
            settings,
            Notifier::new().with(sink.clone()),
            overlay.then(|| Arc::new(StatusBoard::new("overlay"))),
            Duration::ZERO,
        )
        .await;
        (app, sink, dir)
    }

    #[tokio::test]
    async fn test_exit_event_stops_loop() {
        let (app, _sink, _dir) = app_with(true).await;
        assert!(!app.handle_event(AppEvent::Exit));
    }

    #[tokio::test]
    async fn test_toggle_event_reaches_coordinator() {
        let (app, _sink, _dir) = app_with(true).await;
        assert!(app.handle_event(AppEvent::ToggleBlocking));
        app.coordinator().wait_idle().await;
        assert_eq!(app.coordinator().snapshot().state, ToggleState::Blocking);
    }

    #[tokio::test]
    async fn test_overlay_toggle_persists_visibility() {
        let (app, sink, dir) = app_with(true).await;
        assert!(app.handle_event(AppEvent::ToggleOverlay));
        assert!(!app.settings.overlay_visible());
        assert!(app.handle_event(AppEvent::ToggleOverlay));
        assert!(app.settings.overlay_visible());

        let reopened = SettingsStore::new(dir.path().join("config.json"));
        assert!(reopened.overlay_visible());
        let lines = sink.lines();
        assert!(lines.contains(&"Overlay hidden".to_string()));
        assert!(lines.contains(&"Overlay shown".to_string()));
    }

    #[tokio::test]
    async fn test_overlay_toggle_headless_leaves_setting() {
        let (app, sink, _dir) = app_with(false).await;
        app.handle_event(AppEvent::ToggleOverlay);
        assert!(app.settings.overlay_visible());
        assert!(sink
            .lines()
            .contains(&"Overlay not available in headless mode".to_string()));
    }

    #[tokio::test]
    async fn test_event_loop_drains_until_exit() {
        let (app, _sink, _dir) = app_with(true).await;
        let (tx, rx) = mpsc::channel(8);
        tx.send(AppEvent::ToggleOverlay).await.unwrap();
        tx.send(AppEvent::Exit).await.unwrap();
        tx.send(AppEvent::ToggleOverlay).await.unwrap();
        app.event_loop(rx).await;
        // Only the event before Exit was applied.
        assert!(!app.settings.overlay_visible());
    }

    #[tokio::test]
    async fn test_event_loop_ends_when_producers_drop() {
        let (app, _sink, _dir) = app_with(true).await;
        let (tx, rx) = mpsc::channel(8);
        drop(tx);
        app.event_loop(rx).await;
    }

    #[tokio::test]
    async fn test_banner_lists_hotkeys_and_addresses() {
        let (app, sink, _dir) = app_with(true).await;
        app.print_banner(true);
        let lines = sink.lines();
        assert!(lines.iter().any(|l| l.contains("[F9]")));
        assert!(lines.iter().any(|l| l.contains("[CTRL+ALT+S]")));
        assert!(lines.iter().any(|l| l.contains(config::DEFAULT_IP)));

        app.print_banner(false);
        assert!(sink.lines().iter().any(|l| l.contains("Hotkeys disabled")));
    }
}
