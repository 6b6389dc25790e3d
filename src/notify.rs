//! Notification surfaces driven by the toggle coordinator.
//!
//! Every surface implements [`NotificationSink`]; methods default to no-ops so a
//! surface only overrides what it renders. [`Notifier`] fans one call out to all
//! surfaces selected at startup, which lets the coordinator call unconditionally
//! whether or not a given surface exists.

use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::config;

/// A short tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cue {
    pub frequency_hz: u32,
    pub duration_ms: u32,
}

impl Cue {
    pub const ACTIVATE: Cue = Cue {
        frequency_hz: config::ACTIVATE_CUE.0,
        duration_ms: config::ACTIVATE_CUE.1,
    };
    pub const DEACTIVATE: Cue = Cue {
        frequency_hz: config::DEACTIVATE_CUE.0,
        duration_ms: config::DEACTIVATE_CUE.1,
    };
}

pub trait NotificationSink: Send + Sync {
    /// Status text plus active flag (overlay label and dot).
    fn set_status(&self, _active: bool, _label: &str) {}
    /// Two-state indicator (tray icon).
    fn update_indicator(&self, _active: bool) {}
    /// One line of user-facing console output.
    fn print_line(&self, _message: &str) {}
    /// Audible cue. May block for the tone's duration.
    fn play_cue(&self, _cue: Cue) {}
}

/// Surface that renders nothing.
pub struct NullSink;

impl NotificationSink for NullSink {}

/// Writes console lines to stdout.
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn print_line(&self, message: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{message}");
        let _ = out.flush();
    }
}

/// System beep on Windows, terminal bell elsewhere.
pub struct BeepSink;

#[cfg(target_os = "windows")]
#[link(name = "kernel32")]
extern "system" {
    fn Beep(dw_freq: u32, dw_duration: u32) -> i32;
}

impl NotificationSink for BeepSink {
    fn play_cue(&self, cue: Cue) {
        #[cfg(target_os = "windows")]
        {
            // SAFETY: Beep takes two plain integers and has no pointer arguments.
            let ok = unsafe { Beep(cue.frequency_hz, cue.duration_ms) };
            if ok != 0 {
                return;
            }
            tracing::debug!("Beep({}, {}) failed, using bell", cue.frequency_hz, cue.duration_ms);
        }
        #[cfg(not(target_os = "windows"))]
        tracing::trace!("Bell for {}Hz/{}ms cue", cue.frequency_hz, cue.duration_ms);

        let mut out = std::io::stdout().lock();
        let _ = out.write_all(b"\x07");
        let _ = out.flush();
    }
}

/// What a visual surface currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub active: bool,
    pub label: String,
    /// Dot / icon colour as `#rrggbb`.
    pub color: &'static str,
}

impl StatusView {
    fn color_for(active: bool) -> &'static str {
        if active {
            "#00ff00"
        } else {
            "#ff0000"
        }
    }
}

impl Default for StatusView {
    fn default() -> Self {
        Self {
            active: false,
            label: "INACTIVE".into(),
            color: Self::color_for(false),
        }
    }
}

/// Keeps the latest status for a visual surface (overlay or tray).
///
/// Drawing the window or icon belongs to the platform layer, which reads
/// [`StatusBoard::view`].
pub struct StatusBoard {
    surface: &'static str,
    view: Mutex<StatusView>,
}

impl StatusBoard {
    pub fn new(surface: &'static str) -> Self {
        Self {
            surface,
            view: Mutex::new(StatusView::default()),
        }
    }

    pub fn view(&self) -> StatusView {
        self.view.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl NotificationSink for StatusBoard {
    fn set_status(&self, active: bool, label: &str) {
        let mut view = self.view.lock().unwrap_or_else(|e| e.into_inner());
        view.active = active;
        view.label = label.to_string();
        view.color = StatusView::color_for(active);
        tracing::debug!("{} status: {label}", self.surface);
    }

    fn update_indicator(&self, active: bool) {
        let mut view = self.view.lock().unwrap_or_else(|e| e.into_inner());
        view.active = active;
        view.color = StatusView::color_for(active);
    }
}

/// Fan-out over the surfaces selected at startup.
#[derive(Clone, Default)]
pub struct Notifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotificationSink for Notifier {
    fn set_status(&self, active: bool, label: &str) {
        for sink in &self.sinks {
            sink.set_status(active, label);
        }
    }

    fn update_indicator(&self, active: bool) {
        for sink in &self.sinks {
            sink.update_indicator(active);
        }
    }

    fn print_line(&self, message: &str) {
        for sink in &self.sinks {
            sink.print_line(message);
        }
    }

    fn play_cue(&self, cue: Cue) {
        for sink in &self.sinks {
            sink.play_cue(cue);
        }
    }
}

/// Which surfaces to enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surfaces {
    pub overlay: bool,
    pub tray: bool,
}

/// Surfaces chosen at startup. The overlay handle is kept for its visibility
/// toggle; the tray is reached only through the notifier.
pub struct SelectedSurfaces {
    pub notifier: Notifier,
    pub overlay: Option<Arc<StatusBoard>>,
}

/// Build the notifier for this process. Console and audio are always present;
/// a disabled visual surface is simply left out.
pub fn select_surfaces(surfaces: Surfaces) -> SelectedSurfaces {
    let mut notifier = Notifier::new()
        .with(Arc::new(ConsoleSink))
        .with(Arc::new(BeepSink));

    let overlay = surfaces.overlay.then(|| Arc::new(StatusBoard::new("overlay")));
    let tray = surfaces.tray.then(|| Arc::new(StatusBoard::new("tray")));
    for board in overlay.iter().chain(tray.iter()) {
        notifier = notifier.with(Arc::clone(board) as Arc<dyn NotificationSink>);
    }
    if !surfaces.tray {
        tracing::info!("System tray disabled");
    }
    tracing::debug!("{} notification surface(s) active", notifier.len());

    SelectedSurfaces { notifier, overlay }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Status(bool, String),
        Indicator(bool),
        Line(String),
        Cue(Cue),
    }

    /// Records every call for assertions.
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        pub fn lines(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Line(l) => Some(l),
                    _ => None,
                })
                .collect()
        }

        pub fn labels(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Status(_, l) => Some(l),
                    _ => None,
                })
                .collect()
        }

        pub fn cues(&self) -> Vec<Cue> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Cue(c) => Some(c),
                    _ => None,
                })
                .collect()
        }
    }

    impl NotificationSink for RecordingSink {
        fn set_status(&self, active: bool, label: &str) {
            self.events.lock().unwrap().push(Event::Status(active, label.into()));
        }
        fn update_indicator(&self, active: bool) {
            self.events.lock().unwrap().push(Event::Indicator(active));
        }
        fn print_line(&self, message: &str) {
            self.events.lock().unwrap().push(Event::Line(message.into()));
        }
        fn play_cue(&self, cue: Cue) {
            self.events.lock().unwrap().push(Event::Cue(cue));
        }
    }
}
