//! User-visible side effects: a short tone and a system notification.
//!
//! Both calls are fire-and-forget. Implementations swallow and log their
//! own failures so nothing ever propagates back into the engines.

use std::io::Write;
use std::sync::Mutex;

use tracing::{debug, warn};

/// Sink for sound and notification side effects.
pub trait Notifier: Send + Sync {
    fn play_tone(&self);
    fn show_notification(&self, title: &str, body: &str);
}

/// Desktop notifications via the platform notification service.
///
/// The tone is the terminal bell written to stderr. Nothing sounds when
/// stderr is not a terminal.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new("focuscycle")
    }
}

impl Notifier for DesktopNotifier {
    fn play_tone(&self) {
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            warn!(error = %e, "failed to ring terminal bell");
        }
    }

    fn show_notification(&self, title: &str, body: &str) {
        let result = notify_rust::Notification::new()
            .appname(&self.app_name)
            .summary(title)
            .body(body)
            .show();
        match result {
            Ok(_) => debug!(title, "notification shown"),
            Err(e) => warn!(error = %e, title, "failed to show notification"),
        }
    }
}

/// Drops every side effect.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn play_tone(&self) {}

    fn show_notification(&self, _title: &str, _body: &str) {}
}

/// A side effect captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Tone,
    Notification { title: String, body: String },
}

/// Keeps every side effect in memory, in call order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Bodies of the notifications shown so far.
    pub fn bodies(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Notification { body, .. } => Some(body),
                Notice::Tone => None,
            })
            .collect()
    }

    pub fn notification_count(&self) -> usize {
        self.bodies().len()
    }

    pub fn tone_count(&self) -> usize {
        self.notices()
            .iter()
            .filter(|n| matches!(n, Notice::Tone))
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut n) = self.notices.lock() {
            n.clear();
        }
    }

    fn push(&self, notice: Notice) {
        if let Ok(mut n) = self.notices.lock() {
            n.push(notice);
        }
    }
}

impl Notifier for RecordingNotifier {
    fn play_tone(&self) {
        self.push(Notice::Tone);
    }

    fn show_notification(&self, title: &str, body: &str) {
        self.push(Notice::Notification {
            title: title.to_string(),
            body: body.to_string(),
        });
    }
}
