//! User-facing notification collaborator.
//!
//! The engine reports outcomes through this trait rather than printing
//! directly, so the CLI, tests, and any future surface decide how messages
//! reach the user. Notices are short, human-readable, and non-blocking.

use std::sync::Mutex;

/// Non-blocking user feedback channel
pub trait Notifier {
    fn notify(&self, message: &str);
}

/// Writes notices to stderr, the CLI default
#[derive(Debug, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Collects notices in memory for assertions
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    messages: Mutex<Vec<String>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("notifier poisoned").clone()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .expect("notifier poisoned")
            .push(message.to_string());
    }
}

/// Discards everything; for callers that want a silent engine
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str) {}
}
