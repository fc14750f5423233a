//! Core domain types for Inkpad.
//!
//! Plain data shared by every layer of the workspace: author identity, text
//! payloads, selection ranges, and the bootstrap state machine. No IO and no
//! async here.

#![allow(clippy::missing_errors_doc)] // Result-returning constructors explain themselves

mod author;
mod state;
mod text;

pub use author::{AuthorId, AuthorInfo, EmptyAuthorIdError};
pub use state::BootstrapState;
pub use text::{AttributedText, Changeset, MissingNewlineError, RangeError, SelectionRange};

use std::time::SystemTime;

/// Value type for the editor property bag and command arguments.
///
/// Properties are host-defined (wrap behavior, font, line numbers, ...) and
/// commands take heterogeneous arguments, so both ride on JSON values.
pub type PropertyValue = serde_json::Value;

// ============================================================================
// Key Input
// ============================================================================

/// A key event handed to the embedder's key handlers.
///
/// Deliberately thin: the editing surface interprets keys itself; embedders
/// only observe them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KeyEvent {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyEvent {
    #[must_use]
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            alt: false,
            shift: false,
            meta: false,
        }
    }
}

// ============================================================================
// Captured Errors
// ============================================================================

/// An error the editing surface caught and retained instead of surfacing.
///
/// The embedder drains these via `unhandled_errors()`; before the surface is
/// ready the list is always empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedError {
    message: String,
    time: SystemTime,
}

impl CapturedError {
    #[must_use]
    pub fn new(message: impl Into<String>, time: SystemTime) -> Self {
        Self {
            message: message.into(),
            time,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn time(&self) -> SystemTime {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::{CapturedError, KeyEvent};
    use std::time::SystemTime;

    #[test]
    fn plain_key_event_has_no_modifiers() {
        let ev = KeyEvent::plain("Enter");
        assert_eq!(ev.key, "Enter");
        assert!(!ev.ctrl && !ev.alt && !ev.shift && !ev.meta);
    }

    #[test]
    fn key_event_deserializes_with_defaulted_modifiers() {
        let ev: KeyEvent = serde_json::from_str(r#"{"key":"a","ctrl":true}"#).unwrap();
        assert!(ev.ctrl);
        assert!(!ev.shift);
    }

    #[test]
    fn captured_error_keeps_message_and_time() {
        let now = SystemTime::now();
        let err = CapturedError::new("late script blew up", now);
        assert_eq!(err.message(), "late script blew up");
        assert_eq!(err.time(), now);
    }
}
