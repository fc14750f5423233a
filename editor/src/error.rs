//! Error types for bootstrap and post-bootstrap operation.

use std::time::Duration;

use thiserror::Error;

use inkpad_host::{DependencyError, HostError, SignalError};

use crate::config::ConfigError;
use crate::ready::ReadyError;

/// Why `init` failed.
///
/// Bootstrap makes no rollback attempt: the state stays wherever the failed
/// stage left it, and a subsequent `destroy` performs the teardown.
#[derive(Debug, Error)]
pub enum InitError {
    /// Synchronous host failure: mount point, context creation, script
    /// injection, loader access.
    #[error("host error during bootstrap: {0}")]
    Host(#[from] HostError),
    /// The configuration failed validation, or a configured path could not
    /// be resolved into a URL.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// A readiness race's poll fallback expired with no source fired.
    #[error("readiness race for the {context} context timed out after {waited:?}")]
    ReadinessTimeout {
        context: &'static str,
        waited: Duration,
    },
    /// Every source in a readiness race failed.
    #[error("every readiness source for the {context} context failed ({} causes)", failures.len())]
    ReadinessSource {
        context: &'static str,
        failures: Vec<SignalError>,
    },
    /// The module-loader script reported an error instead of loading.
    #[error("loader script failed: {0}")]
    ScriptLoad(SignalError),
    /// Plugins or the inner-editor module failed to become ready.
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    /// `init` was already called on this editor.
    #[error("init() already ran for this editor")]
    AlreadyStarted,
    /// The editor was destroyed.
    #[error("editor instance has been destroyed")]
    Destroyed,
}

impl InitError {
    pub(crate) fn readiness(context: &'static str, err: ReadyError) -> Self {
        match err {
            ReadyError::Timeout { waited } => Self::ReadinessTimeout { context, waited },
            ReadyError::Sources { failures } => Self::ReadinessSource { context, failures },
        }
    }
}

/// Why an editor operation was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EditorError {
    /// The editor was destroyed; no further operations are accepted.
    #[error("editor instance has been destroyed")]
    Destroyed,
}

#[cfg(test)]
mod tests {
    use super::{EditorError, InitError};
    use crate::ready::ReadyError;
    use std::time::Duration;

    #[test]
    fn readiness_mapping_keeps_the_kind_distinction() {
        let timeout = InitError::readiness(
            "outer",
            ReadyError::Timeout {
                waited: Duration::from_millis(5010),
            },
        );
        assert!(matches!(
            timeout,
            InitError::ReadinessTimeout { context: "outer", .. }
        ));

        let sources = InitError::readiness("inner", ReadyError::Sources { failures: vec![] });
        assert!(matches!(
            sources,
            InitError::ReadinessSource { context: "inner", .. }
        ));
    }

    #[test]
    fn destroyed_message_is_stable() {
        assert_eq!(
            EditorError::Destroyed.to_string(),
            "editor instance has been destroyed"
        );
    }
}
