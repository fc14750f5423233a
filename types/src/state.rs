//! Bootstrap lifecycle state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the embedded editing surface.
///
/// Transitions move strictly forward; a failed stage leaves the state at the
/// last value reached (there is no rollback and no dedicated failure state).
/// `Destroyed` is reachable from every state except itself.
///
/// # State Machine
/// ```text
/// ┌───────────────┐   ┌──────────────────────┐   ┌──────────────────────┐
/// │ Uninitialized │ > │ AwaitingOuterContext │ > │ AwaitingInnerContext │
/// └───────────────┘   └──────────────────────┘   └──────────────────────┘
///                                                           │
///                                                           v
/// ┌───────┐   ┌──────────────────────┐   ┌─────────────────────────┐
/// │ Ready │ < │ AwaitingDependencies │ < │ AwaitingModuleHandshake │
/// └───────┘   └──────────────────────┘   └─────────────────────────┘
///
///   every state ────destroy()────> Destroyed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapState {
    /// No `init()` call has been made yet.
    Uninitialized,
    /// Waiting for the outer context's readiness race.
    AwaitingOuterContext,
    /// Waiting for the inner context's readiness race.
    AwaitingInnerContext,
    /// Waiting for the loader script and module resolution.
    AwaitingModuleHandshake,
    /// Waiting for plugin and inner-editor readiness.
    AwaitingDependencies,
    /// Bootstrap complete; operations execute immediately.
    Ready,
    /// Disposed; every subsequent operation fails fast.
    Destroyed,
}

impl BootstrapState {
    /// The next state in the forward chain, if any.
    #[must_use]
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::AwaitingOuterContext),
            Self::AwaitingOuterContext => Some(Self::AwaitingInnerContext),
            Self::AwaitingInnerContext => Some(Self::AwaitingModuleHandshake),
            Self::AwaitingModuleHandshake => Some(Self::AwaitingDependencies),
            Self::AwaitingDependencies => Some(Self::Ready),
            Self::Ready | Self::Destroyed => None,
        }
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Legal moves are single forward steps plus `Destroyed` from anywhere
    /// (except `Destroyed` itself).
    #[must_use]
    pub fn can_become(self, next: Self) -> bool {
        if next == Self::Destroyed {
            return self != Self::Destroyed;
        }
        self.successor() == Some(next)
    }

    #[must_use]
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    #[must_use]
    pub fn is_destroyed(self) -> bool {
        matches!(self, Self::Destroyed)
    }

    /// Whether bootstrap progress can still occur from this state.
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Ready | Self::Destroyed)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::AwaitingOuterContext => "awaiting_outer_context",
            Self::AwaitingInnerContext => "awaiting_inner_context",
            Self::AwaitingModuleHandshake => "awaiting_module_handshake",
            Self::AwaitingDependencies => "awaiting_dependencies",
            Self::Ready => "ready",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
