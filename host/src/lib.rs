//! Host-environment boundary for Inkpad.
//!
//! The bootstrap coordinator in `inkpad-editor` is host-agnostic: everything
//! it needs from the embedding environment comes through the traits defined
//! here. [`signal`] provides the readiness-signal capability the coordinator
//! races over; [`context`] models contexts, the module loader, dependency
//! modules, and the backing editor; [`sim`] is a scriptable in-process host
//! used by the test suites and the demo binary.

pub mod context;
pub mod signal;
pub mod sim;

pub use context::{
    Context, DepFut, DependencyError, DocumentBuilder, DocumentEvent, EditorBackend, EditorModule,
    EditorScope, Host, HostError, KeyHandler, LoaderSettings, ModuleLoader, NotifyHandler,
    PluginRegistry,
};
pub use signal::{EventSignal, ReadyFut, ReadyProbe, Signal, SignalError, SignalHandle};
