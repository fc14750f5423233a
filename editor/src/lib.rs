//! Bootstrap coordinator and public facade for the Inkpad editing surface.
//!
//! An editing surface lives inside two nested isolated contexts that become
//! usable at unpredictable times. This crate stands the whole arrangement up
//! and hides the wait:
//!
//! - [`ready`] races a context's readiness sources and adds the poll-based
//!   fallback for hosts whose events never fire.
//! - [`config`] locates the loader script and modules and carries the poll
//!   intervals.
//! - [`Editor`] is the embedder-facing handle: operations invoked before the
//!   surface is ready are captured and replayed in order once it is, queries
//!   answer with fixed defaults until then.
//!
//! Hosts are abstract; see `inkpad-host` for the boundary traits and the
//! scriptable sim host the tests run against.

mod bootstrap;
pub mod config;
mod editor;
mod error;
mod queue;
pub mod ready;

pub use bootstrap::{INNER_CONTEXT, OUTER_CONTEXT};
pub use config::{ConfigError, EditorConfig};
pub use editor::Editor;
pub use error::{EditorError, InitError};
pub use ready::{PollSignal, ReadyError, race_ready};
