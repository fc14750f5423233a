//! Host object model.
//!
//! The bootstrap coordinator drives a real embedding environment (nested
//! isolated contexts, script elements, a context-global module loader)
//! through this trait family. Editing internals stay behind
//! [`EditorBackend`], document construction behind [`DocumentBuilder`],
//! module resolution behind [`ModuleLoader`]. The traits model exactly what
//! bootstrap needs and nothing else.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use url::Url;

use inkpad_types::{
    AttributedText, AuthorId, AuthorInfo, CapturedError, Changeset, KeyEvent, PropertyValue,
    SelectionRange,
};

use crate::signal::{EventSignal, ReadyProbe};

/// Boxed future for dependency readiness (plugins, inner editor).
pub type DepFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, DependencyError>> + Send + 'a>>;

/// Key handler installed by the embedder.
pub type KeyHandler = Box<dyn FnMut(KeyEvent) + Send>;

/// Zero-argument notification handler (dirty flags, user-change callbacks).
pub type NotifyHandler = Box<dyn FnMut() + Send>;

/// Closure run against the live backing editor by `with_editor`.
pub type EditorScope = Box<dyn FnOnce(&mut dyn EditorBackend) + Send>;

/// Synchronous failures from the embedding environment.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("mount point '{0}' not found")]
    MountMissing(String),
    #[error("failed to create context '{name}': {message}")]
    ContextCreation { name: String, message: String },
    #[error("failed to inject script '{src}': {message}")]
    ScriptInjection { src: Url, message: String },
    #[error("module loader unavailable: {0}")]
    LoaderUnavailable(String),
    #[error("module '{0}' not found")]
    ModuleMissing(String),
    #[error("failed to detach context '{name}': {message}")]
    Detach { name: String, message: String },
}

/// A dependency (plugin set, inner-editor module) failed to become ready.
#[derive(Debug, Error)]
#[error("dependency '{name}' failed: {message}")]
pub struct DependencyError {
    pub name: String,
    pub message: String,
}

impl DependencyError {
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Document lifecycle events a context can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    /// The document finished loading, subresources included.
    Load,
    /// Parsing finished; subresources may still be in flight.
    ContentLoaded,
    /// The ready-state changed. Pair with a gate on the ready probe, since
    /// the event also fires for intermediate states.
    ReadyStateChange,
}

impl DocumentEvent {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::ContentLoaded => "contentloaded",
            Self::ReadyStateChange => "readystatechange",
        }
    }
}

/// Locations and global key applied to a context's module loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    /// Base location for application modules.
    pub root: Url,
    /// Base location for library modules.
    pub library: Url,
    /// Name under which the loader registers itself in the global scope.
    pub global_key: String,
}

/// Entry point to the embedding environment.
pub trait Host: Send {
    /// Creates the outer context inside the mount-point element. The caller
    /// chooses the context name; hosts expose it for debugging.
    fn create_outer_context(
        &mut self,
        mount_id: &str,
        name: &str,
    ) -> Result<Box<dyn Context>, HostError>;
}

/// An isolated nested execution context: the outer shell or the inner
/// editing surface.
pub trait Context: Send {
    fn name(&self) -> &str;

    /// Signal for the `load` event of the container element hosting this
    /// context.
    fn container_load(&mut self) -> EventSignal;

    /// Signal for the `load` event of the context's window handle.
    fn window_load(&mut self) -> EventSignal;

    /// Signal for a lifecycle event of the context's document handle.
    fn document_signal(&mut self, event: DocumentEvent) -> EventSignal;

    /// Probe that reports whether the document already reached its final
    /// ready state. Drives the poll fallback and the ready-state gate.
    fn ready_probe(&self) -> ReadyProbe;

    /// Creates a nested context inside this context's body.
    fn create_nested(&mut self, name: &str) -> Result<Box<dyn Context>, HostError>;

    /// Injects a script element into the document head and returns its load
    /// signal.
    fn inject_script(&mut self, src: &Url) -> Result<EventSignal, HostError>;

    /// Starts fetching a module ahead of the loader handshake. Best-effort;
    /// hosts without a fetch cache ignore it.
    fn prefetch(&mut self, _src: &Url) {}

    /// The context-global module loader. Available only after the loader
    /// script's load signal fired.
    fn module_loader(&mut self) -> Result<Box<dyn ModuleLoader>, HostError>;

    /// Removes this context's container from its parent document.
    fn detach(&mut self) -> Result<(), HostError>;
}

/// The context-global module loader.
pub trait ModuleLoader: Send {
    /// Applies module locations and the global registration key.
    fn configure(&mut self, settings: &LoaderSettings) -> Result<(), HostError>;

    /// Resolves `module` and binds it to `binding` in the context's global
    /// scope.
    fn resolve_global(&mut self, binding: &str, module: &str) -> Result<(), HostError>;

    /// Typed handle to the resolved plugin-registry module.
    fn plugin_registry(&mut self) -> Result<Box<dyn PluginRegistry>, HostError>;

    /// Typed handle to the resolved inner-editor module.
    fn editor_module(&mut self) -> Result<Box<dyn EditorModule>, HostError>;
}

/// Plugin system facade. Hook machinery lives behind it.
pub trait PluginRegistry: Send {
    /// Copies plugin definitions already loaded by ancestor contexts, so the
    /// inner context does not re-fetch them.
    fn adopt_from_ancestors(&mut self);

    /// Resolves once every adopted plugin finished loading.
    fn ensure(&mut self) -> DepFut<'_, ()>;
}

/// The inner-editor module: a factory for the live backing implementation.
pub trait EditorModule: Send {
    fn init(&mut self) -> DepFut<'_, Box<dyn EditorBackend>>;
}

/// The live backing implementation of the editing surface.
///
/// Every deferred operation lands here once bootstrap completes; the command
/// queue guarantees calls arrive in capture order on one control flow.
pub trait EditorBackend: Send {
    fn import_text(&mut self, text: &str);
    fn import_attributed_text(&mut self, atext: &AttributedText);
    fn focus(&mut self);
    fn set_editable(&mut self, editable: bool);
    fn formatted_output(&mut self) -> String;
    fn set_on_key_press(&mut self, handler: KeyHandler);
    fn set_on_key_down(&mut self, handler: KeyHandler);
    fn set_notify_dirty(&mut self, notify: NotifyHandler);
    fn set_property(&mut self, name: &str, value: PropertyValue);
    fn set_base_text(&mut self, text: &str);
    fn set_base_attributed_text(&mut self, atext: &AttributedText);
    fn apply_changes_to_base(&mut self, changes: &Changeset, author: Option<&AuthorId>);
    fn apply_prepared_changeset_to_base(&mut self, changes: &Changeset);
    fn set_user_change_notification(&mut self, notify: NotifyHandler);
    fn set_author_info(&mut self, info: &AuthorInfo);
    fn set_author_selection_range(&mut self, author: &AuthorId, range: SelectionRange);
    fn execute_command(&mut self, name: &str, args: &[PropertyValue]);
    fn replace_range(&mut self, range: SelectionRange, text: &str);
    fn export_text(&self) -> String;
    fn debug_property(&self, name: &str) -> Option<PropertyValue>;
    fn in_international_composition(&self) -> bool;
    /// Builds a changeset of the user's edits since the last base. Repeated
    /// calls refresh it; `None` when there is nothing to commit.
    fn prepare_user_changeset(&mut self) -> Option<Changeset>;
    /// Errors the surface caught and retained instead of surfacing.
    fn unhandled_errors(&self) -> Vec<CapturedError>;
    /// Releases the surface's resources. Called once, from `destroy`.
    fn dispose(&mut self);
}

/// Collaborator that performs document construction inside a fresh context:
/// doctype, root classes, stylesheet links, scaffolding elements. The
/// coordinator only sequences it.
pub trait DocumentBuilder: Send {
    fn build_outer(&mut self, ctx: &mut dyn Context) -> Result<(), HostError>;
    fn build_inner(&mut self, ctx: &mut dyn Context) -> Result<(), HostError>;
}
