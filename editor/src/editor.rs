//! The public editor facade.
//!
//! [`Editor`] hides the bootstrap dance behind a handle that accepts
//! operations from the moment it is constructed. Until the surface is ready,
//! operations are captured in the deferred queue; [`Editor::init`] runs the
//! bootstrap stages and flushes the queue in capture order; afterwards
//! operations execute immediately. Queries never queue: they answer with
//! fixed defaults until a backend is attached and delegate to it afterwards.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use inkpad_host::{Context, DocumentBuilder, EditorBackend, Host};
use inkpad_types::{
    AttributedText, AuthorId, AuthorInfo, BootstrapState, CapturedError, Changeset, KeyEvent,
    PropertyValue, SelectionRange,
};

use crate::bootstrap::Bootstrap;
use crate::config::EditorConfig;
use crate::error::{EditorError, InitError};
use crate::queue::{Command, DeferredQueue, PendingCommand};

/// Exported text until a backend is attached.
const AWAITING_INIT: &str = "(awaiting init)\n";

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one embedded editor instance.
///
/// Cloneable; clones share the state, the queue, and the backend. All
/// operations are safe to call from any task at any point in the lifecycle;
/// the handle decides whether they run now or after bootstrap.
#[derive(Clone)]
pub struct Editor {
    shared: Arc<Mutex<Shared>>,
    config: Arc<EditorConfig>,
}

/// Collaborators handed over at construction, consumed by `init`.
struct BootPieces {
    host: Box<dyn Host>,
    builder: Box<dyn DocumentBuilder>,
}

struct Shared {
    state: BootstrapState,
    /// True from `init` entry until its outcome is committed.
    booting: bool,
    /// True while a dispatch loop has the backend checked out.
    dispatching: bool,
    queue: DeferredQueue,
    backend: Option<Box<dyn EditorBackend>>,
    outer: Option<Box<dyn Context>>,
    inner: Option<Box<dyn Context>>,
    boot: Option<BootPieces>,
}

impl Shared {
    fn advance(&mut self, next: BootstrapState) {
        if self.state.can_become(next) {
            debug!(from = %self.state, to = %next, "state transition");
            self.state = next;
        } else {
            warn!(from = %self.state, to = %next, "illegal state transition ignored");
        }
    }
}

impl Editor {
    /// Creates an editor over an embedding host. Nothing touches the host
    /// until [`Editor::init`] runs.
    #[must_use]
    pub fn new(
        host: Box<dyn Host>,
        builder: Box<dyn DocumentBuilder>,
        config: EditorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: BootstrapState::Uninitialized,
                booting: false,
                dispatching: false,
                queue: DeferredQueue::default(),
                backend: None,
                outer: None,
                inner: None,
                boot: Some(BootPieces { host, builder }),
            })),
            config: Arc::new(config),
        }
    }

    /// Current bootstrap stage.
    #[must_use]
    pub fn bootstrap_state(&self) -> BootstrapState {
        lock(&self.shared).state
    }

    /// Bootstraps the editing surface inside the `mount_id` element.
    ///
    /// `initial_text` is queued as the first command, ahead of anything
    /// submitted while bootstrap is in flight. On success the deferred queue
    /// is flushed and the editor is ready. On failure the state stays at the
    /// failed stage and the committed contexts are retained so a later
    /// [`Editor::destroy`] can detach them.
    pub async fn init(&self, mount_id: &str, initial_text: &str) -> Result<(), InitError> {
        self.config.validate()?;
        let mut pieces = {
            let mut sh = lock(&self.shared);
            if sh.state.is_destroyed() {
                return Err(InitError::Destroyed);
            }
            let Some(pieces) = sh.boot.take() else {
                return Err(InitError::AlreadyStarted);
            };
            sh.booting = true;
            sh.queue.push(Command::ImportText {
                text: initial_text.to_string(),
            });
            pieces
        };

        let mut bootstrap = Bootstrap::new(&self.config, pieces.builder.as_mut());
        let result = bootstrap
            .run(pieces.host.as_mut(), mount_id, &mut |next| {
                lock(&self.shared).advance(next);
            })
            .await;

        let mut sh = lock(&self.shared);
        sh.booting = false;
        sh.outer = bootstrap.outer.take();
        sh.inner = bootstrap.inner.take();
        match result {
            Ok(backend) => {
                sh.advance(BootstrapState::Ready);
                sh.backend = Some(backend);
                debug!(pending = sh.queue.len(), "flushing deferred commands");
                self.run_dispatch(sh);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, stage = %sh.state, "bootstrap failed");
                if sh.queue.contains_destroy() {
                    // destroy() arrived mid-bootstrap; honor it now.
                    self.finish_destroy(&mut sh, 0);
                }
                Err(err)
            }
        }
    }

    /// Releases the surface.
    ///
    /// Before the surface is ready this is deferred like any other command:
    /// the flush executes it at its capture position and drops whatever
    /// follows. Once ready it runs immediately: backend disposal, outer
    /// context detach, transition to `Destroyed`. After a failed `init` it
    /// tears the committed contexts down directly. A second call reports
    /// `Destroyed`.
    pub fn destroy(&self) -> Result<(), EditorError> {
        let mut sh = lock(&self.shared);
        if sh.state.is_destroyed() {
            return Err(EditorError::Destroyed);
        }
        if sh.booting || sh.dispatching || sh.state.is_ready() {
            return self.dispatch_locked(sh, Command::Destroy);
        }
        // init never ran, or failed partway. Nothing to dispose; detach
        // whatever contexts were committed.
        debug!(stage = %sh.state, "destroying without a live surface");
        self.finish_destroy(&mut sh, 0);
        Ok(())
    }

    // ── Deferred operations ─────────────────────────────────────────────

    /// Replaces the document text.
    pub fn import_text(&self, text: impl Into<String>) -> Result<(), EditorError> {
        self.dispatch(Command::ImportText { text: text.into() })
    }

    /// Replaces the document text and attributes.
    pub fn import_attributed_text(&self, atext: AttributedText) -> Result<(), EditorError> {
        self.dispatch(Command::ImportAttributedText { atext })
    }

    pub fn focus(&self) -> Result<(), EditorError> {
        self.dispatch(Command::Focus)
    }

    pub fn set_editable(&self, editable: bool) -> Result<(), EditorError> {
        self.dispatch(Command::SetEditable { editable })
    }

    /// Requests the formatted rendering of the document. The answer arrives
    /// on the returned channel once the command executes; the sender is
    /// dropped if the editor is destroyed first.
    pub fn request_formatted_output(&self) -> Result<oneshot::Receiver<String>, EditorError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Command::FormattedOutput { reply })?;
        Ok(rx)
    }

    pub fn set_on_key_press(
        &self,
        handler: impl FnMut(KeyEvent) + Send + 'static,
    ) -> Result<(), EditorError> {
        self.dispatch(Command::SetOnKeyPress {
            handler: Box::new(handler),
        })
    }

    pub fn set_on_key_down(
        &self,
        handler: impl FnMut(KeyEvent) + Send + 'static,
    ) -> Result<(), EditorError> {
        self.dispatch(Command::SetOnKeyDown {
            handler: Box::new(handler),
        })
    }

    /// Installs the callback fired when the document becomes dirty.
    pub fn set_notify_dirty(
        &self,
        notify: impl FnMut() + Send + 'static,
    ) -> Result<(), EditorError> {
        self.dispatch(Command::SetNotifyDirty {
            notify: Box::new(notify),
        })
    }

    pub fn set_property(
        &self,
        name: impl Into<String>,
        value: PropertyValue,
    ) -> Result<(), EditorError> {
        self.dispatch(Command::SetProperty {
            name: name.into(),
            value,
        })
    }

    /// Sets the revision base text collaborative changes apply against.
    pub fn set_base_text(&self, text: impl Into<String>) -> Result<(), EditorError> {
        self.dispatch(Command::SetBaseText { text: text.into() })
    }

    pub fn set_base_attributed_text(&self, atext: AttributedText) -> Result<(), EditorError> {
        self.dispatch(Command::SetBaseAttributedText { atext })
    }

    /// Applies a changeset from another author on top of the base.
    pub fn apply_changes_to_base(
        &self,
        changes: Changeset,
        author: Option<AuthorId>,
    ) -> Result<(), EditorError> {
        self.dispatch(Command::ApplyChangesToBase { changes, author })
    }

    /// Folds a changeset previously returned by `prepare_user_changeset`
    /// into the base.
    pub fn apply_prepared_changeset_to_base(
        &self,
        changes: Changeset,
    ) -> Result<(), EditorError> {
        self.dispatch(Command::ApplyPreparedChangesetToBase { changes })
    }

    pub fn set_user_change_notification(
        &self,
        notify: impl FnMut() + Send + 'static,
    ) -> Result<(), EditorError> {
        self.dispatch(Command::SetUserChangeNotification {
            notify: Box::new(notify),
        })
    }

    pub fn set_author_info(&self, info: AuthorInfo) -> Result<(), EditorError> {
        self.dispatch(Command::SetAuthorInfo { info })
    }

    pub fn set_author_selection_range(
        &self,
        author: AuthorId,
        range: SelectionRange,
    ) -> Result<(), EditorError> {
        self.dispatch(Command::SetAuthorSelectionRange { author, range })
    }

    /// Runs a closure against the live backend. Deferred like any command,
    /// so the closure sees the surface only once it is ready.
    pub fn with_editor(
        &self,
        scope: impl FnOnce(&mut dyn EditorBackend) + Send + 'static,
    ) -> Result<(), EditorError> {
        self.dispatch(Command::WithEditor {
            scope: Box::new(scope),
        })
    }

    pub fn execute_command(
        &self,
        name: impl Into<String>,
        args: Vec<PropertyValue>,
    ) -> Result<(), EditorError> {
        self.dispatch(Command::ExecuteCommand {
            name: name.into(),
            args,
        })
    }

    pub fn replace_range(
        &self,
        range: SelectionRange,
        text: impl Into<String>,
    ) -> Result<(), EditorError> {
        self.dispatch(Command::ReplaceRange {
            range,
            text: text.into(),
        })
    }

    // ── Immediate queries ───────────────────────────────────────────────

    /// The document text. `"(awaiting init)\n"` until the surface is ready,
    /// and while a dispatch has the backend checked out.
    #[must_use]
    pub fn export_text(&self) -> String {
        lock(&self.shared)
            .backend
            .as_ref()
            .map_or_else(|| AWAITING_INIT.to_string(), |b| b.export_text())
    }

    #[must_use]
    pub fn debug_property(&self, name: &str) -> Option<PropertyValue> {
        lock(&self.shared)
            .backend
            .as_ref()
            .and_then(|b| b.debug_property(name))
    }

    /// Whether the surface is inside an international composition session
    /// (dead keys, IME). `false` until ready.
    #[must_use]
    pub fn in_international_composition(&self) -> bool {
        lock(&self.shared)
            .backend
            .as_ref()
            .is_some_and(|b| b.in_international_composition())
    }

    /// Builds a changeset of the user's edits since the last base. `None`
    /// until ready, or when there is nothing to commit.
    pub fn prepare_user_changeset(&self) -> Option<Changeset> {
        lock(&self.shared)
            .backend
            .as_mut()
            .and_then(|b| b.prepare_user_changeset())
    }

    /// Errors the surface caught and retained. Empty until ready.
    #[must_use]
    pub fn unhandled_errors(&self) -> Vec<CapturedError> {
        lock(&self.shared)
            .backend
            .as_ref()
            .map(|b| b.unhandled_errors())
            .unwrap_or_default()
    }

    // ── Dispatch machinery ──────────────────────────────────────────────

    fn dispatch(&self, command: Command) -> Result<(), EditorError> {
        let sh = lock(&self.shared);
        self.dispatch_locked(sh, command)
    }

    fn dispatch_locked(
        &self,
        mut sh: MutexGuard<'_, Shared>,
        command: Command,
    ) -> Result<(), EditorError> {
        if sh.state.is_destroyed() {
            return Err(EditorError::Destroyed);
        }
        sh.queue.push(command);
        if sh.state.is_ready() && !sh.dispatching {
            self.run_dispatch(sh);
        }
        Ok(())
    }

    /// Drains the queue against the checked-out backend until it stays
    /// empty.
    ///
    /// Commands run without the lock held, so key handlers, notification
    /// callbacks, and `with_editor` scopes are free to call back into this
    /// editor; those calls land in the queue and are applied on the next
    /// pass of the loop, preserving capture order.
    fn run_dispatch<'a>(&'a self, mut sh: MutexGuard<'a, Shared>) {
        let Some(mut backend) = sh.backend.take() else {
            return;
        };
        sh.dispatching = true;

        loop {
            if sh.queue.is_empty() {
                sh.backend = Some(backend);
                sh.dispatching = false;
                return;
            }
            let batch = sh.queue.take();
            drop(sh);

            let mut batch: VecDeque<PendingCommand> = batch.into();
            while let Some(pending) = batch.pop_front() {
                if matches!(pending.command, Command::Destroy) {
                    debug!(order = pending.order, "destroy reached the surface");
                    backend.dispose();
                    let mut sh = lock(&self.shared);
                    self.finish_destroy(&mut sh, batch.len());
                    return;
                }
                trace!(op = pending.command.name(), order = pending.order, "dispatching");
                pending.command.apply(backend.as_mut());
            }

            sh = lock(&self.shared);
        }
    }

    /// Clears pending work, detaches the outer context (the inner one goes
    /// with it), and transitions to `Destroyed`. Any backend must already be
    /// disposed by the caller.
    fn finish_destroy(&self, sh: &mut Shared, dropped_in_flight: usize) {
        let dropped = dropped_in_flight + sh.queue.len();
        sh.queue.take();
        if dropped > 0 {
            warn!(dropped, "pending commands dropped at destroy");
        }
        sh.boot = None;
        sh.inner = None;
        if let Some(mut outer) = sh.outer.take() {
            if let Err(err) = outer.detach() {
                warn!(error = %err, "failed to detach outer context");
            }
        }
        sh.dispatching = false;
        sh.advance(BootstrapState::Destroyed);
    }
}

#[cfg(test)]
mod tests {
    use super::{AWAITING_INIT, Editor};
    use crate::config::EditorConfig;
    use crate::error::{EditorError, InitError};
    use inkpad_host::sim::{SimHost, SimScript};
    use inkpad_types::BootstrapState;

    fn sim_editor(script: SimScript) -> (SimHost, Editor) {
        let host = SimHost::new(script);
        let editor = Editor::new(
            Box::new(host.clone()),
            Box::new(host.builder()),
            EditorConfig::default(),
        );
        (host, editor)
    }

    #[tokio::test]
    async fn operations_queue_before_init() {
        let (host, editor) = sim_editor(SimScript::default());
        editor.focus().unwrap();
        editor.set_editable(false).unwrap();
        assert_eq!(editor.bootstrap_state(), BootstrapState::Uninitialized);
        assert_eq!(editor.export_text(), AWAITING_INIT);
        assert!(host.ops().is_empty(), "nothing reaches the backend pre-init");
    }

    #[tokio::test]
    async fn init_queues_the_import_ahead_of_bootstrap() {
        let (host, editor) = sim_editor(SimScript::default());
        editor.init("editorbox", "seed\n").await.unwrap();
        editor.focus().unwrap();
        assert_eq!(editor.bootstrap_state(), BootstrapState::Ready);
        assert_eq!(editor.export_text(), "seed\n");
        // The flush ran the import; the post-ready focus executed directly.
        assert_eq!(host.ops(), ["import_text(\"seed\\n\")", "focus"]);
    }

    #[tokio::test]
    async fn second_init_reports_already_started() {
        let (_host, editor) = sim_editor(SimScript::default());
        editor.init("editorbox", "\n").await.unwrap();
        assert!(matches!(
            editor.init("editorbox", "\n").await,
            Err(InitError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn destroy_before_init_discards_the_queue() {
        let (host, editor) = sim_editor(SimScript::default());
        editor.focus().unwrap();
        editor.destroy().unwrap();
        assert_eq!(editor.bootstrap_state(), BootstrapState::Destroyed);
        assert!(matches!(editor.focus(), Err(EditorError::Destroyed)));
        assert!(matches!(
            editor.init("editorbox", "\n").await,
            Err(InitError::Destroyed)
        ));
        assert!(host.ops().is_empty());
        assert!(host.detached().is_empty(), "no context existed to detach");
    }

    #[tokio::test]
    async fn second_destroy_reports_destroyed() {
        let (_host, editor) = sim_editor(SimScript::default());
        editor.init("editorbox", "\n").await.unwrap();
        editor.destroy().unwrap();
        assert!(matches!(editor.destroy(), Err(EditorError::Destroyed)));
    }
}
