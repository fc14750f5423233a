//! Deferred call queue.
//!
//! Operations invoked before the surface is ready are captured as [`Command`]
//! values in submission order and replayed once bootstrap completes. The
//! command set is a closed enum: every operation the surface supports has a
//! variant with a typed payload, so the flush is a plain match with no
//! name-based dispatch.

use tokio::sync::oneshot;

use inkpad_host::{EditorBackend, EditorScope, KeyHandler, NotifyHandler};
use inkpad_types::{AttributedText, AuthorId, AuthorInfo, Changeset, PropertyValue, SelectionRange};

/// One captured operation.
pub(crate) enum Command {
    ImportText {
        text: String,
    },
    ImportAttributedText {
        atext: AttributedText,
    },
    Focus,
    SetEditable {
        editable: bool,
    },
    FormattedOutput {
        reply: oneshot::Sender<String>,
    },
    SetOnKeyPress {
        handler: KeyHandler,
    },
    SetOnKeyDown {
        handler: KeyHandler,
    },
    SetNotifyDirty {
        notify: NotifyHandler,
    },
    SetProperty {
        name: String,
        value: PropertyValue,
    },
    SetBaseText {
        text: String,
    },
    SetBaseAttributedText {
        atext: AttributedText,
    },
    ApplyChangesToBase {
        changes: Changeset,
        author: Option<AuthorId>,
    },
    ApplyPreparedChangesetToBase {
        changes: Changeset,
    },
    SetUserChangeNotification {
        notify: NotifyHandler,
    },
    SetAuthorInfo {
        info: AuthorInfo,
    },
    SetAuthorSelectionRange {
        author: AuthorId,
        range: SelectionRange,
    },
    WithEditor {
        scope: EditorScope,
    },
    ExecuteCommand {
        name: String,
        args: Vec<PropertyValue>,
    },
    ReplaceRange {
        range: SelectionRange,
        text: String,
    },
    Destroy,
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::ImportText { .. } => "import_text",
            Self::ImportAttributedText { .. } => "import_attributed_text",
            Self::Focus => "focus",
            Self::SetEditable { .. } => "set_editable",
            Self::FormattedOutput { .. } => "formatted_output",
            Self::SetOnKeyPress { .. } => "set_on_key_press",
            Self::SetOnKeyDown { .. } => "set_on_key_down",
            Self::SetNotifyDirty { .. } => "set_notify_dirty",
            Self::SetProperty { .. } => "set_property",
            Self::SetBaseText { .. } => "set_base_text",
            Self::SetBaseAttributedText { .. } => "set_base_attributed_text",
            Self::ApplyChangesToBase { .. } => "apply_changes_to_base",
            Self::ApplyPreparedChangesetToBase { .. } => "apply_prepared_changeset_to_base",
            Self::SetUserChangeNotification { .. } => "set_user_change_notification",
            Self::SetAuthorInfo { .. } => "set_author_info",
            Self::SetAuthorSelectionRange { .. } => "set_author_selection_range",
            Self::WithEditor { .. } => "with_editor",
            Self::ExecuteCommand { .. } => "execute_command",
            Self::ReplaceRange { .. } => "replace_range",
            Self::Destroy => "destroy",
        }
    }

    /// Executes a backend-bound command. `Destroy` is not backend-bound and
    /// is intercepted by the dispatcher before `apply` is reached.
    pub(crate) fn apply(self, backend: &mut dyn EditorBackend) {
        match self {
            Self::ImportText { text } => backend.import_text(&text),
            Self::ImportAttributedText { atext } => backend.import_attributed_text(&atext),
            Self::Focus => backend.focus(),
            Self::SetEditable { editable } => backend.set_editable(editable),
            Self::FormattedOutput { reply } => {
                // The requester may have given up on the receiver; fine.
                let _ = reply.send(backend.formatted_output());
            }
            Self::SetOnKeyPress { handler } => backend.set_on_key_press(handler),
            Self::SetOnKeyDown { handler } => backend.set_on_key_down(handler),
            Self::SetNotifyDirty { notify } => backend.set_notify_dirty(notify),
            Self::SetProperty { name, value } => backend.set_property(&name, value),
            Self::SetBaseText { text } => backend.set_base_text(&text),
            Self::SetBaseAttributedText { atext } => backend.set_base_attributed_text(&atext),
            Self::ApplyChangesToBase { changes, author } => {
                backend.apply_changes_to_base(&changes, author.as_ref());
            }
            Self::ApplyPreparedChangesetToBase { changes } => {
                backend.apply_prepared_changeset_to_base(&changes);
            }
            Self::SetUserChangeNotification { notify } => {
                backend.set_user_change_notification(notify);
            }
            Self::SetAuthorInfo { info } => backend.set_author_info(&info),
            Self::SetAuthorSelectionRange { author, range } => {
                backend.set_author_selection_range(&author, range);
            }
            Self::WithEditor { scope } => scope(backend),
            Self::ExecuteCommand { name, args } => backend.execute_command(&name, &args),
            Self::ReplaceRange { range, text } => backend.replace_range(range, &text),
            Self::Destroy => {}
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A command plus its capture order.
#[derive(Debug)]
pub(crate) struct PendingCommand {
    pub(crate) order: u64,
    pub(crate) command: Command,
}

/// Commands captured before readiness, in submission order.
///
/// Flushing is snapshot-then-clear: [`DeferredQueue::take`] hands back the
/// captured commands and leaves the queue empty, so commands submitted while
/// the snapshot executes land in a fresh queue instead of interleaving with
/// it. Capture order keeps counting across snapshots.
#[derive(Default)]
pub(crate) struct DeferredQueue {
    pending: Vec<PendingCommand>,
    next_order: u64,
}

impl DeferredQueue {
    pub(crate) fn push(&mut self, command: Command) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        tracing::trace!(op = command.name(), order, "command captured");
        self.pending.push(PendingCommand { order, command });
        order
    }

    pub(crate) fn take(&mut self) -> Vec<PendingCommand> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn contains_destroy(&self) -> bool {
        self.pending
            .iter()
            .any(|p| matches!(p.command, Command::Destroy))
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, DeferredQueue};
    use inkpad_host::EditorBackend;
    use inkpad_types::{
        AttributedText, AuthorId, AuthorInfo, CapturedError, Changeset, PropertyValue,
        SelectionRange,
    };

    /// Backend that records the operation names it sees.
    #[derive(Default)]
    struct RecordingBackend {
        seen: Vec<&'static str>,
    }

    impl EditorBackend for RecordingBackend {
        fn import_text(&mut self, _text: &str) {
            self.seen.push("import_text");
        }
        fn import_attributed_text(&mut self, _atext: &AttributedText) {
            self.seen.push("import_attributed_text");
        }
        fn focus(&mut self) {
            self.seen.push("focus");
        }
        fn set_editable(&mut self, _editable: bool) {
            self.seen.push("set_editable");
        }
        fn formatted_output(&mut self) -> String {
            self.seen.push("formatted_output");
            "<formatted></formatted>".to_string()
        }
        fn set_on_key_press(&mut self, _handler: inkpad_host::KeyHandler) {
            self.seen.push("set_on_key_press");
        }
        fn set_on_key_down(&mut self, _handler: inkpad_host::KeyHandler) {
            self.seen.push("set_on_key_down");
        }
        fn set_notify_dirty(&mut self, _notify: inkpad_host::NotifyHandler) {
            self.seen.push("set_notify_dirty");
        }
        fn set_property(&mut self, _name: &str, _value: PropertyValue) {
            self.seen.push("set_property");
        }
        fn set_base_text(&mut self, _text: &str) {
            self.seen.push("set_base_text");
        }
        fn set_base_attributed_text(&mut self, _atext: &AttributedText) {
            self.seen.push("set_base_attributed_text");
        }
        fn apply_changes_to_base(&mut self, _changes: &Changeset, _author: Option<&AuthorId>) {
            self.seen.push("apply_changes_to_base");
        }
        fn apply_prepared_changeset_to_base(&mut self, _changes: &Changeset) {
            self.seen.push("apply_prepared_changeset_to_base");
        }
        fn set_user_change_notification(&mut self, _notify: inkpad_host::NotifyHandler) {
            self.seen.push("set_user_change_notification");
        }
        fn set_author_info(&mut self, _info: &AuthorInfo) {
            self.seen.push("set_author_info");
        }
        fn set_author_selection_range(&mut self, _author: &AuthorId, _range: SelectionRange) {
            self.seen.push("set_author_selection_range");
        }
        fn execute_command(&mut self, _name: &str, _args: &[PropertyValue]) {
            self.seen.push("execute_command");
        }
        fn replace_range(&mut self, _range: SelectionRange, _text: &str) {
            self.seen.push("replace_range");
        }
        fn export_text(&self) -> String {
            String::new()
        }
        fn debug_property(&self, _name: &str) -> Option<PropertyValue> {
            None
        }
        fn in_international_composition(&self) -> bool {
            false
        }
        fn prepare_user_changeset(&mut self) -> Option<Changeset> {
            None
        }
        fn unhandled_errors(&self) -> Vec<CapturedError> {
            Vec::new()
        }
        fn dispose(&mut self) {
            self.seen.push("dispose");
        }
    }

    #[test]
    fn take_returns_commands_in_capture_order_and_clears() {
        let mut queue = DeferredQueue::default();
        queue.push(Command::Focus);
        queue.push(Command::SetEditable { editable: false });
        queue.push(Command::ImportText {
            text: "hi\n".into(),
        });

        let batch = queue.take();
        assert!(queue.is_empty());
        let names: Vec<_> = batch.iter().map(|p| p.command.name()).collect();
        assert_eq!(names, ["focus", "set_editable", "import_text"]);
        let orders: Vec<_> = batch.iter().map(|p| p.order).collect();
        assert_eq!(orders, [0, 1, 2]);
    }

    #[test]
    fn capture_order_keeps_counting_across_snapshots() {
        let mut queue = DeferredQueue::default();
        queue.push(Command::Focus);
        let first = queue.take();
        assert_eq!(first.len(), 1);

        let order = queue.push(Command::Focus);
        assert_eq!(order, 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn apply_routes_commands_to_the_backend() {
        let mut backend = RecordingBackend::default();
        Command::ImportText {
            text: "hello\n".into(),
        }
        .apply(&mut backend);
        Command::Focus.apply(&mut backend);
        Command::ReplaceRange {
            range: SelectionRange::new(0, 1).unwrap(),
            text: "H".into(),
        }
        .apply(&mut backend);
        assert_eq!(backend.seen, ["import_text", "focus", "replace_range"]);
    }

    #[test]
    fn with_editor_scope_runs_against_the_backend() {
        let mut backend = RecordingBackend::default();
        Command::WithEditor {
            scope: Box::new(|editor| editor.focus()),
        }
        .apply(&mut backend);
        assert_eq!(backend.seen, ["focus"]);
    }

    #[tokio::test]
    async fn formatted_output_reply_is_delivered() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let mut backend = RecordingBackend::default();
        Command::FormattedOutput { reply: tx }.apply(&mut backend);
        assert_eq!(rx.await.unwrap(), "<formatted></formatted>");
    }

    #[test]
    fn debug_prints_the_operation_name() {
        let cmd = Command::SetProperty {
            name: "wraps".into(),
            value: serde_json::Value::Bool(true),
        };
        assert_eq!(format!("{cmd:?}"), "set_property");
    }
}
