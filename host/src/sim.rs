//! Deterministic simulated host.
//!
//! Runs the whole bootstrap pipeline in-process with scripted readiness:
//! which source rescues each context, after what virtual delay, and which
//! dependency steps fail. The integration suites and the demo binary run on
//! it; production embeddings implement the same traits against a real
//! environment.
//!
//! Everything is recorded: handed-out signal handles (for cancel-count
//! assertions), injected and prefetched script locations, loader settings,
//! resolved bindings, and an ordered log of every backing-editor operation.
//!
//! Timers use tokio time, so paused-time tests advance scripted delays
//! deterministically. Contexts must be created inside a runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::sleep;
use url::Url;

use inkpad_types::{
    AttributedText, AuthorId, AuthorInfo, CapturedError, Changeset, KeyEvent, PropertyValue,
    SelectionRange,
};

use crate::context::{
    Context, DependencyError, DocumentBuilder, DocumentEvent, EditorBackend, EditorModule, Host,
    HostError, KeyHandler, LoaderSettings, ModuleLoader, NotifyHandler, PluginRegistry,
};
use crate::signal::{EventSignal, ReadyProbe, SignalHandle};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Scripts
// ============================================================================

/// One of the five event sources a context exposes to readiness races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimSource {
    ContainerLoad,
    WindowLoad,
    DocumentLoad,
    ContentLoaded,
    ReadyStateChange,
}

impl SimSource {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ContainerLoad => "container:load",
            Self::WindowLoad => "window:load",
            Self::DocumentLoad => "doc:load",
            Self::ContentLoaded => "doc:contentloaded",
            Self::ReadyStateChange => "doc:readystatechange",
        }
    }
}

/// Which readiness source rescues a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyVia {
    ContainerLoad,
    WindowLoad,
    DocumentLoad,
    ContentLoaded,
    /// Fires one premature ready-state event first (while the probe is still
    /// false), then the real one at the deadline.
    ReadyStateChange,
    /// No event ever fires; only the ready probe turns true.
    PollOnly,
    /// Nothing ever becomes ready.
    Never,
}

impl ReadyVia {
    fn source(self) -> Option<SimSource> {
        match self {
            Self::ContainerLoad => Some(SimSource::ContainerLoad),
            Self::WindowLoad => Some(SimSource::WindowLoad),
            Self::DocumentLoad => Some(SimSource::DocumentLoad),
            Self::ContentLoaded => Some(SimSource::ContentLoaded),
            Self::ReadyStateChange => Some(SimSource::ReadyStateChange),
            Self::PollOnly | Self::Never => None,
        }
    }
}

/// Scripted outcome for a dependency step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimOutcome {
    Ok,
    Fail(String),
}

impl SimOutcome {
    fn as_dependency_result(&self, name: &str) -> Result<(), DependencyError> {
        match self {
            Self::Ok => Ok(()),
            Self::Fail(message) => Err(DependencyError::new(name, message.clone())),
        }
    }
}

/// Readiness script for one context.
#[derive(Debug, Clone)]
pub struct ContextScript {
    pub ready_via: ReadyVia,
    /// Virtual time until the winning source fires (or the probe turns true).
    pub delay: Duration,
    /// Sources that report an error event as soon as they are watched.
    pub fail_sources: Vec<(SimSource, String)>,
}

impl ContextScript {
    #[must_use]
    pub fn via(ready_via: ReadyVia) -> Self {
        Self {
            ready_via,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn fail_for(&self, source: SimSource) -> Option<String> {
        self.fail_sources
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, msg)| msg.clone())
    }
}

impl Default for ContextScript {
    fn default() -> Self {
        Self {
            ready_via: ReadyVia::WindowLoad,
            delay: Duration::ZERO,
            fail_sources: Vec::new(),
        }
    }
}

/// Full script for a bootstrap run. `Default` is the all-green path.
#[derive(Debug, Clone)]
pub struct SimScript {
    pub mount_exists: bool,
    pub outer: ContextScript,
    pub inner: ContextScript,
    pub builder: SimOutcome,
    pub script_load: SimOutcome,
    /// Modules that `resolve_global` reports as missing.
    pub missing_modules: Vec<String>,
    pub plugins: SimOutcome,
    pub editor_init: SimOutcome,
}

impl SimScript {
    /// Both contexts rescued by the same source.
    #[must_use]
    pub fn ready_via(via: ReadyVia) -> Self {
        Self {
            outer: ContextScript::via(via),
            inner: ContextScript::via(via),
            ..Self::default()
        }
    }
}

impl Default for SimScript {
    fn default() -> Self {
        Self {
            mount_exists: true,
            outer: ContextScript::default(),
            inner: ContextScript::default(),
            builder: SimOutcome::Ok,
            script_load: SimOutcome::Ok,
            missing_modules: Vec::new(),
            plugins: SimOutcome::Ok,
            editor_init: SimOutcome::Ok,
        }
    }
}

// ============================================================================
// Shared state
// ============================================================================

type SharedSim = Arc<Mutex<SimState>>;
type SharedContext = Arc<Mutex<ContextState>>;

struct ContextState {
    script: ContextScript,
    ready: Arc<AtomicBool>,
    /// Handle for the winning source, once it has been watched.
    fire_on_ready: Option<SignalHandle>,
    /// The deadline passed before the winning source was watched.
    ready_due: bool,
    /// Every handle handed out, in subscription order.
    handles: Vec<SignalHandle>,
}

impl ContextState {
    fn new(script: ContextScript) -> SharedContext {
        Arc::new(Mutex::new(Self {
            script,
            ready: Arc::new(AtomicBool::new(false)),
            fire_on_ready: None,
            ready_due: false,
            handles: Vec::new(),
        }))
    }
}

struct SimState {
    script: SimScript,
    mounted_at: Option<String>,
    contexts: HashMap<String, SharedContext>,
    injected_scripts: Vec<Url>,
    prefetched: Vec<Url>,
    loader_settings: Option<LoaderSettings>,
    resolved: Vec<(String, String)>,
    adopted_from_ancestors: bool,
    built: Vec<String>,
    detached: Vec<String>,
    // Backing editor state
    ops: Vec<String>,
    text: String,
    props: HashMap<String, PropertyValue>,
    user_edits: usize,
    disposed: bool,
    key_press: Option<KeyHandler>,
    key_down: Option<KeyHandler>,
    notify_dirty: Option<NotifyHandler>,
    user_change: Option<NotifyHandler>,
    author_info: Option<AuthorInfo>,
    unhandled: Vec<CapturedError>,
}

impl SimState {
    fn new(script: SimScript) -> Self {
        Self {
            script,
            mounted_at: None,
            contexts: HashMap::new(),
            injected_scripts: Vec::new(),
            prefetched: Vec::new(),
            loader_settings: None,
            resolved: Vec::new(),
            adopted_from_ancestors: false,
            built: Vec::new(),
            detached: Vec::new(),
            ops: Vec::new(),
            text: String::new(),
            props: HashMap::new(),
            user_edits: 0,
            disposed: false,
            key_press: None,
            key_down: None,
            notify_dirty: None,
            user_change: None,
            author_info: None,
            unhandled: Vec::new(),
        }
    }

    fn op(&mut self, entry: impl Into<String>) {
        self.ops.push(entry.into());
    }
}

/// Spawns the readiness task for a freshly created context.
fn arm_context(ctx: &SharedContext) {
    let (via, delay) = {
        let c = lock(ctx);
        (c.script.ready_via, c.script.delay)
    };
    if via == ReadyVia::Never {
        return;
    }
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        if !delay.is_zero() {
            sleep(delay).await;
        }
        let mut c = lock(&ctx);
        c.ready.store(true, Ordering::Release);
        c.ready_due = true;
        if let Some(handle) = &c.fire_on_ready {
            handle.fire();
        }
    });
}

// ============================================================================
// Host / Context
// ============================================================================

/// The simulated embedding environment. Cloneable; clones observe the same
/// recorded state.
#[derive(Clone)]
pub struct SimHost {
    shared: SharedSim,
}

impl SimHost {
    #[must_use]
    pub fn new(script: SimScript) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SimState::new(script))),
        }
    }

    /// A document builder recording into the same state.
    #[must_use]
    pub fn builder(&self) -> SimBuilder {
        SimBuilder {
            shared: Arc::clone(&self.shared),
        }
    }

    // ── Inspection ──────────────────────────────────────────────────────

    #[must_use]
    pub fn ops(&self) -> Vec<String> {
        lock(&self.shared).ops.clone()
    }

    #[must_use]
    pub fn mounted_at(&self) -> Option<String> {
        lock(&self.shared).mounted_at.clone()
    }

    #[must_use]
    pub fn injected_scripts(&self) -> Vec<Url> {
        lock(&self.shared).injected_scripts.clone()
    }

    #[must_use]
    pub fn prefetched(&self) -> Vec<Url> {
        lock(&self.shared).prefetched.clone()
    }

    #[must_use]
    pub fn loader_settings(&self) -> Option<LoaderSettings> {
        lock(&self.shared).loader_settings.clone()
    }

    #[must_use]
    pub fn resolved_bindings(&self) -> Vec<(String, String)> {
        lock(&self.shared).resolved.clone()
    }

    #[must_use]
    pub fn adopted_from_ancestors(&self) -> bool {
        lock(&self.shared).adopted_from_ancestors
    }

    #[must_use]
    pub fn built_documents(&self) -> Vec<String> {
        lock(&self.shared).built.clone()
    }

    #[must_use]
    pub fn detached(&self) -> Vec<String> {
        lock(&self.shared).detached.clone()
    }

    #[must_use]
    pub fn disposed(&self) -> bool {
        lock(&self.shared).disposed
    }

    #[must_use]
    pub fn last_author_info(&self) -> Option<AuthorInfo> {
        lock(&self.shared).author_info.clone()
    }

    /// `(label, cancel_count)` for every signal the named context handed out.
    #[must_use]
    pub fn cancel_counts(&self, context: &str) -> Vec<(String, usize)> {
        let st = lock(&self.shared);
        let Some(ctx) = st.contexts.get(context) else {
            return Vec::new();
        };
        let ctx = lock(ctx);
        ctx.handles
            .iter()
            .map(|h| (h.label().to_string(), h.cancel_count()))
            .collect()
    }

    // ── Stimuli ─────────────────────────────────────────────────────────

    /// Records an error the surface "caught"; drained by `unhandled_errors`.
    pub fn push_unhandled_error(&self, message: impl Into<String>) {
        let captured = CapturedError::new(message, std::time::SystemTime::now());
        lock(&self.shared).unhandled.push(captured);
    }

    /// Feeds a key event to the installed key-press handler. Returns whether
    /// a handler was installed.
    pub fn press_key(&self, event: KeyEvent) -> bool {
        let Some(mut handler) = lock(&self.shared).key_press.take() else {
            return false;
        };
        // Handlers may call back into the editor, which re-enters this
        // state; they run with the lock released.
        handler(event);
        let mut st = lock(&self.shared);
        if st.key_press.is_none() {
            st.key_press = Some(handler);
        }
        true
    }

    /// Fires the dirty notification, if installed.
    pub fn trigger_dirty(&self) -> bool {
        let Some(mut notify) = lock(&self.shared).notify_dirty.take() else {
            return false;
        };
        notify();
        let mut st = lock(&self.shared);
        if st.notify_dirty.is_none() {
            st.notify_dirty = Some(notify);
        }
        true
    }

    /// Fires the user-change notification, if installed.
    pub fn trigger_user_change(&self) -> bool {
        let Some(mut notify) = lock(&self.shared).user_change.take() else {
            return false;
        };
        notify();
        let mut st = lock(&self.shared);
        if st.user_change.is_none() {
            st.user_change = Some(notify);
        }
        true
    }
}

impl Host for SimHost {
    fn create_outer_context(
        &mut self,
        mount_id: &str,
        name: &str,
    ) -> Result<Box<dyn Context>, HostError> {
        let mut st = lock(&self.shared);
        if !st.script.mount_exists {
            return Err(HostError::MountMissing(mount_id.to_string()));
        }
        st.mounted_at = Some(mount_id.to_string());
        let ctx = ContextState::new(st.script.outer.clone());
        st.contexts.insert(name.to_string(), Arc::clone(&ctx));
        drop(st);
        arm_context(&ctx);
        Ok(Box::new(SimContext {
            shared: Arc::clone(&self.shared),
            ctx,
            name: name.to_string(),
        }))
    }
}

/// One simulated isolated context.
pub struct SimContext {
    shared: SharedSim,
    ctx: SharedContext,
    name: String,
}

impl SimContext {
    fn watch(&self, source: SimSource) -> EventSignal {
        let label = format!("{}:{}", self.name, source.label());
        let (handle, signal) = EventSignal::pair(label);
        let mut ctx = lock(&self.ctx);
        ctx.handles.push(handle.clone());

        if let Some(message) = ctx.script.fail_for(source) {
            handle.fail(message);
            return signal;
        }
        if ctx.script.ready_via.source() == Some(source) {
            if ctx.ready_due {
                handle.fire();
            } else {
                if source == SimSource::ReadyStateChange {
                    // Premature state change: the probe is still false, so a
                    // gated waiter must ignore this one.
                    handle.fire();
                }
                ctx.fire_on_ready = Some(handle);
            }
        }
        signal
    }
}

impl Context for SimContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn container_load(&mut self) -> EventSignal {
        self.watch(SimSource::ContainerLoad)
    }

    fn window_load(&mut self) -> EventSignal {
        self.watch(SimSource::WindowLoad)
    }

    fn document_signal(&mut self, event: DocumentEvent) -> EventSignal {
        match event {
            DocumentEvent::Load => self.watch(SimSource::DocumentLoad),
            DocumentEvent::ContentLoaded => self.watch(SimSource::ContentLoaded),
            DocumentEvent::ReadyStateChange => self.watch(SimSource::ReadyStateChange),
        }
    }

    fn ready_probe(&self) -> ReadyProbe {
        let ready = Arc::clone(&lock(&self.ctx).ready);
        Box::new(move || ready.load(Ordering::Acquire))
    }

    fn create_nested(&mut self, name: &str) -> Result<Box<dyn Context>, HostError> {
        let mut st = lock(&self.shared);
        let ctx = ContextState::new(st.script.inner.clone());
        st.contexts.insert(name.to_string(), Arc::clone(&ctx));
        drop(st);
        arm_context(&ctx);
        Ok(Box::new(SimContext {
            shared: Arc::clone(&self.shared),
            ctx,
            name: name.to_string(),
        }))
    }

    fn inject_script(&mut self, src: &Url) -> Result<EventSignal, HostError> {
        let mut st = lock(&self.shared);
        st.injected_scripts.push(src.clone());
        let (handle, signal) = EventSignal::pair(format!("{}:script:{}", self.name, src));
        match &st.script.script_load {
            SimOutcome::Ok => handle.fire(),
            SimOutcome::Fail(message) => handle.fail(message.clone()),
        }
        Ok(signal)
    }

    fn prefetch(&mut self, src: &Url) {
        lock(&self.shared).prefetched.push(src.clone());
    }

    fn module_loader(&mut self) -> Result<Box<dyn ModuleLoader>, HostError> {
        let st = lock(&self.shared);
        if st.injected_scripts.is_empty() {
            return Err(HostError::LoaderUnavailable(
                "no loader script was injected".to_string(),
            ));
        }
        Ok(Box::new(SimLoader {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn detach(&mut self) -> Result<(), HostError> {
        lock(&self.shared).detached.push(self.name.clone());
        Ok(())
    }
}

// ============================================================================
// Loader, plugins, inner-editor module
// ============================================================================

struct SimLoader {
    shared: SharedSim,
}

impl ModuleLoader for SimLoader {
    fn configure(&mut self, settings: &LoaderSettings) -> Result<(), HostError> {
        lock(&self.shared).loader_settings = Some(settings.clone());
        Ok(())
    }

    fn resolve_global(&mut self, binding: &str, module: &str) -> Result<(), HostError> {
        let mut st = lock(&self.shared);
        if st.script.missing_modules.iter().any(|m| m == module) {
            return Err(HostError::ModuleMissing(module.to_string()));
        }
        st.resolved.push((binding.to_string(), module.to_string()));
        Ok(())
    }

    fn plugin_registry(&mut self) -> Result<Box<dyn PluginRegistry>, HostError> {
        Ok(Box::new(SimPlugins {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn editor_module(&mut self) -> Result<Box<dyn EditorModule>, HostError> {
        Ok(Box::new(SimEditorModule {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct SimPlugins {
    shared: SharedSim,
}

impl PluginRegistry for SimPlugins {
    fn adopt_from_ancestors(&mut self) {
        lock(&self.shared).adopted_from_ancestors = true;
    }

    fn ensure(&mut self) -> crate::context::DepFut<'_, ()> {
        let outcome = lock(&self.shared).script.plugins.clone();
        Box::pin(async move { outcome.as_dependency_result("plugins") })
    }
}

struct SimEditorModule {
    shared: SharedSim,
}

impl EditorModule for SimEditorModule {
    fn init(&mut self) -> crate::context::DepFut<'_, Box<dyn EditorBackend>> {
        let outcome = lock(&self.shared).script.editor_init.clone();
        let shared = Arc::clone(&self.shared);
        Box::pin(async move {
            outcome.as_dependency_result("inner_editor")?;
            Ok(Box::new(SimBackend { shared }) as Box<dyn EditorBackend>)
        })
    }
}

// ============================================================================
// Backing editor
// ============================================================================

/// Recording implementation of the backing editor. Keeps a real text buffer
/// so imports and range edits round-trip through `export_text`.
struct SimBackend {
    shared: SharedSim,
}

impl EditorBackend for SimBackend {
    fn import_text(&mut self, text: &str) {
        let mut st = lock(&self.shared);
        st.op(format!("import_text({text:?})"));
        st.text = text.to_string();
    }

    fn import_attributed_text(&mut self, atext: &AttributedText) {
        let mut st = lock(&self.shared);
        st.op(format!("import_attributed_text({:?})", atext.text()));
        st.text = atext.text().to_string();
    }

    fn focus(&mut self) {
        lock(&self.shared).op("focus");
    }

    fn set_editable(&mut self, editable: bool) {
        lock(&self.shared).op(format!("set_editable({editable})"));
    }

    fn formatted_output(&mut self) -> String {
        let mut st = lock(&self.shared);
        st.op("formatted_output");
        format!("<formatted>{}</formatted>", st.text.trim_end_matches('\n'))
    }

    fn set_on_key_press(&mut self, handler: KeyHandler) {
        let mut st = lock(&self.shared);
        st.op("set_on_key_press");
        st.key_press = Some(handler);
    }

    fn set_on_key_down(&mut self, handler: KeyHandler) {
        let mut st = lock(&self.shared);
        st.op("set_on_key_down");
        st.key_down = Some(handler);
    }

    fn set_notify_dirty(&mut self, notify: NotifyHandler) {
        let mut st = lock(&self.shared);
        st.op("set_notify_dirty");
        st.notify_dirty = Some(notify);
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) {
        let mut st = lock(&self.shared);
        st.op(format!("set_property({name})"));
        st.props.insert(name.to_string(), value);
    }

    fn set_base_text(&mut self, text: &str) {
        let mut st = lock(&self.shared);
        st.op(format!("set_base_text({text:?})"));
        st.text = text.to_string();
        st.user_edits = 0;
    }

    fn set_base_attributed_text(&mut self, atext: &AttributedText) {
        let mut st = lock(&self.shared);
        st.op(format!("set_base_attributed_text({:?})", atext.text()));
        st.text = atext.text().to_string();
        st.user_edits = 0;
    }

    fn apply_changes_to_base(&mut self, changes: &Changeset, author: Option<&AuthorId>) {
        let author = author.map_or_else(|| "none".to_string(), ToString::to_string);
        lock(&self.shared).op(format!("apply_changes_to_base({changes}, author={author})"));
    }

    fn apply_prepared_changeset_to_base(&mut self, changes: &Changeset) {
        lock(&self.shared).op(format!("apply_prepared_changeset_to_base({changes})"));
    }

    fn set_user_change_notification(&mut self, notify: NotifyHandler) {
        let mut st = lock(&self.shared);
        st.op("set_user_change_notification");
        st.user_change = Some(notify);
    }

    fn set_author_info(&mut self, info: &AuthorInfo) {
        let mut st = lock(&self.shared);
        st.op(format!("set_author_info({})", info.id));
        st.author_info = Some(info.clone());
    }

    fn set_author_selection_range(&mut self, author: &AuthorId, range: SelectionRange) {
        lock(&self.shared).op(format!(
            "set_author_selection_range({author}, {}..{})",
            range.start(),
            range.end()
        ));
    }

    fn execute_command(&mut self, name: &str, args: &[PropertyValue]) {
        let mut st = lock(&self.shared);
        st.op(format!("execute_command({name}, {} args)", args.len()));
        st.user_edits += 1;
    }

    fn replace_range(&mut self, range: SelectionRange, text: &str) {
        let mut st = lock(&self.shared);
        st.op(format!(
            "replace_range({}..{}, {text:?})",
            range.start(),
            range.end()
        ));
        let mut chars: Vec<char> = st.text.chars().collect();
        let start = range.start().min(chars.len());
        let end = range.end().min(chars.len());
        chars.splice(start..end, text.chars());
        st.text = chars.into_iter().collect();
        st.user_edits += 1;
    }

    fn export_text(&self) -> String {
        lock(&self.shared).text.clone()
    }

    fn debug_property(&self, name: &str) -> Option<PropertyValue> {
        lock(&self.shared).props.get(name).cloned()
    }

    fn in_international_composition(&self) -> bool {
        false
    }

    fn prepare_user_changeset(&mut self) -> Option<Changeset> {
        let st = lock(&self.shared);
        if st.user_edits == 0 {
            None
        } else {
            Some(Changeset::new(format!("sim:{}", st.user_edits)))
        }
    }

    fn unhandled_errors(&self) -> Vec<CapturedError> {
        lock(&self.shared).unhandled.clone()
    }

    fn dispose(&mut self) {
        let mut st = lock(&self.shared);
        st.op("dispose");
        st.disposed = true;
    }
}

// ============================================================================
// Document builder
// ============================================================================

/// Builder that records construction order and can be scripted to fail.
pub struct SimBuilder {
    shared: SharedSim,
}

impl DocumentBuilder for SimBuilder {
    fn build_outer(&mut self, ctx: &mut dyn Context) -> Result<(), HostError> {
        let mut st = lock(&self.shared);
        if let SimOutcome::Fail(message) = &st.script.builder {
            return Err(HostError::ContextCreation {
                name: ctx.name().to_string(),
                message: message.clone(),
            });
        }
        st.built.push(format!("outer:{}", ctx.name()));
        Ok(())
    }

    fn build_inner(&mut self, ctx: &mut dyn Context) -> Result<(), HostError> {
        let mut st = lock(&self.shared);
        if let SimOutcome::Fail(message) = &st.script.builder {
            return Err(HostError::ContextCreation {
                name: ctx.name().to_string(),
                message: message.clone(),
            });
        }
        st.built.push(format!("inner:{}", ctx.name()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ContextScript, ReadyVia, SimHost, SimScript, SimSource};
    use crate::context::{DocumentEvent, Host, HostError};
    use crate::signal::Signal;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn scripted_source_fires_after_delay() {
        let script = SimScript {
            outer: ContextScript::via(ReadyVia::WindowLoad)
                .with_delay(Duration::from_millis(40)),
            ..SimScript::default()
        };
        let mut host = SimHost::new(script);
        let mut outer = host.create_outer_context("box", "outer").unwrap();
        let mut signal = outer.window_load();

        let start = tokio::time::Instant::now();
        signal.wait().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_only_sets_probe_without_events() {
        let script = SimScript {
            outer: ContextScript::via(ReadyVia::PollOnly).with_delay(Duration::from_millis(10)),
            ..SimScript::default()
        };
        let mut host = SimHost::new(script);
        let outer = host.create_outer_context("box", "outer").unwrap();
        let probe = outer.ready_probe();

        assert!(!probe());
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(probe());
    }

    #[tokio::test]
    async fn failing_source_reports_error_event() {
        let script = SimScript {
            outer: ContextScript {
                fail_sources: vec![(SimSource::DocumentLoad, "boom".into())],
                ..ContextScript::default()
            },
            ..SimScript::default()
        };
        let mut host = SimHost::new(script);
        let mut outer = host.create_outer_context("box", "outer").unwrap();
        let mut signal = outer.document_signal(DocumentEvent::Load);
        assert!(signal.wait().await.is_err());
    }

    #[tokio::test]
    async fn missing_mount_point_is_an_error() {
        let script = SimScript {
            mount_exists: false,
            ..SimScript::default()
        };
        let mut host = SimHost::new(script);
        let err = host
            .create_outer_context("nope", "outer")
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, HostError::MountMissing(id) if id == "nope"));
    }

    #[tokio::test]
    async fn loader_requires_injected_script() {
        let mut host = SimHost::new(SimScript::default());
        let mut outer = host.create_outer_context("box", "outer").unwrap();
        assert!(matches!(
            outer.module_loader(),
            Err(HostError::LoaderUnavailable(_))
        ));
    }
}
