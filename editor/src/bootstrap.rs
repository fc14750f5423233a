//! The bootstrap sequence.
//!
//! Stands up the editing surface in four stages, each gated on the previous:
//!
//! 1. Create the outer context in the mount point, race its readiness
//!    sources, build its document.
//! 2. Create the inner context nested in the outer one, same treatment.
//! 3. Inject the module-loader script into the inner context, wait for its
//!    load signal, configure the loader, bind the module globals.
//! 4. Adopt plugins from ancestor contexts, wait for them, then initialize
//!    the inner-editor module into a live backend.
//!
//! There is no rollback: a failed stage leaves the committed contexts where
//! they are and the caller's `destroy` tears them down.

use std::time::Instant;

use tracing::{debug, info};

use inkpad_host::{
    Context, DocumentBuilder, DocumentEvent, EditorBackend, Host, ModuleLoader, Signal,
};
use inkpad_types::BootstrapState;

use crate::config::EditorConfig;
use crate::error::InitError;
use crate::ready::{PollSignal, race_ready};

/// Name given to the outer shell context.
pub const OUTER_CONTEXT: &str = "inkpad_outer";
/// Name given to the inner editing-surface context.
pub const INNER_CONTEXT: &str = "inkpad_inner";

/// Working state of one bootstrap attempt.
///
/// Contexts are committed into the slots the moment they exist, before any
/// await, so the caller can reach them for teardown no matter where a later
/// stage fails.
pub(crate) struct Bootstrap<'a> {
    config: &'a EditorConfig,
    builder: &'a mut dyn DocumentBuilder,
    pub(crate) outer: Option<Box<dyn Context>>,
    pub(crate) inner: Option<Box<dyn Context>>,
}

impl<'a> Bootstrap<'a> {
    pub(crate) fn new(config: &'a EditorConfig, builder: &'a mut dyn DocumentBuilder) -> Self {
        Self {
            config,
            builder,
            outer: None,
            inner: None,
        }
    }

    /// Runs every stage and returns the live backend. `advance` is invoked
    /// at each stage boundary; the caller mirrors it into its public state.
    pub(crate) async fn run(
        &mut self,
        host: &mut dyn Host,
        mount_id: &str,
        advance: &mut dyn FnMut(BootstrapState),
    ) -> Result<Box<dyn EditorBackend>, InitError> {
        let started = Instant::now();

        advance(BootstrapState::AwaitingOuterContext);
        let outer = self
            .outer
            .insert(host.create_outer_context(mount_id, OUTER_CONTEXT)?);
        await_context_ready(self.config, "outer", outer.as_mut()).await?;
        self.builder.build_outer(outer.as_mut())?;

        advance(BootstrapState::AwaitingInnerContext);
        let inner = self.inner.insert(outer.create_nested(INNER_CONTEXT)?);
        await_context_ready(self.config, "inner", inner.as_mut()).await?;
        self.builder.build_inner(inner.as_mut())?;

        advance(BootstrapState::AwaitingModuleHandshake);
        let mut loader = module_handshake(self.config, inner.as_mut()).await?;

        advance(BootstrapState::AwaitingDependencies);
        let backend = resolve_dependencies(loader.as_mut()).await?;

        info!(mount = mount_id, elapsed = ?started.elapsed(), "bootstrap complete");
        Ok(backend)
    }
}

/// The six readiness sources raced for a fresh context: the four lifecycle
/// events, the ready-state change gated on the probe (it also fires for
/// intermediate states), and the poll fallback.
fn readiness_signals(config: &EditorConfig, ctx: &mut dyn Context) -> Vec<Box<dyn Signal>> {
    let gate = ctx.ready_probe();
    let poll = ctx.ready_probe();
    vec![
        Box::new(ctx.container_load()),
        Box::new(ctx.window_load()),
        Box::new(ctx.document_signal(DocumentEvent::Load)),
        Box::new(ctx.document_signal(DocumentEvent::ContentLoaded)),
        Box::new(
            ctx.document_signal(DocumentEvent::ReadyStateChange)
                .with_gate(gate),
        ),
        Box::new(PollSignal::new(
            format!("{}:poll", ctx.name()),
            poll,
            config.poll_interval(),
            config.ready_timeout(),
        )),
    ]
}

async fn await_context_ready(
    config: &EditorConfig,
    which: &'static str,
    ctx: &mut dyn Context,
) -> Result<(), InitError> {
    let mut signals = readiness_signals(config, ctx);
    let started = Instant::now();
    race_ready(which, &mut signals)
        .await
        .map_err(|e| InitError::readiness(which, e))?;
    debug!(context = ctx.name(), elapsed = ?started.elapsed(), "context ready");
    Ok(())
}

/// Gets the module loader running inside the inner context: prefetch module
/// scripts, inject the loader, wait for its load signal, then point it at the
/// configured roots and bind the module globals.
async fn module_handshake(
    config: &EditorConfig,
    inner: &mut dyn Context,
) -> Result<Box<dyn ModuleLoader>, InitError> {
    for src in config.module_prefetch_urls()? {
        inner.prefetch(&src);
    }

    let src = config.loader_script_url()?;
    debug!(src = %src, "injecting module loader");
    let mut load = inner.inject_script(&src)?;
    load.wait().await.map_err(InitError::ScriptLoad)?;

    let mut loader = inner.module_loader()?;
    loader.configure(&config.loader_settings()?)?;
    // The editor module resolves first so its fetch starts before the
    // plugin registry's; the DOM alias comes last.
    loader.resolve_global(&config.editor_binding, &config.editor_module)?;
    loader.resolve_global(&config.plugins_binding, &config.plugins_module)?;
    loader.resolve_global(&config.dom_binding, &config.dom_module)?;
    Ok(loader)
}

async fn resolve_dependencies(
    loader: &mut dyn ModuleLoader,
) -> Result<Box<dyn EditorBackend>, InitError> {
    let mut plugins = loader.plugin_registry()?;
    plugins.adopt_from_ancestors();
    plugins.ensure().await?;
    debug!("plugins ready");

    let mut module = loader.editor_module()?;
    let backend = module.init().await?;
    debug!("inner editor module initialized");
    Ok(backend)
}
