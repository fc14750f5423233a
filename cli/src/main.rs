//! Inkpad demo binary.
//!
//! Headless walkthrough of the editor lifecycle against the simulated host:
//! operations queued before init, the two-context bootstrap with scripted
//! readiness delays, the queue flush, immediate post-ready calls, destroy.
//!
//! An optional argument names a TOML config file. Run with `RUST_LOG=debug`
//! to watch the readiness races and the dispatch loop.

use std::env;
use std::io::stderr;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use inkpad_editor::{Editor, EditorConfig};
use inkpad_host::sim::{ContextScript, ReadyVia, SimHost, SimScript};
use inkpad_types::{AuthorId, AuthorInfo, SelectionRange};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(stderr)
        .init();
}

fn load_config() -> Result<EditorConfig> {
    match env::args().nth(1) {
        Some(path) => {
            let config =
                EditorConfig::load(&path).with_context(|| format!("loading config from {path}"))?;
            tracing::info!(path = %path, "configuration loaded");
            Ok(config)
        }
        None => Ok(EditorConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = load_config()?;

    // Outer context rescued by a late window load, inner context by the poll
    // fallback alone, so both readiness paths show up in the log.
    let script = SimScript {
        outer: ContextScript::via(ReadyVia::WindowLoad).with_delay(Duration::from_millis(120)),
        inner: ContextScript::via(ReadyVia::PollOnly).with_delay(Duration::from_millis(60)),
        ..SimScript::default()
    };
    let host = SimHost::new(script);
    let editor = Editor::new(Box::new(host.clone()), Box::new(host.builder()), config);

    // Captured now, executed once the surface is up.
    editor.set_property("wraps", serde_json::json!(true))?;
    editor.focus()?;

    println!("before init : {:?}", editor.export_text());
    editor.init("editorbox", "Welcome to Inkpad!\n").await?;
    tracing::info!(state = %editor.bootstrap_state(), "editor ready");
    println!("after init  : {:?}", editor.export_text());

    let formatted = editor.request_formatted_output()?;
    println!("formatted   : {}", formatted.await?);

    // The surface is ready; these run immediately.
    let author = AuthorId::new("a.demo")?;
    editor.set_author_info(
        AuthorInfo::new(author)
            .with_name("Demo")
            .with_color("#ffe64c"),
    )?;
    editor.replace_range(SelectionRange::new(0, 7)?, "Hello")?;
    println!("after edit  : {:?}", editor.export_text());
    if let Some(changes) = editor.prepare_user_changeset() {
        println!("changeset   : {changes}");
    }

    editor.destroy()?;
    println!("state       : {}", editor.bootstrap_state());

    println!("\nrecorded backend operations:");
    for op in host.ops() {
        println!("  {op}");
    }

    Ok(())
}
