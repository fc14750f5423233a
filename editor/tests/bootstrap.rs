//! Integration tests for the editor facade over the sim host.
//!
//! These drive the public API through the full lifecycle: readiness races
//! per source, the poll-only rescue, queue capture and flush, post-ready
//! immediacy, every bootstrap failure kind, and destroy at each stage.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{Instant, sleep};

use inkpad_editor::{ConfigError, Editor, EditorConfig, EditorError, InitError, OUTER_CONTEXT};
use inkpad_host::{HostError, SignalError};
use inkpad_host::sim::{ContextScript, ReadyVia, SimHost, SimOutcome, SimScript};
use inkpad_types::{AuthorId, AuthorInfo, BootstrapState, KeyEvent, SelectionRange};

const AWAITING_INIT: &str = "(awaiting init)\n";

fn sim_editor(script: SimScript) -> (SimHost, Editor) {
    let host = SimHost::new(script);
    let editor = Editor::new(
        Box::new(host.clone()),
        Box::new(host.builder()),
        EditorConfig::default(),
    );
    (host, editor)
}

fn delayed_script(via: ReadyVia, delay: Duration) -> SimScript {
    SimScript {
        outer: ContextScript::via(via).with_delay(delay),
        inner: ContextScript::via(via).with_delay(delay),
        ..SimScript::default()
    }
}

// ============================================================================
// Readiness paths
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_every_event_source_can_rescue_a_context() {
    let sources = [
        ReadyVia::ContainerLoad,
        ReadyVia::WindowLoad,
        ReadyVia::DocumentLoad,
        ReadyVia::ContentLoaded,
    ];
    for via in sources {
        let (_host, editor) = sim_editor(delayed_script(via, Duration::from_millis(25)));
        let started = Instant::now();
        editor.init("editorbox", "ready\n").await.unwrap();
        assert_eq!(editor.bootstrap_state(), BootstrapState::Ready);
        // 25ms per context, two contexts back to back.
        assert_eq!(started.elapsed(), Duration::from_millis(50), "{via:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_premature_ready_state_change_is_gated_out() {
    // The sim fires one ready-state event immediately (probe still false)
    // and the real one at the deadline. Only the second may settle the race.
    let script = delayed_script(ReadyVia::ReadyStateChange, Duration::from_millis(30));
    let (_host, editor) = sim_editor(script);
    let started = Instant::now();
    editor.init("editorbox", "ready\n").await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_millis(60));
    assert_eq!(editor.bootstrap_state(), BootstrapState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_poll_fallback_rescues_a_host_without_events() {
    let script = delayed_script(ReadyVia::PollOnly, Duration::from_millis(42));
    let (host, editor) = sim_editor(script);
    let started = Instant::now();
    editor.init("editorbox", "ready\n").await.unwrap();
    // Probe turns true at 42ms; the 10ms poll sees it at 50ms. Same again
    // for the inner context.
    assert_eq!(started.elapsed(), Duration::from_millis(100));

    // Settling the race cancels every event signal exactly once.
    for (label, count) in host.cancel_counts(OUTER_CONTEXT) {
        assert_eq!(count, 1, "{label} cancelled {count} times");
    }
}

#[tokio::test(start_paused = true)]
async fn test_readiness_timeout_reports_context_and_waited() {
    let script = SimScript {
        outer: ContextScript::via(ReadyVia::Never),
        ..SimScript::default()
    };
    let (host, editor) = sim_editor(script);
    let err = editor.init("editorbox", "never\n").await.unwrap_err();
    match err {
        InitError::ReadinessTimeout {
            context: "outer",
            waited,
        } => {
            // The 10ms poll notices the expired 5000ms deadline one
            // interval late.
            assert_eq!(waited, Duration::from_millis(5010));
        }
        other => panic!("expected readiness timeout, got {other:?}"),
    }
    assert_eq!(
        editor.bootstrap_state(),
        BootstrapState::AwaitingOuterContext
    );
    assert!(host.ops().is_empty(), "queue must not flush after a failure");
}

// ============================================================================
// Queue semantics
// ============================================================================

#[tokio::test]
async fn test_deferred_calls_flush_in_capture_order_exactly_once() {
    let (host, editor) = sim_editor(SimScript::default());
    editor.import_text("a\n").unwrap();
    editor.focus().unwrap();
    editor.import_text("b\n").unwrap();
    editor.init("editorbox", "seed\n").await.unwrap();

    assert_eq!(
        host.ops(),
        [
            "import_text(\"a\\n\")",
            "focus",
            "import_text(\"b\\n\")",
            "import_text(\"seed\\n\")",
        ]
    );
    assert_eq!(editor.export_text(), "seed\n");
}

#[tokio::test(start_paused = true)]
async fn test_calls_queued_during_bootstrap_land_after_the_import() {
    let script = delayed_script(ReadyVia::WindowLoad, Duration::from_millis(20));
    let (host, editor) = sim_editor(script);

    let handle = editor.clone();
    let queuer = tokio::spawn(async move {
        sleep(Duration::from_millis(5)).await;
        handle.focus().unwrap();
        handle.set_editable(false).unwrap();
    });

    editor.init("editorbox", "seed\n").await.unwrap();
    queuer.await.unwrap();

    assert_eq!(
        host.ops(),
        [
            "import_text(\"seed\\n\")",
            "focus",
            "set_editable(false)",
        ]
    );
}

#[tokio::test]
async fn test_post_ready_calls_execute_immediately() {
    let (host, editor) = sim_editor(SimScript::default());
    editor.init("editorbox", "seed\n").await.unwrap();

    let before = host.ops().len();
    editor.set_editable(false).unwrap();
    // Observable before anything else runs: no await between call and check.
    let ops = host.ops();
    assert_eq!(ops.len(), before + 1);
    assert_eq!(ops.last().map(String::as_str), Some("set_editable(false)"));
}

#[tokio::test]
async fn test_formatted_output_captures_the_text_at_its_queue_position() {
    let (_host, editor) = sim_editor(SimScript::default());
    editor.import_text("draft\n").unwrap();
    let rx = editor.request_formatted_output().unwrap();
    editor.init("editorbox", "final\n").await.unwrap();
    // The request ran between the two imports, so it saw the draft.
    assert_eq!(rx.await.unwrap(), "<formatted>draft</formatted>");
    assert_eq!(editor.export_text(), "final\n");
}

#[tokio::test]
async fn test_reentrant_calls_from_a_scope_run_after_the_batch() {
    let (host, editor) = sim_editor(SimScript::default());
    editor.init("editorbox", "seed\n").await.unwrap();

    let handle = editor.clone();
    editor
        .with_editor(move |backend| {
            backend.set_editable(false);
            // The backend is checked out right now; this lands in the queue
            // and runs on the next dispatch pass.
            handle.focus().unwrap();
        })
        .unwrap();

    let ops = host.ops();
    assert_eq!(&ops[ops.len() - 2..], ["set_editable(false)", "focus"]);
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_queries_default_before_ready_and_delegate_after() {
    let (host, editor) = sim_editor(SimScript::default());
    host.push_unhandled_error("late script blew up");

    assert_eq!(editor.export_text(), AWAITING_INIT);
    assert_eq!(editor.debug_property("wraps"), None);
    assert!(!editor.in_international_composition());
    assert_eq!(editor.prepare_user_changeset(), None);
    assert!(editor.unhandled_errors().is_empty());

    editor.set_property("wraps", serde_json::json!(true)).unwrap();
    editor.init("editorbox", "seed\n").await.unwrap();

    assert_eq!(editor.export_text(), "seed\n");
    assert_eq!(editor.debug_property("wraps"), Some(serde_json::json!(true)));
    assert_eq!(editor.unhandled_errors().len(), 1);
    assert_eq!(editor.unhandled_errors()[0].message(), "late script blew up");
}

#[tokio::test]
async fn test_prepare_user_changeset_reflects_edits() {
    let (_host, editor) = sim_editor(SimScript::default());
    editor.init("editorbox", "seed\n").await.unwrap();
    assert_eq!(editor.prepare_user_changeset(), None);

    editor
        .replace_range(SelectionRange::new(0, 4).unwrap(), "crop")
        .unwrap();
    let changes = editor.prepare_user_changeset().unwrap();
    assert_eq!(changes.as_str(), "sim:1");
    assert_eq!(editor.export_text(), "crop\n");
}

// ============================================================================
// Handlers and author state
// ============================================================================

#[tokio::test]
async fn test_key_handler_installed_through_the_queue() {
    let (host, editor) = sim_editor(SimScript::default());
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    editor
        .set_on_key_press(move |ev| sink.lock().unwrap().push(ev.key))
        .unwrap();

    assert!(
        !host.press_key(KeyEvent::plain("a")),
        "no handler before the flush"
    );
    editor.init("editorbox", "seed\n").await.unwrap();
    assert!(host.press_key(KeyEvent::plain("Enter")));
    assert_eq!(seen.lock().unwrap().as_slice(), ["Enter"]);
}

#[tokio::test]
async fn test_key_handler_can_call_back_into_the_editor() {
    let (host, editor) = sim_editor(SimScript::default());
    editor.init("editorbox", "seed\n").await.unwrap();

    let reentrant = editor.clone();
    editor
        .set_on_key_press(move |_| reentrant.focus().unwrap())
        .unwrap();

    assert!(host.press_key(KeyEvent::plain("Enter")));
    assert_eq!(
        host.ops(),
        ["import_text(\"seed\\n\")", "set_on_key_press", "focus"]
    );

    // The handler stays installed after re-entering.
    assert!(host.press_key(KeyEvent::plain("Enter")));
    assert_eq!(host.ops().iter().filter(|op| *op == "focus").count(), 2);
}

#[tokio::test]
async fn test_author_state_reaches_the_backend() {
    let (host, editor) = sim_editor(SimScript::default());
    let author = AuthorId::new("a.42").unwrap();
    let info = AuthorInfo::new(author.clone())
        .with_name("Mina")
        .with_color("#2b6");

    editor.set_author_info(info).unwrap();
    editor
        .set_author_selection_range(author, SelectionRange::new(1, 4).unwrap())
        .unwrap();
    editor.init("editorbox", "words\n").await.unwrap();

    let recorded = host.last_author_info().unwrap();
    assert_eq!(recorded.name.as_deref(), Some("Mina"));
    assert!(
        host.ops()
            .iter()
            .any(|op| op == "set_author_selection_range(a.42, 1..4)")
    );
}

// ============================================================================
// Failure kinds
// ============================================================================

#[tokio::test]
async fn test_script_load_failure_aborts_the_handshake() {
    let script = SimScript {
        script_load: SimOutcome::Fail("404 not found".to_string()),
        ..SimScript::default()
    };
    let (host, editor) = sim_editor(script);
    let err = editor.init("editorbox", "seed\n").await.unwrap_err();
    assert!(matches!(
        err,
        InitError::ScriptLoad(SignalError::Source { .. })
    ));
    assert_eq!(
        editor.bootstrap_state(),
        BootstrapState::AwaitingModuleHandshake
    );
    assert_eq!(host.injected_scripts().len(), 1);
    assert!(host.ops().is_empty());
}

#[tokio::test]
async fn test_missing_module_aborts_the_handshake() {
    let script = SimScript {
        missing_modules: vec!["client_plugins".to_string()],
        ..SimScript::default()
    };
    let (host, editor) = sim_editor(script);
    match editor.init("editorbox", "seed\n").await.unwrap_err() {
        InitError::Host(HostError::ModuleMissing(name)) => assert_eq!(name, "client_plugins"),
        other => panic!("expected missing-module error, got {other:?}"),
    }
    assert_eq!(
        editor.bootstrap_state(),
        BootstrapState::AwaitingModuleHandshake
    );
    // The editor module resolves before the registry module is requested.
    assert_eq!(
        host.resolved_bindings(),
        [("EditorInner".to_string(), "editor_inner".to_string())]
    );
    assert!(host.ops().is_empty());
}

#[tokio::test]
async fn test_plugin_failure_is_a_dependency_error() {
    let script = SimScript {
        plugins: SimOutcome::Fail("hook never resolved".to_string()),
        ..SimScript::default()
    };
    let (host, editor) = sim_editor(script);
    match editor.init("editorbox", "seed\n").await.unwrap_err() {
        InitError::Dependency(dep) => assert_eq!(dep.name, "plugins"),
        other => panic!("expected dependency error, got {other:?}"),
    }
    assert_eq!(
        editor.bootstrap_state(),
        BootstrapState::AwaitingDependencies
    );
    assert!(host.ops().is_empty(), "queue stays captive after failure");
}

#[tokio::test]
async fn test_editor_module_failure_is_a_dependency_error() {
    let script = SimScript {
        editor_init: SimOutcome::Fail("no export".to_string()),
        ..SimScript::default()
    };
    let (host, editor) = sim_editor(script);
    match editor.init("editorbox", "seed\n").await.unwrap_err() {
        InitError::Dependency(dep) => assert_eq!(dep.name, "inner_editor"),
        other => panic!("expected dependency error, got {other:?}"),
    }
    assert!(!host.disposed(), "no backend ever existed");
}

#[tokio::test]
async fn test_missing_mount_point_fails_before_any_race() {
    let script = SimScript {
        mount_exists: false,
        ..SimScript::default()
    };
    let (_host, editor) = sim_editor(script);
    let err = editor.init("gone", "seed\n").await.unwrap_err();
    assert!(matches!(err, InitError::Host(_)));
    assert_eq!(
        editor.bootstrap_state(),
        BootstrapState::AwaitingOuterContext
    );
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_the_host_is_touched() {
    let host = SimHost::new(SimScript::default());
    let config = EditorConfig {
        poll_interval_ms: 0,
        ..EditorConfig::default()
    };
    let editor = Editor::new(Box::new(host.clone()), Box::new(host.builder()), config);

    let err = editor.init("editorbox", "seed\n").await.unwrap_err();
    assert!(matches!(
        err,
        InitError::Config(ConfigError::ZeroPollInterval)
    ));
    assert_eq!(editor.bootstrap_state(), BootstrapState::Uninitialized);
    assert_eq!(host.mounted_at(), None);
    assert!(host.ops().is_empty());
}

// ============================================================================
// Destroy
// ============================================================================

#[tokio::test]
async fn test_destroy_after_ready_disposes_and_detaches() {
    let (host, editor) = sim_editor(SimScript::default());
    editor.init("editorbox", "seed\n").await.unwrap();

    editor.destroy().unwrap();
    assert!(host.disposed());
    assert_eq!(host.detached(), [OUTER_CONTEXT.to_string()]);
    assert_eq!(editor.bootstrap_state(), BootstrapState::Destroyed);

    // Everything fails fast from here on.
    assert_eq!(editor.focus(), Err(EditorError::Destroyed));
    assert!(matches!(
        editor.request_formatted_output(),
        Err(EditorError::Destroyed)
    ));
    assert!(matches!(editor.destroy(), Err(EditorError::Destroyed)));
    assert_eq!(editor.export_text(), AWAITING_INIT);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_during_bootstrap_runs_at_its_queue_position() {
    let script = delayed_script(ReadyVia::WindowLoad, Duration::from_millis(20));
    let (host, editor) = sim_editor(script);

    let handle = editor.clone();
    let queuer = tokio::spawn(async move {
        sleep(Duration::from_millis(5)).await;
        handle.focus().unwrap();
        handle.destroy().unwrap();
        // Accepted (nothing is destroyed yet), then dropped by the flush.
        handle.set_editable(true).unwrap();
    });

    editor.init("editorbox", "seed\n").await.unwrap();
    queuer.await.unwrap();

    assert_eq!(
        host.ops(),
        ["import_text(\"seed\\n\")", "focus", "dispose"]
    );
    assert!(host.disposed());
    assert_eq!(host.detached(), [OUTER_CONTEXT.to_string()]);
    assert_eq!(editor.bootstrap_state(), BootstrapState::Destroyed);
    assert_eq!(editor.focus(), Err(EditorError::Destroyed));
}

#[tokio::test(start_paused = true)]
async fn test_destroy_during_failed_bootstrap_still_tears_down() {
    let script = SimScript {
        outer: ContextScript::via(ReadyVia::WindowLoad).with_delay(Duration::from_millis(20)),
        plugins: SimOutcome::Fail("hook never resolved".to_string()),
        ..SimScript::default()
    };
    let (host, editor) = sim_editor(script);

    let handle = editor.clone();
    let queuer = tokio::spawn(async move {
        sleep(Duration::from_millis(5)).await;
        handle.destroy().unwrap();
    });

    let err = editor.init("editorbox", "seed\n").await.unwrap_err();
    queuer.await.unwrap();

    assert!(matches!(err, InitError::Dependency(_)));
    assert!(!host.disposed(), "no backend existed to dispose");
    assert_eq!(host.detached(), [OUTER_CONTEXT.to_string()]);
    assert_eq!(editor.bootstrap_state(), BootstrapState::Destroyed);
}

#[tokio::test]
async fn test_destroy_after_failed_init_detaches_the_outer_context() {
    let script = SimScript {
        plugins: SimOutcome::Fail("hook never resolved".to_string()),
        ..SimScript::default()
    };
    let (host, editor) = sim_editor(script);
    editor.init("editorbox", "seed\n").await.unwrap_err();
    assert!(host.detached().is_empty(), "failure alone must not detach");

    editor.destroy().unwrap();
    assert_eq!(host.detached(), [OUTER_CONTEXT.to_string()]);
    assert_eq!(editor.bootstrap_state(), BootstrapState::Destroyed);
    assert!(matches!(
        editor.init("editorbox", "again\n").await,
        Err(InitError::Destroyed)
    ));
}
