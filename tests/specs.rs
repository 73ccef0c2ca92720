// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end specs for the Automa workflow runtime.

use automa_engine::{
    Args, ArgsMappingRule, AutomaError, BoundArgs, Event, GraphAutoma, InputArgs,
    InteractionFeedback, ResultDispatchingRule, Signature, Snapshot, SystemTag, WorkerOptions,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn add_fn(automa: &GraphAutoma, key: &str, options: WorkerOptions, f: fn(i64) -> i64) {
    automa
        .add_async_fn_worker(
            key,
            Signature::new().required("x"),
            move |args: BoundArgs, _cx| async move {
                let x = args.get("x")?.as_i64().unwrap_or(0);
                Ok(json!(f(x)))
            },
            options,
        )
        .unwrap();
}

// ---------------------------------------------------------------------------
// S1: linear pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn linear_pipeline() {
    let automa = GraphAutoma::new("s1");
    add_fn(&automa, "a", WorkerOptions::new().start(), |x| x + 1);
    add_fn(&automa, "b", WorkerOptions::new().depends_on(["a"]), |x| x * 2);
    add_fn(
        &automa,
        "c",
        WorkerOptions::new().depends_on(["b"]).output(),
        |x| x - 3,
    );

    let result = automa
        .arun(InputArgs::new().kwarg("x", json!(5)))
        .await
        .unwrap();
    assert_eq!(result, json!(9));
}

// ---------------------------------------------------------------------------
// S2: fan-out / fan-in with MERGE
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fan_out_fan_in_with_merge() {
    let automa = GraphAutoma::new("s2");
    add_fn(&automa, "start", WorkerOptions::new().start(), |x| x);
    add_fn(&automa, "f1", WorkerOptions::new().depends_on(["start"]), |x| x + 1);
    add_fn(&automa, "f2", WorkerOptions::new().depends_on(["start"]), |x| x + 2);
    add_fn(&automa, "f3", WorkerOptions::new().depends_on(["start"]), |x| x + 3);
    automa
        .add_async_fn_worker(
            "end",
            Signature::new().required("values"),
            |args: BoundArgs, _cx| async move {
                let sum: i64 = args
                    .get("values")?
                    .as_array()
                    .map(|values| values.iter().filter_map(Value::as_i64).sum())
                    .unwrap_or(0);
                Ok(json!(sum))
            },
            WorkerOptions::new()
                .depends_on(["f1", "f2", "f3"])
                .args_mapping(ArgsMappingRule::Merge)
                .output(),
        )
        .unwrap();

    let result = automa
        .arun(InputArgs::new().kwarg("x", json!(10)))
        .await
        .unwrap();
    assert_eq!(result, json!(36));
}

// ---------------------------------------------------------------------------
// S3: UNPACK
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unpack_mapping_into_named_parameters() {
    let automa = GraphAutoma::new("s3");
    automa
        .add_async_fn_worker(
            "p",
            Signature::new(),
            |_args: BoundArgs, _cx| async { Ok(json!({"a": 1, "b": 2, "c": 3})) },
            WorkerOptions::new().start(),
        )
        .unwrap();
    automa
        .add_async_fn_worker(
            "q",
            Signature::new().required("a").required("b").required("c"),
            |args: BoundArgs, _cx| async move {
                let total = args.get("a")?.as_i64().unwrap_or(0)
                    + args.get("b")?.as_i64().unwrap_or(0)
                    + args.get("c")?.as_i64().unwrap_or(0);
                Ok(json!(total))
            },
            WorkerOptions::new()
                .depends_on(["p"])
                .args_mapping(ArgsMappingRule::Unpack)
                .output(),
        )
        .unwrap();

    let result = automa.arun(InputArgs::new()).await.unwrap();
    assert_eq!(result, json!(6));
}

#[tokio::test]
async fn unpack_of_a_scalar_is_a_mapping_error() {
    let automa = GraphAutoma::new("s3-error");
    automa
        .add_async_fn_worker(
            "p",
            Signature::new(),
            |_args: BoundArgs, _cx| async { Ok(json!(42)) },
            WorkerOptions::new().start(),
        )
        .unwrap();
    automa
        .add_async_fn_worker(
            "q",
            Signature::new().required("a"),
            |args: BoundArgs, _cx| async move { args.get("a") },
            WorkerOptions::new()
                .depends_on(["p"])
                .args_mapping(ArgsMappingRule::Unpack)
                .output(),
        )
        .unwrap();

    let err = automa.arun(InputArgs::new()).await.unwrap_err();
    assert!(matches!(err, AutomaError::ArgsMapping { .. }));
}

// ---------------------------------------------------------------------------
// S4: From descriptor across a non-dependency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn from_descriptor_reads_a_non_dependency_output() {
    let automa = GraphAutoma::new("s4");
    add_fn(&automa, "w0", WorkerOptions::new().start(), |x| x + 1);
    add_fn(&automa, "w1", WorkerOptions::new().depends_on(["w0"]), |x| x + 1);
    automa
        .add_async_fn_worker(
            "w2",
            Signature::new().required("x").from_worker("y", "w0"),
            |args: BoundArgs, _cx| async move {
                let x = args.get("x")?.as_i64().unwrap_or(0);
                let y = args.get("y")?.as_i64().unwrap_or(0);
                Ok(json!(x + y))
            },
            WorkerOptions::new().depends_on(["w1"]).output(),
        )
        .unwrap();

    let result = automa
        .arun(InputArgs::new().kwarg("x", json!(1)))
        .await
        .unwrap();
    assert_eq!(result, json!(5));
}

// ---------------------------------------------------------------------------
// S5: HITL round trip through a serialized snapshot
// ---------------------------------------------------------------------------

fn hitl_graph() -> GraphAutoma {
    let automa = GraphAutoma::new("s5");
    add_fn(&automa, "start", WorkerOptions::new().start(), |x| x + 1);
    automa
        .add_async_fn_worker(
            "ask",
            Signature::new().required("x"),
            |args: BoundArgs, cx| async move {
                let x = args.get("x")?.as_i64().unwrap_or(0);
                let feedback = cx.interact_with_human(Event::typed(
                    "confirm",
                    json!({"prompt_to_user": format!("value is {x}, add 100?")}),
                ))?;
                if feedback.data == json!("yes") {
                    Ok(json!(x + 100))
                } else {
                    Ok(json!(x))
                }
            },
            WorkerOptions::new().depends_on(["start"]).output(),
        )
        .unwrap();
    automa
}

#[tokio::test]
async fn hitl_snapshot_resumes_both_branches() {
    let automa = hitl_graph();
    let err = automa
        .arun(InputArgs::new().kwarg("x", json!(5)))
        .await
        .unwrap_err();
    let AutomaError::Interaction(exception) = err else {
        panic!("expected an interaction pause");
    };
    assert_eq!(exception.interactions.len(), 1);
    let interaction = exception.interactions[0].clone();
    assert_eq!(interaction.event.event_type.as_deref(), Some("confirm"));

    // Persist and restore the snapshot twice, once per branch.
    let bytes = exception.snapshot.serialized_bytes.clone();
    let version = exception.snapshot.serialization_version.clone();

    let yes_branch = hitl_graph();
    yes_branch
        .load_snapshot(&Snapshot::from_parts(bytes.clone(), version.clone()))
        .unwrap();
    let result = yes_branch
        .resume(vec![InteractionFeedback::new(
            interaction.interaction_id.clone(),
            json!("yes"),
        )])
        .await
        .unwrap();
    assert_eq!(result, json!(106));

    let no_branch = hitl_graph();
    no_branch
        .load_snapshot(&Snapshot::from_parts(bytes, version))
        .unwrap();
    let result = no_branch
        .resume(vec![InteractionFeedback::new(
            interaction.interaction_id,
            json!("no"),
        )])
        .await
        .unwrap();
    assert_eq!(result, json!(6));
}

#[tokio::test]
async fn sequential_interaction_sites_replay_in_order() {
    let build = || {
        let automa = GraphAutoma::new("s5-multi");
        automa
            .add_async_fn_worker(
                "ask",
                Signature::new().required("x"),
                |args: BoundArgs, cx| async move {
                    let mut x = args.get("x")?.as_i64().unwrap_or(0);
                    for (label, delta) in [("first", 20), ("second", 30)] {
                        let feedback = cx.interact_with_human(Event::typed(
                            label,
                            json!(format!("value is {x}")),
                        ))?;
                        if feedback.data == json!("yes") {
                            x += delta;
                        }
                    }
                    Ok(json!(x))
                },
                WorkerOptions::new().start().output(),
            )
            .unwrap();
        automa
    };

    let automa = build();
    let err = automa
        .arun(InputArgs::new().kwarg("x", json!(10)))
        .await
        .unwrap_err();
    let AutomaError::Interaction(first) = err else {
        panic!("expected the first pause");
    };
    assert_eq!(first.interactions.len(), 1);
    assert_eq!(first.interactions[0].event.event_type.as_deref(), Some("first"));

    let err = automa
        .resume(vec![InteractionFeedback::new(
            first.interactions[0].interaction_id.clone(),
            json!("yes"),
        )])
        .await
        .unwrap_err();
    let AutomaError::Interaction(second) = err else {
        panic!("expected the second pause");
    };
    assert_eq!(
        second.interactions[0].event.event_type.as_deref(),
        Some("second")
    );
    // The first site's answer already applied: the prompt sees 30.
    assert_eq!(second.interactions[0].event.data, json!("value is 30"));

    let result = automa
        .resume(vec![InteractionFeedback::new(
            second.interactions[0].interaction_id.clone(),
            json!("no"),
        )])
        .await
        .unwrap();
    assert_eq!(result, json!(30));
}

#[tokio::test]
async fn parallel_interactions_are_batched_into_one_pause() {
    let automa = GraphAutoma::new("s5-parallel");
    add_fn(&automa, "start", WorkerOptions::new().start(), |x| x);
    for key in ["ask_1", "ask_2"] {
        automa
            .add_async_fn_worker(
                key,
                Signature::new().required("x"),
                |args: BoundArgs, cx| async move {
                    let x = args.get("x")?.as_i64().unwrap_or(0);
                    let feedback =
                        cx.interact_with_human(Event::typed("if_add", json!("add?")))?;
                    if feedback.data == json!("yes") {
                        Ok(json!(x + 100))
                    } else {
                        Ok(json!(x))
                    }
                },
                WorkerOptions::new().depends_on(["start"]),
            )
            .unwrap();
    }
    automa
        .add_async_fn_worker(
            "end",
            Signature::new().required("a").required("b"),
            |args: BoundArgs, _cx| async move {
                Ok(json!(
                    args.get("a")?.as_i64().unwrap_or(0) + args.get("b")?.as_i64().unwrap_or(0)
                ))
            },
            WorkerOptions::new().depends_on(["ask_1", "ask_2"]).output(),
        )
        .unwrap();

    let err = automa
        .arun(InputArgs::new().kwarg("x", json!(1)))
        .await
        .unwrap_err();
    let AutomaError::Interaction(exception) = err else {
        panic!("expected an interaction pause");
    };
    assert_eq!(exception.interactions.len(), 2);

    let feedbacks = vec![
        InteractionFeedback::new(exception.interactions[0].interaction_id.clone(), json!("yes")),
        InteractionFeedback::new(exception.interactions[1].interaction_id.clone(), json!("no")),
    ];
    let result = automa.resume(feedbacks).await.unwrap();
    assert_eq!(result, json!(101 + 1));
}

// ---------------------------------------------------------------------------
// S6: dynamic topology
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dynamic_topology_matches_its_final_shape() {
    let automa = GraphAutoma::new("s6");
    automa
        .add_async_fn_worker(
            "start",
            Signature::new().required("x"),
            |args: BoundArgs, cx| async move {
                let x = args.get("x")?.as_i64().unwrap_or(0);
                let adder = |args: BoundArgs, _cx| async move {
                    Ok(json!(args.get("x")?.as_i64().unwrap_or(0) * 2))
                };
                cx.add_async_fn_worker(
                    "b",
                    Signature::new().required("x"),
                    adder,
                    WorkerOptions::new(),
                )?;
                cx.remove_worker("b");
                cx.add_async_fn_worker(
                    "b",
                    Signature::new().required("x"),
                    adder,
                    WorkerOptions::new().depends_on(["start"]),
                )?;
                cx.add_async_fn_worker(
                    "c",
                    Signature::new().required("x"),
                    |args: BoundArgs, _cx| async move {
                        Ok(json!(args.get("x")?.as_i64().unwrap_or(0) - 3))
                    },
                    WorkerOptions::new().depends_on(["b"]),
                )?;
                cx.set_output_worker("c");
                Ok(json!(x + 1))
            },
            WorkerOptions::new().start(),
        )
        .unwrap();

    // Same arithmetic as the linear pipeline: ((5 + 1) * 2) - 3.
    let result = automa
        .arun(InputArgs::new().kwarg("x", json!(5)))
        .await
        .unwrap();
    assert_eq!(result, json!(9));
    assert_eq!(automa.all_workers(), vec!["start", "b", "c"]);
}

// ---------------------------------------------------------------------------
// Distribute across start workers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn distribute_feeds_start_workers_elementwise() {
    let automa = GraphAutoma::new("distribute");
    add_fn(&automa, "s1", WorkerOptions::new().start(), |x| x * 10);
    add_fn(&automa, "s2", WorkerOptions::new().start(), |x| x * 100);
    automa
        .add_async_fn_worker(
            "end",
            Signature::new().required("values"),
            |args: BoundArgs, _cx| async move { args.get("values") },
            WorkerOptions::new()
                .depends_on(["s1", "s2"])
                .args_mapping(ArgsMappingRule::Merge)
                .output(),
        )
        .unwrap();

    let result = automa
        .arun(InputArgs::new().distribute_kwarg("x", vec![json!(1), json!(2)]))
        .await
        .unwrap();
    assert_eq!(result, json!([10, 200]));
}

// ---------------------------------------------------------------------------
// IN_ORDER result dispatching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn in_order_length_mismatch_fails_the_run() {
    let automa = GraphAutoma::new("in-order-mismatch");
    automa
        .add_async_fn_worker(
            "producer",
            Signature::new(),
            |_args: BoundArgs, _cx| async { Ok(json!([1, 2, 3])) },
            WorkerOptions::new()
                .start()
                .result_dispatching(ResultDispatchingRule::InOrder),
        )
        .unwrap();
    add_fn(&automa, "only", WorkerOptions::new().depends_on(["producer"]).output(), |x| x);

    let err = automa.arun(InputArgs::new()).await.unwrap_err();
    assert!(matches!(err, AutomaError::ArgsMapping { .. }));
}

// ---------------------------------------------------------------------------
// Inputs propagation through a nested automa
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inputs_propagate_into_nested_automas() {
    let inner = GraphAutoma::new("inner");
    automa_inner_worker(&inner);

    let outer = GraphAutoma::new("outer");
    add_fn(&outer, "top", WorkerOptions::new().start(), |x| x + 1);
    outer
        .add_worker(
            "nested",
            inner,
            WorkerOptions::new().depends_on(["top"]).output(),
        )
        .unwrap();

    // user_input reaches the inner worker via propagation; x binds from the
    // dependency value, not the outer input.
    let result = outer
        .arun(
            InputArgs::new()
                .kwarg("x", json!(10))
                .kwarg("user_input", json!("hi")),
        )
        .await
        .unwrap();
    assert_eq!(result, json!({"x": 11, "user_input": "hi"}));
}

fn automa_inner_worker(inner: &GraphAutoma) {
    inner
        .add_async_fn_worker(
            "inner_worker",
            Signature::new().required("x").required("user_input"),
            |args: BoundArgs, _cx| async move {
                Ok(json!({
                    "x": args.get("x")?,
                    "user_input": args.get("user_input")?,
                }))
            },
            WorkerOptions::new().start().output(),
        )
        .unwrap();
}

// ---------------------------------------------------------------------------
// System descriptors inside a run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn system_descriptors_resolve_during_dispatch() {
    let automa = GraphAutoma::new("system");
    let nested = GraphAutoma::new("inner");
    automa_inner_worker(&nested);
    automa
        .add_worker("inner", nested, WorkerOptions::new())
        .unwrap();
    automa
        .add_async_fn_worker(
            "start",
            Signature::new()
                .required("x")
                .system("automa", SystemTag::Automa)
                .system("sub", SystemTag::SubAutoma("inner".into()))
                .system("rtx", SystemTag::RuntimeContext),
            |args: BoundArgs, cx| async move {
                assert_eq!(args.automa("automa")?.name(), "system");
                assert_eq!(args.automa("sub")?.name(), "inner");
                let rtx = args.runtime_context("rtx")?;
                assert_eq!(rtx.worker_key, "start");
                assert_eq!(&rtx.invocation_id, cx.invocation_id());
                args.get("x")
            },
            WorkerOptions::new().start().output(),
        )
        .unwrap();

    let result = automa
        .arun(InputArgs::new().kwarg("x", json!(7)))
        .await
        .unwrap();
    assert_eq!(result, json!(7));
}

// ---------------------------------------------------------------------------
// Events and feedback during a run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_events_reach_the_default_handler() {
    let automa = GraphAutoma::new("events");
    let seen = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&seen);
    automa.register_event_handler(None, move |event| {
        assert_eq!(event.progress, Some(0.6));
        hits.fetch_add(1, Ordering::SeqCst);
    });
    automa
        .add_async_fn_worker(
            "start",
            Signature::new().required("x"),
            |args: BoundArgs, cx| async move {
                cx.post_event(Event::progress(0.6, json!("halfway")));
                args.get("x")
            },
            WorkerOptions::new().start().output(),
        )
        .unwrap();

    automa
        .arun(InputArgs::new().kwarg("x", json!(1)))
        .await
        .unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn async_feedback_request_inside_a_worker() {
    let automa = GraphAutoma::new("feedback");
    automa.register_feedback_handler(Some("decide"), |_event, sender| {
        sender.send(automa_engine::Feedback::new(json!("yes")));
    });
    automa
        .add_async_fn_worker(
            "start",
            Signature::new().required("x"),
            |args: BoundArgs, cx| async move {
                let x = args.get("x")?.as_i64().unwrap_or(0);
                let feedback = cx
                    .request_feedback_async(Event::typed("decide", json!("double?")), None)
                    .await?;
                if feedback.data == json!("yes") {
                    Ok(json!(x * 2))
                } else {
                    Ok(json!(x))
                }
            },
            WorkerOptions::new().start().output(),
        )
        .unwrap();

    let result = automa
        .arun(InputArgs::new().kwarg("x", json!(4)))
        .await
        .unwrap();
    assert_eq!(result, json!(8));
}

#[tokio::test]
async fn blocking_feedback_request_from_a_pool_worker() {
    let automa = GraphAutoma::new("blocking-feedback");
    automa.register_feedback_handler(Some("decide"), |_event, sender| {
        sender.send(automa_engine::Feedback::new(json!(3)));
    });
    automa
        .add_fn_worker(
            "start",
            Signature::new().required("x"),
            |args: BoundArgs, cx| {
                let x = args.get("x")?.as_i64().unwrap_or(0);
                let feedback = cx.request_feedback(
                    Event::typed("decide", json!("factor?")),
                    Some(std::time::Duration::from_secs(1)),
                )?;
                Ok(json!(x * feedback.data.as_i64().unwrap_or(1)))
            },
            WorkerOptions::new().start().output(),
        )
        .unwrap();

    let result = automa
        .arun(InputArgs::new().kwarg("x", json!(5)))
        .await
        .unwrap();
    assert_eq!(result, json!(15));
}

#[tokio::test]
async fn feedback_timeout_is_recoverable_by_the_worker() {
    let automa = GraphAutoma::new("timeout");
    automa.register_feedback_handler(Some("decide"), |_event, _sender| {
        // Never answers.
    });
    automa
        .add_async_fn_worker(
            "start",
            Signature::new().required("x"),
            |args: BoundArgs, cx| async move {
                let outcome = cx
                    .request_feedback_async(
                        Event::typed("decide", json!(1)),
                        Some(std::time::Duration::from_millis(20)),
                    )
                    .await;
                match outcome {
                    Err(AutomaError::FeedbackTimeout { .. }) => args.get("x"),
                    other => other.map(|feedback| feedback.data),
                }
            },
            WorkerOptions::new().start().output(),
        )
        .unwrap();

    let result = automa
        .arun(InputArgs::new().kwarg("x", json!(9)))
        .await
        .unwrap();
    assert_eq!(result, json!(9));
}

// ---------------------------------------------------------------------------
// Ferry-driven control flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ferry_chain_carries_explicit_arguments() {
    let automa = GraphAutoma::new("ferry-chain");
    automa
        .add_async_fn_worker(
            "start",
            Signature::new().required("x"),
            |args: BoundArgs, cx| async move {
                let x = args.get("x")?.as_i64().unwrap_or(0);
                cx.add_async_fn_worker(
                    "hop",
                    Signature::new().required("x").required("user_input"),
                    |args: BoundArgs, cx| async move {
                        let x = args.get("x")?.as_i64().unwrap_or(0);
                        assert_eq!(args.get("user_input")?, json!("hi"));
                        cx.ferry_to("landing", Args::new().kwarg("x", json!(x + 1)));
                        Ok(json!(x))
                    },
                    WorkerOptions::new(),
                )?;
                cx.add_async_fn_worker(
                    "landing",
                    Signature::new().required("x").required("user_input"),
                    |args: BoundArgs, _cx| async move {
                        assert_eq!(args.get("user_input")?, json!("hi"));
                        args.get("x")
                    },
                    WorkerOptions::new(),
                )?;
                cx.set_output_worker("landing");
                cx.ferry_to("hop", Args::new().arg(json!(x + 1)));
                Ok(json!(x))
            },
            WorkerOptions::new().start(),
        )
        .unwrap();

    // Propagated user_input follows every hop; explicit args move the value.
    let result = automa
        .arun(
            InputArgs::new()
                .kwarg("x", json!(1))
                .kwarg("user_input", json!("hi")),
        )
        .await
        .unwrap();
    assert_eq!(result, json!(3));
}

// ---------------------------------------------------------------------------
// Nested HITL across layers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn interactions_bubble_from_nested_layers() {
    let inner = GraphAutoma::new("inner");
    add_fn(&inner, "start", WorkerOptions::new().start(), |x| x + 100);
    inner
        .add_async_fn_worker(
            "ask",
            Signature::new().required("x"),
            |args: BoundArgs, cx| async move {
                let x = args.get("x")?.as_i64().unwrap_or(0);
                let feedback =
                    cx.interact_with_human(Event::typed("inner_confirm", json!("add 300?")))?;
                if feedback.data == json!("yes") {
                    Ok(json!(x + 300))
                } else {
                    Ok(json!(x))
                }
            },
            WorkerOptions::new().depends_on(["start"]).output(),
        )
        .unwrap();

    let outer = GraphAutoma::new("outer");
    add_fn(&outer, "start", WorkerOptions::new().start(), |x| x + 1);
    outer
        .add_worker(
            "middle",
            inner,
            WorkerOptions::new().depends_on(["start"]),
        )
        .unwrap();
    add_fn(
        &outer,
        "end",
        WorkerOptions::new().depends_on(["middle"]).output(),
        |x| x + 2,
    );

    let err = outer
        .arun(InputArgs::new().kwarg("x", json!(5)))
        .await
        .unwrap_err();
    let AutomaError::Interaction(exception) = err else {
        panic!("expected an interaction pause");
    };
    assert_eq!(exception.interactions.len(), 1);
    let interaction = &exception.interactions[0];
    assert_eq!(interaction.event.event_type.as_deref(), Some("inner_confirm"));
    assert_eq!(interaction.worker_key, "ask");

    let result = outer
        .resume(vec![InteractionFeedback::new(
            interaction.interaction_id.clone(),
            json!("yes"),
        )])
        .await
        .unwrap();
    // 5 + 1 (start) + 100 (inner start) + 300 (yes) + 2 (end)
    assert_eq!(result, json!(408));
}

// ---------------------------------------------------------------------------
// Error surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn compilation_errors_surface_before_dispatch() {
    let automa = GraphAutoma::new("compile-error");
    add_fn(&automa, "a", WorkerOptions::new().start().depends_on(["ghost"]), |x| x);
    let err = automa
        .arun(InputArgs::new().kwarg("x", json!(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, AutomaError::Compilation(_)));
    assert!(err.to_string().contains("'ghost'"));
}

#[tokio::test]
async fn from_descriptor_without_default_fails_injection() {
    let automa = GraphAutoma::new("injection-error");
    add_fn(&automa, "w0", WorkerOptions::new().start(), |x| x);
    automa
        .add_async_fn_worker(
            "w1",
            Signature::new().required("x").from_worker("y", "ghost"),
            |args: BoundArgs, _cx| async move { args.get("x") },
            WorkerOptions::new().depends_on(["w0"]).output(),
        )
        .unwrap();
    let err = automa
        .arun(InputArgs::new().kwarg("x", json!(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, AutomaError::ArgsInjection { .. }));
}
