use nativebridge::bridge::NativeBridge;
use nativebridge::canvas::{PackerKind, GC_TYPE};
use nativebridge::transport::{CallLog, MemoryTransport, RecordingTransport, TransportCall};
use nativebridge::{BridgeConfig, ScriptHost};
use serde_json::json;

fn host_with_config(config: &BridgeConfig) -> (ScriptHost, CallLog) {
    let transport = RecordingTransport::wrap(MemoryTransport::new());
    let log = transport.log();
    let host = ScriptHost::new(NativeBridge::with_config(transport, config)).unwrap();
    (host, log)
}

fn host() -> (ScriptHost, CallLog) {
    host_with_config(&BridgeConfig::default())
}

#[test]
fn script_writes_coalesce_into_create() {
    let (host, log) = host();
    let report = host
        .eval(
            r#"
            const id = bridge.create('Button', { text: 'a' });
            bridge.set(id, { text: 'b' });
            bridge.set(id, { enabled: false });
            "#,
            "coalesce.js",
        )
        .unwrap();

    assert_eq!(report.dispatched, 1);
    assert_eq!(
        log.snapshot(),
        vec![TransportCall::Create {
            id: "$1".into(),
            object_type: "Button".into(),
            properties: json!({"text": "b", "enabled": false})
                .as_object()
                .cloned()
                .unwrap(),
        }]
    );
}

#[test]
fn get_observes_writes_from_the_same_turn() {
    let (host, log) = host();
    let value: i32 = host
        .eval_with(
            r#"
            const id = bridge.create('Slider', {});
            bridge.set(id, { value: 5 });
            bridge.get(id, 'value')
            "#,
            "get.js",
        )
        .unwrap();

    assert_eq!(value, 5);
    assert_eq!(log.primitives(), vec!["create", "get"]);
}

#[test]
fn native_errors_are_catchable_in_script() {
    let (host, _log) = host();
    let message: String = host
        .eval_with(
            r#"
            let message = '';
            try {
                bridge.get('$404', 'text');
            } catch (err) {
                message = err.message;
            }
            message
            "#,
            "missing.js",
        )
        .unwrap();

    assert_eq!(message, "unknown native object '$404'");
}

#[test]
fn failing_script_still_flushes_its_turn() {
    let (host, log) = host();
    let err = host
        .eval(
            "bridge.create('Label', {}); throw new Error('late');",
            "throws.js",
        )
        .unwrap_err();

    assert!(format!("{err:#}").contains("late"));
    assert_eq!(log.primitives(), vec!["create"]);
}

#[test]
fn events_run_handlers_then_flush() {
    let (host, log) = host();
    host.eval(
        r#"
        const id = bridge.create('Button', {});
        bridge.on(id, 'tap', (detail) => bridge.set(id, { count: detail.count }));
        bridge.on(id, 'tap', () => {});
        "#,
        "events.js",
    )
    .unwrap();
    assert_eq!(log.primitives(), vec!["create", "listen"]);
    log.drain();

    let handled = host.notify("$1", "tap", &json!({"count": 3})).unwrap();

    assert_eq!(handled, 2);
    assert_eq!(
        log.snapshot(),
        vec![TransportCall::Set {
            id: "$1".into(),
            properties: json!({"count": 3}).as_object().cloned().unwrap(),
        }]
    );
}

#[test]
fn events_without_handlers_are_ignored() {
    let (host, log) = host();
    let handled = host.notify("$7", "tap", &json!(null)).unwrap();
    assert_eq!(handled, 0);
    assert!(log.is_empty());
}

#[test]
fn removing_the_last_handler_stops_listening() {
    let (host, log) = host();
    host.eval(
        r#"
        const id = bridge.create('Button', {});
        const handler = () => {};
        bridge.on(id, 'tap', handler);
        bridge.off(id, 'tap', handler);
        "#,
        "off.js",
    )
    .unwrap();

    let listens: Vec<bool> = log
        .snapshot()
        .into_iter()
        .filter_map(|call| match call {
            TransportCall::Listen { enabled, .. } => Some(enabled),
            _ => None,
        })
        .collect();
    assert_eq!(listens, vec![true, false]);
}

#[test]
fn script_canvas_draws_once_per_turn() {
    let (host, log) = host();
    let id: String = host
        .eval_with(
            r#"
            const gc = bridge.canvas({ width: 10, height: 10 });
            gc.fillStyle(255, 0, 0, 255).fillRect(0, 0, 5, 5);
            gc.fillText('hi', 1, 2);
            gc.id
            "#,
            "canvas.js",
        )
        .unwrap();

    let calls = log.snapshot();
    assert_eq!(calls.len(), 2);
    assert!(matches!(
        &calls[0],
        TransportCall::Create { object_type, .. } if object_type == GC_TYPE
    ));
    match &calls[1] {
        TransportCall::Call {
            id: target,
            method,
            parameters,
        } => {
            assert_eq!(target, &id);
            assert_eq!(method, "draw");
            assert_eq!(
                parameters["packedOperations"],
                json!([[7, 13, 24], [0.0, 0.0, 5.0, 5.0, 1.0, 2.0], [], ["hi"], [255, 0, 0, 255]])
            );
        }
        other => panic!("expected draw call, got {other:?}"),
    }
    assert_eq!(host.canvas_pending(&id), Some(0));
}

#[test]
fn configured_flat_packer_reaches_script_canvases() {
    let config = BridgeConfig {
        canvas_packer: PackerKind::Flat,
        ..BridgeConfig::default()
    };
    let (host, log) = host_with_config(&config);
    host.eval(
        "const gc = bridge.canvas(); gc.beginPath(); gc.rect(1, 2, 3, 4); gc.fill();",
        "flat.js",
    )
    .unwrap();

    let draw = log
        .snapshot()
        .into_iter()
        .find_map(|call| match call {
            TransportCall::Call { parameters, .. } => Some(parameters),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        draw["operations"],
        json!([["beginPath"], ["rect", 1.0, 2.0, 3.0, 4.0], ["fill"]])
    );
}

#[test]
fn unknown_canvas_operation_throws() {
    let (host, log) = host();
    let message: String = host
        .eval_with(
            r#"
            const gc = bridge.canvas({});
            let message = '';
            try {
                gc.draw('drawImage', 1, 2);
            } catch (err) {
                message = err.message;
            }
            message
            "#,
            "invalid.js",
        )
        .unwrap();

    assert_eq!(message, "Invalid operation: drawImage");
    assert_eq!(log.primitives(), vec!["create"]);
}

#[test]
fn disposed_script_canvas_is_destroyed() {
    let (host, log) = host();
    let id: String = host
        .eval_with(
            "const gc = bridge.canvas({}); gc.save(); gc.dispose(); gc.id",
            "dispose.js",
        )
        .unwrap();

    // undrawn operations are dropped with the canvas
    assert_eq!(log.primitives(), vec!["create", "destroy"]);
    assert_eq!(host.canvas_pending(&id), None);
    assert_eq!(host.bridge().borrow().flush_listeners(), 0);
}

#[test]
fn destroying_a_script_canvas_retires_it() {
    let (host, log) = host();
    let id: String = host
        .eval_with("const gc = bridge.canvas({}); gc.id", "canvas.js")
        .unwrap();
    host.eval("bridge.destroy(gc.id);", "destroy.js").unwrap();

    assert_eq!(log.primitives(), vec!["create", "destroy"]);
    assert_eq!(host.canvas_pending(&id), None);
    assert_eq!(host.bridge().borrow().flush_listeners(), 0);

    let message: String = host
        .eval_with(
            r#"
            let message = '';
            try {
                gc.fillRect(0, 0, 1, 1);
            } catch (err) {
                message = err.message;
            }
            message
            "#,
            "late.js",
        )
        .unwrap();

    assert_eq!(message, format!("unknown canvas '{id}'"));
    assert_eq!(log.primitives(), vec!["create", "destroy"]);
}
