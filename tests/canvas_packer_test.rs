use std::cell::RefCell;
use std::rc::Rc;

use nativebridge::bridge::{BridgeError, NativeBridge};
use nativebridge::canvas::{decode_packed, CanvasOp, GraphicsContext, PackerKind, GC_TYPE};
use nativebridge::transport::{
    CallLog, MemoryTransport, NativeTransport, Properties, RecordingTransport, TransportCall,
    TransportError,
};
use serde_json::{json, Value as JsonValue};

fn bridge_with_log() -> (NativeBridge, CallLog) {
    let transport = RecordingTransport::wrap(MemoryTransport::new());
    let log = transport.log();
    (NativeBridge::new(transport), log)
}

fn draw_calls(log: &CallLog) -> Vec<Properties> {
    log.snapshot()
        .into_iter()
        .filter_map(|call| match call {
            TransportCall::Call {
                method, parameters, ..
            } if method == "draw" => Some(parameters),
            _ => None,
        })
        .collect()
}

#[test]
fn parallel_streams_match_the_opcode_table() {
    let (mut bridge, log) = bridge_with_log();
    let gc = GraphicsContext::with_packer(&mut bridge, PackerKind::Parallel, Properties::new());

    gc.fill_text("hi", 4.0, 8.0).unwrap();
    gc.fill_style([0, 128, 255, 255]).unwrap();
    bridge.trigger_flush().unwrap();

    let draws = draw_calls(&log);
    assert_eq!(draws.len(), 1);
    assert_eq!(
        draws[0]["packedOperations"],
        json!([[24, 7], [4.0, 8.0], [], ["hi"], [0, 128, 255, 255]])
    );
}

#[test]
fn raw_packing_sends_one_call_and_only_when_pending() {
    let (mut bridge, log) = bridge_with_log();
    let gc = GraphicsContext::new(&mut bridge, Properties::new());
    bridge.trigger_flush().unwrap();
    assert!(draw_calls(&log).is_empty());

    gc.add_operation("moveTo").unwrap();
    gc.add_double(&[3.0, 4.0]).unwrap();
    bridge.trigger_flush().unwrap();

    let draws = draw_calls(&log);
    assert_eq!(draws.len(), 1);
    assert_eq!(
        draws[0]["packedOperations"],
        json!([[16], [3.0, 4.0], [], [], []])
    );

    bridge.trigger_flush().unwrap();
    assert_eq!(draw_calls(&log).len(), 1);
}

#[test]
fn one_draw_call_per_flush() {
    let (mut bridge, log) = bridge_with_log();
    let gc = GraphicsContext::new(&mut bridge, Properties::new());

    gc.begin_path().unwrap();
    gc.move_to(0.0, 0.0).unwrap();
    gc.line_to(10.0, 10.0).unwrap();
    gc.stroke().unwrap();
    let report = bridge.trigger_flush().unwrap();

    assert_eq!(report.listeners_run, 1);
    assert_eq!(log.primitives(), vec!["create", "call"]);
    assert_eq!(gc.pending(), 0);

    // nothing pending: the next flush makes no native call
    bridge.trigger_flush().unwrap();
    assert_eq!(log.len(), 2);
}

#[test]
fn flat_packer_groups_arguments_per_operation() {
    let (mut bridge, log) = bridge_with_log();
    let gc = GraphicsContext::with_packer(&mut bridge, PackerKind::Flat, Properties::new());

    gc.arc(0.0, 0.0, 3.0, 0.0, 1.0, true).unwrap();
    gc.fill().unwrap();
    bridge.trigger_flush().unwrap();

    assert_eq!(
        draw_calls(&log)[0]["operations"],
        json!([["arc", 0.0, 0.0, 3.0, 0.0, 1.0, true], ["fill"]])
    );
}

#[test]
fn draw_sorts_loose_arguments_into_streams() {
    let (mut bridge, log) = bridge_with_log();
    let gc = GraphicsContext::new(&mut bridge, Properties::new());

    gc.draw("fillText", &[json!("label"), json!(1.5), json!(2)])
        .unwrap();
    gc.draw("strokeStyle", &[json!(255), json!(0), json!(0), json!(255)])
        .unwrap();
    bridge.trigger_flush().unwrap();

    let packed = &draw_calls(&log)[0]["packedOperations"];
    let commands = decode_packed(packed).unwrap();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].op, CanvasOp::FillText);
    assert_eq!(commands[0].strings, vec!["label".to_string()]);
    assert_eq!(commands[0].doubles, vec![1.5, 2.0]);
    assert_eq!(commands[1].op, CanvasOp::StrokeStyle);
    assert_eq!(commands[1].ints, vec![255, 0, 0, 255]);
}

#[test]
fn unknown_operation_is_rejected_before_packing() {
    let (mut bridge, _log) = bridge_with_log();
    let gc = GraphicsContext::new(&mut bridge, Properties::new());

    let err = gc.add_operation("drawImage").unwrap_err();
    assert!(matches!(err, BridgeError::InvalidOperation(_)));
    assert_eq!(gc.pending(), 0);
}

#[test]
fn canvas_creation_rides_the_same_flush_as_its_first_draw() {
    let (mut bridge, log) = bridge_with_log();
    let gc = GraphicsContext::new(&mut bridge, Properties::new());
    gc.rect(0.0, 0.0, 2.0, 2.0).unwrap();

    bridge.trigger_flush().unwrap();

    let calls = log.snapshot();
    assert!(matches!(
        &calls[0],
        TransportCall::Create { id, object_type, .. } if id == gc.id() && object_type == GC_TYPE
    ));
    assert!(matches!(&calls[1], TransportCall::Call { id, .. } if id == gc.id()));
}

#[test]
fn dispose_unsubscribes_and_destroys() {
    let (mut bridge, log) = bridge_with_log();
    let mut gc = GraphicsContext::new(&mut bridge, Properties::new());
    bridge.trigger_flush().unwrap();
    log.drain();

    gc.fill_rect(0.0, 0.0, 1.0, 1.0).unwrap();
    gc.dispose(&mut bridge);
    assert_eq!(bridge.flush_listeners(), 0);
    assert!(gc.is_disposed());

    bridge.trigger_flush().unwrap();
    assert_eq!(log.primitives(), vec!["destroy"]);
    assert!(matches!(gc.fill().unwrap_err(), BridgeError::Disposed(_)));
}

#[test]
fn raw_arguments_are_refused_after_dispose() {
    let (mut bridge, _log) = bridge_with_log();
    let mut gc = GraphicsContext::new(&mut bridge, Properties::new());
    gc.dispose(&mut bridge);

    assert!(matches!(gc.add_double(&[1.0]), Err(BridgeError::Disposed(_))));
    assert!(matches!(gc.add_boolean(&[true]), Err(BridgeError::Disposed(_))));
    assert!(matches!(gc.add_string(&["x"]), Err(BridgeError::Disposed(_))));
    assert!(matches!(gc.add_int(&[1]), Err(BridgeError::Disposed(_))));
    assert_eq!(gc.pending(), 0);
}

#[test]
fn explicit_flush_sends_immediately() {
    let (mut bridge, log) = bridge_with_log();
    let gc = GraphicsContext::new(&mut bridge, Properties::new());
    gc.save().unwrap();
    gc.restore().unwrap();

    assert!(gc.flush(&mut bridge).unwrap());
    assert!(!gc.flush(&mut bridge).unwrap());
    assert_eq!(log.primitives(), vec!["create", "call"]);
}

/// Counts commands the way a native renderer would: by decoding them.
struct DecodingTransport {
    inner: MemoryTransport,
    decoded: Rc<RefCell<Vec<CanvasOp>>>,
}

impl NativeTransport for DecodingTransport {
    fn create(
        &mut self,
        id: &str,
        object_type: &str,
        properties: &Properties,
    ) -> Result<(), TransportError> {
        self.inner.create(id, object_type, properties)
    }

    fn set(&mut self, id: &str, properties: &Properties) -> Result<(), TransportError> {
        self.inner.set(id, properties)
    }

    fn listen(&mut self, id: &str, event: &str, enabled: bool) -> Result<(), TransportError> {
        self.inner.listen(id, event, enabled)
    }

    fn destroy(&mut self, id: &str) -> Result<(), TransportError> {
        self.inner.destroy(id)
    }

    fn get(&mut self, id: &str, property: &str) -> Result<JsonValue, TransportError> {
        self.inner.get(id, property)
    }

    fn call(
        &mut self,
        id: &str,
        method: &str,
        parameters: &Properties,
    ) -> Result<JsonValue, TransportError> {
        if let Some(packed) = parameters.get("packedOperations") {
            let commands = decode_packed(packed).map_err(|err| TransportError::Rejected {
                primitive: "call",
                id: id.to_string(),
                message: err.to_string(),
            })?;
            self.decoded
                .borrow_mut()
                .extend(commands.iter().map(|command| command.op));
        }
        self.inner.call(id, method, parameters)
    }
}

#[test]
fn native_side_decodes_every_primitive() {
    let decoded = Rc::new(RefCell::new(Vec::new()));
    let mut bridge = NativeBridge::new(DecodingTransport {
        inner: MemoryTransport::new(),
        decoded: Rc::clone(&decoded),
    });
    let gc = GraphicsContext::new(&mut bridge, Properties::new());

    gc.save().unwrap();
    gc.translate(5.0, 5.0).unwrap();
    gc.bezier_curve_to(1.0, 2.0, 3.0, 4.0, 5.0, 6.0).unwrap();
    gc.arc_to(1.0, 1.0, 2.0, 2.0, 1.0).unwrap();
    gc.font("12px sans").unwrap();
    gc.set_transform([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
    gc.stroke_text("done", 1.0, 2.0).unwrap();
    gc.restore().unwrap();
    bridge.trigger_flush().unwrap();

    assert_eq!(
        *decoded.borrow(),
        vec![
            CanvasOp::Save,
            CanvasOp::Translate,
            CanvasOp::BezierCurveTo,
            CanvasOp::ArcTo,
            CanvasOp::Font,
            CanvasOp::SetTransform,
            CanvasOp::StrokeText,
            CanvasOp::Restore,
        ]
    );
}
