use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value as JsonValue;
use tracing::debug;

use super::opcode::CanvasOp;
use super::packer::{OperationPacker, PackerKind};
use crate::bridge::{BridgeError, ListenerId, NativeBridge, NativeObject};
use crate::transport::Properties;

/// Native type name of drawing surfaces.
pub const GC_TYPE: &str = "GC";

type SharedPacker = Rc<RefCell<Box<dyn OperationPacker>>>;

/// A drawing surface whose primitives are batched into one `draw` call per flush.
///
/// The context subscribes to the bridge's flush signal on creation, so every
/// primitive issued during a script turn reaches the native side in a single call at
/// the end of that turn.
pub struct GraphicsContext {
    object: NativeObject,
    packer: SharedPacker,
    listener: Option<ListenerId>,
}

impl GraphicsContext {
    /// Creates a surface packed the way the bridge was configured.
    pub fn new(bridge: &mut NativeBridge, properties: Properties) -> Self {
        let kind = bridge.packer_kind();
        Self::with_packer(bridge, kind, properties)
    }

    pub fn with_packer(bridge: &mut NativeBridge, kind: PackerKind, properties: Properties) -> Self {
        let object = NativeObject::create(bridge, GC_TYPE, properties);
        let packer: SharedPacker = Rc::new(RefCell::new(kind.build()));

        let listener = {
            let packer = Rc::clone(&packer);
            let id = object.id().to_string();
            bridge.on_flush(Box::new(move |bridge| {
                flush_packer(&packer, &id, bridge).map(|_| ())
            }))
        };

        Self {
            object,
            packer,
            listener: Some(listener),
        }
    }

    pub fn id(&self) -> &str {
        self.object.id()
    }

    pub fn pending(&self) -> usize {
        self.packer.borrow().pending()
    }

    /// Sends pending operations as one `draw` call. Returns whether a call was made.
    pub fn flush(&self, bridge: &mut NativeBridge) -> Result<bool, BridgeError> {
        self.ensure_live()?;
        flush_packer(&self.packer, self.object.id(), bridge)
    }

    /// Unsubscribes from the flush signal, drops undrawn operations and destroys the
    /// native surface.
    pub fn dispose(&mut self, bridge: &mut NativeBridge) {
        if let Some(listener) = self.listener.take() {
            bridge.off_flush(listener);
        }
        self.packer.borrow_mut().clear();
        self.object.dispose(bridge);
    }

    pub fn is_disposed(&self) -> bool {
        self.object.is_disposed()
    }

    pub fn add_operation(&self, name: &str) -> Result<(), BridgeError> {
        self.ensure_live()?;
        self.packer.borrow_mut().add_operation(name)
    }

    pub fn add_double(&self, values: &[f64]) -> Result<(), BridgeError> {
        self.ensure_live()?;
        self.packer.borrow_mut().add_double(values);
        Ok(())
    }

    pub fn add_boolean(&self, values: &[bool]) -> Result<(), BridgeError> {
        self.ensure_live()?;
        self.packer.borrow_mut().add_boolean(values);
        Ok(())
    }

    pub fn add_string(&self, values: &[&str]) -> Result<(), BridgeError> {
        self.ensure_live()?;
        self.packer.borrow_mut().add_string(values);
        Ok(())
    }

    pub fn add_int(&self, values: &[i32]) -> Result<(), BridgeError> {
        self.ensure_live()?;
        self.packer.borrow_mut().add_int(values);
        Ok(())
    }

    /// Appends `name` with loosely typed arguments.
    ///
    /// Strings and booleans go to their streams; numbers become ints for operations
    /// that take ints and doubles otherwise. Arguments are packed in stream order, the
    /// same order the typed methods use.
    pub fn draw(&self, name: &str, args: &[JsonValue]) -> Result<(), BridgeError> {
        let op = CanvasOp::from_name(name)?;
        let takes_ints = op.signature().ints > 0;

        let mut doubles = Vec::new();
        let mut booleans = Vec::new();
        let mut strings = Vec::new();
        let mut ints = Vec::new();
        for arg in args {
            match arg {
                JsonValue::Bool(value) => booleans.push(*value),
                JsonValue::String(value) => strings.push(value.as_str()),
                JsonValue::Number(value) if takes_ints => {
                    ints.push(value.as_f64().unwrap_or_default().round() as i32)
                }
                JsonValue::Number(value) => doubles.push(value.as_f64().unwrap_or_default()),
                other => {
                    return Err(BridgeError::MalformedPayload(format!(
                        "unsupported argument {other} for {name}"
                    )))
                }
            }
        }
        self.push(op, &doubles, &booleans, &strings, &ints)
    }

    pub fn save(&self) -> Result<(), BridgeError> {
        self.push(CanvasOp::Save, &[], &[], &[], &[])
    }

    pub fn restore(&self) -> Result<(), BridgeError> {
        self.push(CanvasOp::Restore, &[], &[], &[], &[])
    }

    pub fn begin_path(&self) -> Result<(), BridgeError> {
        self.push(CanvasOp::BeginPath, &[], &[], &[], &[])
    }

    pub fn close_path(&self) -> Result<(), BridgeError> {
        self.push(CanvasOp::ClosePath, &[], &[], &[], &[])
    }

    pub fn line_width(&self, width: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::LineWidth, &[width], &[], &[], &[])
    }

    pub fn line_cap(&self, cap: &str) -> Result<(), BridgeError> {
        self.push(CanvasOp::LineCap, &[], &[], &[cap], &[])
    }

    pub fn line_join(&self, join: &str) -> Result<(), BridgeError> {
        self.push(CanvasOp::LineJoin, &[], &[], &[join], &[])
    }

    pub fn fill_style(&self, rgba: [u8; 4]) -> Result<(), BridgeError> {
        self.push(CanvasOp::FillStyle, &[], &[], &[], &channels(rgba))
    }

    pub fn stroke_style(&self, rgba: [u8; 4]) -> Result<(), BridgeError> {
        self.push(CanvasOp::StrokeStyle, &[], &[], &[], &channels(rgba))
    }

    pub fn font(&self, font: &str) -> Result<(), BridgeError> {
        self.push(CanvasOp::Font, &[], &[], &[font], &[])
    }

    pub fn text_align(&self, align: &str) -> Result<(), BridgeError> {
        self.push(CanvasOp::TextAlign, &[], &[], &[align], &[])
    }

    pub fn text_baseline(&self, baseline: &str) -> Result<(), BridgeError> {
        self.push(CanvasOp::TextBaseline, &[], &[], &[baseline], &[])
    }

    pub fn rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::Rect, &[x, y, width, height], &[], &[], &[])
    }

    pub fn fill_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::FillRect, &[x, y, width, height], &[], &[], &[])
    }

    pub fn stroke_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::StrokeRect, &[x, y, width, height], &[], &[], &[])
    }

    pub fn clear_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::ClearRect, &[x, y, width, height], &[], &[], &[])
    }

    pub fn move_to(&self, x: f64, y: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::MoveTo, &[x, y], &[], &[], &[])
    }

    pub fn line_to(&self, x: f64, y: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::LineTo, &[x, y], &[], &[], &[])
    }

    pub fn quadratic_curve_to(&self, cpx: f64, cpy: f64, x: f64, y: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::QuadraticCurveTo, &[cpx, cpy, x, y], &[], &[], &[])
    }

    pub fn bezier_curve_to(
        &self,
        cp1x: f64,
        cp1y: f64,
        cp2x: f64,
        cp2y: f64,
        x: f64,
        y: f64,
    ) -> Result<(), BridgeError> {
        self.push(
            CanvasOp::BezierCurveTo,
            &[cp1x, cp1y, cp2x, cp2y, x, y],
            &[],
            &[],
            &[],
        )
    }

    pub fn arc(
        &self,
        x: f64,
        y: f64,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        anticlockwise: bool,
    ) -> Result<(), BridgeError> {
        self.push(
            CanvasOp::Arc,
            &[x, y, radius, start_angle, end_angle],
            &[anticlockwise],
            &[],
            &[],
        )
    }

    pub fn arc_to(
        &self,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        radius: f64,
    ) -> Result<(), BridgeError> {
        self.push(CanvasOp::ArcTo, &[x1, y1, x2, y2, radius], &[], &[], &[])
    }

    pub fn fill(&self) -> Result<(), BridgeError> {
        self.push(CanvasOp::Fill, &[], &[], &[], &[])
    }

    pub fn stroke(&self) -> Result<(), BridgeError> {
        self.push(CanvasOp::Stroke, &[], &[], &[], &[])
    }

    pub fn fill_text(&self, text: &str, x: f64, y: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::FillText, &[x, y], &[], &[text], &[])
    }

    pub fn stroke_text(&self, text: &str, x: f64, y: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::StrokeText, &[x, y], &[], &[text], &[])
    }

    pub fn scale(&self, x: f64, y: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::Scale, &[x, y], &[], &[], &[])
    }

    pub fn rotate(&self, angle: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::Rotate, &[angle], &[], &[], &[])
    }

    pub fn translate(&self, x: f64, y: f64) -> Result<(), BridgeError> {
        self.push(CanvasOp::Translate, &[x, y], &[], &[], &[])
    }

    pub fn transform(&self, matrix: [f64; 6]) -> Result<(), BridgeError> {
        self.push(CanvasOp::Transform, &matrix, &[], &[], &[])
    }

    pub fn set_transform(&self, matrix: [f64; 6]) -> Result<(), BridgeError> {
        self.push(CanvasOp::SetTransform, &matrix, &[], &[], &[])
    }

    fn push(
        &self,
        op: CanvasOp,
        doubles: &[f64],
        booleans: &[bool],
        strings: &[&str],
        ints: &[i32],
    ) -> Result<(), BridgeError> {
        self.ensure_live()?;
        let mut packer = self.packer.borrow_mut();
        packer.push_op(op);
        if !doubles.is_empty() {
            packer.add_double(doubles);
        }
        if !booleans.is_empty() {
            packer.add_boolean(booleans);
        }
        if !strings.is_empty() {
            packer.add_string(strings);
        }
        if !ints.is_empty() {
            packer.add_int(ints);
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), BridgeError> {
        if self.object.is_disposed() {
            return Err(BridgeError::Disposed(self.object.id().to_string()));
        }
        Ok(())
    }
}

fn channels(rgba: [u8; 4]) -> [i32; 4] {
    rgba.map(i32::from)
}

fn flush_packer(
    packer: &SharedPacker,
    id: &str,
    bridge: &mut NativeBridge,
) -> Result<bool, BridgeError> {
    // a failed queued write must leave the payload pending
    bridge.flush()?;
    let Some(payload) = packer.borrow_mut().take_payload() else {
        return Ok(false);
    };
    bridge.call(id, "draw", &payload)?;
    debug!(target: "canvas", %id, "draw flushed");
    Ok(true)
}
