use serde_json::Value as JsonValue;

use crate::bridge::BridgeError;

/// How many entries one operation consumes from each typed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signature {
    pub doubles: usize,
    pub booleans: usize,
    pub strings: usize,
    pub ints: usize,
}

const fn sig(doubles: usize, booleans: usize, strings: usize, ints: usize) -> Signature {
    Signature {
        doubles,
        booleans,
        strings,
        ints,
    }
}

/// Closed set of drawing primitives. The discriminant is the wire opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CanvasOp {
    Save = 0,
    Restore,
    BeginPath,
    ClosePath,
    LineWidth,
    LineCap,
    LineJoin,
    FillStyle,
    StrokeStyle,
    Font,
    TextAlign,
    TextBaseline,
    Rect,
    FillRect,
    StrokeRect,
    ClearRect,
    MoveTo,
    LineTo,
    QuadraticCurveTo,
    BezierCurveTo,
    Arc,
    ArcTo,
    Fill,
    Stroke,
    FillText,
    StrokeText,
    Scale,
    Rotate,
    Translate,
    Transform,
    SetTransform,
}

impl CanvasOp {
    pub const ALL: [CanvasOp; 31] = [
        CanvasOp::Save,
        CanvasOp::Restore,
        CanvasOp::BeginPath,
        CanvasOp::ClosePath,
        CanvasOp::LineWidth,
        CanvasOp::LineCap,
        CanvasOp::LineJoin,
        CanvasOp::FillStyle,
        CanvasOp::StrokeStyle,
        CanvasOp::Font,
        CanvasOp::TextAlign,
        CanvasOp::TextBaseline,
        CanvasOp::Rect,
        CanvasOp::FillRect,
        CanvasOp::StrokeRect,
        CanvasOp::ClearRect,
        CanvasOp::MoveTo,
        CanvasOp::LineTo,
        CanvasOp::QuadraticCurveTo,
        CanvasOp::BezierCurveTo,
        CanvasOp::Arc,
        CanvasOp::ArcTo,
        CanvasOp::Fill,
        CanvasOp::Stroke,
        CanvasOp::FillText,
        CanvasOp::StrokeText,
        CanvasOp::Scale,
        CanvasOp::Rotate,
        CanvasOp::Translate,
        CanvasOp::Transform,
        CanvasOp::SetTransform,
    ];

    pub fn opcode(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            CanvasOp::Save => "save",
            CanvasOp::Restore => "restore",
            CanvasOp::BeginPath => "beginPath",
            CanvasOp::ClosePath => "closePath",
            CanvasOp::LineWidth => "lineWidth",
            CanvasOp::LineCap => "lineCap",
            CanvasOp::LineJoin => "lineJoin",
            CanvasOp::FillStyle => "fillStyle",
            CanvasOp::StrokeStyle => "strokeStyle",
            CanvasOp::Font => "font",
            CanvasOp::TextAlign => "textAlign",
            CanvasOp::TextBaseline => "textBaseline",
            CanvasOp::Rect => "rect",
            CanvasOp::FillRect => "fillRect",
            CanvasOp::StrokeRect => "strokeRect",
            CanvasOp::ClearRect => "clearRect",
            CanvasOp::MoveTo => "moveTo",
            CanvasOp::LineTo => "lineTo",
            CanvasOp::QuadraticCurveTo => "quadraticCurveTo",
            CanvasOp::BezierCurveTo => "bezierCurveTo",
            CanvasOp::Arc => "arc",
            CanvasOp::ArcTo => "arcTo",
            CanvasOp::Fill => "fill",
            CanvasOp::Stroke => "stroke",
            CanvasOp::FillText => "fillText",
            CanvasOp::StrokeText => "strokeText",
            CanvasOp::Scale => "scale",
            CanvasOp::Rotate => "rotate",
            CanvasOp::Translate => "translate",
            CanvasOp::Transform => "transform",
            CanvasOp::SetTransform => "setTransform",
        }
    }

    pub fn signature(self) -> Signature {
        match self {
            CanvasOp::Save
            | CanvasOp::Restore
            | CanvasOp::BeginPath
            | CanvasOp::ClosePath
            | CanvasOp::Fill
            | CanvasOp::Stroke => sig(0, 0, 0, 0),
            CanvasOp::LineWidth | CanvasOp::Rotate => sig(1, 0, 0, 0),
            CanvasOp::LineCap
            | CanvasOp::LineJoin
            | CanvasOp::Font
            | CanvasOp::TextAlign
            | CanvasOp::TextBaseline => sig(0, 0, 1, 0),
            // rgba channels
            CanvasOp::FillStyle | CanvasOp::StrokeStyle => sig(0, 0, 0, 4),
            CanvasOp::Rect
            | CanvasOp::FillRect
            | CanvasOp::StrokeRect
            | CanvasOp::ClearRect
            | CanvasOp::QuadraticCurveTo => sig(4, 0, 0, 0),
            CanvasOp::MoveTo | CanvasOp::LineTo | CanvasOp::Scale | CanvasOp::Translate => {
                sig(2, 0, 0, 0)
            }
            CanvasOp::BezierCurveTo | CanvasOp::Transform | CanvasOp::SetTransform => {
                sig(6, 0, 0, 0)
            }
            CanvasOp::Arc => sig(5, 1, 0, 0),
            CanvasOp::ArcTo => sig(5, 0, 0, 0),
            CanvasOp::FillText | CanvasOp::StrokeText => sig(2, 0, 1, 0),
        }
    }

    pub fn from_name(name: &str) -> Result<Self, BridgeError> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.name() == name)
            .ok_or_else(|| BridgeError::InvalidOperation(name.to_string()))
    }

    pub fn from_opcode(opcode: i64) -> Option<Self> {
        usize::try_from(opcode)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }
}

/// One drawing command as the native side sees it after unpacking.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub op: CanvasOp,
    pub doubles: Vec<f64>,
    pub booleans: Vec<bool>,
    pub strings: Vec<String>,
    pub ints: Vec<i64>,
}

/// Unpacks a `[opcodes, doubles, booleans, strings, ints]` payload positionally.
///
/// Each opcode's signature says how far to advance in every typed stream. Unknown
/// opcodes and exhausted streams are rejected.
pub fn decode_packed(payload: &JsonValue) -> Result<Vec<DrawCommand>, BridgeError> {
    let streams = payload
        .as_array()
        .filter(|streams| streams.len() == 5)
        .ok_or_else(|| malformed("expected five streams"))?;

    let opcodes = stream(&streams[0], "opcodes", JsonValue::as_i64)?;
    let doubles = stream(&streams[1], "doubles", JsonValue::as_f64)?;
    let booleans = stream(&streams[2], "booleans", JsonValue::as_bool)?;
    let strings = stream(&streams[3], "strings", |value| value.as_str().map(str::to_string))?;
    let ints = stream(&streams[4], "ints", JsonValue::as_i64)?;

    let mut cursor = Signature::default();
    let mut commands = Vec::with_capacity(opcodes.len());
    for opcode in opcodes {
        let op = CanvasOp::from_opcode(opcode)
            .ok_or_else(|| BridgeError::InvalidOperation(format!("opcode {opcode}")))?;
        let signature = op.signature();
        commands.push(DrawCommand {
            op,
            doubles: slice(&doubles, &mut cursor.doubles, signature.doubles, op)?,
            booleans: slice(&booleans, &mut cursor.booleans, signature.booleans, op)?,
            strings: slice(&strings, &mut cursor.strings, signature.strings, op)?,
            ints: slice(&ints, &mut cursor.ints, signature.ints, op)?,
        });
    }
    Ok(commands)
}

fn stream<T>(
    value: &JsonValue,
    name: &str,
    convert: impl Fn(&JsonValue) -> Option<T>,
) -> Result<Vec<T>, BridgeError> {
    value
        .as_array()
        .ok_or_else(|| malformed(&format!("{name} is not an array")))?
        .iter()
        .map(|entry| convert(entry).ok_or_else(|| malformed(&format!("bad entry in {name}"))))
        .collect()
}

fn slice<T: Clone>(
    values: &[T],
    cursor: &mut usize,
    count: usize,
    op: CanvasOp,
) -> Result<Vec<T>, BridgeError> {
    let end = *cursor + count;
    let taken = values
        .get(*cursor..end)
        .ok_or_else(|| malformed(&format!("streams exhausted at {}", op.name())))?
        .to_vec();
    *cursor = end;
    Ok(taken)
}

fn malformed(message: &str) -> BridgeError {
    BridgeError::MalformedPayload(message.to_string())
}
