use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use super::opcode::CanvasOp;
use crate::bridge::BridgeError;
use crate::transport::Properties;

/// Which packing strategy a canvas uses; fixed when the canvas is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackerKind {
    /// Five parallel typed streams plus opcodes.
    #[default]
    Parallel,
    /// One `[name, args...]` array per operation.
    Flat,
}

impl PackerKind {
    pub fn build(self) -> Box<dyn OperationPacker> {
        match self {
            PackerKind::Parallel => Box::new(ParallelStreamPacker::default()),
            PackerKind::Flat => Box::new(FlatOperationPacker::default()),
        }
    }
}

/// Accumulates drawing operations between flushes.
///
/// Callers append exactly the arguments each operation's signature asks for; nothing
/// here checks arity.
pub trait OperationPacker {
    fn push_op(&mut self, op: CanvasOp);

    fn add_double(&mut self, values: &[f64]);

    fn add_boolean(&mut self, values: &[bool]);

    fn add_string(&mut self, values: &[&str]);

    fn add_int(&mut self, values: &[i32]);

    /// Number of operations since the last flush.
    fn pending(&self) -> usize;

    /// Returns the `draw` parameters and resets, or `None` when nothing is pending.
    fn take_payload(&mut self) -> Option<Properties>;

    fn clear(&mut self);

    fn add_operation(&mut self, name: &str) -> Result<(), BridgeError> {
        self.push_op(CanvasOp::from_name(name)?);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.pending() == 0
    }
}

#[derive(Debug, Default)]
pub struct ParallelStreamPacker {
    opcodes: Vec<i32>,
    doubles: Vec<f64>,
    booleans: Vec<bool>,
    strings: Vec<String>,
    ints: Vec<i32>,
}

impl ParallelStreamPacker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OperationPacker for ParallelStreamPacker {
    fn push_op(&mut self, op: CanvasOp) {
        self.opcodes.push(op.opcode());
    }

    fn add_double(&mut self, values: &[f64]) {
        self.doubles.extend_from_slice(values);
    }

    fn add_boolean(&mut self, values: &[bool]) {
        self.booleans.extend_from_slice(values);
    }

    fn add_string(&mut self, values: &[&str]) {
        self.strings.extend(values.iter().map(|value| value.to_string()));
    }

    fn add_int(&mut self, values: &[i32]) {
        self.ints.extend_from_slice(values);
    }

    fn pending(&self) -> usize {
        self.opcodes.len()
    }

    fn take_payload(&mut self) -> Option<Properties> {
        if self.opcodes.is_empty() {
            return None;
        }
        let packed = json!([
            std::mem::take(&mut self.opcodes),
            std::mem::take(&mut self.doubles),
            std::mem::take(&mut self.booleans),
            std::mem::take(&mut self.strings),
            std::mem::take(&mut self.ints),
        ]);
        let mut payload = Properties::new();
        payload.insert("packedOperations".to_string(), packed);
        Some(payload)
    }

    fn clear(&mut self) {
        self.opcodes.clear();
        self.doubles.clear();
        self.booleans.clear();
        self.strings.clear();
        self.ints.clear();
    }
}

#[derive(Debug, Default)]
pub struct FlatOperationPacker {
    operations: Vec<Vec<JsonValue>>,
}

impl FlatOperationPacker {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&mut self, values: impl IntoIterator<Item = JsonValue>) {
        match self.operations.last_mut() {
            Some(current) => current.extend(values),
            None => warn!(target: "canvas", "argument without operation dropped"),
        }
    }
}

impl OperationPacker for FlatOperationPacker {
    fn push_op(&mut self, op: CanvasOp) {
        self.operations.push(vec![JsonValue::from(op.name())]);
    }

    fn add_double(&mut self, values: &[f64]) {
        self.append(values.iter().map(|value| JsonValue::from(*value)));
    }

    fn add_boolean(&mut self, values: &[bool]) {
        self.append(values.iter().map(|value| JsonValue::from(*value)));
    }

    fn add_string(&mut self, values: &[&str]) {
        self.append(values.iter().map(|value| JsonValue::from(*value)));
    }

    fn add_int(&mut self, values: &[i32]) {
        self.append(values.iter().map(|value| JsonValue::from(*value)));
    }

    fn pending(&self) -> usize {
        self.operations.len()
    }

    fn take_payload(&mut self) -> Option<Properties> {
        if self.operations.is_empty() {
            return None;
        }
        let mut payload = Properties::new();
        payload.insert(
            "operations".to_string(),
            json!(std::mem::take(&mut self.operations)),
        );
        Some(payload)
    }

    fn clear(&mut self) {
        self.operations.clear();
    }
}
