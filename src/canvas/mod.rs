//! Batched drawing: primitives are packed locally and shipped as one `draw` call.

mod context;
mod opcode;
mod packer;

pub use context::{GraphicsContext, GC_TYPE};
pub use opcode::{decode_packed, CanvasOp, DrawCommand, Signature};
pub use packer::{FlatOperationPacker, OperationPacker, PackerKind, ParallelStreamPacker};
