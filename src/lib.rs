//! Command batching between synchronous script code and a native object runtime.

pub mod bridge;
pub mod canvas;
pub mod config;
pub mod js;
pub mod transport;

pub use bridge::{BridgeError, NativeBridge, NativeObject, Operation};
pub use canvas::{GraphicsContext, PackerKind};
pub use config::BridgeConfig;
pub use js::ScriptHost;
pub use transport::{MemoryTransport, NativeTransport, RecordingTransport, TransportCall};
