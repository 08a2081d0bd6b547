//! Command batching between script code and the native runtime.

mod dispatcher;
mod flush;
mod operation;
mod proxy;
mod queue;

use thiserror::Error;

use crate::transport::TransportError;

pub use dispatcher::{DispatchFailurePolicy, FlushReport, NativeBridge};
pub use flush::{FlushListener, FlushSignal, ListenerId};
pub use operation::Operation;
pub use proxy::NativeObject;
pub use queue::OperationQueue;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("malformed drawing payload: {0}")]
    MalformedPayload(String),
    #[error("object '{0}' is disposed")]
    Disposed(String),
    #[error("native {operation} for '{id}' failed")]
    Dispatch {
        operation: &'static str,
        id: String,
        #[source]
        source: TransportError,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}
