//! The boundary to the native object runtime.
//!
//! Everything the bridge sends across the boundary goes through one of the six
//! primitives on [`NativeTransport`]. The native side itself lives elsewhere; this
//! module only ships the trait plus two stand-ins used by the runner and the tests.

mod memory;
mod recording;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

pub use memory::MemoryTransport;
pub use recording::{CallLog, RecordingTransport};

/// String-keyed property bag sent with `create`, `set` and `call`.
pub type Properties = JsonMap<String, JsonValue>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("unknown native object '{id}'")]
    UnknownObject { id: String },
    #[error("native object '{id}' has no property '{property}'")]
    UnknownProperty { id: String, property: String },
    #[error("native object '{id}' does not support method '{method}'")]
    UnsupportedMethod { id: String, method: String },
    #[error("native {primitive} failed for '{id}': {message}")]
    Rejected {
        primitive: &'static str,
        id: String,
        message: String,
    },
}

/// The six primitives a native runtime must offer the bridge.
///
/// Mutating primitives are fire-and-forget from the script's point of view; only
/// `get` and `call` hand a value (or an error) back to the caller.
pub trait NativeTransport {
    fn create(&mut self, id: &str, object_type: &str, properties: &Properties)
        -> Result<(), TransportError>;

    fn set(&mut self, id: &str, properties: &Properties) -> Result<(), TransportError>;

    fn listen(&mut self, id: &str, event: &str, enabled: bool) -> Result<(), TransportError>;

    fn destroy(&mut self, id: &str) -> Result<(), TransportError>;

    fn get(&mut self, id: &str, property: &str) -> Result<JsonValue, TransportError>;

    fn call(
        &mut self,
        id: &str,
        method: &str,
        parameters: &Properties,
    ) -> Result<JsonValue, TransportError>;
}

impl<T: NativeTransport + ?Sized> NativeTransport for Box<T> {
    fn create(
        &mut self,
        id: &str,
        object_type: &str,
        properties: &Properties,
    ) -> Result<(), TransportError> {
        (**self).create(id, object_type, properties)
    }

    fn set(&mut self, id: &str, properties: &Properties) -> Result<(), TransportError> {
        (**self).set(id, properties)
    }

    fn listen(&mut self, id: &str, event: &str, enabled: bool) -> Result<(), TransportError> {
        (**self).listen(id, event, enabled)
    }

    fn destroy(&mut self, id: &str) -> Result<(), TransportError> {
        (**self).destroy(id)
    }

    fn get(&mut self, id: &str, property: &str) -> Result<JsonValue, TransportError> {
        (**self).get(id, property)
    }

    fn call(
        &mut self,
        id: &str,
        method: &str,
        parameters: &Properties,
    ) -> Result<JsonValue, TransportError> {
        (**self).call(id, method, parameters)
    }
}

/// One primitive invocation as seen at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "primitive", rename_all = "snake_case")]
pub enum TransportCall {
    Create {
        id: String,
        #[serde(rename = "type")]
        object_type: String,
        properties: Properties,
    },
    Set {
        id: String,
        properties: Properties,
    },
    Listen {
        id: String,
        event: String,
        enabled: bool,
    },
    Destroy {
        id: String,
    },
    Get {
        id: String,
        property: String,
    },
    Call {
        id: String,
        method: String,
        parameters: Properties,
    },
}

impl TransportCall {
    pub fn id(&self) -> &str {
        match self {
            TransportCall::Create { id, .. }
            | TransportCall::Set { id, .. }
            | TransportCall::Listen { id, .. }
            | TransportCall::Destroy { id }
            | TransportCall::Get { id, .. }
            | TransportCall::Call { id, .. } => id,
        }
    }

    pub fn primitive(&self) -> &'static str {
        match self {
            TransportCall::Create { .. } => "create",
            TransportCall::Set { .. } => "set",
            TransportCall::Listen { .. } => "listen",
            TransportCall::Destroy { .. } => "destroy",
            TransportCall::Get { .. } => "get",
            TransportCall::Call { .. } => "call",
        }
    }
}

/// Accepts every mutation and answers every read with `null`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl NativeTransport for NullTransport {
    fn create(&mut self, _: &str, _: &str, _: &Properties) -> Result<(), TransportError> {
        Ok(())
    }

    fn set(&mut self, _: &str, _: &Properties) -> Result<(), TransportError> {
        Ok(())
    }

    fn listen(&mut self, _: &str, _: &str, _: bool) -> Result<(), TransportError> {
        Ok(())
    }

    fn destroy(&mut self, _: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn get(&mut self, _: &str, _: &str) -> Result<JsonValue, TransportError> {
        Ok(JsonValue::Null)
    }

    fn call(&mut self, _: &str, _: &str, _: &Properties) -> Result<JsonValue, TransportError> {
        Ok(JsonValue::Null)
    }
}
