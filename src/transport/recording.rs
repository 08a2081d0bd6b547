use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value as JsonValue;

use super::{NativeTransport, NullTransport, Properties, TransportCall, TransportError};

/// Shared, append-only record of primitive calls.
///
/// Cloning yields another handle onto the same log, so a test can keep one while the
/// transport itself is moved into the bridge.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Rc<RefCell<Vec<TransportCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: TransportCall) {
        self.calls.borrow_mut().push(call);
    }

    pub fn snapshot(&self) -> Vec<TransportCall> {
        self.calls.borrow().clone()
    }

    pub fn drain(&self) -> Vec<TransportCall> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }

    /// Primitive names in call order, e.g. `["create", "set", "get"]`.
    pub fn primitives(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(TransportCall::primitive).collect()
    }
}

/// Records every primitive into a [`CallLog`] before forwarding it to `inner`.
///
/// A call is logged even when `inner` rejects it, since the attempt did cross the
/// boundary.
pub struct RecordingTransport<T = NullTransport> {
    inner: T,
    log: CallLog,
}

impl RecordingTransport<NullTransport> {
    pub fn new() -> Self {
        Self::wrap(NullTransport)
    }
}

impl Default for RecordingTransport<NullTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NativeTransport> RecordingTransport<T> {
    pub fn wrap(inner: T) -> Self {
        Self {
            inner,
            log: CallLog::new(),
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl<T: NativeTransport> NativeTransport for RecordingTransport<T> {
    fn create(
        &mut self,
        id: &str,
        object_type: &str,
        properties: &Properties,
    ) -> Result<(), TransportError> {
        self.log.push(TransportCall::Create {
            id: id.to_string(),
            object_type: object_type.to_string(),
            properties: properties.clone(),
        });
        self.inner.create(id, object_type, properties)
    }

    fn set(&mut self, id: &str, properties: &Properties) -> Result<(), TransportError> {
        self.log.push(TransportCall::Set {
            id: id.to_string(),
            properties: properties.clone(),
        });
        self.inner.set(id, properties)
    }

    fn listen(&mut self, id: &str, event: &str, enabled: bool) -> Result<(), TransportError> {
        self.log.push(TransportCall::Listen {
            id: id.to_string(),
            event: event.to_string(),
            enabled,
        });
        self.inner.listen(id, event, enabled)
    }

    fn destroy(&mut self, id: &str) -> Result<(), TransportError> {
        self.log.push(TransportCall::Destroy { id: id.to_string() });
        self.inner.destroy(id)
    }

    fn get(&mut self, id: &str, property: &str) -> Result<JsonValue, TransportError> {
        self.log.push(TransportCall::Get {
            id: id.to_string(),
            property: property.to_string(),
        });
        self.inner.get(id, property)
    }

    fn call(
        &mut self,
        id: &str,
        method: &str,
        parameters: &Properties,
    ) -> Result<JsonValue, TransportError> {
        self.log.push(TransportCall::Call {
            id: id.to_string(),
            method: method.to_string(),
            parameters: parameters.clone(),
        });
        self.inner.call(id, method, parameters)
    }
}
