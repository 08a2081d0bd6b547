use serde_json::Value as JsonValue;
use tracing::debug;

use super::{BridgeError, NativeBridge};
use crate::transport::Properties;

/// Script-side handle for one native object.
///
/// Every method goes through the bridge passed in, so mutations queue and reads flush
/// exactly as direct bridge calls would. Once disposed, the handle refuses all work.
#[derive(Debug)]
pub struct NativeObject {
    id: String,
    object_type: String,
    disposed: bool,
}

impl NativeObject {
    /// Allocates an id and queues the `create`.
    pub fn create(bridge: &mut NativeBridge, object_type: &str, properties: Properties) -> Self {
        let id = bridge.allocate_id();
        bridge.enqueue_create(id.clone(), object_type, properties);
        Self {
            id,
            object_type: object_type.to_string(),
            disposed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn set(&self, bridge: &mut NativeBridge, properties: Properties) -> Result<(), BridgeError> {
        self.ensure_live()?;
        bridge.enqueue_set(&self.id, properties);
        Ok(())
    }

    pub fn set_property(
        &self,
        bridge: &mut NativeBridge,
        name: &str,
        value: impl Into<JsonValue>,
    ) -> Result<(), BridgeError> {
        let mut properties = Properties::new();
        properties.insert(name.to_string(), value.into());
        self.set(bridge, properties)
    }

    pub fn get(&self, bridge: &mut NativeBridge, name: &str) -> Result<JsonValue, BridgeError> {
        self.ensure_live()?;
        bridge.get(&self.id, name)
    }

    pub fn call(
        &self,
        bridge: &mut NativeBridge,
        method: &str,
        parameters: &Properties,
    ) -> Result<JsonValue, BridgeError> {
        self.ensure_live()?;
        bridge.call(&self.id, method, parameters)
    }

    pub fn listen(
        &self,
        bridge: &mut NativeBridge,
        event: &str,
        enabled: bool,
    ) -> Result<(), BridgeError> {
        self.ensure_live()?;
        bridge.enqueue_listen(self.id.clone(), event, enabled);
        Ok(())
    }

    /// Queues a single `destroy`; later calls are no-ops.
    pub fn dispose(&mut self, bridge: &mut NativeBridge) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        bridge.enqueue_destroy(self.id.clone());
        debug!(target: "bridge", id = %self.id, object_type = %self.object_type, "disposed");
    }

    fn ensure_live(&self) -> Result<(), BridgeError> {
        if self.disposed {
            return Err(BridgeError::Disposed(self.id.clone()));
        }
        Ok(())
    }
}
