use std::collections::{BTreeSet, HashMap};

use serde_json::Value as JsonValue;
use tracing::debug;

use super::{NativeTransport, Properties, TransportError};
use crate::canvas::{decode_packed, GC_TYPE};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeObjectState {
    pub object_type: String,
    pub properties: Properties,
    pub listening: BTreeSet<String>,
    pub commands_drawn: usize,
}

/// A native runtime stand-in that keeps objects in memory.
///
/// `set` merges into the stored bag, `get` answers from it, and `draw` calls on canvas
/// objects are decoded and counted the way a native renderer would consume them.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    objects: HashMap<String, NativeObjectState>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, id: &str) -> Option<&NativeObjectState> {
        self.objects.get(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn object_mut(&mut self, id: &str) -> Result<&mut NativeObjectState, TransportError> {
        self.objects
            .get_mut(id)
            .ok_or_else(|| TransportError::UnknownObject { id: id.to_string() })
    }

    fn draw(&mut self, id: &str, parameters: &Properties) -> Result<JsonValue, TransportError> {
        let drawn = if let Some(packed) = parameters.get("packedOperations") {
            decode_packed(packed)
                .map_err(|err| TransportError::Rejected {
                    primitive: "call",
                    id: id.to_string(),
                    message: err.to_string(),
                })?
                .len()
        } else if let Some(JsonValue::Array(operations)) = parameters.get("operations") {
            operations.len()
        } else {
            return Err(TransportError::Rejected {
                primitive: "call",
                id: id.to_string(),
                message: "draw without operations".to_string(),
            });
        };

        let object = self.object_mut(id)?;
        object.commands_drawn += drawn;
        debug!(target: "native", %id, drawn, "draw");
        Ok(JsonValue::from(drawn))
    }
}

impl NativeTransport for MemoryTransport {
    fn create(
        &mut self,
        id: &str,
        object_type: &str,
        properties: &Properties,
    ) -> Result<(), TransportError> {
        if self.objects.contains_key(id) {
            return Err(TransportError::Rejected {
                primitive: "create",
                id: id.to_string(),
                message: "object already exists".to_string(),
            });
        }
        self.objects.insert(
            id.to_string(),
            NativeObjectState {
                object_type: object_type.to_string(),
                properties: properties.clone(),
                ..NativeObjectState::default()
            },
        );
        Ok(())
    }

    fn set(&mut self, id: &str, properties: &Properties) -> Result<(), TransportError> {
        let object = self.object_mut(id)?;
        for (key, value) in properties {
            object.properties.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn listen(&mut self, id: &str, event: &str, enabled: bool) -> Result<(), TransportError> {
        let object = self.object_mut(id)?;
        if enabled {
            object.listening.insert(event.to_string());
        } else {
            object.listening.remove(event);
        }
        Ok(())
    }

    fn destroy(&mut self, id: &str) -> Result<(), TransportError> {
        self.objects
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TransportError::UnknownObject { id: id.to_string() })
    }

    fn get(&mut self, id: &str, property: &str) -> Result<JsonValue, TransportError> {
        let object = self.object_mut(id)?;
        object
            .properties
            .get(property)
            .cloned()
            .ok_or_else(|| TransportError::UnknownProperty {
                id: id.to_string(),
                property: property.to_string(),
            })
    }

    fn call(
        &mut self,
        id: &str,
        method: &str,
        parameters: &Properties,
    ) -> Result<JsonValue, TransportError> {
        let object_type = self.object_mut(id)?.object_type.clone();
        match method {
            "draw" if object_type == GC_TYPE => self.draw(id, parameters),
            "draw" => Err(TransportError::UnsupportedMethod {
                id: id.to_string(),
                method: method.to_string(),
            }),
            _ => Ok(JsonValue::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: JsonValue) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn set_merges_into_created_properties() {
        let mut native = MemoryTransport::new();
        native
            .create("$1", "Button", &props(json!({"text": "a", "enabled": true})))
            .unwrap();
        native.set("$1", &props(json!({"text": "b"}))).unwrap();

        assert_eq!(native.get("$1", "text").unwrap(), json!("b"));
        assert_eq!(native.get("$1", "enabled").unwrap(), json!(true));
    }

    #[test]
    fn destroyed_objects_are_unknown() {
        let mut native = MemoryTransport::new();
        native.create("$1", "Composite", &Properties::new()).unwrap();
        native.destroy("$1").unwrap();

        assert_eq!(
            native.get("$1", "bounds"),
            Err(TransportError::UnknownObject { id: "$1".into() })
        );
        assert!(native.is_empty());
    }

    #[test]
    fn draw_only_on_canvas_objects() {
        let mut native = MemoryTransport::new();
        native.create("$1", "Button", &Properties::new()).unwrap();
        let result = native.call("$1", "draw", &props(json!({"operations": []})));
        assert!(matches!(result, Err(TransportError::UnsupportedMethod { .. })));
    }

    #[test]
    fn listen_tracks_enabled_events() {
        let mut native = MemoryTransport::new();
        native.create("$1", "Button", &Properties::new()).unwrap();
        native.listen("$1", "select", true).unwrap();
        native.listen("$1", "tap", true).unwrap();
        native.listen("$1", "select", false).unwrap();

        let listening: Vec<_> = native.object("$1").unwrap().listening.iter().cloned().collect();
        assert_eq!(listening, vec!["tap".to_string()]);
    }
}
