use serde::{Deserialize, Serialize};

use crate::transport::{NativeTransport, Properties, TransportError};

/// A buffered mutation waiting for the next flush.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
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
}

impl Operation {
    pub fn id(&self) -> &str {
        match self {
            Operation::Create { id, .. }
            | Operation::Set { id, .. }
            | Operation::Listen { id, .. }
            | Operation::Destroy { id } => id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create { .. } => "create",
            Operation::Set { .. } => "set",
            Operation::Listen { .. } => "listen",
            Operation::Destroy { .. } => "destroy",
        }
    }

    /// Property bag a later `set` on the same id may merge into.
    pub(crate) fn properties_mut(&mut self) -> Option<&mut Properties> {
        match self {
            Operation::Create { properties, .. } | Operation::Set { properties, .. } => {
                Some(properties)
            }
            Operation::Listen { .. } | Operation::Destroy { .. } => None,
        }
    }

    pub(crate) fn dispatch(&self, transport: &mut dyn NativeTransport) -> Result<(), TransportError> {
        match self {
            Operation::Create {
                id,
                object_type,
                properties,
            } => transport.create(id, object_type, properties),
            Operation::Set { id, properties } => transport.set(id, properties),
            Operation::Listen { id, event, enabled } => transport.listen(id, event, *enabled),
            Operation::Destroy { id } => transport.destroy(id),
        }
    }
}
