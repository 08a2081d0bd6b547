use super::operation::Operation;
use crate::transport::Properties;

/// FIFO buffer of pending operations with adjacency-based `set` coalescing.
///
/// The coalescing target is always the last queued operation when it is a `create` or
/// `set`, and is cleared by `listen`, `destroy` and every drain.
#[derive(Debug, Default)]
pub struct OperationQueue {
    operations: Vec<Operation>,
    coalesce_target: Option<usize>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_create(
        &mut self,
        id: impl Into<String>,
        object_type: impl Into<String>,
        properties: Properties,
    ) {
        self.operations.push(Operation::Create {
            id: id.into(),
            object_type: object_type.into(),
            properties,
        });
        self.coalesce_target = Some(self.operations.len() - 1);
    }

    /// Merges into the pending `create`/`set` for `id` when it is the coalescing target,
    /// otherwise appends a new `set`.
    pub fn enqueue_set(&mut self, id: &str, properties: Properties) {
        if let Some(pending) = self.coalescable(id) {
            pending.extend(properties);
            return;
        }
        self.operations.push(Operation::Set {
            id: id.to_string(),
            properties,
        });
        self.coalesce_target = Some(self.operations.len() - 1);
    }

    pub fn enqueue_listen(&mut self, id: impl Into<String>, event: impl Into<String>, enabled: bool) {
        self.operations.push(Operation::Listen {
            id: id.into(),
            event: event.into(),
            enabled,
        });
        self.coalesce_target = None;
    }

    pub fn enqueue_destroy(&mut self, id: impl Into<String>) {
        self.operations.push(Operation::Destroy { id: id.into() });
        self.coalesce_target = None;
    }

    /// Removes every pending operation in submission order.
    pub fn take(&mut self) -> Vec<Operation> {
        self.coalesce_target = None;
        std::mem::take(&mut self.operations)
    }

    /// Puts operations back ahead of anything queued since they were taken.
    pub fn requeue_front(&mut self, operations: Vec<Operation>) {
        if operations.is_empty() {
            return;
        }
        let newer = std::mem::replace(&mut self.operations, operations);
        self.operations.extend(newer);
        self.coalesce_target = None;
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn coalescable(&mut self, id: &str) -> Option<&mut Properties> {
        let index = self.coalesce_target?;
        let operation = self.operations.get_mut(index)?;
        if operation.id() != id {
            return None;
        }
        operation.properties_mut()
    }
}
