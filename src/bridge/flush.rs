use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{BridgeError, NativeBridge};

/// Callback run at every flush point, before the bridge drains its own queue.
pub type FlushListener = Box<dyn FnMut(&mut NativeBridge) -> Result<(), BridgeError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

type SharedListener = Rc<RefCell<FlushListener>>;

/// Ordered subscriber list for the end-of-turn flush signal.
///
/// Ids increase monotonically, so "the next listener after the one that just ran" is
/// well defined even when the list is edited mid-dispatch: listeners added during a
/// dispatch run in the same pass, and removed ones that have not run yet are skipped.
#[derive(Default)]
pub struct FlushSignal {
    next_id: u64,
    listeners: Vec<(ListenerId, SharedListener)>,
}

impl FlushSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: FlushListener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, Rc::new(RefCell::new(listener))));
        id
    }

    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|(listener_id, _)| *listener_id == id)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub(crate) fn next_after(&self, cursor: Option<ListenerId>) -> Option<(ListenerId, SharedListener)> {
        self.listeners
            .iter()
            .find(|(id, _)| cursor.map_or(true, |last| *id > last))
            .map(|(id, listener)| (*id, Rc::clone(listener)))
    }
}

impl fmt::Debug for FlushSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushSignal")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> FlushListener {
        Box::new(|_| Ok(()))
    }

    #[test]
    fn cursor_walks_in_registration_order() {
        let mut signal = FlushSignal::new();
        let first = signal.register(noop());
        let second = signal.register(noop());

        assert_eq!(signal.next_after(None).map(|(id, _)| id), Some(first));
        assert_eq!(signal.next_after(Some(first)).map(|(id, _)| id), Some(second));
        assert!(signal.next_after(Some(second)).is_none());
    }

    #[test]
    fn unregister_skips_removed_listener() {
        let mut signal = FlushSignal::new();
        let first = signal.register(noop());
        let second = signal.register(noop());
        let third = signal.register(noop());

        assert!(signal.unregister(second));
        assert!(!signal.unregister(second));
        assert_eq!(signal.next_after(Some(first)).map(|(id, _)| id), Some(third));
        assert!(!signal.contains(second));
    }
}
