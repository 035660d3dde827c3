//! Batch Coordinator Module
//!
//! Change events for cache mutations, and the coordinator that groups the
//! events of several mutations into a single dispatch pass. Dispatch itself
//! happens on a broadcast channel owned by the engine; the coordinator only
//! decides *when* an event leaves the engine.

// == Change Kind ==
/// Classification of a cache mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A new key was stored
    Added,
    /// An existing key was overwritten
    Updated,
    /// Explicit removal by the caller
    Removed,
    /// Removal under size pressure
    Evicted,
    /// Removal because the TTL elapsed
    Expired,
    /// Removal by a bulk clear
    Cleared,
}

// == Cache Event ==
/// One change record, dispatched to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
    /// The affected key
    pub key: String,
    /// What happened to it
    pub kind: ChangeKind,
}

impl CacheEvent {
    pub fn new(key: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            key: key.into(),
            kind,
        }
    }
}

// == Batch Coordinator ==
/// Buffers change events while a batch is open.
///
/// `begin` suppresses individual dispatch; `commit` hands back everything
/// buffered, in order, for one dispatch pass; `end` clears batch state
/// whether or not commit ran, so no buffered record leaks into unrelated
/// operations.
#[derive(Debug, Default)]
pub struct BatchCoordinator {
    open: bool,
    buffer: Vec<CacheEvent>,
}

impl BatchCoordinator {
    /// Creates a coordinator with no batch open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a batch is currently open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Opens a batch. Opening an already-open batch keeps buffered events.
    pub fn begin(&mut self) {
        self.open = true;
    }

    /// Routes one event: buffered when a batch is open, otherwise returned
    /// for immediate dispatch.
    pub fn record(&mut self, event: CacheEvent) -> Option<CacheEvent> {
        if self.open {
            self.buffer.push(event);
            None
        } else {
            Some(event)
        }
    }

    /// Drains buffered events for a single dispatch pass. The batch stays
    /// open until `end`.
    pub fn commit(&mut self) -> Vec<CacheEvent> {
        std::mem::take(&mut self.buffer)
    }

    /// Closes the batch and discards anything still buffered.
    pub fn end(&mut self) {
        self.open = false;
        self.buffer.clear();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_batch_dispatches_immediately() {
        let mut batch = BatchCoordinator::new();
        let event = CacheEvent::new("k", ChangeKind::Added);
        assert_eq!(batch.record(event.clone()), Some(event));
    }

    #[test]
    fn test_open_batch_buffers() {
        let mut batch = BatchCoordinator::new();
        batch.begin();
        assert!(batch.is_open());

        assert!(batch.record(CacheEvent::new("a", ChangeKind::Added)).is_none());
        assert!(batch.record(CacheEvent::new("a", ChangeKind::Updated)).is_none());
        assert!(batch.record(CacheEvent::new("b", ChangeKind::Added)).is_none());

        // Commit flushes everything once, preserving order and classification
        let flushed = batch.commit();
        assert_eq!(
            flushed,
            vec![
                CacheEvent::new("a", ChangeKind::Added),
                CacheEvent::new("a", ChangeKind::Updated),
                CacheEvent::new("b", ChangeKind::Added),
            ]
        );
        assert!(batch.commit().is_empty(), "second commit flushes nothing");
    }

    #[test]
    fn test_end_discards_uncommitted_events() {
        let mut batch = BatchCoordinator::new();
        batch.begin();
        batch.record(CacheEvent::new("a", ChangeKind::Added));
        batch.end();

        assert!(!batch.is_open());
        assert!(batch.commit().is_empty());

        // Post-end events dispatch immediately again
        let event = CacheEvent::new("b", ChangeKind::Removed);
        assert_eq!(batch.record(event.clone()), Some(event));
    }
}
