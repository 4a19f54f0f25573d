use std::sync::atomic::Ordering;

use crate::engine::EngineView;
use crate::view::ViewEntry;

/// Deferred input or script action, run against the view's engine object on
/// the engine thread when the host pumps the queue.
pub type ViewOperation = Box<dyn FnOnce(&mut dyn EngineView) + Send>;

/// Clears a view's in-flight flag when dropped, so an operation that never
/// reaches the engine thread (executor already closed, task dropped) cannot
/// wedge the queue.
pub struct InFlightGuard {
    entry: std::sync::Arc<ViewEntry>,
}

impl InFlightGuard {
    /// Try to claim the view's single processing slot.
    pub fn claim(entry: &std::sync::Arc<ViewEntry>) -> Option<Self> {
        if entry
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(Self {
                entry: entry.clone(),
            })
        } else {
            None
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.entry.in_flight.store(false, Ordering::Release);
    }
}

impl ViewEntry {
    /// Append an operation, honoring the per-view capacity. Returns false
    /// (and drops the operation) when the queue is full.
    pub fn enqueue(&self, op: ViewOperation, capacity: usize) -> bool {
        let mut ops = self.ops.lock().unwrap();
        if ops.len() >= capacity {
            log::error!(
                "View {}: operation queue overflow ({} queued), dropping operation",
                self.id,
                ops.len()
            );
            return false;
        }
        ops.push_back(op);
        true
    }

    /// Take the oldest queued operation, if any.
    pub fn pop_operation(&self) -> Option<ViewOperation> {
        self.ops.lock().unwrap().pop_front()
    }

    /// Drop every queued operation. Returns how many were discarded.
    pub fn clear_operations(&self) -> usize {
        let mut ops = self.ops.lock().unwrap();
        let discarded = ops.len();
        ops.clear();
        discarded
    }

    pub fn queue_size(&self) -> usize {
        self.ops.lock().unwrap().len()
    }

    /// True while an operation is being marshaled to the engine thread.
    pub fn is_processing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ViewId;
    use std::sync::Arc;

    fn entry() -> Arc<ViewEntry> {
        Arc::new(ViewEntry::new(ViewId(7), String::new(), 28, 0))
    }

    fn noop() -> ViewOperation {
        Box::new(|_| {})
    }

    #[test]
    fn queue_never_exceeds_capacity() {
        let entry = entry();
        for _ in 0..5 {
            assert!(entry.enqueue(noop(), 5));
        }
        assert!(!entry.enqueue(noop(), 5));
        assert_eq!(entry.queue_size(), 5);
    }

    #[test]
    fn operations_come_back_in_fifo_order() {
        let entry = entry();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            entry.enqueue(
                Box::new(move |_| log.lock().unwrap().push(i)),
                100,
            );
        }

        let mut stub = crate::engine::stub::StubEngineView::detached();
        while let Some(op) = entry.pop_operation() {
            op(&mut stub);
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn in_flight_slot_is_exclusive_and_released_on_drop() {
        let e = entry();
        let guard = InFlightGuard::claim(&e).expect("first claim succeeds");
        assert!(e.is_processing());
        assert!(InFlightGuard::claim(&e).is_none());

        drop(guard);
        assert!(!e.is_processing());
        assert!(InFlightGuard::claim(&e).is_some());
    }

    #[test]
    fn clear_reports_discarded_count() {
        let e = entry();
        for _ in 0..4 {
            e.enqueue(noop(), 100);
        }
        assert_eq!(e.clear_operations(), 4);
        assert_eq!(e.queue_size(), 0);
    }
}
