//! Per-invocation completion tracking.
//!
//! A batch resolves exactly once: `Succeeded` when every object stream has
//! finished producing records and every produced record has been acknowledged
//! by the sink, or `Failed` on the first source or write error. The counters
//! live in a context owned by the invocation, never in process-global state,
//! so concurrent invocations inside one process cannot bleed into each other.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

/// Terminal outcome of one batch invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Succeeded { documents: u64 },
    Failed { reason: String },
}

/// Shared state for one batch: production/acknowledgment counters, the number
/// of object streams still draining, and the single-resolution outcome signal.
///
/// The completion predicate is evaluated after every acknowledgment and after
/// every production-finished signal; it requires both `open_objects == 0` and
/// `acknowledged == produced`, so a transient count equality while a stream is
/// still draining can never resolve the batch early.
pub struct BatchContext {
    produced: AtomicU64,
    acknowledged: AtomicU64,
    open_objects: AtomicUsize,
    outcome_tx: Mutex<Option<oneshot::Sender<BatchOutcome>>>,
}

impl BatchContext {
    /// Creates the context for a batch of `object_count` streams and the
    /// receiver the invocation awaits. An empty batch resolves `Succeeded`
    /// with zero documents immediately.
    pub fn new(object_count: usize) -> (std::sync::Arc<Self>, oneshot::Receiver<BatchOutcome>) {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let context = std::sync::Arc::new(Self {
            produced: AtomicU64::new(0),
            acknowledged: AtomicU64::new(0),
            open_objects: AtomicUsize::new(object_count),
            outcome_tx: Mutex::new(Some(outcome_tx)),
        });
        context.try_resolve();
        (context, outcome_rx)
    }

    /// Records one produced record. Called by the pipeline before the record's
    /// write is dispatched, so `produced` is never behind an acknowledgment.
    pub fn record_produced(&self) {
        self.produced.fetch_add(1, Ordering::SeqCst);
    }

    /// Records one write acknowledged by the sink and re-evaluates completion.
    pub fn record_acknowledged(&self) {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
        self.try_resolve();
    }

    /// Marks one object stream as fully drained and re-evaluates completion.
    pub fn object_finished(&self) {
        self.open_objects.fetch_sub(1, Ordering::SeqCst);
        self.try_resolve();
    }

    /// Resolves the batch `Failed`. First terminal transition wins; later
    /// calls (including a concurrent success) are no-ops.
    pub fn fail(&self, reason: impl Into<String>) {
        self.resolve(BatchOutcome::Failed {
            reason: reason.into(),
        });
    }

    /// Current `(produced, acknowledged)` counters, for progress logging.
    pub fn counts(&self) -> (u64, u64) {
        (
            self.produced.load(Ordering::SeqCst),
            self.acknowledged.load(Ordering::SeqCst),
        )
    }

    fn try_resolve(&self) {
        if self.open_objects.load(Ordering::SeqCst) != 0 {
            return;
        }
        let produced = self.produced.load(Ordering::SeqCst);
        let acknowledged = self.acknowledged.load(Ordering::SeqCst);
        if acknowledged == produced {
            debug!(produced, acknowledged, "completion predicate satisfied");
            self.resolve(BatchOutcome::Succeeded {
                documents: acknowledged,
            });
        }
    }

    fn resolve(&self, outcome: BatchOutcome) {
        let sender = self
            .outcome_tx
            .lock()
            .expect("batch outcome lock poisoned")
            .take();
        if let Some(sender) = sender {
            // The receiver may already be gone if the invocation was torn
            // down; resolution is still terminal either way.
            let _ = sender.send(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_succeeded_once_all_production_and_acks_converge() {
        let (context, mut outcome_rx) = BatchContext::new(1);

        context.record_produced();
        context.record_produced();
        context.record_acknowledged();
        context.record_acknowledged();
        // Counts are equal but the object stream is still draining.
        assert!(outcome_rx.try_recv().is_err());

        context.object_finished();
        assert_eq!(
            outcome_rx.try_recv().unwrap(),
            BatchOutcome::Succeeded { documents: 2 }
        );
    }

    #[test]
    fn does_not_resolve_while_acks_lag_production() {
        let (context, mut outcome_rx) = BatchContext::new(1);

        context.record_produced();
        context.object_finished();
        assert!(outcome_rx.try_recv().is_err());

        context.record_acknowledged();
        assert_eq!(
            outcome_rx.try_recv().unwrap(),
            BatchOutcome::Succeeded { documents: 1 }
        );
    }

    #[test]
    fn transient_equality_mid_production_does_not_resolve() {
        let (context, mut outcome_rx) = BatchContext::new(2);

        context.record_produced();
        context.record_acknowledged();
        context.object_finished();
        // One object fully drained and acknowledged, the other still open.
        assert!(outcome_rx.try_recv().is_err());

        context.record_produced();
        context.object_finished();
        context.record_acknowledged();
        assert_eq!(
            outcome_rx.try_recv().unwrap(),
            BatchOutcome::Succeeded { documents: 2 }
        );
    }

    #[test]
    fn first_failure_wins_even_with_writes_outstanding() {
        let (context, mut outcome_rx) = BatchContext::new(1);

        context.record_produced();
        context.record_produced();
        context.fail("search store rejected document");

        // A late acknowledgment and stream completion must not override the
        // terminal failure.
        context.record_acknowledged();
        context.record_acknowledged();
        context.object_finished();

        assert_eq!(
            outcome_rx.try_recv().unwrap(),
            BatchOutcome::Failed {
                reason: "search store rejected document".to_string()
            }
        );
    }

    #[test]
    fn empty_batch_resolves_succeeded_immediately() {
        let (_context, mut outcome_rx) = BatchContext::new(0);
        assert_eq!(
            outcome_rx.try_recv().unwrap(),
            BatchOutcome::Succeeded { documents: 0 }
        );
    }

    #[test]
    fn zero_line_object_resolves_after_drain() {
        let (context, mut outcome_rx) = BatchContext::new(1);
        assert!(outcome_rx.try_recv().is_err());
        context.object_finished();
        assert_eq!(
            outcome_rx.try_recv().unwrap(),
            BatchOutcome::Succeeded { documents: 0 }
        );
    }
}
