use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vestry_core::assessment::AssessmentId;

/// Per-assessment async mutexes serializing mutating operations.
///
/// Different assessments proceed concurrently; two writers against the same
/// assessment queue behind one lock. The stored version check still guards
/// against writers outside this process.
#[derive(Default)]
pub struct AssessmentLocks {
    inner: Mutex<HashMap<AssessmentId, Arc<tokio::sync::Mutex<()>>>>,
}

impl AssessmentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_assessment(&self, id: AssessmentId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("assessment lock map poisoned");
        // Entries nobody holds a handle to are dropped, so the map stays
        // bounded by the assessments with an operation in flight.
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_assessment_shares_a_lock() {
        let locks = AssessmentLocks::new();
        let id = AssessmentId::new_v4();

        let lock = locks.for_assessment(id);
        let guard = lock.lock().await;

        let same = locks.for_assessment(id);
        assert!(same.try_lock().is_err());
        drop(guard);
        assert!(same.try_lock().is_ok());
    }

    #[tokio::test]
    async fn quiet_entries_are_evicted_while_held_ones_survive() {
        let locks = AssessmentLocks::new();
        let quiet = AssessmentId::new_v4();
        let busy = AssessmentId::new_v4();

        drop(locks.for_assessment(quiet));
        let held = locks.for_assessment(busy);
        let _guard = held.lock().await;

        // A later lookup sweeps the released entry and keeps the held one.
        let other = locks.for_assessment(AssessmentId::new_v4());
        {
            let map = locks.inner.lock().unwrap();
            assert!(!map.contains_key(&quiet));
            assert!(map.contains_key(&busy));
        }
        assert!(locks.for_assessment(busy).try_lock().is_err());
        drop(other);
    }

    #[tokio::test]
    async fn different_assessments_are_independent() {
        let locks = AssessmentLocks::new();
        let a = locks.for_assessment(AssessmentId::new_v4());
        let b = locks.for_assessment(AssessmentId::new_v4());

        let _guard = a.lock().await;
        assert!(b.try_lock().is_ok());
    }
}
