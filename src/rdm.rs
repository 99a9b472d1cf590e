//! Relaxation-distance manager.
//!
//! Grounded on `relaxation_distance.h::RelaxationDistanceManager`. Disabled
//! by default: hooks are no-ops and the serializing mutexes are never
//! acquired, so throughput runs pay nothing for instrumentation they don't
//! request. Once enabled, every successful enqueue/dequeue commits inside a
//! coarse-grained mutex specifically so the logged order coincides with the
//! linearized order of successful commits (spec.md §4.E, §9).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// An opaque, comparable identity for a node — its address is enough since
/// nodes are never moved once published.
pub type NodeId = usize;

struct EnqLog {
    id: NodeId,
}

pub struct Rdm {
    enabled: AtomicBool,
    enq_mutex: Mutex<()>,
    deq_mutex: Mutex<()>,
    enq_logs: Mutex<VecDeque<EnqLog>>,
    deq_log: Mutex<VecDeque<NodeId>>,
}

impl Default for Rdm {
    fn default() -> Self {
        Rdm {
            enabled: AtomicBool::new(false),
            enq_mutex: Mutex::new(()),
            deq_mutex: Mutex::new(()),
            enq_logs: Mutex::new(VecDeque::new()),
            deq_log: Mutex::new(VecDeque::new()),
        }
    }
}

impl Rdm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable instrumentation for all subsequent operations. Must be called
    /// before timing begins (spec.md §6).
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Acquire the enqueue-side serializing mutex. No-op when disabled.
    pub fn lock_enq(&self) -> Option<MutexGuard<'_, ()>> {
        self.is_enabled().then(|| self.enq_mutex.lock().unwrap())
    }

    /// Acquire the dequeue-side serializing mutex. No-op when disabled.
    pub fn lock_deq(&self) -> Option<MutexGuard<'_, ()>> {
        self.is_enabled().then(|| self.deq_mutex.lock().unwrap())
    }

    /// Record a successful enqueue's node identity. Must be called while
    /// holding the guard from [`lock_enq`](Self::lock_enq).
    pub fn record_enq(&self, id: NodeId) {
        if !self.is_enabled() {
            return;
        }
        self.enq_logs.lock().unwrap().push_back(EnqLog { id });
    }

    /// Record a successful dequeue's node identity. Must be called while
    /// holding the guard from [`lock_deq`](Self::lock_deq).
    pub fn record_deq(&self, id: NodeId) {
        if !self.is_enabled() {
            return;
        }
        self.deq_log.lock().unwrap().push_back(id);
    }

    /// Destructively compute `(num_dequeued, sum_distance, max_distance)`.
    ///
    /// For each dequeue, in order, scan the enqueue log for the first entry
    /// matching its node identity; the number of earlier, still-unconsumed
    /// enqueue entries is that dequeue's relaxation distance. The matched
    /// entry is removed so later dequeues don't re-match it.
    pub fn relaxation_distance(&self) -> (u64, u64, u64) {
        if !self.is_enabled() {
            return (0, 0, 0);
        }

        let deq_log = self.deq_log.lock().unwrap();
        let mut enq_logs = self.enq_logs.lock().unwrap();

        let mut sum_rd: u64 = 0;
        let mut max_rd: u64 = 0;

        for &target in deq_log.iter() {
            let mut earlier_still_present: u64 = 0;
            let mut matched_at = None;

            for (idx, entry) in enq_logs.iter().enumerate() {
                if entry.id == target {
                    matched_at = Some(idx);
                    break;
                }
                earlier_still_present += 1;
            }

            if let Some(idx) = matched_at {
                enq_logs.remove(idx);
                sum_rd += earlier_still_present;
                max_rd = max_rd.max(earlier_still_present);
            }
        }

        (deq_log.len() as u64, sum_rd, max_rd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_is_free_and_reports_zero() {
        let rdm = Rdm::new();
        assert!(rdm.lock_enq().is_none());
        rdm.record_enq(1);
        assert_eq!(rdm.relaxation_distance(), (0, 0, 0));
    }

    #[test]
    fn strict_fifo_has_zero_relaxation() {
        let rdm = Rdm::new();
        rdm.enable();

        for id in [1usize, 2, 3, 4, 5] {
            let _g = rdm.lock_enq();
            rdm.record_enq(id);
        }
        for id in [1usize, 2, 3, 4, 5] {
            let _g = rdm.lock_deq();
            rdm.record_deq(id);
        }

        let (num, sum, max) = rdm.relaxation_distance();
        assert_eq!(num, 5);
        assert_eq!(sum, 0);
        assert_eq!(max, 0);
    }

    #[test]
    fn out_of_order_dequeue_has_nonzero_relaxation() {
        let rdm = Rdm::new();
        rdm.enable();

        for id in [1usize, 2, 3] {
            let _g = rdm.lock_enq();
            rdm.record_enq(id);
        }
        // Dequeue the third-enqueued element first: 1 and 2 are still
        // present in the enqueue log, so its relaxation distance is 2.
        {
            let _g = rdm.lock_deq();
            rdm.record_deq(3);
        }
        {
            let _g = rdm.lock_deq();
            rdm.record_deq(1);
        }
        {
            let _g = rdm.lock_deq();
            rdm.record_deq(2);
        }

        let (num, _sum, max) = rdm.relaxation_distance();
        assert_eq!(num, 3);
        assert_eq!(max, 2);
    }
}
