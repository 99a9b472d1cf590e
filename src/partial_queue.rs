//! Generic Michael-Scott partial queue.
//!
//! Every relaxation algorithm (component family in `algorithms/`) is built
//! from some fixed number of these: a strictly-FIFO lock-free queue that
//! owns its own nodes and reclaims them through an [`EbrReclaimer`]. The
//! CAS-loop shape (load, build a private node, CAS the tail/head forward,
//! retry on conflict) mirrors the teacher's `TreiberStack`/`MsQueue` in
//! `stack_queue.rs`; the tagged-pointer ABA guard that module uses is
//! replaced here by epoch-based reclamation, since a node can only be freed
//! once every thread has left the epoch in which it was unlinked — the same
//! safety property the tag bits gave the teacher, provided a different way.

use crate::ebr::Reclaimer;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

struct Node<T> {
    value: Option<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value: None,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }

    fn with_value(value: T) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value: Some(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// Outcome of a bounded dequeue attempt, distinguishing "nothing here right
/// now" from "the queue was observed empty" — the double-collect empty
/// check from spec.md §4.D needs the distinction to decide whether a probe
/// may stop retrying.
pub enum DeqOutcome<T> {
    Success(T),
    Contended,
    Empty,
}

/// A single Michael-Scott queue: head and tail are stored separately and
/// cache-line padded since they're written by disjoint operations (deq
/// advances head, enq advances tail) and false-sharing between them would
/// otherwise dominate the benchmark itself.
pub struct PartialQueue<T> {
    head: crate::cache_padded::CachePadded<AtomicPtr<Node<T>>>,
    tail: crate::cache_padded::CachePadded<AtomicPtr<Node<T>>>,
}

unsafe impl<T: Send> Send for PartialQueue<T> {}
unsafe impl<T: Send> Sync for PartialQueue<T> {}

impl<T> PartialQueue<T> {
    pub fn new() -> Self {
        let sentinel = Node::sentinel();
        PartialQueue {
            head: crate::cache_padded::CachePadded::new(AtomicPtr::new(sentinel)),
            tail: crate::cache_padded::CachePadded::new(AtomicPtr::new(sentinel)),
        }
    }

    /// Identity of this queue's current head node, for relaxation-distance
    /// logging — stable across a single successful `try_deq`.
    pub fn head_id(&self) -> usize {
        self.head.load(Ordering::Acquire) as usize
    }

    pub fn enq(&self, value: T, ebr: &Reclaimer<Node<T>>) {
        let new_node = Node::with_value(value);
        ebr.start_op();
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*tail).next.load(Ordering::Acquire) };

            if next.is_null() {
                let cas = unsafe {
                    (*tail).next.compare_exchange(
                        ptr::null_mut(),
                        new_node,
                        Ordering::Release,
                        Ordering::Acquire,
                    )
                };
                if cas.is_ok() {
                    let _ = self.tail.compare_exchange(
                        tail,
                        new_node,
                        Ordering::Release,
                        Ordering::Acquire,
                    );
                    break;
                }
            } else {
                // Tail lagged behind; help it along before retrying.
                let _ =
                    self.tail
                        .compare_exchange(tail, next, Ordering::Release, Ordering::Acquire);
            }
        }
        ebr.end_op();
    }

    /// Unconditional dequeue used by algorithms that don't need the
    /// contended/empty distinction (e.g. the reference single-threaded
    /// drain in tests).
    pub fn try_deq(&self, ebr: &Reclaimer<Node<T>>) -> Option<T> {
        ebr.start_op();
        let result = loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*head).next.load(Ordering::Acquire) };

            if head == tail {
                if next.is_null() {
                    break None;
                }
                // Tail lagged behind a completed enqueue; help it along.
                let _ =
                    self.tail
                        .compare_exchange(tail, next, Ordering::Release, Ordering::Acquire);
                continue;
            }

            let value = unsafe { (*next).value.as_ref() };
            if value.is_none() {
                // Shouldn't happen: every non-sentinel node carries a value.
                continue;
            }

            if self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                let value = unsafe { (*next).value.take() };
                unsafe { ebr.retire(head) };
                break value;
            }
        };
        ebr.end_op();
        result
    }

    /// Dequeue that reports contention distinctly from emptiness, via a
    /// double collect of `(head, tail)` — the protocol spec.md §4.D calls
    /// for so a caller can decide whether to fall back to a sibling queue
    /// instead of spinning against this one.
    pub fn try_deq_bounded(&self, ebr: &Reclaimer<Node<T>>) -> DeqOutcome<T> {
        ebr.start_op();
        let first_head = self.head.load(Ordering::Acquire);
        let first_tail = self.tail.load(Ordering::Acquire);
        let second_head = self.head.load(Ordering::Acquire);

        if first_head != second_head {
            ebr.end_op();
            return DeqOutcome::Contended;
        }

        let next = unsafe { (*first_head).next.load(Ordering::Acquire) };
        if first_head == first_tail && next.is_null() {
            ebr.end_op();
            return DeqOutcome::Empty;
        }

        if first_head == first_tail {
            let _ = self.tail.compare_exchange(
                first_tail,
                next,
                Ordering::Release,
                Ordering::Acquire,
            );
            ebr.end_op();
            return DeqOutcome::Contended;
        }

        let outcome = if self
            .head
            .compare_exchange(first_head, next, Ordering::Release, Ordering::Acquire)
            .is_ok()
        {
            let value = unsafe { (*next).value.take() };
            unsafe { ebr.retire(first_head) };
            match value {
                Some(v) => DeqOutcome::Success(v),
                None => DeqOutcome::Contended,
            }
        } else {
            DeqOutcome::Contended
        };
        ebr.end_op();
        outcome
    }

    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let next = unsafe { (*head).next.load(Ordering::Acquire) };
        next.is_null()
    }
}

impl<T> Drop for PartialQueue<T> {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            let next = unsafe { (*current).next.load(Ordering::Relaxed) };
            unsafe { drop(Box::from_raw(current)) };
            current = next;
        }
    }
}

impl<T> Default for PartialQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_within_single_thread() {
        crate::thread_id::set(0);
        let ebr: Reclaimer<Node<i32>> = Reclaimer::new(1);
        let q = PartialQueue::new();

        q.enq(1, &ebr);
        q.enq(2, &ebr);
        q.enq(3, &ebr);

        assert_eq!(q.try_deq(&ebr), Some(1));
        assert_eq!(q.try_deq(&ebr), Some(2));
        assert_eq!(q.try_deq(&ebr), Some(3));
        assert_eq!(q.try_deq(&ebr), None);
    }

    #[test]
    fn empty_queue_reports_empty_not_contended() {
        crate::thread_id::set(0);
        let ebr: Reclaimer<Node<i32>> = Reclaimer::new(1);
        let q: PartialQueue<i32> = PartialQueue::new();

        match q.try_deq_bounded(&ebr) {
            DeqOutcome::Empty => {}
            _ => panic!("expected Empty on a freshly constructed queue"),
        }
    }

    #[test]
    fn concurrent_enqueues_conserve_all_elements() {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Arc;

        let q = Arc::new(PartialQueue::new());
        let ebr = Arc::new(Reclaimer::<Node<i32>>::new(4));
        let produced = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for t in 0..4 {
            let q = Arc::clone(&q);
            let ebr = Arc::clone(&ebr);
            let produced = Arc::clone(&produced);
            handles.push(std::thread::spawn(move || {
                crate::thread_id::set(t);
                for i in 0..100 {
                    q.enq(i, &ebr);
                    produced.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        crate::thread_id::set(0);
        let mut drained = 0;
        while q.try_deq(&ebr).is_some() {
            drained += 1;
        }
        assert_eq!(drained, produced.load(Ordering::Relaxed));
    }
}
