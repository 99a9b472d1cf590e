//! Timestamped Window Decoupled queue (TSWD).
//!
//! Grounded on `tswd.h`: one sub-queue per thread (no contention on
//! enqueue — a thread only ever appends to its own), each node stamped with
//! a timestamp drawn from a shared `window_put` counter. A dequeuer scans
//! every sub-queue in round robin, only willing to take a node whose
//! timestamp is within `depth` of the shared `window_get` counter; once
//! every sub-queue is either empty or out of window, it advances
//! `window_get` by `depth` and retries.

use super::RelaxedQueue;
use crate::cache_padded::CachePadded;
use crate::ebr::Reclaimer;
use crate::rdm::Rdm;
use crate::thread_id;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

struct Node {
    next: AtomicPtr<Node>,
    time_stamp: u64,
    value: i32,
}

struct Window(CachePadded<AtomicU64>);

impl Window {
    fn new() -> Self {
        Window(CachePadded::new(AtomicU64::new(0)))
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn cas(&self, expected: u64, desired: u64) -> bool {
        self.0
            .compare_exchange(expected, desired, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

struct SubQueue {
    tail: CachePadded<AtomicPtr<Node>>,
    head: CachePadded<AtomicPtr<Node>>,
}

impl SubQueue {
    fn new() -> Self {
        let sentinel = Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            time_stamp: 0,
            value: 0,
        }));
        SubQueue {
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            head: CachePadded::new(AtomicPtr::new(sentinel)),
        }
    }

    fn tail_timestamp(&self) -> u64 {
        unsafe { (*self.tail.load(Ordering::Acquire)).time_stamp }
    }

    fn tail_ptr(&self) -> *mut Node {
        self.tail.load(Ordering::Acquire)
    }

    /// Single-producer append: the owning thread is the only writer, so no
    /// CAS is needed here — only `deq`'s head advance races.
    fn enq(&self, node: *mut Node) {
        let tail = self.tail.load(Ordering::Relaxed);
        unsafe { (*tail).next.store(node, Ordering::Release) };
        self.tail.store(node, Ordering::Release);
    }

    /// `Some(Some(v))` success, `Some(None)` empty, `None` retry required
    /// (first node exists but is outside the current window).
    fn try_deq(
        &self,
        ebr: &Reclaimer<Node>,
        depth: u64,
        get_ts: u64,
        rdm: &Rdm,
    ) -> Option<Option<i32>> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let first = unsafe { (*head).next.load(Ordering::Acquire) };
            if first.is_null() {
                return Some(None);
            }
            if unsafe { (*first).time_stamp } > get_ts + depth {
                return None;
            }
            let value = unsafe { (*first).value };
            let guard = rdm.lock_deq();
            if self
                .head
                .compare_exchange(head, first, Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                rdm.record_deq(first as usize);
                drop(guard);
                unsafe { ebr.retire(head) };
                return Some(Some(value));
            }
        }
    }
}

impl Drop for SubQueue {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            let next = unsafe { (*current).next.load(Ordering::Relaxed) };
            unsafe { drop(Box::from_raw(current)) };
            current = next;
        }
    }
}

pub struct Tswd {
    depth: u64,
    queues: Vec<SubQueue>,
    window_get: Window,
    window_put: Window,
    ebr: Reclaimer<Node>,
    rdm: Rdm,
}

impl Tswd {
    pub fn new(num_thread: usize, depth: u64) -> Self {
        Tswd {
            depth,
            queues: (0..num_thread).map(|_| SubQueue::new()).collect(),
            window_get: Window::new(),
            window_put: Window::new(),
            ebr: Reclaimer::new(num_thread),
            rdm: Rdm::new(),
        }
    }
}

impl RelaxedQueue for Tswd {
    fn enq(&self, value: i32) {
        let guard = self.rdm.lock_enq();
        let mut put_ts = self.window_put.get();
        let node = Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            time_stamp: 0,
            value,
        }));
        self.rdm.record_enq(node as usize);
        drop(guard);

        let my_queue = &self.queues[thread_id::get_index()];
        if my_queue.tail_timestamp() >= put_ts + self.depth {
            self.window_put.cas(put_ts, put_ts + self.depth);
            put_ts += self.depth;
        }
        unsafe { (*node).time_stamp = put_ts.max(my_queue.tail_timestamp()) + 1 };
        my_queue.enq(node);
    }

    fn deq(&self) -> Option<i32> {
        self.ebr.start_op();
        let mut id = thread_id::get_index();
        let mut witness_tails = vec![ptr::null_mut(); self.queues.len()];

        loop {
            let mut empty_count = 0usize;
            let get_ts = self.window_get.get();

            for _ in 0..self.queues.len() {
                match self.queues[id].try_deq(&self.ebr, self.depth, get_ts, &self.rdm) {
                    Some(Some(value)) => {
                        self.ebr.end_op();
                        return Some(value);
                    }
                    Some(None) => {
                        witness_tails[id] = self.queues[id].tail_ptr();
                        empty_count += 1;
                    }
                    None => {}
                }
                id = (id + 1) % self.queues.len();
            }

            if empty_count == self.queues.len() {
                // Every sub-queue looked empty during the sweep, but a
                // concurrent enqueue may have landed on one of them after
                // it was observed. Re-check each witnessed tail before
                // concluding empty; any mismatch means retry from there.
                let mut advanced_at = None;
                for (i, &witness) in witness_tails.iter().enumerate() {
                    if witness != self.queues[i].tail_ptr() {
                        advanced_at = Some(i);
                        break;
                    }
                }
                match advanced_at {
                    Some(i) => {
                        id = i;
                        continue;
                    }
                    None => {
                        self.ebr.end_op();
                        return None;
                    }
                }
            }

            self.window_get.cas(get_ts, get_ts + self.depth);
        }
    }

    fn check_relaxation_distance(&self) {
        self.rdm.enable();
    }

    fn get_relaxation_distance(&self) -> (u64, u64, u64) {
        self.rdm.relaxation_distance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conserves_all_enqueued_elements() {
        thread_id::set(0);
        let q = Tswd::new(1, 4);
        for i in 0..50 {
            q.enq(i);
        }
        let mut drained = vec![];
        while let Some(v) = q.deq() {
            drained.push(v);
        }
        drained.sort_unstable();
        assert_eq!(drained, (0..50).collect::<Vec<_>>());
    }
}
