//! Choice-Based Optimization (CBO, "d-choices").
//!
//! Grounded on `cbo.h`: each sub-queue tags every node with a monotonically
//! increasing stamp at enqueue time; enqueuers/dequeuers shuffle a private
//! `d`-prefix of a per-thread index permutation and pick the sub-queue whose
//! tail/head stamp is lowest among the sampled `d`. A miss falls back to a
//! double-collect sweep across every sub-queue before reporting empty.

use super::RelaxedQueue;
use crate::cache_padded::CachePadded;
use crate::ebr::Reclaimer;
use crate::rdm::Rdm;
use crate::thread_id;
use crate::timing;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Mutex;

struct Node {
    next: AtomicPtr<Node>,
    stamp: u64,
    value: i32,
}

struct SubQueue {
    head: CachePadded<AtomicPtr<Node>>,
    tail: CachePadded<AtomicPtr<Node>>,
}

impl SubQueue {
    fn new() -> Self {
        let sentinel = Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            stamp: 0,
            value: 0,
        }));
        SubQueue {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
        }
    }

    fn tail_stamp(&self) -> u64 {
        unsafe { (*self.tail.load(Ordering::Acquire)).stamp }
    }

    fn head_stamp(&self) -> u64 {
        unsafe { (*self.head.load(Ordering::Acquire)).stamp }
    }

    fn tail_ptr(&self) -> *mut Node {
        self.tail.load(Ordering::Acquire)
    }

    fn enq(&self, value: i32, rdm: &Rdm) {
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let next = unsafe { (*tail).next.load(Ordering::Acquire) };
            if tail != self.tail.load(Ordering::Acquire) {
                continue;
            }
            if next.is_null() {
                let node = Box::into_raw(Box::new(Node {
                    next: AtomicPtr::new(ptr::null_mut()),
                    stamp: unsafe { (*tail).stamp } + 1,
                    value,
                }));
                let guard = rdm.lock_enq();
                let cas = unsafe {
                    (*tail).next.compare_exchange(
                        ptr::null_mut(),
                        node,
                        Ordering::Release,
                        Ordering::Acquire,
                    )
                };
                if cas.is_ok() {
                    rdm.record_enq(node as usize);
                    drop(guard);
                    let _ = self.tail.compare_exchange(
                        tail,
                        node,
                        Ordering::Release,
                        Ordering::Acquire,
                    );
                    return;
                }
                drop(guard);
                unsafe { drop(Box::from_raw(node)) };
            } else {
                let _ =
                    self.tail
                        .compare_exchange(tail, next, Ordering::Release, Ordering::Acquire);
            }
        }
    }

    fn try_deq(&self, ebr: &Reclaimer<Node>, rdm: &Rdm) -> Option<i32> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            let first = unsafe { (*head).next.load(Ordering::Acquire) };
            if head != self.head.load(Ordering::Acquire) {
                continue;
            }
            if first.is_null() {
                return None;
            }
            if head == tail {
                let _ =
                    self.tail
                        .compare_exchange(tail, first, Ordering::Release, Ordering::Acquire);
                continue;
            }
            let value = unsafe { (*first).value };
            let guard = rdm.lock_deq();
            if self
                .head
                .compare_exchange(head, first, Ordering::Release, Ordering::Acquire)
                .is_err()
            {
                continue;
            }
            rdm.record_deq(first as usize);
            drop(guard);
            unsafe { ebr.retire(head) };
            return Some(value);
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

pub struct Cbo {
    d: usize,
    indices: Vec<Mutex<Vec<usize>>>,
    queues: Vec<SubQueue>,
    ebr: Reclaimer<Node>,
    rdm: Rdm,
}

impl Cbo {
    pub fn new(num_queue: usize, num_thread: usize, d: usize) -> Self {
        Cbo {
            d,
            indices: (0..num_thread)
                .map(|_| Mutex::new((0..num_queue).collect()))
                .collect(),
            queues: (0..num_queue).map(|_| SubQueue::new()).collect(),
            ebr: Reclaimer::new(num_thread),
            rdm: Rdm::new(),
        }
    }

    fn shuffle_prefix(&self) -> Vec<usize> {
        let mut indices = self.indices[thread_id::get_index()].lock().unwrap();
        let len = indices.len();
        for i in 0..self.d.min(len) {
            let r = timing::uniform_int(i as i64, (len - 1) as i64) as usize;
            indices.swap(i, r);
        }
        indices[..self.d.min(len)].to_vec()
    }

    fn enqueuer_index(&self) -> usize {
        let sample = self.shuffle_prefix();
        *sample
            .iter()
            .min_by_key(|&&q| self.queues[q].tail_stamp())
            .unwrap()
    }

    fn dequeuer_index(&self) -> usize {
        let sample = self.shuffle_prefix();
        *sample
            .iter()
            .min_by_key(|&&q| self.queues[q].head_stamp())
            .unwrap()
    }

    fn double_collect(&self, start: usize) -> Option<i32> {
        let mut versions = vec![ptr::null_mut(); self.queues.len()];
        let mut start = start;
        loop {
            for i in 0..self.queues.len() {
                let id = (start + i) % self.queues.len();
                versions[id] = self.queues[id].tail_ptr();
                if let Some(v) = self.queues[id].try_deq(&self.ebr, &self.rdm) {
                    return Some(v);
                }
            }

            let mut is_empty = true;
            for (id, &version) in versions.iter().enumerate() {
                if version != self.queues[id].tail_ptr() {
                    is_empty = false;
                    start = id;
                    break;
                }
            }
            if is_empty {
                return None;
            }
        }
    }
}

impl RelaxedQueue for Cbo {
    fn enq(&self, value: i32) {
        self.ebr.start_op();
        self.queues[self.enqueuer_index()].enq(value, &self.rdm);
        self.ebr.end_op();
    }

    fn deq(&self) -> Option<i32> {
        self.ebr.start_op();
        let optimal = self.dequeuer_index();
        let result = self.queues[optimal]
            .try_deq(&self.ebr, &self.rdm)
            .or_else(|| self.double_collect(optimal));
        self.ebr.end_op();
        result
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
        let q = Cbo::new(4, 1, 2);
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
