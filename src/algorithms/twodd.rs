//! 2D-design queue (2Dd).
//!
//! Grounded on `twodd.h`: `width` sub-queues arranged so each node carries a
//! per-sub-queue sequence number (`cnt`). Two shared windows (`max_get`,
//! `max_put`) bound how far ahead of the slowest sub-queue an enqueuer or
//! dequeuer may roam before it must advance the window and retry. A thread
//! "hops" between sub-queues — alternating a random jump and a linear
//! step — until it finds one inside the current window or has visited all
//! `width` of them.

use super::RelaxedQueue;
use crate::cache_padded::CachePadded;
use crate::ebr::Reclaimer;
use crate::rdm::Rdm;
use crate::timing;
use std::cell::Cell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

struct Node {
    next: AtomicPtr<Node>,
    cnt: u64,
    value: i32,
}

struct PaddedPtr(CachePadded<AtomicPtr<Node>>);

struct Window(CachePadded<AtomicU64>);

impl Window {
    fn new(initial: u64) -> Self {
        Window(CachePadded::new(AtomicU64::new(initial)))
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

thread_local! {
    static ROAM_INDEX: Cell<usize> = const { Cell::new(0) };
}

pub struct TwoDd {
    depth: u64,
    width: usize,
    heads: Vec<PaddedPtr>,
    tails: Vec<PaddedPtr>,
    window_get: Window,
    window_put: Window,
    ebr: Reclaimer<Node>,
    rdm: Rdm,
}

impl TwoDd {
    pub fn new(num_queue: usize, num_thread: usize, depth: u64) -> Self {
        let sentinels: Vec<*mut Node> = (0..num_queue)
            .map(|_| {
                Box::into_raw(Box::new(Node {
                    next: AtomicPtr::new(ptr::null_mut()),
                    cnt: 0,
                    value: 0,
                }))
            })
            .collect();
        TwoDd {
            depth,
            width: num_queue,
            heads: sentinels
                .iter()
                .map(|&s| PaddedPtr(CachePadded::new(AtomicPtr::new(s))))
                .collect(),
            tails: sentinels
                .iter()
                .map(|&s| PaddedPtr(CachePadded::new(AtomicPtr::new(s))))
                .collect(),
            window_get: Window::new(depth),
            window_put: Window::new(depth),
            ebr: Reclaimer::new(num_thread),
            rdm: Rdm::new(),
        }
    }

    fn hop(&self, random_streak: &mut u64, hops: &mut u64) {
        if *random_streak < 2 {
            *random_streak += 1;
            ROAM_INDEX.with(|c| c.set(timing::uniform_int(0, self.width as i64 - 1) as usize));
        } else {
            *hops += 1;
            ROAM_INDEX.with(|c| c.set((c.get() + 1) % self.width));
        }
    }

    fn roam_index(&self, has_contended: &mut bool) -> usize {
        if *has_contended {
            ROAM_INDEX.with(|c| c.set(timing::uniform_int(0, self.width as i64 - 1) as usize));
            *has_contended = false;
        }
        ROAM_INDEX.with(|c| c.get())
    }

    fn get_tail(&self, has_contended: &mut bool) -> *mut Node {
        let mut loc_max = [self.window_put.get(); 2];
        let mut random_streak = 0u64;
        let mut hops = 0u64;
        let mut index = self.roam_index(has_contended);

        loop {
            let tail = self.tails[index].0.load(Ordering::Acquire);
            loc_max[1] = self.window_put.get();
            if loc_max[0] != loc_max[1] {
                loc_max[0] = loc_max[1];
                hops = 0;
            } else if unsafe { (*tail).cnt } < loc_max[1] {
                return tail;
            } else if hops != self.width as u64 {
                self.hop(&mut random_streak, &mut hops);
            } else {
                if loc_max[0] == self.window_put.get() {
                    self.window_put.cas(loc_max[0], loc_max[0] + self.depth);
                }
                loc_max[0] = self.window_put.get();
                hops = 0;
            }
            index = ROAM_INDEX.with(|c| c.get());
        }
    }

    fn get_head(&self, has_contended: &mut bool) -> usize {
        let mut loc_max = [self.window_get.get(); 2];
        let mut random_streak = 0u64;
        let mut hops = 0u64;
        let mut is_empty = true;
        let mut index = self.roam_index(has_contended);

        loop {
            let head = self.heads[index].0.load(Ordering::Acquire);
            let put_cnt = unsafe { (*self.tails[index].0.load(Ordering::Acquire)).cnt };
            loc_max[1] = self.window_get.get();

            if loc_max[0] != loc_max[1] {
                loc_max[0] = loc_max[1];
                hops = 0;
                is_empty = true;
            } else if unsafe { (*head).cnt } < loc_max[1] && put_cnt != unsafe { (*head).cnt } {
                return index;
            } else if hops != self.width as u64 {
                if is_empty && put_cnt != unsafe { (*head).cnt } {
                    is_empty = false;
                }
                self.hop(&mut random_streak, &mut hops);
            } else if !is_empty {
                if loc_max[0] == self.window_get.get() {
                    self.window_get.cas(loc_max[0], loc_max[0] + self.depth);
                }
                loc_max[0] = self.window_get.get();
                hops = 0;
                is_empty = true;
            } else {
                return index;
            }
            index = ROAM_INDEX.with(|c| c.get());
        }
    }
}

impl RelaxedQueue for TwoDd {
    fn enq(&self, value: i32) {
        self.ebr.start_op();
        let mut has_contended = false;
        loop {
            let tail = self.get_tail(&mut has_contended);
            let node = Box::into_raw(Box::new(Node {
                next: AtomicPtr::new(ptr::null_mut()),
                cnt: unsafe { (*tail).cnt } + 1,
                value,
            }));
            if unsafe { (*tail).next.load(Ordering::Acquire) }.is_null() {
                let guard = self.rdm.lock_enq();
                let cas = unsafe {
                    (*tail).next.compare_exchange(
                        ptr::null_mut(),
                        node,
                        Ordering::Release,
                        Ordering::Acquire,
                    )
                };
                if cas.is_ok() {
                    self.rdm.record_enq(node as usize);
                    drop(guard);
                    let index = ROAM_INDEX.with(|c| c.get());
                    if self.tails[index]
                        .0
                        .compare_exchange(tail, node, Ordering::Release, Ordering::Acquire)
                        .is_err()
                    {
                        has_contended = true;
                    }
                    self.ebr.end_op();
                    return;
                }
                drop(guard);
                unsafe { drop(Box::from_raw(node)) };
                has_contended = true;
            } else {
                unsafe { drop(Box::from_raw(node)) };
                has_contended = true;
            }
        }
    }

    fn deq(&self) -> Option<i32> {
        self.ebr.start_op();
        let mut has_contended = false;
        loop {
            let index = self.get_head(&mut has_contended);
            let head = self.heads[index].0.load(Ordering::Acquire);
            let tail = self.tails[index].0.load(Ordering::Acquire);
            let first = unsafe { (*head).next.load(Ordering::Acquire) };

            if head == tail {
                if first.is_null() {
                    self.ebr.end_op();
                    return None;
                }
                if self.tails[index]
                    .0
                    .compare_exchange(head, first, Ordering::Release, Ordering::Acquire)
                    .is_err()
                {
                    has_contended = true;
                }
                continue;
            }

            let guard = self.rdm.lock_deq();
            if self.heads[index]
                .0
                .compare_exchange(head, first, Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                self.rdm.record_deq(first as usize);
                drop(guard);
                let value = unsafe { (*first).value };
                unsafe { self.ebr.retire(head) };
                self.ebr.end_op();
                return Some(value);
            }
            drop(guard);
            has_contended = true;
        }
    }

    fn check_relaxation_distance(&self) {
        self.rdm.enable();
    }

    fn get_relaxation_distance(&self) -> (u64, u64, u64) {
        self.rdm.relaxation_distance()
    }
}

impl Drop for TwoDd {
    fn drop(&mut self) {
        // Each sub-queue's tail lies somewhere along its own head's chain,
        // so walking from `heads` alone visits every node exactly once.
        for head in &self.heads {
            let mut current = head.0.load(Ordering::Relaxed);
            while !current.is_null() {
                let next = unsafe { (*current).next.load(Ordering::Relaxed) };
                unsafe { drop(Box::from_raw(current)) };
                current = next;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread_id;

    #[test]
    fn conserves_all_enqueued_elements() {
        thread_id::set(0);
        let q = TwoDd::new(4, 1, 8);
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
