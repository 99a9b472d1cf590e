//! Lock-free, linearizable k-relaxed FIFO queues for shared-memory
//! multiprocessors, plus the epoch-based reclaimer, relaxation-distance
//! manager, and benchmark harness they're built on.
//!
//! Eight concrete algorithms live under [`algorithms`]; [`driver::Subject`]
//! names them and [`driver::build_subject`] constructs one behind the
//! [`algorithms::RelaxedQueue`] trait object the rest of the crate programs
//! against.

pub mod algorithms;
pub mod cache_padded;
pub mod cli;
pub mod driver;
pub mod ebr;
pub mod error;
pub mod graph;
pub mod partial_queue;
pub mod rdm;
pub mod thread_id;
pub mod timing;
pub mod worker;
