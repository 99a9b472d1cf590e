//! Graph core: adjacency storage, deterministic generation, binary I/O, and
//! the two BFS variants spec.md §3/§4.M/§6 call for — the relaxed parallel
//! frontier search that drives macrobenchmarks, and the single-threaded
//! strict-FIFO reference search used as ground truth.
//!
//! Grounded on `graph.h`/`graph.cpp`: the generator lays a chain backbone
//! `i <-> i+1` then sprinkles a bounded number of extra edges per vertex
//! using a seeded PRNG, mirroring `Graph::Generate`'s `std::mt19937
//! re{2025}` so a given `(num_vertex, max_adj, seed)` always produces the
//! same graph across runs — a detail spec.md's distillation left as
//! "deterministic seeded pseudo-random generator" without pinning the seed.

use crate::algorithms::RelaxedQueue;
use crate::error::GraphIoError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// The fixed PRNG seed `graph.cpp::Generate` pins to.
pub const DEFAULT_SEED: u64 = 2025;

pub struct Graph {
    adjacency: Vec<Vec<u32>>,
    distances: Vec<AtomicI32>,
    terminated: AtomicBool,
}

impl Graph {
    /// Deterministically generate a graph of `num_vertex` vertices: a chain
    /// backbone `i <-> i+1` plus up to `max_adj` extra edges per vertex.
    /// Grounded on `Graph::Generate`'s edge-sprinkling loop (the `step`
    /// stride, the reciprocal 5%-acceptance probe, and the per-row
    /// Fisher-Yates shuffle at the end of each outer iteration).
    pub fn generate(num_vertex: usize, max_adj: usize, seed: u64) -> Self {
        let num_vertex = num_vertex.max(1);
        let mut adjacency: Vec<Vec<u32>> = vec![Vec::new(); num_vertex];
        let mut rng = StdRng::seed_from_u64(seed);

        for i in 0..num_vertex.saturating_sub(1) {
            adjacency[i].push((i + 1) as u32);
            adjacency[i + 1].push(i as u32);

            let step = rng.gen_range(0..100usize);
            if step <= 1 {
                continue;
            }

            let mut j = 1usize;
            loop {
                let next = i + step * j;
                if next >= num_vertex || adjacency[i].len() >= max_adj {
                    break;
                }
                if adjacency[next].len() < max_adj && rng.gen_range(0..100) < 5 {
                    adjacency[i].push(next as u32);
                    adjacency[next].push(i as u32);
                }
                j += 1;
            }

            let row = &mut adjacency[i];
            for j in (1..row.len()).rev() {
                let r = rng.gen_range(0..=j);
                row.swap(j, r);
            }
        }

        Graph {
            adjacency,
            distances: Self::fresh_distances(num_vertex),
            terminated: AtomicBool::new(false),
        }
    }

    fn fresh_distances(num_vertex: usize) -> Vec<AtomicI32> {
        (0..num_vertex)
            .map(|i| AtomicI32::new(if i == 0 { 0 } else { i32::MAX }))
            .collect()
    }

    pub fn num_vertex(&self) -> usize {
        self.adjacency.len()
    }

    pub fn num_edges(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn destination(&self) -> usize {
        self.adjacency.len() - 1
    }

    pub fn distance(&self, vertex: usize) -> i32 {
        self.distances[vertex].load(Ordering::Acquire)
    }

    fn cas_distance(&self, vertex: usize, expected: i32, desired: i32) -> bool {
        self.distances[vertex]
            .compare_exchange(expected, desired, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `distances[0] = 0`, every other vertex `INT_MAX`, termination flag
    /// cleared (spec.md §4.M).
    pub fn reset(&self) {
        self.distances[0].store(0, Ordering::Relaxed);
        for d in &self.distances[1..] {
            d.store(i32::MAX, Ordering::Relaxed);
        }
        self.terminated.store(false, Ordering::Relaxed);
    }

    /// Parallel relaxed-BFS worker body (spec.md §4.K): dequeue a frontier
    /// vertex, CAS each neighbor's distance down from its current value,
    /// enqueue neighbors that improved. Returns the distance this thread
    /// observed at the destination, either because it discovered it
    /// directly or because another thread's discovery set the termination
    /// flag first.
    pub fn relaxed_bfs(&self, num_thread: usize, queue: &dyn RelaxedQueue) -> i32 {
        let dst = self.destination();
        loop {
            if self.terminated.load(Ordering::Acquire) {
                return self.distance(dst);
            }

            let Some(v) = queue.deq() else {
                if num_thread == 1 {
                    return self.distance(dst);
                }
                continue;
            };
            let v = v as usize;
            let cost = self.distance(v);

            for &adj in &self.adjacency[v] {
                let adj = adj as usize;
                if adj == dst {
                    loop {
                        let expected = self.distance(dst);
                        if expected <= cost + 1 || self.cas_distance(dst, expected, cost + 1) {
                            break;
                        }
                    }
                    self.terminated.store(true, Ordering::Release);
                    return cost + 1;
                }
                loop {
                    let expected = self.distance(adj);
                    if expected <= cost + 1 {
                        break;
                    }
                    if self.cas_distance(adj, expected, cost + 1) {
                        queue.enq(adj as i32);
                        break;
                    }
                }
            }
        }
    }

    /// Single-threaded strict-FIFO BFS, the ground truth every relaxed run
    /// is compared against (spec.md §4.M, grounded on
    /// `graph.cpp::SingleThreadBFS`).
    pub fn reference_bfs(&self) -> i32 {
        self.reset();
        let dst = self.destination();
        let mut queue = VecDeque::new();
        queue.push_back(0usize);

        while let Some(v) = queue.pop_front() {
            if v == dst {
                break;
            }
            let cost = self.distance(v) + 1;
            for &adj in &self.adjacency[v] {
                let adj = adj as usize;
                if cost < self.distance(adj) {
                    self.distances[adj].store(cost, Ordering::Relaxed);
                    queue.push_back(adj);
                }
            }
        }
        self.distance(dst)
    }

    /// Load from the binary layout in spec.md §6: `i32 num_vertex`, then
    /// per vertex `i32 num_adj` followed by `num_adj * i32` neighbor ids,
    /// then a trailing `i32 shortest_distance` ground truth.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, i32), GraphIoError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GraphIoError::NotFound(path.to_path_buf()),
            _ => GraphIoError::Io(e),
        })?;
        let mut reader = BufReader::new(file);

        let num_vertex = read_i32(&mut reader)? as usize;
        let mut adjacency = Vec::with_capacity(num_vertex);
        for _ in 0..num_vertex {
            let num_adj = read_i32(&mut reader)? as usize;
            let mut adj = Vec::with_capacity(num_adj);
            for _ in 0..num_adj {
                adj.push(read_i32(&mut reader)? as u32);
            }
            adjacency.push(adj);
        }
        if adjacency.is_empty() {
            adjacency.push(Vec::new());
        }
        let shortest_distance = read_i32(&mut reader)?;

        let graph = Graph {
            distances: Self::fresh_distances(adjacency.len()),
            adjacency,
            terminated: AtomicBool::new(false),
        };
        Ok((graph, shortest_distance))
    }

    /// Save in the same layout `load` reads, alongside a known-good
    /// `shortest_distance` (typically `reference_bfs()`'s result).
    pub fn save(&self, path: impl AsRef<Path>, shortest_distance: i32) -> Result<(), GraphIoError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write_i32(&mut writer, self.adjacency.len() as i32)?;
        for adj in &self.adjacency {
            write_i32(&mut writer, adj.len() as i32)?;
            for &n in adj {
                write_i32(&mut writer, n as i32)?;
            }
        }
        write_i32(&mut writer, shortest_distance)?;
        writer.flush()?;
        Ok(())
    }
}

fn read_i32(r: &mut impl Read) -> Result<i32, GraphIoError> {
    let mut buf = [0u8; 4];
    let mut got = 0usize;
    while got < 4 {
        let n = r.read(&mut buf[got..])?;
        if n == 0 {
            return Err(GraphIoError::ShortRead { expected: 4, got });
        }
        got += n;
    }
    Ok(i32::from_le_bytes(buf))
}

fn write_i32(w: &mut impl Write, v: i32) -> Result<(), GraphIoError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::dqrr::Dqrr;
    use crate::thread_id;

    #[test]
    fn reset_restores_unvisited_baseline() {
        let graph = Graph::generate(16, 4, DEFAULT_SEED);
        graph.distances[3].store(7, Ordering::Relaxed);
        graph.terminated.store(true, Ordering::Relaxed);
        graph.reset();
        assert_eq!(graph.distance(0), 0);
        assert_eq!(graph.distance(3), i32::MAX);
        assert!(!graph.terminated.load(Ordering::Relaxed));
    }

    #[test]
    fn reference_bfs_finds_chain_shortest_path() {
        // A pure chain backbone: 0-1-2-...-(n-1). No shortcuts, so the
        // shortest distance to the last vertex is exactly n - 1.
        let graph = Graph::generate(32, 0, DEFAULT_SEED);
        let dist = graph.reference_bfs();
        assert_eq!(dist, 31);
    }

    #[test]
    fn relaxed_bfs_single_thread_matches_reference() {
        thread_id::set(0);
        let graph = Graph::generate(64, 6, DEFAULT_SEED);
        let reference = graph.reference_bfs();

        graph.reset();
        let queue = Dqrr::new(1, 1, 1);
        queue.enq(0);
        let relaxed = graph.relaxed_bfs(1, &queue);

        assert_eq!(relaxed, reference);
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let graph = Graph::generate(20, 5, DEFAULT_SEED);
        let truth = graph.reference_bfs();

        let dir = std::env::temp_dir();
        let path = dir.join(format!("relaxq-graph-test-{}.bin", std::process::id()));
        graph.save(&path, truth).unwrap();

        let (loaded, loaded_truth) = Graph::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded_truth, truth);
        assert_eq!(loaded.num_vertex(), graph.num_vertex());
        assert_eq!(loaded.num_edges(), graph.num_edges());
    }

    #[test]
    fn load_missing_file_reports_not_found() {
        let err = Graph::load("/nonexistent/relaxq-graph.bin").unwrap_err();
        assert!(matches!(err, GraphIoError::NotFound(_)));
    }
}
