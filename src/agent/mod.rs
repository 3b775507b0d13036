// SYNOID Agent Modules
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Content-driven decision engines: what a section "feels" like, how to cut
// into it, and how the camera should move over still images.

pub mod ken_burns;
pub mod semantic_analyzer;
pub mod sentiment;
pub mod transition_engine;

use crate::error::{Result, TimelineError};

/// Build a bounded rayon pool for `jobs` independent tasks.
///
/// Never more threads than jobs, never more than `workers`, never zero.
pub fn worker_pool(workers: usize, jobs: usize) -> Result<rayon::ThreadPool> {
    let threads = workers.min(jobs).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("synoid-worker-{}", i))
        .build()
        .map_err(|e| TimelineError::Worker(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_pool_is_bounded_by_jobs() {
        let pool = worker_pool(8, 3).unwrap();
        assert_eq!(pool.current_num_threads(), 3);
    }

    #[test]
    fn test_worker_pool_never_empty() {
        let pool = worker_pool(0, 0).unwrap();
        assert_eq!(pool.current_num_threads(), 1);
    }
}
