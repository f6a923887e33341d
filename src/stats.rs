//! Run summary / reporting (§6 "Reporting", `SPEC_FULL.md` §15).
//!
//! Grounded in both the teacher's `ExplorationStats`/`SolvingStats`
//! accumulators (`constructor/mod.rs`, `parity/solver/mod.rs` — plain
//! counters plus a `Duration`, rendered via `Display`) and the original's
//! `Statistic` class threaded through every `Synthesizer`.

use std::fmt;
use std::time::{Duration, Instant};

/// Accumulated statistics for one synthesis run, regardless of method.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    mdps_built: u64,
    dtmcs_built: u64,
    families_explored: u64,
    models_pruned: u64,
    iterations: u64,
    wall_clock: Duration,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_mdp_built(&mut self) {
        self.mdps_built += 1;
    }

    pub fn record_dtmc_built(&mut self) {
        self.dtmcs_built += 1;
    }

    pub fn record_family_explored(&mut self) {
        self.families_explored += 1;
    }

    pub fn record_pruned(&mut self, count: u64) {
        self.models_pruned += count;
    }

    pub fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    pub fn add_wall_clock(&mut self, elapsed: Duration) {
        self.wall_clock += elapsed;
    }

    pub fn merge(&mut self, other: &RunStats) {
        self.mdps_built += other.mdps_built;
        self.dtmcs_built += other.dtmcs_built;
        self.families_explored += other.families_explored;
        self.models_pruned += other.models_pruned;
        self.iterations += other.iterations;
        self.wall_clock += other.wall_clock;
    }

    pub fn mdps_built(&self) -> u64 {
        self.mdps_built
    }

    pub fn dtmcs_built(&self) -> u64 {
        self.dtmcs_built
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn models_pruned(&self) -> u64 {
        self.models_pruned
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "families explored: {}, MDPs built: {}, DTMCs built: {}, pruned: {}, iterations: {}, time: {:.2}s",
            self.families_explored,
            self.mdps_built,
            self.dtmcs_built,
            self.models_pruned,
            self.iterations,
            self.wall_clock.as_secs_f32(),
        )
    }
}

/// A simple RAII-style stopwatch used by the stage controller and the
/// top-level run to accumulate wall-clock time without threading
/// `Instant`s through every call site.
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Samples up to `max_steps` random paths of `dtmc`, used by the CLI's
/// optional empirical sanity check (`SPEC_FULL.md` §15, grounded in the
/// original's `simulation.py`). Not part of the core synthesizer loops.
pub fn sample_paths<D>(
    dtmc: &D,
    step: impl Fn(&D, &mut u64, usize) -> Option<usize>,
    initial_state: usize,
    num_paths: usize,
    max_steps: usize,
    mut rng_state: u64,
) -> Vec<usize> {
    let mut path_lengths = Vec::with_capacity(num_paths);
    for _ in 0..num_paths {
        let mut state = initial_state;
        let mut steps = 0;
        while steps < max_steps {
            match step(dtmc, &mut rng_state, state) {
                Some(next) => state = next,
                None => break,
            }
            steps += 1;
        }
        path_lengths.push(steps);
    }
    path_lengths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_merge_sums_fields() {
        let mut a = RunStats::new();
        a.record_mdp_built();
        a.record_pruned(3);
        let mut b = RunStats::new();
        b.record_mdp_built();
        b.record_pruned(2);
        a.merge(&b);
        assert_eq!(a.mdps_built(), 2);
        assert_eq!(a.models_pruned(), 5);
    }

    #[test]
    fn sample_paths_stops_at_max_steps() {
        let lengths = sample_paths(&(), |_, _, s| Some(s + 1), 0, 2, 5, 0);
        assert_eq!(lengths, vec![5, 5]);
    }

    #[test]
    fn sample_paths_stops_when_no_successor() {
        let lengths = sample_paths(&(), |_, _, s| if s < 2 { Some(s + 1) } else { None }, 0, 1, 10, 0);
        assert_eq!(lengths, vec![2]);
    }
}
