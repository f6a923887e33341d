//! Stage controller (C7): an online time-allocation policy that alternates
//! the hybrid synthesizer between AR and CEGIS.
//!
//! Grounded directly in §4.7: starts in the AR stage, stays there for
//! exactly one timed step, then hands CEGIS a time allocation proportional
//! to how long that AR step took; CEGIS in turn runs until it exceeds its
//! allocation, at which point the two methods' pruning rates (`pruned /
//! time`) are compared to recompute the next allocation factor. The timer
//! itself mirrors the teacher's `SolvingStats` accumulation style
//! (`parity/solver/mod.rs`), just applied to a two-state schedule instead
//! of a single running total.

use std::time::Duration;

use log::info;

use crate::stats::Stopwatch;

/// Which method the controller currently favors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ar,
    Cegis,
}

/// Result of a [`StageController::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    Switched,
    NoSwitch,
}

/// Advisory-only: the controller never touches problem state itself. The
/// hybrid synthesizer is responsible for re-pushing an interrupted family
/// when a switch occurs (§4.7 invariant).
pub struct StageController {
    stage: Stage,
    timer: Stopwatch,
    cegis_allocation: Duration,
    cegis_allocated_factor: f64,
    ar_pruned: u64,
    ar_time: Duration,
    cegis_pruned: u64,
    cegis_time: Duration,
}

impl StageController {
    pub fn new() -> Self {
        Self {
            stage: Stage::Ar,
            timer: Stopwatch::start(),
            cegis_allocation: Duration::ZERO,
            cegis_allocated_factor: 1.0,
            ar_pruned: 0,
            ar_time: Duration::ZERO,
            cegis_pruned: 0,
            cegis_time: Duration::ZERO,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Credits `pruned` models to the current stage and reads the wall
    /// clock since the stage began to decide whether to switch.
    pub fn step(&mut self, pruned: u64) -> Switch {
        let elapsed = self.timer.elapsed();
        self.step_with_elapsed(pruned, elapsed)
    }

    /// Same as [`Self::step`] but with an explicit elapsed duration, so
    /// tests can drive the controller deterministically (§8 S6) instead
    /// of racing the real clock.
    pub fn step_with_elapsed(&mut self, pruned: u64, elapsed: Duration) -> Switch {
        match self.stage {
            Stage::Ar => {
                self.ar_pruned += pruned;
                self.ar_time += elapsed;
                self.cegis_allocation = elapsed.mul_f64(self.cegis_allocated_factor);
                self.stage = Stage::Cegis;
                self.timer = Stopwatch::start();
                info!(
                    "stage controller: AR -> CEGIS, allocation {:.3}s",
                    self.cegis_allocation.as_secs_f64()
                );
                Switch::Switched
            }
            Stage::Cegis => {
                self.cegis_pruned += pruned;
                if elapsed < self.cegis_allocation {
                    return Switch::NoSwitch;
                }
                self.cegis_time += elapsed;

                // dominance falls back to 1 when either method has pruned
                // nothing yet — there is no productive rate to compare.
                self.cegis_allocated_factor = if self.ar_pruned == 0 || self.cegis_pruned == 0 {
                    1.0
                } else {
                    let success_rate_ar = self.ar_pruned as f64 / self.ar_time.as_secs_f64();
                    let success_rate_cegis = self.cegis_pruned as f64 / self.cegis_time.as_secs_f64();
                    success_rate_ar / success_rate_cegis
                };
                self.stage = Stage::Ar;
                self.timer = Stopwatch::start();
                info!(
                    "stage controller: CEGIS -> AR, factor {:.3}",
                    self.cegis_allocated_factor
                );
                Switch::Switched
            }
        }
    }
}

impl Default for StageController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s6_stage_controller_convergence() {
        let mut controller = StageController::new();
        assert_eq!(controller.stage(), Stage::Ar);

        // AR prunes 100 in 1s: always switches unconditionally.
        let switch = controller.step_with_elapsed(100, Duration::from_secs(1));
        assert_eq!(switch, Switch::Switched);
        assert_eq!(controller.stage(), Stage::Cegis);
        assert_eq!(controller.cegis_allocation, Duration::from_secs(1));

        // CEGIS prunes 10 in 1s: elapsed >= allocation, so it switches back.
        let switch = controller.step_with_elapsed(10, Duration::from_secs(1));
        assert_eq!(switch, Switch::Switched);
        assert_eq!(controller.stage(), Stage::Ar);
        assert!((controller.cegis_allocated_factor - 10.0).abs() < 1e-9);
    }

    #[test]
    fn cegis_does_not_switch_before_its_allocation_elapses() {
        let mut controller = StageController::new();
        controller.step_with_elapsed(5, Duration::from_secs(2));
        assert_eq!(controller.stage(), Stage::Cegis);
        let switch = controller.step_with_elapsed(1, Duration::from_millis(500));
        assert_eq!(switch, Switch::NoSwitch);
        assert_eq!(controller.stage(), Stage::Cegis);
    }

    #[test]
    fn dominance_falls_back_to_one_when_a_method_pruned_nothing() {
        let mut controller = StageController::new();
        controller.step_with_elapsed(0, Duration::from_secs(1));
        controller.step_with_elapsed(0, Duration::from_secs(1));
        assert!((controller.cegis_allocated_factor - 1.0).abs() < 1e-9);
    }
}
