//! Hybrid synthesizer (C8): orchestrates AR and CEGIS over a shared family
//! stack under the stage controller (C7).
//!
//! Grounded in §4.8 plus the teacher's `solve_with` outer-loop shape (own a
//! mutable exploration/solving state, loop until a terminal condition,
//! consult stats each iteration). AR's splitting logic is reused verbatim
//! via [`super::ar::analyze_family`]; CEGIS's per-assignment logic via
//! [`super::cegis::cegis_step`] — neither method gets its own copy of the
//! algorithm here, only the alternation.

use log::debug;

use crate::family::{Assignment, Family};
use crate::quotient::QuotientInterface;
use crate::sat::SatEnumerator;
use crate::stats::RunStats;

use super::ar::analyze_family;
use super::cegis::{cegis_step, StepOutcome};
use super::stage::{Stage, StageController, Switch};
use super::SynthesisOutcome;

pub struct HybridSynthesizer<'a> {
    families: Vec<Family>,
    sat: SatEnumerator<'a>,
    stage: StageController,
    stats: RunStats,
}

impl<'a> HybridSynthesizer<'a> {
    /// `sat` must be initialized from the same (unrefined) family, exactly
    /// as for [`super::cegis::CegisSynthesizer`] — the solver is shared for
    /// the lifetime of the run.
    pub fn new(sat: SatEnumerator<'a>, family: Family) -> Self {
        Self {
            families: vec![family],
            sat,
            stage: StageController::new(),
            stats: RunStats::new(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn stage(&self) -> Stage {
        self.stage.stage()
    }

    /// Runs to completion: pops one family per outer iteration and
    /// dispatches it to whichever method the stage controller currently
    /// favors. AR pushes its own subfamilies back onto the shared stack;
    /// CEGIS either exhausts its family, finds an assignment, or is
    /// interrupted by a stage switch — in which case the family is
    /// re-pushed without loss, since every assignment CEGIS excluded
    /// before the switch stays permanently blocked in the shared solver
    /// (§4.8).
    pub fn run<Q: QuotientInterface>(&mut self, quotient: &Q) -> SynthesisOutcome {
        let mut best: Option<Assignment> = None;

        'outer: while let Some(family) = self.families.pop() {
            match self.stage.stage() {
                Stage::Ar => {
                    let before = self.stats.models_pruned();
                    debug!("hybrid: AR turn, family {}", family);
                    let found = analyze_family(quotient, family, &mut self.families, &mut self.stats);
                    let pruned = self.stats.models_pruned() - before;

                    if let Some(assignment) = found {
                        let has_optimality = assignment.family().has_optimality();
                        best = Some(assignment);
                        if !has_optimality {
                            self.stage.step(pruned);
                            break 'outer;
                        }
                    }
                    self.stage.step(pruned);
                }
                Stage::Cegis => {
                    let mut current = family;
                    debug!("hybrid: CEGIS turn, family {}", current);
                    loop {
                        let before = self.stats.models_pruned();
                        let outcome = cegis_step(quotient, &mut self.sat, &current, &mut self.stats);
                        let pruned = self.stats.models_pruned() - before;

                        match outcome {
                            StepOutcome::Found(assignment) => {
                                best = Some(assignment);
                                self.stage.step(pruned);
                                break 'outer;
                            }
                            StepOutcome::Improved(assignment) => {
                                best = Some(assignment);
                                if self.stage.step(pruned) == Switch::Switched {
                                    self.families.push(current);
                                    break;
                                }
                            }
                            StepOutcome::Continue => {
                                if self.stage.step(pruned) == Switch::Switched {
                                    self.families.push(current);
                                    break;
                                }
                            }
                            StepOutcome::Exhausted => {
                                self.stage.step(pruned);
                                break;
                            }
                        }
                    }
                }
            }
        }

        match best {
            Some(a) => SynthesisOutcome::found(a),
            None => SynthesisOutcome::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{Hole, OptimalityProperty, OptimizationDirection, PropertyIndex};
    use crate::quotient::mock::MockQuotient;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn labels(n: usize) -> Rc<[String]> {
        (0..n).map(|i| format!("l{}", i)).collect::<Vec<_>>().into()
    }

    #[test]
    fn s1_trivial_sat() {
        let h0 = Hole::new("h0", vec![0, 1], labels(2));
        let family = Family::new(vec![h0], vec![PropertyIndex(0)]);
        let quotient = MockQuotient::new(vec![Rc::new(|a: &crate::family::Assignment| a.option(0) == 0)]);

        let sat = SatEnumerator::new(&family);
        let mut hybrid = HybridSynthesizer::new(sat, family);
        let outcome = hybrid.run(&quotient);
        let assignment = outcome.assignment.expect("S1 must be SAT");
        assert_eq!(assignment.option(0), 0);
    }

    #[test]
    fn s2_all_unsat() {
        let h0 = Hole::new("h0", vec![0, 1], labels(2));
        let h1 = Hole::new("h1", vec![0, 1], labels(2));
        let family = Family::new(vec![h0, h1], vec![PropertyIndex(0)]);
        let quotient = MockQuotient::new(vec![Rc::new(|_: &crate::family::Assignment| false)]);

        let sat = SatEnumerator::new(&family);
        let mut hybrid = HybridSynthesizer::new(sat, family);
        let outcome = hybrid.run(&quotient);
        assert!(outcome.assignment.is_none());
    }

    #[test]
    fn s8_hybrid_equivalence_on_optimization() {
        // same objective as AR/CEGIS S3: both should converge to the same
        // optimum even though the search alternates methods (§8 property 8).
        let h0 = Hole::new("h0", vec![0, 1, 2], labels(3));
        let h1 = Hole::new("h1", vec![0, 1, 2], labels(3));
        let h2 = Hole::new("h2", vec![0, 1, 2], labels(3));
        let optimality = Rc::new(RefCell::new(OptimalityProperty::new(OptimizationDirection::Maximize)));
        let family = Family::new(vec![h0, h1, h2], vec![]).with_optimality(Rc::clone(&optimality));

        let quotient = MockQuotient::new(vec![]).with_objective(
            true,
            Rc::new(|a: &crate::family::Assignment| (a.option(0) + a.option(1) + a.option(2)) as f64),
        );

        let sat = SatEnumerator::new(&family);
        let mut hybrid = HybridSynthesizer::new(sat, family);
        let outcome = hybrid.run(&quotient);
        let assignment = outcome.assignment.expect("S3 must be SAT");
        assert_eq!(assignment.option(0) + assignment.option(1) + assignment.option(2), 6);
        assert_eq!(optimality.borrow().optimum(), Some(6.0));
    }
}
