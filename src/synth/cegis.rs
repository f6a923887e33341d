//! Counterexample-guided inductive synthesis (C6): SAT-driven assignment
//! enumeration plus generalized conflict blocking.
//!
//! Grounded in `synthesizer.py::SynthesizerCEGIS.run` (pick → build_dtmc →
//! check → conflict → exclude loop).

use log::debug;

use crate::family::{trivial_conflict, Family};
use crate::quotient::QuotientInterface;
use crate::sat::SatEnumerator;
use crate::stats::RunStats;

use super::SynthesisOutcome;

pub struct CegisSynthesizer<'a> {
    sat: SatEnumerator<'a>,
    family: Family,
    stats: RunStats,
}

impl<'a> CegisSynthesizer<'a> {
    /// `sat` must have been initialized from (an unrefined copy of) the
    /// same family's full option ranges, per §4.2 — the solver is shared
    /// process-wide for the lifetime of a run (§5, §9 "process-wide
    /// solver").
    pub fn new(sat: SatEnumerator<'a>, family: Family) -> Self {
        Self {
            sat,
            family,
            stats: RunStats::new(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn family(&self) -> &Family {
        &self.family
    }

    /// Runs one CEGIS iteration: picks an assignment, model-checks it, and
    /// either records it, records an improving optimum and continues, or
    /// excludes it via generalized conflicts. Returns:
    /// - `Ok(Some(assignment))` if the search is done (SAT, no optimality);
    /// - `Ok(None)` if the family is exhausted (no more assignments);
    /// - nothing (`pending`, via the returned bool) if the loop should
    ///   keep going — expressed as a tri-state via [`StepOutcome`].
    pub fn step<Q: QuotientInterface>(&mut self, quotient: &Q) -> StepOutcome {
        cegis_step(quotient, &mut self.sat, &self.family, &mut self.stats)
    }

    /// Runs to completion.
    pub fn run<Q: QuotientInterface>(&mut self, quotient: &Q) -> SynthesisOutcome {
        let mut best = None;
        loop {
            match self.step(quotient) {
                StepOutcome::Found(a) => {
                    best = Some(a);
                    break;
                }
                StepOutcome::Improved(a) => {
                    best = Some(a);
                    // continue searching for a strictly better assignment
                }
                StepOutcome::Continue => {}
                StepOutcome::Exhausted => break,
            }
        }
        match best {
            Some(a) => SynthesisOutcome::found(a),
            None => SynthesisOutcome::none(),
        }
    }
}

/// Runs one CEGIS iteration against `family` (picks an assignment, checks
/// it, excludes it if needed) — the core CEGIS step, factored out of
/// [`CegisSynthesizer`] so the hybrid synthesizer (C8) can drive the same
/// logic against whichever family the stage controller handed it, without
/// owning a dedicated `CegisSynthesizer` per family (§4.8).
pub fn cegis_step<Q: QuotientInterface>(
    quotient: &Q,
    sat: &mut SatEnumerator,
    family: &Family,
    stats: &mut RunStats,
) -> StepOutcome {
    let assignment = match sat.pick_assignment(family) {
        Some(a) => a,
        None => return StepOutcome::Exhausted,
    };
    stats.record_iteration();
    debug!("CEGIS: analyzing assignment {}", assignment);

    let dtmc = quotient.build_dtmc(&assignment);
    stats.record_dtmc_built();

    let (mut sat_result, mut unsat_properties) =
        quotient.check_properties_dtmc(&dtmc, assignment.family().properties());

    let mut improved = false;
    if let Some(optimality) = assignment.family().optimality() {
        let value = quotient.optimality_value_dtmc(&dtmc);
        improved = optimality.borrow().would_improve(value);
        // "must improve" is encoded as a violated optimality property so a
        // conflict is produced for it too (§4.6 step 3), whether or not it
        // actually improved.
        sat_result = false;
    }
    let has_optimality = assignment.family().optimality().is_some();

    if sat_result && !has_optimality {
        stats.record_pruned(1);
        return StepOutcome::Found(assignment);
    }
    if has_optimality && improved {
        let optimality = assignment.family().optimality().unwrap();
        optimality.borrow_mut().update_optimum(quotient.optimality_value_dtmc(&dtmc));
        stats.record_pruned(1);
        return StepOutcome::Improved(assignment);
    }

    if has_optimality {
        // the optimality property itself is the thing to blame when it
        // didn't improve; there is no separate PropertyIndex for it in
        // this crate's data model (it is carried on the family, not in
        // `properties()`), so its conflict is generated directly as the
        // trivial conflict (no per-property generalization exists to call
        // into for it).
        let conflict = trivial_conflict(family);
        sat.exclude_assignment(&assignment, &conflict, family);
        stats.record_pruned(1);
    }

    if !unsat_properties.is_empty() {
        let conflicts = quotient.conflict_generator(&dtmc, &unsat_properties, family);
        let conflicts = if conflicts.is_empty() {
            unsat_properties
                .drain(..)
                .map(|property| crate::quotient::GeneratedConflict {
                    property,
                    holes: trivial_conflict(family),
                })
                .collect()
        } else {
            conflicts
        };
        for generated in conflicts {
            sat.exclude_assignment(&assignment, &generated.holes, family);
            stats.record_pruned(1);
        }
    }

    StepOutcome::Continue
}

/// Tri-state (plus "found") result of one CEGIS step.
pub enum StepOutcome {
    /// A satisfying assignment (no optimality property) was found; stop.
    Found(crate::family::Assignment),
    /// An improving assignment was found and recorded; keep searching.
    Improved(crate::family::Assignment),
    /// This assignment was excluded; keep going.
    Continue,
    /// No more assignments remain in the family.
    Exhausted,
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
        let mut cegis = CegisSynthesizer::new(sat, family);
        let outcome = cegis.run(&quotient);
        let assignment = outcome.assignment.expect("S1 must be SAT");
        assert_eq!(assignment.option(0), 0);
        assert!(cegis.stats().dtmcs_built() <= 2);
    }

    #[test]
    fn s2_all_unsat_terminates_within_family_size() {
        let h0 = Hole::new("h0", vec![0, 1], labels(2));
        let h1 = Hole::new("h1", vec![0, 1], labels(2));
        let family = Family::new(vec![h0, h1], vec![PropertyIndex(0)]);
        assert_eq!(family.size(), 4);
        let quotient = MockQuotient::new(vec![Rc::new(|_: &crate::family::Assignment| false)]);

        let sat = SatEnumerator::new(&family);
        let mut cegis = CegisSynthesizer::new(sat, family.clone());
        let outcome = cegis.run(&quotient);
        assert!(outcome.assignment.is_none());
        assert!(cegis.stats().dtmcs_built() <= family.size());
    }

    #[test]
    fn s3_optimization() {
        let h0 = Hole::new("h0", vec![0, 1, 2], labels(3));
        let h1 = Hole::new("h1", vec![0, 1, 2], labels(3));
        let h2 = Hole::new("h2", vec![0, 1, 2], labels(3));
        let optimality = Rc::new(RefCell::new(OptimalityProperty::new(OptimizationDirection::Maximize)));
        let family = Family::new(vec![h0, h1, h2], vec![]).with_optimality(Rc::clone(&optimality));

        let quotient = MockQuotient::new(vec![]).with_objective(
            true,
            Rc::new(|a: &crate::family::Assignment| {
                (a.option(0) + a.option(1) + a.option(2)) as f64
            }),
        );

        let sat = SatEnumerator::new(&family);
        let mut cegis = CegisSynthesizer::new(sat, family);
        let outcome = cegis.run(&quotient);
        let assignment = outcome.assignment.expect("S3 must be SAT");
        assert_eq!(assignment.option(0), 2);
        assert_eq!(assignment.option(1), 2);
        assert_eq!(assignment.option(2), 2);
        assert_eq!(optimality.borrow().optimum(), Some(6.0));
    }

    #[test]
    fn blocking_progress_bounded_by_family_size() {
        let h0 = Hole::new("h0", vec![0, 1], labels(2));
        let h1 = Hole::new("h1", vec![0, 1], labels(2));
        let family = Family::new(vec![h0, h1], vec![PropertyIndex(0)]);
        let quotient = MockQuotient::new(vec![Rc::new(|_: &crate::family::Assignment| false)]);
        let sat = SatEnumerator::new(&family);
        let mut cegis = CegisSynthesizer::new(sat, family.clone());
        let mut iterations = 0u64;
        loop {
            match cegis.step(&quotient) {
                StepOutcome::Exhausted => break,
                StepOutcome::Found(_) | StepOutcome::Improved(_) => break,
                StepOutcome::Continue => {
                    iterations += 1;
                    assert!(iterations <= family.size());
                }
            }
        }
    }
}
