//! Abstraction-refinement synthesis (C5): depth-first family refinement
//! driven by MDP bounds and a splitter heuristic.
//!
//! Grounded in `synthesizer.py::SynthesizerAR.synthesize` (stack-based DFS
//! with `feasible`/`can_improve`/`prepare_split`) and the teacher's
//! incremental depth-first solving shape in `parity/solver/incremental.rs`.

use log::debug;

use crate::family::Family;
use crate::quotient::{Feasibility, QuotientInterface};
use crate::stats::RunStats;

use super::SynthesisOutcome;

/// Depth-first AR search over a stack of families.
///
/// Stack order is deterministic: `prepare_split`'s left subfamily is
/// pushed first so the right is explored first (§4.5 "Ordering"). This
/// makes replays reproducible and is preserved exactly by [`Self::step`].
pub struct ArSynthesizer {
    families: Vec<Family>,
    stats: RunStats,
}

impl ArSynthesizer {
    pub fn new(family: Family) -> Self {
        Self {
            families: vec![family],
            stats: RunStats::new(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn is_done(&self) -> bool {
        self.families.is_empty()
    }

    /// Pushes an additional family onto the stack (used by the hybrid
    /// synthesizer to hand a family back to AR after a stage switch).
    pub fn push_family(&mut self, family: Family) {
        self.families.push(family);
    }

    /// Pops the next family, if any, without analyzing it (used by the
    /// hybrid synthesizer, which dispatches the popped family itself).
    pub fn pop_family(&mut self) -> Option<Family> {
        self.families.pop()
    }

    pub fn stats_mut(&mut self) -> &mut RunStats {
        &mut self.stats
    }

    /// Runs one AR step on `family` (popped by the caller, or the next one
    /// from the internal stack if `family` is `None`): builds the MDP,
    /// checks properties/optimality, and either records a result, prunes
    /// the family, or pushes the two subfamilies from splitting it.
    ///
    /// Returns `Some(assignment)` the first time a satisfying assignment
    /// without an optimality property is found (at which point the
    /// overall search should stop, per §4.5 step 4); otherwise `None`,
    /// meaning the caller should keep stepping (optimizing runs never
    /// stop early — they exhaust the stack to guarantee optimality).
    pub fn step<Q: QuotientInterface>(&mut self, quotient: &Q) -> Option<crate::family::Assignment> {
        let family = match self.families.pop() {
            Some(f) => f,
            None => return None,
        };
        analyze_family(quotient, family, &mut self.families, &mut self.stats)
    }

    /// Runs to completion, returning the best-so-far assignment (if any).
    /// For sketches without an optimality property this stops at the
    /// first SAT family; otherwise it exhausts the stack to guarantee
    /// the returned assignment is optimal (§4.5/§8 "AR soundness").
    pub fn run<Q: QuotientInterface>(&mut self, quotient: &Q) -> SynthesisOutcome {
        let mut best = None;
        while let Some(family) = self.families.pop() {
            if let Some(assignment) = analyze_family(quotient, family, &mut self.families, &mut self.stats) {
                let has_optimality = assignment.family().has_optimality();
                best = Some(assignment);
                if !has_optimality {
                    break;
                }
            }
        }
        match best {
            Some(a) => SynthesisOutcome::found(a),
            None => SynthesisOutcome::none(),
        }
    }
}

/// Analyzes a single family against `quotient`, pushing any resulting
/// subfamilies onto `families` and recording stats — the core AR step,
/// factored out of [`ArSynthesizer`] so the hybrid synthesizer (C8) can
/// drive the same analysis against its own shared family stack (§4.8).
pub fn analyze_family<Q: QuotientInterface>(
    quotient: &Q,
    family: Family,
    families: &mut Vec<Family>,
    stats: &mut RunStats,
) -> Option<crate::family::Assignment> {
    debug!("AR: analyzing family {} (size {})", family, family.size());
    stats.record_family_explored();

    let mdp = quotient.build(&family);
    stats.record_mdp_built();

    let (feasible, undecided_properties, mut undecided_results) =
        quotient.check_properties(&mdp, family.properties());

    if feasible == Feasibility::Sat && !family.has_optimality() {
        debug!("AR: family is all-SAT, no optimality property");
        return Some(family.pick_any());
    }

    let mut can_improve = feasible == Feasibility::Unknown;
    let mut found: Option<crate::family::Assignment> = None;

    if feasible == Feasibility::Sat && family.has_optimality() {
        let optimality = family.optimality().expect("has_optimality implies Some");
        let check = quotient.check_optimality(&mdp, &*optimality.borrow());
        if let Some((assignment, value)) = check.improving {
            optimality.borrow_mut().update_optimum(value);
            found = Some(assignment);
        }
        can_improve = check.can_improve;
        if let Some(undecided) = check.undecided {
            undecided_results.push(undecided);
        }
    }

    if !can_improve {
        debug!("AR: family pruned (all-UNSAT or proven optimal)");
        stats.record_pruned(family.size());
        return found;
    }

    let last_undecided = undecided_results
        .last()
        .expect("can_improve implies at least one undecided result");
    let (left, right) = quotient.prepare_split(&mdp, last_undecided, &family);
    let mut left = left;
    left.set_properties(undecided_properties.clone());
    let mut right = right;
    right.set_properties(undecided_properties);

    // left pushed first so right is explored first (§4.5 Ordering).
    families.push(left);
    families.push(right);

    found
}
