//! POMDP memory-unfolding driver (C9): wraps the AR synthesizer in an outer
//! loop that grows the family by injecting memory into observations whose
//! scheduler selection is still inconsistent.
//!
//! Grounded almost 1:1 in `synthesizer.py::SynthesizerPOMDP.strategy_2`
//! (`choose_consistent`, `choose_consistent_and_break_symmetry`, the
//! per-observation consistent/inconsistent restriction, the memory
//! injection loop). `strategy_3` is explicitly flagged experimental/broken
//! in the source and is not implemented here (§9 Open Question).

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::family::{Assignment, Family, OptionId};
use crate::quotient::QuotientInterface;
use crate::stats::RunStats;
use crate::synth::ArSynthesizer;

/// Extends [`QuotientInterface`] with the memory-unfolding operations C9
/// needs: observations, which holes at an observation are action- vs
/// memory-selection holes, and the ability to re-unfold with one more
/// memory cell for a given observation (§4.9).
pub trait PomdpInterface: QuotientInterface {
    /// Total number of observations in the current unfolded design space.
    fn num_observations(&self) -> usize;

    /// Hole indices (into [`Self::full_family`]) that are action-selection
    /// holes for `observation` — one per memory cell injected so far.
    fn action_holes(&self, observation: usize) -> &[usize];

    /// Hole indices that are memory-selection holes for `observation`
    /// (holes choosing which memory cell to transition to).
    fn memory_holes(&self, observation: usize) -> &[usize];

    /// The scheduler realizing the optimality property's current best
    /// value against `mdp`, used to read back a per-hole option selection
    /// (§4.9 step 2).
    fn optimal_scheduler(&self, mdp: &Self::Mdp) -> crate::quotient::Scheduler;

    /// Unfolds one additional memory cell for `observation`, returning a
    /// fresh backend over the grown design space. The source family is not
    /// mutated; like every other refinement in this crate, unfolding
    /// produces a new value.
    fn inject_memory(&self, observation: usize) -> Self
    where
        Self: Sized;

    /// The full (unrestricted) design space reflecting this backend's
    /// current unfolding.
    fn full_family(&self) -> Family;
}

/// Drives the outer unfold/restrict/AR/reinject loop to termination.
///
/// Termination is guaranteed by a bounded per-observation memory-cap
/// schedule: `memory_limit` is a hard ceiling on how many times any single
/// observation's memory is grown, so the loop runs at most
/// `num_observations * memory_limit` rounds even if some observation can
/// never become scheduler-consistent.
pub struct PomdpDriver {
    memory_caps: HashMap<usize, usize>,
    max_cap: usize,
    best: Option<Assignment>,
    stats: RunStats,
}

impl PomdpDriver {
    pub fn new(memory_limit: usize) -> Self {
        Self {
            memory_caps: HashMap::new(),
            max_cap: memory_limit,
            best: None,
            stats: RunStats::new(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Runs to completion against `quotient`, taking it by value since each
    /// memory injection round produces a fresh backend (§4.9 step 6).
    pub fn run<Q: PomdpInterface>(&mut self, mut quotient: Q) -> crate::synth::SynthesisOutcome {
        loop {
            let full_family = quotient.full_family();
            self.stats.record_family_explored();
            debug!("pomdp: unfolded family {}", full_family);

            let mdp = quotient.build(&full_family);
            self.stats.record_mdp_built();

            let scheduler = quotient.optimal_scheduler(&mdp);
            let selection = quotient.scheduler_selection(&mdp, &scheduler);

            let mut restriction: HashMap<usize, Vec<OptionId>> = HashMap::new();
            let mut inconsistent_observations = Vec::new();

            for obs in 0..quotient.num_observations() {
                let action_holes: Vec<usize> = quotient.action_holes(obs).to_vec();
                let memory_holes: Vec<usize> = quotient.memory_holes(obs).to_vec();

                // consistent restriction (§4.9 step 3): a singleton
                // selection on an action hole pins that hole outright.
                for &h in &action_holes {
                    if selection.is_consistent(h) {
                        restriction.insert(h, selection.options(h).to_vec());
                    }
                }

                // symmetry breaking (§4.9 step 4): once an observation owns
                // more than one action hole (from prior memory injections),
                // draw one shared choice list from the *first* action
                // hole's own scheduler selection and distribute it
                // positionally across every sibling hole, removing the
                // sibling's corresponding entry from its own range — so
                // each memory-cell hole excludes a distinct candidate drawn
                // from one shared source, guaranteeing the holes no longer
                // agree. Mirrors `choose_consistent_and_break_symmetry`
                // exactly: `choices = observation_choices[obs]` (built from
                // `selection[hole_indices[0]]`), then `options.remove(
                // choices[index])` per sibling at position `index`.
                if action_holes.len() > 1 {
                    let choices = selection.options(action_holes[0]).to_vec();
                    for (index, &h) in action_holes.iter().enumerate() {
                        let chosen = choices[index.min(choices.len() - 1)];
                        let narrowed: Vec<OptionId> = full_family
                            .hole(h)
                            .options()
                            .iter()
                            .copied()
                            .filter(|&o| o != chosen)
                            .collect();
                        if !narrowed.is_empty() {
                            restriction.entry(h).or_insert(narrowed);
                        }
                    }
                }

                let inconsistent_here = action_holes
                    .iter()
                    .chain(memory_holes.iter())
                    .any(|&h| selection.is_inconsistent(h));
                if inconsistent_here {
                    inconsistent_observations.push(obs);
                }
            }

            let restricted = full_family.assume_all_suboptions(&restriction);

            // step 5: run AR on the restricted family.
            let mut ar = ArSynthesizer::new(restricted);
            let outcome = ar.run(&quotient);
            self.stats.merge(ar.stats());
            if let Some(assignment) = outcome.assignment {
                info!("pomdp: AR found a candidate on the restricted family");
                self.best = Some(assignment);
            }

            if inconsistent_observations.is_empty() {
                info!("pomdp: every observation scheduler-consistent, stopping");
                break;
            }

            // step 6: inject one more memory cell for every still-
            // inconsistent observation that has not hit its memory cap,
            // then re-unfold and repeat.
            let mut any_injected = false;
            for obs in inconsistent_observations {
                let cap = self.memory_caps.get(&obs).copied().unwrap_or(1);
                if cap >= self.max_cap {
                    debug!("pomdp: observation {} at memory cap {}, skipping", obs, cap);
                    continue;
                }
                quotient = quotient.inject_memory(obs);
                self.memory_caps.insert(obs, cap + 1);
                any_injected = true;
                info!("pomdp: injected memory for observation {} (cap now {})", obs, cap + 1);
            }

            if !any_injected {
                warn!("pomdp: memory limit reached for every inconsistent observation, stopping");
                break;
            }
        }

        match self.best.take() {
            Some(a) => crate::synth::SynthesisOutcome::found(a),
            None => crate::synth::SynthesisOutcome::none(),
        }
    }
}

pub mod mock {
    //! A tiny deterministic POMDP backend used only by tests (§14), the
    //! POMDP-flavored counterpart to [`crate::quotient::mock::MockQuotient`]:
    //! not a model checker, just enough fake nondeterminism-resolution to
    //! exercise [`super::PomdpDriver`]'s unfold/restrict/reinject loop.

    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::family::{Hole, OptimalityProperty, OptimizationDirection, PropertyIndex, SchedulerSelection};
    use crate::quotient::{Feasibility, GeneratedConflict, OptimalityCheck, Scheduler, UndecidedResult};

    fn labels(n: usize) -> Rc<[String]> {
        (0..n).map(|i| format!("l{}", i)).collect::<Vec<_>>().into()
    }

    pub struct MockUndecided {
        splitter: usize,
    }

    impl UndecidedResult for MockUndecided {
        fn splitter_hole(&self) -> usize {
            self.splitter
        }
    }

    pub struct MockMdp {
        family: Family,
    }

    pub struct MockDtmc {
        assignment: Assignment,
    }

    /// Every observation owns one action hole per memory cell injected so
    /// far; `resolves_at[obs]` is the memory count at which that
    /// observation's scheduler selection becomes consistent (singleton) —
    /// below it, every option of every hole at that observation is
    /// reported as selected (maximally inconsistent).
    #[derive(Clone)]
    pub struct MockPomdp {
        holes_by_obs: Vec<Vec<usize>>,
        family: Family,
        resolves_at: Vec<usize>,
    }

    impl MockPomdp {
        pub fn new(resolves_at: Vec<usize>) -> Self {
            let mut holes = Vec::new();
            let mut holes_by_obs = Vec::new();
            for obs in 0..resolves_at.len() {
                let hole = Hole::new(format!("obs{}_mem0", obs), vec![0, 1], labels(2));
                holes_by_obs.push(vec![holes.len()]);
                holes.push(hole);
            }
            let optimality = Rc::new(RefCell::new(OptimalityProperty::new(OptimizationDirection::Maximize)));
            let family = Family::new(holes, vec![PropertyIndex(0)]).with_optimality(optimality);
            Self {
                holes_by_obs,
                family,
                resolves_at,
            }
        }
    }

    impl QuotientInterface for MockPomdp {
        type Mdp = MockMdp;
        type Dtmc = MockDtmc;
        type Undecided = MockUndecided;

        fn build(&self, family: &Family) -> Self::Mdp {
            MockMdp {
                family: family.clone(),
            }
        }

        fn build_dtmc(&self, assignment: &Assignment) -> Self::Dtmc {
            MockDtmc {
                assignment: assignment.clone(),
            }
        }

        fn check_properties(
            &self,
            _mdp: &Self::Mdp,
            properties: &[PropertyIndex],
        ) -> (Feasibility, Vec<PropertyIndex>, Vec<Self::Undecided>) {
            (Feasibility::Sat, properties.to_vec(), vec![])
        }

        fn check_properties_dtmc(
            &self,
            _dtmc: &Self::Dtmc,
            _properties: &[PropertyIndex],
        ) -> (bool, Vec<PropertyIndex>) {
            (true, vec![])
        }

        fn check_optimality(
            &self,
            mdp: &Self::Mdp,
            optimality: &OptimalityProperty,
        ) -> OptimalityCheck<Self::Undecided> {
            let value: f64 = mdp.family.holes().iter().map(|h| h.options()[0] as f64).sum();
            let improving = if optimality.would_improve(value) {
                Some((mdp.family.pick_any(), value))
            } else {
                None
            };
            OptimalityCheck {
                improving,
                can_improve: false,
                undecided: None,
            }
        }

        fn optimality_value_dtmc(&self, dtmc: &Self::Dtmc) -> f64 {
            (0..dtmc.assignment.family().num_holes())
                .map(|i| dtmc.assignment.option(i) as f64)
                .sum()
        }

        fn scheduler_selection(&self, mdp: &Self::Mdp, _scheduler: &Scheduler) -> SchedulerSelection {
            let mut selection = vec![vec![]; mdp.family.num_holes()];
            for (obs, holes) in self.holes_by_obs.iter().enumerate() {
                let resolved = holes.len() >= self.resolves_at[obs];
                for &h in holes {
                    selection[h] = if resolved {
                        vec![mdp.family.hole(h).options()[0]]
                    } else {
                        mdp.family.hole(h).options().to_vec()
                    };
                }
            }
            SchedulerSelection::new(selection)
        }

        fn prepare_split(&self, _mdp: &Self::Mdp, undecided: &Self::Undecided, family: &Family) -> (Family, Family) {
            crate::quotient::split_hole_in_half(family, undecided.splitter_hole())
        }

        fn conflict_generator(
            &self,
            _dtmc: &Self::Dtmc,
            violated: &[PropertyIndex],
            family: &Family,
        ) -> Vec<GeneratedConflict> {
            violated
                .iter()
                .map(|&property| GeneratedConflict {
                    property,
                    holes: crate::family::trivial_conflict(family),
                })
                .collect()
        }
    }

    impl PomdpInterface for MockPomdp {
        fn num_observations(&self) -> usize {
            self.holes_by_obs.len()
        }

        fn action_holes(&self, observation: usize) -> &[usize] {
            &self.holes_by_obs[observation]
        }

        fn memory_holes(&self, _observation: usize) -> &[usize] {
            &[]
        }

        fn optimal_scheduler(&self, _mdp: &Self::Mdp) -> Scheduler {
            Scheduler { id: 0 }
        }

        fn inject_memory(&self, observation: usize) -> Self {
            let mut holes = self.family.holes().to_vec();
            let mut holes_by_obs = self.holes_by_obs.clone();
            let new_index = holes.len();
            let memory_count = holes_by_obs[observation].len();
            holes.push(Hole::new(
                format!("obs{}_mem{}", observation, memory_count),
                vec![0, 1],
                labels(2),
            ));
            holes_by_obs[observation].push(new_index);
            let mut family = Family::new(holes, self.family.properties().to_vec());
            if let Some(optimality) = self.family.optimality() {
                family = family.with_optimality(Rc::clone(optimality));
            }
            Self {
                holes_by_obs,
                family,
                resolves_at: self.resolves_at.clone(),
            }
        }

        fn full_family(&self) -> Family {
            self.family.clone()
        }
    }
}
