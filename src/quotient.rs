//! The quotient interface (C4): an external collaborator contract.
//!
//! The probabilistic model-checking kernel that actually builds MDPs/DTMCs
//! and analyzes them is out of scope (§1 Non-goals); this module declares
//! the trait contract the rest of the crate programs against, the same
//! way the teacher's `lib.rs` is generic over `owl::automaton::MaxEvenDpa`
//! and only ever consumes it through a trait bound, never reimplementing
//! an LTL-to-automaton translator itself.
//!
//! A `mock` backend is provided so the AR/CEGIS/hybrid/POMDP loops have
//! something real to run against in tests; it is not a model checker and
//! is not part of the crate's public, shipped surface beyond what tests
//! need (see §10/§14 of `SPEC_FULL.md`).

use std::collections::HashSet;

use crate::family::{Family, OptionId, PropertyIndex, SchedulerSelection};

/// Three-valued result of checking a set of properties against a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feasibility {
    Sat,
    Unsat,
    Unknown,
}

/// Result of checking a single undecided property: enough information for
/// [`QuotientInterface::prepare_split`] to pick a splitter hole.
pub trait UndecidedResult {
    /// The hole most responsible for the bound being undecided.
    fn splitter_hole(&self) -> usize;
}

/// Result of an optimality check against a model.
pub struct OptimalityCheck<U> {
    /// An improving assignment, if one was found (and the new optimum it
    /// witnesses).
    pub improving: Option<(crate::family::Assignment, f64)>,
    /// Whether the model may still contain a better instance than what is
    /// currently proven infeasible/optimal.
    pub can_improve: bool,
    /// An undecided-result record to feed into `prepare_split` when
    /// `can_improve` is true.
    pub undecided: Option<U>,
}

/// A minimal conflict: hole indices sufficient to explain a property
/// violation, keyed by the (index of the) violated property.
pub struct GeneratedConflict {
    pub property: PropertyIndex,
    pub holes: Vec<usize>,
}

/// The external collaborator contract consumed by C5 (AR), C6 (CEGIS), C8
/// (Hybrid) and C9 (POMDP).
///
/// `Mdp`/`Dtmc` are opaque handles; `Undecided` carries whatever the
/// concrete backend needs to pick a splitter (§4.4).
pub trait QuotientInterface {
    type Mdp;
    type Dtmc;
    type Undecided: UndecidedResult;

    /// Produces an MDP whose behaviors equal the union of behaviors of
    /// every family member.
    fn build(&self, family: &Family) -> Self::Mdp;

    /// Produces the DTMC induced by a (singleton) assignment.
    fn build_dtmc(&self, assignment: &crate::family::Assignment) -> Self::Dtmc;

    /// Checks every property in `properties` against `mdp`.
    fn check_properties(
        &self,
        mdp: &Self::Mdp,
        properties: &[PropertyIndex],
    ) -> (Feasibility, Vec<PropertyIndex>, Vec<Self::Undecided>);

    /// Checks every property against a DTMC; returns the overall
    /// satisfaction and the list of violated properties.
    fn check_properties_dtmc(
        &self,
        dtmc: &Self::Dtmc,
        properties: &[PropertyIndex],
    ) -> (bool, Vec<PropertyIndex>);

    /// Checks the optimality property against an MDP.
    fn check_optimality(
        &self,
        mdp: &Self::Mdp,
        optimality: &crate::family::OptimalityProperty,
    ) -> OptimalityCheck<Self::Undecided>;

    /// Computes the value of the optimality property on a DTMC.
    fn optimality_value_dtmc(&self, dtmc: &Self::Dtmc) -> f64;

    /// Extracts, for each hole, the set of option ids used by `scheduler`.
    fn scheduler_selection(&self, mdp: &Self::Mdp, scheduler: &Scheduler) -> SchedulerSelection;

    /// Splits `family` into two subfamilies along the hole most
    /// responsible for `undecided`'s uncertain bound.
    fn prepare_split(
        &self,
        mdp: &Self::Mdp,
        undecided: &Self::Undecided,
        family: &Family,
    ) -> (Family, Family);

    /// Produces, for each violated formula, a minimal conflict (a subset
    /// of hole indices sufficient to explain the violation). Callers
    /// should fall back to [`crate::family::trivial_conflict`] if this
    /// returns an empty list for a formula (§9 "conflict granularity").
    fn conflict_generator(
        &self,
        dtmc: &Self::Dtmc,
        violated: &[PropertyIndex],
        family: &Family,
    ) -> Vec<GeneratedConflict>;
}

/// A resolution of MDP nondeterminism, opaque to the core.
pub struct Scheduler {
    pub id: usize,
}

/// Splits `family`'s hole `splitter` into a left/right pair by dividing
/// its options roughly in half. Used by [`mock::MockQuotient`] and
/// available to any concrete backend that has no better splitter
/// heuristic (§4.4 "any deterministic heuristic that reduces uncertainty
/// is acceptable").
pub fn split_hole_in_half(family: &Family, splitter: usize) -> (Family, Family) {
    let options = family.hole(splitter).options();
    let mid = options.len() / 2;
    let (left_opts, right_opts): (Vec<OptionId>, Vec<OptionId>) =
        (options[..mid].to_vec(), options[mid..].to_vec());
    (
        family.assume_suboptions(splitter, left_opts),
        family.assume_suboptions(splitter, right_opts),
    )
}

/// Colors reachable from a set of MDP states, used by quotient backends
/// translating scheduler selections through [`crate::family::coloring::CombinationColoring`].
pub type ColorSet = HashSet<crate::family::coloring::Color>;

pub mod mock {
    //! A tiny, deterministic, explicit-state quotient backend used only by
    //! tests (§14). It is not a model checker: properties are represented
    //! as closures over an assignment so unit tests can describe "holds
    //! for option 0 but not 1" directly, the same way the teacher's own
    //! tests drive parity-game solvers with small hand-built games rather
    //! than a real LTL front end.

    use std::rc::Rc;

    use super::*;
    use crate::family::Assignment;

    /// A property, as a predicate over a full assignment. Boxed so sketches
    /// (in tests) can close over arbitrary logic.
    pub type Predicate = Rc<dyn Fn(&Assignment) -> bool>;

    #[derive(Clone)]
    pub struct MockQuotient {
        properties: Vec<Predicate>,
        /// The optimality objective, evaluated per assignment; `None` if the
        /// sketch under test has no optimality property.
        objective: Option<Rc<dyn Fn(&Assignment) -> f64>>,
        pub maximize: bool,
    }

    pub struct MockUndecided {
        splitter: usize,
    }

    impl UndecidedResult for MockUndecided {
        fn splitter_hole(&self) -> usize {
            self.splitter
        }
    }

    /// An "MDP" in the mock backend is just the family itself: we decide
    /// feasibility by checking every element's worst and best case via
    /// brute-force enumeration, which is only ever used on the small
    /// families built in tests.
    pub struct MockMdp {
        family: Family,
    }

    pub struct MockDtmc {
        assignment: Assignment,
    }

    impl MockQuotient {
        pub fn new(properties: Vec<Predicate>) -> Self {
            Self {
                properties,
                objective: None,
                maximize: true,
            }
        }

        pub fn with_objective(mut self, maximize: bool, objective: Rc<dyn Fn(&Assignment) -> f64>) -> Self {
            self.objective = Some(objective);
            self.maximize = maximize;
            self
        }

        fn all_assignments(&self, family: &Family) -> Vec<Assignment> {
            let mut combos: Vec<Vec<OptionId>> = vec![vec![]];
            for hole in family.holes() {
                let mut next = Vec::new();
                for combo in &combos {
                    for &option in hole.options() {
                        let mut c = combo.clone();
                        c.push(option);
                        next.push(c);
                    }
                }
                combos = next;
            }
            combos
                .into_iter()
                .map(|combo| {
                    let mut map = std::collections::HashMap::new();
                    for (i, option) in combo.into_iter().enumerate() {
                        map.insert(i, vec![option]);
                    }
                    family.assume_all_suboptions(&map).pick_any()
                })
                .collect()
        }

        fn satisfies(&self, assignment: &Assignment, properties: &[PropertyIndex]) -> bool {
            properties
                .iter()
                .all(|p| (self.properties[p.0])(assignment))
        }
    }

    impl QuotientInterface for MockQuotient {
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
            mdp: &Self::Mdp,
            properties: &[PropertyIndex],
        ) -> (Feasibility, Vec<PropertyIndex>, Vec<Self::Undecided>) {
            let assignments = self.all_assignments(&mdp.family);
            let all_sat = assignments.iter().all(|a| self.satisfies(a, properties));
            let all_unsat = assignments.iter().all(|a| !self.satisfies(a, properties));
            let feasibility = if all_sat {
                Feasibility::Sat
            } else if all_unsat {
                Feasibility::Unsat
            } else {
                Feasibility::Unknown
            };
            let undecided = if feasibility == Feasibility::Unknown {
                let splitter = (0..mdp.family.num_holes())
                    .find(|&h| mdp.family.hole(h).size() > 1)
                    .unwrap_or(0);
                vec![MockUndecided { splitter }]
            } else {
                vec![]
            };
            (feasibility, properties.to_vec(), undecided)
        }

        fn check_properties_dtmc(
            &self,
            dtmc: &Self::Dtmc,
            properties: &[PropertyIndex],
        ) -> (bool, Vec<PropertyIndex>) {
            let unsat: Vec<_> = properties
                .iter()
                .filter(|p| !(self.properties[p.0])(&dtmc.assignment))
                .copied()
                .collect();
            (unsat.is_empty(), unsat)
        }

        fn check_optimality(
            &self,
            mdp: &Self::Mdp,
            optimality: &crate::family::OptimalityProperty,
        ) -> OptimalityCheck<Self::Undecided> {
            let objective = self.objective.as_ref().expect("mock sketch has no optimality property");
            let assignments = self.all_assignments(&mdp.family);
            let mut best: Option<(Assignment, f64)> = None;
            for a in assignments {
                let v = objective(&a);
                let better = match best {
                    None => true,
                    Some((_, cur)) => {
                        if self.maximize {
                            v > cur
                        } else {
                            v < cur
                        }
                    }
                };
                if better {
                    best = Some((a, v));
                }
            }
            let improving = best.filter(|(_, v)| optimality.would_improve(*v));
            // a family with more than one candidate left might still hide a
            // better instance outside this exhaustive mock check only when
            // it has unexplored holes; for the exhaustive mock all options
            // are enumerated so nothing remains undecided.
            OptimalityCheck {
                improving,
                can_improve: false,
                undecided: None,
            }
        }

        fn optimality_value_dtmc(&self, dtmc: &Self::Dtmc) -> f64 {
            let objective = self.objective.as_ref().expect("mock sketch has no optimality property");
            objective(&dtmc.assignment)
        }

        fn scheduler_selection(&self, mdp: &Self::Mdp, _scheduler: &Scheduler) -> SchedulerSelection {
            // the mock backend has no nondeterminism to resolve; report
            // every hole as consistent on its first remaining option.
            let selection = mdp
                .family
                .holes()
                .iter()
                .map(|h| vec![h.options()[0]])
                .collect();
            SchedulerSelection::new(selection)
        }

        fn prepare_split(
            &self,
            _mdp: &Self::Mdp,
            undecided: &Self::Undecided,
            family: &Family,
        ) -> (Family, Family) {
            split_hole_in_half(family, undecided.splitter_hole())
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
}
