//! External-oracle fusion (C10): turns a belief-exploration result from an
//! external oracle into restrictions on the current design space.
//!
//! Grounded in `storm_pomdp_control.py` (`parse_storm_result`,
//! `get_main_restricted_family`, `get_subfamilies_restrictions`,
//! `get_subfamilies`, `update_data`). The oracle itself — and the
//! over-/under-approximation algorithm it runs — is out of scope (§1
//! Non-goals); this module only consumes its result format (§6) and is an
//! external-collaborator contract in the same style as [`crate::quotient`].

pub mod parser;

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{Receiver, TryRecvError};

use log::info;

use crate::family::{Family, OptimizationDirection, OptionId};

/// One state of the induced Markov chain the oracle hands back (§6):
/// `labels` carries observation labels (`"[...]"`) and the `"cutoff"` /
/// `"clipping"` cut-off markers.
pub struct InducedState {
    pub id: usize,
    pub labels: HashSet<String>,
}

/// The induced Markov chain from a resolved scheduler (§6
/// `induced_mc_from_scheduler`).
pub trait InducedChain {
    fn states(&self) -> &[InducedState];
    /// Labels attached to the choice taken at `state_id` (`get_labels_of_choice`).
    fn choice_labels(&self, state_id: usize) -> &HashSet<String>;
}

/// A cut-off scheduler (§6 `cutoff_schedulers`): resolves nondeterminism for
/// states the belief exploration gave up exploring precisely.
pub trait CutoffScheduler {
    /// Renders the choice at `state` as `"{p:a, p:a, ...}"` (§6).
    fn get_choice(&self, state: usize) -> String;
}

/// The raw oracle result (§6 "Oracle result format").
pub struct OracleResult<C, S> {
    pub induced_mc: C,
    pub cutoff_schedulers: Vec<S>,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Quotient-side facts C10 needs to interpret an oracle result, kept
/// separate from [`crate::quotient::QuotientInterface`] since the fusion
/// layer is concerned with observations and action-hole bookkeeping, not
/// MDP/DTMC construction.
pub trait OracleQuotient {
    fn num_observations(&self) -> usize;
    /// Total number of states in the underlying POMDP (used to walk a
    /// cut-off scheduler's choice at every state, per §9).
    fn num_pomdp_states(&self) -> usize;
    /// Action-selection hole indices for `observation`.
    fn action_holes(&self, observation: usize) -> &[usize];
    /// Total number of actions available at `observation`.
    fn num_actions_at(&self, observation: usize) -> usize;
    /// Which observation a non-cut-off state's `"[...]"` label names, if any
    /// (the original's `quotient.simplify_label` + `observation_labels.index`).
    fn observation_for_label(&self, label: &str) -> Option<usize>;
    /// Which action index a chosen-choice label corresponds to at
    /// `observation` (the original's linear search over
    /// `action_labels_at_observation[observation]`).
    fn action_index_for_label(&self, observation: usize, label: &str) -> Option<usize>;
    /// Which observation a POMDP state belongs to (`pomdp.get_observation`).
    fn observation_of_state(&self, state: usize) -> usize;
}

/// `observation -> allowed action indices`, as harvested from both
/// non-cut-off and cut-off states of the induced chain (§4.10).
#[derive(Debug, Clone, Default)]
pub struct ActionDictionary(HashMap<usize, Vec<OptionId>>);

impl ActionDictionary {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn allowed(&self, observation: usize) -> Option<&[OptionId]> {
        self.0.get(&observation).map(Vec::as_slice)
    }
}

/// Builds the action dictionary by (a) walking non-cut-off states and
/// reading labels to recover `(observation, action)` pairs, and (b) walking
/// cut-off states whose label references a scheduler index and harvesting
/// every `(obs, action)` that scheduler chooses (§4.10).
pub fn build_action_dictionary<Q, C, S>(
    quotient: &Q,
    result: &OracleResult<C, S>,
) -> Result<ActionDictionary, parser::ParseError>
where
    Q: OracleQuotient,
    C: InducedChain,
    S: CutoffScheduler,
{
    let mut dictionary: HashMap<usize, Vec<OptionId>> = HashMap::new();
    let mut remaining_schedulers: HashSet<usize> = (0..result.cutoff_schedulers.len()).collect();

    for state in result.induced_mc.states() {
        let choice_labels = result.induced_mc.choice_labels(state.id);
        if choice_labels.is_empty() {
            continue;
        }
        let is_cutoff = state.labels.contains("cutoff") || state.labels.contains("clipping");

        if !is_cutoff {
            let chosen = choice_labels.iter().next().expect("checked non-empty above");
            for label in &state.labels {
                if let Some(observation) = quotient.observation_for_label(label) {
                    if let Some(action) = quotient.action_index_for_label(observation, chosen) {
                        let entry = dictionary.entry(observation).or_default();
                        if !entry.contains(&action) {
                            entry.push(action);
                        }
                    }
                }
            }
        } else {
            if remaining_schedulers.is_empty() {
                continue;
            }
            let chosen = choice_labels.iter().next().expect("checked non-empty above");
            if let Some(scheduler_index) = parser::cutoff_scheduler_index(chosen)? {
                if !remaining_schedulers.contains(&scheduler_index) {
                    continue;
                }
                let scheduler = &result.cutoff_schedulers[scheduler_index];
                for pomdp_state in 0..quotient.num_pomdp_states() {
                    let choice_string = scheduler.get_choice(pomdp_state);
                    let actions = parser::parse_choice_string(&choice_string)?;
                    let observation = quotient.observation_of_state(pomdp_state);
                    let entry = dictionary.entry(observation).or_default();
                    for action in actions {
                        if !entry.contains(&action) {
                            entry.push(action);
                        }
                    }
                }
                remaining_schedulers.remove(&scheduler_index);
            }
        }
    }

    Ok(ActionDictionary(dictionary))
}

/// Bounds extracted from the raw result according to optimization direction
/// (§4.10 "Bounds": storm lower-bound if maximizing, upper-bound if
/// minimizing).
pub fn extract_bound<C, S>(result: &OracleResult<C, S>, direction: OptimizationDirection) -> f64 {
    match direction {
        OptimizationDirection::Maximize => result.lower_bound,
        OptimizationDirection::Minimize => result.upper_bound,
    }
}

/// One action-hole the oracle narrows, named explicitly so
/// [`get_subfamilies`] can pin/flip it independently of the others (§4.10
/// "Subfamily restrictions").
#[derive(Debug, Clone)]
pub struct SubfamilyRestriction {
    pub hole: usize,
    pub restricted_options: Vec<OptionId>,
}

/// Clones `family` and, for every action-hole at an observation the
/// dictionary covers, intersects its options with the allowed actions;
/// holes for observations absent from the dictionary keep their full option
/// set (§4.10 "Main restricted family").
pub fn main_restricted_family<Q: OracleQuotient>(
    quotient: &Q,
    family: &Family,
    dictionary: &ActionDictionary,
) -> Family {
    if dictionary.is_empty() {
        return family.clone();
    }
    let mut restriction: HashMap<usize, Vec<OptionId>> = HashMap::new();
    for observation in 0..quotient.num_observations() {
        let allowed = match dictionary.allowed(observation) {
            Some(allowed) => allowed,
            None => continue,
        };
        for &hole in quotient.action_holes(observation) {
            let narrowed: Vec<OptionId> = family
                .hole(hole)
                .options()
                .iter()
                .copied()
                .filter(|option| allowed.contains(option))
                .collect();
            // an empty intersection collapses to the canonical singleton
            // option 0 rather than reverting to the hole's full range,
            // matching `get_main_restricted_family`'s
            // `if len(options) == 0: options = [0]` — this preserves
            // maximal restriction/progress instead of discarding the
            // oracle's advice for this hole.
            let narrowed = if narrowed.is_empty() { vec![0] } else { narrowed };
            restriction.insert(hole, narrowed);
        }
    }
    let restricted = family.assume_all_suboptions(&restriction);
    info!(
        "oracle fusion: reduced design space from {} to {}",
        family.size(),
        restricted.size()
    );
    restricted
}

/// One `{hole, restricted_options}` record per action-hole whose options
/// the oracle narrows (observations it leaves unrestricted, or narrows to
/// every available action, are skipped) — §4.10 "Subfamily restrictions".
pub fn subfamily_restrictions<Q: OracleQuotient>(
    quotient: &Q,
    dictionary: &ActionDictionary,
) -> Vec<SubfamilyRestriction> {
    let mut restrictions = Vec::new();
    for observation in 0..quotient.num_observations() {
        let allowed = match dictionary.allowed(observation) {
            Some(allowed) => allowed,
            None => continue,
        };
        if allowed.len() == quotient.num_actions_at(observation) {
            continue;
        }
        for &hole in quotient.action_holes(observation) {
            restrictions.push(SubfamilyRestriction {
                hole,
                restricted_options: allowed.to_vec(),
            });
        }
    }
    restrictions
}

/// Expands `restrictions` into a covering collection of mutually-exclusive
/// subfamilies by the prefix-flip construction (§4.10): subfamily `i` pins
/// records `< i` to the oracle's recommendation and flips record `i` to its
/// complement (within `family`'s current options for that hole). Holes not
/// named by any restriction keep their options from `family` unchanged.
pub fn get_subfamilies(restrictions: &[SubfamilyRestriction], family: &Family) -> Vec<Family> {
    if restrictions.is_empty() {
        return Vec::new();
    }
    let mut subfamilies = Vec::with_capacity(restrictions.len());
    for i in 0..restrictions.len() {
        let mut map: HashMap<usize, Vec<OptionId>> = HashMap::new();
        for (j, record) in restrictions.iter().enumerate().take(i + 1) {
            if j != i {
                map.insert(record.hole, record.restricted_options.clone());
            } else {
                let complement: Vec<OptionId> = family
                    .hole(record.hole)
                    .options()
                    .iter()
                    .copied()
                    .filter(|option| !record.restricted_options.contains(option))
                    .collect();
                map.insert(record.hole, complement);
            }
        }
        subfamilies.push(family.assume_all_suboptions(&map));
    }
    subfamilies
}

/// Whether the oracle's bound is still better than the latest
/// internally-found value, so downstream code knows whether to trust oracle
/// advice over internal results (§4.10 "Quality comparison", grounded in
/// `update_data`). `None` for `internal_value` means no internal candidate
/// exists yet, so the oracle is trivially "better".
pub fn is_oracle_better(direction: OptimizationDirection, oracle_bound: f64, internal_value: Option<f64>) -> bool {
    match internal_value {
        None => true,
        Some(value) => match direction {
            OptimizationDirection::Minimize => value > oracle_bound,
            OptimizationDirection::Maximize => value < oracle_bound,
        },
    }
}

/// Non-blocking poll of the background oracle task's result queue (§5, §15):
/// an empty or disconnected channel is "no advice yet", not an error — the
/// oracle is an optional collaborator and its absence must never stall the
/// main synthesis loop.
pub fn try_recv_advice<T>(receiver: &Receiver<T>) -> Option<T> {
    match receiver.try_recv() {
        Ok(advice) => Some(advice),
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
    }
}

/// Polls `receiver` and, if a result is waiting, fuses it into the
/// main-restricted family and oracle bound C8/C9 can apply at their next
/// stage-controller checkpoint (the "C10 feeds C8/C9" data flow, §2). Folds
/// any parsing error from the oracle's ad-hoc string formats into
/// [`crate::error::SynthesisError::OracleContract`] at this boundary
/// (`SPEC_FULL.md` §13) — the only place this module's [`parser::ParseError`]
/// crosses into the crate-wide error type.
pub fn consult<Q, C, S>(
    quotient: &Q,
    receiver: &Receiver<OracleResult<C, S>>,
    family: &Family,
    direction: OptimizationDirection,
) -> Result<Option<(Family, f64)>, crate::error::SynthesisError>
where
    Q: OracleQuotient,
    C: InducedChain,
    S: CutoffScheduler,
{
    let result = match try_recv_advice(receiver) {
        Some(result) => result,
        None => return Ok(None),
    };
    let dictionary =
        build_action_dictionary(quotient, &result).map_err(|e| crate::error::SynthesisError::OracleContract(e.to_string()))?;
    let restricted = main_restricted_family(quotient, family, &dictionary);
    let bound = extract_bound(&result, direction);
    Ok(Some((restricted, bound)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::Hole;
    use std::rc::Rc;

    fn labels(n: usize) -> Rc<[String]> {
        (0..n).map(|i| format!("l{}", i)).collect::<Vec<_>>().into()
    }

    struct MockChain {
        states: Vec<InducedState>,
        choices: HashMap<usize, HashSet<String>>,
    }

    impl InducedChain for MockChain {
        fn states(&self) -> &[InducedState] {
            &self.states
        }

        fn choice_labels(&self, state_id: usize) -> &HashSet<String> {
            &self.choices[&state_id]
        }
    }

    struct MockScheduler {
        choice_by_state: HashMap<usize, String>,
    }

    impl CutoffScheduler for MockScheduler {
        fn get_choice(&self, state: usize) -> String {
            self.choice_by_state.get(&state).cloned().unwrap_or_else(|| "{}".to_string())
        }
    }

    /// Two observations, one action hole each; observation 0's states are
    /// never cut off, observation 1's are only ever seen through a cutoff
    /// scheduler covering POMDP states 2 and 3.
    struct MockQuotient;

    impl OracleQuotient for MockQuotient {
        fn num_observations(&self) -> usize {
            2
        }
        fn num_pomdp_states(&self) -> usize {
            4
        }
        fn action_holes(&self, observation: usize) -> &[usize] {
            match observation {
                0 => &[0],
                1 => &[1],
                _ => &[],
            }
        }
        fn num_actions_at(&self, _observation: usize) -> usize {
            3
        }
        fn observation_for_label(&self, label: &str) -> Option<usize> {
            match label {
                "[obs0]" => Some(0),
                _ => None,
            }
        }
        fn action_index_for_label(&self, observation: usize, label: &str) -> Option<usize> {
            if observation == 0 && label == "act1" {
                Some(1)
            } else {
                None
            }
        }
        fn observation_of_state(&self, state: usize) -> usize {
            if state < 2 {
                0
            } else {
                1
            }
        }
    }

    fn sample_result() -> OracleResult<MockChain, MockScheduler> {
        let mut state0_labels = HashSet::new();
        state0_labels.insert("[obs0]".to_string());
        let mut state1_labels = HashSet::new();
        state1_labels.insert("cutoff".to_string());

        let mut choices = HashMap::new();
        let mut c0 = HashSet::new();
        c0.insert("act1".to_string());
        choices.insert(0, c0);
        let mut c1 = HashSet::new();
        c1.insert("sched_0".to_string());
        choices.insert(1, c1);

        let mut scheduler_choices = HashMap::new();
        scheduler_choices.insert(2, "{1.0:0}".to_string());
        scheduler_choices.insert(3, "{0.5:1, 0.5:2}".to_string());

        OracleResult {
            induced_mc: MockChain {
                states: vec![
                    InducedState { id: 0, labels: state0_labels },
                    InducedState { id: 1, labels: state1_labels },
                ],
                choices,
            },
            cutoff_schedulers: vec![MockScheduler {
                choice_by_state: scheduler_choices,
            }],
            lower_bound: 0.4,
            upper_bound: 0.9,
        }
    }

    #[test]
    fn builds_dictionary_from_non_cutoff_and_cutoff_states() {
        let quotient = MockQuotient;
        let result = sample_result();
        let dictionary = build_action_dictionary(&quotient, &result).unwrap();
        assert_eq!(dictionary.allowed(0), Some(&[1u32][..]));
        let mut obs1 = dictionary.allowed(1).unwrap().to_vec();
        obs1.sort_unstable();
        assert_eq!(obs1, vec![0, 1, 2]);
    }

    #[test]
    fn main_restricted_family_narrows_covered_observations_only() {
        let h0 = Hole::new("A(obs0,0)", vec![0, 1, 2], labels(3));
        let h1 = Hole::new("A(obs1,0)", vec![0, 1, 2], labels(3));
        let family = Family::new(vec![h0, h1], vec![]);

        let quotient = MockQuotient;
        let dictionary = build_action_dictionary(&quotient, &sample_result()).unwrap();
        let restricted = main_restricted_family(&quotient, &family, &dictionary);
        assert_eq!(restricted.hole(0).options(), &[1]);
        assert_eq!(restricted.hole(1).options(), &[0, 1, 2]);
    }

    #[test]
    fn main_restricted_family_falls_back_to_singleton_zero_on_empty_intersection() {
        // hole 0's *current* range (already refined elsewhere) no longer
        // contains the dictionary's allowed action (1 for obs0, per
        // sample_result()); the intersection is empty, so the restriction
        // must collapse to the canonical singleton option 0 rather than
        // reverting to the hole's full current range.
        let h0 = Hole::new("A(obs0,0)", vec![2], labels(3));
        let family = Family::new(vec![h0], vec![]);

        let quotient = MockQuotient;
        let dictionary = build_action_dictionary(&quotient, &sample_result()).unwrap();
        let restricted = main_restricted_family(&quotient, &family, &dictionary);
        assert_eq!(restricted.hole(0).options(), &[0]);
    }

    #[test]
    fn subfamilies_cover_pin_and_flip_for_every_restriction() {
        let h0 = Hole::new("h0", vec![0, 1, 2], labels(3));
        let family = Family::new(vec![h0], vec![]);
        let restrictions = vec![SubfamilyRestriction {
            hole: 0,
            restricted_options: vec![1],
        }];
        let subfamilies = get_subfamilies(&restrictions, &family);
        assert_eq!(subfamilies.len(), 1);
        // the single subfamily flips the only restriction to its complement
        assert_eq!(subfamilies[0].hole(0).options(), &[0, 2]);
    }

    #[test]
    fn empty_restrictions_yield_no_subfamilies() {
        let h0 = Hole::new("h0", vec![0, 1], labels(2));
        let family = Family::new(vec![h0], vec![]);
        assert!(get_subfamilies(&[], &family).is_empty());
    }

    #[test]
    fn quality_comparison_prefers_oracle_when_no_internal_candidate() {
        assert!(is_oracle_better(OptimizationDirection::Maximize, 0.5, None));
    }

    #[test]
    fn quality_comparison_minimizing() {
        // internal value strictly worse (larger) than the oracle bound: oracle wins
        assert!(is_oracle_better(OptimizationDirection::Minimize, 0.3, Some(0.5)));
        // internal value at least as good: oracle does not win
        assert!(!is_oracle_better(OptimizationDirection::Minimize, 0.3, Some(0.2)));
    }

    #[test]
    fn try_recv_advice_is_none_when_empty_or_disconnected() {
        let (tx, rx) = std::sync::mpsc::channel::<u32>();
        assert!(try_recv_advice(&rx).is_none());
        drop(tx);
        assert!(try_recv_advice(&rx).is_none());
    }

    #[test]
    fn try_recv_advice_returns_sent_value() {
        let (tx, rx) = std::sync::mpsc::channel();
        tx.send(42u32).unwrap();
        assert_eq!(try_recv_advice(&rx), Some(42));
    }

    #[test]
    fn consult_returns_none_without_advice() {
        let h0 = Hole::new("A(obs0,0)", vec![0, 1, 2], labels(3));
        let family = Family::new(vec![h0], vec![]);
        let (_tx, rx) = std::sync::mpsc::channel::<OracleResult<MockChain, MockScheduler>>();
        let quotient = MockQuotient;
        let advice = consult(&quotient, &rx, &family, OptimizationDirection::Maximize).unwrap();
        assert!(advice.is_none());
    }

    #[test]
    fn consult_fuses_waiting_advice_into_a_restricted_family_and_bound() {
        let h0 = Hole::new("A(obs0,0)", vec![0, 1, 2], labels(3));
        let h1 = Hole::new("A(obs1,0)", vec![0, 1, 2], labels(3));
        let family = Family::new(vec![h0, h1], vec![]);
        let (tx, rx) = std::sync::mpsc::channel();
        tx.send(sample_result()).unwrap();
        let quotient = MockQuotient;
        let (restricted, bound) = consult(&quotient, &rx, &family, OptimizationDirection::Maximize)
            .unwrap()
            .expect("advice was waiting");
        assert_eq!(restricted.hole(0).options(), &[1]);
        assert_eq!(bound, 0.4);
    }
}
