//! Holes and the design-space (family) they form.
//!
//! A [`Hole`] is a single free choice; a [`Family`] is the Cartesian product
//! of all holes declared by the sketch. Refinement of a family never mutates
//! its source: every `assume_*` method on [`Family`] returns a fresh value.

pub mod coloring;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Identifier of an option within a hole. Options are indices into the
/// hole's (shared, never-refined) label table.
pub type OptionId = u32;

/// A single free choice point: a name, an ordered set of options, and a
/// label table shared by every copy and refinement of the hole.
///
/// Invariant: `options` is a subset of `0..option_labels.len()`.
/// `option_labels` itself is never refined — a restricted hole still
/// resolves labels by option id, not by position in `options`.
#[derive(Debug, Clone)]
pub struct Hole {
    name: Rc<str>,
    options: Vec<OptionId>,
    option_labels: Rc<[String]>,
}

impl Hole {
    /// Creates a new hole. `options` must be non-empty and every entry must
    /// be a valid index into `option_labels`.
    pub fn new(name: impl Into<Rc<str>>, options: Vec<OptionId>, option_labels: Rc<[String]>) -> Self {
        assert!(!options.is_empty(), "hole must have at least one option");
        assert!(
            options.iter().all(|&o| (o as usize) < option_labels.len()),
            "option id out of range of option_labels"
        );
        Self {
            name: name.into(),
            options,
            option_labels,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &[OptionId] {
        &self.options
    }

    pub fn option_labels(&self) -> &[String] {
        &self.option_labels
    }

    pub fn label(&self, option: OptionId) -> &str {
        &self.option_labels[option as usize]
    }

    /// Number of options currently in this hole.
    pub fn size(&self) -> usize {
        self.options.len()
    }

    pub fn is_singleton(&self) -> bool {
        self.size() == 1
    }

    pub fn contains(&self, option: OptionId) -> bool {
        self.options.contains(&option)
    }

    /// Returns a new hole with its options restricted to `suboptions`.
    /// `option_labels` is shared, never refined.
    pub fn assume_suboptions(&self, suboptions: Vec<OptionId>) -> Self {
        Self {
            name: Rc::clone(&self.name),
            options: suboptions,
            option_labels: Rc::clone(&self.option_labels),
        }
    }
}

impl fmt::Display for Hole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_singleton() {
            write!(f, "{}={}", self.name, self.label(self.options[0]))
        } else {
            write!(f, "{}:{{", self.name)?;
            for (i, &option) in self.options.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", self.label(option))?;
            }
            write!(f, "}}")
        }
    }
}

/// Direction of an optimality property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationDirection {
    Minimize,
    Maximize,
}

/// An optimality property with a mutable best-known threshold.
///
/// Shared (via [`Rc<RefCell<_>>`]) across every family produced from a
/// common run so that an update from one branch of the search is visible
/// to all others, matching the shared `solver`/optimum pattern of the
/// original implementation.
#[derive(Debug)]
pub struct OptimalityProperty {
    direction: OptimizationDirection,
    optimum: Option<f64>,
}

impl OptimalityProperty {
    pub fn new(direction: OptimizationDirection) -> Self {
        Self {
            direction,
            optimum: None,
        }
    }

    pub fn direction(&self) -> OptimizationDirection {
        self.direction
    }

    pub fn optimum(&self) -> Option<f64> {
        self.optimum
    }

    /// Whether `candidate` would strictly improve on the current optimum,
    /// without applying the update.
    pub fn would_improve(&self, candidate: f64) -> bool {
        self.improves(candidate)
    }

    fn improves(&self, candidate: f64) -> bool {
        match (self.optimum, self.direction) {
            (None, _) => true,
            (Some(cur), OptimizationDirection::Maximize) => candidate > cur,
            (Some(cur), OptimizationDirection::Minimize) => candidate < cur,
        }
    }

    /// Tightens the optimum if `candidate` strictly improves on it.
    /// Returns whether the update was applied. Monotone: the optimum is
    /// never loosened.
    pub fn update_optimum(&mut self, candidate: f64) -> bool {
        if self.improves(candidate) {
            self.optimum = Some(candidate);
            true
        } else {
            false
        }
    }
}

/// Opaque handle to a probabilistic property declared by the external
/// front end (out of scope, see sketch input in the interface contract).
/// The core never interprets properties itself; it only threads the
/// handles through to the quotient interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyIndex(pub usize);

/// A parametric family: an ordered sequence of holes plus the properties
/// still to be decided for it and an optional shared optimality property.
///
/// Positional hole order is permanent: it defines hole identity across
/// copies and refinements, and hole indices used elsewhere in the crate
/// (conflicts, colorings, scheduler selections) are always indices into
/// this order.
#[derive(Debug, Clone)]
pub struct Family {
    holes: Vec<Hole>,
    properties: Vec<PropertyIndex>,
    optimality: Option<Rc<RefCell<OptimalityProperty>>>,
}

impl Family {
    pub fn new(holes: Vec<Hole>, properties: Vec<PropertyIndex>) -> Self {
        Self {
            holes,
            properties,
            optimality: None,
        }
    }

    pub fn with_optimality(mut self, optimality: Rc<RefCell<OptimalityProperty>>) -> Self {
        self.optimality = Some(optimality);
        self
    }

    pub fn num_holes(&self) -> usize {
        self.holes.len()
    }

    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    pub fn hole(&self, index: usize) -> &Hole {
        &self.holes[index]
    }

    pub fn properties(&self) -> &[PropertyIndex] {
        &self.properties
    }

    pub fn set_properties(&mut self, properties: Vec<PropertyIndex>) {
        self.properties = properties;
    }

    pub fn optimality(&self) -> Option<&Rc<RefCell<OptimalityProperty>>> {
        self.optimality.as_ref()
    }

    pub fn has_optimality(&self) -> bool {
        self.optimality.is_some()
    }

    /// Family size: the product of all hole sizes.
    pub fn size(&self) -> u64 {
        self.holes.iter().map(|h| h.size() as u64).product()
    }

    /// Replaces hole `hole_index`'s option set with `suboptions` (which must
    /// be a subset of the hole's current options). Returns a fresh family;
    /// `self` is not mutated.
    pub fn assume_suboptions(&self, hole_index: usize, suboptions: Vec<OptionId>) -> Self {
        let mut holes = self.holes.clone();
        holes[hole_index] = holes[hole_index].assume_suboptions(suboptions);
        Self {
            holes,
            properties: self.properties.clone(),
            optimality: self.optimality.clone(),
        }
    }

    /// Applies [`Self::assume_suboptions`] per hole, using `map[hole_index]`
    /// for every hole in the family (holes absent from `map` are kept as-is
    /// by passing their current options).
    pub fn assume_all_suboptions(&self, map: &HashMap<usize, Vec<OptionId>>) -> Self {
        let holes = self
            .holes
            .iter()
            .enumerate()
            .map(|(index, hole)| match map.get(&index) {
                Some(suboptions) => hole.assume_suboptions(suboptions.clone()),
                None => hole.clone(),
            })
            .collect();
        Self {
            holes,
            properties: self.properties.clone(),
            optimality: self.optimality.clone(),
        }
    }

    /// Singleton family taking each hole's first option.
    pub fn pick_any(&self) -> Assignment {
        let holes = self
            .holes
            .iter()
            .map(|h| h.assume_suboptions(vec![h.options()[0]]))
            .collect();
        Assignment(Self {
            holes,
            properties: self.properties.clone(),
            optimality: self.optimality.clone(),
        })
    }

    /// Boolean containment check of a partial assignment (hole index to
    /// chosen option); holes absent from `partial` are unconstrained.
    pub fn includes(&self, partial: &HashMap<usize, OptionId>) -> bool {
        partial
            .iter()
            .all(|(&hole_index, &option)| self.holes[hole_index].contains(option))
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, hole) in self.holes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", hole)?;
        }
        Ok(())
    }
}

/// A singleton family: every hole has exactly one option.
#[derive(Debug, Clone)]
pub struct Assignment(Family);

impl Assignment {
    pub fn option(&self, hole_index: usize) -> OptionId {
        self.0.holes[hole_index].options()[0]
    }

    pub fn family(&self) -> &Family {
        &self.0
    }

    pub fn into_family(self) -> Family {
        self.0
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A subset of hole indices, semantically asserting that every family
/// element agreeing with a witness assignment on exactly these holes is
/// infeasible with respect to some property.
pub type Conflict = Vec<usize>;

/// The trivial conflict generator: blames every hole. Always correct, never
/// generalizes (see spec's "conflict granularity" open question).
pub fn trivial_conflict(family: &Family) -> Conflict {
    (0..family.num_holes()).collect()
}

/// Per-hole option sets selected by a scheduler that resolves the
/// nondeterminism of an MDP built from a family.
#[derive(Debug, Clone)]
pub struct SchedulerSelection {
    selection: Vec<Vec<OptionId>>,
}

impl SchedulerSelection {
    pub fn new(selection: Vec<Vec<OptionId>>) -> Self {
        Self { selection }
    }

    pub fn options(&self, hole_index: usize) -> &[OptionId] {
        &self.selection[hole_index]
    }

    pub fn num_holes(&self) -> usize {
        self.selection.len()
    }

    /// A hole is consistent under this scheduler iff its selection has
    /// exactly one option.
    pub fn is_consistent(&self, hole_index: usize) -> bool {
        self.selection[hole_index].len() == 1
    }

    /// A hole is inconsistent iff its selection has more than one option.
    pub fn is_inconsistent(&self, hole_index: usize) -> bool {
        self.selection[hole_index].len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Rc<[String]> {
        (0..n).map(|i| format!("l{}", i)).collect::<Vec<_>>().into()
    }

    fn make_family() -> Family {
        let h0 = Hole::new("h0", vec![0, 1, 2], labels(3));
        let h1 = Hole::new("h1", vec![0, 1], labels(2));
        Family::new(vec![h0, h1], vec![])
    }

    #[test]
    fn hole_display_singleton_vs_set() {
        let h = Hole::new("x", vec![1], labels(3));
        assert_eq!(h.to_string(), "x=l1");
        let h = Hole::new("x", vec![0, 2], labels(3));
        assert_eq!(h.to_string(), "x:{l0,l2}");
    }

    #[test]
    fn refinement_monotonicity_and_isolation() {
        let f = make_family();
        assert_eq!(f.size(), 6);
        let f2 = f.assume_suboptions(0, vec![1, 2]);
        assert_eq!(f2.size(), 4);
        // source untouched (S4 / universal property 1+2)
        assert_eq!(f.size(), 6);
        assert_eq!(f.hole(0).options(), &[0, 1, 2]);
        assert_eq!(f2.hole(0).options(), &[1, 2]);
    }

    #[test]
    fn s4_refinement_isolation_scenario() {
        let f = make_family();
        let f2 = f.assume_suboptions(0, vec![1, 2]);
        assert_eq!(f.size(), 6);
        assert_eq!(f2.size(), 4);
        let a = f.pick_any();
        assert_eq!(a.option(0), 0);
        assert_eq!(a.option(1), 0);
        let a2 = f2.pick_any();
        assert_eq!(a2.option(0), 1);
        assert_eq!(a2.option(1), 0);
    }

    #[test]
    fn pick_any_is_singleton() {
        let f = make_family();
        let a = f.pick_any();
        assert!(a.family().hole(0).is_singleton());
        assert!(a.family().hole(1).is_singleton());
    }

    #[test]
    fn includes_partial_assignment() {
        let f = make_family();
        let mut partial = HashMap::new();
        partial.insert(0, 1);
        assert!(f.includes(&partial));
        let f2 = f.assume_suboptions(0, vec![2]);
        assert!(!f2.includes(&partial));
    }

    #[test]
    fn optimum_monotonicity() {
        let mut opt = OptimalityProperty::new(OptimizationDirection::Maximize);
        assert!(opt.update_optimum(1.0));
        assert!(opt.update_optimum(2.0));
        assert!(!opt.update_optimum(1.5));
        assert_eq!(opt.optimum(), Some(2.0));
    }

    #[test]
    fn shared_optimum_propagates_across_copies() {
        let opt = Rc::new(RefCell::new(OptimalityProperty::new(OptimizationDirection::Minimize)));
        let f = make_family().with_optimality(Rc::clone(&opt));
        let f2 = f.assume_suboptions(0, vec![1]);
        f2.optimality().unwrap().borrow_mut().update_optimum(0.5);
        assert_eq!(f.optimality().unwrap().borrow().optimum(), Some(0.5));
    }
}
