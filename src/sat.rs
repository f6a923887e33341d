//! SAT-backed enumeration oracle over hole variables (C2).
//!
//! Maintains one [`varisat::Solver`] instance and one literal per (hole,
//! option) pair, encoded in unary: exactly one literal per hole is true,
//! literal `vars[hole][option]` standing for `v_hole = option`. This
//! mirrors the teacher's `controller/machine/sat.rs`, which builds its own
//! cardinality encoding directly out of `varisat::Lit`s rather than going
//! through a higher-level modeling layer.
//!
//! A family's restriction to a sub-range of a hole's options is captured by
//! a small Tseitin indicator (`q <-> OR(option literals)`) built fresh per
//! call — cheap, and never persisted across calls, per §4.2. The same
//! indicator serves both [`SatEnumerator::pick_assignment`] (assumed true,
//! to force the model to honor the current family's ranges) and
//! [`SatEnumerator::exclude_assignment`] (negated, to assert "this hole's
//! value is outside the family's range").
//!
//! Blocking clauses added by `exclude_assignment` are permanent and
//! monotone for the lifetime of a run (§5): they are never retracted.

use std::collections::HashMap;

use log::warn;
use varisat::{ExtendFormula, Lit, Solver};

use crate::family::{Assignment, Conflict, Family, OptionId};

pub struct SatEnumerator<'a> {
    solver: Solver<'a>,
    /// For each hole, a literal per original option id.
    vars: Vec<HashMap<OptionId, Lit>>,
    true_lit: Lit,
}

impl<'a> SatEnumerator<'a> {
    /// Initializes the solver from the full (unrefined) family: one
    /// literal per hole option, constrained `0 <= v_hole < size(hole)` via
    /// an exactly-one clause set per hole.
    pub fn new(full_family: &Family) -> Self {
        let mut solver = Solver::new();
        let true_lit = solver.new_lit();
        solver.add_clause(&[true_lit]);

        let mut vars = Vec::with_capacity(full_family.num_holes());
        for hole in full_family.holes() {
            let lits: HashMap<OptionId, Lit> = hole
                .options()
                .iter()
                .map(|&option| (option, solver.new_lit()))
                .collect();
            let all_lits: Vec<Lit> = lits.values().copied().collect();
            solver.add_clause(&all_lits);
            for i in 0..all_lits.len() {
                for j in (i + 1)..all_lits.len() {
                    solver.add_clause(&[!all_lits[i], !all_lits[j]]);
                }
            }
            vars.push(lits);
        }
        Self {
            solver,
            vars,
            true_lit,
        }
    }

    /// Builds (or returns the fixed `true` literal for an unrestricted
    /// hole) an indicator `q` with `q <-> OR(options)`.
    fn in_range_indicator(&mut self, hole_index: usize, options: &[OptionId]) -> Lit {
        if options.len() == self.vars[hole_index].len() {
            return self.true_lit;
        }
        let q = self.solver.new_lit();
        let lits: Vec<Lit> = options
            .iter()
            .map(|option| self.vars[hole_index][option])
            .collect();
        let mut forward = vec![!q];
        forward.extend(lits.iter().copied());
        self.solver.add_clause(&forward);
        for &lit in &lits {
            self.solver.add_clause(&[!lit, q]);
        }
        q
    }

    /// Calls `check` against the encoding of `family` and, on SAT, reads
    /// the model back into a singleton [`Assignment`]; on UNSAT (or a
    /// solver error, treated identically per §7 `SolverError`), returns
    /// `None`.
    pub fn pick_assignment(&mut self, family: &Family) -> Option<Assignment> {
        let assumptions: Vec<Lit> = (0..family.num_holes())
            .map(|hole_index| self.in_range_indicator(hole_index, family.hole(hole_index).options()))
            .collect();
        self.solver.assume(&assumptions);
        match self.solver.solve() {
            Ok(true) => Some(self.read_model(family)),
            Ok(false) => None,
            Err(err) => {
                warn!("SAT solver returned unknown ({}); treating as exhausted", err);
                None
            }
        }
    }

    fn read_model(&self, family: &Family) -> Assignment {
        let model = self.solver.model().expect("model available after SAT result");
        let mut map = HashMap::new();
        for (hole_index, hole) in family.holes().iter().enumerate() {
            let chosen = hole
                .options()
                .iter()
                .copied()
                .find(|option| model[self.vars[hole_index][option].index()].is_positive())
                .expect("exactly-one clause guarantees some option is selected");
            map.insert(hole_index, vec![chosen]);
        }
        family.assume_all_suboptions(&map).pick_any()
    }

    /// Adds the permanent clause blocking `witness` and every extension
    /// agreeing with it on `conflict`, within `family`'s current option
    /// ranges for the remaining holes:
    /// `¬( (⋀_{i∈conflict} v_i = witness[i]) ∧ (⋀_{i∉conflict} v_i ∈ family[i].options) )`.
    pub fn exclude_assignment(&mut self, witness: &Assignment, conflict: &Conflict, family: &Family) {
        let mut clause = Vec::with_capacity(family.num_holes());
        for hole_index in 0..family.num_holes() {
            if conflict.contains(&hole_index) {
                let option = witness.option(hole_index);
                let lit = self.vars[hole_index][&option];
                clause.push(!lit);
            } else {
                let q = self.in_range_indicator(hole_index, family.hole(hole_index).options());
                clause.push(!q);
            }
        }
        self.solver.add_clause(&clause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{Hole, OptionId};
    use std::rc::Rc;

    fn labels(n: usize) -> Rc<[String]> {
        (0..n).map(|i| format!("l{}", i)).collect::<Vec<_>>().into()
    }

    fn full_family(sizes: &[usize]) -> Family {
        let holes = sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let options: Vec<OptionId> = (0..n as OptionId).collect();
                Hole::new(format!("h{}", i), options, labels(n))
            })
            .collect();
        Family::new(holes, vec![])
    }

    #[test]
    fn pick_assignment_respects_family_ranges() {
        let full = full_family(&[3, 2]);
        let mut sat = SatEnumerator::new(&full);
        let restricted = full.assume_suboptions(0, vec![1, 2]);
        let a = sat.pick_assignment(&restricted).expect("sat");
        assert!(a.option(0) == 1 || a.option(0) == 2);
    }

    #[test]
    fn blocking_soundness_s5() {
        // S5: holes h0:{0,1}, h1:{0,1}, h2:{0,1}; exclude witness {0,0,0}
        // with conflict {0,1}; exactly 6 of 8 assignments remain, and none
        // of the form {0,0,*} are ever returned again.
        let full = full_family(&[2, 2, 2]);
        let mut sat = SatEnumerator::new(&full);
        let witness = full.assume_all_suboptions(&{
            let mut m = HashMap::new();
            m.insert(0, vec![0]);
            m.insert(1, vec![0]);
            m.insert(2, vec![0]);
            m
        }).pick_any();
        sat.exclude_assignment(&witness, &vec![0, 1], &full);

        let mut seen = std::collections::HashSet::new();
        while let Some(a) = sat.pick_assignment(&full) {
            assert!(
                !(a.option(0) == 0 && a.option(1) == 0),
                "blocked combination resurfaced: {}",
                a
            );
            let key = (a.option(0), a.option(1), a.option(2));
            assert!(seen.insert(key), "duplicate assignment {:?}", key);
            // block this exact assignment too so the loop terminates
            sat.exclude_assignment(&a, &vec![0, 1, 2], &full);
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn blocking_progress_terminates_within_family_size() {
        let full = full_family(&[2, 2]);
        let mut sat = SatEnumerator::new(&full);
        let mut iterations: u64 = 0;
        while let Some(a) = sat.pick_assignment(&full) {
            iterations += 1;
            assert!(iterations <= full.size());
            sat.exclude_assignment(&a, &vec![0, 1], &full);
        }
        assert_eq!(iterations, full.size());
    }
}
