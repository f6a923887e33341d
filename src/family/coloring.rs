//! Combination coloring: a bidirectional map from partial hole-tuples to
//! dense color ids, used by the quotient builder to attribute model
//! elements (states, transitions) to holes.
//!
//! Color `0` is reserved for hole-free model elements and is never
//! produced by [`CombinationColoring::get_or_make_color`].

use std::collections::{HashMap, HashSet};

use super::{Family, OptionId};

pub type Color = u32;

/// A partial hole-tuple: `combination[i] == Some(option)` pins hole `i` to
/// `option`; `None` means the hole is irrelevant for this color (`⊥`).
pub type Combination = Vec<Option<OptionId>>;

#[derive(Debug, Default)]
pub struct CombinationColoring {
    coloring: HashMap<Combination, Color>,
    reverse: HashMap<Color, Combination>,
}

impl CombinationColoring {
    pub fn new() -> Self {
        Self {
            coloring: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    pub fn num_colors(&self) -> usize {
        self.coloring.len()
    }

    /// Idempotent insertion: returns the existing color for `combination`,
    /// or allocates a fresh one (`num_colors() + 1`, so always `>= 1`).
    pub fn get_or_make_color(&mut self, combination: Combination) -> Color {
        if let Some(&color) = self.coloring.get(&combination) {
            return color;
        }
        let color = self.coloring.len() as Color + 1;
        self.reverse.insert(color, combination.clone());
        self.coloring.insert(combination, color);
        color
    }

    /// Colors whose every non-`⊥` coordinate lies within the corresponding
    /// hole's current options in `subspace`.
    pub fn subcolors(&self, subspace: &Family) -> HashSet<Color> {
        self.coloring
            .iter()
            .filter_map(|(combination, &color)| {
                let contained = combination.iter().enumerate().all(|(hole_index, entry)| {
                    match entry {
                        None => true,
                        Some(option) => subspace.hole(hole_index).contains(*option),
                    }
                });
                contained.then(|| color)
            })
            .collect()
    }

    /// Colors whose coordinate at `hole_index` lies in `options`
    /// (irrespective of the rest of the tuple).
    pub fn subcolors_proper(&self, hole_index: usize, options: &[OptionId]) -> HashSet<Color> {
        self.coloring
            .iter()
            .filter_map(|(combination, &color)| {
                let matches = combination
                    .get(hole_index)
                    .and_then(|entry| *entry)
                    .map_or(false, |option| options.contains(&option));
                matches.then(|| color)
            })
            .collect()
    }

    pub fn reverse_lookup(&self, color: Color) -> Option<&Combination> {
        self.reverse.get(&color)
    }
}
