//! Synthesis core for a family of parametric Markov models (`SPEC_FULL.md`
//! §10): this crate owns the design-space representation (C1), the SAT
//! enumerator (C2/C6), the two search methods and their alternation (C5–C8),
//! the POMDP memory-unfolding driver (C9) and the external-oracle fusion
//! layer (C10). The model checker, the SAT backend's CNF internals beyond
//! what [`sat::SatEnumerator`] needs, the PRISM/JANI parsing front-end, and
//! the belief-exploration algorithm itself are all out of scope (§1) and are
//! represented here only as the trait boundaries a real backend implements
//! ([`quotient::QuotientInterface`], [`pomdp::PomdpInterface`],
//! [`oracle::OracleQuotient`]).
//!
//! Grounded in the teacher's crate root: `lib.rs::synthesize`/`synthesize_with`
//! wire the automaton, queue and solver together behind one public entry
//! point; this crate's [`synthesize`] (non-POMDP sketches) and
//! [`synthesize_pomdp`] (POMDP sketches, needing the stronger
//! [`pomdp::PomdpInterface`] bound) play the same role for the family stack,
//! the SAT enumerator and whichever method the caller selected.

pub mod error;
pub mod family;
pub mod oracle;
pub mod options;
pub mod pomdp;
pub mod quotient;
pub mod sat;
pub mod stats;
pub mod synth;

use std::rc::Rc;

use log::info;

use error::SynthesisError;
use family::{Family, Hole, OptimalityProperty, OptionId, PropertyIndex};
use options::{SynthesisMethod, SynthesisOptions};
use pomdp::{PomdpDriver, PomdpInterface};
use quotient::QuotientInterface;
use sat::SatEnumerator;
use stats::RunStats;
use synth::{ArSynthesizer, CegisSynthesizer, HybridSynthesizer, SynthesisOutcome};

/// One free choice as handed in from outside the crate, before it has been
/// checked against the hole invariants [`family::Hole::new`] enforces by
/// assertion. Kept as plain data (not yet a [`Hole`]) so a malformed sketch
/// is rejected with [`SynthesisError::InvalidSketch`] rather than a panic —
/// §7 requires every error to propagate through `Result`, never a crash.
#[derive(Debug, Clone)]
pub struct HoleSpec {
    pub name: String,
    pub options: Vec<OptionId>,
    pub option_labels: Vec<String>,
}

/// A sketch's design space plus the properties it must satisfy, as handed in
/// by the (out-of-scope) parsing front-end (§1, §10).
#[derive(Debug, Clone, Default)]
pub struct Sketch {
    pub holes: Vec<HoleSpec>,
    pub properties: Vec<PropertyIndex>,
    /// Present iff the sketch carries an optimizing property (C1).
    pub optimality_direction: Option<family::OptimizationDirection>,
    /// Whether the sketch is a POMDP, routed through the memory-unfolding
    /// driver (C9) regardless of the requested [`SynthesisMethod`] — §9's
    /// driver is defined in terms of AR only, so `Hybrid` under POMDP
    /// degenerates to the same behavior as `Ar` (an intentional divergence
    /// from a literal per-method dispatch, recorded in `DESIGN.md`).
    pub is_pomdp: bool,
}

/// The result of a completed (or aborted) synthesis run: the best
/// assignment found so far (if any) together with the run's statistics.
/// Per §7, this is always produced — on success via `Ok`, on failure paired
/// with whatever partial progress existed at the point of failure — so a
/// caller never loses the best-so-far candidate just because a later step
/// failed.
#[derive(Debug, Clone)]
pub struct SynthesisRun {
    pub outcome: SynthesisOutcome,
    pub stats: RunStats,
}

impl SynthesisRun {
    fn empty() -> Self {
        Self {
            outcome: SynthesisOutcome::none(),
            stats: RunStats::new(),
        }
    }
}

/// Checks sketch-level data invariants that [`family::Hole::new`] would
/// otherwise enforce by assertion: every hole's option set is non-empty and
/// every option id is in range of that hole's label table, and no two holes
/// share a name (names double as keys in scheduler-selection/conflict
/// reporting, §4.1).
fn validate_sketch(sketch: &Sketch) -> Result<(), SynthesisError> {
    let mut seen_names = std::collections::HashSet::new();
    for hole in &sketch.holes {
        if !seen_names.insert(&hole.name) {
            return Err(SynthesisError::InvalidSketch(format!("duplicate hole name {:?}", hole.name)));
        }
        if hole.options.is_empty() {
            return Err(SynthesisError::InvalidSketch(format!("hole {:?} has no options", hole.name)));
        }
        if hole.options.iter().any(|&o| (o as usize) >= hole.option_labels.len()) {
            return Err(SynthesisError::InvalidSketch(format!(
                "hole {:?} has an option id out of range of its label table",
                hole.name
            )));
        }
    }
    Ok(())
}

fn build_family(sketch: &Sketch) -> Family {
    let holes: Vec<Hole> = sketch
        .holes
        .iter()
        .map(|spec| {
            let labels: Rc<[String]> = spec.option_labels.clone().into();
            Hole::new(spec.name.as_str(), spec.options.clone(), labels)
        })
        .collect();
    let family = Family::new(holes, sketch.properties.clone());
    match sketch.optimality_direction {
        Some(direction) => {
            let optimality = Rc::new(std::cell::RefCell::new(OptimalityProperty::new(direction)));
            family.with_optimality(optimality)
        }
        None => family,
    }
}

/// Checks the `sketch.is_pomdp`/`options.pomdp`/`options.method` combination
/// shared by both [`synthesize`] and [`synthesize_pomdp`] (§7
/// `UnsupportedMode`, plus the `InvalidSketch` cross-check between the
/// sketch and the options that describe it).
fn validate_pomdp_flags(sketch: &Sketch, options: &SynthesisOptions) -> Result<(), SynthesisError> {
    options.validate()?;
    validate_sketch(sketch)?;
    if options.pomdp != sketch.is_pomdp {
        return Err(SynthesisError::InvalidSketch(
            "sketch.is_pomdp and options.pomdp disagree on whether this is a POMDP sketch".to_string(),
        ));
    }
    Ok(())
}

/// Top-level synthesis entry point for a non-POMDP sketch (§10): validates
/// the sketch and options, builds the initial family (C1), and dispatches
/// to whichever of AR/CEGIS/Hybrid (C5–C8) `options.method` selects.
///
/// `quotient` stands in for the out-of-scope model-checking backend (any
/// type implementing [`quotient::QuotientInterface`]). A POMDP sketch is
/// rejected here with [`SynthesisError::UnsupportedMode`] pointing at
/// [`synthesize_pomdp`] — that entry point requires the strictly stronger
/// [`pomdp::PomdpInterface`] bound the memory-unfolding driver (C9) needs,
/// which a plain [`quotient::QuotientInterface`] backend need not provide
/// (the mock backend used by this crate's own non-POMDP tests, for
/// instance, implements only the former).
///
/// On failure, returns the error alongside whatever [`SynthesisRun`] had
/// been assembled at the point of failure (empty, since every failure mode
/// here is a validation error caught before any solver work begins — §7
/// "no partial results are committed if an error occurs before the first
/// SAT assignment is recorded").
pub fn synthesize<Q: QuotientInterface>(
    sketch: Sketch,
    quotient: Q,
    options: &SynthesisOptions,
) -> Result<SynthesisRun, (SynthesisError, SynthesisRun)> {
    validate_pomdp_flags(&sketch, options).map_err(|e| (e, SynthesisRun::empty()))?;

    if options.pomdp {
        let e = SynthesisError::UnsupportedMode(
            "POMDP sketches must go through synthesize_pomdp, which requires a PomdpInterface backend".to_string(),
        );
        return Err((e, SynthesisRun::empty()));
    }

    let family = build_family(&sketch);
    let run = match options.method {
        SynthesisMethod::Ar => {
            info!("synthesize: running AR (C5)");
            let mut ar = ArSynthesizer::new(family);
            let outcome = ar.run(&quotient);
            SynthesisRun {
                outcome,
                stats: ar.stats().clone(),
            }
        }
        SynthesisMethod::Cegis => {
            info!("synthesize: running CEGIS (C6)");
            let sat = SatEnumerator::new(&family);
            let mut cegis = CegisSynthesizer::new(sat, family);
            let outcome = cegis.run(&quotient);
            SynthesisRun {
                outcome,
                stats: cegis.stats().clone(),
            }
        }
        SynthesisMethod::Hybrid => {
            info!("synthesize: running Hybrid (C7/C8)");
            let sat = SatEnumerator::new(&family);
            let mut hybrid = HybridSynthesizer::new(sat, family);
            let outcome = hybrid.run(&quotient);
            SynthesisRun {
                outcome,
                stats: hybrid.stats().clone(),
            }
        }
    };
    Ok(run)
}

/// Top-level synthesis entry point for a POMDP sketch (§10/§4.9): routes the
/// sketch through the memory-unfolding driver (C9), which iterates AR over
/// progressively richer unfoldings of `quotient`'s own design space
/// ([`pomdp::PomdpInterface::full_family`]) rather than a family built from
/// `sketch.holes` directly — the sketch here only carries the flags
/// [`validate_pomdp_flags`] cross-checks against `options`.
///
/// Requires a backend implementing [`pomdp::PomdpInterface`] (a strict
/// supertrait of [`quotient::QuotientInterface`]); see [`synthesize`] for
/// the non-POMDP entry point, which accepts any `QuotientInterface` backend.
pub fn synthesize_pomdp<Q: PomdpInterface>(
    sketch: Sketch,
    quotient: Q,
    options: &SynthesisOptions,
) -> Result<SynthesisRun, (SynthesisError, SynthesisRun)> {
    validate_pomdp_flags(&sketch, options).map_err(|e| (e, SynthesisRun::empty()))?;

    if !options.pomdp {
        let e = SynthesisError::InvalidSketch(
            "synthesize_pomdp called with a non-POMDP sketch; use synthesize instead".to_string(),
        );
        return Err((e, SynthesisRun::empty()));
    }

    info!("synthesize_pomdp: routing sketch through the memory-unfolding driver (C9)");
    let mut driver = PomdpDriver::new(options.memory_limit);
    let outcome = driver.run(quotient);
    let stats = driver.stats().clone();
    Ok(SynthesisRun { outcome, stats })
}
