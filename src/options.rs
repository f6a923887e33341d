//! Options for the synthesis procedure (`SPEC_FULL.md` §11).
//!
//! Grounded in the teacher's `options.rs`: one enum per concern with a
//! `Default` impl, a `CliOptions` (clap-derived) flattening a library-facing
//! `SynthesisOptions`, and a `TraceLevel` feeding `log::LevelFilter`. Pinned
//! to a released `clap` version with the `derive` feature (using
//! [`clap::Parser`]/[`clap::ArgEnum`], the stable successor of the
//! teacher's pre-release `clap::Clap` trait) rather than the teacher's git
//! dependency — no functional difference, avoids a non-registry dependency.

use std::path::PathBuf;

use clap::{ArgEnum, Parser};

/// Which synthesis method drives the search (§2, components C5/C6/C8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ArgEnum)]
pub enum SynthesisMethod {
    /// Abstraction refinement only (C5).
    Ar,
    /// Counterexample-guided inductive synthesis only (C6).
    Cegis,
    /// Alternate AR and CEGIS under the stage controller (C7/C8).
    Hybrid,
}
impl Default for SynthesisMethod {
    fn default() -> Self {
        Self::Hybrid
    }
}

/// The trace level / verbosity for the logging framework, identical to the
/// teacher's (`options.rs::TraceLevel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ArgEnum)]
pub enum TraceLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
impl Default for TraceLevel {
    fn default() -> Self {
        Self::Error
    }
}

impl From<TraceLevel> for log::LevelFilter {
    fn from(level: TraceLevel) -> Self {
        match level {
            TraceLevel::Off => Self::Off,
            TraceLevel::Error => Self::Error,
            TraceLevel::Warn => Self::Warn,
            TraceLevel::Info => Self::Info,
            TraceLevel::Debug => Self::Debug,
            TraceLevel::Trace => Self::Trace,
        }
    }
}

/// Library-facing configuration for [`crate::synthesize`], built from
/// [`CliOptions`] the way the teacher derives `SynthesisOptions::from(&options)`.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub method: SynthesisMethod,
    /// Whether the sketch is a POMDP, in which case the POMDP memory-
    /// unfolding driver (C9) wraps the chosen method's AR loop instead of a
    /// single direct run.
    pub pomdp: bool,
    /// Per-observation memory-cell cap for C9's bounded unfold schedule.
    pub memory_limit: usize,
    /// Optional empirical post-check: sample this many random DTMC paths
    /// of the final candidate before reporting it (§15, off by default).
    pub simulation_paths: Option<usize>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            method: SynthesisMethod::default(),
            pomdp: false,
            memory_limit: 3,
            simulation_paths: None,
        }
    }
}

impl SynthesisOptions {
    /// Validates the method/pomdp combination against §7 `UnsupportedMode`:
    /// CEGIS-only 1-by-1 enumeration on a POMDP sketch is unsupported (AR
    /// and Hybrid both still work, since both eventually drive an AR loop).
    pub fn validate(&self) -> Result<(), crate::error::SynthesisError> {
        if self.pomdp && self.method == SynthesisMethod::Cegis {
            return Err(crate::error::SynthesisError::UnsupportedMode(
                "CEGIS-only 1-by-1 enumeration is unsupported on a POMDP sketch; use AR or Hybrid".to_string(),
            ));
        }
        Ok(())
    }
}

/// Command-line entry point's arguments, mirroring the teacher's
/// `CliOptions` (sketch path / method / flags / trace level).
#[derive(Debug, Clone, Parser)]
#[clap(version, about = "Synthesize parameter assignments for a sketch of Markov models")]
pub struct CliOptions {
    /// Path to the parsed sketch (out of scope: parsing itself, §1).
    #[clap(value_parser)]
    pub sketch: PathBuf,

    /// Synthesis method to use.
    #[clap(arg_enum, short = 'm', long = "method", default_value_t = SynthesisMethod::Hybrid)]
    pub method: SynthesisMethod,

    /// Treat the sketch as a POMDP and drive it through the memory-
    /// unfolding driver (C9) instead of a single direct run.
    #[clap(long = "pomdp")]
    pub pomdp: bool,

    /// Per-observation memory-cell cap used by the POMDP driver.
    #[clap(long = "memory-limit", default_value_t = 3)]
    pub memory_limit: usize,

    /// Sample this many random DTMC paths of the final candidate as an
    /// empirical sanity check before reporting it (0 disables the check).
    #[clap(long = "simulate", default_value_t = 0)]
    pub simulation_paths: usize,

    /// Trace level for the logging framework.
    #[clap(arg_enum, short = 't', long = "trace", default_value_t = TraceLevel::Error)]
    pub trace_level: TraceLevel,
}

impl From<&CliOptions> for SynthesisOptions {
    fn from(options: &CliOptions) -> Self {
        Self {
            method: options.method,
            pomdp: options.pomdp,
            memory_limit: options.memory_limit,
            simulation_paths: (options.simulation_paths > 0).then(|| options.simulation_paths),
        }
    }
}
