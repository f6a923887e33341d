//! Synthesis methods: AR (C5), CEGIS (C6), the stage controller (C7) and
//! the hybrid orchestrator (C8).

pub mod ar;
pub mod cegis;
pub mod hybrid;
pub mod stage;

pub use ar::ArSynthesizer;
pub use cegis::CegisSynthesizer;
pub use hybrid::HybridSynthesizer;
pub use stage::StageController;

/// Outcome common to every synthesis method: either a satisfying
/// (optionally optimal) assignment, or none found once the family was
/// fully explored.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub assignment: Option<crate::family::Assignment>,
}

impl SynthesisOutcome {
    pub fn none() -> Self {
        Self { assignment: None }
    }

    pub fn found(assignment: crate::family::Assignment) -> Self {
        Self {
            assignment: Some(assignment),
        }
    }
}
