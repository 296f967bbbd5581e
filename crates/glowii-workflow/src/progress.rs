use glowii_core::{ProcessingStep, Session, Stage};
use serde::Serialize;

/// Observable view of the workflow, published on every stage or step change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    /// Session generation; bumps on every new file selection and reset
    pub generation: u64,
    pub stage: Stage,
    pub step: ProcessingStep,
}

impl Progress {
    pub(crate) fn of(generation: u64, session: &Session) -> Self {
        Self {
            generation,
            stage: session.stage,
            step: session.processing_step,
        }
    }
}

/// Result of an operation whose completion may arrive after the session moved on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// A newer session generation was active; the late result was dropped
    Discarded,
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        self == Outcome::Applied
    }
}
