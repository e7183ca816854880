use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::solver::StageDiagnostics;

/// The two solves of a scheduling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    /// Full model: every hard rule, 2-day weekends.
    #[serde(rename = "stage1")]
    One,
    /// Refinement: Stage 1 locked in, 3-day weekends opened.
    #[serde(rename = "stage2")]
    Two,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::One => f.write_str("stage 1"),
            Stage::Two => f.write_str("stage 2"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("No schedule exists for {stage}: the model is infeasible")]
    Infeasible {
        stage: Stage,
        diagnostics: Box<StageDiagnostics>,
    },
    #[error("The time budget ran out in {stage} before a feasible schedule was found")]
    SolveTimeout {
        stage: Stage,
        diagnostics: Box<StageDiagnostics>,
    },
    #[error("Solver failure in {stage}: {message}")]
    Solver {
        stage: Stage,
        message: String,
        diagnostics: Box<StageDiagnostics>,
    },
}

impl SchedulingError {
    /// The failed stage, when the error came from a solve.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SchedulingError::Configuration(_) => None,
            SchedulingError::Infeasible { stage, .. }
            | SchedulingError::SolveTimeout { stage, .. }
            | SchedulingError::Solver { stage, .. } => Some(*stage),
        }
    }

    pub fn diagnostics(&self) -> Option<&StageDiagnostics> {
        match self {
            SchedulingError::Configuration(_) => None,
            SchedulingError::Infeasible { diagnostics, .. }
            | SchedulingError::SolveTimeout { diagnostics, .. }
            | SchedulingError::Solver { diagnostics, .. } => Some(diagnostics),
        }
    }
}
