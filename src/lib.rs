//! Two-stage shift scheduling on top of a HiGHS integer program.

pub mod config;
pub mod constraints;
pub mod context;
pub mod data;
pub mod error;
pub mod model;
pub mod objective;
pub mod orchestrator;
pub mod profile;
pub mod server;
pub mod solver;
pub mod variables;

pub use config::{ServerConfig, SolverConfig};
pub use data::{ScheduleMatrix, SchedulingInput, SchedulingOutput, ShiftType};
pub use error::{SchedulingError, Stage};
pub use orchestrator::{ShiftScheduler, solve};
pub use solver::{SolveStatus, StageDiagnostics};
