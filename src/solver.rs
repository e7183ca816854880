//! Runs one stage through HiGHS and turns the answer into a schedule.

use good_lp::{ResolutionError, Solution, SolverModel, Variable, default_solver};
use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::config::SolverConfig;
use crate::context::ScheduleContext;
use crate::data::{ScheduleMatrix, ShiftType, UnmetSoftConstraint, WorkerSummary};
use crate::error::{SchedulingError, Stage};
use crate::model::ModelBuilder;
use crate::variables::ShiftVars;

use crate::data::ShiftType::*;

/// Share of the time budget after which a solution no longer counts as
/// proven optimal.
const TIME_LIMIT_MARGIN: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    /// A verified schedule found when the time budget ran out.
    Feasible,
    Infeasible,
    /// The budget ran out without a schedule.
    Unknown,
    ModelInvalid,
}

impl SolveStatus {
    pub fn has_schedule(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

/// What one solve looked like, for operators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDiagnostics {
    pub stage: Stage,
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    /// Not reported by the HiGHS backend.
    pub best_bound: Option<f64>,
    pub branches: Option<u64>,
    pub conflicts: Option<u64>,
    pub wall_time_secs: f64,
    pub variables: usize,
    pub constraints: usize,
    pub summaries: Vec<WorkerSummary>,
    pub unassigned: usize,
}

/// The result of a stage, before the orchestrator decides what it means.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub diagnostics: StageDiagnostics,
    pub schedule: Option<ScheduleMatrix>,
    pub message: Option<String>,
}

impl StageOutcome {
    /// The schedule of a successful stage, or the stage failure as an error.
    pub fn into_result(self) -> Result<(ScheduleMatrix, StageDiagnostics), SchedulingError> {
        let stage = self.diagnostics.stage;
        let diagnostics = Box::new(self.diagnostics);
        match (diagnostics.status, self.schedule) {
            (status, Some(schedule)) if status.has_schedule() => Ok((schedule, *diagnostics)),
            (SolveStatus::Infeasible, _) => Err(SchedulingError::Infeasible { stage, diagnostics }),
            (SolveStatus::Unknown, _) => Err(SchedulingError::SolveTimeout { stage, diagnostics }),
            (_, _) => Err(SchedulingError::Solver {
                stage,
                message: self
                    .message
                    .unwrap_or_else(|| "solver returned no schedule".to_string()),
                diagnostics,
            }),
        }
    }
}

/// Status of a returned point. good_lp does not pass on the HiGHS model
/// status, so this is inferred:
///
/// - a point that violates any row means no incumbent: `Unknown`;
/// - a point returned at the time limit, or under an explicit positive
///   `mip_rel_gap`, is only known to be `Feasible`;
/// - anything else finished the search: `Optimal`.
fn classify(violated_rows: usize, elapsed: Duration, config: &SolverConfig) -> SolveStatus {
    let at_limit = elapsed.as_secs_f64() >= config.time_limit_secs * TIME_LIMIT_MARGIN;
    let stopped_on_gap = config.mip_rel_gap.is_some_and(|gap| gap > 0.0);
    if violated_rows > 0 {
        SolveStatus::Unknown
    } else if at_limit || stopped_on_gap {
        SolveStatus::Feasible
    } else {
        SolveStatus::Optimal
    }
}

/// Solves the model built for `stage` and extracts the schedule.
pub fn solve_stage(
    mut m: ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    config: &SolverConfig,
    stage: Stage,
) -> StageOutcome {
    let start_time = Instant::now();
    let mut diagnostics = StageDiagnostics {
        stage,
        status: SolveStatus::Unknown,
        objective_value: None,
        best_bound: None,
        branches: None,
        conflicts: None,
        wall_time_secs: 0.0,
        variables: m.column_count(),
        constraints: m.row_count(),
        summaries: Vec::new(),
        unassigned: 0,
    };
    info!(
        "Setting up {stage} ILP model with {} variables, {} rows and {} objective terms...",
        diagnostics.variables,
        diagnostics.constraints,
        m.objective_terms()
    );

    let problem = m.take_variables();
    let mut model = problem
        .minimise(m.objective().clone())
        .using(default_solver)
        .set_option("threads", config.threads as i32)
        .set_option("random_seed", config.random_seed)
        .set_option("time_limit", config.time_limit_secs)
        .set_option(
            "log_to_console",
            if config.log_to_console { "true" } else { "false" },
        );
    if let Some(gap) = config.mip_rel_gap {
        model = model.set_option("mip_rel_gap", gap);
    }
    for row in m.rows() {
        model.add_constraint(row.to_constraint());
    }

    info!("Starting ILP solver for {stage}...");
    let result = model.solve();
    let elapsed = start_time.elapsed();
    diagnostics.wall_time_secs = elapsed.as_secs_f64();

    let solution = match result {
        Ok(solution) => solution,
        Err(ResolutionError::Infeasible) => {
            warn!("{stage} is infeasible after {elapsed:.2?}");
            diagnostics.status = SolveStatus::Infeasible;
            return StageOutcome {
                diagnostics,
                schedule: None,
                message: None,
            };
        }
        Err(e) => {
            error!("{stage} solver error after {elapsed:.2?}: {e}");
            diagnostics.status = SolveStatus::ModelInvalid;
            return StageOutcome {
                diagnostics,
                schedule: None,
                message: Some(e.to_string()),
            };
        }
    };

    let violated = m.violated_rows(|expr| solution.eval(expr));
    diagnostics.status = classify(violated, elapsed, config);
    if !diagnostics.status.has_schedule() {
        warn!("{stage}: returned point violates {violated} rows, treating as no incumbent");
        return StageOutcome {
            diagnostics,
            schedule: None,
            message: None,
        };
    }
    diagnostics.objective_value = Some(solution.eval(m.objective()));
    info!(
        "{stage} solution found in {elapsed:.2?} ({:?}, objective {:.2})",
        diagnostics.status,
        diagnostics.objective_value.unwrap_or_default()
    );

    let schedule = extract_schedule(ctx, vars, |v| solution.value(v));
    diagnostics.summaries = summarize(ctx, &schedule);
    diagnostics.unassigned = diagnostics.summaries.iter().map(|s| s.unassigned).sum();
    log_count_table(ctx, &schedule);
    StageOutcome {
        diagnostics,
        schedule: Some(schedule),
        message: None,
    }
}

/// For each (worker, day) the first shift in declaration order whose
/// variable is set. Days without one stay unassigned.
pub fn extract_schedule(
    ctx: &ScheduleContext,
    vars: &ShiftVars,
    value: impl Fn(Variable) -> f64,
) -> ScheduleMatrix {
    let mut schedule = ScheduleMatrix::new();
    for (w, worker) in ctx.workers.iter().enumerate() {
        let row = (1..=ctx.num_days())
            .map(|day| {
                let shift = ShiftType::ALL
                    .into_iter()
                    .find(|s| vars.get(w, day, *s).is_some_and(|v| value(v) > 0.5));
                if shift.is_none() {
                    warn!("Worker {} has no shift on day {day}", worker.id);
                }
                shift
            })
            .collect();
        schedule.push_row(worker.id, row);
    }
    schedule
}

pub fn summarize(ctx: &ScheduleContext, schedule: &ScheduleMatrix) -> Vec<WorkerSummary> {
    ctx.workers
        .iter()
        .map(|worker| {
            let count = |shift| schedule.count(worker.id, shift);
            let special_day_work = ctx
                .special_days()
                .filter(|d| {
                    schedule
                        .get(worker.id, *d)
                        .is_some_and(ShiftType::is_morning_or_afternoon)
                })
                .count();
            WorkerSummary {
                worker: worker.id,
                free: count(Free),
                quality_free: count(QualityFree),
                compensation: count(CompensationFree),
                complementary: count(Complementary),
                total_free: ShiftType::FREE_QUOTA.into_iter().map(count).sum(),
                special_day_work,
                unassigned: schedule.unassigned(worker.id),
            }
        })
        .collect()
}

fn log_count_table(ctx: &ScheduleContext, schedule: &ScheduleMatrix) {
    let shifts = &ctx.params.shift_types;
    info!("worker | {} | unassigned", shifts.iter().join(" | "));
    for worker in &ctx.workers {
        let counts = shifts
            .iter()
            .map(|s| schedule.count(worker.id, *s))
            .join(" | ");
        info!(
            "{:>6} | {counts} | {}",
            worker.id,
            schedule.unassigned(worker.id)
        );
    }
}

/// Soft goals the final schedule misses.
pub fn unmet_soft_constraints(
    ctx: &ScheduleContext,
    schedule: &ScheduleMatrix,
) -> Vec<UnmetSoftConstraint> {
    let mut unmet = Vec::new();
    for (&(day, shift), goal) in &ctx.staffing {
        let assigned = ctx
            .workers
            .iter()
            .filter(|w| schedule.get(w.id, day) == Some(shift))
            .count() as u32;
        if goal.target > 0 && assigned == 0 && !ctx.is_closed(day) {
            unmet.push(UnmetSoftConstraint {
                constraint_type: "Unstaffed Shift".to_string(),
                description: format!(
                    "Day {day} shift {shift} has nobody assigned, {} wanted.",
                    goal.target
                ),
            });
        } else if assigned != goal.target {
            unmet.push(UnmetSoftConstraint {
                constraint_type: "Staffing Deviation".to_string(),
                description: format!(
                    "Day {day} shift {shift} has {assigned} workers, target is {}.",
                    goal.target
                ),
            });
        }
        if assigned < goal.minimum {
            unmet.push(UnmetSoftConstraint {
                constraint_type: "Below Minimum".to_string(),
                description: format!(
                    "Day {day} shift {shift} has {assigned} workers, minimum is {}.",
                    goal.minimum
                ),
            });
        }
    }

    for worker in &ctx.workers {
        for (week, days) in &ctx.weeks {
            let working = days.iter().filter(|d| worker.is_working(**d)).count();
            if working < 2 {
                continue;
            }
            let has = |shift: ShiftType| days.iter().any(|d| schedule.get(worker.id, *d) == Some(shift));
            if has(Morning) && has(Afternoon) {
                unmet.push(UnmetSoftConstraint {
                    constraint_type: "Mixed Shift Week".to_string(),
                    description: format!(
                        "Worker {} works both M and T in week {week}.",
                        worker.id
                    ),
                });
            }
        }
    }
    debug!("{} soft constraints unmet", unmet.len());
    unmet
}
