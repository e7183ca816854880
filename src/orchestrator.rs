//! The two-stage run: a full solve, then a refinement on top of its draft.

use log::{error, info};

use crate::config::SolverConfig;
use crate::context::ScheduleContext;
use crate::data::{ScheduleMatrix, SchedulingInput, SchedulingOutput};
use crate::error::{SchedulingError, Stage};
use crate::model::ModelBuilder;
use crate::objective::build_objective;
use crate::profile::{ConstraintProfile, profile_for};
use crate::solver::{self, StageDiagnostics, solve_stage};
use crate::variables::ShiftVars;

/// Where a run currently stands.
#[derive(Debug, Clone)]
pub enum RunState {
    StageOne,
    StageTwo {
        draft: ScheduleMatrix,
        diagnostics: StageDiagnostics,
    },
    Done(SchedulingOutput),
    Failed(Stage),
}

/// Owns one validated context and drives it through both stages.
pub struct ShiftScheduler {
    ctx: ScheduleContext,
    profile: Box<dyn ConstraintProfile>,
    config: SolverConfig,
    state: RunState,
}

impl ShiftScheduler {
    /// `config` also bounds the time limit and threads of a request's own
    /// `solver` block.
    pub fn new(input: &SchedulingInput, config: SolverConfig) -> Result<Self, SchedulingError> {
        let config = match &input.solver {
            Some(request) => {
                request.validate()?;
                request.bounded_by(&config)
            }
            None => config,
        };
        config.validate()?;
        let ctx = ScheduleContext::new(input)?;
        let profile = profile_for(ctx.params.kind);
        Ok(Self {
            ctx,
            profile,
            config,
            state: RunState::StageOne,
        })
    }

    pub fn context(&self) -> &ScheduleContext {
        &self.ctx
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// The Stage-1 schedule while the refinement is pending.
    pub fn draft(&self) -> Option<&ScheduleMatrix> {
        match &self.state {
            RunState::StageTwo { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// Variables plus objective, shared by both stages.
    fn fresh_model(&self) -> Result<(ModelBuilder, ShiftVars), SchedulingError> {
        let mut m = ModelBuilder::new();
        let vars = ShiftVars::build(&mut m, &self.ctx)?;
        Ok((m, vars))
    }

    fn fail(&mut self, err: SchedulingError) -> SchedulingError {
        if let Some(stage) = err.stage() {
            error!("{stage} failed: {err}");
            self.state = RunState::Failed(stage);
        }
        err
    }

    /// Builds and solves the full model. On success the run moves to the
    /// refinement stage with the returned draft.
    pub fn stage_one(&mut self) -> Result<(), SchedulingError> {
        if !matches!(self.state, RunState::StageOne) {
            return Err(SchedulingError::Configuration(
                "stage 1 has already run".to_string(),
            ));
        }
        info!("Building {} model...", Stage::One);
        let (mut m, vars) = self.fresh_model()?;
        self.profile.stage_one(&mut m, &vars, &self.ctx);
        build_objective(&mut m, &vars, &self.ctx, &self.profile.weights());

        let outcome = solve_stage(m, &vars, &self.ctx, &self.config, Stage::One);
        let (draft, diagnostics) = outcome.into_result().map_err(|e| self.fail(e))?;
        self.state = RunState::StageTwo { draft, diagnostics };
        Ok(())
    }

    /// Locks in the draft, opens the 3-day weekends and solves again.
    pub fn stage_two(&mut self) -> Result<(), SchedulingError> {
        let RunState::StageTwo { draft, diagnostics } = &self.state else {
            return Err(SchedulingError::Configuration(
                "stage 2 needs a stage 1 draft".to_string(),
            ));
        };
        let stage_one = diagnostics.clone();
        info!("Building {} model...", Stage::Two);
        let (mut m, vars) = self.fresh_model()?;
        self.profile.stage_two(&mut m, &vars, &self.ctx, draft);
        build_objective(&mut m, &vars, &self.ctx, &self.profile.weights());

        let outcome = solve_stage(m, &vars, &self.ctx, &self.config, Stage::Two);
        let (schedule, stage_two) = outcome.into_result().map_err(|e| self.fail(e))?;

        let unmet = solver::unmet_soft_constraints(&self.ctx, &schedule);
        for u in &unmet {
            info!("Unmet: {u}");
        }
        self.state = RunState::Done(SchedulingOutput {
            summaries: stage_two.summaries.clone(),
            schedule,
            unmet_soft_constraints: unmet,
            stages: vec![stage_one, stage_two],
        });
        Ok(())
    }

    /// Runs whatever is left and hands back the final output.
    pub fn run(mut self) -> Result<SchedulingOutput, SchedulingError> {
        if matches!(self.state, RunState::StageOne) {
            self.stage_one()?;
        }
        if matches!(self.state, RunState::StageTwo { .. }) {
            self.stage_two()?;
        }
        match self.state {
            RunState::Done(output) => Ok(output),
            RunState::Failed(stage) => Err(SchedulingError::Configuration(format!(
                "the run already failed in {stage}"
            ))),
            RunState::StageOne | RunState::StageTwo { .. } => Err(
                SchedulingError::Configuration("the run stopped before stage 2".to_string()),
            ),
        }
    }
}

/// Validates the input and runs both stages. A `solver` block in the
/// request replaces `config`, clamped to its time limit and threads.
pub fn solve(
    input: &SchedulingInput,
    config: SolverConfig,
) -> Result<SchedulingOutput, SchedulingError> {
    ShiftScheduler::new(input, config)?.run()
}
