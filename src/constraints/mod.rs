//! The hard rules. Each function adds the rows for one rule family and
//! skips any (worker, day, shift) combination without a variable.

mod compensation;
mod free_days;
mod pinning;
mod quotas;
mod refinement;
mod weekends;
mod weekly;

pub use compensation::{compensation_matching, special_day_work_priority, weekly_compensation_cap};
pub use free_days::{consecutive_free_day_pairs, no_three_free_days_in_a_row};
pub use pinning::{absence_days, closed_holidays, legal_day_class_shifts};
pub use quotas::{
    compensation_free_days, complementary_shifts, quality_free_days, special_day_free_days,
    special_day_work, total_free_days,
};
pub use refinement::{
    ThreeDayCandidate, lock_in, refinement, three_day_candidates, three_day_quality_weekends,
};
pub use weekends::{
    quality_free_only_on_weekends, quality_free_spacing, two_day_quality_weekends,
    weekend_adjacency,
};
pub use weekly::{
    max_continuous_special_working_days, max_continuous_working_days, one_free_day_per_week,
    partial_week_free_days, weekly_shift_lock, weekly_working_days,
};

use good_lp::Expression;

use crate::context::{ScheduleContext, WorkerContext};
use crate::data::ShiftType;
use crate::model::ModelBuilder;
use crate::profile::QuotaComparison;

/// Shifts that count as a worked day for a worker's weekly cap and
/// special-day obligations: M and T, plus TC for contract type 6.
pub(crate) fn worked_shifts(worker: &WorkerContext) -> Vec<ShiftType> {
    let mut shifts = vec![ShiftType::Morning, ShiftType::Afternoon];
    if worker.contract.value() == 6 {
        shifts.push(ShiftType::Complementary);
    }
    shifts
}

/// Whether a worker's 3-day weekends are held back until the refinement stage.
pub(crate) fn defers_three_day_weekends(ctx: &ScheduleContext, worker: &WorkerContext) -> bool {
    ctx.params.defer_three_day_weekends
        && worker.contract.works_special_days()
        && worker.quotas.three_day_weekends > 0
}

/// `sum (==|>=) target`, where `terms` is the number of variables in `sum`.
///
/// An empty sum cannot reach a positive target, which makes the model
/// infeasible rather than silently dropping the quota.
pub(crate) fn quota_row(
    m: &mut ModelBuilder,
    sum: Expression,
    terms: usize,
    comparison: QuotaComparison,
    target: u32,
    what: &str,
) {
    if terms == 0 {
        if target > 0 {
            m.contradiction(&format!("{what}: {target} required but no day can hold it"));
        }
        return;
    }
    match comparison {
        QuotaComparison::Exact => m.eq(sum, f64::from(target)),
        QuotaComparison::AtLeast => {
            if target > 0 {
                m.ge(sum, f64::from(target))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use good_lp::{Solution, SolverModel, default_solver};

    use crate::context::ScheduleContext;
    use crate::data::{SchedulingInput, ShiftType};
    use crate::model::ModelBuilder;
    use crate::variables::ShiftVars;

    /// Solved values of every shift variable, by (worker index, day).
    pub(crate) struct Solved {
        pub shifts: Vec<Vec<Option<ShiftType>>>,
    }

    impl Solved {
        pub(crate) fn shift(&self, w: usize, day: u32) -> Option<ShiftType> {
            self.shifts[w][day as usize - 1]
        }

        pub(crate) fn count(&self, w: usize, shift: ShiftType) -> usize {
            self.shifts[w].iter().filter(|s| **s == Some(shift)).count()
        }
    }

    /// Builds the variables, lets `add` register rules, then solves.
    pub(crate) fn solve_with(
        input: &SchedulingInput,
        add: impl FnOnce(&mut ModelBuilder, &ShiftVars, &ScheduleContext),
    ) -> Option<Solved> {
        let ctx = ScheduleContext::new(input).unwrap();
        let mut m = ModelBuilder::new();
        let vars = ShiftVars::build(&mut m, &ctx).unwrap();
        add(&mut m, &vars, &ctx);
        let problem = m.take_variables();
        let mut model = problem
            .minimise(m.objective().clone())
            .using(default_solver)
            .set_option("log_to_console", "false");
        for row in m.rows() {
            model.add_constraint(row.to_constraint());
        }
        let solution = model.solve().ok()?;
        let shifts = (0..ctx.workers.len())
            .map(|w| {
                (1..=ctx.num_days())
                    .map(|day| {
                        ShiftType::ALL.into_iter().find(|s| {
                            vars.get(w, day, *s)
                                .is_some_and(|v| solution.value(v) > 0.5)
                        })
                    })
                    .collect()
            })
            .collect();
        Some(Solved { shifts })
    }
}
