use log::warn;

use crate::context::{DayStatus, ScheduleContext};
use crate::data::Day;
use crate::model::{ModelBuilder, sum_of};
use crate::variables::ShiftVars;

fn pin(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    w: usize,
    day: Day,
    status: DayStatus,
) {
    let Some(shift) = status.pinned_shift() else {
        return;
    };
    match vars.get(w, day, shift) {
        Some(var) => m.fix(var, true),
        None => warn!(
            "Worker {} day {day}: no {shift} variable to pin under the {} profile",
            ctx.workers[w].id, ctx.params.kind
        ),
    }
}

/// Closed holidays are F for everyone.
pub fn closed_holidays(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    for (w, worker) in ctx.workers.iter().enumerate() {
        for day in worker.days_with(DayStatus::ClosedHoliday) {
            pin(m, vars, ctx, w, day, DayStatus::ClosedHoliday);
        }
    }
}

/// Holidays are A; missing and empty days are V.
pub fn absence_days(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    for (w, worker) in ctx.workers.iter().enumerate() {
        for status in [DayStatus::Holiday, DayStatus::Missing, DayStatus::Empty] {
            for day in worker.days_with(status) {
                pin(m, vars, ctx, w, day, status);
            }
        }
    }
}

/// A working day takes exactly one shift from its day class's legal set.
pub fn legal_day_class_shifts(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    for (w, worker) in ctx.workers.iter().enumerate() {
        for day in worker.working_days() {
            let legal = if ctx.is_special(day) {
                &ctx.params.special_shifts
            } else {
                &ctx.params.ordinary_shifts
            };
            let day_vars = vars.day_vars(w, day, legal);
            if day_vars.is_empty() {
                m.contradiction(&format!(
                    "worker {} day {day} has no legal shift",
                    worker.id
                ));
            } else {
                m.eq(sum_of(&day_vars), 1.0);
            }
        }
    }
}
