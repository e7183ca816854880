//! Horizon-wide counting rules: each worker's shift totals equal their quotas.

use itertools::Itertools;

use super::{defers_three_day_weekends, quota_row, worked_shifts};
use crate::context::ScheduleContext;
use crate::data::{Day, ShiftType};
use crate::model::ModelBuilder;
use crate::profile::QuotaComparison;
use crate::variables::ShiftVars;

use crate::data::ShiftType::*;

/// L + LQ + LD over the horizon equals the free-day quota.
///
/// With `relaxed`, the 3-day weekend share is held back for the
/// refinement stage.
pub fn total_free_days(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    relaxed: bool,
) {
    let all_days: Vec<Day> = (1..=ctx.num_days()).collect();
    for (w, worker) in ctx.workers.iter().enumerate() {
        let q = &worker.quotas;
        let target = if relaxed && defers_three_day_weekends(ctx, worker) {
            q.total_free.saturating_sub(q.three_day_weekends)
        } else {
            q.total_free
        };
        quota_row(
            m,
            vars.sum_over(w, &all_days, &ShiftType::FREE_QUOTA),
            vars.count_over(w, &all_days, &ShiftType::FREE_QUOTA),
            QuotaComparison::Exact,
            target,
            &format!("worker {} total free days", worker.id),
        );
    }
}

/// L on the worker's special working days meets the free-Sunday quota.
pub fn special_day_free_days(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    for (w, worker) in ctx.workers.iter().enumerate() {
        let days = ctx
            .special_days()
            .filter(|d| worker.is_working(*d))
            .collect_vec();
        let mut target = worker.quotas.total_free_special;
        if ctx.params.free_sundays_include_two_day_weekends {
            target += worker.quotas.two_day_weekends;
        }
        quota_row(
            m,
            vars.sum_over(w, &days, &[Free]),
            vars.count_over(w, &days, &[Free]),
            ctx.params.weekend_quota,
            target,
            &format!("worker {} free special days", worker.id),
        );
    }
}

/// TC only on special days, and exactly the worker's TC quota of them.
pub fn complementary_shifts(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    if !ctx.params.has_shift(Complementary) {
        return;
    }
    for (w, worker) in ctx.workers.iter().enumerate() {
        let (special, ordinary): (Vec<Day>, Vec<Day>) =
            (1..=ctx.num_days()).partition(|d| ctx.is_special(*d));
        if vars.count_over(w, &ordinary, &[Complementary]) > 0 {
            m.le(vars.sum_over(w, &ordinary, &[Complementary]), 0.0);
        }
        let special = special
            .into_iter()
            .filter(|d| worker.is_working(*d))
            .collect_vec();
        quota_row(
            m,
            vars.sum_over(w, &special, &[Complementary]),
            vars.count_over(w, &special, &[Complementary]),
            QuotaComparison::Exact,
            worker.quotas.complementary_shifts,
            &format!("worker {} complementary shifts", worker.id),
        );
    }
}

/// Contract types 4 to 6 work exactly as many special days as they are
/// owed compensation days for.
pub fn special_day_work(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    for (w, worker) in ctx.workers.iter().enumerate() {
        if !worker.contract.works_special_days() {
            continue;
        }
        let shifts = worked_shifts(worker);
        let days = ctx
            .special_days()
            .filter(|d| worker.is_working(*d))
            .collect_vec();
        quota_row(
            m,
            vars.sum_over(w, &days, &shifts),
            vars.count_over(w, &days, &shifts),
            QuotaComparison::Exact,
            worker.quotas.compensation_days,
            &format!("worker {} special-day work", worker.id),
        );
    }
}

/// LQ on working days equals the quality quota plus the 2-day weekends,
/// plus the 3-day weekends once they are opened.
pub fn quality_free_days(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    include_three_day: bool,
) {
    for (w, worker) in ctx.workers.iter().enumerate() {
        let q = &worker.quotas;
        let target = if include_three_day || !defers_three_day_weekends(ctx, worker) {
            q.quality_free_total()
        } else {
            q.quality_free_days + q.two_day_weekends
        };
        let days = worker.working_days().collect_vec();
        quota_row(
            m,
            vars.sum_over(w, &days, &[QualityFree]),
            vars.count_over(w, &days, &[QualityFree]),
            QuotaComparison::Exact,
            target,
            &format!("worker {} quality free days", worker.id),
        );
    }
}

/// LD on working days equals the compensation quota.
pub fn compensation_free_days(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    for (w, worker) in ctx.workers.iter().enumerate() {
        let days = worker.working_days().collect_vec();
        quota_row(
            m,
            vars.sum_over(w, &days, &[CompensationFree]),
            vars.count_over(w, &days, &[CompensationFree]),
            QuotaComparison::Exact,
            worker.quotas.compensation_days,
            &format!("worker {} compensation days", worker.id),
        );
    }
}
