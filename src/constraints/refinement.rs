//! Stage-2 rules: keep the Stage-1 draft and open 3-day quality weekends.

use good_lp::Expression;
use itertools::Itertools;
use log::{info, warn};
use std::collections::HashSet;

use super::{
    defers_three_day_weekends, quality_free_days, quality_free_spacing, quota_row,
    total_free_days,
};
use crate::context::ScheduleContext;
use crate::data::{Day, ScheduleMatrix, ShiftType};
use crate::model::{Lit, ModelBuilder, sum_of};
use crate::profile::QuotaComparison;
use crate::variables::ShiftVars;

use crate::data::ShiftType::*;

/// Months closer than this cannot both hold a 3-day weekend.
const MIN_MONTHS_APART: u32 = 5;

/// A Friday or Monday that may become LQ to stretch a 2-day weekend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreeDayCandidate {
    /// Worker position in the context.
    pub worker: usize,
    pub day: Day,
    pub saturday: Day,
    pub month: u32,
}

fn is_weekend_pattern(saturday: Option<ShiftType>, sunday: Option<ShiftType>) -> bool {
    matches!(
        (saturday, sunday),
        (Some(QualityFree), Some(Free))
            | (Some(QualityFree), Some(ClosedHoliday))
            | (Some(ClosedHoliday), Some(Free))
            | (Some(ClosedHoliday), Some(ClosedHoliday))
    )
}

/// Fridays and Mondays next to a Stage-1 quality weekend that could be
/// upgraded, for workers who are owed 3-day weekends.
pub fn three_day_candidates(
    ctx: &ScheduleContext,
    draft: &ScheduleMatrix,
) -> Vec<ThreeDayCandidate> {
    let mut candidates = Vec::new();
    for (w, worker) in ctx.workers.iter().enumerate() {
        if !defers_three_day_weekends(ctx, worker) {
            continue;
        }
        let shift = |day: Day| draft.get(worker.id, day);
        let upgradable = |day: Day| {
            worker.is_working(day) && shift(day).is_some_and(ShiftType::is_morning_or_afternoon)
        };
        let beyond_is_clear = |day: Option<Day>| {
            !day.is_some_and(|d| matches!(shift(d), Some(Free | CompensationFree)))
        };

        for (saturday, sunday) in ctx.weekends() {
            if !is_weekend_pattern(shift(saturday), shift(sunday)) {
                continue;
            }
            let friday = saturday.checked_sub(1).filter(|d| *d >= 1);
            let monday = Some(sunday + 1).filter(|d| *d <= ctx.num_days());
            let sides = [
                (friday, friday.and_then(|d| d.checked_sub(1)).filter(|d| *d >= 1)),
                (monday, monday.map(|d| d + 1).filter(|d| *d <= ctx.num_days())),
            ];
            for (day, beyond) in sides {
                let Some(day) = day else { continue };
                if !upgradable(day) || !beyond_is_clear(beyond) {
                    continue;
                }
                if let Some(info) = ctx.day(day) {
                    candidates.push(ThreeDayCandidate {
                        worker: w,
                        day,
                        saturday,
                        month: info.month,
                    });
                }
            }
        }
    }
    candidates
}

/// Fixes every Stage-1 assignment except the candidate days, which may
/// only move between M, T and LQ.
pub fn lock_in(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    draft: &ScheduleMatrix,
    exceptions: &[ThreeDayCandidate],
) {
    let open: HashSet<(usize, Day)> = exceptions.iter().map(|c| (c.worker, c.day)).collect();
    for (w, worker) in ctx.workers.iter().enumerate() {
        for day in 1..=ctx.num_days() {
            if open.contains(&(w, day)) {
                let choices = vars.day_vars(w, day, &[Morning, Afternoon, QualityFree]);
                m.eq(sum_of(&choices), 1.0);
                continue;
            }
            match draft.get(worker.id, day) {
                Some(shift) => match vars.get(w, day, shift) {
                    Some(var) => m.fix(var, true),
                    None => warn!(
                        "Worker {} day {day}: Stage-1 shift {shift} has no Stage-2 variable",
                        worker.id
                    ),
                },
                None => warn!(
                    "Worker {} day {day} was unassigned in Stage 1 and is left open",
                    worker.id
                ),
            }
        }
    }
}

fn months_apart(a: u32, b: u32) -> u32 {
    let diff = a.abs_diff(b);
    diff.min(12 - diff)
}

/// Picks exactly C3D candidates per worker, spread at least five months
/// apart, and turns each picked day into LQ.
pub fn three_day_quality_weekends(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    candidates: &[ThreeDayCandidate],
) {
    let by_worker = candidates.iter().into_group_map_by(|c| c.worker);
    for (w, worker) in ctx.workers.iter().enumerate() {
        if !defers_three_day_weekends(ctx, worker) {
            continue;
        }
        let mine = by_worker.get(&w).cloned().unwrap_or_default();
        let mut extended = Vec::new();
        for candidate in &mine {
            let Some(lq) = vars.get(w, candidate.day, QualityFree) else {
                continue;
            };
            let e = m.add_bool();
            m.reify_equal(e, Lit::pos(lq));
            extended.push((e, candidate.month));
        }
        for ((a, month_a), (b, month_b)) in extended.iter().tuple_combinations() {
            if months_apart(*month_a, *month_b) < MIN_MONTHS_APART {
                m.at_most_one(&[*a, *b]);
            }
        }
        let sum: Expression = extended.iter().map(|(e, _)| *e).sum();
        quota_row(
            m,
            sum,
            extended.len(),
            QuotaComparison::Exact,
            worker.quotas.three_day_weekends,
            &format!("worker {} 3-day quality weekends", worker.id),
        );
    }
}

/// The whole Stage-2 rule set for a given draft.
pub fn refinement(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    draft: &ScheduleMatrix,
) {
    let candidates = three_day_candidates(ctx, draft);
    info!(
        "Found {} 3-day weekend candidates for {} workers",
        candidates.len(),
        candidates.iter().map(|c| c.worker).unique().count()
    );
    m.rule("stage 1 lock-in", |m| lock_in(m, vars, ctx, draft, &candidates));
    m.rule("total free days", |m| total_free_days(m, vars, ctx, false));
    m.rule("quality free days", |m| quality_free_days(m, vars, ctx, true));
    m.rule("quality free day spacing", |m| quality_free_spacing(m, vars, ctx));
    m.rule("3-day quality weekends", |m| {
        three_day_quality_weekends(m, vars, ctx, &candidates)
    });
}
