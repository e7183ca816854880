//! Weekend quality: 2-day weekends, the free days around them, and how
//! quality free days are spread over the year.

use chrono::{Datelike, Weekday};
use good_lp::Expression;
use itertools::Itertools;

use super::quota_row;
use crate::context::{DayStatus, ScheduleContext, WorkerContext};
use crate::data::{Day, ShiftType};
use crate::model::{Lit, ModelBuilder};
use crate::variables::ShiftVars;

use crate::data::ShiftType::*;

/// Free-ish shifts on a weekend day that block a free day next to it.
fn weekend_markers(ctx: &ScheduleContext, shift: ShiftType) -> Vec<ShiftType> {
    let mut markers = vec![shift];
    if ctx.params.closed_days_count_as_free {
        markers.push(ClosedHoliday);
    }
    markers
}

fn working_or_closed(worker: &WorkerContext, day: Day) -> bool {
    matches!(
        worker.status(day),
        Some(DayStatus::Working | DayStatus::ClosedHoliday)
    )
}

/// LQ (or F) on Saturday keeps Friday off L/LD; L (or F) on Sunday keeps
/// Monday off L/LD.
pub fn weekend_adjacency(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    let saturday_markers = weekend_markers(ctx, QualityFree);
    let sunday_markers = weekend_markers(ctx, Free);
    for (w, worker) in ctx.workers.iter().enumerate() {
        for info in &ctx.days {
            let (markers, neighbour) = match info.weekday {
                Weekday::Sat => (&saturday_markers, info.day.checked_sub(1)),
                Weekday::Sun => (&sunday_markers, Some(info.day + 1)),
                _ => continue,
            };
            let Some(neighbour) = neighbour.filter(|d| worker.is_working(*d)) else {
                continue;
            };
            if !working_or_closed(worker, info.day) {
                continue;
            }
            let marker_lits = vars
                .day_vars(w, info.day, markers)
                .into_iter()
                .map(Lit::pos)
                .collect_vec();
            let blocked = vars.day_vars(w, neighbour, &[Free, CompensationFree]);
            if marker_lits.is_empty() || blocked.is_empty() {
                continue;
            }
            let weekend_free = m.any_of(&marker_lits);
            for var in blocked {
                m.implies(Lit::pos(weekend_free), Lit::neg(var));
            }
        }
    }
}

/// Counts Saturday LQ + Sunday L weekends against the 2-day weekend quota.
///
/// A closed day stands in for its half of the pattern when closed days
/// count as free; a fully closed weekend qualifies on its own only when
/// the profile says so.
pub fn two_day_quality_weekends(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    let closed_is_free = ctx.params.closed_days_count_as_free;
    for (w, worker) in ctx.workers.iter().enumerate() {
        if !worker.contract.works_special_days() {
            continue;
        }
        let mut qualifies = Vec::new();
        for (saturday, sunday) in ctx.weekends() {
            let halves = [(saturday, QualityFree), (sunday, Free)];
            let mut terms = Vec::new();
            let mut eligible = true;
            let mut closed_halves = 0;
            for (day, shift) in halves {
                match worker.status(day) {
                    Some(DayStatus::Working) => match vars.get(w, day, shift) {
                        Some(var) => terms.push(Lit::pos(var)),
                        None => eligible = false,
                    },
                    Some(DayStatus::ClosedHoliday) if closed_is_free => closed_halves += 1,
                    _ => eligible = false,
                }
            }
            if !eligible || (closed_halves == 2 && !ctx.params.closed_weekend_auto_qualifies) {
                continue;
            }
            qualifies.push(m.all_of(&terms));
        }
        let sum: Expression = qualifies.iter().copied().sum();
        quota_row(
            m,
            sum,
            qualifies.len(),
            ctx.params.weekend_quota,
            worker.quotas.two_day_weekends,
            &format!("worker {} 2-day quality weekends", worker.id),
        );
    }
}

/// Workers owed exactly one LQ per month get at most two in any month.
pub fn quality_free_spacing(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    for (w, worker) in ctx.workers.iter().enumerate() {
        if worker.quotas.quality_free_total() != 12 {
            continue;
        }
        let by_month = worker
            .working_days()
            .filter_map(|d| ctx.day(d))
            .map(|info| ((info.date.year(), info.month), info.day))
            .into_group_map();
        for (_, days) in by_month.into_iter().sorted_by_key(|(month, _)| *month) {
            if vars.count_over(w, &days, &[QualityFree]) > 2 {
                m.le(vars.sum_over(w, &days, &[QualityFree]), 2.0);
            }
        }
    }
}

/// LQ only on a Saturday, and only when the Sunday after it is a free L.
pub fn quality_free_only_on_weekends(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
) {
    for (w, worker) in ctx.workers.iter().enumerate() {
        for day in worker.working_days() {
            let Some(lq) = vars.get(w, day, QualityFree) else {
                continue;
            };
            let sunday_free = (ctx.weekday(day) == Some(Weekday::Sat)
                && ctx.weekday(day + 1) == Some(Weekday::Sun)
                && worker.is_working(day + 1))
            .then(|| vars.get(w, day + 1, Free))
            .flatten();
            match sunday_free {
                Some(l) => m.implies(Lit::pos(lq), Lit::pos(l)),
                None => m.fix(lq, false),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::pinning::{absence_days, closed_holidays, legal_day_class_shifts};
    use crate::constraints::test_support::solve_with;
    use crate::context::tests::{input, worker};

    #[test]
    fn quality_weekend_needs_saturday_lq_and_sunday_l() {
        let mut inp = input(14, vec![worker(1, 5)]);
        inp.workers[0].missing_days = vec![13, 14];
        inp.workers[0].quotas.two_day_weekends = 1;
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            absence_days(m, vars, ctx);
            two_day_quality_weekends(m, vars, ctx);
        })
        .unwrap();
        assert_eq!(solved.shift(0, 6), Some(QualityFree));
        assert_eq!(solved.shift(0, 7), Some(Free));
    }

    #[test]
    fn closed_sunday_counts_when_closed_days_are_free() {
        let mut inp = input(7, vec![worker(1, 5)]);
        inp.calendar.closed_holidays = vec![7];
        inp.workers[0].quotas.two_day_weekends = 1;
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            closed_holidays(m, vars, ctx);
            two_day_quality_weekends(m, vars, ctx);
        })
        .unwrap();
        assert_eq!(solved.shift(0, 6), Some(QualityFree));
        assert_eq!(solved.shift(0, 7), Some(ClosedHoliday));
    }

    #[test]
    fn closed_weekend_auto_qualifies_only_when_enabled() {
        for (auto, quota, feasible) in [(true, 1, true), (false, 1, false), (false, 0, true)] {
            let mut inp = input(7, vec![worker(1, 5)]);
            inp.calendar.closed_holidays = vec![6, 7];
            inp.profile.settings.closed_weekend_auto_qualifies = Some(auto);
            inp.workers[0].quotas.two_day_weekends = quota;
            let solved = solve_with(&inp, |m, vars, ctx| {
                legal_day_class_shifts(m, vars, ctx);
                closed_holidays(m, vars, ctx);
                two_day_quality_weekends(m, vars, ctx);
                // keep LQ off weekdays so only the closed weekend can count
                for day in 1..=5 {
                    if let Some(v) = vars.get(0, day, QualityFree) {
                        m.fix(v, false);
                    }
                }
            });
            assert_eq!(solved.is_some(), feasible, "auto={auto} quota={quota}");
        }
    }

    #[test]
    fn saturday_lq_keeps_friday_busy() {
        let inp = input(7, vec![worker(1, 5)]);
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            weekend_adjacency(m, vars, ctx);
            let lq = vars.get(0, 6, QualityFree).unwrap();
            m.fix(lq, true);
            let friday_l = vars.get(0, 5, Free).unwrap();
            m.add_objective_term(-1.0, Expression::from(friday_l));
        })
        .unwrap();
        assert_ne!(solved.shift(0, 5), Some(Free));
    }

    #[test]
    fn monthly_lq_cap_for_one_per_month_quota() {
        let mut inp = input(14, vec![worker(1, 5)]);
        inp.workers[0].quotas.quality_free_days = 12;
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            quality_free_spacing(m, vars, ctx);
            for day in 1..=14 {
                if let Some(v) = vars.get(0, day, QualityFree) {
                    m.add_objective_term(-1.0, Expression::from(v));
                }
            }
        })
        .unwrap();
        assert_eq!(solved.count(0, QualityFree), 2);
    }

    #[test]
    fn compact_lq_sits_before_a_free_sunday() {
        let mut inp = input(7, vec![worker(1, 5)]);
        inp.profile.name = "compact".to_string();
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            quality_free_only_on_weekends(m, vars, ctx);
            for day in 1..=7 {
                if let Some(v) = vars.get(0, day, QualityFree) {
                    m.add_objective_term(-1.0, Expression::from(v));
                }
            }
        })
        .unwrap();
        assert_eq!(solved.count(0, QualityFree), 1);
        assert_eq!(solved.shift(0, 6), Some(QualityFree));
        assert_eq!(solved.shift(0, 7), Some(Free));
    }
}
