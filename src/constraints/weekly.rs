//! Caps and minimums that look at runs of days: weeks and sliding windows.

use itertools::Itertools;
use log::warn;

use super::worked_shifts;
use crate::context::ScheduleContext;
use crate::data::{Day, ShiftType};
use crate::model::ModelBuilder;
use crate::variables::ShiftVars;

use crate::data::ShiftType::*;

/// Worked shifts per week never exceed the worker's weekly cap.
pub fn weekly_working_days(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    for (w, worker) in ctx.workers.iter().enumerate() {
        let shifts = worked_shifts(worker);
        for days in ctx.weeks.values() {
            if days.len() as u32 <= worker.weekly_cap {
                continue;
            }
            m.le(
                vars.sum_over(w, days, &shifts),
                f64::from(worker.weekly_cap),
            );
        }
    }
}

/// Every window of `max + 1` consecutive days holds at most `max` worked shifts.
pub fn max_continuous_working_days(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    let max = ctx.params.max_continuous_working_days;
    let days: Vec<Day> = (1..=ctx.num_days()).collect();
    for w in 0..ctx.workers.len() {
        for window in days.windows(max as usize + 1) {
            m.le(
                vars.sum_over(w, window, &ctx.params.working_shifts),
                f64::from(max),
            );
        }
    }
}

/// Contract types 4 to 6 work at most 3 of any 4 consecutive special days.
pub fn max_continuous_special_working_days(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
) {
    let special: Vec<Day> = ctx.special_days().collect();
    for (w, worker) in ctx.workers.iter().enumerate() {
        if !worker.contract.works_special_days() {
            continue;
        }
        for window in special.windows(4) {
            let terms = vars.count_over(w, window, &ctx.params.working_shifts);
            if terms > 3 {
                m.le(vars.sum_over(w, window, &ctx.params.working_shifts), 3.0);
            }
        }
    }
}

/// Weeks flagged morning-only or afternoon-only close the other shift.
pub fn weekly_shift_lock(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    if !ctx.params.weekly_shift_lock {
        return;
    }
    for (w, worker) in ctx.workers.iter().enumerate() {
        for (&week, days) in &ctx.weeks {
            let availability = worker.availability(week);
            if !availability.morning && !availability.afternoon {
                warn!(
                    "Worker {} has neither mornings nor afternoons in week {week}",
                    worker.id
                );
            }
            for (allowed, shift) in [
                (availability.morning, Morning),
                (availability.afternoon, Afternoon),
            ] {
                if !allowed && vars.count_over(w, days, &[shift]) > 0 {
                    m.le(vars.sum_over(w, days, &[shift]), 0.0);
                }
            }
        }
    }
}

/// Contract types 4 to 6 rest at least once in every full interior week.
pub fn one_free_day_per_week(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    const REST: [ShiftType; 6] = [
        ClosedHoliday,
        Free,
        QualityFree,
        CompensationFree,
        Absence,
        Vacation,
    ];
    let (Some(first), Some(last)) = (ctx.first_week(), ctx.last_week()) else {
        return;
    };
    for (w, worker) in ctx.workers.iter().enumerate() {
        if !worker.contract.works_special_days() {
            continue;
        }
        for (&week, days) in &ctx.weeks {
            if week == first || week == last {
                continue;
            }
            let active = days
                .iter()
                .copied()
                .filter(|d| worker.is_working(*d) || ctx.is_closed(*d))
                .collect_vec();
            if vars.count_over(w, &active, &REST) > 0 {
                m.ge(vars.sum_over(w, &active, &REST), 1.0);
            }
        }
    }
}

/// A partial first or last week keeps its share of two rest days per week.
pub fn partial_week_free_days(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    const REST: [ShiftType; 3] = [Free, QualityFree, ClosedHoliday];
    let partial_weeks = [ctx.first_week(), ctx.last_week()]
        .into_iter()
        .flatten()
        .unique()
        .filter(|week| ctx.week_days(*week).len() < 7)
        .collect_vec();

    for week in partial_weeks {
        let days = ctx.week_days(week);
        let required = (days.len() as f64 / 7.0 * 2.0).round() as u32;
        if required == 0 {
            continue;
        }
        for (w, worker) in ctx.workers.iter().enumerate() {
            let eligible = days
                .iter()
                .copied()
                .filter(|d| worker.is_working(*d) || ctx.is_closed(*d))
                .collect_vec();
            let bound = required.min(eligible.len() as u32);
            if bound > 0 {
                m.ge(vars.sum_over(w, &eligible, &REST), f64::from(bound));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::pinning::{absence_days, legal_day_class_shifts};
    use crate::constraints::test_support::solve_with;
    use crate::context::tests::{input, worker};
    use crate::data::WeekAvailability;
    use chrono::NaiveDate;

    #[test]
    fn weekly_cap_forces_rest_days() {
        let inp = input(7, vec![worker(1, 4)]);
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            weekly_working_days(m, vars, ctx);
            // prefer work so the cap is what stops it
            for day in 1..=7 {
                if let Some(v) = vars.get(0, day, Morning) {
                    m.add_objective_term(-1.0, v.into());
                }
            }
        })
        .unwrap();
        assert_eq!(solved.count(0, Morning), 4);
    }

    #[test]
    fn continuity_bound_holds_over_windows() {
        let mut inp = input(14, vec![worker(1, 6)]);
        inp.profile.name = "compact".to_string();
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            max_continuous_working_days(m, vars, ctx);
            for day in 1..=14 {
                if let Some(v) = vars.get(0, day, Afternoon) {
                    m.add_objective_term(-1.0, v.into());
                }
            }
        })
        .unwrap();
        let worked: Vec<bool> = (1..=14)
            .map(|d| solved.shift(0, d) == Some(Afternoon))
            .collect();
        for window in worked.windows(6) {
            assert!(window.iter().filter(|w| **w).count() <= 5);
        }
    }

    #[test]
    fn locked_week_only_allows_the_open_shift() {
        let mut inp = input(7, vec![worker(1, 6)]);
        inp.workers[0].week_availability.insert(
            1,
            WeekAvailability {
                morning: false,
                afternoon: true,
            },
        );
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            weekly_shift_lock(m, vars, ctx);
            for day in 1..=7 {
                if let Some(v) = vars.get(0, day, Morning) {
                    m.add_objective_term(-1.0, v.into());
                }
            }
        })
        .unwrap();
        assert_eq!(solved.count(0, Morning), 0);
    }

    #[test]
    fn partial_first_week_gets_its_share_of_rest() {
        let mut inp = input(12, vec![worker(1, 6)]);
        inp.profile.name = "compact".to_string();
        // Wednesday start: first week has 5 days, last week 7
        inp.calendar.start_date = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            absence_days(m, vars, ctx);
            partial_week_free_days(m, vars, ctx);
            for day in 1..=12 {
                if let Some(v) = vars.get(0, day, Morning) {
                    m.add_objective_term(-1.0, v.into());
                }
            }
        })
        .unwrap();
        let rest = (1..=5)
            .filter(|d| matches!(solved.shift(0, *d), Some(Free | QualityFree)))
            .count();
        assert_eq!(rest, 1);
    }
}
