//! Work on Sundays and holidays, and the LD days that pay it back.

use chrono::Weekday;
use good_lp::{Expression, Variable};
use itertools::Itertools;
use log::debug;
use std::collections::BTreeMap;

use super::worked_shifts;
use crate::context::ScheduleContext;
use crate::data::Day;
use crate::model::ModelBuilder;
use crate::profile::CompensationCapScope;
use crate::variables::ShiftVars;

use crate::data::ShiftType::*;

/// Contract types 2 and 3 only work a regular day of a week when they
/// also work that week's special days.
pub fn special_day_work_priority(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    let working = &ctx.params.working_shifts;
    for (w, worker) in ctx.workers.iter().enumerate() {
        if !matches!(worker.contract.value(), 2 | 3) {
            continue;
        }
        for special in ctx.special_days().filter(|d| worker.is_working(*d)) {
            let Some(week) = ctx.week_of(special) else {
                continue;
            };
            let works_special = vars.day_sum(w, special, working);
            for &regular in ctx.week_days(week) {
                if !worker.is_working(regular) || ctx.is_special(regular) {
                    continue;
                }
                m.le(
                    vars.day_sum(w, regular, working) - works_special.clone(),
                    0.0,
                );
            }
        }
    }
}

/// Days that may pay back work on `special`: working days of the same or
/// the next week that are neither special nor Saturdays.
fn compensation_candidates(ctx: &ScheduleContext, w: usize, special: Day) -> Vec<Day> {
    let worker = &ctx.workers[w];
    let Some(week) = ctx.week_of(special) else {
        return Vec::new();
    };
    [week, week + 1]
        .iter()
        .flat_map(|wk| ctx.week_days(*wk).iter().copied())
        .filter(|d| {
            *d != special
                && worker.is_working(*d)
                && !ctx.is_special(*d)
                && ctx.weekday(*d) != Some(Weekday::Sat)
        })
        .collect()
}

/// Every worked special day is matched to its own LD day.
///
/// `a[s][c]` says LD day `c` pays for special day `s`. A match needs the
/// special day worked and `c` on LD; each worked special day gets exactly
/// one match and each LD day serves at most one special day.
pub fn compensation_matching(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    for (w, worker) in ctx.workers.iter().enumerate() {
        if !worker.contract.works_special_days() {
            continue;
        }
        let worked = worked_shifts(worker);
        let mut by_candidate: BTreeMap<Day, Vec<Variable>> = BTreeMap::new();

        for special in ctx.special_days().filter(|d| worker.is_working(*d)) {
            let worked_special = vars.day_sum(w, special, &worked);
            let mut matches = Vec::new();
            for candidate in compensation_candidates(ctx, w, special) {
                let Some(ld) = vars.get(w, candidate, CompensationFree) else {
                    continue;
                };
                let a = m.add_bool();
                m.le(Expression::from(a) - worked_special.clone(), 0.0);
                m.le(Expression::from(a) - ld, 0.0);
                by_candidate.entry(candidate).or_default().push(a);
                matches.push(a);
            }
            if matches.is_empty() {
                debug!(
                    "Worker {} special day {special} has no compensation candidates",
                    worker.id
                );
                continue;
            }
            let matched: Expression = matches.iter().copied().sum();
            m.eq(matched - worked_special, 0.0);
        }

        for uses in by_candidate.values() {
            m.at_most_one(uses);
        }
    }
}

/// Quiet weeks (at most one special day) hand out at most one LD in total.
pub fn weekly_compensation_cap(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    for days in ctx.weeks.values() {
        let special = days
            .iter()
            .copied()
            .filter(|d| ctx.is_special(*d))
            .collect_vec();
        if special.len() > 1 {
            continue;
        }
        let scope = match ctx.params.compensation_cap_scope {
            CompensationCapScope::SpecialDays => &special,
            CompensationCapScope::WholeWeek => days,
        };
        let lds = (0..ctx.workers.len())
            .flat_map(|w| {
                scope
                    .iter()
                    .filter_map(move |d| vars.get(w, *d, CompensationFree))
            })
            .collect_vec();
        m.at_most_one(&lds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::pinning::legal_day_class_shifts;
    use crate::constraints::quotas::{compensation_free_days, special_day_work};
    use crate::constraints::test_support::solve_with;
    use crate::context::tests::{input, worker};

    #[test]
    fn worked_sunday_is_paid_back_in_the_window() {
        let mut inp = input(14, vec![worker(1, 4)]);
        inp.workers[0].quotas.compensation_days = 1;
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            special_day_work(m, vars, ctx);
            compensation_free_days(m, vars, ctx);
            compensation_matching(m, vars, ctx);
            // push the Sunday worked to day 14, whose window is week 2 only
            if let Some(v) = vars.get(0, 7, Free) {
                m.fix(v, true);
            }
        })
        .unwrap();
        assert_eq!(solved.count(0, CompensationFree), 1);
        let ld = (1..=14)
            .find(|d| solved.shift(0, *d) == Some(CompensationFree))
            .unwrap();
        assert!((8..=12).contains(&ld), "LD on day {ld}");
    }

    #[test]
    fn one_ld_cannot_pay_for_two_sundays() {
        let mut inp = input(14, vec![worker(1, 4)]);
        // two worked Sundays but only one LD allowed in total
        inp.workers[0].quotas.compensation_days = 2;
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            special_day_work(m, vars, ctx);
            compensation_matching(m, vars, ctx);
            let lds: Expression = (1..=14)
                .filter_map(|d| vars.get(0, d, CompensationFree))
                .sum();
            m.le(lds, 1.0);
        });
        assert!(solved.is_none());
    }

    #[test]
    fn low_contracts_work_sunday_before_weekdays() {
        let mut inp = input(7, vec![worker(1, 3)]);
        inp.workers[0].quotas.total_free = 0;
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            special_day_work_priority(m, vars, ctx);
            if let Some(v) = vars.get(0, 7, Free) {
                m.fix(v, true);
            }
            if let Some(v) = vars.get(0, 2, Morning) {
                m.add_objective_term(-1.0, Expression::from(v));
            }
        })
        .unwrap();
        // Sunday off means no regular day of that week is worked
        assert!(
            (1..=6).all(|d| !matches!(solved.shift(0, d), Some(Morning | Afternoon)))
        );
    }

    /// Objective pulling LD onto every weekday of the first week.
    fn want_ld(m: &mut ModelBuilder, vars: &ShiftVars, workers: usize) {
        for w in 0..workers {
            for d in 1..=6 {
                if let Some(v) = vars.get(w, d, CompensationFree) {
                    m.add_objective_term(-1.0, Expression::from(v));
                }
            }
        }
    }

    #[test]
    fn quiet_week_caps_ld_across_workers() {
        let inp = input(7, vec![worker(1, 4), worker(2, 4)]);
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            weekly_compensation_cap(m, vars, ctx);
            want_ld(m, vars, 2);
        })
        .unwrap();
        assert_eq!(
            solved.count(0, CompensationFree) + solved.count(1, CompensationFree),
            1
        );
    }

    #[test]
    fn week_with_two_special_days_is_not_capped() {
        let mut inp = input(7, vec![worker(1, 4), worker(2, 4)]);
        inp.calendar.holidays = vec![3];
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            weekly_compensation_cap(m, vars, ctx);
            want_ld(m, vars, 2);
        })
        .unwrap();
        // day 3 is special and cannot hold LD
        assert_eq!(solved.count(0, CompensationFree), 5);
        assert_eq!(solved.count(1, CompensationFree), 5);
    }

    #[test]
    fn special_day_scope_leaves_weekday_ld_alone() {
        let mut inp = input(7, vec![worker(1, 4)]);
        inp.profile.settings.compensation_cap_scope = Some(CompensationCapScope::SpecialDays);
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            weekly_compensation_cap(m, vars, ctx);
            want_ld(m, vars, 1);
        })
        .unwrap();
        assert_eq!(solved.count(0, CompensationFree), 6);
    }
}
