//! Soft terms of the minimisation objective.

use good_lp::{Expression, Variable};
use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::context::ScheduleContext;
use crate::data::{Day, ShiftType};
use crate::model::{Lit, ModelBuilder};
use crate::variables::ShiftVars;

use crate::data::ShiftType::*;

/// Weight of every soft term. A zero weight drops the term entirely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveWeights {
    /// Per worker above or below a staffing target.
    pub deviation: f64,
    /// A staffed (day, shift) left without anybody.
    pub zero_staffing: f64,
    /// Per worker below the minimum floor.
    pub below_minimum: f64,
    /// A worker doing both M and T in one week.
    pub mixed_shift_week: f64,
    /// Back-to-back L/LQ/LD days for contract type 4.
    pub adjacent_free_days: f64,
    pub free_balance: f64,
    pub quality_free_balance: f64,
    /// Usually negative: a reward for free days that touch.
    pub consecutive_free_bonus: f64,
}

impl ObjectiveWeights {
    pub fn standard() -> Self {
        Self {
            deviation: 1.0,
            zero_staffing: 10.0,
            below_minimum: 5.0,
            mixed_shift_week: 3.0,
            adjacent_free_days: 5.0,
            free_balance: 0.0,
            quality_free_balance: 0.0,
            consecutive_free_bonus: 0.0,
        }
    }

    pub fn compact() -> Self {
        Self {
            deviation: 30.0,
            zero_staffing: 300.0,
            below_minimum: 60.0,
            mixed_shift_week: 3.0,
            adjacent_free_days: 0.0,
            free_balance: 15.0,
            quality_free_balance: 25.0,
            consecutive_free_bonus: -1.0,
        }
    }
}

/// Adds every weighted soft term to the builder's objective.
pub fn build_objective(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    weights: &ObjectiveWeights,
) {
    let before = m.objective_terms();
    staffing_deviation(m, vars, ctx, weights.deviation);
    zero_staffing(m, vars, ctx, weights.zero_staffing);
    minimum_shortfall(m, vars, ctx, weights.below_minimum);
    mixed_shift_weeks(m, vars, ctx, weights.mixed_shift_week);
    adjacent_free_days(m, vars, ctx, weights.adjacent_free_days);
    free_day_balance(
        m,
        vars,
        ctx,
        weights.free_balance,
        weights.quality_free_balance,
    );
    consecutive_free_bonus(m, vars, ctx, weights.consecutive_free_bonus);
    info!(
        "Objective function defined with {} weighted terms.",
        m.objective_terms() - before
    );
}

/// Workers on `shift` on `day`, with the number of variables in the sum.
fn assigned(vars: &ShiftVars, day: Day, shift: ShiftType) -> (Expression, usize) {
    let on_shift = (0..vars.num_workers())
        .filter_map(|w| vars.get(w, day, shift))
        .collect_vec();
    (on_shift.iter().copied().sum(), on_shift.len())
}

/// `assigned - over + under == target`, with both slacks penalised.
pub(crate) fn staffing_deviation(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    weight: f64,
) {
    if weight == 0.0 {
        return;
    }
    for (&(day, shift), goal) in &ctx.staffing {
        let (sum, n) = assigned(vars, day, shift);
        let target = f64::from(goal.target);
        let over = m.add_int(0.0, n as f64);
        let under = m.add_int(0.0, target);
        m.eq(sum - over + under, target);
        m.add_objective_term(weight, over + under);
    }
}

/// `z` is 1 exactly when nobody holds a (day, shift) that has a positive
/// target. Closed holidays are exempt.
pub(crate) fn zero_staffing(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    weight: f64,
) {
    if weight == 0.0 {
        return;
    }
    for (&(day, shift), goal) in &ctx.staffing {
        if goal.target == 0 || ctx.is_closed(day) {
            continue;
        }
        let (sum, n) = assigned(vars, day, shift);
        let z = m.add_bool();
        m.ge(sum.clone() + z, 1.0);
        if n > 0 {
            m.le(sum + (n as f64) * z, n as f64);
        }
        m.add_objective_term(weight, Expression::from(z));
    }
}

pub(crate) fn minimum_shortfall(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    weight: f64,
) {
    if weight == 0.0 {
        return;
    }
    for (&(day, shift), goal) in &ctx.staffing {
        if goal.minimum == 0 {
            continue;
        }
        let (sum, _) = assigned(vars, day, shift);
        let minimum = f64::from(goal.minimum);
        let shortfall = m.add_int(0.0, minimum);
        m.ge(sum + shortfall, minimum);
        m.add_objective_term(weight, Expression::from(shortfall));
    }
}

/// One penalty per worker week that holds both M and T. Weeks with fewer
/// than two working days are ignored.
pub(crate) fn mixed_shift_weeks(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    weight: f64,
) {
    if weight == 0.0 {
        return;
    }
    for (w, worker) in ctx.workers.iter().enumerate() {
        for days in ctx.weeks.values() {
            let working = days
                .iter()
                .copied()
                .filter(|d| worker.is_working(*d))
                .collect_vec();
            if working.len() < 2 {
                continue;
            }
            let lits = |shift: ShiftType| {
                working
                    .iter()
                    .flat_map(|d| vars.get(w, *d, shift))
                    .map(Lit::pos)
                    .collect_vec()
            };
            let (mornings, afternoons) = (lits(Morning), lits(Afternoon));
            if mornings.is_empty() || afternoons.is_empty() {
                continue;
            }
            let has_m = m.any_of(&mornings);
            let has_t = m.any_of(&afternoons);
            let mixed = m.all_of(&[Lit::pos(has_m), Lit::pos(has_t)]);
            m.add_objective_term(weight, Expression::from(mixed));
        }
    }
}

/// Indicator per pair of consecutive working days on which `free` holds
/// both days. Days without any `free` variable cannot pair.
fn free_pairs(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    w: usize,
    free: &[ShiftType],
) -> Vec<Variable> {
    let worker = &ctx.workers[w];
    worker
        .working_days()
        .tuple_windows()
        .filter(|(a, b)| *b == *a + 1)
        .filter(|(a, b)| {
            !vars.day_vars(w, *a, free).is_empty() && !vars.day_vars(w, *b, free).is_empty()
        })
        .collect_vec()
        .into_iter()
        .map(|(a, b)| m.all_of_terms(vec![vars.day_sum(w, a, free), vars.day_sum(w, b, free)]))
        .collect()
}

/// Contract type 4 workers should not get L, LQ or LD on two working
/// days in a row.
pub(crate) fn adjacent_free_days(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    weight: f64,
) {
    if weight == 0.0 {
        return;
    }
    for (w, worker) in ctx.workers.iter().enumerate() {
        if worker.contract.value() != 4 {
            continue;
        }
        for pair in free_pairs(m, vars, ctx, w, &[Free, CompensationFree, QualityFree]) {
            m.add_objective_term(weight, Expression::from(pair));
        }
    }
}

/// Pairwise `|count(w1) - count(w2)|` for L and for LQ, over working days.
pub(crate) fn free_day_balance(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    free_weight: f64,
    quality_weight: f64,
) {
    let bound = f64::from(ctx.num_days());
    for (shift, weight) in [(Free, free_weight), (QualityFree, quality_weight)] {
        if weight == 0.0 {
            continue;
        }
        let counts = ctx
            .workers
            .iter()
            .enumerate()
            .map(|(w, worker)| vars.sum_over(w, &worker.working_days().collect_vec(), &[shift]))
            .collect_vec();
        for (a, b) in counts.iter().tuple_combinations() {
            let gap = m.abs_upper_bound(a.clone() - b.clone(), bound);
            m.add_objective_term(weight, Expression::from(gap));
        }
    }
}

/// Rewards pairs of consecutive working days that are both off
/// (L, F, LQ, A or V).
pub(crate) fn consecutive_free_bonus(
    m: &mut ModelBuilder,
    vars: &ShiftVars,
    ctx: &ScheduleContext,
    weight: f64,
) {
    if weight == 0.0 {
        return;
    }
    let off = [Free, ClosedHoliday, QualityFree, Absence, Vacation];
    for w in 0..ctx.workers.len() {
        for pair in free_pairs(m, vars, ctx, w, &off) {
            m.add_objective_term(weight, Expression::from(pair));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::legal_day_class_shifts;
    use crate::constraints::test_support::solve_with;
    use crate::context::tests::{input, worker};
    use crate::data::StaffingTarget;

    fn target(day: Day, shift: ShiftType, target: u32, minimum: u32) -> StaffingTarget {
        StaffingTarget {
            day,
            shift,
            target,
            minimum,
        }
    }

    fn fix_free_days(m: &mut ModelBuilder, vars: &ShiftVars, w: usize, days: u32, count: f64) {
        let day_list = (1..=days).collect_vec();
        m.eq(vars.sum_over(w, &day_list, &[Free]), count);
    }

    #[test]
    fn staffing_targets_pull_shifts() {
        let mut inp = input(7, vec![worker(1, 6)]);
        inp.staffing = vec![target(1, Morning, 1, 0), target(2, Afternoon, 1, 0)];
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            build_objective(m, vars, ctx, &ObjectiveWeights::standard());
        })
        .unwrap();
        assert_eq!(solved.shift(0, 1), Some(Morning));
        // deviation plus the empty-shift penalty outweigh a mixed week
        assert_eq!(solved.shift(0, 2), Some(Afternoon));
    }

    #[test]
    fn unreachable_minimum_is_only_a_penalty() {
        let mut inp = input(7, vec![worker(1, 6)]);
        inp.staffing = vec![target(3, Morning, 2, 2)];
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            build_objective(m, vars, ctx, &ObjectiveWeights::standard());
        })
        .unwrap();
        assert_eq!(solved.shift(0, 3), Some(Morning));
    }

    #[test]
    fn mixed_week_costs_more_than_a_small_gain() {
        let inp = input(7, vec![worker(1, 6)]);
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            m.fix(vars.get(0, 1, Morning).unwrap(), true);
            m.add_objective_term(-1.0, Expression::from(vars.get(0, 2, Afternoon).unwrap()));
            mixed_shift_weeks(m, vars, ctx, 3.0);
        })
        .unwrap();
        assert_ne!(solved.shift(0, 2), Some(Afternoon));
    }

    #[test]
    fn contract_four_spreads_free_days() {
        let inp = input(7, vec![worker(1, 4)]);
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            fix_free_days(m, vars, 0, 5, 2.0);
            adjacent_free_days(m, vars, ctx, 5.0);
        })
        .unwrap();
        let free = (1..=5)
            .filter(|d| solved.shift(0, *d) == Some(Free))
            .collect_vec();
        assert_eq!(free.len(), 2);
        assert!(free[1] > free[0] + 1, "free days {free:?} touch");
    }

    #[test]
    fn consecutive_bonus_groups_free_days() {
        let mut inp = input(7, vec![worker(1, 5)]);
        inp.profile.name = "compact".to_string();
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            fix_free_days(m, vars, 0, 7, 2.0);
            for day in 1..=7 {
                m.fix(vars.get(0, day, QualityFree).unwrap(), false);
            }
            consecutive_free_bonus(m, vars, ctx, -1.0);
        })
        .unwrap();
        let free = (1..=7)
            .filter(|d| solved.shift(0, *d) == Some(Free))
            .collect_vec();
        assert_eq!(free.len(), 2);
        assert_eq!(free[1], free[0] + 1);
    }

    #[test]
    fn balance_evens_out_free_days() {
        let mut inp = input(7, vec![worker(1, 5), worker(2, 5)]);
        inp.profile.name = "compact".to_string();
        let solved = solve_with(&inp, |m, vars, ctx| {
            legal_day_class_shifts(m, vars, ctx);
            for day in 1..=7 {
                let shift = if day <= 2 { Free } else { Morning };
                m.fix(vars.get(0, day, shift).unwrap(), true);
                m.add_objective_term(-1.0, Expression::from(vars.get(1, day, Morning).unwrap()));
            }
            free_day_balance(m, vars, ctx, 15.0, 25.0);
        })
        .unwrap();
        assert_eq!(solved.count(1, Free), 2);
        assert_eq!(solved.count(1, QualityFree), 0);
    }

    #[test]
    fn compact_weights_reward_pairs() {
        assert!(ObjectiveWeights::compact().consecutive_free_bonus < 0.0);
        assert_eq!(ObjectiveWeights::standard().free_balance, 0.0);
    }
}
