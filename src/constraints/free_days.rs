use chrono::Weekday;
use good_lp::Expression;
use itertools::Itertools;

use super::quota_row;
use crate::context::ScheduleContext;
use crate::data::Day;
use crate::model::ModelBuilder;
use crate::profile::QuotaComparison;
use crate::variables::ShiftVars;

use crate::data::ShiftType::*;

/// Controls back-to-back free days on weekdays.
///
/// Weekday working days and closed days are the candidates. With a zero
/// CXX quota no two consecutive candidates may both be free. Otherwise
/// contract 5 gets exactly CXX free pairs and contract 4 at least CXX.
pub fn consecutive_free_day_pairs(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    let markers = ctx.params.free_marker_shifts();
    for (w, worker) in ctx.workers.iter().enumerate() {
        let cxx = worker.quotas.consecutive_pairs;
        let comparison = match worker.contract.value() {
            _ if cxx == 0 => None,
            5 => Some(QuotaComparison::Exact),
            4 => Some(QuotaComparison::AtLeast),
            _ => continue,
        };
        let candidates = (1..=ctx.num_days())
            .filter(|d| {
                let weekend = matches!(ctx.weekday(*d), Some(Weekday::Sat | Weekday::Sun));
                (worker.is_working(*d) && !weekend) || ctx.is_closed(*d)
            })
            .collect_vec();
        let pairs = candidates
            .iter()
            .tuple_windows()
            .filter(|(a, b)| **b == **a + 1)
            .map(|(a, b)| (*a, *b))
            .collect_vec();

        match comparison {
            None => {
                for (a, b) in pairs {
                    if vars.count_over(w, &[a, b], &markers) > 1 {
                        m.le(vars.sum_over(w, &[a, b], &markers), 1.0);
                    }
                }
            }
            Some(comparison) => {
                let indicators = pairs
                    .iter()
                    .map(|(a, b)| {
                        m.all_of_terms(vec![
                            vars.day_sum(w, *a, &markers),
                            vars.day_sum(w, *b, &markers),
                        ])
                    })
                    .collect_vec();
                let sum: Expression = indicators.iter().copied().sum();
                quota_row(
                    m,
                    sum,
                    indicators.len(),
                    comparison,
                    cxx,
                    &format!("worker {} consecutive free pairs", worker.id),
                );
            }
        }
    }
}

/// No worker is free three days running.
pub fn no_three_free_days_in_a_row(m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
    let mut free = vec![Free, QualityFree];
    if ctx.params.closed_days_count_as_free {
        free.push(ClosedHoliday);
    }
    let days: Vec<Day> = (1..=ctx.num_days()).collect();
    for w in 0..ctx.workers.len() {
        for window in days.windows(3) {
            if vars.count_over(w, window, &free) > 2 {
                m.le(vars.sum_over(w, window, &free), 2.0);
            }
        }
    }
}
