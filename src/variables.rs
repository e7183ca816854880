use good_lp::{Expression, Variable};
use log::info;

use crate::context::ScheduleContext;
use crate::data::{Day, ShiftType};
use crate::error::SchedulingError;
use crate::model::ModelBuilder;

/// One binary per (worker, day, shift type) in the profile's shift set.
///
/// Stored densely as `[worker][day - 1][shift index]`; shift types outside
/// the profile leave a `None` gap that every rule skips.
pub struct ShiftVars {
    num_days: usize,
    slots: Vec<Option<Variable>>,
    num_workers: usize,
}

impl ShiftVars {
    /// Allocates the variables and adds the exactly-one-shift rows.
    pub fn build(m: &mut ModelBuilder, ctx: &ScheduleContext) -> Result<Self, SchedulingError> {
        if ctx.workers.is_empty() {
            return Err(SchedulingError::Configuration(
                "cannot build decision variables without workers".to_string(),
            ));
        }
        if ctx.days.is_empty() {
            return Err(SchedulingError::Configuration(
                "cannot build decision variables without days".to_string(),
            ));
        }

        let num_days = ctx.days.len();
        let per_day = ShiftType::ALL.len();
        let mut slots = vec![None; ctx.workers.len() * num_days * per_day];
        let shifts: Vec<ShiftType> = ShiftType::ALL
            .into_iter()
            .filter(|s| ctx.params.has_shift(*s))
            .collect();

        info!("Adding 'exactly one shift per day' constraints...");
        for w in 0..ctx.workers.len() {
            for d in 0..num_days {
                let day_vars = m.add_bool_vector(shifts.len());
                for (shift, var) in shifts.iter().zip(&day_vars) {
                    slots[(w * num_days + d) * per_day + shift.index()] = Some(*var);
                }
                m.exactly_one(&day_vars);
            }
        }
        info!(
            "Created {} shift variables for {} workers x {} days x {} shift types",
            ctx.workers.len() * num_days * shifts.len(),
            ctx.workers.len(),
            num_days,
            shifts.len()
        );

        Ok(Self {
            num_days,
            slots,
            num_workers: ctx.workers.len(),
        })
    }

    /// `w` is the worker's position in the context, `day` is 1-based.
    pub fn get(&self, w: usize, day: Day, shift: ShiftType) -> Option<Variable> {
        let d = (day as usize).checked_sub(1)?;
        if w >= self.num_workers || d >= self.num_days {
            return None;
        }
        self.slots[(w * self.num_days + d) * ShiftType::ALL.len() + shift.index()]
    }

    /// Existing variables for the given shifts on one day.
    pub fn day_vars(&self, w: usize, day: Day, shifts: &[ShiftType]) -> Vec<Variable> {
        shifts
            .iter()
            .filter_map(|s| self.get(w, day, *s))
            .collect()
    }

    /// Sum of the given shifts on one day; zero when none exist.
    pub fn day_sum(&self, w: usize, day: Day, shifts: &[ShiftType]) -> Expression {
        self.day_vars(w, day, shifts).into_iter().sum()
    }

    /// Sum of the given shifts over a set of days.
    pub fn sum_over<'a>(
        &self,
        w: usize,
        days: impl IntoIterator<Item = &'a Day>,
        shifts: &[ShiftType],
    ) -> Expression {
        days.into_iter()
            .flat_map(|day| self.day_vars(w, *day, shifts))
            .sum()
    }

    /// Number of variables the sum would contain.
    pub fn count_over<'a>(
        &self,
        w: usize,
        days: impl IntoIterator<Item = &'a Day>,
        shifts: &[ShiftType],
    ) -> usize {
        days.into_iter()
            .map(|day| self.day_vars(w, *day, shifts).len())
            .sum()
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }
}
