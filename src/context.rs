//! The validated, immutable view of one scheduling instance.
//!
//! Every rule and objective term reads the calendar, the workers and the
//! resolved profile parameters from a [`ScheduleContext`]; nothing in here
//! changes once the context is built.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::data::{
    Day, Quotas, SchedulingInput, ShiftType, WeekAvailability, WeekNumber, Worker, WorkerId,
};
use crate::error::SchedulingError;
use crate::profile::ProfileParams;

/// Contract category; the number doubles as the default weekly cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContractType(u8);

impl ContractType {
    pub const MIN: u8 = 2;
    pub const MAX: u8 = 6;

    pub fn new(value: u8) -> Result<Self, SchedulingError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SchedulingError::Configuration(format!(
                "contract type must be between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Types 4 to 6 work Sundays and holidays and earn compensation for it.
    pub fn works_special_days(self) -> bool {
        self.0 >= 4
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayInfo {
    pub day: Day,
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub month: u32,
    pub week: Option<WeekNumber>,
    pub special: bool,
    pub closed: bool,
}

/// What a worker's calendar says about one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Working,
    ClosedHoliday,
    Holiday,
    Missing,
    Empty,
}

impl DayStatus {
    /// The shift a non-working day is pinned to.
    pub fn pinned_shift(self) -> Option<ShiftType> {
        match self {
            DayStatus::Working => None,
            DayStatus::ClosedHoliday => Some(ShiftType::ClosedHoliday),
            DayStatus::Holiday => Some(ShiftType::Absence),
            DayStatus::Missing | DayStatus::Empty => Some(ShiftType::Vacation),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaffingGoal {
    pub target: u32,
    pub minimum: u32,
}

#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub id: WorkerId,
    pub contract: ContractType,
    pub weekly_cap: u32,
    pub quotas: Quotas,
    status: Vec<DayStatus>,
    availability: BTreeMap<WeekNumber, WeekAvailability>,
}

impl WorkerContext {
    pub fn status(&self, day: Day) -> Option<DayStatus> {
        day.checked_sub(1)
            .and_then(|i| self.status.get(i as usize))
            .copied()
    }

    pub fn is_working(&self, day: Day) -> bool {
        self.status(day) == Some(DayStatus::Working)
    }

    pub fn working_days(&self) -> impl Iterator<Item = Day> + '_ {
        self.days_with(DayStatus::Working)
    }

    pub fn days_with(&self, status: DayStatus) -> impl Iterator<Item = Day> + '_ {
        self.status
            .iter()
            .enumerate()
            .filter(move |(_, s)| **s == status)
            .map(|(i, _)| i as Day + 1)
    }

    pub fn availability(&self, week: WeekNumber) -> WeekAvailability {
        self.availability.get(&week).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleContext {
    pub days: Vec<DayInfo>,
    /// Explicit weeks from the calendar, or horizon-relative weeks from 1.
    pub weeks: BTreeMap<WeekNumber, Vec<Day>>,
    pub workers: Vec<WorkerContext>,
    pub staffing: BTreeMap<(Day, ShiftType), StaffingGoal>,
    pub params: ProfileParams,
}

impl ScheduleContext {
    pub fn new(input: &SchedulingInput) -> Result<Self, SchedulingError> {
        let params = ProfileParams::resolve(&input.profile)?;
        let calendar = &input.calendar;
        let num_days = calendar.num_days;
        if num_days == 0 {
            return Err(SchedulingError::Configuration(
                "the planning horizon has no days".to_string(),
            ));
        }
        if input.workers.is_empty() {
            return Err(SchedulingError::Configuration(
                "no workers to schedule".to_string(),
            ));
        }

        let closed = day_set(&calendar.closed_holidays, num_days, "closed holiday")?;
        let holidays = day_set(&calendar.holidays, num_days, "holiday")?;
        let explicit_special = match &calendar.special_days {
            Some(days) => Some(day_set(days, num_days, "special day")?),
            None => None,
        };
        let week_of = match &calendar.weeks {
            Some(weeks) => explicit_weeks(weeks, num_days)?,
            None => derived_weeks(calendar.start_date, num_days),
        };

        let mut days = Vec::with_capacity(num_days as usize);
        for day in 1..=num_days {
            let date = calendar
                .start_date
                .checked_add_days(Days::new(u64::from(day - 1)))
                .ok_or_else(|| {
                    SchedulingError::Configuration(format!("day {day} is outside the calendar"))
                })?;
            let is_closed = closed.contains(&day);
            let special = match &explicit_special {
                Some(set) => set.contains(&day),
                None => date.weekday() == Weekday::Sun || holidays.contains(&day),
            } || is_closed;
            days.push(DayInfo {
                day,
                date,
                weekday: date.weekday(),
                month: date.month(),
                week: week_of[day as usize - 1],
                special,
                closed: is_closed,
            });
        }

        let mut weeks: BTreeMap<WeekNumber, Vec<Day>> = BTreeMap::new();
        for info in &days {
            if let Some(week) = info.week {
                weeks.entry(week).or_default().push(info.day);
            }
        }

        let mut seen = HashSet::new();
        let mut workers = Vec::with_capacity(input.workers.len());
        for worker in &input.workers {
            if !seen.insert(worker.id) {
                return Err(SchedulingError::Configuration(format!(
                    "worker {} appears more than once",
                    worker.id
                )));
            }
            workers.push(worker_context(worker, num_days, &closed)?);
        }

        let mut staffing = BTreeMap::new();
        for entry in &input.staffing {
            if entry.day == 0 || entry.day > num_days {
                return Err(SchedulingError::Configuration(format!(
                    "staffing target for day {} is outside the horizon",
                    entry.day
                )));
            }
            if !params.is_working_shift(entry.shift) {
                return Err(SchedulingError::Configuration(format!(
                    "staffing target for day {} names {}, which is not a working shift",
                    entry.day, entry.shift
                )));
            }
            let goal = StaffingGoal {
                target: entry.target,
                minimum: entry.minimum,
            };
            if staffing.insert((entry.day, entry.shift), goal).is_some() {
                return Err(SchedulingError::Configuration(format!(
                    "duplicate staffing target for day {} shift {}",
                    entry.day, entry.shift
                )));
            }
        }

        let ctx = Self {
            days,
            weeks,
            workers,
            staffing,
            params,
        };
        info!(
            "Schedule context: {} workers, {} days, {} weeks, {} special days, profile {}",
            ctx.workers.len(),
            ctx.num_days(),
            ctx.weeks.len(),
            ctx.special_days().count(),
            ctx.params.kind
        );
        Ok(ctx)
    }

    pub fn num_days(&self) -> u32 {
        self.days.len() as u32
    }

    pub fn day(&self, day: Day) -> Option<&DayInfo> {
        day.checked_sub(1).and_then(|i| self.days.get(i as usize))
    }

    pub fn is_special(&self, day: Day) -> bool {
        self.day(day).is_some_and(|d| d.special)
    }

    pub fn is_closed(&self, day: Day) -> bool {
        self.day(day).is_some_and(|d| d.closed)
    }

    pub fn weekday(&self, day: Day) -> Option<Weekday> {
        self.day(day).map(|d| d.weekday)
    }

    pub fn week_of(&self, day: Day) -> Option<WeekNumber> {
        self.day(day).and_then(|d| d.week)
    }

    pub fn special_days(&self) -> impl Iterator<Item = Day> + '_ {
        self.days.iter().filter(|d| d.special).map(|d| d.day)
    }

    pub fn week_days(&self, week: WeekNumber) -> &[Day] {
        self.weeks.get(&week).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first_week(&self) -> Option<WeekNumber> {
        self.weeks.keys().next().copied()
    }

    pub fn last_week(&self) -> Option<WeekNumber> {
        self.weeks.keys().next_back().copied()
    }

    /// Saturday/Sunday pairs inside the horizon, as (saturday, sunday).
    pub fn weekends(&self) -> Vec<(Day, Day)> {
        self.days
            .iter()
            .filter(|d| d.weekday == Weekday::Sat && d.day < self.num_days())
            .map(|d| (d.day, d.day + 1))
            .collect()
    }
}

fn day_set(days: &[Day], num_days: u32, what: &str) -> Result<BTreeSet<Day>, SchedulingError> {
    let mut set = BTreeSet::new();
    for &day in days {
        if day == 0 || day > num_days {
            return Err(SchedulingError::Configuration(format!(
                "{what} {day} is outside the horizon 1..={num_days}"
            )));
        }
        set.insert(day);
    }
    Ok(set)
}

/// Monday-started weeks numbered 1, 2, ... from the horizon start. These
/// are not ISO week numbers: a horizon starting in June still opens with
/// week 1.
fn derived_weeks(start: NaiveDate, num_days: u32) -> Vec<Option<WeekNumber>> {
    let offset = start.weekday().num_days_from_monday();
    (1..=num_days)
        .map(|day| Some((offset + day - 1) / 7 + 1))
        .collect()
}

fn explicit_weeks(
    weeks: &BTreeMap<WeekNumber, Vec<Day>>,
    num_days: u32,
) -> Result<Vec<Option<WeekNumber>>, SchedulingError> {
    let mut week_of = vec![None; num_days as usize];
    for (&week, days) in weeks {
        for day in day_set(days, num_days, "week day")? {
            let slot = &mut week_of[day as usize - 1];
            if let Some(other) = slot {
                return Err(SchedulingError::Configuration(format!(
                    "day {day} belongs to both week {other} and week {week}"
                )));
            }
            *slot = Some(week);
        }
    }
    Ok(week_of)
}

fn worker_context(
    worker: &Worker,
    num_days: u32,
    closed: &BTreeSet<Day>,
) -> Result<WorkerContext, SchedulingError> {
    let contract = ContractType::new(worker.contract_type)
        .map_err(|e| SchedulingError::Configuration(format!("worker {}: {e}", worker.id)))?;
    let what = format!("worker {} day", worker.id);
    // closed holidays win over the worker's own absence sets
    let holiday: BTreeSet<Day> = &day_set(&worker.holiday_days, num_days, &what)? - closed;
    let missing: BTreeSet<Day> = &day_set(&worker.missing_days, num_days, &what)? - closed;
    let empty: BTreeSet<Day> = &day_set(&worker.empty_days, num_days, &what)? - closed;

    for (a, b, label) in [
        (&holiday, &missing, "holiday and missing"),
        (&holiday, &empty, "holiday and empty"),
        (&missing, &empty, "missing and empty"),
    ] {
        if let Some(day) = a.intersection(b).next() {
            return Err(SchedulingError::Configuration(format!(
                "worker {}: day {day} is in both the {label} sets",
                worker.id
            )));
        }
    }

    let mut status = vec![DayStatus::Working; num_days as usize];
    for day in 1..=num_days {
        let slot = &mut status[day as usize - 1];
        if closed.contains(&day) {
            *slot = DayStatus::ClosedHoliday;
        } else if holiday.contains(&day) {
            *slot = DayStatus::Holiday;
        } else if missing.contains(&day) {
            *slot = DayStatus::Missing;
        } else if empty.contains(&day) {
            *slot = DayStatus::Empty;
        }
    }

    if let Some(working_days) = &worker.working_days {
        let working = day_set(working_days, num_days, &what)?;
        for &day in &working {
            if status[day as usize - 1] != DayStatus::Working {
                return Err(SchedulingError::Configuration(format!(
                    "worker {}: working day {day} is also a closed or absence day",
                    worker.id
                )));
            }
        }
        let mut uncovered = 0;
        for (i, slot) in status.iter_mut().enumerate() {
            if *slot == DayStatus::Working && !working.contains(&(i as Day + 1)) {
                *slot = DayStatus::Empty;
                uncovered += 1;
            }
        }
        if uncovered > 0 {
            warn!(
                "Worker {}: {uncovered} days are in no calendar set, treating them as empty",
                worker.id
            );
        }
    }

    Ok(WorkerContext {
        id: worker.id,
        contract,
        weekly_cap: worker
            .weekly_cap
            .unwrap_or(u32::from(contract.value())),
        quotas: worker.quotas.clone(),
        status,
        availability: worker.week_availability.clone(),
    })
}
