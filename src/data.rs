use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::SolverConfig;
use crate::profile::ProfileSelection;
use crate::solver::StageDiagnostics;

// Type aliases for clarity
pub type WorkerId = u32;
pub type Day = u32;
pub type WeekNumber = u32;

/// One of the shift types a worker can hold on a given day.
///
/// The declaration order is the extraction order: when reading a solution,
/// the first shift whose variable is set wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum ShiftType {
    #[serde(rename = "M")]
    Morning,
    #[serde(rename = "T")]
    Afternoon,
    #[serde(rename = "L")]
    Free,
    #[serde(rename = "LQ")]
    QualityFree,
    #[serde(rename = "F")]
    ClosedHoliday,
    #[serde(rename = "V")]
    Vacation,
    #[serde(rename = "LD")]
    CompensationFree,
    #[serde(rename = "A")]
    Absence,
    #[serde(rename = "TC")]
    Complementary,
}

impl ShiftType {
    pub const ALL: [ShiftType; 9] = [
        ShiftType::Morning,
        ShiftType::Afternoon,
        ShiftType::Free,
        ShiftType::QualityFree,
        ShiftType::ClosedHoliday,
        ShiftType::Vacation,
        ShiftType::CompensationFree,
        ShiftType::Absence,
        ShiftType::Complementary,
    ];

    /// Shifts counted against a worker's yearly free-day quota.
    pub const FREE_QUOTA: [ShiftType; 3] = [
        ShiftType::Free,
        ShiftType::QualityFree,
        ShiftType::CompensationFree,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn code(self) -> &'static str {
        match self {
            ShiftType::Morning => "M",
            ShiftType::Afternoon => "T",
            ShiftType::Free => "L",
            ShiftType::QualityFree => "LQ",
            ShiftType::ClosedHoliday => "F",
            ShiftType::Vacation => "V",
            ShiftType::CompensationFree => "LD",
            ShiftType::Absence => "A",
            ShiftType::Complementary => "TC",
        }
    }

    pub fn is_morning_or_afternoon(self) -> bool {
        matches!(self, ShiftType::Morning | ShiftType::Afternoon)
    }
}

impl fmt::Display for ShiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Per-worker quotas, already reconciled by the data-preparation layer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Quotas {
    /// L: free days over the horizon (L + LQ + LD).
    pub total_free: u32,
    /// Free days that must fall on the worker's Sundays/holidays.
    pub total_free_special: u32,
    /// LD: compensation days.
    pub compensation_days: u32,
    /// LQ: quality free days outside quality weekends.
    pub quality_free_days: u32,
    /// C2D
    pub two_day_weekends: u32,
    /// C3D
    pub three_day_weekends: u32,
    /// CXX
    pub consecutive_pairs: u32,
    /// TC
    pub complementary_shifts: u32,
}

impl Quotas {
    /// Every LQ the worker is owed once 3-day weekends are included.
    pub fn quality_free_total(&self) -> u32 {
        self.quality_free_days + self.two_day_weekends + self.three_day_weekends
    }
}

/// Which working shifts a worker may take during a given week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekAvailability {
    pub morning: bool,
    pub afternoon: bool,
}

impl Default for WeekAvailability {
    fn default() -> Self {
        Self {
            morning: true,
            afternoon: true,
        }
    }
}

/// A worker together with their calendar and quotas.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: WorkerId,
    pub contract_type: u8,
    /// Overrides the weekly working-day cap implied by the contract type.
    #[serde(default)]
    pub weekly_cap: Option<u32>,
    /// Days the worker is active. Derived from the other sets when absent.
    #[serde(default)]
    pub working_days: Option<Vec<Day>>,
    #[serde(default)]
    pub holiday_days: Vec<Day>,
    #[serde(default)]
    pub missing_days: Vec<Day>,
    #[serde(default)]
    pub empty_days: Vec<Day>,
    #[serde(default)]
    pub quotas: Quotas,
    #[serde(default)]
    pub week_availability: BTreeMap<WeekNumber, WeekAvailability>,
}

/// The planning horizon as handed over by the calendar builder.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarInput {
    pub start_date: NaiveDate,
    pub num_days: u32,
    #[serde(default)]
    pub holidays: Vec<Day>,
    #[serde(default)]
    pub closed_holidays: Vec<Day>,
    /// Sundays and holidays when absent.
    #[serde(default)]
    pub special_days: Option<Vec<Day>>,
    /// Monday-started weeks numbered from 1 at the horizon start when
    /// absent. Not ISO week numbers.
    #[serde(default)]
    pub weeks: Option<BTreeMap<WeekNumber, Vec<Day>>>,
}

/// Staffing goal for one working shift on one day.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffingTarget {
    pub day: Day,
    pub shift: ShiftType,
    pub target: u32,
    #[serde(default)]
    pub minimum: u32,
}

/// The complete input for the scheduling problem.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingInput {
    pub calendar: CalendarInput,
    pub workers: Vec<Worker>,
    #[serde(default)]
    pub staffing: Vec<StaffingTarget>,
    #[serde(default)]
    pub profile: ProfileSelection,
    #[serde(default)]
    pub solver: Option<SolverConfig>,
}

/// A worker's shift on one day; `None` when extraction found no set variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAssignment {
    pub day: Day,
    pub shift: Option<ShiftType>,
}

/// Worker → day → shift, as extracted from one solve.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMatrix {
    pub rows: BTreeMap<WorkerId, Vec<DayAssignment>>,
}

impl ScheduleMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows are kept in day order starting at day 1.
    pub fn push_row(&mut self, worker: WorkerId, shifts: Vec<Option<ShiftType>>) {
        let row = shifts
            .into_iter()
            .enumerate()
            .map(|(i, shift)| DayAssignment {
                day: i as Day + 1,
                shift,
            })
            .collect();
        self.rows.insert(worker, row);
    }

    pub fn get(&self, worker: WorkerId, day: Day) -> Option<ShiftType> {
        if day == 0 {
            return None;
        }
        self.rows
            .get(&worker)
            .and_then(|row| row.get(day as usize - 1))
            .and_then(|a| a.shift)
    }

    pub fn row(&self, worker: WorkerId) -> &[DayAssignment] {
        self.rows.get(&worker).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, worker: WorkerId, shift: ShiftType) -> usize {
        self.row(worker)
            .iter()
            .filter(|a| a.shift == Some(shift))
            .count()
    }

    pub fn unassigned(&self, worker: WorkerId) -> usize {
        self.row(worker).iter().filter(|a| a.shift.is_none()).count()
    }
}

/// Shift counts for one worker in one schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSummary {
    pub worker: WorkerId,
    pub free: usize,
    pub quality_free: usize,
    pub compensation: usize,
    pub complementary: usize,
    pub total_free: usize,
    pub special_day_work: usize,
    pub unassigned: usize,
}

/// Describes a soft constraint that was not met in the final schedule.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetSoftConstraint {
    pub constraint_type: String,
    pub description: String,
}

impl fmt::Display for UnmetSoftConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.constraint_type, self.description)
    }
}

/// The final output of the solver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingOutput {
    pub schedule: ScheduleMatrix,
    pub summaries: Vec<WorkerSummary>,
    pub unmet_soft_constraints: Vec<UnmetSoftConstraint>,
    pub stages: Vec<StageDiagnostics>,
}
