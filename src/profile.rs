//! Constraint profiles: which rules run, with which parameters.
//!
//! Both profiles share the rule functions in [`crate::constraints`] and only
//! differ where the two historical rule sets diverged: the weekend-quality
//! definition, the meaning of closed holidays (F days) for free-day rules,
//! and the objective weights.

use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constraints;
use crate::context::ScheduleContext;
use crate::data::{ScheduleMatrix, ShiftType};
use crate::error::SchedulingError;
use crate::model::ModelBuilder;
use crate::objective::ObjectiveWeights;
use crate::variables::ShiftVars;

use crate::data::ShiftType::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Full contract rules: compensation days, complementary shifts, 10-day runs.
    Standard,
    /// Reduced shift set, 5-day runs, balance-oriented objective.
    Compact,
}

impl FromStr for ProfileKind {
    type Err = SchedulingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "a" => Ok(ProfileKind::Standard),
            "compact" | "b" => Ok(ProfileKind::Compact),
            other => Err(SchedulingError::Configuration(format!(
                "unknown constraint profile {other:?}"
            ))),
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::Standard => f.write_str("standard"),
            ProfileKind::Compact => f.write_str("compact"),
        }
    }
}

/// `==` or `>=` for the weekend and free-Sunday quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaComparison {
    Exact,
    AtLeast,
}

/// Which LD shifts count towards the one-LD cap of a quiet week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationCapScope {
    /// Every LD of the week.
    #[default]
    WholeWeek,
    /// Only LD placed on the week's Sundays/holidays. Neither built-in
    /// profile allows LD on those days, so the cap only binds with a
    /// custom legal shift set.
    SpecialDays,
}

/// Caller overrides. `None` keeps the profile's default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileSettings {
    pub closed_days_count_as_free: Option<bool>,
    pub free_sundays_include_two_day_weekends: Option<bool>,
    pub closed_weekend_auto_qualifies: Option<bool>,
    pub weekend_quota: Option<QuotaComparison>,
    pub weekly_shift_lock: Option<bool>,
    pub defer_three_day_weekends: Option<bool>,
    pub compensation_cap_scope: Option<CompensationCapScope>,
    pub max_continuous_working_days: Option<u32>,
}

/// The profile requested by the caller.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileSelection {
    pub name: String,
    pub settings: ProfileSettings,
}

impl Default for ProfileSelection {
    fn default() -> Self {
        Self {
            name: ProfileKind::Standard.to_string(),
            settings: ProfileSettings::default(),
        }
    }
}

/// Resolved, immutable parameters for one scheduling run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileParams {
    pub kind: ProfileKind,
    /// Shift types that get a decision variable.
    pub shift_types: Vec<ShiftType>,
    /// Legal shifts on an ordinary working day.
    pub ordinary_shifts: Vec<ShiftType>,
    /// Legal shifts on a Sunday/holiday working day.
    pub special_shifts: Vec<ShiftType>,
    /// Shifts that count as work for continuity and staffing.
    pub working_shifts: Vec<ShiftType>,
    pub max_continuous_working_days: u32,
    pub closed_days_count_as_free: bool,
    pub free_sundays_include_two_day_weekends: bool,
    pub closed_weekend_auto_qualifies: bool,
    pub weekend_quota: QuotaComparison,
    pub weekly_shift_lock: bool,
    pub defer_three_day_weekends: bool,
    pub compensation_cap_scope: CompensationCapScope,
}

impl ProfileParams {
    pub fn resolve(selection: &ProfileSelection) -> Result<Self, SchedulingError> {
        let kind: ProfileKind = selection.name.parse()?;
        let mut params = Self::defaults(kind);
        let s = &selection.settings;
        if let Some(v) = s.closed_days_count_as_free {
            params.closed_days_count_as_free = v;
        }
        if let Some(v) = s.free_sundays_include_two_day_weekends {
            params.free_sundays_include_two_day_weekends = v;
        }
        if let Some(v) = s.closed_weekend_auto_qualifies {
            params.closed_weekend_auto_qualifies = v;
        }
        if let Some(v) = s.weekend_quota {
            params.weekend_quota = v;
        }
        if let Some(v) = s.weekly_shift_lock {
            params.weekly_shift_lock = v;
        }
        if let Some(v) = s.defer_three_day_weekends {
            params.defer_three_day_weekends = v;
        }
        if let Some(v) = s.compensation_cap_scope {
            params.compensation_cap_scope = v;
        }
        if let Some(v) = s.max_continuous_working_days {
            if v == 0 {
                return Err(SchedulingError::Configuration(
                    "max continuous working days must be at least 1".to_string(),
                ));
            }
            params.max_continuous_working_days = v;
        }
        Ok(params)
    }

    pub fn defaults(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Standard => Self {
                kind,
                shift_types: ShiftType::ALL.to_vec(),
                ordinary_shifts: vec![
                    Morning,
                    Afternoon,
                    Free,
                    QualityFree,
                    CompensationFree,
                    Complementary,
                ],
                special_shifts: vec![Morning, Afternoon, Free, Complementary],
                working_shifts: vec![Morning, Afternoon, Complementary],
                max_continuous_working_days: 10,
                closed_days_count_as_free: true,
                free_sundays_include_two_day_weekends: false,
                closed_weekend_auto_qualifies: true,
                weekend_quota: QuotaComparison::Exact,
                weekly_shift_lock: true,
                defer_three_day_weekends: true,
                compensation_cap_scope: CompensationCapScope::WholeWeek,
            },
            ProfileKind::Compact => Self {
                kind,
                shift_types: vec![
                    Morning,
                    Afternoon,
                    Free,
                    QualityFree,
                    ClosedHoliday,
                    Vacation,
                    Absence,
                ],
                ordinary_shifts: vec![Morning, Afternoon, Free, QualityFree],
                special_shifts: vec![Morning, Afternoon, Free, QualityFree],
                working_shifts: vec![Morning, Afternoon],
                max_continuous_working_days: 5,
                closed_days_count_as_free: false,
                free_sundays_include_two_day_weekends: false,
                closed_weekend_auto_qualifies: false,
                weekend_quota: QuotaComparison::AtLeast,
                weekly_shift_lock: true,
                defer_three_day_weekends: true,
                compensation_cap_scope: CompensationCapScope::WholeWeek,
            },
        }
    }

    pub fn has_shift(&self, shift: ShiftType) -> bool {
        self.shift_types.contains(&shift)
    }

    pub fn is_working_shift(&self, shift: ShiftType) -> bool {
        self.working_shifts.contains(&shift)
    }

    /// Shifts that make a day count as free for adjacency rules.
    pub fn free_marker_shifts(&self) -> Vec<ShiftType> {
        let mut shifts = vec![Free, CompensationFree, QualityFree];
        if self.closed_days_count_as_free {
            shifts.push(ClosedHoliday);
        }
        shifts
    }
}

/// A ruleset selected once per run.
pub trait ConstraintProfile: Send + Sync {
    fn kind(&self) -> ProfileKind;

    fn weights(&self) -> ObjectiveWeights;

    /// Adds every Stage-1 hard rule, in a fixed order.
    fn stage_one(&self, m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext);

    /// Adds the refinement rules, parameterized by the Stage-1 draft.
    fn stage_two(
        &self,
        m: &mut ModelBuilder,
        vars: &ShiftVars,
        ctx: &ScheduleContext,
        draft: &ScheduleMatrix,
    ) {
        constraints::refinement(m, vars, ctx, draft);
    }
}

pub fn profile_for(kind: ProfileKind) -> Box<dyn ConstraintProfile> {
    match kind {
        ProfileKind::Standard => Box::new(StandardProfile),
        ProfileKind::Compact => Box::new(CompactProfile),
    }
}

pub struct StandardProfile;

impl ConstraintProfile for StandardProfile {
    fn kind(&self) -> ProfileKind {
        ProfileKind::Standard
    }

    fn weights(&self) -> ObjectiveWeights {
        ObjectiveWeights::standard()
    }

    fn stage_one(&self, m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
        info!("Applying standard profile rules for stage 1...");
        use constraints::*;
        m.rule("weekly working-day cap", |m| weekly_working_days(m, vars, ctx));
        m.rule("max continuous working days", |m| {
            max_continuous_working_days(m, vars, ctx)
        });
        m.rule("max continuous special working days", |m| {
            max_continuous_special_working_days(m, vars, ctx)
        });
        m.rule("total free days", |m| {
            total_free_days(m, vars, ctx, ctx.params.defer_three_day_weekends)
        });
        m.rule("free special days", |m| special_day_free_days(m, vars, ctx));
        m.rule("complementary shifts", |m| complementary_shifts(m, vars, ctx));
        m.rule("special-day work", |m| special_day_work(m, vars, ctx));
        m.rule("quality free days", |m| quality_free_days(m, vars, ctx, false));
        m.rule("compensation free days", |m| compensation_free_days(m, vars, ctx));
        m.rule("closed holidays", |m| closed_holidays(m, vars, ctx));
        m.rule("absence days", |m| absence_days(m, vars, ctx));
        m.rule("weekly shift lock", |m| weekly_shift_lock(m, vars, ctx));
        m.rule("legal shifts per day class", |m| legal_day_class_shifts(m, vars, ctx));
        m.rule("weekend adjacency", |m| weekend_adjacency(m, vars, ctx));
        m.rule("no adjacent free days", |m| consecutive_free_day_pairs(m, vars, ctx));
        m.rule("2-day quality weekends", |m| two_day_quality_weekends(m, vars, ctx));
        m.rule("quality free day spacing", |m| quality_free_spacing(m, vars, ctx));
        m.rule("special-day work priority", |m| special_day_work_priority(m, vars, ctx));
        m.rule("compensation days", |m| compensation_matching(m, vars, ctx));
        m.rule("weekly compensation cap", |m| weekly_compensation_cap(m, vars, ctx));
        m.rule("one free day per week", |m| one_free_day_per_week(m, vars, ctx));
    }
}

pub struct CompactProfile;

impl ConstraintProfile for CompactProfile {
    fn kind(&self) -> ProfileKind {
        ProfileKind::Compact
    }

    fn weights(&self) -> ObjectiveWeights {
        ObjectiveWeights::compact()
    }

    fn stage_one(&self, m: &mut ModelBuilder, vars: &ShiftVars, ctx: &ScheduleContext) {
        info!("Applying compact profile rules for stage 1...");
        use constraints::*;
        m.rule("weekly working-day cap", |m| weekly_working_days(m, vars, ctx));
        m.rule("max continuous working days", |m| {
            max_continuous_working_days(m, vars, ctx)
        });
        m.rule("total free days", |m| {
            total_free_days(m, vars, ctx, ctx.params.defer_three_day_weekends)
        });
        m.rule("quality free days", |m| quality_free_days(m, vars, ctx, false));
        m.rule("closed holidays", |m| closed_holidays(m, vars, ctx));
        m.rule("absence days", |m| absence_days(m, vars, ctx));
        m.rule("free special days", |m| special_day_free_days(m, vars, ctx));
        m.rule("weekly shift lock", |m| weekly_shift_lock(m, vars, ctx));
        m.rule("legal shifts per day class", |m| legal_day_class_shifts(m, vars, ctx));
        m.rule("no three free days in a row", |m| no_three_free_days_in_a_row(m, vars, ctx));
        m.rule("2-day quality weekends", |m| two_day_quality_weekends(m, vars, ctx));
        m.rule("quality free only before a free Sunday", |m| {
            quality_free_only_on_weekends(m, vars, ctx)
        });
        m.rule("weekend adjacency", |m| weekend_adjacency(m, vars, ctx));
        m.rule("partial week free days", |m| partial_week_free_days(m, vars, ctx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_profile_names() {
        assert_eq!("Standard".parse::<ProfileKind>().unwrap(), ProfileKind::Standard);
        assert_eq!("b".parse::<ProfileKind>().unwrap(), ProfileKind::Compact);
        let err = "weekend-only".parse::<ProfileKind>().unwrap_err();
        assert!(matches!(err, SchedulingError::Configuration(_)));
    }

    #[test]
    fn settings_override_profile_defaults() {
        let selection = ProfileSelection {
            name: "compact".to_string(),
            settings: ProfileSettings {
                weekend_quota: Some(QuotaComparison::Exact),
                max_continuous_working_days: Some(6),
                ..ProfileSettings::default()
            },
        };
        let params = ProfileParams::resolve(&selection).unwrap();
        assert_eq!(params.kind, ProfileKind::Compact);
        assert_eq!(params.weekend_quota, QuotaComparison::Exact);
        assert_eq!(params.max_continuous_working_days, 6);
        assert!(!params.closed_days_count_as_free);
    }

    #[test]
    fn zero_run_length_is_rejected() {
        let selection = ProfileSelection {
            name: "standard".to_string(),
            settings: ProfileSettings {
                max_continuous_working_days: Some(0),
                ..ProfileSettings::default()
            },
        };
        assert!(ProfileParams::resolve(&selection).is_err());
    }

    #[test]
    fn legal_sets_are_subsets_of_the_shift_set() {
        for kind in [ProfileKind::Standard, ProfileKind::Compact] {
            let params = ProfileParams::defaults(kind);
            for s in params
                .ordinary_shifts
                .iter()
                .chain(&params.special_shifts)
                .chain(&params.working_shifts)
            {
                assert!(params.has_shift(*s), "{kind}: {s} has no variable");
            }
        }
    }

    #[test]
    fn quiet_week_cap_covers_the_whole_week_by_default() {
        for kind in [ProfileKind::Standard, ProfileKind::Compact] {
            let params = ProfileParams::defaults(kind);
            assert_eq!(params.compensation_cap_scope, CompensationCapScope::WholeWeek);
        }
        assert_eq!(CompensationCapScope::default(), CompensationCapScope::WholeWeek);
    }

    #[test]
    fn closed_days_count_as_free_only_when_enabled() {
        let standard = ProfileParams::defaults(ProfileKind::Standard);
        assert!(standard.free_marker_shifts().contains(&ClosedHoliday));
        let compact = ProfileParams::defaults(ProfileKind::Compact);
        assert!(!compact.free_marker_shifts().contains(&ClosedHoliday));
    }
}
