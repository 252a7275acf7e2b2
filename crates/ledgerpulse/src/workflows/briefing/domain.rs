use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DraftId(pub String);

/// How often a client's snapshot should recur.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    None,
    Weekly,
    Biweekly,
    Monthly,
}

impl Frequency {
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
        }
    }
}

/// Recurrence configuration. Replaced wholesale on edit, never patched field
/// by field. `day_of_month` is capped to 28 so every month admits the date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub frequency: Frequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u8>,
}

impl Schedule {
    pub const fn none() -> Self {
        Self {
            frequency: Frequency::None,
            day_of_week: None,
            day_of_month: None,
            hour: None,
        }
    }

    pub fn weekly(day_of_week: u8, hour: u8) -> Result<Self, ScheduleError> {
        let schedule = Self {
            frequency: Frequency::Weekly,
            day_of_week: Some(day_of_week),
            day_of_month: None,
            hour: Some(hour),
        };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn biweekly(day_of_week: u8, hour: u8) -> Result<Self, ScheduleError> {
        let schedule = Self {
            frequency: Frequency::Biweekly,
            day_of_week: Some(day_of_week),
            day_of_month: None,
            hour: Some(hour),
        };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn monthly(day_of_month: u8, hour: u8) -> Result<Self, ScheduleError> {
        let schedule = Self {
            frequency: Frequency::Monthly,
            day_of_week: None,
            day_of_month: Some(day_of_month),
            hour: Some(hour),
        };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn is_active(&self) -> bool {
        self.frequency != Frequency::None
    }

    /// Edit-boundary validation. Recurrence computation tolerates missing
    /// fields with defaults, but edits must be fully specified and in range.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if let Some(hour) = self.hour {
            if hour > 23 {
                return Err(ScheduleError::HourOutOfRange(hour));
            }
        }
        match self.frequency {
            Frequency::None => Ok(()),
            Frequency::Weekly | Frequency::Biweekly => {
                let day = self
                    .day_of_week
                    .ok_or(ScheduleError::MissingDayOfWeek(self.frequency))?;
                if day > 6 {
                    return Err(ScheduleError::DayOfWeekOutOfRange(day));
                }
                Ok(())
            }
            Frequency::Monthly => {
                let day = self.day_of_month.ok_or(ScheduleError::MissingDayOfMonth)?;
                if !(1..=28).contains(&day) {
                    return Err(ScheduleError::DayOfMonthOutOfRange(day));
                }
                Ok(())
            }
        }
    }
}

/// Rejected at the edit boundary; schedules already stored are trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("hour must be within 0..=23, got {0}")]
    HourOutOfRange(u8),
    #[error("day_of_week must be within 0..=6, got {0}")]
    DayOfWeekOutOfRange(u8),
    #[error("day_of_month must be within 1..=28, got {0}")]
    DayOfMonthOutOfRange(u8),
    #[error("{} schedules require a day_of_week", .0.label())]
    MissingDayOfWeek(Frequency),
    #[error("monthly schedules require a day_of_month")]
    MissingDayOfMonth,
}

/// When the natural-language composer may be used for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposerMode {
    Never,
    Always,
    Scheduled,
    #[default]
    Meaningful,
}

impl ComposerMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Always => "always",
            Self::Scheduled => "scheduled",
            Self::Meaningful => "meaningful",
        }
    }
}

/// Per-tenant drafting preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub composer_mode: ComposerMode,
    #[serde(default = "TenantSettings::default_min_change_count")]
    pub min_change_count: u32,
}

impl TenantSettings {
    const fn default_min_change_count() -> u32 {
        2
    }
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            display_name: None,
            composer_mode: ComposerMode::default(),
            min_change_count: Self::default_min_change_count(),
        }
    }
}

/// A connected (or not yet connected) client account.
///
/// `account_id` is the external accounting-platform identifier; clients
/// without one are excluded from runs. Invariant: `next_run_at` is `None`
/// iff the schedule frequency is `none`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub tenant_id: TenantId,
    pub account_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub schedule: Schedule,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Wholesale client edit; the schedule replaces the stored one entirely.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientUpdate {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub schedule: Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Pending,
    Approved,
}

impl DraftStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }
}

/// A generated, not-yet-sent client update awaiting human approval.
/// Transitions pending -> approved exactly once and never reverts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub client_name: String,
    pub client_email: String,
    pub subject: String,
    pub body: String,
    pub change_count: usize,
    pub status: DraftStatus,
    pub mailbox_draft_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekly_schedule_rejects_out_of_range_day() {
        let err = Schedule::weekly(7, 9).expect_err("day 7 is invalid");
        assert_eq!(err, ScheduleError::DayOfWeekOutOfRange(7));
    }

    #[test]
    fn monthly_schedule_rejects_day_beyond_cap() {
        let err = Schedule::monthly(29, 9).expect_err("day 29 exceeds the cap");
        assert_eq!(err, ScheduleError::DayOfMonthOutOfRange(29));
    }

    #[test]
    fn monthly_schedule_requires_a_day() {
        let schedule = Schedule {
            frequency: Frequency::Monthly,
            day_of_week: None,
            day_of_month: None,
            hour: Some(9),
        };
        assert_eq!(
            schedule.validate(),
            Err(ScheduleError::MissingDayOfMonth)
        );
    }

    #[test]
    fn hour_is_bounded() {
        let err = Schedule::weekly(1, 24).expect_err("hour 24 is invalid");
        assert_eq!(err, ScheduleError::HourOutOfRange(24));
    }

    #[test]
    fn none_schedule_is_inactive_and_valid() {
        let schedule = Schedule::none();
        assert!(!schedule.is_active());
        assert!(schedule.validate().is_ok());
    }

    #[test]
    fn tenant_settings_default_to_meaningful_mode() {
        let settings = TenantSettings::default();
        assert_eq!(settings.composer_mode, ComposerMode::Meaningful);
        assert_eq!(settings.min_change_count, 2);
    }
}
