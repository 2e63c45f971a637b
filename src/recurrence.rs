//! Recurrence evaluation for routine tasks.
//!
//! A routine's schedule is parsed once into an explicit [`RecurrenceRule`]
//! variant; ad-hoc or malformed frontmatter maps to `NotConfigured`, which is
//! never due. Evaluation itself is a pure function of the rule, the date
//! under view, and (for the disabled-routine fallback) the real-world current
//! date.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::frontmatter::Frontmatter;

/// Parsed recurrence rule of a routine task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum RecurrenceRule {
    Daily,
    Weekdays,
    Weekends,
    Weekly { weekdays: Vec<u32> },
    Monthly { week: u32, weekday: u32 },
    /// Missing or malformed schedule; never due
    NotConfigured,
}

/// Full routine schedule: rule plus bounds, interval, and overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub rule: RecurrenceRule,
    /// Every Nth period, counted from `start`; 1 = every period
    pub interval: u32,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    /// One-off relocation; overrides the rule entirely when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
}

impl Routine {
    /// Parse a routine schedule from note frontmatter.
    ///
    /// `routine_type` selects the rule; missing or unknown types, and rules
    /// whose required fields are absent, become `NotConfigured`.
    pub fn parse(fm: &Frontmatter) -> Routine {
        let rule = match fm.get("routine_type") {
            Some("daily") => RecurrenceRule::Daily,
            Some("weekdays") => RecurrenceRule::Weekdays,
            Some("weekends") => RecurrenceRule::Weekends,
            Some("weekly") => match fm.get_u32_list("routine_weekdays") {
                Some(weekdays) if weekdays.iter().all(|d| *d <= 6) => {
                    RecurrenceRule::Weekly { weekdays }
                }
                _ => RecurrenceRule::NotConfigured,
            },
            Some("monthly") => {
                match (fm.get_u32("monthly_week"), fm.get_u32("monthly_weekday")) {
                    (Some(week), Some(weekday)) if (1..=5).contains(&week) && weekday <= 6 => {
                        RecurrenceRule::Monthly { week, weekday }
                    }
                    _ => RecurrenceRule::NotConfigured,
                }
            }
            _ => RecurrenceRule::NotConfigured,
        };

        Routine {
            rule,
            interval: fm.get_u32("routine_interval").filter(|i| *i >= 1).unwrap_or(1),
            enabled: fm.get_bool("routine_enabled").unwrap_or(true),
            start: fm.get_date("routine_start"),
            end: fm.get_date("routine_end"),
            target_date: fm.get_date("target_date"),
        }
    }

    /// Whether this routine is due on `date`.
    ///
    /// `today` is the real-world current date, used only by the fallback for
    /// disabled routines without a `target_date` (legacy data stays visible
    /// on the literal current day and nowhere else).
    pub fn is_due(&self, date: NaiveDate, today: NaiveDate) -> bool {
        if !self.enabled {
            return match self.target_date {
                Some(target) => date == target,
                None => date == today,
            };
        }

        // A moved target date replaces the schedule outright
        if let Some(target) = self.target_date {
            return date == target;
        }

        if let Some(start) = self.start {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if date > end {
                return false;
            }
        }

        match &self.rule {
            RecurrenceRule::Daily => self.interval_matches(date, 1),
            RecurrenceRule::Weekdays => !is_weekend(date.weekday()),
            RecurrenceRule::Weekends => is_weekend(date.weekday()),
            RecurrenceRule::Weekly { weekdays } => {
                weekdays.contains(&weekday_index(date.weekday()))
                    && self.interval_matches(date, 7)
            }
            RecurrenceRule::Monthly { week, weekday } => {
                monthly_matches(date, *week, *weekday)
            }
            RecurrenceRule::NotConfigured => false,
        }
    }

    /// Every Nth period check, anchored at `start`. Without an anchor an
    /// interval above 1 cannot be evaluated and fails closed.
    fn interval_matches(&self, date: NaiveDate, period_days: i64) -> bool {
        if self.interval <= 1 {
            return true;
        }
        let Some(start) = self.start else {
            return false;
        };
        let elapsed = (date - start).num_days();
        if elapsed < 0 {
            return false;
        }
        (elapsed / period_days) % i64::from(self.interval) == 0
    }
}

/// Weekday as stored in frontmatter: 0 = Sunday .. 6 = Saturday
pub fn weekday_index(weekday: Weekday) -> u32 {
    weekday.num_days_from_sunday()
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// Is `date` the Nth `weekday` of its month? Week 5 means the last one.
fn monthly_matches(date: NaiveDate, week: u32, weekday: u32) -> bool {
    if weekday_index(date.weekday()) != weekday {
        return false;
    }
    let occurrence = (date.day() - 1) / 7 + 1;
    if week == 5 {
        // Last occurrence: no same weekday seven days later in this month
        let next = date.checked_add_days(Days::new(7));
        return match next {
            Some(next) => next.month() != date.month(),
            None => true,
        };
    }
    occurrence == week
}
