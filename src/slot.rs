//! Time slots: the four fixed day-parts instances are grouped into.
//!
//! Slot keys are serialized as their human-readable ranges ("0:00-8:00" etc.)
//! because the persisted day-state and execution logs use those strings as
//! map keys.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One of the four fixed day-parts, or none (unslotted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKey {
    #[serde(rename = "0:00-8:00")]
    EarlyMorning,
    #[serde(rename = "8:00-12:00")]
    Morning,
    #[serde(rename = "12:00-16:00")]
    Afternoon,
    #[serde(rename = "16:00-0:00")]
    Evening,
    #[serde(rename = "none")]
    None,
}

impl SlotKey {
    /// The four real slots, in day order (excludes `None`)
    pub const DAY_PARTS: [SlotKey; 4] = [
        SlotKey::EarlyMorning,
        SlotKey::Morning,
        SlotKey::Afternoon,
        SlotKey::Evening,
    ];

    /// Slot boundary start times, aligned with `DAY_PARTS`
    pub fn boundaries() -> [NaiveTime; 4] {
        [
            NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        ]
    }

    /// Slot containing the given wall-clock time
    pub fn for_time(time: NaiveTime) -> SlotKey {
        let boundaries = Self::boundaries();
        let mut slot = SlotKey::EarlyMorning;
        for (part, start) in Self::DAY_PARTS.iter().zip(boundaries.iter()) {
            if time >= *start {
                slot = *part;
            }
        }
        slot
    }

    /// Slot derived from an "HH:MM" scheduled-time string, `None` when the
    /// string is absent or malformed
    pub fn for_scheduled_time(scheduled: Option<&str>) -> SlotKey {
        match scheduled.and_then(parse_hhmm) {
            Some(time) => Self::for_time(time),
            None => SlotKey::None,
        }
    }

    /// Position for grouping output: real slots in day order, `None` last
    pub fn rank(&self) -> usize {
        match self {
            SlotKey::EarlyMorning => 0,
            SlotKey::Morning => 1,
            SlotKey::Afternoon => 2,
            SlotKey::Evening => 3,
            SlotKey::None => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKey::EarlyMorning => "0:00-8:00",
            SlotKey::Morning => "8:00-12:00",
            SlotKey::Afternoon => "12:00-16:00",
            SlotKey::Evening => "16:00-0:00",
            SlotKey::None => "none",
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0:00-8:00" => Ok(SlotKey::EarlyMorning),
            "8:00-12:00" => Ok(SlotKey::Morning),
            "12:00-16:00" => Ok(SlotKey::Afternoon),
            "16:00-0:00" => Ok(SlotKey::Evening),
            "none" | "" => Ok(SlotKey::None),
            other => Err(Error::InvalidArgument(format!("unknown slot: {}", other))),
        }
    }
}

/// Parse an "HH:MM" string into a time of day
pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    let (h, m) = trimmed.split_once(':')?;
    let hour: u32 = h.trim().parse().ok()?;
    let minute: u32 = m.trim().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn time_maps_to_containing_slot() {
        assert_eq!(SlotKey::for_time(t(0, 0)), SlotKey::EarlyMorning);
        assert_eq!(SlotKey::for_time(t(7, 59)), SlotKey::EarlyMorning);
        assert_eq!(SlotKey::for_time(t(8, 0)), SlotKey::Morning);
        assert_eq!(SlotKey::for_time(t(11, 30)), SlotKey::Morning);
        assert_eq!(SlotKey::for_time(t(12, 0)), SlotKey::Afternoon);
        assert_eq!(SlotKey::for_time(t(16, 0)), SlotKey::Evening);
        assert_eq!(SlotKey::for_time(t(23, 59)), SlotKey::Evening);
    }

    #[test]
    fn scheduled_time_falls_back_to_none() {
        assert_eq!(
            SlotKey::for_scheduled_time(Some("09:15")),
            SlotKey::Morning
        );
        assert_eq!(SlotKey::for_scheduled_time(None), SlotKey::None);
        assert_eq!(SlotKey::for_scheduled_time(Some("late")), SlotKey::None);
    }

    #[test]
    fn slot_strings_round_trip() {
        for slot in SlotKey::DAY_PARTS.iter().chain([SlotKey::None].iter()) {
            let parsed: SlotKey = slot.as_str().parse().unwrap();
            assert_eq!(parsed, *slot);
        }
        assert!("noon".parse::<SlotKey>().is_err());
    }

    #[test]
    fn serde_uses_range_strings() {
        let json = serde_json::to_string(&SlotKey::Morning).unwrap();
        assert_eq!(json, "\"8:00-12:00\"");
        let back: SlotKey = serde_json::from_str("\"16:00-0:00\"").unwrap();
        assert_eq!(back, SlotKey::Evening);
    }
}
