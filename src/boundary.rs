//! Slot-boundary scheduling: the coarse timer that nudges idle work along.
//!
//! Four times a day, at each slot boundary, idle instances that still sit in
//! an earlier slot get moved into the current one. The pass only ever
//! touches the idle subset of the current day's view and is skipped
//! entirely when the displayed date is not today; completed and running
//! instances never move.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::instance::{InstanceState, TaskInstance};
use crate::slot::SlotKey;

/// Next slot-boundary fire time at or after `now`.
///
/// Past the last boundary of the day this rolls to the first boundary of
/// the next day.
pub fn next_boundary(now: NaiveDateTime) -> NaiveDateTime {
    for boundary in SlotKey::boundaries() {
        if now.time() < boundary {
            return now.date().and_time(boundary);
        }
    }
    next_day_start(now.date())
}

fn next_day_start(date: NaiveDate) -> NaiveDateTime {
    let next = date.succ_opt().unwrap_or(date);
    next.and_time(NaiveTime::from_hms_opt(0, 0, 0).expect("midnight"))
}

/// Best-effort pass moving idle instances into the current slot.
///
/// Returns the instance ids that were moved; their orders are cleared so
/// the next order assignment places them in the new slot. No-op unless
/// `displayed` is `today`.
pub fn shift_idle_into_current_slot(
    instances: &mut [TaskInstance],
    displayed: NaiveDate,
    today: NaiveDate,
    now: NaiveTime,
) -> Vec<String> {
    if displayed != today {
        return Vec::new();
    }

    let current = SlotKey::for_time(now);
    let mut moved = Vec::new();
    for instance in instances {
        if instance.state != InstanceState::Idle {
            continue;
        }
        if instance.slot == SlotKey::None || instance.slot.rank() >= current.rank() {
            continue;
        }
        instance.slot = current;
        instance.order = None;
        if let Some(id) = &instance.instance_id {
            moved.push(id.clone());
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::TaskDefinition;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn instance(id: &str, state: InstanceState, slot: SlotKey) -> TaskInstance {
        let task = TaskDefinition::virtual_definition("tasks/A.md", "A", true);
        TaskInstance {
            instance_id: Some(id.to_string()),
            task,
            state,
            slot,
            order: Some(100),
            date: d("2025-06-15"),
            start_time: None,
            stop_time: None,
        }
    }

    #[test]
    fn next_boundary_walks_the_day() {
        let date = d("2025-06-15");
        assert_eq!(
            next_boundary(date.and_time(t(5, 30))),
            date.and_time(t(8, 0))
        );
        assert_eq!(
            next_boundary(date.and_time(t(8, 0))),
            date.and_time(t(12, 0))
        );
        assert_eq!(
            next_boundary(date.and_time(t(15, 59))),
            date.and_time(t(16, 0))
        );
        // Past the last boundary: midnight tomorrow
        assert_eq!(
            next_boundary(date.and_time(t(20, 0))),
            d("2025-06-16").and_time(t(0, 0))
        );
    }

    #[test]
    fn idle_instances_move_forward_only() {
        let mut instances = vec![
            instance("stale", InstanceState::Idle, SlotKey::EarlyMorning),
            instance("current", InstanceState::Idle, SlotKey::Afternoon),
            instance("later", InstanceState::Idle, SlotKey::Evening),
            instance("unslotted", InstanceState::Idle, SlotKey::None),
        ];

        let moved =
            shift_idle_into_current_slot(&mut instances, d("2025-06-15"), d("2025-06-15"), t(13, 0));

        assert_eq!(moved, vec!["stale".to_string()]);
        assert_eq!(instances[0].slot, SlotKey::Afternoon);
        assert_eq!(instances[0].order, None);
        assert_eq!(instances[1].slot, SlotKey::Afternoon);
        assert_eq!(instances[2].slot, SlotKey::Evening);
        assert_eq!(instances[3].slot, SlotKey::None);
    }

    #[test]
    fn running_and_done_never_move() {
        let mut instances = vec![
            instance("r", InstanceState::Running, SlotKey::EarlyMorning),
            instance("d", InstanceState::Done, SlotKey::EarlyMorning),
        ];
        let moved =
            shift_idle_into_current_slot(&mut instances, d("2025-06-15"), d("2025-06-15"), t(13, 0));
        assert!(moved.is_empty());
        assert_eq!(instances[0].slot, SlotKey::EarlyMorning);
        assert_eq!(instances[1].slot, SlotKey::EarlyMorning);
    }

    #[test]
    fn skipped_when_viewing_another_day() {
        let mut instances = vec![instance("i", InstanceState::Idle, SlotKey::EarlyMorning)];
        let moved =
            shift_idle_into_current_slot(&mut instances, d("2025-06-14"), d("2025-06-15"), t(13, 0));
        assert!(moved.is_empty());
        assert_eq!(instances[0].slot, SlotKey::EarlyMorning);
    }
}
