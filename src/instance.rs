//! Task instances: one dated, stateful occurrence of a task definition.
//!
//! Instance identity rules carry most of the engine's invariants: comments
//! and execution metadata are addressed strictly by instance id, an instance
//! without an id can never match a record, and two instances of the same
//! definition on the same day never share one. Base materializations get a
//! deterministic id (UUIDv5 over path and date) so repeated loads of the
//! same day agree without persisting an id map; replays get fresh random
//! ids so a duplicate never inherits its source's history.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::slot::SlotKey;
use crate::vault::TaskDefinition;

/// Lifecycle state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Idle,
    Running,
    Done,
}

impl InstanceState {
    /// Sort rank within a slot: done first, idle last
    pub fn rank(&self) -> u8 {
        match self {
            InstanceState::Done => 0,
            InstanceState::Running => 1,
            InstanceState::Idle => 2,
        }
    }
}

/// One dated occurrence of a task definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstance {
    /// Opaque identity; never reused across replays. Absent only for
    /// degenerate legacy records, which then match nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub task: TaskDefinition,
    pub state: InstanceState,
    pub slot: SlotKey,
    /// Slot-local position; assigned by the sorter when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<NaiveDateTime>,
}

impl TaskInstance {
    /// A fresh idle instance of a definition on a date
    pub fn idle(task: TaskDefinition, date: NaiveDate, slot: SlotKey) -> TaskInstance {
        let instance_id = Some(base_instance_id(&task.path, date));
        TaskInstance {
            instance_id,
            task,
            state: InstanceState::Idle,
            slot,
            order: None,
            date,
            start_time: None,
            stop_time: None,
        }
    }

    /// The "HH:MM" default execution time of the underlying definition
    pub fn scheduled_time(&self) -> Option<&str> {
        self.task.scheduled_time.as_deref()
    }

    pub fn id_matches(&self, instance_id: &str) -> bool {
        self.instance_id.as_deref() == Some(instance_id)
    }
}

/// Namespace for deterministic instance ids
const INSTANCE_NS: Uuid = Uuid::from_bytes([
    0x8f, 0x2a, 0x41, 0xd6, 0x5b, 0x1e, 0x4c, 0x09, 0x9e, 0x73, 0x2d, 0x60, 0xa4, 0xbb, 0x17,
    0xce,
]);

/// Deterministic id for the base materialization of a task on a date.
///
/// There is at most one base instance per (path, date); duplicates carry
/// their own stored random ids, so determinism here cannot collide with
/// replay identity.
pub fn base_instance_id(path: &str, date: NaiveDate) -> String {
    let name = format!("{}@{}", path, date.format("%Y-%m-%d"));
    Uuid::new_v5(&INSTANCE_NS, name.as_bytes()).to_string()
}

/// Deterministic fallback id for a log entry persisted without one.
///
/// Indexed by the entry's position within its day so repeated loads of an
/// unchanged log produce the same ids.
pub fn log_fallback_instance_id(path: &str, date: NaiveDate, index: usize) -> String {
    let name = format!("{}@{}#{}", path, date.format("%Y-%m-%d"), index);
    Uuid::new_v5(&INSTANCE_NS, name.as_bytes()).to_string()
}

/// Fresh random id for a replayed (duplicated) instance
pub fn replay_instance_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::TaskDefinition;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn base_ids_are_stable_and_distinct() {
        let a1 = base_instance_id("tasks/A.md", date("2025-06-15"));
        let a2 = base_instance_id("tasks/A.md", date("2025-06-15"));
        let b = base_instance_id("tasks/B.md", date("2025-06-15"));
        let a_next = base_instance_id("tasks/A.md", date("2025-06-16"));

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_ne!(a1, a_next);
    }

    #[test]
    fn fallback_ids_differ_per_entry() {
        let d = date("2025-06-15");
        let first = log_fallback_instance_id("tasks/A.md", d, 0);
        let second = log_fallback_instance_id("tasks/A.md", d, 1);
        assert_ne!(first, second);
        assert_eq!(first, log_fallback_instance_id("tasks/A.md", d, 0));
    }

    #[test]
    fn replay_ids_are_unique() {
        assert_ne!(replay_instance_id(), replay_instance_id());
    }

    #[test]
    fn state_ranks_done_before_idle() {
        assert!(InstanceState::Done.rank() < InstanceState::Running.rank());
        assert!(InstanceState::Running.rank() < InstanceState::Idle.rank());
    }

    #[test]
    fn idle_instance_gets_base_id() {
        let def = TaskDefinition::virtual_definition("tasks/A.md", "A", true);
        let d = date("2025-06-15");
        let instance = TaskInstance::idle(def, d, crate::slot::SlotKey::Morning);
        assert_eq!(
            instance.instance_id,
            Some(base_instance_id("tasks/A.md", d))
        );
        assert!(instance.id_matches(&base_instance_id("tasks/A.md", d)));
    }
}
