//! Running-instance persistence and restart recovery.
//!
//! Every running instance has a durable record in `running.json`, written on
//! start and removed on stop. At process start (and on date navigation) the
//! records are read back and applied to the freshly loaded day: a record
//! only applies when its stored date equals the displayed date, so the same
//! running task can never appear on two different days at once.
//!
//! Restoration is two explicitly separated steps: match an existing idle
//! instance, or reconstruct a minimal one when the definition is gone.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::instance::{InstanceState, TaskInstance};
use crate::slot::SlotKey;
use crate::storage::Storage;
use crate::vault::TaskDefinition;

/// Durable record of one in-flight instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningTaskRecord {
    pub date: NaiveDate,
    pub task_path: String,
    pub task_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub start_time: NaiveDateTime,
    pub slot: SlotKey,
    pub is_routine: bool,
}

/// Reader/writer over `running.json`
#[derive(Debug, Clone)]
pub struct RunningStore {
    storage: Storage,
}

impl RunningStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// All persisted running records. Missing or corrupt file reads empty.
    pub fn load(&self) -> Vec<RunningTaskRecord> {
        self.storage
            .read_json_or_default(&self.storage.running_file())
    }

    /// Replace the persisted running set
    pub fn save(&self, records: &[RunningTaskRecord]) -> Result<()> {
        self.storage
            .write_json(&self.storage.running_file(), &records.to_vec())
    }

    /// Remove the record for an instance, returning it when present
    pub fn remove(&self, instance_id: &str) -> Result<Option<RunningTaskRecord>> {
        let mut records = self.load();
        let position = records
            .iter()
            .position(|r| r.instance_id.as_deref() == Some(instance_id));
        let removed = position.map(|i| records.remove(i));
        if removed.is_some() {
            self.save(&records)?;
        }
        Ok(removed)
    }
}

/// Apply persisted running records to a freshly loaded day.
///
/// Records for other dates are ignored for this render. Each applicable
/// record either upgrades a matching idle instance or appends a
/// reconstructed one.
pub fn restore_running(
    records: &[RunningTaskRecord],
    date: NaiveDate,
    instances: &mut Vec<TaskInstance>,
) {
    for record in records {
        if record.date != date {
            continue;
        }
        match match_existing(instances, record) {
            Some(index) => {
                let instance = &mut instances[index];
                instance.state = InstanceState::Running;
                instance.start_time = Some(record.start_time);
                if record.instance_id.is_some() {
                    instance.instance_id = record.instance_id.clone();
                }
            }
            None => instances.push(reconstruct(record)),
        }
    }
}

/// Find an existing idle instance the record can reattach to: same task
/// path, same slot. Earlier records leave their match running, so two
/// records never bind the same index.
pub fn match_existing(instances: &[TaskInstance], record: &RunningTaskRecord) -> Option<usize> {
    instances.iter().position(|instance| {
        instance.state == InstanceState::Idle
            && instance.task.path == record.task_path
            && instance.slot == record.slot
    })
}

/// Rebuild a running instance whose definition or materialization is gone
pub fn reconstruct(record: &RunningTaskRecord) -> TaskInstance {
    let task = TaskDefinition::virtual_definition(
        &record.task_path,
        &record.task_title,
        record.is_routine,
    );
    TaskInstance {
        instance_id: record.instance_id.clone(),
        task,
        state: InstanceState::Running,
        slot: record.slot,
        order: None,
        date: record.date,
        start_time: Some(record.start_time),
        stop_time: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(date: &str, path: &str, instance_id: &str) -> RunningTaskRecord {
        RunningTaskRecord {
            date: d(date),
            task_path: path.to_string(),
            task_title: "Task".to_string(),
            instance_id: Some(instance_id.to_string()),
            start_time: d(date).and_hms_opt(9, 30, 0).unwrap(),
            slot: SlotKey::Morning,
            is_routine: true,
        }
    }

    fn idle(path: &str, slot: SlotKey) -> TaskInstance {
        let def = TaskDefinition::virtual_definition(path, "Task", true);
        TaskInstance::idle(def, d("2025-06-15"), slot)
    }

    #[test]
    fn store_round_trips_and_removes() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::for_vault(temp.path().to_path_buf());
        storage.init().unwrap();
        let store = RunningStore::new(storage);

        assert!(store.load().is_empty());
        store
            .save(&[record("2025-06-15", "tasks/A.md", "inst-1")])
            .unwrap();
        assert_eq!(store.load().len(), 1);

        let removed = store.remove("inst-1").unwrap();
        assert_eq!(removed.unwrap().task_path, "tasks/A.md");
        assert!(store.load().is_empty());
        assert!(store.remove("inst-1").unwrap().is_none());
    }

    #[test]
    fn restore_upgrades_matching_idle_instance() {
        let mut instances = vec![idle("tasks/A.md", SlotKey::Morning)];
        let rec = record("2025-06-15", "tasks/A.md", "run-1");

        restore_running(&[rec.clone()], d("2025-06-15"), &mut instances);

        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].state, InstanceState::Running);
        assert_eq!(instances[0].start_time, Some(rec.start_time));
        assert_eq!(instances[0].instance_id.as_deref(), Some("run-1"));
    }

    #[test]
    fn restore_prefers_same_slot() {
        let mut instances = vec![
            idle("tasks/A.md", SlotKey::Afternoon),
            idle("tasks/A.md", SlotKey::Morning),
        ];
        restore_running(
            &[record("2025-06-15", "tasks/A.md", "run-1")],
            d("2025-06-15"),
            &mut instances,
        );
        assert_eq!(instances[0].state, InstanceState::Idle);
        assert_eq!(instances[1].state, InstanceState::Running);
    }

    #[test]
    fn same_path_records_never_share_an_instance() {
        let mut instances = vec![idle("tasks/A.md", SlotKey::Morning)];
        restore_running(
            &[
                record("2025-06-15", "tasks/A.md", "run-1"),
                record("2025-06-15", "tasks/A.md", "run-2"),
            ],
            d("2025-06-15"),
            &mut instances,
        );

        // The first record takes the idle instance; the second reconstructs
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].instance_id.as_deref(), Some("run-1"));
        assert_eq!(instances[1].instance_id.as_deref(), Some("run-2"));
        assert!(instances[1].task.is_virtual);
    }

    #[test]
    fn restore_reconstructs_when_nothing_matches() {
        let mut instances = Vec::new();
        restore_running(
            &[record("2025-06-15", "tasks/Ghost.md", "run-1")],
            d("2025-06-15"),
            &mut instances,
        );

        assert_eq!(instances.len(), 1);
        let rebuilt = &instances[0];
        assert_eq!(rebuilt.state, InstanceState::Running);
        assert!(rebuilt.task.is_virtual);
        assert_eq!(rebuilt.task.path, "tasks/Ghost.md");
        assert_eq!(rebuilt.slot, SlotKey::Morning);
    }

    #[test]
    fn records_for_other_dates_are_ignored() {
        let mut instances = vec![idle("tasks/A.md", SlotKey::Morning)];
        restore_running(
            &[record("2025-06-14", "tasks/A.md", "run-1")],
            d("2025-06-15"),
            &mut instances,
        );
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].state, InstanceState::Idle);

        restore_running(
            &[record("2025-06-16", "tasks/A.md", "run-1")],
            d("2025-06-15"),
            &mut instances,
        );
        assert_eq!(instances[0].state, InstanceState::Idle);
    }
}
