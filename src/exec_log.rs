//! Execution log: the durable record of completed instances.
//!
//! Entries are grouped into monthly JSON files keyed by date, appended when
//! an instance stops and read back whenever a day is loaded. Comment lookup
//! is strictly by instance id; an instance without an id matches nothing,
//! and two instances of the same task on the same day can never share a
//! comment.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulid::Ulid;

use crate::day_state::date_key;
use crate::error::Result;
use crate::slot::SlotKey;
use crate::storage::Storage;

/// Persisted record of one completed instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Log-entry identity, distinct from instance identity
    pub entry_id: String,
    pub task_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub title: String,
    /// Instance this entry belongs to; legacy entries may lack it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub start_time: NaiveDateTime,
    pub stop_time: NaiveDateTime,
    pub slot: SlotKey,
    pub duration_seconds: i64,
    pub is_routine: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<u8>,
}

impl ExecutionLogEntry {
    pub fn new_entry_id() -> String {
        Ulid::new().to_string()
    }
}

/// A month's log file: date string → entries in completion order
type MonthLog = BTreeMap<String, Vec<ExecutionLogEntry>>;

/// Reader/writer over the monthly execution logs
#[derive(Debug, Clone)]
pub struct ExecutionLog {
    storage: Storage,
}

impl ExecutionLog {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// All entries recorded for a date, in completion order.
    ///
    /// A missing or corrupt month file reads as no entries.
    pub fn entries_for(&self, date: NaiveDate) -> Vec<ExecutionLogEntry> {
        let path = self.storage.log_file(&month_key(date));
        let month: MonthLog = self.storage.read_json_or_default(&path);
        month.get(&date_key(date)).cloned().unwrap_or_default()
    }

    /// Append a completed-instance entry under its date
    pub fn append(&self, date: NaiveDate, entry: ExecutionLogEntry) -> Result<()> {
        let path = self.storage.log_file(&month_key(date));
        self.storage.update_json::<MonthLog, _, _>(&path, |month| {
            month.entry(date_key(date)).or_default().push(entry);
            Ok(())
        })
    }

    /// Comment lookup, strictly by instance id. No id, no comment.
    pub fn comment_for(&self, date: NaiveDate, instance_id: Option<&str>) -> Option<String> {
        let instance_id = instance_id?;
        self.entries_for(date)
            .into_iter()
            .find(|entry| entry.instance_id.as_deref() == Some(instance_id))
            .and_then(|entry| entry.comment)
    }

    /// Attach or replace the comment on the entry for an instance.
    ///
    /// Returns false when no entry with that instance id exists.
    pub fn set_comment(
        &self,
        date: NaiveDate,
        instance_id: &str,
        comment: &str,
    ) -> Result<bool> {
        let path = self.storage.log_file(&month_key(date));
        self.storage.update_json::<MonthLog, _, _>(&path, |month| {
            let Some(entries) = month.get_mut(&date_key(date)) else {
                return Ok(false);
            };
            for entry in entries {
                if entry.instance_id.as_deref() == Some(instance_id) {
                    entry.comment = Some(comment.to_string());
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }
}

/// `YYYY-MM` month key of a date
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entry(path: &str, instance_id: Option<&str>, comment: Option<&str>) -> ExecutionLogEntry {
        let start = d("2025-06-15").and_hms_opt(9, 0, 0).unwrap();
        ExecutionLogEntry {
            entry_id: ExecutionLogEntry::new_entry_id(),
            task_path: path.to_string(),
            task_id: None,
            title: "Task".to_string(),
            instance_id: instance_id.map(str::to_string),
            start_time: start,
            stop_time: start + chrono::Duration::minutes(25),
            slot: SlotKey::Morning,
            duration_seconds: 1500,
            is_routine: false,
            comment: comment.map(str::to_string),
            energy: None,
            focus: None,
        }
    }

    fn log(temp: &TempDir) -> ExecutionLog {
        let storage = Storage::for_vault(temp.path().to_path_buf());
        storage.init().unwrap();
        ExecutionLog::new(storage)
    }

    #[test]
    fn append_and_read_by_date() {
        let temp = TempDir::new().unwrap();
        let log = log(&temp);
        let date = d("2025-06-15");

        log.append(date, entry("tasks/A.md", Some("inst-1"), None))
            .unwrap();
        log.append(date, entry("tasks/A.md", Some("inst-2"), None))
            .unwrap();
        log.append(d("2025-06-16"), entry("tasks/B.md", Some("inst-3"), None))
            .unwrap();

        let entries = log.entries_for(date);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].instance_id.as_deref(), Some("inst-1"));

        // Different month lands in a different file
        log.append(d("2025-07-01"), entry("tasks/C.md", None, None))
            .unwrap();
        assert_eq!(log.entries_for(d("2025-07-01")).len(), 1);
        assert_eq!(log.entries_for(date).len(), 2);
    }

    #[test]
    fn comment_lookup_is_id_scoped() {
        let temp = TempDir::new().unwrap();
        let log = log(&temp);
        let date = d("2025-06-15");

        log.append(date, entry("tasks/A.md", Some("orig-1"), Some("done well")))
            .unwrap();
        log.append(date, entry("tasks/A.md", Some("dup-2"), None))
            .unwrap();

        // Same task, same day: comments never bleed between instances
        assert_eq!(
            log.comment_for(date, Some("orig-1")).as_deref(),
            Some("done well")
        );
        assert_eq!(log.comment_for(date, Some("dup-2")), None);
        assert_eq!(log.comment_for(date, None), None);
    }

    #[test]
    fn set_comment_targets_one_entry() {
        let temp = TempDir::new().unwrap();
        let log = log(&temp);
        let date = d("2025-06-15");

        log.append(date, entry("tasks/A.md", Some("inst-1"), None))
            .unwrap();

        assert!(log.set_comment(date, "inst-1", "solid session").unwrap());
        assert!(!log.set_comment(date, "inst-9", "ghost").unwrap());
        assert_eq!(
            log.comment_for(date, Some("inst-1")).as_deref(),
            Some("solid session")
        );
    }

    #[test]
    fn corrupt_month_reads_as_empty() {
        let temp = TempDir::new().unwrap();
        let log = log(&temp);
        let date = d("2025-06-15");
        std::fs::write(
            log.storage.log_file(&month_key(date)),
            "not json at all",
        )
        .unwrap();

        assert!(log.entries_for(date).is_empty());
    }
}
