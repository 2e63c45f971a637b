//! Per-date overlay state: what the user changed about one day's list.
//!
//! Each date accumulates hidden routines, deleted instances, duplicated
//! (replayed) instances, slot overrides, and manual order numbers. The
//! overlay never touches task definitions and never expires: it is the
//! durable record of what happened to that day's list.
//!
//! All reads and writes go through [`DayStateStore`]; nothing else touches
//! `day-state.json`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::slot::SlotKey;
use crate::storage::Storage;

/// A hidden-routine entry. A null instance id is a wildcard: hide every
/// idle instance of the routine for this day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenRoutine {
    pub path: String,
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionType {
    /// Removes the task everywhere; for non-routines may remove the note
    Permanent,
    /// Hides one instance for this date only
    Temporary,
}

/// A deleted-instance entry.
///
/// Current entries carry an instance id (temporary) or a stable task id
/// (permanent). Legacy entries carry only a path, matched conservatively
/// and promoted in place once a stable id is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedInstance {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub deletion_type: DeletionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A duplicated ("replayed") instance record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicatedInstance {
    pub instance_id: String,
    pub original_path: String,
    pub slot: SlotKey,
}

/// The whole overlay for one date
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayState {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_routines: Vec<HiddenRoutine>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted_instances: Vec<DeletedInstance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicated_instances: Vec<DuplicatedInstance>,
    /// Routine path → slot the user moved it to for this day
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slot_overrides: BTreeMap<String, SlotKey>,
    /// Instance id → manual/auto-assigned order number
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub orders: BTreeMap<String, i64>,
}

impl DayState {
    /// Hidden check: exact instance-id match, or wildcard path match when
    /// the stored entry has no instance id.
    pub fn is_hidden(&self, instance_id: Option<&str>, path: &str) -> bool {
        self.hidden_routines.iter().any(|entry| {
            match (&entry.instance_id, instance_id) {
                (Some(stored), Some(actual)) => stored == actual,
                (None, _) => entry.path == path,
                (Some(_), None) => false,
            }
        })
    }

    /// Find the deleted entry matching an instance, if any.
    ///
    /// Matching order: instance id; then, for permanent entries, stable task
    /// id; then, for entries carrying neither id, the legacy path form, where
    /// an entry timestamp after the instance's date means the deletion does
    /// not reach that day and a missing timestamp matches unconditionally
    /// (fail safe toward hiding).
    fn deletion_match(
        &self,
        instance_id: Option<&str>,
        path: &str,
        task_id: Option<&str>,
        date: NaiveDate,
    ) -> Option<usize> {
        self.deleted_instances.iter().position(|entry| {
            if let (Some(stored), Some(actual)) = (&entry.instance_id, instance_id) {
                if stored == actual {
                    return true;
                }
            }
            if entry.deletion_type == DeletionType::Permanent {
                if let (Some(stored), Some(actual)) = (&entry.task_id, task_id) {
                    if stored == actual {
                        return true;
                    }
                }
                // Legacy permanent entry: path plus timestamp scope.
                // Entries with an instance id stay scoped to that instance.
                if entry.instance_id.is_none() && entry.task_id.is_none() && entry.path == path {
                    return match entry.timestamp {
                        Some(ts) => ts.date_naive() <= date,
                        None => true,
                    };
                }
            }
            false
        })
    }

    pub fn order_of(&self, instance_id: &str) -> Option<i64> {
        self.orders.get(instance_id).copied()
    }
}

/// Date-keyed map as persisted in `day-state.json`
type DayStateMap = BTreeMap<String, DayState>;

/// Load/cache/save lifecycle around the per-date overlay
#[derive(Debug)]
pub struct DayStateStore {
    storage: Storage,
    cache: HashMap<String, DayState>,
}

impl DayStateStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            cache: HashMap::new(),
        }
    }

    /// Overlay for a date, lazily created and cached. Corrupt persisted
    /// state reads as an empty overlay.
    pub fn get(&mut self, date: NaiveDate) -> &DayState {
        let key = date_key(date);
        if !self.cache.contains_key(&key) {
            let map: DayStateMap = self
                .storage
                .read_json_or_default(&self.storage.day_state_file());
            let state = map.get(&key).cloned().unwrap_or_default();
            self.cache.insert(key.clone(), state);
        }
        self.cache.get(&key).expect("just inserted")
    }

    /// Persist the overlay for a date and refresh the cache.
    ///
    /// Other dates' entries on disk are preserved; only this date's slot in
    /// the map is replaced, under the state-file lock.
    pub fn save(&mut self, date: NaiveDate, state: DayState) -> Result<()> {
        let key = date_key(date);
        self.storage.update_json::<DayStateMap, _, _>(
            &self.storage.day_state_file(),
            |map| {
                map.insert(key.clone(), state.clone());
                Ok(())
            },
        )?;
        self.cache.insert(key, state);
        Ok(())
    }

    /// Read-modify-write helper for engine mutations
    pub fn update<R>(
        &mut self,
        date: NaiveDate,
        f: impl FnOnce(&mut DayState) -> R,
    ) -> Result<R> {
        let mut state = self.get(date).clone();
        let result = f(&mut state);
        self.save(date, state)?;
        Ok(result)
    }

    /// Hidden query for an instance on a date
    pub fn is_hidden(&mut self, date: NaiveDate, instance_id: Option<&str>, path: &str) -> bool {
        self.get(date).is_hidden(instance_id, path)
    }

    /// Deleted query for an instance on a date.
    ///
    /// A match through the legacy path form promotes the entry in place by
    /// attaching the instance's stable task id, persisted immediately, so
    /// future lookups use the stable identity.
    pub fn is_deleted(
        &mut self,
        date: NaiveDate,
        instance_id: Option<&str>,
        path: &str,
        task_id: Option<&str>,
    ) -> Result<bool> {
        let state = self.get(date);
        let Some(index) = state.deletion_match(instance_id, path, task_id, date) else {
            return Ok(false);
        };

        let entry = &state.deleted_instances[index];
        let needs_promotion = entry.task_id.is_none()
            && entry.deletion_type == DeletionType::Permanent
            && task_id.is_some();
        if needs_promotion {
            let task_id = task_id.map(str::to_string);
            tracing::debug!(path, ?task_id, "promoting legacy deletion entry");
            self.update(date, |s| {
                if let Some(entry) = s.deleted_instances.get_mut(index) {
                    entry.task_id = task_id;
                }
            })?;
        }
        Ok(true)
    }
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
