//! The engine: user-facing operations over one vault.
//!
//! Owns the catalog, the execution log, the day-state store, and the
//! running-record store, and runs every mutation to completion (including
//! its I/O) before returning, so "at most one running instance" holds by
//! stopping the previous instance synchronously rather than by locking.

use std::path::PathBuf;

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};

use crate::boundary;
use crate::config::Config;
use crate::day_state::{
    DayState, DayStateStore, DeletedInstance, DeletionType, DuplicatedInstance, HiddenRoutine,
};
use crate::error::{Error, Result};
use crate::exec_log::{ExecutionLog, ExecutionLogEntry};
use crate::instance::{replay_instance_id, InstanceState, TaskInstance};
use crate::loader::{DayPlan, TaskLoader};
use crate::notify::Notifier;
use crate::running::{restore_running, RunningStore, RunningTaskRecord};
use crate::slot::SlotKey;
use crate::sorter;
use crate::storage::Storage;
use crate::vault::TaskCatalog;

/// The reconciliation engine over one vault
pub struct Engine {
    catalog: TaskCatalog,
    log: ExecutionLog,
    day_state: DayStateStore,
    running: RunningStore,
    notifier: Box<dyn Notifier>,
}

impl Engine {
    /// Open an initialized vault
    pub fn open(vault_root: PathBuf, notifier: Box<dyn Notifier>) -> Result<Engine> {
        let config = Config::load(&vault_root)?;
        let storage = Storage::new(vault_root.clone(), &config);
        if !storage.is_initialized() {
            return Err(Error::NotAVault(vault_root));
        }
        Ok(Self::with_storage(storage, notifier))
    }

    /// Initialize a vault directory, then open it
    pub fn init(vault_root: PathBuf, notifier: Box<dyn Notifier>) -> Result<Engine> {
        let config = Config::load(&vault_root)?;
        let storage = Storage::new(vault_root, &config);
        storage.init()?;
        Ok(Self::with_storage(storage, notifier))
    }

    fn with_storage(storage: Storage, notifier: Box<dyn Notifier>) -> Engine {
        Engine {
            catalog: TaskCatalog::new(storage.clone()),
            log: ExecutionLog::new(storage.clone()),
            day_state: DayStateStore::new(storage.clone()),
            running: RunningStore::new(storage),
            notifier,
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// The authoritative instance list for a date: reconciliation pass,
    /// then running-state restoration, then ordering.
    pub fn plan(&mut self, date: NaiveDate, today: NaiveDate) -> DayPlan {
        let mut loader = TaskLoader::new(&self.catalog, &self.log, &mut self.day_state);
        let mut plan = loader.load(date, today);

        let records = self.running.load();
        restore_running(&records, date, &mut plan.instances);

        sorter::assign_orders(&mut plan.instances);
        sorter::sort_instances(&mut plan.instances);
        plan
    }

    // =========================================================================
    // Start / stop
    // =========================================================================

    /// Start an instance. Any other running instance anywhere is stopped
    /// first; the new record is persisted before returning.
    pub fn start(
        &mut self,
        date: NaiveDate,
        instance_id: &str,
        now: NaiveDateTime,
    ) -> Result<()> {
        let plan = self.plan(date, now.date());
        let instance = find_instance(&plan, instance_id)?.clone();
        if instance.state == InstanceState::Running {
            return Err(Error::InstanceRunning(instance_id.to_string()));
        }
        if instance.state == InstanceState::Done {
            return Err(Error::InvalidArgument(format!(
                "instance already completed: {}",
                instance_id
            )));
        }

        // At most one running instance system-wide
        for record in self.running.load() {
            self.finish_record(&record, now)?;
        }

        let record = RunningTaskRecord {
            date,
            task_path: instance.task.path.clone(),
            task_title: instance.task.title.clone(),
            instance_id: instance.instance_id.clone(),
            start_time: now,
            slot: instance.slot,
            is_routine: instance.task.is_routine,
        };
        self.running.save(&[record])?;

        tracing::info!(instance_id, path = %instance.task.path, "instance started");
        self.notifier
            .notify(&format!("「{}」を開始しました", instance.task.title));
        Ok(())
    }

    /// Stop a running instance: append its execution-log entry, drop the
    /// running record, and re-rank the day's orders.
    pub fn stop(
        &mut self,
        date: NaiveDate,
        instance_id: &str,
        now: NaiveDateTime,
    ) -> Result<ExecutionLogEntry> {
        let record = self
            .running
            .load()
            .into_iter()
            .find(|r| r.instance_id.as_deref() == Some(instance_id))
            .ok_or_else(|| Error::InstanceNotRunning(instance_id.to_string()))?;

        let entry = self.finish_record(&record, now)?;

        // Completed work is immediately re-ranked by actual start time
        let plan = self.plan(date, now.date());
        self.persist_orders(date, &plan)?;

        self.notifier
            .notify(&format!("「{}」を記録しました", record.task_title));
        Ok(entry)
    }

    /// Append the log entry for a running record and remove the record.
    ///
    /// A stop time before the recorded start is a clock that crossed
    /// midnight, not a negative duration.
    fn finish_record(
        &mut self,
        record: &RunningTaskRecord,
        now: NaiveDateTime,
    ) -> Result<ExecutionLogEntry> {
        let mut duration = now - record.start_time;
        if duration < Duration::zero() {
            duration = duration + Duration::days(1);
        }

        let task_id = self
            .catalog
            .find(&record.task_path)
            .and_then(|def| def.task_id);
        let entry = ExecutionLogEntry {
            entry_id: ExecutionLogEntry::new_entry_id(),
            task_path: record.task_path.clone(),
            task_id,
            title: record.task_title.clone(),
            instance_id: record.instance_id.clone(),
            start_time: record.start_time,
            stop_time: now,
            slot: record.slot,
            duration_seconds: duration.num_seconds(),
            is_routine: record.is_routine,
            comment: None,
            energy: None,
            focus: None,
        };
        self.log.append(record.date, entry.clone())?;
        let remaining: Vec<RunningTaskRecord> = self
            .running
            .load()
            .into_iter()
            .filter(|r| r != record)
            .collect();
        self.running.save(&remaining)?;
        tracing::info!(path = %record.task_path, seconds = entry.duration_seconds, "instance stopped");
        Ok(entry)
    }

    // =========================================================================
    // Replays
    // =========================================================================

    /// Duplicate ("replay") an instance: a fresh identity, inserted right
    /// after its source, with no inherited comment or history.
    pub fn duplicate(
        &mut self,
        date: NaiveDate,
        instance_id: &str,
        today: NaiveDate,
    ) -> Result<String> {
        let mut plan = self.plan(date, today);
        let source = find_instance(&plan, instance_id)?.clone();

        let new_id = replay_instance_id();
        let slot = source.slot;
        let order = sorter::order_for_insert_after(&mut plan.instances, slot, instance_id)?;

        self.day_state.update(date, |state| {
            state.duplicated_instances.push(DuplicatedInstance {
                instance_id: new_id.clone(),
                original_path: source.task.path.clone(),
                slot,
            });
            state.orders.insert(new_id.clone(), order);
            // A renumber may have shifted the whole slot
            for instance in &plan.instances {
                if let (Some(id), Some(order)) = (&instance.instance_id, instance.order) {
                    state.orders.insert(id.clone(), order);
                }
            }
        })?;

        self.notifier
            .notify(&format!("「{}」を複製しました", source.task.title));
        Ok(new_id)
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Delete an instance for this date.
    ///
    /// Routine instances are never allowed to take their definition with
    /// them: they get a wildcard hidden-routine entry scoped to the day.
    /// Non-routine instances are deleted permanently; when no sibling
    /// instance survives, the backing note is removed as well.
    pub fn delete(&mut self, date: NaiveDate, instance_id: &str, today: NaiveDate) -> Result<()> {
        let plan = self.plan(date, today);
        let instance = find_instance(&plan, instance_id)?.clone();
        let title = instance.task.title.clone();
        let path = instance.task.path.clone();

        if instance.task.is_routine {
            self.day_state.update(date, |state| {
                state.hidden_routines.push(HiddenRoutine {
                    path: path.clone(),
                    instance_id: None,
                });
            })?;
            self.notifier
                .notify(&format!("「{}」を本日のリストから削除しました", title));
            return Ok(());
        }

        let has_sibling = plan.instances.iter().any(|other| {
            other.task.path == path && other.instance_id != instance.instance_id
        });

        // A sole deletion takes the whole task: stamp the stable id while
        // the note still exists so the entry keeps matching the task under
        // later renames. Sibling-surviving deletions stay scoped to this
        // instance id.
        let mut task = instance.task.clone();
        let task_id = if has_sibling {
            None
        } else if task.is_virtual {
            task.task_id.clone()
        } else {
            Some(self.catalog.ensure_task_id(&mut task)?)
        };

        // The file goes next: a failed removal aborts with no state change
        if !has_sibling && !instance.task.is_virtual {
            if let Err(err) = self.catalog.delete_note(&path) {
                self.notifier
                    .notify(&format!("「{}」の削除に失敗しました", title));
                return Err(err);
            }
        }

        self.day_state.update(date, |state| {
            state.deleted_instances.push(DeletedInstance {
                path: path.clone(),
                instance_id: instance.instance_id.clone(),
                task_id,
                deletion_type: DeletionType::Permanent,
                timestamp: Some(Utc::now()),
            });
        })?;

        self.notifier
            .notify(&format!("「{}」を完全に削除しました", title));
        Ok(())
    }

    /// Hide an instance for this date only (temporary deletion)
    pub fn hide(&mut self, date: NaiveDate, instance_id: &str, today: NaiveDate) -> Result<()> {
        let plan = self.plan(date, today);
        let instance = find_instance(&plan, instance_id)?.clone();

        self.day_state.update(date, |state| {
            state.deleted_instances.push(DeletedInstance {
                path: instance.task.path.clone(),
                instance_id: instance.instance_id.clone(),
                task_id: None,
                deletion_type: DeletionType::Temporary,
                timestamp: Some(Utc::now()),
            });
        })?;

        self.notifier.notify(&format!(
            "「{}」を本日のリストから非表示にしました",
            instance.task.title
        ));
        Ok(())
    }

    // =========================================================================
    // Placement
    // =========================================================================

    /// Move an instance to another slot for this date.
    ///
    /// Running instances cannot move. Routines persist a per-day slot
    /// override; duplicated instances update their replay record.
    pub fn move_slot(
        &mut self,
        date: NaiveDate,
        instance_id: &str,
        slot: SlotKey,
        today: NaiveDate,
    ) -> Result<()> {
        let plan = self.plan(date, today);
        let instance = find_instance(&plan, instance_id)?.clone();

        match instance.state {
            InstanceState::Running => {
                return Err(Error::InstanceRunning(instance_id.to_string()));
            }
            InstanceState::Done => {
                return Err(Error::InvalidArgument(
                    "completed instances keep their recorded slot".to_string(),
                ));
            }
            InstanceState::Idle => {}
        }

        let path = instance.task.path.clone();
        let id = instance_id.to_string();
        let is_duplicate = self
            .day_state
            .get(date)
            .duplicated_instances
            .iter()
            .any(|d| d.instance_id == id);

        if !is_duplicate && !instance.task.is_routine {
            return Err(Error::InvalidArgument(
                "only routine or duplicated instances can change slot".to_string(),
            ));
        }

        self.day_state.update(date, |state| {
            if is_duplicate {
                for dup in &mut state.duplicated_instances {
                    if dup.instance_id == id {
                        dup.slot = slot;
                    }
                }
            } else {
                state.slot_overrides.insert(path.clone(), slot);
            }
            // New slot, new position
            state.orders.remove(&id);
        })?;
        Ok(())
    }

    /// Reposition an idle or running instance directly after another in the
    /// same slot.
    pub fn reorder(
        &mut self,
        date: NaiveDate,
        instance_id: &str,
        after_id: &str,
        today: NaiveDate,
    ) -> Result<()> {
        let mut plan = self.plan(date, today);
        let instance = find_instance(&plan, instance_id)?.clone();
        if instance.state == InstanceState::Done {
            return Err(Error::InvalidArgument(
                "completed instances are ranked by start time".to_string(),
            ));
        }
        let after = find_instance(&plan, after_id)?.clone();
        if after.slot != instance.slot {
            return Err(Error::InvalidArgument(format!(
                "cannot reorder across slots ({} vs {})",
                instance.slot, after.slot
            )));
        }

        let order = sorter::order_for_insert_after(&mut plan.instances, instance.slot, after_id)?;
        if let Some(target) = plan
            .instances
            .iter_mut()
            .find(|i| i.id_matches(instance_id))
        {
            target.order = Some(order);
        }
        self.persist_orders(date, &plan)?;
        Ok(())
    }

    // =========================================================================
    // Comments and boundaries
    // =========================================================================

    /// Execution-log comment for an instance, strictly by id
    pub fn comment(&self, date: NaiveDate, instance_id: Option<&str>) -> Option<String> {
        self.log.comment_for(date, instance_id)
    }

    /// Attach a comment to a completed instance's log entry
    pub fn set_comment(&self, date: NaiveDate, instance_id: &str, comment: &str) -> Result<()> {
        if !self.log.set_comment(date, instance_id, comment)? {
            return Err(Error::InstanceNotFound(instance_id.to_string()));
        }
        Ok(())
    }

    /// Slot-boundary pass: move stale idle instances into the current slot.
    ///
    /// Only applies when viewing today. Routine and replay placements are
    /// persisted; anything else only moves within the returned plan.
    pub fn tick(&mut self, date: NaiveDate, now: NaiveDateTime) -> Result<DayPlan> {
        let mut plan = self.plan(date, now.date());
        let moved =
            boundary::shift_idle_into_current_slot(&mut plan.instances, date, now.date(), now.time());

        if !moved.is_empty() {
            let current = SlotKey::for_time(now.time());
            let routine_paths: Vec<String> = plan
                .instances
                .iter()
                .filter(|i| {
                    i.task.is_routine
                        && i.instance_id
                            .as_deref()
                            .map(|id| moved.iter().any(|m| m == id))
                            .unwrap_or(false)
                })
                .map(|i| i.task.path.clone())
                .collect();

            self.day_state.update(date, |state| {
                for path in routine_paths {
                    state.slot_overrides.insert(path, current);
                }
                for dup in &mut state.duplicated_instances {
                    if moved.contains(&dup.instance_id) {
                        dup.slot = current;
                    }
                }
                for id in &moved {
                    state.orders.remove(id);
                }
            })?;
        }

        sorter::assign_orders(&mut plan.instances);
        sorter::sort_instances(&mut plan.instances);
        Ok(plan)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Persist the day's order numbers so manual placement survives reload
    fn persist_orders(&mut self, date: NaiveDate, plan: &DayPlan) -> Result<()> {
        let orders: Vec<(String, i64)> = plan
            .instances
            .iter()
            .filter_map(|i| match (&i.instance_id, i.order) {
                (Some(id), Some(order)) => Some((id.clone(), order)),
                _ => None,
            })
            .collect();
        self.day_state.update(date, |state: &mut DayState| {
            for (id, order) in orders {
                state.orders.insert(id, order);
            }
        })
    }
}

fn find_instance<'p>(plan: &'p DayPlan, instance_id: &str) -> Result<&'p TaskInstance> {
    plan.instances
        .iter()
        .find(|i| i.id_matches(instance_id))
        .ok_or_else(|| Error::InstanceNotFound(instance_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NullNotifier;
    use tempfile::TempDir;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn engine(temp: &TempDir) -> Engine {
        Engine::init(temp.path().to_path_buf(), Box::new(NullNotifier)).unwrap()
    }

    fn write_note(temp: &TempDir, name: &str, content: &str) {
        std::fs::write(temp.path().join("tasks").join(name), content).unwrap();
    }

    #[test]
    fn open_requires_initialized_vault() {
        let temp = TempDir::new().unwrap();
        let result = Engine::open(temp.path().join("nowhere"), Box::new(NullNotifier));
        assert!(matches!(result, Err(Error::NotAVault(_))));
    }

    #[test]
    fn deleting_a_replay_spares_the_base_instance() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(&temp);
        write_note(&temp, "Errand.md", "---\ntarget_date: 2099-06-18\n---\n");

        let date = d("2099-06-18");
        let plan = engine.plan(date, date);
        let base = plan.instances[0].instance_id.clone().unwrap();
        let replay = engine.duplicate(date, &base, date).unwrap();

        engine.delete(date, &replay, date).unwrap();

        // The base instance and its note both survive an instance-scoped
        // deletion, even with the deletion timestamp on or before the date
        let plan = engine.plan(date, date);
        let ids: Vec<_> = plan
            .instances
            .iter()
            .filter_map(|i| i.instance_id.clone())
            .collect();
        assert_eq!(ids, vec![base]);
        assert!(temp.path().join("tasks/Errand.md").exists());
    }

    #[test]
    fn start_stop_records_duration_and_log_entry() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(&temp);
        write_note(
            &temp,
            "Focus.md",
            "---\nroutine: true\nroutine_type: daily\nscheduled_time: 09:00\n---\n",
        );

        let date = d("2025-06-15");
        let plan = engine.plan(date, date);
        let id = plan.instances[0].instance_id.clone().unwrap();

        let start = date.and_hms_opt(9, 0, 0).unwrap();
        engine.start(date, &id, start).unwrap();

        // Visible as running on reload
        let plan = engine.plan(date, date);
        assert_eq!(plan.instances[0].state, InstanceState::Running);

        let stop = date.and_hms_opt(9, 45, 0).unwrap();
        let entry = engine.stop(date, &id, stop).unwrap();
        assert_eq!(entry.duration_seconds, 45 * 60);
        assert_eq!(entry.instance_id.as_deref(), Some(id.as_str()));

        let plan = engine.plan(date, date);
        assert_eq!(plan.instances[0].state, InstanceState::Done);
    }

    #[test]
    fn starting_second_instance_stops_the_first() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(&temp);
        write_note(&temp, "A.md", "---\nroutine: true\nroutine_type: daily\n---\n");
        write_note(&temp, "B.md", "---\nroutine: true\nroutine_type: daily\n---\n");

        let date = d("2025-06-15");
        let plan = engine.plan(date, date);
        let ids: Vec<String> = plan
            .instances
            .iter()
            .map(|i| i.instance_id.clone().unwrap())
            .collect();

        engine
            .start(date, &ids[0], date.and_hms_opt(9, 0, 0).unwrap())
            .unwrap();
        engine
            .start(date, &ids[1], date.and_hms_opt(9, 30, 0).unwrap())
            .unwrap();

        let plan = engine.plan(date, date);
        let running: Vec<_> = plan
            .instances
            .iter()
            .filter(|i| i.state == InstanceState::Running)
            .collect();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].instance_id.as_deref(), Some(ids[1].as_str()));

        let done: Vec<_> = plan
            .instances
            .iter()
            .filter(|i| i.state == InstanceState::Done)
            .collect();
        assert_eq!(done.len(), 1);
    }

    #[test]
    fn midnight_wrap_never_goes_negative() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(&temp);
        write_note(&temp, "Late.md", "---\nroutine: true\nroutine_type: daily\n---\n");

        let date = d("2025-06-15");
        let plan = engine.plan(date, date);
        let id = plan.instances[0].instance_id.clone().unwrap();

        engine
            .start(date, &id, date.and_hms_opt(23, 30, 0).unwrap())
            .unwrap();
        // Clock shows 00:15 of the same naive day after midnight wrap
        let entry = engine
            .stop(date, &id, date.and_hms_opt(0, 15, 0).unwrap())
            .unwrap();
        assert_eq!(entry.duration_seconds, 45 * 60);
    }

    #[test]
    fn stop_requires_running_record() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(&temp);
        let date = d("2025-06-15");
        let err = engine
            .stop(date, "ghost", date.and_hms_opt(9, 0, 0).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::InstanceNotRunning(_)));
    }

    #[test]
    fn running_instance_cannot_move_slots() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(&temp);
        write_note(&temp, "A.md", "---\nroutine: true\nroutine_type: daily\n---\n");

        let date = d("2025-06-15");
        let plan = engine.plan(date, date);
        let id = plan.instances[0].instance_id.clone().unwrap();
        engine
            .start(date, &id, date.and_hms_opt(9, 0, 0).unwrap())
            .unwrap();

        let err = engine
            .move_slot(date, &id, SlotKey::Evening, date)
            .unwrap_err();
        assert!(matches!(err, Error::InstanceRunning(_)));
    }

    #[test]
    fn routine_move_persists_as_slot_override() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(&temp);
        write_note(
            &temp,
            "A.md",
            "---\nroutine: true\nroutine_type: daily\nscheduled_time: 09:00\n---\n",
        );

        let date = d("2025-06-15");
        let plan = engine.plan(date, date);
        let id = plan.instances[0].instance_id.clone().unwrap();
        engine.move_slot(date, &id, SlotKey::Evening, date).unwrap();

        let plan = engine.plan(date, date);
        assert_eq!(plan.instances[0].slot, SlotKey::Evening);
        // Other days keep the schedule-derived slot
        let other = engine.plan(d("2025-06-16"), d("2025-06-16"));
        assert_eq!(other.instances[0].slot, SlotKey::Morning);
    }
}
