//! The per-day reconciliation pass: combine the execution log, the task
//! catalog, the recurrence evaluator, and the day's overlay into the
//! authoritative instance list for a date.
//!
//! Loading is read-only apart from legacy deletion-entry promotion and is
//! idempotent: two loads of the same date with no intervening mutation
//! produce the same instance ids, slots, states, and orders. Failures from
//! any one source are demoted to warnings so one bad record cannot blank
//! the whole day.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::day_state::DayStateStore;
use crate::exec_log::{ExecutionLog, ExecutionLogEntry};
use crate::instance::{log_fallback_instance_id, InstanceState, TaskInstance};
use crate::sorter;
use crate::vault::{TaskCatalog, TaskDefinition};

/// The reconciled list for one date, plus non-fatal load problems
#[derive(Debug, Clone)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub instances: Vec<TaskInstance>,
    pub warnings: Vec<String>,
}

/// Orchestrates the load order: log entries, then routines and one-offs,
/// then duplicated-instance records.
pub struct TaskLoader<'a> {
    catalog: &'a TaskCatalog,
    log: &'a ExecutionLog,
    day_state: &'a mut DayStateStore,
}

impl<'a> TaskLoader<'a> {
    pub fn new(
        catalog: &'a TaskCatalog,
        log: &'a ExecutionLog,
        day_state: &'a mut DayStateStore,
    ) -> Self {
        Self {
            catalog,
            log,
            day_state,
        }
    }

    /// Build the day's instance list.
    ///
    /// `today` is the real-world current date, consumed only by the
    /// disabled-routine fallback.
    pub fn load(&mut self, date: NaiveDate, today: NaiveDate) -> DayPlan {
        let mut plan = DayPlan {
            date,
            instances: Vec::new(),
            warnings: Vec::new(),
        };
        let mut processed: HashSet<String> = HashSet::new();

        self.load_completed(date, &mut plan, &mut processed);
        self.load_definitions(date, today, &mut plan, &processed);
        self.load_duplicates(date, &mut plan);

        self.apply_saved_orders(date, &mut plan.instances);
        sorter::assign_orders(&mut plan.instances);
        sorter::sort_instances(&mut plan.instances);
        plan
    }

    /// Step 1: one done instance per surviving log entry. A task path
    /// counts as processed only when at least one of its entries
    /// materialized; entries filtered out entirely must not suppress the
    /// normal routine/one-off pass.
    fn load_completed(
        &mut self,
        date: NaiveDate,
        plan: &mut DayPlan,
        processed: &mut HashSet<String>,
    ) {
        for (index, entry) in self.log.entries_for(date).into_iter().enumerate() {
            let instance_id = entry
                .instance_id
                .clone()
                .unwrap_or_else(|| log_fallback_instance_id(&entry.task_path, date, index));

            if self.filtered_out(date, Some(&instance_id), &entry.task_path, entry.task_id.as_deref(), plan) {
                continue;
            }

            plan.instances.push(done_instance(&entry, date, instance_id, self.catalog));
            processed.insert(entry.task_path.clone());
        }
    }

    /// Step 2: routines through the recurrence evaluator, one-offs by
    /// target or creation date.
    fn load_definitions(
        &mut self,
        date: NaiveDate,
        today: NaiveDate,
        plan: &mut DayPlan,
        processed: &HashSet<String>,
    ) {
        for def in self.catalog.scan() {
            if processed.contains(&def.path) {
                continue;
            }

            let visible = if def.is_routine {
                def.routine.is_due(date, today)
            } else {
                match def.target_date {
                    Some(target) => target == date,
                    None => def.created == Some(date),
                }
            };
            if !visible {
                continue;
            }

            let instance = TaskInstance::idle(def, date, crate::slot::SlotKey::None);
            let instance_id = instance.instance_id.clone();
            let task_id = instance.task.task_id.clone();
            if self.filtered_out(
                date,
                instance_id.as_deref(),
                &instance.task.path,
                task_id.as_deref(),
                plan,
            ) {
                continue;
            }

            let mut instance = instance;
            instance.slot = self
                .slot_override(date, &instance.task)
                .unwrap_or_else(|| instance.task.default_slot());
            plan.instances.push(instance);
        }
    }

    /// Step 3: duplicated-instance records not already represented (a
    /// replay completed earlier today is in the log already).
    fn load_duplicates(&mut self, date: NaiveDate, plan: &mut DayPlan) {
        let duplicates = self.day_state.get(date).duplicated_instances.clone();
        for dup in duplicates {
            if plan
                .instances
                .iter()
                .any(|i| i.id_matches(&dup.instance_id))
            {
                continue;
            }

            let def = self
                .catalog
                .find(&dup.original_path)
                .unwrap_or_else(|| {
                    TaskDefinition::virtual_definition(
                        &dup.original_path,
                        &path_stem(&dup.original_path),
                        false,
                    )
                });
            let task_id = def.task_id.clone();
            if self.filtered_out(
                date,
                Some(&dup.instance_id),
                &dup.original_path,
                task_id.as_deref(),
                plan,
            ) {
                continue;
            }

            let mut instance = TaskInstance::idle(def, date, dup.slot);
            instance.instance_id = Some(dup.instance_id.clone());
            plan.instances.push(instance);
        }
    }

    /// Hidden/deleted gate shared by every materialization path. A failed
    /// promotion write is demoted to a warning; the match itself stands.
    fn filtered_out(
        &mut self,
        date: NaiveDate,
        instance_id: Option<&str>,
        path: &str,
        task_id: Option<&str>,
        plan: &mut DayPlan,
    ) -> bool {
        if self.day_state.is_hidden(date, instance_id, path) {
            return true;
        }
        match self.day_state.is_deleted(date, instance_id, path, task_id) {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::warn!(path, %err, "deletion lookup failed during load");
                plan.warnings
                    .push(format!("deletion lookup failed for {}: {}", path, err));
                true
            }
        }
    }

    fn slot_override(
        &mut self,
        date: NaiveDate,
        task: &TaskDefinition,
    ) -> Option<crate::slot::SlotKey> {
        if !task.is_routine {
            return None;
        }
        self.day_state
            .get(date)
            .slot_overrides
            .get(&task.path)
            .copied()
    }

    fn apply_saved_orders(&mut self, date: NaiveDate, instances: &mut [TaskInstance]) {
        let state = self.day_state.get(date);
        for instance in instances {
            if instance.order.is_some() {
                continue;
            }
            if let Some(id) = instance.instance_id.as_deref() {
                instance.order = state.order_of(id);
            }
        }
    }
}

fn done_instance(
    entry: &ExecutionLogEntry,
    date: NaiveDate,
    instance_id: String,
    catalog: &TaskCatalog,
) -> TaskInstance {
    let task = catalog.find(&entry.task_path).unwrap_or_else(|| {
        TaskDefinition::virtual_definition(&entry.task_path, &entry.title, entry.is_routine)
    });
    TaskInstance {
        instance_id: Some(instance_id),
        task,
        state: InstanceState::Done,
        slot: entry.slot,
        order: None,
        date,
        start_time: Some(entry.start_time),
        stop_time: Some(entry.stop_time),
    }
}

fn path_stem(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}
