//! Instance operations: start, stop, duplicate, delete, hide, move,
//! reorder, comment, tick.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::day_state::date_key;
use crate::engine::Engine;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::slot::SlotKey;

use super::resolve_instance_id;

#[derive(Serialize)]
struct InstanceData {
    date: String,
    instance_id: String,
}

fn instance_data(date: NaiveDate, instance_id: &str) -> InstanceData {
    InstanceData {
        date: date_key(date),
        instance_id: instance_id.to_string(),
    }
}

fn resolve(engine: &mut Engine, date: NaiveDate, today: NaiveDate, needle: &str) -> Result<String> {
    let plan = engine.plan(date, today);
    resolve_instance_id(&plan, needle)
}

pub fn start(
    engine: &mut Engine,
    date: NaiveDate,
    instance: &str,
    now: NaiveDateTime,
    options: OutputOptions,
) -> Result<()> {
    let id = resolve(engine, date, now.date(), instance)?;
    engine.start(date, &id, now)?;
    let human = HumanOutput::new(format!("Started {}", id));
    emit_success(options, "start", &instance_data(date, &id), Some(&human))
}

pub fn stop(
    engine: &mut Engine,
    date: NaiveDate,
    instance: &str,
    now: NaiveDateTime,
    options: OutputOptions,
) -> Result<()> {
    let id = resolve(engine, date, now.date(), instance)?;
    let entry = engine.stop(date, &id, now)?;

    #[derive(Serialize)]
    struct StopData {
        date: String,
        instance_id: String,
        duration_seconds: i64,
    }
    let data = StopData {
        date: date_key(date),
        instance_id: id.clone(),
        duration_seconds: entry.duration_seconds,
    };
    let mut human = HumanOutput::new(format!("Stopped {}", id));
    human.push_summary("duration", format!("{}s", entry.duration_seconds));
    emit_success(options, "stop", &data, Some(&human))
}

pub fn duplicate(
    engine: &mut Engine,
    date: NaiveDate,
    instance: &str,
    today: NaiveDate,
    options: OutputOptions,
) -> Result<()> {
    let id = resolve(engine, date, today, instance)?;
    let new_id = engine.duplicate(date, &id, today)?;

    #[derive(Serialize)]
    struct DuplicateData {
        date: String,
        source_instance_id: String,
        instance_id: String,
    }
    let data = DuplicateData {
        date: date_key(date),
        source_instance_id: id,
        instance_id: new_id.clone(),
    };
    let human = HumanOutput::new(format!("Duplicated as {}", new_id));
    emit_success(options, "duplicate", &data, Some(&human))
}

pub fn delete(
    engine: &mut Engine,
    date: NaiveDate,
    instance: &str,
    today: NaiveDate,
    options: OutputOptions,
) -> Result<()> {
    let id = resolve(engine, date, today, instance)?;
    engine.delete(date, &id, today)?;
    let human = HumanOutput::new(format!("Deleted {}", id));
    emit_success(options, "delete", &instance_data(date, &id), Some(&human))
}

pub fn hide(
    engine: &mut Engine,
    date: NaiveDate,
    instance: &str,
    today: NaiveDate,
    options: OutputOptions,
) -> Result<()> {
    let id = resolve(engine, date, today, instance)?;
    engine.hide(date, &id, today)?;
    let human = HumanOutput::new(format!("Hidden {}", id));
    emit_success(options, "hide", &instance_data(date, &id), Some(&human))
}

pub fn move_slot(
    engine: &mut Engine,
    date: NaiveDate,
    instance: &str,
    slot: SlotKey,
    today: NaiveDate,
    options: OutputOptions,
) -> Result<()> {
    let id = resolve(engine, date, today, instance)?;
    engine.move_slot(date, &id, slot, today)?;
    let human = HumanOutput::new(format!("Moved {} to {}", id, slot));
    emit_success(options, "move", &instance_data(date, &id), Some(&human))
}

pub fn reorder(
    engine: &mut Engine,
    date: NaiveDate,
    instance: &str,
    after: &str,
    today: NaiveDate,
    options: OutputOptions,
) -> Result<()> {
    let id = resolve(engine, date, today, instance)?;
    let after_id = resolve(engine, date, today, after)?;
    engine.reorder(date, &id, &after_id, today)?;
    let human = HumanOutput::new(format!("Placed {} after {}", id, after_id));
    emit_success(options, "reorder", &instance_data(date, &id), Some(&human))
}

pub fn comment(
    engine: &mut Engine,
    date: NaiveDate,
    instance: &str,
    set: Option<&str>,
    today: NaiveDate,
    options: OutputOptions,
) -> Result<()> {
    let id = resolve(engine, date, today, instance)?;

    if let Some(text) = set {
        engine.set_comment(date, &id, text)?;
    }
    let comment = engine.comment(date, Some(&id));

    #[derive(Serialize)]
    struct CommentData {
        date: String,
        instance_id: String,
        comment: Option<String>,
    }
    let data = CommentData {
        date: date_key(date),
        instance_id: id.clone(),
        comment: comment.clone(),
    };
    let mut human = HumanOutput::new(format!("Comment for {}", id));
    human.push_summary("comment", comment.unwrap_or_else(|| "(none)".to_string()));
    emit_success(options, "comment", &data, Some(&human))
}

pub fn tick(
    engine: &mut Engine,
    today: NaiveDate,
    now: NaiveDateTime,
    options: OutputOptions,
) -> Result<()> {
    let plan = engine.tick(today, now)?;
    let next = crate::boundary::next_boundary(now);

    #[derive(Serialize)]
    struct TickData {
        date: String,
        instances: usize,
        next_boundary: String,
    }
    let data = TickData {
        date: date_key(today),
        instances: plan.instances.len(),
        next_boundary: next.format("%Y-%m-%d %H:%M").to_string(),
    };
    let mut human = HumanOutput::new(format!("Boundary pass for {}", date_key(today)));
    human.push_summary("next boundary", data.next_boundary.clone());
    emit_success(options, "tick", &data, Some(&human))
}
