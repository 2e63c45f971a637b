//! `dayrun show` - the day's instance list

use chrono::NaiveDate;
use serde::Serialize;

use crate::day_state::date_key;
use crate::engine::Engine;
use crate::error::Result;
use crate::instance::{InstanceState, TaskInstance};
use crate::loader::DayPlan;
use crate::output::{emit_success, HumanOutput, OutputOptions};

#[derive(Serialize)]
struct ShowData<'a> {
    date: String,
    instances: &'a [TaskInstance],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: &'a Vec<String>,
}

pub fn run(
    engine: &mut Engine,
    date: NaiveDate,
    today: NaiveDate,
    options: OutputOptions,
) -> Result<()> {
    let plan = engine.plan(date, today);

    let data = ShowData {
        date: date_key(date),
        instances: &plan.instances,
        warnings: &plan.warnings,
    };
    let human = render(&plan);
    emit_success(options, "show", &data, Some(&human))
}

fn render(plan: &DayPlan) -> HumanOutput {
    let mut human = HumanOutput::new(format!("Tasks for {}", date_key(plan.date)));
    human.push_summary("instances", plan.instances.len().to_string());

    for instance in &plan.instances {
        let id = instance.instance_id.as_deref().unwrap_or("-");
        let short_id = &id[..id.len().min(8)];
        human.push_detail(format!(
            "{} {:<12} {:<6} {}",
            state_marker(instance.state),
            instance.slot,
            short_id,
            instance.task.title,
        ));
    }
    for warning in &plan.warnings {
        human.push_warning(warning.clone());
    }
    human
}

fn state_marker(state: InstanceState) -> &'static str {
    match state {
        InstanceState::Done => "[x]",
        InstanceState::Running => "[>]",
        InstanceState::Idle => "[ ]",
    }
}
