//! `dayrun init` - create the vault layout

use std::path::PathBuf;

use serde::Serialize;

use crate::config::{Config, CONFIG_FILE};
use crate::engine::Engine;
use crate::error::Result;
use crate::notify::NullNotifier;
use crate::output::{emit_success, HumanOutput, OutputOptions};

#[derive(Serialize)]
struct InitData {
    vault: PathBuf,
    created_config: bool,
}

pub fn run(vault: PathBuf, options: OutputOptions) -> Result<()> {
    Engine::init(vault.clone(), Box::new(NullNotifier))?;

    let config_path = vault.join(CONFIG_FILE);
    let created_config = !config_path.exists();
    if created_config {
        crate::lock::write_atomic(&config_path, Config::default_toml()?.as_bytes())?;
    }

    let data = InitData {
        vault: vault.clone(),
        created_config,
    };
    let mut human = HumanOutput::new(format!("Initialized vault at {}", vault.display()));
    human.push_summary("tasks", "tasks/");
    human.push_summary("state", ".dayrun/");
    if created_config {
        human.push_summary("config", CONFIG_FILE);
    }
    emit_success(options, "init", &data, Some(&human))
}
