mod support;

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;

use support::TestVault;

fn dayrun(vault: &TestVault) -> Command {
    let mut cmd = support::dayrun_cmd();
    cmd.current_dir(vault.path());
    cmd.arg("--vault").arg(vault.path());
    cmd
}

fn show_json(vault: &TestVault, date: &str) -> Value {
    let output = dayrun(vault)
        .args(["show", date, "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("show json")
}

#[test]
fn init_creates_vault_layout() -> Result<(), Box<dyn std::error::Error>> {
    let vault = TestVault::init()?;

    assert!(vault.path().join("tasks").is_dir());
    assert!(vault.path().join(".dayrun/logs").is_dir());
    assert!(vault.path().join(".dayrun.toml").is_file());

    // Re-running init is a no-op and reports the existing config
    let output = dayrun(&vault)
        .args(["init", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&output)?;
    assert_eq!(value["schema_version"].as_str(), Some("dayrun.v1"));
    assert_eq!(value["status"].as_str(), Some("success"));
    assert_eq!(value["data"]["created_config"].as_bool(), Some(false));

    Ok(())
}

#[test]
fn show_empty_vault_lists_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let vault = TestVault::init()?;

    let value = show_json(&vault, "2025-06-18");
    assert_eq!(value["command"].as_str(), Some("show"));
    assert_eq!(value["data"]["date"].as_str(), Some("2025-06-18"));
    assert_eq!(value["data"]["instances"].as_array().map(Vec::len), Some(0));

    Ok(())
}

#[test]
fn daily_routine_appears_every_day() -> Result<(), Box<dyn std::error::Error>> {
    let vault = TestVault::init()?;
    vault.write_task(
        "Stretch.md",
        "---\nroutine: true\nroutine_type: daily\nscheduled_time: 07:30\n---\n",
    )?;

    for date in ["2025-06-18", "2025-06-19"] {
        let value = show_json(&vault, date);
        let instances = value["data"]["instances"].as_array().expect("instances");
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0]["task"]["title"].as_str(), Some("Stretch"));
        assert_eq!(instances[0]["state"].as_str(), Some("idle"));
        assert_eq!(instances[0]["slot"].as_str(), Some("0:00-8:00"));
    }

    dayrun(&vault)
        .args(["show", "2025-06-18"])
        .assert()
        .success()
        .stdout(contains("Stretch"))
        .stdout(contains("[ ]"));

    Ok(())
}

#[test]
fn weekly_routine_matches_its_weekday() -> Result<(), Box<dyn std::error::Error>> {
    let vault = TestVault::init()?;
    // Weekday 3 is Wednesday; 2025-06-18 is a Wednesday.
    vault.write_task(
        "Review.md",
        "---\nroutine: true\nroutine_type: weekly\nroutine_weekdays: 3\n---\n",
    )?;

    let wednesday = show_json(&vault, "2025-06-18");
    assert_eq!(
        wednesday["data"]["instances"].as_array().map(Vec::len),
        Some(1)
    );

    let thursday = show_json(&vault, "2025-06-19");
    assert_eq!(
        thursday["data"]["instances"].as_array().map(Vec::len),
        Some(0)
    );

    Ok(())
}

#[test]
fn one_off_visible_only_on_target_date() -> Result<(), Box<dyn std::error::Error>> {
    let vault = TestVault::init()?;
    vault.write_task(
        "Errand.md",
        "---\ntarget_date: 2025-06-18\nscheduled_time: 13:00\n---\n",
    )?;

    let on_target = show_json(&vault, "2025-06-18");
    let instances = on_target["data"]["instances"].as_array().expect("instances");
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0]["slot"].as_str(), Some("12:00-16:00"));

    let off_target = show_json(&vault, "2025-06-20");
    assert_eq!(
        off_target["data"]["instances"].as_array().map(Vec::len),
        Some(0)
    );

    Ok(())
}

#[test]
fn show_rejects_malformed_date() -> Result<(), Box<dyn std::error::Error>> {
    let vault = TestVault::init()?;

    dayrun(&vault)
        .args(["show", "last tuesday"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("error:"));

    Ok(())
}

#[test]
fn commands_require_an_initialized_vault() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;

    let mut cmd = support::dayrun_cmd();
    cmd.current_dir(dir.path())
        .arg("--vault")
        .arg(dir.path())
        .arg("show")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("not a dayrun vault"));

    Ok(())
}
