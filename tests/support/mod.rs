use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// An initialized dayrun vault in a temporary directory.
pub struct TestVault {
    dir: TempDir,
}

impl TestVault {
    pub fn init() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let vault = Self { dir };
        let mut cmd = dayrun_cmd();
        cmd.current_dir(vault.path())
            .arg("--vault")
            .arg(vault.path())
            .arg("init")
            .assert()
            .success();
        Ok(vault)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a task note under `tasks/`.
    pub fn write_task(&self, name: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join("tasks").join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn task_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("tasks").join(name)
    }

    pub fn state_path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(".dayrun").join(rel)
    }

    pub fn read_state(&self, rel: &str) -> std::io::Result<String> {
        fs::read_to_string(self.state_path(rel))
    }
}

pub fn dayrun_cmd() -> Command {
    Command::cargo_bin("dayrun").expect("dayrun binary under test")
}
