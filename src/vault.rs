//! Task-note catalog: the vault-facing side of the engine.
//!
//! Task definitions live as markdown notes with flat frontmatter under the
//! tasks directory. This module owns reading that catalog, assigning stable
//! task ids, and the two mutations the engine is allowed to make to notes:
//! writing frontmatter back and deleting a note whose last non-routine
//! instance was permanently removed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::frontmatter::Frontmatter;
use crate::recurrence::Routine;
use crate::slot::SlotKey;
use crate::storage::Storage;

/// Frontmatter key carrying the stable task identity
const TASK_ID_KEY: &str = "task_id";

/// A task definition parsed from a note (or reconstructed without one)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Vault-relative path of the backing note, e.g. `tasks/Stretch.md`
    pub path: String,
    /// Stable identity, independent of renames; absent on never-touched notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub title: String,
    pub is_routine: bool,
    pub routine: Routine,
    /// Default execution time, "HH:MM"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// One-off visibility date for non-routines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    /// Creation date used when `target_date` is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<NaiveDate>,
    /// True when the backing note is gone and this was rebuilt from state
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_virtual: bool,
}

impl TaskDefinition {
    /// Slot a fresh instance of this task defaults into
    pub fn default_slot(&self) -> SlotKey {
        SlotKey::for_scheduled_time(self.scheduled_time.as_deref())
    }

    /// Minimal stand-in for a definition whose note no longer exists.
    ///
    /// Duplicated-instance records and running records can outlive the note
    /// they point at; the engine still has to materialize those instances.
    pub fn virtual_definition(path: &str, title: &str, is_routine: bool) -> TaskDefinition {
        TaskDefinition {
            path: path.to_string(),
            task_id: None,
            title: title.to_string(),
            is_routine,
            routine: Routine::parse(&Frontmatter::default()),
            scheduled_time: None,
            project: None,
            target_date: None,
            created: None,
            is_virtual: true,
        }
    }
}

/// Reader/writer over the tasks directory
#[derive(Debug, Clone)]
pub struct TaskCatalog {
    storage: Storage,
}

impl TaskCatalog {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Read every task note in the vault.
    ///
    /// A missing tasks directory yields an empty catalog; an unreadable note
    /// is logged and skipped so one bad file cannot blank the day.
    pub fn scan(&self) -> Vec<TaskDefinition> {
        let dir = self.storage.tasks_dir();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(dir = %dir.display(), %err, "tasks directory unavailable");
                return Vec::new();
            }
        };

        let mut definitions = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            match self.load(&path) {
                Ok(def) => definitions.push(def),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable task note");
                }
            }
        }
        definitions.sort_by(|a, b| a.path.cmp(&b.path));
        definitions
    }

    /// Load one task note by absolute path
    pub fn load(&self, abs_path: &Path) -> Result<TaskDefinition> {
        let content = fs::read_to_string(abs_path)?;
        let (fm, _) = Frontmatter::parse(&content);

        let rel_path = self.relative_path(abs_path);
        let title = fm
            .get("title")
            .map(str::to_string)
            .unwrap_or_else(|| note_stem(abs_path));

        let created = fm.get_date("created").or_else(|| file_date(abs_path));

        Ok(TaskDefinition {
            path: rel_path,
            task_id: fm.get(TASK_ID_KEY).map(str::to_string),
            title,
            is_routine: fm.get_bool("routine").unwrap_or(false),
            routine: Routine::parse(&fm),
            scheduled_time: fm.get("scheduled_time").map(str::to_string),
            project: fm.get("project").map(str::to_string),
            target_date: fm.get_date("target_date"),
            created,
            is_virtual: false,
        })
    }

    /// Find a definition by vault-relative path
    pub fn find(&self, rel_path: &str) -> Option<TaskDefinition> {
        let abs = self.absolute_path(rel_path);
        if !abs.exists() {
            return None;
        }
        self.load(&abs).ok()
    }

    /// Ensure the definition carries a stable task id, writing it back into
    /// the note's frontmatter on first assignment.
    pub fn ensure_task_id(&self, def: &mut TaskDefinition) -> Result<String> {
        if let Some(id) = &def.task_id {
            return Ok(id.clone());
        }
        let id = Uuid::new_v4().to_string();
        if !def.is_virtual {
            self.set_frontmatter_field(&def.path, TASK_ID_KEY, &id)?;
        }
        def.task_id = Some(id.clone());
        Ok(id)
    }

    /// Rewrite one frontmatter field of a note in place
    pub fn set_frontmatter_field(&self, rel_path: &str, key: &str, value: &str) -> Result<()> {
        let abs = self.absolute_path(rel_path);
        let content = fs::read_to_string(&abs)?;
        let (mut fm, body_offset) = Frontmatter::parse(&content);
        fm.set(key, value);
        let body = if body_offset == 0 { &content } else { &content[body_offset..] };
        crate::lock::write_atomic(&abs, fm.render(body).as_bytes())
    }

    /// Delete a task note. Only the engine's permanent-deletion path calls
    /// this, and only for non-routine tasks with no surviving instances.
    pub fn delete_note(&self, rel_path: &str) -> Result<()> {
        let abs = self.absolute_path(rel_path);
        if !abs.exists() {
            return Err(Error::TaskNotFound(rel_path.to_string()));
        }
        fs::remove_file(&abs)?;
        Ok(())
    }

    /// Absolute filesystem path for a vault-relative task path
    pub fn absolute_path(&self, rel_path: &str) -> PathBuf {
        self.storage.vault_root().join(rel_path)
    }

    fn relative_path(&self, abs_path: &Path) -> String {
        abs_path
            .strip_prefix(self.storage.vault_root())
            .unwrap_or(abs_path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

fn note_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Filesystem creation date of a note, falling back to the modification
/// date on filesystems without birth times.
fn file_date(path: &Path) -> Option<NaiveDate> {
    let meta = fs::metadata(path).ok()?;
    let time = meta.created().or_else(|_| meta.modified()).ok()?;
    let local: DateTime<Local> = time.into();
    Some(local.date_naive())
}
