//! File storage for orchestration state.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/context.json            latest execution context
//! <root>/logs/<YYYY-MM-DD>.log   daily run log
//! <root>/templates/<name>.json   saved templates
//! <root>/run.lock                held while a run is active
//! ```

use chrono::Utc;
use fs2::FileExt;
use sfo_core::journal::{self, JournalLine};
use sfo_core::{plan, ExecutionContext, Id, Mode, Template};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const CONTEXT_FILE: &str = "context.json";
pub const LOGS_DIR: &str = "logs";
pub const TEMPLATES_DIR: &str = "templates";
pub const LOCK_FILE: &str = "run.lock";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("another run holds the lock at {0}")]
    Locked(PathBuf),
    #[error("template already exists: {0}")]
    TemplateExists(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// File-backed storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Open storage at `root`, creating the directory layout.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let storage = Self { root: root.into() };
        for dir in [
            storage.root.clone(),
            storage.logs_dir(),
            storage.templates_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        }
        Ok(storage)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn context_path(&self) -> PathBuf {
        self.root.join(CONTEXT_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Replace the persisted context.
    ///
    /// Written to a sibling temp file and renamed, so readers never see a
    /// partial document.
    pub fn save_context(&self, context: &ExecutionContext) -> Result<()> {
        let path = self.context_path();
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(context)?;
        std::fs::write(&tmp, json).map_err(io_err(&tmp))?;
        std::fs::rename(&tmp, &path).map_err(io_err(&path))?;
        Ok(())
    }

    /// Latest persisted context, if any.
    pub fn load_context(&self) -> Result<Option<ExecutionContext>> {
        let path = self.context_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path)(e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Latest persisted context, only if it belongs to run `id`.
    pub fn load_context_by_id(&self, id: &Id) -> Result<Option<ExecutionContext>> {
        Ok(self.load_context()?.filter(|context| &context.id == id))
    }

    /// Append one line to today's run log.
    pub fn append_log(&self, mode: Mode, message: &str) -> Result<PathBuf> {
        let logs = self.logs_dir();
        journal::append(&logs, &JournalLine::new(Utc::now(), mode, message)).map_err(io_err(&logs))
    }

    /// Persist a new template. Never overwrites an existing one.
    pub fn save_template(&self, template: &Template) -> Result<PathBuf> {
        let path = self.templates_dir().join(format!("{}.json", template.name));
        let json = serde_json::to_string_pretty(template)?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::TemplateExists(template.name.clone()));
            }
            Err(e) => return Err(io_err(&path)(e)),
        };
        file.write_all(json.as_bytes()).map_err(io_err(&path))?;
        debug!(name = %template.name, path = %path.display(), "saved template");
        Ok(path)
    }

    /// Saved templates in file-name order.
    ///
    /// Unreadable or malformed files, and templates whose plan is not a valid
    /// chain, are skipped with a warning.
    pub fn list_templates(&self) -> Result<Vec<Template>> {
        let dir = self.templates_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&dir)(e)),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut templates = Vec::with_capacity(paths.len());
        for path in paths {
            match read_template(&path) {
                Ok(template) => templates.push(template),
                Err(reason) => {
                    warn!(path = %path.display(), reason = %reason, "skipping template");
                }
            }
        }
        Ok(templates)
    }

    /// First template, in file-name order, whose trigger pattern matches `task`.
    pub fn find_template(&self, task: &str) -> Result<Option<Template>> {
        Ok(self
            .list_templates()?
            .into_iter()
            .find(|template| template.matches(task)))
    }

    /// Take the single-writer run lock.
    ///
    /// Advisory lock on `run.lock`. The OS drops it if the process dies; the
    /// file itself is left in place.
    pub fn acquire_lock(&self) -> Result<RunLock> {
        let path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_err(&path))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(RunLock { path, file }),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(StorageError::Locked(path))
            }
            Err(e) => Err(io_err(&path)(e)),
        }
    }
}

fn read_template(path: &Path) -> std::result::Result<Template, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let template: Template = serde_json::from_str(&content).map_err(|e| e.to_string())?;
    plan::validate(&template.plan).map_err(|e| e.to_string())?;
    Ok(template)
}

/// Held run lock. Released when dropped or when the process exits.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sfo_core::plan::compose_names;
    use tempfile::TempDir;

    fn storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("state")).unwrap();
        (dir, storage)
    }

    fn template(task: &str, second: u32) -> Template {
        Template::from_plan(
            task,
            &compose_names(["react-deploy", "code-review"]),
            Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, second).unwrap(),
            100,
            50,
        )
    }

    #[test]
    fn open_creates_layout() {
        let (_dir, storage) = storage();
        assert!(storage.logs_dir().is_dir());
        assert!(storage.templates_dir().is_dir());
    }

    #[test]
    fn context_round_trips() {
        let (_dir, storage) = storage();
        assert!(storage.load_context().unwrap().is_none());

        let mut context = ExecutionContext::new("deploy react app", Mode::Standard);
        context.set_total_steps(2).unwrap();
        context.record_step("n0", "ok").unwrap();
        storage.save_context(&context).unwrap();

        let loaded = storage.load_context().unwrap().unwrap();
        assert_eq!(loaded, context);
        assert!(!storage.context_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn load_by_id_checks_run() {
        let (_dir, storage) = storage();
        let context = ExecutionContext::new("task", Mode::Quick);
        storage.save_context(&context).unwrap();

        assert!(storage.load_context_by_id(&context.id).unwrap().is_some());
        assert!(storage
            .load_context_by_id(&Id::from_string("other"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn append_log_writes_mode_and_message() {
        let (_dir, storage) = storage();
        let path = storage.append_log(Mode::Deep, "Executing skill: lint").unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.trim_end().ends_with("[DEEP] Executing skill: lint"));
    }

    #[test]
    fn templates_never_overwrite() {
        let (_dir, storage) = storage();
        let t = template("deploy react app", 0);
        storage.save_template(&t).unwrap();
        assert!(matches!(
            storage.save_template(&t),
            Err(StorageError::TemplateExists(_))
        ));
    }

    #[test]
    fn find_template_uses_file_name_order() {
        let (_dir, storage) = storage();
        let older = template("deploy react", 1);
        let newer = template("deploy react", 2);
        storage.save_template(&newer).unwrap();
        storage.save_template(&older).unwrap();

        let found = storage.find_template("please DEPLOY REACT now").unwrap().unwrap();
        assert_eq!(found.name, older.name);
        assert!(storage.find_template("write docs").unwrap().is_none());
    }

    #[test]
    fn malformed_templates_are_skipped() {
        let (_dir, storage) = storage();
        std::fs::write(storage.templates_dir().join("auto-0-bad.json"), "{").unwrap();
        let bad_plan = r#"{"name": "auto-0-fwd", "description": "x", "trigger_patterns": ["x"],
            "plan": [{"id": "n0", "skill": "a", "depends": ["n1"]}, {"id": "n1", "skill": "b"}],
            "created_at": "2026-10-16T09:00:00Z"}"#;
        std::fs::write(storage.templates_dir().join("auto-0-fwd.json"), bad_plan).unwrap();
        storage.save_template(&template("x marks", 3)).unwrap();

        let templates = storage.list_templates().unwrap();
        assert_eq!(templates.len(), 1);
        assert!(templates[0].matches("x marks the spot"));
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let (_dir, storage) = storage();
        let lock = storage.acquire_lock().unwrap();
        assert!(lock.path().exists());
        assert!(matches!(
            storage.acquire_lock(),
            Err(StorageError::Locked(_))
        ));
        drop(lock);
        assert!(storage.acquire_lock().is_ok());
    }

    #[test]
    fn leftover_lock_file_does_not_block() {
        let (_dir, storage) = storage();
        // A run killed mid-flight leaves the file behind without holding it.
        std::fs::write(storage.lock_path(), "4242\n").unwrap();
        let lock = storage.acquire_lock().unwrap();
        assert_eq!(lock.path(), storage.lock_path());
    }
}
