use std::path::{Path, PathBuf};

use proxmox_sys::fs::{create_path, file_get_json, replace_file, CreateOptions};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestoreRecord {
    #[serde(default)]
    running_tasks: Vec<String>,
}

/// The durable list of task ids believed live, at `<baseTaskDir>/restore.json`.
///
/// `save` is atomic (temp-file-then-rename, via [`proxmox_sys::fs::replace_file`]) and never
/// fails the caller: write errors are logged and swallowed, leaving the previous content in
/// place for the next successful write to supersede.
pub struct RestoreStore {
    path: PathBuf,
    file_opts: CreateOptions,
}

impl RestoreStore {
    pub fn new(base_task_dir: &Path, file_opts: CreateOptions) -> Self {
        Self {
            path: base_task_dir.join("restore.json"),
            file_opts,
        }
    }

    /// Reads the current roster. Any decode error (missing file, malformed JSON) is logged and
    /// treated as an empty list rather than failing startup.
    pub fn load(&self) -> Vec<String> {
        let value = match file_get_json(&self.path, Some(json!({ "runningTasks": [] }))) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to read restore store");
                return Vec::new();
            }
        };

        match serde_json::from_value::<RestoreRecord>(value) {
            Ok(record) => record.running_tasks,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "restore store content was malformed");
                Vec::new()
            }
        }
    }

    /// Atomically rewrites the roster. Errors are logged and swallowed.
    pub fn save(&self, ids: &[String]) {
        if let Err(err) = self.try_save(ids) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to persist restore store");
        }
    }

    fn try_save(&self, ids: &[String]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            create_path(parent, Some(self.file_opts.clone()), Some(self.file_opts.clone()))?;
        }
        let record = RestoreRecord {
            running_tasks: ids.to_vec(),
        };
        let data = serde_json::to_vec_pretty(&record)?;
        replace_file(&self.path, &data, self.file_opts.clone(), false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestoreStore::new(dir.path(), CreateOptions::new());
        let ids = vec!["T1".to_string(), "T2".to_string()];
        store.save(&ids);
        assert_eq!(store.load(), ids);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RestoreStore::new(dir.path(), CreateOptions::new());
        assert!(store.load().is_empty());
    }

    #[test]
    fn malformed_file_loads_as_empty_and_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("restore.json"), b"not json").unwrap();
        let store = RestoreStore::new(dir.path(), CreateOptions::new());
        assert!(store.load().is_empty());
    }
}
