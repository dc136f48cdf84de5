use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Filesystem layout and restart policy for the runner. Implemented by the embedder, which
/// knows where its on-disk state lives.
pub trait TaskConfig: Send + Sync {
    /// Root directory under which every task gets its own subdirectory.
    fn base_task_dir(&self) -> &Path;

    /// Directory holding `task.json`, the combined log, and per-attempt status files for `id`.
    fn task_dir(&self, id: &str) -> PathBuf {
        self.base_task_dir().join(id)
    }

    /// Whether `restore()` should re-submit tasks found in `restore.json` at all.
    fn restore_tasks_on_restart(&self) -> bool;

    /// Upper bound on how long `stop()` waits for children to exit after closing their stdin.
    fn graceful_shutdown_timeout(&self) -> Duration;
}

/// Parameters that shape the child's command line, independent of any one task.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ForkingTaskRunnerConfig {
    pub java_command: String,
    #[serde(default)]
    pub java_opts: String,
    pub classpath: String,
    pub start_port: u16,
    #[serde(default)]
    pub allowed_prefixes: Vec<String>,
    #[serde(default)]
    pub separate_ingestion_endpoint: bool,
    /// Prefix used for the two metric-dimension `-D` properties (`<prefix>dataSource`,
    /// `<prefix>taskId`). Not specified by name in the source; fixed here to a stable value.
    #[serde(default = "default_metric_dimension_prefix")]
    pub metric_dimension_prefix: String,
}

fn default_metric_dimension_prefix() -> String {
    "druid.indexer.task.".to_string()
}

/// Maximum concurrent supervisor activations.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct WorkerConfig {
    pub capacity: usize,
}

/// Process-wide string configuration, scanned for `-D` candidates during argv construction.
pub type Properties = HashMap<String, String>;

/// Identity of the node the runner executes on, used for `druid.host` and the chat-handler host.
pub trait Node: Send + Sync {
    fn host(&self) -> &str;
}

pub struct StaticNode(pub String);

impl Node for StaticNode {
    fn host(&self) -> &str {
        &self.0
    }
}
