use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::future::FutureExt;
use futures::stream::BoxStream;
use proxmox_sys::fs::CreateOptions;
use tokio::sync::Semaphore;

use crate::collaborators::{LogUtils, TaskLogPusher};
use crate::config::{ForkingTaskRunnerConfig, Node, Properties, TaskConfig, WorkerConfig};
use crate::port_allocator::PortAllocator;
use crate::restore_store::RestoreStore;
use crate::supervisor::supervise;
use crate::task::{Task, TaskStatus};
use crate::work_item::{Completion, WorkItem};

/// State shared between the public [`ForkingTaskRunner`] handle and every in-flight supervisor
/// activation it has spawned. Cheap to clone via `Arc`; never cloned itself.
pub struct RunnerState {
    pub(crate) table: Mutex<HashMap<String, Arc<WorkItem>>>,
    pub(crate) restore_store: RestoreStore,
    pub(crate) port_allocator: PortAllocator,
    pub(crate) task_config: Arc<dyn TaskConfig>,
    pub(crate) config: ForkingTaskRunnerConfig,
    pub(crate) properties: Properties,
    pub(crate) log_pusher: Arc<dyn TaskLogPusher>,
    pub(crate) log_utils: Arc<dyn LogUtils>,
    pub(crate) node: Arc<dyn Node>,
    pub(crate) file_opts: CreateOptions,
    semaphore: Arc<Semaphore>,
    stopping: AtomicBool,
}

impl RunnerState {
    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }
}

/// This runner never participates in autoscaling; `get_scaling_stats` always returns `None`, and
/// this type exists only to give that method a meaningful return type.
pub struct ScalingStats;

/// Public surface of the forking task runner: accepts submissions, bounds parallelism to worker
/// capacity, tracks work items, and drives restore/stop/shutdown/streaming.
///
/// The runner is a singleton per node. Its lifecycle is construct → `start()` (no-op) →
/// interleaved `run`/`shutdown`/`stream_task_log`/query calls → `stop()`. No operation is valid
/// after `stop()` returns.
pub struct ForkingTaskRunner {
    state: Arc<RunnerState>,
}

impl ForkingTaskRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task_config: Arc<dyn TaskConfig>,
        config: ForkingTaskRunnerConfig,
        worker_config: WorkerConfig,
        properties: Properties,
        log_pusher: Arc<dyn TaskLogPusher>,
        log_utils: Arc<dyn LogUtils>,
        node: Arc<dyn Node>,
    ) -> Self {
        let restore_store = RestoreStore::new(task_config.base_task_dir(), CreateOptions::new());
        let port_allocator = PortAllocator::new(config.start_port);

        Self {
            state: Arc::new(RunnerState {
                table: Mutex::new(HashMap::new()),
                restore_store,
                port_allocator,
                task_config,
                config,
                properties,
                log_pusher,
                log_utils,
                node,
                file_opts: CreateOptions::new(),
                semaphore: Arc::new(Semaphore::new(worker_config.capacity.max(1))),
                stopping: AtomicBool::new(false),
            }),
        }
    }

    /// State is lazy; there is nothing to do here.
    pub fn start(&self) {}

    /// Submits `task`. Idempotent: a second `run` for an already-known task id returns the
    /// existing completion rather than spawning a second activation.
    pub fn run(&self, task: Task) -> Completion {
        let mut table = self.state.table.lock().unwrap();
        if let Some(existing) = table.get(&task.id) {
            return existing.completion.clone();
        }

        let task_id = task.id.clone();

        if self.state.is_stopping() {
            tracing::warn!(task_id = %task_id, "run() called after stop(); refusing submission");
            return futures::future::ready(TaskStatus::failure(task_id))
                .boxed()
                .shared();
        }

        let state = self.state.clone();

        // The future that drives this activation needs an `Arc<WorkItem>` to hand to the
        // supervisor, but that same future is what becomes the work item's own `completion`
        // field. `Arc::new_cyclic` breaks the cycle: the closure gets a `Weak` it can upgrade
        // once the work item (and therefore the table entry) actually exists.
        let work_item = Arc::new_cyclic(|weak: &Weak<WorkItem>| {
            let weak = weak.clone();
            let state = state.clone();
            let fallback_id = task_id.clone();
            let future: futures::future::BoxFuture<'static, TaskStatus> = Box::pin(async move {
                let permit = match state.semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return TaskStatus::failure(fallback_id),
                };
                let _permit = permit;
                let work_item = weak
                    .upgrade()
                    .expect("work item stays alive in the table for its own activation's lifetime");
                supervise(state, work_item).await
            });
            WorkItem::new(task, future.shared())
        });

        table.insert(task_id.clone(), work_item.clone());
        drop(table);

        let completion = work_item.completion.clone();
        tokio::spawn(completion.clone());

        let ids: Vec<String> = {
            let table = self.state.table.lock().unwrap();
            table.keys().cloned().collect()
        };
        self.state.restore_store.save(&ids);

        completion
    }

    /// Requests cancellation of a known task. A no-op for unknown ids. If the task has already
    /// spawned a child, the child is destroyed; the supervisor's own Cleanup then runs as usual
    /// from the child's exit.
    pub async fn shutdown(&self, id: &str) {
        let holder = {
            let table = self.state.table.lock().unwrap();
            match table.get(id) {
                Some(work_item) => {
                    work_item.set_shutdown();
                    work_item.process_holder_snapshot()
                }
                None => {
                    tracing::info!(task_id = %id, "shutdown requested for unknown task");
                    return;
                }
            }
        };

        if let Some(holder) = holder {
            holder.destroy().await;
        }
    }

    /// The process-wide graceful shutdown: mark the runner stopping, refuse further
    /// submissions, ask every live child to wind down via stdin EOF, and wait up to
    /// `gracefulShutdownTimeout` for the table to drain.
    pub async fn stop(&self) {
        self.state.stopping.store(true, Ordering::SeqCst);
        self.state.semaphore.close();

        let holders: Vec<_> = {
            let table = self.state.table.lock().unwrap();
            table
                .values()
                .filter_map(|work_item| work_item.process_holder_snapshot())
                .collect()
        };

        for holder in &holders {
            if !holder.close_stdin().await {
                holder.destroy().await;
            }
        }

        let timeout = self.state.task_config.graceful_shutdown_timeout();
        let started = std::time::Instant::now();
        match tokio::time::timeout(timeout, self.wait_for_table_to_drain()).await {
            Ok(()) => {
                tracing::info!(elapsed = ?started.elapsed(), "graceful shutdown completed");
            }
            Err(_) => {
                let remaining: Vec<String> = {
                    let table = self.state.table.lock().unwrap();
                    table.keys().cloned().collect()
                };
                tracing::warn!(
                    still_running = ?remaining,
                    timeout = ?timeout,
                    "graceful shutdown timed out; surviving children were not force-killed"
                );
            }
        }
    }

    async fn wait_for_table_to_drain(&self) {
        loop {
            let empty = self.state.table.lock().unwrap().is_empty();
            if empty {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub fn running_tasks(&self) -> Vec<Arc<WorkItem>> {
        self.state
            .table
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.is_running())
            .cloned()
            .collect()
    }

    pub fn pending_tasks(&self) -> Vec<Arc<WorkItem>> {
        self.state
            .table
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.is_pending())
            .cloned()
            .collect()
    }

    pub fn known_tasks(&self) -> Vec<Arc<WorkItem>> {
        self.state.table.lock().unwrap().values().cloned().collect()
    }

    /// Re-submits every task named in `restore.json` that still has a readable, matching,
    /// restorable `task.json`. Best-effort: one task's failure does not block the others.
    pub async fn restore(&self) -> Vec<(Task, Completion)> {
        if !self.state.task_config.restore_tasks_on_restart() {
            return Vec::new();
        }

        let ids = self.state.restore_store.load();
        let mut restored = Vec::new();
        for id in ids {
            match self.load_task_for_restore(&id) {
                Ok(Some(task)) => {
                    let completion = self.run(task.clone());
                    restored.push((task, completion));
                }
                Ok(None) => {
                    tracing::info!(task_id = %id, "task declined restoration or is missing");
                }
                Err(err) => {
                    tracing::warn!(task_id = %id, error = %format!("{err:#}"), "failed to restore task");
                }
            }
        }
        restored
    }

    fn load_task_for_restore(&self, id: &str) -> Result<Option<Task>> {
        let path = self.state.task_config.task_dir(id).join("task.json");
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("reading {:?}", path)),
        };
        let task: Task =
            serde_json::from_slice(&data).with_context(|| format!("parsing {:?}", path))?;
        if task.id != id {
            anyhow::bail!(
                "task id mismatch: {:?} contains task.json for {}, expected {id}",
                path,
                task.id
            );
        }
        if !task.can_restore {
            return Ok(None);
        }
        Ok(Some(task))
    }

    /// A byte stream over the task's current log file starting at `offset`, if (and only if) a
    /// process holder is currently attached. Negative offsets mean "the last `-offset` bytes".
    pub fn stream_task_log(&self, id: &str, offset: i64) -> Option<BoxStream<'static, std::io::Result<Bytes>>> {
        let table = self.state.table.lock().unwrap();
        let work_item = table.get(id)?;
        let holder = work_item.process_holder_snapshot()?;
        Some(self.state.log_utils.stream_file(holder.log_file(), offset))
    }

    /// This runner does not participate in autoscaling.
    pub fn get_scaling_stats(&self) -> Option<ScalingStats> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FileLogUtils, NoopTaskLogPusher};
    use crate::config::StaticNode;
    use std::os::unix::fs::PermissionsExt;

    struct TestTaskConfig {
        base: std::path::PathBuf,
    }

    impl TaskConfig for TestTaskConfig {
        fn base_task_dir(&self) -> &std::path::Path {
            &self.base
        }

        fn restore_tasks_on_restart(&self) -> bool {
            true
        }

        fn graceful_shutdown_timeout(&self) -> Duration {
            Duration::from_secs(5)
        }
    }

    /// Writes a stub "peon" that stands in for the JVM: it ignores every flag it doesn't
    /// understand, finds the task.json/status.json paths among its argv by suffix, copies the
    /// task's id across, and exits 0. Exercises the same argv/IO contract a real child would.
    fn write_stub_peon(dir: &std::path::Path) -> std::path::PathBuf {
        let script = dir.join("stub-peon.sh");
        std::fs::write(
            &script,
            r#"#!/bin/sh
task_json=""
status_json=""
for a in "$@"; do
  case "$a" in
    *task.json) task_json="$a" ;;
    *status.json) status_json="$a" ;;
  esac
done
id=$(grep -o '"id":"[^"]*"' "$task_json" | head -n1 | cut -d'"' -f4)
printf '{"status":"SUCCESS","id":"%s"}' "$id" > "$status_json"
exit 0
"#,
        )
        .unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        script
    }

    fn test_runner(base: std::path::PathBuf, peon: std::path::PathBuf) -> ForkingTaskRunner {
        let task_config = Arc::new(TestTaskConfig { base });
        let config = ForkingTaskRunnerConfig {
            java_command: peon.to_string_lossy().into_owned(),
            java_opts: String::new(),
            classpath: "unused".to_string(),
            start_port: 18100,
            allowed_prefixes: vec![],
            separate_ingestion_endpoint: false,
            metric_dimension_prefix: "druid.indexer.task.".to_string(),
        };
        ForkingTaskRunner::new(
            task_config,
            config,
            WorkerConfig { capacity: 2 },
            Properties::new(),
            Arc::new(NoopTaskLogPusher),
            Arc::new(FileLogUtils),
            Arc::new(StaticNode("localhost".to_string())),
        )
    }

    fn stub_task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            data_source: "wikipedia".to_string(),
            classpath_prefix: None,
            node_type: None,
            context: HashMap::new(),
            can_restore: true,
        }
    }

    #[tokio::test]
    async fn run_submits_spawns_and_resolves_to_child_reported_status() {
        let dir = tempfile::tempdir().unwrap();
        let peon = write_stub_peon(dir.path());
        let runner = test_runner(dir.path().to_path_buf(), peon);

        let completion = runner.run(stub_task("T1"));
        let status = completion.await;

        assert!(status.is_success());
        assert_eq!(status.id(), "T1");
    }

    #[tokio::test]
    async fn run_is_idempotent_for_an_in_flight_task_id() {
        let dir = tempfile::tempdir().unwrap();
        let peon = write_stub_peon(dir.path());
        let runner = test_runner(dir.path().to_path_buf(), peon);

        let first = runner.run(stub_task("T1"));
        let second = runner.run(stub_task("T1"));
        assert!(first.await.is_success());
        assert!(second.await.is_success());
    }

    #[tokio::test]
    async fn task_directory_is_removed_after_successful_completion() {
        let dir = tempfile::tempdir().unwrap();
        let peon = write_stub_peon(dir.path());
        let runner = test_runner(dir.path().to_path_buf(), peon);

        let completion = runner.run(stub_task("T1"));
        completion.await;

        assert!(!dir.path().join("T1").exists());
    }

    #[tokio::test]
    async fn run_refuses_new_submissions_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let peon = write_stub_peon(dir.path());
        let runner = test_runner(dir.path().to_path_buf(), peon);

        runner.stop().await;
        let status = runner.run(stub_task("T2")).await;
        assert!(!status.is_success());
    }
}
