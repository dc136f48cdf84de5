use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use proxmox_sys::fs::{create_path, replace_file};
use proxmox_worker_task::WorkerTaskContext;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::argv::build_argv;
use crate::process_holder::ProcessHolder;
use crate::runner::RunnerState;
use crate::task::TaskStatus;
use crate::work_item::WorkItem;

/// Combines per-task cancellation (the work item's `shutdown` flag) with process-wide shutdown
/// (the runner's `stopping` flag) behind the `WorkerTaskContext` interface, the same
/// distinction that trait was built to express.
struct SupervisorContext<'a> {
    work_item: &'a WorkItem,
    state: &'a RunnerState,
}

impl WorkerTaskContext for SupervisorContext<'_> {
    fn abort_requested(&self) -> bool {
        self.work_item.shutdown_requested()
    }

    fn shutdown_requested(&self) -> bool {
        self.state.is_stopping()
    }
}

/// Runs one supervisor activation end to end (Preparing → Running → Cleanup) and returns the
/// status that becomes the work item's completion. Never returns an `Err`: every failure path
/// is converted to `TaskStatus::failure` before Cleanup, matching "an exception inside
/// Preparing/Running propagates to the completion handle as a failure."
pub async fn supervise(state: Arc<RunnerState>, work_item: Arc<WorkItem>) -> TaskStatus {
    let task_id = work_item.task_id.clone();
    let attempt = run_attempt(&state, &work_item).await;

    let status = match attempt {
        Ok(status) => status,
        Err(err) => {
            tracing::warn!(task_id = %task_id, error = %format!("{err:#}"), "task attempt failed");
            TaskStatus::failure(task_id.clone())
        }
    };

    cleanup(&state, &work_item).await;
    status
}

async fn run_attempt(state: &Arc<RunnerState>, work_item: &Arc<WorkItem>) -> Result<TaskStatus> {
    let context = SupervisorContext {
        work_item,
        state,
    };
    context.check_abort()?;

    let task_dir = state.task_config.task_dir(&work_item.task_id);
    let attempt_id = uuid::Uuid::new_v4();
    let attempt_dir = task_dir.join(attempt_id.to_string());
    create_path(
        &attempt_dir,
        Some(state.file_opts.clone()),
        Some(state.file_opts.clone()),
    )
    .with_context(|| format!("creating attempt directory {:?}", attempt_dir))?;

    let (primary_port, chat_port) = if state.config.separate_ingestion_endpoint {
        let (p, c) = state.port_allocator.find_two_consecutive_unused_ports()?;
        (p, Some(c))
    } else {
        (state.port_allocator.find_unused_port()?, None)
    };

    let spawned = spawn_child(state, work_item, &task_dir, &attempt_dir, primary_port, chat_port).await;

    let (holder, stdout, stderr) = match spawned {
        Ok(parts) => parts,
        Err(err) => {
            state.port_allocator.mark_port_unused(primary_port);
            if let Some(chat_port) = chat_port {
                state.port_allocator.mark_port_unused(chat_port);
            }
            return Err(err);
        }
    };

    // Second chance: shutdown(id) may have raced us while we were spawning.
    if context.abort_requested() {
        holder.destroy().await;
    }
    work_item.attach_process_holder(holder.clone())?;

    run_child(state, work_item, &holder, stdout, stderr, &attempt_dir).await
}

async fn spawn_child(
    state: &Arc<RunnerState>,
    work_item: &Arc<WorkItem>,
    task_dir: &Path,
    attempt_dir: &Path,
    primary_port: u16,
    chat_port: Option<u16>,
) -> Result<(ProcessHolder, ChildStdout, ChildStderr)> {
    let task_json_path = task_dir.join("task.json");
    if !task_json_path.exists() {
        write_task_json(state, &task_json_path, task_dir, work_item)?;
    }

    let argv = build_argv(
        &state.config,
        &work_item.task,
        &state.properties,
        state.node.host(),
        primary_port,
        chat_port,
        task_dir,
        attempt_dir,
    );

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child: Child = cmd
        .spawn()
        .with_context(|| format!("spawning child for task {}", work_item.task_id))?;

    let stdout = child
        .stdout
        .take()
        .context("child spawned without a piped stdout")?;
    let stderr = child
        .stderr
        .take()
        .context("child spawned without a piped stderr")?;

    let log_file = task_dir.join("log");
    let holder = ProcessHolder::new(child, log_file, primary_port, chat_port);
    Ok((holder, stdout, stderr))
}

fn write_task_json(
    state: &Arc<RunnerState>,
    task_json_path: &Path,
    task_dir: &Path,
    work_item: &Arc<WorkItem>,
) -> Result<()> {
    create_path(
        task_dir,
        Some(state.file_opts.clone()),
        Some(state.file_opts.clone()),
    )
    .with_context(|| format!("creating task directory {:?}", task_dir))?;
    let data = serde_json::to_vec_pretty(&work_item.task)?;
    replace_file(task_json_path, &data, state.file_opts.clone(), false)
        .with_context(|| format!("writing {:?}", task_json_path))?;
    Ok(())
}

async fn run_child(
    state: &Arc<RunnerState>,
    work_item: &Arc<WorkItem>,
    holder: &ProcessHolder,
    stdout: ChildStdout,
    stderr: ChildStderr,
    attempt_dir: &Path,
) -> Result<TaskStatus> {
    if let Err(err) = copy_output_to_log(stdout, stderr, holder.log_file()).await {
        tracing::warn!(
            task_id = %work_item.task_id,
            error = %format!("{err:#}"),
            "error copying child output to log"
        );
    }

    let exit_status = holder.wait().await.context("waiting for child exit")?;

    if let Err(err) = state
        .log_pusher
        .push_task_log(work_item.task_id.clone(), holder.log_file().to_path_buf())
        .await
    {
        tracing::warn!(
            task_id = %work_item.task_id,
            error = %format!("{err:#}"),
            "failed to push task log"
        );
    }

    if !exit_status.success() {
        return Ok(TaskStatus::failure(work_item.task_id.clone()));
    }

    let status_path = attempt_dir.join("status.json");
    match read_status(&status_path) {
        Ok(status) => Ok(status),
        Err(err) => {
            tracing::warn!(
                task_id = %work_item.task_id,
                error = %format!("{err:#}"),
                "child exited 0 but status.json could not be read"
            );
            Ok(TaskStatus::failure(work_item.task_id.clone()))
        }
    }
}

fn read_status(path: &Path) -> Result<TaskStatus> {
    let data = std::fs::read(path).with_context(|| format!("reading {:?}", path))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing {:?}", path))
}

async fn copy_output_to_log(stdout: ChildStdout, stderr: ChildStderr, log_path: &Path) -> Result<()> {
    let out_file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .await
        .with_context(|| format!("opening log file {:?}", log_path))?;
    let err_file = out_file
        .try_clone()
        .await
        .context("cloning log file handle")?;

    let mut stdout = stdout;
    let mut stderr = stderr;
    let mut out_file = out_file;
    let mut err_file = err_file;

    tokio::try_join!(
        tokio::io::copy(&mut stdout, &mut out_file),
        tokio::io::copy(&mut stderr, &mut err_file),
    )
    .context("copying child output")?;
    Ok(())
}

/// Always runs, regardless of how the attempt ended. Removes the work item from the table,
/// destroys any still-attached child (a no-op on a normal exit), returns both reserved ports to
/// the pool, and — unless the runner is process-wide stopping — rewrites the restore store and
/// removes the task directory.
async fn cleanup(state: &Arc<RunnerState>, work_item: &Arc<WorkItem>) {
    let holder = {
        let mut table = state.table.lock().unwrap();
        table.remove(&work_item.task_id);
        work_item.take_process_holder()
    };

    if let Some(holder) = holder {
        holder.destroy().await;
        if let Some(chat_port) = holder.chat_port() {
            state.port_allocator.mark_port_unused(chat_port);
        }
        state.port_allocator.mark_port_unused(holder.port());
    }

    if state.is_stopping() {
        return;
    }

    let remaining_ids: Vec<String> = {
        let table = state.table.lock().unwrap();
        table.keys().cloned().collect()
    };
    state.restore_store.save(&remaining_ids);

    let task_dir = state.task_config.task_dir(&work_item.task_id);
    if let Err(err) = std::fs::remove_dir_all(&task_dir) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                task_id = %work_item.task_id,
                path = %task_dir.display(),
                error = %err,
                "failed to remove task directory during cleanup"
            );
        }
    }
}
