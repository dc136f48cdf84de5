use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use futures::future::{BoxFuture, Shared};

use crate::process_holder::ProcessHolder;
use crate::task::{Task, TaskStatus};

/// A promise of the eventual [`TaskStatus`]. Cloning shares the same underlying activation: all
/// clones resolve to the same value, and only the first poll of any clone drives it forward.
pub type Completion = Shared<BoxFuture<'static, TaskStatus>>;

/// The runner's per-task bookkeeping record.
///
/// `shutdown` and `process_holder` are the only mutable fields, and both are only ever written
/// while the runner's table lock is held (see [`crate::runner::ForkingTaskRunner`]). A work
/// item's `process_holder` is installed exactly once, at the moment its child is spawned, and is
/// never replaced afterward.
pub struct WorkItem {
    pub task_id: String,
    pub task: Task,
    pub completion: Completion,
    shutdown: AtomicBool,
    process_holder: Mutex<Option<ProcessHolder>>,
}

impl WorkItem {
    pub fn new(task: Task, completion: Completion) -> Self {
        Self {
            task_id: task.id.clone(),
            task,
            completion,
            shutdown: AtomicBool::new(false),
            process_holder: Mutex::new(None),
        }
    }

    /// `pending` iff no process holder is attached yet.
    pub fn is_pending(&self) -> bool {
        !self.is_running()
    }

    /// `running` iff a process holder is attached.
    pub fn is_running(&self) -> bool {
        self.process_holder.lock().unwrap().is_some()
    }

    pub fn set_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Installs the process holder. Supervisor-internal invariant: must never be called twice
    /// for the same work item.
    pub fn attach_process_holder(&self, holder: ProcessHolder) -> anyhow::Result<()> {
        let mut slot = self.process_holder.lock().unwrap();
        if slot.is_some() {
            anyhow::bail!(
                "invariant violation: process holder already attached for task {}",
                self.task_id
            );
        }
        *slot = Some(holder);
        Ok(())
    }

    /// A cheap clone of the attached process holder, if any, for operations (`destroy`,
    /// `close_stdin`, log streaming) that must not hold this lock across an `.await`.
    pub fn process_holder_snapshot(&self) -> Option<ProcessHolder> {
        self.process_holder.lock().unwrap().clone()
    }

    /// Removes and returns the process holder, if any. Used by Cleanup, which owns release of
    /// whatever resource the holder still carries.
    pub fn take_process_holder(&self) -> Option<ProcessHolder> {
        self.process_holder.lock().unwrap().take()
    }
}
