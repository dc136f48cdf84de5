//! Supervises heterogeneous ingestion tasks as isolated child worker processes.
//!
//! A task is submitted through [`runner::ForkingTaskRunner::run`], which spawns it as a child
//! process bounded by a fixed worker-slot pool, captures its combined stdout/stderr to a log
//! file, persists enough state to restart the submission set after a crash, and exposes a live
//! view of what is running, pending, or known.

mod argv;
mod collaborators;
mod config;
mod port_allocator;
mod process_holder;
mod restore_store;
mod runner;
mod supervisor;
mod task;
mod tokenizer;
mod work_item;

pub use collaborators::{FileLogUtils, LogUtils, NoopTaskLogPusher, TaskLogPusher};
pub use config::{ForkingTaskRunnerConfig, Node, Properties, StaticNode, TaskConfig, WorkerConfig};
pub use port_allocator::PortAllocator;
pub use process_holder::ProcessHolder;
pub use restore_store::RestoreStore;
pub use runner::{ForkingTaskRunner, ScalingStats};
pub use task::{Task, TaskStatus};
pub use tokenizer::tokenize;
pub use work_item::{Completion, WorkItem};
