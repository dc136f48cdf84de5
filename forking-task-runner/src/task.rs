use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A unit of ingestion work handed to the runner. The runner treats everything here opaquely
/// apart from the fields it needs to build a child's argv and its own bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub data_source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classpath_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Opaque string-keyed context. `druid.indexer.runner.javaOpts` and
    /// `druid.indexer.fork.property.*` keys are read by the supervisor; everything else passes
    /// through untouched.
    #[serde(default)]
    pub context: HashMap<String, Value>,
    #[serde(default)]
    pub can_restore: bool,
}

/// The child's self-reported outcome, or a synthesized failure if the child never reported one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Success {
        id: String,
        #[serde(flatten)]
        extra: serde_json::Map<String, Value>,
    },
    Failure {
        id: String,
    },
}

impl TaskStatus {
    pub fn failure(id: impl Into<String>) -> Self {
        TaskStatus::Failure { id: id.into() }
    }

    pub fn id(&self) -> &str {
        match self {
            TaskStatus::Success { id, .. } => id,
            TaskStatus::Failure { id } => id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success { .. })
    }
}
