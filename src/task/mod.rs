//! Asynchronous task lifecycle management
//!
//! The [`TaskStore`] is the single owner of all task state: an in-memory
//! arena keyed by task id. Status transitions are monotonic
//! (Submitted → Working → {Completed | Failed | Cancelled}); once a task is
//! terminal no further mutation is applied. Execution is fire-and-forget
//! from the caller's point of view but supervised here: the spawned routine
//! owns exactly one task id, checks a cooperative cancellation flag, and its
//! late results are discarded by the transition guard if the task was
//! cancelled underneath it.

use crate::capability::CapabilityRegistry;
use crate::observability::metrics::metrics;
use crate::resilience::ResilienceLayer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Submitted,
    Working,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Wire representation ("submitted", "working", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Submitted => "submitted",
            TaskStatus::Working => "working",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// Allowed transition matrix
fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Submitted, Working)
            | (Submitted, Cancelled)
            | (Working, Completed)
            | (Working, Failed)
            | (Working, Cancelled)
    )
}

/// A tracked unit of capability execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Opaque unique token identifying the task
    #[serde(rename = "task_id")]
    pub id: Uuid,
    /// Agent that owns the execution
    pub agent_id: String,
    /// Requested capability
    pub capability: String,
    /// Input payload
    pub input_data: Value,
    pub status: TaskStatus,
    /// Present iff Completed
    pub result: Option<Value>,
    /// Present iff Failed
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct TaskRecord {
    task: Task,
    cancel: Arc<AtomicBool>,
    finished: Option<Instant>,
}

/// Task store errors
#[derive(Debug, Error, PartialEq)]
pub enum TaskError {
    #[error("Task not found: {task_id}")]
    NotFound { task_id: Uuid },
    #[error("Cannot cancel completed task: {task_id} is {status}")]
    AlreadyTerminal { task_id: Uuid, status: String },
    #[error("Invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: Uuid,
        from: String,
        to: String,
    },
}

/// In-memory table of tasks, the sole owner of task state
#[derive(Clone)]
pub struct TaskStore {
    records: Arc<RwLock<HashMap<Uuid, TaskRecord>>>,
    retention: Duration,
}

impl TaskStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    /// Create a task in Submitted state and return its snapshot.
    ///
    /// Capability existence is deliberately not checked here; validation
    /// happens when work starts and an unknown capability fails the task.
    pub fn submit(&self, agent_id: &str, capability: &str, input_data: Value) -> Task {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            agent_id: agent_id.to_string(),
            capability: capability.to_string(),
            input_data,
            status: TaskStatus::Submitted,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        let record = TaskRecord {
            task: task.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
            finished: None,
        };
        self.records.write().unwrap().insert(task.id, record);
        metrics().record_task_submitted();
        info!(task_id = %task.id, capability, "task submitted");
        task
    }

    /// Snapshot of a task by id
    pub fn get(&self, task_id: &Uuid) -> Option<Task> {
        self.records
            .read()
            .unwrap()
            .get(task_id)
            .map(|r| r.task.clone())
    }

    /// Snapshots of all tasks, oldest first
    pub fn list(&self) -> Vec<Task> {
        let records = self.records.read().unwrap();
        let mut tasks: Vec<Task> = records.values().map(|r| r.task.clone()).collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Number of tasks not yet in a terminal state
    pub fn active_count(&self) -> usize {
        self.records
            .read()
            .unwrap()
            .values()
            .filter(|r| !r.task.status.is_terminal())
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Cancel a task. Only Submitted and Working tasks can be cancelled;
    /// terminal tasks are left untouched and an error is returned.
    /// Cancellation is cooperative: in-flight work is not interrupted, its
    /// outcome is discarded by the transition guard instead.
    pub fn cancel(&self, task_id: &Uuid) -> Result<Task, TaskError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(task_id)
            .ok_or(TaskError::NotFound { task_id: *task_id })?;

        if record.task.status.is_terminal() {
            return Err(TaskError::AlreadyTerminal {
                task_id: *task_id,
                status: record.task.status.as_str().to_string(),
            });
        }

        record.cancel.store(true, Ordering::SeqCst);
        apply_transition(record, TaskStatus::Cancelled);
        metrics().record_task_cancelled();
        info!(task_id = %task_id, "task cancelled");
        Ok(record.task.clone())
    }

    /// Whether the cooperative cancellation flag is set
    pub fn is_cancelled(&self, task_id: &Uuid) -> bool {
        self.records
            .read()
            .unwrap()
            .get(task_id)
            .map(|r| r.cancel.load(Ordering::SeqCst))
            .unwrap_or(true)
    }

    /// Transition Submitted → Working
    pub fn mark_working(&self, task_id: &Uuid) -> Result<(), TaskError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(task_id)
            .ok_or(TaskError::NotFound { task_id: *task_id })?;

        if !can_transition(record.task.status, TaskStatus::Working) {
            return Err(TaskError::InvalidTransition {
                task_id: *task_id,
                from: record.task.status.as_str().to_string(),
                to: TaskStatus::Working.as_str().to_string(),
            });
        }
        apply_transition(record, TaskStatus::Working);
        Ok(())
    }

    /// Transition Working → Completed with a result. Returns false when the
    /// guard suppressed the write (task already terminal).
    pub fn complete(&self, task_id: &Uuid, result: Value) -> bool {
        let mut records = self.records.write().unwrap();
        let Some(record) = records.get_mut(task_id) else {
            return false;
        };
        if !can_transition(record.task.status, TaskStatus::Completed) {
            debug!(task_id = %task_id, status = record.task.status.as_str(),
                "discarding completion for non-working task");
            return false;
        }
        record.task.result = Some(result);
        apply_transition(record, TaskStatus::Completed);
        metrics().record_task_completed();
        true
    }

    /// Transition Working → Failed with an error message. Returns false when
    /// the guard suppressed the write.
    pub fn fail(&self, task_id: &Uuid, error_message: String) -> bool {
        let mut records = self.records.write().unwrap();
        let Some(record) = records.get_mut(task_id) else {
            return false;
        };
        if !can_transition(record.task.status, TaskStatus::Failed) {
            debug!(task_id = %task_id, status = record.task.status.as_str(),
                "discarding failure for non-working task");
            return false;
        }
        record.task.error = Some(error_message);
        apply_transition(record, TaskStatus::Failed);
        metrics().record_task_failed();
        true
    }

    /// Evict terminal tasks older than the retention window
    pub fn sweep(&self, now: Instant) {
        let mut records = self.records.write().unwrap();
        let retention = self.retention;
        records.retain(|task_id, record| match record.finished {
            Some(finished) if now.duration_since(finished) > retention => {
                debug!(task_id = %task_id, "evicting expired task");
                false
            }
            _ => true,
        });
    }
}

fn apply_transition(record: &mut TaskRecord, to: TaskStatus) {
    record.task.status = to;
    record.task.updated_at = Utc::now();
    if to.is_terminal() {
        record.finished = Some(Instant::now());
    }
}

/// Schedule background execution of a submitted task
pub fn spawn_execution(
    store: TaskStore,
    registry: Arc<CapabilityRegistry>,
    resilience: Arc<ResilienceLayer>,
    task_id: Uuid,
) {
    tokio::spawn(async move {
        execute_task(store, registry, resilience, task_id).await;
    });
}

/// Background execution routine bound to a single task id.
///
/// Never panics the server: every failure path lands in the task's error
/// field.
pub async fn execute_task(
    store: TaskStore,
    registry: Arc<CapabilityRegistry>,
    resilience: Arc<ResilienceLayer>,
    task_id: Uuid,
) {
    // Cancelled before work started: nothing to do
    if store.is_cancelled(&task_id) {
        return;
    }
    if let Err(e) = store.mark_working(&task_id) {
        debug!(task_id = %task_id, error = %e, "skipping execution");
        return;
    }

    let Some(task) = store.get(&task_id) else {
        return;
    };

    let registry_ref = Arc::clone(&registry);
    let call_capability = task.capability.clone();
    let call_input = task.input_data.clone();
    let outcome = resilience
        .invoke(
            &task.capability,
            &task.capability,
            &task.input_data,
            move || async move { registry_ref.execute(&call_capability, &call_input).await },
        )
        .await;

    match outcome {
        Ok(result) => {
            store.complete(&task_id, result);
            info!(task_id = %task_id, "task completed");
        }
        Err(e) => {
            error!(task_id = %task_id, error = %e, "task failed");
            store.fail(&task_id, e.to_string());
        }
    }
}
