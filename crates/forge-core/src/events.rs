//! Presentation-facing events, views and callbacks

use crate::generation::Tier;
use crate::token::GenerationToken;
use crate::types::{
    InsightLogEntry, ReasoningStep, Session, SessionId, SessionStatus, Task, TaskId, TaskStatus,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Append-only session event, broadcast to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A task became active
    TaskStarted {
        /// Task ID
        task_id: TaskId,
        /// Position in the session
        ordinal: usize,
        /// Token issued for this activation
        token: GenerationToken,
    },
    /// Reasoning step appended
    Reasoning(ReasoningStep),
    /// Insight log entry appended
    Insight(InsightLogEntry),
    /// Reveal progress of the active task
    TaskProgress {
        /// Task ID
        task_id: TaskId,
        /// Progress, 0-100
        progress: f64,
    },
    /// A task reached a terminal state
    TaskFinished {
        /// Task ID
        task_id: TaskId,
        /// Terminal status
        status: TaskStatus,
        /// Tier that supplied the content, if any was produced
        tier: Option<Tier>,
    },
    /// The session reached a terminal state
    SessionFinished {
        /// Session ID
        session_id: SessionId,
        /// Terminal status
        status: SessionStatus,
    },
}

/// Task with its revealed content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    /// Task state
    pub task: Task,
    /// Revealed prefix of the normalized content
    pub revealed: String,
    /// Tier that supplied the content
    pub tier: Option<Tier>,
}

/// Read-only snapshot of a running session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    /// Session state, including aggregate progress
    pub session: Session,
    /// Tasks in ordinal order
    pub tasks: Vec<TaskView>,
    /// Reasoning steps, in order of arrival
    pub reasoning: Vec<ReasoningStep>,
    /// Insight log
    pub insights: Vec<InsightLogEntry>,
    /// Estimated time left for unfinished tasks
    pub estimated_remaining: Duration,
    /// Whether reveal is playing
    pub playing: bool,
    /// Reveal rate in characters per second
    pub reveal_rate: u32,
}

impl SessionView {
    /// Currently active task
    #[must_use]
    pub fn active_task(&self) -> Option<&TaskView> {
        self.tasks
            .iter()
            .find(|view| view.task.status == TaskStatus::Active)
    }

    /// Number of active tasks
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|view| view.task.status == TaskStatus::Active)
            .count()
    }

    /// Look up a task by ID
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&TaskView> {
        self.tasks.iter().find(|view| view.task.id == id)
    }
}

/// Session progress weighted by estimated task durations, 0-100
///
/// Falls back to the plain mean when every estimate is zero.
#[must_use]
pub fn weighted_progress(tasks: &[Task]) -> f64 {
    if tasks.is_empty() {
        return 0.0;
    }
    let total: f64 = tasks.iter().map(|t| t.estimated_secs).sum();
    if total <= 0.0 {
        return tasks.iter().map(|t| t.progress).sum::<f64>() / tasks.len() as f64;
    }
    tasks
        .iter()
        .map(|t| t.progress * t.estimated_secs)
        .sum::<f64>()
        / total
}

/// Estimated time left: unrevealed share of each unfinished task's estimate
#[must_use]
pub fn estimated_remaining(tasks: &[Task]) -> Duration {
    let secs: f64 = tasks
        .iter()
        .filter(|t| !t.status.is_terminal())
        .map(|t| t.estimated_secs * (1.0 - t.progress / 100.0))
        .sum();
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::ZERO)
}

/// Presentation collaborator
pub trait Presenter: Send + Sync {
    /// Session finalized and saved
    fn on_complete(&self, session_id: SessionId);

    /// Session-level failure
    fn on_error(&self, message: &str);
}

/// Presenter that ignores every callback
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPresenter;

impl Presenter for NoopPresenter {
    fn on_complete(&self, _session_id: SessionId) {}

    fn on_error(&self, _message: &str) {}
}
