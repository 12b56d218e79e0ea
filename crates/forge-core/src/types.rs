//! Core types for SchemaForge
//!
//! Defines the session data model:
//! - Session and its lifecycle status
//! - Tasks (one per production stage) and their status/progress
//! - Reasoning steps and insight log entries

use chrono::{DateTime, Utc};
use forge_content::ContentVariant;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate new identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ulid_id!(
    /// Unique session identifier (ULID for sortability)
    SessionId
);
ulid_id!(
    /// Unique task identifier
    TaskId
);
ulid_id!(
    /// Unique reasoning step identifier
    StepId
);

/// Production stage performed by a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Understand the request: entities, access patterns, volumes
    RequirementsAnalysis,
    /// Logical model: entities, relationships, keys
    SchemaDesign,
    /// Concrete definitions: DDL, collection setup, index config
    Implementation,
    /// Indexing, tuning and review
    Optimization,
}

impl StageKind {
    /// Stages of a full session, in order
    pub const ALL: [StageKind; 4] = [
        Self::RequirementsAnalysis,
        Self::SchemaDesign,
        Self::Implementation,
        Self::Optimization,
    ];

    /// Display title
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::RequirementsAnalysis => "Requirements Analysis",
            Self::SchemaDesign => "Schema Design",
            Self::Implementation => "Implementation",
            Self::Optimization => "Optimization & Review",
        }
    }

    /// Label of the agent persona presenting this stage
    #[must_use]
    pub fn agent(&self) -> &'static str {
        match self {
            Self::RequirementsAnalysis => "Analyst",
            Self::SchemaDesign => "Architect",
            Self::Implementation => "Engineer",
            Self::Optimization => "Optimizer",
        }
    }

    /// Estimated duration in seconds, used to weight session progress
    #[must_use]
    pub fn estimated_secs(&self) -> f64 {
        match self {
            Self::RequirementsAnalysis => 8.0,
            Self::SchemaDesign => 12.0,
            Self::Implementation => 15.0,
            Self::Optimization => 10.0,
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for earlier tasks
    Pending,
    /// Currently generating or revealing
    Active,
    /// Finished (naturally, by fallback, or forced at the timeout ceiling)
    Completed,
    /// Interrupted (session stopped while the task was active)
    Error,
}

impl TaskStatus {
    /// Check if status is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Description of a task before the session starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Display title
    pub title: String,
    /// Agent label
    pub agent: String,
    /// Stage performed
    pub stage: StageKind,
    /// Estimated duration in seconds (progress weight)
    pub estimated_secs: f64,
    /// Optional subtask labels
    pub subtasks: Vec<String>,
}

impl TaskSpec {
    /// Create spec for a stage with its default title, agent and estimate
    #[must_use]
    pub fn for_stage(stage: StageKind) -> Self {
        Self {
            title: stage.title().to_string(),
            agent: stage.agent().to_string(),
            stage,
            estimated_secs: stage.estimated_secs(),
            subtasks: Vec::new(),
        }
    }

    /// With title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// With estimated duration
    #[inline]
    #[must_use]
    pub fn with_estimate(mut self, secs: f64) -> Self {
        self.estimated_secs = finite_estimate(secs);
        self
    }

    /// With subtasks
    #[inline]
    #[must_use]
    pub fn with_subtasks(mut self, subtasks: Vec<String>) -> Self {
        self.subtasks = subtasks;
        self
    }
}

/// The fixed stage list of a schema design session
#[must_use]
pub fn default_stages() -> Vec<TaskSpec> {
    StageKind::ALL.iter().copied().map(TaskSpec::for_stage).collect()
}

/// One ordinal stage of content production
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task ID
    pub id: TaskId,
    /// Display title
    pub title: String,
    /// Agent label
    pub agent: String,
    /// Stage performed
    pub stage: StageKind,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Progress, 0-100
    pub progress: f64,
    /// Position in the session
    pub ordinal: usize,
    /// Estimated duration in seconds
    pub estimated_secs: f64,
    /// Optional subtask labels
    pub subtasks: Vec<String>,
    /// When the task became active
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

/// Estimates must be finite and non-negative; anything else weighs nothing
fn finite_estimate(secs: f64) -> f64 {
    if secs.is_finite() {
        secs.max(0.0)
    } else {
        0.0
    }
}

impl Task {
    /// Create pending task from spec
    #[must_use]
    pub fn from_spec(spec: TaskSpec, ordinal: usize) -> Self {
        Self {
            id: TaskId::new(),
            title: spec.title,
            agent: spec.agent,
            stage: spec.stage,
            status: TaskStatus::Pending,
            progress: 0.0,
            ordinal,
            estimated_secs: finite_estimate(spec.estimated_secs),
            subtasks: spec.subtasks,
            started_at: None,
            finished_at: None,
        }
    }

    /// Mark active
    pub fn activate(&mut self) {
        self.status = TaskStatus::Active;
        self.started_at = Some(Utc::now());
    }

    /// Raise progress; never lowers it while active
    pub fn advance_progress(&mut self, progress: f64) {
        if self.status == TaskStatus::Active {
            self.progress = self.progress.max(progress.clamp(0.0, 100.0));
        }
    }

    /// Mark completed at full progress
    pub fn complete(&mut self) {
        self.progress = 100.0;
        self.status = TaskStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Mark interrupted, keeping the progress reached so far
    pub fn fail(&mut self) {
        self.status = TaskStatus::Error;
        self.finished_at = Some(Utc::now());
    }
}

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Tasks are being produced
    Running,
    /// Every task finished and the session was saved
    Completed,
    /// Stopped by the caller; partial results kept
    Stopped,
    /// Saving failed; in-memory results kept
    Error,
}

impl SessionStatus {
    /// Check if status is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// A schema design session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: SessionId,
    /// Original request text
    pub request: String,
    /// Target database family
    pub variant: ContentVariant,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Aggregate progress, 0-100
    pub progress: f64,
    /// Lifecycle status
    pub status: SessionStatus,
    /// When the session reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create running session
    #[must_use]
    pub fn new(request: impl Into<String>, variant: ContentVariant) -> Self {
        Self {
            id: SessionId::new(),
            request: request.into(),
            variant,
            created_at: Utc::now(),
            progress: 0.0,
            status: SessionStatus::Running,
            finished_at: None,
        }
    }

    /// Check if the session is finished
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Intermediate narrative emitted while a stage is generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// Step ID
    pub id: StepId,
    /// Owning task
    pub task_id: TaskId,
    /// Narrative text
    pub narrative: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    /// Whether the step is shown expanded
    pub expanded: bool,
}

impl ReasoningStep {
    /// Create collapsed step
    #[must_use]
    pub fn new(task_id: TaskId, narrative: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: StepId::new(),
            task_id,
            narrative: narrative.into(),
            confidence: confidence.clamp(0.0, 1.0),
            expanded: false,
        }
    }
}

/// Category of an orchestration event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Task became active
    Started,
    /// Task content produced or fully revealed
    Completed,
    /// A fallback tier supplied the content
    Fallback,
    /// The hard ceiling forced completion
    Timeout,
    /// The session was stopped
    Stopped,
    /// Saving the session failed
    Persistence,
}

/// Audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightLogEntry {
    /// Agent label
    pub agent: String,
    /// Event category
    pub kind: InsightKind,
    /// Human-readable message
    pub message: String,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
}

impl InsightLogEntry {
    /// Create entry stamped now
    #[must_use]
    pub fn new(agent: impl Into<String>, kind: InsightKind, message: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_estimates_are_zeroed() {
        for secs in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN, -3.0] {
            let mut spec = TaskSpec::for_stage(StageKind::SchemaDesign);
            spec.estimated_secs = secs;
            assert_eq!(Task::from_spec(spec, 0).estimated_secs, 0.0);
        }
        let spec = TaskSpec::for_stage(StageKind::SchemaDesign).with_estimate(f64::INFINITY);
        assert_eq!(spec.estimated_secs, 0.0);
        let spec = TaskSpec::for_stage(StageKind::SchemaDesign).with_estimate(7.5);
        assert_eq!(Task::from_spec(spec, 0).estimated_secs, 7.5);
    }

    #[test]
    fn default_stages_are_ordered() {
        let stages = default_stages();
        assert_eq!(stages.len(), 4);
        assert_eq!(stages[0].stage, StageKind::RequirementsAnalysis);
        assert_eq!(stages[3].agent, "Optimizer");
    }

    #[test]
    fn task_progress_is_monotonic_while_active() {
        let mut task = Task::from_spec(TaskSpec::for_stage(StageKind::SchemaDesign), 1);
        task.advance_progress(30.0);
        assert_eq!(task.progress, 0.0, "pending tasks ignore progress");

        task.activate();
        task.advance_progress(30.0);
        task.advance_progress(10.0);
        assert_eq!(task.progress, 30.0);
        task.advance_progress(250.0);
        assert_eq!(task.progress, 100.0);
    }

    #[test]
    fn task_terminal_states() {
        let mut task = Task::from_spec(TaskSpec::for_stage(StageKind::Implementation), 2);
        assert!(!task.status.is_terminal());
        task.activate();
        task.advance_progress(40.0);
        task.fail();
        assert!(task.status.is_terminal());
        assert_eq!(task.progress, 40.0);
        assert!(task.finished_at.is_some());
    }

    #[test]
    fn reasoning_confidence_is_clamped() {
        let step = ReasoningStep::new(TaskId::new(), "weighing keys", 1.7);
        assert_eq!(step.confidence, 1.0);
        assert!(!step.expanded);
    }

    #[test]
    fn session_status_terminality() {
        assert!(!SessionStatus::Running.is_terminal());
        assert!(SessionStatus::Stopped.is_terminal());
        assert!(Session::new("shop", ContentVariant::Relational).status == SessionStatus::Running);
    }
}
