//! Testing utilities for SchemaForge workspace
//!
//! Scripted collaborators and fixtures shared by integration tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use forge_core::{
    GenerationRequest, Generator, GeneratorError, OrchestratorConfig, PersistenceError,
    Presenter, ReasoningSink, SessionId, SessionSnapshot, SessionStore, StageKind, TaskSpec,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// What a scripted stage answers with
#[derive(Debug, Clone)]
pub enum Reply {
    Content(String),
    Fail(GeneratorError),
    /// Never resolves
    Hang,
}

#[derive(Debug, Clone)]
struct Script {
    reply: Reply,
    delay: Duration,
    reasoning: Vec<(String, f64)>,
}

impl Script {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            reasoning: Vec::new(),
        }
    }
}

/// Generator answering per stage from a script
#[derive(Debug)]
pub struct ScriptedGenerator {
    default: Script,
    stages: HashMap<StageKind, Script>,
    calls: Mutex<Vec<StageKind>>,
}

impl ScriptedGenerator {
    pub fn new(default: Reply) -> Self {
        Self {
            default: Script::new(default),
            stages: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every stage returns `content` immediately
    pub fn returning(content: impl Into<String>) -> Self {
        Self::new(Reply::Content(content.into()))
    }

    #[must_use]
    pub fn with_stage(mut self, stage: StageKind, reply: Reply) -> Self {
        self.script_mut(stage).reply = reply;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, stage: StageKind, delay: Duration) -> Self {
        self.script_mut(stage).delay = delay;
        self
    }

    #[must_use]
    pub fn with_reasoning(
        mut self,
        stage: StageKind,
        narrative: impl Into<String>,
        confidence: f64,
    ) -> Self {
        self.script_mut(stage)
            .reasoning
            .push((narrative.into(), confidence));
        self
    }

    /// Stages requested so far, in call order
    pub fn calls(&self) -> Vec<StageKind> {
        self.calls.lock().clone()
    }

    fn script_mut(&mut self, stage: StageKind) -> &mut Script {
        let default = self.default.clone();
        self.stages.entry(stage).or_insert(default)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        reasoning: &ReasoningSink,
    ) -> Result<String, GeneratorError> {
        self.calls.lock().push(request.stage);
        let script = self
            .stages
            .get(&request.stage)
            .unwrap_or(&self.default)
            .clone();

        for (narrative, confidence) in script.reasoning {
            reasoning.emit(narrative, confidence);
        }
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        match script.reply {
            Reply::Content(content) => Ok(content),
            Reply::Fail(err) => Err(err),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Presenter recording every callback
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    completed: Mutex<Vec<SessionId>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> Vec<SessionId> {
        self.completed.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl Presenter for RecordingPresenter {
    fn on_complete(&self, session_id: SessionId) {
        self.completed.lock().push(session_id);
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}

/// Store whose saves always fail
#[derive(Debug, Default)]
pub struct FailingStore {
    attempts: Mutex<usize>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl SessionStore for FailingStore {
    async fn save(&self, _snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        *self.attempts.lock() += 1;
        Err(PersistenceError::Backend("disk full".to_string()))
    }
}

/// Schema-like text of exactly `len` chars that normalization leaves intact
pub fn content_of_len(len: usize) -> String {
    const LINE: &str = "CREATE TABLE items (id BIGINT PRIMARY KEY);";
    let mut text = String::new();
    while text.chars().count() < len {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(LINE);
    }
    let mut chars: Vec<char> = text.chars().take(len).collect();
    if let Some(last) = chars.last_mut() {
        if last.is_whitespace() {
            *last = ';';
        }
    }
    chars.into_iter().collect()
}

/// `n` task specs cycling through the stage kinds
pub fn stages(n: usize) -> Vec<TaskSpec> {
    StageKind::ALL
        .iter()
        .copied()
        .cycle()
        .take(n)
        .map(TaskSpec::for_stage)
        .collect()
}

/// Default timings: 40 chars/s, 50 ms ticks, 30 s ceiling, 20 s soft timeout
pub fn config() -> OrchestratorConfig {
    OrchestratorConfig::default()
}
