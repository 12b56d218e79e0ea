//! Session orchestrator
//!
//! A session is driven by a single driver task that owns every piece of
//! mutable session state. Generation and reveal run as spawned workers
//! that report back over a channel; every report carries the
//! [`GenerationToken`] it was produced under and is discarded unless that
//! token is still current. Pause, resume and rate changes are forwarded by
//! the driver to the workers through `watch` channels.
//!
//! ```text
//!  SessionHandle ──commands──▶ driver ──watch(token, playing, rate)──▶ workers
//!        ▲                       │ ▲                                    │
//!        └──view / events────────┘ └──────────── stage events ──────────┘
//! ```
//!
//! Each task gets a hard ceiling measured from activation. A task still
//! waiting for content at the ceiling is completed with minimal content and
//! the session moves on. Once content is stored the ceiling is disarmed;
//! the reveal then runs at the caller's pace, pauses included.

use crate::buffer::ContentBuffer;
use crate::config::OrchestratorConfig;
use crate::error::{ConfigError, SessionError};
use crate::events::{
    estimated_remaining, weighted_progress, NoopPresenter, Presenter, SessionEvent, SessionView,
    TaskView,
};
use crate::generation::{
    GenerationOutcome, GenerationPipeline, GenerationRequest, Generator, ReasoningSink, Tier,
};
use crate::persistence::{SessionSnapshot, SessionStore, TaskRecord};
use crate::reveal::{RevealChunk, RevealControl, RevealExit, RevealSimulator};
use crate::token::{GenerationToken, TokenCell};
use crate::types::{
    InsightKind, InsightLogEntry, ReasoningStep, Session, SessionId, SessionStatus, StepId, Task,
    TaskSpec, TaskStatus,
};
use chrono::Utc;
use forge_content::{parser, ContentVariant, ParseOutcome};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What the caller asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// Natural-language request
    pub text: String,
    /// Target database family
    pub variant: ContentVariant,
}

impl SessionRequest {
    /// Create request
    #[must_use]
    pub fn new(text: impl Into<String>, variant: ContentVariant) -> Self {
        Self {
            text: text.into(),
            variant,
        }
    }
}

/// Starts sessions with a shared configuration and collaborators
#[derive(Clone)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    pipeline: GenerationPipeline,
    store: Arc<dyn SessionStore>,
    presenter: Arc<dyn Presenter>,
}

impl Orchestrator {
    /// Create orchestrator
    ///
    /// # Errors
    /// - `ConfigError::Invalid` if the configuration does not validate
    pub fn new(
        config: OrchestratorConfig,
        generator: Arc<dyn Generator>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            pipeline: GenerationPipeline::new(generator, &config),
            config,
            store,
            presenter: Arc::new(NoopPresenter),
        })
    }

    /// With presentation callbacks
    #[inline]
    #[must_use]
    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Start a session over `tasks`
    ///
    /// Must be called from within a Tokio runtime. The first task is
    /// activated before this returns.
    #[must_use]
    pub fn start(&self, request: SessionRequest, tasks: Vec<TaskSpec>) -> SessionHandle {
        let session = Session::new(request.text, request.variant);
        let id = session.id;
        tracing::info!(
            session_id = %id,
            variant = %session.variant,
            tasks = tasks.len(),
            "starting session"
        );

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (stage_tx, stage_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(self.config.event_capacity);
        let (playing, _) = watch::channel(true);
        let (rate, _) = watch::channel(self.config.reveal_rate_cps);

        let tasks: Vec<TaskSlot> = tasks
            .into_iter()
            .enumerate()
            .map(|(ordinal, spec)| TaskSlot::new(Task::from_spec(spec, ordinal)))
            .collect();

        let initial = build_view(&session, &tasks, &[], &[], true, self.config.reveal_rate_cps);
        let mut driver = Driver {
            config: self.config.clone(),
            pipeline: self.pipeline.clone(),
            store: Arc::clone(&self.store),
            presenter: Arc::clone(&self.presenter),
            session,
            tasks,
            reasoning: Vec::new(),
            insights: Vec::new(),
            tokens: TokenCell::new(),
            playing,
            rate,
            cancel: CancellationToken::new(),
            view: watch::channel(initial).0,
            events: events.clone(),
            stage_tx,
            stage_rx,
            commands: command_rx,
            commands_open: true,
        };

        if !driver.tasks.is_empty() {
            driver.activate(0);
        }
        driver.publish();
        let view = driver.view.subscribe();
        let join = tokio::spawn(driver.run());

        SessionHandle {
            id,
            commands: command_tx,
            view,
            events,
            join,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Caller controls sent to the driver
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Play,
    Pause,
    Stop,
    SetRate(u32),
    SetExpanded(StepId, bool),
}

/// Controls and read-only views of a running session
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SessionView>,
    events: broadcast::Sender<SessionEvent>,
    join: JoinHandle<Result<SessionSnapshot, SessionError>>,
}

impl SessionHandle {
    /// Session ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Resume reveal; returns `false` if the session already finished
    pub fn play(&self) -> bool {
        self.send(Command::Play)
    }

    /// Gate reveal; generation in flight continues
    pub fn pause(&self) -> bool {
        self.send(Command::Pause)
    }

    /// Stop the session and save partial results
    pub fn stop(&self) -> bool {
        self.send(Command::Stop)
    }

    /// Change the reveal rate (characters per second, at least 1)
    pub fn set_reveal_rate(&self, chars_per_sec: u32) -> bool {
        self.send(Command::SetRate(chars_per_sec.max(1)))
    }

    /// Expand or collapse a reasoning step
    pub fn set_step_expanded(&self, step: StepId, expanded: bool) -> bool {
        self.send(Command::SetExpanded(step, expanded))
    }

    /// Current view
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// View receiver for change notifications
    #[must_use]
    pub fn watch_view(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Subscribe to session events from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Wait for the session to finish
    ///
    /// # Errors
    /// - `SessionError::Persistence` if saving failed (carries the snapshot)
    /// - `SessionError::Internal` if the driver task died
    pub async fn wait(self) -> Result<SessionSnapshot, SessionError> {
        self.join
            .await
            .map_err(|err| SessionError::Internal(err.to_string()))?
    }

    fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }
}

/// Report from a worker, tagged with its token
#[derive(Debug)]
enum StageEvent {
    Reasoning {
        token: GenerationToken,
        narrative: String,
        confidence: f64,
    },
    Generated {
        token: GenerationToken,
        outcome: GenerationOutcome,
    },
    Revealed(RevealChunk),
    RevealFinished {
        token: GenerationToken,
    },
}

impl StageEvent {
    fn token(&self) -> GenerationToken {
        match self {
            Self::Reasoning { token, .. }
            | Self::Generated { token, .. }
            | Self::RevealFinished { token } => *token,
            Self::Revealed(chunk) => chunk.token,
        }
    }
}

#[derive(Debug)]
struct TaskSlot {
    task: Task,
    buffer: ContentBuffer,
    tier: Option<Tier>,
    artifacts: Option<ParseOutcome>,
    active: Option<Activation>,
}

impl TaskSlot {
    fn new(task: Task) -> Self {
        Self {
            task,
            buffer: ContentBuffer::new(),
            tier: None,
            artifacts: None,
            active: None,
        }
    }
}

#[derive(Debug)]
struct Activation {
    token: GenerationToken,
    cancel: CancellationToken,
    /// Hard ceiling; `None` once content is stored
    deadline: Option<Instant>,
    started: Instant,
}

enum Wake {
    Command(Option<Command>),
    Stage(Option<StageEvent>),
    Deadline,
}

enum TaskEnd {
    Completed,
    Stopped,
}

struct Driver {
    config: OrchestratorConfig,
    pipeline: GenerationPipeline,
    store: Arc<dyn SessionStore>,
    presenter: Arc<dyn Presenter>,
    session: Session,
    tasks: Vec<TaskSlot>,
    reasoning: Vec<ReasoningStep>,
    insights: Vec<InsightLogEntry>,
    tokens: TokenCell,
    playing: watch::Sender<bool>,
    rate: watch::Sender<u32>,
    cancel: CancellationToken,
    view: watch::Sender<SessionView>,
    events: broadcast::Sender<SessionEvent>,
    stage_tx: mpsc::UnboundedSender<StageEvent>,
    stage_rx: mpsc::UnboundedReceiver<StageEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_open: bool,
}

impl Driver {
    async fn run(mut self) -> Result<SessionSnapshot, SessionError> {
        let mut index = 0;
        while index < self.tasks.len() {
            match self.drive_task(index).await {
                TaskEnd::Completed => {
                    self.complete(index);
                    index += 1;
                    if index < self.tasks.len() {
                        self.activate(index);
                        self.publish();
                    }
                }
                TaskEnd::Stopped => {
                    self.interrupt(index);
                    return self.finalize(SessionStatus::Stopped).await;
                }
            }
        }
        self.finalize(SessionStatus::Completed).await
    }

    /// Wait for events of the active task until it ends
    async fn drive_task(&mut self, index: usize) -> TaskEnd {
        loop {
            let Some(deadline) = self.tasks[index].active.as_ref().map(|a| a.deadline) else {
                return TaskEnd::Completed;
            };

            let wake = tokio::select! {
                command = self.commands.recv(), if self.commands_open => Wake::Command(command),
                event = self.stage_rx.recv() => Wake::Stage(event),
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => Wake::Deadline,
            };

            match wake {
                Wake::Command(None) => {
                    tracing::debug!(session_id = %self.session.id, "all handles dropped");
                    self.commands_open = false;
                }
                Wake::Command(Some(Command::Stop)) => return TaskEnd::Stopped,
                Wake::Command(Some(command)) => self.apply_command(command),
                Wake::Stage(Some(event)) => {
                    if self.apply_stage_event(index, event) {
                        return TaskEnd::Completed;
                    }
                }
                Wake::Stage(None) => return TaskEnd::Completed,
                Wake::Deadline => {
                    self.force_complete(index);
                    return TaskEnd::Completed;
                }
            }
        }
    }

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::Play => {
                self.playing.send_replace(true);
                tracing::debug!("reveal resumed");
            }
            Command::Pause => {
                self.playing.send_replace(false);
                tracing::debug!("reveal paused");
            }
            Command::SetRate(rate) => {
                self.rate.send_replace(rate);
                tracing::debug!(rate, "reveal rate changed");
            }
            Command::SetExpanded(id, expanded) => {
                if let Some(step) = self.reasoning.iter_mut().find(|step| step.id == id) {
                    step.expanded = expanded;
                }
            }
            Command::Stop => {}
        }
        self.publish();
    }

    /// Apply a worker report; returns `true` when the task finished
    fn apply_stage_event(&mut self, index: usize, event: StageEvent) -> bool {
        let token = event.token();
        if !self.tokens.is_current(token) {
            tracing::trace!(%token, "discarding stale stage event");
            return false;
        }

        match event {
            StageEvent::Reasoning {
                narrative,
                confidence,
                ..
            } => {
                let step = ReasoningStep::new(self.tasks[index].task.id, narrative, confidence);
                self.reasoning.push(step.clone());
                self.emit(SessionEvent::Reasoning(step));
                self.publish();
                false
            }
            StageEvent::Generated { outcome, .. } => {
                self.store_content(index, outcome);
                self.spawn_reveal(index);
                self.publish();
                false
            }
            StageEvent::Revealed(chunk) => {
                let slot = &mut self.tasks[index];
                if let Err(err) = slot.buffer.append_reveal(&chunk.text, chunk.cursor) {
                    tracing::warn!(task_id = %slot.task.id, error = %err, "reveal chunk rejected");
                    return false;
                }
                slot.task.advance_progress(slot.buffer.progress());
                let event = SessionEvent::TaskProgress {
                    task_id: slot.task.id,
                    progress: slot.task.progress,
                };
                self.emit(event);
                self.publish();
                false
            }
            StageEvent::RevealFinished { .. } => {
                let slot = &self.tasks[index];
                let message = format!("{} revealed", slot.task.title);
                let agent = slot.task.agent.clone();
                self.log_insight(agent, InsightKind::Completed, message);
                true
            }
        }
    }

    fn activate(&mut self, index: usize) {
        let token = self.tokens.activate();
        let cancel = self.cancel.child_token();
        let now = Instant::now();

        let slot = &mut self.tasks[index];
        slot.task.activate();
        slot.active = Some(Activation {
            token,
            cancel: cancel.clone(),
            deadline: Some(now + self.config.task_timeout()),
            started: now,
        });
        let task_id = slot.task.id;
        let agent = slot.task.agent.clone();
        let message = format!("{} started", slot.task.title);
        let request = self.generation_request(index);

        tracing::info!(
            session_id = %self.session.id,
            %task_id,
            ordinal = index,
            %token,
            "task active"
        );
        self.emit(SessionEvent::TaskStarted {
            task_id,
            ordinal: index,
            token,
        });
        self.log_insight(agent, InsightKind::Started, message);

        let pipeline = self.pipeline.clone();
        let tx = self.stage_tx.clone();
        tokio::spawn(async move {
            let sink = {
                let tx = tx.clone();
                ReasoningSink::new(move |narrative, confidence| {
                    let _ = tx.send(StageEvent::Reasoning {
                        token,
                        narrative,
                        confidence,
                    });
                })
            };
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!(%token, "generation cancelled");
                }
                outcome = pipeline.produce(&request, &sink) => {
                    let _ = tx.send(StageEvent::Generated { token, outcome });
                }
            }
        });
    }

    fn spawn_reveal(&mut self, index: usize) {
        let slot = &self.tasks[index];
        let Some(activation) = slot.active.as_ref() else {
            return;
        };
        let ctl = RevealControl::new(
            activation.token,
            self.tokens.reader(),
            self.playing.subscribe(),
            self.rate.subscribe(),
            activation.cancel.clone(),
        );
        let mut simulator = RevealSimulator::new(
            slot.buffer.clean(),
            self.config.tick_interval(),
            self.config.pause_poll_interval(),
        );
        let tx = self.stage_tx.clone();

        tokio::spawn(async move {
            let exit = simulator
                .run(&ctl, |chunk| tx.send(StageEvent::Revealed(chunk)).is_ok())
                .await;
            if exit == RevealExit::Finished {
                let _ = tx.send(StageEvent::RevealFinished { token: ctl.token() });
            }
        });
    }

    fn store_content(&mut self, index: usize, outcome: GenerationOutcome) {
        let summary = outcome.summary();
        let slot = &mut self.tasks[index];
        if let Err(err) = slot.buffer.set_generated(outcome.content, outcome.clean) {
            tracing::warn!(task_id = %slot.task.id, error = %err, "content already stored");
            return;
        }
        slot.tier = Some(outcome.tier);
        if let Some(activation) = slot.active.as_mut() {
            activation.deadline = None;
        }

        let kind = if outcome.tier.is_fallback() {
            InsightKind::Fallback
        } else {
            InsightKind::Completed
        };
        tracing::info!(task_id = %slot.task.id, tier = %outcome.tier, "content ready");
        let agent = slot.task.agent.clone();
        let message = format!("{}: {summary}", slot.task.title);
        self.log_insight(agent, kind, message);
    }

    /// Hard ceiling reached before any content arrived
    fn force_complete(&mut self, index: usize) {
        let outcome = self.pipeline.minimal(&self.generation_request(index));
        self.store_content(index, outcome);

        let slot = &mut self.tasks[index];
        let flushed = slot.buffer.flush_reveal().unwrap_or_default();
        let elapsed = slot
            .active
            .as_ref()
            .map(|a| a.started.elapsed())
            .unwrap_or_default();
        tracing::warn!(
            task_id = %slot.task.id,
            elapsed_ms = elapsed.as_millis() as u64,
            flushed,
            "task reached its time limit"
        );
        let agent = slot.task.agent.clone();
        let message = format!(
            "{} forced to completion after {}ms",
            slot.task.title,
            elapsed.as_millis()
        );
        self.log_insight(agent, InsightKind::Timeout, message);
    }

    fn complete(&mut self, index: usize) {
        self.release(index);
        let variant = self.session.variant;
        let slot = &mut self.tasks[index];
        if slot.buffer.has_content() {
            slot.artifacts = Some(parser::parse(variant, slot.buffer.clean()));
        }
        slot.task.complete();
        let event = SessionEvent::TaskFinished {
            task_id: slot.task.id,
            status: TaskStatus::Completed,
            tier: slot.tier,
        };
        tracing::info!(task_id = %slot.task.id, tier = ?slot.tier, "task completed");
        self.emit(event);
    }

    fn interrupt(&mut self, index: usize) {
        self.release(index);
        let slot = &mut self.tasks[index];
        slot.task.fail();
        let event = SessionEvent::TaskFinished {
            task_id: slot.task.id,
            status: TaskStatus::Error,
            tier: slot.tier,
        };
        let agent = slot.task.agent.clone();
        let message = format!("{} interrupted by stop", slot.task.title);
        tracing::info!(task_id = %slot.task.id, "task interrupted");
        self.emit(event);
        self.log_insight(agent, InsightKind::Stopped, message);
    }

    /// Invalidate the task's token and cancel its workers
    fn release(&mut self, index: usize) {
        self.tokens.invalidate();
        if let Some(activation) = self.tasks[index].active.take() {
            activation.cancel.cancel();
        }
    }

    async fn finalize(mut self, status: SessionStatus) -> Result<SessionSnapshot, SessionError> {
        self.tokens.invalidate();
        self.cancel.cancel();

        self.session.status = status;
        self.session.progress = if self.tasks.is_empty() {
            100.0
        } else {
            self.aggregate_progress()
        };
        self.session.finished_at = Some(Utc::now());

        let snapshot = self.snapshot();
        let result = match self.store.save(&snapshot).await {
            Ok(()) => {
                tracing::info!(session_id = %self.session.id, ?status, "session saved");
                self.presenter.on_complete(self.session.id);
                Ok(snapshot)
            }
            Err(source) => {
                tracing::error!(session_id = %self.session.id, error = %source, "saving session failed");
                self.session.status = SessionStatus::Error;
                let message = format!("saving session failed: {source}");
                self.log_insight("Orchestrator".to_string(), InsightKind::Persistence, message.clone());
                self.presenter.on_error(&message);
                Err(SessionError::Persistence {
                    source,
                    snapshot: Box::new(self.snapshot()),
                })
            }
        };

        self.publish();
        self.emit(SessionEvent::SessionFinished {
            session_id: self.session.id,
            status: self.session.status,
        });
        result
    }

    fn generation_request(&self, index: usize) -> GenerationRequest {
        let task = &self.tasks[index].task;
        GenerationRequest::new(
            self.session.request.clone(),
            self.session.variant,
            task.stage,
            task.title.clone(),
        )
    }

    fn log_insight(&mut self, agent: String, kind: InsightKind, message: String) {
        let entry = InsightLogEntry::new(agent, kind, message);
        self.insights.push(entry.clone());
        self.emit(SessionEvent::Insight(entry));
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn aggregate_progress(&self) -> f64 {
        let tasks: Vec<Task> = self.tasks.iter().map(|slot| slot.task.clone()).collect();
        weighted_progress(&tasks)
    }

    fn publish(&mut self) {
        if !self.session.is_terminal() {
            self.session.progress = self.aggregate_progress();
        }
        let view = build_view(
            &self.session,
            &self.tasks,
            &self.reasoning,
            &self.insights,
            *self.playing.borrow(),
            *self.rate.borrow(),
        );
        self.view.send_replace(view);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.clone(),
            tasks: self
                .tasks
                .iter()
                .map(|slot| TaskRecord {
                    task: slot.task.clone(),
                    clean_content: slot.buffer.clean().to_string(),
                    revealed: slot.buffer.revealed().to_string(),
                    tier: slot.tier,
                    artifacts: slot.artifacts.clone(),
                })
                .collect(),
            reasoning: self.reasoning.clone(),
            insights: self.insights.clone(),
            taken_at: Utc::now(),
        }
    }
}

fn build_view(
    session: &Session,
    slots: &[TaskSlot],
    reasoning: &[ReasoningStep],
    insights: &[InsightLogEntry],
    playing: bool,
    reveal_rate: u32,
) -> SessionView {
    let tasks: Vec<Task> = slots.iter().map(|slot| slot.task.clone()).collect();
    SessionView {
        session: session.clone(),
        estimated_remaining: estimated_remaining(&tasks),
        tasks: slots
            .iter()
            .map(|slot| TaskView {
                task: slot.task.clone(),
                revealed: slot.buffer.revealed().to_string(),
                tier: slot.tier,
            })
            .collect(),
        reasoning: reasoning.to_vec(),
        insights: insights.to_vec(),
        playing,
        reveal_rate,
    }
}
