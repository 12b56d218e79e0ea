//! Forge Core - stage orchestration for schema design sessions
//!
//! Drives a fixed list of stages, one at a time:
//! - Generates each stage's content through a tiered pipeline that never fails
//! - Reveals produced content at a controllable rate (pause, resume, rate)
//! - Bounds every stage with a hard time limit so sessions always finish
//! - Hands the final session to a persistence collaborator
//!
//! # Example
//!
//! ```rust,no_run
//! use forge_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(
//!     OrchestratorConfig::new().with_reveal_rate(120),
//!     Arc::new(TemplateGenerator::default()),
//!     Arc::new(MemoryStore::new()),
//! )?;
//!
//! let handle = orchestrator.start(
//!     SessionRequest::new("Online bookstore with reviews", ContentVariant::Relational),
//!     default_stages(),
//! );
//! let snapshot = handle.wait().await?;
//! println!("{} tasks finished", snapshot.tasks.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod events;
pub mod generation;
pub mod orchestrator;
pub mod persistence;
pub mod reveal;
pub mod token;
pub mod types;

pub use buffer::ContentBuffer;
pub use config::OrchestratorConfig;
pub use error::{
    BufferError, ConfigError, GenerationError, GeneratorError, PersistenceError, SessionError,
};
pub use events::{NoopPresenter, Presenter, SessionEvent, SessionView, TaskView};
pub use generation::{
    DomainHint, GenerationOutcome, GenerationPipeline, GenerationRequest, Generator,
    ReasoningSink, TemplateGenerator, TemplateLibrary, Tier,
};
pub use orchestrator::{Orchestrator, SessionHandle, SessionRequest};
pub use persistence::{JsonFileStore, MemoryStore, SessionSnapshot, SessionStore, TaskRecord};
pub use reveal::{chars_per_tick, RevealChunk, RevealControl, RevealExit, RevealSimulator};
pub use token::{CurrentToken, GenerationToken, TokenCell, TokenIssuer};
pub use types::{
    default_stages, InsightKind, InsightLogEntry, ReasoningStep, Session, SessionId,
    SessionStatus, StageKind, StepId, Task, TaskId, TaskSpec, TaskStatus,
};

pub use forge_content::{ContentVariant, ParseOutcome};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running sessions
    pub use crate::{
        default_stages, ContentVariant, Generator, MemoryStore, Orchestrator,
        OrchestratorConfig, Presenter, SessionEvent, SessionHandle, SessionRequest,
        SessionStore, TaskSpec, TemplateGenerator,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
