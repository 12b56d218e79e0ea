//! Tiered content generation
//!
//! Produces the content of one task without ever failing:
//! 1. **Primary**: the external [`Generator`], bounded by a soft timeout
//! 2. **Templated**: on error or timeout, a domain-flavoured stage template
//! 3. **Minimal**: when the chosen content is shorter than the minimum
//!    content policy, a generic template that is never empty
//!
//! The minimum content policy is a single threshold,
//! `min_content_chars`, counted on the trimmed normalized text.

pub mod offline;
pub mod templates;

pub use offline::TemplateGenerator;
pub use templates::{DomainHint, Entity, TemplateLibrary};

use crate::config::OrchestratorConfig;
use crate::error::{GenerationError, GeneratorError};
use crate::types::StageKind;
use async_trait::async_trait;
use forge_content::{ContentVariant, Normalizer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Input handed to a [`Generator`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Original request text of the session
    pub request_text: String,
    /// Target database family
    pub variant: ContentVariant,
    /// Stage being produced
    pub stage: StageKind,
    /// Title of the task
    pub task_title: String,
}

impl GenerationRequest {
    /// Create request
    #[must_use]
    pub fn new(
        request_text: impl Into<String>,
        variant: ContentVariant,
        stage: StageKind,
        task_title: impl Into<String>,
    ) -> Self {
        Self {
            request_text: request_text.into(),
            variant,
            stage,
            task_title: task_title.into(),
        }
    }
}

type ReasoningFn = dyn Fn(String, f64) + Send + Sync;

/// Callback receiving reasoning steps while content is produced
#[derive(Clone)]
pub struct ReasoningSink {
    emit: Arc<ReasoningFn>,
}

impl ReasoningSink {
    /// Create sink from a closure receiving `(narrative, confidence)`
    pub fn new(emit: impl Fn(String, f64) + Send + Sync + 'static) -> Self {
        Self {
            emit: Arc::new(emit),
        }
    }

    /// Sink that drops every step
    #[must_use]
    pub fn discard() -> Self {
        Self::new(|_, _| {})
    }

    /// Append a reasoning step
    pub fn emit(&self, narrative: impl Into<String>, confidence: f64) {
        (self.emit)(narrative.into(), confidence);
    }
}

impl std::fmt::Debug for ReasoningSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningSink").finish_non_exhaustive()
    }
}

/// External content generation contract
///
/// Implementations may call `reasoning` any number of times before
/// returning. Errors are recovered by the pipeline's fallback tiers.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce raw content for one stage
    async fn generate(
        &self,
        request: &GenerationRequest,
        reasoning: &ReasoningSink,
    ) -> Result<String, GeneratorError>;
}

/// Strategy that supplied a task's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// External generator
    Primary,
    /// Domain-flavoured template
    Templated,
    /// Generic minimal template
    Minimal,
}

impl Tier {
    /// Whether a fallback tier was used
    #[inline]
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Self::Primary)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Primary => "primary",
            Self::Templated => "templated",
            Self::Minimal => "minimal",
        })
    }
}

/// Content of one task and how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// Raw content
    pub content: String,
    /// Normalized content
    pub clean: String,
    /// Tier that supplied the content
    pub tier: Tier,
    /// Failures recovered on the way, in order
    pub failures: Vec<GenerationError>,
}

impl GenerationOutcome {
    /// One-line summary for the insight log
    #[must_use]
    pub fn summary(&self) -> String {
        match self.failures.as_slice() {
            [] => format!("produced {} chars", self.clean.chars().count()),
            failures => {
                let causes: Vec<String> = failures.iter().map(ToString::to_string).collect();
                format!("used {} content after: {}", self.tier, causes.join("; "))
            }
        }
    }
}

/// Three-tier generation pipeline
#[derive(Clone)]
pub struct GenerationPipeline {
    generator: Arc<dyn Generator>,
    templates: TemplateLibrary,
    normalizer: Normalizer,
    soft_timeout: Duration,
    min_content_chars: usize,
}

impl GenerationPipeline {
    /// Create pipeline around a generator
    #[must_use]
    pub fn new(generator: Arc<dyn Generator>, config: &OrchestratorConfig) -> Self {
        Self {
            generator,
            templates: TemplateLibrary::new(),
            normalizer: Normalizer::new(config.normalizer),
            soft_timeout: config.generation_soft_timeout(),
            min_content_chars: config.min_content_chars,
        }
    }

    /// Normalizer applied to produced content
    #[inline]
    #[must_use]
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Produce content, falling through the tiers as needed
    pub async fn produce(
        &self,
        request: &GenerationRequest,
        reasoning: &ReasoningSink,
    ) -> GenerationOutcome {
        let mut failures = Vec::new();

        let primary = tokio::time::timeout(
            self.soft_timeout,
            self.generator.generate(request, reasoning),
        )
        .await;

        let (content, tier) = match primary {
            Ok(Ok(content)) => (content, Tier::Primary),
            Ok(Err(err)) => {
                tracing::warn!(
                    stage = ?request.stage,
                    retryable = err.is_retryable(),
                    error = %err,
                    "generator failed, using templated content"
                );
                failures.push(GenerationError::Failure(err));
                (self.templates.templated(request), Tier::Templated)
            }
            Err(_) => {
                tracing::warn!(
                    stage = ?request.stage,
                    soft_timeout_ms = self.soft_timeout.as_millis() as u64,
                    "generator exceeded soft timeout, using templated content"
                );
                failures.push(GenerationError::Timeout {
                    after: self.soft_timeout,
                });
                (self.templates.templated(request), Tier::Templated)
            }
        };

        let clean = self.normalizer.normalize(&content);
        let len = clean.trim().chars().count();
        if len < self.min_content_chars {
            tracing::warn!(
                stage = ?request.stage,
                tier = %tier,
                len,
                min = self.min_content_chars,
                "content below minimum, using minimal template"
            );
            failures.push(GenerationError::ContentTooShort {
                len,
                min: self.min_content_chars,
            });
            return self.minimal_with(request, failures);
        }

        tracing::debug!(stage = ?request.stage, tier = %tier, len, "content produced");
        GenerationOutcome {
            content,
            clean,
            tier,
            failures,
        }
    }

    /// Tier 3 content, used directly when a task is forced at its ceiling
    #[must_use]
    pub fn minimal(&self, request: &GenerationRequest) -> GenerationOutcome {
        self.minimal_with(request, Vec::new())
    }

    fn minimal_with(
        &self,
        request: &GenerationRequest,
        failures: Vec<GenerationError>,
    ) -> GenerationOutcome {
        let content = self.templates.minimal(request);
        let clean = self.normalizer.normalize(&content);
        GenerationOutcome {
            content,
            clean,
            tier: Tier::Minimal,
            failures,
        }
    }
}

impl std::fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationPipeline")
            .field("soft_timeout", &self.soft_timeout)
            .field("min_content_chars", &self.min_content_chars)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Fixed(Result<String, GeneratorError>);

    #[async_trait]
    impl Generator for Fixed {
        async fn generate(
            &self,
            _request: &GenerationRequest,
            reasoning: &ReasoningSink,
        ) -> Result<String, GeneratorError> {
            reasoning.emit("drafting tables", 0.7);
            self.0.clone()
        }
    }

    struct Hang;

    #[async_trait]
    impl Generator for Hang {
        async fn generate(
            &self,
            _request: &GenerationRequest,
            _reasoning: &ReasoningSink,
        ) -> Result<String, GeneratorError> {
            std::future::pending().await
        }
    }

    fn pipeline(generator: impl Generator + 'static) -> GenerationPipeline {
        GenerationPipeline::new(Arc::new(generator), &OrchestratorConfig::default())
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new(
            "An online shop with orders",
            ContentVariant::Relational,
            StageKind::Implementation,
            "Implementation",
        )
    }

    #[tokio::test]
    async fn primary_content_is_normalized() {
        let body = "CREATE TABLE orders (id BIGSERIAL PRIMARY KEY, total NUMERIC NOT NULL CHECK (total >= 0));";
        let raw = format!("## Reasoning\nConfidence: 0.9\n\n{body}");
        let steps = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let steps = Arc::clone(&steps);
            ReasoningSink::new(move |narrative, confidence| steps.lock().push((narrative, confidence)))
        };

        let outcome = pipeline(Fixed(Ok(raw.clone()))).produce(&request(), &sink).await;

        assert_eq!(outcome.tier, Tier::Primary);
        assert_eq!(outcome.content, raw);
        assert_eq!(outcome.clean, body);
        assert!(outcome.failures.is_empty());
        assert_eq!(steps.lock().as_slice(), &[("drafting tables".to_string(), 0.7)]);
    }

    #[tokio::test]
    async fn failure_falls_back_to_template() {
        let outcome = pipeline(Fixed(Err(GeneratorError::Backend("quota".into()))))
            .produce(&request(), &ReasoningSink::discard())
            .await;

        assert_eq!(outcome.tier, Tier::Templated);
        assert!(outcome.clean.contains("CREATE TABLE customers"));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].label(), "failure");
        assert!(outcome.summary().contains("quota"));
    }

    #[tokio::test]
    async fn short_content_uses_minimal_template() {
        let outcome = pipeline(Fixed(Ok("ok".into())))
            .produce(&request(), &ReasoningSink::discard())
            .await;

        assert_eq!(outcome.tier, Tier::Minimal);
        assert!(outcome.clean.chars().count() >= 80);
        assert_eq!(
            outcome.failures,
            vec![GenerationError::ContentTooShort { len: 2, min: 80 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn soft_timeout_falls_back_to_template() {
        let outcome = pipeline(Hang)
            .produce(&request(), &ReasoningSink::discard())
            .await;

        assert_eq!(outcome.tier, Tier::Templated);
        assert_eq!(
            outcome.failures,
            vec![GenerationError::Timeout {
                after: Duration::from_secs(20)
            }]
        );
    }

    #[test]
    fn minimal_has_no_failures() {
        let outcome = pipeline(Hang).minimal(&request());
        assert_eq!(outcome.tier, Tier::Minimal);
        assert!(outcome.failures.is_empty());
        assert!(outcome.tier.is_fallback());
        assert!(!outcome.clean.is_empty());
    }
}
