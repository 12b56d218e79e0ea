//! Offline generator backed by the template library

use super::templates::{DomainHint, TemplateLibrary};
use super::{GenerationRequest, Generator, ReasoningSink};
use crate::error::GeneratorError;
use async_trait::async_trait;
use std::time::Duration;

/// [`Generator`] that renders stage templates after a simulated delay
///
/// Emits a few reasoning steps and wraps the template in the kind of
/// commentary a language model would add, so the normalizer has work to
/// do. Used by the CLI when no backend is configured.
#[derive(Debug, Clone)]
pub struct TemplateGenerator {
    library: TemplateLibrary,
    latency: Duration,
}

impl TemplateGenerator {
    /// Create generator with the given simulated latency
    #[inline]
    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self {
            library: TemplateLibrary::new(),
            latency,
        }
    }
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self::new(Duration::from_millis(800))
    }
}

#[async_trait]
impl Generator for TemplateGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        reasoning: &ReasoningSink,
    ) -> Result<String, GeneratorError> {
        let domain = DomainHint::classify(&request.request_text);
        let [parent, child, _] = domain.entities();

        reasoning.emit(format!("Request reads as a {} workload", domain.label()), 0.72);
        tokio::time::sleep(self.latency / 2).await;
        reasoning.emit(
            format!(
                "{} centres on {} and {}",
                request.task_title, parent.plural, child.plural
            ),
            0.81,
        );
        tokio::time::sleep(self.latency / 2).await;

        let body = self.library.render(request.stage, request.variant, domain);
        Ok(format!(
            "## Reasoning\nConfidence: 0.81\n\n<thinking>{} for {}</thinking>\n\n{body}",
            request.task_title, request.variant
        ))
    }
}
