//! Schema artifact parsers
//!
//! Extract structured display artifacts from normalized stage content:
//! - Relational: DDL statements, table names, constraint mentions
//! - Document: JSON blocks, collection names, sample records
//! - Vector: index configuration, index names, embedding samples
//!
//! Parsing never fails. Content without recognizable structure yields
//! [`ParseOutcome::NoStructure`] and callers show the normalized text as is.

use crate::ContentVariant;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

mod document;
mod relational;
mod vector;

pub use document::{DocumentArtifacts, DocumentParser};
pub use relational::{ConstraintKind, ConstraintMention, RelationalArtifacts, RelationalParser};
pub use vector::{ConfigParam, DistanceMetric, EmbeddingBlock, VectorArtifacts, VectorParser};

/// Parser trait for one content variant
///
/// Implement this trait to support another database family.
pub trait SchemaParser: Send + Sync {
    /// Variant handled by this parser
    fn variant(&self) -> ContentVariant;

    /// Extract artifacts from normalized content
    fn parse(&self, content: &str) -> ParseOutcome;
}

/// Raw block counts reported alongside extracted artifacts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCounts {
    /// Fenced code blocks (```) in the content
    pub fenced: usize,
    /// Structured units (statements, JSON blocks, embedding arrays)
    pub structured: usize,
    /// Named entities (tables, collections, indices)
    pub named: usize,
}

/// Typed artifact bag, one shape per variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum SchemaArtifacts {
    /// Relational extraction result
    Relational(RelationalArtifacts),
    /// Document extraction result
    Document(DocumentArtifacts),
    /// Vector extraction result
    Vector(VectorArtifacts),
}

impl SchemaArtifacts {
    /// Variant the artifacts were extracted for
    #[inline]
    #[must_use]
    pub fn variant(&self) -> ContentVariant {
        match self {
            Self::Relational(_) => ContentVariant::Relational,
            Self::Document(_) => ContentVariant::Document,
            Self::Vector(_) => ContentVariant::Vector,
        }
    }

    /// Raw block counts
    #[inline]
    #[must_use]
    pub fn counts(&self) -> BlockCounts {
        match self {
            Self::Relational(a) => a.counts,
            Self::Document(a) => a.counts,
            Self::Vector(a) => a.counts,
        }
    }

    /// Names of tables, collections or indices, in order of appearance
    #[must_use]
    pub fn entity_names(&self) -> &[String] {
        match self {
            Self::Relational(a) => &a.tables,
            Self::Document(a) => &a.collections,
            Self::Vector(a) => &a.indices,
        }
    }
}

/// Result of parsing normalized content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "artifacts", rename_all = "snake_case")]
pub enum ParseOutcome {
    /// At least one artifact was found
    Structured(SchemaArtifacts),
    /// Nothing recognizable; display the text verbatim
    NoStructure,
}

impl ParseOutcome {
    /// Extracted artifacts, if any
    #[inline]
    #[must_use]
    pub fn artifacts(&self) -> Option<&SchemaArtifacts> {
        match self {
            Self::Structured(artifacts) => Some(artifacts),
            Self::NoStructure => None,
        }
    }

    /// Whether any structure was found
    #[inline]
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

/// Get the parser for a variant
#[must_use]
pub fn parser_for(variant: ContentVariant) -> &'static dyn SchemaParser {
    static RELATIONAL: RelationalParser = RelationalParser;
    static DOCUMENT: DocumentParser = DocumentParser;
    static VECTOR: VectorParser = VectorParser;

    match variant {
        ContentVariant::Relational => &RELATIONAL,
        ContentVariant::Document => &DOCUMENT,
        ContentVariant::Vector => &VECTOR,
    }
}

/// Parse content with the parser for `variant`
#[must_use]
pub fn parse(variant: ContentVariant, content: &str) -> ParseOutcome {
    let outcome = parser_for(variant).parse(content);
    tracing::trace!(%variant, structured = outcome.is_structured(), "parsed stage content");
    outcome
}

/// Fenced code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FencedBlock<'a> {
    /// Info string after the opening fence, lowercased
    pub(crate) language: Option<String>,
    /// Block body without the fences
    pub(crate) body: &'a str,
}

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+-]*)[ \t]*\n(.*?)```").expect("fence pattern is valid")
});

/// Collect fenced code blocks in order of appearance
pub(crate) fn fenced_blocks(content: &str) -> Vec<FencedBlock<'_>> {
    FENCE_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let body = caps.get(2)?.as_str();
            let language = caps
                .get(1)
                .map(|m| m.as_str().to_ascii_lowercase())
                .filter(|lang| !lang.is_empty());
            Some(FencedBlock { language, body })
        })
        .collect()
}

/// Append `name` unless already present
pub(crate) fn push_unique(names: &mut Vec<String>, name: &str) {
    let name = name.trim_matches(|c| matches!(c, '`' | '"' | '\'' | '[' | ']'));
    if !name.is_empty() && !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}
