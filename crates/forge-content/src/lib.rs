//! Forge Content - text cleanup and schema artifact extraction
//!
//! Pure, synchronous building blocks used after a stage has produced text:
//! - [`normalize`]: strips meta-commentary (thinking blocks, banners,
//!   labelled metadata lines, decorative symbols) from generated content
//! - [`parser`]: extracts statements, named entities and configuration
//!   values, polymorphic over the three [`ContentVariant`]s
//!
//! # Example
//!
//! ```rust
//! use forge_content::{normalize, parser, ContentVariant, ParseOutcome};
//!
//! let raw = "## Reasoning\nConfidence: 0.9\n\nCREATE TABLE users (id SERIAL PRIMARY KEY);";
//! let clean = normalize::normalize(raw);
//! assert_eq!(clean, "CREATE TABLE users (id SERIAL PRIMARY KEY);");
//!
//! let outcome = parser::parse(ContentVariant::Relational, &clean);
//! assert!(matches!(outcome, ParseOutcome::Structured(_)));
//! ```

#![warn(unreachable_pub)]

pub mod normalize;
pub mod parser;

pub use normalize::{Normalizer, NormalizerConfig, NormalizeRule};
pub use parser::{
    BlockCounts, ConfigParam, ConstraintKind, ConstraintMention, DistanceMetric,
    DocumentArtifacts, EmbeddingBlock, ParseOutcome, RelationalArtifacts, SchemaArtifacts,
    SchemaParser, VectorArtifacts,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target database family of a schema design session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentVariant {
    /// SQL tables, constraints and DDL statements
    #[default]
    Relational,
    /// Collections of JSON-like documents
    Document,
    /// Embedding indices and similarity search configuration
    Vector,
}

impl ContentVariant {
    /// All variants in display order
    pub const ALL: [ContentVariant; 3] = [Self::Relational, Self::Document, Self::Vector];

    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relational => "relational",
            Self::Document => "document",
            Self::Vector => "vector",
        }
    }
}

impl fmt::Display for ContentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a variant name is not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown content variant: {0} (expected relational, document or vector)")]
pub struct UnknownVariant(pub String);

impl FromStr for ContentVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relational" | "sql" => Ok(Self::Relational),
            "document" | "nosql" | "mongodb" => Ok(Self::Document),
            "vector" | "embedding" | "embeddings" => Ok(Self::Vector),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
