//! Relational (SQL) artifact extraction

use super::{fenced_blocks, push_unique, BlockCounts, ParseOutcome, SchemaArtifacts, SchemaParser};
use crate::ContentVariant;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Relational extraction result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationalArtifacts {
    /// DDL/DML statements, trimmed, each ending with `;`
    pub statements: Vec<String>,
    /// Table names from `CREATE TABLE`, in order of appearance
    pub tables: Vec<String>,
    /// Constraint kinds mentioned, with occurrence counts
    pub constraints: Vec<ConstraintMention>,
    /// Raw block counts
    pub counts: BlockCounts,
}

/// Kind of table constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// `PRIMARY KEY`
    PrimaryKey,
    /// `FOREIGN KEY` or `REFERENCES`
    ForeignKey,
    /// `UNIQUE`
    Unique,
    /// `CHECK (...)`
    Check,
    /// `NOT NULL`
    NotNull,
}

/// Constraint kind and how often it is mentioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintMention {
    /// Constraint kind
    pub kind: ConstraintKind,
    /// Number of mentions
    pub occurrences: usize,
}

static STATEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:CREATE|ALTER|INSERT|DROP|COMMENT[ \t]+ON)\b[^;]*;")
        .expect("statement pattern is valid")
});

static TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\bCREATE\s+(?:TEMP(?:ORARY)?\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([`"\[]?[\w.]+[`"\]]?)"#,
    )
    .expect("table pattern is valid")
});

static CONSTRAINT_PATTERNS: Lazy<Vec<(ConstraintKind, Regex)>> = Lazy::new(|| {
    [
        (ConstraintKind::PrimaryKey, r"(?i)\bPRIMARY\s+KEY\b"),
        (ConstraintKind::ForeignKey, r"(?i)\b(?:FOREIGN\s+KEY|REFERENCES)\b"),
        (ConstraintKind::Unique, r"(?i)\bUNIQUE\b"),
        (ConstraintKind::Check, r"(?i)\bCHECK\s*\("),
        (ConstraintKind::NotNull, r"(?i)\bNOT\s+NULL\b"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("constraint pattern is valid")))
    .collect()
});

/// Relational parser
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationalParser;

impl RelationalParser {
    /// Extract artifacts without deciding whether they count as structure
    #[must_use]
    pub fn extract(&self, content: &str) -> RelationalArtifacts {
        let statements: Vec<String> = STATEMENT_RE
            .find_iter(content)
            .map(|m| m.as_str().trim().to_string())
            .collect();

        let mut tables = Vec::new();
        for caps in TABLE_RE.captures_iter(content) {
            push_unique(&mut tables, &caps[1]);
        }

        let constraints = CONSTRAINT_PATTERNS
            .iter()
            .filter_map(|(kind, re)| {
                let occurrences = re.find_iter(content).count();
                (occurrences > 0).then_some(ConstraintMention {
                    kind: *kind,
                    occurrences,
                })
            })
            .collect();

        let counts = BlockCounts {
            fenced: fenced_blocks(content).len(),
            structured: statements.len(),
            named: tables.len(),
        };

        RelationalArtifacts {
            statements,
            tables,
            constraints,
            counts,
        }
    }
}

impl SchemaParser for RelationalParser {
    fn variant(&self) -> ContentVariant {
        ContentVariant::Relational
    }

    fn parse(&self, content: &str) -> ParseOutcome {
        let artifacts = self.extract(content);
        if artifacts.statements.is_empty() && artifacts.tables.is_empty() {
            return ParseOutcome::NoStructure;
        }
        ParseOutcome::Structured(SchemaArtifacts::Relational(artifacts))
    }
}
