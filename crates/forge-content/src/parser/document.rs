//! Document-store artifact extraction

use super::{fenced_blocks, push_unique, BlockCounts, ParseOutcome, SchemaArtifacts, SchemaParser};
use crate::ContentVariant;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document extraction result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentArtifacts {
    /// Structured (JSON-like) block bodies, trimmed
    pub blocks: Vec<String>,
    /// Collection names, in order of appearance
    pub collections: Vec<String>,
    /// Blocks (or array elements) that parse as JSON objects
    pub sample_records: Vec<Value>,
    /// Raw block counts
    pub counts: BlockCounts,
}

const STRUCTURED_LANGUAGES: &[&str] = &["json", "json5", "javascript", "js", "mongodb", "mongo"];

static COLLECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"db\.createCollection\(\s*["'](\w+)["']"#,
        r"\bdb\.(\w+)\.(?:insert(?:One|Many)?|find(?:One)?|createIndex|update(?:One|Many)?|aggregate)\(",
        r"(?im)^[ \t]*(?:[-*][ \t]+)?(?:\*\*)?collection(?:\*\*)?[ \t]*:(?:\*\*)?[ \t]*[`']?(\w+)",
        r"(?im)^#{1,6}[ \t]*[`']?(\w+)[`']?[ \t]+collection\b",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("collection pattern is valid"))
    .collect()
});

/// Document parser
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentParser;

impl DocumentParser {
    /// Extract artifacts without deciding whether they count as structure
    #[must_use]
    pub fn extract(&self, content: &str) -> DocumentArtifacts {
        let fenced = fenced_blocks(content);

        let blocks: Vec<String> = fenced
            .iter()
            .filter(|block| {
                let trimmed = block.body.trim_start();
                block
                    .language
                    .as_deref()
                    .is_some_and(|lang| STRUCTURED_LANGUAGES.contains(&lang))
                    || trimmed.starts_with('{')
                    || trimmed.starts_with('[')
            })
            .map(|block| block.body.trim().to_string())
            .collect();

        let sample_records = blocks
            .iter()
            .filter_map(|body| serde_json::from_str::<Value>(body).ok())
            .flat_map(|value| match value {
                Value::Object(_) => vec![value],
                Value::Array(items) => items.into_iter().filter(Value::is_object).collect(),
                _ => Vec::new(),
            })
            .collect();

        let mut found: Vec<(usize, &str)> = COLLECTION_PATTERNS
            .iter()
            .flat_map(|re| re.captures_iter(content))
            .filter_map(|caps| caps.get(1).map(|m| (m.start(), m.as_str())))
            .collect();
        found.sort_by_key(|(start, _)| *start);

        let mut collections = Vec::new();
        for (_, name) in found {
            push_unique(&mut collections, name);
        }

        let counts = BlockCounts {
            fenced: fenced.len(),
            structured: blocks.len(),
            named: collections.len(),
        };

        DocumentArtifacts {
            blocks,
            collections,
            sample_records,
            counts,
        }
    }
}

impl SchemaParser for DocumentParser {
    fn variant(&self) -> ContentVariant {
        ContentVariant::Document
    }

    fn parse(&self, content: &str) -> ParseOutcome {
        let artifacts = self.extract(content);
        if artifacts.blocks.is_empty() && artifacts.collections.is_empty() {
            return ParseOutcome::NoStructure;
        }
        ParseOutcome::Structured(SchemaArtifacts::Document(artifacts))
    }
}
