//! Vector-store artifact extraction

use super::{fenced_blocks, push_unique, BlockCounts, ParseOutcome, SchemaArtifacts, SchemaParser};
use crate::ContentVariant;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Vector extraction result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorArtifacts {
    /// Embedding dimensionality, if stated
    pub dimensions: Option<u32>,
    /// Distance metric, if stated
    pub metric: Option<DistanceMetric>,
    /// Every recognized `key: value` setting, in order of appearance
    pub params: Vec<ConfigParam>,
    /// Index names, in order of appearance
    pub indices: Vec<String>,
    /// Sample embedding arrays
    pub embeddings: Vec<EmbeddingBlock>,
    /// Raw block counts
    pub counts: BlockCounts,
}

/// Similarity metric of a vector index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity
    Cosine,
    /// Euclidean (L2) distance
    Euclidean,
    /// Dot / inner product
    DotProduct,
    /// Anything else, as written
    Other(String),
}

impl DistanceMetric {
    /// Interpret a metric name
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "cosine" | "cos" => Self::Cosine,
            "euclidean" | "l2" | "euclid" => Self::Euclidean,
            "dot" | "dot_product" | "dotproduct" | "ip" | "inner_product" => Self::DotProduct,
            _ => Self::Other(name.trim().to_string()),
        }
    }
}

/// A single configuration setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigParam {
    /// Setting name, lowercased
    pub key: String,
    /// Raw value
    pub value: String,
}

/// Sample embedding array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingBlock {
    /// Parsed components
    pub values: Vec<f32>,
    /// Whether the sample ended with `...`
    pub truncated: bool,
}

static PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?im)^[ \t]*(?:[-*][ \t]+)?[`"']?(dimensions?|dims?|metric|distance(?:[_ ]metric)?|similarity|index[_ ]type|m|ef_construction|ef_search|nlist|nprobe|shards|replicas)[`"']?[ \t]*[:=][ \t]*[`"']?([\w.-]+)"#,
    )
    .expect("param pattern is valid")
});

static PROSE_DIMENSIONS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{2,5})[- ]dimension(?:al|s)?\b").expect("dimension pattern is valid")
});

static PROSE_METRIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(cosine|euclidean|dot[ _-]product)\b").expect("metric pattern is valid")
});

static INDEX_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bCREATE\s+INDEX\s+(?:IF\s+NOT\s+EXISTS\s+)?(\w+)",
        r#"(?im)^[ \t]*(?:[-*][ \t]+)?[`"']?index(?:[_ ]name)?[`"']?[ \t]*[:=][ \t]*[`"']?([\w-]+)"#,
        r#"\b(?:create_index|Index)\(\s*["']([\w-]+)["']"#,
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("index pattern is valid"))
    .collect()
});

static EMBEDDING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*-?\d+\.\d+(?:\s*,\s*-?\d+\.\d+){2,}\s*(,\s*\.\.\.\s*)?\]")
        .expect("embedding pattern is valid")
});

const DIMENSION_KEYS: &[&str] = &["dimension", "dimensions", "dim", "dims"];
const METRIC_KEYS: &[&str] = &["metric", "distance", "distance_metric", "distance metric", "similarity"];

/// Vector parser
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorParser;

impl VectorParser {
    /// Extract artifacts without deciding whether they count as structure
    #[must_use]
    pub fn extract(&self, content: &str) -> VectorArtifacts {
        let params: Vec<ConfigParam> = PARAM_RE
            .captures_iter(content)
            .map(|caps| ConfigParam {
                key: caps[1].to_ascii_lowercase(),
                value: caps[2].to_string(),
            })
            .collect();

        let dimensions = params
            .iter()
            .filter(|p| DIMENSION_KEYS.contains(&p.key.as_str()))
            .find_map(|p| p.value.parse::<u32>().ok())
            .or_else(|| {
                PROSE_DIMENSIONS_RE
                    .captures(content)
                    .and_then(|caps| caps[1].parse().ok())
            });

        let metric = params
            .iter()
            .find(|p| METRIC_KEYS.contains(&p.key.as_str()))
            .map(|p| DistanceMetric::from_name(&p.value))
            .or_else(|| {
                PROSE_METRIC_RE
                    .captures(content)
                    .map(|caps| DistanceMetric::from_name(&caps[1]))
            });

        let mut found: Vec<(usize, &str)> = INDEX_PATTERNS
            .iter()
            .flat_map(|re| re.captures_iter(content))
            .filter_map(|caps| caps.get(1).map(|m| (m.start(), m.as_str())))
            .collect();
        found.sort_by_key(|(start, _)| *start);

        let mut indices = Vec::new();
        for (_, name) in found {
            push_unique(&mut indices, name);
        }

        let embeddings: Vec<EmbeddingBlock> = EMBEDDING_RE
            .captures_iter(content)
            .map(|caps| {
                let whole = caps.get(0).map_or("", |m| m.as_str());
                let values = whole
                    .trim_matches(|c| c == '[' || c == ']')
                    .split(',')
                    .filter_map(|part| part.trim().parse::<f32>().ok())
                    .collect();
                EmbeddingBlock {
                    values,
                    truncated: caps.get(1).is_some(),
                }
            })
            .collect();

        let counts = BlockCounts {
            fenced: fenced_blocks(content).len(),
            structured: embeddings.len(),
            named: indices.len(),
        };

        VectorArtifacts {
            dimensions,
            metric,
            params,
            indices,
            embeddings,
            counts,
        }
    }
}

impl SchemaParser for VectorParser {
    fn variant(&self) -> ContentVariant {
        ContentVariant::Vector
    }

    fn parse(&self, content: &str) -> ParseOutcome {
        let artifacts = self.extract(content);
        if artifacts.params.is_empty()
            && artifacts.indices.is_empty()
            && artifacts.embeddings.is_empty()
        {
            return ParseOutcome::NoStructure;
        }
        ParseOutcome::Structured(SchemaArtifacts::Vector(artifacts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "## Index configuration\n\n```yaml\nindex_name: product-embeddings\ndimensions: 1536\nmetric: cosine\nindex_type: hnsw\nm: 16\n```\n\nSample vector: [0.12, -0.58, 0.33, 0.04, ...]\n\nCREATE INDEX reviews_embedding_idx ON reviews USING hnsw (embedding vector_cosine_ops);\n";

    #[test]
    fn extracts_typed_configuration() {
        let artifacts = VectorParser.extract(CONFIG);
        assert_eq!(artifacts.dimensions, Some(1536));
        assert_eq!(artifacts.metric, Some(DistanceMetric::Cosine));
        assert!(artifacts
            .params
            .iter()
            .any(|p| p.key == "index_type" && p.value == "hnsw"));
        assert!(artifacts.params.iter().any(|p| p.key == "m" && p.value == "16"));
    }

    #[test]
    fn extracts_indices_and_embeddings() {
        let artifacts = VectorParser.extract(CONFIG);
        assert_eq!(
            artifacts.indices,
            vec![
                "product-embeddings".to_string(),
                "reviews_embedding_idx".to_string()
            ]
        );
        assert_eq!(artifacts.embeddings.len(), 1);
        assert_eq!(artifacts.embeddings[0].values, vec![0.12, -0.58, 0.33, 0.04]);
        assert!(artifacts.embeddings[0].truncated);
        assert_eq!(artifacts.counts.fenced, 1);
    }

    #[test]
    fn prose_fallbacks_fill_dimensions_and_metric() {
        let text = "Store 768-dimensional sentence vectors and rank them by Euclidean distance.\nIndex: docs";
        let artifacts = VectorParser.extract(text);
        assert_eq!(artifacts.dimensions, Some(768));
        assert_eq!(artifacts.metric, Some(DistanceMetric::Euclidean));
        assert_eq!(artifacts.indices, vec!["docs".to_string()]);
    }

    #[test]
    fn metric_aliases() {
        assert_eq!(DistanceMetric::from_name("L2"), DistanceMetric::Euclidean);
        assert_eq!(DistanceMetric::from_name("inner product"), DistanceMetric::DotProduct);
        assert_eq!(
            DistanceMetric::from_name("hamming"),
            DistanceMetric::Other("hamming".to_string())
        );
    }
}
