//! Static stage templates for the fallback tiers
//!
//! Tier 2 classifies the request text with keyword heuristics into a
//! [`DomainHint`] and renders a template specific to the stage and the
//! target database family. Tier 3 renders a generic template that is
//! never empty.

use super::GenerationRequest;
use crate::types::StageKind;
use forge_content::ContentVariant;
use std::fmt::Write as _;

/// Table or collection used to flavour templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entity {
    /// Plural name used for tables, collections and indices
    pub plural: &'static str,
    /// Singular name used for foreign key columns
    pub singular: &'static str,
}

const fn entity(plural: &'static str, singular: &'static str) -> Entity {
    Entity { plural, singular }
}

/// Application domain guessed from the request text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainHint {
    /// Shops, carts, orders
    Commerce,
    /// Profiles, posts, followers
    Social,
    /// Events, dashboards, metrics
    Analytics,
    /// Patients, clinics, appointments
    Healthcare,
    /// Accounts, payments, ledgers
    Finance,
    /// Blogs, articles, media
    Content,
    /// Devices, sensors, telemetry
    Iot,
    /// Nothing recognized
    Generic,
}

impl DomainHint {
    /// Domains tried during classification, in tie-break order
    pub const CLASSIFIED: [DomainHint; 7] = [
        Self::Commerce,
        Self::Social,
        Self::Analytics,
        Self::Healthcare,
        Self::Finance,
        Self::Content,
        Self::Iot,
    ];

    /// Classify request text by keyword hits; the domain with most hits wins
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut best = (Self::Generic, 0usize);
        for domain in Self::CLASSIFIED {
            let hits = words
                .iter()
                .filter(|word| {
                    domain
                        .keywords()
                        .iter()
                        .any(|keyword| word.starts_with(keyword))
                })
                .count();
            if hits > best.1 {
                best = (domain, hits);
            }
        }
        best.0
    }

    /// Keyword stems recognized for this domain
    #[must_use]
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Commerce => &[
                "shop", "store", "ecommerce", "cart", "order", "product", "checkout", "inventory",
                "catalog", "retail",
            ],
            Self::Social => &[
                "social", "friend", "follow", "post", "feed", "like", "profile", "message", "chat",
            ],
            Self::Analytics => &[
                "analytic", "event", "dashboard", "metric", "report", "tracking", "clickstream",
                "warehouse",
            ],
            Self::Healthcare => &[
                "patient", "health", "clinic", "hospital", "doctor", "medical", "appointment",
                "prescription",
            ],
            Self::Finance => &[
                "bank", "payment", "transaction", "ledger", "account", "invoice", "wallet",
                "finance", "loan",
            ],
            Self::Content => &[
                "blog", "article", "cms", "content", "media", "video", "comment", "author",
                "publish",
            ],
            Self::Iot => &[
                "iot", "device", "sensor", "telemetry", "reading", "fleet", "firmware",
            ],
            Self::Generic => &[],
        }
    }

    /// Entities used by the templates, parent first
    #[must_use]
    pub fn entities(&self) -> [Entity; 3] {
        match self {
            Self::Commerce => [
                entity("customers", "customer"),
                entity("orders", "order"),
                entity("products", "product"),
            ],
            Self::Social => [
                entity("users", "user"),
                entity("posts", "post"),
                entity("follows", "follow"),
            ],
            Self::Analytics => [
                entity("sessions", "session"),
                entity("events", "event"),
                entity("metrics", "metric"),
            ],
            Self::Healthcare => [
                entity("patients", "patient"),
                entity("appointments", "appointment"),
                entity("providers", "provider"),
            ],
            Self::Finance => [
                entity("accounts", "account"),
                entity("transactions", "transaction"),
                entity("ledger_entries", "ledger_entry"),
            ],
            Self::Content => [
                entity("authors", "author"),
                entity("articles", "article"),
                entity("comments", "comment"),
            ],
            Self::Iot => [
                entity("devices", "device"),
                entity("readings", "reading"),
                entity("alerts", "alert"),
            ],
            Self::Generic => [
                entity("users", "user"),
                entity("records", "record"),
                entity("activities", "activity"),
            ],
        }
    }

    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Commerce => "e-commerce",
            Self::Social => "social",
            Self::Analytics => "analytics",
            Self::Healthcare => "healthcare",
            Self::Finance => "finance",
            Self::Content => "content management",
            Self::Iot => "IoT telemetry",
            Self::Generic => "general purpose",
        }
    }
}

/// Stage templates for the fallback tiers
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateLibrary;

impl TemplateLibrary {
    /// Create library
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Tier 2: stage and variant template flavoured by the request's domain
    #[must_use]
    pub fn templated(&self, request: &GenerationRequest) -> String {
        let domain = DomainHint::classify(&request.request_text);
        self.render(request.stage, request.variant, domain)
    }

    /// Render a template for an explicit domain
    #[must_use]
    pub fn render(&self, stage: StageKind, variant: ContentVariant, domain: DomainHint) -> String {
        let [parent, child, related] = domain.entities();
        match stage {
            StageKind::RequirementsAnalysis => requirements(variant, domain, parent, child, related),
            StageKind::SchemaDesign => design(variant, parent, child, related),
            StageKind::Implementation => implementation(variant, parent, child, related),
            StageKind::Optimization => optimization(variant, parent, child, related),
        }
    }

    /// Tier 3: generic content that is never empty
    #[must_use]
    pub fn minimal(&self, request: &GenerationRequest) -> String {
        let stub = match request.variant {
            ContentVariant::Relational => {
                "CREATE TABLE records (\n  id BIGSERIAL PRIMARY KEY,\n  payload TEXT NOT NULL,\n  created_at TIMESTAMPTZ NOT NULL DEFAULT now()\n);"
            }
            ContentVariant::Document => {
                "db.createCollection(\"records\")\n\n```json\n{\"_id\": \"rec_001\", \"payload\": {}, \"created_at\": \"2024-01-01T00:00:00Z\"}\n```"
            }
            ContentVariant::Vector => {
                "```yaml\nindex_name: records-embeddings\ndimensions: 768\nmetric: cosine\n```"
            }
        };
        format!(
            "## {title}\n\nA baseline {variant} design is provided so later stages have a starting point. Refine it once the requirements are clearer.\n\n{stub}\n",
            title = request.task_title,
            variant = request.variant,
        )
    }
}

fn requirements(
    variant: ContentVariant,
    domain: DomainHint,
    parent: Entity,
    child: Entity,
    related: Entity,
) -> String {
    let storage = match variant {
        ContentVariant::Relational => "normalized tables with enforced referential integrity",
        ContentVariant::Document => "document collections shaped around the dominant read paths",
        ContentVariant::Vector => "embedding indices supporting approximate nearest-neighbour search",
    };
    format!(
        "## Requirements Analysis\n\n\
         The request describes a {label} workload stored as {storage}.\n\n\
         ### Core entities\n\
         - {p}: long-lived records owned by the application\n\
         - {c}: high-volume records, each belonging to one {ps}\n\
         - {r}: reference data linked to {c}\n\n\
         ### Access patterns\n\
         - Fetch a {ps} with its most recent {c}\n\
         - List {c} by creation time with pagination\n\
         - Look up {r} referenced by a {cs}\n\n\
         ### Volume estimates\n\
         - {p}: tens of thousands of rows, slow growth\n\
         - {c}: millions of rows, append-heavy\n",
        label = domain.label(),
        p = parent.plural,
        c = child.plural,
        r = related.plural,
        ps = parent.singular,
        cs = child.singular,
    )
}

fn design(variant: ContentVariant, parent: Entity, child: Entity, related: Entity) -> String {
    let mut out = String::from("## Schema Design\n\n");
    match variant {
        ContentVariant::Relational => {
            let _ = writeln!(out, "### Entities and keys");
            let _ = writeln!(out, "- {}: surrogate primary key `id`, unique natural key `name`", parent.plural);
            let _ = writeln!(
                out,
                "- {}: primary key `id`, foreign key `{}_id` references {}",
                child.plural, parent.singular, parent.plural
            );
            let _ = writeln!(
                out,
                "- {}: primary key `id`, foreign key `{}_id` references {}",
                related.plural, child.singular, child.plural
            );
            let _ = writeln!(out, "\n### Relationships");
            let _ = writeln!(out, "- one {} has many {}", parent.singular, child.plural);
            let _ = writeln!(out, "- one {} has many {}", child.singular, related.plural);
        }
        ContentVariant::Document => {
            let _ = writeln!(out, "### `{}` collection", parent.plural);
            let _ = writeln!(
                out,
                "Top-level documents; the latest {} are embedded as a bounded summary array.\n",
                child.plural
            );
            let _ = writeln!(out, "### `{}` collection", child.plural);
            let _ = writeln!(
                out,
                "Referenced by `{}_id`; embeds its {} because they are always read together.",
                parent.singular, related.plural
            );
        }
        ContentVariant::Vector => {
            let _ = writeln!(out, "### Embedding sources");
            let _ = writeln!(
                out,
                "- {}: text fields concatenated and embedded as 1536-dimensional vectors",
                child.plural
            );
            let _ = writeln!(
                out,
                "- {}: short descriptions embedded for similarity lookups",
                related.plural
            );
            let _ = writeln!(out, "\n### Metadata filters");
            let _ = writeln!(
                out,
                "- `{}_id` stored as a filterable attribute next to each vector",
                parent.singular
            );
        }
    }
    out
}

fn implementation(variant: ContentVariant, parent: Entity, child: Entity, related: Entity) -> String {
    let mut out = String::from("## Implementation\n\n");
    match variant {
        ContentVariant::Relational => {
            let _ = writeln!(out, "```sql");
            let _ = writeln!(
                out,
                "CREATE TABLE {} (\n  id BIGSERIAL PRIMARY KEY,\n  name TEXT NOT NULL UNIQUE,\n  created_at TIMESTAMPTZ NOT NULL DEFAULT now()\n);\n",
                parent.plural
            );
            let _ = writeln!(
                out,
                "CREATE TABLE {} (\n  id BIGSERIAL PRIMARY KEY,\n  {}_id BIGINT NOT NULL REFERENCES {}(id),\n  status TEXT NOT NULL CHECK (status <> ''),\n  created_at TIMESTAMPTZ NOT NULL DEFAULT now()\n);\n",
                child.plural, parent.singular, parent.plural
            );
            let _ = writeln!(
                out,
                "CREATE TABLE {} (\n  id BIGSERIAL PRIMARY KEY,\n  {}_id BIGINT NOT NULL REFERENCES {}(id),\n  label TEXT NOT NULL\n);",
                related.plural, child.singular, child.plural
            );
            let _ = writeln!(out, "```");
        }
        ContentVariant::Document => {
            let _ = writeln!(out, "```javascript");
            let _ = writeln!(out, "db.createCollection(\"{}\")", parent.plural);
            let _ = writeln!(out, "db.createCollection(\"{}\")", child.plural);
            let _ = writeln!(out, "```\n");
            let _ = writeln!(out, "```json");
            let _ = writeln!(
                out,
                "{{\"_id\": \"{ps}_001\", \"name\": \"Sample {ps}\", \"recent_{c}\": [\"{cs}_001\"]}}",
                ps = parent.singular,
                c = child.plural,
                cs = child.singular
            );
            let _ = writeln!(out, "```\n");
            let _ = writeln!(out, "```json");
            let _ = writeln!(
                out,
                "{{\"_id\": \"{cs}_001\", \"{ps}_id\": \"{ps}_001\", \"{r}\": [{{\"label\": \"primary\"}}]}}",
                cs = child.singular,
                ps = parent.singular,
                r = related.plural
            );
            let _ = writeln!(out, "```");
        }
        ContentVariant::Vector => {
            let _ = writeln!(out, "```yaml");
            let _ = writeln!(out, "index_name: {}-embeddings", child.plural);
            let _ = writeln!(out, "dimensions: 1536");
            let _ = writeln!(out, "metric: cosine");
            let _ = writeln!(out, "index_type: hnsw");
            let _ = writeln!(out, "m: 16");
            let _ = writeln!(out, "ef_construction: 200");
            let _ = writeln!(out, "```\n");
            let _ = writeln!(out, "Sample vector: [0.021, -0.113, 0.087, 0.045, ...]");
            let _ = writeln!(
                out,
                "\nA secondary index `{}-embeddings` holds the {} descriptions.",
                related.plural, related.singular
            );
        }
    }
    out
}

fn optimization(variant: ContentVariant, parent: Entity, child: Entity, related: Entity) -> String {
    let mut out = String::from("## Optimization & Review\n\n");
    match variant {
        ContentVariant::Relational => {
            let _ = writeln!(out, "```sql");
            let _ = writeln!(
                out,
                "CREATE INDEX {c}_{p}_created_idx ON {c} ({p}_id, created_at DESC);",
                c = child.plural,
                p = parent.singular
            );
            let _ = writeln!(
                out,
                "CREATE INDEX {r}_{c}_idx ON {r} ({c}_id);",
                r = related.plural,
                c = child.singular
            );
            let _ = writeln!(out, "```\n");
            let _ = writeln!(
                out,
                "- Partition {} by month once it passes 50 million rows",
                child.plural
            );
            let _ = writeln!(out, "- Foreign keys are indexed to keep cascading deletes cheap");
        }
        ContentVariant::Document => {
            let _ = writeln!(out, "```javascript");
            let _ = writeln!(
                out,
                "db.{c}.createIndex({{ \"{p}_id\": 1, \"created_at\": -1 }})",
                c = child.plural,
                p = parent.singular
            );
            let _ = writeln!(out, "db.{}.createIndex({{ \"name\": 1 }}, {{ unique: true }})", parent.plural);
            let _ = writeln!(out, "```\n");
            let _ = writeln!(
                out,
                "- Cap the embedded `recent_{}` array at 20 entries",
                child.plural
            );
            let _ = writeln!(out, "- Shard {} on `{}_id`", child.plural, parent.singular);
        }
        ContentVariant::Vector => {
            let _ = writeln!(out, "```yaml");
            let _ = writeln!(out, "index_name: {}-embeddings", child.plural);
            let _ = writeln!(out, "ef_search: 64");
            let _ = writeln!(out, "replicas: 2");
            let _ = writeln!(out, "shards: 3");
            let _ = writeln!(out, "```\n");
            let _ = writeln!(
                out,
                "- Pre-filter on `{}_id` before the similarity search",
                parent.singular
            );
            let _ = writeln!(out, "- Re-embed {} in nightly batches", related.plural);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_content::{normalize, parser, ParseOutcome};

    fn request(stage: StageKind, variant: ContentVariant, text: &str) -> GenerationRequest {
        GenerationRequest::new(text, variant, stage, stage.title())
    }

    #[test]
    fn classifies_by_keyword_hits() {
        assert_eq!(
            DomainHint::classify("An online shop with a cart and orders"),
            DomainHint::Commerce
        );
        assert_eq!(
            DomainHint::classify("Store sensor telemetry from our device fleet"),
            DomainHint::Iot
        );
        assert_eq!(
            DomainHint::classify("Patients book appointments with doctors"),
            DomainHint::Healthcare
        );
        assert_eq!(DomainHint::classify("something unusual"), DomainHint::Generic);
    }

    #[test]
    fn implementation_templates_parse_as_structured() {
        let library = TemplateLibrary::new();
        for variant in ContentVariant::ALL {
            let text = library.templated(&request(
                StageKind::Implementation,
                variant,
                "A blog with authors and comments",
            ));
            let clean = normalize::normalize(&text);
            assert!(
                parser::parse(variant, &clean).is_structured(),
                "{variant} implementation template should parse"
            );
        }
    }

    #[test]
    fn relational_implementation_uses_domain_entities() {
        let text = TemplateLibrary::new().render(
            StageKind::Implementation,
            ContentVariant::Relational,
            DomainHint::Finance,
        );
        let ParseOutcome::Structured(artifacts) = parser::parse(ContentVariant::Relational, &text)
        else {
            panic!("expected structure");
        };
        assert_eq!(
            artifacts.entity_names(),
            ["accounts", "transactions", "ledger_entries"]
        );
    }

    #[test]
    fn templates_survive_normalization() {
        let library = TemplateLibrary::new();
        for stage in StageKind::ALL {
            for variant in ContentVariant::ALL {
                let text = library.render(stage, variant, DomainHint::Social);
                let clean = normalize::normalize(&text);
                assert_eq!(clean, text.trim(), "{stage:?}/{variant}");
                assert!(clean.chars().count() >= 80);
            }
        }
    }

    #[test]
    fn minimal_is_long_enough_for_every_variant() {
        let library = TemplateLibrary::new();
        for variant in ContentVariant::ALL {
            let text = library.minimal(&request(StageKind::SchemaDesign, variant, ""));
            assert!(text.trim().chars().count() >= 80);
            assert!(text.contains("Schema Design"));
        }
    }
}
