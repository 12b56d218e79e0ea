//! Property tests for the content normalizer and parsers.

use forge_content::normalize::{normalize, Normalizer, NormalizerConfig};
use forge_content::{parser, ContentVariant};
use proptest::prelude::*;

/// Lines that typically appear in generated stage content.
fn content_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("## Reasoning".to_string()),
        Just("**Thought process:**".to_string()),
        Just("Confidence: 0.87".to_string()),
        Just("- **Agent:** Architect".to_string()),
        Just("<thinking>consider indexes</thinking>".to_string()),
        Just("✅ Step complete".to_string()),
        Just("🔍 Thinking:".to_string()),
        Just("=====".to_string()),
        Just("Here is the proposed schema:".to_string()),
        Just("CREATE TABLE users (id BIGSERIAL PRIMARY KEY);".to_string()),
        Just("  email TEXT NOT NULL,".to_string()),
        Just("{\"_id\": 1}".to_string()),
        Just("```sql".to_string()),
        Just("```".to_string()),
        Just(String::new()),
        Just("   ".to_string()),
        "[a-zA-Z ]{0,40}",
    ]
}

fn content() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(content_line(), 0..24),
        prop_oneof![Just("\n"), Just("\r\n")],
    )
        .prop_map(|(lines, sep)| lines.join(sep))
}

/// Pieces of tags, symbols and marker words that can splice together
/// mid-line once a neighbouring piece is removed.
fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("<think".to_string()),
        Just("ing>".to_string()),
        Just("<thinking>".to_string()),
        Just("</thinking>".to_string()),
        Just("</think".to_string()),
        Just("<reason".to_string()),
        Just("<reasoning>".to_string()),
        Just("</reasoning>".to_string()),
        Just("🚀".to_string()),
        Just("✅ ".to_string()),
        Just("⚠️".to_string()),
        Just("Confidence:".to_string()),
        Just("Reasoning".to_string()),
        Just("Thinking".to_string()),
        Just(":".to_string()),
        Just("## ".to_string()),
        Just("**".to_string()),
        Just("---".to_string()),
        Just("CREATE TABLE a (id INT);".to_string()),
        Just(" ".to_string()),
        Just("\n".to_string()),
        Just("\r".to_string()),
        "[a-z]{0,6}",
    ]
}

/// Lines assembled from fragments with no separator between them.
fn fragmented_content() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::collection::vec(fragment(), 0..12), 0..8).prop_map(|lines| {
        lines
            .into_iter()
            .map(|pieces| pieces.concat())
            .collect::<Vec<_>>()
            .join("\n")
    })
}

proptest! {
    #[test]
    fn normalize_is_idempotent(input in content()) {
        let once = normalize(&input);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_is_idempotent_on_spliced_fragments(input in fragmented_content()) {
        let once = normalize(&input);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn transform_settles_on_spliced_fragments(input in fragmented_content()) {
        let normalizer = Normalizer::default();
        let settled = normalizer.transform(&input);
        prop_assert_eq!(normalizer.apply_once(&settled), settled);
    }

    #[test]
    fn normalize_output_never_grows_on_fragments(input in fragmented_content()) {
        prop_assert!(normalize(&input).chars().count() <= input.chars().count());
    }

    #[test]
    fn normalize_respects_over_trimming_guard(input in content()) {
        let config = NormalizerConfig::default();
        let output = Normalizer::new(config).normalize(&input);
        if input.chars().count() > config.guard {
            prop_assert!(output.chars().count() >= config.floor);
        }
    }

    #[test]
    fn normalize_output_never_grows(input in content()) {
        prop_assert!(normalize(&input).chars().count() <= input.chars().count());
    }

    #[test]
    fn parsers_accept_arbitrary_text(input in "\\PC{0,200}") {
        for variant in ContentVariant::ALL {
            let _ = parser::parse(variant, &input);
        }
    }
}
