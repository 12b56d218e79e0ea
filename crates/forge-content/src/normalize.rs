//! Content normalizer
//!
//! Generated stage content often carries commentary meant for the viewer
//! of the live session rather than for the artifact itself: `<thinking>`
//! blocks, "## Reasoning" banners, `Confidence: 0.8` lines, emoji bullets.
//! The normalizer removes those with an ordered list of independent rules.
//!
//! Symbol stripping runs first so an emoji wedged inside a tag
//! (`<think🚀ing>`) or in front of a banner (`🔍 Thinking:`) cannot hide
//! it from the later rules. Whitespace collapsing always runs last.
//!
//! Removing one block can splice its neighbours into a new one
//! (`<think<thinking>x</thinking>ing>`), so the pipeline is repeated until
//! the text stops changing. Every rule only removes text, which bounds the
//! number of passes; [`MAX_PASSES`] is a backstop.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single named, pure transformation
#[derive(Debug, Clone, Copy)]
pub struct NormalizeRule {
    /// Rule name (used in logs and tests)
    pub name: &'static str,
    /// Transformation function
    pub apply: fn(&str) -> String,
}

/// Default rule pipeline, in application order
pub const DEFAULT_RULES: &[NormalizeRule] = &[
    NormalizeRule {
        name: "line_endings",
        apply: normalize_line_endings,
    },
    NormalizeRule {
        name: "decorative_symbols",
        apply: strip_decorative_symbols,
    },
    NormalizeRule {
        name: "thinking_blocks",
        apply: strip_thinking_blocks,
    },
    NormalizeRule {
        name: "banner_lines",
        apply: strip_banner_lines,
    },
    NormalizeRule {
        name: "metadata_lines",
        apply: strip_metadata_lines,
    },
    NormalizeRule {
        name: "whitespace",
        apply: collapse_whitespace,
    },
];

/// Upper bound on full pipeline passes in [`Normalizer::transform`]
pub const MAX_PASSES: usize = 16;

/// Over-trimming guard thresholds (in chars)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Minimum acceptable output length
    pub floor: usize,
    /// Input length above which an output below `floor` is rejected
    pub guard: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            floor: 40,
            guard: 120,
        }
    }
}

/// Ordered rule pipeline with an over-trimming guard
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
    rules: Vec<NormalizeRule>,
}

impl Normalizer {
    /// Create normalizer with the default rules
    #[inline]
    #[must_use]
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            config,
            rules: DEFAULT_RULES.to_vec(),
        }
    }

    /// Create normalizer with a custom rule list
    #[inline]
    #[must_use]
    pub fn with_rules(config: NormalizerConfig, rules: Vec<NormalizeRule>) -> Self {
        Self { config, rules }
    }

    /// Guard thresholds
    #[inline]
    #[must_use]
    pub fn config(&self) -> NormalizerConfig {
        self.config
    }

    /// Rule list in application order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[NormalizeRule] {
        &self.rules
    }

    /// Run every rule once, in order
    #[must_use]
    pub fn apply_once(&self, input: &str) -> String {
        self.rules
            .iter()
            .fold(input.to_string(), |text, rule| (rule.apply)(&text))
    }

    /// Repeat the rule pipeline until the text stops changing, without the
    /// over-trimming guard
    #[must_use]
    pub fn transform(&self, input: &str) -> String {
        let mut text = self.apply_once(input);
        for _ in 1..MAX_PASSES {
            let next = self.apply_once(&text);
            if next == text {
                return text;
            }
            text = next;
        }
        tracing::debug!(passes = MAX_PASSES, "normalizer did not settle");
        text
    }

    /// Apply the rules, falling back to the input when they over-trim
    #[must_use]
    pub fn normalize(&self, input: &str) -> String {
        let output = self.transform(input);
        let input_len = input.chars().count();
        let output_len = output.chars().count();

        if output_len < self.config.floor && input_len > self.config.guard {
            tracing::debug!(
                input_len,
                output_len,
                floor = self.config.floor,
                "normalizer over-trimmed, keeping original content"
            );
            return input.to_string();
        }

        output
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

/// Normalize with the default configuration
#[must_use]
pub fn normalize(input: &str) -> String {
    Normalizer::default().normalize(input)
}

static THINKING_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<(?:thinking|reasoning|scratchpad|analysis)>.*?</(?:thinking|reasoning|scratchpad|analysis)>",
    )
    .expect("thinking block pattern is valid")
});

static DECORATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{1F300}-\x{1FAFF}\x{2600}-\x{27BF}\x{2B50}\x{2B55}\x{FE0F}\x{200D}]+ ?")
        .expect("decorative symbol pattern is valid")
});

static BANNER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?mi)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*)?(?:reasoning|thinking|thought process|internal notes|analysis notes|meta-commentary|my approach|let me think(?: step by step)?)(?:\*\*)?[ \t]*:?[ \t]*(?:\*\*)?[ \t]*$",
    )
    .expect("banner pattern is valid")
});

static SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:[=*_~]{3,}|-{3,})[ \t]*$").expect("separator pattern is valid")
});

static PREAMBLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?mi)^[ \t]*(?:(?:sure|certainly|of course)[,!.]?[ \t]*)?(?:here is|here's|here are|below is|below are)\b[^\n]*:[ \t]*$",
    )
    .expect("preamble pattern is valid")
});

static METADATA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?mi)^[ \t]*(?:[-*][ \t]+)?(?:\*\*)?(?:confidence|reasoning|thinking|thought|agent|elapsed|tokens used|progress|self-check|note to self)(?:\*\*)?[ \t]*:[^\n]*$",
    )
    .expect("metadata pattern is valid")
});

static BLANK_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank run pattern is valid"));

/// Convert CRLF and lone CR line endings to LF
#[must_use]
pub fn normalize_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// Remove `<thinking>`-style blocks, including their content
#[must_use]
pub fn strip_thinking_blocks(input: &str) -> String {
    THINKING_BLOCK_RE.replace_all(input, "").into_owned()
}

/// Remove emoji and dingbat symbols (and one trailing space)
#[must_use]
pub fn strip_decorative_symbols(input: &str) -> String {
    DECORATIVE_RE.replace_all(input, "").into_owned()
}

/// Remove reasoning banners, separator rules and "here is ..." preambles
#[must_use]
pub fn strip_banner_lines(input: &str) -> String {
    let text = BANNER_RE.replace_all(input, "");
    let text = SEPARATOR_RE.replace_all(&text, "");
    PREAMBLE_RE.replace_all(&text, "").into_owned()
}

/// Remove `Label: value` lines that describe the generation itself
#[must_use]
pub fn strip_metadata_lines(input: &str) -> String {
    METADATA_RE.replace_all(input, "").into_owned()
}

/// Trim trailing whitespace, collapse blank runs, trim the ends
#[must_use]
pub fn collapse_whitespace(input: &str) -> String {
    let trimmed_lines = input
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN_RE
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}
