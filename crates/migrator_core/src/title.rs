use std::sync::LazyLock;

use regex::Regex;

/// Series label used by the source newsletter for numbered issues.
pub const DEFAULT_SERIES_LABEL: &str = "Cronache dal Consiglio";

static DEFAULT_NORMALIZER: LazyLock<TitleNormalizer> = LazyLock::new(|| {
    TitleNormalizer::with_series_label(DEFAULT_SERIES_LABEL)
        .expect("default series label compiles")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

/// Strips a `"<label> n° <number> - "` prefix from campaign titles.
#[derive(Debug, Clone)]
pub struct TitleNormalizer {
    prefix: Regex,
}

impl TitleNormalizer {
    /// Build a normalizer for a series label; words in the label match any
    /// whitespace run. Matching is case-sensitive and anchored at the start.
    pub fn with_series_label(label: &str) -> Result<Self, regex::Error> {
        let words: Vec<String> = label.split_whitespace().map(regex::escape).collect();
        let pattern = format!(r"^{}\s+n°\s*\d+\s*-\s*", words.join(r"\s+"));
        Ok(Self {
            prefix: Regex::new(&pattern)?,
        })
    }

    /// The prefix must start at the first character; leading whitespace
    /// disables the match. A title that is nothing but the prefix keeps its
    /// collapsed original text instead of becoming empty.
    pub fn normalize(&self, raw: &str) -> String {
        let stripped = collapse_whitespace(&self.prefix.replace(raw, ""));
        if stripped.is_empty() {
            collapse_whitespace(raw)
        } else {
            stripped
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

impl Default for TitleNormalizer {
    fn default() -> Self {
        DEFAULT_NORMALIZER.clone()
    }
}

/// Normalize a title with the default series label.
pub fn normalize_title(raw: &str) -> String {
    DEFAULT_NORMALIZER.normalize(raw)
}
