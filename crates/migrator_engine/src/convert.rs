use std::sync::LazyLock;

use regex::Regex;

static BLANK_LINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("blank line pattern compiles"));

pub trait Converter: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

/// Structural HTML to Markdown: setext headings for `h1`/`h2` (ATX below
/// that), inline links, `![alt](src)` images and no hard wrapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct Html2MdConverter;

impl Converter for Html2MdConverter {
    fn to_markdown(&self, html: &str) -> String {
        html2md::parse_html(html)
    }
}

/// Reduce every run of two or more blank lines to a single blank line.
pub fn collapse_blank_lines(markdown: &str) -> String {
    BLANK_LINE_RUN
        .replace_all(markdown, "\n\n")
        .trim()
        .to_string()
}
