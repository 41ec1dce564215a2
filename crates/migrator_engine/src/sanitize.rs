use std::collections::HashMap;

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Alt text given to images that arrive without one.
pub const DEFAULT_ALT_TEXT: &str = "image";

/// Elements dropped together with everything inside them.
const DROPPED_ELEMENTS: &[&str] = &[
    "script", "style", "head", "title", "meta", "link", "template", "noscript",
];

/// Presentation-only attributes. Event handlers (`on*`) are dropped as well.
const PRESENTATION_ATTRIBUTES: &[&str] = &["style", "class", "id", "bgcolor", "background"];

/// Wrappers removed when they end up with nothing but whitespace inside.
const EMPTY_DROPPABLE: &[&str] = &["p", "div", "span"];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "input", "param", "source", "track", "wbr",
];

/// Remote (http/https or protocol-relative) image sources in document order, deduplicated.
pub fn collect_image_sources(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };
    let mut sources: Vec<String> = Vec::new();
    for image in document.select(&selector) {
        let Some(src) = image.value().attr("src").map(str::trim) else {
            continue;
        };
        if remote_image_url(src).is_some() && !sources.iter().any(|s| s == src) {
            sources.push(src.to_string());
        }
    }
    sources
}

/// Absolute download URL for a remote image reference.
pub fn remote_image_url(src: &str) -> Option<Url> {
    let trimmed = src.trim();
    let candidate = if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else {
        trimmed.to_string()
    };
    Url::parse(&candidate)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Rebuild the document body as clean HTML.
///
/// - scripts, styles and document head are removed
/// - presentation attributes and event handlers are removed
/// - images keep only `src` and `alt`; `src` is replaced through `image_rewrites`,
///   and images without a `src` are dropped
/// - comments are dropped and whitespace runs outside `<pre>` collapse to one space
/// - `p`/`div`/`span` wrappers left empty are removed
pub fn sanitize_html(
    html: &str,
    image_rewrites: &HashMap<String, String>,
    default_alt: &str,
) -> String {
    let document = Html::parse_document(html);
    let mut ctx = SanitizeContext::new(image_rewrites, default_alt);

    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next());
    match body {
        Some(body) => ctx.visit_children(*body),
        None => ctx.visit_children(*document.root_element()),
    }

    ctx.builder.trim().to_string()
}

struct SanitizeContext<'r> {
    builder: String,
    rewrites: &'r HashMap<String, String>,
    default_alt: &'r str,
    pre_depth: usize,
}

impl<'r> SanitizeContext<'r> {
    fn new(rewrites: &'r HashMap<String, String>, default_alt: &'r str) -> Self {
        Self {
            builder: String::new(),
            rewrites,
            default_alt,
            pre_depth: 0,
        }
    }

    fn visit_node(&mut self, node: NodeRef<'_, Node>) {
        match node.value() {
            Node::Text(text) => self.append_text(text),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.visit_element(element);
                }
            }
            Node::Comment(_) | Node::Doctype(_) | Node::ProcessingInstruction(_) => {}
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: NodeRef<'_, Node>) {
        for child in node.children() {
            self.visit_node(child);
        }
    }

    fn visit_element(&mut self, element: ElementRef) {
        let tag = element.value().name().to_ascii_lowercase();
        if DROPPED_ELEMENTS.contains(&tag.as_str()) {
            return;
        }
        if tag == "img" {
            self.emit_image(element);
            return;
        }

        let open_at = self.builder.len();
        self.open_tag(&tag, element);
        if VOID_ELEMENTS.contains(&tag.as_str()) {
            return;
        }

        let content_at = self.builder.len();
        let is_pre = tag == "pre";
        if is_pre {
            self.pre_depth += 1;
        }
        self.visit_children(*element);
        if is_pre {
            self.pre_depth -= 1;
        }

        if EMPTY_DROPPABLE.contains(&tag.as_str())
            && self.builder[content_at..].trim().is_empty()
        {
            let had_space = content_at < self.builder.len();
            self.builder.truncate(open_at);
            if had_space && !self.builder.ends_with(' ') {
                self.builder.push(' ');
            }
            return;
        }

        self.builder.push_str("</");
        self.builder.push_str(&tag);
        self.builder.push('>');
    }

    fn open_tag(&mut self, tag: &str, element: ElementRef) {
        self.builder.push('<');
        self.builder.push_str(tag);
        for (name, value) in element.value().attrs() {
            let name = name.to_ascii_lowercase();
            if PRESENTATION_ATTRIBUTES.contains(&name.as_str()) || name.starts_with("on") {
                continue;
            }
            self.push_attribute(&name, value);
        }
        self.builder.push('>');
    }

    /// An `<img>` without a usable `src` is dropped; it would convert to an
    /// empty `![alt]()` token.
    fn emit_image(&mut self, element: ElementRef) {
        let Some(src) = element
            .value()
            .attr("src")
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return;
        };
        let alt = element
            .value()
            .attr("alt")
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(self.default_alt)
            .to_string();
        let src = self
            .rewrites
            .get(src)
            .map(String::as_str)
            .unwrap_or(src)
            .to_string();

        self.builder.push_str("<img");
        self.push_attribute("src", &src);
        self.push_attribute("alt", &alt);
        self.builder.push('>');
    }

    fn push_attribute(&mut self, name: &str, value: &str) {
        self.builder.push(' ');
        self.builder.push_str(name);
        self.builder.push_str("=\"");
        escape_into(&mut self.builder, value, true);
        self.builder.push('"');
    }

    fn append_text(&mut self, text: &str) {
        if self.pre_depth > 0 {
            escape_into(&mut self.builder, text, false);
            return;
        }
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.builder.ends_with(' ') {
                    self.builder.push(' ');
                }
            } else {
                let mut buf = [0u8; 4];
                escape_into(&mut self.builder, ch.encode_utf8(&mut buf), false);
            }
        }
    }
}

fn escape_into(out: &mut String, text: &str, in_attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}
