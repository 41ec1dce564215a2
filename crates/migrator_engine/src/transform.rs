use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use migrator_logging::{migrator_debug, migrator_warn};

use crate::convert::{collapse_blank_lines, Converter, Html2MdConverter};
use crate::rehost::ImageRehoster;
use crate::sanitize::{collect_image_sources, sanitize_html, DEFAULT_ALT_TEXT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// Markdown, or the untouched input when `fell_back` is set.
    pub content: String,
    pub rehosted_images: usize,
    pub failed_images: usize,
    pub fell_back: bool,
}

/// Turns campaign HTML into Markdown, rehosting remote images when a
/// rehoster is configured. Never fails: if sanitizing or converting breaks
/// down, the original HTML is returned with `fell_back` set.
pub struct ContentTransformer {
    rehoster: Option<ImageRehoster>,
    converter: Box<dyn Converter>,
}

impl ContentTransformer {
    pub fn new() -> Self {
        Self {
            rehoster: None,
            converter: Box::new(Html2MdConverter),
        }
    }

    pub fn with_rehoster(mut self, rehoster: ImageRehoster) -> Self {
        self.rehoster = Some(rehoster);
        self
    }

    pub fn with_converter(mut self, converter: Box<dyn Converter>) -> Self {
        self.converter = converter;
        self
    }

    pub async fn transform(&self, html: &str, title: &str) -> TransformOutput {
        let (rewrites, failed_images) = self.rehost_images(html, title).await;
        let rehosted_images = rewrites.len();

        let converted = panic::catch_unwind(AssertUnwindSafe(|| self.convert(html, &rewrites)));
        match converted {
            Ok(markdown) => TransformOutput {
                content: markdown,
                rehosted_images,
                failed_images,
                fell_back: false,
            },
            Err(payload) => {
                migrator_warn!(
                    "Conversion of '{}' failed ({}); keeping original HTML",
                    title,
                    panic_message(payload.as_ref())
                );
                TransformOutput {
                    content: html.to_string(),
                    rehosted_images: 0,
                    failed_images,
                    fell_back: true,
                }
            }
        }
    }

    fn convert(&self, html: &str, rewrites: &HashMap<String, String>) -> String {
        let cleaned = sanitize_html(html, rewrites, DEFAULT_ALT_TEXT);
        collapse_blank_lines(&self.converter.to_markdown(&cleaned))
    }

    async fn rehost_images(&self, html: &str, title: &str) -> (HashMap<String, String>, usize) {
        let mut rewrites = HashMap::new();
        let Some(rehoster) = &self.rehoster else {
            return (rewrites, 0);
        };

        let sources = panic::catch_unwind(|| collect_image_sources(html)).unwrap_or_default();
        let mut failed = 0;
        for src in sources {
            match rehoster.rehost(&src, title).await {
                Ok(hosted) => {
                    migrator_debug!("Rehosted {} -> {}", src, hosted);
                    rewrites.insert(src, hosted);
                }
                Err(err) => {
                    migrator_warn!("Keeping original image {}: {}", src, err);
                    failed += 1;
                }
            }
        }
        (rewrites, failed)
    }
}

impl Default for ContentTransformer {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "converter panicked".to_string()
    }
}
