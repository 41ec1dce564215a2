use migrator_core::CampaignId;
use sha2::{Digest, Sha256};
use url::Url;

/// Longest CDN public id produced by [`cdn_public_id`].
pub const MAX_PUBLIC_ID_LEN: usize = 60;
const HASH_LEN: usize = 8;

/// Windows-safe, deterministic artifact filename: `{campaign_id}.md`.
pub fn artifact_filename(id: &CampaignId) -> String {
    format!("{}.md", sanitize_file_stem(id.as_str()))
}

/// CDN key for an image: `{title}_{basename}` with every non-alphanumeric
/// character replaced by `_`. Keys longer than the limit keep a prefix and end
/// in a short hash of the full key, so distinct images of a long-titled
/// campaign do not collapse onto one object.
pub fn cdn_public_id(title: &str, source_url: &str) -> String {
    let raw = format!("{}_{}", title, url_basename(source_url));
    let key: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if key.len() <= MAX_PUBLIC_ID_LEN {
        return key;
    }
    let hash = short_hash(&key);
    let keep = MAX_PUBLIC_ID_LEN - HASH_LEN - 1;
    format!("{}_{hash}", &key[..keep])
}

fn url_basename(source_url: &str) -> String {
    if let Ok(url) = Url::parse(source_url) {
        if let Some(last) = url.path_segments().and_then(|mut s| s.next_back()) {
            if !last.is_empty() {
                return last.to_string();
            }
        }
        return url.host_str().unwrap_or_default().to_string();
    }
    let without_query = source_url.split(['?', '#']).next().unwrap_or(source_url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn sanitize_file_stem(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if cleaned.is_empty() {
        cleaned = "campaign".to_string();
    }
    // Collapse multiple underscores
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(HASH_LEN);
    for byte in digest.iter().take(HASH_LEN / 2) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::url_basename;

    #[test]
    fn basename_ignores_query_and_fragment() {
        assert_eq!(url_basename("https://cdn.example/a/b/pic.png?w=600#x"), "pic.png");
        assert_eq!(url_basename("images/pic.png?x=1"), "pic.png");
        assert_eq!(url_basename("https://cdn.example/"), "cdn.example");
    }
}
