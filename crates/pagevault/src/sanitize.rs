//! Helpers for keeping span fields and log lines free of sensitive data.
//!
//! Uploaded documents carry personal details, so logs only ever see the
//! file name of a path and a bounded excerpt of recognized text.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Reduces an uploaded file name to a safe single path component:
/// directories are dropped and anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn safe_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.pdf".to_string()
    } else {
        cleaned.to_string()
    }
}

/// First `max_chars` characters of `text` on a single line, with an ellipsis
/// when truncated.
pub fn text_excerpt(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let mut excerpt: String = single_line.chars().take(max_chars).collect();
    excerpt.push('…');
    excerpt
}
