//! URL slugs derived from post titles.

use unicode_normalization::UnicodeNormalization;

/// Maximum slug length, matching the `posts.slug` column.
pub const MAX_SLUG_LEN: usize = 250;

/// Slug used when a title contains nothing sluggable.
pub const FALLBACK_SLUG: &str = "post";

/// Convert a title into a lowercase, hyphen-separated slug.
///
/// The title is NFKD-decomposed so accented letters keep their ASCII base,
/// and any remaining non-ASCII is dropped. ASCII letters, digits and
/// underscores are kept; runs of whitespace and hyphens become a single `-`;
/// everything else is dropped. Leading and trailing `-`/`_` are stripped.
///
/// ```
/// use quill_core::domain::slug::slugify;
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("Café über Naïve"), "cafe-uber-naive");
/// ```
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.nfkd().filter(char::is_ascii) {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_separator = true;
        }
    }

    let trimmed = slug.trim_matches(|c| c == '-' || c == '_');
    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        truncate(trimmed, MAX_SLUG_LEN).to_string()
    }
}

/// Candidate slug for the given attempt: the base first, then `base-2`, `base-3`...
///
/// The base is shortened so the candidate never exceeds [`MAX_SLUG_LEN`].
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        return truncate(base, MAX_SLUG_LEN).to_string();
    }
    let suffix = format!("-{attempt}");
    let head = truncate(base, MAX_SLUG_LEN - suffix.len()).trim_end_matches('-');
    format!("{head}{suffix}")
}

// Slugs are ASCII so byte slicing is safe.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() > max { &s[..max] } else { s }
}
