use unicode_normalization::UnicodeNormalization;

/// Folder name used when text has no ASCII letters or digits left
pub const FALLBACK_SLUG: &str = "misc";

/// ASCII, lowercase, hyphen-separated folder name; never empty
pub fn slugify(text: &str) -> String {
    let slug = slug_or_empty(text);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Same as [`slugify`] but returns an empty string instead of the fallback
pub fn slug_or_empty(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    // NFKD splits accented letters so the ASCII base survives
    for c in text.nfkd().filter(char::is_ascii) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen {
                slug.push('-');
                pending_hyphen = false;
            }
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() {
            pending_hyphen = true;
        }
    }

    slug
}
