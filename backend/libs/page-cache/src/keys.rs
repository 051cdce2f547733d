//! Page cache key schema
//!
//! Key format: v{VERSION}:{prefix}:{viewer}:{page}

/// Bump when the rendered markup changes shape so old entries are ignored
pub const CACHE_VERSION: u32 = 1;

/// Cache key builder
pub struct PageKey;

impl PageKey {
    /// Key for one rendering of a cached page.
    ///
    /// `viewer` scopes the entry so a signed-in nav bar is never served to
    /// somebody else. `page` is the normalised page token, never raw input.
    /// Format: v1:{prefix}:{anon|u<id>}:{page}
    pub fn page(prefix: &str, viewer: Option<i64>, page: &str) -> String {
        let viewer = match viewer {
            Some(id) => format!("u{}", id),
            None => "anon".to_string(),
        };
        format!("v{}:{}:{}:{}", CACHE_VERSION, prefix, viewer, page)
    }

    /// Prefix covering every rendering stored under `prefix`
    pub fn prefix(prefix: &str) -> String {
        format!("v{}:{}:", CACHE_VERSION, prefix)
    }
}

/// Extract the page prefix from a key for metrics labeling
pub(crate) fn extract_prefix(key: &str) -> &str {
    key.split(':').nth(1).unwrap_or("unknown")
}
