//! Cache key for rendered feed pages.

use crate::application::pagination::parse_page_param;

/// Key for one rendered page of the global feed. Pages expire
/// independently, each on its own first-render timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedPageKey {
    pub page: usize,
}

impl FeedPageKey {
    /// Derive the key from a raw query string. Uses the same lenient page
    /// parsing as the paginator, so `/`, `/?page=junk` and `/?page=1`
    /// share one entry.
    pub fn from_query(query: Option<&str>) -> Self {
        let page = query.and_then(|raw| {
            url::form_urlencoded::parse(raw.as_bytes())
                .find(|(name, _)| name == "page")
                .map(|(_, value)| value.into_owned())
        });

        Self {
            page: parse_page_param(page.as_deref()),
        }
    }
}
