//! Feed pagination
//!
//! Page numbers arrive as raw query strings. Anything non-numeric resolves
//! to page 1 and anything out of range resolves to the last page, so a
//! feed request never fails on its page argument.

use serde::Serialize;

/// Position of a page inside a collection, computed before the slice is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: usize,
    pub num_pages: usize,
    pub per_page: usize,
    pub count: usize,
}

impl PageRequest {
    /// Resolve the raw `page` query value against a collection of `count` items
    pub fn resolve(raw: Option<&str>, per_page: usize, count: usize) -> Self {
        let per_page = per_page.max(1);
        let num_pages = count.div_ceil(per_page).max(1);

        let number = match raw.map(str::trim).map(str::parse::<i128>) {
            Some(Ok(n)) if n >= 1 && n <= num_pages as i128 => n as usize,
            Some(Ok(_)) => num_pages,
            Some(Err(_)) | None => 1,
        };

        Self {
            number,
            num_pages,
            per_page,
            count,
        }
    }

    /// Canonical form of a raw page value, for use in cache keys.
    ///
    /// Values that resolve the same way without knowing the collection size
    /// share a token: non-numeric input is `1`, anything below 1 is `last`.
    pub fn cache_token(raw: Option<&str>) -> String {
        match raw.map(str::trim).map(str::parse::<i128>) {
            Some(Ok(n)) if n >= 1 => n.to_string(),
            Some(Ok(_)) => "last".to_string(),
            Some(Err(_)) | None => "1".to_string(),
        }
    }

    pub fn offset(&self) -> usize {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> usize {
        self.per_page
    }

    /// Attach the fetched slice
    pub fn with_items<T>(self, items: Vec<T>) -> Page<T> {
        let number = self.number;
        let num_pages = self.num_pages;
        Page {
            items,
            number,
            num_pages,
            count: self.count,
            has_next: number < num_pages,
            has_previous: number > 1,
            next_page_number: (number < num_pages).then_some(number + 1),
            previous_page_number: (number > 1).then_some(number - 1),
            page_range: (1..=num_pages).collect(),
        }
    }
}

/// One page of a feed plus the navigation metadata templates render
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<usize>,
    pub previous_page_number: Option<usize>,
    pub page_range: Vec<usize>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Paginate an already-materialized, already-ordered collection
pub fn paginate_vec<T: Clone>(items: &[T], raw: Option<&str>, per_page: usize) -> Page<T> {
    let request = PageRequest::resolve(raw, per_page, items.len());
    let slice = items
        .iter()
        .skip(request.offset())
        .take(request.limit())
        .cloned()
        .collect();
    request.with_items(slice)
}
