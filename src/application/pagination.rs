//! Page-number pagination over composer-ordered sequences.

/// One page sliced out of an ordered sequence. Slicing never re-orders the
/// input; `items` keep the order the composer produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    items: Vec<T>,
    number: usize,
    total_items: usize,
    total_pages: usize,
}

impl<T> Page<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

/// Normalise the raw `page` query value: absent, unparseable or below 1
/// all mean page 1.
pub fn parse_page_param(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|page| *page >= 1)
        .unwrap_or(1)
}

/// Slice `items` into the requested page. Requests past the last page are
/// clamped to the last page rather than returning an empty slice; an empty
/// sequence yields a single empty page.
pub fn paginate<T>(items: Vec<T>, page_size: usize, requested: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let number = requested.clamp(1, total_pages);

    let start = (number - 1) * page_size;
    let items = items.into_iter().skip(start).take(page_size).collect();

    Page {
        items,
        number,
        total_items,
        total_pages,
    }
}
