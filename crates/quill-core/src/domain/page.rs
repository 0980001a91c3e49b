use serde::{Deserialize, Serialize};

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    /// Build a request; a missing page means the first page.
    ///
    /// Page zero is out of range like any page past the end, and lands on
    /// the last page once [`clamped`](Self::clamped).
    pub fn new(page: Option<u64>, per_page: u64) -> Self {
        let page = match page {
            None => 1,
            Some(0) => u64::MAX,
            Some(p) => p,
        };
        Self {
            page,
            per_page: per_page.max(1),
        }
    }

    /// Pull the page back onto the last page when it runs past the end.
    pub fn clamped(self, total_items: u64) -> Self {
        let last = total_pages(total_items, self.per_page);
        Self {
            page: self.page.min(last),
            ..self
        }
    }

    /// Zero-based page index, as SeaORM's paginator expects.
    pub fn index(&self) -> u64 {
        self.page - 1
    }

    pub fn offset(&self) -> u64 {
        self.index() * self.per_page
    }
}

/// Number of pages needed for `total_items`; an empty result still has one page.
pub fn total_pages(total_items: u64, per_page: u64) -> u64 {
    total_items.div_ceil(per_page.max(1)).max(1)
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total_items,
            total_pages: total_pages(total_items, request.per_page),
        }
    }

    /// Slice an already filtered and ordered collection.
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total_items = all.len() as u64;
        let request = request.clamped(total_items);
        let items = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.per_page as usize)
            .collect();
        Self::new(items, request, total_items)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_page_defaults_to_first() {
        assert_eq!(PageRequest::new(None, 5).page, 1);
    }

    #[test]
    fn test_page_zero_clamps_to_last() {
        let page = Page::from_vec((1..=12).collect::<Vec<_>>(), PageRequest::new(Some(0), 5));
        assert_eq!(page.page, 3);
        assert_eq!(page.items, vec![11, 12]);
    }

    #[test]
    fn test_out_of_range_page_clamps_to_last() {
        let page = Page::from_vec((1..=12).collect::<Vec<_>>(), PageRequest::new(Some(9), 5));
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items, vec![11, 12]);
        assert!(!page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn test_empty_result_has_one_page() {
        let page = Page::from_vec(Vec::<u8>::new(), PageRequest::new(Some(4), 10));
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
    }
}
