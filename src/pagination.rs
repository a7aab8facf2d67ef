use std::ops::{Range, RangeInclusive};

/// Number of page buttons in the pagination strip.
pub const PAGE_WINDOW: usize = 5;

/// One based page position over a list of `total` items.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    page: usize,
    page_size: usize,
    total: usize,
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: 0,
        }
    }

    /// A new item count always returns to the first page.
    pub fn reset(&mut self, total: usize) {
        self.total = total;
        self.page = 1;
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.total, self.page_size)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Moves to `page`, out of range requests are ignored.
    pub fn go_to(&mut self, page: usize) -> bool {
        if page >= 1 && page <= self.total_pages() && page != self.page {
            self.page = page;
            true
        } else {
            false
        }
    }

    pub fn next(&mut self) -> bool {
        self.has_next() && self.go_to(self.page + 1)
    }

    pub fn previous(&mut self) -> bool {
        self.has_previous() && self.go_to(self.page - 1)
    }

    pub fn first(&mut self) -> bool {
        self.go_to(1)
    }

    pub fn last(&mut self) -> bool {
        self.go_to(self.total_pages())
    }

    /// Item positions shown on the current page.
    pub fn range(&self) -> Range<usize> {
        let start = ((self.page - 1) * self.page_size).min(self.total);
        let end = (start + self.page_size).min(self.total);
        start..end
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        page(items, self.page, self.page_size)
    }

    /// Page numbers of the pagination strip: at most [`PAGE_WINDOW`], centered
    /// on the current page where possible.
    pub fn window(&self) -> RangeInclusive<usize> {
        let total = self.total_pages();
        let mut start = self.page.saturating_sub(PAGE_WINDOW / 2).max(1);
        let end = (start + PAGE_WINDOW - 1).min(total);
        if end + 1 - start < PAGE_WINDOW {
            start = (end + 1).saturating_sub(PAGE_WINDOW).max(1);
        }
        start..=end
    }
}

/// `ceil(count / page_size)`, never less than one.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1)).max(1)
}

/// The items of one based page `page_number`; empty past the end.
pub fn page<T>(items: &[T], page_number: usize, page_size: usize) -> &[T] {
    let page_size = page_size.max(1);
    let start = page_number.saturating_sub(1).saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_cover_items_exactly_once() {
        let items: Vec<usize> = (0..103).collect();
        for size in [1, 7, 10, 50, 103, 200] {
            let pages = total_pages(items.len(), size);
            let joined: Vec<usize> = (1..=pages)
                .flat_map(|p| page(&items, p, size).iter().copied())
                .collect();
            assert_eq!(joined, items, "page size {size}");
        }
    }

    #[test]
    fn total_pages_minimum_one() {
        assert_eq!(total_pages(0, 50), 1);
        assert_eq!(total_pages(50, 50), 1);
        assert_eq!(total_pages(51, 50), 2);
        assert_eq!(total_pages(2, 1), 2);
    }

    #[test]
    fn navigation_is_clamped() {
        let mut p = Pagination::new(10);
        p.reset(25);
        assert!(!p.previous());
        assert!(p.next());
        assert!(p.next());
        assert!(!p.next());
        assert_eq!(p.page(), 3);
        assert_eq!(p.range(), 20..25);
        assert!(!p.go_to(4));
        assert!(!p.go_to(0));
        p.reset(5);
        assert_eq!(p.page(), 1);
        assert_eq!(p.total_pages(), 1);
    }

    #[test]
    fn empty_list_has_one_empty_page() {
        let mut p = Pagination::new(10);
        p.reset(0);
        assert_eq!(p.range(), 0..0);
        assert_eq!(p.window(), 1..=1);
        assert!(p.slice::<u8>(&[]).is_empty());
    }

    #[test]
    fn window_slides_and_clamps() {
        let mut p = Pagination::new(1);
        p.reset(20);
        assert_eq!(p.window(), 1..=5);
        p.go_to(3);
        assert_eq!(p.window(), 1..=5);
        p.go_to(10);
        assert_eq!(p.window(), 8..=12);
        p.go_to(20);
        assert_eq!(p.window(), 16..=20);
        p.reset(3);
        p.go_to(2);
        assert_eq!(p.window(), 1..=3);
    }
}
