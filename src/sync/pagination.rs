/// Page cursor and termination for one feed.
///
/// `request_next_page` both checks and claims the in-flight slot, so a second
/// caller arriving before the first page lands gets `None` instead of a
/// duplicate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationController {
    cursor: u32,
    page_size: usize,
    has_more: bool,
    is_fetching: bool,
}

impl PaginationController {
    pub fn new(page_size: usize) -> Self {
        Self {
            cursor: 1,
            page_size: page_size.max(1),
            has_more: true,
            is_fetching: false,
        }
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching
    }

    pub fn reset(&mut self) {
        self.cursor = 1;
        self.has_more = true;
        self.is_fetching = false;
    }

    /// The page to fetch next, or `None` when a fetch is in flight or the feed is exhausted.
    pub fn request_next_page(&mut self) -> Option<u32> {
        if self.is_fetching || !self.has_more {
            return None;
        }
        self.is_fetching = true;
        Some(self.cursor)
    }

    pub fn on_page_received(&mut self, received: usize) {
        self.is_fetching = false;
        if received < self.page_size {
            self.has_more = false;
        } else {
            self.cursor += 1;
        }
    }

    /// A failed fetch frees the slot; the same page is retried next time.
    pub fn on_error(&mut self) {
        self.is_fetching = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_pages_advance_cursor() {
        let mut pages = PaginationController::new(10);
        assert_eq!(pages.request_next_page(), Some(1));
        pages.on_page_received(10);
        assert_eq!(pages.request_next_page(), Some(2));
        pages.on_page_received(10);
        assert_eq!(pages.cursor(), 3);
        assert!(pages.has_more());
    }

    #[test]
    fn test_short_page_ends_feed() {
        let mut pages = PaginationController::new(10);
        pages.request_next_page();
        pages.on_page_received(4);
        assert!(!pages.has_more());
        assert_eq!(pages.cursor(), 1);
        assert_eq!(pages.request_next_page(), None);
    }

    #[test]
    fn test_empty_page_ends_feed() {
        let mut pages = PaginationController::new(10);
        pages.request_next_page();
        pages.on_page_received(0);
        assert_eq!(pages.request_next_page(), None);
    }

    #[test]
    fn test_no_second_request_while_fetching() {
        let mut pages = PaginationController::new(10);
        assert_eq!(pages.request_next_page(), Some(1));
        assert_eq!(pages.request_next_page(), None);
        assert!(pages.is_fetching());
    }

    #[test]
    fn test_error_keeps_cursor_and_has_more() {
        let mut pages = PaginationController::new(10);
        pages.request_next_page();
        pages.on_page_received(10);

        assert_eq!(pages.request_next_page(), Some(2));
        pages.on_error();
        assert!(!pages.is_fetching());
        assert!(pages.has_more());
        assert_eq!(pages.request_next_page(), Some(2));
    }

    #[test]
    fn test_reset() {
        let mut pages = PaginationController::new(10);
        pages.request_next_page();
        pages.on_page_received(3);
        pages.reset();
        assert_eq!(pages.cursor(), 1);
        assert!(pages.has_more());
        assert_eq!(pages.request_next_page(), Some(1));
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let pages = PaginationController::new(0);
        assert_eq!(pages.page_size(), 1);
    }
}
