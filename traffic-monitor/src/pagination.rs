// traffic-monitor/src/pagination.rs
use serde::Serialize;

/// Number of page buttons offered around the current page
const PAGE_WINDOW: u32 = 5;

/// Position within the paginated history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current: u32,
    pub total: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { current: 1, total: 1 }
    }
}

impl Pagination {
    pub fn has_previous(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total
    }

    pub fn contains(&self, page: u32) -> bool {
        page >= 1 && page <= self.total
    }

    /// Page numbers to offer, centred on the current page where possible
    pub fn visible_pages(&self) -> Vec<u32> {
        let start = i64::from(self.current) - 2;
        (0..PAGE_WINDOW.min(self.total))
            .map(|offset| start + i64::from(offset))
            .filter(|&page| page >= 1 && page <= i64::from(self.total))
            .map(|page| page as u32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_in_the_middle() {
        let p = Pagination { current: 5, total: 10 };
        assert_eq!(p.visible_pages(), vec![3, 4, 5, 6, 7]);
        assert!(p.has_previous());
        assert!(p.has_next());
    }

    #[test]
    fn test_window_clipped_at_edges() {
        let first = Pagination { current: 1, total: 10 };
        assert_eq!(first.visible_pages(), vec![1, 2, 3]);
        assert!(!first.has_previous());

        let last = Pagination { current: 10, total: 10 };
        assert_eq!(last.visible_pages(), vec![8, 9, 10]);
        assert!(!last.has_next());
    }

    #[test]
    fn test_single_page() {
        let p = Pagination::default();
        assert_eq!(p.visible_pages(), vec![1]);
        assert!(p.contains(1));
        assert!(!p.contains(0));
        assert!(!p.contains(2));
    }
}
