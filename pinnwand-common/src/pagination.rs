//! Splitting ordered listings into numbered pages.
//!
//! Requested page numbers never fail: anything that is not an integer resolves to the first
//! page, and numbers outside `1..=num_pages` resolve to the last one.

use serde::Serialize;
use std::num::{IntErrorKind, NonZeroU32};

pub const DEFAULT_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(10).unwrap();

/// Page arithmetic for a listing of `count` records.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Paginator {
    count: u64,
    per_page: NonZeroU32,
}

/// The resolved position of one page inside a listing.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageWindow {
    number: u64,
    num_pages: u64,
    count: u64,
    per_page: NonZeroU32,
}

/// One page of a listing, as handed to a view.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<u64>,
    pub previous_page_number: Option<u64>,
    pub start_index: u64,
    pub end_index: u64,
}

impl Paginator {
    #[must_use]
    pub fn new(count: u64, per_page: NonZeroU32) -> Self {
        Self { count, per_page }
    }

    /// Always at least one; an empty listing has a single empty page.
    #[must_use]
    pub fn num_pages(self) -> u64 {
        self.count.div_ceil(u64::from(self.per_page.get())).max(1)
    }

    /// Resolves a raw `page` query value.
    #[must_use]
    pub fn window(self, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages();
        let number = match requested.and_then(parse_page_number) {
            None => 1,
            Some(number) if number < 1 => num_pages,
            Some(number) => u64::try_from(number).map_or(num_pages, |n| n.min(num_pages)),
        };

        PageWindow {
            number,
            num_pages,
            count: self.count,
            per_page: self.per_page,
        }
    }
}

fn parse_page_number(raw: &str) -> Option<i64> {
    match raw.trim().parse::<i64>() {
        Ok(number) => Some(number),
        // Too large to count, but still a number past either end.
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => Some(i64::MAX),
        Err(err) if *err.kind() == IntErrorKind::NegOverflow => Some(i64::MIN),
        Err(_) => None,
    }
}

impl PageWindow {
    #[must_use]
    pub fn number(self) -> u64 {
        self.number
    }

    #[must_use]
    pub fn num_pages(self) -> u64 {
        self.num_pages
    }

    /// Number of records to skip before this page.
    #[must_use]
    pub fn offset(self) -> u64 {
        (self.number - 1) * self.limit()
    }

    #[must_use]
    pub fn limit(self) -> u64 {
        u64::from(self.per_page.get())
    }

    #[must_use]
    pub fn has_next(self) -> bool {
        self.number < self.num_pages
    }

    #[must_use]
    pub fn has_previous(self) -> bool {
        self.number > 1
    }

    /// One-based index of the first record on this page, zero for an empty listing.
    #[must_use]
    pub fn start_index(self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.offset() + 1
        }
    }

    #[must_use]
    pub fn end_index(self) -> u64 {
        if self.number == self.num_pages {
            self.count
        } else {
            self.number * self.limit()
        }
    }

    #[must_use]
    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next: self.has_next(),
            has_previous: self.has_previous(),
            next_page_number: self.has_next().then_some(self.number + 1),
            previous_page_number: self.has_previous().then_some(self.number - 1),
            start_index: self.start_index(),
            end_index: self.end_index(),
        }
    }
}

impl<T> Page<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_PAGE_SIZE, Page, PageWindow, Paginator};
    use std::num::NonZeroU32;

    fn records(n: u64) -> Vec<u64> {
        (1..=n).collect()
    }

    /// Pages a fully loaded listing the way a query with `LIMIT`/`OFFSET` would.
    fn page_of(window: PageWindow, all: &[u64]) -> Page<u64> {
        let items = all
            .iter()
            .skip(usize::try_from(window.offset()).unwrap())
            .take(usize::try_from(window.limit()).unwrap())
            .copied()
            .collect();
        window.into_page(items)
    }

    #[test]
    fn eleven_records_make_two_pages() {
        let all = records(11);
        let paginator = Paginator::new(11, DEFAULT_PAGE_SIZE);

        let first = page_of(paginator.window(None), &all);
        assert_eq!(first.len(), 10);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.next_page_number, Some(2));

        let second = page_of(paginator.window(Some("2")), &all);
        assert_eq!(second.items, vec![11]);
        assert!(!second.has_next);
        assert_eq!(second.previous_page_number, Some(1));
        assert_eq!((second.start_index, second.end_index), (11, 11));
    }

    #[test]
    fn invalid_numbers_resolve_to_first_page() {
        let paginator = Paginator::new(30, DEFAULT_PAGE_SIZE);

        for raw in ["", "abc", "2.0", "2.5", "NaN"] {
            assert_eq!(paginator.window(Some(raw)).number(), 1, "{raw:?}");
        }
        assert_eq!(paginator.window(Some(" 2 ")).number(), 2);
    }

    #[test]
    fn out_of_range_numbers_resolve_to_last_page() {
        let paginator = Paginator::new(30, DEFAULT_PAGE_SIZE);

        for raw in ["0", "-4", "4", "99999999999999999999", "-99999999999999999999"] {
            assert_eq!(paginator.window(Some(raw)).number(), 3, "{raw:?}");
        }
    }

    #[test]
    fn empty_listing_has_one_empty_page() {
        let paginator = Paginator::new(0, DEFAULT_PAGE_SIZE);
        assert_eq!(paginator.num_pages(), 1);

        let page = page_of(paginator.window(Some("5")), &[]);
        assert_eq!(page.number, 1);
        assert!(page.is_empty());
        assert_eq!((page.start_index, page.end_index), (0, 0));
    }

    #[test]
    fn window_offsets() {
        let per_page = NonZeroU32::new(3).unwrap();
        let window = Paginator::new(8, per_page).window(Some("3"));

        assert_eq!((window.offset(), window.limit()), (6, 3));
        assert_eq!(page_of(window, &records(8)).items, vec![7, 8]);
    }
}
