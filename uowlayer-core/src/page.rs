//! Paging types shared by every backend.
//!
//! Pages are addressed with a 0-based `page_index`. [`PaginationParams`]
//! carries the requested page and computes the offset; [`PagedList`] is the
//! result, carrying the items of one page together with the totals needed to
//! navigate the rest.
//!
//! Backends produce a [`PagedList`] in one of two ways: by draining a
//! cursor and slicing it in memory ([`PaginationParams::paginate`]), or by
//! letting the store count and slice in a single aggregation and assembling
//! the result with [`PagedList::new`].

use serde::{Deserialize, Serialize};
use std::cmp::min;

use crate::error::{UnitOfWorkError, UnitOfWorkResult};

/// Number of pages needed to hold `total_count` items, `page_size` per page.
///
/// Returns `0` for a page size of zero instead of dividing by zero; callers
/// reject such sizes through [`PaginationParams::validate`] first.
pub fn total_pages(total_count: u64, page_size: usize) -> u64 {
    if page_size == 0 {
        return 0;
    }

    total_count.div_ceil(page_size as u64)
}

/// One page of results plus the totals of the whole result set.
///
/// # Example
///
/// ```ignore
/// use uowlayer::page::PaginationParams;
///
/// let params = PaginationParams::new(2, 10);
/// let page = params.paginate((1..=25).collect::<Vec<i32>>())?;
///
/// assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
/// assert_eq!(page.total_pages, 3);
/// assert!(!page.has_next_page());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PagedList<T> {
    /// The 0-based index of this page.
    pub page_index: usize,
    /// The requested page size.
    pub page_size: usize,
    /// Number of items matching the query across all pages.
    pub total_count: u64,
    /// `ceil(total_count / page_size)`.
    pub total_pages: u64,
    /// The items of this page, in the requested sort order.
    pub items: Vec<T>,
}

impl<T> PagedList<T> {
    /// Assembles a page from items already sliced by the store.
    pub fn new(params: &PaginationParams, total_count: u64, items: Vec<T>) -> Self {
        Self {
            page_index: params.page_index,
            page_size: params.page_size,
            total_count,
            total_pages: total_pages(total_count, params.page_size),
            items,
        }
    }

    /// Creates an empty page for `params`.
    pub fn empty(params: &PaginationParams) -> Self {
        Self::new(params, 0, Vec::new())
    }

    /// Returns `true` if a page precedes this one.
    pub fn has_previous_page(&self) -> bool {
        self.page_index > 0
    }

    /// Returns `true` if a page follows this one.
    pub fn has_next_page(&self) -> bool {
        (self.page_index as u64).saturating_add(1) < self.total_pages
    }

    /// Converts every item, keeping the paging metadata.
    ///
    /// # Arguments
    ///
    /// * `converter` - Applied to each item in order
    pub fn map<U>(self, converter: impl FnMut(T) -> U) -> PagedList<U> {
        PagedList {
            page_index: self.page_index,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
            items: self.items.into_iter().map(converter).collect(),
        }
    }
}

/// Identifies the page to retrieve.
///
/// # Example
///
/// ```ignore
/// use uowlayer::page::PaginationParams;
///
/// let params = PaginationParams::new(3, 20);
/// assert_eq!(params.offset(), 60);
///
/// // page numbers as shown in a UI start at 1
/// assert_eq!(PaginationParams::from_page_number(3, 20), PaginationParams::new(2, 20));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// The 0-based page index.
    pub page_index: usize,
    /// Number of items per page.
    pub page_size: usize,
}

impl PaginationParams {
    /// Creates pagination parameters for a 0-based page index.
    ///
    /// # Arguments
    ///
    /// * `page_index` - The page index, starting at 0
    /// * `page_size` - Number of items per page
    pub fn new(page_index: usize, page_size: usize) -> Self {
        Self { page_index, page_size }
    }

    /// Creates pagination parameters from a 1-based page number.
    /// Page number `0` is treated as the first page.
    pub fn from_page_number(page_number: usize, page_size: usize) -> Self {
        Self::new(page_number.saturating_sub(1), page_size)
    }

    /// Rejects parameters that cannot address a page.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::InvalidArgument`] when `page_size` is zero.
    pub fn validate(&self) -> UnitOfWorkResult<()> {
        if self.page_size == 0 {
            return Err(UnitOfWorkError::InvalidArgument(
                "page size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Number of items to skip to reach this page.
    pub fn offset(&self) -> usize {
        self.page_index.saturating_mul(self.page_size)
    }

    /// Slices an already materialized, already sorted result set.
    ///
    /// `total_count` is the length of `items`. A page index past the last page
    /// yields an empty page with correct totals.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::InvalidArgument`] when `page_size` is zero.
    pub fn paginate<T>(&self, items: Vec<T>) -> UnitOfWorkResult<PagedList<T>> {
        self.validate()?;

        let total_count = items.len() as u64;
        let start = min(self.offset(), items.len());
        let end = min(start.saturating_add(self.page_size), items.len());

        let page = items.into_iter().skip(start).take(end - start).collect();

        Ok(PagedList::new(self, total_count, page))
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page_index: 0, page_size: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(25, 10), 3);
        assert_eq!(total_pages(25, 0), 0);
    }

    #[test]
    fn paginate_slices_by_zero_based_index() {
        let ids: Vec<i32> = (1..=25).collect();

        let first = PaginationParams::new(0, 10).paginate(ids.clone()).unwrap();
        assert_eq!(first.items, (1..=10).collect::<Vec<_>>());
        assert_eq!(first.total_count, 25);
        assert_eq!(first.total_pages, 3);
        assert!(!first.has_previous_page());
        assert!(first.has_next_page());

        let last = PaginationParams::new(2, 10).paginate(ids).unwrap();
        assert_eq!(last.items, vec![21, 22, 23, 24, 25]);
        assert!(last.has_previous_page());
        assert!(!last.has_next_page());
    }

    #[test]
    fn page_past_the_end_is_empty_with_totals() {
        let page = PaginationParams::new(9, 10)
            .paginate((1..=25).collect::<Vec<i32>>())
            .unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page_index, 9);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let error = PaginationParams::new(0, 0).paginate(vec![1, 2, 3]).unwrap_err();
        assert!(matches!(error, UnitOfWorkError::InvalidArgument(_)));
    }

    #[test]
    fn huge_index_does_not_overflow() {
        let params = PaginationParams::new(usize::MAX, 10);
        assert_eq!(params.offset(), usize::MAX);
        assert!(params.paginate(vec![1]).unwrap().items.is_empty());
    }

    #[test]
    fn page_numbers_start_at_one() {
        assert_eq!(PaginationParams::from_page_number(1, 10), PaginationParams::new(0, 10));
        assert_eq!(PaginationParams::from_page_number(0, 10), PaginationParams::new(0, 10));
    }

    #[test]
    fn map_keeps_metadata() {
        let page = PaginationParams::new(1, 2).paginate(vec![1, 2, 3]).unwrap();
        let mapped = page.map(|item| item.to_string());

        assert_eq!(mapped.items, vec!["3".to_string()]);
        assert_eq!(mapped.page_index, 1);
        assert_eq!(mapped.total_pages, 2);
    }
}
