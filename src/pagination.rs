//! This modules defines the common functionality for paging data.

use serde::Serialize;

/// The config for pagination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The maximum transactions to display per page when not specified in a request.
    pub default_page_size: u64,
    /// The page sizes offered to clients.
    pub page_size_options: Vec<u64>,
    /// A page size at or above this value disables windowing and returns
    /// every matching row as a single page.
    pub unbounded_limit: u64,
    /// The maximum number of pages to show in the pagination indicator.
    pub max_pages: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 10,
            page_size_options: vec![5, 10, 20, 50, 100, 1000],
            unbounded_limit: 1000,
            max_pages: 5,
        }
    }
}

impl PaginationConfig {
    /// Replace missing or out-of-range page numbers and sizes with the defaults.
    pub fn normalize(&self, page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
        let page = page.filter(|&page| page >= 1).unwrap_or(self.default_page);
        let limit = limit
            .filter(|&limit| limit >= 1)
            .unwrap_or(self.default_page_size);

        (page, limit)
    }

    /// Whether `limit` requests every row at once.
    pub fn is_unbounded(&self, limit: u64) -> bool {
        limit >= self.unbounded_limit
    }
}

/// Where a page sits within the filtered result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// The requested page, starting at 1.
    pub current_page: u64,
    /// The number of pages, never less than 1.
    pub total_pages: u64,
    /// The number of rows matching the filter across all pages.
    pub total_filtered_count: u64,
    /// Whether there is a page after `current_page`.
    pub has_next_page: bool,
    /// Whether there is a page before `current_page`.
    pub has_previous_page: bool,
    /// The requested page size.
    pub limit: u64,
    /// Whether windowing was disabled for this page.
    pub unbounded: bool,
}

impl PageInfo {
    /// Derive the page info for a windowed page.
    ///
    /// `page` and `limit` are clamped to at least 1.
    pub fn new(page: u64, limit: u64, total_filtered_count: u64) -> Self {
        let limit = limit.max(1);
        let current_page = page.max(1);
        let total_pages = total_filtered_count.div_ceil(limit).max(1);

        Self {
            current_page,
            total_pages,
            total_filtered_count,
            has_next_page: current_page < total_pages,
            has_previous_page: current_page > 1,
            limit,
            unbounded: false,
        }
    }

    /// The page info for a request that returns every row as page 1 of 1.
    pub fn unbounded(limit: u64, total_filtered_count: u64) -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            total_filtered_count,
            has_next_page: false,
            has_previous_page: false,
            limit,
            unbounded: true,
        }
    }

    /// Recompute the derived fields after the filtered count changed.
    pub fn with_total(&self, total_filtered_count: u64) -> Self {
        if self.unbounded {
            Self::unbounded(self.limit, total_filtered_count)
        } else {
            Self::new(self.current_page, self.limit, total_filtered_count)
        }
    }

    /// The number of rows before the first row of the page.
    pub fn offset(&self) -> u64 {
        if self.unbounded {
            0
        } else {
            (self.current_page - 1).saturating_mul(self.limit)
        }
    }

    /// The 1-based position of the first row on the page, 0 if the page is empty.
    pub fn first_item(&self) -> u64 {
        if self.offset() >= self.total_filtered_count {
            0
        } else {
            self.offset() + 1
        }
    }

    /// The 1-based position of the last row on the page, 0 if the page is empty.
    pub fn last_item(&self) -> u64 {
        if self.first_item() == 0 {
            0
        } else if self.unbounded {
            self.total_filtered_count
        } else {
            (self.offset() + self.limit).min(self.total_filtered_count)
        }
    }

    /// The page links to show for this page.
    pub fn indicators(&self, max_pages: u64) -> Vec<PaginationIndicator> {
        create_pagination_indicators(
            self.current_page.min(self.total_pages),
            self.total_pages,
            max_pages,
        )
    }
}

/// One element of a page navigation control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "page", rename_all = "camelCase")]
pub enum PaginationIndicator {
    /// A link to another page.
    Page(u64),
    /// The page being shown.
    CurrPage(u64),
    /// A gap in the page numbers.
    Ellipsis,
    /// A link to the next page.
    NextButton(u64),
    /// A link to the previous page.
    BackButton(u64),
}

/// Lay out the page links for page `curr_page` of `page_count`, showing at
/// most `max_pages` consecutive page numbers.
pub fn create_pagination_indicators(
    curr_page: u64,
    page_count: u64,
    max_pages: u64,
) -> Vec<PaginationIndicator> {
    let map_page = |page| {
        if page == curr_page {
            PaginationIndicator::CurrPage(page)
        } else {
            PaginationIndicator::Page(page)
        }
    };

    let mut indicators: Vec<PaginationIndicator> = if page_count <= max_pages {
        (1..=page_count).map(map_page).collect()
    } else if curr_page <= (max_pages / 2) {
        (1..=max_pages).map(map_page).collect()
    } else if curr_page > (page_count - max_pages / 2) {
        ((page_count - max_pages + 1)..=page_count)
            .map(map_page)
            .collect()
    } else {
        ((curr_page - max_pages / 2)..=(curr_page + max_pages / 2))
            .map(map_page)
            .collect()
    };

    if page_count > max_pages {
        if curr_page > (max_pages / 2) + 1 {
            indicators.insert(0, PaginationIndicator::Page(1));
            indicators.insert(1, PaginationIndicator::Ellipsis);
        }

        if curr_page < (page_count - max_pages / 2) {
            indicators.push(PaginationIndicator::Ellipsis);
            indicators.push(PaginationIndicator::Page(page_count));
        }
    }

    if curr_page > 1 {
        indicators.insert(0, PaginationIndicator::BackButton(curr_page - 1));
    }

    if curr_page < page_count {
        indicators.push(PaginationIndicator::NextButton(curr_page + 1));
    }

    indicators
}
