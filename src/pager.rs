use serde::Serialize;

/// Pagination metadata handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub page_size: usize,
}

impl PageInfo {
    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

#[derive(Debug)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub info: PageInfo,
}

pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1)).max(1)
}

/// Slices one page out of `rows`; `current_page` is clamped into range.
pub fn paginate<T>(rows: &[T], page_size: usize, current_page: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(rows.len(), page_size);
    let current_page = current_page.clamp(1, total_pages);
    let start = ((current_page - 1) * page_size).min(rows.len());
    let end = (start + page_size).min(rows.len());
    Page {
        items: &rows[start..end],
        info: PageInfo {
            current_page,
            total_pages,
            total_items: rows.len(),
            page_size,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    Delta(i64),
    To(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    page_size: usize,
    current_page: usize,
}

impl PageState {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current_page: 1,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.current_page = 1;
    }

    /// Moves to the requested page when it lies in `[1, total_pages]`;
    /// returns whether the page changed. Out-of-range requests are ignored.
    pub fn navigate(&mut self, request: PageRequest, total_items: usize) -> bool {
        let total = total_pages(total_items, self.page_size) as i64;
        let target = match request {
            PageRequest::Delta(delta) => self.current_page as i64 + delta,
            PageRequest::To(page) => page as i64,
        };
        if target < 1 || target > total || target == self.current_page as i64 {
            return false;
        }
        self.current_page = target as usize;
        true
    }
}
