//! Bounded views over the sorted, filtered sequence.
//!
//! Two models are available and a session commits to one of them:
//!
//! - [`PageWindow`]: classic numbered pages of a fixed size.
//! - [`IncrementalWindow`]: an infinite-scroll prefix that grows by one page
//!   each time the end-of-list sentinel becomes visible.
//!
//! Both are reset to their initial position whenever the underlying sequence
//! changes, and neither ever exposes an index past the end of it.

use std::ops::Range;

use tracing::{debug, trace};

pub const DEFAULT_PAGE_SIZE: usize = 9;

/// Which window model a session uses.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowMode {
    Paged,
    #[default]
    Incremental,
}

/// Number of pages needed for `len` items; zero for an empty sequence.
#[must_use]
pub const fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(if page_size == 0 { 1 } else { page_size })
}

/// Clamp a 1-based page number into `[1, max(total_pages, 1)]`.
#[must_use]
pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

fn page_range(len: usize, page: usize, page_size: usize) -> Range<usize> {
    let page_size = page_size.max(1);
    let page = clamp_page(page, total_pages(len, page_size));
    let start = ((page - 1) * page_size).min(len);
    let end = (page * page_size).min(len);
    start..end
}

/// Slice page `page` (1-based, clamped) of `sorted`.
#[must_use]
pub fn page<T>(sorted: &[T], page: usize, page_size: usize) -> &[T] {
    &sorted[page_range(sorted.len(), page, page_size)]
}

/// Numbered-page navigation state.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    current_page: usize,
    per_page: usize,
    len: usize,
}

impl PageWindow {
    #[must_use]
    pub fn new(per_page: usize) -> Self {
        Self {
            current_page: 1,
            per_page: per_page.max(1),
            len: 0,
        }
    }

    /// Back to page 1 of a sequence of `len` items.
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        self.current_page = 1;
    }

    #[must_use]
    pub const fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub const fn per_page(&self) -> usize {
        self.per_page
    }

    #[must_use]
    pub const fn total_pages(&self) -> usize {
        total_pages(self.len, self.per_page)
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current_page < self.total_pages()
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    /// Jump to `page`, clamped into range. Returns whether the page moved.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        let target = clamp_page(page, self.total_pages());
        let moved = target != self.current_page;
        self.current_page = target;
        moved
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.current_page + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        self.go_to_page(self.current_page.saturating_sub(1))
    }

    #[must_use]
    pub fn range(&self) -> Range<usize> {
        page_range(self.len, self.current_page, self.per_page)
    }
}

/// Lifecycle of an incremental window.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    Idle,
    /// A load was started and has not completed yet
    Loading,
    /// Everything has been loaded; no further loads start
    Exhausted,
}

/// Infinite-scroll window: always the first `loaded_count` items.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalWindow {
    loaded_count: usize,
    page_size: usize,
    len: usize,
    status: LoadStatus,
}

impl IncrementalWindow {
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            loaded_count: 0,
            page_size: page_size.max(1),
            len: 0,
            status: LoadStatus::Idle,
        }
    }

    /// Back to the first page of a sequence of `len` items.
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        self.loaded_count = self.page_size.min(len);
        self.status = LoadStatus::Idle;
    }

    #[must_use]
    pub const fn loaded_count(&self) -> usize {
        self.loaded_count
    }

    #[must_use]
    pub const fn status(&self) -> LoadStatus {
        self.status
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Whether a load may start right now.
    #[must_use]
    pub fn can_load(&self) -> bool {
        self.status == LoadStatus::Idle && self.loaded_count < self.len
    }

    /// Move to `Loading` if a load may start. Returns whether it did.
    pub fn begin_load(&mut self) -> bool {
        if !self.can_load() {
            trace!(status = ?self.status, loaded = self.loaded_count, "Load refused");
            return false;
        }
        self.status = LoadStatus::Loading;
        true
    }

    /// Grow by one page, capped at the sequence length, and settle the status.
    ///
    /// Does nothing unless a load is in flight.
    pub fn complete_load(&mut self) -> LoadStatus {
        if self.status != LoadStatus::Loading {
            return self.status;
        }
        self.loaded_count = (self.loaded_count + self.page_size).min(self.len);
        self.status = if self.loaded_count >= self.len {
            LoadStatus::Exhausted
        } else {
            LoadStatus::Idle
        };
        debug!(loaded = self.loaded_count, total = self.len, status = ?self.status, "Loaded more");
        self.status
    }

    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        0..self.loaded_count
    }
}

/// Presentation snapshot of whichever window a session runs.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Paged {
        current_page: usize,
        total_pages: usize,
        per_page: usize,
    },
    Incremental {
        loaded_count: usize,
        status: LoadStatus,
    },
}

/// The window model chosen for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Paged(PageWindow),
    Incremental(IncrementalWindow),
}

impl Window {
    #[must_use]
    pub fn new(mode: WindowMode, page_size: usize) -> Self {
        match mode {
            WindowMode::Paged => Self::Paged(PageWindow::new(page_size)),
            WindowMode::Incremental => Self::Incremental(IncrementalWindow::new(page_size)),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> WindowMode {
        match self {
            Self::Paged(_) => WindowMode::Paged,
            Self::Incremental(_) => WindowMode::Incremental,
        }
    }

    pub fn reset(&mut self, len: usize) {
        match self {
            Self::Paged(window) => window.reset(len),
            Self::Incremental(window) => window.reset(len),
        }
    }

    /// Whether another page or load exists beyond the visible records.
    #[must_use]
    pub fn has_more(&self) -> bool {
        match self {
            Self::Paged(window) => window.has_next(),
            Self::Incremental(window) => window.loaded_count() < window.len,
        }
    }

    /// Whether a page before the current one exists. Always false for the incremental model.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        match self {
            Self::Paged(window) => window.has_previous(),
            Self::Incremental(_) => false,
        }
    }

    /// Indices of the sorted sequence currently visible.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        match self {
            Self::Paged(window) => window.range(),
            Self::Incremental(window) => window.range(),
        }
    }

    #[must_use]
    pub fn state(&self) -> WindowState {
        match self {
            Self::Paged(window) => WindowState::Paged {
                current_page: window.current_page(),
                total_pages: window.total_pages(),
                per_page: window.per_page(),
            },
            Self::Incremental(window) => WindowState::Incremental {
                loaded_count: window.loaded_count(),
                status: window.status(),
            },
        }
    }
}
