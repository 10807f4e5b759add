//! The page registry: the only authority on page count and order.

use everscroll_dom::NodeId;
use everscroll_types::AppendMode;

/// One successfully appended content unit.
///
/// Immutable except for the observed-intersection flag; never deleted
/// except on a full single-page-app reset.
#[derive(Debug, Clone)]
pub struct PageRecord {
    /// 1-based, assigned by the registry, strictly contiguous.
    pub number: usize,
    pub url: String,
    pub title: Option<String>,
    /// Anchor node used for visibility tracking and scroll-into-view.
    pub element: NodeId,
    /// Strategy that produced this page.
    pub append: AppendMode,
    /// Frame handle for later cleanup, when the strategy created one.
    pub iframe: Option<NodeId>,
    /// Adopted content elements, for offset recomputation and cleanup.
    pub page_elements: Vec<NodeId>,
    /// Observed-intersection flag, updated by the visibility detector.
    pub visible: bool,
}

/// Everything a strategy knows about a page before it gets its number.
#[derive(Debug)]
pub struct NewPage {
    pub url: String,
    pub title: Option<String>,
    pub element: NodeId,
    pub append: AppendMode,
    pub iframe: Option<NodeId>,
    pub page_elements: Vec<NodeId>,
}

/// Append-only ordered sequence of page records.
#[derive(Debug, Default)]
pub struct PageRegistry {
    records: Vec<PageRecord>,
}

impl PageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page, assigning the next contiguous number. Numbers are
    /// never supplied by callers, which is what makes monotonicity a
    /// structural property rather than a convention.
    pub fn push(&mut self, page: NewPage) -> usize {
        let number = self.records.len() + 1;
        self.records.push(PageRecord {
            number,
            url: page.url,
            title: page.title,
            element: page.element,
            append: page.append,
            iframe: page.iframe,
            page_elements: page.page_elements,
            visible: false,
        });
        number
    }

    /// 1-based lookup.
    #[must_use]
    pub fn get(&self, number: usize) -> Option<&PageRecord> {
        number.checked_sub(1).and_then(|i| self.records.get(i))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&PageRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PageRecord> {
        self.records.iter_mut()
    }

    /// Full reset. Permitted only during single-page-app
    /// re-synchronization; there is no single-record deletion.
    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    /// Replace the whole registry (session hand-off between observers).
    pub fn replace(&mut self, records: Vec<PageRecord>) {
        self.records = records;
    }

    #[must_use]
    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }
}
