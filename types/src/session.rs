//! Per-document session state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Action, AppendMode, DocumentType, RetryBudgets, Thresholds, WorkflowFlags};

/// Validation errors for session state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("current page {current} outside registry range 1..={total}")]
    PageOutOfRange { current: usize, total: usize },
    #[error("session url must not be empty")]
    EmptyUrl,
}

/// The full mutable state for one monitored document.
///
/// Built by the session builder from persisted configuration plus the
/// current address, owned by the lifecycle controller, passed explicitly
/// to every component. Discarded on navigation or unload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Master gate: appends may proceed only while enabled.
    pub enabled: bool,
    /// One-time setup has run for this document.
    pub started: bool,
    /// An append is in flight. The sole mutual-exclusion mechanism; set
    /// before any asynchronous step begins, cleared only after the entire
    /// append completes or definitively fails.
    pub is_loading: bool,
    /// Auto mode: a timer triggers the down path periodically.
    pub auto_enabled: bool,
    /// Seconds between auto-mode triggers.
    pub auto_seconds: u32,
    /// A manual element picker is active; detector triggers are ignored.
    pub picker_enabled: bool,

    /// Navigation step performed around each append.
    pub action: Action,
    /// Strategy used to merge fetched content.
    pub append: AppendMode,
    /// Address of the most recently resolved content unit. Advanced by
    /// the action resolver, consumed by the append pipeline.
    pub url: String,

    /// 1-based counter of the page currently in view.
    pub current_page: usize,
    /// Always equals the page registry length.
    pub total_pages: usize,
    /// Last visible page in visibility-signal mode.
    pub bottom_page: usize,

    #[serde(flatten)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub budgets: RetryBudgets,

    /// Derived once from action x append at session start; may be
    /// overridden by the lifecycle controller.
    #[serde(default)]
    pub workflow: WorkflowFlags,

    /// The document has grown a scrollbar at least once.
    pub scrollbar_exists: bool,
    /// Consecutive appends granted because no scrollbar was present.
    pub scrollbar_appends: u32,

    /// Which structured document the detector and link finder inspect.
    pub document_type: DocumentType,
}

impl Session {
    /// A fresh session for `url` with the given action and append mode.
    #[must_use]
    pub fn new(url: impl Into<String>, action: Action, append: AppendMode) -> Self {
        Self {
            enabled: false,
            started: false,
            is_loading: false,
            auto_enabled: false,
            auto_seconds: 0,
            picker_enabled: false,
            action,
            append,
            url: url.into(),
            current_page: 1,
            total_pages: 1,
            bottom_page: 1,
            thresholds: Thresholds::default(),
            budgets: RetryBudgets::default(),
            workflow: WorkflowFlags::derive(action, append),
            scrollbar_exists: false,
            scrollbar_appends: 0,
            document_type: DocumentType::Top,
        }
    }

    /// Check the page-counter invariant: `1 <= current_page <= total_pages`.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.url.trim().is_empty() {
            return Err(SessionError::EmptyUrl);
        }
        if self.current_page == 0 || self.current_page > self.total_pages {
            return Err(SessionError::PageOutOfRange {
                current: self.current_page,
                total: self.total_pages,
            });
        }
        Ok(())
    }
}
