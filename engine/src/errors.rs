//! Append-level error taxonomy.
//!
//! Every variant is local to one append attempt; none is fatal to the
//! session. The workflow's error path guarantees `is_loading` never
//! stays latched after a failure.

use thiserror::Error;

use everscroll_dom::DomError;
use everscroll_fetch::FetchError;

#[derive(Debug, Error)]
pub enum AppendError {
    /// Network or parse failure retrieving the next document, after the
    /// transport fallback already ran.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The configured locator found zero content elements.
    #[error("locator '{locator}' matched no content elements")]
    NoContent { locator: String },

    /// The insertion point was detached by the host page and could not
    /// be recomputed.
    #[error("insertion point lost and no content elements remain to recompute it")]
    InsertionPointLost,

    /// An isolated frame refused to load (cross-origin or blocked).
    #[error("frame load blocked for '{url}'")]
    FrameBlocked { url: String },

    /// The session was disabled while the append was in flight; the
    /// fetched result was discarded before finalization.
    #[error("append discarded: session disabled mid-flight")]
    Discarded,

    /// A document mutation failed structurally.
    #[error(transparent)]
    Dom(#[from] DomError),
}

impl AppendError {
    /// Failures the next natural trigger should quietly retry.
    #[must_use]
    pub fn retry_on_next_trigger(&self) -> bool {
        match self {
            Self::NoContent { .. } => true,
            Self::Fetch(err) => err.retryable(),
            Self::InsertionPointLost
            | Self::FrameBlocked { .. }
            | Self::Discarded
            | Self::Dom(_) => false,
        }
    }
}
