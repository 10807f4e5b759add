//! Tunable budgets and trigger thresholds.

use serde::{Deserialize, Serialize};

/// Bounded retry budgets for the engine's fallback loops.
///
/// The caps were tuned independently per loop; they are deliberately not
/// one shared constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryBudgets {
    /// Attempts to locate content elements before an element append gives
    /// up silently.
    pub element_attempts: u32,
    /// Consecutive automatic appends allowed while the document still has
    /// no scrollbar.
    pub no_scrollbar_appends: u32,
    /// Deferred-source promotions applied per append while repairing
    /// lazily loaded media.
    pub lazy_media_promotions: u32,
    /// Polls while waiting for an isolated frame's document to settle.
    pub frame_wait_polls: u32,
}

impl Default for RetryBudgets {
    fn default() -> Self {
        Self {
            element_attempts: 5,
            no_scrollbar_appends: 10,
            lazy_media_promotions: 15,
            frame_wait_polls: 25,
        }
    }
}

/// Trigger distances for the position detector, mode-dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Scroll-event mode: append when pixels-remaining is at or below
    /// this value.
    pub scroll_append_threshold_pixels: u32,
    /// Visibility-signal mode: pages of lookahead granted to the
    /// near-bottom sentinel.
    pub scroll_append_threshold_pages: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            scroll_append_threshold_pixels: 500,
            scroll_append_threshold_pages: 0,
        }
    }
}
