//! The position detector.
//!
//! Two mutually exclusive strategies, selected once per session:
//! visibility-signal mode (anchor + near-bottom sentinel intersection)
//! and throttled scroll-event mode (pixels-remaining against a
//! threshold). Both feed the same `should_append` gate; both update
//! `current_page` and mirror it to the address bar and title.

use std::time::Duration;

use everscroll_dom::NodeId;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::bridge::MessagingBridge;
use crate::context::SessionContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorMode {
    Visibility,
    #[default]
    Scroll,
}

/// Outcome of one detector pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Detection {
    pub page_changed: bool,
    pub should_append: bool,
}

#[derive(Debug)]
pub struct PositionDetector {
    mode: DetectorMode,
    throttle: Duration,
    last_handled: Option<Instant>,
}

impl PositionDetector {
    #[must_use]
    pub fn new(mode: DetectorMode, throttle: Duration) -> Self {
        Self {
            mode,
            throttle,
            last_handled: None,
        }
    }

    #[must_use]
    pub fn mode(&self) -> DetectorMode {
        self.mode
    }

    /// Handle a scroll signal. Throttled: signals inside the window are
    /// no-ops, which keeps rapid scroll storms cheap.
    pub fn on_scroll(&mut self, cx: &mut SessionContext) -> Detection {
        let now = Instant::now();
        if let Some(last) = self.last_handled
            && now.duration_since(last) < self.throttle
        {
            return Detection::default();
        }
        self.last_handled = Some(now);
        self.detect(cx)
    }

    /// Handle a visibility signal (geometry moved without a scroll).
    /// Not throttled; visibility changes are already coalesced upstream.
    pub fn on_visibility(&mut self, cx: &mut SessionContext) -> Detection {
        self.detect(cx)
    }

    fn detect(&mut self, cx: &mut SessionContext) -> Detection {
        let page_changed = match self.mode {
            DetectorMode::Scroll => update_current_page_scroll(cx),
            DetectorMode::Visibility => update_visibility(cx),
        };
        let should_append = self.should_append(cx);
        if should_append {
            tracing::debug!(
                current = cx.session.current_page,
                total = cx.session.total_pages,
                "append decision taken"
            );
        }
        Detection {
            page_changed,
            should_append,
        }
    }

    /// The append decision gate.
    pub fn should_append(&self, cx: &SessionContext) -> bool {
        let session = &cx.session;
        if !session.enabled || session.is_loading || session.picker_enabled || session.auto_enabled
        {
            return false;
        }
        // Pages that never grow a scrollbar get a bounded allowance of
        // automatic appends, then go quiet.
        if !cx.dom.has_scrollbar() {
            return session.scrollbar_appends < session.budgets.no_scrollbar_appends;
        }
        if cx.element_attempts >= session.budgets.element_attempts {
            return false;
        }
        match self.mode {
            DetectorMode::Visibility => cx
                .sentinel
                .is_some_and(|sentinel| sentinel_within_lookahead(cx, sentinel)),
            DetectorMode::Scroll => {
                pixels_remaining(cx) <= f64::from(session.thresholds.scroll_append_threshold_pixels)
            }
        }
    }
}

/// Visibility-mode trigger distance: the sentinel counts as near when
/// it overlaps the viewport extended downward by the configured pages
/// of lookahead. Zero pages means plain intersection.
fn sentinel_within_lookahead(cx: &SessionContext, sentinel: NodeId) -> bool {
    let Some(rect) = cx.dom.position(sentinel) else {
        return false;
    };
    let metrics = cx.dom.metrics();
    let lookahead =
        f64::from(cx.session.thresholds.scroll_append_threshold_pages) * metrics.viewport_height;
    let top = metrics.scroll_y;
    let bottom = top + metrics.viewport_height + lookahead;
    rect.bottom() > top && rect.top < bottom
}

/// Pixels between the bottom of the viewport and the logical content
/// end: `(document height - offset) - (scroll position + viewport
/// height)`.
#[must_use]
pub fn pixels_remaining(cx: &SessionContext) -> f64 {
    let metrics = cx.dom.metrics();
    (cx.dom.document_height() - f64::from(cx.offset))
        - (metrics.scroll_y + metrics.viewport_height)
}

/// Scroll-mode page detection: the first page whose anchor is scrolled
/// into view, in registry order.
fn update_current_page_scroll(cx: &mut SessionContext) -> bool {
    let mut current = cx.session.current_page;
    for record in cx.registry.iter() {
        if cx.dom.is_scrolled_into_view(record.element) {
            current = record.number;
            break;
        }
    }
    apply_current_page(cx, current)
}

/// Visibility-mode detection: refresh every record's intersection flag,
/// then take the first visible page as current and the last as bottom.
fn update_visibility(cx: &mut SessionContext) -> bool {
    let visible: Vec<(usize, bool)> = cx
        .registry
        .iter()
        .map(|record| (record.number, cx.dom.intersects_viewport(record.element)))
        .collect();
    for record in cx.registry.iter_mut() {
        if let Some((_, is_visible)) = visible.iter().find(|(n, _)| *n == record.number) {
            record.visible = *is_visible;
        }
    }
    let first = visible.iter().find(|(_, v)| *v).map(|(n, _)| *n);
    let last = visible.iter().rev().find(|(_, v)| *v).map(|(n, _)| *n);
    if let Some(bottom) = last {
        cx.session.bottom_page = bottom;
    }
    match first {
        Some(number) => apply_current_page(cx, number),
        None => false,
    }
}

fn apply_current_page(cx: &mut SessionContext, number: usize) -> bool {
    // Scrollbar bookkeeping rides along with every detection pass.
    if cx.dom.has_scrollbar() {
        cx.session.scrollbar_exists = true;
        cx.session.scrollbar_appends = 0;
    }
    if number == cx.session.current_page {
        return false;
    }
    cx.session.current_page = number;
    true
}

/// Mirror the detected page's address and title, but only when they
/// differ from what is currently displayed; redundant history writes
/// are skipped.
pub fn sync_address(cx: &mut SessionContext, bridge: &mut dyn MessagingBridge) {
    let Some(record) = cx.registry.get(cx.session.current_page) else {
        return;
    };
    let url_changed = record.url != cx.displayed_url;
    let title_changed = record.title != cx.displayed_title;
    if !url_changed && !title_changed {
        return;
    }
    bridge.replace_address(&record.url, record.title.as_deref());
    cx.displayed_url = record.url.clone();
    cx.displayed_title = record.title.clone();
}
