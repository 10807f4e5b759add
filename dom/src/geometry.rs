//! Deterministic block geometry.
//!
//! The layout model is intentionally simple: block elements stack
//! vertically, text contributes line-counted height, and an explicit
//! height pins a subtree. It is deterministic and cheap enough to
//! recompute on every detector signal, which is what keeps the engine's
//! position math testable.

use crate::node::{Dom, NodeId, NodeKind};

const LINE_HEIGHT: f64 = 20.0;
const CHARS_PER_LINE: usize = 80;
const MEDIA_DEFAULT_HEIGHT: f64 = 300.0;
const IFRAME_DEFAULT_HEIGHT: f64 = 400.0;

/// Viewport and scroll state for a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub scroll_y: f64,
    /// Trailing decorative whitespace after the last content element.
    pub trailing_gap: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            viewport_width: 1280.0,
            viewport_height: 800.0,
            scroll_y: 0.0,
            trailing_gap: 0.0,
        }
    }
}

/// Vertical extent of a laid-out node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

impl Dom {
    /// Configure the viewport dimensions.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.metrics.viewport_width = width;
        self.metrics.viewport_height = height;
        self.clamp_scroll();
    }

    /// Add trailing whitespace after the content (decorative footers and
    /// the like), extending the physical document end.
    pub fn set_trailing_gap(&mut self, px: f64) {
        self.metrics.trailing_gap = px.max(0.0);
    }

    #[must_use]
    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    /// Scroll to an absolute offset, clamped to the scrollable range.
    pub fn scroll_to(&mut self, y: f64) {
        self.metrics.scroll_y = y;
        self.clamp_scroll();
    }

    fn clamp_scroll(&mut self) {
        let max = (self.document_height() - self.metrics.viewport_height).max(0.0);
        self.metrics.scroll_y = self.metrics.scroll_y.clamp(0.0, max);
    }

    #[must_use]
    pub fn scroll_y(&self) -> f64 {
        self.metrics.scroll_y
    }

    /// Physical document height: body content plus the trailing gap.
    #[must_use]
    pub fn document_height(&self) -> f64 {
        self.node_height(self.body()) + self.metrics.trailing_gap
    }

    /// Whether the document currently overflows the viewport.
    #[must_use]
    pub fn has_scrollbar(&self) -> bool {
        self.document_height() > self.metrics.viewport_height
    }

    /// Computed height of a subtree.
    #[must_use]
    pub fn node_height(&self, node: NodeId) -> f64 {
        let Some(slot) = self.nodes.get(node.0) else {
            return 0.0;
        };
        if let Some(px) = slot.explicit_height {
            return px;
        }
        match &slot.kind {
            NodeKind::Text(text) => {
                if text.trim().is_empty() {
                    0.0
                } else {
                    let lines = text.trim().len().div_ceil(CHARS_PER_LINE).max(1);
                    lines as f64 * LINE_HEIGHT
                }
            }
            NodeKind::Element { tag, attrs } => {
                if is_hidden(attrs) || !renders(tag) {
                    return 0.0;
                }
                if let Some(px) = attr_px(attrs, "height") {
                    return px;
                }
                let children: f64 = slot
                    .children
                    .iter()
                    .map(|&child| self.node_height(child))
                    .sum();
                if children > 0.0 {
                    children
                } else {
                    default_height(tag)
                }
            }
        }
    }

    /// Vertical extent of an attached node. `None` for detached nodes -
    /// a detached anchor has no position, which is exactly the signal the
    /// engine's insertion-point revalidation relies on.
    #[must_use]
    pub fn position(&self, node: NodeId) -> Option<Rect> {
        if !self.is_attached(node) {
            return None;
        }
        let mut cursor = 0.0;
        self.locate(self.body(), node, &mut cursor)
    }

    fn locate(&self, current: NodeId, target: NodeId, cursor: &mut f64) -> Option<Rect> {
        if current == target {
            return Some(Rect {
                top: *cursor,
                height: self.node_height(current),
            });
        }
        let slot = self.nodes.get(current.0)?;
        // A pinned subtree occupies its explicit height regardless of
        // children, so descend without advancing past it.
        let start = *cursor;
        for &child in &slot.children {
            if let Some(rect) = self.locate(child, target, cursor) {
                return Some(rect);
            }
        }
        *cursor = start + self.node_height(current);
        None
    }

    /// Whether any part of the node overlaps the viewport.
    #[must_use]
    pub fn intersects_viewport(&self, node: NodeId) -> bool {
        let Some(rect) = self.position(node) else {
            return false;
        };
        let top = self.metrics.scroll_y;
        let bottom = top + self.metrics.viewport_height;
        rect.bottom() > top && rect.top < bottom
    }

    /// Viewport visibility used by the scroll-mode detector: anchors
    /// shorter than the viewport must be fully visible, taller ones count
    /// as visible when any part overlaps.
    #[must_use]
    pub fn is_scrolled_into_view(&self, node: NodeId) -> bool {
        let Some(rect) = self.position(node) else {
            return false;
        };
        let top = self.metrics.scroll_y;
        let bottom = top + self.metrics.viewport_height;
        if rect.height <= self.metrics.viewport_height {
            rect.top >= top && rect.bottom() <= bottom
        } else {
            rect.bottom() > top && rect.top < bottom
        }
    }
}

fn renders(tag: &str) -> bool {
    !matches!(
        tag,
        "head" | "script" | "style" | "link" | "meta" | "title" | "template" | "noscript"
    )
}

fn is_hidden(attrs: &[(String, String)]) -> bool {
    attrs.iter().any(|(k, v)| {
        k == "hidden"
            || (k == "style" && v.replace(' ', "").to_ascii_lowercase().contains("display:none"))
    })
}

fn attr_px(attrs: &[(String, String)], name: &str) -> Option<f64> {
    attrs
        .iter()
        .find(|(k, _)| k == name)
        .and_then(|(_, v)| v.trim().trim_end_matches("px").parse::<f64>().ok())
        .filter(|px| px.is_finite() && *px >= 0.0)
}

fn default_height(tag: &str) -> f64 {
    match tag {
        "img" | "video" | "embed" | "object" => MEDIA_DEFAULT_HEIGHT,
        "iframe" => IFRAME_DEFAULT_HEIGHT,
        "hr" => 10.0,
        "br" => LINE_HEIGHT,
        _ => 0.0,
    }
}
