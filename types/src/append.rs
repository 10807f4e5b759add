//! Append strategies and document targets.

use serde::{Deserialize, Serialize};

/// The strategy used to merge fetched content into the host document.
///
/// Dispatch on this enum is the seam between the workflow orchestrator and
/// the append pipeline; each variant has exactly one pipeline handler and
/// each successful append produces exactly one page record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendMode {
    /// Fetch the target as a document, strip scripts and styles, adopt its
    /// body children into a fresh wrapper at the end of the host document.
    Page,
    /// Point an isolated frame element at the target address.
    Iframe,
    /// Adopt a located subset of the fetched document's elements before
    /// the current insertion point.
    Element,
    /// Construct a single image/video node; no document fetch.
    Media,
    /// No insertion; the action's own side effect changed the host page.
    None,
    /// Element adoption plus a handshake with an injected helper script
    /// that suppresses the host page's competing scroll behavior.
    Ajax,
}

impl AppendMode {
    /// Strategies whose content ends exactly at the physical document end,
    /// so the offset calculator short-circuits to zero.
    #[must_use]
    pub const fn has_zero_offset(self) -> bool {
        matches!(self, Self::Page | Self::Iframe | Self::Media)
    }

    /// Strategies that splice located elements at an insertion point and
    /// therefore must recompute the offset after every append.
    #[must_use]
    pub const fn uses_insertion_point(self) -> bool {
        matches!(self, Self::Element | Self::Ajax)
    }

    /// Strategies that fetch the target address as a structured document.
    #[must_use]
    pub const fn fetches_document(self) -> bool {
        matches!(self, Self::Page | Self::Iframe | Self::Element | Self::Ajax)
    }
}

/// Which structured document the position detector and link finder
/// inspect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// The top-level host document.
    #[default]
    Top,
    /// The live document inside a hidden imported frame.
    Iframe,
    /// The most recently fetched document.
    Current,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_offset_strategies() {
        assert!(AppendMode::Page.has_zero_offset());
        assert!(AppendMode::Iframe.has_zero_offset());
        assert!(AppendMode::Media.has_zero_offset());
        assert!(!AppendMode::Element.has_zero_offset());
        assert!(!AppendMode::Ajax.has_zero_offset());
        assert!(!AppendMode::None.has_zero_offset());
    }

    #[test]
    fn serde_round_trip_uses_snake_case() {
        let json = serde_json::to_string(&AppendMode::Ajax).unwrap();
        assert_eq!(json, "\"ajax\"");
        let mode: AppendMode = serde_json::from_str("\"iframe\"").unwrap();
        assert_eq!(mode, AppendMode::Iframe);
    }
}
