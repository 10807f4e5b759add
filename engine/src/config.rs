//! Engine configuration.
//!
//! Everything time-based is stored as milliseconds for config-file
//! friendliness and exposed as `Duration`. Loadable from TOML; every
//! field has a default so partial files work.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use everscroll_dom::{DomError, Locator, LocatorKind};

use crate::detector::DetectorMode;

/// Which isolated-frame behavior the iframe strategy uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IframeVariant {
    /// Show the frame's whole document.
    #[default]
    Full,
    /// Wait for the frame's content to resolve, then trim it to the
    /// located subset.
    Trimmed,
    /// Keep the frame invisible; its live document feeds the element
    /// strategy.
    Import,
}

/// Serializable locator reference for config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorSpec {
    /// `selector` or `tag_path`.
    pub locator_type: String,
    pub locator_path: String,
}

impl LocatorSpec {
    pub fn parse(&self) -> Result<Locator, DomError> {
        let kind = match self.locator_type.as_str() {
            "selector" => LocatorKind::Selector,
            "tag_path" => LocatorKind::TagPath,
            other => {
                return Err(DomError::LocatorParse(format!(
                    "unknown locator type '{other}'"
                )));
            }
        };
        Locator::parse(kind, &self.locator_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detector_mode: DetectorMode,
    /// Scroll-event handler throttle.
    pub throttle_ms: u64,
    /// Cool-down after each append before the detector may fire again;
    /// also how long the loading indicator lingers.
    pub append_delay_ms: u64,
    /// Handshake delay granted to the injected helper script.
    pub ajax_handshake_ms: u64,
    /// Debounce for the single-page-app mutation watcher.
    pub spa_debounce_ms: u64,
    /// Per-attempt backoff after a structural-mismatch failure.
    pub element_backoff_ms: u64,
    /// Poll interval while waiting on an isolated frame's document.
    pub frame_poll_ms: u64,

    pub iframe_variant: IframeVariant,
    /// Insert a divider node before each appended unit.
    pub divider: bool,
    /// Locator for content elements (element / ajax strategies).
    pub page_element: Option<LocatorSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detector_mode: DetectorMode::Scroll,
            throttle_ms: 200,
            append_delay_ms: 500,
            ajax_handshake_ms: 100,
            spa_debounce_ms: 1000,
            element_backoff_ms: 250,
            frame_poll_ms: 50,
            iframe_variant: IframeVariant::Full,
            divider: true,
            page_element: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    #[must_use]
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    #[must_use]
    pub fn append_delay(&self) -> Duration {
        Duration::from_millis(self.append_delay_ms)
    }

    #[must_use]
    pub fn ajax_handshake(&self) -> Duration {
        Duration::from_millis(self.ajax_handshake_ms)
    }

    #[must_use]
    pub fn spa_debounce(&self) -> Duration {
        Duration::from_millis(self.spa_debounce_ms)
    }

    #[must_use]
    pub fn element_backoff(&self) -> Duration {
        Duration::from_millis(self.element_backoff_ms)
    }

    #[must_use]
    pub fn frame_poll(&self) -> Duration {
        Duration::from_millis(self.frame_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = EngineConfig::default();
        assert_eq!(config.throttle(), Duration::from_millis(200));
        assert_eq!(config.spa_debounce(), Duration::from_millis(1000));
        assert!(config.divider);
        assert!(config.page_element.is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            detector_mode = "visibility"
            divider = false

            [page_element]
            locator_type = "selector"
            locator_path = "div.post"
            "#,
        )
        .unwrap();
        assert_eq!(config.detector_mode, DetectorMode::Visibility);
        assert!(!config.divider);
        assert_eq!(config.throttle_ms, 200);
        let locator = config.page_element.unwrap().parse().unwrap();
        assert_eq!(locator.source(), "div.post");
    }

    #[test]
    fn unknown_locator_type_is_rejected() {
        let spec = LocatorSpec {
            locator_type: "xpath".to_string(),
            locator_path: "//div".to_string(),
        };
        assert!(spec.parse().is_err());
    }
}
