//! Arena-backed live document model for Everscroll.
//!
//! The engine operates on a mutable document tree with deterministic block
//! geometry: elements stack vertically, text contributes line-counted
//! height, and scroll position is clamped against the computed document
//! height. Fetched HTML is parsed with `scraper` and imported into the
//! arena; subtrees are adopted across documents by copy, the way a real
//! host adopts foreign nodes.
//!
//! Structural mutations bump a revision counter and record detached nodes,
//! which is what the engine's single-page-app watcher polls instead of
//! receiving re-entrant mutation callbacks.

mod geometry;
mod import;
mod locator;
mod node;

pub use geometry::{Metrics, Rect};
pub use locator::{Locator, LocatorKind};
pub use node::{CustomEvent, Dom, DomError, NodeId, NodeKind};
