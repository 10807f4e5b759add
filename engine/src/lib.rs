//! Append orchestration engine.
//!
//! Detects when more content is needed, performs the configured
//! navigation action, fetches and merges the next unit of content under
//! one of six append strategies, and keeps the page registry, offsets,
//! and loading state coherent while doing so.
//!
//! One [`Engine`] owns one [`SessionContext`] and consumes one bounded
//! event channel; appends run to completion before the next event is
//! read, so re-entrancy cannot occur.

mod bridge;
mod config;
mod context;
mod detector;
mod errors;
mod events;
mod lifecycle;
pub mod offset;
mod pipeline;
mod registry;
mod scripts;
mod workflow;

pub use bridge::{
    ActionContext, ActionResolver, MessagingBridge, NullBridge, SessionBuilder, Status,
};
pub use config::{EngineConfig, IframeVariant, LocatorSpec};
pub use context::{RepairHook, SessionContext};
pub use detector::{Detection, DetectorMode, PositionDetector, pixels_remaining};
pub use errors::AppendError;
pub use events::{
    Command, EVENT_CHANNEL_CAPACITY, EngineEvent, EngineHandle, channel, spawn_auto_ticker,
};
pub use lifecycle::{Engine, locate_page_elements};
pub use registry::{NewPage, PageRecord, PageRegistry};

#[cfg(test)]
mod tests;
