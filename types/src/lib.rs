//! Core domain types for Everscroll - no IO, no async.
//!
//! This crate holds the session contract shared between the engine and the
//! session builder: the mutable per-document [`Session`] state, the
//! [`Action`] and [`AppendMode`] enums that select a workflow shape, and the
//! independently tuned [`RetryBudgets`].

mod action;
mod append;
mod session;
mod settings;

pub use action::{Action, WorkflowFlags};
pub use append::{AppendMode, DocumentType};
pub use session::{Session, SessionError};
pub use settings::{RetryBudgets, Thresholds};
