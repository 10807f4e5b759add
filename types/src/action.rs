//! Navigation actions and the workflow flags derived from them.

use serde::{Deserialize, Serialize};

use crate::AppendMode;

/// The navigation step performed before (or after, for reverse workflows)
/// each append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Follow the located "next" link.
    Next,
    /// Follow the located "previous" link.
    Prev,
    /// Advance the address by incrementing its selected part.
    Increment,
    /// Advance the address by decrementing its selected part.
    Decrement,
    /// Activate a clickable control inside the host document.
    Click,
    /// Return to a list page of candidate addresses.
    List,
}

impl Action {
    /// Whether this action advances `session.url` (as opposed to mutating
    /// the host document directly).
    #[must_use]
    pub const fn advances_url(self) -> bool {
        matches!(self, Self::Next | Self::Prev | Self::Increment | Self::Decrement)
    }

    /// Whether the action walks backwards through the sequence.
    #[must_use]
    pub const fn is_backward(self) -> bool {
        matches!(self, Self::Prev | Self::Decrement)
    }
}

/// Workflow-shape flags, derived once from `action` x `append` when a
/// session is built. The lifecycle controller may override them during a
/// single-page-app re-sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFlags {
    /// The append strategy needs the next unit of content loaded in
    /// advance, so the page for the previous action's result is appended
    /// before the next action is performed.
    pub reverse: bool,
    /// Content is spliced before the current content instead of after it.
    pub prepend: bool,
    /// The first reverse append has nothing primed yet and is skipped.
    pub skip_append: bool,
}

impl WorkflowFlags {
    /// Derive the flags for a session.
    ///
    /// Isolated-frame and script-mediated strategies must have their
    /// content primed before the action runs, which flips the workflow
    /// into reverse order. Backward actions prepend rather than append.
    #[must_use]
    pub fn derive(action: Action, append: AppendMode) -> Self {
        let reverse = matches!(append, AppendMode::Iframe | AppendMode::Ajax);
        Self {
            reverse,
            prepend: action.is_backward(),
            skip_append: reverse,
        }
    }
}
