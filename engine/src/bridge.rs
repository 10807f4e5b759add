//! Collaborator interfaces.
//!
//! The engine consumes these seams; production implementations live with
//! the privileged coordinator (next-link heuristics, increment
//! arithmetic, persisted-config matching are all out of scope here).

use everscroll_dom::{Dom, NodeId};
use everscroll_types::{Action, Session};

/// Mutable view handed to the action resolver for one navigation step.
pub struct ActionContext<'a> {
    pub session: &'a mut Session,
    pub dom: &'a mut Dom,
}

/// Performs the navigation step around each append.
///
/// On success, link/increment actions must have advanced `session.url`;
/// click actions mutate the host document directly instead.
pub trait ActionResolver: Send {
    fn perform(&mut self, action: Action, cx: &mut ActionContext<'_>) -> bool;

    /// The manually-specified trigger element, when the action is a click
    /// with known coordinates. Feeds the offset calculator.
    fn click_target(&self) -> Option<NodeId> {
        None
    }
}

/// Transient on-screen status badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    On,
    Loading,
    Appended { page: usize },
    Error(String),
}

/// Fire-and-forget channel to the privileged coordinator.
pub trait MessagingBridge: Send {
    /// Replace the address bar and title (history write, not navigation).
    fn replace_address(&mut self, url: &str, title: Option<&str>);

    /// Show the transient status indicator.
    fn show_status(&mut self, status: Status);

    /// Hide the status indicator.
    fn hide_status(&mut self);

    /// Relay updated session state to any observer UI.
    fn notify_session(&mut self, session: &Session);

    /// Persist the on/off flag.
    fn persist_enabled(&mut self, enabled: bool);
}

/// Rebuilds session state from persisted configuration plus an address.
/// Used only during single-page-app re-synchronization.
pub trait SessionBuilder: Send {
    /// `None` when no persisted configuration applies to `url`.
    fn build(&mut self, url: &str) -> Option<Session>;
}

/// A bridge that swallows everything; useful for headless runs.
#[derive(Debug, Default)]
pub struct NullBridge;

impl MessagingBridge for NullBridge {
    fn replace_address(&mut self, _url: &str, _title: Option<&str>) {}
    fn show_status(&mut self, _status: Status) {}
    fn hide_status(&mut self) {}
    fn notify_session(&mut self, _session: &Session) {}
    fn persist_enabled(&mut self, _enabled: bool) {}
}
