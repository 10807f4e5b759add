//! The explicit session context.
//!
//! One object owns everything the components share: session state, page
//! registry, the live document, transient handles. The lifecycle
//! controller creates and tears it down; every component receives it by
//! reference. There are no module-level mutable globals.

use everscroll_dom::{Dom, DomError, Locator, NodeId};
use everscroll_fetch::FetchedDocument;
use everscroll_types::Session;

use crate::config::EngineConfig;
use crate::registry::PageRegistry;

/// Per-domain document-repair hook, run after each append whose target
/// host matches the registered suffix. Failures are logged, never fatal.
pub type RepairHook = Box<dyn Fn(&mut Dom, NodeId) -> Result<(), DomError> + Send>;

pub struct SessionContext {
    pub session: Session,
    pub registry: PageRegistry,
    /// The live host document.
    pub dom: Dom,
    pub config: EngineConfig,

    /// Cached offset in pixels; recomputed whenever the append strategy
    /// changes and, for element strategies, after every append.
    pub offset: u32,

    /// Transient marker where element strategies splice content.
    /// Revalidated before every use: the host page may detach it
    /// between appends.
    pub insertion_point: Option<NodeId>,

    /// Parsed content locator, when the config carries one.
    pub page_element_locator: Option<Locator>,

    /// Hidden imported frame's live document (iframe import variant).
    pub frame_doc: Option<Dom>,
    /// Host node of the hidden frame.
    pub frame_node: Option<NodeId>,

    /// Next unit of content loaded in advance by reverse workflows.
    pub primed: Option<FetchedDocument>,
    /// Set when a reverse action advances the session; the merge half
    /// of the next pass runs only while this is set.
    pub awaiting_append: bool,

    /// Near-bottom sentinel node (visibility-signal mode).
    pub sentinel: Option<NodeId>,

    /// Divider placeholder pre-inserted by the current workflow pass.
    pub pending_divider: Option<NodeId>,
    /// Table column span for dividers, computed exactly once.
    pub divider_span: Option<u32>,

    /// Structural-mismatch retry counter (bounded by the budget).
    pub element_attempts: u32,

    /// Last address that appended successfully; frame failures revert
    /// `session.url` to this.
    pub last_good_url: String,

    /// What the address bar and title currently show, to avoid redundant
    /// history writes.
    pub displayed_url: String,
    pub displayed_title: Option<String>,

    /// Per-domain repair hooks, keyed by host suffix.
    pub(crate) repair_hooks: Vec<(String, RepairHook)>,
}

impl SessionContext {
    pub fn new(session: Session, dom: Dom, config: EngineConfig) -> Result<Self, DomError> {
        let page_element_locator = match &config.page_element {
            Some(spec) => Some(spec.parse()?),
            None => None,
        };
        let url = session.url.clone();
        let title = dom.title();
        Ok(Self {
            session,
            registry: PageRegistry::new(),
            dom,
            config,
            offset: 0,
            insertion_point: None,
            page_element_locator,
            frame_doc: None,
            frame_node: None,
            primed: None,
            awaiting_append: false,
            sentinel: None,
            pending_divider: None,
            divider_span: None,
            element_attempts: 0,
            last_good_url: url.clone(),
            displayed_url: url,
            displayed_title: title,
            repair_hooks: Vec::new(),
        })
    }

    /// Register a per-domain repair hook.
    pub fn register_repair_hook(&mut self, host_suffix: impl Into<String>, hook: RepairHook) {
        self.repair_hooks.push((host_suffix.into(), hook));
    }

    /// Hooks applicable to the given address.
    pub(crate) fn hooks_for(&self, url: &str) -> Vec<usize> {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        self.repair_hooks
            .iter()
            .enumerate()
            .filter(|(_, (suffix, _))| {
                // Label-boundary match: `example.com` covers
                // `m.example.com` but never `badexample.com`.
                host == suffix.as_str()
                    || host
                        .strip_suffix(suffix.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// The insertion point, only if it is still attached to the host
    /// document.
    #[must_use]
    pub fn valid_insertion_point(&self) -> Option<NodeId> {
        self.insertion_point
            .filter(|&ip| self.dom.is_attached(ip))
    }
}
