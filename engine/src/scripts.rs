//! Page-context helper script surrogate.
//!
//! The script-mediated strategy needs code running in the host page's
//! own context to disable competing scroll handlers and protect adopted
//! nodes from host-side removal. Injection and the protection handshake
//! are modeled as document mutations plus custom events that the real
//! helper (and tests) observe.

use everscroll_dom::{CustomEvent, Dom, NodeId};

pub(crate) const HELPER_MARKER: &str = "data-everscroll-helper";

/// Inject the helper script element into the document head. Idempotent.
pub(crate) fn inject_helper(dom: &mut Dom) {
    let head = dom.head();
    let already = dom
        .children(head)
        .iter()
        .any(|&n| dom.attr(n, HELPER_MARKER).is_some());
    if already {
        return;
    }
    let script = dom.create_element("script", &[(HELPER_MARKER, "true")]);
    let _ = dom.append_child(head, script);
    tracing::debug!("helper script injected");
}

/// Ask the helper to protect the given nodes from host-side removal.
pub(crate) fn request_protection(dom: &mut Dom, elements: &[NodeId]) {
    let protect: Vec<String> = elements.iter().map(ToString::to_string).collect();
    dom.dispatch(CustomEvent {
        name: "everscroll:ajax".to_string(),
        detail: serde_json::json!({ "protect": protect }),
    });
}
