//! The node arena and its mutation surface.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::geometry::Metrics;

/// Handle into a [`Dom`] arena. Never reused; a detached node keeps its
/// id until the whole document is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node payload.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct NodeSlot {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Explicit pixel height overriding the layout model.
    pub(crate) explicit_height: Option<f64>,
}

/// A page-local custom event, observable by third parties (and tests).
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
    pub name: String,
    pub detail: Value,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),
    #[error("reference node {0} has no parent")]
    NoParent(NodeId),
    #[error("invalid locator: {0}")]
    LocatorParse(String),
}

/// A live mutable document.
pub struct Dom {
    pub(crate) nodes: Vec<NodeSlot>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    revision: u64,
    detached: Vec<NodeId>,
    events: Vec<CustomEvent>,
    pub(crate) metrics: Metrics,
}

impl fmt::Debug for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dom")
            .field("nodes", &self.nodes.len())
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// An empty document: `#document > html > (head, body)`.
    #[must_use]
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            revision: 0,
            detached: Vec::new(),
            events: Vec::new(),
            metrics: Metrics::default(),
        };
        let root = dom.push(NodeKind::Element {
            tag: "#document".to_string(),
            attrs: Vec::new(),
        });
        dom.root = root;
        let html = dom.create_element("html", &[]);
        dom.attach(root, html);
        let head = dom.create_element("head", &[]);
        dom.attach(html, head);
        dom.head = head;
        let body = dom.create_element("body", &[]);
        dom.attach(html, body);
        dom.body = body;
        dom.revision = 0;
        dom
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeSlot {
            kind,
            parent: None,
            children: Vec::new(),
            explicit_height: None,
        });
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub(crate) fn slot(&self, id: NodeId) -> Result<&NodeSlot, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create an orphan element.
    pub fn create_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| ((*k).to_ascii_lowercase(), (*v).to_string()))
                .collect(),
        })
    }

    /// Create an orphan text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.slot(parent)?;
        self.slot(child)?;
        self.detach_quiet(child);
        self.attach(parent, child);
        self.revision += 1;
        Ok(())
    }

    /// Insert `new` as a sibling immediately before `reference`.
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) -> Result<(), DomError> {
        let parent = self
            .slot(reference)?
            .parent
            .ok_or(DomError::NoParent(reference))?;
        self.slot(new)?;
        self.detach_quiet(new);
        self.nodes[new.0].parent = Some(parent);
        let siblings = &mut self.nodes[parent.0].children;
        let idx = siblings
            .iter()
            .position(|&c| c == reference)
            .ok_or(DomError::NoParent(reference))?;
        siblings.insert(idx, new);
        self.revision += 1;
        Ok(())
    }

    /// Detach a subtree from the document. The nodes stay in the arena;
    /// `is_attached` becomes false for the whole subtree.
    pub fn detach(&mut self, node: NodeId) -> Result<(), DomError> {
        self.slot(node)?;
        if self.detach_quiet(node) {
            self.detached.push(node);
            self.revision += 1;
        }
        Ok(())
    }

    fn detach_quiet(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.nodes[node.0].parent else {
            return false;
        };
        self.nodes[parent.0].children.retain(|&c| c != node);
        self.nodes[node.0].parent = None;
        true
    }

    /// Set or replace an attribute.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let slot = self.nodes.get_mut(node.0).ok_or(DomError::UnknownNode(node))?;
        match &mut slot.kind {
            NodeKind::Element { attrs, .. } => {
                let name = name.to_ascii_lowercase();
                if let Some(entry) = attrs.iter_mut().find(|(k, _)| *k == name) {
                    entry.1 = value.to_string();
                } else {
                    attrs.push((name, value.to_string()));
                }
                self.revision += 1;
                Ok(())
            }
            NodeKind::Text(_) => Err(DomError::NotAnElement(node)),
        }
    }

    /// Remove an attribute if present.
    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        let slot = self.nodes.get_mut(node.0).ok_or(DomError::UnknownNode(node))?;
        match &mut slot.kind {
            NodeKind::Element { attrs, .. } => {
                let name = name.to_ascii_lowercase();
                let before = attrs.len();
                attrs.retain(|(k, _)| *k != name);
                if attrs.len() != before {
                    self.revision += 1;
                }
                Ok(())
            }
            NodeKind::Text(_) => Err(DomError::NotAnElement(node)),
        }
    }

    /// Pin a node to an explicit pixel height, overriding the layout model.
    pub fn set_height(&mut self, node: NodeId, px: f64) -> Result<(), DomError> {
        let slot = self.nodes.get_mut(node.0).ok_or(DomError::UnknownNode(node))?;
        slot.explicit_height = Some(px.max(0.0));
        self.revision += 1;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Adoption across documents
    // ------------------------------------------------------------------

    /// Deep-copy a subtree from `src` and append it under `parent`,
    /// skipping any element whose tag is listed in `skip_tags`.
    pub fn adopt_subtree(
        &mut self,
        src: &Dom,
        src_node: NodeId,
        parent: NodeId,
        skip_tags: &[&str],
    ) -> Result<Option<NodeId>, DomError> {
        let copied = self.copy_from(src, src_node, skip_tags)?;
        if let Some(id) = copied {
            self.append_child(parent, id)?;
        }
        Ok(copied)
    }

    /// Deep-copy a subtree from `src` and insert it before `reference`.
    pub fn adopt_before(
        &mut self,
        src: &Dom,
        src_node: NodeId,
        reference: NodeId,
        skip_tags: &[&str],
    ) -> Result<Option<NodeId>, DomError> {
        let copied = self.copy_from(src, src_node, skip_tags)?;
        if let Some(id) = copied {
            self.insert_before(reference, id)?;
        }
        Ok(copied)
    }

    fn copy_from(
        &mut self,
        src: &Dom,
        src_node: NodeId,
        skip_tags: &[&str],
    ) -> Result<Option<NodeId>, DomError> {
        let slot = src.slot(src_node)?;
        let id = match &slot.kind {
            NodeKind::Element { tag, attrs } => {
                if skip_tags.iter().any(|skip| skip.eq_ignore_ascii_case(tag)) {
                    return Ok(None);
                }
                self.push(NodeKind::Element {
                    tag: tag.clone(),
                    attrs: attrs.clone(),
                })
            }
            NodeKind::Text(text) => self.push(NodeKind::Text(text.clone())),
        };
        self.nodes[id.0].explicit_height = slot.explicit_height;
        for &child in &slot.children {
            if let Some(copied) = self.copy_from(src, child, skip_tags)? {
                self.attach(id, copied);
            }
        }
        Ok(Some(id))
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn head(&self) -> NodeId {
        self.head
    }

    #[must_use]
    pub fn body(&self) -> NodeId {
        self.body
    }

    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// Attribute names in document definition order.
    #[must_use]
    pub fn attr_names(&self, node: NodeId) -> Vec<String> {
        match self.nodes.get(node.0).map(|slot| &slot.kind) {
            Some(NodeKind::Element { attrs, .. }) => {
                attrs.iter().map(|(k, _)| k.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map_or(&[][..], |slot| slot.children.as_slice())
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(
            self.nodes.get(node.0).map(|slot| &slot.kind),
            Some(NodeKind::Element { .. })
        )
    }

    /// True while the node's parent chain reaches the document root.
    #[must_use]
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes.get(current.0).and_then(|slot| slot.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Last child of `parent` that is an element.
    #[must_use]
    pub fn last_element_child(&self, parent: NodeId) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .rev()
            .copied()
            .find(|&c| self.is_element(c))
    }

    /// All descendants of `node` in document order, `node` excluded.
    #[must_use]
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Concatenated text of a subtree.
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(slot) = self.nodes.get(current.0) {
                match &slot.kind {
                    NodeKind::Text(text) => out.push_str(text),
                    NodeKind::Element { .. } => {
                        stack.extend(slot.children.iter().rev().copied());
                    }
                }
            }
        }
        out
    }

    /// Text of the document's `<title>` element, if any.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        let title = self
            .descendants(self.root)
            .into_iter()
            .find(|&n| self.tag(n) == Some("title"))?;
        let text = self.text_content(title).trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    // ------------------------------------------------------------------
    // Mutation journal & events
    // ------------------------------------------------------------------

    /// Monotonic counter bumped by every mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Nodes explicitly detached since the journal was last drained.
    pub fn drain_detached(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.detached)
    }

    /// Fire a page-local custom event.
    pub fn dispatch(&mut self, event: CustomEvent) {
        tracing::debug!(name = %event.name, "custom event dispatched");
        self.events.push(event);
    }

    /// Events fired so far, oldest first.
    #[must_use]
    pub fn events(&self) -> &[CustomEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<CustomEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_has_body() {
        let dom = Dom::new();
        assert_eq!(dom.tag(dom.body()), Some("body"));
        assert!(dom.is_attached(dom.body()));
        assert_eq!(dom.revision(), 0);
    }

    #[test]
    fn append_insert_detach() {
        let mut dom = Dom::new();
        let a = dom.create_element("div", &[("id", "a")]);
        let b = dom.create_element("div", &[("id", "b")]);
        dom.append_child(dom.body(), a).unwrap();
        dom.insert_before(a, b).unwrap();
        assert_eq!(dom.children(dom.body()), &[b, a]);

        dom.detach(b).unwrap();
        assert!(!dom.is_attached(b));
        assert!(dom.is_attached(a));
        assert_eq!(dom.drain_detached(), vec![b]);
    }

    #[test]
    fn revision_tracks_mutations() {
        let mut dom = Dom::new();
        let rev = dom.revision();
        let a = dom.create_element("p", &[]);
        assert_eq!(dom.revision(), rev, "orphan creation is not a mutation");
        dom.append_child(dom.body(), a).unwrap();
        assert!(dom.revision() > rev);
    }

    #[test]
    fn adoption_copies_and_filters() {
        let mut src = Dom::new();
        let wrapper = src.create_element("div", &[("class", "page")]);
        let script = src.create_element("script", &[]);
        let text = src.create_text("hello");
        src.append_child(src.body(), wrapper).unwrap();
        src.append_child(wrapper, script).unwrap();
        src.append_child(wrapper, text).unwrap();

        let mut host = Dom::new();
        let body = host.body();
        let copied = host
            .adopt_subtree(&src, wrapper, body, &["script"])
            .unwrap()
            .unwrap();
        assert_eq!(host.tag(copied), Some("div"));
        assert_eq!(host.text_content(copied), "hello");
        assert!(
            host.descendants(copied)
                .iter()
                .all(|&n| host.tag(n) != Some("script"))
        );
        // source untouched
        assert!(src.is_attached(script));
    }

    #[test]
    fn custom_events_are_observable() {
        let mut dom = Dom::new();
        dom.dispatch(CustomEvent {
            name: "everscroll:append".to_string(),
            detail: serde_json::json!({"page": 2}),
        });
        assert_eq!(dom.events().len(), 1);
        assert_eq!(dom.drain_events()[0].name, "everscroll:append");
        assert!(dom.events().is_empty());
    }
}
