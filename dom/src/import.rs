//! HTML parsing and import.
//!
//! Fetched documents are parsed with `scraper` and walked into the arena.
//! The parse is lenient: malformed markup produces whatever tree the
//! html5ever recovery produces, which matches what a live host would
//! render.

use scraper::{ElementRef, Html, Node as HtmlNode};

use crate::node::{Dom, NodeId};

impl Dom {
    /// Parse an HTML document into a fresh arena.
    #[must_use]
    pub fn parse_document(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut dom = Self::new();
        let root = parsed.root_element();

        for child in root.children() {
            let Some(element) = ElementRef::wrap(child) else {
                continue;
            };
            match element.value().name() {
                "head" => {
                    let head = dom.head();
                    import_children(&mut dom, element, head);
                }
                "body" => {
                    let body = dom.body();
                    copy_element_attrs(&mut dom, element, body);
                    import_children(&mut dom, element, body);
                }
                _ => {
                    let imported = import_element(&mut dom, element);
                    let body = dom.body();
                    let _ = dom.append_child(body, imported);
                }
            }
        }
        dom
    }
}

fn copy_element_attrs(dom: &mut Dom, element: ElementRef<'_>, target: NodeId) {
    for (name, value) in element.value().attrs() {
        let _ = dom.set_attr(target, name, value);
    }
}

fn import_element(dom: &mut Dom, element: ElementRef<'_>) -> NodeId {
    let attrs: Vec<(String, String)> = element
        .value()
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let attr_refs: Vec<(&str, &str)> = attrs
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let id = dom.create_element(element.value().name(), &attr_refs);
    import_children(dom, element, id);
    id
}

fn import_children(dom: &mut Dom, element: ElementRef<'_>, parent: NodeId) {
    for child in element.children() {
        match child.value() {
            HtmlNode::Text(text) => {
                if !text.trim().is_empty() {
                    let id = dom.create_text(text);
                    let _ = dom.append_child(parent, id);
                }
            }
            HtmlNode::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    let id = import_element(dom, child_ref);
                    let _ = dom.append_child(parent, id);
                }
            }
            _ => {}
        }
    }
}
