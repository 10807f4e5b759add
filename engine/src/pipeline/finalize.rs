//! Shared finalization.
//!
//! Every successful strategy run ends here: repair lazily loaded media,
//! run per-domain hooks, place the divider, register the page, refresh
//! the offset, announce the append. This is the only place a page
//! record is constructed.

use everscroll_dom::{CustomEvent, NodeId};
use everscroll_types::AppendMode;

use crate::context::SessionContext;
use crate::errors::AppendError;
use crate::offset;
use crate::pipeline::AppendedContent;
use crate::registry::NewPage;

/// Attributes lazy-loading schemes park the real source under.
const DEFERRED_SRC_ATTRS: &[&str] = &["data-src", "data-lazy-src", "data-original"];
const DEFERRED_SRCSET_ATTRS: &[&str] = &["data-srcset", "data-lazy-srcset"];

/// Substrings that mark a `src` as a placeholder image.
const PLACEHOLDER_MARKERS: &[&str] = &["spacer.", "blank.", "1x1"];

pub(crate) async fn finalize(
    cx: &mut SessionContext,
    content: AppendedContent,
    mode: AppendMode,
) -> Result<usize, AppendError> {
    // A stop command landed while the fetch was in flight: the result is
    // discarded, never half-applied.
    if !cx.session.enabled {
        discard(cx, &content);
        return Err(AppendError::Discarded);
    }

    repair_lazy_media(cx, content.anchor);
    resize_oversized_media(cx, content.anchor);
    if let Some(frame) = content.iframe {
        let _ = cx
            .dom
            .set_attr(frame, "data-everscroll-autoresize", "true");
    }
    run_repair_hooks(cx, &content.url, content.anchor);

    let url = content.url.clone();
    let title = content.title.clone();
    let anchor = content.anchor;
    let number = cx.registry.push(NewPage {
        url: content.url,
        title: content.title,
        element: content.anchor,
        append: mode,
        iframe: content.iframe,
        page_elements: content.page_elements,
    });
    cx.session.total_pages = cx.registry.len();

    place_divider(cx, anchor, number, &url);

    cx.session.url = url.clone();
    cx.last_good_url = url.clone();
    offset::refresh(cx, None);

    cx.dom.dispatch(CustomEvent {
        name: "everscroll:append".to_string(),
        detail: serde_json::json!({ "page": number, "url": url, "title": title }),
    });
    tracing::info!(page = number, %url, ?mode, "page appended");
    Ok(number)
}

/// Tear back out what a strategy already inserted.
fn discard(cx: &mut SessionContext, content: &AppendedContent) {
    tracing::debug!(url = %content.url, "append discarded, session disabled mid-flight");
    for &node in &content.page_elements {
        let _ = cx.dom.detach(node);
    }
    if cx.dom.is_attached(content.anchor) {
        let _ = cx.dom.detach(content.anchor);
    }
    remove_pending_divider(cx);
}

/// Promote deferred sources on images and frames in the appended
/// subtree, bounded by the lazy-media budget.
fn repair_lazy_media(cx: &mut SessionContext, anchor: NodeId) {
    let mut budget = cx.session.budgets.lazy_media_promotions;
    let mut candidates = vec![anchor];
    candidates.extend(cx.dom.descendants(anchor));

    for node in candidates {
        if budget == 0 {
            break;
        }
        let Some(tag) = cx.dom.tag(node) else { continue };
        if !matches!(tag, "img" | "video" | "iframe" | "source") {
            continue;
        }
        let current_src = cx.dom.attr(node, "src").map(str::to_string);
        let needs_repair = current_src.as_deref().is_none_or(is_placeholder);

        let mut promoted = false;
        if needs_repair
            && let Some(deferred) = DEFERRED_SRC_ATTRS
                .iter()
                .find_map(|&name| cx.dom.attr(node, name).map(|v| (name, v.to_string())))
        {
            let (attr_name, value) = deferred;
            let _ = cx.dom.set_attr(node, "src", &value);
            let _ = cx.dom.remove_attr(node, attr_name);
            promoted = true;
        }
        if let Some(deferred) = DEFERRED_SRCSET_ATTRS
            .iter()
            .find_map(|&name| cx.dom.attr(node, name).map(|v| (name, v.to_string())))
        {
            let (attr_name, value) = deferred;
            let _ = cx.dom.set_attr(node, "srcset", &value);
            let _ = cx.dom.remove_attr(node, attr_name);
            promoted = true;
        }
        if promoted {
            budget -= 1;
        }
    }
}

fn is_placeholder(src: &str) -> bool {
    let src = src.trim();
    src.is_empty()
        || src == "#"
        || src == "about:blank"
        || src.starts_with("data:")
        || PLACEHOLDER_MARKERS.iter().any(|m| src.contains(m))
}

/// Clamp media declared wider than the viewport so an appended page
/// cannot force horizontal scrolling.
fn resize_oversized_media(cx: &mut SessionContext, anchor: NodeId) {
    let viewport_width = cx.dom.metrics().viewport_width;
    let mut candidates = vec![anchor];
    candidates.extend(cx.dom.descendants(anchor));

    for node in candidates {
        if !matches!(cx.dom.tag(node), Some("img" | "video")) {
            continue;
        }
        let declared = cx
            .dom
            .attr(node, "width")
            .and_then(|w| w.trim_end_matches("px").parse::<f64>().ok());
        if let Some(width) = declared
            && width > viewport_width
        {
            let _ = cx
                .dom
                .set_attr(node, "width", &format!("{}", viewport_width as u32));
            let _ = cx.dom.remove_attr(node, "height");
            tracing::debug!(%node, width, "oversized media clamped");
        }
    }
}

fn run_repair_hooks(cx: &mut SessionContext, url: &str, anchor: NodeId) {
    for idx in cx.hooks_for(url) {
        let (suffix, hook) = &cx.repair_hooks[idx];
        if let Err(err) = hook(&mut cx.dom, anchor) {
            tracing::warn!(host = %suffix, error = %err, "repair hook failed");
        }
    }
}

/// Pre-insert a divider placeholder where the next page will land, so
/// the user sees progress while the fetch is in flight.
pub(crate) fn insert_divider(cx: &mut SessionContext) -> Option<NodeId> {
    if !cx.config.divider {
        return None;
    }
    let placeholder = cx
        .dom
        .create_element("div", &[("class", "everscroll-divider")]);
    let label = cx.dom.create_text("Loading...");
    cx.dom.append_child(placeholder, label).ok()?;
    match cx.valid_insertion_point() {
        Some(ip) => cx.dom.insert_before(ip, placeholder).ok()?,
        None => {
            let body = cx.dom.body();
            if cx.session.workflow.prepend
                && let Some(first) = cx.dom.children(body).first().copied()
            {
                cx.dom.insert_before(first, placeholder).ok()?;
            } else {
                cx.dom.append_child(body, placeholder).ok()?;
            }
        }
    }
    cx.pending_divider = Some(placeholder);
    Some(placeholder)
}

/// Remove the placeholder after a failed pass.
pub(crate) fn remove_pending_divider(cx: &mut SessionContext) {
    if let Some(divider) = cx.pending_divider.take() {
        let _ = cx.dom.detach(divider);
    }
}

/// Turn the placeholder into the real page divider, or build a
/// table-shaped one when the appended content lives inside a table.
fn place_divider(cx: &mut SessionContext, anchor: NodeId, number: usize, url: &str) {
    if !cx.config.divider {
        remove_pending_divider(cx);
        return;
    }

    if let Some(table) = table_ancestor(cx, anchor) {
        remove_pending_divider(cx);
        let span = divider_span(cx, table);
        let row = cx
            .dom
            .create_element("tr", &[("class", "everscroll-divider")]);
        let cell = cx
            .dom
            .create_element("td", &[("colspan", &span.to_string())]);
        let link = divider_link(cx, number, url);
        let _ = cx.dom.append_child(cell, link);
        let _ = cx.dom.append_child(row, cell);
        let _ = cx.dom.insert_before(anchor, row);
        return;
    }

    let divider = match cx.pending_divider.take() {
        Some(d) if cx.dom.is_attached(d) => d,
        _ => {
            let d = cx
                .dom
                .create_element("div", &[("class", "everscroll-divider")]);
            if cx.dom.insert_before(anchor, d).is_err() {
                return;
            }
            d
        }
    };
    for child in cx.dom.children(divider).to_vec() {
        let _ = cx.dom.detach(child);
    }
    let link = divider_link(cx, number, url);
    let _ = cx.dom.append_child(divider, link);
}

fn divider_link(cx: &mut SessionContext, number: usize, url: &str) -> NodeId {
    let link = cx.dom.create_element("a", &[("href", url)]);
    let label = cx.dom.create_text(&format!("Page {number}"));
    let _ = cx.dom.append_child(link, label);
    link
}

fn table_ancestor(cx: &SessionContext, node: NodeId) -> Option<NodeId> {
    let mut current = node;
    while let Some(parent) = cx.dom.parent(current) {
        if cx.dom.tag(parent) == Some("table") {
            return Some(parent);
        }
        current = parent;
    }
    None
}

/// Column span for table dividers: width of the table's first row,
/// computed exactly once per session.
fn divider_span(cx: &mut SessionContext, table: NodeId) -> u32 {
    if let Some(span) = cx.divider_span {
        return span;
    }
    let span = cx
        .dom
        .descendants(table)
        .into_iter()
        .find(|&n| cx.dom.tag(n) == Some("tr"))
        .map_or(1, |row| {
            cx.dom
                .children(row)
                .iter()
                .filter(|&&c| matches!(cx.dom.tag(c), Some("td" | "th")))
                .count()
                .max(1) as u32
        });
    cx.divider_span = Some(span);
    span
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("#"));
        assert!(is_placeholder("about:blank"));
        assert!(is_placeholder("data:image/gif;base64,R0lGOD"));
        assert!(is_placeholder("https://cdn.example.com/spacer.gif"));
        assert!(is_placeholder("/img/1x1.png"));
        assert!(!is_placeholder("https://example.com/photo.jpg"));
    }
}
