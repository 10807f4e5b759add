//! The offset calculator.
//!
//! Offset is the pixel gap between where content logically ends and
//! where the document physically ends (trailing decorative whitespace,
//! footers below the insertion point, and so on). Pure ordered
//! fallbacks; safe to call redundantly.

use everscroll_dom::NodeId;
use everscroll_types::Action;

use crate::context::SessionContext;

/// Compute the offset for the current strategy and geometry.
///
/// Ordered fallbacks, first success wins:
/// 1. plain / isolated-frame / media strategies end exactly at the
///    document end: zero.
/// 2. a manual click trigger with known coordinates: gap below it.
/// 3. top of the insertion point.
/// 4. maximum bottom among all current content elements.
/// 5. treat content as ending at three quarters of the document.
#[must_use]
pub fn compute(cx: &SessionContext, click_target: Option<NodeId>) -> u32 {
    let doc_height = cx.dom.document_height();

    if cx.session.append.has_zero_offset() {
        return 0;
    }

    if cx.session.action == Action::Click
        && let Some(target) = click_target
        && let Some(rect) = cx.dom.position(target)
    {
        return gap(doc_height, rect.top);
    }

    if let Some(ip) = cx.valid_insertion_point()
        && let Some(rect) = cx.dom.position(ip)
    {
        return gap(doc_height, rect.top);
    }

    let max_bottom = cx
        .registry
        .iter()
        .flat_map(|record| record.page_elements.iter())
        .filter_map(|&element| cx.dom.position(element))
        .map(|rect| rect.bottom())
        .fold(None, |acc: Option<f64>, bottom| {
            Some(acc.map_or(bottom, |a| a.max(bottom)))
        });
    if let Some(bottom) = max_bottom {
        return gap(doc_height, bottom);
    }

    (doc_height * 0.25).ceil().max(0.0) as u32
}

/// Recompute and cache the offset on the context.
pub fn refresh(cx: &mut SessionContext, click_target: Option<NodeId>) {
    let offset = compute(cx, click_target);
    if offset != cx.offset {
        tracing::debug!(old = cx.offset, new = offset, "offset recomputed");
    }
    cx.offset = offset;
}

/// Ceiling-rounded, never negative.
fn gap(doc_height: f64, logical_end: f64) -> u32 {
    (doc_height - logical_end).max(0.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    use everscroll_dom::Dom;
    use everscroll_types::{AppendMode, Session};

    use crate::config::EngineConfig;

    fn context(append: AppendMode) -> SessionContext {
        let mut dom = Dom::new();
        let content = dom.create_element("div", &[("id", "content")]);
        let body = dom.body();
        dom.append_child(body, content).unwrap();
        dom.set_height(content, 900.0).unwrap();
        dom.set_trailing_gap(100.0);
        let session = Session::new("https://example.com/1", everscroll_types::Action::Next, append);
        SessionContext::new(session, dom, EngineConfig::default()).unwrap()
    }

    #[test]
    fn zero_for_whole_document_strategies() {
        for append in [AppendMode::Page, AppendMode::Iframe, AppendMode::Media] {
            let cx = context(append);
            assert_eq!(compute(&cx, None), 0);
        }
    }

    #[test]
    fn insertion_point_top_wins_for_element_mode() {
        let mut cx = context(AppendMode::Element);
        let marker = cx.dom.create_text("");
        let body = cx.dom.body();
        cx.dom.append_child(body, marker).unwrap();
        cx.insertion_point = Some(marker);
        // marker sits at y=900 in a 1000px document
        assert_eq!(compute(&cx, None), 100);
    }

    #[test]
    fn stale_insertion_point_falls_through() {
        let mut cx = context(AppendMode::Element);
        let marker = cx.dom.create_text("");
        // never attached: fall through to the 75% heuristic
        cx.insertion_point = Some(marker);
        assert_eq!(compute(&cx, None), 250);
    }

    #[test]
    fn max_content_bottom_beats_heuristic() {
        let mut cx = context(AppendMode::Element);
        let element = cx
            .dom
            .select(&everscroll_dom::Locator::selector("#content").unwrap())[0];
        cx.registry.push(crate::registry::NewPage {
            url: "https://example.com/1".to_string(),
            title: None,
            element,
            append: AppendMode::Element,
            iframe: None,
            page_elements: vec![element],
        });
        // content bottom at 900 of 1000: the trailing gap is the offset
        assert_eq!(compute(&cx, None), 100);
    }

    #[test]
    fn last_resort_is_a_quarter_of_the_height() {
        let cx = context(AppendMode::Element);
        assert_eq!(compute(&cx, None), 250);
    }

    #[test]
    fn never_negative() {
        let mut cx = context(AppendMode::Element);
        let marker = cx.dom.create_text("");
        let body = cx.dom.body();
        cx.dom.append_child(body, marker).unwrap();
        cx.insertion_point = Some(marker);
        // marker below all content and the document end cannot produce a
        // negative gap
        assert!(compute(&cx, None) <= cx.dom.document_height() as u32);
    }
}
