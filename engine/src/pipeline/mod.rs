//! The append pipeline.
//!
//! One handler per append mode; each produces exactly one
//! [`AppendedContent`] or fails safely, and the shared [`finalize`] step
//! is the only place a page record is constructed. Strategy dispatch is
//! an enum match, not string comparison, so an unhandled mode is a
//! compile error.

mod ajax;
mod element;
mod finalize;
mod iframe;
mod media;
mod none;
mod plain;

pub(crate) use element::recompute_insertion_point;
pub(crate) use finalize::{insert_divider, remove_pending_divider};

use everscroll_dom::NodeId;
use everscroll_fetch::{FetchedDocument, Fetcher, parse_target};
use everscroll_types::AppendMode;

use crate::context::SessionContext;
use crate::errors::AppendError;

/// What a strategy handed to finalization.
pub(crate) struct AppendedContent {
    /// Anchor node for the new page record.
    pub anchor: NodeId,
    /// Address the content was resolved from.
    pub url: String,
    pub title: Option<String>,
    /// Frame handle, when the strategy created one.
    pub iframe: Option<NodeId>,
    /// Adopted content elements.
    pub page_elements: Vec<NodeId>,
}

/// Run the strategy for `mode` and finalize the result into a page
/// record. Returns the new page number.
pub(crate) async fn run<F: Fetcher>(
    cx: &mut SessionContext,
    fetcher: &F,
    mode: AppendMode,
) -> Result<usize, AppendError> {
    let content = match mode {
        AppendMode::Page => plain::append(cx, fetcher).await?,
        AppendMode::Iframe => iframe::append(cx, fetcher).await?,
        AppendMode::Element => element::append(cx, fetcher).await?,
        AppendMode::Media => media::append(cx)?,
        AppendMode::None => none::append(cx)?,
        AppendMode::Ajax => ajax::append(cx, fetcher).await?,
    };
    finalize::finalize(cx, content, mode).await
}

/// Resolve the session's current address and fetch it, or take the
/// document a reverse workflow primed earlier.
pub(crate) async fn take_or_fetch<F: Fetcher>(
    cx: &mut SessionContext,
    fetcher: &F,
) -> Result<FetchedDocument, AppendError> {
    if let Some(primed) = cx.primed.take() {
        return Ok(primed);
    }
    fetch_current(cx, fetcher).await
}

pub(crate) async fn fetch_current<F: Fetcher>(
    cx: &SessionContext,
    fetcher: &F,
) -> Result<FetchedDocument, AppendError> {
    let url = parse_target(&cx.session.url)?;
    Ok(fetcher.fetch(&url).await?)
}

/// Insert an inline, user-visible message node at the end of the host
/// document. Used for fetch and frame failures; never panics the
/// session.
pub(crate) fn insert_inline_message(cx: &mut SessionContext, text: &str, link: Option<&str>) {
    let message = cx
        .dom
        .create_element("div", &[("class", "everscroll-message"), ("role", "alert")]);
    let body = cx.dom.body();
    let text_node = cx.dom.create_text(text);
    let _ = cx.dom.append_child(message, text_node);
    if let Some(href) = link {
        let anchor = cx.dom.create_element("a", &[("href", href)]);
        let label = cx.dom.create_text("More information");
        let _ = cx.dom.append_child(anchor, label);
        let _ = cx.dom.append_child(message, anchor);
    }
    let _ = cx.dom.append_child(body, message);
    tracing::warn!(%text, "inline message shown");
}
