//! Element-subset append: locate content in the fetched (or frame)
//! document and splice it immediately before the insertion point.

use everscroll_dom::{Dom, NodeId};
use everscroll_fetch::Fetcher;
use everscroll_types::DocumentType;

use crate::context::SessionContext;
use crate::errors::AppendError;
use crate::pipeline::{AppendedContent, take_or_fetch};

pub(crate) async fn append<F: Fetcher>(
    cx: &mut SessionContext,
    fetcher: &F,
) -> Result<AppendedContent, AppendError> {
    // The hidden imported frame's live document feeds this strategy
    // when the session points at it; otherwise fetch fresh.
    let (source, url, title) =
        if cx.session.document_type == DocumentType::Iframe
            && let Some(doc) = cx.frame_doc.take()
        {
            let title = doc.title();
            (doc, cx.session.url.clone(), title)
        } else {
            let doc = take_or_fetch(cx, fetcher).await?;
            let title = doc.title;
            (doc.dom, doc.final_url.to_string(), title)
        };

    let result = adopt_located(cx, &source, &url, title);
    // An imported frame document is reused across appends.
    if cx.session.document_type == DocumentType::Iframe {
        cx.frame_doc = Some(source);
    }
    result
}

/// Locate, validate the insertion point, adopt, re-anchor.
pub(crate) fn adopt_located(
    cx: &mut SessionContext,
    source: &Dom,
    url: &str,
    title: Option<String>,
) -> Result<AppendedContent, AppendError> {
    let locator = cx
        .page_element_locator
        .clone()
        .ok_or_else(|| AppendError::NoContent {
            locator: String::new(),
        })?;

    let located: Vec<NodeId> = source
        .select(&locator)
        .into_iter()
        .filter(|&node| source.is_attached(node))
        .collect();
    if located.is_empty() {
        cx.element_attempts += 1;
        tracing::debug!(
            attempts = cx.element_attempts,
            locator = locator.source(),
            "no content elements located"
        );
        return Err(AppendError::NoContent {
            locator: locator.source().to_string(),
        });
    }

    // Revalidate the insertion point before every use; the host page may
    // have detached it since the last append.
    let insert = match cx.valid_insertion_point() {
        Some(ip) => ip,
        None => recompute_insertion_point(cx, &locator)?,
    };

    let mut adopted = Vec::new();
    for &node in &located {
        if let Some(copied) = cx.dom.adopt_before(source, node, insert, &[])? {
            adopted.push(copied);
        }
    }
    let anchor = *adopted.first().ok_or(AppendError::NoContent {
        locator: locator.source().to_string(),
    })?;

    // The marker now trails the new tail element again.
    cx.insertion_point = Some(insert);
    cx.element_attempts = 0;

    Ok(AppendedContent {
        anchor,
        url: url.to_string(),
        title,
        iframe: None,
        page_elements: adopted,
    })
}

/// Rebuild the insertion point from the current content-element set: an
/// empty text marker directly after the last located element (before the
/// first, for prepending sessions), or at the edge of the body when the
/// host no longer matches the locator at all.
pub(crate) fn recompute_insertion_point(
    cx: &mut SessionContext,
    locator: &everscroll_dom::Locator,
) -> Result<NodeId, AppendError> {
    let in_host: Vec<NodeId> = cx
        .dom
        .select(locator)
        .into_iter()
        .filter(|&node| cx.dom.is_attached(node))
        .collect();

    let marker = cx.dom.create_text("");
    if cx.session.workflow.prepend {
        let body = cx.dom.body();
        let edge = in_host
            .first()
            .copied()
            .or_else(|| cx.dom.children(body).first().copied());
        match edge {
            Some(first) => cx.dom.insert_before(first, marker)?,
            None => cx.dom.append_child(body, marker)?,
        }
        tracing::debug!("insertion point recomputed");
        cx.insertion_point = Some(marker);
        return Ok(marker);
    }
    match in_host.last() {
        Some(&tail) => {
            let parent = cx.dom.parent(tail).ok_or(AppendError::InsertionPointLost)?;
            let siblings = cx.dom.children(parent);
            let next = siblings
                .iter()
                .skip_while(|&&sibling| sibling != tail)
                .nth(1)
                .copied();
            match next {
                Some(next) => cx.dom.insert_before(next, marker)?,
                None => cx.dom.append_child(parent, marker)?,
            }
        }
        None => {
            let body = cx.dom.body();
            cx.dom.append_child(body, marker)?;
        }
    }
    tracing::debug!("insertion point recomputed");
    cx.insertion_point = Some(marker);
    Ok(marker)
}
