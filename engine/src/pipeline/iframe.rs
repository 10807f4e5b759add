//! Isolated-frame append.
//!
//! Three variants: show the whole frame, trim the frame's document to
//! the located content subset, or keep the frame invisible as a live
//! source for the element strategy. Frame load failures revert the
//! session's address to the last known-good page and surface an inline
//! message instead of crashing the session.

use everscroll_fetch::Fetcher;

use crate::config::IframeVariant;
use crate::context::SessionContext;
use crate::errors::AppendError;
use crate::pipeline::{AppendedContent, insert_inline_message, take_or_fetch};

const FRAME_BLOCKED_HELP: &str = "https://everscroll.dev/help/frame-blocked";

pub(crate) async fn append<F: Fetcher>(
    cx: &mut SessionContext,
    fetcher: &F,
) -> Result<AppendedContent, AppendError> {
    let url = cx.session.url.clone();
    let doc = match take_or_fetch(cx, fetcher).await {
        Ok(doc) => doc,
        Err(err) => {
            // Cross-origin or blocked: fall back to the last page that
            // worked and tell the user inline.
            tracing::warn!(%url, error = %err, "frame load failed");
            cx.session.url = cx.last_good_url.clone();
            insert_inline_message(
                cx,
                &format!("Everscroll could not load '{url}' in a frame."),
                Some(FRAME_BLOCKED_HELP),
            );
            return Err(AppendError::FrameBlocked { url });
        }
    };

    let final_url = doc.final_url.to_string();
    let mut frame_doc = doc.dom;

    if cx.config.iframe_variant == IframeVariant::Trimmed {
        trim_to_content(cx, &mut frame_doc).await?;
    }

    let frame = cx.dom.create_element(
        "iframe",
        &[
            ("src", final_url.as_str()),
            ("class", "everscroll-iframe"),
            ("scrolling", "no"),
            ("frameborder", "0"),
        ],
    );
    let body = cx.dom.body();
    cx.dom.append_child(body, frame)?;
    // The frame starts at the viewport's height; the auto-resizer
    // attached during finalization grows it with its content.
    let viewport_height = cx.dom.metrics().viewport_height;
    cx.dom.set_height(frame, viewport_height)?;

    if cx.config.iframe_variant == IframeVariant::Import {
        cx.dom.set_attr(frame, "style", "display: none")?;
        cx.dom.set_height(frame, 0.0)?;
    }

    let title = frame_doc.title();
    cx.frame_doc = Some(frame_doc);
    cx.frame_node = Some(frame);

    Ok(AppendedContent {
        anchor: frame,
        url: final_url,
        title,
        iframe: Some(frame),
        page_elements: Vec::new(),
    })
}

/// Wait for the frame's content to resolve, then detach everything the
/// locator does not cover. Polls are bounded by the frame-wait budget
/// and stop early once the document's revision stops moving: a settled
/// document is not going to produce the content later.
async fn trim_to_content(
    cx: &mut SessionContext,
    frame_doc: &mut everscroll_dom::Dom,
) -> Result<(), AppendError> {
    let Some(locator) = cx.page_element_locator.clone() else {
        return Ok(());
    };

    let mut located = frame_doc.select(&locator);
    let mut polls = 0;
    let mut seen = frame_doc.revision();
    while located.is_empty() && polls < cx.session.budgets.frame_wait_polls {
        polls += 1;
        tokio::time::sleep(cx.config.frame_poll()).await;
        let revision = frame_doc.revision();
        if revision == seen {
            break;
        }
        seen = revision;
        located = frame_doc.select(&locator);
    }
    if located.is_empty() {
        cx.element_attempts += 1;
        return Err(AppendError::NoContent {
            locator: locator.source().to_string(),
        });
    }

    let keep: std::collections::HashSet<_> = located
        .iter()
        .flat_map(|&node| {
            let mut chain = vec![node];
            chain.extend(frame_doc.descendants(node));
            let mut current = node;
            while let Some(parent) = frame_doc.parent(current) {
                chain.push(parent);
                current = parent;
            }
            chain
        })
        .collect();

    let body = frame_doc.body();
    for child in frame_doc.descendants(body) {
        if !keep.contains(&child)
            && frame_doc
                .parent(child)
                .is_some_and(|parent| keep.contains(&parent))
            && frame_doc.is_attached(child)
        {
            let _ = frame_doc.detach(child);
        }
    }
    Ok(())
}
