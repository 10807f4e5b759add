//! Plain page append: fetch, strip active content, adopt body children
//! into a wrapper at the end of the host document.

use everscroll_fetch::Fetcher;

use crate::context::SessionContext;
use crate::errors::AppendError;
use crate::pipeline::{AppendedContent, take_or_fetch};

/// Tags never adopted from a fetched document into the host.
const STRIPPED_TAGS: &[&str] = &["script", "style", "link", "template", "noscript"];

pub(crate) async fn append<F: Fetcher>(
    cx: &mut SessionContext,
    fetcher: &F,
) -> Result<AppendedContent, AppendError> {
    let doc = take_or_fetch(cx, fetcher).await?;
    let url = doc.final_url.to_string();

    let wrapper = cx.dom.create_element(
        "div",
        &[
            ("class", "everscroll-page"),
            ("data-everscroll-url", url.as_str()),
        ],
    );
    let body = cx.dom.body();
    // Backward actions splice the wrapper before existing content.
    if cx.session.workflow.prepend
        && let Some(first) = cx.dom.children(body).first().copied()
    {
        cx.dom.insert_before(first, wrapper)?;
    } else {
        cx.dom.append_child(body, wrapper)?;
    }

    let mut adopted = Vec::new();
    for &child in &doc.dom.children(doc.dom.body()).to_vec() {
        if let Some(copied) = cx.dom.adopt_subtree(&doc.dom, child, wrapper, STRIPPED_TAGS)? {
            adopted.push(copied);
        }
    }
    tracing::debug!(count = adopted.len(), %url, "plain append adopted body children");

    Ok(AppendedContent {
        anchor: wrapper,
        url,
        title: doc.title,
        iframe: None,
        page_elements: adopted,
    })
}
