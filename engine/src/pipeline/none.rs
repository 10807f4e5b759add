//! The "none" strategy: no insertion. The action's own side effect
//! (typically a clicked control) is trusted to have changed the host
//! page; the record anchors to whatever now ends the document.

use crate::context::SessionContext;
use crate::errors::AppendError;
use crate::pipeline::AppendedContent;

pub(crate) fn append(cx: &mut SessionContext) -> Result<AppendedContent, AppendError> {
    let body = cx.dom.body();
    let anchor = cx.dom.last_element_child(body).unwrap_or(body);
    Ok(AppendedContent {
        anchor,
        url: cx.session.url.clone(),
        title: cx.dom.title(),
        iframe: None,
        page_elements: Vec::new(),
    })
}
