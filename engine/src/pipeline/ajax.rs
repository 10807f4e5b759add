//! Script-mediated append: element adoption plus a handshake with the
//! injected helper script, which suppresses the host page's competing
//! scroll/removal behavior and protects the adopted nodes.

use everscroll_fetch::Fetcher;

use crate::context::SessionContext;
use crate::errors::AppendError;
use crate::pipeline::{AppendedContent, element, take_or_fetch};
use crate::scripts;

pub(crate) async fn append<F: Fetcher>(
    cx: &mut SessionContext,
    fetcher: &F,
) -> Result<AppendedContent, AppendError> {
    let doc = take_or_fetch(cx, fetcher).await?;
    let url = doc.final_url.to_string();
    let title = doc.title.clone();
    let content = element::adopt_located(cx, &doc.dom, &url, title)?;

    scripts::request_protection(&mut cx.dom, &content.page_elements);
    // Give the helper script a beat to disable the host's own handlers
    // before finalization touches the adopted nodes.
    tokio::time::sleep(cx.config.ajax_handshake()).await;

    Ok(content)
}
