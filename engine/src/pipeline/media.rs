//! Media append: one image or video node pointed at the target
//! address. No document fetch occurs.

use crate::context::SessionContext;
use crate::errors::AppendError;
use crate::pipeline::AppendedContent;

const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".ogv", ".ogg", ".mov", ".m4v"];

pub(crate) fn append(cx: &mut SessionContext) -> Result<AppendedContent, AppendError> {
    let url = cx.session.url.clone();

    let wrapper = cx
        .dom
        .create_element("div", &[("class", "everscroll-media")]);
    let body = cx.dom.body();
    if cx.session.workflow.prepend
        && let Some(first) = cx.dom.children(body).first().copied()
    {
        cx.dom.insert_before(first, wrapper)?;
    } else {
        cx.dom.append_child(body, wrapper)?;
    }

    let tag = if is_video(&url) { "video" } else { "img" };
    let media = cx.dom.create_element(tag, &[("src", url.as_str())]);
    if tag == "video" {
        cx.dom.set_attr(media, "controls", "")?;
    }
    cx.dom.append_child(wrapper, media)?;
    tracing::debug!(%url, tag, "media node appended");

    Ok(AppendedContent {
        anchor: wrapper,
        url,
        title: None,
        iframe: None,
        page_elements: vec![media],
    })
}

fn is_video(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
