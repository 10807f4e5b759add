//! The append workflow.
//!
//! One pass per trigger. `is_loading` is the engine's sole mutual
//! exclusion: it is set before the first asynchronous step and cleared
//! on every path out, after the cool-down. While it is set, the
//! detector gate refuses further appends, so at most one append is ever
//! in flight.

use everscroll_fetch::Fetcher;

use crate::bridge::{ActionContext, ActionResolver, MessagingBridge, Status};
use crate::context::SessionContext;
use crate::errors::AppendError;
use crate::{detector, offset, pipeline};

/// Run one full append pass.
pub(crate) async fn execute<F: Fetcher>(
    cx: &mut SessionContext,
    fetcher: &F,
    actions: &mut dyn ActionResolver,
    bridge: &mut dyn MessagingBridge,
) {
    if !cx.session.enabled || cx.session.is_loading {
        return;
    }
    cx.session.is_loading = true;
    bridge.show_status(Status::Loading);
    if !cx.dom.has_scrollbar() {
        cx.session.scrollbar_appends += 1;
    }

    let result = if cx.session.workflow.reverse {
        reverse_pass(cx, fetcher, actions).await
    } else {
        normal_pass(cx, fetcher, actions).await
    };

    match result {
        Ok(Some(page)) => {
            offset::refresh(cx, actions.click_target());
            bridge.notify_session(&cx.session);
            bridge.show_status(Status::Appended { page });
        }
        Ok(None) => {
            tracing::debug!("no further content, pass ended quietly");
        }
        Err(err) => handle_error(cx, bridge, &err).await,
    }

    // Cool-down. The loading flag doubles as the detector mute, so
    // clearing it only after the delay absorbs the trigger storm that
    // follows a document-height change.
    tokio::time::sleep(cx.config.append_delay()).await;
    cx.session.is_loading = false;
    bridge.hide_status();
}

/// Normal shape: divider, action, then fetch-and-merge.
async fn normal_pass<F: Fetcher>(
    cx: &mut SessionContext,
    fetcher: &F,
    actions: &mut dyn ActionResolver,
) -> Result<Option<usize>, AppendError> {
    pipeline::insert_divider(cx);
    if !perform_action(cx, actions) {
        // No next page exists; undo the placeholder and wait for the
        // host to change.
        pipeline::remove_pending_divider(cx);
        tracing::debug!(action = ?cx.session.action, "action produced no next page");
        return Ok(None);
    }
    let page = pipeline::run(cx, fetcher, cx.session.append).await?;
    Ok(Some(page))
}

/// Reverse shape: merge the unit primed on the previous pass first,
/// then perform the action and prime the next unit. The very first pass
/// of a reverse session has nothing primed and only primes. The merge
/// half runs only when a prior action actually advanced; a failed
/// priming fetch is retried here, a failed action is not, so exhausted
/// content never re-registers the last page.
async fn reverse_pass<F: Fetcher>(
    cx: &mut SessionContext,
    fetcher: &F,
    actions: &mut dyn ActionResolver,
) -> Result<Option<usize>, AppendError> {
    let page = if cx.session.workflow.skip_append {
        cx.session.workflow.skip_append = false;
        None
    } else if cx.awaiting_append {
        pipeline::insert_divider(cx);
        let number = pipeline::run(cx, fetcher, cx.session.append).await?;
        cx.awaiting_append = false;
        Some(number)
    } else {
        tracing::debug!(action = ?cx.session.action, "nothing staged, retrying the action");
        None
    };

    if perform_action(cx, actions) {
        cx.awaiting_append = true;
        match pipeline::fetch_current(cx, fetcher).await {
            Ok(doc) => cx.primed = Some(doc),
            Err(err) => {
                tracing::warn!(url = %cx.session.url, error = %err, "priming fetch failed");
            }
        }
    }
    Ok(page)
}

fn perform_action(cx: &mut SessionContext, actions: &mut dyn ActionResolver) -> bool {
    let action = cx.session.action;
    let mut action_cx = ActionContext {
        session: &mut cx.session,
        dom: &mut cx.dom,
    };
    actions.perform(action, &mut action_cx)
}

async fn handle_error(
    cx: &mut SessionContext,
    bridge: &mut dyn MessagingBridge,
    err: &AppendError,
) {
    pipeline::remove_pending_divider(cx);
    match err {
        AppendError::NoContent { locator } => {
            // Scaled backoff keeps structural-mismatch retries polite;
            // the attempt budget bounds them.
            let attempts = cx.element_attempts;
            tracing::debug!(%locator, attempts, "content not located, backing off");
            tokio::time::sleep(cx.config.element_backoff() * attempts).await;
        }
        AppendError::Fetch(fetch) => {
            let url = cx.session.url.clone();
            pipeline::insert_inline_message(
                cx,
                &format!("Everscroll could not load '{url}'."),
                None,
            );
            bridge.show_status(Status::Error(fetch.to_string()));
        }
        // A discarded append already cleaned up after itself.
        AppendError::Discarded => {}
        other => {
            tracing::warn!(error = %other, "append failed");
            bridge.show_status(Status::Error(other.to_string()));
        }
    }
}

/// Move-down trigger: scroll to the next known page, or run the real
/// append pass when already at the bottom of the registry.
pub(crate) async fn move_down<F: Fetcher>(
    cx: &mut SessionContext,
    fetcher: &F,
    actions: &mut dyn ActionResolver,
    bridge: &mut dyn MessagingBridge,
) {
    if cx.session.current_page >= cx.session.total_pages {
        if !cx.session.is_loading {
            execute(cx, fetcher, actions, bridge).await;
        }
        return;
    }
    scroll_to_page(cx, cx.session.current_page + 1, bridge);
}

/// Move-up trigger: scroll back one page, or to the very top.
pub(crate) fn move_up(cx: &mut SessionContext, bridge: &mut dyn MessagingBridge) {
    if cx.session.current_page > 1 {
        scroll_to_page(cx, cx.session.current_page - 1, bridge);
    } else {
        cx.dom.scroll_to(0.0);
    }
}

fn scroll_to_page(cx: &mut SessionContext, number: usize, bridge: &mut dyn MessagingBridge) {
    let Some(element) = cx.registry.get(number).map(|record| record.element) else {
        return;
    };
    let Some(rect) = cx.dom.position(element) else {
        return;
    };
    cx.dom.scroll_to(rect.top);
    cx.session.current_page = number;
    detector::sync_address(cx, bridge);
    bridge.notify_session(&cx.session);
}
