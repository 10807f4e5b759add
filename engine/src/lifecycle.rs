//! The lifecycle controller.
//!
//! Owns the session context and every collaborator, consumes the event
//! channel, and is the only place start/stop transitions happen. Start
//! and stop are both idempotent; stop leaves already-appended pages in
//! place.

use everscroll_dom::{CustomEvent, Dom, DomError, NodeId};
use everscroll_fetch::Fetcher;
use everscroll_types::{Action, AppendMode, Session};
use tokio::sync::mpsc;

use crate::bridge::{ActionContext, ActionResolver, MessagingBridge, SessionBuilder, Status};
use crate::config::LocatorSpec;
use crate::context::SessionContext;
use crate::detector::{self, Detection, DetectorMode, PositionDetector};
use crate::events::{Command, EngineEvent};
use crate::registry::NewPage;
use crate::{offset, pipeline, scripts, workflow};

pub struct Engine<F: Fetcher> {
    cx: SessionContext,
    fetcher: F,
    actions: Box<dyn ActionResolver>,
    bridge: Box<dyn MessagingBridge>,
    builder: Box<dyn SessionBuilder>,
    detector: PositionDetector,
    /// Watchers are live; cleared by stop and single-page-app teardown.
    watching: bool,
}

impl<F: Fetcher> Engine<F> {
    pub fn new(
        cx: SessionContext,
        fetcher: F,
        actions: Box<dyn ActionResolver>,
        bridge: Box<dyn MessagingBridge>,
        builder: Box<dyn SessionBuilder>,
    ) -> Self {
        let detector = PositionDetector::new(cx.config.detector_mode, cx.config.throttle());
        Self {
            cx,
            fetcher,
            actions,
            bridge,
            builder,
            detector,
            watching: false,
        }
    }

    /// Enable the session, running one-time setup on the first call.
    /// Calling start on a started session is a no-op.
    pub fn start(&mut self) {
        if self.cx.session.enabled {
            return;
        }
        if !self.cx.session.started {
            self.seed();
            self.cx.session.started = true;
        }
        self.cx.session.enabled = true;
        self.watching = true;
        self.bridge.persist_enabled(true);
        self.bridge.notify_session(&self.cx.session);
        self.bridge.show_status(Status::On);
        self.cx.dom.dispatch(CustomEvent {
            name: "everscroll:start".to_string(),
            detail: serde_json::Value::Null,
        });
        tracing::info!(url = %self.cx.session.url, "session started");
    }

    /// Disable the session. Already-appended pages stay in the document
    /// and the registry; a later start resumes where it left off.
    pub fn stop(&mut self) {
        if !self.cx.session.enabled && !self.watching {
            return;
        }
        self.watching = false;
        self.cx.session.enabled = false;
        self.cx.session.auto_enabled = false;
        self.bridge.persist_enabled(false);
        self.bridge.notify_session(&self.cx.session);
        self.bridge.hide_status();
        tracing::info!(url = %self.cx.session.url, "session stopped");
    }

    /// One-time setup: register the initial document as page one and
    /// prepare strategy-specific machinery.
    fn seed(&mut self) {
        let cx = &mut self.cx;
        let located: Vec<NodeId> = match &cx.page_element_locator {
            Some(locator) => cx
                .dom
                .select(locator)
                .into_iter()
                .filter(|&n| cx.dom.is_attached(n))
                .collect(),
            None => Vec::new(),
        };
        let anchor = located.first().copied().unwrap_or_else(|| {
            let body = cx.dom.body();
            cx.dom
                .children(body)
                .iter()
                .copied()
                .find(|&c| cx.dom.is_element(c))
                .unwrap_or(body)
        });
        cx.registry.push(NewPage {
            url: cx.session.url.clone(),
            title: cx.dom.title(),
            element: anchor,
            append: cx.session.append,
            iframe: None,
            page_elements: located,
        });
        cx.session.total_pages = cx.registry.len();
        cx.session.current_page = 1;

        if cx.session.append.uses_insertion_point()
            && let Some(locator) = cx.page_element_locator.clone()
        {
            if let Err(err) = pipeline::recompute_insertion_point(cx, &locator) {
                tracing::warn!(error = %err, "initial insertion point unavailable");
            }
        }

        if cx.config.detector_mode == DetectorMode::Visibility {
            let sentinel = cx
                .dom
                .create_element("div", &[("class", "everscroll-sentinel")]);
            let body = cx.dom.body();
            if cx.dom.append_child(body, sentinel).is_ok() {
                let _ = cx.dom.set_height(sentinel, 1.0);
                cx.sentinel = Some(sentinel);
            }
        }

        if cx.session.append == AppendMode::Ajax {
            scripts::inject_helper(&mut cx.dom);
        }
        offset::refresh(cx, None);
    }

    /// Consume the event channel until shutdown or all senders drop.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<EngineEvent>) {
        while let Some(event) = rx.recv().await {
            if event == EngineEvent::Shutdown {
                break;
            }
            self.handle(event).await;
        }
        tracing::debug!("engine loop ended");
    }

    /// Handle one inbound event to completion.
    pub async fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Scroll { y } => {
                self.cx.dom.scroll_to(y);
                let detection = self.detector.on_scroll(&mut self.cx);
                self.after_detection(detection).await;
            }
            EngineEvent::Visibility => {
                let detection = self.detector.on_visibility(&mut self.cx);
                self.after_detection(detection).await;
            }
            EngineEvent::Trigger(command) => self.handle_command(command).await,
            EngineEvent::AutoTick => {
                let session = &self.cx.session;
                if session.enabled && session.auto_enabled && !session.is_loading {
                    workflow::execute(
                        &mut self.cx,
                        &self.fetcher,
                        self.actions.as_mut(),
                        self.bridge.as_mut(),
                    )
                    .await;
                }
            }
            EngineEvent::Mutated => self.resync().await,
            EngineEvent::Shutdown => {}
        }
    }

    async fn after_detection(&mut self, detection: Detection) {
        if detection.page_changed {
            detector::sync_address(&mut self.cx, self.bridge.as_mut());
            self.bridge.notify_session(&self.cx.session);
        }
        if detection.should_append {
            workflow::execute(
                &mut self.cx,
                &self.fetcher,
                self.actions.as_mut(),
                self.bridge.as_mut(),
            )
            .await;
        }
    }

    async fn handle_command(&mut self, command: Command) {
        tracing::debug!(?command, "trigger");
        match command {
            Command::Power => {
                if self.cx.session.enabled {
                    self.stop();
                } else {
                    self.start();
                }
            }
            Command::Auto => {
                self.cx.session.auto_enabled = !self.cx.session.auto_enabled;
                self.bridge.notify_session(&self.cx.session);
            }
            Command::Blacklist => {
                // The coordinator records the address; here the session
                // just goes dark.
                self.stop();
            }
            Command::ReturnToList => {
                let mut action_cx = ActionContext {
                    session: &mut self.cx.session,
                    dom: &mut self.cx.dom,
                };
                self.actions.perform(Action::List, &mut action_cx);
                self.bridge.notify_session(&self.cx.session);
            }
            Command::Down => {
                workflow::move_down(
                    &mut self.cx,
                    &self.fetcher,
                    self.actions.as_mut(),
                    self.bridge.as_mut(),
                )
                .await;
            }
            Command::Up => workflow::move_up(&mut self.cx, self.bridge.as_mut()),
        }
    }

    /// Single-page-app re-synchronization. Debounce, then check whether
    /// the host replaced the document wholesale; if it did, tear the
    /// session down and rebuild it from persisted configuration for the
    /// new address.
    async fn resync(&mut self) {
        if !self.watching {
            return;
        }
        tokio::time::sleep(self.cx.config.spa_debounce()).await;

        let intact = self
            .cx
            .registry
            .iter()
            .all(|record| self.cx.dom.is_attached(record.element));
        if intact {
            return;
        }
        tracing::info!("tracked anchors gone, re-synchronizing");

        let url = self.cx.session.url.clone();
        self.stop();
        self.cx.registry.clear();
        self.cx.insertion_point = None;
        self.cx.sentinel = None;
        self.cx.frame_doc = None;
        self.cx.frame_node = None;
        self.cx.primed = None;
        self.cx.awaiting_append = false;
        self.cx.pending_divider = None;
        self.cx.divider_span = None;
        self.cx.element_attempts = 0;

        match self.builder.build(&url) {
            Some(session) => {
                self.cx.session = session;
                self.cx.session.started = false;
                self.cx.last_good_url = self.cx.session.url.clone();
                self.start();
            }
            None => tracing::debug!(%url, "no configuration for address, staying off"),
        }
    }

    /// Content elements currently in the host document, in document
    /// order. Falls back to registry anchors when no locator is set.
    #[must_use]
    pub fn page_elements(&self) -> Vec<NodeId> {
        match &self.cx.page_element_locator {
            Some(locator) => self
                .cx
                .dom
                .select(locator)
                .into_iter()
                .filter(|&n| self.cx.dom.is_attached(n))
                .collect(),
            None => self.cx.registry.iter().map(|record| record.element).collect(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.cx.session
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.cx
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.cx
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watching
    }
}

/// Evaluate a candidate locator against a document, without touching
/// any session state. Configuration builders use this to check whether
/// a locator choice finds content before committing to it.
pub fn locate_page_elements(dom: &Dom, spec: &LocatorSpec) -> Result<Vec<NodeId>, DomError> {
    let locator = spec.parse()?;
    Ok(dom
        .select(&locator)
        .into_iter()
        .filter(|&n| dom.is_attached(n))
        .collect())
}
