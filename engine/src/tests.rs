//! Engine-level scenario tests.
//!
//! A scripted fetcher, a stub action resolver, and a recording bridge
//! stand in for the network and the privileged coordinator; time runs
//! paused so cool-downs and debounces cost nothing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use url::Url;

use everscroll_dom::Dom;
use everscroll_fetch::{FetchError, FetchedDocument, Fetcher};
use everscroll_types::{Action, AppendMode, Session};

use crate::bridge::{
    ActionContext, ActionResolver, MessagingBridge, NullBridge, SessionBuilder, Status,
};
use crate::config::{EngineConfig, IframeVariant, LocatorSpec};
use crate::context::SessionContext;
use crate::detector::{DetectorMode, PositionDetector, pixels_remaining};
use crate::errors::AppendError;
use crate::events::{Command, EngineEvent};
use crate::lifecycle::{Engine, locate_page_elements};
use crate::{pipeline, workflow};

// ---------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<FetchedDocument, FetchError>>>,
}

impl ScriptedFetcher {
    fn new(responses: Vec<Result<FetchedDocument, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    fn empty() -> Self {
        Self::new(Vec::new())
    }

    fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &Url) -> Result<FetchedDocument, FetchError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FetchError::Status(404)))
    }
}

fn fetched(html: &str, url: &str) -> FetchedDocument {
    let dom = Dom::parse_document(html);
    FetchedDocument {
        final_url: Url::parse(url).unwrap(),
        title: dom.title(),
        dom,
    }
}

fn page_html(n: usize) -> String {
    format!(
        "<html><head><title>Page {n}</title></head>\
         <body><script>track()</script>\
         <div class=\"post\" height=\"600\">post {n}</div></body></html>"
    )
}

struct StubActions {
    urls: VecDeque<String>,
}

impl StubActions {
    fn advancing(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|u| (*u).to_string()).collect(),
        }
    }
}

impl ActionResolver for StubActions {
    fn perform(&mut self, _action: Action, cx: &mut ActionContext<'_>) -> bool {
        match self.urls.pop_front() {
            Some(url) => {
                cx.session.url = url;
                true
            }
            None => false,
        }
    }
}

#[derive(Clone, Default)]
struct RecordingBridge {
    statuses: Arc<Mutex<Vec<Status>>>,
    addresses: Arc<Mutex<Vec<String>>>,
}

impl MessagingBridge for RecordingBridge {
    fn replace_address(&mut self, url: &str, _title: Option<&str>) {
        self.addresses.lock().unwrap().push(url.to_string());
    }
    fn show_status(&mut self, status: Status) {
        self.statuses.lock().unwrap().push(status);
    }
    fn hide_status(&mut self) {}
    fn notify_session(&mut self, _session: &Session) {}
    fn persist_enabled(&mut self, _enabled: bool) {}
}

struct NoRebuild;
impl SessionBuilder for NoRebuild {
    fn build(&mut self, _url: &str) -> Option<Session> {
        None
    }
}

struct Rebuild;
impl SessionBuilder for Rebuild {
    fn build(&mut self, url: &str) -> Option<Session> {
        Some(Session::new(url, Action::Next, AppendMode::Page))
    }
}

/// Host document: stacked posts of the given heights in a 1280x800
/// viewport.
fn host_dom(heights: &[f64]) -> Dom {
    let mut dom = Dom::new();
    for (i, &h) in heights.iter().enumerate() {
        let post = dom.create_element("div", &[("class", "post"), ("id", &format!("p{i}"))]);
        let body = dom.body();
        dom.append_child(body, post).unwrap();
        dom.set_height(post, h).unwrap();
    }
    dom.set_viewport(1280.0, 800.0);
    dom
}

fn post_locator_config() -> EngineConfig {
    EngineConfig {
        page_element: Some(LocatorSpec {
            locator_type: "selector".to_string(),
            locator_path: "div.post".to_string(),
        }),
        ..EngineConfig::default()
    }
}

fn context(append: AppendMode, heights: &[f64], config: EngineConfig) -> SessionContext {
    let session = Session::new("https://example.com/1", Action::Next, append);
    SessionContext::new(session, host_dom(heights), config).unwrap()
}

fn engine_with(
    append: AppendMode,
    heights: &[f64],
    config: EngineConfig,
    responses: Vec<Result<FetchedDocument, FetchError>>,
    urls: &[&str],
) -> (Engine<ScriptedFetcher>, RecordingBridge) {
    let cx = context(append, heights, config);
    let bridge = RecordingBridge::default();
    let engine = Engine::new(
        cx,
        ScriptedFetcher::new(responses),
        Box::new(StubActions::advancing(urls)),
        Box::new(bridge.clone()),
        Box::new(NoRebuild),
    );
    (engine, bridge)
}

fn count_tags(dom: &Dom, tag: &str) -> usize {
    dom.descendants(dom.body())
        .into_iter()
        .filter(|&n| dom.tag(n) == Some(tag))
        .count()
}

// ---------------------------------------------------------------------
// Detector gate
// ---------------------------------------------------------------------

#[test]
fn threshold_boundary_is_inclusive() {
    let mut cx = context(AppendMode::Page, &[2000.0], EngineConfig::default());
    cx.session.enabled = true;
    let detector = PositionDetector::new(DetectorMode::Scroll, Duration::from_millis(200));

    // 2000px document, 800px viewport, zero offset
    cx.dom.scroll_to(700.0);
    assert_eq!(pixels_remaining(&cx), 500.0);
    assert!(detector.should_append(&cx));

    cx.dom.scroll_to(699.0);
    assert_eq!(pixels_remaining(&cx), 501.0);
    assert!(!detector.should_append(&cx));
}

#[test]
fn loading_picker_and_auto_mute_the_detector() {
    let mut cx = context(AppendMode::Page, &[2000.0], EngineConfig::default());
    cx.session.enabled = true;
    cx.dom.scroll_to(1200.0);
    let detector = PositionDetector::new(DetectorMode::Scroll, Duration::from_millis(200));
    assert!(detector.should_append(&cx));

    cx.session.is_loading = true;
    assert!(!detector.should_append(&cx));
    cx.session.is_loading = false;

    cx.session.picker_enabled = true;
    assert!(!detector.should_append(&cx));
    cx.session.picker_enabled = false;

    cx.session.auto_enabled = true;
    assert!(!detector.should_append(&cx));
}

#[test]
fn element_attempt_budget_caps_retries() {
    let mut cx = context(AppendMode::Element, &[2000.0], post_locator_config());
    cx.session.enabled = true;
    cx.dom.scroll_to(1200.0);
    let detector = PositionDetector::new(DetectorMode::Scroll, Duration::from_millis(200));
    assert!(detector.should_append(&cx));

    cx.element_attempts = cx.session.budgets.element_attempts;
    assert!(!detector.should_append(&cx));
}

#[test]
fn no_scrollbar_allowance_is_bounded() {
    let mut cx = context(AppendMode::Page, &[100.0], EngineConfig::default());
    cx.session.enabled = true;
    assert!(!cx.dom.has_scrollbar());
    let detector = PositionDetector::new(DetectorMode::Scroll, Duration::from_millis(200));

    cx.session.scrollbar_appends = cx.session.budgets.no_scrollbar_appends - 1;
    assert!(detector.should_append(&cx));
    cx.session.scrollbar_appends = cx.session.budgets.no_scrollbar_appends;
    assert!(!detector.should_append(&cx));
}

// ---------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn loading_flag_blocks_reentry() {
    let mut cx = context(AppendMode::Page, &[2000.0], EngineConfig::default());
    cx.session.enabled = true;
    cx.session.is_loading = true;
    let fetcher = ScriptedFetcher::new(vec![Ok(fetched(&page_html(2), "https://example.com/2"))]);
    let mut actions = StubActions::advancing(&["https://example.com/2"]);
    let mut bridge = NullBridge;

    workflow::execute(&mut cx, &fetcher, &mut actions, &mut bridge).await;

    assert_eq!(fetcher.remaining(), 1, "no fetch while another append is in flight");
    assert_eq!(cx.registry.len(), 0);
    assert!(cx.session.is_loading, "flag untouched by the refused pass");
}

#[tokio::test(start_paused = true)]
async fn action_failure_removes_divider_and_clears_loading() {
    let mut cx = context(AppendMode::Page, &[2000.0], EngineConfig::default());
    cx.session.enabled = true;
    let fetcher = ScriptedFetcher::empty();
    let mut actions = StubActions::advancing(&[]);
    let mut bridge = NullBridge;

    workflow::execute(&mut cx, &fetcher, &mut actions, &mut bridge).await;

    assert!(!cx.session.is_loading);
    assert_eq!(cx.registry.len(), 0);
    assert_eq!(count_tags(&cx.dom, "div"), 1, "only the original post remains");
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_surfaces_inline_message() {
    let mut cx = context(AppendMode::Page, &[2000.0], EngineConfig::default());
    cx.session.enabled = true;
    let fetcher = ScriptedFetcher::new(vec![Err(FetchError::Status(500))]);
    let mut actions = StubActions::advancing(&["https://example.com/2"]);
    let mut bridge = NullBridge;

    workflow::execute(&mut cx, &fetcher, &mut actions, &mut bridge).await;

    assert!(!cx.session.is_loading, "loading flag never stays latched");
    assert_eq!(cx.registry.len(), 0);
    let messages = cx
        .dom
        .descendants(cx.dom.body())
        .into_iter()
        .filter(|&n| cx.dom.attr(n, "class") == Some("everscroll-message"))
        .count();
    assert_eq!(messages, 1);
}

#[tokio::test(start_paused = true)]
async fn disabled_session_discards_in_flight_result() {
    let mut cx = context(AppendMode::Page, &[2000.0], EngineConfig::default());
    cx.session.enabled = false;
    cx.primed = Some(fetched(&page_html(2), "https://example.com/2"));
    let fetcher = ScriptedFetcher::empty();

    let result = pipeline::run(&mut cx, &fetcher, AppendMode::Page).await;

    assert!(matches!(result, Err(AppendError::Discarded)));
    assert_eq!(cx.registry.len(), 0);
    let pages = cx
        .dom
        .descendants(cx.dom.body())
        .into_iter()
        .filter(|&n| cx.dom.attr(n, "class") == Some("everscroll-page"))
        .filter(|&n| cx.dom.is_attached(n))
        .count();
    assert_eq!(pages, 0, "nothing half-applied survives a discard");
}

#[tokio::test(start_paused = true)]
async fn backward_sessions_prepend_content() {
    let session = Session::new("https://example.com/5", Action::Prev, AppendMode::Page);
    assert!(session.workflow.prepend);
    let mut cx = SessionContext::new(session, host_dom(&[2000.0]), EngineConfig::default()).unwrap();
    cx.session.enabled = true;
    let fetcher = ScriptedFetcher::new(vec![Ok(fetched(&page_html(4), "https://example.com/4"))]);
    let mut actions = StubActions::advancing(&["https://example.com/4"]);
    let mut bridge = NullBridge;

    workflow::execute(&mut cx, &fetcher, &mut actions, &mut bridge).await;

    assert_eq!(cx.registry.len(), 1);
    let body = cx.dom.body();
    let first = cx
        .dom
        .children(body)
        .iter()
        .copied()
        .find(|&c| cx.dom.is_element(c))
        .unwrap();
    assert_eq!(cx.dom.attr(first, "class"), Some("everscroll-page"));
}

#[tokio::test(start_paused = true)]
async fn reverse_workflow_primes_then_appends() {
    let mut cx = context(AppendMode::Ajax, &[2000.0], post_locator_config());
    cx.session.enabled = true;
    assert!(cx.session.workflow.reverse);
    assert!(cx.session.workflow.skip_append);

    let fetcher = ScriptedFetcher::new(vec![
        Ok(fetched(&page_html(2), "https://example.com/2")),
        Ok(fetched(&page_html(3), "https://example.com/3")),
    ]);
    let mut actions = StubActions::advancing(&["https://example.com/2", "https://example.com/3"]);
    let mut bridge = NullBridge;

    // First pass: action only, next unit primed, nothing appended.
    workflow::execute(&mut cx, &fetcher, &mut actions, &mut bridge).await;
    assert_eq!(cx.registry.len(), 0);
    assert!(cx.primed.is_some());
    assert!(!cx.session.workflow.skip_append);

    // Insertion point comes from the host's own content elements.
    let locator = cx.page_element_locator.clone().unwrap();
    pipeline::recompute_insertion_point(&mut cx, &locator).unwrap();

    // Second pass: primed unit appended, next one primed.
    workflow::execute(&mut cx, &fetcher, &mut actions, &mut bridge).await;
    assert_eq!(cx.registry.len(), 1);
    assert!(cx.primed.is_some());
    assert_eq!(fetcher.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn reverse_session_stops_when_the_action_runs_out() {
    let mut cx = context(AppendMode::Ajax, &[2000.0], post_locator_config());
    cx.session.enabled = true;
    // A second copy of page two is available; nothing should ever
    // fetch it.
    let fetcher = ScriptedFetcher::new(vec![
        Ok(fetched(&page_html(2), "https://example.com/2")),
        Ok(fetched(&page_html(2), "https://example.com/2")),
    ]);
    let mut actions = StubActions::advancing(&["https://example.com/2"]);
    let mut bridge = NullBridge;

    // First pass primes page two.
    workflow::execute(&mut cx, &fetcher, &mut actions, &mut bridge).await;
    assert_eq!(cx.registry.len(), 0);

    let locator = cx.page_element_locator.clone().unwrap();
    pipeline::recompute_insertion_point(&mut cx, &locator).unwrap();

    // Second pass merges it; the action finds no page three.
    workflow::execute(&mut cx, &fetcher, &mut actions, &mut bridge).await;
    assert_eq!(cx.registry.len(), 1);

    // Later triggers must not re-register the page just merged.
    workflow::execute(&mut cx, &fetcher, &mut actions, &mut bridge).await;
    workflow::execute(&mut cx, &fetcher, &mut actions, &mut bridge).await;
    let urls: Vec<&str> = cx.registry.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["https://example.com/2"]);
    assert_eq!(fetcher.remaining(), 1, "no refetch of the merged page");
    assert!(!cx.session.is_loading);
}

#[tokio::test(start_paused = true)]
async fn backward_media_sessions_prepend_the_wrapper() {
    let session = Session::new(
        "https://example.com/photo5.jpg",
        Action::Prev,
        AppendMode::Media,
    );
    let mut cx =
        SessionContext::new(session, host_dom(&[2000.0]), EngineConfig::default()).unwrap();
    cx.session.enabled = true;
    let fetcher = ScriptedFetcher::empty();
    let mut actions = StubActions::advancing(&["https://example.com/photo4.jpg"]);
    let mut bridge = NullBridge;

    workflow::execute(&mut cx, &fetcher, &mut actions, &mut bridge).await;

    assert_eq!(cx.registry.len(), 1);
    let body = cx.dom.body();
    let first = cx
        .dom
        .children(body)
        .iter()
        .copied()
        .find(|&c| cx.dom.is_element(c))
        .unwrap();
    assert_eq!(cx.dom.attr(first, "class"), Some("everscroll-media"));
}

#[tokio::test(start_paused = true)]
async fn trimmed_frame_fails_fast_once_the_document_settles() {
    let config = EngineConfig {
        iframe_variant: IframeVariant::Trimmed,
        ..post_locator_config()
    };
    let mut cx = context(AppendMode::Iframe, &[2000.0], config);
    cx.session.enabled = true;
    // The fetched page never produces a div.post to trim down to.
    let bare = "<html><head><title>Bare</title></head>\
                <body><p>nothing located</p></body></html>";
    let fetcher = ScriptedFetcher::new(vec![Ok(fetched(bare, "https://example.com/2"))]);

    let started = tokio::time::Instant::now();
    let result = pipeline::run(&mut cx, &fetcher, AppendMode::Iframe).await;

    assert!(matches!(result, Err(AppendError::NoContent { .. })));
    assert_eq!(cx.element_attempts, 1);
    assert!(
        started.elapsed() <= cx.config.frame_poll() * 2,
        "a settled document is not polled for the whole budget"
    );
}

// ---------------------------------------------------------------------
// Engine scenarios
// ---------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn scroll_to_bottom_appends_next_page() {
    init_tracing();
    let (mut engine, bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        EngineConfig::default(),
        vec![Ok(fetched(&page_html(2), "https://example.com/2"))],
        &["https://example.com/2"],
    );
    engine.start();
    assert_eq!(engine.session().total_pages, 1);

    engine.handle(EngineEvent::Scroll { y: 1200.0 }).await;

    let session = engine.session();
    assert_eq!(session.total_pages, 2);
    assert!(!session.is_loading);
    assert_eq!(session.url, "https://example.com/2");

    let cx = engine.context();
    assert_eq!(cx.registry.len(), 2);
    let record = cx.registry.get(2).unwrap();
    assert_eq!(record.title.as_deref(), Some("Page 2"));
    assert!(cx.dom.is_attached(record.element));

    // Active content never crosses into the host document.
    assert_eq!(count_tags(&cx.dom, "script"), 0);
    // A divider landed with the page.
    assert_eq!(
        cx.dom
            .descendants(cx.dom.body())
            .into_iter()
            .filter(|&n| cx.dom.attr(n, "class") == Some("everscroll-divider"))
            .count(),
        1
    );

    let statuses = bridge.statuses.lock().unwrap();
    assert!(statuses.contains(&Status::Appended { page: 2 }));
}

#[tokio::test(start_paused = true)]
async fn page_numbers_stay_contiguous_across_appends() {
    let (mut engine, _bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        EngineConfig::default(),
        vec![
            Ok(fetched(&page_html(2), "https://example.com/2")),
            Ok(fetched(&page_html(3), "https://example.com/3")),
            Ok(fetched(&page_html(4), "https://example.com/4")),
        ],
        &[
            "https://example.com/2",
            "https://example.com/3",
            "https://example.com/4",
        ],
    );
    engine.start();
    for _ in 0..3 {
        let bottom = engine.context().dom.document_height();
        engine.handle(EngineEvent::Scroll { y: bottom }).await;
    }

    let numbers: Vec<usize> = engine.context().registry.iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(engine.session().total_pages, 4);
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_are_idempotent() {
    let (mut engine, _bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        EngineConfig::default(),
        vec![],
        &[],
    );
    engine.start();
    engine.start();
    assert_eq!(engine.context().registry.len(), 1, "seeded exactly once");

    engine.stop();
    engine.stop();
    assert!(!engine.session().enabled);
    assert_eq!(engine.context().registry.len(), 1, "stop keeps appended pages");
}

#[tokio::test(start_paused = true)]
async fn control_commands_never_append() {
    let (mut engine, _bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        EngineConfig::default(),
        vec![Ok(fetched(&page_html(2), "https://example.com/2"))],
        &["https://example.com/2"],
    );
    engine.start();

    engine.handle(EngineEvent::Trigger(Command::Auto)).await;
    assert!(engine.session().auto_enabled);
    engine.handle(EngineEvent::Trigger(Command::Auto)).await;
    assert!(!engine.session().auto_enabled);

    engine.handle(EngineEvent::Trigger(Command::Power)).await;
    assert!(!engine.session().enabled);
    engine.handle(EngineEvent::Trigger(Command::Power)).await;
    assert!(engine.session().enabled);

    assert_eq!(engine.context().registry.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn auto_mode_appends_on_tick_not_on_scroll() {
    let (mut engine, _bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        EngineConfig::default(),
        vec![Ok(fetched(&page_html(2), "https://example.com/2"))],
        &["https://example.com/2"],
    );
    engine.start();
    engine.handle(EngineEvent::Trigger(Command::Auto)).await;

    // Detector triggers are muted while auto mode runs.
    engine.handle(EngineEvent::Scroll { y: 1200.0 }).await;
    assert_eq!(engine.session().total_pages, 1);

    engine.handle(EngineEvent::AutoTick).await;
    assert_eq!(engine.session().total_pages, 2);
}

#[tokio::test(start_paused = true)]
async fn down_scrolls_within_registry_and_appends_at_the_end() {
    let (mut engine, _bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        EngineConfig::default(),
        vec![
            Ok(fetched(&page_html(2), "https://example.com/2")),
            Ok(fetched(&page_html(3), "https://example.com/3")),
        ],
        &["https://example.com/2", "https://example.com/3"],
    );
    engine.start();
    engine.handle(EngineEvent::Scroll { y: 1200.0 }).await;
    assert_eq!(engine.session().total_pages, 2);

    // Back at the top, down means "scroll to page two", not "append".
    engine.handle(EngineEvent::Scroll { y: 0.0 }).await;
    assert_eq!(engine.session().current_page, 1);
    engine.handle(EngineEvent::Trigger(Command::Down)).await;
    assert_eq!(engine.session().current_page, 2);
    assert_eq!(engine.session().total_pages, 2);

    // At the last known page, down substitutes the real action.
    engine.handle(EngineEvent::Trigger(Command::Down)).await;
    assert_eq!(engine.session().total_pages, 3);

    engine.handle(EngineEvent::Trigger(Command::Up)).await;
    assert_eq!(engine.session().current_page, 1);
}

#[tokio::test(start_paused = true)]
async fn address_sync_skips_redundant_writes() {
    // Page two is tall enough that page one scrolls fully out of view.
    let tall = "<html><head><title>Page 2</title></head>\
                <body><div class=\"post\" height=\"2000\">post 2</div></body></html>";
    let (mut engine, bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        EngineConfig::default(),
        vec![Ok(fetched(tall, "https://example.com/2"))],
        &["https://example.com/2"],
    );
    engine.start();
    engine.handle(EngineEvent::Scroll { y: 1200.0 }).await;
    assert_eq!(engine.session().total_pages, 2);

    // Past the end of page one: the address mirrors page two, once.
    engine.handle(EngineEvent::Scroll { y: 2100.0 }).await;
    tokio::time::advance(Duration::from_millis(300)).await;
    engine.handle(EngineEvent::Scroll { y: 2105.0 }).await;

    let addresses = bridge.addresses.lock().unwrap();
    assert_eq!(addresses.len(), 1, "redundant history writes skipped");
    assert_eq!(addresses[0], "https://example.com/2");
}

#[tokio::test(start_paused = true)]
async fn element_append_recovers_from_detached_insertion_point() {
    let (mut engine, _bridge) = engine_with(
        AppendMode::Element,
        &[2000.0],
        post_locator_config(),
        vec![Ok(fetched(&page_html(2), "https://example.com/2"))],
        &["https://example.com/2"],
    );
    engine.start();

    // Host page removes the marker between appends.
    let marker = engine.context().insertion_point.unwrap();
    engine.context_mut().dom.detach(marker).unwrap();

    engine.handle(EngineEvent::Scroll { y: 1200.0 }).await;

    let cx = engine.context();
    assert_eq!(cx.registry.len(), 2);
    let record = cx.registry.get(2).unwrap();
    assert!(cx.dom.is_attached(record.element));
    assert!(cx.valid_insertion_point().is_some(), "marker rebuilt");
}

#[tokio::test(start_paused = true)]
async fn spa_navigation_resynchronizes_the_session() {
    init_tracing();
    let cx = context(AppendMode::Page, &[2000.0], EngineConfig::default());
    let bridge = RecordingBridge::default();
    let mut engine = Engine::new(
        cx,
        ScriptedFetcher::empty(),
        Box::new(StubActions::advancing(&[])),
        Box::new(bridge.clone()),
        Box::new(Rebuild),
    );
    engine.start();
    assert_eq!(engine.context().registry.len(), 1);

    // The single-page app swaps the document body wholesale.
    {
        let cx = engine.context_mut();
        let anchors: Vec<_> = cx.registry.iter().map(|r| r.element).collect();
        for anchor in anchors {
            cx.dom.detach(anchor).unwrap();
        }
        let fresh = cx.dom.create_element("div", &[("class", "post")]);
        let body = cx.dom.body();
        cx.dom.append_child(body, fresh).unwrap();
        cx.dom.set_height(fresh, 1500.0).unwrap();
    }

    engine.handle(EngineEvent::Mutated).await;

    assert!(engine.session().enabled, "rebuilt and restarted");
    assert!(engine.session().started);
    assert_eq!(engine.context().registry.len(), 1, "registry reseeded");
    assert!(engine.is_watching());
}

#[tokio::test(start_paused = true)]
async fn spa_mutation_without_anchor_loss_is_ignored() {
    let (mut engine, _bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        EngineConfig::default(),
        vec![],
        &[],
    );
    engine.start();
    engine.handle(EngineEvent::Mutated).await;
    assert!(engine.session().enabled);
    assert_eq!(engine.context().registry.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn visibility_mode_uses_the_sentinel() {
    let config = EngineConfig {
        detector_mode: DetectorMode::Visibility,
        ..EngineConfig::default()
    };
    let (mut engine, _bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        config,
        vec![Ok(fetched(&page_html(2), "https://example.com/2"))],
        &["https://example.com/2"],
    );
    engine.start();
    assert!(engine.context().sentinel.is_some());

    // Sentinel off-screen: nothing happens.
    engine.handle(EngineEvent::Visibility).await;
    assert_eq!(engine.session().total_pages, 1);

    // Scroll clamps to the document end, bringing the sentinel into
    // the viewport.
    engine.context_mut().dom.scroll_to(1300.0);
    engine.handle(EngineEvent::Visibility).await;
    assert_eq!(engine.session().total_pages, 2);
}

#[tokio::test(start_paused = true)]
async fn visibility_lookahead_extends_the_sentinel_window() {
    let config = EngineConfig {
        detector_mode: DetectorMode::Visibility,
        ..EngineConfig::default()
    };
    let (mut engine, _bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        config,
        vec![Ok(fetched(&page_html(2), "https://example.com/2"))],
        &["https://example.com/2"],
    );
    engine.context_mut().session.thresholds.scroll_append_threshold_pages = 1;
    engine.start();

    // Sentinel sits at 2000px. From the top, the viewport plus one page
    // of lookahead reaches 1600px and falls short.
    engine.handle(EngineEvent::Visibility).await;
    assert_eq!(engine.session().total_pages, 1);

    // From 500px the extended window reaches 2100px, covering the
    // sentinel while it is still off-screen.
    engine.context_mut().dom.scroll_to(500.0);
    engine.handle(EngineEvent::Visibility).await;
    assert_eq!(engine.session().total_pages, 2);
}

#[test]
fn locator_probe_evaluates_candidates() {
    let dom = host_dom(&[600.0, 600.0]);
    let spec = |path: &str| LocatorSpec {
        locator_type: "selector".to_string(),
        locator_path: path.to_string(),
    };

    assert_eq!(locate_page_elements(&dom, &spec("div.post")).unwrap().len(), 2);
    assert!(locate_page_elements(&dom, &spec("article.entry")).unwrap().is_empty());

    let bad = LocatorSpec {
        locator_type: "xpath".to_string(),
        locator_path: "//div".to_string(),
    };
    assert!(locate_page_elements(&dom, &bad).is_err());
}

#[tokio::test(start_paused = true)]
async fn media_append_requires_no_fetch() {
    let (mut engine, _bridge) = engine_with(
        AppendMode::Media,
        &[2000.0],
        EngineConfig::default(),
        vec![],
        &["https://example.com/photo2.jpg"],
    );
    engine.start();
    engine.handle(EngineEvent::Scroll { y: 1200.0 }).await;

    let cx = engine.context();
    assert_eq!(cx.registry.len(), 2);
    assert_eq!(count_tags(&cx.dom, "img"), 1);
    assert_eq!(cx.offset, 0, "media strategy ends at the document end");
}

#[tokio::test(start_paused = true)]
async fn lazy_media_sources_are_promoted() {
    let html = "<html><head><title>Page 2</title></head><body>\
                <img src=\"data:image/gif;base64,R0\" data-src=\"https://cdn.example.com/real.jpg\">\
                </body></html>";
    let (mut engine, _bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        EngineConfig::default(),
        vec![Ok(fetched(html, "https://example.com/2"))],
        &["https://example.com/2"],
    );
    engine.start();
    engine.handle(EngineEvent::Scroll { y: 1200.0 }).await;

    let cx = engine.context();
    let img = cx
        .dom
        .descendants(cx.dom.body())
        .into_iter()
        .find(|&n| cx.dom.tag(n) == Some("img"))
        .unwrap();
    assert_eq!(cx.dom.attr(img, "src"), Some("https://cdn.example.com/real.jpg"));
    assert!(cx.dom.attr(img, "data-src").is_none());
}

#[tokio::test(start_paused = true)]
async fn append_event_is_dispatched_with_page_detail() {
    let (mut engine, _bridge) = engine_with(
        AppendMode::Page,
        &[2000.0],
        EngineConfig::default(),
        vec![Ok(fetched(&page_html(2), "https://example.com/2"))],
        &["https://example.com/2"],
    );
    engine.start();
    engine.handle(EngineEvent::Scroll { y: 1200.0 }).await;

    let events = engine.context_mut().dom.drain_events();
    let append = events
        .iter()
        .find(|e| e.name == "everscroll:append")
        .expect("append event fired");
    assert_eq!(append.detail["page"], 2);
    assert!(events.iter().any(|e| e.name == "everscroll:start"));
}
