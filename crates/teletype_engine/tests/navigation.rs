use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use teletype_core::Phase;
use teletype_engine::{
    AudioEngine, AudioSettings, DomError, EngineEvent, FailureKind, FetchSettings, LiveDocument,
    MemoryPreferenceStore, NavigationFailure, NavigationOutcome, Navigator, NavigatorConfig,
    NavigatorHandle, OfflineHost, OfflineOptions, OfflineRecorder, ParseError, ProgressSink,
    ReqwestFetcher, RevealEvent, VirtualClock, CHUNK_CLASS, WRAPPER_CLASS,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CURRENT: &str = r#"<html><head><title>Home</title></head><body>
    <header><h1>Terminal v1</h1><button id="sound-toggle">?</button></header>
    <main><p>old page</p></main>
    </body></html>"#;

const PROJECTS: &str = r#"<html><head><title>Projects</title></head><body>
    <header><h1>Terminal v2</h1><button id="sound-toggle">?</button></header>
    <main>
      <ul><li>one</li><li>two</li><li>three</li></ul>
      <p>after</p>
    </main>
    </body></html>"#;

#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<EngineEvent>>,
    /// Fires the token once the unit with this sequence number is attached.
    cancel_after_attach: Option<(usize, CancellationToken)>,
}

impl TestSink {
    fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        if let (
            EngineEvent::Reveal {
                event: RevealEvent::Attached { seq, .. },
                ..
            },
            Some((at, token)),
        ) = (&event, &self.cancel_after_attach)
        {
            if seq == at {
                token.cancel();
            }
        }
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    navigator: Navigator,
    recorder: OfflineRecorder,
    server: MockServer,
}

impl Harness {
    async fn new(live_html: &str) -> Self {
        teletype_logging::initialize_for_tests();
        let server = MockServer::start().await;
        let clock = VirtualClock::new();
        let host = OfflineHost::new(Arc::new(clock.clone()), OfflineOptions::default());
        let recorder = host.recorder();
        let audio = AudioEngine::new(
            Arc::new(host),
            Arc::new(clock.clone()),
            Arc::new(MemoryPreferenceStore::new(None)),
            AudioSettings::default(),
        )
        .shared();
        let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
        let navigator = Navigator::new(
            Arc::new(fetcher),
            Arc::new(clock),
            audio,
            LiveDocument::from_html(live_html),
            NavigatorConfig::default(),
        );
        Self {
            navigator,
            recorder,
            server,
        }
    }

    async fn serve(&self, route: &str, response: ResponseTemplate) -> String {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(&self.server)
            .await;
        format!("{}{}", self.server.uri(), route)
    }

    async fn serve_html(&self, route: &str, html: &str) -> String {
        self.serve(
            route,
            ResponseTemplate::new(200).set_body_raw(html.to_string(), "text/html; charset=utf-8"),
        )
        .await
    }

    async fn main_text(&self) -> String {
        let live = self.navigator.live();
        let live = live.lock().await;
        let main = live.content_container().unwrap();
        live.text_content(main)
    }
}

fn phases(events: &[EngineEvent]) -> Vec<Phase> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Progress { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect()
}

fn attached_texts(events: &[EngineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Reveal {
                event: RevealEvent::Attached { text, .. },
                ..
            } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn list_and_paragraph_page_is_revealed_unit_by_unit() {
    let h = Harness::new(CURRENT).await;
    let url = h.serve_html("/projects/", PROJECTS).await;
    let sink = TestSink::default();

    let outcome = h
        .navigator
        .navigate(1, &url, &sink, &CancellationToken::new())
        .await;
    let NavigationOutcome::Revealed { report, notices } = outcome else {
        panic!("expected a progressive reveal");
    };
    assert_eq!(report.units, 5);
    assert!(notices.is_empty());

    let events = sink.take();
    assert_eq!(
        phases(&events),
        vec![Phase::Fetching, Phase::Decomposing, Phase::Revealing]
    );
    assert_eq!(
        attached_texts(&events),
        vec!["", "one", "two", "three", "after"]
    );
    let tail = &events[events.len() - 2..];
    assert!(matches!(tail[0], EngineEvent::Revealed { id: 1 }));
    let EngineEvent::PageSnapshot(snapshot) = &tail[1] else {
        panic!("expected a page snapshot after the reveal");
    };
    assert_eq!(snapshot.title, "Projects");
    assert_eq!(snapshot.sound_label.as_deref(), Some("SFX: On"));

    let text = h.main_text().await;
    assert!(!text.contains("old page"));
    assert!(text.contains("after"));

    let live = h.navigator.live();
    let live = live.lock().await;
    let header = live.header().unwrap();
    assert!(live.text_content(header).contains("Terminal v2"));
    assert_eq!(live.select_class(CHUNK_CLASS).len(), 5);

    let voices = h.recorder.voices();
    assert_eq!(voices.len(), 5);
    assert_eq!(voices.last().unwrap().frequency, 391.995);
}

#[tokio::test]
async fn fetch_failure_falls_back_without_touching_the_page() {
    let h = Harness::new(CURRENT).await;
    let url = h.serve("/broken/", ResponseTemplate::new(500)).await;
    let sink = TestSink::default();

    let outcome = h
        .navigator
        .navigate(3, &url, &sink, &CancellationToken::new())
        .await;
    match outcome {
        NavigationOutcome::FellBack(NavigationFailure::Fetch(err)) => {
            assert_eq!(err.kind, FailureKind::HttpStatus(500));
        }
        other => panic!("expected a fetch fallback, got {other:?}"),
    }

    let events = sink.take();
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::FellBack { id: 3, url: failed, .. } if *failed == url
    )));
    assert!(attached_texts(&events).is_empty());
    assert!(h.main_text().await.contains("old page"));
    let live = h.navigator.live();
    assert_eq!(live.lock().await.title(), "Home");
}

#[tokio::test]
async fn response_without_content_container_falls_back() {
    let h = Harness::new(CURRENT).await;
    let url = h
        .serve_html("/plain/", "<html><body><p>no main here</p></body></html>")
        .await;
    let sink = TestSink::default();

    let outcome = h
        .navigator
        .navigate(4, &url, &sink, &CancellationToken::new())
        .await;
    assert_eq!(
        outcome,
        NavigationOutcome::FellBack(NavigationFailure::Parse(ParseError::MissingContainer(
            "main"
        )))
    );
    assert!(h.main_text().await.contains("old page"));
}

#[tokio::test]
async fn live_page_without_content_container_falls_back() {
    let h = Harness::new("<html><body><p>bare</p></body></html>").await;
    let url = h.serve_html("/projects/", PROJECTS).await;
    let sink = TestSink::default();

    let outcome = h
        .navigator
        .navigate(5, &url, &sink, &CancellationToken::new())
        .await;
    assert_eq!(
        outcome,
        NavigationOutcome::FellBack(NavigationFailure::Dom(DomError::MissingContainer("main")))
    );
}

#[tokio::test]
async fn wrapped_content_is_revealed_inside_a_fresh_wrapper() {
    let h = Harness::new(CURRENT).await;
    let url = h
        .serve_html(
            "/about/",
            r#"<html><body><main><div class="wrapper"><h2>About</h2><p>text</p></div></main></body></html>"#,
        )
        .await;
    let sink = TestSink::default();

    let outcome = h
        .navigator
        .navigate(6, &url, &sink, &CancellationToken::new())
        .await;
    assert!(matches!(outcome, NavigationOutcome::Revealed { .. }));

    let live = h.navigator.live();
    let live = live.lock().await;
    let wrappers = live.select_class(WRAPPER_CLASS);
    assert_eq!(wrappers.len(), 1);
    let children = live.children(wrappers[0]);
    assert_eq!(children.len(), 2);
    assert_eq!(live.text_content(children[0]), "About");
    assert_eq!(live.text_content(children[1]), "text");
}

#[tokio::test]
async fn superseded_navigation_stops_and_the_next_one_owns_the_page() {
    let h = Harness::new(CURRENT).await;
    let first_url = h.serve_html("/projects/", PROJECTS).await;
    let second_url = h
        .serve_html(
            "/contact/",
            "<html><head><title>Contact</title></head><body><main><p>write to us</p></main></body></html>",
        )
        .await;

    let first_token = CancellationToken::new();
    let first_sink = TestSink {
        cancel_after_attach: Some((1, first_token.clone())),
        ..TestSink::default()
    };
    let outcome = h
        .navigator
        .navigate(7, &first_url, &first_sink, &first_token)
        .await;
    assert_eq!(outcome, NavigationOutcome::Cancelled);
    let first_events = first_sink.take();
    assert_eq!(attached_texts(&first_events), vec!["", "one"]);
    assert!(matches!(
        first_events.last(),
        Some(EngineEvent::Cancelled { id: 7 })
    ));

    let second_sink = TestSink::default();
    let outcome = h
        .navigator
        .navigate(8, &second_url, &second_sink, &CancellationToken::new())
        .await;
    assert!(matches!(outcome, NavigationOutcome::Revealed { .. }));

    let text = h.main_text().await;
    assert!(text.contains("write to us"));
    assert!(!text.contains("one"));
    let live = h.navigator.live();
    assert_eq!(live.lock().await.title(), "Contact");
}

#[tokio::test]
async fn cancelled_before_fetch_leaves_page_alone() {
    let h = Harness::new(CURRENT).await;
    let url = h.serve_html("/projects/", PROJECTS).await;
    let sink = TestSink::default();
    let token = CancellationToken::new();
    token.cancel();

    let outcome = h.navigator.navigate(9, &url, &sink, &token).await;
    assert_eq!(outcome, NavigationOutcome::Cancelled);
    assert!(h.main_text().await.contains("old page"));
}

#[tokio::test]
async fn success_notices_are_dismissed_after_the_delay() {
    let h = Harness::new(CURRENT).await;
    let url = h
        .serve_html(
            "/saved/",
            r#"<html><body><main><ul class="messages"><li class="success">Saved</li></ul><p>done</p></main></body></html>"#,
        )
        .await;
    let sink = TestSink::default();
    let token = CancellationToken::new();

    let outcome = h.navigator.navigate(10, &url, &sink, &token).await;
    let NavigationOutcome::Revealed { notices, .. } = outcome else {
        panic!("expected a progressive reveal");
    };
    assert_eq!(notices.len(), 1);

    h.navigator.dismiss_notices(notices, &token).await;
    let live = h.navigator.live();
    let live = live.lock().await;
    assert!(live.success_notices().is_empty());
    let main = live.content_container().unwrap();
    assert!(live.text_content(main).contains("done"));
}

#[tokio::test]
async fn notices_stay_when_the_navigation_is_superseded() {
    let h = Harness::new(CURRENT).await;
    let url = h
        .serve_html(
            "/saved/",
            r#"<html><body><main><ul class="messages"><li class="success">Saved</li></ul></main></body></html>"#,
        )
        .await;
    let sink = TestSink::default();
    let token = CancellationToken::new();

    let NavigationOutcome::Revealed { notices, .. } =
        h.navigator.navigate(11, &url, &sink, &token).await
    else {
        panic!("expected a progressive reveal");
    };
    token.cancel();
    h.navigator.dismiss_notices(notices, &token).await;

    let live = h.navigator.live();
    assert_eq!(live.lock().await.success_notices().len(), 1);
}

#[tokio::test]
async fn muting_relabels_the_toggle_and_silences_the_reveal() {
    let h = Harness::new(CURRENT).await;
    let url = h.serve_html("/projects/", PROJECTS).await;
    let sink = TestSink::default();

    h.navigator.set_sound(false, &sink).await;
    let events = sink.take();
    let Some(EngineEvent::PageSnapshot(snapshot)) = events.last() else {
        panic!("expected a snapshot after the toggle");
    };
    assert_eq!(snapshot.sound_label.as_deref(), Some("SFX: Off"));

    let outcome = h
        .navigator
        .navigate(12, &url, &sink, &CancellationToken::new())
        .await;
    let NavigationOutcome::Revealed { report, .. } = outcome else {
        panic!("expected a progressive reveal");
    };
    assert_eq!(report.units, 5);
    assert_eq!(report.tones, 0);
    assert!(h.recorder.voices().is_empty());

    let live = h.navigator.live();
    let live = live.lock().await;
    let toggle = live.find_by_id("sound-toggle").unwrap();
    assert_eq!(live.text_content(toggle), "SFX: Off");
    assert_eq!(live.element(toggle).unwrap().attr("aria-pressed"), Some("false"));
}

#[tokio::test]
async fn full_load_replaces_the_whole_page() {
    let h = Harness::new(CURRENT).await;
    let url = h.serve_html("/projects/", PROJECTS).await;
    let sink = TestSink::default();

    h.navigator
        .full_load(&url, &sink, &CancellationToken::new())
        .await;
    let events = sink.take();
    match &events[0] {
        EngineEvent::PageLoaded { url: loaded, text } => {
            assert_eq!(*loaded, url);
            assert!(text.contains("three"));
        }
        other => panic!("expected PageLoaded, got {other:?}"),
    }
    let live = h.navigator.live();
    assert_eq!(live.lock().await.title(), "Projects");
}

#[tokio::test]
async fn failed_full_load_is_reported() {
    let h = Harness::new(CURRENT).await;
    let url = h.serve("/gone/", ResponseTemplate::new(404)).await;
    let sink = TestSink::default();

    h.navigator
        .full_load(&url, &sink, &CancellationToken::new())
        .await;
    assert!(matches!(
        sink.take().as_slice(),
        [EngineEvent::LoadFailed { .. }]
    ));
    assert!(h.main_text().await.contains("old page"));
}

const SAVED: &str = r#"<html><head><title>Saved</title></head><body>
    <main><ul class="messages"><li class="success">Saved</li></ul><p>done</p></main>
    </body></html>"#;

#[tokio::test]
async fn full_load_notices_are_dismissed_after_the_delay() {
    let h = Harness::new(CURRENT).await;
    let url = h.serve_html("/saved/", SAVED).await;
    let sink = TestSink::default();
    let token = CancellationToken::new();

    let notices = h.navigator.full_load(&url, &sink, &token).await;
    assert_eq!(notices.len(), 1);
    h.navigator.dismiss_notices(notices, &token).await;

    let live = h.navigator.live();
    let live = live.lock().await;
    assert!(live.success_notices().is_empty());
    let main = live.content_container().unwrap();
    assert!(live.text_content(main).contains("done"));
}

#[tokio::test]
async fn notices_of_a_replaced_page_are_left_alone() {
    let h = Harness::new(CURRENT).await;
    let saved = h.serve_html("/saved/", SAVED).await;
    let items: String = (1..=12).map(|i| format!("<li>b{i}</li>")).collect();
    let listing = h
        .serve_html(
            "/listing/",
            &format!("<html><body><main><ul>{items}</ul></main></body></html>"),
        )
        .await;
    let sink = TestSink::default();
    let token = CancellationToken::new();

    let NavigationOutcome::Revealed { notices, .. } =
        h.navigator.navigate(15, &saved, &sink, &token).await
    else {
        panic!("expected a progressive reveal");
    };
    assert_eq!(notices.len(), 1);

    h.navigator
        .full_load(&listing, &sink, &CancellationToken::new())
        .await;
    let expected: String = (1..=12).map(|i| format!("b{i}")).collect();
    assert_eq!(h.main_text().await, expected);

    h.navigator.dismiss_notices(notices, &token).await;
    assert_eq!(h.main_text().await, expected);
}

#[tokio::test]
async fn cancelled_full_load_leaves_the_page_alone() {
    let h = Harness::new(CURRENT).await;
    let url = h.serve_html("/projects/", PROJECTS).await;
    let sink = TestSink::default();
    let token = CancellationToken::new();
    token.cancel();

    let notices = h.navigator.full_load(&url, &sink, &token).await;
    assert!(notices.is_empty());
    assert!(matches!(
        sink.take().as_slice(),
        [EngineEvent::LoadSuperseded { .. }]
    ));
    assert!(h.main_text().await.contains("old page"));
}

#[tokio::test]
async fn repeated_reveals_do_not_grow_the_live_tree() {
    let h = Harness::new(CURRENT).await;
    let url = h.serve_html("/projects/", PROJECTS).await;
    let sink = TestSink::default();
    let live = h.navigator.live();

    h.navigator
        .navigate(1, &url, &sink, &CancellationToken::new())
        .await;
    let settled = live.lock().await.arena_len();
    for id in 2..=30 {
        let outcome = h
            .navigator
            .navigate(id, &url, &sink, &CancellationToken::new())
            .await;
        assert!(matches!(outcome, NavigationOutcome::Revealed { .. }));
    }
    assert_eq!(live.lock().await.arena_len(), settled);
}

#[tokio::test(flavor = "multi_thread")]
async fn navigation_supersedes_a_pending_full_load() {
    let h = Harness::new(CURRENT).await;
    let slow = h
        .serve(
            "/slow/",
            ResponseTemplate::new(200)
                .set_body_raw(PROJECTS.to_string(), "text/html; charset=utf-8")
                .set_delay(Duration::from_millis(300)),
        )
        .await;
    let contact = h
        .serve_html(
            "/contact/",
            "<html><head><title>Contact</title></head><body><main><p>write to us</p></main></body></html>",
        )
        .await;
    let live = h.navigator.live();
    let Harness {
        navigator, server, ..
    } = h;
    let handle = NavigatorHandle::new(navigator);
    handle.full_load(slow);
    handle.navigate(2, contact);

    let events = tokio::task::spawn_blocking(move || {
        let mut events = Vec::new();
        let (mut revealed, mut superseded) = (false, false);
        while let Some(event) = handle.recv_timeout(Duration::from_secs(5)) {
            revealed |= matches!(event, EngineEvent::PageSnapshot(_));
            superseded |= matches!(event, EngineEvent::LoadSuperseded { .. });
            events.push(event);
            if revealed && superseded {
                break;
            }
        }
        // Longer than the slow response, so a stray load would have landed.
        std::thread::sleep(Duration::from_millis(500));
        while let Some(event) = handle.try_recv() {
            events.push(event);
        }
        events
    })
    .await
    .unwrap();
    drop(server);

    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::Revealed { id: 2 })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::PageLoaded { .. })));
    let live = live.lock().await;
    assert_eq!(live.title(), "Contact");
    let main = live.content_container().unwrap();
    assert!(live.text_content(main).contains("write to us"));
}

#[tokio::test(flavor = "multi_thread")]
async fn handle_runs_navigations_in_the_background() {
    let h = Harness::new(CURRENT).await;
    let url = h.serve_html("/projects/", PROJECTS).await;
    let Harness {
        navigator, server, ..
    } = h;
    let handle = NavigatorHandle::new(navigator);
    handle.navigate(1, url);

    let events = tokio::task::spawn_blocking(move || {
        let mut events = Vec::new();
        while let Some(event) = handle.recv_timeout(Duration::from_secs(5)) {
            let done = matches!(event, EngineEvent::PageSnapshot(_));
            events.push(event);
            if done {
                break;
            }
        }
        events
    })
    .await
    .unwrap();
    drop(server);

    assert_eq!(
        phases(&events),
        vec![Phase::Fetching, Phase::Decomposing, Phase::Revealing]
    );
    assert_eq!(attached_texts(&events).len(), 5);
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::Revealed { id: 1 })));
}
