//! Tests for stream resolution and the playback shell

use super::*;
use crate::models::{CatalogItem, Episode};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Mutex;

fn creds() -> StreamCredentials {
    StreamCredentials {
        server: "http://example.com:8080".to_string(),
        username: "john".to_string(),
        password: "secret".to_string(),
    }
}

fn movie(id: i64, name: &str) -> PlayableItem {
    PlayableItem::movie(&CatalogItem {
        id,
        kind: ContentKind::Movie,
        name: name.to_string(),
        poster: Some("http://img/poster.jpg".to_string()),
        rating: None,
        genre: None,
        plot: None,
        backdrop: None,
    })
}

fn episode(id: &str) -> PlayableItem {
    let series = CatalogItem {
        id: 42,
        kind: ContentKind::Series,
        name: "Dark".to_string(),
        poster: None,
        rating: None,
        genre: None,
        plot: None,
        backdrop: None,
    };
    PlayableItem::episode(
        &series,
        &Episode {
            id: id.to_string(),
            episode_num: 5,
            season: 1,
            title: "Truths".to_string(),
            still: None,
            plot: None,
            container_extension: "mkv".to_string(),
        },
    )
}

#[derive(Default)]
struct Counters {
    live: Cell<usize>,
    max_live: Cell<usize>,
    disposed: Cell<usize>,
}

struct FakeInstance {
    counters: Rc<Counters>,
}

impl EngineInstance for FakeInstance {
    fn dispose(&mut self) {
        self.counters.live.set(self.counters.live.get() - 1);
        self.counters.disposed.set(self.counters.disposed.get() + 1);
    }
}

#[derive(Default)]
struct FakeEngine {
    counters: Rc<Counters>,
    requests: RefCell<Vec<AttachRequest>>,
    sinks: Vec<EventSink>,
    fail_with: Option<u16>,
}

impl PlaybackEngine for FakeEngine {
    type Instance = FakeInstance;

    fn attach(&mut self, request: &AttachRequest, events: EventSink) -> Result<FakeInstance, PlaybackError> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(code) = self.fail_with {
            return Err(PlaybackError::Engine(code));
        }
        self.sinks.push(events);
        let live = self.counters.live.get() + 1;
        self.counters.live.set(live);
        self.counters.max_live.set(self.counters.max_live.get().max(live));
        Ok(FakeInstance { counters: Rc::clone(&self.counters) })
    }
}

type Received = Arc<Mutex<Vec<(u64, EngineEvent)>>>;

fn shell() -> (PlaybackShell<FakeEngine>, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let notify = Arc::new(move |generation: u64, event: EngineEvent| {
        sink.lock().unwrap().push((generation, event));
    });
    (PlaybackShell::new(FakeEngine::default(), creds(), notify), received)
}

#[test]
fn test_resolve_is_kind_specific() {
    let movie_src = resolve_stream_url(&creds(), "101", ContentKind::Movie);
    let series_src = resolve_stream_url(&creds(), "E5", ContentKind::Series);
    assert_eq!(movie_src.url, "http://example.com:8080/movie/john/secret/101.mp4");
    assert_eq!(series_src.url, "http://example.com:8080/series/john/secret/E5.mp4");
    assert_eq!(movie_src.mime, "video/mp4");

    // Colliding ids still give different URLs
    let colliding = resolve_stream_url(&creds(), "101", ContentKind::Series);
    assert_ne!(movie_src.url, colliding.url);
}

#[test]
fn test_resolve_playable_items() {
    assert_eq!(
        resolve(&creds(), &movie(101, "Heat")).url,
        "http://example.com:8080/movie/john/secret/101.mp4"
    );
    assert_eq!(
        resolve(&creds(), &episode("E5")).url,
        "http://example.com:8080/series/john/secret/E5.mp4"
    );
}

#[test]
fn test_error_hints() {
    assert!(PlaybackErrorKind::from_code(2).hint().contains("check your connection"));
    assert_eq!(PlaybackErrorKind::from_code(1), PlaybackErrorKind::UnsupportedFormat);
    assert_eq!(PlaybackErrorKind::from_code(4), PlaybackErrorKind::Unavailable);
    assert_eq!(PlaybackErrorKind::from_code(5), PlaybackErrorKind::Encoding);
    assert_eq!(PlaybackErrorKind::from_code(0), PlaybackErrorKind::Unknown);
    assert_eq!(PlaybackErrorKind::from_code(99), PlaybackErrorKind::Unknown);
}

#[test]
fn test_transition_table() {
    let item = movie(1, "Heat");

    let (s, fx) = transition(PlaybackState::Idle, PlaybackEvent::Present(item.clone()));
    assert_eq!(s, PlaybackState::Attaching(item.clone()));
    assert_eq!(fx, vec![Effect::Attach(item.clone())]);

    let (s, fx) = transition(s, PlaybackEvent::Ready);
    assert_eq!(s, PlaybackState::Playing(item.clone()));
    assert!(fx.is_empty());

    let (s, fx) = transition(s, PlaybackEvent::Retry);
    assert_eq!(s, PlaybackState::Playing(item.clone()));
    assert!(fx.is_empty());

    let (s, _) = transition(s, PlaybackEvent::EngineError(3));
    assert!(matches!(s, PlaybackState::Failed { code: 3, error: PlaybackErrorKind::Corrupt, .. }));

    let (s, fx) = transition(s, PlaybackEvent::Retry);
    assert_eq!(s, PlaybackState::Attaching(item.clone()));
    assert_eq!(fx, vec![Effect::Teardown, Effect::Attach(item)]);

    let (s, fx) = transition(s, PlaybackEvent::Close);
    assert_eq!(s, PlaybackState::Idle);
    assert_eq!(fx, vec![Effect::Teardown]);

    let (s, fx) = transition(s, PlaybackEvent::Ready);
    assert_eq!(s, PlaybackState::Idle);
    assert!(fx.is_empty());
}

#[test]
fn test_present_while_playing_tears_down_first() {
    let (s, _) = transition(PlaybackState::Idle, PlaybackEvent::Present(movie(1, "Heat")));
    let next = movie(2, "Alien");
    let (s, fx) = transition(s, PlaybackEvent::Present(next.clone()));
    assert_eq!(s, PlaybackState::Attaching(next.clone()));
    assert_eq!(fx, vec![Effect::Teardown, Effect::Attach(next)]);
}

#[test]
fn test_shell_plays_and_closes() {
    let (mut shell, _) = shell();
    shell.present(movie(101, "Heat"));
    assert!(matches!(shell.state(), PlaybackState::Attaching(_)));
    assert!(shell.has_instance());

    shell.on_engine_event(shell.generation(), EngineEvent::Ready);
    assert!(matches!(shell.state(), PlaybackState::Playing(_)));

    shell.close();
    assert!(shell.state().is_idle());
    assert!(!shell.has_instance());
    assert_eq!(shell.engine().counters.live.get(), 0);
}

#[test]
fn test_network_error_then_retry_keeps_single_instance() {
    let (mut shell, _) = shell();
    shell.present(movie(101, "Heat"));
    let first = shell.generation();

    shell.on_engine_event(first, EngineEvent::Error(2));
    match shell.state() {
        PlaybackState::Failed { error, code, .. } => {
            assert_eq!(*code, 2);
            assert!(error.hint().contains("check your connection"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }

    shell.retry();
    assert!(matches!(shell.state(), PlaybackState::Attaching(_)));
    let counters = &shell.engine().counters;
    assert_eq!(counters.live.get(), 1);
    assert_eq!(counters.max_live.get(), 1);
    assert_eq!(counters.disposed.get(), 1);

    // Retry resolves the same source again
    let requests = shell.engine().requests.borrow();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].source, requests[1].source);
}

#[test]
fn test_stale_events_are_ignored() {
    let (mut shell, _) = shell();
    shell.present(movie(101, "Heat"));
    let first = shell.generation();
    shell.present(episode("E5"));
    assert!(shell.generation() > first);

    shell.on_engine_event(first, EngineEvent::Error(2));
    assert!(matches!(shell.state(), PlaybackState::Attaching(_)));

    shell.on_engine_event(shell.generation(), EngineEvent::Ready);
    assert_eq!(shell.state().item().map(|i| i.kind()), Some(ContentKind::Series));
    assert_eq!(shell.engine().counters.max_live.get(), 1);
}

#[test]
fn test_engine_events_are_tagged_with_generation() {
    let (mut shell, received) = shell();
    shell.present(movie(101, "Heat"));
    shell.retry();
    shell.on_engine_event(shell.generation(), EngineEvent::Error(4));
    shell.retry();

    let sink = Arc::clone(&shell.engine().sinks[1]);
    sink(EngineEvent::Ready);
    assert_eq!(received.lock().unwrap().as_slice(), &[(2, EngineEvent::Ready)]);
}

#[test]
fn test_attach_failure_goes_straight_to_failed() {
    let (mut shell, _) = shell();
    shell.engine_mut().fail_with = Some(1);
    shell.present(movie(101, "Heat"));
    assert!(matches!(
        shell.state(),
        PlaybackState::Failed { error: PlaybackErrorKind::UnsupportedFormat, .. }
    ));
    assert!(!shell.has_instance());

    shell.engine_mut().fail_with = None;
    shell.retry();
    assert!(shell.has_instance());
}

#[test]
fn test_attach_request_carries_player_options() {
    let (mut shell, _) = shell();
    shell.present(episode("E5"));
    let requests = shell.engine().requests.borrow();
    let request = &requests[0];
    assert_eq!(request.title, "Dark - Season 1 Episode 5");
    assert_eq!(request.playback_rates, vec![0.5, 1.0, 1.5, 2.0]);
    assert_eq!(request.aspect_ratio, (16, 9));
}
