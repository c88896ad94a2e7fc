//! Playback shell: stream URL resolution, the playback state machine and
//! ownership of the single live engine instance

use std::sync::Arc;

use crate::error::PlaybackError;
use crate::models::{ContentKind, PlayableItem};

/// Server and account the stream URLs are built from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamCredentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

/// A resolved, playable source
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSource {
    pub url: String,
    pub mime: &'static str,
}

/// Build the VOD stream URL for `id`. The kind picks the endpoint, so a
/// movie id and an episode id never resolve to the same URL.
pub fn resolve_stream_url(creds: &StreamCredentials, id: &str, kind: ContentKind) -> StreamSource {
    let segment = match kind {
        ContentKind::Movie => "movie",
        ContentKind::Series => "series",
    };
    StreamSource {
        url: format!(
            "{}/{}/{}/{}/{}.mp4",
            creds.server.trim_end_matches('/'),
            segment,
            creds.username,
            creds.password,
            id
        ),
        mime: "video/mp4",
    }
}

pub fn resolve(creds: &StreamCredentials, item: &PlayableItem) -> StreamSource {
    resolve_stream_url(creds, &item.stream_id(), item.kind())
}

/// Playback failure categories, numbered like media element error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackErrorKind {
    UnsupportedFormat,
    Network,
    Corrupt,
    Unavailable,
    Encoding,
    Unknown,
}

impl PlaybackErrorKind {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => PlaybackErrorKind::UnsupportedFormat,
            2 => PlaybackErrorKind::Network,
            3 => PlaybackErrorKind::Corrupt,
            4 => PlaybackErrorKind::Unavailable,
            5 => PlaybackErrorKind::Encoding,
            _ => PlaybackErrorKind::Unknown,
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            PlaybackErrorKind::UnsupportedFormat => "This video format is not supported by the player.",
            PlaybackErrorKind::Network => "Network error: check your connection and try again.",
            PlaybackErrorKind::Corrupt => "The video may be corrupted or in an unsupported format.",
            PlaybackErrorKind::Unavailable => "The video is not available right now. Try again later.",
            PlaybackErrorKind::Encoding => "Playback was interrupted by an encoding problem.",
            PlaybackErrorKind::Unknown => "An error occurred during playback. Try again.",
        }
    }
}

/// Options handed to the engine together with the source
#[derive(Debug, Clone, PartialEq)]
pub struct AttachRequest {
    pub source: StreamSource,
    pub title: String,
    pub poster: Option<String>,
    pub playback_rates: Vec<f32>,
    pub aspect_ratio: (u32, u32),
}

impl AttachRequest {
    pub fn new(item: &PlayableItem, source: StreamSource) -> Self {
        Self {
            source,
            title: item.name.clone(),
            poster: item.poster.clone(),
            playback_rates: vec![0.5, 1.0, 1.5, 2.0],
            aspect_ratio: (16, 9),
        }
    }
}

/// What a running engine reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Stream metadata is known and frames are on their way
    Ready,
    Error(u16),
}

/// Callback an engine instance reports its events through
pub type EventSink = Arc<dyn Fn(EngineEvent) + Send + Sync>;

pub trait EngineInstance {
    /// Stop output and release everything the instance holds
    fn dispose(&mut self);
}

/// Something that can play a source: an external player, a test double
pub trait PlaybackEngine {
    type Instance: EngineInstance;

    fn attach(&mut self, request: &AttachRequest, events: EventSink)
        -> Result<Self::Instance, PlaybackError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Idle,
    Attaching(PlayableItem),
    Playing(PlayableItem),
    Failed {
        item: PlayableItem,
        error: PlaybackErrorKind,
        code: u16,
    },
}

impl PlaybackState {
    pub fn item(&self) -> Option<&PlayableItem> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Attaching(item) | PlaybackState::Playing(item) => Some(item),
            PlaybackState::Failed { item, .. } => Some(item),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, PlaybackState::Idle)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Present(PlayableItem),
    Ready,
    EngineError(u16),
    Retry,
    Close,
}

/// Side effects the shell must carry out, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Teardown,
    Attach(PlayableItem),
}

/// Pure transition function of the playback state machine
pub fn transition(state: PlaybackState, event: PlaybackEvent) -> (PlaybackState, Vec<Effect>) {
    use PlaybackEvent as Ev;
    use PlaybackState as St;

    match (state, event) {
        (St::Idle, Ev::Present(item)) => (St::Attaching(item.clone()), vec![Effect::Attach(item)]),
        (_, Ev::Present(item)) => (
            St::Attaching(item.clone()),
            vec![Effect::Teardown, Effect::Attach(item)],
        ),
        (St::Attaching(item), Ev::Ready) => (St::Playing(item), Vec::new()),
        (St::Attaching(item) | St::Playing(item), Ev::EngineError(code)) => (
            St::Failed {
                item,
                error: PlaybackErrorKind::from_code(code),
                code,
            },
            Vec::new(),
        ),
        (St::Failed { item, .. }, Ev::Retry) => (
            St::Attaching(item.clone()),
            vec![Effect::Teardown, Effect::Attach(item)],
        ),
        (St::Idle, Ev::Close) => (St::Idle, Vec::new()),
        (_, Ev::Close) => (St::Idle, vec![Effect::Teardown]),
        (state, _) => (state, Vec::new()),
    }
}

/// Drives an engine from the state machine. At most one engine instance is
/// alive at any time: every attach is preceded by a complete teardown.
pub struct PlaybackShell<E: PlaybackEngine> {
    engine: E,
    credentials: StreamCredentials,
    state: PlaybackState,
    instance: Option<E::Instance>,
    generation: u64,
    notify: Arc<dyn Fn(u64, EngineEvent) + Send + Sync>,
}

impl<E: PlaybackEngine> PlaybackShell<E> {
    /// `notify` receives engine events tagged with the attach generation they
    /// belong to; feed them back through [`on_engine_event`](Self::on_engine_event).
    pub fn new(
        engine: E,
        credentials: StreamCredentials,
        notify: Arc<dyn Fn(u64, EngineEvent) + Send + Sync>,
    ) -> Self {
        Self {
            engine,
            credentials,
            state: PlaybackState::Idle,
            instance: None,
            generation: 0,
            notify,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn set_credentials(&mut self, credentials: StreamCredentials) {
        self.credentials = credentials;
    }

    pub fn present(&mut self, item: PlayableItem) {
        self.dispatch(PlaybackEvent::Present(item));
    }

    pub fn retry(&mut self) {
        self.dispatch(PlaybackEvent::Retry);
    }

    pub fn close(&mut self) {
        self.dispatch(PlaybackEvent::Close);
    }

    /// Events from instances that were torn down since are ignored
    pub fn on_engine_event(&mut self, generation: u64, event: EngineEvent) {
        if generation != self.generation || self.instance.is_none() {
            log::debug!("ignoring {:?} from stale engine instance {}", event, generation);
            return;
        }
        let event = match event {
            EngineEvent::Ready => PlaybackEvent::Ready,
            EngineEvent::Error(code) => PlaybackEvent::EngineError(code),
        };
        self.dispatch(event);
    }

    fn dispatch(&mut self, event: PlaybackEvent) {
        let state = std::mem::replace(&mut self.state, PlaybackState::Idle);
        let (next, effects) = transition(state, event);
        self.state = next;
        for effect in effects {
            match effect {
                Effect::Teardown => self.teardown(),
                Effect::Attach(item) => self.attach(&item),
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(mut instance) = self.instance.take() {
            instance.dispose();
            log::info!("playback engine instance {} disposed", self.generation);
        }
    }

    fn attach(&mut self, item: &PlayableItem) {
        self.teardown();
        self.generation += 1;
        let generation = self.generation;

        let source = resolve(&self.credentials, item);
        log::info!("attaching {} ({}) to {}", item.name, item.kind(), source.url);
        let request = AttachRequest::new(item, source);

        let notify = Arc::clone(&self.notify);
        let sink: EventSink = Arc::new(move |event| notify(generation, event));

        match self.engine.attach(&request, sink) {
            Ok(instance) => self.instance = Some(instance),
            Err(e) => {
                log::warn!("attach failed: {}", e);
                let (next, _) = transition(
                    std::mem::replace(&mut self.state, PlaybackState::Idle),
                    PlaybackEvent::EngineError(e.code()),
                );
                self.state = next;
            }
        }
    }
}

impl<E: PlaybackEngine> Drop for PlaybackShell<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "playback_tests.rs"]
mod tests;
