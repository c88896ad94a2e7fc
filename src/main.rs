//! Xtream VOD - movie and series browser
//! Catalog, search and series navigation for Xtream Codes VOD with playback
//! through an external media player

// Hide console window on Windows release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use eframe::egui;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

mod api;
mod catalog;
mod config;
mod deep_link;
mod error;
mod models;
mod playback;
mod player;
mod request;
mod search;
mod series;

use api::{CatalogSource, EpisodesPayload, SeriesDetail, XtreamClient};
use catalog::{should_load_more, CatalogWindow, SCROLL_THRESHOLD};
use config::{AppConfig, ConnectionQuality};
use deep_link::DeepLink;
use error::ApiError;
use models::*;
use playback::{EngineEvent, PlaybackShell, PlaybackState};
use player::ExternalPlayer;
use request::LoadGate;
use search::{SearchFilter, SearchOutcome, SearchResults, SearchSession, SearchTicket, SECTION_PREVIEW};
use series::SeriesNavigator;

const CARD_WIDTH: f32 = 170.0;
const CONSOLE_LINES: usize = 500;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "xtream_vod", version, about = "Browse and play Xtream Codes VOD catalogs")]
struct Args {
    /// Deep link to open, e.g. "?series=42&season=2&episode=E17" or "q=matrix&type=movie"
    link: Option<String>,

    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Background task messages
enum TaskResult {
    CatalogLoaded {
        kind: ContentKind,
        request: u64,
        window: CatalogWindow,
    },
    /// The delayed next page of the movie view is due
    MoviePageReady,
    SearchFinished {
        ticket: SearchTicket,
        outcome: SearchOutcome,
    },
    SeriesLoaded {
        request: u64,
        series_id: i64,
        detail: Result<SeriesDetail, ApiError>,
        season: Option<i32>,
        episode: Option<String>,
    },
    Engine {
        generation: u64,
        event: EngineEvent,
    },
}

// Predefined user agents
const USER_AGENTS: &[(&str, &str)] = &[
    ("Chrome (Windows)", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"),
    ("Firefox (Windows)", "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:140.0) Gecko/20100101 Firefox/140.0"),
    ("VLC", "VLC/3.0.16 LibVLC/3.0.16"),
    ("Kodi", "Kodi/20.2 (Linux; Android 13) Android/13 Sys_CPU/armv8a App_Bitness/64 Version/20.2"),
    ("IPTV Smarters Pro", "IPTVSmartersPro"),
    ("TiviMate", "TiviMate/4.7.0 (Linux; Android 13)"),
    ("Lavf (FFmpeg)", "Lavf/60.3.100"),
];

fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let (config, config_path) = match args.config {
        Some(path) => (AppConfig::load_from(&path), path),
        None => (AppConfig::load(), AppConfig::default_path()),
    };
    let link = args
        .link
        .as_deref()
        .map(DeepLink::parse)
        .filter(|link| !link.is_empty());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1250.0, 760.0])
            .with_min_inner_size([900.0, 550.0]),
        vsync: true,
        ..Default::default()
    };

    eframe::run_native(
        "Xtream VOD",
        options,
        Box::new(move |cc| {
            if config.dark_mode {
                cc.egui_ctx.set_visuals(egui::Visuals::dark());
            } else {
                cc.egui_ctx.set_visuals(egui::Visuals::light());
            }
            Ok(Box::new(VodApp::new(&cc.egui_ctx, config, config_path, link)))
        }),
    )
}

/// Get current local time as HH:MM:SS
fn timestamp_now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// One catalog card; true when clicked
fn card(ui: &mut egui::Ui, item: &CatalogItem) -> bool {
    let mut clicked = false;
    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.set_width(CARD_WIDTH);
        ui.vertical(|ui| {
            let title = egui::RichText::new(truncate(&item.name, 24)).strong();
            if ui.button(title).on_hover_text(&item.name).clicked() {
                clicked = true;
            }
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(item.kind.label()).small().weak());
                if let Some(rating) = &item.rating {
                    ui.label(egui::RichText::new(format!("★ {}", rating)).small());
                }
            });
            if let Some(genre) = &item.genre {
                ui.label(egui::RichText::new(truncate(genre, 28)).small().weak());
            }
        });
    });
    clicked
}

/// Wrapped grid of cards; returns the clicked item
fn card_grid<'a>(ui: &mut egui::Ui, items: impl IntoIterator<Item = &'a CatalogItem>) -> Option<CatalogItem> {
    let mut clicked = None;
    ui.horizontal_wrapped(|ui| {
        for item in items {
            if card(ui, item) {
                clicked = Some(item.clone());
            }
        }
    });
    clicked
}

struct VodApp {
    // Login fields
    server: String,
    username: String,
    password: String,

    config: AppConfig,
    config_path: PathBuf,
    client: Option<Arc<XtreamClient>>,

    // State
    current_tab: Tab,
    status_message: String,
    link_input: String,
    pending_link: Option<DeepLink>,
    pending_movie: Option<i64>,

    // Background task channel
    task_receiver: Receiver<TaskResult>,
    task_sender: Sender<TaskResult>,
    ctx: egui::Context,

    // Catalogs
    home_movies: CatalogWindow,
    home_series: CatalogWindow,
    movies: CatalogWindow,
    series: CatalogWindow,
    movies_load: LoadGate,
    series_load: LoadGate,
    featured: Option<CatalogItem>,
    selected_movie: Option<CatalogItem>,

    // Series navigation
    selected_series: Option<CatalogItem>,
    navigator: Option<SeriesNavigator>,
    episodes_load: LoadGate,

    // Search
    search_session: SearchSession,
    search_input: String,
    search_filter: SearchFilter,
    search_results: SearchResults,
    search_failures: Vec<String>,

    playback: PlaybackShell<ExternalPlayer>,
    console_log: Vec<String>,
}

impl VodApp {
    fn new(ctx: &egui::Context, config: AppConfig, config_path: PathBuf, link: Option<DeepLink>) -> Self {
        let (task_sender, task_receiver) = channel();

        let notify = {
            let sender = task_sender.clone();
            let ctx = ctx.clone();
            Arc::new(move |generation: u64, event: EngineEvent| {
                let _ = sender.send(TaskResult::Engine { generation, event });
                ctx.request_repaint();
            })
        };
        let playback = PlaybackShell::new(
            ExternalPlayer::new(config.player_settings()),
            Default::default(),
            notify,
        );

        let mut app = Self {
            server: config.server.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            current_tab: Tab::Home,
            status_message: "Enter server details and log in".to_string(),
            link_input: String::new(),
            pending_link: link,
            pending_movie: None,
            task_receiver,
            task_sender,
            ctx: ctx.clone(),
            home_movies: CatalogWindow::empty(config.home_page_size),
            home_series: CatalogWindow::empty(config.home_page_size),
            movies: CatalogWindow::empty(config.view_page_size),
            series: CatalogWindow::empty(config.view_page_size),
            movies_load: LoadGate::new(),
            series_load: LoadGate::new(),
            featured: None,
            selected_movie: None,
            selected_series: None,
            navigator: None,
            episodes_load: LoadGate::new(),
            search_session: SearchSession::new(),
            search_input: String::new(),
            search_filter: SearchFilter::All,
            search_results: SearchResults::default(),
            search_failures: Vec::new(),
            playback,
            console_log: vec![format!("[{}] [INFO] Xtream VOD started", timestamp_now())],
            client: None,
            config,
            config_path,
        };

        if app.config.has_credentials() && (app.config.auto_login || app.pending_link.is_some()) {
            app.login();
        }
        app
    }

    fn log(&mut self, message: &str) {
        log::info!("{}", message);
        self.console_log.push(format!("[{}] {}", timestamp_now(), message));
        // Keep last 500 lines
        if self.console_log.len() > CONSOLE_LINES {
            self.console_log.remove(0);
        }
    }

    fn is_loading(&self) -> bool {
        self.movies_load.is_pending()
            || self.series_load.is_pending()
            || self.episodes_load.is_pending()
            || self.search_session.is_searching()
    }

    /// Run `job` on a worker thread and post its result back to the UI
    fn spawn_task<F>(&self, job: F)
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        let sender = self.task_sender.clone();
        let ctx = self.ctx.clone();
        thread::spawn(move || {
            let _ = sender.send(job());
            ctx.request_repaint();
        });
    }

    fn source(&self) -> Option<Arc<dyn CatalogSource>> {
        self.client.as_ref().map(|c| Arc::clone(c) as Arc<dyn CatalogSource>)
    }

    fn save_current_state(&mut self) {
        self.config.server = self.server.trim().to_string();
        self.config.username = self.username.clone();
        self.config.password = self.password.clone();
        match self.config.save_to(&self.config_path) {
            Ok(()) => {
                self.log(&format!("[INFO] Settings saved to {}", self.config_path.display()));
                self.status_message = "Settings saved".to_string();
            }
            Err(e) => self.log(&format!("[ERROR] Failed to save settings: {}", e)),
        }
    }

    fn login(&mut self) {
        if self.server.trim().is_empty() || self.username.is_empty() {
            self.status_message = "Server and username are required".to_string();
            return;
        }

        let client = XtreamClient::new(&self.server, &self.username, &self.password)
            .with_user_agent(&self.config.user_agent)
            .with_timeout(Duration::from_secs(self.config.request_timeout_secs));
        self.playback.set_credentials(client.credentials());
        self.client = Some(Arc::new(client));
        self.log(&format!("[INFO] Connecting to {} as {}", self.server.trim(), self.username));

        self.playback.close();
        self.home_movies = CatalogWindow::empty(self.config.home_page_size);
        self.home_series = CatalogWindow::empty(self.config.home_page_size);
        self.movies = CatalogWindow::empty(self.config.view_page_size);
        self.series = CatalogWindow::empty(self.config.view_page_size);
        self.featured = None;
        self.selected_movie = None;
        self.selected_series = None;
        self.navigator = None;
        self.episodes_load.cancel();
        self.search_session.reset();
        self.search_results = SearchResults::default();

        for kind in [ContentKind::Movie, ContentKind::Series] {
            self.fetch_catalog(kind);
        }
        self.status_message = "Loading catalog...".to_string();

        if let Some(link) = self.pending_link.take() {
            self.apply_link(link);
        }
    }

    fn fetch_catalog(&mut self, kind: ContentKind) {
        let Some(source) = self.source() else { return };
        // A newer login supersedes catalog loads still in flight
        let request = match kind {
            ContentKind::Movie => self.movies_load.issue(),
            ContentKind::Series => self.series_load.issue(),
        };
        let page_size = self.config.view_page_size;
        self.spawn_task(move || TaskResult::CatalogLoaded {
            kind,
            request,
            window: catalog::load(source.as_ref(), kind, page_size),
        });
    }

    /// Reveal the next page of a dedicated view. The movie view waits for the
    /// configured delay before showing it; the series view shows it at once.
    fn load_more(&mut self, kind: ContentKind) {
        match kind {
            ContentKind::Movie => {
                if !self.movies.begin_load_more() {
                    return;
                }
                let delay = Duration::from_millis(self.config.load_more_delay_ms);
                self.spawn_task(move || {
                    thread::sleep(delay);
                    TaskResult::MoviePageReady
                });
            }
            ContentKind::Series => self.series.load_more(),
        }
    }

    fn start_search(&mut self) {
        let Some(ticket) = self.search_session.submit(&self.search_input) else {
            self.search_results = SearchResults::default();
            self.search_failures.clear();
            return;
        };
        self.run_search(ticket);
    }

    fn run_search(&mut self, ticket: SearchTicket) {
        let Some(source) = self.source() else {
            self.status_message = "Log in to search".to_string();
            self.search_session.reset();
            return;
        };
        self.log(&format!("[INFO] Searching for '{}'", ticket.query));
        self.spawn_task(move || {
            let outcome = search::search(source.as_ref(), &ticket.query);
            TaskResult::SearchFinished { ticket, outcome }
        });
    }

    fn open_item(&mut self, item: CatalogItem) {
        match item.kind {
            ContentKind::Movie => {
                self.current_tab = Tab::Movies;
                self.play(PlayableItem::movie(&item));
                self.selected_movie = Some(item);
            }
            ContentKind::Series => {
                self.current_tab = Tab::Series;
                self.open_series(item, None, None);
            }
        }
    }

    fn open_series(&mut self, item: CatalogItem, season: Option<i32>, episode: Option<String>) {
        let Some(source) = self.source() else { return };
        let series_id = item.id;
        self.selected_series = Some(item);
        self.navigator = None;
        let request = self.episodes_load.issue();
        self.spawn_task(move || TaskResult::SeriesLoaded {
            request,
            series_id,
            detail: source.series_detail(series_id),
            season,
            episode,
        });
    }

    fn play(&mut self, item: PlayableItem) {
        self.playback.engine_mut().set_settings(self.config.player_settings());
        let player = self.playback.engine().settings().command.clone();
        self.log(&format!(
            "[PLAY] {} with {}",
            item.name,
            if player.is_empty() { "ffplay" } else { player.as_str() }
        ));
        self.playback.present(item);
        self.report_playback_failure();
    }

    fn close_player(&mut self) {
        if let Some(item) = self.playback.state().item() {
            let message = format!("[PLAY] Closed {}", item.name);
            self.log(&message);
        }
        self.playback.close();
        if let Some(nav) = self.navigator.as_mut() {
            nav.close_episode();
        }
    }

    fn report_playback_failure(&mut self) {
        if let PlaybackState::Failed { item, error, code } = self.playback.state() {
            let message = format!("[ERROR] {} failed (code {}): {}", item.name, code, error.hint());
            self.log(&message);
        }
    }

    /// Navigate to the state a deep link describes
    fn apply_link(&mut self, link: DeepLink) {
        if self.client.is_none() {
            self.pending_link = Some(link);
            return;
        }
        if let Some(series_id) = link.series {
            self.current_tab = Tab::Series;
            let item = self.series.find(series_id).cloned().unwrap_or_else(|| CatalogItem {
                id: series_id,
                kind: ContentKind::Series,
                name: format!("Series {}", series_id),
                poster: None,
                rating: None,
                genre: None,
                plot: None,
                backdrop: None,
            });
            self.open_series(item, link.season, link.episode);
        } else if let Some(movie_id) = link.movie {
            self.current_tab = Tab::Movies;
            self.pending_movie = Some(movie_id);
            self.resolve_pending_movie();
        } else if let Some(q) = link.q {
            self.current_tab = Tab::Search;
            self.search_filter = link.filter;
            // The link's own token is reused so the link reads back unchanged
            let ticket = match link.t {
                Some(t) => self.search_session.resume(&q, t),
                None => self.search_session.submit(&q),
            };
            self.search_input = q;
            match ticket {
                Some(ticket) => self.run_search(ticket),
                None => self.search_results = SearchResults::default(),
            }
        }

        // Later searches keep counting from the link's token
        if let Some(t) = link.t {
            self.search_session.observe_token(t);
        }
    }

    fn resolve_pending_movie(&mut self) {
        let Some(id) = self.pending_movie else { return };
        if self.movies_load.is_pending() {
            return;
        }
        self.pending_movie = None;
        match self.movies.find(id).cloned() {
            Some(movie) => self.open_item(movie),
            None => self.log(&format!("[WARN] Movie {} not found in catalog", id)),
        }
    }

    /// Deep link for what is on screen right now
    fn current_link(&self) -> DeepLink {
        match self.current_tab {
            Tab::Movies => DeepLink {
                movie: self.selected_movie.as_ref().map(|m| m.id),
                ..DeepLink::default()
            },
            Tab::Series => self.navigator.as_ref().map(|n| n.deep_link()).unwrap_or_default(),
            Tab::Search if !self.search_session.query().is_empty() => DeepLink {
                q: Some(self.search_session.query().to_string()),
                filter: self.search_filter,
                t: Some(self.search_session.latest_token()),
                ..DeepLink::default()
            },
            _ => DeepLink::default(),
        }
    }

    fn process_tasks(&mut self) {
        while let Ok(result) = self.task_receiver.try_recv() {
            match result {
                TaskResult::CatalogLoaded { kind, request, window } => {
                    let current = match kind {
                        ContentKind::Movie => self.movies_load.accept(request),
                        ContentKind::Series => self.series_load.accept(request),
                    };
                    if !current {
                        continue;
                    }
                    self.log(&format!("[INFO] Loaded {} {} entries", window.len(), kind));
                    let home = CatalogWindow::new(window.all().to_vec(), self.config.home_page_size);
                    match kind {
                        ContentKind::Movie => {
                            self.featured = window.featured(&mut rand::thread_rng()).cloned();
                            self.home_movies = home;
                            self.movies = window;
                            self.resolve_pending_movie();
                        }
                        ContentKind::Series => {
                            self.home_series = home;
                            self.series = window;
                        }
                    }
                    if !self.movies_load.is_pending() && !self.series_load.is_pending() {
                        self.status_message = format!(
                            "{} movies, {} series",
                            self.movies.len(),
                            self.series.len()
                        );
                    }
                }
                TaskResult::MoviePageReady => self.movies.complete_load_more(),
                TaskResult::SearchFinished { ticket, outcome } => {
                    if !self.search_session.commit(&ticket) {
                        continue;
                    }
                    self.search_failures.clear();
                    for (kind, err) in &outcome.failures {
                        self.search_failures.push(format!("{} catalog unavailable: {}", kind.label(), err));
                    }
                    for failure in self.search_failures.clone() {
                        self.log(&format!("[WARN] {}", failure));
                    }
                    self.log(&format!(
                        "[INFO] '{}': {} results",
                        ticket.query,
                        outcome.results.len()
                    ));
                    self.search_results = outcome.results;
                }
                TaskResult::SeriesLoaded { request, series_id, detail, season, episode } => {
                    if !self.episodes_load.accept(request) {
                        continue;
                    }
                    let payload = match detail {
                        Ok(detail) => {
                            // Header from the detail response when the list never had this series
                            if let Some(info) = detail.info {
                                if self.series.find(series_id).is_none() {
                                    self.selected_series = Some(info);
                                }
                            }
                            detail.episodes
                        }
                        Err(e) => {
                            self.log(&format!("[ERROR] Series {}: {}", series_id, e));
                            EpisodesPayload::Unrecognized
                        }
                    };
                    let nav = SeriesNavigator::open(series_id, &payload, season, episode.as_deref());
                    self.log(&format!(
                        "[INFO] Series {}: {} episodes, {} seasons",
                        series_id,
                        nav.episodes().len(),
                        nav.seasons().len()
                    ));
                    let to_play = match (&self.selected_series, nav.selected_episode()) {
                        (Some(series), Some(ep)) => Some(PlayableItem::episode(series, ep)),
                        _ => None,
                    };
                    self.navigator = Some(nav);
                    if let Some(item) = to_play {
                        self.play(item);
                    }
                }
                TaskResult::Engine { generation, event } => {
                    self.playback.on_engine_event(generation, event);
                    match event {
                        EngineEvent::Ready => {
                            if let PlaybackState::Playing(item) = self.playback.state() {
                                let message = match item.episode_ref() {
                                    Some(ep) => format!(
                                        "[PLAY] Playing {} ({}, source {})",
                                        item.name, ep.title, ep.container_extension
                                    ),
                                    None => format!("[PLAY] Playing {}", item.name),
                                };
                                self.log(&message);
                            }
                        }
                        EngineEvent::Error(_) => self.report_playback_failure(),
                    }
                }
            }
        }
    }

    fn show_home_tab(&mut self, ui: &mut egui::Ui) {
        let mut clicked: Option<CatalogItem> = None;

        if let Some(featured) = &self.featured {
            egui::Frame::group(ui.style()).show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.label(egui::RichText::new("Featured").weak());
                ui.heading(&featured.name);
                if let Some(genre) = &featured.genre {
                    ui.label(genre);
                }
                if let Some(plot) = &featured.plot {
                    ui.label(truncate(plot, 300));
                }
                if ui.button("▶ Play").clicked() {
                    clicked = Some(featured.clone());
                }
            });
            ui.add_space(10.0);
        }

        ui.heading("Movies");
        if self.movies_load.is_pending() {
            ui.spinner();
        } else if self.home_movies.is_empty() {
            ui.label(egui::RichText::new("No movies found").weak());
        }
        if let Some(item) = card_grid(ui, self.home_movies.displayed()) {
            clicked = Some(item);
        }
        if !self.home_movies.is_exhausted() && ui.button("Load more").clicked() {
            self.home_movies.load_more();
        }

        ui.add_space(10.0);
        ui.horizontal(|ui| {
            ui.heading("Series");
            if ui.link("View all").clicked() {
                self.current_tab = Tab::Series;
            }
        });
        if self.series_load.is_pending() {
            ui.spinner();
        } else if self.home_series.is_empty() {
            ui.label(egui::RichText::new("No series found").weak());
        }
        if let Some(item) = card_grid(ui, self.home_series.displayed()) {
            clicked = Some(item);
        }

        if let Some(item) = clicked {
            self.open_item(item);
        }
    }

    fn show_movies_tab(&mut self, ui: &mut egui::Ui) {
        if let Some(movie) = self.selected_movie.clone() {
            let mut back = false;
            let mut replay = false;
            egui::Frame::group(ui.style()).show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.horizontal(|ui| {
                    if ui.button("⬅ Back").clicked() {
                        back = true;
                    }
                    ui.heading(&movie.name);
                });
                ui.horizontal(|ui| {
                    if let Some(genre) = &movie.genre {
                        ui.label(genre);
                    }
                    if let Some(rating) = &movie.rating {
                        ui.label(format!("★ {}", rating));
                    }
                });
                if let Some(plot) = &movie.plot {
                    ui.label(plot);
                }
                if ui.button("▶ Play").clicked() {
                    replay = true;
                }
            });
            if back {
                self.selected_movie = None;
            }
            if replay {
                self.play(PlayableItem::movie(&movie));
            }
            ui.add_space(6.0);
        }

        self.show_catalog_grid(ui, ContentKind::Movie);
    }

    fn show_series_tab(&mut self, ui: &mut egui::Ui) {
        if self.selected_series.is_none() {
            self.show_catalog_grid(ui, ContentKind::Series);
            return;
        }

        let mut back = false;
        let mut clicked_season: Option<i32> = None;
        let mut clicked_episode: Option<String> = None;

        if let Some(series) = &self.selected_series {
            ui.horizontal(|ui| {
                if ui.button("⬅ Back").clicked() {
                    back = true;
                }
                ui.heading(&series.name);
            });
            ui.horizontal(|ui| {
                if let Some(genre) = &series.genre {
                    ui.label(genre);
                }
                if let Some(rating) = &series.rating {
                    ui.label(format!("★ {}", rating));
                }
            });
            if let Some(plot) = &series.plot {
                ui.label(plot);
            }
            ui.separator();
        }

        if self.episodes_load.is_pending() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading episodes...");
            });
        } else if let Some(nav) = &self.navigator {
            if nav.episodes().is_empty() {
                ui.label(egui::RichText::new("No episodes available").weak());
            } else {
                ui.horizontal_wrapped(|ui| {
                    for season in nav.seasons() {
                        let selected = *season == nav.selected_season();
                        if ui.selectable_label(selected, format!("Season {}", season)).clicked() {
                            clicked_season = Some(*season);
                        }
                    }
                });
                ui.separator();

                let current = nav.selected_episode().map(|ep| ep.id.clone());
                egui::ScrollArea::vertical()
                    .id_salt("episodes_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        for ep in nav.season_episodes() {
                            ui.horizontal(|ui| {
                                if ui.button("▶").clicked() {
                                    clicked_episode = Some(ep.id.clone());
                                }
                                let text = format!("E{}: {}", ep.episode_num, ep.title);
                                let is_current = current.as_deref() == Some(ep.id.as_str());
                                ui.label(if is_current {
                                    egui::RichText::new(text).strong()
                                } else {
                                    egui::RichText::new(text)
                                });
                                ui.label(
                                    egui::RichText::new(&ep.container_extension).small().weak(),
                                );
                            });
                            if let Some(plot) = &ep.plot {
                                ui.label(egui::RichText::new(truncate(plot, 160)).small().weak());
                            }
                        }
                    });
            }
        }

        if back {
            if let Some(nav) = &self.navigator {
                let message = format!("[INFO] Leaving series {}", nav.series_id());
                self.log(&message);
            }
            self.close_player();
            self.episodes_load.cancel();
            self.selected_series = None;
            self.navigator = None;
            return;
        }
        if let Some(season) = clicked_season {
            if let Some(nav) = self.navigator.as_mut() {
                nav.select_season(season);
            }
        }
        if let Some(id) = clicked_episode {
            let mut item = None;
            if let (Some(series), Some(nav)) = (&self.selected_series, self.navigator.as_mut()) {
                if nav.select_episode(&id) {
                    item = nav.selected_episode().map(|ep| PlayableItem::episode(series, ep));
                }
            }
            if let Some(item) = item {
                self.play(item);
            }
        }
    }

    /// Dedicated movie or series view with scroll-triggered paging
    fn show_catalog_grid(&mut self, ui: &mut egui::Ui, kind: ContentKind) {
        let (window, loading) = match kind {
            ContentKind::Movie => (&self.movies, self.movies_load.is_pending()),
            ContentKind::Series => (&self.series, self.series_load.is_pending()),
        };

        ui.horizontal(|ui| {
            ui.heading(match kind {
                ContentKind::Movie => "Movies",
                ContentKind::Series => "Series",
            });
            ui.label(format!("{} of {}", window.displayed_len(), window.len()));
        });

        if loading {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading...");
            });
            return;
        }
        if window.is_empty() {
            ui.label(egui::RichText::new(format!("No {} found", kind.label().to_lowercase())).weak());
            return;
        }

        let output = egui::ScrollArea::vertical()
            .id_salt(("catalog_scroll", kind.as_str()))
            .auto_shrink([false, false])
            .show(ui, |ui| {
                let clicked = card_grid(ui, window.displayed());
                if window.is_pending() {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Loading more...");
                    });
                }
                clicked
            });

        let viewport_bottom = output.state.offset.y + output.inner_rect.height();
        let near_end = should_load_more(viewport_bottom, output.content_size.y, SCROLL_THRESHOLD);

        if let Some(item) = output.inner {
            self.open_item(item);
        }
        if near_end {
            self.load_more(kind);
        }
    }

    fn show_search_tab(&mut self, ui: &mut egui::Ui) {
        let mut submit = false;
        let mut refresh = false;
        ui.horizontal(|ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.search_input)
                    .hint_text("Search movies and series")
                    .desired_width(360.0),
            );
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                submit = true;
            }
            if ui.button("🔍 Search").clicked() {
                submit = true;
            }
            if !self.search_session.query().is_empty()
                && ui.button("⟳").on_hover_text("Search again").clicked()
            {
                refresh = true;
            }
            if self.search_session.is_searching() {
                ui.spinner();
            }
        });
        if submit {
            self.start_search();
        } else if refresh {
            if let Some(ticket) = self.search_session.retrigger() {
                self.run_search(ticket);
            }
        }

        if self.search_session.query().is_empty() {
            ui.add_space(20.0);
            ui.label(egui::RichText::new("Type a title and press Enter").weak());
            return;
        }

        ui.horizontal(|ui| {
            let movies = self.search_results.count(ContentKind::Movie);
            let series = self.search_results.count(ContentKind::Series);
            for (filter, label) in [
                (SearchFilter::All, format!("All ({})", self.search_results.all().len())),
                (SearchFilter::Movie, format!("Movies ({})", movies)),
                (SearchFilter::Series, format!("Series ({})", series)),
            ] {
                if ui.selectable_label(self.search_filter == filter, label).clicked() {
                    self.search_filter = filter;
                }
            }
        });
        for failure in &self.search_failures {
            ui.label(egui::RichText::new(failure).color(egui::Color32::YELLOW));
        }
        ui.separator();

        if self.search_results.is_empty() {
            if !self.search_session.is_searching() {
                ui.label(format!("No results for '{}'", self.search_session.query()));
            }
            return;
        }

        let mut clicked: Option<CatalogItem> = None;
        let mut see_all: Option<SearchFilter> = None;
        let results = &self.search_results;
        let filter = self.search_filter;

        egui::ScrollArea::vertical()
            .id_salt("search_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                if filter == SearchFilter::All {
                    for (kind, section_filter, title) in [
                        (ContentKind::Movie, SearchFilter::Movie, "Movies"),
                        (ContentKind::Series, SearchFilter::Series, "Series"),
                    ] {
                        let total = results.count(kind);
                        if total == 0 {
                            continue;
                        }
                        ui.horizontal(|ui| {
                            ui.heading(title);
                            if total > SECTION_PREVIEW && ui.link(format!("See all ({})", total)).clicked() {
                                see_all = Some(section_filter);
                            }
                        });
                        let preview = results.visible(section_filter).take(SECTION_PREVIEW);
                        if let Some(item) = card_grid(ui, preview) {
                            clicked = Some(item);
                        }
                        ui.add_space(8.0);
                    }
                } else if let Some(item) = card_grid(ui, results.visible(filter)) {
                    clicked = Some(item);
                }
            });

        if let Some(filter) = see_all {
            self.search_filter = filter;
        }
        if let Some(item) = clicked {
            self.open_item(item);
        }
    }

    fn show_console_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Console Log");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("🗑 Clear").clicked() {
                    self.console_log.clear();
                    self.console_log.push(format!("[{}] Console cleared", timestamp_now()));
                }
            });
        });
        ui.separator();

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.console_log {
                    let color = if line.contains("[ERROR]") {
                        egui::Color32::RED
                    } else if line.contains("[WARN]") {
                        egui::Color32::YELLOW
                    } else if line.contains("[INFO]") {
                        egui::Color32::LIGHT_BLUE
                    } else if line.contains("[PLAY]") {
                        egui::Color32::GREEN
                    } else {
                        egui::Color32::GRAY
                    };
                    ui.label(egui::RichText::new(line).monospace().color(color));
                }
            });
    }

    fn show_player_panel(&mut self, ui: &mut egui::Ui) {
        let mut retry = false;
        let mut close = false;

        ui.horizontal(|ui| {
            match self.playback.state() {
                PlaybackState::Idle => {}
                PlaybackState::Attaching(item) => {
                    ui.spinner();
                    ui.label(format!("Opening {}...", item.name));
                }
                PlaybackState::Playing(item) => {
                    ui.label(egui::RichText::new("▶").color(egui::Color32::GREEN));
                    ui.label(egui::RichText::new(&item.name).strong());
                    ui.label(egui::RichText::new("playing in external player").weak());
                }
                PlaybackState::Failed { item, error, code } => {
                    ui.label(egui::RichText::new(&item.name).strong());
                    ui.label(egui::RichText::new(error.hint()).color(egui::Color32::RED));
                    ui.label(egui::RichText::new(format!("(code {})", code)).small().weak());
                    if ui.button("⟳ Retry").clicked() {
                        retry = true;
                    }
                }
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("✖ Close").clicked() {
                    close = true;
                }
            });
        });

        if retry {
            self.log("[PLAY] Retrying");
            self.playback.engine_mut().set_settings(self.config.player_settings());
            self.playback.retry();
            self.report_playback_failure();
        }
        if close {
            self.close_player();
        }
    }
}

impl eframe::App for VodApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Process background task results (non-blocking)
        self.process_tasks();

        if self.config.dark_mode {
            ctx.set_visuals(egui::Visuals::dark());
        } else {
            ctx.set_visuals(egui::Visuals::light());
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.add_space(5.0);

            let mut login = false;
            let mut save = false;
            ui.horizontal(|ui| {
                ui.label("Server:");
                ui.add(egui::TextEdit::singleline(&mut self.server)
                    .hint_text("http://host:port")
                    .desired_width(220.0));
                ui.label("User:");
                ui.add(egui::TextEdit::singleline(&mut self.username).desired_width(120.0));
                ui.label("Pass:");
                ui.add(egui::TextEdit::singleline(&mut self.password)
                    .password(true)
                    .desired_width(120.0));
                if ui.button("🔑 Login").clicked() {
                    login = true;
                }

                ui.separator();
                ui.checkbox(&mut self.config.dark_mode, "🌙 Dark");
                ui.checkbox(&mut self.config.auto_login, "Auto-login");
                if ui.button("💾 Save").on_hover_text("Save current settings").clicked() {
                    save = true;
                }
            });

            ui.horizontal(|ui| {
                ui.label("🎬 Player:");
                ui.add(egui::TextEdit::singleline(&mut self.config.external_player)
                    .hint_text("mpv, vlc, ffplay...")
                    .desired_width(180.0))
                    .on_hover_text("Media player command or path\n\nLeave empty for ffplay (default)");

                ui.label("Connection:");
                egui::ComboBox::from_id_salt("connection_quality")
                    .selected_text(format!("{:?}", self.config.connection_quality))
                    .show_ui(ui, |ui| {
                        for quality in [
                            ConnectionQuality::Fast,
                            ConnectionQuality::Normal,
                            ConnectionQuality::Slow,
                            ConnectionQuality::VerySlow,
                            ConnectionQuality::Custom,
                        ] {
                            ui.selectable_value(&mut self.config.connection_quality, quality, format!("{:?}", quality));
                        }
                    });
                if self.config.connection_quality == ConnectionQuality::Custom {
                    ui.add(egui::DragValue::new(&mut self.config.buffer_seconds).range(1..=120).suffix("s"));
                }

                ui.label("User agent:");
                let current = USER_AGENTS
                    .iter()
                    .find(|(_, ua)| *ua == self.config.user_agent)
                    .map(|(name, _)| *name)
                    .unwrap_or("Custom");
                egui::ComboBox::from_id_salt("user_agent")
                    .selected_text(current)
                    .show_ui(ui, |ui| {
                        for (name, ua) in USER_AGENTS {
                            ui.selectable_value(&mut self.config.user_agent, ua.to_string(), *name);
                        }
                    });
                ui.checkbox(&mut self.config.pass_user_agent_to_player, "Pass UA to player");
            });

            let mut open_link = false;
            ui.horizontal(|ui| {
                for (tab, label) in [
                    (Tab::Home, "🏠 Home"),
                    (Tab::Movies, "🎬 Movies"),
                    (Tab::Series, "📺 Series"),
                    (Tab::Search, "🔍 Search"),
                    (Tab::Console, "Console"),
                ] {
                    if ui.selectable_label(self.current_tab == tab, label).clicked() {
                        self.current_tab = tab;
                    }
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Open").clicked() {
                        open_link = true;
                    }
                    ui.add(egui::TextEdit::singleline(&mut self.link_input)
                        .hint_text("?series=42&season=2")
                        .desired_width(220.0));
                    ui.label("🔗");
                });
            });
            ui.add_space(5.0);

            if login {
                self.login();
            }
            if save {
                self.save_current_state();
            }
            if open_link {
                let link = DeepLink::parse(&self.link_input);
                if link.is_empty() {
                    self.status_message = "Nothing to open in that link".to_string();
                } else {
                    self.log(&format!("[INFO] Opening link {}", link.to_query()));
                    self.apply_link(link);
                }
            }
        });

        // Bottom panel - Status
        egui::TopBottomPanel::bottom("bottom_panel").show(ctx, |ui| {
            let link = self.current_link().to_query();
            ui.horizontal(|ui| {
                if self.is_loading() {
                    ui.spinner();
                }
                ui.label(&self.status_message);
                if !link.is_empty() {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("📋").on_hover_text("Copy link").clicked() {
                            ui.ctx().copy_text(format!("?{}", link));
                        }
                        ui.label(egui::RichText::new(format!("?{}", link)).monospace().weak());
                    });
                }
            });
        });

        if !self.playback.state().is_idle() {
            egui::TopBottomPanel::bottom("player_panel").show(ctx, |ui| {
                ui.add_space(4.0);
                self.show_player_panel(ui);
                ui.add_space(4.0);
            });
        }

        // Main content
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.client.is_none() && self.current_tab != Tab::Console {
                ui.vertical_centered(|ui| {
                    ui.add_space(100.0);
                    ui.heading("📺 Xtream VOD");
                    ui.add_space(20.0);
                    ui.label("Enter your server, username and password above, then log in.");
                });
                return;
            }

            match self.current_tab {
                Tab::Home => {
                    egui::ScrollArea::vertical()
                        .id_salt("home_scroll")
                        .auto_shrink([false, false])
                        .show(ui, |ui| self.show_home_tab(ui));
                }
                Tab::Movies => self.show_movies_tab(ui),
                Tab::Series => self.show_series_tab(ui),
                Tab::Search => self.show_search_tab(ui),
                Tab::Console => self.show_console_tab(ui),
            }
        });

        // Keep polling while work is in flight or a player is running
        if self.is_loading() || self.movies.is_pending() || self.playback.has_instance() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
