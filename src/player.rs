//! External media player process as a playback engine

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::PlaybackError;
use crate::playback::{AttachRequest, EngineEvent, EngineInstance, EventSink, PlaybackEngine};

/// Lines kept from the player output for classifying a failed exit
const OUTPUT_TAIL: usize = 50;
const EXIT_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    Ffplay,
    Mpv,
    Vlc,
    Generic,
}

impl PlayerKind {
    pub fn detect(command: &str) -> Self {
        let lower = command.to_lowercase();
        if lower.contains("ffplay") {
            PlayerKind::Ffplay
        } else if lower.contains("mpv") {
            PlayerKind::Mpv
        } else if lower.contains("vlc") {
            PlayerKind::Vlc
        } else {
            PlayerKind::Generic
        }
    }

    /// Whether this player prints stream metadata we can treat as "ready"
    fn reports_metadata(&self) -> bool {
        matches!(self, PlayerKind::Ffplay | PlayerKind::Mpv)
    }
}

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub command: String,
    pub user_agent: String,
    pub pass_user_agent: bool,
    pub buffer_seconds: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            command: "ffplay".to_string(),
            user_agent: String::new(),
            pass_user_agent: true,
            buffer_seconds: 5,
        }
    }
}

/// Command line for `kind` playing `request`
pub fn player_args(kind: PlayerKind, request: &AttachRequest, settings: &PlayerSettings) -> Vec<String> {
    let url = request.source.url.clone();
    let stream_name = url.rsplit('/').next().unwrap_or("stream");
    let title = format!("{} - {}", request.title, stream_name);
    let buffer_ms = settings.buffer_seconds * 1000;
    let pass_ua = settings.pass_user_agent && !settings.user_agent.is_empty();

    match kind {
        PlayerKind::Ffplay => {
            let mut args = vec![
                url.clone(),
                "-autoexit".to_string(),
                "-window_title".to_string(),
                title,
                "-sync".to_string(),
                "audio".to_string(),
                "-framedrop".to_string(),
            ];
            if url.starts_with("http") {
                args.extend([
                    "-reconnect".to_string(), "1".to_string(),
                    "-reconnect_streamed".to_string(), "1".to_string(),
                    "-reconnect_delay_max".to_string(), "10".to_string(),
                ]);
            }
            if pass_ua {
                args.extend(["-user_agent".to_string(), settings.user_agent.clone()]);
            }
            args
        }
        PlayerKind::Mpv => {
            let (w, h) = request.aspect_ratio;
            let speeds: Vec<String> = request.playback_rates.iter().map(|r| r.to_string()).collect();
            let mut args = vec![
                url,
                format!("--title={}", title),
                "--force-window=immediate".to_string(),
                "--keepaspect=yes".to_string(),
                format!("--geometry={}x{}", w * 80, h * 80),
                "--cache=yes".to_string(),
                format!("--cache-secs={}", settings.buffer_seconds * 2),
                "--network-timeout=60".to_string(),
                "--stream-lavf-o=reconnect=1".to_string(),
                "--stream-lavf-o=reconnect_streamed=1".to_string(),
                format!("--script-opts=speeds={}", speeds.join(",")),
                "--ytdl=no".to_string(),
            ];
            if pass_ua {
                args.push(format!("--user-agent={}", settings.user_agent));
            }
            args
        }
        PlayerKind::Vlc => {
            let mut args = vec![
                url,
                format!("--meta-title={}", title),
                format!("--network-caching={}", buffer_ms * 2),
                "--http-reconnect".to_string(),
                "--aspect-ratio".to_string(),
                format!("{}:{}", request.aspect_ratio.0, request.aspect_ratio.1),
            ];
            if pass_ua {
                args.push(format!("--http-user-agent={}", settings.user_agent));
            }
            args
        }
        PlayerKind::Generic => vec![url],
    }
}

/// First output line showing the stream was opened and probed
pub fn is_ready_line(line: &str) -> bool {
    line.contains("Stream #") || line.contains("Duration:") || line.contains("(+) Video")
}

/// Map the tail of a failed player's output to a playback error code
pub fn classify_failure(lines: &[String]) -> u16 {
    let text = lines.join("\n").to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if has(&["server returned 4", "server returned 5", "http error 4", "http error 5", "403 forbidden", "404 not found", "503 service"]) {
        4
    } else if has(&["connection refused", "timed out", "network is unreachable", "failed to resolve", "name or service not known", "connection reset"]) {
        2
    } else if has(&["decrypt", "encrypted", "drm"]) {
        5
    } else if has(&["invalid data found", "corrupt", "error while decoding"]) {
        3
    } else if has(&["unknown format", "not supported", "unsupported", "no decoder", "protocol not found"]) {
        1
    } else {
        0
    }
}

pub struct ExternalPlayer {
    settings: PlayerSettings,
}

impl ExternalPlayer {
    pub fn new(settings: PlayerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: PlayerSettings) {
        self.settings = settings;
    }
}

/// A running player process
pub struct PlayerProcess {
    child: Arc<Mutex<Child>>,
    disposed: Arc<AtomicBool>,
    pid: u32,
}

impl PlaybackEngine for ExternalPlayer {
    type Instance = PlayerProcess;

    fn attach(&mut self, request: &AttachRequest, events: EventSink) -> Result<PlayerProcess, PlaybackError> {
        let player = resolve_player_path(&self.settings.command);
        let kind = PlayerKind::detect(&player);

        let mut cmd = Command::new(&player);
        cmd.args(player_args(kind, request, &self.settings));

        // On Windows, hide the console window for ffplay
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            if kind == PlayerKind::Ffplay {
                cmd.creation_flags(CREATE_NO_WINDOW);
            }
        }

        if !self.settings.user_agent.is_empty() {
            cmd.env("USER_AGENT", &self.settings.user_agent);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| PlaybackError::Spawn {
            player: player.clone(),
            source,
        })?;
        let pid = child.id();
        log::info!("[PLAY] {} launched (PID: {})", player, pid);

        let disposed = Arc::new(AtomicBool::new(false));
        let ready = Arc::new(AtomicBool::new(false));
        let tail = Arc::new(Mutex::new(Vec::new()));

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, kind, Arc::clone(&ready), Arc::clone(&tail), Arc::clone(&events)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, kind, Arc::clone(&ready), Arc::clone(&tail), Arc::clone(&events)));
        }
        if !kind.reports_metadata() && !ready.swap(true, Ordering::SeqCst) {
            events(EngineEvent::Ready);
        }

        let child = Arc::new(Mutex::new(child));
        spawn_exit_monitor(ExitWatch {
            child: Arc::clone(&child),
            disposed: Arc::clone(&disposed),
            ready,
            tail,
            readers,
            events,
        });

        Ok(PlayerProcess { child, disposed, pid })
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: R,
    kind: PlayerKind,
    ready: Arc<AtomicBool>,
    tail: Arc<Mutex<Vec<String>>>,
    events: EventSink,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(Result::ok) {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            log::debug!("[PLAYER] {}", line);
            if kind.reports_metadata() && is_ready_line(&line) && !ready.swap(true, Ordering::SeqCst) {
                events(EngineEvent::Ready);
            }
            if let Ok(mut tail) = tail.lock() {
                if tail.len() >= OUTPUT_TAIL {
                    tail.remove(0);
                }
                tail.push(line);
            }
        }
    })
}

/// Error code for a player that has exited, or `None` for a clean finish.
/// ffplay exits 0 when it cannot open its input, so leaving before the
/// stream was ever ready counts as a failure, as does any failure line in
/// the output.
pub fn exit_failure(success: bool, ready: bool, lines: &[String]) -> Option<u16> {
    let code = classify_failure(lines);
    if !success || !ready || code != 0 {
        Some(code)
    } else {
        None
    }
}

/// Everything the exit monitor needs from a launched player
struct ExitWatch {
    child: Arc<Mutex<Child>>,
    disposed: Arc<AtomicBool>,
    ready: Arc<AtomicBool>,
    tail: Arc<Mutex<Vec<String>>>,
    readers: Vec<JoinHandle<()>>,
    events: EventSink,
}

fn spawn_exit_monitor(watch: ExitWatch) {
    thread::spawn(move || loop {
        if watch.disposed.load(Ordering::SeqCst) {
            return;
        }
        let status = match watch.child.lock() {
            Ok(mut child) => child.try_wait(),
            Err(_) => return,
        };
        match status {
            Ok(Some(status)) => {
                // Output must be fully read before it is classified
                for reader in watch.readers {
                    let _ = reader.join();
                }
                if watch.disposed.load(Ordering::SeqCst) {
                    return;
                }
                let lines = watch.tail.lock().map(|t| t.clone()).unwrap_or_default();
                let ready = watch.ready.load(Ordering::SeqCst);
                match exit_failure(status.success(), ready, &lines) {
                    Some(code) => {
                        log::warn!("[PLAY] player exited with {} (error code {})", status, code);
                        (watch.events)(EngineEvent::Error(code));
                    }
                    None => log::info!("[PLAY] player finished"),
                }
                return;
            }
            Ok(None) => thread::sleep(EXIT_POLL),
            Err(e) => {
                log::warn!("[PLAY] failed to wait for player: {}", e);
                return;
            }
        }
    });
}

impl EngineInstance for PlayerProcess {
    fn dispose(&mut self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait(); // Reap the process
        }
        log::info!("[PLAY] player (PID: {}) closed", self.pid);
    }
}

impl Drop for PlayerProcess {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Auto-detect common player install paths on Windows
fn resolve_player_path(player: &str) -> String {
    let player = if player.trim().is_empty() { "ffplay" } else { player.trim() };

    #[cfg(target_os = "windows")]
    {
        let lower = player.to_lowercase();
        let candidates: &[&str] = match lower.as_str() {
            "vlc" | "vlc.exe" => &[
                r"C:\Program Files\VideoLAN\VLC\vlc.exe",
                r"C:\Program Files (x86)\VideoLAN\VLC\vlc.exe",
            ],
            "mpv" | "mpv.exe" => &[
                r"C:\Program Files\mpv\mpv.exe",
                r"C:\Program Files (x86)\mpv\mpv.exe",
                r"C:\mpv\mpv.exe",
            ],
            "ffplay" | "ffplay.exe" => &[
                r"C:\ffmpeg\bin\ffplay.exe",
                r"C:\Program Files\ffmpeg\bin\ffplay.exe",
            ],
            _ => &[],
        };
        if let Some(found) = candidates.iter().find(|p| std::path::Path::new(p).exists()) {
            return found.to_string();
        }
    }

    player.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::StreamSource;

    fn request(url: &str) -> AttachRequest {
        AttachRequest {
            source: StreamSource { url: url.to_string(), mime: "video/mp4" },
            title: "Heat".to_string(),
            poster: None,
            playback_rates: vec![0.5, 1.0, 1.5, 2.0],
            aspect_ratio: (16, 9),
        }
    }

    fn settings(command: &str) -> PlayerSettings {
        PlayerSettings {
            command: command.to_string(),
            user_agent: "VLC/3.0.16 LibVLC/3.0.16".to_string(),
            pass_user_agent: true,
            buffer_seconds: 5,
        }
    }

    #[test]
    fn test_detect_player_kind() {
        assert_eq!(PlayerKind::detect("/usr/bin/ffplay"), PlayerKind::Ffplay);
        assert_eq!(PlayerKind::detect(r"C:\Program Files\mpv\mpv.exe"), PlayerKind::Mpv);
        assert_eq!(PlayerKind::detect("VLC"), PlayerKind::Vlc);
        assert_eq!(PlayerKind::detect("celluloid"), PlayerKind::Generic);
    }

    #[test]
    fn test_ffplay_args() {
        let req = request("http://example.com/movie/u/p/101.mp4");
        let args = player_args(PlayerKind::Ffplay, &req, &settings("ffplay"));
        assert_eq!(args[0], "http://example.com/movie/u/p/101.mp4");
        assert!(args.contains(&"-autoexit".to_string()));
        assert!(args.contains(&"Heat - 101.mp4".to_string()));
        assert!(args.contains(&"-reconnect".to_string()));
        assert!(args.contains(&"VLC/3.0.16 LibVLC/3.0.16".to_string()));
    }

    #[test]
    fn test_mpv_args_keep_aspect_and_rates() {
        let req = request("http://example.com/series/u/p/E5.mp4");
        let args = player_args(PlayerKind::Mpv, &req, &settings("mpv"));
        assert!(args.contains(&"--keepaspect=yes".to_string()));
        assert!(args.contains(&"--title=Heat - E5.mp4".to_string()));
        assert!(args.contains(&"--script-opts=speeds=0.5,1,1.5,2".to_string()));
        assert!(args.contains(&"--cache-secs=10".to_string()));
    }

    #[test]
    fn test_user_agent_can_be_withheld() {
        let mut s = settings("vlc");
        s.pass_user_agent = false;
        let args = player_args(PlayerKind::Vlc, &request("http://x/1.mp4"), &s);
        assert!(!args.iter().any(|a| a.starts_with("--http-user-agent")));
        assert!(args.contains(&"16:9".to_string()));
    }

    #[test]
    fn test_generic_player_gets_only_url() {
        let args = player_args(PlayerKind::Generic, &request("http://x/1.mp4"), &settings("totem"));
        assert_eq!(args, vec!["http://x/1.mp4".to_string()]);
    }

    #[test]
    fn test_ready_lines() {
        assert!(is_ready_line("  Duration: 01:52:10.00, start: 0.000000, bitrate: 2100 kb/s"));
        assert!(is_ready_line("Stream #0:0: Video: h264 (High), yuv420p, 1920x1080"));
        assert!(is_ready_line(" (+) Video --vid=1 (h264 1920x1080 23.976fps)"));
        assert!(!is_ready_line("[tcp @ 0x55d] Starting connection attempt"));
    }

    #[test]
    fn test_classify_failure() {
        let lines = |s: &str| vec![s.to_string()];
        assert_eq!(classify_failure(&lines("http://x/1.mp4: Connection refused")), 2);
        assert_eq!(classify_failure(&lines("[tcp] Connection to tcp://x:80 failed: Connection timed out")), 2);
        assert_eq!(classify_failure(&lines("Server returned 404 Not Found")), 4);
        assert_eq!(classify_failure(&lines("Invalid data found when processing input")), 3);
        assert_eq!(classify_failure(&lines("Protocol not found")), 1);
        assert_eq!(classify_failure(&lines("Failed to decrypt segment")), 5);
        assert_eq!(classify_failure(&[]), 0);
    }

    #[test]
    fn test_exit_failure() {
        let lines = |s: &str| vec![s.to_string()];
        // ffplay exits 0 on a failed open
        assert_eq!(exit_failure(true, false, &lines("Server returned 404 Not Found")), Some(4));
        assert_eq!(exit_failure(true, false, &[]), Some(0));
        assert_eq!(exit_failure(false, true, &lines("Invalid data found when processing input")), Some(3));
        assert_eq!(exit_failure(true, true, &lines("Connection refused")), Some(2));
        assert_eq!(exit_failure(true, true, &lines("Duration: 01:52:10.00")), None);
    }

    #[cfg(unix)]
    fn fake_player(dir: &std::path::Path, script: &str) -> PlayerSettings {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffplay");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        PlayerSettings {
            command: path.to_string_lossy().into_owned(),
            ..PlayerSettings::default()
        }
    }

    #[cfg(unix)]
    fn run_until_exit(settings: PlayerSettings) -> Vec<EngineEvent> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&received);
        let sink: EventSink = Arc::new(move |event| sink_events.lock().unwrap().push(event));

        let mut player = ExternalPlayer::new(settings);
        let req = request("http://example.com/movie/u/p/101.mp4");
        // A freshly written script can briefly be busy for exec
        let mut process = None;
        for _ in 0..5 {
            match player.attach(&req, Arc::clone(&sink)) {
                Ok(p) => {
                    process = Some(p);
                    break;
                }
                Err(_) => thread::sleep(Duration::from_millis(100)),
            }
        }
        let process = process.expect("player did not start");

        for _ in 0..50 {
            if received.lock().unwrap().iter().any(|e| matches!(e, EngineEvent::Error(_))) {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
        // Let the monitor finish before disposing
        thread::sleep(Duration::from_millis(2 * EXIT_POLL.as_millis() as u64));
        drop(process);
        let events = received.lock().unwrap().clone();
        events
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_open_with_clean_exit_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = fake_player(
            dir.path(),
            "#!/bin/sh\necho 'http://x/101.mp4: Server returned 404 Not Found' >&2\nexit 0\n",
        );
        let events = run_until_exit(settings);
        assert!(events.contains(&EngineEvent::Error(4)), "events: {:?}", events);
        assert!(!events.contains(&EngineEvent::Ready));
    }

    #[cfg(unix)]
    #[test]
    fn test_finished_playback_reports_no_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = fake_player(
            dir.path(),
            "#!/bin/sh\necho '  Duration: 00:00:01.00, start: 0.000000' >&2\nexit 0\n",
        );
        let events = run_until_exit(settings);
        assert_eq!(events, vec![EngineEvent::Ready]);
    }
}
