use std::io::{self, BufRead, Stdout, Write};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use teletype_core::{update, ControllerState, LinkClick, Msg};
use teletype_engine::{
    AudioEngine, Decomposer, EngineEvent, LiveDocument, Navigator, NavigatorConfig,
    NavigatorHandle, OfflineHost, OfflineOptions, OfflineRecorder, PreferenceStore,
    ReqwestFetcher, TokioClock,
};
use teletype_logging::{reveal_debug, reveal_info};

use super::commands::{self, Command, HELP};
use super::config;
use super::effects::{event_to_msg, EffectRunner};
use super::export::{self, Transcript};
use super::history::History;
use super::logging;
use super::persistence::RonPreferenceStore;
use super::render::Renderer;
use crate::cli::Args;

/// How long the loop waits for input before polling the engine again.
const POLL_INTERVAL: Duration = Duration::from_millis(15);

pub fn run_app(args: Args) -> anyhow::Result<()> {
    logging::initialize(args.log, args.verbose);
    let config = config::load(args.config.as_deref())?;

    let store = Arc::new(RonPreferenceStore::open(&args.state_dir));
    let stored_preference = store.load();

    // No sound before the first typed command, as with browser autoplay.
    let clock = TokioClock::default();
    let host = OfflineHost::new(
        Arc::new(clock.clone()),
        OfflineOptions {
            requires_gesture: true,
            ..OfflineOptions::default()
        },
    );
    let recorder = host.recorder();
    let audio = AudioEngine::new(Arc::new(host), Arc::new(clock.clone()), store, config.audio)
        .shared();

    let fetcher = ReqwestFetcher::new(config.fetch)?;
    let navigator = Navigator::new(
        Arc::new(fetcher),
        Arc::new(clock),
        audio,
        LiveDocument::default(),
        NavigatorConfig {
            timings: config.timings,
            decomposer: Decomposer::default(),
        },
    );

    let mut app = App::new(
        EffectRunner::new(NavigatorHandle::new(navigator)),
        recorder,
        io::stdout(),
    );
    if let Some(enabled) = stored_preference {
        app.dispatch(Msg::SoundPreferenceLoaded(enabled))?;
    }
    if let Some(url) = args.url {
        app.dispatch(Msg::OpenRequested { url })?;
    }
    app.renderer.message("type `help` for commands")?;
    app.run(spawn_stdin_reader())?;

    if let Some(path) = args.transcript.as_deref() {
        let written = export::write_transcript(&app.transcript, path)?;
        println!("transcript: {} events -> {}", app.transcript.len(), written.display());
    }
    if let Some(path) = args.wav.as_deref() {
        let written = export::write_wav(&app.recorder, path)?;
        println!("audio -> {}", written.display());
    }
    Ok(())
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

struct App<W: Write> {
    state: ControllerState,
    runner: EffectRunner,
    history: History,
    renderer: Renderer<W>,
    transcript: Transcript,
    recorder: OfflineRecorder,
    links: Vec<LinkClick>,
    quit: bool,
}

impl App<Stdout> {
    fn new(runner: EffectRunner, recorder: OfflineRecorder, out: Stdout) -> Self {
        Self {
            state: ControllerState::new(),
            runner,
            history: History::default(),
            renderer: Renderer::new(out),
            transcript: Transcript::default(),
            recorder,
            links: Vec::new(),
            quit: false,
        }
    }
}

impl<W: Write> App<W> {
    /// Runs until `quit`, or until input ends and all navigations settle.
    fn run(&mut self, lines: mpsc::Receiver<String>) -> anyhow::Result<()> {
        let mut input_open = true;
        while !self.quit {
            while let Some(event) = self.runner.try_recv() {
                self.on_engine_event(event)?;
            }
            if !input_open {
                if self.is_settled() {
                    break;
                }
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            match lines.recv_timeout(POLL_INTERVAL) {
                Ok(line) => self.on_line(&line)?,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => input_open = false,
            }
        }
        Ok(())
    }

    fn is_settled(&self) -> bool {
        !self.state.phase().is_busy()
            && self.state.in_flight().is_none()
            && self.runner.pending_loads() == 0
    }

    fn dispatch(&mut self, msg: Msg) -> anyhow::Result<()> {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            reveal_debug!("controller view {:?}", state.view());
        }
        self.state = state;
        self.runner
            .enqueue(effects, &mut self.history, &mut self.renderer)?;
        Ok(())
    }

    fn on_engine_event(&mut self, event: EngineEvent) -> anyhow::Result<()> {
        match &event {
            EngineEvent::Reveal { id, event } => {
                self.renderer.reveal(event)?;
                self.transcript.record(*id, event.clone());
            }
            EngineEvent::PageSnapshot(snapshot) => {
                self.links = snapshot.links.clone();
                self.renderer.snapshot(snapshot)?;
            }
            EngineEvent::PageLoaded { url, text } => {
                self.history.push(url.clone());
                self.renderer.page(url, text)?;
            }
            EngineEvent::FellBack { url, reason, .. } => {
                self.renderer
                    .message(&format!("loading {url} in full ({reason})"))?;
            }
            EngineEvent::LoadFailed { url, reason } => {
                self.renderer
                    .message(&format!("could not load {url}: {reason}"))?;
            }
            EngineEvent::LoadSuperseded { url } => {
                reveal_debug!("full load of {url} dropped for a newer navigation");
            }
            EngineEvent::Progress { .. }
            | EngineEvent::Revealed { .. }
            | EngineEvent::Cancelled { .. } => {}
        }
        if let Some(msg) = event_to_msg(&event) {
            self.dispatch(msg)?;
        }
        Ok(())
    }

    fn on_line(&mut self, line: &str) -> anyhow::Result<()> {
        let command = match commands::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(()),
            Err(err) => {
                self.renderer.message(&err.to_string())?;
                return Ok(());
            }
        };
        // Any typed command counts as the user gesture that unlocks audio.
        self.dispatch(Msg::UserGesture)?;

        match command {
            Command::Open(url) => self.dispatch(Msg::OpenRequested { url })?,
            Command::Links => self.renderer.links(&self.links)?,
            Command::Follow(n) => match self.links.get(n - 1).cloned() {
                Some(click) => self.dispatch(Msg::LinkActivated(click))?,
                None => self.renderer.message(&format!("no link {n}"))?,
            },
            Command::Back => match self.history.back() {
                Some(url) => self.dispatch(Msg::HistoryPopped { url })?,
                None => self.renderer.message("no earlier page")?,
            },
            Command::Forward => match self.history.forward() {
                Some(url) => self.dispatch(Msg::HistoryPopped { url })?,
                None => self.renderer.message("no later page")?,
            },
            Command::Sound => self.dispatch(Msg::SoundToggled)?,
            Command::Wav(path) => match export::write_wav(&self.recorder, &path) {
                Ok(written) => self
                    .renderer
                    .message(&format!("audio -> {}", written.display()))?,
                Err(err) => self.renderer.message(&format!("{err:#}"))?,
            },
            Command::Transcript(path) => match export::write_transcript(&self.transcript, &path) {
                Ok(written) => self
                    .renderer
                    .message(&format!("transcript -> {}", written.display()))?,
                Err(err) => self.renderer.message(&format!("{err:#}"))?,
            },
            Command::Help => self.renderer.message(HELP)?,
            Command::Quit => {
                reveal_info!("quit requested");
                self.quit = true;
            }
        }
        Ok(())
    }
}
