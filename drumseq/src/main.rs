use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use crossterm::terminal;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use drumseq::audio;
use drumseq::config::{self, DRUMSEQ_DIR, EngineConfig};
use drumseq::loader::sample_loader;
use drumseq::middle::Middle;
use drumseq::shared::InputEvent;
use drumseq::song::Song;
use drumseq::song::persistence::{self, PersistenceError, SONG_EXTENSION};
use drumseq::tui;

const LOG_FILE: &str = "drumseq.log";

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    init_logging(&project_dir)?;
    log::info!("drumseq starting in {}", project_dir.display());

    let config = config::load_config(&project_dir);
    let engine_config = EngineConfig {
        sample_rate: audio::negotiate_sample_rate(&config),
        ..config.clone()
    };
    let song = open_song(&project_dir, engine_config.sample_rate);
    let (mut middle, engine, events) = Middle::for_song(engine_config.clone(), song);

    // a dead audio device is reported, not fatal; the editor still works
    let audio = match audio::start_audio(engine, &engine_config, middle.failure_reporter()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            middle.report_driver_error(e);
            None
        }
    };

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = Duration::from_millis(50);
    let mut tui_state = tui::mode::TuiState::default();

    'running: loop {
        events.dispatch_pending(&mut tui_state);
        let ds = middle.display_state();
        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &tui_state);
        })?;

        for input in tui::input::poll_input(tick_rate)? {
            match input {
                InputEvent::Quit => break 'running,
                InputEvent::Save => save(&mut middle, &project_dir),
                InputEvent::Export => export(&mut middle, &project_dir),
                other => {
                    middle.set_status("");
                    middle.handle_input(other);
                }
            }
        }
    }

    drop(term);
    drop(audio);
    if middle.with_song(|s| s.is_modified()) {
        save(&mut middle, &project_dir);
    }
    // the rate the device forced on us is not a setting
    let saved = EngineConfig {
        sample_rate: config.sample_rate,
        ..middle.config().clone()
    };
    if let Err(e) = config::save_config(&project_dir, &saved) {
        log::warn!("could not save config: {e:#}");
    }
    if events.dropped() > 0 {
        log::warn!("{} events were dropped on a full queue", events.dropped());
    }
    log::info!(
        "drumseq exiting, {} xruns, {} contended buffers",
        middle.stats().xruns(),
        middle.stats().contended_buffers()
    );
    Ok(())
}

// the terminal belongs to the ui, so the log goes to a file
fn init_logging(project_dir: &Path) -> anyhow::Result<()> {
    let dir = project_dir.join(DRUMSEQ_DIR);
    std::fs::create_dir_all(&dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let file = std::fs::File::create(&path).with_context(|| format!("cannot create {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

// newest song file in the project, else a kit built from its wavs
fn open_song(project_dir: &Path, sample_rate: u32) -> Song {
    if let Some(path) = newest_song_file(project_dir) {
        match persistence::load_song(&path, sample_rate) {
            Ok(song) => return song,
            Err(e) => log::warn!("{e}"),
        }
    }
    let kit = sample_loader::kit_from_dir(project_dir, sample_rate).unwrap_or_else(|e| {
        log::warn!("{e:#}");
        Vec::new()
    });
    log::info!("new song with {} instruments from {}", kit.len(), project_dir.display());
    let name = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("Untitled Song"));
    Song::with_instruments(name, kit)
}

fn newest_song_file(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == SONG_EXTENSION))
        .filter_map(|e| Some((e.metadata().ok()?.modified().ok()?, e.path())))
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

fn default_song_path(middle: &Middle, project_dir: &Path) -> PathBuf {
    let name = middle.with_song(|s| s.name.clone());
    project_dir.join(format!("{name}.{SONG_EXTENSION}"))
}

fn save(middle: &mut Middle, project_dir: &Path) {
    let result = match middle.save_song() {
        Err(PersistenceError::NoFilename) => {
            let path = default_song_path(middle, project_dir);
            middle.save_song_as(&path).map(|()| path)
        }
        other => other,
    };
    match result {
        Ok(path) => middle.set_status(format!("saved {}", path.display())),
        Err(e) => {
            log::error!("save failed: {e}");
            middle.set_status(format!("save failed: {e}"));
        }
    }
}

fn export(middle: &mut Middle, project_dir: &Path) {
    let path = default_song_path(middle, project_dir).with_extension("wav");
    match middle.export_wav(&path) {
        Ok(frames) => middle.set_status(format!("exported {frames} frames to {}", path.display())),
        Err(e) => {
            log::error!("export failed: {e:#}");
            middle.set_status(format!("export failed: {e:#}"));
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
