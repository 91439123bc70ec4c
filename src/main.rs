mod audio;
mod config;
mod isolate;
mod pitch;
mod reference;
mod score;
mod session;
mod shared;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal;

use reference::AudioFile;
use score::Scorer;
use session::Session;
use shared::DisplayFrame;

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: pitchline <backing-track.wav>")?;
    let dir = path.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    let cfg = config::load(&dir);

    // the backing track plays as-is; the reference melody is built from the
    // isolated vocal stem when we have one
    let backing =
        AudioFile::load_wav(&path).with_context(|| format!("loading {}", path.display()))?;
    let vocal_path = if cfg.isolate_vocals {
        isolate::isolated_or_original(&path)
    } else {
        path.clone()
    };
    let vocal = if vocal_path == path {
        backing.clone()
    } else {
        AudioFile::load_wav(&vocal_path)
            .with_context(|| format!("loading {}", vocal_path.display()))?
    };
    let track = Arc::new(reference::build(&vocal, &cfg));
    log::info!(
        "{} reference points from {}",
        track.len(),
        vocal_path.display()
    );

    let duration = backing.duration_seconds();
    let session = Arc::new(Session::new(cfg.clone(), duration));

    let capture = audio::start_capture(session.clone())?;
    let playback = if cfg.play_backing {
        Some(audio::start_playback(session.clone(), backing)?)
    } else {
        None
    };

    // two-phase barrier: every engine measures its latency and reports in,
    // then the gate release defines the shared time zero
    let engines = 1 + usize::from(playback.is_some());
    session.wait_ready(engines, Duration::from_secs(5))?;
    session.release_start_gate();

    let mut scorer = Scorer::new(track, cfg.clone(), session.transport.duration());

    let raw = cfg.transport_keys && terminal::enable_raw_mode().is_ok();
    let _guard = raw.then_some(RawModeGuard);

    let tick = Duration::from_millis(cfg.tick_ms);
    loop {
        let frame = scorer.tick(&session);
        render_status(&session, &frame);

        if session.playback_done() {
            break; // the track ran out; end of session
        }

        if raw {
            if poll_transport_keys(tick, &session)? {
                break;
            }
        } else {
            std::thread::sleep(tick);
        }
    }

    session.request_shutdown();
    capture.join();
    drop(playback); // closing the output stream ends the playback engine
    println!();
    Ok(())
}

// The transport command surface: space toggles, s stops, arrows seek, esc/q
// quits. Doubles as the tick pacing while we wait for input.
fn poll_transport_keys(timeout: Duration, session: &Session) -> anyhow::Result<bool> {
    if !event::poll(timeout)? {
        return Ok(false);
    }
    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(false);
        }
        let step = session.config().seek_step;
        match key.code {
            KeyCode::Char(' ') => session.transport.toggle_play_pause(),
            KeyCode::Char('s') => session.transport.stop(),
            KeyCode::Left => session.transport.seek_by(-step),
            KeyCode::Right => session.transport.seek_by(step),
            KeyCode::Esc | KeyCode::Char('q') => return Ok(true),
            _ => {}
        }
    }
    Ok(false)
}

// Stand-in for the display collaborator: one status line per tick. Anything
// fancier (scatter plot, staff lines) belongs to a real frontend consuming
// the same DisplayFrame.
fn render_status(session: &Session, frame: &DisplayFrame) {
    use std::io::Write;
    let mode = match session.transport.mode() {
        transport::Mode::Playing => "playing",
        transport::Mode::Paused => "paused ",
        transport::Mode::Stopped => "stopped",
    };
    let sung = match frame.live.last() {
        Some(p) => format!("{} (err {:.2} st)", pitch::note_name(p.note), p.error),
        None => "--".into(),
    };
    let next = frame
        .reference
        .iter()
        .find(|p| p.rel_time >= 0.0)
        .map(|p| format!("{} in {:.1}s", pitch::note_name(p.note), p.rel_time))
        .unwrap_or_else(|| "--".into());
    print!(
        "\r{:>7.2}s [{}] sung: {} | next: {}      ",
        frame.now, mode, sung, next
    );
    let _ = std::io::stdout().flush();
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
