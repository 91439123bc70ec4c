// The shared playback clock. One mutex, held only for arithmetic; every
// public call is a single critical section so concurrent readers always see
// a consistent snapshot. Mutations come from the key handler in main, reads
// come from the capture worker, the output callback, and the scorer.

use std::sync::Mutex;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Stopped,
    Playing,
    Paused,
}

#[derive(Clone, Copy, Debug)]
pub struct Snapshot {
    pub now: f64,
    pub mode: Mode,
    pub generation: u64,
}

struct State {
    mode: Mode,
    // seconds of track actually played, folded in on every pause/seek
    accumulated: f64,
    // wall-clock moment playback last resumed; Some iff Playing
    last_resume: Option<Instant>,
    // seek target the playback engine hasn't applied yet
    pending_seek: Option<f64>,
    // bumped by stop()/seek_by(); live events from older generations are stale
    generation: u64,
}

impl State {
    fn position(&self, at: Instant) -> f64 {
        match self.last_resume {
            Some(resume) if self.mode == Mode::Playing => {
                self.accumulated + at.duration_since(resume).as_secs_f64()
            }
            _ => self.accumulated,
        }
    }

    fn fold_elapsed(&mut self, at: Instant) {
        if self.mode == Mode::Playing {
            if let Some(resume) = self.last_resume.take() {
                self.accumulated += at.duration_since(resume).as_secs_f64();
            }
        }
    }
}

pub struct Transport {
    state: Mutex<State>,
    duration: f64,
}

impl Transport {
    pub fn new(duration: f64) -> Self {
        Self {
            state: Mutex::new(State {
                mode: Mode::Stopped,
                accumulated: 0.0,
                last_resume: None,
                pending_seek: None,
                generation: 0,
            }),
            duration,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Called once when the start gate releases; this is time zero.
    pub fn start(&self) {
        let mut s = self.state.lock().unwrap();
        s.mode = Mode::Playing;
        s.last_resume = Some(Instant::now());
    }

    /// Current track position in seconds. Advances with wall time while
    /// Playing, frozen otherwise.
    pub fn now(&self) -> f64 {
        let s = self.state.lock().unwrap();
        s.position(Instant::now())
    }

    pub fn mode(&self) -> Mode {
        self.state.lock().unwrap().mode
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    /// Position, mode, and generation read under one lock. The capture worker
    /// uses this so an event's timestamp and generation can't straddle a seek.
    pub fn snapshot(&self) -> Snapshot {
        let s = self.state.lock().unwrap();
        Snapshot {
            now: s.position(Instant::now()),
            mode: s.mode,
            generation: s.generation,
        }
    }

    pub fn toggle_play_pause(&self) {
        let at = Instant::now();
        let mut s = self.state.lock().unwrap();
        match s.mode {
            Mode::Playing => {
                s.fold_elapsed(at);
                s.mode = Mode::Paused;
            }
            Mode::Paused | Mode::Stopped => {
                s.last_resume = Some(at);
                s.mode = Mode::Playing;
            }
        }
    }

    /// Back to zero and hold there. Stale live data is invalidated via the
    /// generation bump; the playback engine picks up the seek-to-zero.
    pub fn stop(&self) {
        let at = Instant::now();
        let mut s = self.state.lock().unwrap();
        s.fold_elapsed(at);
        s.mode = Mode::Stopped;
        s.accumulated = 0.0;
        s.pending_seek = Some(0.0);
        s.generation += 1;
    }

    /// Jump by delta seconds, clamped to [0, duration]. Keeps playing (or
    /// paused) across the jump without double-counting elapsed wall time.
    pub fn seek_by(&self, delta: f64) {
        let at = Instant::now();
        let mut s = self.state.lock().unwrap();
        let candidate = (s.position(at) + delta).clamp(0.0, self.duration);
        s.accumulated = candidate;
        s.pending_seek = Some(candidate);
        if s.mode == Mode::Playing {
            s.last_resume = Some(at);
        }
        s.generation += 1;
    }

    /// Apply-once: the playback engine takes the target and it's gone.
    pub fn take_pending_seek(&self) -> Option<f64> {
        self.state.lock().unwrap().pending_seek.take()
    }
}
