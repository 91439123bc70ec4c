// Every tunable in one place, passed by reference to the constructors that
// care. An optional <audio_dir>/pitchline.json overrides the defaults; we
// never write it back (sessions aren't persisted).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "pitchline.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // live capture format
    pub sample_rate: u32,
    pub hop_size: usize,

    // energy gate: chunks with RMS below this produce no event at all
    pub volume_threshold: f32,

    // detector: plausible vocal band and the periodicity-confidence gate
    // (peak correlation must be at least this fraction of lag-0 correlation)
    pub freq_min: f64,
    pub freq_max: f64,
    pub min_confidence: f64,

    // scoring window, seconds relative to now
    pub past_span: f64,
    pub future_span: f64,
    // how far beyond the visible past we keep live points before pruning
    pub retention_margin: f64,
    // a live point matches the nearest reference point within this gap...
    pub match_tolerance: f64,
    // ...otherwise it gets this flat penalty (semitones)
    pub unmatched_penalty: f64,

    // transport
    pub seek_step: f64,
    pub tick_ms: u64,

    // shift live timestamps by measured input latency and reference display
    // by output latency so everything lines up with what you actually hear
    pub compensate_latency: bool,

    // feature switches: the pipeline is one engine, these pick the variant
    pub isolate_vocals: bool,
    pub play_backing: bool,
    pub show_reference: bool,
    pub transport_keys: bool,
    // show the whole track instead of the scrolling past/future window
    pub full_view: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            hop_size: 1024,
            volume_threshold: 0.0075,
            freq_min: 50.0,
            freq_max: 2000.0,
            min_confidence: 0.1,
            past_span: 5.0,
            future_span: 10.0,
            retention_margin: 1.0,
            match_tolerance: 0.2,
            unmatched_penalty: 3.0,
            seek_step: 2.0,
            tick_ms: 50,
            compensate_latency: true,
            isolate_vocals: true,
            play_backing: true,
            show_reference: true,
            transport_keys: true,
            full_view: false,
        }
    }
}

impl Config {
    /// Nominal duration of one live hop in seconds.
    pub fn hop_seconds(&self) -> f64 {
        self.hop_size as f64 / self.sample_rate as f64
    }
}

fn config_file_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

// Load pitchline.json from the given dir if it exists, defaults otherwise.
// A malformed file is a warning, not a crash.
pub fn load(dir: &Path) -> Config {
    let path = config_file_path(dir);
    match std::fs::read_to_string(&path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("ignoring malformed {}: {}", path.display(), e);
                Config::default()
            }
        },
        Err(_) => Config::default(),
    }
}
