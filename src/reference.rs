// Backing-file decode plus the offline reference-track build: run the same
// gate + detector the live path uses over the whole file, one hop at a time,
// and keep the voiced hops as timestamped events.

use std::path::Path;

use crate::config::Config;
use crate::pitch;
use crate::shared::PitchEvent;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    // supported encodings are deliberately narrow: 16/32-bit int and 32-bit
    // float PCM. Anything else fails fast before any engine starts.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Wav(#[from] hound::Error),
}

/// A decoded PCM file: interleaved f32 samples in [-1, 1] at the file's own
/// rate and channel count. Playback writes these frames verbatim; the
/// reference builder reads channel 0 only.
#[derive(Clone, Debug)]
pub struct AudioFile {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFile {
    pub fn load_wav(path: &Path) -> Result<Self, LoadError> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        // normalize integer PCM by full scale, pass floats through
        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => {
                reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?
            }
            (hound::SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .map(|s| s.map(|x| x as f32 / 32768.0))
                .collect::<Result<Vec<_>, _>>()?,
            (hound::SampleFormat::Int, 32) => reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 / 2147483648.0))
                .collect::<Result<Vec<_>, _>>()?,
            (fmt, bits) => {
                return Err(LoadError::UnsupportedFormat(format!("{bits}-bit {fmt:?}")));
            }
        };

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        })
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    // Downmix by taking channel 0. Not averaging; the first channel is what
    // the reference has always been built from.
    pub fn first_channel(&self) -> Vec<f32> {
        let step = self.channels.max(1) as usize;
        self.samples.iter().copied().step_by(step).collect()
    }
}

/// Extract the reference melody: the live hop duration rescaled to the file's
/// rate, then gate + detect per hop. Unvoiced or gated-out hops emit nothing
/// but still advance the timestamp.
pub fn build(audio: &AudioFile, cfg: &Config) -> Vec<PitchEvent> {
    let mono = audio.first_channel();
    let rate = audio.sample_rate;

    let mut file_hop = (cfg.hop_seconds() * rate as f64) as usize;
    if file_hop == 0 {
        file_hop = 1;
    }
    let hop_seconds = file_hop as f64 / rate as f64;

    let mut events = Vec::new();
    let mut start_time = 0.0f64;
    let mut i = 0usize;
    while i + file_hop < mono.len() {
        let chunk = &mono[i..i + file_hop];
        if pitch::rms(chunk) >= cfg.volume_threshold {
            if let Some(p) = pitch::detect(chunk, rate, cfg) {
                events.push(PitchEvent {
                    timestamp: start_time,
                    note: p.note,
                });
            }
        }
        start_time += hop_seconds;
        i += file_hop;
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;
    use std::path::PathBuf;

    fn temp_wav(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("pitchline-ref-test");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn write_f32_wav(path: &Path, rate: u32, channels: u16, samples: &[f32]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();
    }

    fn tone(freq: f64, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (0.5 * (TAU * freq * i as f64 / rate as f64).sin()) as f32)
            .collect()
    }

    #[test]
    fn known_note_sequence_round_trips() {
        // 220 Hz, silence, 330 Hz: one hop each, plus a tail hop so the
        // builder's exclusive end doesn't eat the last real hop
        let cfg = Config::default();
        let rate = 44_100u32;
        let hop = cfg.hop_size;
        let mut samples = tone(220.0, rate, hop);
        samples.extend(std::iter::repeat_n(0.0f32, hop));
        samples.extend(tone(330.0, rate, hop));
        samples.extend(std::iter::repeat_n(0.0f32, hop));

        let path = temp_wav("sequence.wav");
        write_f32_wav(&path, rate, 1, &samples);
        let audio = AudioFile::load_wav(&path).unwrap();
        let events = build(&audio, &cfg);

        assert_eq!(events.len(), 2, "events: {events:?}");
        let hop_secs = hop as f64 / rate as f64;
        // the silent middle hop advanced time without emitting
        assert!((events[0].timestamp - 0.0).abs() < 1e-9);
        assert!((events[1].timestamp - 2.0 * hop_secs).abs() < 1e-9);
        assert!((events[0].note - pitch::note_from_hz(220.0)).abs() < 0.3);
        assert!((events[1].note - pitch::note_from_hz(330.0)).abs() < 0.3);
    }

    #[test]
    fn timestamps_are_nondecreasing() {
        let cfg = Config::default();
        let rate = 22_050u32;
        let samples = tone(262.0, rate, 22_050);
        let path = temp_wav("mono.wav");
        write_f32_wav(&path, rate, 1, &samples);
        let audio = AudioFile::load_wav(&path).unwrap();
        let events = build(&audio, &cfg);
        assert!(!events.is_empty());
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn stereo_uses_first_channel_only() {
        // left = tone, right = silence; averaging would halve the level,
        // channel 0 keeps it intact
        let cfg = Config::default();
        let rate = 44_100u32;
        let left = tone(220.0, rate, cfg.hop_size * 4);
        let mut interleaved = Vec::with_capacity(left.len() * 2);
        for s in left {
            interleaved.push(s);
            interleaved.push(0.0);
        }
        let path = temp_wav("stereo.wav");
        write_f32_wav(&path, rate, 2, &interleaved);
        let audio = AudioFile::load_wav(&path).unwrap();
        assert_eq!(audio.channels, 2);
        let events = build(&audio, &cfg);
        assert!(!events.is_empty());
        assert!((events[0].note - pitch::note_from_hz(220.0)).abs() < 0.3);
    }

    #[test]
    fn int16_wav_is_normalized() {
        let rate = 44_100u32;
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let path = temp_wav("int16.wav");
        let mut w = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..4096 {
            let s = (0.5 * (TAU * 220.0 * i as f64 / rate as f64).sin() * 32767.0) as i16;
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();

        let audio = AudioFile::load_wav(&path).unwrap();
        assert!(audio.samples.iter().all(|s| s.abs() <= 1.0));
        assert!(audio.samples.iter().any(|s| s.abs() > 0.4));
    }

    #[test]
    fn eight_bit_wav_is_rejected() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        };
        let path = temp_wav("int8.wav");
        let mut w = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..64 {
            w.write_sample(0i8).unwrap();
        }
        w.finalize().unwrap();

        match AudioFile::load_wav(&path) {
            Err(LoadError::UnsupportedFormat(_)) => {}
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn hop_is_rescaled_to_the_file_rate() {
        // half the live rate -> half the hop in samples, same hop in seconds
        let cfg = Config::default();
        let rate = 22_050u32;
        let hop_secs = cfg.hop_seconds();
        let samples = tone(220.0, rate, (rate as f64 * hop_secs * 4.5) as usize);
        let path = temp_wav("rescale.wav");
        write_f32_wav(&path, rate, 1, &samples);
        let audio = AudioFile::load_wav(&path).unwrap();
        let events = build(&audio, &cfg);
        assert!(!events.is_empty());
        for ev in &events {
            let hops = ev.timestamp / hop_secs;
            assert!((hops - hops.round()).abs() < 1e-6, "timestamp {}", ev.timestamp);
        }
    }
}
