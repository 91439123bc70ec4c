// Monophonic pitch detection by autocorrelation peak-picking. Stateless: each
// hop is judged on its own, no continuity tracking across calls. The RMS
// energy gate is the caller's job (see rms below), not the detector's.

use crate::config::Config;

/// A voiced detection: fundamental frequency plus its fractional MIDI note.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pitch {
    pub frequency: f64,
    pub note: f64,
}

/// RMS level of a chunk, for the energy gate.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// 69.0 = A4 = 440 Hz, fractional values between semitones.
pub fn note_from_hz(freq: f64) -> f64 {
    69.0 + 12.0 * (freq / 440.0).log2()
}

/// Nearest note name for a fractional MIDI value, e.g. 57.03 -> "A3".
pub fn note_name(note: f64) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let midi = note.round() as i64;
    let octave = midi.div_euclid(12) - 1;
    let name = NAMES[midi.rem_euclid(12) as usize];
    format!("{}{}", name, octave)
}

/// Estimate the fundamental of one chunk. Returns None for anything that
/// doesn't look like a single periodic voice: too little periodicity at the
/// winning lag, a dead-silent chunk, or a frequency outside the vocal band.
pub fn detect(samples: &[f32], sample_rate: u32, cfg: &Config) -> Option<Pitch> {
    let n = samples.len();
    if n == 0 {
        return None;
    }

    // dc removal so a constant offset doesn't swamp the correlation
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n as f64;

    // autocorrelation, non-negative lags only
    let mut corr = vec![0.0f64; n];
    for (lag, c) in corr.iter_mut().enumerate() {
        let mut acc = 0.0;
        for i in 0..n - lag {
            acc += (samples[i] as f64 - mean) * (samples[i + lag] as f64 - mean);
        }
        *c = acc;
    }

    // search band: 1000 Hz down to 50 Hz, clamped to the lags we have
    let mut min_lag = (sample_rate / 1000) as usize;
    let mut max_lag = (sample_rate / 50) as usize;
    if max_lag > corr.len() {
        max_lag = corr.len() - 1;
    }
    if min_lag < 1 {
        min_lag = 1;
    }
    if min_lag >= max_lag {
        return None;
    }

    let (best_off, &best) = corr[min_lag..max_lag]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    let peak_lag = min_lag + best_off;

    // periodicity confidence: the peak has to carry a real fraction of the
    // lag-0 energy. Also catches the all-zero chunk (corr[0] == 0).
    if corr[0] <= 0.0 || best < cfg.min_confidence * corr[0] {
        return None;
    }

    let frequency = sample_rate as f64 / peak_lag as f64;
    if frequency < cfg.freq_min || frequency > cfg.freq_max {
        return None;
    }

    Some(Pitch {
        frequency,
        note: note_from_hz(frequency),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: u32, len: usize, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                amp * (std::f64::consts::TAU * freq * t).sin() as f32
            })
            .collect()
    }

    // tiny xorshift so the noise test is seeded and repeatable
    fn noise(seed: &mut u64, len: usize, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|_| {
                *seed ^= *seed << 13;
                *seed ^= *seed >> 7;
                *seed ^= *seed << 17;
                let unit = (*seed >> 11) as f32 / (1u64 << 53) as f32;
                amp * (unit * 2.0 - 1.0)
            })
            .collect()
    }

    #[test]
    fn sine_220_is_voiced_near_a3() {
        let cfg = Config::default();
        let chunk = sine(220.0, 44_100, 1024, 0.5);
        let p = detect(&chunk, 44_100, &cfg).expect("220 Hz sine should be voiced");
        assert!((p.frequency - 220.0).abs() < 5.0, "got {} Hz", p.frequency);
        assert!((p.note - 57.0).abs() < 0.1, "got note {}", p.note);
    }

    #[test]
    fn silence_is_unvoiced() {
        let cfg = Config::default();
        let chunk = vec![0.0f32; 1024];
        assert!(detect(&chunk, 44_100, &cfg).is_none());
    }

    #[test]
    fn dc_offset_alone_is_unvoiced() {
        let cfg = Config::default();
        let chunk = vec![0.3f32; 1024];
        assert!(detect(&chunk, 44_100, &cfg).is_none());
    }

    #[test]
    fn white_noise_is_mostly_unvoiced() {
        let cfg = Config::default();
        let mut seed = 0x2545F4914F6CDD1Du64;
        let trials = 100;
        let voiced = (0..trials)
            .filter(|_| detect(&noise(&mut seed, 1024, 0.5), 44_100, &cfg).is_some())
            .count();
        assert!(voiced < trials / 10, "{voiced}/{trials} noise chunks voiced");
    }

    #[test]
    fn tiny_chunk_cannot_fit_the_lag_band() {
        // 44100/1000 = 44 min lag; a 30-sample chunk clamps max below min
        let cfg = Config::default();
        let chunk = sine(220.0, 44_100, 30, 0.5);
        assert!(detect(&chunk, 44_100, &cfg).is_none());
    }

    #[test]
    fn rms_of_known_signal() {
        assert!(rms(&[]) == 0.0);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn note_names() {
        assert_eq!(note_name(69.0), "A4");
        assert_eq!(note_name(60.0), "C4");
        assert_eq!(note_name(57.03), "A3");
    }
}
