// Core types passed between the capture, playback, and scoring halves.
//
// The rough shape of a session:
//   - reference::build runs once up front and produces a Vec<PitchEvent>
//     for the whole backing track (the blue dots).
//   - the capture engine produces StampedEvents while you sing (the live dots),
//     timestamped on the shared transport clock.
//   - the scorer drains the channel on every display tick and hands whoever
//     is drawing a DisplayFrame: both point sets relative to "now", with a
//     per-live-point error scalar against the reference.

/// One detected pitch: when it happened (transport seconds) and what it was
/// (fractional MIDI, 69.0 = A4).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PitchEvent {
    pub timestamp: f64,
    pub note: f64,
}

// Live events carry the transport generation observed when they were captured.
// stop()/seek bump the generation, so stale events still sitting in the
// channel can be recognized and dropped by the consumer.
#[derive(Clone, Copy, Debug)]
pub struct StampedEvent {
    pub generation: u64,
    pub event: PitchEvent,
}

/// A reference point positioned relative to now (negative = already played).
#[derive(Clone, Copy, Debug)]
pub struct RefPoint {
    pub rel_time: f64,
    pub note: f64,
}

/// A live point positioned relative to now, with its pitch error in semitones.
#[derive(Clone, Copy, Debug)]
pub struct LivePoint {
    pub rel_time: f64,
    pub note: f64,
    pub error: f64,
}

/// What the display collaborator gets on every tick. The core never draws.
#[derive(Clone, Debug, Default)]
pub struct DisplayFrame {
    pub now: f64,
    pub reference: Vec<RefPoint>,
    pub live: Vec<LivePoint>,
}
