// The two device engines. Both publish a measured latency from their first
// callback, then idle behind the session's start gate until main releases it.

mod capture;
mod playback;

pub use capture::{CaptureHandle, start_capture};
pub use playback::{PlaybackHandle, start_playback};
