// Output side: the decoded backing file goes out through a cpal stream opened
// with the file's own channel count and rate, frames copied verbatim. The
// callback is the playback loop: apply a pending seek, write silence while
// paused, otherwise stream the next chunk until the file runs out.

use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::reference::AudioFile;
use crate::session::Session;
use crate::transport::Mode;

pub struct PlaybackHandle {
    _stream: cpal::Stream,
}

pub fn start_playback(session: Arc<Session>, audio: AudioFile) -> anyhow::Result<PlaybackHandle> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no default output device")?;
    log::info!(
        "playback device: {}",
        device.name().unwrap_or_else(|_| "unknown".into())
    );

    let channels = audio.channels.max(1);
    let config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(audio.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let rate = audio.sample_rate as f64;
    let chan = channels as usize;
    let samples = audio.samples;
    let total = samples.len() - samples.len() % chan; // frame aligned
    let mut cursor = 0usize;

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], info: &cpal::OutputCallbackInfo| {
            // callback -> playback delta is the output latency
            let ts = info.timestamp();
            let latency = ts
                .playback
                .duration_since(&ts.callback)
                .unwrap_or_default()
                .as_secs_f64();
            session.publish_output_latency(latency);

            if !session.started() || session.shutdown_requested() || session.playback_done() {
                data.fill(0.0);
                return;
            }

            // apply-once, and even while paused, so resume lands at the target
            if let Some(target) = session.transport.take_pending_seek() {
                let frame = (target * rate) as usize;
                cursor = (frame * chan).min(total);
            }

            if session.transport.mode() != Mode::Playing {
                // silence keeps the stream alive without advancing playback
                data.fill(0.0);
                return;
            }

            let n = data.len().min(total - cursor);
            data[..n].copy_from_slice(&samples[cursor..cursor + n]);
            data[n..].fill(0.0);
            cursor += n;
            if cursor >= total {
                // end of stream is terminal, no looping
                session.mark_playback_done();
            }
        },
        |err| log::error!("playback stream error: {err}"),
        None,
    )?;
    stream.play().context("failed to start playback stream")?;

    Ok(PlaybackHandle { _stream: stream })
}
