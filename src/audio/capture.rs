// Input side: a cpal callback slices the mic into hop-sized chunks, a worker
// thread does the actual work (gate, detect, timestamp, push). The callback
// stays cheap; the worker paces itself on the hop channel, one blocking
// receive per hop.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::pitch;
use crate::session::Session;
use crate::shared::{PitchEvent, StampedEvent};
use crate::transport::Mode;

pub struct CaptureHandle {
    _stream: cpal::Stream,
    worker: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Deterministic shutdown: call after `session.request_shutdown()`. The
    /// worker notices the flag within one receive timeout and exits.
    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

pub fn start_capture(session: Arc<Session>) -> anyhow::Result<CaptureHandle> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("no input device available")?;
    log::info!(
        "capture device: {}",
        device.name().unwrap_or_else(|_| "unknown".into())
    );

    let supported = pick_input_config(&device, session.config().sample_rate)
        .context("no suitable f32 input format found")?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let config: cpal::StreamConfig = supported.into();
    log::info!("capture: {} Hz, {} channel(s)", sample_rate, channels);

    let hop = session.config().hop_size;
    // a couple of hops of slack; the worker normally keeps up within one
    let (hop_tx, hop_rx) = crossbeam_channel::bounded::<Vec<f32>>(8);

    let cb_session = session.clone();
    let mut pending: Vec<f32> = Vec::with_capacity(hop * 2);
    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], info: &cpal::InputCallbackInfo| {
            // capture -> callback delta is the input latency; only the first
            // callback's value sticks
            let ts = info.timestamp();
            let latency = ts
                .callback
                .duration_since(&ts.capture)
                .unwrap_or_default()
                .as_secs_f64();
            cb_session.publish_input_latency(latency);

            if channels == 1 {
                pending.extend_from_slice(data);
            } else {
                // multi-channel mic: take channel 0, same as the reference
                pending.extend(data.chunks_exact(channels).map(|c| c[0]));
            }
            while pending.len() >= hop {
                let chunk: Vec<f32> = pending.drain(..hop).collect();
                let _ = hop_tx.try_send(chunk);
            }
        },
        // a device fault kills this stream; nothing here can reopen it
        |err| log::error!("capture stream error: {err}"),
        None,
    )?;
    stream.play().context("failed to start capture stream")?;

    let worker = std::thread::Builder::new()
        .name("pitchline-capture".into())
        .spawn(move || capture_worker(session, hop_rx, sample_rate))?;

    Ok(CaptureHandle {
        _stream: stream,
        worker: Some(worker),
    })
}

fn capture_worker(session: Arc<Session>, hops: Receiver<Vec<f32>>, sample_rate: u32) {
    loop {
        if session.shutdown_requested() {
            break;
        }
        let chunk = match hops.recv_timeout(Duration::from_millis(100)) {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if !session.started() {
            continue; // pre-barrier audio is discarded
        }

        // one locked read so timestamp and generation can't straddle a seek
        let snap = session.transport.snapshot();
        if snap.mode != Mode::Playing {
            continue;
        }

        let cfg = session.config();
        if pitch::rms(&chunk) < cfg.volume_threshold {
            continue;
        }
        let Some(p) = pitch::detect(&chunk, sample_rate, cfg) else {
            continue;
        };

        let latency = if cfg.compensate_latency {
            session.input_latency()
        } else {
            0.0
        };
        session.push_event(StampedEvent {
            generation: snap.generation,
            event: PitchEvent {
                // what we just analyzed entered the mic this long ago
                timestamp: snap.now - latency,
                note: p.note,
            },
        });
    }
}

// Prefer a mono f32 config near the target rate, fall back to any f32 layout
// (the callback downmixes). Exact rate if the device ranges allow it.
fn pick_input_config(
    device: &cpal::Device,
    target_rate: u32,
) -> Option<cpal::SupportedStreamConfig> {
    let best = device
        .supported_input_configs()
        .ok()?
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let chan_penalty: i64 = if c.channels() == 1 { 0 } else { 1 << 32 };
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            chan_penalty + min_diff.min(max_diff)
        })?;
    let rate = target_rate.clamp(best.min_sample_rate().0, best.max_sample_rate().0);
    Some(best.with_sample_rate(cpal::SampleRate(rate)))
}
