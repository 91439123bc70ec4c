// The one shared context object. Everything the engines and the scorer used
// to reach for globals for lives here: config, transport clock, the pitch
// event channel, the measured device latencies, the start gate, and the
// shutdown flag. Constructed once per session and Arc-shared.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::config::Config;
use crate::shared::StampedEvent;
use crate::transport::Transport;

pub struct Session {
    config: Config,
    pub transport: Transport,

    // single producer (capture worker), single consumer (scorer). Unbounded:
    // event rate is capped by the hop rate, tens per second, so letting it
    // grow between drains is safe and the producer never blocks.
    events_tx: Sender<StampedEvent>,
    events_rx: Receiver<StampedEvent>,

    // start barrier: each engine publishes its latency then drops one token
    // here; main collects them all before releasing the gate
    ready_tx: Sender<()>,
    ready_rx: Receiver<()>,

    // written once from the first device callback, read-only after that
    input_latency: OnceLock<f64>,
    output_latency: OnceLock<f64>,

    started: AtomicBool,
    shutdown: AtomicBool,
    playback_done: AtomicBool,
}

impl Session {
    pub fn new(config: Config, track_duration: f64) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(2);
        Self {
            config,
            transport: Transport::new(track_duration),
            events_tx,
            events_rx,
            ready_tx,
            ready_rx,
            input_latency: OnceLock::new(),
            output_latency: OnceLock::new(),
            started: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            playback_done: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── event channel ─────────────────────────────────────────────

    pub fn push_event(&self, ev: StampedEvent) {
        let _ = self.events_tx.send(ev);
    }

    /// Non-blocking: takes whatever is queued right now and returns. An empty
    /// channel is a no-op, never a wait.
    pub fn drain_events(&self) -> Vec<StampedEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events_rx.try_recv() {
            out.push(ev);
        }
        out
    }

    // ── latencies + start barrier ─────────────────────────────────

    /// First call wins and counts as this engine's readiness signal; repeat
    /// calls (every later callback) are ignored.
    pub fn publish_input_latency(&self, seconds: f64) {
        if self.input_latency.set(seconds).is_ok() {
            let _ = self.ready_tx.try_send(());
        }
    }

    pub fn publish_output_latency(&self, seconds: f64) {
        if self.output_latency.set(seconds).is_ok() {
            let _ = self.ready_tx.try_send(());
        }
    }

    pub fn input_latency(&self) -> f64 {
        self.input_latency.get().copied().unwrap_or(0.0)
    }

    pub fn output_latency(&self) -> f64 {
        self.output_latency.get().copied().unwrap_or(0.0)
    }

    /// Block until `engines` readiness tokens arrive. Bails if a device never
    /// produces a callback; that is a startup device fault, not recoverable.
    pub fn wait_ready(&self, engines: usize, timeout: Duration) -> anyhow::Result<()> {
        for _ in 0..engines {
            self.ready_rx
                .recv_timeout(timeout)
                .map_err(|_| anyhow::anyhow!("audio device never reported ready"))?;
        }
        Ok(())
    }

    /// Both engines are live and measured: define time zero and let them run.
    pub fn release_start_gate(&self) {
        self.transport.start();
        self.started.store(true, Ordering::Release);
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    // ── shutdown ──────────────────────────────────────────────────

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn mark_playback_done(&self) {
        self.playback_done.store(true, Ordering::Release);
    }

    pub fn playback_done(&self) -> bool {
        self.playback_done.load(Ordering::Acquire)
    }
}
