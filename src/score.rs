// Consumer-side alignment and scoring, run once per display tick: drain the
// channel into the live buffer, prune old points, window both streams around
// "now", and score each live point against the nearest already-played
// reference point.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::Config;
use crate::session::Session;
use crate::shared::{DisplayFrame, LivePoint, PitchEvent, RefPoint, StampedEvent};

pub struct Scorer {
    cfg: Config,
    reference: Arc<Vec<PitchEvent>>,
    // recent live events, timestamp-ascending (single producer guarantees
    // arrival order == timestamp order), pruned from the front
    live: VecDeque<PitchEvent>,
    track_duration: f64,
    generation: u64,
}

impl Scorer {
    pub fn new(reference: Arc<Vec<PitchEvent>>, cfg: Config, track_duration: f64) -> Self {
        Self {
            cfg,
            reference,
            live: VecDeque::new(),
            track_duration,
            generation: 0,
        }
    }

    pub fn tick(&mut self, session: &Session) -> DisplayFrame {
        let snap = session.transport.snapshot();
        self.absorb(snap.generation, session.drain_events());
        self.frame(snap.now, session.output_latency())
    }

    // Fold drained events into the live buffer. A generation change means a
    // stop/seek happened: the history is gone, and any event stamped with an
    // older generation was in flight across the command and gets dropped too.
    fn absorb(&mut self, generation: u64, events: Vec<StampedEvent>) {
        if generation != self.generation {
            self.live.clear();
            self.generation = generation;
        }
        for ev in events {
            if ev.generation == self.generation {
                self.live.push_back(ev.event);
            }
        }
    }

    fn frame(&mut self, now: f64, output_latency: f64) -> DisplayFrame {
        let cfg = &self.cfg;

        // prune live history that fell out of the visible past (plus margin)
        let horizon = now - cfg.past_span - cfg.retention_margin;
        while self.live.front().is_some_and(|ev| ev.timestamp < horizon) {
            self.live.pop_front();
        }

        // reference timing aligned with what's audible, not what's decoded
        let shift = if cfg.compensate_latency {
            output_latency
        } else {
            0.0
        };
        let (lo, hi) = if cfg.full_view {
            (-now, self.track_duration - now + shift)
        } else {
            (-cfg.past_span, cfg.future_span)
        };
        let reference: Vec<RefPoint> = if cfg.show_reference {
            self.reference
                .iter()
                .map(|ev| RefPoint {
                    rel_time: ev.timestamp - now + shift,
                    note: ev.note,
                })
                .filter(|p| p.rel_time >= lo && p.rel_time <= hi)
                .collect()
        } else {
            Vec::new()
        };

        // only reference points at or before now are fair to score against
        let past: Vec<&RefPoint> = reference.iter().filter(|p| p.rel_time <= 0.0).collect();

        let live = self
            .live
            .iter()
            .map(|ev| (ev.timestamp - now, ev.note))
            .filter(|&(rel, _)| rel >= -cfg.past_span && rel <= 0.0)
            .map(|(rel, note)| {
                let error = past
                    .iter()
                    .map(|r| ((r.rel_time - rel).abs(), r.note))
                    .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
                    .filter(|&(dt, _)| dt < cfg.match_tolerance)
                    .map(|(_, ref_note)| (note - ref_note).abs())
                    .unwrap_or(cfg.unmatched_penalty);
                LivePoint {
                    rel_time: rel,
                    note,
                    error,
                }
            })
            .collect();

        DisplayFrame {
            now,
            reference,
            live,
        }
    }
}
