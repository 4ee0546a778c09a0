//! Playback coordination. Many clips can hold a sink, at most one is
//! audible at any instant, and starting one silences whatever else was
//! playing.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use bytes::Bytes;
use parla_audio::{ClipSink, PlayerBackend};
use parla_core::MessageId;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// What a playback handle points at: the staged clip under review, or a
/// voice message already on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackKey {
    Pending,
    Message(MessageId),
}

/// Completion notice from a sink watcher. The generation stamps which
/// start the notice belongs to; notices from a sink that was stopped or
/// restarted since carry an old generation and are ignored.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackDone {
    pub key: PlaybackKey,
    pub generation: u64,
}

pub struct PlaybackRegistry {
    backend: Box<dyn PlayerBackend>,
    sinks: HashMap<PlaybackKey, Box<dyn ClipSink>>,
    playing: Option<PlaybackKey>,
    generation: u64,
    done_tx: UnboundedSender<PlaybackDone>,
}

impl PlaybackRegistry {
    pub fn new(backend: Box<dyn PlayerBackend>, done_tx: UnboundedSender<PlaybackDone>) -> Self {
        Self {
            backend,
            sinks: HashMap::new(),
            playing: None,
            generation: 0,
            done_tx,
        }
    }

    /// The key currently audible, if any.
    pub fn playing(&self) -> Option<PlaybackKey> {
        self.playing
    }

    /// Toggles playback of one clip. Toggling the audible key pauses it;
    /// any other key first pauses the audible clip, then starts this one
    /// from the beginning, opening a sink on first use. Device errors are
    /// absorbed: the flag is cleared and nothing propagates.
    ///
    /// Returns the key now audible, if any.
    pub fn toggle(&mut self, key: PlaybackKey, audio: &Bytes) -> Option<PlaybackKey> {
        if self.playing == Some(key) {
            self.pause_current();
            return None;
        }
        self.pause_current();

        // Every start invalidates any watcher still in flight.
        self.generation += 1;
        let generation = self.generation;

        let sink = match self.sinks.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => match self.backend.open(audio.clone()) {
                Ok(sink) => entry.insert(sink),
                Err(e) => {
                    warn!(?key, error = %e, "failed to open playback sink");
                    return None;
                }
            },
        };

        let done_tx = self.done_tx.clone();
        let on_end = Box::new(move || {
            done_tx.send(PlaybackDone { key, generation }).ok();
        });

        match sink.play_from_start(on_end) {
            Ok(()) => self.playing = Some(key),
            Err(e) => {
                warn!(?key, error = %e, "playback failed");
                self.playing = None;
            }
        }
        self.playing
    }

    /// Applies a completion notice from a watcher. Returns true when the
    /// notice was current and cleared the audible flag.
    pub fn on_finished(&mut self, done: PlaybackDone) -> bool {
        if done.generation != self.generation {
            debug!(key = ?done.key, "ignoring stale playback completion");
            return false;
        }
        if self.playing == Some(done.key) {
            self.playing = None;
            return true;
        }
        false
    }

    /// Stops and frees the handle for one key, e.g. when the pending clip
    /// leaves the staging slot. Unknown keys are a no-op.
    pub fn remove(&mut self, key: PlaybackKey) {
        if self.playing == Some(key) {
            self.playing = None;
            // Stopping the audible sink fires its watcher; only that
            // notice goes stale. A watcher on any other key stays valid.
            self.generation += 1;
        }
        if let Some(mut sink) = self.sinks.remove(&key) {
            sink.stop();
        }
    }

    /// Stops everything and frees all handles.
    pub fn shutdown(&mut self) {
        self.playing = None;
        self.generation += 1;
        for (_, mut sink) in self.sinks.drain() {
            sink.stop();
        }
    }

    fn pause_current(&mut self) {
        if let Some(current) = self.playing.take() {
            // The paused sink may still fire its watcher; bumping the
            // generation marks that notice stale.
            self.generation += 1;
            if let Some(sink) = self.sinks.get_mut(&current) {
                sink.pause();
            }
        }
    }
}
