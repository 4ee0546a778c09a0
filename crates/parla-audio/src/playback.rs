//! Clip playback through rodio. A sink owns its clip bytes for its whole
//! life and every start plays from the beginning of the clip; there is no
//! resume-from-position.

use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No output device available
    #[error("no output device available")]
    NoOutputDevice,
    /// Clip could not be decoded
    #[error("failed to decode clip: {0}")]
    Decode(String),
    /// Sink could not be created
    #[error(transparent)]
    Play(#[from] rodio::PlayError),
}

type Result<T> = std::result::Result<T, PlaybackError>;

/// Callback invoked when a started clip stops playing, whether it ran to
/// its natural end or was stopped. Fires at most once per start; callers
/// that need to tell the two apart keep their own bookkeeping.
pub type EndOfClip = Box<dyn FnOnce() + Send>;

/// Opens playback sinks for clips. Implemented by [`RodioBackend`] for real
/// hardware and by fakes in tests.
pub trait PlayerBackend {
    fn open(&self, audio: Bytes) -> Result<Box<dyn ClipSink>>;
}

/// Playback handle for a single clip.
pub trait ClipSink {
    /// Starts (or restarts) the clip from the beginning.
    fn play_from_start(&mut self, on_end: EndOfClip) -> Result<()>;
    /// Silences the sink, keeping the handle usable for a later restart.
    fn pause(&mut self);
    /// Stops the sink for good.
    fn stop(&mut self);
}

/// The rodio-backed player, playing through the default output device.
pub struct RodioBackend {
    // The stream must outlive every sink opened from it; audio stops the
    // moment it drops.
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioBackend {
    pub fn new() -> Result<Self> {
        let (_stream, handle) =
            OutputStream::try_default().map_err(|_| PlaybackError::NoOutputDevice)?;
        Ok(Self { _stream, handle })
    }
}

impl PlayerBackend for RodioBackend {
    fn open(&self, audio: Bytes) -> Result<Box<dyn ClipSink>> {
        Ok(Box::new(RodioSink {
            handle: self.handle.clone(),
            audio,
            sink: None,
        }))
    }
}

struct RodioSink {
    handle: OutputStreamHandle,
    audio: Bytes,
    // A fresh rodio sink is built per start so playback always begins at
    // time zero.
    sink: Option<Arc<Sink>>,
}

impl ClipSink for RodioSink {
    fn play_from_start(&mut self, on_end: EndOfClip) -> Result<()> {
        self.stop();

        let cursor = Cursor::new(self.audio.clone());
        let source = Decoder::new(cursor).map_err(|e| PlaybackError::Decode(e.to_string()))?;
        let sink = Arc::new(Sink::try_new(&self.handle)?);
        sink.append(source);

        // Watch for the end of the clip from a plain thread; stopping the
        // sink also releases the watcher.
        let watcher = sink.clone();
        thread::spawn(move || {
            watcher.sleep_until_end();
            on_end();
        });

        self.sink = Some(sink);
        Ok(())
    }

    fn pause(&mut self) {
        // Restart is always from zero, so pausing does not keep a position.
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        // The watcher thread holds its own Arc; without an explicit stop the
        // clip would keep playing after the handle is gone.
        self.stop();
    }
}
