//! Recording lifecycle. There can only be one active capture at a time;
//! this controller owns that invariant together with the elapsed-seconds
//! counter that becomes the clip duration.

use bytes::Bytes;
use parla_audio::{CaptureBackend, CaptureError, CaptureStream};
use parla_core::{PendingClip, RecorderState};
use tracing::{info, warn};

type Result<T> = std::result::Result<T, CaptureError>;

/// Outcome of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A capture was already running; nothing changed
    AlreadyRecording,
}

pub struct RecordingController {
    backend: Box<dyn CaptureBackend>,
    active: Option<ActiveCapture>,
}

struct ActiveCapture {
    stream: Box<dyn CaptureStream>,
    elapsed_secs: u64,
}

impl RecordingController {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            active: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        if self.active.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    /// Starts a capture. A second start while recording is a no-op; a
    /// refused or missing device leaves the controller idle.
    pub fn start(&mut self) -> Result<StartOutcome> {
        if self.active.is_some() {
            warn!("start requested while already recording");
            return Ok(StartOutcome::AlreadyRecording);
        }
        let stream = self.backend.begin()?;
        self.active = Some(ActiveCapture {
            stream,
            elapsed_secs: 0,
        });
        info!("recording started");
        Ok(StartOutcome::Started)
    }

    /// Advances the elapsed counter by one second and returns the new
    /// value. Returns `None` when idle, so a tick that raced a stop
    /// changes nothing.
    pub fn tick(&mut self) -> Option<u64> {
        let active = self.active.as_mut()?;
        active.elapsed_secs += 1;
        Some(active.elapsed_secs)
    }

    /// Elapsed recording time in whole seconds, zero when idle.
    pub fn elapsed_secs(&self) -> u64 {
        self.active.as_ref().map_or(0, |a| a.elapsed_secs)
    }

    /// Stops the capture and returns the finished clip. Stopping while
    /// idle is a no-op. The capture is taken out of the controller before
    /// anything else happens, so the duration it carries cannot be
    /// touched by a late tick.
    pub fn stop(&mut self) -> Result<Option<PendingClip>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        let duration_secs = active.elapsed_secs;
        let chunks = active.stream.finish()?;
        let audio = assemble(chunks);
        info!(duration_secs, bytes = audio.len(), "recording stopped");
        Ok(Some(PendingClip::new(audio, duration_secs)))
    }

    /// Drops an in-flight capture without keeping the audio, releasing
    /// the device. Idle is a no-op.
    pub fn abort(&mut self) {
        if let Some(active) = self.active.take() {
            info!(elapsed_secs = active.elapsed_secs, "recording aborted");
        }
    }
}

/// Concatenates capture chunks in arrival order into one clip payload.
fn assemble(mut chunks: Vec<Bytes>) -> Bytes {
    if chunks.len() == 1 {
        return chunks.remove(0);
    }
    let total = chunks.iter().map(Bytes::len).sum();
    let mut buf = Vec::with_capacity(total);
    for chunk in &chunks {
        buf.extend_from_slice(chunk);
    }
    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedCapture;

    fn controller(chunks: Vec<Bytes>) -> RecordingController {
        RecordingController::new(Box::new(ScriptedCapture::new(chunks)))
    }

    #[test]
    fn test_start_tick_stop_duration() {
        let mut rec = controller(vec![Bytes::from_static(b"RIFF")]);
        assert_eq!(rec.start().unwrap(), StartOutcome::Started);
        assert_eq!(rec.state(), RecorderState::Recording);

        assert_eq!(rec.tick(), Some(1));
        assert_eq!(rec.tick(), Some(2));
        assert_eq!(rec.tick(), Some(3));
        assert_eq!(rec.elapsed_secs(), 3);

        let clip = rec.stop().unwrap().unwrap();
        assert_eq!(clip.duration_secs, 3);
        assert_eq!(clip.audio, Bytes::from_static(b"RIFF"));
        assert_eq!(rec.state(), RecorderState::Idle);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let mut rec = controller(vec![Bytes::new()]);
        assert!(rec.stop().unwrap().is_none());
        assert!(rec.stop().unwrap().is_none());
        assert_eq!(rec.state(), RecorderState::Idle);
    }

    #[test]
    fn test_double_start_changes_nothing() {
        let mut rec = controller(vec![Bytes::from_static(b"a")]);
        assert_eq!(rec.start().unwrap(), StartOutcome::Started);
        rec.tick();
        assert_eq!(rec.start().unwrap(), StartOutcome::AlreadyRecording);
        // the original capture and its counter are untouched
        assert_eq!(rec.elapsed_secs(), 1);
    }

    #[test]
    fn test_tick_after_stop_has_no_effect() {
        let mut rec = controller(vec![Bytes::from_static(b"a")]);
        rec.start().unwrap();
        rec.tick();
        let clip = rec.stop().unwrap().unwrap();
        assert_eq!(clip.duration_secs, 1);

        assert_eq!(rec.tick(), None);
        assert_eq!(rec.elapsed_secs(), 0);
        assert_eq!(rec.state(), RecorderState::Idle);
    }

    #[test]
    fn test_chunks_assembled_in_arrival_order() {
        let chunks = vec![
            Bytes::from_static(b"aa"),
            Bytes::from_static(b"bb"),
            Bytes::from_static(b"cc"),
        ];
        let mut rec = controller(chunks);
        rec.start().unwrap();
        let clip = rec.stop().unwrap().unwrap();
        assert_eq!(clip.audio, Bytes::from_static(b"aabbcc"));
    }

    #[test]
    fn test_refused_device_leaves_idle() {
        let mut rec = RecordingController::new(Box::new(ScriptedCapture::refusing("mic denied")));
        let err = rec.start().unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert_eq!(rec.state(), RecorderState::Idle);
        assert_eq!(rec.elapsed_secs(), 0);
        assert_eq!(rec.tick(), None);
    }

    #[test]
    fn test_abort_releases_without_clip() {
        let mut rec = controller(vec![Bytes::from_static(b"a")]);
        rec.start().unwrap();
        rec.tick();
        rec.abort();
        assert_eq!(rec.state(), RecorderState::Idle);
        assert!(rec.stop().unwrap().is_none());
    }
}
