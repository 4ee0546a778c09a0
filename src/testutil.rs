//! Shared fakes for exercising the session without hardware or network.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use parla_audio::{
    CaptureBackend, CaptureError, CaptureStream, ClipSink, EndOfClip, PlaybackError, PlayerBackend,
};
use parla_gateway::{GatewayError, UploadReply, VoiceGateway};

/// Capture backend that yields a scripted set of chunks instead of
/// touching a microphone.
pub struct ScriptedCapture {
    chunks: Vec<Bytes>,
    refuse: Option<String>,
}

impl ScriptedCapture {
    pub fn new(chunks: Vec<Bytes>) -> Self {
        Self {
            chunks,
            refuse: None,
        }
    }

    /// A backend whose device is never available.
    pub fn refusing(reason: &str) -> Self {
        Self {
            chunks: Vec::new(),
            refuse: Some(reason.to_string()),
        }
    }
}

impl CaptureBackend for ScriptedCapture {
    fn begin(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        if let Some(reason) = &self.refuse {
            return Err(CaptureError::PermissionDenied(reason.clone()));
        }
        Ok(Box::new(ScriptedStream {
            chunks: self.chunks.clone(),
        }))
    }
}

struct ScriptedStream {
    chunks: Vec<Bytes>,
}

impl CaptureStream for ScriptedStream {
    fn finish(self: Box<Self>) -> Result<Vec<Bytes>, CaptureError> {
        Ok(self.chunks)
    }
}

/// Player backend that records every call and hands the end-of-clip
/// callbacks back to the test instead of spawning watcher threads.
///
/// Sinks are labelled by their audio bytes, so tests pass a distinct
/// payload per clip (e.g. `b"clip-a"`).
#[derive(Clone, Default)]
pub struct FakePlayer {
    log: Arc<Mutex<Vec<String>>>,
    ends: Arc<Mutex<VecDeque<(String, EndOfClip)>>>,
    refuse: bool,
}

impl FakePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose output device is never available.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Drains and returns the call log.
    pub fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock())
    }

    /// Fires the oldest stored end-of-clip callback.
    pub fn finish_oldest(&self) {
        let entry = self.ends.lock().pop_front();
        if let Some((_, on_end)) = entry {
            on_end();
        }
    }

    /// Fires the oldest stored callback for the given clip label.
    pub fn finish_clip(&self, label: &str) {
        let entry = {
            let mut ends = self.ends.lock();
            ends.iter()
                .position(|(l, _)| l == label)
                .and_then(|i| ends.remove(i))
        };
        if let Some((_, on_end)) = entry {
            on_end();
        }
    }
}

impl PlayerBackend for FakePlayer {
    fn open(&self, audio: Bytes) -> Result<Box<dyn ClipSink>, PlaybackError> {
        if self.refuse {
            return Err(PlaybackError::NoOutputDevice);
        }
        let label = String::from_utf8_lossy(&audio).into_owned();
        self.log.lock().push(format!("open {label}"));
        Ok(Box::new(FakeSink {
            label,
            log: self.log.clone(),
            ends: self.ends.clone(),
        }))
    }
}

struct FakeSink {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
    ends: Arc<Mutex<VecDeque<(String, EndOfClip)>>>,
}

impl ClipSink for FakeSink {
    fn play_from_start(&mut self, on_end: EndOfClip) -> Result<(), PlaybackError> {
        self.log.lock().push(format!("play {}", self.label));
        self.ends.lock().push_back((self.label.clone(), on_end));
        Ok(())
    }

    fn pause(&mut self) {
        self.log.lock().push(format!("pause {}", self.label));
    }

    fn stop(&mut self) {
        self.log.lock().push(format!("stop {}", self.label));
    }
}

/// Gateway that answers from a queue of canned outcomes and records every
/// uploaded payload. Defaults to a bare success when the queue is empty.
#[derive(Default)]
pub struct MockGateway {
    replies: Mutex<VecDeque<Result<UploadReply, GatewayError>>>,
    uploads: Mutex<Vec<Bytes>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply carrying the given message text.
    pub fn push_message(&self, message: &str) {
        self.replies.lock().push_back(Ok(UploadReply {
            message: Some(message.to_string()),
            transcription: None,
        }));
    }

    /// Queues a successful reply with no text at all.
    pub fn push_empty_ok(&self) {
        self.replies.lock().push_back(Ok(UploadReply::default()));
    }

    /// Queues an HTTP failure.
    pub fn push_failure(&self, status: u16) {
        self.replies.lock().push_back(Err(GatewayError::Http {
            status,
            body: "server error".to_string(),
        }));
    }

    /// Every payload uploaded so far, in order.
    pub fn uploads(&self) -> Vec<Bytes> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl VoiceGateway for MockGateway {
    async fn upload(&self, audio: Bytes) -> Result<UploadReply, GatewayError> {
        self.uploads.lock().push(audio);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(UploadReply::default()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
