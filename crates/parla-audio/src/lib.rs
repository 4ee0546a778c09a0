//! Device boundary for parla: microphone capture and clip playback.
//!
//! Both sides sit behind small object-safe traits so the session logic can
//! run against scripted fakes in tests. The real implementations use cpal +
//! hound for capture (an in-memory WAV) and rodio for playback.

mod capture;
mod playback;

pub use capture::{CaptureBackend, CaptureError, CaptureStream, MicBackend};
pub use playback::{ClipSink, EndOfClip, PlaybackError, PlayerBackend, RodioBackend};
