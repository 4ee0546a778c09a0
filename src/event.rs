//! Session events for whatever renders the chat.

use parla_core::Message;

use crate::playback::PlaybackKey;

/// Events emitted by the session loop, one per observable state change.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Recording has started; the elapsed counter is at zero
    RecordingStarted,
    /// Another second of recording has elapsed
    RecordingTick { elapsed_secs: u64 },
    /// Recording could not start or could not be finalized
    RecordingFailed { reason: String },
    /// A finished clip is staged for review
    ClipStaged { duration_secs: u64 },
    /// The staged clip was dropped without sending
    ClipDiscarded,
    /// The staged clip is on its way to the server
    UploadStarted,
    /// A message was appended to the timeline
    TimelineAppended(Message),
    /// Playback started or stopped; `playing` names the audible clip, if any
    PlaybackChanged { playing: Option<PlaybackKey> },
}
