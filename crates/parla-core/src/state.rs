//! Recorder and staging state types.

/// The current state of the voice recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Idle, not recording
    Idle,
    /// Actively capturing audio from the microphone
    Recording,
}

/// The current state of the staging slot that holds a finished clip
/// between recording and upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingState {
    /// No clip staged
    Empty,
    /// A finished clip is staged, awaiting send or discard
    Staged,
    /// The staged clip is being uploaded
    Uploading,
}
