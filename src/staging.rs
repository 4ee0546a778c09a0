//! The staging slot: at most one finished clip sits between recording
//! and sending, available for review until it is sent or discarded.

use bytes::Bytes;
use parla_core::{PendingClip, StagingState};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StagingError {
    /// A clip is already staged
    #[error("a clip is already staged")]
    AlreadyStaged,
    /// The staged clip is being uploaded
    #[error("an upload is in flight")]
    UploadInFlight,
    /// No clip is staged
    #[error("no clip is staged")]
    NothingStaged,
}

type Result<T> = std::result::Result<T, StagingError>;

#[derive(Debug, Default)]
pub struct ClipStaging {
    slot: Option<PendingClip>,
    uploading: bool,
}

impl ClipStaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StagingState {
        match (&self.slot, self.uploading) {
            (Some(_), true) => StagingState::Uploading,
            (Some(_), false) => StagingState::Staged,
            (None, _) => StagingState::Empty,
        }
    }

    /// The staged clip, playable locally while it sits here.
    pub fn clip(&self) -> Option<&PendingClip> {
        self.slot.as_ref()
    }

    /// Stages a finished clip. Only one can exist at a time; staging over
    /// an occupied slot is refused and the occupant is untouched.
    pub fn stage(&mut self, clip: PendingClip) -> Result<()> {
        if self.slot.is_some() {
            return Err(StagingError::AlreadyStaged);
        }
        info!(duration_secs = clip.duration_secs, "clip staged");
        self.slot = Some(clip);
        Ok(())
    }

    /// Drops the staged clip. Discarding an empty slot is a quiet no-op
    /// (`Ok(false)`); discarding mid-upload is refused.
    pub fn discard(&mut self) -> Result<bool> {
        if self.uploading {
            return Err(StagingError::UploadInFlight);
        }
        Ok(self.slot.take().is_some())
    }

    /// Marks the staged clip as uploading and returns a cheap clone of
    /// its audio for the wire. The clip itself stays staged until the
    /// outcome arrives via [`ClipStaging::complete_upload`].
    pub fn begin_upload(&mut self) -> Result<Bytes> {
        if self.uploading {
            return Err(StagingError::UploadInFlight);
        }
        let clip = self.slot.as_ref().ok_or(StagingError::NothingStaged)?;
        self.uploading = true;
        Ok(clip.audio.clone())
    }

    /// Empties the slot once the upload outcome is known and returns the
    /// clip, so a successful send can move it onto the timeline and a
    /// failed one can drop it.
    pub fn complete_upload(&mut self) -> Result<PendingClip> {
        if !self.uploading {
            return Err(StagingError::NothingStaged);
        }
        self.uploading = false;
        self.slot.take().ok_or(StagingError::NothingStaged)
    }

    /// Unconditionally empties the slot, dropping any clip and any
    /// in-flight upload bookkeeping. For session teardown only.
    pub fn clear(&mut self) {
        self.slot = None;
        self.uploading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(tag: &'static [u8], secs: u64) -> PendingClip {
        PendingClip::new(Bytes::from_static(tag), secs)
    }

    #[test]
    fn test_second_stage_is_refused() {
        let mut staging = ClipStaging::new();
        staging.stage(clip(b"one", 3)).unwrap();
        let err = staging.stage(clip(b"two", 5)).unwrap_err();
        assert_eq!(err, StagingError::AlreadyStaged);
        // the first clip is still the occupant
        assert_eq!(staging.clip().unwrap().audio, Bytes::from_static(b"one"));
    }

    #[test]
    fn test_discard_empty_is_quiet_noop() {
        let mut staging = ClipStaging::new();
        assert_eq!(staging.discard(), Ok(false));
        assert_eq!(staging.state(), StagingState::Empty);
    }

    #[test]
    fn test_discard_drops_staged_clip() {
        let mut staging = ClipStaging::new();
        staging.stage(clip(b"one", 3)).unwrap();
        assert_eq!(staging.discard(), Ok(true));
        assert_eq!(staging.state(), StagingState::Empty);
        assert!(staging.clip().is_none());
    }

    #[test]
    fn test_upload_flow_locks_the_slot() {
        let mut staging = ClipStaging::new();
        staging.stage(clip(b"one", 3)).unwrap();

        let audio = staging.begin_upload().unwrap();
        assert_eq!(audio, Bytes::from_static(b"one"));
        assert_eq!(staging.state(), StagingState::Uploading);

        // while the upload is in flight the slot cannot be touched
        assert_eq!(staging.discard(), Err(StagingError::UploadInFlight));
        assert_eq!(staging.begin_upload(), Err(StagingError::UploadInFlight));
        // but the clip is still there for local preview
        assert!(staging.clip().is_some());

        let done = staging.complete_upload().unwrap();
        assert_eq!(done.duration_secs, 3);
        assert_eq!(staging.state(), StagingState::Empty);
    }

    #[test]
    fn test_upload_requires_a_staged_clip() {
        let mut staging = ClipStaging::new();
        assert_eq!(staging.begin_upload(), Err(StagingError::NothingStaged));
        assert_eq!(
            staging.complete_upload().unwrap_err(),
            StagingError::NothingStaged
        );
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut staging = ClipStaging::new();
        staging.stage(clip(b"one", 3)).unwrap();
        staging.begin_upload().unwrap();
        staging.clear();
        assert_eq!(staging.state(), StagingState::Empty);
        // a fresh clip can be staged right away
        staging.stage(clip(b"two", 1)).unwrap();
        assert_eq!(staging.state(), StagingState::Staged);
    }
}
