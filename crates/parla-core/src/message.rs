//! Message vocabulary for the chat timeline.
//!
//! A timeline entry is either a voice message (a recorded clip plus its
//! duration) or a text message (server acknowledgements and error notices).
//! Identifiers are wall-clock derived but strictly monotonic, so two
//! messages created within the same millisecond still sort correctly.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Unique identifier for a timeline message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates [`MessageId`]s from the wall clock with a monotonic bump.
///
/// Ids are unix-epoch milliseconds, except that an id is never less than
/// or equal to the previously issued one.
#[derive(Debug, Default)]
pub struct IdSource {
    last: u64,
}

impl IdSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next identifier, strictly greater than any issued before.
    pub fn next(&mut self) -> MessageId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        self.last = now.max(self.last + 1);
        MessageId(self.last)
    }
}

/// Who authored a timeline message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    /// The local user
    User,
    /// The remote assistant/server
    Assistant,
}

/// A recorded voice clip that has appeared on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceMessage {
    pub id: MessageId,
    /// Complete encoded audio (WAV container)
    pub audio: Bytes,
    /// Clip length in whole seconds
    pub duration_secs: u64,
    pub sender: Sender,
}

/// A plain text timeline entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMessage {
    pub id: MessageId,
    pub body: String,
    pub sender: Sender,
}

/// A single timeline entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Voice(VoiceMessage),
    Text(TextMessage),
}

impl Message {
    pub fn id(&self) -> MessageId {
        match self {
            Message::Voice(v) => v.id,
            Message::Text(t) => t.id,
        }
    }

    pub fn sender(&self) -> Sender {
        match self {
            Message::Voice(v) => v.sender,
            Message::Text(t) => t.sender,
        }
    }

    /// Returns the voice payload if this entry is a voice message.
    pub fn as_voice(&self) -> Option<&VoiceMessage> {
        match self {
            Message::Voice(v) => Some(v),
            Message::Text(_) => None,
        }
    }
}

/// A finished clip held in the staging slot, not yet on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingClip {
    /// Complete encoded audio (WAV container)
    pub audio: Bytes,
    /// Clip length in whole seconds, captured when recording stopped
    pub duration_secs: u64,
}

impl PendingClip {
    pub fn new(audio: Bytes, duration_secs: u64) -> Self {
        Self {
            audio,
            duration_secs,
        }
    }

    /// Promotes the clip to a user voice message with the given id.
    pub fn into_voice_message(self, id: MessageId) -> VoiceMessage {
        VoiceMessage {
            id,
            audio: self.audio,
            duration_secs: self.duration_secs,
            sender: Sender::User,
        }
    }
}

/// Formats a duration in seconds as `M:SS` (e.g. `0:07`, `1:05`, `12:00`).
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_source_strictly_increasing() {
        let mut ids = IdSource::new();
        let a = ids.next();
        let b = ids.next();
        let c = ids.next();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(7), "0:07");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(60), "1:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(305), "5:05");
        assert_eq!(format_duration(720), "12:00");
    }

    #[test]
    fn test_pending_clip_into_voice_message() {
        let clip = PendingClip::new(Bytes::from_static(b"RIFF"), 42);
        let msg = clip.clone().into_voice_message(MessageId(7));
        assert_eq!(msg.id, MessageId(7));
        assert_eq!(msg.audio, clip.audio);
        assert_eq!(msg.duration_secs, 42);
        assert_eq!(msg.sender, Sender::User);
    }

    #[test]
    fn test_message_accessors() {
        let voice = Message::Voice(VoiceMessage {
            id: MessageId(1),
            audio: Bytes::new(),
            duration_secs: 3,
            sender: Sender::User,
        });
        let text = Message::Text(TextMessage {
            id: MessageId(2),
            body: "ok".to_string(),
            sender: Sender::Assistant,
        });
        assert_eq!(voice.id(), MessageId(1));
        assert_eq!(voice.sender(), Sender::User);
        assert!(voice.as_voice().is_some());
        assert_eq!(text.id(), MessageId(2));
        assert_eq!(text.sender(), Sender::Assistant);
        assert!(text.as_voice().is_none());
    }
}
