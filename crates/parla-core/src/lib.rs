//! Core types and configuration for parla.
//!
//! This crate provides platform-agnostic types that can be used across
//! all parla sub-crates: the message vocabulary, the chat timeline, the
//! recorder/staging state enums, and the configuration file handling.

mod config;
mod message;
mod state;
mod timeline;

pub use config::{Config, ConfigManager};
pub use message::{
    IdSource, Message, MessageId, PendingClip, Sender, TextMessage, VoiceMessage, format_duration,
};
pub use state::{RecorderState, StagingState};
pub use timeline::Timeline;

/// Application name
pub const APP_NAME: &str = "parla";

/// Pretty application name for display
pub const APP_NAME_PRETTY: &str = "Parla";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";
