// Re-export from sub-crates
pub use parla_audio::{
    CaptureBackend, CaptureError, CaptureStream, ClipSink, EndOfClip, MicBackend, PlaybackError,
    PlayerBackend, RodioBackend,
};
pub use parla_core::{
    APP_NAME, APP_NAME_PRETTY, Config, ConfigManager, DEFAULT_LOG_LEVEL, IdSource, Message,
    MessageId, PendingClip, RecorderState, Sender, StagingState, TextMessage, Timeline,
    VoiceMessage, format_duration,
};
pub use parla_gateway::{
    GatewayError, HttpGatewayConfig, HttpVoiceGateway, UploadReply, VoiceGateway,
};

// App-specific modules
pub mod event;
pub mod playback;
pub mod recorder;
pub mod session;
pub mod staging;

#[cfg(test)]
mod testutil;

// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
