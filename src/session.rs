//! The chat session: one event loop owning every piece of voice state
//! for a conversation. Commands come in over a channel, observable state
//! changes go out as [`SessionEvent`]s, and each event is handled to
//! completion before the next one is looked at.
//!
//! The loop future is not `Send` (it owns device handles), so it runs on
//! the thread that created it, block_on style. Only the upload itself is
//! spawned; its outcome comes back to the loop over a channel.

use std::sync::Arc;
use std::time::Duration;

use parla_audio::{CaptureBackend, PlayerBackend};
use parla_core::{Config, IdSource, Message, Sender, StagingState, TextMessage, Timeline};
use parla_gateway::{UploadReply, VoiceGateway};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, Interval, interval_at};
use tracing::{error, info, warn};

use crate::event::SessionEvent;
use crate::playback::{PlaybackDone, PlaybackKey, PlaybackRegistry};
use crate::recorder::{RecordingController, StartOutcome};
use crate::staging::ClipStaging;

/// Acknowledgement shown when the server reply carries no text.
pub const DEFAULT_ACK: &str = "Voice message received successfully!";

/// Timeline notice shown when an upload fails.
pub const UPLOAD_ERROR_TEXT: &str =
    "Sorry, there was an error processing your voice message. Please try again.";

/// Commands accepted by the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    StartRecording,
    StopRecording,
    /// Upload the staged clip
    Send,
    /// Drop the staged clip
    Discard,
    TogglePlayback(PlaybackKey),
    Shutdown,
}

type UploadOutcome = parla_gateway::Result<UploadReply>;

pub struct ChatSession {
    config: Config,
    recorder: RecordingController,
    staging: ClipStaging,
    playback: PlaybackRegistry,
    gateway: Arc<dyn VoiceGateway>,
    timeline: Timeline,
    ids: IdSource,
    events: UnboundedSender<SessionEvent>,
    commands: UnboundedReceiver<SessionCommand>,
    // Armed only while recording; its first fire lands one period after
    // start.
    ticker: Option<Interval>,
    upload_tx: UnboundedSender<UploadOutcome>,
    upload_rx: UnboundedReceiver<UploadOutcome>,
    done_rx: UnboundedReceiver<PlaybackDone>,
}

impl ChatSession {
    /// Builds a session around the given devices and gateway. Returns the
    /// session together with the command sender and event receiver that
    /// the caller's UI holds on to.
    pub fn new(
        config: Config,
        capture: Box<dyn CaptureBackend>,
        player: Box<dyn PlayerBackend>,
        gateway: Arc<dyn VoiceGateway>,
    ) -> (
        Self,
        UnboundedSender<SessionCommand>,
        UnboundedReceiver<SessionEvent>,
    ) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (upload_tx, upload_rx) = mpsc::unbounded_channel();

        let session = Self {
            config,
            recorder: RecordingController::new(capture),
            staging: ClipStaging::new(),
            playback: PlaybackRegistry::new(player, done_tx),
            gateway,
            timeline: Timeline::new(),
            ids: IdSource::new(),
            events: event_tx,
            commands: command_rx,
            ticker: None,
            upload_tx,
            upload_rx,
            done_rx,
        };
        (session, command_tx, event_rx)
    }

    /// Runs the session until `Shutdown` arrives or every command sender
    /// is dropped, then tears everything down: ticker, microphone, staged
    /// clip and playback sinks.
    pub async fn run(mut self) {
        info!(gateway = self.gateway.name(), "session started");
        loop {
            tokio::select! {
                maybe_cmd = self.commands.recv() => {
                    let Some(cmd) = maybe_cmd else { break };
                    match cmd {
                        SessionCommand::StartRecording => self.on_start(),
                        SessionCommand::StopRecording => self.on_stop(),
                        SessionCommand::Send => self.on_send(),
                        SessionCommand::Discard => self.on_discard(),
                        SessionCommand::TogglePlayback(key) => self.on_toggle(key),
                        SessionCommand::Shutdown => {
                            info!("shutdown requested");
                            break;
                        }
                    }
                }
                _ = tick_or_never(self.ticker.as_mut()) => {
                    self.on_tick();
                }
                Some(outcome) = self.upload_rx.recv() => {
                    self.on_upload_outcome(outcome);
                }
                Some(done) = self.done_rx.recv() => {
                    self.on_playback_done(done);
                }
            }
        }
        self.teardown();
    }

    fn on_start(&mut self) {
        if self.staging.state() != StagingState::Empty {
            warn!("start refused: a clip is staged for review");
            self.emit(SessionEvent::RecordingFailed {
                reason: "send or discard the staged clip first".to_string(),
            });
            return;
        }
        match self.recorder.start() {
            Ok(StartOutcome::Started) => {
                self.ticker = Some(recording_ticker());
                self.emit(SessionEvent::RecordingStarted);
            }
            Ok(StartOutcome::AlreadyRecording) => {}
            Err(e) => {
                error!(error = %e, "failed to start recording");
                self.emit(SessionEvent::RecordingFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn on_tick(&mut self) {
        let Some(elapsed_secs) = self.recorder.tick() else {
            // A tick that raced a stop; nothing is recording anymore.
            return;
        };
        self.emit(SessionEvent::RecordingTick { elapsed_secs });
        if elapsed_secs >= self.config.max_clip_secs {
            info!(elapsed_secs, "maximum clip length reached, stopping");
            self.on_stop();
        }
    }

    fn on_stop(&mut self) {
        // Disarm the ticker before touching the recorder so no further
        // tick can land on this recording.
        self.ticker = None;
        match self.recorder.stop() {
            Ok(Some(clip)) => {
                let duration_secs = clip.duration_secs;
                match self.staging.stage(clip) {
                    Ok(()) => self.emit(SessionEvent::ClipStaged { duration_secs }),
                    Err(e) => {
                        // Start refuses to run while a clip is staged, so an
                        // occupied slot here means the clip has nowhere to go.
                        error!(error = %e, "dropping clip that cannot be staged");
                    }
                }
            }
            Ok(None) => {} // already idle; stop is idempotent
            Err(e) => {
                error!(error = %e, "failed to finalize recording");
                self.emit(SessionEvent::RecordingFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn on_send(&mut self) {
        let audio = match self.staging.begin_upload() {
            Ok(audio) => audio,
            Err(e) => {
                warn!(error = %e, "send refused");
                return;
            }
        };
        self.emit(SessionEvent::UploadStarted);

        let gateway = self.gateway.clone();
        let outcome_tx = self.upload_tx.clone();
        tokio::spawn(async move {
            let outcome = gateway.upload(audio).await;
            outcome_tx.send(outcome).ok();
        });
    }

    fn on_upload_outcome(&mut self, outcome: UploadOutcome) {
        let clip = match self.staging.complete_upload() {
            Ok(clip) => clip,
            Err(e) => {
                warn!(error = %e, "upload outcome with no staged clip");
                return;
            }
        };
        // Whatever happened on the wire, the preview handle is done.
        self.remove_playback(PlaybackKey::Pending);

        match outcome {
            Ok(reply) => {
                info!(gateway = self.gateway.name(), "upload succeeded");
                let voice = clip.into_voice_message(self.ids.next());
                self.append(Message::Voice(voice));
                let body = reply.text().unwrap_or(DEFAULT_ACK).to_string();
                self.append_text(body, Sender::Assistant);
            }
            Err(e) => {
                error!(error = %e, "upload failed");
                self.append_text(UPLOAD_ERROR_TEXT.to_string(), Sender::Assistant);
            }
        }
    }

    fn on_discard(&mut self) {
        match self.staging.discard() {
            Ok(true) => {
                self.remove_playback(PlaybackKey::Pending);
                self.emit(SessionEvent::ClipDiscarded);
            }
            Ok(false) => {} // nothing staged; discard is a no-op
            Err(e) => warn!(error = %e, "discard refused"),
        }
    }

    fn on_toggle(&mut self, key: PlaybackKey) {
        let audio = match key {
            PlaybackKey::Pending => self.staging.clip().map(|c| c.audio.clone()),
            PlaybackKey::Message(id) => self.timeline.voice(id).map(|v| v.audio.clone()),
        };
        let Some(audio) = audio else {
            warn!(?key, "toggle refused: no such clip");
            return;
        };
        let playing = self.playback.toggle(key, &audio);
        self.emit(SessionEvent::PlaybackChanged { playing });
    }

    fn on_playback_done(&mut self, done: PlaybackDone) {
        if self.playback.on_finished(done) {
            self.emit(SessionEvent::PlaybackChanged { playing: None });
        }
    }

    fn teardown(&mut self) {
        self.ticker = None;
        self.recorder.abort();
        self.staging.clear();
        self.playback.shutdown();
        self.timeline.clear();
        info!("session ended");
    }

    fn append(&mut self, message: Message) {
        self.timeline.append(message.clone());
        self.emit(SessionEvent::TimelineAppended(message));
    }

    fn append_text(&mut self, body: String, sender: Sender) {
        let message = Message::Text(TextMessage {
            id: self.ids.next(),
            body,
            sender,
        });
        self.append(message);
    }

    fn remove_playback(&mut self, key: PlaybackKey) {
        let before = self.playback.playing();
        self.playback.remove(key);
        if before != self.playback.playing() {
            self.emit(SessionEvent::PlaybackChanged {
                playing: self.playback.playing(),
            });
        }
    }

    fn emit(&self, event: SessionEvent) {
        self.events.send(event).ok();
    }
}

/// 1 Hz recording ticker whose first fire lands one second after start.
fn recording_ticker() -> Interval {
    let period = Duration::from_secs(1);
    interval_at(Instant::now() + period, period)
}

/// Resolves on the next ticker fire, or never when no ticker is armed.
async fn tick_or_never(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
