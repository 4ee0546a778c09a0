use std::sync::Arc;

use anyhow::{Context, Result};
use parla::event::SessionEvent;
use parla::playback::PlaybackKey;
use parla::session::{ChatSession, SessionCommand};
use parla::{
    APP_NAME_PRETTY, ConfigManager, DEFAULT_LOG_LEVEL, HttpGatewayConfig, HttpVoiceGateway,
    Message, MessageId, MicBackend, RodioBackend, Sender, format_duration,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize the logger
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PARLA_LOG")
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .init();

    // Load config
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load()?;
    // save back the config to create the file if it doesn't exist
    config_manager.save(&config)?;
    info!(config_path = ?config_manager.config_path(), server_url = config.server_url(), "config loaded");

    // Wire the gateway from the config
    let mut gateway_config =
        HttpGatewayConfig::new(config.server_url()).with_timeout(config.upload_timeout());
    if let Some(token) = config.auth_token() {
        gateway_config = gateway_config.with_auth_token(token);
    }
    let gateway = Arc::new(HttpVoiceGateway::new(gateway_config));

    // Real devices
    let capture = Box::new(MicBackend::new());
    let player = Box::new(RodioBackend::new().context("Failed to open audio output")?);

    let (session, commands, events) = ChatSession::new(config, capture, player, gateway);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    // The session future owns the device handles and is not Send, so it
    // stays on this thread; only uploads run on the worker.
    runtime.block_on(async move {
        tokio::join!(session.run(), repl(commands, events));
    });

    // The stdin reader may still be parked in a blocking read; don't wait
    // for it.
    runtime.shutdown_background();

    Ok(())
}

/// Line-oriented front end: renders session events and turns typed
/// commands into session commands.
async fn repl(
    commands: UnboundedSender<SessionCommand>,
    mut events: UnboundedReceiver<SessionEvent>,
) {
    println!("{APP_NAME_PRETTY} {}", parla::VERSION);
    print_help();

    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else { break };
                render(&event, &mut history);
            }
            maybe_line = lines.next_line() => {
                match maybe_line {
                    Ok(Some(line)) => {
                        if !dispatch(line.trim(), &commands, &history) {
                            break;
                        }
                    }
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }

    commands.send(SessionCommand::Shutdown).ok();
}

/// Returns false when the repl should exit.
fn dispatch(line: &str, commands: &UnboundedSender<SessionCommand>, history: &[Message]) -> bool {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return true;
    };

    let command = match cmd {
        "record" | "r" => SessionCommand::StartRecording,
        "stop" | "s" => SessionCommand::StopRecording,
        "send" => SessionCommand::Send,
        "discard" | "d" => SessionCommand::Discard,
        "play" | "p" => match parts.next() {
            None | Some("pending") => SessionCommand::TogglePlayback(PlaybackKey::Pending),
            Some(id) => match id.parse::<u64>() {
                Ok(id) => SessionCommand::TogglePlayback(PlaybackKey::Message(MessageId(id))),
                Err(_) => {
                    eprintln!("play takes a message id or 'pending'");
                    return true;
                }
            },
        },
        "history" => {
            if history.is_empty() {
                println!("(no messages yet)");
            }
            for message in history {
                print_message(message);
            }
            return true;
        }
        "help" | "h" | "?" => {
            print_help();
            return true;
        }
        "quit" | "q" | "exit" => return false,
        other => {
            eprintln!("unknown command: {other} (try 'help')");
            return true;
        }
    };

    commands.send(command).is_ok()
}

fn render(event: &SessionEvent, history: &mut Vec<Message>) {
    match event {
        SessionEvent::RecordingStarted => println!("recording... type 'stop' when done"),
        SessionEvent::RecordingTick { elapsed_secs } => {
            println!("recording {}", format_duration(*elapsed_secs));
        }
        SessionEvent::RecordingFailed { reason } => println!("recording failed: {reason}"),
        SessionEvent::ClipStaged { duration_secs } => {
            println!(
                "clip ready ({}): 'send', 'play pending', or 'discard'",
                format_duration(*duration_secs)
            );
        }
        SessionEvent::ClipDiscarded => println!("clip discarded"),
        SessionEvent::UploadStarted => println!("sending..."),
        SessionEvent::TimelineAppended(message) => {
            print_message(message);
            history.push(message.clone());
        }
        SessionEvent::PlaybackChanged { playing } => match playing {
            Some(PlaybackKey::Pending) => println!("playing the pending clip"),
            Some(PlaybackKey::Message(id)) => println!("playing message {id}"),
            None => println!("playback stopped"),
        },
    }
}

fn print_message(message: &Message) {
    let who = match message.sender() {
        Sender::User => "you",
        Sender::Assistant => "assistant",
    };
    match message {
        Message::Voice(v) => {
            println!(
                "[{}] {who}: voice clip, {}",
                v.id,
                format_duration(v.duration_secs)
            );
        }
        Message::Text(t) => println!("[{}] {who}: {}", t.id, t.body),
    }
}

fn print_help() {
    println!("commands:");
    println!("  record            start recording");
    println!("  stop              stop and stage the clip");
    println!("  play [pending|id] toggle playback of the staged clip or a message");
    println!("  send              upload the staged clip");
    println!("  discard           drop the staged clip");
    println!("  history           print the timeline");
    println!("  quit              exit");
}
