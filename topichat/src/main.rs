//! `topichat` — chat client over a topic pub/sub broker.
//!
//! Connects to a broker, joins a room, and runs a line-based chat loop on
//! stdin/stdout. Configuration via CLI flags, environment variables, or
//! config file (`~/.config/topichat/config.toml`).
//!
//! ```bash
//! # Join the default room on a local broker
//! cargo run --bin topichat -- --name alice
//!
//! # Join a specific room on a remote broker
//! cargo run --bin topichat -- --broker-url ws://broker.example.com:8000/ws \
//!     --room lobby --name alice
//!
//! # Only see one peer's messages
//! cargo run --bin topichat -- --name alice --peer bob
//! ```

use std::io;
use std::path::Path;

use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tracing_appender::non_blocking::WorkerGuard;

use topichat::broker::ws::WsBroker;
use topichat::capture::NoCapture;
use topichat::compose::{ComposeError, Composer};
use topichat::config::{CliArgs, ClientConfig};
use topichat::identity::resolve_identity;
use topichat::record::{RecordError, RecordingController};
use topichat::session::{SessionChannel, SessionError};
use topichat_proto::identity::Identity;
use topichat_proto::topic::subscribe_pattern;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logging goes to a file so it never interleaves with the chat output.
    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref());

    tracing::info!("topichat starting");

    // A valid display name is required before anything touches the network.
    let me = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        resolve_identity(config.name.as_deref(), &mut input, &mut output)?
    };

    let peer = match config.peer.as_deref().map(Identity::parse).transpose() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Invalid peer name: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = url::Url::parse(&config.broker_url) {
        eprintln!("Invalid broker URL {:?}: {e}", config.broker_url);
        std::process::exit(2);
    }

    let options = config.connect_options(me.as_str());
    let broker = match WsBroker::connect(&config.broker_url, &options).await {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Could not connect to {}: {e}", config.broker_url);
            std::process::exit(1);
        }
    };
    if broker.session_present() {
        println!("Resumed broker-side session state.");
    }

    let pattern = subscribe_pattern(
        &config.room,
        peer.as_ref().unwrap_or(&me),
        config.subscribe_scope(),
    );
    let session = match SessionChannel::open(broker, &config.room, me, &pattern).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Could not join room {}: {e}", config.room);
            std::process::exit(1);
        }
    };

    println!(
        "Connected to {} as {} (room: {})",
        config.broker_url,
        session.me(),
        config.room
    );
    print_help();

    run_loop(&session, &config).await?;

    session.close().await;
    tracing::info!("topichat exiting");
    Ok(())
}

/// Whether the chat loop should keep running after a handled line.
#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Drives the session: incoming messages from the broker and command
/// lines from stdin, whichever is ready first.
async fn run_loop(session: &SessionChannel<WsBroker>, config: &ClientConfig) -> io::Result<()> {
    let mut composer = Composer::new();
    let mut recorder = RecordingController::new();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            incoming = session.recv_one() => match incoming {
                Ok(record) => println!("{}", record.display_line(&config.timestamp_format)),
                Err(SessionError::Closed) => break,
                Err(e) => {
                    eprintln!("Connection lost: {e}");
                    break;
                }
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let flow =
                    handle_line(line.trim(), session, &mut composer, &mut recorder, config).await;
                if flow == Flow::Quit {
                    break;
                }
            }
        }
    }
    recorder.cancel();
    Ok(())
}

/// Handles one line of user input: a command or a plain text message.
async fn handle_line(
    line: &str,
    session: &SessionChannel<WsBroker>,
    composer: &mut Composer,
    recorder: &mut RecordingController,
    config: &ClientConfig,
) -> Flow {
    match line {
        "/quit" => return Flow::Quit,
        "/help" => print_help(),
        "/record" => match recorder.start(Box::new(NoCapture)) {
            Ok(()) => println!("Recording... /stop to finish."),
            Err(e) => eprintln!("Cannot record: {e}"),
        },
        "/stop" => {
            let elapsed = recorder.elapsed_secs();
            match recorder.stop().await {
                Ok(payload) => {
                    println!(
                        "Recording finished ({elapsed}s, {} staged). /send to publish.",
                        payload.kind_label()
                    );
                    composer.stage(payload);
                }
                Err(RecordError::NotRecording) => eprintln!("Not recording."),
                Err(e) => eprintln!("Recording failed: {e}"),
            }
        }
        "/send" => match composer.take() {
            Some(payload) => {
                send_and_print(session, payload.as_str(), config).await;
            }
            None => eprintln!("Nothing staged. /attach or /record first."),
        },
        "/clear" => {
            composer.clear();
            println!("Staged attachment discarded.");
        }
        _ => {
            if let Some(path) = line.strip_prefix("/attach ") {
                match composer.attach_file(Path::new(path.trim())) {
                    Ok(()) => println!("Attachment staged. /send to publish."),
                    // Unsupported kinds are dropped without comment.
                    Err(e @ ComposeError::UnsupportedFile(_)) => tracing::debug!(%e, "attachment ignored"),
                    Err(e) => eprintln!("Cannot attach: {e}"),
                }
            } else if line.starts_with('/') {
                eprintln!("Unknown command: {line}");
            } else {
                // A sent message supersedes whatever was staged.
                if send_and_print(session, line, config).await {
                    composer.clear();
                }
            }
        }
    }
    Flow::Continue
}

/// Sends content and prints the locally echoed log line.
///
/// Returns whether the message was actually published.
async fn send_and_print(
    session: &SessionChannel<WsBroker>,
    raw: &str,
    config: &ClientConfig,
) -> bool {
    match session.send(raw).await {
        Ok(Some(record)) => {
            println!("{}", record.display_line(&config.timestamp_format));
            true
        }
        Ok(None) => false,
        Err(e) => {
            eprintln!("Send failed: {e}");
            false
        }
    }
}

fn print_help() {
    println!("Commands: /attach <path>, /record, /stop, /send, /clear, /help, /quit");
    println!("Anything else is sent to the room as text.");
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure
/// all buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("topichat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
