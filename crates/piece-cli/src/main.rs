mod render;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use piece_contracts::analysis::Phase;
use piece_contracts::events::EventWriter;
use piece_contracts::session::{parse_command, SessionCommand, SESSION_HELP_COMMANDS};
use piece_engine::{prepare_image, GeminiClient, GeminiConfig, SessionController, Settled};
use tracing_subscriber::EnvFilter;

use crate::render::{render_state, state_json};

#[derive(Debug, Parser)]
#[command(
    name = "piece-finder",
    version,
    about = "Find where to buy the clothing in a photo"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze one image and print the result.
    Analyze(AnalyzeArgs),
    /// Interactive session: open images, reset, repeat.
    Session(SessionArgs),
}

#[derive(Debug, Args)]
struct ClientArgs {
    /// Overrides PIECE_FINDER_MODEL.
    #[arg(long)]
    model: Option<String>,
    /// Overrides GEMINI_API_BASE.
    #[arg(long)]
    api_base: Option<String>,
    /// Downscale and re-encode images as JPEG before sending.
    #[arg(long)]
    max_dim: Option<u32>,
    /// Append session events to this JSONL file.
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    image: PathBuf,
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    client: ClientArgs,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[command(flatten)]
    client: ClientArgs,
}

const POLL_INTERVAL: Duration = Duration::from_millis(200);

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("piece-finder error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Session(args) => run_session(args),
    }
}

fn build_controller(args: &ClientArgs) -> Result<SessionController> {
    let mut config = GeminiConfig::from_env()?;
    if let Some(model) = args.model.as_deref() {
        config = config.with_model(model);
    }
    if let Some(api_base) = args.api_base.as_deref() {
        config = config.with_api_base(api_base);
    }
    tracing::debug!(?config, "using Gemini configuration");
    let client = GeminiClient::new(config)?;
    let mut controller = SessionController::new(Arc::new(client));
    if let Some(path) = args.events.as_ref() {
        let events = EventWriter::for_new_session(path);
        tracing::info!(
            session_id = events.session_id(),
            path = %events.path().display(),
            "recording session events"
        );
        controller = controller.with_events(events);
    }
    Ok(controller)
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let image = prepare_image(&args.image, args.client.max_dim)?;
    let mut controller = build_controller(&args.client)?;
    controller.select_image(image)?;
    wait_until_settled(&mut controller);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&state_json(controller.state()))?
        );
    } else {
        println!("{}", render_state(controller.state()));
    }
    Ok(if controller.state().phase() == Phase::Complete {
        0
    } else {
        1
    })
}

fn run_session(args: SessionArgs) -> Result<i32> {
    let mut controller = build_controller(&args.client)?;
    let lines = spawn_stdin_reader()?;

    println!("{}", render_state(controller.state()));
    prompt()?;

    loop {
        for settled in controller.poll() {
            if let Settled::Applied { .. } = settled {
                println!();
                println!("{}", render_state(controller.state()));
                prompt()?;
            }
        }

        let line = match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) => line,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                if wait_until_settled(&mut controller) {
                    println!("{}", render_state(controller.state()));
                }
                break;
            }
        };

        match parse_command(&line) {
            SessionCommand::Noop => {}
            SessionCommand::Help => {
                println!("Commands: {}", SESSION_HELP_COMMANDS.join(" "));
            }
            SessionCommand::Status => {
                println!("{}", render_state(controller.state()));
            }
            SessionCommand::Quit => break,
            SessionCommand::Reset => {
                controller.reset();
                println!("{}", render_state(controller.state()));
            }
            SessionCommand::Open(path) => match prepare_image(&path, args.client.max_dim) {
                Ok(image) => match controller.select_image(image) {
                    Ok(_) => println!("{}", render_state(controller.state())),
                    Err(err) => println!("{err}. Type /reset first."),
                },
                Err(err) => println!("Could not read {}: {err:#}", path.display()),
            },
            SessionCommand::Invalid(message) => println!("{message}"),
        }
        prompt()?;
    }
    Ok(0)
}

/// Blocks until the in-flight analysis, if any, has been applied. Returns
/// whether there was one.
fn wait_until_settled(controller: &mut SessionController) -> bool {
    let mut waited = false;
    while controller.state().phase() == Phase::Analyzing {
        waited = true;
        controller.wait(POLL_INTERVAL);
    }
    waited
}

fn spawn_stdin_reader() -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("piece-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

fn prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}
