use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use parley_core::{
    spawn_reply, Accumulator, ChatRole, Config, HistoryPolicy, HttpResponder, Overrides,
    ReplyEvent, ResponseMode, Settings,
};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "parley", version)]
#[command(about = "Chat with a remote chat endpoint, with replies shown as they stream in")]
struct Cli {
    /// Chat endpoint URL
    #[arg(long, global = true, env = "PARLEY_ENDPOINT")]
    endpoint: Option<String>,
    /// How replies are read: stream or whole
    #[arg(long, global = true, env = "PARLEY_MODE")]
    mode: Option<ResponseMode>,
    /// Prior messages sent with each request: none, all, or a count
    #[arg(long, global = true, env = "PARLEY_HISTORY")]
    history: Option<HistoryPolicy>,
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Send one message and print the reply as it arrives
    Ask {
        /// Your message
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Check that the chat service is up
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let settings = config.resolve(Overrides {
        endpoint: cli.endpoint.clone(),
        mode: cli.mode,
        history: cli.history,
    });

    let responder = HttpResponder::new(&settings.endpoint, settings.mode)?
        .with_prompt_field(settings.prompt_field.clone());

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            logging::init_file(&Config::config_dir()?)?;
            run_tui(settings, responder).await
        }
        Commands::Ask { text } => {
            logging::init_stderr()?;
            ask(&settings, responder, &text.join(" ")).await
        }
        Commands::Health => {
            logging::init_stderr()?;
            health(&responder).await
        }
    }
}

async fn run_tui(settings: Settings, responder: HttpResponder) -> Result<()> {
    info!(endpoint = %settings.endpoint, mode = %settings.mode, history = %settings.history, "starting chat");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut app = App::new(&settings, Arc::new(responder));

    let result = run_loop(&mut terminal, &mut app).await;

    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(app, event),
                None => break,
            },
            reply = app.next_reply() => app.on_reply(reply),
        }
    }

    Ok(())
}

async fn ask(settings: &Settings, responder: HttpResponder, text: &str) -> Result<()> {
    let mut chat = Accumulator::new(settings.history);
    let Some(request) = chat.submit(text) else {
        bail!("nothing to send: the message is empty");
    };

    let (mut rx, _task) = spawn_reply(Arc::new(responder), request);
    let mut stdout = io::stdout().lock();
    let mut printed = 0; // bytes of the reply already written
    let mut failure = None;

    while chat.is_pending() {
        match rx.recv().await {
            Some(ReplyEvent::Failed(err)) => {
                failure = Some(err.to_string());
                chat.apply(ReplyEvent::Failed(err));
            }
            Some(event) => chat.apply(event),
            None => {
                failure = Some("reply ended unexpectedly".to_string());
                chat.abandon();
            }
        }

        if failure.is_some() {
            break;
        }
        // The reply only grows until it resolves
        if let Some(last) = chat.messages().last().filter(|m| m.role == ChatRole::Assistant) {
            if last.content.len() > printed {
                write!(stdout, "{}", &last.content[printed..])?;
                stdout.flush()?;
                printed = last.content.len();
            }
        }
    }

    if printed > 0 {
        writeln!(stdout)?;
    }
    if let Some(detail) = failure {
        eprintln!("{}", chat.error_text());
        bail!(detail);
    }
    Ok(())
}

async fn health(responder: &HttpResponder) -> Result<()> {
    let status = responder
        .health()
        .await
        .with_context(|| format!("probing {}", responder.endpoint()))?;
    println!("{}: {}", responder.endpoint(), status);
    Ok(())
}
