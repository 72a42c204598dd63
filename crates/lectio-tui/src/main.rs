use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::{info, warn};

mod app;
mod handler;
mod layout;
mod logging;
mod tui;
mod ui;

use app::App;
use lectio_core::{Canon, Config, Reader, SupabaseClient};
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "lectio", version)]
#[command(about = "Read the Bible continuously across chapters and books")]
struct Cli {
    /// Reference to open, e.g. "John 3:16" or "1 cor 13"
    reference: Option<String>,

    /// Base URL of the verse service REST endpoint
    #[arg(long)]
    api_url: Option<String>,

    /// Translation code to request
    #[arg(long)]
    translation: Option<String>,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = Config::config_dir()?;
    let log_path = logging::init_logging(&config_dir, cli.verbose)
        .with_context(|| format!("could not open log file in {}", config_dir.display()))?;
    info!(log = %log_path.display(), "starting");

    let mut config = Config::load().context("failed to load config")?;
    if let Some(url) = cli.api_url {
        config.base_url = Some(url);
    }
    if let Some(translation) = cli.translation {
        config.translation = Some(translation);
    }

    let client = SupabaseClient::from_config(&config)
        .context("pass --api-url or add base_url to the config file")?;

    let canon = match Reader::load_canon(&client).await {
        Ok(canon) if !canon.is_empty() => canon,
        Ok(_) => {
            warn!("verse service returned an empty canon, using the built-in one");
            Canon::standard()
        }
        Err(e) => {
            warn!(error = %e, "could not load canon, using the built-in one");
            Canon::standard()
        }
    };

    let reference = cli
        .reference
        .unwrap_or_else(|| config.start_reference().to_string());

    let mut events = EventHandler::new();
    let mut reader = Reader::new(canon);
    reader.set_search_input(reference);
    let mut app = App::new(reader, client, events.sender());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    app.search();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;
        if app.after_draw() {
            continue;
        }

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }

    Ok(())
}
