use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

mod api;
mod app;
mod config;
mod controller;
mod error;
mod handler;
mod input;
mod links;
mod logging;
mod markup;
mod state;
mod suggestions;
mod tui;
mod ui;

use api::SearchClient;
use app::App;
use config::{Config, API_URL_ENV};
use controller::{ChatController, FallbackMessages};
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "grantchat")]
#[command(about = "Chat with a grant search service from your terminal", version)]
struct Cli {
    /// Base URL of the search API (overrides config and GRANTCHAT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Where to write the log (defaults to the user cache directory)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Send one query and print the answer
    Ask {
        /// Your question
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// List every grant the server knows about
    Grants,
    /// List grant categories
    Categories,
    /// Write the current settings to the config file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = logging::init(cli.log_file.clone())?;

    let config = Config::load()?
        .with_overrides(std::env::var(API_URL_ENV).ok(), cli.api_url.clone());
    info!(api = %config.api_base_url, log = %log_path.display(), "starting grantchat");

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_tui(&config).await,
        Commands::Ask { query } => ask(&config, &query.join(" ")).await,
        Commands::Grants => list_grants(&config).await,
        Commands::Categories => list_categories(&config).await,
        Commands::InitConfig => {
            let path = config.save()?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

async fn run_tui(config: &Config) -> Result<()> {
    let mut app = App::new(config)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(tui::TICK_RATE);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    info!("grantchat exiting");
    result
}

fn client(config: &Config) -> Result<SearchClient> {
    Ok(SearchClient::new(&config.api_base_url, config.request_timeout())?)
}

async fn ask(config: &Config, query: &str) -> Result<()> {
    let mut chat = ChatController::new(Arc::new(client(config)?), FallbackMessages::from(config));
    chat.input.set(query);
    if !chat.submit_query() {
        bail!("Query is empty");
    }
    chat.wait_for_response().await;

    let mut first_card = 0;
    for msg in chat.transcript().messages().iter().skip(1) {
        println!("{}", ui::lines_to_plain(&ui::message_lines(msg, first_card, None)));
        first_card += msg.grants.len();
    }
    Ok(())
}

async fn list_grants(config: &Config) -> Result<()> {
    let grants = client(config)?.list_grants().await?;
    if grants.is_empty() {
        println!("No grants available.");
        return Ok(());
    }

    println!("{} grants:\n", grants.len());
    for grant in &grants {
        println!("{}\n", ui::lines_to_plain(&ui::grant_card_lines(grant, false)));
    }
    Ok(())
}

async fn list_categories(config: &Config) -> Result<()> {
    let categories = client(config)?.categories().await?;
    for category in categories {
        println!("{}", category);
    }
    Ok(())
}
