mod commands;
mod config;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use panel_core::{
    ordering::display_groups, page::page_key_for, Controller, LogView, MissingCaptureService,
    PanelDeps, StaticTabResolver, Tab, WsPageConnector,
};
use shared::domain::{PageKey, TabId, WindowId};
use storage::{StateStore, Storage, INITIAL_NEXT_ID};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use commands::{describe, parse_command, PanelCommand, HELP};
use config::{load_settings, prepare_database_url};

#[derive(Parser, Debug)]
#[command(name = "panel", about = "Screen badge panel: page state tools and a live session driver")]
struct Cli {
    /// Overrides the configured database url.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the storage key for a page url, or report it restricted.
    PageKey { url: String },
    /// Print the badges stored for a page.
    Show { url: String },
    /// Delete every badge stored for a page and reset its id counter.
    Clear { url: String },
    /// List pages with stored badges.
    Pages,
    /// Bind to a page overlay and drive the panel from stdin.
    Attach {
        #[arg(long)]
        tab_id: i64,
        #[arg(long)]
        url: String,
        #[arg(long, default_value_t = 1)]
        window_id: i64,
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();

    if let Command::PageKey { url } = &cli.command {
        match page_key_for(url) {
            Some(key) => println!("{key}"),
            None => println!("restricted: {url}"),
        }
        return Ok(());
    }

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|err| {
        error!(%database_url, error = %err, "failed to open panel storage");
        err
    })?;

    match cli.command {
        Command::PageKey { .. } => {}
        Command::Show { url } => {
            let key = require_page_key(&url)?;
            let state = storage.load_page_state(&key).await?;
            println!("page: {key}  next id: {}", state.next_id);
            for group in display_groups(&state.items) {
                println!("[{}]", group.group.unwrap_or("ungrouped"));
                for item in group.items {
                    println!("  {:>3} #{} {}", item.label, item.id, item.anchor.selector);
                }
            }
        }
        Command::Clear { url } => {
            let key = require_page_key(&url)?;
            let mut state = storage.load_page_state(&key).await?;
            let removed = state.items.len();
            state.items.clear();
            state.next_id = INITIAL_NEXT_ID;
            storage.save_page_state(&key, &state).await?;
            println!("cleared {removed} badges from {key}");
        }
        Command::Pages => {
            for page in storage.list_pages().await? {
                println!(
                    "{}  items={} next_id={} updated={}",
                    page.page_key,
                    page.item_count,
                    page.next_id,
                    page.updated_at.to_rfc3339()
                );
            }
        }
        Command::Attach {
            tab_id,
            url,
            window_id,
            endpoint,
        } => {
            let endpoint = endpoint.unwrap_or_else(|| settings.page_endpoint.clone());
            let tab = Tab {
                id: TabId(tab_id),
                window_id: WindowId(window_id),
                url,
            };
            attach(storage, tab, &endpoint, &settings).await?;
        }
    }

    Ok(())
}

fn require_page_key(url: &str) -> Result<PageKey> {
    page_key_for(url).ok_or_else(|| anyhow!("page is restricted or not a web page: {url}"))
}

async fn attach(
    storage: Storage,
    tab: Tab,
    endpoint: &str,
    settings: &config::Settings,
) -> Result<()> {
    info!(tab_id = %tab.id, url = %tab.url, endpoint, "attaching panel");
    let controller = Controller::spawn(
        PanelDeps {
            tabs: Arc::new(StaticTabResolver::new(Some(tab))),
            connector: Arc::new(WsPageConnector::new(endpoint)),
            store: Arc::new(storage),
            capture: Arc::new(MissingCaptureService),
            view: Arc::new(LogView),
        },
        settings.controller_settings(),
    );

    let liveness = controller.ensure_connection_alive(false).await;
    controller.settle().await;
    print!("{}", describe(&controller.model()));
    if !liveness.alive {
        println!("page not reachable; 'reconnect' to retry");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("error: {err}");
                continue;
            }
        };
        match command {
            PanelCommand::Dispatch(action) => {
                if let Err(err) = controller.dispatch(action) {
                    println!("rejected: {err}");
                }
                controller.settle().await;
            }
            PanelCommand::Status => print!("{}", describe(&controller.model())),
            PanelCommand::Reconnect => {
                let liveness = controller.ensure_connection_alive(true).await;
                controller.settle().await;
                println!(
                    "alive: {}  page changed: {}",
                    liveness.alive, liveness.page_changed
                );
            }
            PanelCommand::Help => println!("{HELP}"),
            PanelCommand::Quit => break,
        }
    }

    controller.disconnect().await;
    Ok(())
}
