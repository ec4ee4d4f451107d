//! Anime Browser CLI application.

use anime_browser::cli::{Command, HELP};
use anime_browser::{App, AppParts};
use anyhow::{Context, Result};
use clap::Parser;
use shared::{Config, DataPaths};
use std::io::Write as _;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Clear cache before running
    #[arg(long)]
    clear_cache: bool,

    /// Initial route, e.g. "#/detail/1" (defaults to the configured home route)
    #[arg(short, long)]
    route: Option<String>,

    /// Render the initial route, print it and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        shared::logging::parse_level(&config.logging.default_level)
    };

    shared::logging::init(shared::LogConfig {
        log_dir: config.log_dir().to_string_lossy().to_string(),
        component: "anime-browser".to_string(),
        default_level: log_level,
        console: config.logging.console,
        file: config.logging.file,
        json_format: config.logging.json_format,
    })?;

    info!("Anime Browser starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    // Initialize data paths
    let data_paths = DataPaths::from_config(&config);
    data_paths
        .create_dirs()
        .context("Failed to create data directories")?;

    let parts = AppParts::from_config(&config)?;
    let initial = args.route.clone().unwrap_or_default();
    let (app, mut changes) = App::build(&config, parts, &initial)?;

    if args.clear_cache {
        info!("Clearing cache");
        app.cache.clear();
    }

    let stats = app.cache.stats();
    info!(
        memory_entries = stats.memory_entries,
        persisted_entries = stats.persisted_entries,
        "Cache statistics"
    );

    app.router.dispatch().settle().await;
    print_screen(&app);

    if args.once {
        return Ok(());
    }

    println!("Type 'help' for commands.");
    prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            dispatch = app.router.next(&mut changes) => {
                let Some(dispatch) = dispatch else { break };
                dispatch.settle().await;
                print_screen(&app);
                prompt();
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read command")? else { break };
                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => handle(&app, command).await,
                    Ok(None) => {}
                    Err(message) => println!("{}", message),
                }
                prompt();
            }
        }
    }

    info!("Anime Browser finished");
    Ok(())
}

async fn handle(app: &App, command: Command) {
    match command {
        Command::Navigate(fragment) => navigate(app, &fragment).await,
        Command::Back => {
            if !app.router.back() {
                println!("No earlier page");
            }
        }
        Command::Forward => {
            if !app.router.forward() {
                println!("No later page");
            }
        }
        Command::Search(query) => {
            app.search.set(&query);
            navigate(app, "#/search").await;
        }
        Command::Quotes { character, show } => {
            app.quotes_view.set_filters(&character, &show);
            navigate(app, "#/quotes").await;
        }
        Command::RandomQuote => {
            if app.document.section().as_deref() != Some("quotes") {
                println!("Open #/quotes first");
                return;
            }
            app.quotes_view.load_random_quote(app.router.context()).await;
            print_screen(app);
        }
        Command::Next => page(app, 1).await,
        Command::Prev => page(app, -1).await,
        Command::Retry(container) => match app.document.retry(&container) {
            Some(load) => {
                load.await;
                print_screen(app);
            }
            None => println!("Nothing to retry in '{}'", container),
        },
        Command::Show => print_screen(app),
        Command::CacheStats => {
            let stats = app.cache.stats();
            println!(
                "Cache: {} entries in memory, {} persisted",
                stats.memory_entries, stats.persisted_entries
            );
        }
        Command::CacheClear => {
            app.cache.clear();
            println!("Cache cleared");
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

/// Page the search results or quotes on screen
async fn page(app: &App, delta: i64) {
    let ctx = app.router.context();
    let moved = match app.document.section().as_deref() {
        Some("search") => match app.search_view.change_page(ctx, delta) {
            Some(load) => {
                load.await;
                true
            }
            None => false,
        },
        Some("quotes") if delta > 0 => app.quotes_view.next_page(&ctx),
        Some("quotes") => app.quotes_view.prev_page(&ctx),
        _ => {
            println!("Nothing to page here");
            return;
        }
    };

    if moved {
        print_screen(app);
    } else {
        println!("No more pages");
    }
}

/// Navigate and, when the route re-renders in place, wait for it
async fn navigate(app: &App, fragment: &str) {
    if let Some(dispatch) = app.router.navigate(fragment) {
        dispatch.settle().await;
        print_screen(app);
    }
}

fn print_screen(app: &App) {
    println!();
    print!("{}", app.document.render());

    let retryable = app.document.retryable();
    if !retryable.is_empty() {
        println!("(retry available: {})", retryable.join(", "));
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
