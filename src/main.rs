mod catalog;
mod config;
mod llm;
mod recommend;
mod session;
mod view;

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::recommend::RecommendationClient;
use crate::session::{Phase, SessionHandle, SessionRuntime, ViewState};

fn print_help() {
    println!(
        "\
product-recommender v{}

Type what you are looking for and press Enter; a generative model picks
matching products from the catalog.

USAGE:
    product-recommender [OPTIONS] [CONFIG_PATH]

ARGUMENTS:
    CONFIG_PATH    Path to TOML configuration file [default: config/recommender.toml]

OPTIONS:
    -h, --help       Print this help message and exit
    -V, --version    Print version and exit

ENVIRONMENT VARIABLES:
    Variables are referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG          Log level filter for tracing
                      (e.g. debug, product_recommender=debug,warn)
    GOOGLE_API_KEY    API key for Gemini models
                      (from https://aistudio.google.com/)

EXAMPLES:
    product-recommender                              # uses config/recommender.toml
    product-recommender ~/.config/recommender.toml   # custom config path
    RUST_LOG=debug product-recommender               # log raw model replies",
        env!("CARGO_PKG_VERSION"),
    );
}

fn print_commands() {
    println!(
        "\
Commands:
  <text>   Ask for recommendations
  <empty>  Show the full catalog
  /status  Model, catalog size and current state
  /help    This message
  /quit    Exit

Any other line, even one starting with '/', is sent as a query."
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --help / --version before anything else
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("product-recommender v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
    }

    // Logs go to stderr so the rendered catalog on stdout stays readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("product_recommender=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/recommender.toml".to_string());

    info!("Loading configuration from {config_path}");
    let config = Config::load(&config_path)?;

    let catalog = Arc::new(Catalog::load_or_bundled(config.catalog.path.as_deref())?);
    let llm = llm::build_client(&config.llm)?;
    let recommender = Arc::new(RecommendationClient::new(llm));
    let model = recommender.description();

    info!("LLM: {model}");
    match config.llm.timeout() {
        Some(timeout) => info!("Request timeout: {}s", timeout.as_secs()),
        None => info!("Request timeout: disabled"),
    }

    let (runtime, handle) = SessionRuntime::new(Arc::clone(&catalog), recommender);
    let session = tokio::spawn(runtime.run());
    let renderer = tokio::spawn(render_loop(
        handle.state.clone(),
        config.display.currency_symbol.clone(),
    ));

    println!("{}", view::PROMPT_HINT);
    print_commands();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interrupted = false;
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, exiting");
                interrupted = true;
                break;
            }
        };

        // EOF on stdin
        let Some(line) = line else { break };

        match parse_line(line.trim()) {
            LineAction::Quit => break,
            LineAction::Help => print_commands(),
            LineAction::Status => print_status(&handle, &model, catalog.len()),
            LineAction::Query(query) => {
                if let Err(e) = handle.submit(query).await {
                    error!("{e}");
                    break;
                }
            }
        }
    }

    drop(handle);
    if interrupted {
        session.abort();
        renderer.abort();
        return Ok(());
    }

    // The session finishes the pending request; the renderer prints its
    // outcome and stops once the session is gone.
    tokio::select! {
        result = session => result??,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, exiting");
            renderer.abort();
            return Ok(());
        }
    }
    renderer.await?;
    Ok(())
}

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
enum LineAction<'a> {
    Quit,
    Help,
    Status,
    Query(&'a str),
}

/// Only exact command words are intercepted; everything else is a query.
fn parse_line(input: &str) -> LineAction<'_> {
    match input {
        "/quit" | "/exit" => LineAction::Quit,
        "/help" => LineAction::Help,
        "/status" => LineAction::Status,
        _ => LineAction::Query(input),
    }
}

/// Re-renders on every published state change.
async fn render_loop(mut state: tokio::sync::watch::Receiver<ViewState>, symbol: String) {
    loop {
        let screen = view::render(&state.borrow_and_update(), &symbol);
        println!("{screen}");
        if state.changed().await.is_err() {
            break;
        }
    }
}

fn print_status(handle: &SessionHandle, model: &str, catalog_size: usize) {
    let state = handle.state.borrow();
    let phase = match state.phase() {
        Phase::Idle => "idle",
        Phase::Loading => "loading",
        Phase::Error => "error",
    };
    println!(
        "Model: {model}\n\
         Catalog: {catalog_size} products\n\
         State: {phase}\n\
         Showing: {} products",
        state.results.len(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_commands() {
        assert_eq!(parse_line("/quit"), LineAction::Quit);
        assert_eq!(parse_line("/exit"), LineAction::Quit);
        assert_eq!(parse_line("/help"), LineAction::Help);
        assert_eq!(parse_line("/status"), LineAction::Status);
    }

    #[test]
    fn test_parse_line_slash_query_is_submitted() {
        assert_eq!(
            parse_line("/2 budget phones"),
            LineAction::Query("/2 budget phones")
        );
        assert_eq!(parse_line("/helpful gadgets"), LineAction::Query("/helpful gadgets"));
    }

    #[test]
    fn test_parse_line_plain_and_empty() {
        assert_eq!(parse_line("laptop under 60000"), LineAction::Query("laptop under 60000"));
        assert_eq!(parse_line(""), LineAction::Query(""));
    }
}
