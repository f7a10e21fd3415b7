use std::path::Path;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod handler;
mod utils;
mod web;

use config::{AppConfig, EnvLookup};
use utils::ocr::TesseractOcr;

/// Prints a formatted box with the given lines
/// Empty strings create empty lines, other strings are centered within the box
fn print_box(lines: &[&str]) {
    const BOX_WIDTH: usize = 60; // Total width including borders
    const CONTENT_WIDTH: usize = BOX_WIDTH - 4; // Width for content (excluding "║  " and "  ║")

    eprintln!("\n\x1b[36m╔{}╗", "═".repeat(BOX_WIDTH - 2));

    for line in lines {
        if line.is_empty() {
            eprintln!("║{}║", " ".repeat(BOX_WIDTH - 2));
            continue;
        }

        let visible_len = strip_ansi_codes(line).chars().count();
        if visible_len < CONTENT_WIDTH {
            let total_padding = CONTENT_WIDTH - visible_len;
            let left_padding = total_padding / 2;
            let right_padding = total_padding - left_padding;

            eprintln!(
                "║  {}{}{}\x1b[36m║",
                " ".repeat(left_padding),
                line,
                " ".repeat(right_padding)
            );
        } else {
            eprintln!("║  {}\x1b[36m  ║", line);
        }
    }

    eprintln!("╚{}╝\x1b[0m\n", "═".repeat(BOX_WIDTH - 2));
}

/// Strips ANSI escape codes to calculate visible text length
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::new();
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.next() == Some('[') {
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn init_logging(quiet: bool) {
    // RUST_LOG wins; otherwise info, or errors only in quiet mode
    let default_level = if quiet { "error" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn log_startup_checks(config: &AppConfig) {
    if config.uses_default_secret() {
        warn!("SECRET_KEY not set - using the insecure built-in default");
    }

    // Never log the token itself
    match &config.api_token {
        Some(_) => info!("Hugging Face API token configured"),
        None => warn!(
            "HUGGINGFACE_API_TOKEN not set - requests to {} will be sent without authorization",
            config.summarizer_url
        ),
    }

    let ocr = TesseractOcr::new(&config.tesseract_cmd, &config.ocr_lang);
    if !ocr.is_available().await {
        warn!(
            "'{}' is not runnable - image uploads will fail until tesseract is installed",
            config.tesseract_cmd
        );
    }
}

#[tokio::main]
async fn main() {
    let matches = config::cli().get_matches();

    // Variables from a .env file never override the real environment
    let env = match matches.get_one::<String>("env-file") {
        Some(path) => EnvLookup::from_path(Path::new(path)),
        None => EnvLookup::discover(),
    };
    let env = match env {
        Ok(env) => env,
        Err(e) => {
            eprintln!("Failed to read env file: {}", e);
            process::exit(2);
        }
    };

    let config = match AppConfig::from_matches(&matches, |name| env.get(name)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(2);
        }
    };

    init_logging(config.quiet);
    if env.file_vars() > 0 {
        info!("Loaded {} variables from .env", env.file_vars());
    }

    if !config.quiet {
        let listen = format!("\x1b[0m Listening on port {} \x1b[0m", config.port);
        print_box(&[
            "",
            "\x1b[1m\x1b[31m Bill Summarizer \x1b[0m",
            "",
            "\x1b[0m Paste text or upload a PDF / image to summarize \x1b[0m",
            "",
            listen.as_str(),
            "",
        ]);
    }

    log_startup_checks(&config).await;

    let config = Arc::new(config);
    let handler = match web::server::build_handler(&config) {
        Ok(handler) => handler,
        Err(e) => {
            error!("Failed to initialize: {:#}", e);
            process::exit(1);
        }
    };

    info!("Starting HTTP server...");
    if let Err(e) = web::server::serve(config, handler).await {
        error!("Server failed: {:#}", e);
        process::exit(1);
    }
}
