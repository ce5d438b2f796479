pub mod commands;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dimodel_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "dimodel",
    about = "Dimensional data modeling assistant",
    long_about = "Inspect the data-model tools, run them directly, or chat with the modeling agent.",
    after_help = "Examples:\n  dimodel tools\n  dimodel call get_source_tables_with_columns\n  dimodel chat --question \"Create a stage table for orders\""
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a dimodel.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "List tool names, descriptions and parameter schemas as JSON")]
    Tools,
    #[command(about = "Run one tool against a freshly seeded registry")]
    Call {
        tool: String,
        #[arg(long, help = "Tool arguments as a JSON object")]
        input: Option<String>,
        #[arg(long, help = "Report design-rule violations as warnings instead of rejecting")]
        advisory: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Ask the modeling agent questions (from --question or stdin lines)")]
    Chat {
        #[arg(long = "question", help = "Question to ask; repeat for several")]
        questions: Vec<String>,
        #[arg(long, help = "Conversation thread id (defaults to a random UUID)")]
        thread_id: Option<String>,
    },
}

/// An explicit `--config` path must exist; without one the default paths are optional.
pub fn load_options(config_path: Option<PathBuf>) -> LoadOptions {
    LoadOptions { require_file: config_path.is_some(), config_path, ..LoadOptions::default() }
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(io::stderr);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = load_options(cli.config.clone());

    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Tools => commands::tools::run(),
        Command::Call { tool, input, advisory } => {
            commands::call::run(options, &tool, input.as_deref(), advisory).await
        }
        Command::Config => commands::config::run(options),
        Command::Chat { questions, thread_id } => {
            let mut stdout = io::stdout();
            if questions.is_empty() {
                let lines = io::stdin().lock().lines().map_while(Result::ok);
                commands::chat::run(options, lines, thread_id, &mut stdout).await
            } else {
                commands::chat::run(options, questions, thread_id, &mut stdout).await
            }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
