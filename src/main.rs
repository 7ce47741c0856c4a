mod cli;

use std::io;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::{ChatContext, ChatOptions};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Message to send as the user
    #[arg(short, long)]
    input: Option<String>,

    /// User id sent with every batch (defaults to the login name)
    #[arg(long)]
    user: Option<String>,

    /// Platform name sent with every batch
    #[arg(long, default_value = "cli")]
    platform: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat {
        /// Message to send as the user
        #[arg(short, long)]
        input: Option<String>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load ADMATCH_* settings from a .env file if present
    dotenv().ok();

    let cli = Cli::parse();

    let (input, verbose) = match cli.command {
        Some(Commands::Chat { input, verbose }) => (input.or(cli.input), verbose || cli.verbose),
        None => (cli.input, cli.verbose),
    };

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting ad matching chat");

    let options = ChatOptions {
        user_id: cli.user,
        platform: cli.platform,
    };
    let mut chat_context = ChatContext::new(Box::new(io::stdout()), input, true, options);
    chat_context.run().await
}
