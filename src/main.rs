//! # Personal Assistant CLI (`assistant`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `assistant serve` | Start the HTTP chat service |
//! | `assistant chat` | Open a terminal chat session against a running service |
//! | `assistant add "<text>"` | Submit one knowledge snippet |
//!
//! ## Examples
//!
//! ```bash
//! assistant --config ./config/assistant.toml serve
//! assistant chat --backend http://localhost:8000
//! assistant add "The sky is blue."
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use personal_assistant::client::{BackendClient, KnowledgeOutcome, DEFAULT_BACKEND_URL};
use personal_assistant::{config, logging, server, ui};

/// Personal Assistant: retrieval-augmented chat over your own notes.
#[derive(Parser)]
#[command(name = "assistant", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/assistant.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat service.
    ///
    /// Reads `GROQ_API_KEY` and `PINECONE_API_KEY` from the environment.
    /// Either may be missing; the service then runs with reduced capability.
    Serve,

    /// Open a terminal chat session.
    Chat {
        /// Base URL of a running service.
        #[arg(long, default_value = DEFAULT_BACKEND_URL)]
        backend: String,

        /// Client-side request timeout in seconds.
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },

    /// Submit a knowledge snippet for future retrieval.
    Add {
        /// The text to store.
        text: String,

        /// Base URL of a running service.
        #[arg(long, default_value = DEFAULT_BACKEND_URL)]
        backend: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            logging::init_tracing("info,tower_http=info");
            let cfg = config::load_config(&cli.config)?;
            server::run_server(&cfg).await?;
        }
        Commands::Chat { backend, timeout } => {
            logging::init_tracing("warn");
            let client = BackendClient::new(&backend, timeout)?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let interactive = atty::is(atty::Stream::Stdin);
            ui::run(&client, stdin, std::io::stdout(), interactive).await?;
        }
        Commands::Add { text, backend } => {
            logging::init_tracing("warn");
            let client = BackendClient::new(&backend, 60)?;
            let outcome = client.add_knowledge(&text).await;
            println!("{}", outcome.notice());
            if outcome != KnowledgeOutcome::Added {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
