//! CLI module for Flowchat
//!
//! Provides commands:
//! - `chat`: interactive conversation
//! - `ask`: one-shot question
//! - `history`: print the locally mirrored transcript

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::client::{load_config, render::TerminalRender, ChatClient};

pub mod chat;
pub mod history;

/// Flowchat streaming chat client
#[derive(Parser, Debug)]
#[command(name = "flowchat")]
#[command(about = "Streaming chat client with live voice playback")]
#[command(version)]
pub struct Cli {
    /// Enable voice playback for this run
    #[arg(long, global = true)]
    pub voice: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// Prompt text
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Print the local transcript
    History,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config()?;
    if cli.voice {
        config.session.voice_enabled = true;
    }

    match cli.command {
        Some(Commands::History) => history::run(&config),
        Some(Commands::Ask { text }) => {
            let mut client = ChatClient::connect(&config, Box::new(TerminalRender::stdout())).await?;
            let result = client.submit(&text.join(" ")).await;
            client.shutdown().await;
            result.map(|_| ())
        }
        Some(Commands::Chat) | None => chat::run(&config).await,
    }
}
