//! `flowchat chat`: interactive conversation
//!
//! Plain lines are sent as prompts. Slash commands:
//! `/regen <n>`, `/play <n>`, `/stop`, `/record`, `/clear`, `/history`,
//! `/help`, `/quit`. Message numbers are the ones `/history` shows.

use anyhow::Result;
use flowchat_audio::SpeakOutcome;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::history::format_transcript;
use crate::client::{render::TerminalRender, AppConfig, ChatClient};

const HELP: &str = "\
/regen <n>   ask again for answer n
/play <n>    speak message n (again to stop)
/stop        stop voice playback
/record      start/finish voice input
/clear       forget the conversation
/history     show the conversation
/quit        leave";

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Send a prompt
    Prompt(String),
    /// Regenerate a message (0-based index)
    Regenerate(usize),
    /// Speak or replay a message (0-based index)
    Play(usize),
    /// Stop playback
    Stop,
    /// Toggle voice recording
    Record,
    /// Clear the conversation
    Clear,
    /// Print the conversation
    History,
    /// Print help
    Help,
    /// Leave the REPL
    Quit,
    /// Nothing to do
    Empty,
    /// Unrecognized input
    Invalid(String),
}

impl ReplCommand {
    /// Parse one input line
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Prompt(line.to_string());
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let number = parts.next().map(str::parse::<usize>);

        match (name, number) {
            ("regen", Some(Ok(n))) if n > 0 => Self::Regenerate(n - 1),
            ("play", Some(Ok(n))) if n > 0 => Self::Play(n - 1),
            ("regen" | "play", _) => Self::Invalid(format!("usage: /{} <message number>", name)),
            ("stop", None) => Self::Stop,
            ("record", None) => Self::Record,
            ("clear", None) => Self::Clear,
            ("history", None) => Self::History,
            ("help", None) => Self::Help,
            ("quit" | "exit", None) => Self::Quit,
            _ => Self::Invalid(format!("unknown command: {}", line)),
        }
    }
}

/// Run the REPL until `/quit` or end of input
pub async fn run(config: &AppConfig) -> Result<()> {
    let mut client = ChatClient::connect(config, Box::new(TerminalRender::stdout())).await?;
    println!("flowchat {} (type /help for commands)", env!("CARGO_PKG_VERSION"));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = ReplCommand::parse(&line);
        if command == ReplCommand::Quit {
            break;
        }
        if let Err(e) = execute(&mut client, command).await {
            warn!(error = %e, "Command failed");
            eprintln!("error: {:#}", e);
        }
    }

    client.shutdown().await;
    Ok(())
}

async fn execute(client: &mut ChatClient, command: ReplCommand) -> Result<()> {
    match command {
        ReplCommand::Prompt(text) => {
            client.submit(&text).await?;
        }
        ReplCommand::Regenerate(index) => {
            client.regenerate(index).await?;
        }
        ReplCommand::Play(index) => match client.speak(index).await? {
            SpeakOutcome::Stopped => println!("(playback stopped)"),
            SpeakOutcome::Replayed(_) => println!("(replaying)"),
            SpeakOutcome::Requested(_) => println!("(speaking)"),
        },
        ReplCommand::Stop => client.stop_audio().await,
        ReplCommand::Record => match client.toggle_recording().await? {
            None => println!("(recording, /record again to finish)"),
            Some(text) => {
                println!("> {}", text);
                client.submit(&text).await?;
            }
        },
        ReplCommand::Clear => {
            client.clear().await?;
            println!("(conversation cleared)");
        }
        ReplCommand::History => print!("{}", format_transcript(client.transcript().messages())),
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Invalid(message) => eprintln!("{}", message),
        ReplCommand::Quit | ReplCommand::Empty => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt_and_commands() {
        assert_eq!(
            ReplCommand::parse("  hello there "),
            ReplCommand::Prompt("hello there".to_string())
        );
        assert_eq!(ReplCommand::parse(""), ReplCommand::Empty);
        assert_eq!(ReplCommand::parse("/regen 2"), ReplCommand::Regenerate(1));
        assert_eq!(ReplCommand::parse("/play 4"), ReplCommand::Play(3));
        assert_eq!(ReplCommand::parse("/stop"), ReplCommand::Stop);
        assert_eq!(ReplCommand::parse("/exit"), ReplCommand::Quit);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(ReplCommand::parse("/regen"), ReplCommand::Invalid(_)));
        assert!(matches!(ReplCommand::parse("/regen 0"), ReplCommand::Invalid(_)));
        assert!(matches!(ReplCommand::parse("/play x"), ReplCommand::Invalid(_)));
        assert!(matches!(ReplCommand::parse("/dance"), ReplCommand::Invalid(_)));
        assert!(matches!(ReplCommand::parse("/stop now"), ReplCommand::Invalid(_)));
    }
}
