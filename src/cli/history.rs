//! `flowchat history`

use anyhow::{Context, Result};
use flowchat_core::{ChatMessage, JsonFileMirror, Role, TranscriptMirror};

use crate::client::AppConfig;

/// Print the mirrored transcript
pub fn run(config: &AppConfig) -> Result<()> {
    let path = config.mirror.path();
    let messages = JsonFileMirror::new(&path)
        .load()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if messages.is_empty() {
        println!("No local history ({})", path.display());
        return Ok(());
    }
    print!("{}", format_transcript(&messages));
    Ok(())
}

/// One block per message, numbered from 1
pub fn format_transcript(messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    for (i, message) in messages.iter().enumerate() {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "bot",
        };
        out.push_str(&format!("[{}] {}: {}\n", i + 1, who, message.content));
        for item in message.thought_chain.iter() {
            out.push_str(&format!("      · {}\n", item.title));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_transcript() {
        let mut answer = ChatMessage::assistant_placeholder();
        answer.content = "Hi there".to_string();
        answer.thought_chain.upsert("t1", Some("Search"), "step1");

        let text = format_transcript(&[ChatMessage::user("hello"), answer]);
        assert_eq!(text, "[1] you: hello\n[2] bot: Hi there\n      · Search\n");
    }
}
