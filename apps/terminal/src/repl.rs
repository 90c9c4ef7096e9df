//! Line commands and transcript formatting for the terminal front-end.

use client_core::{SessionSnapshot, SubmitRejection, TurnOutcome};
use shared::{
    domain::{CharacterId, Message, MessageRole},
    protocol::{ConversationMemory, SystemStatus},
};

pub const HELP_TEXT: &str = "\
Type a message and press enter to talk to the selected character.
  /characters        list characters (refreshes from the backend)
  /select <id>       talk to another character
  /reset             clear this conversation
  /status            show backend status
  /memory [limit]    show what the backend remembers of this session
  /history           reprint the local transcript
  /help              show this help
  /quit              exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Characters,
    Select(CharacterId),
    Reset,
    Status,
    Memory(Option<u32>),
    History,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Say(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    match (name, arg) {
        ("characters" | "list", _) => Command::Characters,
        ("select", Some(id)) => Command::Select(CharacterId::from(id)),
        ("reset" | "clear", _) => Command::Reset,
        ("status", _) => Command::Status,
        ("memory", limit) => Command::Memory(limit.and_then(|v| v.parse().ok())),
        ("history", _) => Command::History,
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

pub fn format_message(message: &Message) -> String {
    let mut line = format!("[{}] {}", message.timestamp.format("%H:%M:%S"), message.character);
    if message.role == MessageRole::Assistant {
        if let Some(emotion) = message.emotion.as_deref().filter(|e| !e.is_empty()) {
            line.push_str(&format!(" ({emotion})"));
        }
    }
    line.push_str(": ");
    if let Some(action) = message.action.as_deref().filter(|a| !a.is_empty()) {
        line.push_str(&format!("*{action}* "));
    }
    line.push_str(&message.text);
    line
}

pub fn describe_rejection(rejection: SubmitRejection) -> &'static str {
    match rejection {
        SubmitRejection::EmptyInput => "nothing to send",
        SubmitRejection::NoCharacterSelected => "select a character first (/characters)",
        SubmitRejection::TurnInFlight => "still waiting for the previous reply",
    }
}

pub fn describe_outcome(outcome: &TurnOutcome) -> Option<String> {
    match outcome {
        TurnOutcome::Replied | TurnOutcome::TransportFailure => None,
        TurnOutcome::RepliedWithError(_) => {
            Some("the character had trouble answering; see the log for details".to_string())
        }
        TurnOutcome::DiscardedAfterReset => {
            Some("a reply arrived after the reset and was dropped".to_string())
        }
    }
}

pub fn format_characters(snapshot: &SessionSnapshot) -> String {
    if snapshot.characters.is_empty() {
        return "no characters available".to_string();
    }
    let mut lines = Vec::with_capacity(snapshot.characters.len() + 1);
    if let Some(scene) = &snapshot.scene {
        lines.push(format!("scene: {}", scene.scene_name));
    }
    for character in &snapshot.characters {
        let marker = if snapshot.selected.as_ref() == Some(&character.id) {
            '*'
        } else {
            ' '
        };
        lines.push(format!(
            "{marker} {:<12} {} ({}) - {}",
            character.id, character.name, character.role, character.core_motivation
        ));
    }
    lines.join("\n")
}

pub fn format_status(status: &SystemStatus) -> String {
    fn flag(value: Option<bool>) -> &'static str {
        match value {
            Some(true) => "up",
            Some(false) => "down",
            None => "unknown",
        }
    }

    let mut line = format!(
        "ai service: {}, memory service: {}",
        flag(status.ai_service_available),
        flag(status.memory_service_available)
    );
    if let Some(active) = status.active_sessions {
        line.push_str(&format!(", active sessions: {active}"));
    }
    if let Some(total) = status.total_conversations {
        line.push_str(&format!(", conversations: {total}"));
    }
    line
}

pub fn format_memory(memories: &[ConversationMemory]) -> String {
    if memories.is_empty() {
        return "the backend remembers nothing of this session".to_string();
    }
    memories
        .iter()
        .map(|m| format!("{} {}: {}", m.timestamp, m.character, m.message))
        .collect::<Vec<_>>()
        .join("\n")
}
