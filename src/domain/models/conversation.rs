//! Conversation transcripts produced by the conversation source.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Speaker of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    /// Customer side
    User,
    /// Agent side
    Bot,
}

impl Role {
    /// Name used in rendered transcripts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Bot => "Bot",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Extraction output has used several spellings for the two speakers.
impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.to_lowercase().as_str() {
            "user" | "human" => Ok(Self::User),
            "bot" | "assistant" | "ai" | "agent" => Ok(Self::Bot),
            other => Err(serde::de::Error::custom(format!("unknown role: {other}"))),
        }
    }
}

/// One message in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker
    pub role: Role,
    /// Message text
    pub message: String,
}

impl Turn {
    /// Turn spoken by the user.
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            message: message.into(),
        }
    }

    /// Turn spoken by the bot.
    pub fn bot(message: impl Into<String>) -> Self {
        Self {
            role: Role::Bot,
            message: message.into(),
        }
    }
}

/// A session's ordered turn sequence, identified by `(project_id, agent_id, session_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Project the agent belongs to
    pub project_id: String,
    /// Agent that handled the session
    pub agent_id: String,
    /// Session identifier
    pub session_id: String,
    /// Turns in speaking order
    pub turns: Vec<Turn>,
}

impl Conversation {
    /// Conversation with no turns yet.
    pub fn new(
        project_id: impl Into<String>,
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            agent_id: agent_id.into(),
            session_id: session_id.into(),
            turns: Vec::new(),
        }
    }

    /// Append a turn.
    pub fn with_turn(mut self, turn: Turn) -> Self {
        self.turns.push(turn);
        self
    }

    /// Decode the JSON array stored by the extraction view.
    pub fn turns_from_json(raw: &str) -> Result<Vec<Turn>, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Render turns as `Role: message` lines.
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role, t.message))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_from_json_accepts_role_aliases() {
        let raw = r#"[
            {"role": "user", "message": "Hello"},
            {"role": "assistant", "message": "Hi there!"},
            {"role": "Bot", "message": "Anything else?"}
        ]"#;
        let turns = Conversation::turns_from_json(raw).unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Bot);
        assert_eq!(turns[2].role, Role::Bot);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let raw = r#"[{"role": "narrator", "message": "..."}]"#;
        assert!(Conversation::turns_from_json(raw).is_err());
    }

    #[test]
    fn test_render_transcript() {
        let turns = vec![Turn::user("Hello"), Turn::bot("Hi")];
        assert_eq!(render_transcript(&turns), "User: Hello\nBot: Hi");
        assert_eq!(render_transcript(&[]), "");
    }
}
