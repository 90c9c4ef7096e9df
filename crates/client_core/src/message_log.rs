use chrono::Utc;
use shared::{
    domain::{Message, MessageId, MessageRole, PLAYER_SPEAKER, SYSTEM_SPEAKER},
    protocol::ChatResponse,
};
use thiserror::Error;

/// Shown in place of a reply when the backend could not be reached at all.
pub const CONNECTIVITY_FAILURE_TEXT: &str =
    "Sorry, a network error occurred. Please check that the backend service is running.";
pub const ERROR_EMOTION: &str = "error";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageLogError {
    #[error("message id {requested} is not newer than last issued id {last_issued}")]
    IdNotMonotonic {
        requested: MessageId,
        last_issued: MessageId,
    },
    #[error("no message id left after {last_issued}")]
    IdSpaceExhausted { last_issued: MessageId },
}

/// A message that has not been appended yet. The log stamps the timestamp and,
/// unless one is supplied, the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub id: Option<MessageId>,
    pub character: String,
    pub text: String,
    pub role: MessageRole,
    pub emotion: Option<String>,
    pub action: Option<String>,
}

impl MessageDraft {
    pub fn player(text: impl Into<String>) -> Self {
        Self {
            id: None,
            character: PLAYER_SPEAKER.to_string(),
            text: text.into(),
            role: MessageRole::User,
            emotion: None,
            action: None,
        }
    }

    pub fn npc_reply(response: &ChatResponse) -> Self {
        Self {
            id: None,
            character: response.character_name.clone(),
            text: response.message.clone(),
            role: MessageRole::Assistant,
            emotion: Some(response.emotion.clone()),
            action: response.action.clone(),
        }
    }

    pub fn connectivity_failure() -> Self {
        Self {
            id: None,
            character: SYSTEM_SPEAKER.to_string(),
            text: CONNECTIVITY_FAILURE_TEXT.to_string(),
            role: MessageRole::Assistant,
            emotion: Some(ERROR_EMOTION.to_string()),
            action: None,
        }
    }

    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Ordered chat history. Entries are never edited; the only mutations are
/// `append` and `clear`. Ids keep increasing across `clear`.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
    last_issued: Option<MessageId>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, draft: MessageDraft) -> Result<&Message, MessageLogError> {
        let id = match (draft.id, self.last_issued) {
            (Some(requested), Some(last_issued)) if requested <= last_issued => {
                return Err(MessageLogError::IdNotMonotonic {
                    requested,
                    last_issued,
                });
            }
            (Some(requested), _) => requested,
            (None, Some(last_issued)) => match last_issued.0.checked_add(1) {
                Some(next) => MessageId(next),
                None => return Err(MessageLogError::IdSpaceExhausted { last_issued }),
            },
            (None, None) => MessageId(1),
        };
        self.last_issued = Some(id);

        self.entries.push(Message {
            id,
            character: draft.character,
            text: draft.text,
            role: draft.role,
            emotion: draft.emotion,
            action: draft.action,
            timestamp: Utc::now(),
        });
        let index = self.entries.len() - 1;
        Ok(&self.entries[index])
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/message_log_tests.rs"]
mod tests;
