use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Character, CharacterId, SessionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharactersResponse {
    pub success: bool,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<SceneContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneContext {
    pub scene_id: String,
    pub scene_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub characters_present: Vec<CharacterId>,
    #[serde(default)]
    pub environmental_factors: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atmosphere: Option<String>,
}

/// Body of `POST /chat`. `scene_context` is always sent as an explicit `null`
/// so the backend falls back to its default scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: SessionId,
    pub npc_id: CharacterId,
    pub user_message: String,
    pub scene_context: Option<Value>,
}

impl ChatRequest {
    pub fn new(
        session_id: SessionId,
        npc_id: CharacterId,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            npc_id,
            user_message: user_message.into(),
            scene_context: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub message: String,
    pub emotion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub character_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    // Server clock, not always timezone-qualified, so kept verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Snapshot from `GET /status`. Only displayed, so every field is optional and
/// anything the client does not know about is carried in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_service_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_service_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_dev_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_sessions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_conversations: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMemory {
    pub timestamp: String,
    pub character: String,
    pub message: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub memories: Vec<ConversationMemory>,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub service: String,
}
