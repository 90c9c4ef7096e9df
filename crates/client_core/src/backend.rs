//! Seam between the session controller and the NPC inference/memory service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::SessionId,
    error::ApiError,
    protocol::{
        CharactersResponse, ChatRequest, ChatResponse, ConversationMemory, HealthResponse,
        MemoryResponse, SystemStatus,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MEMORY_LIMIT: u32 = 20;
const MAX_ERROR_BODY_CHARS: usize = 256;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{endpoint} returned {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        message: String,
    },
    #[error("malformed {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        source: serde_json::Error,
    },
    #[error("{endpoint} reported failure: {message}")]
    Rejected {
        endpoint: &'static str,
        message: String,
    },
    #[error("invalid backend url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

#[async_trait]
pub trait NpcBackend: Send + Sync {
    async fn list_characters(&self) -> Result<CharactersResponse, BackendError>;
    async fn fetch_status(&self) -> Result<SystemStatus, BackendError>;
    /// Returns any decodable chat payload, including ones with `success: false`.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError>;
    async fn clear_memory(&self, session_id: &SessionId) -> Result<(), BackendError>;
    async fn fetch_memory(
        &self,
        session_id: &SessionId,
        limit: u32,
    ) -> Result<Vec<ConversationMemory>, BackendError>;
    async fn health(&self) -> Result<HealthResponse, BackendError>;
}

pub struct HttpNpcBackend {
    http: Client,
    base: Url,
}

impl HttpNpcBackend {
    pub fn new(api_base: &str, request_timeout: Duration) -> Result<Self, BackendError> {
        let base = Url::parse(api_base.trim()).map_err(|err| BackendError::InvalidUrl {
            url: api_base.to_string(),
            reason: err.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl {
                url: api_base.to_string(),
                reason: "url cannot be used as a base".to_string(),
            });
        }
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl NpcBackend for HttpNpcBackend {
    async fn list_characters(&self) -> Result<CharactersResponse, BackendError> {
        let response = self.http.get(self.endpoint(&["characters"])).send().await?;
        let body: CharactersResponse = read_json("characters", response).await?;
        if !body.success {
            return Err(BackendError::Rejected {
                endpoint: "characters",
                message: body
                    .error
                    .unwrap_or_else(|| "directory lookup was unsuccessful".to_string()),
            });
        }
        Ok(body)
    }

    async fn fetch_status(&self) -> Result<SystemStatus, BackendError> {
        let response = self.http.get(self.endpoint(&["status"])).send().await?;
        read_json("status", response).await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        let response = self
            .http
            .post(self.endpoint(&["chat"]))
            .json(request)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        // Semantic failures arrive as regular chat payloads, sometimes with an
        // error status; only an undecodable body counts as a failed exchange.
        match serde_json::from_slice::<ChatResponse>(&bytes) {
            Ok(body) => {
                if !status.is_success() {
                    debug!(%status, "chat payload delivered with non-success status");
                }
                Ok(body)
            }
            Err(_) if !status.is_success() => Err(status_error("chat", status, &bytes)),
            Err(source) => Err(BackendError::Decode {
                endpoint: "chat",
                source,
            }),
        }
    }

    async fn clear_memory(&self, session_id: &SessionId) -> Result<(), BackendError> {
        let response = self
            .http
            .delete(self.endpoint(&["memory", session_id.as_str()]))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await?;
            return Err(status_error("memory", status, &bytes));
        }
        Ok(())
    }

    async fn fetch_memory(
        &self,
        session_id: &SessionId,
        limit: u32,
    ) -> Result<Vec<ConversationMemory>, BackendError> {
        let response = self
            .http
            .get(self.endpoint(&["memory", session_id.as_str()]))
            .query(&[("limit", limit)])
            .send()
            .await?;
        let body: MemoryResponse = read_json("memory", response).await?;
        if !body.success {
            return Err(BackendError::Rejected {
                endpoint: "memory",
                message: body
                    .error
                    .unwrap_or_else(|| "memory lookup was unsuccessful".to_string()),
            });
        }
        Ok(body.memories)
    }

    async fn health(&self) -> Result<HealthResponse, BackendError> {
        let response = self.http.get(self.endpoint(&["health"])).send().await?;
        read_json("health", response).await
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &'static str,
    response: Response,
) -> Result<T, BackendError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        return Err(status_error(endpoint, status, &bytes));
    }
    serde_json::from_slice(&bytes).map_err(|source| BackendError::Decode { endpoint, source })
}

fn status_error(endpoint: &'static str, status: StatusCode, body: &[u8]) -> BackendError {
    let message = match serde_json::from_slice::<ApiError>(body) {
        Ok(api_error) => api_error.describe(),
        Err(_) => String::from_utf8_lossy(body)
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect(),
    };
    BackendError::Status {
        endpoint,
        status,
        message,
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
