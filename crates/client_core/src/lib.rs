use std::{sync::Arc, time::Duration};

use shared::{
    domain::{Character, CharacterId, Message, SessionId, TurnState},
    protocol::{ChatRequest, ConversationMemory, HealthResponse, SceneContext, SystemStatus},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

pub mod backend;
pub mod directory;
pub mod message_log;
mod session_identity;

pub use backend::{BackendError, HttpNpcBackend, NpcBackend};
pub use directory::{CharacterDirectory, SelectOutcome};
pub use message_log::{MessageDraft, MessageLog, MessageLogError};
pub use session_identity::generate_session_id;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    MessageAppended(Message),
    TurnStateChanged(TurnState),
    CharactersUpdated {
        characters: Vec<Character>,
        selected: Option<CharacterId>,
    },
    SelectionChanged(Option<CharacterId>),
    StatusUpdated(SystemStatus),
    LogCleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    EmptyInput,
    NoCharacterSelected,
    TurnInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied,
    RepliedWithError(String),
    TransportFailure,
    DiscardedAfterReset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ignored(SubmitRejection),
    Completed(TurnOutcome),
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub characters: Vec<Character>,
    pub selected: Option<CharacterId>,
    pub scene: Option<SceneContext>,
    pub messages: Vec<Message>,
    pub turn_state: TurnState,
    pub input: String,
    pub status: Option<SystemStatus>,
}

impl SessionSnapshot {
    pub fn selected_character(&self) -> Option<&Character> {
        let selected = self.selected.as_ref()?;
        self.characters.iter().find(|c| &c.id == selected)
    }
}

struct ControllerState {
    directory: CharacterDirectory,
    log: MessageLog,
    turn_state: TurnState,
    input: String,
    status: Option<SystemStatus>,
    // Bumped on every reset so late chat responses can be recognised.
    log_generation: u64,
}

pub struct ChatSessionController {
    backend: Arc<dyn NpcBackend>,
    session_id: SessionId,
    turn_timeout: Option<Duration>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<SessionEvent>,
}

impl ChatSessionController {
    pub fn new(backend: Arc<dyn NpcBackend>) -> Arc<Self> {
        Self::new_with_turn_timeout(backend, None)
    }

    pub fn new_with_turn_timeout(
        backend: Arc<dyn NpcBackend>,
        turn_timeout: Option<Duration>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let session_id = generate_session_id();
        info!(session_id = %session_id, "chat session created");
        Arc::new(Self {
            backend,
            session_id,
            turn_timeout,
            inner: Mutex::new(ControllerState {
                directory: CharacterDirectory::new(),
                log: MessageLog::new(),
                turn_state: TurnState::Idle,
                input: String::new(),
                status: None,
                log_generation: 0,
            }),
            events,
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let guard = self.inner.lock().await;
        SessionSnapshot {
            session_id: self.session_id.clone(),
            characters: guard.directory.characters().to_vec(),
            selected: guard.directory.selected().cloned(),
            scene: guard.directory.scene().cloned(),
            messages: guard.log.messages().to_vec(),
            turn_state: guard.turn_state,
            input: guard.input.clone(),
            status: guard.status.clone(),
        }
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.lock().await.log.messages().to_vec()
    }

    pub async fn turn_state(&self) -> TurnState {
        self.inner.lock().await.turn_state
    }

    pub async fn selected_character(&self) -> Option<Character> {
        self.inner
            .lock()
            .await
            .directory
            .selected_character()
            .cloned()
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        self.inner.lock().await.input = text.into();
    }

    pub async fn input(&self) -> String {
        self.inner.lock().await.input.clone()
    }

    /// Failures leave the cache and selection as they were.
    pub async fn refresh_characters(&self) -> bool {
        let response = match self.backend.list_characters().await {
            Ok(response) => response,
            Err(err) => {
                warn!(session_id = %self.session_id, "failed to load characters: {err}");
                return false;
            }
        };

        let mut guard = self.inner.lock().await;
        let count = response.characters.len();
        let selection_change = guard
            .directory
            .replace(response.characters, response.scene);
        let characters = guard.directory.characters().to_vec();
        let selected = guard.directory.selected().cloned();
        drop(guard);

        info!(
            session_id = %self.session_id,
            count,
            selected = ?selected,
            "character directory refreshed"
        );
        let _ = self.events.send(SessionEvent::CharactersUpdated {
            characters,
            selected: selected.clone(),
        });
        if selection_change.is_some() {
            let _ = self.events.send(SessionEvent::SelectionChanged(selected));
        }
        true
    }

    pub async fn select_character(&self, character_id: &CharacterId) -> SelectOutcome {
        let outcome = self.inner.lock().await.directory.select(character_id);
        match &outcome {
            SelectOutcome::Selected(id) => {
                debug!(session_id = %self.session_id, npc_id = %id, "character selected");
                let _ = self
                    .events
                    .send(SessionEvent::SelectionChanged(Some(id.clone())));
            }
            SelectOutcome::UnknownCharacter => {
                debug!(
                    session_id = %self.session_id,
                    npc_id = %character_id,
                    "ignoring selection of unknown character"
                );
            }
            SelectOutcome::Unchanged => {}
        }
        outcome
    }

    pub async fn submit_input(&self) -> SubmitOutcome {
        let text = self.input().await;
        self.submit(&text).await
    }

    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let user_message = text.trim();
        let (request, generation) = {
            let mut guard = self.inner.lock().await;
            if user_message.is_empty() {
                return SubmitOutcome::Ignored(SubmitRejection::EmptyInput);
            }
            let Some(npc_id) = guard.directory.selected().cloned() else {
                return SubmitOutcome::Ignored(SubmitRejection::NoCharacterSelected);
            };
            if guard.turn_state == TurnState::Awaiting {
                return SubmitOutcome::Ignored(SubmitRejection::TurnInFlight);
            }

            self.append_locked(&mut guard, MessageDraft::player(user_message));
            self.set_turn_state_locked(&mut guard, TurnState::Awaiting);
            guard.input.clear();
            (
                ChatRequest::new(self.session_id.clone(), npc_id, user_message),
                guard.log_generation,
            )
        };

        info!(
            session_id = %self.session_id,
            npc_id = %request.npc_id,
            "sending chat turn"
        );
        let result = match self.turn_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.backend.chat(&request)).await {
                Ok(result) => result.map_err(TurnFailure::Backend),
                Err(_) => Err(TurnFailure::TimedOut(limit)),
            },
            None => self
                .backend
                .chat(&request)
                .await
                .map_err(TurnFailure::Backend),
        };

        let mut guard = self.inner.lock().await;
        let outcome = match result {
            _ if guard.log_generation != generation => {
                info!(
                    session_id = %self.session_id,
                    "discarding chat result that arrived after the session was reset"
                );
                TurnOutcome::DiscardedAfterReset
            }
            Ok(response) => {
                self.append_locked(&mut guard, MessageDraft::npc_reply(&response));
                match (response.success, response.error) {
                    (false, Some(err)) => {
                        warn!(
                            session_id = %self.session_id,
                            npc_id = %request.npc_id,
                            "chat error: {err}"
                        );
                        TurnOutcome::RepliedWithError(err)
                    }
                    _ => TurnOutcome::Replied,
                }
            }
            Err(failure) => {
                error!(
                    session_id = %self.session_id,
                    npc_id = %request.npc_id,
                    "failed to send message: {failure}"
                );
                self.append_locked(&mut guard, MessageDraft::connectivity_failure());
                TurnOutcome::TransportFailure
            }
        };
        self.set_turn_state_locked(&mut guard, TurnState::Idle);
        SubmitOutcome::Completed(outcome)
    }

    /// The local log is emptied even when the remote delete fails.
    pub async fn reset(&self) -> bool {
        let cleared_remotely = match self.backend.clear_memory(&self.session_id).await {
            Ok(()) => {
                info!(session_id = %self.session_id, "server-side session memory cleared");
                true
            }
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    "failed to clear server-side session memory: {err}"
                );
                false
            }
        };

        {
            let mut guard = self.inner.lock().await;
            guard.log.clear();
            guard.log_generation += 1;
        }
        let _ = self.events.send(SessionEvent::LogCleared);
        cleared_remotely
    }

    pub async fn fetch_status(&self) -> Option<SystemStatus> {
        match self.backend.fetch_status().await {
            Ok(status) => {
                self.inner.lock().await.status = Some(status.clone());
                let _ = self.events.send(SessionEvent::StatusUpdated(status.clone()));
                Some(status)
            }
            Err(err) => {
                warn!(session_id = %self.session_id, "failed to load system status: {err}");
                None
            }
        }
    }

    pub async fn fetch_remote_memory(
        &self,
        limit: u32,
    ) -> Result<Vec<ConversationMemory>, BackendError> {
        self.backend.fetch_memory(&self.session_id, limit).await
    }

    pub async fn backend_health(&self) -> Result<HealthResponse, BackendError> {
        self.backend.health().await
    }

    fn append_locked(&self, state: &mut ControllerState, draft: MessageDraft) {
        match state.log.append(draft) {
            Ok(message) => {
                let _ = self
                    .events
                    .send(SessionEvent::MessageAppended(message.clone()));
            }
            Err(err) => {
                error!(session_id = %self.session_id, "failed to append message: {err}");
            }
        }
    }

    fn set_turn_state_locked(&self, state: &mut ControllerState, turn_state: TurnState) {
        state.turn_state = turn_state;
        let _ = self.events.send(SessionEvent::TurnStateChanged(turn_state));
    }
}

#[derive(Debug, thiserror::Error)]
enum TurnFailure {
    #[error(transparent)]
    Backend(BackendError),
    #[error("no reply within {0:?}")]
    TimedOut(Duration),
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
