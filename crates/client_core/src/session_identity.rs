use chrono::Utc;
use shared::domain::SessionId;
use uuid::Uuid;

const SESSION_ID_PREFIX: &str = "session";
const RANDOM_SUFFIX_LEN: usize = 12;

/// Builds an opaque session identifier from wall-clock milliseconds and a
/// random suffix, so two controllers started in the same millisecond still
/// get distinct ids.
pub fn generate_session_id() -> SessionId {
    let millis = Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    SessionId(format!(
        "{SESSION_ID_PREFIX}_{millis}_{}",
        &random[..RANDOM_SUFFIX_LEN]
    ))
}
