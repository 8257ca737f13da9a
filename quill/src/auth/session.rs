use crate::domain::IdentityPayload;
use chrono::DateTime;
use rand::Rng;

/// Opaque session identifier carried in the signed `sid` cookie.
pub type SessionId = String;

/// Milliseconds since the Unix epoch.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Format a timestamp (ms since epoch) as an ISO 8601 UTC string.
pub fn format_utc_time(timestamp_ms: u64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms as i64)
        .unwrap_or_default()
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Server-side session. `identity` stays empty until a credential resolves.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub identity: Option<IdentityPayload>,
    pub created_at: u64,
    pub created_at_utc: String,
    pub expires_at: u64,
    pub last_accessed: u64,
    pub last_accessed_utc: String,
}

impl Session {
    pub fn new(id: SessionId, identity: Option<IdentityPayload>, ttl_ms: u64) -> Self {
        let now = current_timestamp_ms();
        let now_utc = format_utc_time(now);

        Self {
            id,
            identity,
            created_at: now,
            created_at_utc: now_utc.clone(),
            expires_at: now.saturating_add(ttl_ms),
            last_accessed: now,
            last_accessed_utc: now_utc,
        }
    }

    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }

    pub fn touch(&mut self) {
        let now = current_timestamp_ms();
        self.last_accessed = now;
        self.last_accessed_utc = format_utc_time(now);
    }

    pub fn remaining_ttl_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }
}

/// 32 random bytes, hex encoded (64 characters).
pub fn generate_session_id() -> SessionId {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
