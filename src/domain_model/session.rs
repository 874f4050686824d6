use super::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Keyed one-way digest of a refresh secret. This is the only form of the
/// secret that ever reaches the session store.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct RefreshDigest(pub Vec<u8>);

impl RefreshDigest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RefreshDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshDigest(..)")
    }
}

/// One row per issued refresh credential.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub refresh_digest: RefreshDigest,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Usable for rotation or revocation: not revoked and not yet expired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_at: DateTime<Utc>, revoked_at: Option<DateTime<Utc>>) -> SessionRecord {
        SessionRecord {
            session_id: SessionId::new(),
            user_id: UserId(1),
            refresh_digest: RefreshDigest(vec![0; 32]),
            expires_at,
            revoked_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn active_requires_unrevoked_and_unexpired() {
        let now = Utc::now();
        assert!(record(now + Duration::seconds(1), None).is_active_at(now));
        assert!(!record(now, None).is_active_at(now));
        assert!(!record(now + Duration::hours(1), Some(now)).is_active_at(now));
    }

    #[test]
    fn digest_debug_is_redacted() {
        let digest = RefreshDigest(vec![0xab; 32]);
        assert_eq!(format!("{:?}", digest), "RefreshDigest(..)");
    }
}
