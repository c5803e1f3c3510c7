//! Bearer session tokens
//!
//! Tokens are opaque v4 UUIDs mapped to a tourist id. Each token carries an
//! absolute expiry; expired tokens resolve to nothing and are dropped by
//! [`SessionStore::purge_expired`].

use anyhow::{ensure, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use safety_engine::TouristId;
use std::collections::HashMap;
use uuid::Uuid;

pub const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 3600;
pub const MAX_SESSION_TTL_SECS: i64 = 30 * 24 * 3600;

#[derive(Debug, Clone, Copy)]
struct Session {
    tourist_id: TouristId,
    expires_at: DateTime<Utc>,
}

pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// TTL from configuration, rejected outside (0, 30 days]
    pub fn from_ttl_secs(secs: i64) -> Result<Self> {
        ensure!(
            secs > 0 && secs <= MAX_SESSION_TTL_SECS,
            "session TTL {}s must be in (0, {}]",
            secs,
            MAX_SESSION_TTL_SECS
        );
        Ok(Self::new(Duration::seconds(secs)))
    }

    pub fn issue(&self, tourist_id: TouristId, now: DateTime<Utc>) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.sessions.write().insert(
            token.clone(),
            Session {
                tourist_id,
                expires_at,
            },
        );
        token
    }

    pub fn resolve(&self, token: &str, now: DateTime<Utc>) -> Option<TouristId> {
        let session = *self.sessions.read().get(token)?;
        if session.expires_at <= now {
            self.sessions.write().remove(token);
            return None;
        }
        Some(session.tourist_id)
    }

    /// Returns false when the token was unknown
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SESSION_TTL_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_and_resolve() {
        let store = SessionStore::new(Duration::minutes(10));
        let token = store.issue(TouristId(3), t0());
        assert_eq!(token.len(), 32);
        assert_eq!(store.resolve(&token, t0()), Some(TouristId(3)));
        assert_eq!(store.resolve("bogus", t0()), None);
    }

    #[test]
    fn test_expiry() {
        let store = SessionStore::new(Duration::minutes(10));
        let token = store.issue(TouristId(1), t0());
        assert!(store.resolve(&token, t0() + Duration::minutes(9)).is_some());
        assert!(store.resolve(&token, t0() + Duration::minutes(10)).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_revoke_and_purge() {
        let store = SessionStore::new(Duration::minutes(10));
        let a = store.issue(TouristId(1), t0());
        store.issue(TouristId(2), t0() + Duration::minutes(5));

        assert!(store.revoke(&a));
        assert!(!store.revoke(&a));

        store.issue(TouristId(3), t0());
        assert_eq!(store.purge_expired(t0() + Duration::minutes(12)), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ttl_bounds() {
        assert!(SessionStore::from_ttl_secs(0).is_err());
        assert!(SessionStore::from_ttl_secs(-1).is_err());
        assert!(SessionStore::from_ttl_secs(MAX_SESSION_TTL_SECS + 1).is_err());
        assert!(SessionStore::from_ttl_secs(i64::MAX).is_err());
        assert!(SessionStore::from_ttl_secs(MAX_SESSION_TTL_SECS).is_ok());
    }

    #[test]
    fn test_issue_near_end_of_time() {
        let store = SessionStore::new(Duration::days(365));
        let late = DateTime::<Utc>::MAX_UTC - Duration::days(1);
        let token = store.issue(TouristId(5), late);
        assert_eq!(store.resolve(&token, late), Some(TouristId(5)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn token_lives_exactly_ttl(ttl in 1i64..86_400, offset in 0i64..172_800) {
                let store = SessionStore::new(Duration::seconds(ttl));
                let token = store.issue(TouristId(7), t0());
                let resolved = store.resolve(&token, t0() + Duration::seconds(offset));
                prop_assert_eq!(resolved.is_some(), offset < ttl);
            }
        }
    }
}
