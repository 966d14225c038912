use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sid";

/// Where a browser session sits in the password-reset sequence. The
/// stage is explicit rather than inferred from which values happen to be
/// present, so `AwaitingPassword` is reachable only through a successful
/// OTP check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResetStage {
    #[default]
    Idle,
    AwaitingOtp { email: String },
    AwaitingPassword { email: String },
}

/// Server-side session state keyed by the `sid` cookie. Only the reset
/// flow stores anything here; note and auth endpoints are token-based.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, ResetStage>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> String {
        let sid = Uuid::new_v4().to_string();
        let mut sessions = self.inner.lock().unwrap();
        sessions.insert(sid.clone(), ResetStage::Idle);
        sid
    }

    /// Unknown or expired session ids read as `Idle`.
    pub fn stage(&self, sid: &str) -> ResetStage {
        let sessions = self.inner.lock().unwrap();
        sessions.get(sid).cloned().unwrap_or_default()
    }

    pub fn set_stage(&self, sid: &str, stage: ResetStage) {
        let mut sessions = self.inner.lock().unwrap();
        sessions.insert(sid.to_string(), stage);
    }

    pub fn clear(&self, sid: &str) {
        let mut sessions = self.inner.lock().unwrap();
        sessions.remove(sid);
    }

    /// Session id from the cookie jar, or a fresh session plus the
    /// cookie that must be attached to the response.
    pub fn ensure(&self, jar: CookieJar) -> (CookieJar, String) {
        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            let sid = cookie.value().to_string();
            return (jar, sid);
        }
        let sid = self.create();
        let cookie = Cookie::build((SESSION_COOKIE, sid.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        (jar.add(cookie), sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_idle() {
        let store = SessionStore::new();
        let sid = store.create();
        assert_eq!(store.stage(&sid), ResetStage::Idle);
    }

    #[test]
    fn unknown_sid_reads_idle() {
        let store = SessionStore::new();
        assert_eq!(store.stage("not-a-session"), ResetStage::Idle);
    }

    #[test]
    fn stage_round_trips() {
        let store = SessionStore::new();
        let sid = store.create();
        store.set_stage(&sid, ResetStage::AwaitingOtp { email: "alice@x.com".into() });
        assert_eq!(
            store.stage(&sid),
            ResetStage::AwaitingOtp { email: "alice@x.com".into() }
        );
    }

    #[test]
    fn clear_returns_to_idle() {
        let store = SessionStore::new();
        let sid = store.create();
        store.set_stage(&sid, ResetStage::AwaitingPassword { email: "alice@x.com".into() });
        store.clear(&sid);
        assert_eq!(store.stage(&sid), ResetStage::Idle);
    }

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::new();
        let a = store.create();
        let b = store.create();
        store.set_stage(&a, ResetStage::AwaitingOtp { email: "alice@x.com".into() });
        assert_eq!(store.stage(&b), ResetStage::Idle);
    }
}
