use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use client_core::{ClientError, Session};
use client_platform::{SessionStore, SessionStoreError};
use tracing::warn;

use crate::authorized::{RefreshedTokens, SessionAccess};

/// Exclusive owner of the mutable session state.
///
/// Every authorized request reads the session through here; writes happen
/// only on login, on refresh completion, and on logout/invalidation. The
/// backing store holds a single record, read once at bootstrap.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    session: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            session: RwLock::new(None),
        }
    }

    /// Load the persisted session, if any. Called once at startup.
    pub fn bootstrap(&self) -> Result<Option<Session>, ClientError> {
        let stored = match self.store.load() {
            Ok(session) => Some(session),
            Err(SessionStoreError::NotFound) => None,
            Err(err) => return Err(ClientError::Storage(err.to_string())),
        };

        let mut guard = self.session.write().expect("session lock poisoned");
        guard.clone_from(&stored);
        Ok(stored)
    }

    pub fn current(&self) -> Option<Session> {
        self.session.read().expect("session lock poisoned").clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.current().map(|s| s.user.id)
    }

    /// Install a fresh session (login path) and persist it.
    pub fn establish(&self, session: Session) -> Result<(), ClientError> {
        let mut guard = self.session.write().expect("session lock poisoned");
        self.store
            .save(&session)
            .map_err(|err| ClientError::Storage(err.to_string()))?;
        *guard = Some(session);
        Ok(())
    }

    /// Drop the session and its persisted record (logout path).
    pub fn clear(&self) -> Result<(), ClientError> {
        let mut guard = self.session.write().expect("session lock poisoned");
        *guard = None;
        self.store
            .clear()
            .map_err(|err| ClientError::Storage(err.to_string()))
    }

    fn apply_tokens(&self, tokens: &RefreshedTokens) -> Result<(), ClientError> {
        let mut guard = self.session.write().expect("session lock poisoned");
        let Some(session) = guard.as_mut() else {
            // Session vanished (logout raced the refresh); nothing to update.
            return Ok(());
        };

        session.access_token = tokens.access_token.clone();
        if let Some(refresh) = &tokens.refresh_token {
            session.refresh_token = refresh.clone();
        }
        self.store
            .save(session)
            .map_err(|err| ClientError::Storage(err.to_string()))
    }
}

#[async_trait]
impl SessionAccess for SessionManager {
    fn session(&self) -> Option<Session> {
        self.current()
    }

    async fn tokens_refreshed(&self, tokens: &RefreshedTokens) -> Result<(), ClientError> {
        self.apply_tokens(tokens)
    }

    async fn session_invalidated(&self) {
        if let Err(err) = self.clear() {
            warn!(error = %err, "failed to clear invalidated session");
        }
    }
}
