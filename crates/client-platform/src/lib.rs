//! Session persistence seam.
//!
//! The client persists exactly one session record: read once at startup,
//! written on login and on every token refresh, removed on logout.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use client_core::Session;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    #[error("no session stored")]
    NotFound,
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("session store backend failure: {0}")]
    Backend(String),
}

pub trait SessionStore: Send + Sync {
    fn save(&self, session: &Session) -> Result<(), SessionStoreError>;

    fn load(&self) -> Result<Session, SessionStoreError>;

    fn clear(&self) -> Result<(), SessionStoreError>;
}

#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    data: Arc<RwLock<Option<Session>>>,
}

impl SessionStore for InMemorySessionStore {
    fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| SessionStoreError::Backend("poisoned lock".to_owned()))?;
        *data = Some(session.clone());
        Ok(())
    }

    fn load(&self) -> Result<Session, SessionStoreError> {
        let data = self
            .data
            .read()
            .map_err(|_| SessionStoreError::Backend("poisoned lock".to_owned()))?;
        data.clone().ok_or(SessionStoreError::NotFound)
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| SessionStoreError::Backend("poisoned lock".to_owned()))?;
        *data = None;
        Ok(())
    }
}

/// Single-file JSON session store.
#[derive(Clone, Debug)]
pub struct JsonFileSessionStore {
    path: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for JsonFileSessionStore {
    fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let payload = serde_json::to_vec_pretty(session)
            .map_err(|err| SessionStoreError::Backend(err.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| SessionStoreError::Unavailable(err.to_string()))?;
        }
        fs::write(&self.path, payload)
            .map_err(|err| SessionStoreError::Unavailable(err.to_string()))
    }

    fn load(&self) -> Result<Session, SessionStoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionStoreError::NotFound);
            }
            Err(err) => return Err(SessionStoreError::Unavailable(err.to_string())),
        };
        serde_json::from_slice(&raw).map_err(|err| SessionStoreError::Backend(err.to_string()))
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SessionStoreError::Unavailable(err.to_string())),
        }
    }
}
