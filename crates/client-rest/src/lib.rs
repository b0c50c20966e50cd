//! REST backend adapter.
//!
//! Wires the transport stack (base client, authorized decorator), the auth
//! and chat endpoint wrappers, session ownership, and the per-conversation
//! synchronization engine.

/// Auth endpoints and login/refresh DTOs.
pub mod auth;
/// Bearer-attaching decorator with coordinated token refresh.
pub mod authorized;
/// Chat endpoints and wire-to-core mapping.
pub mod chat;
/// Base HTTP client and the transport contract.
pub mod http;
/// Session ownership and persistence callbacks.
pub mod session;
/// Per-conversation synchronization engine.
pub mod sync;
/// User directory endpoints.
pub mod users;

use std::sync::Arc;

use client_core::{ClientError, Session};
use client_platform::SessionStore;

pub use auth::{AuthApi, LoginResult};
pub use authorized::{AuthorizedClient, RefreshedTokens, SessionAccess, TokenRefresher};
pub use chat::{ChatApi, ChatHistory, OutgoingAttachment, WireAttachment, WireMessage};
pub use http::{HttpTransport, MultipartField, MultipartPart, RequestBody, RestClient};
pub use session::SessionManager;
pub use sync::{ChatSync, HISTORY_LIMIT, POLL_LIMIT};
pub use users::{DirectoryUser, UserProfile, UsersApi};

/// Fully assembled client: base transport for auth, authorized transport
/// for everything else, one owned session.
pub struct ChatClient {
    sessions: Arc<SessionManager>,
    auth: AuthApi,
    chat: ChatApi,
    users: UsersApi,
}

impl ChatClient {
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, ClientError> {
        let base = Arc::new(RestClient::new(base_url)?);
        let sessions = Arc::new(SessionManager::new(store));
        let auth = AuthApi::new(base.clone());
        let authorized = Arc::new(AuthorizedClient::new(
            base,
            sessions.clone(),
            Arc::new(auth.clone()),
        ));
        let chat = ChatApi::new(authorized.clone());
        let users = UsersApi::new(authorized);

        Ok(Self {
            sessions,
            auth,
            chat,
            users,
        })
    }

    /// Restore the persisted session, if any. Call once at startup.
    pub fn bootstrap(&self) -> Result<Option<Session>, ClientError> {
        self.sessions.bootstrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let result = self.auth.login(email, password).await?;
        let session = Session {
            user: result.user,
            access_token: result.access_token,
            refresh_token: result.refresh_token,
        };
        self.sessions.establish(session.clone())?;
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        self.sessions.clear()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn chat(&self) -> &ChatApi {
        &self.chat
    }

    pub fn users(&self) -> &UsersApi {
        &self.users
    }

    /// Build the synchronization engine for one peer conversation.
    ///
    /// Requires an authenticated session: message origin is derived from
    /// the current user's id.
    pub fn open_conversation(&self, peer_id: impl Into<String>) -> Result<Arc<ChatSync>, ClientError> {
        let my_user_id = self
            .sessions
            .user_id()
            .ok_or_else(|| ClientError::Auth("no authenticated session".to_owned()))?;
        Ok(Arc::new(ChatSync::new(
            self.chat.clone(),
            peer_id.into(),
            my_user_id,
        )))
    }
}
