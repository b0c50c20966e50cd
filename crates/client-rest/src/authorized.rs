use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use client_core::{ClientError, Session};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::http::{HttpTransport, RequestBody};

/// Token pair returned by the refresh endpoint.
///
/// The refresh token is optional; when absent the previous one stays valid.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Credential renewal operation, implemented by the auth API over the
/// *base* transport (never the authorized one, to avoid recursion).
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ClientError>;
}

/// Read access to the current session plus the two refresh callbacks.
///
/// The decorator never mutates session state itself; ownership stays with
/// the implementor (normally [`crate::session::SessionManager`]).
#[async_trait]
pub trait SessionAccess: Send + Sync {
    fn session(&self) -> Option<Session>;

    /// Persist refreshed tokens. Runs inside the shared refresh operation,
    /// before any waiter observes the result.
    async fn tokens_refreshed(&self, tokens: &RefreshedTokens) -> Result<(), ClientError>;

    /// Refresh failed unrecoverably; the session should be destroyed.
    async fn session_invalidated(&self);
}

type SharedRefresh = Shared<BoxFuture<'static, Result<RefreshedTokens, ClientError>>>;

/// Transport decorator that attaches the bearer credential and recovers
/// from expired access tokens.
///
/// Per request attempt: no session means plain passthrough; otherwise the
/// request goes out with `Authorization: Bearer <accessToken>`. A 401
/// response joins the single in-flight refresh (creating it if absent) and
/// retries exactly once with the new token; that retry's outcome is final
/// even if it is another 401. A failed refresh invalidates the session and
/// re-raises the original 401.
pub struct AuthorizedClient {
    inner: Arc<dyn HttpTransport>,
    sessions: Arc<dyn SessionAccess>,
    refresher: Arc<dyn TokenRefresher>,
    pending_refresh: Arc<Mutex<Option<SharedRefresh>>>,
}

impl AuthorizedClient {
    pub fn new(
        inner: Arc<dyn HttpTransport>,
        sessions: Arc<dyn SessionAccess>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            inner,
            sessions,
            refresher,
            pending_refresh: Arc::new(Mutex::new(None)),
        }
    }

    /// Join the in-flight refresh, creating it when the slot is empty.
    ///
    /// The slot is cleared on settlement; clones already handed out keep
    /// serving their shared result.
    fn ensure_fresh_tokens(&self) -> SharedRefresh {
        let mut slot = self.pending_refresh.lock().expect("refresh slot poisoned");
        if let Some(pending) = slot.as_ref() {
            return pending.clone();
        }

        let sessions = Arc::clone(&self.sessions);
        let refresher = Arc::clone(&self.refresher);
        let slot_handle = Arc::clone(&self.pending_refresh);
        let pending: SharedRefresh = async move {
            let result = run_refresh(sessions, refresher).await;
            *slot_handle.lock().expect("refresh slot poisoned") = None;
            result
        }
        .boxed()
        .shared();

        *slot = Some(pending.clone());
        pending
    }
}

async fn run_refresh(
    sessions: Arc<dyn SessionAccess>,
    refresher: Arc<dyn TokenRefresher>,
) -> Result<RefreshedTokens, ClientError> {
    let session = sessions
        .session()
        .ok_or_else(|| ClientError::Auth("no refresh token available".to_owned()))?;
    let tokens = refresher.refresh(&session.refresh_token).await?;
    sessions.tokens_refreshed(&tokens).await?;
    Ok(tokens)
}

fn with_bearer(headers: &HeaderMap, access_token: &str) -> Result<HeaderMap, ClientError> {
    let value = HeaderValue::from_str(&format!("Bearer {access_token}"))
        .map_err(|_| ClientError::Validation("access token is not a valid header value".into()))?;
    let mut authed = headers.clone();
    authed.insert(AUTHORIZATION, value);
    Ok(authed)
}

#[async_trait]
impl HttpTransport for AuthorizedClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        headers: HeaderMap,
    ) -> Result<Value, ClientError> {
        // No session: forward unauthenticated, no refresh path.
        let Some(session) = self.sessions.session() else {
            return self.inner.request(method, path, body, headers).await;
        };

        let authed = with_bearer(&headers, &session.access_token)?;
        let outcome = self
            .inner
            .request(method.clone(), path, body.clone(), authed)
            .await;

        let original = match outcome {
            Err(err) if err.is_unauthorized() => err,
            other => return other,
        };

        debug!(path, "access token rejected, entering refresh");
        match self.ensure_fresh_tokens().await {
            Ok(tokens) => {
                let retry_headers = with_bearer(&headers, &tokens.access_token)?;
                self.inner.request(method, path, body, retry_headers).await
            }
            Err(refresh_err) => {
                warn!(error = %refresh_err, "token refresh failed, invalidating session");
                self.sessions.session_invalidated().await;
                Err(original)
            }
        }
    }
}
