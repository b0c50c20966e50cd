use std::sync::Arc;

use async_trait::async_trait;
use client_core::{ClientError, SessionUser};
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::authorized::{RefreshedTokens, TokenRefresher};
use crate::http::{HttpTransport, RequestBody, decode};

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";

/// Response of `POST /auth/login`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub user: SessionUser,
    pub access_token: String,
    pub refresh_token: String,
}

/// Auth endpoints over the base (unauthenticated) transport.
#[derive(Clone)]
pub struct AuthApi {
    http: Arc<dyn HttpTransport>,
}

impl AuthApi {
    pub fn new(http: Arc<dyn HttpTransport>) -> Self {
        Self { http }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult, ClientError> {
        let payload = self
            .http
            .request(
                Method::POST,
                LOGIN_PATH,
                RequestBody::Json(json!({ "email": email, "password": password })),
                HeaderMap::new(),
            )
            .await?;
        decode(LOGIN_PATH, payload)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ClientError> {
        let payload = self
            .http
            .request(
                Method::POST,
                REFRESH_PATH,
                RequestBody::Json(json!({ "refreshToken": refresh_token })),
                HeaderMap::new(),
            )
            .await?;
        decode(REFRESH_PATH, payload)
    }
}

#[async_trait]
impl TokenRefresher for AuthApi {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ClientError> {
        AuthApi::refresh(self, refresh_token).await
    }
}
