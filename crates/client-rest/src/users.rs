use std::sync::Arc;

use client_core::ClientError;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::http::{HttpTransport, RequestBody, decode};

const USERS_PATH: &str = "/users";

/// Directory entry from `GET /users`, enough to pick a conversation peer.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Public profile from `GET /users/:id`. Corporate fields are optional;
/// the backend omits what it does not track.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company_section: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// User directory endpoints over the authorized transport.
#[derive(Clone)]
pub struct UsersApi {
    http: Arc<dyn HttpTransport>,
}

impl UsersApi {
    pub fn new(http: Arc<dyn HttpTransport>) -> Self {
        Self { http }
    }

    /// Every user visible to the caller.
    pub async fn list(&self) -> Result<Vec<DirectoryUser>, ClientError> {
        let payload = self
            .http
            .request(Method::GET, USERS_PATH, RequestBody::Empty, HeaderMap::new())
            .await?;
        decode(USERS_PATH, payload)
    }

    /// One user's public profile.
    pub async fn profile(&self, user_id: &str) -> Result<UserProfile, ClientError> {
        let path = format!("{USERS_PATH}/{user_id}");
        let payload = self
            .http
            .request(Method::GET, &path, RequestBody::Empty, HeaderMap::new())
            .await?;
        decode(&path, payload)
    }
}
