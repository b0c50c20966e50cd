use std::time::Duration;

use async_trait::async_trait;
use client_core::ClientError;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Request timeout applied at the transport boundary.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Owned request body.
///
/// Multipart fields are kept as plain data and rebuilt into a form per
/// attempt, so the authorized decorator can resend attachments after a
/// token refresh.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<MultipartField>),
}

#[derive(Debug, Clone)]
pub struct MultipartField {
    pub name: String,
    pub part: MultipartPart,
}

#[derive(Debug, Clone)]
pub enum MultipartPart {
    Text(String),
    File {
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            part: MultipartPart::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            part: MultipartPart::File {
                file_name: file_name.into(),
                content_type,
                bytes,
            },
        }
    }
}

/// The transport contract: one request, one typed failure.
///
/// Implemented by [`RestClient`] and decorated by
/// [`crate::authorized::AuthorizedClient`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        headers: HeaderMap,
    ) -> Result<Value, ClientError>;
}

/// Base HTTP client over `reqwest`.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(base_url.into());
        let http = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ClientError::Network {
                url: base_url.clone(),
                cause: err.to_string(),
            })?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

#[async_trait]
impl HttpTransport for RestClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        headers: HeaderMap,
    ) -> Result<Value, ClientError> {
        let url = self.url(path);
        let mut request = self.http.request(method.clone(), &url).headers(headers);

        // GET/DELETE never carry a body.
        if method != Method::GET && method != Method::DELETE {
            request = match body {
                RequestBody::Empty => request,
                RequestBody::Json(value) => request.json(&value),
                // Content-Type is left to reqwest so the boundary is correct.
                RequestBody::Multipart(fields) => request.multipart(build_form(fields)?),
            };
        }

        let response = request.send().await.map_err(|err| ClientError::Network {
            url: url.clone(),
            cause: err.to_string(),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|err| ClientError::Network {
            url: url.clone(),
            cause: err.to_string(),
        })?;
        let payload = parse_payload(text);

        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                url,
                payload,
            });
        }

        // 204/empty body is a successful `null`, not a parse failure.
        Ok(payload.unwrap_or(Value::Null))
    }
}

/// Decode a raw payload into the expected response shape.
pub fn decode<T: DeserializeOwned>(context: &str, payload: Value) -> Result<T, ClientError> {
    serde_json::from_value(payload).map_err(|err| ClientError::Decode {
        url: context.to_owned(),
        cause: err.to_string(),
    })
}

fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_owned()
}

fn parse_payload(text: String) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

fn build_form(fields: Vec<MultipartField>) -> Result<Form, ClientError> {
    let mut form = Form::new();
    for field in fields {
        form = match field.part {
            MultipartPart::Text(value) => form.text(field.name, value),
            MultipartPart::File {
                file_name,
                content_type,
                bytes,
            } => {
                let mut part = Part::bytes(bytes).file_name(file_name);
                if let Some(mime) = content_type {
                    part = part.mime_str(&mime).map_err(|err| {
                        ClientError::Validation(format!("invalid attachment content type: {err}"))
                    })?;
                }
                form.part(field.name, part)
            }
        };
    }
    Ok(form)
}
