// API client module: a small blocking HTTP client that sends the payload
// to the backend and issues follow-up status polls. Kept synchronous; the
// whole run is one linear pipeline with nothing to overlap.

use crate::config::UploadMode;
use crate::error::{Error, Result};
use crate::payload::Payload;
use crate::status::{PollTarget, StatusPoller};
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;

/// Multipart field name the backend expects the payload under.
const MULTIPART_FIELD: &str = "artifact";

/// Parsed view of a backend response: HTTP status, JSON-or-text body, and
/// the response headers (lowercased names). Read-only once built.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub status: u16,
    pub body: ResponseBody,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

/// The backend's status contract: both fields optional, names in
/// camelCase on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFields {
    pub status: Option<String>,
    pub status_url: Option<String>,
}

impl UploadResult {
    /// Typed view of the status contract in a JSON body; empty for text
    /// bodies and for bodies that do not match the contract.
    pub fn status_fields(&self) -> StatusFields {
        match &self.body {
            ResponseBody::Json(v) => serde_json::from_value(v.clone()).unwrap_or_default(),
            ResponseBody::Text(_) => StatusFields::default(),
        }
    }

    /// The `status` field of a JSON body, if any.
    pub fn status_field(&self) -> Option<String> {
        self.status_fields().status
    }

    /// The poll URL: an explicit `statusUrl` body field, or a
    /// redirect-style `Location` header.
    pub fn status_url(&self) -> Option<String> {
        self.status_fields()
            .status_url
            .or_else(|| self.headers.get("location").cloned())
    }
}

/// Blocking API client holding the upload URL and an optional bearer token
/// for authenticated calls.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(ApiClient {
            client,
            url: url.into(),
            token,
        })
    }

    /// POST the payload in the configured encoding. A non-2xx response is a
    /// terminal [`Error::Upload`]; there are no retries.
    pub fn upload(&self, payload: &Payload, mode: UploadMode) -> Result<UploadResult> {
        info!(
            bytes = payload.bytes.len(),
            file = %payload.file_name,
            url = %self.url,
            ?mode,
            "uploading payload"
        );
        let req = match mode {
            UploadMode::RawBinary => self
                .client
                .post(&self.url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(payload.bytes.clone()),
            UploadMode::AuthenticatedBinary => {
                let mut req = self
                    .client
                    .post(&self.url)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(payload.bytes.clone());
                if let Some(t) = &self.token {
                    req = req.bearer_auth(t);
                }
                req
            }
            UploadMode::Multipart => {
                // The overall content type is left to reqwest so the
                // multipart boundary ends up in the header.
                let part = multipart::Part::bytes(payload.bytes.clone())
                    .file_name(payload.file_name.clone())
                    .mime_str("application/zip")?;
                let form = multipart::Form::new().part(MULTIPART_FIELD, part);
                let mut req = self.client.post(&self.url).multipart(form);
                if let Some(t) = &self.token {
                    req = req.bearer_auth(t);
                }
                req
            }
        };

        let res = req.send()?;
        into_result(res)
    }
}

impl StatusPoller for ApiClient {
    fn poll_status(&self, target: &PollTarget) -> Result<UploadResult> {
        let mut req = self.client.get(&target.url);
        if let Some(t) = &target.auth_token {
            req = req.bearer_auth(t);
        }
        let res = req.send()?;
        into_result(res)
    }
}

/// Convert an HTTP response into an [`UploadResult`], or an
/// [`Error::Upload`] carrying a best-effort body read on non-2xx.
fn into_result(res: Response) -> Result<UploadResult> {
    let status = res.status();
    let headers: HashMap<String, String> = res
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();

    let text = res.text().unwrap_or_else(|_| String::new());
    if !status.is_success() {
        return Err(Error::Upload {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            body: text,
        });
    }

    let body = match serde_json::from_str(&text) {
        Ok(v) => ResponseBody::Json(v),
        Err(_) => ResponseBody::Text(text),
    };
    Ok(UploadResult {
        status: status.as_u16(),
        body,
        headers,
    })
}
