use std::time::Duration;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error};

use crate::config::{DEFAULT_API_VERSION, DEFAULT_TIMEOUT_SECS};
use crate::domain::error::KnowledgeError;

#[derive(Debug, Clone)]
pub struct ApiRequest<'a> {
    method: Method,
    endpoint: &'a str,
    path: &'a str,
    api_key: &'a str,
    api_version: &'a str,
    params: &'a [(&'a str, &'a str)],
    json_body: Option<&'a Value>,
    timeout_secs: u64,
}

impl<'a> ApiRequest<'a> {
    pub fn new(method: Method, endpoint: &'a str, path: &'a str, api_key: &'a str) -> Self {
        Self {
            method,
            endpoint,
            path,
            api_key,
            api_version: DEFAULT_API_VERSION,
            params: &[],
            json_body: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn api_version(mut self, api_version: &'a str) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn params(mut self, params: &'a [(&'a str, &'a str)]) -> Self {
        self.params = params;
        self
    }

    pub fn json_body(mut self, body: &'a Value) -> Self {
        self.json_body = Some(body);
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    Text(String),
    NoContent,
}

impl ApiResponse {
    pub fn into_json(self) -> Result<Value, KnowledgeError> {
        match self {
            ApiResponse::Json(value) => Ok(value),
            ApiResponse::Text(_) => Err(KnowledgeError::Decode(
                "expected a JSON response body, got text".to_string(),
            )),
            ApiResponse::NoContent => Err(KnowledgeError::Decode(
                "expected a JSON response body, got no content".to_string(),
            )),
        }
    }
}

pub async fn send_request(
    session: Option<&Client>,
    request: ApiRequest<'_>,
) -> Result<ApiResponse, KnowledgeError> {
    let url = request.url();
    let timeout = Duration::from_secs(request.timeout_secs);

    // A transient client lives only for this call; an injected session is reused as-is.
    let transient;
    let client = match session {
        Some(client) => client,
        None => {
            transient = Client::builder()
                .connect_timeout(timeout)
                .timeout(timeout)
                .build()
                .map_err(|e| KnowledgeError::Transport(e.to_string()))?;
            &transient
        }
    };

    debug!("{} {} (api-version {})", request.method, url, request.api_version);

    let mut builder = client
        .request(request.method.clone(), &url)
        .query(&[("api-version", request.api_version)])
        .header("api-key", request.api_key)
        .timeout(timeout);

    if !request.params.is_empty() {
        builder = builder.query(request.params);
    }
    if let Some(body) = request.json_body {
        builder = builder.json(body);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| wrap_transport(e, &url, request.timeout_secs))?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(error_for_status(&url, response).await);
    }

    if status == StatusCode::NO_CONTENT {
        return Ok(ApiResponse::NoContent);
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .eq_ignore_ascii_case("application/json")
        })
        .unwrap_or(false);

    let body = response
        .text()
        .await
        .map_err(|e| wrap_transport(e, &url, request.timeout_secs))?;

    if is_json {
        let value: Value =
            serde_json::from_str(&body).map_err(|e| KnowledgeError::Decode(e.to_string()))?;
        Ok(ApiResponse::Json(value))
    } else {
        Ok(ApiResponse::Text(body))
    }
}

pub(crate) async fn error_for_status(url: &str, response: reqwest::Response) -> KnowledgeError {
    let status = response.status();
    let headers = Box::new(response.headers().clone());
    let body = response.text().await.unwrap_or_default();
    let detail = if body.is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        body
    };
    error!("HTTP {} from {}: {}", status.as_u16(), url, detail);
    KnowledgeError::Http {
        status: status.as_u16(),
        detail,
        headers,
    }
}

pub(crate) fn wrap_transport(err: reqwest::Error, url: &str, timeout_secs: u64) -> KnowledgeError {
    if err.is_timeout() {
        KnowledgeError::Timeout {
            url: url.to_string(),
            timeout_secs,
        }
    } else {
        KnowledgeError::Transport(err.to_string())
    }
}
