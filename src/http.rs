//! HTTP client utilities for talking to the chat backend.
//!
//! Client construction, per-request headers and status checking shared by
//! every REST call and the streaming send.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::warn;

use crate::client::ClientError;
use crate::options::ClientOptions;

/// Build a configured HTTP client from client options.
///
/// This applies common configuration like timeouts and proxies.
pub fn build_http_client(options: &ClientOptions) -> Result<Client, ClientError> {
    let mut builder = Client::builder();

    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &options.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ClientError::Config(format!("invalid proxy {}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Add the bearer token and any extra headers from the options.
pub fn apply_headers(mut request: RequestBuilder, options: &ClientOptions) -> RequestBuilder {
    if let Some(api_key) = &options.api_key {
        request = request.header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()));
    }
    if let Some(headers) = &options.extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

/// Pass a success response through; turn anything else into [`ClientError::Status`].
///
/// `action` names the operation for the message, e.g. `"Failed to fetch chats"`.
pub async fn check_status(response: Response, action: &str) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error = status_error(status, action, &body);
    warn!(status = status.as_u16(), error = %error, "backend request failed");
    Err(error)
}

fn status_error(status: StatusCode, action: &str, body: &str) -> ClientError {
    let reason = status.canonical_reason().unwrap_or("Unknown Status");
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(detail) if !detail.error.is_empty() => format!("{}: {} ({})", action, reason, detail.error),
        _ => format!("{}: {}", action, reason),
    };
    ClientError::Status { status, message }
}
