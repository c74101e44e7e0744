//! HTTP request tool — fetch URLs with endpoint restrictions.
//!
//! Requests to private or loopback hosts are always refused, so the
//! agent cannot be steered into probing the local network. An optional
//! endpoint allowlist restricts which URL prefixes may be reached.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tessel_core::error::ToolError;
use tessel_core::schema::{ParamType, ToolParameter, ToolSchema};
use tessel_core::tool::{Tool, ToolArgs};
use tracing::debug;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_RESPONSE_BYTES: usize = 256 * 1024;

pub struct HttpRequestTool {
    schema: ToolSchema,
    /// URL prefixes that may be reached. Empty = all (non-private) allowed.
    allowed_endpoints: Vec<String>,
    client: reqwest::Client,
}

impl HttpRequestTool {
    pub fn new(allowed_endpoints: Vec<String>) -> Self {
        let schema = ToolSchema::new(
            "http_request",
            "Make an HTTP request to a URL and return the status and body.",
            vec![
                ToolParameter::required("url", ParamType::String, "The URL to request"),
                ToolParameter::optional(
                    "method",
                    ParamType::String,
                    "HTTP method. Defaults to GET.",
                )
                .with_allowed_values(vec![json!("GET"), json!("POST")]),
                ToolParameter::optional(
                    "body",
                    ParamType::String,
                    "Request body (POST only)",
                ),
                ToolParameter::optional(
                    "timeout_secs",
                    ParamType::Integer,
                    "Request timeout in seconds (default 30)",
                ),
            ],
        )
        .expect("static schema");

        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        Self {
            schema,
            allowed_endpoints,
            client,
        }
    }

    fn check_url(&self, url: &str) -> Result<(), ToolError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        if is_private_url(url) {
            return Err(ToolError::PermissionDenied {
                tool_name: "http_request".into(),
                reason: "requests to private or loopback hosts are not allowed".into(),
            });
        }

        if !self.allowed_endpoints.is_empty()
            && !self.allowed_endpoints.iter().any(|p| url.starts_with(p))
        {
            return Err(ToolError::PermissionDenied {
                tool_name: "http_request".into(),
                reason: format!("URL '{url}' not in endpoint allowlist"),
            });
        }

        Ok(())
    }
}

/// Whether a URL points at a loopback, private, link-local, or otherwise
/// non-routable host. Link-local covers the cloud metadata endpoint
/// (169.254.169.254).
fn is_private_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let host_port = rest.split(['/', '?', '#']).next().unwrap_or("");

    // [::1]:8080 style IPv6 hosts
    let host = if host_port.starts_with('[') {
        host_port
            .trim_start_matches('[')
            .split(']')
            .next()
            .unwrap_or("")
            .to_string()
    } else {
        host_port.split(':').next().unwrap_or("").to_lowercase()
    };

    if host == "localhost" {
        return true;
    }

    match host.parse::<std::net::IpAddr>() {
        Ok(std::net::IpAddr::V4(v4)) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                // 0.0.0.0/8 routes to "this network" (usually loopback)
                || v4.octets()[0] == 0
        }
        Ok(std::net::IpAddr::V6(v6)) => v6.is_loopback() || v6.is_unspecified(),
        Err(_) => false,
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let url = args.expect_str("url")?;
        let method = args.str("method").unwrap_or("GET");
        let timeout_secs = args
            .int("timeout_secs")
            .map(|t| t.clamp(1, 120) as u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        self.check_url(url)?;

        debug!(%url, method, "Sending HTTP request");

        let mut request = match method {
            "POST" => self.client.post(url),
            _ => self.client.get(url),
        };
        request = request.timeout(Duration::from_secs(timeout_secs));

        if let Some(body) = args.str("body") {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout {
                    tool_name: "http_request".into(),
                    timeout_secs,
                }
            } else {
                ToolError::ExecutionFailed {
                    tool_name: "http_request".into(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "http_request".into(),
                reason: format!("Failed to read response body: {e}"),
            })?;

        let truncated = body.len() > MAX_RESPONSE_BYTES;
        let mut body = body;
        if truncated {
            body.truncate(MAX_RESPONSE_BYTES);
            body.push_str("\n[response truncated]");
        }

        Ok(format!("[status: {status}]\n{body}"))
    }
}
