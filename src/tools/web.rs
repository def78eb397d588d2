//! `fetch_url`: HTTP requests with HTML to markdown conversion.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};

use super::{Tool, ToolContext, ToolResult, str_arg, truncate_chars, u64_arg};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Hard ceiling on bytes read from any response body.
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

pub struct FetchUrlTool;

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch a URL over HTTP. HTML is converted to markdown unless format is 'html'; \
         JSON and plain text are returned as-is."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "URL to fetch"},
                "method": {"type": "string", "description": "HTTP method (default GET)"},
                "headers": {"type": "object", "description": "Extra request headers"},
                "timeout": {"type": "integer", "description": "Timeout in seconds (default 30)"},
                "format": {"type": "string", "enum": ["markdown", "html"], "description": "How to return HTML pages (default markdown)"},
                "max_length": {"type": "integer", "description": "Truncate the body to this many characters"}
            },
            "required": ["url"]
        })
    }

    fn requires_approval(&self) -> bool {
        true
    }

    async fn execute(&self, _ctx: &ToolContext, args: Value) -> ToolResult {
        let Some(url) = str_arg(&args, "url") else {
            return ToolResult::missing("url");
        };
        let method = str_arg(&args, "method").unwrap_or("GET");
        let timeout = u64_arg(&args, "timeout")
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let format = str_arg(&args, "format").unwrap_or("markdown");
        let max_length = u64_arg(&args, "max_length").map(|n| n as usize);

        let method = match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
            Ok(m) => m,
            Err(_) => return ToolResult::err(format!("Invalid HTTP method: {method}")),
        };
        let headers = match build_headers(args.get("headers")) {
            Ok(h) => h,
            Err(message) => return ToolResult::err(message),
        };

        fetch_url(url, method, headers, timeout, format, max_length).await
    }
}

fn build_headers(raw: Option<&Value>) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();
    let Some(map) = raw.and_then(Value::as_object) else {
        return Ok(headers);
    };
    for (name, value) in map {
        let value = value
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string());
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("Invalid header name '{name}': {e}"))?;
        let value = HeaderValue::from_str(&value).map_err(|e| format!("Invalid header value: {e}"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Perform the request and shape the body for the model.
pub async fn fetch_url(
    url: &str,
    method: Method,
    headers: HeaderMap,
    timeout_secs: u64,
    format: &str,
    max_length: Option<usize>,
) -> ToolResult {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(10))
        .user_agent("Mozilla/5.0 (compatible; omni/0.1)")
        .build()
    {
        Ok(c) => c,
        Err(e) => return ToolResult::err(format!("Failed to build HTTP client: {e}")),
    };

    tracing::debug!("Fetching {} {}", method, url);

    let response = match client.request(method, url).headers(headers).send().await {
        Ok(r) => r,
        Err(e) if e.is_timeout() => {
            return ToolResult::err(format!("Request timed out after {timeout_secs}s: {url}"));
        }
        Err(e) => return ToolResult::err(format!("Failed to fetch {url}: {e}")),
    };

    let status = response.status();
    if !status.is_success() {
        tracing::warn!("HTTP {} from {}", status.as_u16(), url);
        return ToolResult::err(format!("HTTP {}: {url}", status.as_u16()))
            .with_meta("status_code", status.as_u16());
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let cap = body_cap(&content_type, format, max_length);
    let (bytes, capped) = match read_capped(response, cap).await {
        Ok(read) => read,
        Err(e) if e.is_timeout() => {
            return ToolResult::err(format!("Request timed out after {timeout_secs}s: {url}"));
        }
        Err(e) => return ToolResult::err(format!("Failed to read body from {url}: {e}")),
    };
    if capped {
        tracing::debug!("Stopped reading {} after {} bytes", url, bytes.len());
    }
    let body = String::from_utf8_lossy(&bytes);

    let output = shape_body(&body, &content_type, format);
    tracing::info!(
        "Fetched {} bytes from {} (status: {})",
        body.len(),
        url,
        status.as_u16()
    );

    ToolResult::ok(truncate_chars(&output, max_length))
        .with_meta("url", url)
        .with_meta("status_code", status.as_u16())
        .with_meta("content_length", body.len())
        .with_meta("content_type", content_type)
        .with_meta("body_capped", capped)
}

/// Bytes worth reading for a response. Pass-through bodies need at most four
/// bytes per requested character; HTML headed for markdown loses its markup,
/// so it only gets the global ceiling.
fn body_cap(content_type: &str, format: &str, max_length: Option<usize>) -> usize {
    let converts = content_type.contains("text/html") && format == "markdown";
    match max_length {
        Some(n) if !converts => n.saturating_mul(4).min(MAX_BODY_BYTES),
        _ => MAX_BODY_BYTES,
    }
}

/// Stream the body until it ends or `cap` bytes are in hand. The flag is set
/// when bytes were left unread.
async fn read_capped(mut response: reqwest::Response, cap: usize) -> reqwest::Result<(Vec<u8>, bool)> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = cap - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, false))
}

/// HTML becomes markdown unless raw HTML was asked for; everything else
/// passes through.
fn shape_body(body: &str, content_type: &str, format: &str) -> String {
    if content_type.contains("text/html") && format == "markdown" {
        htmd::convert(body).unwrap_or_else(|_| body.to_string())
    } else {
        body.to_string()
    }
}
