// Gemini generate-content client.
//
// Sends image and text parts to the `models/{model}:generateContent` REST
// endpoint and pulls the first inline image out of the response. One call
// produces at most one mockup; the orchestrator in `app` fans calls out.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::media::ImageData;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";

// ---------------------------------------------------------------------------
// Request parts and errors
// ---------------------------------------------------------------------------

/// One element of the request's `contents.parts` array.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    InlineImage(ImageData),
    Text(String),
}

impl Part {
    fn to_json(&self) -> Value {
        match self {
            Part::InlineImage(img) => json!({
                "inlineData": { "mimeType": img.mime_type, "data": img.data }
            }),
            Part::Text(text) => json!({ "text": text }),
        }
    }
}

/// Failure of a single generate-content call.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// Anything that can turn request parts into a generated image.
///
/// `Ok(None)` means the call succeeded but the model returned no image.
#[async_trait]
pub trait MockupBackend: Send + Sync {
    async fn generate(&self, parts: Vec<Part>) -> Result<Option<ImageData>, GenerateError>;
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Low-level Gemini REST client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    /// Create a client against the public endpoint with no request timeout.
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Create a client with an explicit endpoint and per-request timeout.
    pub fn with_settings(
        api_key: String,
        model: String,
        endpoint: String,
        timeout: Duration,
    ) -> Result<Self, GenerateError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            model,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    /// Send one generate-content request and return the first inline image.
    pub async fn generate_content(&self, parts: &[Part]) -> Result<Option<ImageData>, GenerateError> {
        if self.api_key.is_empty() {
            return Err(GenerateError::MissingApiKey);
        }

        let body = build_request_body(parts);
        let response = self
            .http
            .post(self.request_url())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), bytes = text.len(), "generateContent response");

        if !status.is_success() {
            let message = extract_error_message(&text);
            warn!(status = status.as_u16(), %message, "generateContent failed");
            return Err(GenerateError::Status {
                status: status.as_u16(),
                message,
            });
        }

        parse_inline_image(&text)
    }
}

#[async_trait]
impl MockupBackend for GeminiClient {
    async fn generate(&self, parts: Vec<Part>) -> Result<Option<ImageData>, GenerateError> {
        self.generate_content(&parts).await
    }
}

// ---------------------------------------------------------------------------
// LlmClient wrapper
// ---------------------------------------------------------------------------

/// High-level wrapper that can be either an active Gemini client or disabled.
pub enum LlmClient {
    /// Gemini API is configured and ready.
    Active(GeminiClient),
    /// Generation is disabled (no API key configured).
    Disabled,
}

impl LlmClient {
    /// Build an `LlmClient` from the application config.
    ///
    /// Returns `Active` if an API key is present, otherwise `Disabled`.
    pub fn from_config(config: &Config) -> Result<Self, GenerateError> {
        match &config.credentials.gemini_api_key {
            Some(key) if !key.is_empty() => {
                let gemini = &config.gemini;
                let client = GeminiClient::with_settings(
                    key.clone(),
                    gemini.model.clone(),
                    gemini.endpoint.clone(),
                    Duration::from_secs(gemini.request_timeout_secs),
                )?;
                Ok(LlmClient::Active(client))
            }
            _ => Ok(LlmClient::Disabled),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LlmClient::Active(_))
    }
}

#[async_trait]
impl MockupBackend for LlmClient {
    async fn generate(&self, parts: Vec<Part>) -> Result<Option<ImageData>, GenerateError> {
        match self {
            LlmClient::Active(client) => client.generate_content(&parts).await,
            LlmClient::Disabled => Err(GenerateError::MissingApiKey),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// Build the generate-content request body, asking for image and text output.
pub(crate) fn build_request_body(parts: &[Part]) -> Value {
    let parts: Vec<Value> = parts.iter().map(Part::to_json).collect();
    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] }
    })
}

/// Extract the first inline image from a generate-content response body.
///
/// Expected shape:
/// `{ "candidates": [ { "content": { "parts": [ { "inlineData": { "mimeType": "...", "data": "..." } } ] } } ] }`
///
/// A well-formed response without candidates or without an inline part
/// (e.g. text-only or blocked) yields `Ok(None)`.
pub(crate) fn parse_inline_image(body: &str) -> Result<Option<ImageData>, GenerateError> {
    let v: Value = serde_json::from_str(body)
        .map_err(|e| GenerateError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let Some(parts) = v
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
    else {
        debug!("response carried no candidate parts");
        return Ok(None);
    };

    for part in parts {
        let Some(inline) = part.get("inlineData") else {
            continue;
        };
        let mime = inline.get("mimeType").and_then(Value::as_str);
        let data = inline.get("data").and_then(Value::as_str);
        return match (mime, data) {
            (Some(mime), Some(data)) => Ok(Some(ImageData::new(mime, data))),
            _ => Err(GenerateError::MalformedResponse(
                "inlineData missing mimeType or data".to_string(),
            )),
        };
    }

    Ok(None)
}

/// Extract a human-readable message from an API error body.
///
/// Expected shape: `{ "error": { "code": 400, "message": "...", "status": "..." } }`.
/// Falls back to the raw body (truncated) when the shape doesn't match.
pub(crate) fn extract_error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.get("error")?
            .get("message")?
            .as_str()
            .map(|s| s.to_string())
    });
    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.chars().take(200).collect(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    // -- Request body --

    #[test]
    fn request_body_shape() {
        let parts = vec![
            Part::InlineImage(ImageData::new("image/png", "AAA=")),
            Part::Text("make it pop".to_string()),
        ];
        let body = build_request_body(&parts);
        assert_eq!(
            body["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["data"], "AAA=");
        assert_eq!(body["contents"][0]["parts"][1]["text"], "make it pop");
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            json!(["IMAGE", "TEXT"])
        );
    }

    // -- Response parsing --

    #[test]
    fn parse_first_inline_image() {
        let body = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "Here is your mockup" },
                        { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } },
                        { "inlineData": { "mimeType": "image/png", "data": "second" } }
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let img = parse_inline_image(body).unwrap().unwrap();
        assert_eq!(img, ImageData::new("image/png", "iVBORw0KGgo="));
    }

    #[test]
    fn parse_animated_gif() {
        let body = r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/gif","data":"R0lGODlh"}}]}}]}"#;
        let img = parse_inline_image(body).unwrap().unwrap();
        assert!(img.is_animated());
    }

    #[test]
    fn parse_text_only_is_none() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"I cannot do that"}]}}]}"#;
        assert_eq!(parse_inline_image(body).unwrap(), None);
    }

    #[test]
    fn parse_no_candidates_is_none() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert_eq!(parse_inline_image(body).unwrap(), None);
        assert_eq!(parse_inline_image(r#"{"candidates":[]}"#).unwrap(), None);
    }

    #[test]
    fn parse_invalid_json_is_error() {
        assert!(matches!(
            parse_inline_image("not json"),
            Err(GenerateError::MalformedResponse(_))
        ));
    }

    #[test]
    fn parse_inline_without_data_is_error() {
        let body = r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png"}}]}}]}"#;
        assert!(matches!(
            parse_inline_image(body),
            Err(GenerateError::MalformedResponse(_))
        ));
    }

    #[test]
    fn error_message_from_api_body() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(extract_error_message(body), "API key not valid.");
    }

    #[test]
    fn error_message_fallbacks() {
        assert_eq!(extract_error_message(""), "empty response body");
        assert_eq!(extract_error_message("Bad Gateway"), "Bad Gateway");
        let long = "x".repeat(500);
        assert_eq!(extract_error_message(&long).len(), 200);
    }

    // -- Disabled / missing key --

    #[tokio::test]
    async fn disabled_client_reports_missing_key() {
        let client = LlmClient::Disabled;
        let err = client.generate(vec![]).await.unwrap_err();
        assert!(matches!(err, GenerateError::MissingApiKey));
    }

    #[tokio::test]
    async fn empty_api_key_reports_missing_key() {
        let client = GeminiClient::new(String::new(), DEFAULT_MODEL.to_string());
        let err = client.generate_content(&[]).await.unwrap_err();
        assert!(matches!(err, GenerateError::MissingApiKey));
    }

    // -- LlmClient::from_config --

    #[test]
    fn from_config_with_api_key_returns_active() {
        let config = make_test_config(Some("AIza-test-key".to_string()));
        let client = LlmClient::from_config(&config).unwrap();
        assert!(client.is_active());
        match client {
            LlmClient::Active(c) => assert_eq!(c.model(), DEFAULT_MODEL),
            LlmClient::Disabled => unreachable!(),
        }
    }

    #[test]
    fn from_config_without_api_key_returns_disabled() {
        let config = make_test_config(None);
        assert!(matches!(LlmClient::from_config(&config).unwrap(), LlmClient::Disabled));
    }

    #[test]
    fn from_config_with_empty_api_key_returns_disabled() {
        let config = make_test_config(Some(String::new()));
        assert!(matches!(LlmClient::from_config(&config).unwrap(), LlmClient::Disabled));
    }

    // -- Integration-style tests with a mock HTTP server --

    /// Read one HTTP request (headers plus Content-Length body) from `socket`.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = vec![0u8; 8192];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&raw).to_string()
    }

    /// Serve exactly one response, returning the captured request text.
    async fn serve_once(status_line: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            request
        });

        (format!("http://{addr}/v1beta"), handle)
    }

    fn test_client(endpoint: String) -> GeminiClient {
        GeminiClient::with_settings(
            "test-key".to_string(),
            "test-model".to_string(),
            endpoint,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn mock_server_returns_image() {
        let body = r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"TU9DSw=="}}]}}]}"#;
        let (endpoint, server) = serve_once("200 OK", body.to_string()).await;

        let client = test_client(endpoint);
        let parts = vec![
            Part::InlineImage(ImageData::new("image/png", "UFJPRA==")),
            Part::Text("prompt text".to_string()),
        ];
        let img = client.generate_content(&parts).await.unwrap().unwrap();
        assert_eq!(img, ImageData::new("image/png", "TU9DSw=="));

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /v1beta/models/test-model:generateContent HTTP/1.1"));
        assert!(lower.contains("x-goog-api-key: test-key"));
        assert!(request.contains("\"responseModalities\":[\"IMAGE\",\"TEXT\"]"));
        assert!(request.contains("\"text\":\"prompt text\""));
    }

    #[tokio::test]
    async fn mock_server_text_only_is_none() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"no image today"}]}}]}"#;
        let (endpoint, server) = serve_once("200 OK", body.to_string()).await;

        let client = test_client(endpoint);
        let result = client
            .generate_content(&[Part::Text("hi".to_string())])
            .await
            .unwrap();
        assert!(result.is_none());

        let _ = server.await;
    }

    #[tokio::test]
    async fn mock_server_error_status() {
        let body = r#"{"error":{"code":403,"message":"Permission denied","status":"PERMISSION_DENIED"}}"#;
        let (endpoint, server) = serve_once("403 Forbidden", body.to_string()).await;

        let client = test_client(endpoint);
        let err = client
            .generate_content(&[Part::Text("hi".to_string())])
            .await
            .unwrap_err();
        match err {
            GenerateError::Status { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Permission denied");
            }
            other => panic!("Expected GenerateError::Status, got: {other:?}"),
        }

        let _ = server.await;
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        // Bind then drop to get a port nothing is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = test_client(format!("http://{addr}"));
        let err = client
            .generate_content(&[Part::Text("hi".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Transport(_)));
    }

    #[tokio::test]
    async fn stalled_server_times_out_as_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and read the request, then never answer.
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = read_request(&mut socket).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let client = GeminiClient::with_settings(
            "test-key".to_string(),
            "test-model".to_string(),
            format!("http://{addr}/v1beta"),
            Duration::from_secs(1),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let err = client
            .generate_content(&[Part::Text("hi".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Transport(_)), "got: {err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));

        server.abort();
    }

    // -- Helper to build a minimal Config for testing --

    fn make_test_config(api_key: Option<String>) -> Config {
        Config {
            gemini: GeminiConfig {
                model: DEFAULT_MODEL.to_string(),
                endpoint: DEFAULT_ENDPOINT.to_string(),
                request_timeout_secs: 120,
            },
            generation: GenerationConfig {
                required_successes: 5,
                default_model: crate::protocol::ModelType::Unisex,
            },
            output: OutputConfig {
                dir: "mockups".to_string(),
                timestamped_runs: true,
            },
            credentials: CredentialsConfig {
                gemini_api_key: api_key,
            },
        }
    }
}
