//! Streaming request client with error classification and backoff.
//!
//! One HTTP POST per call; the response is a `data: <json>` line stream.
//! Rate-limit and overload failures retry with exponential backoff, each
//! attempt racing the shared cancel token. A spending-limit failure is
//! terminal immediately.

use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use studyforge_core::CancelToken;

use crate::config::LlmConfig;
use crate::types::{GenerationRequest, StreamOutcome};

pub const MAX_RETRIES: usize = 3;
pub const BASE_DELAY_MS: u64 = 2000;

/// Transport error taxonomy from status code and message phrasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Vendor spending/usage limit. Terminal, never retried.
    SpendingLimit,
    /// HTTP 429 or rate-limit phrasing. Retryable.
    RateLimit,
    /// HTTP 529 or overload phrasing. Retryable.
    Overloaded,
    /// Everything else. Terminal.
    Other,
}

pub fn classify_error(status: u16, message: &str) -> ErrorClass {
    let msg = message.to_lowercase();
    if msg.contains("usage limit")
        || msg.contains("spending limit")
        || msg.contains("will regain access")
    {
        return ErrorClass::SpendingLimit;
    }
    if status == 429 || msg.contains("rate limit") || msg.contains("too many request") {
        return ErrorClass::RateLimit;
    }
    if status == 529 || msg.contains("overloaded") {
        return ErrorClass::Overloaded;
    }
    ErrorClass::Other
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(
        "Monthly spending limit reached on {provider}. Check your plan in the \
         provider console or switch to another provider."
    )]
    SpendingLimit { provider: &'static str },

    #[error(
        "{provider} rate limit exceeded after {retries} retries. Wait a few \
         minutes and try again."
    )]
    RateLimitExceeded { provider: &'static str, retries: usize },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Network(String),

    #[error("The model generated no content. Try another model or a shorter document.")]
    NoContent,
}

/// Delay before retry `attempt` (0-based): 2s, 4s, 8s.
pub fn backoff_delay(attempt: usize) -> std::time::Duration {
    std::time::Duration::from_millis(BASE_DELAY_MS * (1 << attempt))
}

/// One decoded stream event. Lines without the event marker and malformed
/// payloads decode to `None` and are skipped.
#[derive(Debug, PartialEq, Eq)]
enum LineEvent {
    Token(String),
    Done,
}

fn parse_event_line(line: &str) -> Option<LineEvent> {
    let data = line.trim().strip_prefix("data: ")?;
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    if let Some(token) = value.get("token").and_then(|t| t.as_str()) {
        return Some(LineEvent::Token(token.to_string()));
    }
    if value.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
        return Some(LineEvent::Done);
    }
    None
}

/// Best message for a non-2xx body: the proxy's `{"error": "..."}` when
/// parseable, the raw body otherwise, a plain status line when empty.
fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = value.get("error").and_then(|e| e.as_str()) {
            return msg.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}

/// Drive one streaming generation request, retrying retryable failures.
///
/// `on_token` receives the running accumulated text after each token.
/// Cancellation at any point aborts the attempt and returns
/// `Ok(StreamOutcome::Cancelled)` without surfacing an error.
pub async fn stream_generate(
    client: &reqwest::Client,
    config: &LlmConfig,
    request: &GenerationRequest,
    cancel: &CancelToken,
    mut on_token: impl FnMut(&str),
) -> Result<StreamOutcome, StreamError> {
    let provider = config.provider.display_name();
    let model = request.model.as_deref().unwrap_or(&config.model);
    let body = json!({
        "prompt": request.prompt,
        "model": model,
        "promptVersion": request.prompt_version,
        "maxTokens": request.max_tokens,
    });

    for attempt in 0..=MAX_RETRIES {
        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }

        debug!(
            "streaming from {} (model {}, attempt {}/{})",
            config.endpoint(),
            model,
            attempt + 1,
            MAX_RETRIES + 1
        );

        let send = client.post(config.endpoint()).json(&body).send();
        let response = tokio::select! {
            res = send => res.map_err(|e| StreamError::Network(e.to_string()))?,
            _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let raw_body = response.text().await.unwrap_or_default();
            let message = extract_error_message(status, &raw_body);

            match classify_error(status, &message) {
                ErrorClass::SpendingLimit => {
                    return Err(StreamError::SpendingLimit { provider });
                }
                ErrorClass::RateLimit | ErrorClass::Overloaded if attempt < MAX_RETRIES => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "{}: {} (attempt {}/{}), retrying in {}ms",
                        provider,
                        message,
                        attempt + 1,
                        MAX_RETRIES,
                        delay.as_millis()
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
                    }
                }
                ErrorClass::RateLimit => {
                    return Err(StreamError::RateLimitExceeded {
                        provider,
                        retries: MAX_RETRIES,
                    });
                }
                ErrorClass::Overloaded | ErrorClass::Other => {
                    return Err(StreamError::Api { status, message });
                }
            }
        }

        return consume_stream(response, cancel, &mut on_token).await;
    }

    Err(StreamError::RateLimitExceeded {
        provider,
        retries: MAX_RETRIES,
    })
}

async fn consume_stream(
    response: reqwest::Response,
    cancel: &CancelToken,
    on_token: &mut impl FnMut(&str),
) -> Result<StreamOutcome, StreamError> {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();
    let mut accumulated = String::new();
    let mut done = false;

    loop {
        let chunk = tokio::select! {
            c = stream.next() => c,
            _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
        };
        let Some(chunk) = chunk else { break };
        let bytes = chunk.map_err(|e| StreamError::Network(format!("Stream read error: {e}")))?;
        buffer.push_str(&String::from_utf8_lossy(&bytes));

        while let Some(line_end) = buffer.find('\n') {
            let line: String = buffer.drain(..=line_end).collect();
            match parse_event_line(&line) {
                Some(LineEvent::Token(token)) => {
                    accumulated.push_str(&token);
                    on_token(&accumulated);
                }
                Some(LineEvent::Done) => {
                    done = true;
                }
                None => {}
            }
        }
    }

    // Stream ended without an explicit done signal: accumulated text still
    // counts; an empty stream does not.
    if !done && accumulated.is_empty() {
        return Err(StreamError::NoContent);
    }
    Ok(StreamOutcome::Completed(accumulated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::types::{GenerationRequest, PromptVersion, Provider};

    fn http_response(status_line: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body_len = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }

    /// Serve the scripted responses on a local port, one connection each.
    async fn stub_proxy(responses: Vec<String>) -> (std::net::SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            for response in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut stream).await;
                stream.write_all(response.as_bytes()).await.unwrap();
                let _ = stream.shutdown().await;
            }
        });
        (addr, hits)
    }

    #[tokio::test]
    async fn test_retry_429_twice_then_succeeds() {
        let rate_limited = http_response(
            "429 Too Many Requests",
            "application/json",
            r#"{"error": "Rate limit reached", "status": 429}"#,
        );
        let stream_body = "data: {\"token\": \"hola\"}\n\n\
                           data: {\"token\": \" mundo\"}\n\n\
                           data: {\"done\": true}\n\n";
        let ok = http_response("200 OK", "text/event-stream", stream_body);
        let (addr, hits) = stub_proxy(vec![rate_limited.clone(), rate_limited, ok]).await;

        let mut config = LlmConfig::for_provider(Provider::Anthropic);
        config.base_url = format!("http://{addr}");
        let request = GenerationRequest {
            prompt: "p".into(),
            prompt_version: PromptVersion::StudyGuide,
            max_tokens: 64,
            model: None,
        };
        let cancel = CancelToken::new();
        let client = reqwest::Client::new();

        let mut running = String::new();
        let started = std::time::Instant::now();
        let outcome = stream_generate(&client, &config, &request, &cancel, |text| {
            running = text.to_string();
        })
        .await
        .unwrap();

        // Two backoff delays (2s, 4s), three requests, no error surfaced.
        assert_eq!(outcome, StreamOutcome::Completed("hola mundo".into()));
        assert_eq!(running, "hola mundo");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_spending_limit_is_terminal_without_retry() {
        let limited = http_response(
            "400 Bad Request",
            "application/json",
            r#"{"error": "You have reached your monthly usage limit"}"#,
        );
        let (addr, hits) = stub_proxy(vec![limited]).await;

        let mut config = LlmConfig::for_provider(Provider::Groq);
        config.base_url = format!("http://{addr}");
        let request = GenerationRequest {
            prompt: "p".into(),
            prompt_version: PromptVersion::Structure,
            max_tokens: 64,
            model: None,
        };

        let err = stream_generate(
            &reqwest::Client::new(),
            &config,
            &request,
            &CancelToken::new(),
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, StreamError::SpendingLimit { provider: "Groq" }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_classify_spending_limit() {
        assert_eq!(
            classify_error(400, "You have reached your monthly usage limit"),
            ErrorClass::SpendingLimit
        );
        assert_eq!(
            classify_error(429, "spending limit hit, you will regain access on the 1st"),
            ErrorClass::SpendingLimit
        );
    }

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(classify_error(429, "whatever"), ErrorClass::RateLimit);
        assert_eq!(classify_error(500, "Rate limit reached"), ErrorClass::RateLimit);
        assert_eq!(
            classify_error(503, "Too many requests"),
            ErrorClass::RateLimit
        );
    }

    #[test]
    fn test_classify_overloaded() {
        assert_eq!(classify_error(529, "anything"), ErrorClass::Overloaded);
        assert_eq!(
            classify_error(500, "Server overloaded"),
            ErrorClass::Overloaded
        );
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(classify_error(500, "internal error"), ErrorClass::Other);
        assert_eq!(classify_error(401, "bad key"), ErrorClass::Other);
    }

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_delay(0).as_millis(), 2000);
        assert_eq!(backoff_delay(1).as_millis(), 4000);
        assert_eq!(backoff_delay(2).as_millis(), 8000);
    }

    #[test]
    fn test_parse_token_line() {
        assert_eq!(
            parse_event_line(r#"data: {"token": "hola"}"#),
            Some(LineEvent::Token("hola".into()))
        );
    }

    #[test]
    fn test_parse_done_line() {
        assert_eq!(parse_event_line(r#"data: {"done": true}"#), Some(LineEvent::Done));
        assert_eq!(parse_event_line(r#"data: {"done": false}"#), None);
    }

    #[test]
    fn test_parse_skips_noise() {
        assert_eq!(parse_event_line(""), None);
        assert_eq!(parse_event_line(": keepalive"), None);
        assert_eq!(parse_event_line("event: message"), None);
        assert_eq!(parse_event_line("data: not-json"), None);
        assert_eq!(parse_event_line(r#"data: {"other": 1}"#), None);
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(429, r#"{"error": "Rate limit reached", "status": 429}"#),
            "Rate limit reached"
        );
        assert_eq!(extract_error_message(502, "bad gateway"), "bad gateway");
        assert_eq!(extract_error_message(500, "  "), "HTTP 500");
    }
}
