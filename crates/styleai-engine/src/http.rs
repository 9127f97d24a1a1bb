use std::thread;

use reqwest::blocking::Response as HttpResponse;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::{Result, StyleError};

pub(crate) const ERROR_BODY_MAX_CHARS: usize = 512;

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt ceiling is reached. Attempts are sequential; the wait after the
/// n-th failure is `backoff * n`.
pub fn with_retries<T>(
    service: &str,
    policy: &RetryPolicy,
    mut op: impl FnMut(usize) -> Result<T>,
) -> Result<T> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt >= max_attempts {
                    if attempt > 1 {
                        warn!(service, attempt, error = %err, "giving up after retries");
                    }
                    return Err(err);
                }
                let delay = policy.delay_after(attempt);
                warn!(
                    service,
                    attempt,
                    max_attempts,
                    status = err.status(),
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying"
                );
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                attempt += 1;
            }
        }
    }
}

/// Maps a reply status onto the error taxonomy. 2xx passes through.
pub fn check_status(service: &str, status: u16, body: &str) -> Result<()> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    Err(status_error(service, status, body))
}

pub fn status_error(service: &str, status: u16, body: &str) -> StyleError {
    match status {
        429 => StyleError::RateLimited,
        402 => StyleError::PaymentRequired,
        _ => StyleError::Provider {
            service: service.to_string(),
            status,
            body: truncate_text(body.trim(), ERROR_BODY_MAX_CHARS),
        },
    }
}

pub fn response_json_or_error(service: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .map_err(|err| StyleError::transport(service, err))?;
    check_status(service, status, &body)?;
    parse_json_body(service, &body)
}

pub fn parse_json_body(service: &str, body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|err| {
        debug!(service, error = %err, "reply body is not JSON");
        StyleError::MalformedResponse(format!("{service} returned invalid JSON payload"))
    })
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
