use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use styleai_contracts::AttributeKind;

use crate::config::non_empty_env;
use crate::error::{Result, StyleError};

pub const CHAT_API_KEY_ENV: &str = "LOVABLE_API_KEY";
pub(crate) const GATEWAY_SERVICE: &str = "AI gateway";

/// Where a service looks up its credential, evaluated on every call.
pub type KeyLookup = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Raw reply from a chat-completion call. Status interpretation and retry
/// policy belong to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub status: u16,
    pub body: String,
}

impl GatewayReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// A hosted chat-completion endpoint.
pub trait ChatGateway: Send + Sync {
    fn name(&self) -> &str;
    fn send(&self, kind: AttributeKind, payload: &Value) -> Result<GatewayReply>;
}

pub struct HttpChatGateway {
    api_base: String,
    timeout: Duration,
    api_key: KeyLookup,
    http: HttpClient,
}

impl HttpChatGateway {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into(),
            timeout,
            api_key: Arc::new(|| non_empty_env(CHAT_API_KEY_ENV)),
            http: HttpClient::new(),
        }
    }

    pub fn with_key_lookup(mut self, api_key: KeyLookup) -> Self {
        self.api_key = api_key;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

impl ChatGateway for HttpChatGateway {
    fn name(&self) -> &str {
        "gateway"
    }

    fn send(&self, _kind: AttributeKind, payload: &Value) -> Result<GatewayReply> {
        let Some(api_key) = (self.api_key)() else {
            return Err(StyleError::Config(format!("{CHAT_API_KEY_ENV} not configured")));
        };
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .json(payload)
            .send()
            .map_err(|err| StyleError::transport(GATEWAY_SERVICE, err))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| StyleError::transport(GATEWAY_SERVICE, err))?;
        Ok(GatewayReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use styleai_contracts::PersonHints;

    use super::*;
    use crate::config::{EngineConfig, RetryPolicy};
    use crate::extractor::AttributeExtractor;

    #[test]
    fn endpoint_joins_base_without_double_slash() {
        let gateway = HttpChatGateway::new("https://gateway.example/v1/", Duration::from_secs(5));
        assert_eq!(gateway.endpoint(), "https://gateway.example/v1/chat/completions");
        assert_eq!(gateway.name(), "gateway");
    }

    #[test]
    fn missing_chat_key_is_a_config_error_and_never_retried() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let counter = lookups.clone();
        let gateway = HttpChatGateway::new("http://127.0.0.1:9", Duration::from_secs(5))
            .with_key_lookup(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                None
            }));

        let err = gateway
            .send(AttributeKind::Person, &json!({ "model": "m" }))
            .unwrap_err();
        assert!(matches!(err, StyleError::Config(_)));
        assert_eq!(err.to_string(), "LOVABLE_API_KEY not configured");
        assert!(!err.is_retryable());

        let config = EngineConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                backoff: Duration::ZERO,
            },
            ..EngineConfig::default()
        };
        lookups.store(0, Ordering::SeqCst);
        let extractor = AttributeExtractor::new(Arc::new(gateway), &config);
        let err = extractor
            .extract_person(None, Some("tall"), &PersonHints::default())
            .unwrap_err();
        assert!(matches!(err, StyleError::Config(_)));
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }
}
