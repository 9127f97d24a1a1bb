use thiserror::Error;

pub type Result<T> = std::result::Result<T, StyleError>;

#[derive(Debug, Error)]
pub enum StyleError {
    /// Missing credential or unusable configuration. Never retried.
    #[error("{0}")]
    Config(String),

    /// HTTP 429 from a hosted service. Never retried.
    #[error("Rate limit exceeded, please try again in a moment.")]
    RateLimited,

    /// HTTP 402 from a hosted service. Never retried.
    #[error("AI credits exhausted, please add funds to continue.")]
    PaymentRequired,

    /// Non-2xx reply; status and body are kept verbatim.
    #[error("{service} request failed ({status}): {body}")]
    Provider {
        service: String,
        status: u16,
        body: String,
    },

    /// The request never produced an HTTP reply.
    #[error("{service} request failed: {message}")]
    Transport {
        service: String,
        message: String,
        retryable: bool,
    },

    /// A reply arrived but did not have the expected shape.
    #[error("{0}")]
    MalformedResponse(String),

    /// Inputs rejected before any network call.
    #[error("{0}")]
    NotReady(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StyleError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { status, .. } => *status >= 500,
            Self::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited => Some(429),
            Self::PaymentRequired => Some(402),
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { service, .. } => {
                format!("{service} is unreachable right now, please try again.")
            }
            Self::Internal(_) => "Something went wrong, please try again.".to_string(),
            other => other.to_string(),
        }
    }

    /// Short machine-readable tag, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::RateLimited => "rate_limited",
            Self::PaymentRequired => "payment_required",
            Self::Provider { .. } => "provider",
            Self::Transport { .. } => "transport",
            Self::MalformedResponse(_) => "malformed_response",
            Self::NotReady(_) => "not_ready",
            Self::Internal(_) => "internal",
        }
    }

    pub(crate) fn transport(service: &str, err: reqwest::Error) -> Self {
        let retryable = err.is_timeout() || err.is_connect() || err.is_request();
        Self::Transport {
            service: service.to_string(),
            message: err.to_string(),
            retryable,
        }
    }
}
