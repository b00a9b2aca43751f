//! Itinerary Errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ItineraryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItineraryError {
    #[error("Invalid item type '{0}': expected flight, hotel or attraction")]
    InvalidItemType(String),

    #[error("Item {id} is already in the itinerary")]
    DuplicateItem { id: String },

    #[error("Itinerary item {id} not found")]
    NotFound { id: String },

    #[error("Itinerary service unavailable ({}): {message}", status_label(.status))]
    RemoteUnavailable { status: Option<u16>, message: String },

    #[error("{provider} search failed ({}): {message}", status_label(.status))]
    UpstreamProviderError {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ItineraryError {
    /// Transport and provider failures may succeed on a later attempt.
    /// A request the other side rejected as a client error will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ItineraryError::RemoteUnavailable { status, .. }
            | ItineraryError::UpstreamProviderError { status, .. } => !status.is_some_and(is_rejection),
            _ => false,
        }
    }

    pub(crate) fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        ItineraryError::RemoteUnavailable {
            status,
            message: message.into(),
        }
    }
}

/// 4xx other than timeout and rate limiting
fn is_rejection(status: u16) -> bool {
    (400..500).contains(&status) && status != 408 && status != 429
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "no response".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ItineraryError::remote(Some(502), "bad gateway").is_retryable());
        assert!(!ItineraryError::NotFound { id: "hotel-1".into() }.is_retryable());
        assert!(!ItineraryError::DuplicateItem { id: "hotel-1".into() }.is_retryable());
        assert!(ItineraryError::remote(None, "connection refused").is_retryable());
        assert!(ItineraryError::remote(Some(429), "slow down").is_retryable());
    }

    #[test]
    fn test_rejected_request_is_not_retryable() {
        assert!(!ItineraryError::remote(Some(400), "Invalid date").is_retryable());
        assert!(!ItineraryError::remote(Some(403), "Invalid token").is_retryable());
        let provider = ItineraryError::UpstreamProviderError {
            provider: "flights".into(),
            status: Some(400),
            message: "origin is required".into(),
        };
        assert!(!provider.is_retryable());
    }

    #[test]
    fn test_messages_carry_status() {
        let err = ItineraryError::UpstreamProviderError {
            provider: "flights".into(),
            status: Some(500),
            message: "Amadeus search failed".into(),
        };
        assert_eq!(err.to_string(), "flights search failed (HTTP 500): Amadeus search failed");
        assert_eq!(
            ItineraryError::remote(None, "connection refused").to_string(),
            "Itinerary service unavailable (no response): connection refused"
        );
    }
}
