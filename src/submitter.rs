//! Batch payload assembly and response classification.

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::ad::{AdResponse, RecommendedAd};
use crate::error::Result;
use crate::message::{ChatMessage, SessionInfo};
use crate::transport::{Transport, TransportRequest};

/// Wire shape of one batch submission.
#[derive(Debug, Serialize)]
pub struct BatchRequest<'a> {
    pub request_id: Uuid,
    pub session: &'a SessionInfo,
    pub messages: &'a [ChatMessage],
}

impl<'a> BatchRequest<'a> {
    /// Each request gets a fresh random id for correlation on the server.
    pub fn new(session: &'a SessionInfo, messages: &'a [ChatMessage]) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            session,
            messages,
        }
    }
}

/// Result of a batch the service accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The first ad of the response, now in the ad cache.
    Matched(RecommendedAd),
    /// A well-formed response with no ads. Not a failure.
    NoMatch,
    /// The response did not match the expected shape.
    Malformed(String),
}

impl BatchOutcome {
    /// Whether this outcome counts against the circuit breaker.
    pub fn is_reliability_error(&self) -> bool {
        matches!(self, BatchOutcome::Malformed(_))
    }
}

/// Classify a decoded response body.
pub fn classify_response(body: Value) -> BatchOutcome {
    match AdResponse::parse(body) {
        Ok(response) => match response.ads.into_iter().next() {
            Some(ad) => BatchOutcome::Matched(ad),
            None => BatchOutcome::NoMatch,
        },
        Err(reason) => BatchOutcome::Malformed(reason),
    }
}

/// Sends message snapshots to the matching service.
#[derive(Debug, Clone)]
pub struct BatchSubmitter {
    url: String,
    headers: HeaderMap,
    timeout: Duration,
}

impl BatchSubmitter {
    pub fn new(url: impl Into<String>, headers: HeaderMap, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers,
            timeout,
        }
    }

    pub fn build_request(&self, session: &SessionInfo, messages: &[ChatMessage]) -> Result<TransportRequest> {
        let batch = BatchRequest::new(session, messages);
        let body = serde_json::to_value(&batch)?;
        debug!(request_id = %batch.request_id, "Built batch of {} message(s)", messages.len());
        Ok(TransportRequest {
            url: self.url.clone(),
            body,
            headers: self.headers.clone(),
            timeout: self.timeout,
        })
    }

    /// Submit `messages` and classify the reply. Only transport and encoding
    /// failures are returned as errors; a bad reply is a [`BatchOutcome`].
    pub async fn submit(
        &self,
        transport: &dyn Transport,
        session: &SessionInfo,
        messages: &[ChatMessage],
    ) -> Result<BatchOutcome> {
        let request = self.build_request(session, messages)?;
        let body = transport.post_json(request).await?;
        Ok(classify_response(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::request_headers;
    use serde_json::json;

    fn submitter() -> BatchSubmitter {
        BatchSubmitter::new(
            "http://localhost/match",
            request_headers("key").unwrap(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn payload_carries_session_and_ordered_messages() {
        let session = SessionInfo::new("s-1", "u-1", "web");
        let messages = vec![ChatMessage::user("first"), ChatMessage::assistant("second")];
        let request = submitter().build_request(&session, &messages).unwrap();

        assert_eq!(request.url, "http://localhost/match");
        assert_eq!(request.timeout, Duration::from_secs(5));
        assert_eq!(request.body["session"]["session_id"], "s-1");
        assert_eq!(request.body["messages"][0]["content"], "first");
        assert_eq!(request.body["messages"][1]["role"], "assistant");
        let id = request.body["request_id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn request_ids_are_unique() {
        let session = SessionInfo::default();
        let messages = vec![ChatMessage::user("hi")];
        let a = submitter().build_request(&session, &messages).unwrap();
        let b = submitter().build_request(&session, &messages).unwrap();
        assert_ne!(a.body["request_id"], b.body["request_id"]);
    }

    #[test]
    fn classifies_responses() {
        let matched = classify_response(json!({
            "ads": [
                {"title": "Laptop", "description": "Fast", "placement_template": "p"},
                {"title": "Mouse", "description": "Quiet", "placement_template": "p"}
            ]
        }));
        assert_eq!(matched, BatchOutcome::Matched(RecommendedAd::new("Laptop", "Fast", "p")));

        let empty = classify_response(json!({"ads": []}));
        assert_eq!(empty, BatchOutcome::NoMatch);
        assert!(!empty.is_reliability_error());

        let malformed = classify_response(json!({"ads": "nope"}));
        assert!(malformed.is_reliability_error());
    }
}
