//! # Batch Uploader
//!
//! One delivery attempt of a signed batch. The engine owns retries; an
//! uploader only reports what happened.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use crate::config::{RetryPolicy, SyncSettings};
use crate::error::{SyncError, SyncResult};
use crate::payload::SignedBatch;

/// Statuses the central server uses to acknowledge a batch.
pub const ACCEPTED_STATUSES: [u16; 3] = [200, 201, 202];

/// Response bodies are cut to this many characters in errors.
const MAX_ERROR_BODY: usize = 200;

/// Result of a single delivery attempt.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The server acknowledged the batch.
    Accepted { status: u16 },
    /// Anything else: rejection, transport error, timeout.
    Failed(SyncError),
}

impl DeliveryOutcome {
    /// Classifies an HTTP status code.
    pub fn from_status(status: u16, body: &str) -> Self {
        if ACCEPTED_STATUSES.contains(&status) {
            DeliveryOutcome::Accepted { status }
        } else {
            DeliveryOutcome::Failed(SyncError::Rejected {
                status,
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            })
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Accepted { .. })
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Accepted { status } => write!(f, "accepted (HTTP {status})"),
            DeliveryOutcome::Failed(err) => write!(f, "{err}"),
        }
    }
}

/// Sends a signed batch to the central server.
#[async_trait]
pub trait BatchUploader: Send + Sync {
    async fn upload(&self, batch: &SignedBatch) -> DeliveryOutcome;
}

// =============================================================================
// HTTP Uploader
// =============================================================================

/// Production uploader: HTTPS POST via reqwest.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    url: String,
    device_id: String,
    api_key: String,
}

impl HttpUploader {
    /// Builds the client with the policy's request timeout.
    pub fn new(device_id: &str, settings: &SyncSettings, policy: &RetryPolicy) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(policy.request_timeout)
            .build()
            .map_err(|e| SyncError::ClientSetup(e.to_string()))?;

        Ok(HttpUploader {
            client,
            url: settings.upload_url(),
            device_id: device_id.to_string(),
            api_key: settings.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl BatchUploader for HttpUploader {
    async fn upload(&self, batch: &SignedBatch) -> DeliveryOutcome {
        debug!(url = %self.url, records = batch.record_count, "Posting batch");

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Device-ID", &self.device_id)
            .header("X-Signature", &batch.signature)
            .bearer_auth(&self.api_key)
            .body(batch.body.clone())
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                if ACCEPTED_STATUSES.contains(&status) {
                    return DeliveryOutcome::Accepted { status };
                }
                let body = response.text().await.unwrap_or_default();
                DeliveryOutcome::from_status(status, &body)
            }
            Err(e) => DeliveryOutcome::Failed(SyncError::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;

    use super::*;
    use crate::payload::{verify, SyncPayload};

    #[derive(Default)]
    struct Central {
        status: AtomicU16,
        received: Mutex<Vec<(HeaderMap, Bytes)>>,
    }

    async fn receive(
        State(central): State<Arc<Central>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> (StatusCode, &'static str) {
        central.received.lock().unwrap().push((headers, body));
        let status = StatusCode::from_u16(central.status.load(Ordering::SeqCst)).unwrap();
        (status, "central says no")
    }

    /// Serves `/api/sync/upload` on an ephemeral port.
    async fn central_server(status: u16) -> (Arc<Central>, SyncSettings) {
        let central = Arc::new(Central::default());
        central.status.store(status, Ordering::SeqCst);

        let app = Router::new()
            .route("/api/sync/upload", post(receive))
            .with_state(central.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let settings = SyncSettings {
            central_server_url: format!("http://{addr}/api"),
            api_key: "test-key".into(),
            ..SyncSettings::default()
        };
        (central, settings)
    }

    fn batch() -> SignedBatch {
        SyncPayload {
            device_id: "edge-test".into(),
            batch_timestamp: chrono::Utc::now(),
            readings: Vec::new(),
        }
        .sign(b"test-key")
        .unwrap()
    }

    #[tokio::test]
    async fn test_accepted_with_headers_and_signature() {
        let (central, settings) = central_server(202).await;
        let uploader = HttpUploader::new("edge-test", &settings, &RetryPolicy::default()).unwrap();
        let batch = batch();

        let outcome = uploader.upload(&batch).await;
        assert!(matches!(outcome, DeliveryOutcome::Accepted { status: 202 }));

        let received = central.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let (headers, body) = &received[0];
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["x-device-id"], "edge-test");
        assert_eq!(headers["authorization"], "Bearer test-key");
        let signature = headers["x-signature"].to_str().unwrap();
        assert!(verify(b"test-key", body, signature));
        assert_eq!(body.as_ref(), batch.body.as_slice());
    }

    #[tokio::test]
    async fn test_server_error_is_rejected() {
        let (_central, settings) = central_server(500).await;
        let uploader = HttpUploader::new("edge-test", &settings, &RetryPolicy::default()).unwrap();

        match uploader.upload(&batch()).await {
            DeliveryOutcome::Failed(SyncError::Rejected { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "central says no");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let settings = SyncSettings {
            central_server_url: format!("http://{addr}"),
            ..SyncSettings::default()
        };
        let uploader = HttpUploader::new("edge-test", &settings, &RetryPolicy::default()).unwrap();
        assert_eq!(uploader.url(), format!("http://{addr}/sync/upload"));

        match uploader.upload(&batch()).await {
            DeliveryOutcome::Failed(err) => assert!(err.is_retryable()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_status_classification() {
        for status in ACCEPTED_STATUSES {
            assert!(DeliveryOutcome::from_status(status, "").is_delivered());
        }
        assert!(!DeliveryOutcome::from_status(204, "").is_delivered());
        assert!(!DeliveryOutcome::from_status(401, "").is_delivered());

        let long = "x".repeat(500);
        match DeliveryOutcome::from_status(503, &long) {
            DeliveryOutcome::Failed(SyncError::Rejected { body, .. }) => assert_eq!(body.len(), 200),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
