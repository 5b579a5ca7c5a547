//! `/api/vitals`: readings for the dashboard.
//!
//! The listing and latest reading never carry the PPG waveform; neither
//! does the live stream.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use healthguard_core::validation::{validate_page, validate_stats_hours};
use healthguard_core::{Page, TimeRange, VitalRecord, VitalStats};

use super::AppState;
use crate::error::{ApiError, ApiResult};

/// Default statistics window.
const DEFAULT_STATS_HOURS: u32 = 24;

pub fn vitals_routes() -> Router<AppState> {
    Router::new()
        .route("/api/vitals", get(list_vitals))
        .route("/api/vitals/latest", get(latest_vital))
        .route("/api/vitals/stats", get(vital_stats))
        .route("/api/vitals/stream", get(stream_vitals))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    pub hours: Option<u32>,
}

async fn list_vitals(
    State(node): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<VitalRecord>>> {
    let (page, page_size) = validate_page(params.page, params.page_size)?;

    if let (Some(start), Some(end)) = (params.start, params.end) {
        if start > end {
            return Err(ApiError::BadRequest("start must not be after end".to_string()));
        }
    }
    let range = TimeRange {
        start: params.start,
        end: params.end,
    };

    let listing = node.db().vitals().list(&range, page, page_size).await?;
    Ok(Json(listing))
}

async fn latest_vital(State(node): State<AppState>) -> ApiResult<Json<Option<VitalRecord>>> {
    let latest = node.db().vitals().latest().await?;
    Ok(Json(latest.map(VitalRecord::without_waveform)))
}

async fn vital_stats(
    State(node): State<AppState>,
    Query(params): Query<StatsParams>,
) -> ApiResult<Json<VitalStats>> {
    let hours = validate_stats_hours(params.hours.unwrap_or(DEFAULT_STATS_HOURS))?;

    let end = Utc::now();
    let start = end - Duration::hours(i64::from(hours));
    let stats = node.db().vitals().stats(start, end).await?;
    Ok(Json(stats))
}

/// Live records until the client leaves or the node starts shutting down.
async fn stream_vitals(
    State(node): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Vitals stream client connected");
    let records = BroadcastStream::new(node.collector().subscribe()).filter_map(to_event);
    let closing = node.closing().clone().cancelled_owned();
    let stream = futures_util::StreamExt::take_until(records, closing);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// One `data:` event per record. Lagged clients skip what they missed.
fn to_event(
    item: Result<VitalRecord, BroadcastStreamRecvError>,
) -> Option<Result<Event, Infallible>> {
    match item {
        Ok(record) => Event::default()
            .json_data(record.without_waveform())
            .map_err(|e| warn!(error = %e, "Failed to encode stream event"))
            .ok()
            .map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "Vitals stream client lagged");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use chrono::TimeZone;
    use healthguard_core::VitalSample;
    use tower::ServiceExt;

    use super::*;
    use crate::node::testing::test_node;
    use crate::routes::router;
    use crate::routes::test_util::send;

    fn sample(ts: DateTime<Utc>, heart_rate: f64) -> VitalSample {
        VitalSample {
            heart_rate: Some(heart_rate),
            spo2: Some(97.0),
            ppg_raw: Some(vec![0.5; 50]),
            ..VitalSample::empty(ts)
        }
    }

    #[tokio::test]
    async fn test_listing_paginates_newest_first() {
        let node = test_node().await;
        let patient_id = node.collector().patient_id();

        let base = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        for i in 0..5 {
            node.db()
                .vitals()
                .insert(patient_id, &sample(base + Duration::minutes(i), 60.0 + i as f64))
                .await
                .unwrap();
        }

        let app = router(node.clone());
        let (status, body) = send(
            &app,
            Method::GET,
            "/api/vitals?page=1&page_size=2&start=2024-03-01T00:00:00Z&end=2024-03-02T00:00:00Z",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 5);
        assert_eq!(body["pages"], 3);
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["heart_rate"], 64.0);
        assert!(items[0].get("ppg_raw").is_none());

        let (_, body) = send(&app, Method::GET, "/api/vitals", None, None).await;
        assert!(body["total"].as_i64().unwrap() >= 5);
        assert_eq!(body["page"], 1);
        assert_eq!(body["page_size"], 50);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_listing_rejects_bad_paging() {
        let node = test_node().await;
        let app = router(node.clone());

        let (status, _) = send(&app, Method::GET, "/api/vitals?page_size=501", None, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, Method::GET, "/api/vitals?page=0", None, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/vitals?start=2024-03-02T00:00:00Z&end=2024-03-01T00:00:00Z",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_latest_and_stats() {
        let node = test_node().await;
        let patient_id = node.collector().patient_id();
        let now = Utc::now();
        node.db()
            .vitals()
            .insert(patient_id, &sample(now + Duration::seconds(5), 80.0))
            .await
            .unwrap();

        let app = router(node.clone());
        let (status, body) = send(&app, Method::GET, "/api/vitals/latest", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["heart_rate"], 80.0);
        assert!(body.get("ppg_raw").is_none());

        let (status, body) = send(&app, Method::GET, "/api/vitals/stats?hours=1", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["total_readings"].as_i64().unwrap() >= 0);

        let (status, _) = send(&app, Method::GET, "/api/vitals/stats?hours=721", None, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_stream_is_event_stream() {
        let node = test_node().await;
        let app = router(node.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/vitals/stream")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_stream_ends_when_node_closes() {
        let node = test_node().await;
        let app = router(node.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/vitals/stream")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        node.begin_shutdown();
        let body = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            axum::body::to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("stream should end once the node closes");
        assert!(body.is_ok());

        node.shutdown().await;
    }

    #[test]
    fn test_event_skips_lagged() {
        assert!(to_event(Err(BroadcastStreamRecvError::Lagged(3))).is_none());
    }
}
