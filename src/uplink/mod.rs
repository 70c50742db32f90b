pub mod geolocation;
pub mod reporting;

use anyhow::Result;
use std::future::Future;

use crate::models::SessionSummary;
use crate::settings::UplinkSettings;

pub use geolocation::GeolocationClient;
pub use reporting::{CarData, ReportingClient};

/// What runs after a cycle captured at least one frame.
pub trait Reporter: Send + Sync {
    fn after_capture(
        &self,
        session: &SessionSummary,
    ) -> impl Future<Output = Option<CarData>> + Send;
}

/// Geolocate, then post the fix (or its absence) to the local API.
#[derive(Clone)]
pub struct LocationReporter {
    geolocation: GeolocationClient,
    reporting: ReportingClient,
}

impl LocationReporter {
    pub fn new(geolocation: GeolocationClient, reporting: ReportingClient) -> Self {
        Self {
            geolocation,
            reporting,
        }
    }

    pub fn from_settings(settings: &UplinkSettings) -> Result<Self> {
        Ok(Self::new(
            GeolocationClient::new(
                settings.geolocation_url.clone(),
                settings.geolocation_timeout(),
            )?,
            ReportingClient::new(settings.api_base_url.clone())?,
        ))
    }
}

impl Reporter for LocationReporter {
    async fn after_capture(&self, session: &SessionSummary) -> Option<CarData> {
        log::info!(
            "Reporting session {} ({} frames)",
            session.directory.display(),
            session.frame_count()
        );
        let location = self.geolocation.locate().await;
        self.reporting.report(&location).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    };

    /// Serves `app` on an ephemeral localhost port and returns its base URL.
    pub async fn serve(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Records the sessions it was asked to report.
    #[derive(Clone, Default)]
    pub struct CountingReporter {
        calls: Arc<AtomicU32>,
        pub sessions: Arc<Mutex<Vec<SessionSummary>>>,
    }

    impl CountingReporter {
        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Reporter for CountingReporter {
        async fn after_capture(&self, session: &SessionSummary) -> Option<CarData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sessions.lock().unwrap().push(session.clone());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::serve;
    use super::*;
    use axum::{
        routing::{get, post},
        Json, Router,
    };
    use chrono::Local;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn posts_null_when_geolocation_fails() {
        let geo = Router::new().route(
            "/",
            get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "down") }),
        );
        let posted: Arc<Mutex<Vec<Value>>> = Arc::default();
        let sink = posted.clone();
        let api = Router::new()
            .route(
                "/api/location",
                post(move |Json(body): Json<Value>| {
                    let sink = sink.clone();
                    async move {
                        sink.lock().unwrap().push(body);
                        axum::http::StatusCode::OK
                    }
                }),
            )
            .route("/api/carData", get(|| async { Json(json!({ "plate": "ALE121" })) }));

        let settings = UplinkSettings {
            geolocation_url: serve(geo).await,
            geolocation_timeout_ms: 1_000,
            api_base_url: serve(api).await,
        };
        let reporter = LocationReporter::from_settings(&settings).unwrap();
        let summary = SessionSummary {
            directory: "/tmp/session_x".into(),
            started_at: Local::now(),
            frames: vec!["/tmp/session_x/image_1.png".into()],
        };

        let car_data = reporter.after_capture(&summary).await;

        assert_eq!(car_data, Some(json!({ "plate": "ALE121" })));
        assert_eq!(posted.lock().unwrap().as_slice(), &[Value::Null]);
    }
}
