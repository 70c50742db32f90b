use anyhow::{bail, Context, Result};
use log::{info, warn};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::models::{IpInfo, Location};

/// IP-derived geolocation. Every failure mode collapses into
/// `Location::Unavailable`; the cause only reaches the log.
#[derive(Clone)]
pub struct GeolocationClient {
    http: Client,
    endpoint: String,
}

impl GeolocationClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build geolocation HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub async fn locate(&self) -> Location {
        info!("Getting location coordinates...");
        match self.lookup().await.and_then(|info| info.coordinates()) {
            Ok(coords) => {
                info!("Coordinates: {coords}");
                Location::Found(coords)
            }
            Err(err) => {
                warn!("Location unavailable: {err:#}");
                Location::Unavailable
            }
        }
    }

    /// Raw lookup for diagnostics; unlike `locate` this reports why it failed.
    pub async fn lookup(&self) -> Result<IpInfo> {
        let response = self
            .http
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.endpoint))?;

        let status = response.status();
        if status != StatusCode::OK {
            bail!("geolocation service returned status {status}");
        }

        response
            .json::<IpInfo>()
            .await
            .context("geolocation response is not valid JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use crate::uplink::testing::serve;
    use axum::{http::StatusCode as AxumStatus, routing::get, Json, Router};
    use serde_json::json;

    fn client(base: &str, timeout_ms: u64) -> GeolocationClient {
        GeolocationClient::new(format!("{base}/"), Duration::from_millis(timeout_ms)).unwrap()
    }

    #[tokio::test]
    async fn parses_loc_field() {
        let app = Router::new().route(
            "/",
            get(|| async {
                Json(json!({
                    "ip": "203.0.113.7",
                    "city": "Bangkok",
                    "region": "Bangkok",
                    "country": "TH",
                    "loc": "13.7540,100.5014"
                }))
            }),
        );
        let base = serve(app).await;

        let location = client(&base, 5_000).locate().await;
        assert_eq!(
            location,
            Location::Found(Coordinates::new(13.754, 100.5014).unwrap())
        );
    }

    #[tokio::test]
    async fn failures_collapse_to_the_same_absence() {
        let server_error = Router::new().route(
            "/",
            get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let missing_loc = Router::new().route(
            "/",
            get(|| async { Json(json!({ "ip": "203.0.113.7", "city": "Nowhere" })) }),
        );
        let slow = Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({ "loc": "1.0,2.0" }))
            }),
        );

        let on_500 = client(&serve(server_error).await, 5_000).locate().await;
        let on_missing = client(&serve(missing_loc).await, 5_000).locate().await;
        let on_timeout = client(&serve(slow).await, 100).locate().await;

        assert_eq!(on_500, Location::Unavailable);
        assert_eq!(on_missing, Location::Unavailable);
        assert_eq!(on_timeout, Location::Unavailable);
    }

    #[tokio::test]
    async fn refused_connection_is_absence() {
        // Bind then drop to get a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let location = client(&format!("http://{addr}"), 1_000).locate().await;
        assert_eq!(location, Location::Unavailable);
    }

    #[tokio::test]
    async fn lookup_exposes_diagnostic_fields() {
        let app = Router::new().route(
            "/",
            get(|| async { Json(json!({ "ip": "198.51.100.2", "country": "NL" })) }),
        );
        let info = client(&serve(app).await, 5_000).lookup().await.unwrap();
        assert_eq!(info.ip.as_deref(), Some("198.51.100.2"));
        assert_eq!(info.country.as_deref(), Some("NL"));
        assert_eq!(info.loc, None);
    }
}
