use anyhow::{Context, Result};
use log::{error, info, warn};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::models::Location;

const LOCATION_PATH: &str = "/api/location";
const CAR_DATA_PATH: &str = "/api/carData";

/// Whatever the local API knows about the car in view. Opaque to the station.
pub type CarData = Value;

/// Client for the local reporting API. Never fails outward: problems are
/// logged and reported as `None`.
#[derive(Clone)]
pub struct ReportingClient {
    http: Client,
    base_url: String,
}

impl ReportingClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("Failed to build reporting HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn report(&self, location: &Location) -> Option<CarData> {
        match self.try_report(location).await {
            Ok(car_data) => car_data,
            Err(err) => {
                error!("Error sending location to API: {err:#}");
                None
            }
        }
    }

    async fn try_report(&self, location: &Location) -> Result<Option<CarData>> {
        let url = format!("{}{LOCATION_PATH}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&location.coordinates())
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;

        let status = response.status();
        info!("Location sent to API: {location} (status {status})");
        if status != StatusCode::OK {
            warn!("Skipping car data fetch: location endpoint answered {status}");
            return Ok(None);
        }

        let url = format!("{}{CAR_DATA_PATH}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            warn!("No car data: car data endpoint answered {status}");
            return Ok(None);
        }

        let car_data: CarData = response
            .json()
            .await
            .context("car data is not valid JSON")?;

        info!("Car data: {car_data}");
        Ok(Some(car_data))
    }
}
