use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::gate::Gate;
use crate::lights::{blink_loop, LightPhase, TrafficLight};
use crate::uplink::Reporter;

use super::loop_worker::station_loop;
use super::state::StationStats;
use super::Station;

/// Owns the long-running tasks and the token that stops them.
pub struct StationController {
    cancel_token: CancellationToken,
    station: Option<JoinHandle<StationStats>>,
    blinker: Option<JoinHandle<Result<()>>>,
}

impl StationController {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            station: None,
            blinker: None,
        }
    }

    /// Starts alternating the LEDs; the returned receiver tracks the phase.
    pub fn start_lights(
        &mut self,
        light: TrafficLight,
        phase_len: Duration,
    ) -> Result<watch::Receiver<LightPhase>> {
        if self.blinker.is_some() {
            bail!("lights already running");
        }

        let (phase_tx, phase_rx) = watch::channel(LightPhase::Off);
        let handle = tokio::spawn(blink_loop(
            light,
            phase_len,
            phase_tx,
            self.cancel_token.clone(),
        ));
        self.blinker = Some(handle);
        Ok(phase_rx)
    }

    pub fn start_station<G, R>(&mut self, station: Station<G, R>) -> Result<()>
    where
        G: Gate + 'static,
        R: Reporter + 'static,
    {
        if self.station.is_some() {
            bail!("station already running");
        }

        let handle = tokio::spawn(station_loop(station, self.cancel_token.clone()));
        self.station = Some(handle);
        Ok(())
    }

    /// Cancels every task and waits for them. LEDs are off once this returns,
    /// whether the blinker exited cleanly, failed, or panicked.
    pub async fn shutdown(&mut self) -> Result<Option<StationStats>> {
        self.cancel_token.cancel();

        let stats = match self.station.take() {
            Some(handle) => Some(handle.await.context("station loop task failed to join")?),
            None => None,
        };

        if let Some(handle) = self.blinker.take() {
            handle
                .await
                .context("blinker task failed to join")?
                .context("blinker stopped with an error")?;
        }

        info!("station shut down");
        Ok(stats)
    }
}

impl Default for StationController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StationController {
    fn drop(&mut self) {
        // Aborting drops the blinker's TrafficLight, which switches the LEDs off.
        self.cancel_token.cancel();
        if let Some(handle) = self.blinker.take() {
            handle.abort();
        }
        if let Some(handle) = self.station.take() {
            handle.abort();
        }
    }
}
