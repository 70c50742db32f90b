use anyhow::{bail, Context, Result};
use log::info;
use std::path::Path;
use tokio::time::Instant;

use crate::camera::{self, CaptureSession};
use crate::gate::{LightGate, PinGate, TriggerKind};
use crate::lights::TrafficLight;
use crate::models::SessionSummary;
use crate::settings::Settings;
use crate::station::{CyclePolicy, Station, StationController};
use crate::uplink::{GeolocationClient, LocationReporter, Reporter};

/// Long-running gate-watching mode.
pub async fn run_station(settings: &Settings, trigger: TriggerKind) -> Result<()> {
    let images_dir = settings.images_dir()?;
    let camera = camera::from_settings(&settings.camera);
    let reporter = LocationReporter::from_settings(&settings.uplink)?;
    let policy = CyclePolicy::from_settings(settings);

    let mut controller = StationController::new();
    match trigger {
        TriggerKind::Pin => {
            let gate = PinGate::new(settings.gate.pin)?;
            info!("Watching GPIO {} for the red light", settings.gate.pin);
            controller.start_station(
                Station::new(gate, camera, reporter, images_dir).with_policy(policy),
            )?;
        }
        TriggerKind::Lights => {
            let light = TrafficLight::from_gpio(settings.lights.green_pin, settings.lights.red_pin)?;
            let phase_rx = controller.start_lights(light, settings.lights.phase_len())?;
            info!(
                "Driving LEDs {}/{} and capturing on red",
                settings.lights.green_pin, settings.lights.red_pin
            );
            controller.start_station(
                Station::new(LightGate::new(phase_rx), camera, reporter, images_dir)
                    .with_policy(policy),
            )?;
        }
    }

    wait_for_shutdown_signal().await?;
    info!("Program stopped by user");

    if let Some(stats) = controller.shutdown().await? {
        info!(
            "{} cycles ({} aborted, {} failed), {} frames, {} reports",
            stats.cycles_started,
            stats.cycles_aborted,
            stats.cycles_failed,
            stats.frames_captured,
            stats.reports_sent
        );
    }
    Ok(())
}

/// LED-only mode: alternate red and green until interrupted.
pub async fn blink(settings: &Settings) -> Result<()> {
    let light = TrafficLight::from_gpio(settings.lights.green_pin, settings.lights.red_pin)?;
    let mut controller = StationController::new();
    controller.start_lights(light, settings.lights.phase_len())?;

    wait_for_shutdown_signal().await?;
    info!("Program stopped by user");
    controller.shutdown().await?;
    Ok(())
}

/// One ungated burst, optionally followed by geolocation and reporting.
pub async fn capture_once(settings: &Settings, report: bool) -> Result<()> {
    let images_dir = settings.images_dir()?;
    let mut camera = camera::from_settings(&settings.camera);

    let summary = tokio::select! {
        summary = capture_burst(camera.as_mut(), &images_dir, settings) => summary?,
        signal = wait_for_shutdown_signal() => {
            signal?;
            info!("Capture interrupted");
            return Ok(());
        }
    };
    info!("Camera test complete");

    if report {
        let reporter = LocationReporter::from_settings(&settings.uplink)?;
        reporter.after_capture(&summary).await;
    }
    Ok(())
}

async fn capture_burst(
    camera: &mut dyn camera::Camera,
    images_dir: &Path,
    settings: &Settings,
) -> Result<SessionSummary> {
    let frame_count = settings.capture.frame_count;
    let mut session = CaptureSession::open(camera, images_dir).await?;
    session.warm_up(settings.camera.warm_up()).await;

    for index in 0..frame_count {
        let next_frame_at = Instant::now() + settings.capture.frame_interval();
        session.capture_frame().await?;
        if index + 1 < frame_count {
            tokio::time::sleep_until(next_frame_at).await;
        }
    }
    session.close()
}

/// Prints what the geolocation service reports for this network.
pub async fn locate(settings: &Settings) -> Result<()> {
    println!("Testing location services...");
    let client = GeolocationClient::new(
        settings.uplink.geolocation_url.clone(),
        settings.uplink.geolocation_timeout(),
    )?;
    let ip_info = client.lookup().await?;

    let or_missing = |field: &Option<String>| field.clone().unwrap_or_else(|| "Not available".into());
    println!();
    println!("Location info:");
    println!("IP Address: {}", or_missing(&ip_info.ip));
    println!("City: {}", or_missing(&ip_info.city));
    println!("Region: {}", or_missing(&ip_info.region));
    println!("Country: {}", or_missing(&ip_info.country));
    println!("Location: {}", or_missing(&ip_info.loc));

    match ip_info.coordinates() {
        Ok(coords) => println!("Coordinates: {coords}"),
        Err(err) => println!("Coordinates: unusable ({err})"),
    }
    Ok(())
}

pub fn show_or_write_config(
    settings: &Settings,
    path: &Path,
    write_default: bool,
    force: bool,
) -> Result<()> {
    if !write_default {
        println!("# {}", path.display());
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }

    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    Settings::default().save(path)?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl-C")?,
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
    }

    Ok(())
}
