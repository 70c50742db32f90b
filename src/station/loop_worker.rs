use anyhow::Result;
use std::path::Path;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::camera::{Camera, CaptureSession};
use crate::gate::Gate;
use crate::models::SessionSummary;
use crate::uplink::Reporter;

use super::state::{CyclePolicy, EventSink, StationEventKind, StationState, StationStats};
use super::Station;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const MIN_POLL: Duration = Duration::from_millis(1);

enum CycleEnd {
    /// Gate closed before any frame was taken; the session was discarded.
    Aborted,
    Finished(SessionSummary),
    Cancelled,
}

enum GateWatch {
    HeldOpen,
    Closed,
    Cancelled,
}

/// Waiting -> Capturing -> Waiting until `cancel_token` fires. Errors inside a
/// cycle are logged and followed by a back-off pause; they never end the loop.
pub async fn station_loop<G: Gate, R: Reporter>(
    station: Station<G, R>,
    cancel_token: CancellationToken,
) -> StationStats {
    let Station {
        mut gate,
        mut camera,
        reporter,
        images_dir,
        policy,
        events,
    } = station;
    let mut stats = StationStats::default();

    log_info!(
        "station loop started: {} frames every {:?} after {:?} warm-up, images in {}",
        policy.frame_count,
        policy.frame_interval,
        policy.warm_up,
        images_dir.display()
    );

    loop {
        events.emit(StationEventKind::StateChanged(StationState::Waiting));

        let cycle = match wait_for_gate(&mut gate, policy.poll_interval, &cancel_token).await {
            Ok(true) => {
                stats.cycles_started += 1;
                run_cycle(
                    &mut gate,
                    camera.as_mut(),
                    &images_dir,
                    &policy,
                    &events,
                    &mut stats,
                    &cancel_token,
                )
                .await
            }
            Ok(false) => break,
            Err(err) => Err(err),
        };

        match cycle {
            Ok(CycleEnd::Aborted) => {
                stats.cycles_aborted += 1;
                events.emit(StationEventKind::CycleAborted);
            }
            Ok(CycleEnd::Cancelled) => break,
            Ok(CycleEnd::Finished(summary)) => {
                events.emit(StationEventKind::CycleFinished {
                    frames: summary.frame_count(),
                });

                events.emit(StationEventKind::StateChanged(StationState::Reporting));
                stats.reports_sent += 1;
                if reporter.after_capture(&summary).await.is_some() {
                    stats.car_data_received += 1;
                }

                events.emit(StationEventKind::StateChanged(StationState::Cooldown));
                if !pause(policy.cooldown, &cancel_token).await {
                    break;
                }
            }
            Err(err) => {
                stats.cycles_failed += 1;
                log_error!("capture cycle failed: {err:#}");
                events.emit(StationEventKind::CycleFailed(format!("{err:#}")));
                if !pause(policy.error_backoff, &cancel_token).await {
                    break;
                }
            }
        }
    }

    log_info!("station loop shutting down: {:?}", stats);
    stats
}

async fn run_cycle<G: Gate>(
    gate: &mut G,
    camera: &mut dyn Camera,
    images_dir: &Path,
    policy: &CyclePolicy,
    events: &EventSink,
    stats: &mut StationStats,
    cancel_token: &CancellationToken,
) -> Result<CycleEnd> {
    log_info!("gate open, starting capture session");
    let mut session = CaptureSession::open(camera, images_dir).await?;

    events.emit(StationEventKind::StateChanged(StationState::WarmingUp));
    log_info!("Warming up camera...");
    let warm_up = hold_open(gate, policy.warm_up, policy.poll_interval, cancel_token).await;
    match warm_up {
        Ok(GateWatch::HeldOpen) => {}
        Ok(GateWatch::Closed) => {
            log_info!("gate closed during warm-up, discarding session");
            discard(session);
            return Ok(CycleEnd::Aborted);
        }
        Ok(GateWatch::Cancelled) => {
            discard(session);
            return Ok(CycleEnd::Cancelled);
        }
        Err(err) => {
            discard(session);
            return Err(err);
        }
    }

    events.emit(StationEventKind::StateChanged(StationState::Capturing));
    for index in 0..policy.frame_count {
        if !gate.is_open()? {
            log_info!(
                "gate closed after {} of {} frames, stopping early",
                session.frame_count(),
                policy.frame_count
            );
            break;
        }

        // Spacing is measured from the start of each capture.
        let next_frame_at = Instant::now() + policy.frame_interval;
        let path = session.capture_frame().await?;
        stats.frames_captured += 1;
        events.emit(StationEventKind::FrameCaptured(path));

        let more_to_come = index + 1 < policy.frame_count;
        let wait = next_frame_at.saturating_duration_since(Instant::now());
        if more_to_come && !pause(wait, cancel_token).await {
            let summary = session.close()?;
            log_info!(
                "cancelled mid-capture, keeping {} frames in {}",
                summary.frame_count(),
                summary.directory.display()
            );
            return Ok(CycleEnd::Cancelled);
        }
    }

    if session.frame_count() == 0 {
        discard(session);
        return Ok(CycleEnd::Aborted);
    }

    let summary = session.close()?;
    log_info!(
        "capture complete: {} frames in {}",
        summary.frame_count(),
        summary.directory.display()
    );
    Ok(CycleEnd::Finished(summary))
}

/// A failed discard leaves a stray directory behind; it never changes how the
/// cycle ended.
fn discard(session: CaptureSession<'_>) {
    let directory = session.directory().to_path_buf();
    if let Err(err) = session.discard() {
        log_warn!("could not discard {}: {err:#}", directory.display());
    }
}

/// Polls until the gate reads open. `Ok(false)` means cancelled.
async fn wait_for_gate<G: Gate>(
    gate: &mut G,
    poll_interval: Duration,
    cancel_token: &CancellationToken,
) -> Result<bool> {
    let mut ticker = tokio::time::interval(poll_interval.max(MIN_POLL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if gate.is_open()? {
                    return Ok(true);
                }
            }
            _ = cancel_token.cancelled() => {
                log_debug!("gate wait cancelled");
                return Ok(false);
            }
        }
    }
}

/// Sleeps for `duration` while checking that the gate stays open.
async fn hold_open<G: Gate>(
    gate: &mut G,
    duration: Duration,
    poll_interval: Duration,
    cancel_token: &CancellationToken,
) -> Result<GateWatch> {
    let deadline = Instant::now() + duration;
    let poll_interval = poll_interval.max(MIN_POLL);

    loop {
        if !gate.is_open()? {
            return Ok(GateWatch::Closed);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(GateWatch::HeldOpen);
        }
        if !pause(poll_interval.min(deadline - now), cancel_token).await {
            return Ok(GateWatch::Cancelled);
        }
    }
}

/// `false` when cancelled before `duration` elapsed.
async fn pause(duration: Duration, cancel_token: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel_token.cancelled() => false,
    }
}
