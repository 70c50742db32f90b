use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use crate::settings::Settings;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StationState {
    /// Gate closed; polling.
    #[default]
    Waiting,
    /// Gate open, session opened, camera settling.
    WarmingUp,
    Capturing,
    Reporting,
    Cooldown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationEventKind {
    StateChanged(StationState),
    FrameCaptured(PathBuf),
    /// Gate closed before the camera finished warming up.
    CycleAborted,
    CycleFinished { frames: usize },
    CycleFailed(String),
}

#[derive(Debug, Clone)]
pub struct StationEvent {
    pub at: Instant,
    pub kind: StationEventKind,
}

/// Fire-and-forget observer channel; a station without observers emits nothing.
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<StationEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, kind: StationEventKind) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(StationEvent {
                at: Instant::now(),
                kind,
            });
        }
    }
}

/// Timing and counts for one capture cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CyclePolicy {
    pub poll_interval: Duration,
    pub warm_up: Duration,
    pub frame_count: u32,
    pub frame_interval: Duration,
    pub cooldown: Duration,
    pub error_backoff: Duration,
}

impl Default for CyclePolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl CyclePolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.gate.poll_interval(),
            warm_up: settings.camera.warm_up(),
            frame_count: settings.capture.frame_count,
            frame_interval: settings.capture.frame_interval(),
            cooldown: settings.capture.cooldown(),
            error_backoff: settings.capture.error_backoff(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationStats {
    pub cycles_started: u64,
    pub cycles_aborted: u64,
    pub cycles_failed: u64,
    pub frames_captured: u64,
    pub reports_sent: u64,
    pub car_data_received: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_canonical_burst() {
        let policy = CyclePolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_millis(100));
        assert_eq!(policy.warm_up, Duration::from_secs(3));
        assert_eq!(policy.frame_count, 4);
        assert_eq!(policy.frame_interval, Duration::from_millis(500));
        assert_eq!(policy.cooldown, Duration::from_secs(1));
        assert_eq!(policy.error_backoff, Duration::from_secs(1));
        assert_eq!(StationState::default(), StationState::Waiting);
    }

    #[tokio::test]
    async fn disabled_sink_is_silent_and_channel_delivers() {
        EventSink::disabled().emit(StationEventKind::CycleAborted);

        let (sink, mut rx) = EventSink::channel();
        sink.emit(StationEventKind::StateChanged(StationState::Capturing));
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.kind,
            StationEventKind::StateChanged(StationState::Capturing)
        );
    }
}
