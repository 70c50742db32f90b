use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::{LightPhase, TrafficLight};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Alternates red and green every `phase_len`, starting on red, publishing each
/// phase on `phase_tx`. Both LEDs are off when this returns, on every path.
pub async fn blink_loop(
    mut light: TrafficLight,
    phase_len: Duration,
    phase_tx: watch::Sender<LightPhase>,
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut phase = LightPhase::Red;
    let mut deadline = Instant::now();

    let result = loop {
        if let Err(err) = light.show(phase) {
            break Err(err);
        }
        phase_tx.send_replace(phase);

        deadline += phase_len;
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                phase = phase.next();
            }
            _ = cancel_token.cancelled() => {
                log_info!("blinker shutting down");
                break Ok(());
            }
        }
    };

    phase_tx.send_replace(LightPhase::Off);
    if let Err(err) = light.all_off() {
        log_error!("failed to switch LEDs off: {err:#}");
    }
    result
}
