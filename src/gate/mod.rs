//! Capture triggers.
//!
//! A gate is polled by the station loop; while it reads open a capture cycle
//! may run. The pin gate samples the red LED line directly, the light gate
//! follows the in-process blinker.

mod light;
mod pin;

use anyhow::Result;

pub use light::LightGate;
pub use pin::PinGate;

pub trait Gate: Send {
    /// Current level; `true` permits capture.
    fn is_open(&mut self) -> Result<bool>;
}

impl<G: Gate + ?Sized> Gate for Box<G> {
    fn is_open(&mut self) -> Result<bool> {
        (**self).is_open()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TriggerKind {
    /// Sample a GPIO pin driven by another process.
    Pin,
    /// Drive the LEDs in-process and capture during the red phase.
    Lights,
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::bail;
    use tokio::time::{Duration, Instant};

    /// Open from `opens_after` for `open_for`, measured on the tokio clock.
    pub struct WindowGate {
        origin: Instant,
        opens_after: Duration,
        open_for: Duration,
    }

    impl WindowGate {
        pub fn new(opens_after: Duration, open_for: Duration) -> Self {
            Self {
                origin: Instant::now(),
                opens_after,
                open_for,
            }
        }
    }

    impl Gate for WindowGate {
        fn is_open(&mut self) -> Result<bool> {
            let elapsed = self.origin.elapsed();
            Ok(elapsed >= self.opens_after && elapsed < self.opens_after + self.open_for)
        }
    }

    /// Fails the first `failures` reads, then stays open.
    pub struct FlakyGate {
        pub failures: u32,
    }

    impl Gate for FlakyGate {
        fn is_open(&mut self) -> Result<bool> {
            if self.failures > 0 {
                self.failures -= 1;
                bail!("simulated GPIO read fault");
            }
            Ok(true)
        }
    }
}
