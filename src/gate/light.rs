use anyhow::Result;
use tokio::sync::watch;

use super::Gate;
use crate::lights::LightPhase;

/// Open while the in-process blinker shows red.
pub struct LightGate {
    phase_rx: watch::Receiver<LightPhase>,
}

impl LightGate {
    pub fn new(phase_rx: watch::Receiver<LightPhase>) -> Self {
        Self { phase_rx }
    }
}

impl Gate for LightGate {
    fn is_open(&mut self) -> Result<bool> {
        Ok(*self.phase_rx.borrow() == LightPhase::Red)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_published_phase() {
        let (tx, rx) = watch::channel(LightPhase::Off);
        let mut gate = LightGate::new(rx);
        assert!(!gate.is_open().unwrap());

        tx.send_replace(LightPhase::Red);
        assert!(gate.is_open().unwrap());

        tx.send_replace(LightPhase::Green);
        assert!(!gate.is_open().unwrap());

        tx.send_replace(LightPhase::Red);
        drop(tx);
        assert!(gate.is_open().unwrap());
    }
}
