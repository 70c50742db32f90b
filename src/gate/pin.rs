use anyhow::{Context, Result};
use rppal::gpio::{Gpio, Level, Pin};

use super::Gate;

/// Reads a pin's level without changing its mode, so the pin can stay an
/// output owned by whichever process drives the LED.
pub struct PinGate {
    pin: Pin,
}

impl PinGate {
    pub fn new(bcm_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().context("failed to open GPIO peripheral")?;
        let pin = gpio
            .get(bcm_pin)
            .with_context(|| format!("failed to claim GPIO {bcm_pin} for the light sensor"))?;
        Ok(Self { pin })
    }
}

impl Gate for PinGate {
    fn is_open(&mut self) -> Result<bool> {
        Ok(self.pin.read() == Level::High)
    }
}
