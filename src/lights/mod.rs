pub mod blinker;

use anyhow::{Context, Result};
use log::{info, warn};
use rppal::gpio::{Gpio, OutputPin};

pub use blinker::blink_loop;

/// A single on/off output.
pub trait Switch: Send {
    fn set(&mut self, on: bool) -> Result<()>;
}

/// LED wired to a GPIO output.
pub struct GpioSwitch {
    pin: OutputPin,
}

impl GpioSwitch {
    pub fn new(gpio: &Gpio, bcm_pin: u8) -> Result<Self> {
        let pin = gpio
            .get(bcm_pin)
            .with_context(|| format!("failed to claim GPIO {bcm_pin} for LED"))?
            .into_output_low();
        Ok(Self { pin })
    }
}

impl Switch for GpioSwitch {
    fn set(&mut self, on: bool) -> Result<()> {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightPhase {
    Off,
    Red,
    Green,
}

impl LightPhase {
    pub fn next(self) -> Self {
        match self {
            LightPhase::Red => LightPhase::Green,
            LightPhase::Green | LightPhase::Off => LightPhase::Red,
        }
    }
}

/// The green/red LED pair. Both outputs are driven low when dropped.
pub struct TrafficLight {
    green: Box<dyn Switch>,
    red: Box<dyn Switch>,
    green_label: String,
    red_label: String,
}

impl TrafficLight {
    pub fn new(green: Box<dyn Switch>, red: Box<dyn Switch>) -> Self {
        Self {
            green,
            red,
            green_label: "green".into(),
            red_label: "red".into(),
        }
    }

    pub fn from_gpio(green_pin: u8, red_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().context("failed to open GPIO peripheral")?;
        let green = GpioSwitch::new(&gpio, green_pin)?;
        let red = GpioSwitch::new(&gpio, red_pin)?;
        let mut light = Self::new(Box::new(green), Box::new(red));
        light.green_label = format!("LED {green_pin}");
        light.red_label = format!("LED {red_pin}");
        Ok(light)
    }

    pub fn show(&mut self, phase: LightPhase) -> Result<()> {
        match phase {
            LightPhase::Red => {
                info!("{} ON", self.red_label);
                self.red.set(true)?;
                self.green.set(false)?;
            }
            LightPhase::Green => {
                info!("{} ON", self.green_label);
                self.green.set(true)?;
                self.red.set(false)?;
            }
            LightPhase::Off => self.all_off()?,
        }
        Ok(())
    }

    pub fn all_off(&mut self) -> Result<()> {
        // Attempt both even if the first fails.
        let green = self.green.set(false);
        let red = self.red.set(false);
        green.and(red)
    }
}

impl Drop for TrafficLight {
    fn drop(&mut self) {
        if let Err(err) = self.all_off() {
            warn!("failed to switch LEDs off on release: {err:#}");
        }
    }
}
