use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::gate::TriggerKind;
use crate::settings::{CameraBackend, Settings};

#[derive(Debug, Parser)]
#[command(name = "redlight")]
#[command(version)]
#[command(about = "Red-light gated camera capture and location reporting", long_about = None)]
pub struct Cli {
    /// Settings file (default: $REDLIGHT_CONFIG or redlight.json next to the binary)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Where session directories are created
    #[arg(long, global = true)]
    pub images_dir: Option<PathBuf>,

    /// Camera backend override
    #[arg(long, global = true, value_enum)]
    pub camera: Option<CameraBackend>,

    /// Verbose logging (same as REDLIGHT_DEBUG=1)
    #[arg(short, long, global = true, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Watch the gate and capture a burst whenever it opens (default)
    Run {
        #[arg(long, value_enum, default_value_t = TriggerKind::Pin)]
        trigger: TriggerKind,
    },
    /// Alternate the red and green LEDs until interrupted
    Blink,
    /// Take one burst right away, without a gate
    Capture {
        /// Geolocate and report after capturing
        #[arg(long, default_value_t = false)]
        report: bool,
    },
    /// Query the geolocation service and print what it knows
    Locate,
    /// Print the effective settings, or write the defaults to the settings file
    Config {
        #[arg(long, default_value_t = false)]
        write_default: bool,
        /// Overwrite an existing settings file
        #[arg(long, default_value_t = false, requires = "write_default")]
        force: bool,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Run {
            trigger: TriggerKind::Pin,
        }
    }
}

impl Cli {
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(dir) = &self.images_dir {
            settings.images_dir = Some(dir.clone());
        }
        if let Some(backend) = self.camera {
            settings.camera.backend = backend;
        }
    }
}
