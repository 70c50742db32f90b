pub mod rpicam;
pub mod session;
pub mod synthetic;

use anyhow::Result;
use std::path::Path;

use crate::settings::{CameraBackend, CameraSettings};

pub use rpicam::RpicamCamera;
pub use session::CaptureSession;
pub use synthetic::SyntheticCamera;

/// A still camera held exclusively by the station.
#[async_trait::async_trait]
pub trait Camera: Send {
    /// Powers up the sensor and keeps it running until `stop`.
    async fn start(&mut self) -> Result<()>;
    /// Writes one still image to `path`.
    async fn capture_file(&mut self, path: &Path) -> Result<()>;
    /// Releases the sensor. Synchronous so it can run from `Drop`.
    fn stop(&mut self) -> Result<()>;
}

#[async_trait::async_trait]
impl<C: Camera + ?Sized> Camera for Box<C> {
    async fn start(&mut self) -> Result<()> {
        (**self).start().await
    }

    async fn capture_file(&mut self, path: &Path) -> Result<()> {
        (**self).capture_file(path).await
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }
}

pub fn from_settings(settings: &CameraSettings) -> Box<dyn Camera> {
    match settings.backend {
        CameraBackend::Rpicam => Box::new(RpicamCamera::new(settings.width, settings.height)),
        CameraBackend::Synthetic => Box::new(SyntheticCamera::new(settings.width, settings.height)),
    }
}
