use anyhow::{bail, Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use log::info;
use std::path::Path;

use super::Camera;

/// Generated frames for running off-device. Each capture shifts the gradient
/// so consecutive files differ.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    started: bool,
    frames_taken: u32,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            started: false,
            frames_taken: 0,
        }
    }

    fn render(&self) -> RgbImage {
        let shift = self.frames_taken.wrapping_mul(17);
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let r = ((x * 255) / self.width) as u8;
            let g = ((y * 255) / self.height) as u8;
            let b = (shift.wrapping_add(x ^ y) % 256) as u8;
            Rgb([r, g, b])
        })
    }
}

#[async_trait::async_trait]
impl Camera for SyntheticCamera {
    async fn start(&mut self) -> Result<()> {
        info!("Synthetic camera started ({}x{})", self.width, self.height);
        self.started = true;
        Ok(())
    }

    async fn capture_file(&mut self, path: &Path) -> Result<()> {
        if !self.started {
            bail!("camera not started");
        }
        self.render()
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.frames_taken += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_decodable_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut camera = SyntheticCamera::new(32, 24);
        camera.start().await.unwrap();
        camera.capture_file(&path).await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!((img.width(), img.height()), (32, 24));
    }

    #[tokio::test]
    async fn consecutive_frames_differ() {
        let dir = tempdir().unwrap();
        let mut camera = SyntheticCamera::new(16, 16);
        camera.start().await.unwrap();
        camera.capture_file(&dir.path().join("a.png")).await.unwrap();
        camera.capture_file(&dir.path().join("b.png")).await.unwrap();

        let a = std::fs::read(dir.path().join("a.png")).unwrap();
        let b = std::fs::read(dir.path().join("b.png")).unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn stopped_camera_refuses_capture() {
        let dir = tempdir().unwrap();
        let mut camera = SyntheticCamera::new(8, 8);
        camera.start().await.unwrap();
        camera.stop().unwrap();
        assert!(camera
            .capture_file(&dir.path().join("x.png"))
            .await
            .is_err());
    }
}
