use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::time::Duration;

use crate::models::session::{frame_file_name, unique_session_dir};
use crate::models::{FrameClock, SessionSummary};

use super::Camera;

/// One capture cycle: a fresh session directory plus the camera, started,
/// for as long as the session lives. The camera is stopped on `close`,
/// `discard`, or drop, whichever comes first.
pub struct CaptureSession<'a> {
    camera: &'a mut dyn Camera,
    directory: PathBuf,
    started_at: DateTime<Local>,
    frames: Vec<PathBuf>,
    clock: FrameClock,
    closed: bool,
}

impl<'a> CaptureSession<'a> {
    pub async fn open(camera: &'a mut dyn Camera, images_dir: &Path) -> Result<Self> {
        fs::create_dir_all(images_dir)
            .with_context(|| format!("failed to create {}", images_dir.display()))?;

        let started_at = Local::now();
        let directory = unique_session_dir(images_dir, &started_at);
        fs::create_dir_all(&directory)
            .with_context(|| format!("failed to create {}", directory.display()))?;
        info!("Created session directory: {}", directory.display());

        if let Err(err) = camera.start().await {
            let _ = fs::remove_dir(&directory);
            return Err(err.context("camera failed to start"));
        }

        Ok(Self {
            camera,
            directory,
            started_at,
            frames: Vec::new(),
            clock: FrameClock::new(),
            closed: false,
        })
    }

    /// Plain warm-up for callers that do not watch a gate meanwhile.
    pub async fn warm_up(&self, duration: Duration) {
        info!("Warming up camera...");
        tokio::time::sleep(duration).await;
    }

    pub async fn capture_frame(&mut self) -> Result<PathBuf> {
        let captured_at = self.clock.stamp(Local::now());
        let path = self.directory.join(frame_file_name(&captured_at));

        self.camera
            .capture_file(&path)
            .await
            .with_context(|| format!("capture of {} failed", path.display()))?;

        info!(
            "Image {} captured and saved as '{}'",
            self.frames.len() + 1,
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        self.frames.push(path.clone());
        Ok(path)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn close(mut self) -> Result<SessionSummary> {
        self.stop_camera()?;
        Ok(SessionSummary {
            directory: self.directory.clone(),
            started_at: self.started_at,
            frames: std::mem::take(&mut self.frames),
        })
    }

    /// Stops the camera and removes the directory if nothing was captured.
    /// Both steps are attempted; the first failure is returned.
    pub fn discard(mut self) -> Result<()> {
        let stopped = self.stop_camera();
        let removed = if self.frames.is_empty() {
            fs::remove_dir(&self.directory)
                .with_context(|| format!("failed to remove {}", self.directory.display()))
                .map(|()| info!("Discarded empty session {}", self.directory.display()))
        } else {
            Ok(())
        };
        stopped.and(removed)
    }

    fn stop_camera(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.camera.stop().context("camera failed to stop")
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.stop_camera() {
            warn!("{err:#}");
        }
    }
}
