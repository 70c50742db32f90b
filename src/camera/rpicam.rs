//! Pi camera access through the `rpicam-still` tool from rpicam-apps.
//!
//! One `rpicam-still -t 0 --signal` process runs from `start` to `stop`, so
//! exposure and white balance settle during the warm-up and stay settled for
//! the whole burst. Each SIGUSR1 makes it write the next numbered frame into a
//! staging directory; the frame is then moved to the requested path.

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::time::{Duration, Instant};

use super::Camera;

const STILL_BINARY: &str = "rpicam-still";
const FRAME_PATTERN: &str = "frame%04d.png";

/// A process that dies this quickly never found a camera.
const STARTUP_GRACE: Duration = Duration::from_millis(200);
const FRAME_POLL: Duration = Duration::from_millis(20);
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RpicamCamera {
    program: PathBuf,
    width: u32,
    height: u32,
    staging: PathBuf,
    child: Option<Child>,
    frames_requested: u32,
}

impl RpicamCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            program: PathBuf::from(STILL_BINARY),
            width,
            height,
            staging: std::env::temp_dir().join(format!("redlight-rpicam-{}", std::process::id())),
            child: None,
            frames_requested: 0,
        }
    }

    /// Runs `program` instead of the `rpicam-still` found on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_staging_dir(mut self, staging: impl Into<PathBuf>) -> Self {
        self.staging = staging.into();
        self
    }

    fn still_args(&self) -> Vec<String> {
        vec![
            "-n".into(),
            "-t".into(),
            "0".into(),
            "--signal".into(),
            "-e".into(),
            "png".into(),
            "--width".into(),
            self.width.to_string(),
            "--height".into(),
            self.height.to_string(),
            "-o".into(),
            self.staging.join(FRAME_PATTERN).display().to_string(),
        ]
    }

    fn staged_frame(&self, index: u32) -> PathBuf {
        self.staging.join(format!("frame{index:04}.png"))
    }

    fn prepare_staging(&self) -> Result<()> {
        if self.staging.exists() {
            std::fs::remove_dir_all(&self.staging)
                .with_context(|| format!("failed to clear {}", self.staging.display()))?;
        }
        std::fs::create_dir_all(&self.staging)
            .with_context(|| format!("failed to create {}", self.staging.display()))
    }

    /// Waits until `path` exists with a non-zero size that holds across two polls.
    async fn wait_for_frame(&mut self, path: &Path) -> Result<()> {
        let deadline = Instant::now() + FRAME_TIMEOUT;
        let mut last_len = 0;

        loop {
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    self.child = None;
                    bail!("{STILL_BINARY} exited with {status} while capturing");
                }
            }

            let len = tokio::fs::metadata(path)
                .await
                .map(|meta| meta.len())
                .unwrap_or(0);
            if len > 0 && len == last_len {
                return Ok(());
            }
            last_len = len;

            if Instant::now() >= deadline {
                bail!("{STILL_BINARY} did not write {} in time", path.display());
            }
            tokio::time::sleep(FRAME_POLL).await;
        }
    }
}

fn send_signal(child: &Child, signal: libc::c_int) -> Result<()> {
    let pid = child.id().context("camera process has already exited")?;
    // SAFETY: kill(2) on a child we spawned and have not reaped yet.
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error()).context("failed to signal camera process");
    }
    Ok(())
}

/// `rename` fails across filesystems; fall back to copying.
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .with_context(|| format!("failed to move {} to {}", from.display(), to.display()))?;
    tokio::fs::remove_file(from).await.ok();
    Ok(())
}

#[async_trait::async_trait]
impl Camera for RpicamCamera {
    async fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }
        self.prepare_staging()?;

        let args = self.still_args();
        debug!("{STILL_BINARY} args: {:?}", args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {STILL_BINARY}. Is rpicam-apps installed?"))?;

        if let Ok(status) = tokio::time::timeout(STARTUP_GRACE, child.wait()).await {
            bail!("{STILL_BINARY} exited with {} on startup; is a camera connected?", status?);
        }

        info!("Camera started ({}x{})", self.width, self.height);
        self.frames_requested = 0;
        self.child = Some(child);
        Ok(())
    }

    async fn capture_file(&mut self, path: &Path) -> Result<()> {
        let Some(child) = self.child.as_ref() else {
            bail!("camera not started");
        };

        let staged = self.staged_frame(self.frames_requested);
        send_signal(child, libc::SIGUSR1)?;
        self.frames_requested += 1;

        self.wait_for_frame(&staged).await?;
        move_file(&staged, path).await
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            child
                .start_kill()
                .context("failed to stop camera process")?;
            info!("Camera stopped");
        }
        if self.staging.exists() {
            if let Err(err) = std::fs::remove_dir_all(&self.staging) {
                warn!("failed to remove {}: {err}", self.staging.display());
            }
        }
        Ok(())
    }
}

impl Drop for RpicamCamera {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!("{err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    /// Stand-in for rpicam-still: logs its pid, writes a numbered frame per
    /// SIGUSR1 and exits on SIGUSR2 or SIGTERM.
    const FAKE_STILL: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
  esac
  shift
done
n=0
trap 'f=$(printf "$out" "$n"); printf fakepng > "$f"; n=$((n+1))' USR1
trap 'exit 0' USR2 TERM
echo $$ >> "$(dirname "$0")/pids"
while :; do sleep 0.02; done
"#;

    fn fake_camera(dir: &Path) -> RpicamCamera {
        let program = dir.join("rpicam-still");
        std::fs::write(&program, FAKE_STILL).unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
        RpicamCamera::new(640, 480)
            .with_program(program)
            .with_staging_dir(dir.join("staging"))
    }

    #[tokio::test]
    async fn capture_requires_start() {
        let mut camera = RpicamCamera::new(640, 480);
        let err = camera
            .capture_file(&PathBuf::from("/tmp/never.png"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not started"));
    }

    #[test]
    fn still_args_keep_one_process_running() {
        let camera = RpicamCamera::new(1280, 720).with_staging_dir("/run/redlight");
        let args = camera.still_args();
        assert_eq!(
            args,
            [
                "-n",
                "-t",
                "0",
                "--signal",
                "-e",
                "png",
                "--width",
                "1280",
                "--height",
                "720",
                "-o",
                "/run/redlight/frame%04d.png"
            ]
        );
        assert!(!args.iter().any(|arg| arg == "--immediate"));
    }

    #[tokio::test]
    async fn one_process_serves_the_whole_session() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("session");
        std::fs::create_dir_all(&out).unwrap();
        let mut camera = fake_camera(dir.path());

        camera.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        for index in 0..3 {
            camera
                .capture_file(&out.join(format!("image_{index}.png")))
                .await
                .unwrap();
        }
        camera.stop().unwrap();

        let pids = std::fs::read_to_string(dir.path().join("pids")).unwrap();
        assert_eq!(pids.lines().count(), 1, "camera respawned: {pids}");
        for index in 0..3 {
            let frame = std::fs::read(out.join(format!("image_{index}.png"))).unwrap();
            assert_eq!(frame, b"fakepng");
        }
        assert!(!dir.path().join("staging").exists());
    }

    #[tokio::test]
    async fn missing_binary_fails_start() {
        let dir = tempdir().unwrap();
        let mut camera = RpicamCamera::new(640, 480)
            .with_program(dir.path().join("no-such-rpicam"))
            .with_staging_dir(dir.path().join("staging"));
        assert!(camera.start().await.is_err());
    }
}
