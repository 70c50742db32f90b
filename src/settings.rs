use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const CONFIG_ENV: &str = "REDLIGHT_CONFIG";
const CONFIG_FILE_NAME: &str = "redlight.json";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum CameraBackend {
    /// Pi camera through rpicam-still.
    #[default]
    Rpicam,
    /// Generated frames, for running without camera hardware.
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GateSettings {
    /// BCM pin carrying the red light.
    pub pin: u8,
    pub poll_interval_ms: u64,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            pin: 27,
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LightSettings {
    pub green_pin: u8,
    pub red_pin: u8,
    pub phase_secs: u64,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            green_pin: 17,
            red_pin: 27,
            phase_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraSettings {
    pub backend: CameraBackend,
    pub width: u32,
    pub height: u32,
    pub warm_up_ms: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            backend: CameraBackend::default(),
            width: 640,
            height: 480,
            warm_up_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureSettings {
    pub frame_count: u32,
    pub frame_interval_ms: u64,
    pub cooldown_ms: u64,
    pub error_backoff_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            frame_count: 4,
            frame_interval_ms: 500,
            cooldown_ms: 1_000,
            error_backoff_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UplinkSettings {
    pub geolocation_url: String,
    pub geolocation_timeout_ms: u64,
    pub api_base_url: String,
}

impl Default for UplinkSettings {
    fn default() -> Self {
        Self {
            geolocation_url: "https://ipinfo.io".into(),
            geolocation_timeout_ms: 5_000,
            api_base_url: "http://localhost:3005".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub gate: GateSettings,
    pub lights: LightSettings,
    pub camera: CameraSettings,
    pub capture: CaptureSettings,
    pub uplink: UplinkSettings,
    /// Falls back to `<executable dir>/images` when unset.
    pub images_dir: Option<PathBuf>,
}

impl Settings {
    /// Reads settings from `path`. A missing file yields defaults; content that
    /// does not parse is reported and replaced by defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        match serde_json::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                warn!(
                    "Ignoring unparsable settings in {}: {err}; using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    /// Explicit path, then `REDLIGHT_CONFIG`, then `redlight.json` next to the binary.
    pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(executable_dir()?.join(CONFIG_FILE_NAME))
    }

    pub fn images_dir(&self) -> Result<PathBuf> {
        match &self.images_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(executable_dir()?.join("images")),
        }
    }
}

impl GateSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl LightSettings {
    pub fn phase_len(&self) -> Duration {
        Duration::from_secs(self.phase_secs)
    }
}

impl CameraSettings {
    pub fn warm_up(&self) -> Duration {
        Duration::from_millis(self.warm_up_ms)
    }
}

impl CaptureSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl UplinkSettings {
    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }
}

fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("Executable path has no parent directory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.capture.frame_count, 4);
        assert_eq!(settings.capture.frame_interval(), Duration::from_millis(500));
        assert_eq!(settings.camera.warm_up(), Duration::from_secs(3));
        assert_eq!(settings.gate.pin, 27);
        assert_eq!(settings.camera.backend, CameraBackend::Rpicam);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("redlight.json");
        fs::write(
            &path,
            r#"{ "capture": { "frameCount": 8 }, "camera": { "backend": "synthetic" } }"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.capture.frame_count, 8);
        assert_eq!(settings.capture.frame_interval_ms, 500);
        assert_eq!(settings.camera.backend, CameraBackend::Synthetic);
        assert_eq!(settings.uplink.api_base_url, "http://localhost:3005");
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("redlight.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());
    }

    #[test]
    fn save_then_load_preserves_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("redlight.json");
        let mut settings = Settings::default();
        settings.images_dir = Some(dir.path().join("shots"));
        settings.lights.phase_secs = 5;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn explicit_path_wins() {
        let path = Settings::resolve_path(Some(PathBuf::from("/tmp/x.json"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/x.json"));
    }
}
