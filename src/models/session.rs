use chrono::{DateTime, Duration, Local, TimeZone};
use std::path::{Path, PathBuf};

const SESSION_PREFIX: &str = "session_";
const FRAME_PREFIX: &str = "image_";
const FRAME_EXTENSION: &str = "png";

/// `session_<YYYYMMDD_HHMMSS>`; second granularity.
pub fn session_dir_name<Tz: TimeZone>(started_at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{SESSION_PREFIX}{}", started_at.format("%Y%m%d_%H%M%S"))
}

/// `image_<YYYYMMDD_HHMMSS_ffffff>.png`; microsecond granularity.
pub fn frame_file_name<Tz: TimeZone>(captured_at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{FRAME_PREFIX}{}.{FRAME_EXTENSION}",
        captured_at.format("%Y%m%d_%H%M%S_%6f")
    )
}

/// Picks a directory under `images_dir` that does not exist yet. Two sessions
/// started within the same second get `_2`, `_3`, ... appended.
pub fn unique_session_dir(images_dir: &Path, started_at: &DateTime<Local>) -> PathBuf {
    let base = session_dir_name(started_at);
    let mut candidate = images_dir.join(&base);
    let mut suffix = 2u32;
    while candidate.exists() {
        candidate = images_dir.join(format!("{base}_{suffix}"));
        suffix += 1;
    }
    candidate
}

/// Hands out frame timestamps that are strictly increasing at microsecond
/// resolution, even if the wall clock stalls or steps backwards.
#[derive(Debug, Default)]
pub struct FrameClock {
    last: Option<DateTime<Local>>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamp(&mut self, now: DateTime<Local>) -> DateTime<Local> {
        let now = truncate_to_micros(now);
        let stamped = match self.last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        self.last = Some(stamped);
        stamped
    }
}

fn truncate_to_micros(at: DateTime<Local>) -> DateTime<Local> {
    let nanos = at.timestamp_subsec_nanos() % 1_000;
    at - Duration::nanoseconds(i64::from(nanos))
}

/// What a finished capture cycle left on disk.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub directory: PathBuf,
    pub started_at: DateTime<Local>,
    pub frames: Vec<PathBuf>,
}

impl SessionSummary {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}
