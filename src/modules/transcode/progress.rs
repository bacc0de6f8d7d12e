//! Live encode progress.
//!
//! ffmpeg reports progress on stderr as free-form status lines such as
//! `frame=  240 fps= 48 q=28.0 size=  1024kB time=00:00:08.00 ...`. The
//! extractor pulls the frame counter and rate out of one line; the state
//! keeps the latest pair for the status service.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard, OnceLock, PoisonError};

use regex::Regex;
use serde::Serialize;

static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"frame=\s*(\d+).*?fps=\s*(\d+)").expect("progress pattern is valid")
});

/// Returns `(frame, fps)` for a status line, or `(0, 0)` when the line
/// carries no progress.
pub fn extract_progress(line: &str) -> (u64, u64) {
    let Some(caps) = PROGRESS_RE.captures(line) else {
        return (0, 0);
    };

    let frame = caps[1].parse::<u64>();
    let fps = caps[2].parse::<u64>();
    match (frame, fps) {
        (Ok(frame), Ok(fps)) => (frame, fps),
        _ => (0, 0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub frames_processed: u64,
    pub total_frames: u64,
    pub instantaneous_rate: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct LiveProgress {
    frames: u64,
    rate: u64,
}

#[derive(Debug, Default)]
struct Shared {
    live: Mutex<LiveProgress>,
    total_frames: OnceLock<u64>,
}

/// Shared handle to the job's progress. Cloning is cheap; all clones see
/// the same state.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    inner: Arc<Shared>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self) -> MutexGuard<'_, LiveProgress> {
        // The guarded value is two plain integers, always consistent.
        self.inner.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fixes the job's total frame count. Only the first call takes effect;
    /// later calls get the already-stored value back as an error.
    pub fn set_total_frames(&self, total: u64) -> Result<(), u64> {
        self.inner
            .total_frames
            .set(total.max(1))
            .map_err(|_| self.total_frames())
    }

    pub fn total_frames(&self) -> u64 {
        self.inner.total_frames.get().copied().unwrap_or(1)
    }

    /// Replaces frame and rate together. A zero frame count is not progress
    /// and leaves the state untouched; returns whether anything was written.
    pub fn write(&self, frame: u64, rate: u64) -> bool {
        if frame == 0 {
            return false;
        }
        *self.live() = LiveProgress { frames: frame, rate };
        true
    }

    pub fn read(&self) -> ProgressSnapshot {
        let live = *self.live();
        ProgressSnapshot {
            frames_processed: live.frames,
            total_frames: self.total_frames(),
            instantaneous_rate: live.rate,
        }
    }
}
