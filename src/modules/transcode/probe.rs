//! FFprobe container metadata.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::error::{MediaError, MediaResult};

/// Subset of `ffprobe -show_format -show_streams` JSON the worker reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub format: Option<ProbeFormat>,
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFormat {
    pub nb_streams: Option<u32>,
    pub format_name: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    pub index: Option<u32>,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    /// ffprobe emits this as a string, and only when the container knows it.
    pub nb_frames: Option<String>,
}

impl ProbeStream {
    pub fn is_video(&self) -> bool {
        self.codec_type.as_deref() == Some("video")
    }

    pub fn frame_count(&self) -> Option<u64> {
        self.nb_frames
            .as_deref()
            .and_then(|n| n.trim().parse::<u64>().ok())
            .filter(|n| *n > 0)
    }
}

impl ProbeOutput {
    /// Frame count of the first video stream that reports one, else 1.
    ///
    /// 1 stands for "unknown" and is what status consumers have always
    /// received in that case.
    pub fn total_frames(&self) -> u64 {
        self.streams
            .iter()
            .filter(|s| s.is_video())
            .find_map(ProbeStream::frame_count)
            .unwrap_or(1)
    }
}

#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<ProbeOutput>;
}

pub struct FfprobeProber {
    binary: Option<PathBuf>,
}

impl FfprobeProber {
    /// `binary` overrides the `ffprobe` found on `PATH`.
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self { binary }
    }

    fn resolve(&self) -> MediaResult<PathBuf> {
        match &self.binary {
            Some(path) => Ok(path.clone()),
            None => which::which("ffprobe").map_err(|_| MediaError::BinaryNotFound("ffprobe")),
        }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> MediaResult<ProbeOutput> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let program = self.resolve()?;
        debug!("Running ffprobe on {}", path.display());

        let output = Command::new(&program)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| MediaError::SpawnFailed {
                program: program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(MediaError::ProbeFailed {
                message: format!("ffprobe exited with {}", output.status),
                stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}
