//! FFmpeg command builder and launcher.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use super::error::{MediaError, MediaResult};

/// Arguments for one transcode run. Output always goes to stdout.
#[derive(Debug, Clone)]
pub struct TranscodeCommand {
    input: PathBuf,
    format: String,
    video_codec: Option<String>,
    audio_codec: Option<String>,
    output_args: Vec<String>,
}

impl TranscodeCommand {
    pub fn new(input: impl AsRef<Path>, format: impl Into<String>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            format: format.into(),
            video_codec: None,
            audio_codec: None,
            output_args: Vec::new(),
        }
    }

    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = Some(codec.into());
        self
    }

    pub fn audio_codec(mut self, codec: impl Into<String>) -> Self {
        self.audio_codec = Some(codec.into());
        self
    }

    /// Extra output options, placed before the output target.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-i".to_string(),
            self.input.to_string_lossy().to_string(),
            "-f".to_string(),
            self.format.clone(),
            "-sn".to_string(),
        ];

        if let Some(codec) = &self.video_codec {
            args.push("-c:v".to_string());
            args.push(codec.clone());
        }
        if let Some(codec) = &self.audio_codec {
            args.push("-c:a".to_string());
            args.push(codec.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push("pipe:1".to_string());
        args
    }
}

/// Starts the transcoder. The returned child must have stdout and stderr piped.
pub trait TranscoderLauncher: Send + Sync {
    fn spawn(&self, command: &TranscodeCommand) -> MediaResult<Child>;
}

pub struct FfmpegLauncher {
    binary: Option<PathBuf>,
}

impl FfmpegLauncher {
    /// `binary` overrides the `ffmpeg` found on `PATH`.
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self { binary }
    }
}

impl TranscoderLauncher for FfmpegLauncher {
    fn spawn(&self, command: &TranscodeCommand) -> MediaResult<Child> {
        let program = match &self.binary {
            Some(path) => path.clone(),
            None => which::which("ffmpeg").map_err(|_| MediaError::BinaryNotFound("ffmpeg"))?,
        };

        let args = command.build_args();
        debug!("Running FFmpeg: {} {}", program.display(), args.join(" "));

        Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MediaError::SpawnFailed {
                program: program.display().to_string(),
                source,
            })
    }
}
