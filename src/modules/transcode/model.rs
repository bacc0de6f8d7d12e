use std::fmt;
use std::path::PathBuf;

use crate::config::settings::AppConfig;

/// Value of the job record's `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    InProgress,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "in-progress",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Fetching,
    Probing,
    Transcoding,
    Finalizing,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobPhase::Fetching => "fetching",
            JobPhase::Probing => "probing",
            JobPhase::Transcoding => "transcoding",
            JobPhase::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Complete { bytes_written: u64 },
    Failed { phase: JobPhase, reason: String },
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Complete { .. } => JobStatus::Complete,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, JobOutcome::Complete { .. })
    }
}

/// Everything one run needs to know about its input and output.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub input_bucket: String,
    pub output_bucket: String,
    pub input_key: String,
    pub output_key: String,
    pub local_path: PathBuf,
    pub output_format: String,
    pub output_ext: Option<String>,
    pub video_codec: String,
    pub audio_codec: String,
}

impl TranscodeJob {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            input_bucket: config.bucket_in.clone(),
            output_bucket: config.bucket_out.clone(),
            input_key: config.object_name.clone(),
            output_key: config.output_key(),
            local_path: config.local_artifact_path(),
            output_format: config.output_format.clone(),
            output_ext: config.output_ext.clone(),
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
        }
    }

    pub fn content_type(&self) -> String {
        let ext = self.output_ext.as_deref().unwrap_or(&self.output_format);
        mime_guess::from_ext(ext).first_or_octet_stream().to_string()
    }
}
