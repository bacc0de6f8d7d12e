use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::error::{JobError, JobResult};
use crate::infrastructure::db::job_record::JobRecordStore;
use crate::infrastructure::storage::ObjectStore;
use crate::modules::status::server::StatusServer;
use crate::modules::transcode::cleanup::{Cleanup, TransferArtifact};
use crate::modules::transcode::command::{TranscodeCommand, TranscoderLauncher};
use crate::modules::transcode::drain::{DiagnosticSink, PRIMARY_CHUNK_SIZE, StreamDrainer};
use crate::modules::transcode::error::MediaError;
use crate::modules::transcode::model::{JobOutcome, JobPhase, TranscodeJob};
use crate::modules::transcode::probe::MediaProber;
use crate::modules::transcode::progress::ProgressState;

/// Runs one job from download to teardown.
pub struct JobOrchestrator {
    store: Arc<dyn ObjectStore>,
    cleanup: Cleanup,
    records: Arc<dyn JobRecordStore>,
    prober: Arc<dyn MediaProber>,
    launcher: Arc<dyn TranscoderLauncher>,
    progress: ProgressState,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        records: Arc<dyn JobRecordStore>,
        prober: Arc<dyn MediaProber>,
        launcher: Arc<dyn TranscoderLauncher>,
        progress: ProgressState,
    ) -> Self {
        Self {
            cleanup: Cleanup::new(store.clone()),
            store,
            records,
            prober,
            launcher,
            progress,
            diagnostics: None,
        }
    }

    /// Forward every transcoder diagnostic line to `sink`.
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Runs the job and always tears down afterwards: the job record gets its
    /// terminal status, the remote output is removed on failure, the local
    /// copy and remote input are removed, and `status` is stopped.
    ///
    /// Never returns an error. A panic inside the job becomes `Failed`.
    pub async fn run(&self, job: &TranscodeJob, status: Option<StatusServer>) -> JobOutcome {
        let span = info_span!("job", key = %job.input_key, run_id = %Uuid::new_v4());

        async move {
            info!("🎬 Starting transcode of '{}' to '{}'", job.input_key, job.output_key);

            let artifact = TransferArtifact::new(&job.local_path);
            let tracker = PhaseTracker::default();

            let outcome = match AssertUnwindSafe(self.execute(job, &artifact, &tracker))
                .catch_unwind()
                .await
            {
                Ok(Ok(bytes_written)) => JobOutcome::Complete { bytes_written },
                Ok(Err(e)) => JobOutcome::Failed {
                    phase: tracker.current(),
                    reason: e.to_string(),
                },
                Err(panic) => JobOutcome::Failed {
                    phase: tracker.current(),
                    reason: format!("panicked: {}", panic_reason(&*panic)),
                },
            };

            match &outcome {
                JobOutcome::Complete { bytes_written } => {
                    info!(
                        "✅ Job complete, {} bytes written to '{}'",
                        bytes_written, job.output_key
                    )
                }
                JobOutcome::Failed { phase, reason } => {
                    error!("❌ Job failed while {}: {}", phase, reason)
                }
            }

            self.teardown(job, &artifact, &outcome, status).await;
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        job: &TranscodeJob,
        artifact: &TransferArtifact,
        tracker: &PhaseTracker,
    ) -> JobResult<u64> {
        tracker.enter(JobPhase::Fetching);
        let fetched = self.fetch(job, artifact).await?;
        info!("⬇️ Downloaded {} bytes to {}", fetched, artifact.path().display());

        tracker.enter(JobPhase::Probing);
        self.probe(artifact).await;

        tracker.enter(JobPhase::Transcoding);
        let mut command = TranscodeCommand::new(artifact.path(), &job.output_format)
            .video_codec(&job.video_codec)
            .audio_codec(&job.audio_codec);
        if needs_fragmented_output(&job.output_format) {
            command = command
                .output_arg("-movflags")
                .output_arg("frag_keyframe+empty_moov");
        }

        let sink = self
            .store
            .open_sink(&job.output_bucket, &job.output_key, &job.content_type())
            .await?;

        let mut child = self.launcher.spawn(&command)?;
        let stdout = child
            .stdout
            .take()
            .ok_or(MediaError::StreamNotCaptured("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(MediaError::StreamNotCaptured("stderr"))?;

        let drainer = StreamDrainer::spawn(
            stdout,
            stderr,
            sink,
            self.progress.clone(),
            self.diagnostics.clone(),
        );
        let (exit, report) = tokio::join!(child.wait(), drainer.join());

        tracker.enter(JobPhase::Finalizing);
        let exit = exit?;
        info!(
            bytes_read = report.primary.bytes_read,
            bytes_published = report.primary.bytes_published,
            diagnostic_lines = report.diagnostic.lines,
            progress_updates = report.diagnostic.progress_updates,
            "Transcoder finished with {}",
            exit
        );

        if !exit.success() {
            return Err(JobError::TranscoderExit(exit));
        }
        if !report.primary.is_clean() {
            let primary = report.primary;
            let reason = primary.sink_error.or(primary.read_error).unwrap_or_default();
            return Err(JobError::OutputUndelivered(reason));
        }

        Ok(report.primary.bytes_published)
    }

    async fn fetch(&self, job: &TranscodeJob, artifact: &TransferArtifact) -> JobResult<u64> {
        let mut reader = self.store.fetch(&job.input_bucket, &job.input_key).await?;

        if let Some(parent) = artifact.path().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::File::create(artifact.path()).await?;

        let mut buf = vec![0u8; PRIMARY_CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await?;
            total += n as u64;
        }
        file.flush().await?;

        Ok(total)
    }

    /// Publishes the total frame count. Probe trouble is not fatal.
    async fn probe(&self, artifact: &TransferArtifact) {
        let total = match self.prober.probe(artifact.path()).await {
            Ok(output) => output.total_frames(),
            Err(e) => {
                if let MediaError::ProbeFailed {
                    stderr: Some(stderr),
                    ..
                } = &e
                {
                    warn!(target: "transcoder", "ffprobe stderr: {}", stderr.trim());
                }
                warn!("Probe failed, assuming a single frame: {}", e);
                1
            }
        };

        match self.progress.set_total_frames(total) {
            Ok(()) => info!("🎞️ Total frames: {}", self.progress.total_frames()),
            Err(existing) => warn!("Total frames already set to {}, ignoring {}", existing, total),
        }
    }

    async fn teardown(
        &self,
        job: &TranscodeJob,
        artifact: &TransferArtifact,
        outcome: &JobOutcome,
        status: Option<StatusServer>,
    ) {
        let job_status = outcome.status();
        match self.records.set_status(&job.input_key, job_status).await {
            Ok(()) => info!("Job record '{}' set to {}", job.input_key, job_status),
            Err(e) => error!("Failed to write job record '{}': {}", job.input_key, e),
        }

        if !outcome.is_complete() {
            self.cleanup
                .remove_remote(&job.output_bucket, &job.output_key)
                .await;
        }

        artifact.remove().await;
        self.cleanup
            .remove_remote(&job.input_bucket, &job.input_key)
            .await;

        if let Some(server) = status {
            server.shutdown().await;
        }
    }
}

/// Formats that need fragmenting to be written to a non-seekable pipe.
fn needs_fragmented_output(format: &str) -> bool {
    matches!(format, "mp4" | "mov" | "ipod" | "ismv")
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Last phase entered, for attributing failures and panics.
struct PhaseTracker(Mutex<JobPhase>);

impl Default for PhaseTracker {
    fn default() -> Self {
        Self(Mutex::new(JobPhase::Fetching))
    }
}

impl PhaseTracker {
    fn enter(&self, phase: JobPhase) {
        info!("Entering {} phase", phase);
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    fn current(&self) -> JobPhase {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}
