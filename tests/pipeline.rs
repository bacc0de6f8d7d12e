//! End-to-end runs of the orchestrator with `sh` standing in for ffmpeg.

#![cfg(unix)]

mod common;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use common::{
    FakeProber, MemoryJobRecords, MemoryObjectStore, ScriptLauncher, audio_stream, job,
    video_stream,
};
use transcode_worker::modules::status::server::StatusServer;
use transcode_worker::modules::transcode::command::FfmpegLauncher;
use transcode_worker::modules::transcode::model::{JobOutcome, JobPhase, JobStatus};
use transcode_worker::modules::transcode::probe::MediaProber;
use transcode_worker::modules::transcode::progress::ProgressState;
use transcode_worker::workers::transcoder::JobOrchestrator;

const SOURCE: &[u8] = b"matroska source bytes";

struct Harness {
    store: MemoryObjectStore,
    records: MemoryJobRecords,
    launcher: Arc<ScriptLauncher>,
    progress: ProgressState,
    orchestrator: JobOrchestrator,
}

fn harness(store: MemoryObjectStore, prober: impl MediaProber + 'static, script: &str) -> Harness {
    harness_with_records(store, MemoryJobRecords::new(), prober, script)
}

fn harness_with_records(
    store: MemoryObjectStore,
    records: MemoryJobRecords,
    prober: impl MediaProber + 'static,
    script: &str,
) -> Harness {
    let launcher = Arc::new(ScriptLauncher::new(script));
    let progress = ProgressState::new();
    let orchestrator = JobOrchestrator::new(
        Arc::new(store.clone()),
        Arc::new(records.clone()),
        Arc::new(prober),
        launcher.clone(),
        progress.clone(),
    );
    Harness {
        store,
        records,
        launcher,
        progress,
        orchestrator,
    }
}

fn store_with_source() -> MemoryObjectStore {
    let store = MemoryObjectStore::new();
    store.put("uploads", "clip.mkv", SOURCE);
    store
}

#[tokio::test]
async fn successful_transcode_publishes_output_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let h = harness(
        store_with_source(),
        FakeProber::video_frames("240"),
        r#"printf 'frame=   12 fps=6.0 q=28.0 size=       1kB\r' >&2
head -c 50000 /dev/zero
printf 'frame=  240 fps=30 q=-1.0 Lsize=     49kB\n' >&2"#,
    );

    let outcome = h.orchestrator.run(&job, None).await;

    assert_eq!(outcome, JobOutcome::Complete { bytes_written: 50_000 });
    assert_eq!(h.records.writes(), vec![("clip.mkv".to_string(), JobStatus::Complete)]);
    assert_eq!(h.store.get("encoded", "clip.mp4").map(|o| o.len()), Some(50_000));
    assert_eq!(h.store.content_type("encoded", "clip.mp4").as_deref(), Some("video/mp4"));
    assert_eq!(h.store.get("uploads", "clip.mkv"), None);
    assert!(!job.local_path.exists());

    let snapshot = h.progress.read();
    assert_eq!(snapshot.frames_processed, 240);
    assert_eq!(snapshot.total_frames, 240);
    assert_eq!(snapshot.instantaneous_rate, 30);
}

#[tokio::test]
async fn transcoder_receives_the_configured_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let h = harness(store_with_source(), FakeProber::video_frames("10"), "true");

    h.orchestrator.run(&job, None).await;

    let calls = h.launcher.calls();
    assert_eq!(calls.len(), 1);
    let args = &calls[0];
    assert_eq!(args[..4], ["-hide_banner", "-nostdin", "-i", job.local_path.to_str().unwrap()]);
    assert!(args.windows(2).any(|w| w == ["-f", "mp4"]));
    assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
    assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
    assert!(args.windows(2).any(|w| w == ["-movflags", "frag_keyframe+empty_moov"]));
    assert!(args.contains(&"-sn".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
}

#[tokio::test]
async fn non_zero_exit_fails_the_job_and_removes_everything() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let h = harness(
        store_with_source(),
        FakeProber::video_frames("240"),
        "head -c 1000 /dev/zero; echo 'Conversion failed!' >&2; exit 17",
    );

    let outcome = h.orchestrator.run(&job, None).await;

    match &outcome {
        JobOutcome::Failed { phase, reason } => {
            assert_eq!(*phase, JobPhase::Finalizing);
            assert!(reason.contains("17"), "reason: {}", reason);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(h.records.writes(), vec![("clip.mkv".to_string(), JobStatus::Failed)]);
    assert!(h.store.was_deleted("encoded", "clip.mp4"));
    assert_eq!(h.store.get("encoded", "clip.mp4"), None);
    assert_eq!(h.store.get("uploads", "clip.mkv"), None);
    assert!(!job.local_path.exists());
}

#[tokio::test]
async fn failing_remote_deletes_do_not_disturb_a_failed_job() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let store = MemoryObjectStore::rejecting_deletes();
    store.put("uploads", "clip.mkv", SOURCE);
    let h = harness(store, FakeProber::video_frames("240"), "head -c 1000 /dev/zero; exit 17");

    let outcome = h.orchestrator.run(&job, None).await;

    assert!(matches!(outcome, JobOutcome::Failed { phase: JobPhase::Finalizing, .. }));
    assert_eq!(h.records.writes(), vec![("clip.mkv".to_string(), JobStatus::Failed)]);
    assert!(h.store.was_deleted("encoded", "clip.mp4"));
    assert!(h.store.was_deleted("uploads", "clip.mkv"));
    assert!(!job.local_path.exists());
}

#[tokio::test]
async fn missing_frame_counts_fall_back_to_one() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let prober = FakeProber::Streams(vec![audio_stream(Some("900")), video_stream(Some("N/A"))]);
    let h = harness(store_with_source(), prober, "head -c 64 /dev/zero");

    let outcome = h.orchestrator.run(&job, None).await;

    assert!(outcome.is_complete());
    assert_eq!(h.progress.total_frames(), 1);
}

#[tokio::test]
async fn probe_failure_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let h = harness(store_with_source(), FakeProber::Fails, "head -c 64 /dev/zero");

    let outcome = h.orchestrator.run(&job, None).await;

    assert_eq!(outcome, JobOutcome::Complete { bytes_written: 64 });
    assert_eq!(h.progress.total_frames(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_before_any_progress_reports_probed_total() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let h = harness(
        store_with_source(),
        FakeProber::video_frames("300"),
        "sleep 1; printf 'frame=  300 fps=25 q=-1.0\n' >&2; head -c 10 /dev/zero",
    );

    let server = StatusServer::start(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)), h.progress.clone())
        .await
        .unwrap();
    let addr = server.local_addr();

    let poll = async {
        let client = reqwest::Client::new();
        for _ in 0..50 {
            let body: Value = client
                .post(format!("http://{}/", addr))
                .json(&json!({"jsonrpc": "2.0", "method": "get_status", "id": 1}))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if body["result"]["totalFrames"] == 300 {
                return body["result"].clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("total frames never published");
    };

    let (outcome, early) = tokio::join!(h.orchestrator.run(&job, Some(server)), poll);

    assert_eq!(early, json!({"framesProcessed": 0, "totalFrames": 300}));
    assert!(outcome.is_complete());
    assert_eq!(h.progress.read().frames_processed, 300);

    // Teardown stops the status service.
    let after = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .json(&json!({"jsonrpc": "2.0", "method": "get_status", "id": 2}))
        .send()
        .await;
    assert!(after.is_err());
}

#[tokio::test]
async fn missing_input_fails_before_transcoding() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let h = harness(MemoryObjectStore::new(), FakeProber::video_frames("10"), "true");

    let outcome = h.orchestrator.run(&job, None).await;

    assert!(matches!(outcome, JobOutcome::Failed { phase: JobPhase::Fetching, .. }));
    assert!(h.launcher.calls().is_empty());
    assert_eq!(h.records.writes(), vec![("clip.mkv".to_string(), JobStatus::Failed)]);
    assert!(h.store.was_deleted("encoded", "clip.mp4"));
    assert!(h.store.was_deleted("uploads", "clip.mkv"));
    assert!(!job.local_path.exists());
}

#[tokio::test]
async fn rejected_upload_fails_the_job_without_stalling_the_transcoder() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let store = MemoryObjectStore::rejecting_uploads();
    store.put("uploads", "clip.mkv", SOURCE);
    // Far more than a pipe buffer, so an undrained stdout would block forever.
    let h = harness(store, FakeProber::video_frames("10"), "head -c 1000000 /dev/zero");

    let outcome = tokio::time::timeout(Duration::from_secs(30), h.orchestrator.run(&job, None))
        .await
        .expect("job stalled");

    assert!(matches!(outcome, JobOutcome::Failed { phase: JobPhase::Finalizing, .. }));
    assert_eq!(h.store.get("encoded", "clip.mp4"), None);
    assert_eq!(h.records.writes(), vec![("clip.mkv".to_string(), JobStatus::Failed)]);
}

#[tokio::test]
async fn transcoder_that_cannot_start_fails_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let store = store_with_source();
    let records = MemoryJobRecords::new();
    let orchestrator = JobOrchestrator::new(
        Arc::new(store.clone()),
        Arc::new(records.clone()),
        Arc::new(FakeProber::video_frames("10")),
        Arc::new(FfmpegLauncher::new(Some(dir.path().join("no-such-ffmpeg")))),
        ProgressState::new(),
    );

    let outcome = orchestrator.run(&job, None).await;

    assert!(matches!(outcome, JobOutcome::Failed { phase: JobPhase::Transcoding, .. }));
    assert_eq!(records.writes(), vec![("clip.mkv".to_string(), JobStatus::Failed)]);
    assert_eq!(store.get("uploads", "clip.mkv"), None);
    assert!(!job.local_path.exists());
}

#[tokio::test]
async fn panic_inside_the_job_is_a_failure_and_still_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let h = harness(store_with_source(), FakeProber::Panics, "true");

    let outcome = h.orchestrator.run(&job, None).await;

    match &outcome {
        JobOutcome::Failed { phase, reason } => {
            assert_eq!(*phase, JobPhase::Probing);
            assert!(reason.contains("probe exploded"), "reason: {}", reason);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(h.launcher.calls().is_empty());
    assert_eq!(h.records.writes(), vec![("clip.mkv".to_string(), JobStatus::Failed)]);
    assert_eq!(h.store.get("uploads", "clip.mkv"), None);
    assert!(!job.local_path.exists());
}

#[tokio::test]
async fn record_store_outage_does_not_change_the_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path());
    let h = harness_with_records(
        store_with_source(),
        MemoryJobRecords::unavailable(),
        FakeProber::video_frames("10"),
        "head -c 128 /dev/zero",
    );

    let outcome = h.orchestrator.run(&job, None).await;

    assert_eq!(outcome, JobOutcome::Complete { bytes_written: 128 });
    assert_eq!(h.store.get("encoded", "clip.mp4").map(|o| o.len()), Some(128));
}
