//! In-memory stand-ins for the worker's external systems.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::{Child, Command};

use transcode_worker::infrastructure::db::job_record::{JobRecordStore, RecordError};
use transcode_worker::infrastructure::storage::{
    DeleteOutcome, ObjectReader, ObjectStore, OutputSink, StorageError, StorageResult,
};
use transcode_worker::modules::transcode::command::{TranscodeCommand, TranscoderLauncher};
use transcode_worker::modules::transcode::error::{MediaError, MediaResult};
use transcode_worker::modules::transcode::model::{JobStatus, TranscodeJob};
use transcode_worker::modules::transcode::probe::{MediaProber, ProbeOutput, ProbeStream};

type ObjectId = (String, String);

fn id(bucket: &str, key: &str) -> ObjectId {
    (bucket.to_string(), key.to_string())
}

#[derive(Default)]
struct Objects {
    objects: HashMap<ObjectId, Vec<u8>>,
    deletes: Vec<ObjectId>,
    content_types: HashMap<ObjectId, String>,
}

/// Buckets held in memory. Clones share the same objects.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<Mutex<Objects>>,
    reject_uploads: bool,
    reject_deletes: bool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every append to an output sink fails.
    pub fn rejecting_uploads() -> Self {
        Self {
            reject_uploads: true,
            ..Self::default()
        }
    }

    /// Every delete request errors, as if the bucket were unreachable.
    pub fn rejecting_deletes() -> Self {
        Self {
            reject_deletes: true,
            ..Self::default()
        }
    }

    pub fn put(&self, bucket: &str, key: &str, data: &[u8]) {
        self.inner.lock().unwrap().objects.insert(id(bucket, key), data.to_vec());
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().objects.get(&id(bucket, key)).cloned()
    }

    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.inner.lock().unwrap().content_types.get(&id(bucket, key)).cloned()
    }

    pub fn was_deleted(&self, bucket: &str, key: &str) -> bool {
        self.inner.lock().unwrap().deletes.contains(&id(bucket, key))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader> {
        let data = self
            .get(bucket, key)
            .ok_or_else(|| StorageError::not_found(bucket, key))?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    async fn open_sink(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<Box<dyn OutputSink>> {
        Ok(Box::new(MemorySink {
            store: self.inner.clone(),
            target: id(bucket, key),
            content_type: content_type.to_string(),
            buf: Vec::new(),
            reject: self.reject_uploads,
        }))
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<DeleteOutcome> {
        let mut inner = self.inner.lock().unwrap();
        inner.deletes.push(id(bucket, key));
        if self.reject_deletes {
            return Err(StorageError::delete_failed("connection reset by peer"));
        }
        Ok(match inner.objects.remove(&id(bucket, key)) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }
}

struct MemorySink {
    store: Arc<Mutex<Objects>>,
    target: ObjectId,
    content_type: String,
    buf: Vec<u8>,
    reject: bool,
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn append(&mut self, chunk: Bytes) -> StorageResult<()> {
        if self.reject {
            return Err(StorageError::upload_failed("bucket is read-only"));
        }
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }

    async fn close(self: Box<Self>) -> StorageResult<u64> {
        if self.reject {
            return Err(StorageError::SinkPoisoned);
        }
        let len = self.buf.len() as u64;
        let mut inner = self.store.lock().unwrap();
        inner
            .content_types
            .insert(self.target.clone(), self.content_type.clone());
        inner.objects.insert(self.target.clone(), self.buf);
        Ok(len)
    }
}

/// Records every status write.
#[derive(Clone, Default)]
pub struct MemoryJobRecords {
    writes: Arc<Mutex<Vec<(String, JobStatus)>>>,
    unavailable: bool,
}

impl MemoryJobRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write fails, as if the database were down.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<(String, JobStatus)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobRecordStore for MemoryJobRecords {
    async fn set_status(&self, key: &str, status: JobStatus) -> Result<(), RecordError> {
        if self.unavailable {
            return Err(RecordError::NotUpdated(key.to_string()));
        }
        self.writes.lock().unwrap().push((key.to_string(), status));
        Ok(())
    }
}

/// Reports a fixed set of streams without looking at the file.
pub enum FakeProber {
    Streams(Vec<ProbeStream>),
    Fails,
    Panics,
}

impl FakeProber {
    pub fn video_frames(frames: &str) -> Self {
        Self::Streams(vec![video_stream(Some(frames))])
    }
}

pub fn video_stream(nb_frames: Option<&str>) -> ProbeStream {
    ProbeStream {
        codec_type: Some("video".to_string()),
        nb_frames: nb_frames.map(str::to_string),
        ..ProbeStream::default()
    }
}

pub fn audio_stream(nb_frames: Option<&str>) -> ProbeStream {
    ProbeStream {
        codec_type: Some("audio".to_string()),
        nb_frames: nb_frames.map(str::to_string),
        ..ProbeStream::default()
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, path: &Path) -> MediaResult<ProbeOutput> {
        match self {
            FakeProber::Streams(streams) => Ok(ProbeOutput {
                format: None,
                streams: streams.clone(),
            }),
            FakeProber::Fails => Err(MediaError::ProbeFailed {
                message: format!("cannot read {}", path.display()),
                stderr: Some("moov atom not found\n".to_string()),
            }),
            FakeProber::Panics => panic!("probe exploded"),
        }
    }
}

/// Runs a shell script in place of ffmpeg and remembers the arguments it
/// was asked to run with.
pub struct ScriptLauncher {
    script: String,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptLauncher {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl TranscoderLauncher for ScriptLauncher {
    fn spawn(&self, command: &TranscodeCommand) -> MediaResult<Child> {
        self.calls.lock().unwrap().push(command.build_args());
        Command::new("sh")
            .arg("-c")
            .arg(&self.script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MediaError::SpawnFailed {
                program: "sh".to_string(),
                source,
            })
    }
}

pub fn job(work_dir: &Path) -> TranscodeJob {
    TranscodeJob {
        input_bucket: "uploads".to_string(),
        output_bucket: "encoded".to_string(),
        input_key: "clip.mkv".to_string(),
        output_key: "clip.mp4".to_string(),
        local_path: work_dir.join("clip.mkv"),
        output_format: "mp4".to_string(),
        output_ext: Some("mp4".to_string()),
        video_codec: "libx264".to_string(),
        audio_codec: "aac".to_string(),
    }
}
