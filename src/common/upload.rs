use async_trait::async_trait;
use aws_sdk_s3::types::CompletedPart;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::infrastructure::storage::s3::StorageService;
use crate::infrastructure::storage::{OutputSink, StorageError, StorageResult};

// Minimum part size for S3 is 5MB. We use 6MB to be safe.
pub const MIN_PART_SIZE: usize = 6 * 1024 * 1024;

/// Streams an object into S3 as a multipart upload.
///
/// The multipart upload is only created once a full part is buffered, so
/// outputs smaller than one part go out as a single `PutObject` on close.
pub struct MultipartUploader {
    storage: StorageService,
    bucket: String,
    key: String,
    content_type: String,
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
    part_number: i32,
    buffer: Vec<u8>,
    written: u64,
    poisoned: bool,
}

impl MultipartUploader {
    pub fn new(storage: StorageService, bucket: &str, key: &str, content_type: &str) -> Self {
        Self {
            storage,
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            upload_id: None,
            parts: Vec::new(),
            part_number: 1,
            buffer: Vec::with_capacity(MIN_PART_SIZE),
            written: 0,
            poisoned: false,
        }
    }

    async fn flush_part(&mut self) -> StorageResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let upload_id = match &self.upload_id {
            Some(id) => id.clone(),
            None => {
                let id = self
                    .storage
                    .create_multipart_upload(&self.bucket, &self.key, &self.content_type)
                    .await?;
                debug!(key = %self.key, upload_id = %id, "Started multipart upload");
                self.upload_id = Some(id.clone());
                id
            }
        };

        let body = Bytes::from(std::mem::take(&mut self.buffer));
        self.buffer.reserve(MIN_PART_SIZE);

        let part = self
            .storage
            .upload_part(&self.bucket, &self.key, &upload_id, self.part_number, body)
            .await?;

        self.parts.push(part);
        self.part_number += 1;

        Ok(())
    }

    async fn abort(&self) {
        if let Some(upload_id) = &self.upload_id {
            if let Err(e) = self
                .storage
                .abort_multipart_upload(&self.bucket, &self.key, upload_id)
                .await
            {
                warn!(key = %self.key, "Failed to abort multipart upload: {}", e);
            }
        }
    }
}

#[async_trait]
impl OutputSink for MultipartUploader {
    async fn append(&mut self, chunk: Bytes) -> StorageResult<()> {
        if self.poisoned {
            return Err(StorageError::SinkPoisoned);
        }

        self.buffer.extend_from_slice(&chunk);
        self.written += chunk.len() as u64;

        if self.buffer.len() >= MIN_PART_SIZE {
            if let Err(e) = self.flush_part().await {
                self.poisoned = true;
                return Err(e);
            }
        }

        Ok(())
    }

    async fn close(mut self: Box<Self>) -> StorageResult<u64> {
        if self.poisoned {
            self.abort().await;
            return Err(StorageError::SinkPoisoned);
        }

        let Some(upload_id) = self.upload_id.clone() else {
            let body = Bytes::from(std::mem::take(&mut self.buffer));
            self.storage
                .put_object(&self.bucket, &self.key, &self.content_type, body)
                .await?;
            return Ok(self.written);
        };

        let finished = match self.flush_part().await {
            Ok(()) => {
                let parts = std::mem::take(&mut self.parts);
                self.storage
                    .complete_multipart_upload(&self.bucket, &self.key, &upload_id, parts)
                    .await
            }
            Err(e) => Err(e),
        };

        match finished {
            Ok(()) => Ok(self.written),
            Err(e) => {
                self.abort().await;
                Err(e)
            }
        }
    }
}
