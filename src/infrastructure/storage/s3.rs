use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info};

use super::{DeleteOutcome, ObjectReader, ObjectStore, OutputSink, StorageError, StorageResult};
use crate::common::upload::MultipartUploader;

/// S3-compatible storage client. Buckets are passed per call since a job
/// reads from one bucket and writes to another.
#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
}

fn sdk_message<E: std::error::Error>(err: &E) -> String {
    DisplayErrorContext(err).to_string()
}

fn looks_missing(message: &str) -> bool {
    message.contains("NoSuchKey") || message.contains("NotFound") || message.contains("404")
}

impl StorageService {
    pub async fn new(
        endpoint: Option<&str>,
        region: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials);

        if let Some(endpoint) = endpoint {
            // Path-style addressing for MinIO and other self-hosted endpoints
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        info!(endpoint = endpoint.unwrap_or("aws"), region, "✅ S3 client ready");

        Self { client }
    }

    pub async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let result = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(sdk_message(&e)))?;

        result
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| StorageError::upload_failed("S3 returned no upload id"))
    }

    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<CompletedPart> {
        let result = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(sdk_message(&e)))?;

        let e_tag = result.e_tag().ok_or_else(|| {
            StorageError::upload_failed(format!("part {} has no ETag", part_number))
        })?;

        Ok(CompletedPart::builder()
            .e_tag(e_tag)
            .part_number(part_number)
            .build())
    }

    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> StorageResult<()> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(sdk_message(&e)))?;

        Ok(())
    }

    pub async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(sdk_message(&e)))?;

        Ok(())
    }

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Bytes,
    ) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(sdk_message(&e)))?;

        Ok(())
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    async fn fetch(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader> {
        debug!(bucket, key, "Fetching object");

        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    StorageError::not_found(bucket, key)
                } else {
                    StorageError::download_failed(sdk_message(&e))
                }
            })?;

        Ok(Box::pin(resp.body.into_async_read()))
    }

    async fn open_sink(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<Box<dyn OutputSink>> {
        Ok(Box::new(MultipartUploader::new(
            self.clone(),
            bucket,
            key,
            content_type,
        )))
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<DeleteOutcome> {
        debug!(bucket, key, "Deleting object");

        match self
            .client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(e) => {
                let message = sdk_message(&e);
                if looks_missing(&message) {
                    Ok(DeleteOutcome::NotFound)
                } else {
                    Err(StorageError::delete_failed(message))
                }
            }
        }
    }
}
