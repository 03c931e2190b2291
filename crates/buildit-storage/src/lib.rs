//! Object log sink (C3): a MinIO-compatible S3 bucket that containers'
//! stdout/stderr logs are uploaded to after a job finishes.
//!
//! Grounded on the original implementation's `backend/storage` package
//! (`Init`/`CreateBucket`/`UploadLogsToMinIO`), rebuilt on `aws-sdk-s3`
//! pointed at a MinIO endpoint rather than the `minio-go` SDK — the same
//! substitution the example manifests make when talking to MinIO from
//! Rust.

pub mod error;

use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

pub use error::{StorageError, StorageResult};

/// Handle to the configured bucket logs are uploaded into.
pub struct LogSink {
    client: Client,
    bucket: String,
}

impl LogSink {
    /// Build a client pointed at a MinIO endpoint and ensure the
    /// configured bucket exists, creating it if necessary (§4.3: "Init
    /// creates the configured bucket if it does not exist").
    pub async fn init(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> StorageResult<Self> {
        let credentials = Credentials::new(access_key, secret_key, None, None, "buildit-storage");
        let config = aws_sdk_s3::config::Builder::new()
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .force_path_style(true)
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .build();
        let client = Client::from_conf(config);

        let sink = Self {
            client,
            bucket: bucket.to_string(),
        };
        sink.ensure_bucket().await?;
        Ok(sink)
    }

    async fn ensure_bucket(&self) -> StorageResult<()> {
        let exists = self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok();
        if exists {
            tracing::info!(bucket = %self.bucket, "bucket already exists");
            return Ok(());
        }

        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                tracing::info!(bucket = %self.bucket, "bucket created");
                Ok(())
            }
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists())
                    .unwrap_or(false)
                {
                    Ok(())
                } else {
                    Err(StorageError::BucketInit {
                        bucket: self.bucket.clone(),
                        source: Box::new(err),
                    })
                }
            }
        }
    }

    /// Upload `bytes` to `object_name` in the configured bucket with
    /// `text/plain` content type. Idempotent under the same object name
    /// (last write wins), matching §4.3.
    pub async fn upload_logs(&self, object_name: &str, bytes: Vec<u8>) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_name)
            .content_type("text/plain")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| StorageError::Upload {
                bucket: self.bucket.clone(),
                object: object_name.to_string(),
                source: Box::new(err),
            })?;
        Ok(())
    }

    /// The object key a container's logs are stored under (§6.5):
    /// `containers/<containerId>`.
    pub fn object_name_for_container(container_id: &str) -> String {
        format!("containers/{container_id}")
    }
}
