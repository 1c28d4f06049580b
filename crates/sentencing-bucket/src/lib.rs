//! Read access to the object storage bucket that receives sentencing exports.
//!
//! Google Cloud Storage is reached through its S3-interoperable XML API, so
//! the AWS S3 SDK pointed at `https://storage.googleapis.com` with HMAC keys
//! is all that is needed.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use parking_lot::RwLock;
use thiserror::Error;

pub const GCS_INTEROP_ENDPOINT: &str = "https://storage.googleapis.com";

#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            endpoint: Some(GCS_INTEROP_ENDPOINT.to_string()),
            region: "auto".to_string(),
            access_key_id: None,
            secret_access_key: None,
            force_path_style: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("sdk error: {0}")]
    Sdk(String),
    #[error("object not found: {0}")]
    NotFound(String),
}

impl BucketError {
    fn from_sdk(err: impl fmt::Display) -> Self {
        Self::Sdk(err.to_string())
    }
}

#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Reads a whole object into memory.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BucketError>;
}

#[derive(Clone)]
pub struct S3BucketStore {
    client: Client,
}

impl S3BucketStore {
    pub async fn new(config: BucketConfig) -> Result<Self, BucketError> {
        if config.region.is_empty() {
            return Err(BucketError::Configuration(
                "bucket region cannot be empty".into(),
            ));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = Credentials::new(access_key, secret_key, None, None, "static");
                loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
            }
            (None, None) => {}
            _ => {
                return Err(BucketError::Configuration(
                    "access key and secret key must be set together".into(),
                ));
            }
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        Ok(Self { client })
    }

    /// Writes an object; used to stage fixtures against a live bucket.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BucketError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(BucketError::from_sdk)?;
        Ok(())
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BucketError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(BucketError::from_sdk)?;
        Ok(())
    }
}

#[async_trait]
impl BucketStore for S3BucketStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BucketError> {
        tracing::debug!(bucket, key, "fetching object");
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err {
                SdkError::ServiceError(service_err) => {
                    let message = service_err.err().to_string();
                    if service_err.err().is_no_such_key() || message.contains("NoSuchKey") {
                        BucketError::NotFound(format!("{bucket}/{key}"))
                    } else {
                        BucketError::from_sdk(message)
                    }
                }
                other => BucketError::from_sdk(other),
            })?;

        let data = output.body.collect().await.map_err(BucketError::from_sdk)?;
        Ok(data.into_bytes())
    }
}

/// Bucket contents held in memory, keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct MemoryBucketStore {
    objects: RwLock<HashMap<(String, String), Bytes>>,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, bytes: impl Into<Bytes>) {
        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), bytes.into());
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BucketError> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| BucketError::NotFound(format!("{bucket}/{key}")))
    }
}
