use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;

use crate::config::AppConfig;

/// Object storage as the pipeline sees it: raw-byte upload plus two ways to
/// get an access URL. Trait seam so the pipeline is testable without S3.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
    async fn create_signed_url(&self, path: &str, ttl_secs: u64) -> Result<String>;
    fn public_url(&self, path: &str) -> String;
}

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
}

impl S3Store {
    pub async fn new(config: &AppConfig) -> Self {
        let credentials = Credentials::new(
            config.aws_access_key_id.clone(),
            config.aws_secret_access_key.clone(),
            None,
            None,
            "ledgerline",
        );
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        S3Store {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: config.attachment_bucket.clone(),
            region: config.aws_region.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("S3 upload failed for {path}"))?;

        Ok(())
    }

    async fn create_signed_url(&self, path: &str, ttl_secs: u64) -> Result<String> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(ttl_secs))
            .context("invalid presigning TTL")?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .presigned(presigning)
            .await
            .with_context(|| format!("S3 presign failed for {path}"))?;

        Ok(presigned.uri().to_string())
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://{}.s3.{}.amazonaws.com/{}", self.bucket, self.region, path)
    }
}
