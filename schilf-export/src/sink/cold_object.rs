use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use schilf_core::{SensorReading, SinkError};
use tracing::{debug, info, warn};

use super::{encode_ndjson, NamingPattern, Sink};

/// Settings for an S3-compatible object store (AWS, IBM COS, MinIO, ...).
#[derive(Debug, Clone)]
pub struct ColdObjectConfig {
    /// Custom endpoint URL; `None` uses the provider default for `region`
    pub endpoint: Option<String>,
    pub region: String,
    /// Static credentials; when absent the default AWS provider chain is used
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: String,
    /// Location constraint applied when the bucket has to be created
    pub location_constraint: Option<String>,
    pub naming: NamingPattern,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`
    pub force_path_style: bool,
}

// ColdObjectStoreSink stores one object per partition key in a single bucket:
// bucket/
//     dayOfYear=60.json
//     dayOfYear=61.json
//
// An existing object means the partition was exported before.
#[derive(Debug, Clone)]
pub struct ColdObjectStoreSink {
    client: Client,
    bucket: String,
    naming: NamingPattern,
}

impl ColdObjectStoreSink {
    /// Build the client and make sure the bucket exists.
    ///
    /// A missing bucket is created with the configured location constraint. Any
    /// other failure is returned as [`SinkError::Bootstrap`]; there is no sensible
    /// way to keep running without a bucket.
    pub async fn connect(cfg: ColdObjectConfig) -> Result<Self, SinkError> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));
        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key), Some(secret_key)) = (&cfg.access_key, &cfg.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "schilf-config",
            ));
        }
        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(cfg.force_path_style)
            .build();

        let sink = Self {
            client: Client::from_conf(s3_config),
            bucket: cfg.bucket,
            naming: cfg.naming,
        };
        sink.ensure_bucket(cfg.location_constraint.as_deref()).await?;
        Ok(sink)
    }

    async fn ensure_bucket(&self, location_constraint: Option<&str>) -> Result<(), SinkError> {
        let err = match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!(target: "sink", bucket = %self.bucket, "bucket exists");
                return Ok(());
            }
            Err(err) => err,
        };

        let missing = err.as_service_error().is_some_and(|e| e.is_not_found())
            || http_status(&err) == Some(404);
        if !missing {
            warn!(target: "sink", bucket = %self.bucket, "could not check bucket state");
            return Err(SinkError::Bootstrap(format!(
                "head bucket {}: {}",
                self.bucket,
                DisplayErrorContext(&err)
            )));
        }

        info!(target: "sink", bucket = %self.bucket, "bucket does not exist, creating it");
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if let Some(constraint) = location_constraint {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(constraint))
                    .build(),
            );
        }
        request.send().await.map_err(|e| {
            warn!(target: "sink", bucket = %self.bucket, "failed to create bucket");
            SinkError::Bootstrap(format!(
                "create bucket {}: {}",
                self.bucket,
                DisplayErrorContext(&e)
            ))
        })?;
        info!(target: "sink", bucket = %self.bucket, "bucket has been created");
        Ok(())
    }
}

fn http_status<E>(err: &SdkError<E>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

#[async_trait]
impl Sink for ColdObjectStoreSink {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn has(&self, key: i64) -> Result<bool, SinkError> {
        let name = self.naming.name_for(key);
        debug!(target: "sink", sink = "s3", object = %name, "checking for prior export");
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err)
                if err.as_service_error().is_some_and(|e| e.is_not_found())
                    || http_status(&err) == Some(404) =>
            {
                Ok(false)
            }
            Err(err) => Err(SinkError::ObjectStore {
                op: "head_object",
                name,
                reason: DisplayErrorContext(&err).to_string(),
            }),
        }
    }

    async fn export(&self, key: i64, readings: &[SensorReading]) -> Result<(), SinkError> {
        let name = self.naming.name_for(key);
        let body = encode_ndjson(readings)?;
        let size = body.len();
        debug!(target: "sink", sink = "s3", object = %name, size, "uploading partition");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&name)
            .content_type("application/x-ndjson")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| SinkError::ObjectStore {
                op: "put_object",
                name: name.clone(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        info!(
            target: "sink",
            sink = "s3",
            key,
            object = %name,
            readings = readings.len(),
            size,
            "exported partition"
        );
        Ok(())
    }
}
