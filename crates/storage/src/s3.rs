use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_runtime::env_config::file::{EnvConfigFileKind, EnvConfigFiles};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use chrono::{DateTime, Utc};
use configuration::S3Config;
use core_types::{ContextResult, ErrorContext, WrapErr};
use tokio::sync::OnceCell;

use crate::error::StorageError;
use crate::object_store::{ListPageRequest, ObjectPage, ObjectStore, StoredObject};

/// Owns the S3 client. The client is built from the shared AWS profile files on first use.
pub struct S3 {
    config: S3Config,
    config_folder: PathBuf,
    ctx: ErrorContext,
    client: OnceCell<Client>,
    closed: AtomicBool,
}

impl S3 {
    /// Stores the settings only. Relative profile paths are resolved against `config_folder`.
    pub fn new(config: S3Config, config_folder: impl AsRef<Path>, ctx: &ErrorContext) -> Self {
        Self {
            config,
            config_folder: config_folder.as_ref().to_path_buf(),
            ctx: ctx.append("S3"),
            client: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &ErrorContext {
        &self.ctx
    }

    fn profile_files(&self) -> Option<EnvConfigFiles> {
        let config_paths = self.config.resolved_config_paths(&self.config_folder);
        let credentials_paths = self.config.resolved_credentials_paths(&self.config_folder);
        if config_paths.is_empty() && credentials_paths.is_empty() {
            return None;
        }

        let mut files = EnvConfigFiles::builder();
        for path in config_paths {
            files = files.with_file(EnvConfigFileKind::Config, path);
        }
        for path in credentials_paths {
            files = files.with_file(EnvConfigFileKind::Credentials, path);
        }
        Some(files.build())
    }

    async fn build_client(&self) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(files) = self.profile_files() {
            loader = loader.profile_files(files);
        }
        if let Some(region) = &self.config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(self.config.force_path_style);
        if let Some(endpoint) = &self.config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        tracing::info!(
            endpoint = self.config.endpoint_url.as_deref().unwrap_or("default"),
            "S3 client created"
        );
        Client::from_conf(builder.build())
    }

    /// Returns the cached client, building it first if needed.
    pub async fn get_client(&self) -> ContextResult<Client> {
        let ew = self.ctx.method("GetClient");

        if self.closed.load(Ordering::Acquire) {
            return Err(ew.wrap(StorageError::Closed));
        }

        let client = self.client.get_or_init(|| self.build_client()).await;
        Ok(client.clone())
    }

    /// Marks the client closed. Pending HTTP connections are dropped with it.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

fn request_error<E>(err: E) -> StorageError
where
    E: std::error::Error,
{
    StorageError::RequestError(DisplayErrorContext(err).to_string())
}

fn to_chrono(value: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3 {
    async fn list_buckets(&self) -> ContextResult<Vec<String>> {
        let ew = self.ctx.method("ListBuckets");
        let client = self.get_client().await.wrap_err(&ew)?;

        let output = client
            .list_buckets()
            .send()
            .await
            .map_err(request_error)
            .wrap_err(&ew)?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn list_objects_page(&self, request: ListPageRequest) -> ContextResult<ObjectPage> {
        let ew = self.ctx.method("ListObjectsPage");

        if request.bucket.is_empty() {
            return Err(ew.wrap(StorageError::ConfigError("bucket name is empty".to_string())));
        }

        let client = self.get_client().await.wrap_err(&ew)?;
        let output = client
            .list_objects_v2()
            .bucket(&request.bucket)
            .max_keys(request.max_keys)
            .set_prefix(request.prefix)
            .set_continuation_token(request.continuation_token)
            .send()
            .await
            .map_err(request_error)
            .wrap_err(&ew)?;

        let objects = output
            .contents()
            .iter()
            .map(|o| StoredObject {
                key: o.key().unwrap_or_default().to_string(),
                size: o.size().unwrap_or_default(),
                last_modified: o.last_modified().and_then(to_chrono),
                storage_class: o.storage_class().map(|c| c.as_str().to_string()),
                e_tag: o.e_tag().map(str::to_string),
            })
            .collect();

        let next_continuation_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_continuation_token,
        })
    }
}
