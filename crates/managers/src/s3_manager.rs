use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use configuration::S3ManagerConfig;
use core_types::{ContextResult, ErrorContext, WrapErr, first_non_empty};
use storage::{ListPageRequest, ObjectStore, StorageError, StoredObject};

/// Arguments of [`S3Manager::list_objects`]. Empty fields fall back to `s3_manager` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsInput {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub max_keys: Option<i32>,
}

/// Manages files in an S3-compatible object store.
pub struct S3Manager {
    store: Arc<dyn ObjectStore>,
    config: S3ManagerConfig,
    ctx: ErrorContext,
}

impl S3Manager {
    /// Creates the manager after proving the store answers a bucket listing.
    pub async fn new(
        store: Arc<dyn ObjectStore>,
        config: S3ManagerConfig,
        ctx: &ErrorContext,
    ) -> ContextResult<Self> {
        let ew = ErrorContext::function("NewS3Manager");

        let manager = Self {
            store,
            config,
            ctx: ctx.append("S3Manager"),
        };

        let buckets = manager
            .bounded(manager.store.list_buckets())
            .await
            .wrap_err(&ew)?;
        tracing::info!(buckets = buckets.len(), "Object storage reachable");

        Ok(manager)
    }

    async fn bounded<T>(&self, fut: impl Future<Output = ContextResult<T>>) -> ContextResult<T> {
        let timeout = self.config.timeout();
        tokio::time::timeout(timeout, fut)
            .await
            .unwrap_or_else(|_| Err(self.timed_out(timeout)))
    }

    fn timed_out(&self, timeout: Duration) -> core_types::ContextError {
        self.ctx.method("Request").wrap(StorageError::Timeout(timeout))
    }

    /// Lists every object under `prefix`, following continuation tokens.
    ///
    /// Each page is bounded by `s3_manager.timeout`. A failed page discards the pages read so far.
    pub async fn list_objects(&self, input: ListObjectsInput) -> ContextResult<Vec<StoredObject>> {
        let ew = self.ctx.method("ListObjects");

        let bucket = first_non_empty(input.bucket.unwrap_or_default(), self.config.bucket.clone());
        let max_keys = first_non_empty(input.max_keys.unwrap_or_default(), self.config.max_keys);
        let prefix = input.prefix.filter(|p| !p.is_empty());

        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let request = ListPageRequest {
                bucket: bucket.clone(),
                prefix: prefix.clone(),
                max_keys,
                continuation_token: continuation_token.take(),
            };
            let page = self
                .bounded(self.store.list_objects_page(request))
                .await
                .wrap_err(&ew)?;

            objects.extend(page.objects);

            match page.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(bucket = %bucket, count = objects.len(), "Objects listed");
        Ok(objects)
    }
}
