use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::ContextResult;

/// One object of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub storage_class: Option<String>,
    pub e_tag: Option<String>,
}

/// Arguments of a single `ListObjectsV2` round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPageRequest {
    pub bucket: String,
    pub prefix: Option<String>,
    pub max_keys: i32,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub objects: Vec<StoredObject>,
    /// Set only when the listing was truncated.
    pub next_continuation_token: Option<String>,
}

/// The object storage operations the managers rely on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_buckets(&self) -> ContextResult<Vec<String>>;

    async fn list_objects_page(&self, request: ListPageRequest) -> ContextResult<ObjectPage>;
}
