//! Object storage: the S3 client and the `ObjectStore` seam built on top of it.

// Declare the modules that make up this crate.
pub mod error;
pub mod object_store;
pub mod s3;

// Re-export the core types to provide a clean public API.
pub use error::StorageError;
pub use object_store::{ListPageRequest, ObjectPage, ObjectStore, StoredObject};
pub use s3::S3;
