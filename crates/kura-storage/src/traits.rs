use async_trait::async_trait;
use kura_common::error::Result;
use kura_common::types::{BucketInfo, ObjectInfo};
use tokio::io::AsyncRead;

/// Byte source handed to and returned from the store. Bodies are always
/// consumed through bounded buffers, never collected into memory.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Inclusive byte span within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    pub start: u64,
    pub end: u64,
}

impl ByteSpan {
    /// Inclusive spans are never empty.
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn make_bucket(&self, bucket: &str) -> Result<()>;
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>>;
    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>>;
    async fn put_object(&self, bucket: &str, key: &str, body: ObjectReader) -> Result<ObjectInfo>;
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo>;
    async fn open_object(
        &self,
        bucket: &str,
        key: &str,
        span: Option<ByteSpan>,
    ) -> Result<ObjectReader>;
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String>;
    async fn upload_part(
        &self,
        bucket: &str,
        upload_id: &str,
        part_number: u32,
        body: ObjectReader,
    ) -> Result<String>;
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        upload_id: &str,
        part_numbers: &[u32],
    ) -> Result<ObjectInfo>;
    async fn abort_multipart_upload(&self, bucket: &str, upload_id: &str) -> Result<()>;
}
