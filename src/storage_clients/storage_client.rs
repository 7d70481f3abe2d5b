use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncRead;

pub type BlobNames<'a> = BoxStream<'a, Result<String, std::io::Error>>;

pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn create_container(&self, container: &str) -> Result<(), std::io::Error>;

    async fn container_exists(&self, container: &str) -> Result<bool, std::io::Error>;

    /// Streams `source` into `container/blob`, replacing any existing blob.
    /// Returns the number of bytes sent.
    async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        source: &Path,
    ) -> Result<u64, std::io::Error>;

    /// Lazily yields blob names in whatever order the backend returns them.
    fn list_blobs<'a>(&'a self, container: &'a str) -> BlobNames<'a>;

    async fn open_blob(&self, container: &str, blob: &str) -> Result<BlobReader, std::io::Error>;

    /// Removes every blob in the container, then the container itself.
    async fn delete_container(&self, container: &str) -> Result<(), std::io::Error>;

    fn blob_url(&self, container: &str, blob: &str) -> String;
}
