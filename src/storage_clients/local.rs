use crate::storage_clients::{
    BlobNames, BlobReader, ObjectStore, StorageConfig, StorageDefinition, StorageField,
    StorageFields,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Containers are directories under `path`, blobs are files inside them.
pub struct LocalClientStorage {
    path: PathBuf,
}

impl LocalClientStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn container_path(&self, container: &str) -> PathBuf {
        self.path.join(container)
    }

    fn existing_container(&self, container: &str) -> Result<PathBuf, std::io::Error> {
        let path = self.container_path(container);
        if !path.is_dir() {
            return Err(std::io::Error::new(
                ErrorKind::NotFound,
                format!("Container '{}' does not exist", container),
            ));
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalClientStorage {
    async fn create_container(&self, container: &str) -> Result<(), std::io::Error> {
        if !self.path.exists() {
            tokio::fs::create_dir_all(&self.path).await?;
        }

        tokio::fs::create_dir(self.container_path(container)).await
    }

    async fn container_exists(&self, container: &str) -> Result<bool, std::io::Error> {
        Ok(self.container_path(container).is_dir())
    }

    async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        source: &Path,
    ) -> Result<u64, std::io::Error> {
        let target = self.existing_container(container)?.join(blob);

        if let Some(parent_dir) = target.parent() {
            if !parent_dir.exists() {
                tokio::fs::create_dir_all(parent_dir).await?;
            }
        }

        tokio::fs::copy(source, target).await
    }

    fn list_blobs<'a>(&'a self, container: &'a str) -> BlobNames<'a> {
        let root = match self.existing_container(container) {
            Ok(root) => root,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        let entries = WalkDir::new(root.clone())
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => return Some(Err(std::io::Error::from(e))),
                };
                if !entry.file_type().is_file() {
                    return None;
                }
                let name = entry
                    .path()
                    .strip_prefix(&root)
                    .map(|relative| relative.to_string_lossy().replace('\\', "/"))
                    .map_err(|e| std::io::Error::new(ErrorKind::Other, e.to_string()));
                Some(name)
            });

        stream::iter(entries).boxed()
    }

    async fn open_blob(&self, container: &str, blob: &str) -> Result<BlobReader, std::io::Error> {
        let path = self.existing_container(container)?.join(blob);
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::pin(file))
    }

    async fn delete_container(&self, container: &str) -> Result<(), std::io::Error> {
        tokio::fs::remove_dir_all(self.container_path(container)).await
    }

    fn blob_url(&self, container: &str, blob: &str) -> String {
        let path = self.container_path(container).join(blob);
        let path = std::path::absolute(&path).unwrap_or(path);
        format!("file://{}", path.to_string_lossy().replace('\\', "/"))
    }
}

fn build_client(fields: &StorageFields) -> Result<Arc<dyn ObjectStore>, String> {
    let path = fields
        .get("path")
        .ok_or_else(|| "Missing required field: path".to_string())?;

    Ok(Arc::new(LocalClientStorage::new(path.clone())))
}

fn prepare_storage(storage: &mut StorageConfig) -> Result<(), String> {
    let path = storage
        .fields
        .get("path")
        .ok_or_else(|| "Missing required field: path".to_string())?;

    let path = Path::new(path);
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| format!("Failed to create path: {}", e))?;
    }

    Ok(())
}

const LOCAL_FIELDS: &[StorageField] = &[StorageField {
    key: "path",
    arg_name: "path",
    value_name: "PATH",
    short: Some('p'),
    help: "The directory holding the containers (only for local storage)",
    prompt: "Enter the path for local storage",
    required: true,
    secret: false,
    default_value: None,
}];

pub const DEFINITION: StorageDefinition = StorageDefinition {
    id: "local",
    label: "local",
    fields: LOCAL_FIELDS,
    build_client,
    prepare: Some(prepare_storage),
};
