mod naming;
mod steps;

use crate::output::{
    emit_progress_message, emit_step, emit_warning, finish_spinner, is_json_mode, start_spinner,
};
use crate::storage_clients::{BlobNames, ObjectStore};
use bytesize::ByteSize;
use console::style;
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

pub use naming::{DEFAULT_NAME_HINT, blob_file_name, container_name, downloaded_path};
pub use steps::{Acknowledge, AutoContinue, KeyPress, Step};

/// What every uploaded blob contains.
pub const SAMPLE_TEXT: &str = "Hello, World!";

pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle {
    pub container: String,
    pub name: String,
    pub url: String,
    pub source_path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub container: String,
    pub blob: String,
    pub blob_url: String,
    pub blobs: Vec<String>,
    pub source_path: String,
    pub download_path: String,
    pub bytes_written: u64,
    pub local_files_removed: bool,
}

pub struct WorkflowRunner {
    store: Arc<dyn ObjectStore>,
    data_dir: PathBuf,
    acknowledge: Box<dyn Acknowledge>,
    keep_files: bool,
}

impl WorkflowRunner {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        data_dir: impl Into<PathBuf>,
        acknowledge: Box<dyn Acknowledge>,
    ) -> Self {
        Self {
            store,
            data_dir: data_dir.into(),
            acknowledge,
            keep_files: false,
        }
    }

    pub fn keep_files(mut self, keep_files: bool) -> Self {
        self.keep_files = keep_files;
        self
    }

    fn say(&self, text: &str) {
        if is_json_mode() {
            emit_progress_message(text);
        } else {
            println!("{}", text);
        }
    }

    fn announce(&self, step: Step) {
        if is_json_mode() {
            emit_step(step.id(), step.index(), Step::ALL.len(), step.title());
        } else {
            println!(
                "\n{} {}",
                style(format!("[{}/{}]", step.index(), Step::ALL.len())).cyan().bold(),
                style(step.title()).bold()
            );
        }
    }

    fn pause(&self, step: Step) -> Result<(), String> {
        if !is_json_mode() {
            println!("\n{}", step.next_hint());
        }
        self.acknowledge.acknowledge(step)
    }

    pub async fn create_container(&self, name_hint: &str) -> Result<ContainerHandle, String> {
        let name = container_name(name_hint)?;

        let pb = start_spinner(&format!("Creating container '{}'...", name));
        if let Err(e) = self.store.create_container(&name).await {
            pb.finish_and_clear();
            return Err(format!("Failed to create container '{}': {}", name, e));
        }
        finish_spinner(&pb, &format!("A container named '{}' has been created", name));

        Ok(ContainerHandle { name })
    }

    /// Writes `SAMPLE_TEXT` to `local_path` and streams it into a blob named after the file.
    pub async fn upload_file(
        &self,
        container: &ContainerHandle,
        local_path: &Path,
    ) -> Result<BlobHandle, String> {
        let name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| format!("'{}' has no file name", local_path.display()))?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                format!("Failed to create directory '{}': {}", parent.display(), e)
            })?;
        }

        tokio::fs::write(local_path, SAMPLE_TEXT)
            .await
            .map_err(|e| format!("Failed to write '{}': {}", local_path.display(), e))?;

        let url = self.store.blob_url(&container.name, &name);
        self.say(&format!("Uploading to blob storage as blob:\n\t{}", url));

        let pb = start_spinner(&format!("Uploading '{}'...", name));
        let size = match self
            .store
            .upload_blob(&container.name, &name, local_path)
            .await
        {
            Ok(size) => size,
            Err(e) => {
                pb.finish_and_clear();
                return Err(format!("Failed to upload blob '{}': {}", name, e));
            }
        };
        finish_spinner(&pb, &format!("Uploaded {}", ByteSize::b(size)));

        Ok(BlobHandle {
            container: container.name.clone(),
            name,
            url,
            source_path: local_path.to_path_buf(),
            size,
        })
    }

    pub fn list_blobs<'a>(&'a self, container: &'a ContainerHandle) -> BlobNames<'a> {
        self.store.list_blobs(&container.name)
    }

    /// Streams the blob into a freshly created `destination`, returning the bytes written.
    pub async fn download_blob(&self, blob: &BlobHandle, destination: &Path) -> Result<u64, String> {
        if destination == blob.source_path {
            return Err(format!(
                "Refusing to download over the source file '{}'",
                destination.display()
            ));
        }

        self.say(&format!("Downloading blob to\n\t{}", destination.display()));

        let pb = start_spinner(&format!("Downloading '{}'...", blob.name));
        let written = match self.copy_blob(blob, destination).await {
            Ok(written) => written,
            Err(e) => {
                pb.finish_and_clear();
                return Err(e);
            }
        };
        finish_spinner(&pb, &format!("Downloaded {}", ByteSize::b(written)));

        Ok(written)
    }

    async fn copy_blob(&self, blob: &BlobHandle, destination: &Path) -> Result<u64, String> {
        let mut reader = self
            .store
            .open_blob(&blob.container, &blob.name)
            .await
            .map_err(|e| format!("Failed to download blob '{}': {}", blob.name, e))?;

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| format!("Failed to create '{}': {}", destination.display(), e))?;

        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| format!("Failed to download blob '{}': {}", blob.name, e))?;

        file.flush()
            .await
            .map_err(|e| format!("Failed to write '{}': {}", destination.display(), e))?;

        Ok(written)
    }

    pub async fn delete_container(&self, container: ContainerHandle) -> Result<(), String> {
        let pb = start_spinner("Deleting blob container...");
        if let Err(e) = self.store.delete_container(&container.name).await {
            pb.finish_and_clear();
            return Err(format!(
                "Failed to delete container '{}': {}",
                container.name, e
            ));
        }
        finish_spinner(&pb, &format!("Container '{}' deleted", container.name));

        Ok(())
    }

    fn remove_local_files(&self, paths: &[&Path]) -> bool {
        let mut removed = true;
        for path in paths {
            if let Err(e) = std::fs::remove_file(path) {
                removed = false;
                emit_warning(
                    &format!("Failed to remove '{}': {}", path.display(), e),
                    "cleanup_failed",
                );
            }
        }
        removed
    }

    /// Runs the five steps in order, waiting for acknowledgment after each one.
    pub async fn run(&self, name_hint: &str) -> Result<WorkflowReport, String> {
        self.announce(Step::CreateContainer);
        let container = self.create_container(name_hint).await?;
        self.pause(Step::CreateContainer)?;

        self.announce(Step::UploadFile);
        let local_path = self.data_dir.join(blob_file_name()?);
        let blob = self.upload_file(&container, &local_path).await?;
        self.pause(Step::UploadFile)?;

        self.announce(Step::ListBlobs);
        let mut blobs = Vec::new();
        {
            let mut names = self.list_blobs(&container);
            while let Some(name) = names.next().await {
                let name = name.map_err(|e| {
                    format!("Failed to list blobs in '{}': {}", container.name, e)
                })?;
                self.say(&format!("\t{}", name));
                blobs.push(name);
            }
        }
        self.pause(Step::ListBlobs)?;

        self.announce(Step::DownloadBlob);
        let download_path = downloaded_path(&local_path)?;
        let bytes_written = self.download_blob(&blob, &download_path).await?;
        self.pause(Step::DownloadBlob)?;

        self.announce(Step::DeleteContainer);
        let container_name = container.name.clone();
        self.delete_container(container).await?;

        let local_files_removed = !self.keep_files
            && self.remove_local_files(&[local_path.as_path(), download_path.as_path()]);
        self.pause(Step::DeleteContainer)?;

        Ok(WorkflowReport {
            container: container_name,
            blob: blob.name,
            blob_url: blob.url,
            blobs,
            source_path: local_path.display().to_string(),
            download_path: download_path.display().to_string(),
            bytes_written,
            local_files_removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_clients::{BlobReader, LocalClientStorage};
    use async_trait::async_trait;
    use futures::TryStreamExt;
    use futures::stream;
    use std::sync::Mutex;

    struct RecordingAck {
        seen: Arc<Mutex<Vec<Step>>>,
    }

    impl Acknowledge for RecordingAck {
        fn acknowledge(&self, step: Step) -> Result<(), String> {
            self.seen.lock().unwrap().push(step);
            Ok(())
        }
    }

    struct StopAt(Step);

    impl Acknowledge for StopAt {
        fn acknowledge(&self, step: Step) -> Result<(), String> {
            if step == self.0 {
                Err("Error: interrupted".to_string())
            } else {
                Ok(())
            }
        }
    }

    /// Rejects container creation and records any later call.
    #[derive(Default)]
    struct BrokenStore {
        calls: Mutex<Vec<&'static str>>,
    }

    impl BrokenStore {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ObjectStore for BrokenStore {
        async fn create_container(&self, _container: &str) -> Result<(), std::io::Error> {
            self.record("create_container");
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "access denied",
            ))
        }

        async fn container_exists(&self, _container: &str) -> Result<bool, std::io::Error> {
            self.record("container_exists");
            Ok(false)
        }

        async fn upload_blob(
            &self,
            _container: &str,
            _blob: &str,
            _source: &Path,
        ) -> Result<u64, std::io::Error> {
            self.record("upload_blob");
            Ok(0)
        }

        fn list_blobs<'a>(&'a self, _container: &'a str) -> BlobNames<'a> {
            self.record("list_blobs");
            stream::empty().boxed()
        }

        async fn open_blob(
            &self,
            _container: &str,
            _blob: &str,
        ) -> Result<BlobReader, std::io::Error> {
            self.record("open_blob");
            Ok(Box::pin(tokio::io::empty()))
        }

        async fn delete_container(&self, _container: &str) -> Result<(), std::io::Error> {
            self.record("delete_container");
            Ok(())
        }

        fn blob_url(&self, container: &str, blob: &str) -> String {
            format!("broken://{}/{}", container, blob)
        }
    }

    fn local_runner(
        root: &Path,
        acknowledge: Box<dyn Acknowledge>,
    ) -> (Arc<LocalClientStorage>, WorkflowRunner) {
        let store = Arc::new(LocalClientStorage::new(root.join("store")));
        let runner = WorkflowRunner::new(store.clone(), root.join("data"), acknowledge);
        (store, runner)
    }

    #[tokio::test]
    async fn container_exists_between_create_and_delete() {
        let root = tempfile::tempdir().unwrap();
        let (store, runner) = local_runner(root.path(), Box::new(AutoContinue));

        let container = runner.create_container("lifecycle").await.unwrap();
        assert!(store.container_exists(&container.name).await.unwrap());

        let name = container.name.clone();
        runner.delete_container(container).await.unwrap();
        assert!(!store.container_exists(&name).await.unwrap());
    }

    #[tokio::test]
    async fn uploaded_blob_holds_sample_text() {
        let root = tempfile::tempdir().unwrap();
        let (store, runner) = local_runner(root.path(), Box::new(AutoContinue));
        let container = runner.create_container("upload").await.unwrap();
        let local_path = root.path().join("data").join("wtfileupload.txt");

        let blob = runner.upload_file(&container, &local_path).await.unwrap();

        let stored = std::fs::read_to_string(
            root.path().join("store").join(&container.name).join(&blob.name),
        )
        .unwrap();
        assert_eq!(stored, SAMPLE_TEXT);
        assert_eq!(std::fs::read_to_string(&local_path).unwrap(), SAMPLE_TEXT);
        assert_eq!(blob.size, SAMPLE_TEXT.len() as u64);
        assert_eq!(blob.name, "wtfileupload.txt");

        let names: Vec<String> = store.list_blobs(&container.name).try_collect().await.unwrap();
        assert_eq!(names, vec![blob.name.clone()]);
    }

    #[tokio::test]
    async fn download_is_byte_identical_to_source() {
        let root = tempfile::tempdir().unwrap();
        let (_store, runner) = local_runner(root.path(), Box::new(AutoContinue));
        let container = runner.create_container("download").await.unwrap();
        let local_path = root.path().join("data").join("wtfiledownload.txt");
        let blob = runner.upload_file(&container, &local_path).await.unwrap();
        let destination = downloaded_path(&local_path).unwrap();

        let written = runner.download_blob(&blob, &destination).await.unwrap();

        assert_eq!(written, SAMPLE_TEXT.len() as u64);
        assert_eq!(
            std::fs::read(&destination).unwrap(),
            std::fs::read(&local_path).unwrap()
        );
    }

    #[tokio::test]
    async fn download_refuses_to_overwrite_source() {
        let root = tempfile::tempdir().unwrap();
        let (_store, runner) = local_runner(root.path(), Box::new(AutoContinue));
        let container = runner.create_container("overwrite").await.unwrap();
        let local_path = root.path().join("data").join("wtfileoverwrite.txt");
        let blob = runner.upload_file(&container, &local_path).await.unwrap();

        let err = runner.download_blob(&blob, &local_path).await.unwrap_err();

        assert!(err.starts_with("Refusing to download over the source file"));
    }

    #[tokio::test]
    async fn full_run_lists_upload_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (store, runner) = local_runner(
            root.path(),
            Box::new(RecordingAck { seen: seen.clone() }),
        );

        let report = runner.run("myBlobContainer").await.unwrap();

        assert!(report.container.starts_with("myblobcontainer-"));
        assert!(report.blobs.contains(&report.blob));
        assert_eq!(report.bytes_written, SAMPLE_TEXT.len() as u64);
        assert!(report.local_files_removed);
        assert!(!store.container_exists(&report.container).await.unwrap());
        assert!(!Path::new(&report.source_path).exists());
        assert!(!Path::new(&report.download_path).exists());
        assert_eq!(*seen.lock().unwrap(), Step::ALL.to_vec());
    }

    #[tokio::test]
    async fn keep_files_leaves_local_copies() {
        let root = tempfile::tempdir().unwrap();
        let (_store, runner) = local_runner(root.path(), Box::new(AutoContinue));
        let runner = runner.keep_files(true);

        let report = runner.run(DEFAULT_NAME_HINT).await.unwrap();

        assert!(!report.local_files_removed);
        assert_eq!(
            std::fs::read_to_string(&report.download_path).unwrap(),
            SAMPLE_TEXT
        );
        assert!(report.download_path.ends_with("DOWNLOADED.txt"));
    }

    #[tokio::test]
    async fn two_runs_use_distinct_containers() {
        let root = tempfile::tempdir().unwrap();
        let (_store, runner) = local_runner(root.path(), Box::new(AutoContinue));

        let first = runner.run("repeat").await.unwrap();
        let second = runner.run("repeat").await.unwrap();

        assert_ne!(first.container, second.container);
    }

    #[tokio::test]
    async fn failed_create_stops_the_pipeline() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(BrokenStore::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let runner = WorkflowRunner::new(
            store.clone(),
            root.path().join("data"),
            Box::new(RecordingAck { seen: seen.clone() }),
        );

        let err = runner.run("broken").await.unwrap_err();

        assert!(err.starts_with("Failed to create container 'broken-"));
        assert!(err.ends_with("access denied"));
        assert_eq!(*store.calls.lock().unwrap(), vec!["create_container"]);
        assert!(seen.lock().unwrap().is_empty());
        assert!(!root.path().join("data").exists());
    }

    #[tokio::test]
    async fn declined_acknowledgment_leaves_container_behind() {
        let root = tempfile::tempdir().unwrap();
        let (store, runner) = local_runner(root.path(), Box::new(StopAt(Step::ListBlobs)));

        let err = runner.run("partial").await.unwrap_err();

        assert_eq!(err, "Error: interrupted");
        let containers: Vec<_> = std::fs::read_dir(root.path().join("store"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(containers.len(), 1);
        assert!(store.container_exists(&containers[0]).await.unwrap());
    }
}
