use console::{Term, style};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    CreateContainer,
    UploadFile,
    ListBlobs,
    DownloadBlob,
    DeleteContainer,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::CreateContainer,
        Step::UploadFile,
        Step::ListBlobs,
        Step::DownloadBlob,
        Step::DeleteContainer,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Step::CreateContainer => "create_container",
            Step::UploadFile => "upload_file",
            Step::ListBlobs => "list_blobs",
            Step::DownloadBlob => "download_blob",
            Step::DeleteContainer => "delete_container",
        }
    }

    /// 1-based position in the pipeline.
    pub fn index(self) -> usize {
        Step::ALL
            .iter()
            .position(|step| *step == self)
            .map_or(0, |position| position + 1)
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::CreateContainer => "Creating container",
            Step::UploadFile => "Uploading file",
            Step::ListBlobs => "Listing blobs",
            Step::DownloadBlob => "Downloading blob",
            Step::DeleteContainer => "Deleting container",
        }
    }

    /// Shown once the step is done, before waiting for the user.
    pub fn next_hint(self) -> &'static str {
        match self {
            Step::CreateContainer => {
                "Take a minute and verify it in your storage console.\nNext a file will be created and uploaded to the container."
            }
            Step::UploadFile => "The file was uploaded. We'll verify by listing the blobs next.",
            Step::ListBlobs => {
                "You can also verify by looking inside the container.\nNext the blob will be downloaded with an altered file name."
            }
            Step::DownloadBlob => {
                "Locate the local file in the data directory to verify it was downloaded.\nThe next step is to delete the container and local files."
            }
            Step::DeleteContainer => "The container is gone. That's the whole tour.",
        }
    }
}

/// The "continue" signal between two steps.
pub trait Acknowledge: Send + Sync {
    fn acknowledge(&self, step: Step) -> Result<(), String>;
}

/// Waits for a key press on the terminal.
pub struct KeyPress;

impl Acknowledge for KeyPress {
    fn acknowledge(&self, _step: Step) -> Result<(), String> {
        let term = Term::stdout();
        term.write_line(&style("Press any key to continue.").dim().to_string())
            .map_err(|e| format!("Error: {}", e))?;
        term.read_key().map_err(|e| format!("Error: {}", e))?;
        Ok(())
    }
}

pub struct AutoContinue;

impl Acknowledge for AutoContinue {
    fn acknowledge(&self, _step: Step) -> Result<(), String> {
        Ok(())
    }
}
