use axum::body::Bytes;
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

/// A file received in the `file` field of a prediction request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// Extension of the client-supplied name, restricted to ASCII
    /// alphanumerics so it can never escape the staging directory.
    fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
    }
}

/// An upload written to a uniquely named file. The file is removed when this
/// value is dropped.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[derive(Debug, Clone)]
pub struct UploadStager {
    temp_dir: PathBuf,
}

impl UploadStager {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn stage(&self, upload: &Upload) -> std::io::Result<StagedUpload> {
        std::fs::create_dir_all(&self.temp_dir)?;

        let suffix = upload.extension().unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&self.temp_dir)?;
        file.write_all(&upload.data)?;
        file.flush()?;

        tracing::debug!(
            path = %file.path().display(),
            bytes = upload.data.len(),
            "Staged upload"
        );

        Ok(StagedUpload { file })
    }
}
