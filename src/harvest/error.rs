use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::task::JobStatus;

/// Hard failure of a single job, one variant per failing stage
#[derive(Debug, Error)]
pub enum JobError {
    /// An identity pool had nothing to hand out
    #[error("no {0} available")]
    NoIdentity(&'static str),

    #[error("failed to build page request: {0}")]
    PageRequest(#[source] reqwest::Error),

    #[error("page request failed: {0}")]
    PageResponse(#[source] reqwest::Error),

    #[error("failed to read page content: {0}")]
    PageContent(#[source] reqwest::Error),

    #[error("failed to build image request: {0}")]
    ImageRequest(#[source] reqwest::Error),

    #[error("image request failed: {0}")]
    ImageResponse(#[source] reqwest::Error),

    #[error("failed to create {}: {source}", .path.display())]
    ImageFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    ImageFileWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl JobError {
    /// Status a job ends with when it fails this way
    pub fn status(&self) -> JobStatus {
        match self {
            JobError::NoIdentity(_) | JobError::PageRequest(_) => JobStatus::ErrorPageRequest,
            JobError::PageResponse(_) => JobStatus::ErrorPageResponse,
            JobError::PageContent(_) => JobStatus::ErrorPageContent,
            JobError::ImageRequest(_) => JobStatus::ErrorImageRequest,
            JobError::ImageResponse(_) => JobStatus::ErrorImageResponse,
            JobError::ImageFile { .. } => JobStatus::ErrorImageFile,
            JobError::ImageFileWrite { .. } => JobStatus::ErrorImageFileWrite,
        }
    }
}
