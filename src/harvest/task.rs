use std::fmt;

use super::error::JobError;

/// Outcome of a job, ordered by the pipeline stage it reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum JobStatus {
    NotProcessed = 0,
    ErrorPageRequest = 1,
    ErrorPageResponse = 2,
    ErrorPageContent = 3,
    AccessDenied = 4,
    Captcha = 5,
    NoImage = 6,
    ErrorImageRequest = 7,
    ErrorImageResponse = 8,
    ErrorImageFile = 9,
    ErrorImageFileWrite = 10,
    Success = 11,
}

impl JobStatus {
    #[cfg(test)]
    pub const ALL: [JobStatus; 12] = [
        JobStatus::NotProcessed,
        JobStatus::ErrorPageRequest,
        JobStatus::ErrorPageResponse,
        JobStatus::ErrorPageContent,
        JobStatus::AccessDenied,
        JobStatus::Captcha,
        JobStatus::NoImage,
        JobStatus::ErrorImageRequest,
        JobStatus::ErrorImageResponse,
        JobStatus::ErrorImageFile,
        JobStatus::ErrorImageFileWrite,
        JobStatus::Success,
    ];

    /// Stable numeric code shown in reports
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            JobStatus::NotProcessed => "NotProcessed",
            JobStatus::ErrorPageRequest => "ErrorPageRequest",
            JobStatus::ErrorPageResponse => "ErrorPageResponse",
            JobStatus::ErrorPageContent => "ErrorPageContent",
            JobStatus::AccessDenied => "AccessDenied",
            JobStatus::Captcha => "Captcha",
            JobStatus::NoImage => "NoImage",
            JobStatus::ErrorImageRequest => "ErrorImageRequest",
            JobStatus::ErrorImageResponse => "ErrorImageResponse",
            JobStatus::ErrorImageFile => "ErrorImageFile",
            JobStatus::ErrorImageFileWrite => "ErrorImageFileWrite",
            JobStatus::Success => "Success",
        }
    }

    /// Only a successful job leaves a file behind
    pub fn wrote_file(self) -> bool {
        self == JobStatus::Success
    }

    /// Access denied, captcha and missing image complete without an error
    pub fn is_soft_outcome(self) -> bool {
        matches!(self, JobStatus::AccessDenied | JobStatus::Captcha | JobStatus::NoImage)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One screenshot index waiting to be, or having been, processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    /// Numeric screenshot id
    pub index: u64,

    /// Set once by the pipeline
    pub status: JobStatus,
}

impl Job {
    pub fn new(index: u64) -> Self {
        Self {
            index,
            status: JobStatus::NotProcessed,
        }
    }

    pub(crate) fn finish(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }
}

/// Terminal outcome of a job as handed to the aggregator
#[derive(Debug)]
pub struct JobResult {
    pub job: Job,

    /// Present for hard failures only
    pub error: Option<JobError>,
}
