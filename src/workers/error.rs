use std::process::ExitStatus;

use thiserror::Error;

use crate::infrastructure::storage::error::StorageError;
use crate::modules::transcode::error::MediaError;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transcoder exited unsuccessfully ({0})")]
    TranscoderExit(ExitStatus),

    #[error("Output could not be delivered: {0}")]
    OutputUndelivered(String),
}

pub type JobResult<T> = Result<T, JobError>;
