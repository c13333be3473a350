use crate::types::JobId;
use std::result;
use thiserror;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid job name {0:?}")]
    InvalidName(String),
    #[error("Can not find job {0}")]
    ArtifactNotFound(String),
    #[error("job {0} not exists")]
    NotFound(JobId),
    #[error("job {0} already killed")]
    AlreadyKilled(JobId),
    #[error("job {0} already registered")]
    AlreadyRegistered(JobId),
}

pub type Result<T> = result::Result<T, Error>;
