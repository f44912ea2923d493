use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("ChannelEvent already holds all {0} expected samples")]
    EventFull(usize),
    #[error("Machine-gun gap of {gap} exceeds the maximum of {max} between consecutive samples")]
    GapExceeded { gap: u64, max: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("Packet of {0} bytes is too short; expected at least {1}")]
    TooShort(usize, usize),
    #[error("Packet is not a heartbeat packet")]
    NotHeartbeat,
}

#[derive(Debug, Error)]
pub enum FileStreamError {
    #[error("Could not open FileStream because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("FileStream failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to FileStream error: {0}")]
    FileStreamError(#[from] FileStreamError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
}
