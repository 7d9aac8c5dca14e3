use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PersonalDataError {
    #[error("personal API request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("invalid personal API response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("subscriber already joined: {0}")]
    AlreadyJoined(String),
    #[error("unknown subscriber: {0}")]
    UnknownSubscriber(String),
    #[error("subscriber task failed: {0}")]
    TaskFailed(String),
    #[error(transparent)]
    Bus(#[from] mirrorsense_bus::BusError),
}
