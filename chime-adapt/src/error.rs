use thiserror::Error;

use crate::types::SubscriptionId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Media session unavailable")]
    SessionUnavailable,

    #[error("Media session rejected command: {0}")]
    CommandRejected(String),

    #[error("Metrics source closed")]
    SourceClosed,

    #[error("Unknown subscription: {0}")]
    UnknownSubscription(SubscriptionId),

    #[error("Unknown meeting profile: {0}")]
    UnknownProfile(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
