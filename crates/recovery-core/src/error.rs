use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid asset key '{key}': {reason}")]
    InvalidAssetKey { key: String, reason: &'static str },

    #[error("invalid snapshot epoch '{0}'")]
    InvalidSnapshot(String),

    #[error("unknown image type '{0}'")]
    UnknownImageType(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
