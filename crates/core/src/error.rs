use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("unknown chapter: {0}")]
    UnknownChapter(u32),
    #[error("position must be >= 1, got {0}")]
    InvalidPosition(u32),
    #[error("source file not found: {0:?}")]
    SourceMissing(PathBuf),
    #[error("two entries rename to the same target: {0:?}")]
    AliasedTarget(PathBuf),
    #[error("target slot already occupied: {0:?}")]
    SlotOccupied(PathBuf),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FigError>;

impl From<anyhow::Error> for FigError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}
