use thiserror::Error;

use crate::rasterizer::PixelLayout;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("failed to serialize config: {0}")]
    RonSerialize(#[from] ron::Error),

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("pixel layout {0:?} is not supported here")]
    UnsupportedLayout(PixelLayout),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
