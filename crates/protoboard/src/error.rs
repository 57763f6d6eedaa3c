use thiserror::Error;

#[derive(Error, Debug)]
pub enum GerberError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid aperture: {0}")]
    InvalidAperture(String),

    #[error("file attributes must be written before the header is finished")]
    HeaderClosed,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
