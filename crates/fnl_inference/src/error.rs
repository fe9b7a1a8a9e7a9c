use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected model response: {0}")]
    Response(String),

    #[error("Model backend not available: {0}")]
    Unavailable(String),
}

impl From<ClassificationError> for fnl_core::Error {
    fn from(e: ClassificationError) -> Self {
        fnl_core::Error::Inference(e.to_string())
    }
}
