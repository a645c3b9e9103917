use wallpaper_contracts::image_uri::ImageUriError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("API key not set (checked {0})")]
    MissingApiKey(String),
    #[error("{context}")]
    RemoteCallFailed {
        context: String,
        #[source]
        source: BoxError,
    },
    #[error("no image was generated; the response might have been blocked")]
    NoImageReturned,
    #[error("no text was returned")]
    NoTextReturned,
    #[error("invalid image URI format: {0}")]
    MalformedImageUri(#[from] ImageUriError),
}

impl ApiError {
    pub fn remote(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ApiError::RemoteCallFailed {
            context: context.into(),
            source: source.into(),
        }
    }
}
