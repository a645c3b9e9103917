use wallpaper_contracts::image_uri::{download_file_name, ImageUri};

pub const SHARE_TITLE: &str = "Ai Anime Wallpaper";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub file_name: String,
    pub image: ImageUri,
}

impl SharePayload {
    pub fn new(prompt: &str, image: ImageUri) -> Self {
        Self {
            title: SHARE_TITLE.to_string(),
            text: format!(
                "I created this amazing wallpaper with {SHARE_TITLE}: \"{prompt}\""
            ),
            file_name: download_file_name(prompt, Some(&image)),
            image,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    /// The user backed out; not reported.
    #[error("share cancelled")]
    Cancelled,
    #[error("share target rejected {0}")]
    Rejected(String),
    #[error("share failed: {0}")]
    Failed(String),
}

/// Platform share sheet, or whatever stands in for one.
pub trait ShareTarget {
    fn share(&self, payload: &SharePayload) -> Result<(), ShareError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    Cancelled,
    Unsupported,
    Failed,
}
