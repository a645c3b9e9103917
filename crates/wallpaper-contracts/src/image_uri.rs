use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

const DEFAULT_EXTENSION: &str = "jpg";
const FILE_NAME_PROMPT_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageUriError {
    #[error("image URI has no payload after ','")]
    MissingPayload,
    #[error("image URI header has no mime type between ':' and ';'")]
    MissingMimeType,
    #[error("image URI payload is not valid base64: {0}")]
    InvalidBase64(String),
}

/// Self-describing image value: `data:<mime>;base64,<payload>`.
///
/// The string is kept as-is so values loaded from storage compare equal to
/// the ones that were saved. Validation happens when the value is split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageUri(String);

/// The two halves of an [`ImageUri`], as sent to the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Base64 text, without the `data:` header.
    pub data: String,
}

impl ImageUri {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_base64(mime_type: &str, data: &str) -> Self {
        Self(format!("data:{mime_type};base64,{data}"))
    }

    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self::from_base64(mime_type, &BASE64.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn split(&self) -> Result<ImagePayload, ImageUriError> {
        let (header, data) = self
            .0
            .split_once(',')
            .ok_or(ImageUriError::MissingPayload)?;
        if data.is_empty() {
            return Err(ImageUriError::MissingPayload);
        }
        let mime_type = header_mime_type(header).ok_or(ImageUriError::MissingMimeType)?;
        Ok(ImagePayload {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn mime_type(&self) -> Option<&str> {
        let header = self.0.split_once(',').map_or(self.0.as_str(), |(head, _)| head);
        header_mime_type(header)
    }

    pub fn decode(&self) -> Result<Vec<u8>, ImageUriError> {
        self.split()?.decode()
    }
}

impl fmt::Display for ImageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ImagePayload {
    pub fn decode(&self) -> Result<Vec<u8>, ImageUriError> {
        BASE64
            .decode(self.data.as_bytes())
            .map_err(|err| ImageUriError::InvalidBase64(err.to_string()))
    }

    pub fn to_uri(&self) -> ImageUri {
        ImageUri::from_base64(&self.mime_type, &self.data)
    }

    /// Decoded size computed from the base64 length, without decoding.
    pub fn approx_byte_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        (self.data.len() / 4 * 3).saturating_sub(padding)
    }
}

fn header_mime_type(header: &str) -> Option<&str> {
    let (_, after_colon) = header.split_once(':')?;
    let (mime_type, _) = after_colon.split_once(';')?;
    if mime_type.is_empty() {
        return None;
    }
    Some(mime_type)
}

/// File name offered when saving an image: the first 30 prompt characters
/// with whitespace runs collapsed to `_`, then `_wallpaper.<subtype>`.
pub fn download_file_name(prompt: &str, image: Option<&ImageUri>) -> String {
    let head: String = prompt.chars().take(FILE_NAME_PROMPT_CHARS).collect();
    let mut base = String::with_capacity(head.len());
    let mut in_whitespace = false;
    for ch in head.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                base.push('_');
            }
            in_whitespace = true;
        } else {
            base.push(ch);
            in_whitespace = false;
        }
    }

    let extension = match image {
        Some(image) => image
            .mime_type()
            .unwrap_or("image/jpeg")
            .split('/')
            .nth(1)
            .filter(|subtype| !subtype.is_empty())
            .unwrap_or(DEFAULT_EXTENSION)
            .to_string(),
        None => DEFAULT_EXTENSION.to_string(),
    };
    format!("{base}_wallpaper.{extension}")
}
