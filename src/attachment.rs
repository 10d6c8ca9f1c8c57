//! Image attachments sent alongside the prompt.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Where the model fetches an image from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// Fetched by the API from a public URL
    Url {
        /// Image location
        url: String,
    },

    /// Inlined image bytes
    Base64 {
        /// MIME type, e.g. `image/png`
        media_type: String,
        /// Standard base64 without line breaks
        data: String,
    },
}

/// An image attached to the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// Image payload
    pub source: ImageSource,
}

impl Attachment {
    /// Parses an attachment reference.
    ///
    /// References starting with `http` are passed through as URLs; anything
    /// else is read from disk and inlined.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file can't be read and [`Error::Attachment`]
    /// if its extension is not a supported image type.
    pub fn parse(reference: &str) -> Result<Self> {
        if reference.starts_with("http") {
            debug!("Attaching image URL {}", reference);
            return Ok(Self {
                source: ImageSource::Url {
                    url: reference.to_string(),
                },
            });
        }

        let path = Path::new(reference);
        let media_type = media_type_for(path).ok_or_else(|| {
            Error::attachment(reference, "expected a .png, .jpg, .jpeg, .gif or .webp image")
        })?;

        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        debug!("Attaching {} ({} bytes, {})", reference, bytes.len(), media_type);

        Ok(Self {
            source: ImageSource::Base64 {
                media_type: media_type.to_string(),
                data: STANDARD.encode(bytes),
            },
        })
    }
}

fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
