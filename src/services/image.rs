//! Recipe image storage
//!
//! Recipe payloads embed their image as a base64 data URI
//! (`data:image/png;base64,...`). This module decodes the payload, checks
//! the size cap, and writes the bytes under the media directory with a
//! uuid filename. The returned relative path is what gets stored on the
//! recipe row and served by the media route.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

use crate::config::MediaConfig;

/// Errors surfaced to the caller as validation failures
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image must be a base64 data URI (data:image/...;base64,...)")]
    InvalidDataUri,

    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("Invalid base64 image payload")]
    InvalidBase64,

    #[error("Image too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Stores decoded recipe images under the configured media directory
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    max_size: u64,
}

impl ImageStore {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: config.path.clone(),
            max_size: config.max_image_size,
        }
    }

    /// Decode a data URI and persist it; returns the media-relative path.
    pub async fn store_data_uri(&self, data_uri: &str) -> Result<String, ImageError> {
        let (mime, payload) = split_data_uri(data_uri)?;
        let ext = extension_for(mime)?;

        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|_| ImageError::InvalidBase64)?;

        if bytes.len() as u64 > self.max_size {
            return Err(ImageError::TooLarge {
                size: bytes.len() as u64,
                max: self.max_size,
            });
        }

        let relative = format!("recipes/{}.{}", Uuid::new_v4(), ext);
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create media directory: {:?}", parent))?;
        }

        fs::write(&target, &bytes)
            .await
            .with_context(|| format!("Failed to write image: {:?}", target))?;

        Ok(relative)
    }
}

/// Split `data:<mime>;base64,<payload>` into its parts.
fn split_data_uri(data_uri: &str) -> Result<(&str, &str), ImageError> {
    let rest = data_uri.strip_prefix("data:").ok_or(ImageError::InvalidDataUri)?;
    let (head, payload) = rest.split_once(',').ok_or(ImageError::InvalidDataUri)?;
    let mime = head
        .strip_suffix(";base64")
        .ok_or(ImageError::InvalidDataUri)?;
    Ok((mime, payload))
}

fn extension_for(mime: &str) -> Result<&'static str, ImageError> {
    match mime {
        "image/png" => Ok("png"),
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        other => Err(ImageError::UnsupportedType(other.to_string())),
    }
}
