//! Uploaded file staged by a form before it is stored on a disk

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;

use crate::core::validation::IMAGE_EXTENSIONS;

/// Length of the random part of a stored file name
const HASH_NAME_LENGTH: usize = 40;

/// A file received from the client, held in memory until stored
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    original_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(
        original_name: impl Into<String>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Size in kilobytes, rounded up
    pub fn size_kilobytes(&self) -> u64 {
        self.size().div_ceil(1024)
    }

    /// Lowercased extension of the original file name
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.original_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }

    /// Whether the upload is an image.
    ///
    /// The extension must be a known raster image type, the declared content
    /// type (if any) must be `image/*`, and the leading bytes must match the
    /// extension. SVG is not accepted.
    pub fn is_image(&self) -> bool {
        let Some(ext) = self.extension() else {
            return false;
        };

        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return false;
        }

        if let Some(content_type) = &self.content_type
            && !content_type.starts_with("image/")
        {
            return false;
        }

        matches_magic_bytes(&ext, &self.bytes)
    }

    /// Random file name keeping the original extension
    pub fn hash_name(&self) -> String {
        let random: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(HASH_NAME_LENGTH)
            .map(char::from)
            .collect();

        match self.extension() {
            Some(ext) => format!("{}.{}", random, ext),
            None => random,
        }
    }
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("original_name", &self.original_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Preview metadata of a staged upload, safe to send to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadPreview {
    pub name: String,
    pub content_type: Option<String>,
    pub size: u64,
}

impl From<&UploadedFile> for UploadPreview {
    fn from(file: &UploadedFile) -> Self {
        Self {
            name: file.original_name.clone(),
            content_type: file.content_type.clone(),
            size: file.size(),
        }
    }
}

fn matches_magic_bytes(extension: &str, bytes: &[u8]) -> bool {
    match extension {
        "jpg" | "jpeg" => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        "png" => bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
        "gif" => bytes.starts_with(b"GIF8"),
        "webp" => bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP",
        "bmp" => bytes.starts_with(b"BM"),
        _ => false,
    }
}
