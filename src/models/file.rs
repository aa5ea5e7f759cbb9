//! File descriptors and extension-based classification.

use serde::{Deserialize, Serialize};

/// Audio extensions routed to speech transcription.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "opus", "ogg", "flac", "wma", "aac", "webm"];

/// Document extensions routed to document extraction.
pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "doc", "xlsx", "pptx", "jpg", "jpeg", "png", "tiff", "bmp",
];

/// The subset of document extensions that are raster images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "bmp"];

/// A file that landed in the source container.
///
/// Created once by a trigger and passed by value into the orchestration core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    #[serde(rename = "container")]
    pub container_id: String,
    #[serde(rename = "uri")]
    pub source_uri: String,
}

impl FileDescriptor {
    pub fn new(
        name: impl Into<String>,
        container_id: impl Into<String>,
        source_uri: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            container_id: container_id.into(),
            source_uri: source_uri.into(),
        }
    }

    /// Last path segment of the name (blob triggers report `container/name`).
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Lowercased extension, or an empty string when the name has no dot.
    pub fn extension(&self) -> String {
        match self.basename().rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => String::new(),
        }
    }

    /// Basename without its extension.
    pub fn stem(&self) -> &str {
        let base = self.basename();
        match base.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => base,
        }
    }

    pub fn category(&self) -> FileCategory {
        FileCategory::from_extension(&self.extension())
    }

    pub fn is_image(&self) -> bool {
        IMAGE_EXTENSIONS.contains(&self.extension().as_str())
    }
}

/// File-type category derived from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Audio,
    Document,
    Unsupported,
}

impl FileCategory {
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_lowercase();
        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Audio
        } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            Self::Document
        } else {
            Self::Unsupported
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Unsupported => "unsupported",
        }
    }
}
