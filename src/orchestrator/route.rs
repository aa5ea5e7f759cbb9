//! Pure route selection: which extraction path handles a file.

use crate::config::FeatureToggles;
use crate::extraction::ExtractionKind;
use crate::models::{FileCategory, FileDescriptor};

/// Where a file goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Extract(ExtractionKind),
    /// Not a failure: the file type is simply not handled.
    Skip(String),
}

/// Pick a single extraction path, first match wins:
/// multimodal (toggle on, document), vision (toggle on, image),
/// speech (audio), document (document), otherwise skip.
pub fn select_route(file: &FileDescriptor, toggles: FeatureToggles) -> Route {
    let category = file.category();
    let is_document = category == FileCategory::Document;

    if toggles.multimodal && is_document {
        return Route::Extract(ExtractionKind::Multimodal);
    }
    if toggles.vision && is_document && file.is_image() {
        return Route::Extract(ExtractionKind::Vision);
    }
    match category {
        FileCategory::Audio => Route::Extract(ExtractionKind::Speech),
        FileCategory::Document => Route::Extract(ExtractionKind::Document),
        FileCategory::Unsupported => {
            Route::Skip(format!("Unsupported file type: {}", file.extension()))
        }
    }
}
