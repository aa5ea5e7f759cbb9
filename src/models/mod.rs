//! Data models for blobflow.

mod file;
mod job;
mod outcome;

pub use file::{FileCategory, FileDescriptor, AUDIO_EXTENSIONS, DOCUMENT_EXTENSIONS, IMAGE_EXTENSIONS};
pub use job::{JobHandle, JobSnapshot, JobStatus};
pub use outcome::{OrchestrationOutcome, OutcomeStatus, StepFailure};
