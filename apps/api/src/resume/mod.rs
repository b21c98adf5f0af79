// Resume core: text extraction, section segmentation, LaTeX reconstruction.
// Everything in here is synchronous and request-local. The HTTP layer runs it
// inside tokio::task::spawn_blocking.

pub mod escape;
pub mod extract;
pub mod reconstruct;
pub mod sections;
pub mod segment;
pub mod substitute;

use thiserror::Error;

pub use extract::{extract, RawDocument};
pub use reconstruct::{reconstruct, Reconstruction, ReconstructOptions};
pub use sections::{SectionMap, SectionName};
pub use segment::{segment, Vocabulary};
pub use substitute::{substitute, substitute_all};

/// Failures of the resume core. None of these are retried.
#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid or corrupted document: {0}")]
    CorruptInput(String),

    #[error("Could not extract text from file. It may be image-based, empty, or corrupted.")]
    EmptyContent,

    #[error("Parsing finished, but no content sections were identified.")]
    NoSectionsFound,

    #[error("No parsed sections to render.")]
    EmptyInput,
}
