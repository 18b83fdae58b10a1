pub mod error;
pub mod format;
pub mod index;
pub mod names;
pub mod output;
pub mod target;

// Re-exports
pub use error::ExtractError;
pub use index::{IxNode, SourceDoc, SourceIndex};
pub use output::OutputDocument;
pub use target::footnote::Relationship;
pub use target::{extract_all, ExtractionSummary, TargetAssembler, TargetDocument};
