//! Shared data types.

mod output;

pub use output::{FileKind, GeneratedFile, ImageRef, Metadata, OutputMetadata, StructuredOutput};
