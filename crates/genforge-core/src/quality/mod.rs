//! Output quality scoring and repair.
//!
//! Generator output arrives as text that should be a serialized
//! [`StructuredOutput`](crate::models::StructuredOutput). The engine scores
//! it in `[0, 10]`, enumerates concrete defects and repairs them locally.
//! Unrecoverable text is replaced by a minimal valid structure, so repair
//! never fails.

mod engine;
mod evaluate;
mod repair;
mod templates;
mod types;

pub use engine::QualityEngine;
pub use evaluate::evaluate;
pub use repair::{
    app_name_from_prompt, detect_issues, fallback_structure, fix_issues, repair_structure,
    synthesize_app_name, NameCase,
};
pub(crate) use repair::DEFAULT_DEPENDENCIES;
pub(crate) use templates::file_template;
pub use types::{EnhanceReport, IssueKind, QualityIssue, RepairOutcome, Severity};
