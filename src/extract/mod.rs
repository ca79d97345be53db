//! Static side of tracing: which lines belong to which test
//!
//! Parses the script, finds test-registration calls and turns the bodies of
//! the selected tests into breakpoint lines.

pub mod extractor;
pub mod selector;
pub mod source;

pub use extractor::{extract_by_criterion, extract_by_line, ExtractionResult, TestDescriptor};
pub use selector::{Matcher, Selection};
pub use source::{FunctionSignatures, NodePath, Source, SyntaxNode};

/// Run the extraction a selection calls for
pub fn extract(source: &Source, func: &Matcher, selection: &Selection) -> ExtractionResult {
    match selection {
        Selection::Matching(test) => extract_by_criterion(source, func, test),
        Selection::Line(line) => extract_by_line(source, func, *line),
    }
}
