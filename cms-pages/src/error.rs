//! Error types for page-tree validation and construction.

use std::fmt;
use thiserror::Error;

/// One structural problem in the page configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location in the document, e.g. `pages[2].children[main][0]`.
    pub path: String,
    pub message: String,
}

impl Violation {
    pub(crate) fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" {}", self.path, self.message)
    }
}

#[derive(Debug, Error)]
pub enum PageStructureError {
    #[error("invalid page structure: {}", summarize(.0))]
    Invalid(Vec<Violation>),

    #[error("unknown node type for def \"{0}\"")]
    UnknownNodeType(String),

    #[error("page configuration could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("URI \"{0}\" doesn't look like a page:// URI")]
    NotAPageUri(String),

    #[error("invalid URI \"{uri}\": {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },
}

impl PageStructureError {
    /// The collected violations, if this is a validation failure.
    pub fn violations(&self) -> &[Violation] {
        match self {
            PageStructureError::Invalid(v) => v,
            _ => &[],
        }
    }
}

fn summarize(violations: &[Violation]) -> String {
    match violations {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}
