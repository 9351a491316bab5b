//! Error taxonomy for the document core

use thiserror::Error;

use crate::schema::NodeKind;

/// A specialized `Result` type for document operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by tree mutations, selection resolution, markup parsing and history.
///
/// None of these are fatal: the worst case is a single command being ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A mutation would break the nesting or attribute rules. The tree is left unchanged.
    #[error("schema violation at {path:?} ({kind}): {reason}")]
    SchemaViolation {
        path: Vec<usize>,
        kind: NodeKind,
        reason: String,
    },

    /// A position does not resolve against the current tree.
    #[error("invalid selection: position {path:?}+{offset} is out of range")]
    InvalidSelection { path: Vec<usize>, offset: usize },

    /// Stored markup could not be turned into a valid tree.
    #[error("malformed markup at {path:?} <{node}>: {reason}")]
    MalformedMarkup {
        path: Vec<usize>,
        node: String,
        reason: String,
    },

    /// Undo or redo was requested with an empty stack.
    #[error("nothing to {0}")]
    HistoryUnderflow(&'static str),
}

impl Error {
    pub(crate) fn schema(path: &[usize], kind: NodeKind, reason: impl Into<String>) -> Self {
        Error::SchemaViolation {
            path: path.to_vec(),
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(path: &[usize], node: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedMarkup {
            path: path.to_vec(),
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error leaves the caller's state untouched and can be shown as a no-op.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::MalformedMarkup { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_violation_display() {
        let err = Error::schema(&[0, 1], NodeKind::Heading, "not allowed in listItem");
        let msg = err.to_string();
        assert!(msg.contains("[0, 1]"));
        assert!(msg.contains("heading"));
        assert!(msg.contains("not allowed in listItem"));
    }

    #[test]
    fn test_malformed_markup_display() {
        let err = Error::malformed(&[2], "li", "unexpected end of input");
        assert_eq!(
            err.to_string(),
            "malformed markup at [2] <li>: unexpected end of input"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_history_underflow_is_recoverable() {
        let err = Error::HistoryUnderflow("undo");
        assert_eq!(err.to_string(), "nothing to undo");
        assert!(err.is_recoverable());
    }
}
