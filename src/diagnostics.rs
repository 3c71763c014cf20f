//! Diagnostics for the translator.
//!
//! The distilled error taxonomy (syntax, symbol, type, semantic, internal) is
//! implemented as a single `thiserror` enum carrying a source span and a
//! human-readable message. Every parser entry point returns
//! `Result<_, Diagnostic>` rather than terminating the process.

use std::fmt;

use thiserror::Error;

/// A location in the source text, derived from the offending token's line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub line: u32,
    pub column: u32,
}

impl SourceSpan {
    pub fn new(line: u32, column: u32) -> Self {
        SourceSpan { line, column }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A diagnostic raised by any stage of the translator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Diagnostic {
    /// Unexpected token, missing punctuation.
    #[error("{span}: syntax error: {message}")]
    Syntax { span: SourceSpan, message: String },

    /// Undefined identifier, duplicate definition, wrong kind of tag.
    #[error("{span}: symbol error: {message}")]
    Symbol { span: SourceSpan, message: String },

    /// Invalid specifier combination, incomplete type in a context requiring
    /// completeness, non-integer where an integer is required, wrong call
    /// arity, `sizeof` on a function/incomplete type.
    #[error("{span}: type error: {message}")]
    Type { span: SourceSpan, message: String },

    /// Extern with initializer, stray `case`/`default`, multiple `default`,
    /// non-constant initializer at load time, `break`/`continue` with no
    /// active target.
    #[error("{span}: semantic error: {message}")]
    Semantic { span: SourceSpan, message: String },

    /// An assertion failure that should be unreachable in a well-formed parser.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Diagnostic {
    pub fn syntax(span: SourceSpan, message: impl Into<String>) -> Self {
        Diagnostic::Syntax {
            span,
            message: message.into(),
        }
    }

    pub fn symbol(span: SourceSpan, message: impl Into<String>) -> Self {
        Diagnostic::Symbol {
            span,
            message: message.into(),
        }
    }

    pub fn ty(span: SourceSpan, message: impl Into<String>) -> Self {
        Diagnostic::Type {
            span,
            message: message.into(),
        }
    }

    pub fn semantic(span: SourceSpan, message: impl Into<String>) -> Self {
        Diagnostic::Semantic {
            span,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Diagnostic::Internal {
            message: message.into(),
        }
    }

    /// The span of the diagnostic, if it carries one (`Internal` does not).
    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            Diagnostic::Syntax { span, .. }
            | Diagnostic::Symbol { span, .. }
            | Diagnostic::Type { span, .. }
            | Diagnostic::Semantic { span, .. } => Some(*span),
            Diagnostic::Internal { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Diagnostic>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_display() {
        let span = SourceSpan::new(3, 8);
        assert_eq!(format!("{}", span), "3:8");
    }

    #[test]
    fn syntax_message_includes_span() {
        let diag = Diagnostic::syntax(SourceSpan::new(1, 1), "expected ';'");
        assert_eq!(format!("{}", diag), "1:1: syntax error: expected ';'");
    }

    #[test]
    fn internal_has_no_span() {
        let diag = Diagnostic::internal("unreachable");
        assert_eq!(diag.span(), None);
    }

    #[test]
    fn symbol_diag_has_span() {
        let diag = Diagnostic::symbol(SourceSpan::new(2, 4), "undefined identifier 'x'");
        assert_eq!(diag.span(), Some(SourceSpan::new(2, 4)));
    }
}
