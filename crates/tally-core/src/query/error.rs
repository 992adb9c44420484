//! Parse errors with source positions.

use std::fmt;

/// Error produced by the query text parser.
///
/// `line` and `column` are 1-based positions into the query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Kind of error.
    pub kind: ParseErrorKind,
    /// Line of the offending input.
    pub line: usize,
    /// Column within the line.
    pub column: usize,
    /// Human-readable message.
    pub message: String,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(
        kind: ParseErrorKind,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            line,
            column,
            message: message.into(),
        }
    }

    /// Creates a syntax error.
    pub(crate) fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::Syntax, line, column, message)
    }

    /// Creates an expected-but-got error.
    pub(crate) fn unexpected(line: usize, column: usize, expected: &str, got: &str) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedToken,
            line,
            column,
            format!("expected {expected}, got {got} instead"),
        )
    }

    /// Creates a malformed-placeholder error.
    pub(crate) fn placeholder(line: usize, column: usize, fragment: &str) -> Self {
        Self::new(
            ParseErrorKind::InvalidPlaceholder,
            line,
            column,
            format!("malformed placeholder {fragment}"),
        )
    }

    /// Creates an unterminated-value error.
    pub(crate) fn unterminated(line: usize, column: usize) -> Self {
        Self::new(
            ParseErrorKind::UnterminatedValue,
            line,
            column,
            "unterminated string value",
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Kind of parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Grammar violation or unknown token.
    Syntax,
    /// A specific token was expected.
    UnexpectedToken,
    /// Placeholder is malformed or `$0`.
    InvalidPlaceholder,
    /// A quoted value is missing its closing quote.
    UnterminatedValue,
}

impl ParseErrorKind {
    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Syntax | Self::UnexpectedToken => "Q001",
            Self::InvalidPlaceholder => "Q002",
            Self::UnterminatedValue => "Q003",
        }
    }
}
