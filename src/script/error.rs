use thiserror::Error;

/// An error produced while compiling ODKeyScript source.
///
/// Both variants carry the 1-based line and column at which the error was
/// detected, matching the lexer/parser's location tracking.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScriptError {
    /// The lexer could not tokenize the source: an unterminated string or an
    /// unexpected character.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// Human-readable description of the problem.
        message: String,
        /// 1-based line number.
        line: usize,
        /// 1-based column number.
        column: usize,
    },
    /// The token stream was syntactically well-formed but violated a
    /// compile-time rule: an unknown key or modifier name, an operand out of
    /// range, too many keys or nested loops, a malformed `repeat` block.
    #[error("semantic error at line {line}, column {column}: {message}")]
    Semantic {
        /// Human-readable description of the problem.
        message: String,
        /// 1-based line number.
        line: usize,
        /// 1-based column number.
        column: usize,
    },
}

impl ScriptError {
    pub(crate) fn syntax(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            line,
            column,
        }
    }

    pub(crate) fn semantic(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::Semantic {
            message: message.into(),
            line,
            column,
        }
    }

    /// The line at which the error was detected.
    pub fn line(&self) -> usize {
        match self {
            ScriptError::Syntax { line, .. } | ScriptError::Semantic { line, .. } => *line,
        }
    }

    /// The column at which the error was detected.
    pub fn column(&self) -> usize {
        match self {
            ScriptError::Syntax { column, .. } | ScriptError::Semantic { column, .. } => *column,
        }
    }

    /// The human-readable description of the problem, without the
    /// `syntax error`/`semantic error` kind prefix or location.
    pub fn message(&self) -> &str {
        match self {
            ScriptError::Syntax { message, .. } | ScriptError::Semantic { message, .. } => message,
        }
    }
}
