use std::fmt;

use thiserror::Error;

/// A 1-based source position inside an `.iml` document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Everything that can make a compilation fail.
///
/// Compilation is all-or-nothing: the first error aborts the pass and no
/// instantiator is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImlError {
    #[error("iml error at {at}: {message}")]
    Lexical { message: String, at: Position },

    #[error("iml error at {at}: unknown element type `{name}`")]
    UnknownType { name: String, at: Position },

    #[error("iml error at {at}: `{parent}` cannot accept `{child}` ({reason})")]
    UnsupportedAttachment {
        parent: String,
        child: String,
        reason: String,
        at: Position,
    },

    #[error("iml error at {at}: `{ty}` has no {expected} named `{member}`")]
    MemberNotFound {
        ty: String,
        member: String,
        /// What kind of member the document asked for ("member", "property", "event", "method").
        expected: &'static str,
        at: Position,
    },

    #[error("iml error at {at}: cannot resolve name `{name}`: {reason}")]
    UnresolvedName {
        name: String,
        reason: String,
        at: Position,
    },

    #[error("iml error at {at}: invalid binding expression `{expression}`: {reason}")]
    InvalidBinding {
        expression: String,
        reason: String,
        at: Position,
    },

    #[error("iml error at {at}: `{value}` is not a valid {expected} for `{member}`")]
    InvalidLiteral {
        member: String,
        value: String,
        expected: String,
        at: Position,
    },
}

impl ImlError {
    pub(crate) fn lexical(message: impl Into<String>, at: Position) -> Self {
        Self::Lexical { message: message.into(), at }
    }

    /// Source position of the offending construct.
    pub fn position(&self) -> Position {
        match self {
            Self::Lexical { at, .. }
            | Self::UnknownType { at, .. }
            | Self::UnsupportedAttachment { at, .. }
            | Self::MemberNotFound { at, .. }
            | Self::UnresolvedName { at, .. }
            | Self::InvalidBinding { at, .. }
            | Self::InvalidLiteral { at, .. } => *at,
        }
    }
}

pub type Result<T> = std::result::Result<T, ImlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_position() {
        let e = ImlError::UnknownType { name: "Frob".into(), at: Position::new(3, 7) };
        assert_eq!(e.to_string(), "iml error at 3:7: unknown element type `Frob`");
        assert_eq!(e.position(), Position::new(3, 7));
    }
}
