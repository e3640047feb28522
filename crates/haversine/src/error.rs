use core::fmt;

use thiserror::Error;

use crate::value::JsonKind;

/// A parse failure, located at a line and column of the input.
///
/// The parser stops at the first error; no partial value is ever returned
/// alongside it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{source} at {line}:{column}")]
pub struct ParserError {
    pub(crate) source: ErrorSource,
    /// Byte offset of the offending input.
    pub offset: usize,
    /// 1-based line of `offset`.
    pub line: usize,
    /// 1-based column of `offset`, counted in bytes.
    pub column: usize,
}

impl ParserError {
    /// What went wrong, without the location.
    #[must_use]
    pub fn kind(&self) -> &ErrorSource {
        &self.source
    }

    /// Returns the syntax error, if this is one.
    #[must_use]
    pub fn syntax(&self) -> Option<&SyntaxError> {
        match &self.source {
            ErrorSource::Syntax(err) => Some(err),
            ErrorSource::Arena(_) => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorSource {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("allocation failed: {0}")]
    Arena(#[from] ArenaError),
}

/// The JSON construct being parsed when an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    Value,
    Object,
    Array,
    String,
    Number,
    Literal,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Construct::Value => "value",
            Construct::Object => "object",
            Construct::Array => "array",
            Construct::String => "string",
            Construct::Number => "number",
            Construct::Literal => "literal",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("invalid character '{}' while parsing {construct}", .found.escape_ascii())]
    InvalidCharacter { found: u8, construct: Construct },
    #[error("unexpected end of input while parsing {0}")]
    UnexpectedEndOfInput(Construct),
    #[error("expected literal `{0}`")]
    InvalidLiteral(&'static str),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error(transparent)]
    ObjectFull(#[from] ObjectFull),
    #[error("nesting deeper than {0} levels")]
    DepthLimitExceeded(usize),
    #[error("unexpected trailing characters after the document")]
    TrailingCharacters,
}

/// Every slot of a fixed-capacity object table is taken.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("object holds more than {capacity} keys")]
pub struct ObjectFull {
    pub capacity: usize,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    #[error("arena out of memory: requested {requested} bytes with {used} of {capacity} in use")]
    OutOfMemory {
        requested: usize,
        used: usize,
        capacity: usize,
    },
}

/// An accessor was called against the wrong [`JsonValue`](crate::JsonValue) variant.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("expected {expected}, found {found}")]
pub struct TypeMismatch {
    pub expected: JsonKind,
    pub found: JsonKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_names() {
        let names = [
            Construct::Value,
            Construct::Object,
            Construct::Array,
            Construct::String,
            Construct::Number,
            Construct::Literal,
        ]
        .map(|construct| construct.to_string());
        assert_eq!(names, ["value", "object", "array", "string", "number", "literal"]);
        assert_eq!(
            SyntaxError::UnexpectedEndOfInput(Construct::String).to_string(),
            "unexpected end of input while parsing string"
        );
    }
}
