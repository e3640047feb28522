//! The JSON reader.
//!
//! Each construct is parsed by its own explicit state machine, driven
//! directly over the input bytes with a shared cursor. There is no separate
//! tokenizer: the value dispatcher looks at one byte and hands the cursor to
//! the object, array, string, number or literal machine, which consumes
//! exactly the bytes of its construct.
//!
//! The reader targets trusted, self-generated input. Escape sequences are not
//! interpreted: any `"` ends a string.
//!
//! # Examples
//!
//! ```rust
//! use haversine::{Arena, ParserOptions, parse};
//!
//! let arena = Arena::with_capacity(4096);
//! let doc = parse(b"[{\"x0\": 1, \"y0\": 2}]", &arena, ParserOptions::default())?;
//! let first = doc.as_array()?.get(0).unwrap();
//! assert_eq!(first.get("y0").unwrap().as_f64()?, 2.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![allow(clippy::enum_glob_use)]

use bstr::ByteSlice;

use crate::{
    arena::Arena,
    error::{Construct, ErrorSource, ParserError, SyntaxError},
    options::{ParserOptions, StringMode},
    span::ByteSpan,
    value::{JsonArray, JsonObject, JsonValue, Probe},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectState {
    Begin,
    Key,
    Colon,
    Value,
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    Begin,
    Value,
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringState {
    BeginQuote,
    Text,
    EndQuote,
}

#[inline]
fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

#[inline]
fn is_number_byte(byte: u8) -> bool {
    matches!(byte, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}

/// Parses a complete document: one value, optionally surrounded by
/// whitespace.
///
/// # Errors
///
/// Returns a [`ParserError`] for malformed input, premature end of input,
/// bytes after the value, or when the arena runs out of space.
pub fn parse<'a>(
    input: &'a [u8],
    arena: &'a Arena,
    options: ParserOptions,
) -> Result<JsonValue<'a>, ParserError> {
    tracing::debug!(bytes = input.len(), ?options.string_mode, "parsing JSON document");
    let mut parser = Parser::new(input, arena, options);
    let value = parser.parse_value()?;
    parser.finish()?;
    tracing::debug!(arena_used = arena.used(), "parsed JSON document");
    Ok(value)
}

/// A cursor over an input buffer.
#[derive(Debug)]
pub struct Parser<'a> {
    input: &'a [u8],
    /// Offset of the next unread byte.
    at: usize,
    /// Length of the text measured by the string machine, not yet consumed.
    pending: usize,
    depth: usize,
    arena: &'a Arena,
    options: ParserOptions,
}

impl<'a> Parser<'a> {
    /// Creates a parser positioned at the start of `input`. Copied strings
    /// are allocated from `arena`.
    #[must_use]
    pub fn new(input: &'a [u8], arena: &'a Arena, options: ParserOptions) -> Self {
        Self {
            input,
            at: 0,
            pending: 0,
            depth: 0,
            arena,
            options,
        }
    }

    /// Offset of the next unread byte.
    #[must_use]
    pub fn position(&self) -> usize {
        self.at
    }

    /// Parses the value starting at the cursor and leaves the cursor just
    /// past it.
    ///
    /// # Errors
    ///
    /// See [`parse`].
    pub fn parse_value(&mut self) -> Result<JsonValue<'a>, ParserError> {
        self.skip_whitespace();
        let Some(byte) = self.peek() else {
            return Err(self.eof(Construct::Value));
        };

        match byte {
            b'{' => self.nested(Self::parse_object).map(JsonValue::Object),
            b'[' => self.nested(Self::parse_array).map(JsonValue::Array),
            b'"' => self.parse_string().map(JsonValue::String),
            b'0'..=b'9' | b'-' | b'.' => self.parse_number().map(JsonValue::Number),
            b't' | b'f' => self.parse_bool().map(JsonValue::Bool),
            b'n' => self.parse_null().map(|()| JsonValue::Null),
            other => Err(self.invalid(self.at, other, Construct::Value)),
        }
    }

    /// Accepts trailing whitespace and requires the input to end there.
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError::TrailingCharacters`] if anything else follows.
    pub fn finish(&mut self) -> Result<(), ParserError> {
        self.skip_whitespace();
        if self.at < self.input.len() {
            return Err(self.error_at(self.at, SyntaxError::TrailingCharacters.into()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------------------------------
    // Cursor helpers
    // ------------------------------------------------------------------------------------------------

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.input.get(self.at).copied()
    }

    #[inline]
    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(is_whitespace) {
            self.at += 1;
        }
    }

    /// Skips whitespace, then consumes and returns one byte.
    #[inline]
    fn next_significant(&mut self, construct: Construct) -> Result<u8, ParserError> {
        self.skip_whitespace();
        let byte = self.peek().ok_or_else(|| self.eof(construct))?;
        self.at += 1;
        Ok(byte)
    }

    /// Skips whitespace and fails if nothing is left.
    #[inline]
    fn require_more(&mut self, construct: Construct) -> Result<(), ParserError> {
        self.skip_whitespace();
        if self.at >= self.input.len() {
            return Err(self.eof(construct));
        }
        Ok(())
    }

    fn nested<T>(&mut self, parse: fn(&mut Self) -> Result<T, ParserError>) -> Result<T, ParserError> {
        if self.depth >= self.options.max_depth {
            return Err(self.error_at(
                self.at,
                SyntaxError::DepthLimitExceeded(self.options.max_depth).into(),
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ------------------------------------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------------------------------------

    fn error_at(&self, offset: usize, source: ErrorSource) -> ParserError {
        let offset = offset.min(self.input.len());
        let before = &self.input[..offset];
        let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
        let column = match before.rfind_byte(b'\n') {
            Some(newline) => offset - newline,
            None => offset + 1,
        };
        ParserError {
            source,
            offset,
            line,
            column,
        }
    }

    fn eof(&self, construct: Construct) -> ParserError {
        self.error_at(
            self.input.len(),
            SyntaxError::UnexpectedEndOfInput(construct).into(),
        )
    }

    fn invalid(&self, offset: usize, found: u8, construct: Construct) -> ParserError {
        self.error_at(
            offset,
            SyntaxError::InvalidCharacter { found, construct }.into(),
        )
    }

    // ------------------------------------------------------------------------------------------------
    // State machines
    // ------------------------------------------------------------------------------------------------

    fn parse_object(&mut self) -> Result<JsonObject<'a>, ParserError> {
        use ObjectState::*;

        let mut object = JsonObject::with_capacity(self.options.object_capacity);
        let mut state = Begin;
        let mut key = ByteSpan::default();
        let mut slot = Probe::Vacant(0);

        loop {
            match state {
                Begin => match self.next_significant(Construct::Object)? {
                    b'{' => {
                        self.skip_whitespace();
                        if self.peek() == Some(b'}') {
                            self.at += 1;
                            return Ok(object);
                        }
                        state = Key;
                    }
                    other => return Err(self.invalid(self.at - 1, other, Construct::Object)),
                },
                Key => {
                    self.require_more(Construct::Object)?;
                    if let Some(other) = self.peek().filter(|b| *b != b'"') {
                        return Err(self.invalid(self.at, other, Construct::Object));
                    }
                    let key_start = self.at;
                    key = self.parse_string()?;
                    slot = object
                        .probe(key.as_bytes())
                        .map_err(|full| self.error_at(key_start, SyntaxError::from(full).into()))?;
                    state = Colon;
                }
                Colon => match self.next_significant(Construct::Object)? {
                    b':' => state = Value,
                    other => return Err(self.invalid(self.at - 1, other, Construct::Object)),
                },
                Value => {
                    self.require_more(Construct::Object)?;
                    let value = self.parse_value()?;
                    object.fill(slot, key, value);
                    state = CommaOrEnd;
                }
                CommaOrEnd => match self.next_significant(Construct::Object)? {
                    b',' => state = Key,
                    b'}' => return Ok(object),
                    other => return Err(self.invalid(self.at - 1, other, Construct::Object)),
                },
            }
        }
    }

    fn parse_array(&mut self) -> Result<JsonArray<'a>, ParserError> {
        use ArrayState::*;

        let mut array = JsonArray::new();
        let mut state = Begin;

        loop {
            match state {
                Begin => match self.next_significant(Construct::Array)? {
                    b'[' => {
                        self.skip_whitespace();
                        if self.peek() == Some(b']') {
                            self.at += 1;
                            return Ok(array);
                        }
                        state = Value;
                    }
                    other => return Err(self.invalid(self.at - 1, other, Construct::Array)),
                },
                Value => {
                    self.require_more(Construct::Array)?;
                    array.push(self.parse_value()?);
                    state = CommaOrEnd;
                }
                CommaOrEnd => match self.next_significant(Construct::Array)? {
                    b',' => state = Value,
                    b']' => return Ok(array),
                    other => return Err(self.invalid(self.at - 1, other, Construct::Array)),
                },
            }
        }
    }

    /// Measures the text up to the closing quote, then copies (or borrows)
    /// exactly that many bytes.
    fn parse_string(&mut self) -> Result<ByteSpan<'a>, ParserError> {
        use StringState::*;

        let mut state = BeginQuote;
        self.pending = 0;

        loop {
            match state {
                BeginQuote => match self.next_significant(Construct::String)? {
                    b'"' => state = Text,
                    other => return Err(self.invalid(self.at - 1, other, Construct::String)),
                },
                Text => match self.input[self.at..].find_byte(b'"') {
                    Some(len) => {
                        self.pending = len;
                        state = EndQuote;
                    }
                    None => return Err(self.eof(Construct::String)),
                },
                EndQuote => {
                    let input = self.input;
                    let text = &input[self.at..self.at + self.pending];
                    let span = match self.options.string_mode {
                        StringMode::View => ByteSpan::view(text),
                        StringMode::Copy => ByteSpan::copied(
                            self.arena
                                .alloc_bytes(text)
                                .map_err(|err| self.error_at(self.at, err.into()))?,
                        ),
                    };
                    // text plus the closing quote
                    self.at += self.pending + 1;
                    self.pending = 0;
                    return Ok(span);
                }
            }
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParserError> {
        let start = self.at;
        let len = self.input[start..]
            .iter()
            .take_while(|b| is_number_byte(**b))
            .count();
        let lexeme = &self.input[start..start + len];

        let value = lexeme
            .to_str()
            .ok()
            .and_then(|text| text.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .ok_or_else(|| {
                self.error_at(
                    start,
                    SyntaxError::InvalidNumber(lexeme.to_str_lossy().into_owned()).into(),
                )
            })?;

        self.at += len;
        Ok(value)
    }

    /// Matches `literal` exactly and advances by its length.
    fn parse_literal(&mut self, literal: &'static str) -> Result<(), ParserError> {
        let end = self.at + literal.len();
        match self.input.get(self.at..end) {
            Some(found) if found == literal.as_bytes() => {
                self.at = end;
                Ok(())
            }
            None if literal.as_bytes().starts_with(&self.input[self.at..]) => {
                Err(self.eof(Construct::Literal))
            }
            _ => Err(self.error_at(self.at, SyntaxError::InvalidLiteral(literal).into())),
        }
    }

    fn parse_bool(&mut self) -> Result<bool, ParserError> {
        if self.peek() == Some(b't') {
            self.parse_literal("true").map(|()| true)
        } else {
            self.parse_literal("false").map(|()| false)
        }
    }

    fn parse_null(&mut self) -> Result<(), ParserError> {
        self.parse_literal("null")
    }
}
