//! Small building blocks shared by the type-name parsers.
//!
//! [`ParserState`] is a copyable cursor over the remaining part of the input.
//! Every operation returns a new state instead of mutating in place, so
//! speculative parsing is just a matter of keeping the old copy around.

use crate::errors::TypeParseErrorKind;

pub(crate) type ParserResult<T> = Result<T, ParseError>;

/// An error annotated with the place in the input where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseError {
    // Address of the first unparsed byte. Only ever compared against the
    // original input, never dereferenced.
    remaining_at: usize,
    cause: TypeParseErrorKind,
}

impl ParseError {
    pub(crate) fn get_cause(&self) -> &TypeParseErrorKind {
        &self.cause
    }

    pub(crate) fn into_cause(self) -> TypeParseErrorKind {
        self.cause
    }

    /// Byte offset of the error within `original`, provided that the parser
    /// state which produced it was derived from `original`.
    pub(crate) fn calculate_position(&self, original: &str) -> Option<usize> {
        calculate_position(original, self.remaining_at)
    }
}

fn calculate_position(original: &str, remaining_at: usize) -> Option<usize> {
    let start = original.as_ptr() as usize;
    if remaining_at < start || remaining_at > start + original.len() {
        return None;
    }
    Some(remaining_at - start)
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ParserState<'s> {
    pub(crate) s: &'s str,
}

impl<'s> ParserState<'s> {
    pub(crate) fn new(s: &'s str) -> Self {
        Self { s }
    }

    pub(crate) fn is_at_eof(self) -> bool {
        self.s.is_empty()
    }

    pub(crate) fn peek(self) -> Option<char> {
        self.s.chars().next()
    }

    /// Consumes `part` if the input starts with it.
    pub(crate) fn accept(self, part: &'static str) -> ParserResult<Self> {
        match self.s.strip_prefix(part) {
            Some(s) => Ok(Self { s }),
            None => {
                let expected = part.chars().next().unwrap_or('\0');
                Err(self.unexpected(expected))
            }
        }
    }

    pub(crate) fn skip_white(self) -> Self {
        Self {
            s: self.s.trim_start(),
        }
    }

    /// Skips blanks and, optionally, a single comma followed by more blanks.
    pub(crate) fn skip_blank_and_comma(self) -> Self {
        let p = self.skip_white();
        match p.accept(",") {
            Ok(p) => p.skip_white(),
            Err(_) => p,
        }
    }

    pub(crate) fn take_while(self, mut pred: impl FnMut(char) -> bool) -> (&'s str, Self) {
        let idx = self
            .s
            .char_indices()
            .find(|(_, c)| !pred(*c))
            .map(|(idx, _)| idx)
            .unwrap_or(self.s.len());
        let (consumed, rest) = self.s.split_at(idx);
        (consumed, Self { s: rest })
    }

    /// Returns the part of the input between `self` and `later`, where
    /// `later` is a state reached by advancing `self`.
    pub(crate) fn slice_until(self, later: ParserState<'s>) -> &'s str {
        let len = self.s.len().saturating_sub(later.s.len());
        &self.s[..len]
    }

    /// Captures a balanced, bracket-delimited group starting at the current
    /// position, e.g. `<int, map<text, "a>b">>` or `(Foo(Bar), Baz)`.
    ///
    /// Brackets and separators inside double-quoted identifiers do not count.
    /// The returned slice includes both outermost brackets.
    pub(crate) fn take_bracketed(self, open: char, close: char) -> ParserResult<(&'s str, Self)> {
        if self.peek() != Some(open) {
            return Err(self.unexpected(open));
        }

        let mut depth = 0usize;
        let mut in_quotes = false;
        for (idx, c) in self.s.char_indices() {
            if in_quotes {
                if c == '"' {
                    in_quotes = false;
                }
                continue;
            }
            if c == '"' {
                in_quotes = true;
            } else if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    let end = idx + c.len_utf8();
                    let (group, rest) = self.s.split_at(end);
                    return Ok((group, Self { s: rest }));
                }
            }
        }

        let eof = Self {
            s: &self.s[self.s.len()..],
        };
        Err(eof.error(TypeParseErrorKind::UnbalancedBrackets { open, close }))
    }

    pub(crate) fn error(self, cause: TypeParseErrorKind) -> ParseError {
        ParseError {
            remaining_at: self.s.as_ptr() as usize,
            cause,
        }
    }

    /// Reports that `expected` was required at the current position.
    pub(crate) fn unexpected(self, expected: char) -> ParseError {
        match self.peek() {
            Some(found) => self.error(TypeParseErrorKind::UnexpectedCharacter { found, expected }),
            None => self.error(TypeParseErrorKind::UnexpectedEndOfInput),
        }
    }
}

/// Characters allowed in an unquoted type or class name.
pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '+' || c == '-' || c == '_' || c == '.' || c == '&'
}

/// Parses a string of hexadecimal digits into bytes.
///
/// Strict: the length must be even and every character a hex digit.
pub(crate) fn from_hex(s: &str) -> Result<Vec<u8>, TypeParseErrorKind> {
    let bad_hex = || TypeParseErrorKind::BadHexString(s.to_owned());
    if s.len() % 2 != 0 {
        return Err(bad_hex());
    }
    s.as_bytes()
        .chunks_exact(2)
        .map(|pair| {
            let high = hex_value(pair[0]).ok_or_else(bad_hex)?;
            let low = hex_value(pair[1]).ok_or_else(bad_hex)?;
            Ok((high << 4) | low)
        })
        .collect()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decodes a hex-encoded name, as used for UDT and collection column names
/// in the legacy class-name syntax.
pub(crate) fn hex_to_string(s: &str) -> Result<String, TypeParseErrorKind> {
    let bytes = from_hex(s)?;
    String::from_utf8(bytes).map_err(|err| TypeParseErrorKind::InvalidUtf8(err.into_bytes()))
}
