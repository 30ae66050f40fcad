//! Tokenizer of WKT (Well-Known Text) geometry literals such as
//! `POLYGON ((0 0, 1 0, 1 1, 0 0))`.
//!
//! Keywords are case-sensitive and must be upper case. The lexer holds no
//! state besides its position, so a clone can be used to look ahead
//! without disturbing the original.

use crate::errors::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WktToken {
    Eof,
    Invalid,
    TypePoint,
    TypeLineString,
    TypePolygon,
    Number,
    Comma,
    Empty,
    OpenParen,
    CloseParen,
}

const KEYWORDS: [(&[u8], WktToken); 4] = [
    (b"POINT", WktToken::TypePoint),
    (b"LINESTRING", WktToken::TypeLineString),
    (b"POLYGON", WktToken::TypePolygon),
    (b"EMPTY", WktToken::Empty),
];

#[derive(Debug, Clone)]
pub struct WktLexer<'a> {
    text: &'a [u8],
    position: usize,
    skip_number: bool,
    number: f64,
}

impl<'a> WktLexer<'a> {
    /// Creates a lexer over `text`. With `skip_number` set, numbers are
    /// recognized but not converted, and [`WktLexer::number`] keeps
    /// returning 0.
    pub fn new(text: &'a str, skip_number: bool) -> Self {
        Self {
            text: text.as_bytes(),
            position: 0,
            skip_number,
            number: 0.0,
        }
    }

    /// A copy of this lexer, at the same position, with the given number mode.
    pub fn with_skip_number(&self, skip_number: bool) -> Self {
        Self {
            skip_number,
            ..self.clone()
        }
    }

    /// The value of the last [`WktToken::Number`] returned.
    pub fn number(&self) -> f64 {
        self.number
    }

    pub fn next_token(&mut self) -> WktToken {
        while let Some(b' ' | b'\t' | b'\r' | b'\n') = self.text.get(self.position) {
            self.position += 1;
        }

        let rest = &self.text[self.position..];
        let first = match rest.first() {
            Some(b) => *b,
            None => return WktToken::Eof,
        };

        let single = match first {
            b'(' => Some(WktToken::OpenParen),
            b')' => Some(WktToken::CloseParen),
            b',' => Some(WktToken::Comma),
            _ => None,
        };
        if let Some(token) = single {
            self.position += 1;
            return token;
        }

        for (keyword, token) in KEYWORDS {
            if rest.starts_with(keyword) {
                self.position += keyword.len();
                return token;
            }
        }

        if let Some(len) = number_len(rest) {
            let literal = &rest[..len];
            self.position += len;
            if self.skip_number {
                return WktToken::Number;
            }
            return match std::str::from_utf8(literal).ok().and_then(|s| s.parse().ok()) {
                Some(number) => {
                    self.number = number;
                    WktToken::Number
                }
                None => WktToken::Invalid,
            };
        }

        self.position += 1;
        WktToken::Invalid
    }
}

/// Length of the number literal at the start of `s`:
/// `[+-]? (digits ('.' digits*)? | '.' digits) ([eE] [+-]? digits)?`.
/// An exponent marker not followed by digits is not part of the number.
fn number_len(s: &[u8]) -> Option<usize> {
    let digits_at = |pos: usize| {
        s.get(pos..)
            .map_or(0, |tail| tail.iter().take_while(|b| b.is_ascii_digit()).count())
    };

    let mut pos = 0;
    if let Some(b'+' | b'-') = s.first() {
        pos += 1;
    }

    let integral = digits_at(pos);
    pos += integral;
    if s.get(pos) == Some(&b'.') {
        let fractional = digits_at(pos + 1);
        if integral == 0 && fractional == 0 {
            return None;
        }
        pos += 1 + fractional;
    } else if integral == 0 {
        return None;
    }

    if let Some(b'e' | b'E') = s.get(pos) {
        let mut exp = pos + 1;
        if let Some(b'+' | b'-') = s.get(exp) {
            exp += 1;
        }
        let exp_digits = digits_at(exp);
        if exp_digits > 0 {
            pos = exp + exp_digits;
        }
    }
    Some(pos)
}

/// Reads `x y, x y, ... )` following an opening parenthesis and returns the
/// number of points. Fails on anything that is not a list of coordinate
/// pairs closed by a parenthesis.
pub(crate) fn count_points(lexer: &mut WktLexer<'_>) -> Result<u32, CodecError> {
    let bad = || CodecError::BadParams("malformed WKT point list".to_owned());

    let mut num_points = 0u32;
    let mut token = lexer.next_token();
    while token != WktToken::Eof && token != WktToken::CloseParen {
        if token != WktToken::Number || lexer.next_token() != WktToken::Number {
            return Err(bad());
        }
        num_points = num_points.checked_add(1).ok_or_else(bad)?;

        token = lexer.next_token();
        if token == WktToken::Comma {
            token = lexer.next_token();
            if token != WktToken::Number {
                return Err(bad());
            }
        }
    }
    if token != WktToken::CloseParen {
        return Err(bad());
    }
    Ok(num_points)
}
