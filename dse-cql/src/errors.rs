//! Errors returned by the type-name parsers and the value codecs.

use thiserror::Error;

/// A type name (as sent by the server in column metadata) could not be parsed.
///
/// Carries the whole input and the byte position at which the parser gave up,
/// so that the offending metadata can be reported verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to parse type name \"{input}\" at position {position}: {kind}")]
pub struct TypeParseError {
    /// The type name that was being parsed.
    pub input: String,
    /// Byte offset into `input` where the error was detected.
    pub position: usize,
    /// What went wrong.
    pub kind: TypeParseErrorKind,
}

/// The reason a type name could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TypeParseErrorKind {
    #[error("Unexpected end of input")]
    UnexpectedEndOfInput,

    #[error("Expected character '{expected}', found '{found}'")]
    UnexpectedCharacter { found: char, expected: char },

    #[error("Brackets '{open}' and '{close}' are not balanced")]
    UnbalancedBrackets { open: char, close: char },

    #[error("Type {type_name} expects {expected} parameter(s), got {actual}")]
    InvalidParameterCount {
        type_name: &'static str,
        actual: usize,
        expected: usize,
    },

    #[error("Type {type_name} expects at least one parameter")]
    MissingParameters { type_name: &'static str },

    #[error("Empty type name")]
    EmptyTypeName,

    #[error("Invalid hex string: {0}")]
    BadHexString(String),

    #[error("Hex-decoded name is not valid UTF-8: {0:?}")]
    InvalidUtf8(Vec<u8>),

    #[error("User defined type has no keyspace or type name")]
    MissingUserTypeName,
}

/// Failure to encode or decode a geometry or date range value.
///
/// The variants are distinct, recoverable result codes; a truncated or
/// corrupt value never causes a read past the end of the buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// The value's column type or text literal does not match the requested kind.
    #[error("Bad parameters: {0}")]
    BadParams(String),

    /// The buffer ends before the data its header declares.
    #[error("Not enough data: expected at least {expected} bytes, got {received}")]
    NotEnoughData { expected: usize, received: usize },

    /// The buffer is well-sized but its contents are not valid.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// An operation was called at a point where it is not allowed.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),
}

impl CodecError {
    pub(crate) fn not_enough_data(expected: usize, received: usize) -> Self {
        CodecError::NotEnoughData { expected, received }
    }
}
