//! Parser of type names in CQL syntax, e.g. `map<text, frozen<list<"MyType">>>`.
//!
//! This is the form used by schema tables and by modern protocol metadata.
//! Names that are neither native types nor one of the structural keywords
//! (`list`, `set`, `map`, `tuple`, `frozen`, `empty`) refer to user defined
//! types of the keyspace being parsed.

use tracing::error;

use super::{DataType, KeyspaceMetadata, NativeTypes, UserTypeDefinition};
use crate::errors::{TypeParseError, TypeParseErrorKind};
use crate::utils::parse::{is_identifier_char, ParserResult, ParserState};

/// Parses `input` into a [`DataType`].
///
/// User defined types are resolved through `keyspace`, creating empty
/// registry slots for names seen for the first time. Text following a
/// complete type name is ignored.
pub fn parse_cql_type(
    input: &str,
    native_types: &NativeTypes,
    keyspace: &mut KeyspaceMetadata,
) -> Result<DataType, TypeParseError> {
    let mut parser = CqlTypeParser {
        native_types,
        keyspace,
    };
    parser.parse(input, false).map_err(|err| {
        let position = err.calculate_position(input).unwrap_or(0);
        error!(
            "Failed to parse CQL type {:?} at position {}: {}",
            input,
            position,
            err.get_cause()
        );
        TypeParseError {
            input: input.to_owned(),
            position,
            kind: err.into_cause(),
        }
    })
}

struct CqlTypeParser<'a> {
    native_types: &'a NativeTypes,
    keyspace: &'a mut KeyspaceMetadata,
}

impl CqlTypeParser<'_> {
    fn parse(&mut self, input: &str, frozen: bool) -> ParserResult<DataType> {
        let p = ParserState::new(input).skip_white();
        let (raw_name, p) = read_identifier(p);
        let name = match TypeName::from_raw(raw_name) {
            Some(name) => name,
            None => return Err(p.error(TypeParseErrorKind::EmptyTypeName)),
        };

        if let TypeName::Unquoted(keyword) = &name {
            if let Some(native) = self.native_types.by_cql_name(keyword) {
                return Ok(DataType::Native(native));
            }

            match keyword.as_str() {
                "list" => {
                    let [element] = parse_n_type_parameters(p, "list")?;
                    return Ok(DataType::list(self.parse(element, false)?, frozen));
                }
                "set" => {
                    let [element] = parse_n_type_parameters(p, "set")?;
                    return Ok(DataType::set(self.parse(element, false)?, frozen));
                }
                "map" => {
                    let [key, value] = parse_n_type_parameters(p, "map")?;
                    let key = self.parse(key, false)?;
                    let value = self.parse(value, false)?;
                    return Ok(DataType::map(key, value, frozen));
                }
                "tuple" => {
                    let params = parse_type_parameters(p)?;
                    if params.is_empty() {
                        return Err(p.error(TypeParseErrorKind::MissingParameters {
                            type_name: "tuple",
                        }));
                    }
                    let elements = params
                        .into_iter()
                        .map(|param| self.parse(param, false))
                        .collect::<ParserResult<Vec<_>>>()?;
                    return Ok(DataType::tuple(elements, frozen));
                }
                "frozen" => {
                    let [inner] = parse_n_type_parameters(p, "frozen")?;
                    return self.parse(inner, true);
                }
                "empty" => return Ok(DataType::Custom("empty".to_owned())),
                _ => (),
            }
        }

        let type_name = name.into_string();
        let id = self.keyspace.get_or_create_user_type(&type_name);
        Ok(DataType::UserDefinedType {
            frozen,
            definition: UserTypeDefinition::Registered {
                keyspace: self.keyspace.name().to_owned(),
                name: type_name,
                id,
            },
        })
    }
}

enum TypeName {
    /// Case-folded; may be a keyword.
    Unquoted(String),
    /// Case preserved, escapes resolved; never a keyword.
    Quoted(String),
}

impl TypeName {
    fn from_raw(raw: &str) -> Option<Self> {
        let name = match raw.strip_prefix('"') {
            Some(quoted) => {
                let quoted = quoted.strip_suffix('"').unwrap_or(quoted);
                TypeName::Quoted(quoted.replace("\"\"", "\""))
            }
            None => TypeName::Unquoted(raw.to_lowercase()),
        };
        match &name {
            TypeName::Unquoted(s) | TypeName::Quoted(s) if s.is_empty() => None,
            _ => Some(name),
        }
    }

    fn into_string(self) -> String {
        match self {
            TypeName::Unquoted(s) | TypeName::Quoted(s) => s,
        }
    }
}

/// Reads a bare identifier, or a double-quoted one in which `""` stands for
/// a literal quote. The quotes are part of the returned slice. An unclosed
/// quoted identifier extends to the end of the input.
fn read_identifier(p: ParserState<'_>) -> (&str, ParserState<'_>) {
    if p.peek() != Some('"') {
        return p.take_while(|c| is_identifier_char(c) || c == '"');
    }

    let bytes = p.s.as_bytes();
    let mut end = bytes.len();
    let mut idx = 1;
    while idx < bytes.len() {
        if bytes[idx] == b'"' {
            if bytes.get(idx + 1) == Some(&b'"') {
                idx += 2;
                continue;
            }
            end = idx + 1;
            break;
        }
        idx += 1;
    }
    let (ident, rest) = p.s.split_at(end);
    (ident, ParserState::new(rest))
}

/// Splits `<a, b<c>, "d">` into its raw top-level parameters, each of which
/// is parsed only when the caller descends into it.
///
/// Absence of any parameter list yields an empty list, which callers turn
/// into an arity error.
fn parse_type_parameters(p: ParserState<'_>) -> ParserResult<Vec<&str>> {
    let p = p.skip_white();
    if p.is_at_eof() {
        return Ok(Vec::new());
    }
    let mut p = p.accept("<")?;

    let mut params = Vec::new();
    loop {
        p = p.skip_blank_and_comma();
        if p.is_at_eof() {
            return Err(p.error(TypeParseErrorKind::UnexpectedEndOfInput));
        }
        if p.accept(">").is_ok() {
            return Ok(params);
        }

        let start = p;
        let (_, after_name) = read_identifier(p);
        let after_args = skip_raw_type_parameters(after_name)?;
        let param = start.slice_until(after_args);
        if param.is_empty() {
            return Err(start.error(TypeParseErrorKind::EmptyTypeName));
        }
        params.push(param);
        p = after_args;
    }
}

fn parse_n_type_parameters<'a, const N: usize>(
    p: ParserState<'a>,
    type_name: &'static str,
) -> ParserResult<[&'a str; N]> {
    let params = parse_type_parameters(p)?;
    let actual = params.len();
    params.try_into().map_err(|_| {
        p.error(TypeParseErrorKind::InvalidParameterCount {
            type_name,
            actual,
            expected: N,
        })
    })
}

// Skips the angle-bracketed arguments that may follow a parameter's name.
fn skip_raw_type_parameters(p: ParserState<'_>) -> ParserResult<ParserState<'_>> {
    let p = p.skip_white();
    match p.peek() {
        None | Some('>') | Some(',') => Ok(p),
        Some('<') => {
            let (_, rest) = p.take_bracketed('<', '>')?;
            Ok(rest)
        }
        Some(_) => Err(p.unexpected('<')),
    }
}
