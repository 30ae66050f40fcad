//! Parser of the legacy type names built out of Cassandra marshaller class
//! names, e.g.
//! `org.apache.cassandra.db.marshal.MapType(org.apache.cassandra.db.marshal.UTF8Type,org.apache.cassandra.db.marshal.Int32Type)`.
//!
//! Older protocol versions describe column types this way. Besides single
//! types, this syntax also carries `CompositeType(...)`, the legacy encoding
//! of compound clustering keys, see [`parse_with_composite`].

use std::collections::HashMap;

use tracing::{debug, error, warn};

use super::{DataType, NativeTypes, ParseResult, UserType, UserTypeDefinition};
use crate::errors::{TypeParseError, TypeParseErrorKind};
use crate::utils::parse::{hex_to_string, is_identifier_char, ParseError, ParserResult, ParserState};

const REVERSED_TYPE: &str = "org.apache.cassandra.db.marshal.ReversedType";
const FROZEN_TYPE: &str = "org.apache.cassandra.db.marshal.FrozenType";
const COMPOSITE_TYPE: &str = "org.apache.cassandra.db.marshal.CompositeType";
const COLLECTION_TYPE: &str = "org.apache.cassandra.db.marshal.ColumnToCollectionType";

const LIST_TYPE: &str = "org.apache.cassandra.db.marshal.ListType";
const SET_TYPE: &str = "org.apache.cassandra.db.marshal.SetType";
const MAP_TYPE: &str = "org.apache.cassandra.db.marshal.MapType";
const UDT_TYPE: &str = "org.apache.cassandra.db.marshal.UserType";
const TUPLE_TYPE: &str = "org.apache.cassandra.db.marshal.TupleType";

/// Parses a single (non-composite) class name into a [`DataType`].
///
/// `ReversedType(..)` only affects sort order and is unwrapped.
/// `FrozenType(..)` marks the wrapped collection as frozen. Class names
/// unknown to `native_types` become [`DataType::Custom`].
pub fn parse_one(input: &str, native_types: &NativeTypes) -> Result<DataType, TypeParseError> {
    ClassNameParser { native_types }
        .parse(input, false)
        .map_err(|err| into_type_parse_error(input, err))
}

/// Parses a class name which may be a `CompositeType(...)`.
///
/// For anything else the result holds the single parsed type. For a
/// composite it holds one type per component, and the column types declared
/// by a trailing `ColumnToCollectionType(...)`, keyed by column name.
pub fn parse_with_composite(
    input: &str,
    native_types: &NativeTypes,
) -> Result<ParseResult, TypeParseError> {
    ClassNameParser { native_types }
        .parse_with_composite(input)
        .map_err(|err| into_type_parse_error(input, err))
}

fn into_type_parse_error(input: &str, err: ParseError) -> TypeParseError {
    let position = err.calculate_position(input).unwrap_or(0);
    error!(
        "Failed to parse class name {:?} at position {}: {}",
        input,
        position,
        err.get_cause()
    );
    TypeParseError {
        input: input.to_owned(),
        position,
        kind: err.into_cause(),
    }
}

fn is_reversed(class_name: &str) -> bool {
    class_name.trim_start().starts_with(REVERSED_TYPE)
}

struct ClassNameParser<'a> {
    native_types: &'a NativeTypes,
}

impl ClassNameParser<'_> {
    fn parse_with_composite(&self, input: &str) -> ParserResult<ParseResult> {
        let (name, p) = read_name(ParserState::new(input));
        if name != COMPOSITE_TYPE {
            let typ = self.parse(input, false)?;
            return Ok(ParseResult::single(typ, name == REVERSED_TYPE));
        }

        let mut components = get_type_params(p)?;
        let last = match components.last() {
            Some(last) => *last,
            None => {
                return Err(p.error(TypeParseErrorKind::MissingParameters {
                    type_name: "CompositeType",
                }))
            }
        };

        let mut collections = HashMap::new();
        let (last_name, after_last_name) = read_name(ParserState::new(last));
        if last_name == COLLECTION_TYPE {
            components.pop();
            for (column_name, class_name) in get_collection_params(after_last_name)? {
                let typ = self.parse(class_name, false)?;
                collections.insert(column_name, typ);
            }
        }

        let types = components
            .iter()
            .map(|component| self.parse(component, false))
            .collect::<ParserResult<Vec<_>>>()?;
        let reversed = components.iter().map(|c| is_reversed(c)).collect();
        Ok(ParseResult::composite(types, reversed, collections))
    }

    fn parse(&self, input: &str, frozen: bool) -> ParserResult<DataType> {
        let (name, p) = read_name(ParserState::new(input));

        match name {
            REVERSED_TYPE => {
                let [inner] = get_n_type_params(p, "ReversedType")?;
                return self.parse(inner, frozen);
            }
            FROZEN_TYPE => {
                let [inner] = get_n_type_params(p, "FrozenType")?;
                return self.parse(inner, true);
            }
            LIST_TYPE => {
                let [element] = get_n_type_params(p, "ListType")?;
                return Ok(DataType::list(self.parse(element, false)?, frozen));
            }
            SET_TYPE => {
                let [element] = get_n_type_params(p, "SetType")?;
                return Ok(DataType::set(self.parse(element, false)?, frozen));
            }
            MAP_TYPE => {
                let [key, value] = get_n_type_params(p, "MapType")?;
                let key = self.parse(key, false)?;
                let value = self.parse(value, false)?;
                return Ok(DataType::map(key, value, frozen));
            }
            UDT_TYPE => return self.parse_user_type(p),
            TUPLE_TYPE => {
                let params = get_type_params(p)?;
                if params.is_empty() {
                    return Err(p.error(TypeParseErrorKind::MissingParameters {
                        type_name: "TupleType",
                    }));
                }
                let elements = params
                    .into_iter()
                    .map(|param| self.parse(param, false))
                    .collect::<ParserResult<Vec<_>>>()?;
                return Ok(DataType::tuple(elements, true));
            }
            "" => return Err(p.error(TypeParseErrorKind::EmptyTypeName)),
            _ => (),
        }

        if frozen {
            warn!(
                "Got a frozen {}, which is neither a collection nor a user type; \
                the server may be newer than this parser",
                name
            );
        }

        if let Some(native) = self.native_types.by_class_name(name) {
            return Ok(DataType::Native(native));
        }
        debug!("Unknown class name {}, treating it as a custom type", name);
        Ok(DataType::Custom(name.to_owned()))
    }

    // UserType(keyspace,hexName,hexField1:class1,hexField2:class2,...)
    fn parse_user_type(&self, p: ParserState<'_>) -> ParserResult<DataType> {
        let p = p.skip_white().accept("(")?.skip_white();
        let (keyspace, p) = read_one(p)?;
        let p = p.skip_blank_and_comma();
        let (hex_name, after_name) = read_one(p)?;
        let name = hex_to_string(hex_name).map_err(|kind| p.error(kind))?;
        if keyspace.is_empty() || name.is_empty() {
            return Err(p.error(TypeParseErrorKind::MissingUserTypeName));
        }

        let (raw_fields, _) = get_name_and_type_params(after_name)?;
        let field_types = raw_fields
            .into_iter()
            .map(|(field_name, class_name)| {
                self.parse(class_name, false).map(|typ| (field_name, typ))
            })
            .collect::<ParserResult<Vec<_>>>()?;

        Ok(DataType::UserDefinedType {
            frozen: true,
            definition: UserTypeDefinition::Inline(Box::new(UserType {
                keyspace: keyspace.to_owned(),
                name,
                field_types,
            })),
        })
    }
}

fn read_name(p: ParserState<'_>) -> (&str, ParserState<'_>) {
    p.skip_white().take_while(is_identifier_char)
}

/// Reads a class name together with its parenthesized arguments, if any.
fn read_one(p: ParserState<'_>) -> ParserResult<(&str, ParserState<'_>)> {
    let (_, after_name) = read_name(p);
    let after_args = skip_raw_arguments(after_name)?;
    Ok((p.slice_until(after_args).trim_end(), after_args))
}

fn skip_raw_arguments(p: ParserState<'_>) -> ParserResult<ParserState<'_>> {
    let p = p.skip_white();
    match p.peek() {
        None | Some(')') | Some(',') => Ok(p),
        Some('(') => {
            let (_, rest) = p.take_bracketed('(', ')')?;
            Ok(rest)
        }
        Some(_) => Err(p.unexpected('(')),
    }
}

/// Splits `(a, b(c), d)` into its raw top-level parameters. No parameter
/// list at all gives an empty list.
fn get_type_params(p: ParserState<'_>) -> ParserResult<Vec<&str>> {
    let p = p.skip_white();
    if p.is_at_eof() {
        return Ok(Vec::new());
    }
    let mut p = p.accept("(")?;

    let mut params = Vec::new();
    loop {
        p = p.skip_blank_and_comma();
        if p.is_at_eof() {
            return Err(p.error(TypeParseErrorKind::UnexpectedEndOfInput));
        }
        if p.accept(")").is_ok() {
            return Ok(params);
        }

        let (param, rest) = read_one(p)?;
        if param.trim().is_empty() {
            return Err(p.error(TypeParseErrorKind::EmptyTypeName));
        }
        params.push(param);
        p = rest;
    }
}

fn get_n_type_params<'a, const N: usize>(
    p: ParserState<'a>,
    type_name: &'static str,
) -> ParserResult<[&'a str; N]> {
    let params = get_type_params(p)?;
    let actual = params.len();
    params.try_into().map_err(|_| {
        p.error(TypeParseErrorKind::InvalidParameterCount {
            type_name,
            actual,
            expected: N,
        })
    })
}

/// Reads `hexName1:class1, hexName2:class2, ...)`, up to and including the
/// closing parenthesis. Names are decoded from hex.
fn get_name_and_type_params(
    p: ParserState<'_>,
) -> ParserResult<(Vec<(String, &str)>, ParserState<'_>)> {
    let mut p = p;
    let mut params = Vec::new();
    loop {
        p = p.skip_blank_and_comma();
        if p.is_at_eof() {
            return Err(p.error(TypeParseErrorKind::UnexpectedEndOfInput));
        }
        if let Ok(rest) = p.accept(")") {
            return Ok((params, rest));
        }

        let (hex, after_hex) = p.take_while(is_identifier_char);
        let name = hex_to_string(hex).map_err(|kind| p.error(kind))?;
        let after_colon = after_hex.skip_white().accept(":")?.skip_white();
        let (class_name, rest) = read_one(after_colon)?;
        if class_name.is_empty() {
            return Err(after_colon.error(TypeParseErrorKind::EmptyTypeName));
        }
        params.push((name, class_name));
        p = rest;
    }
}

fn get_collection_params(p: ParserState<'_>) -> ParserResult<Vec<(String, &str)>> {
    let p = p.skip_white();
    if p.is_at_eof() {
        return Ok(Vec::new());
    }
    let (params, _) = get_name_and_type_params(p.accept("(")?)?;
    Ok(params)
}
