//! Parsing of CQL column type descriptions and codecs of the DSE custom types.
//!
//! Two independent parts, both meant to be used by a Cassandra/DSE driver:
//!
//! - [`types`] turns the type descriptions a server sends in column metadata,
//!   either in CQL syntax or as internal marshaller class names, into
//!   [`DataType`] trees.
//! - [`geo`] and [`date_range`] encode and decode values of the DSE custom
//!   types (points, line strings, polygons and date ranges) and render them
//!   as text.

pub(crate) mod pretty;

pub mod errors;

pub mod types;

pub mod date_range;
pub mod geo;

pub(crate) mod utils;

pub use crate::date_range::{DateRange, DateRangeBound, DateRangePrecision};
pub use crate::errors::{CodecError, TypeParseError, TypeParseErrorKind};
pub use crate::geo::{LineString, Point, Polygon};
pub use crate::types::class_name_parser::{parse_one, parse_with_composite};
pub use crate::types::cql_name_parser::parse_cql_type;
pub use crate::types::{DataType, KeyspaceMetadata, NativeTypes, ParseResult, ProtocolVersion};

#[cfg(test)]
pub(crate) mod test_utils;
