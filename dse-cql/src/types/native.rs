//! Native (non-parameterized) CQL types and the per-protocol lookup table
//! used by both type-name parsers.

use std::collections::HashMap;
use std::fmt;

/// Prefix shared by all class names of Cassandra's internal type marshallers.
pub const MARSHAL_PACKAGE: &str = "org.apache.cassandra.db.marshal.";

/// Version of the CQL binary protocol spoken with the server.
///
/// Decides which native types exist: newer types are unknown to older
/// protocol versions and are then treated as user defined / custom types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ProtocolVersion {
    V1 = 1,
    V2 = 2,
    V3 = 3,
    #[default]
    V4 = 4,
    V5 = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NativeType {
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Date,
    Decimal,
    Double,
    Duration,
    Float,
    Inet,
    Int,
    SmallInt,
    Text,
    Time,
    Timestamp,
    Timeuuid,
    TinyInt,
    Uuid,
    Varchar,
    Varint,
}

impl NativeType {
    pub const ALL: [NativeType; 21] = [
        NativeType::Ascii,
        NativeType::BigInt,
        NativeType::Blob,
        NativeType::Boolean,
        NativeType::Counter,
        NativeType::Date,
        NativeType::Decimal,
        NativeType::Double,
        NativeType::Duration,
        NativeType::Float,
        NativeType::Inet,
        NativeType::Int,
        NativeType::SmallInt,
        NativeType::Text,
        NativeType::Time,
        NativeType::Timestamp,
        NativeType::Timeuuid,
        NativeType::TinyInt,
        NativeType::Uuid,
        NativeType::Varchar,
        NativeType::Varint,
    ];

    /// The name of the type in CQL syntax, e.g. `bigint`.
    pub fn cql_name(self) -> &'static str {
        match self {
            NativeType::Ascii => "ascii",
            NativeType::BigInt => "bigint",
            NativeType::Blob => "blob",
            NativeType::Boolean => "boolean",
            NativeType::Counter => "counter",
            NativeType::Date => "date",
            NativeType::Decimal => "decimal",
            NativeType::Double => "double",
            NativeType::Duration => "duration",
            NativeType::Float => "float",
            NativeType::Inet => "inet",
            NativeType::Int => "int",
            NativeType::SmallInt => "smallint",
            NativeType::Text => "text",
            NativeType::Time => "time",
            NativeType::Timestamp => "timestamp",
            NativeType::Timeuuid => "timeuuid",
            NativeType::TinyInt => "tinyint",
            NativeType::Uuid => "uuid",
            NativeType::Varchar => "varchar",
            NativeType::Varint => "varint",
        }
    }

    /// Marshaller class names (without [`MARSHAL_PACKAGE`]) that map to this type.
    ///
    /// `varchar` has none of its own; `UTF8Type` always resolves to `text`.
    pub fn class_names(self) -> &'static [&'static str] {
        match self {
            NativeType::Ascii => &["AsciiType"],
            NativeType::BigInt => &["LongType"],
            NativeType::Blob => &["BytesType"],
            NativeType::Boolean => &["BooleanType"],
            NativeType::Counter => &["CounterColumnType"],
            NativeType::Date => &["SimpleDateType"],
            NativeType::Decimal => &["DecimalType"],
            NativeType::Double => &["DoubleType"],
            NativeType::Duration => &["DurationType"],
            NativeType::Float => &["FloatType"],
            NativeType::Inet => &["InetAddressType"],
            NativeType::Int => &["Int32Type"],
            NativeType::SmallInt => &["ShortType"],
            NativeType::Text => &["UTF8Type"],
            NativeType::Time => &["TimeType"],
            // DateType is the pre-2.2 name of the timestamp marshaller.
            NativeType::Timestamp => &["TimestampType", "DateType"],
            NativeType::Timeuuid => &["TimeUUIDType"],
            NativeType::TinyInt => &["ByteType"],
            NativeType::Uuid => &["UUIDType"],
            NativeType::Varchar => &[],
            NativeType::Varint => &["IntegerType"],
        }
    }

    /// The first protocol version able to carry values of this type.
    pub fn min_protocol_version(self) -> ProtocolVersion {
        match self {
            NativeType::Date | NativeType::Time | NativeType::SmallInt | NativeType::TinyInt => {
                ProtocolVersion::V4
            }
            NativeType::Duration => ProtocolVersion::V5,
            _ => ProtocolVersion::V1,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cql_name())
    }
}

/// Lookup table of the native types available in one protocol version.
///
/// Injected into the parsers rather than hardcoded there, so that names of
/// types the negotiated protocol does not know fall through to the
/// user-defined/custom handling.
#[derive(Debug, Clone)]
pub struct NativeTypes {
    by_cql_name: HashMap<&'static str, NativeType>,
    by_class_name: HashMap<&'static str, NativeType>,
}

impl NativeTypes {
    pub fn new(version: ProtocolVersion) -> Self {
        let mut by_cql_name = HashMap::new();
        let mut by_class_name = HashMap::new();
        for typ in NativeType::ALL
            .into_iter()
            .filter(|typ| typ.min_protocol_version() <= version)
        {
            by_cql_name.insert(typ.cql_name(), typ);
            for class_name in typ.class_names() {
                by_class_name.insert(*class_name, typ);
            }
        }
        Self {
            by_cql_name,
            by_class_name,
        }
    }

    /// Looks up a lower-case CQL type name such as `int`.
    pub fn by_cql_name(&self, name: &str) -> Option<NativeType> {
        self.by_cql_name.get(name).copied()
    }

    /// Looks up a marshaller class name, with or without [`MARSHAL_PACKAGE`].
    pub fn by_class_name(&self, name: &str) -> Option<NativeType> {
        let short_name = name.strip_prefix(MARSHAL_PACKAGE).unwrap_or(name);
        self.by_class_name.get(short_name).copied()
    }
}

impl Default for NativeTypes {
    fn default() -> Self {
        Self::new(ProtocolVersion::default())
    }
}
