//! Descriptors of CQL column types and the parsers producing them.
//!
//! The server describes column types in one of two textual forms, depending on
//! the protocol version: CQL syntax (`map<text, frozen<list<int>>>`, see
//! [`cql_name_parser`]) or the class names of Cassandra's internal marshallers
//! (`org.apache.cassandra.db.marshal.MapType(...)`, see [`class_name_parser`]).
//! Both are parsed into the same [`DataType`] tree.

use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;

use crate::pretty::{CqlIdentifierDisplayer, CqlStringLiteralDisplayer};

pub mod class_name_parser;
pub mod cql_name_parser;
pub mod metadata;
pub mod native;


pub use metadata::{KeyspaceMetadata, UdtId};
pub use native::{NativeType, NativeTypes, ProtocolVersion, MARSHAL_PACKAGE};

/// A parsed column type.
///
/// Immutable once built. A tree of owned values: references to user defined
/// types registered in a keyspace go through [`UdtId`] handles, so there are
/// no ownership cycles even for self-referencing types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Native(NativeType),
    /// A type the driver has no built-in knowledge of, identified by its
    /// marshaller class name (e.g. the DSE geometry types).
    Custom(String),
    Collection {
        frozen: bool,
        typ: CollectionType,
    },
    UserDefinedType {
        frozen: bool,
        definition: UserTypeDefinition,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionType {
    List(Box<DataType>),
    Set(Box<DataType>),
    Map(Box<DataType>, Box<DataType>),
    /// Never empty.
    Tuple(Vec<DataType>),
}

/// A user defined type with its fields, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserType {
    pub keyspace: String,
    pub name: String,
    pub field_types: Vec<(String, DataType)>,
}

impl UserType {
    pub fn field_type(&self, field_name: &str) -> Option<&DataType> {
        self.field_types
            .iter()
            .find(|(name, _)| name == field_name)
            .map(|(_, typ)| typ)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserTypeDefinition {
    /// The fields were spelled out in the type name itself, as the legacy
    /// class-name syntax does.
    Inline(Box<UserType>),
    /// The type lives in the registry of a [`KeyspaceMetadata`].
    Registered {
        keyspace: String,
        name: String,
        id: UdtId,
    },
}

impl UserTypeDefinition {
    pub fn keyspace(&self) -> &str {
        match self {
            UserTypeDefinition::Inline(udt) => &udt.keyspace,
            UserTypeDefinition::Registered { keyspace, .. } => keyspace,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            UserTypeDefinition::Inline(udt) => &udt.name,
            UserTypeDefinition::Registered { name, .. } => name,
        }
    }

    /// Returns the full definition, looking registered types up in `keyspace`.
    pub fn resolve<'a>(&'a self, keyspace: &'a KeyspaceMetadata) -> Option<&'a UserType> {
        match self {
            UserTypeDefinition::Inline(udt) => Some(udt.as_ref()),
            UserTypeDefinition::Registered { id, .. } => keyspace.user_type(*id),
        }
    }
}

impl DataType {
    pub fn list(element: DataType, frozen: bool) -> Self {
        DataType::Collection {
            frozen,
            typ: CollectionType::List(Box::new(element)),
        }
    }

    pub fn set(element: DataType, frozen: bool) -> Self {
        DataType::Collection {
            frozen,
            typ: CollectionType::Set(Box::new(element)),
        }
    }

    pub fn map(key: DataType, value: DataType, frozen: bool) -> Self {
        DataType::Collection {
            frozen,
            typ: CollectionType::Map(Box::new(key), Box::new(value)),
        }
    }

    pub fn tuple(elements: Vec<DataType>, frozen: bool) -> Self {
        DataType::Collection {
            frozen,
            typ: CollectionType::Tuple(elements),
        }
    }

    pub fn is_frozen(&self) -> bool {
        match self {
            DataType::Native(_) | DataType::Custom(_) => false,
            DataType::Collection { frozen, .. } | DataType::UserDefinedType { frozen, .. } => {
                *frozen
            }
        }
    }

    /// Marks collections and user defined types as frozen; other types are
    /// returned unchanged.
    pub fn into_frozen(self) -> Self {
        match self {
            DataType::Collection { typ, .. } => DataType::Collection { frozen: true, typ },
            DataType::UserDefinedType { definition, .. } => DataType::UserDefinedType {
                frozen: true,
                definition,
            },
            other => other,
        }
    }

    /// Whether this is the custom type implemented by marshaller `class_name`.
    pub fn is_custom_of(&self, class_name: &str) -> bool {
        matches!(self, DataType::Custom(name) if name == class_name)
    }

    /// The element types of a collection or tuple, in order; empty for
    /// other types.
    pub fn element_types(&self) -> Vec<&DataType> {
        match self {
            DataType::Collection { typ, .. } => match typ {
                CollectionType::List(t) | CollectionType::Set(t) => vec![t.as_ref()],
                CollectionType::Map(k, v) => vec![k.as_ref(), v.as_ref()],
                CollectionType::Tuple(types) => types.iter().collect(),
            },
            _ => Vec::new(),
        }
    }
}

/// Renders the type in CQL syntax, e.g. `frozen<map<text, list<int>>>`.
impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_frozen() {
            f.write_str("frozen<")?;
        }
        match self {
            DataType::Native(native) => write!(f, "{}", native)?,
            DataType::Custom(class_name) => {
                write!(f, "{}", CqlStringLiteralDisplayer(class_name))?
            }
            DataType::Collection { typ, .. } => match typ {
                CollectionType::List(t) => write!(f, "list<{}>", t)?,
                CollectionType::Set(t) => write!(f, "set<{}>", t)?,
                CollectionType::Map(k, v) => write!(f, "map<{}, {}>", k, v)?,
                CollectionType::Tuple(types) => write!(f, "tuple<{}>", types.iter().format(", "))?,
            },
            DataType::UserDefinedType { definition, .. } => {
                write!(f, "{}", CqlIdentifierDisplayer(definition.name()))?
            }
        }
        if self.is_frozen() {
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// Outcome of parsing a possibly composite class name, see
/// [`class_name_parser::parse_with_composite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    is_composite: bool,
    types: Vec<DataType>,
    reversed: Vec<bool>,
    collections: HashMap<String, DataType>,
}

impl ParseResult {
    pub(crate) fn single(typ: DataType, reversed: bool) -> Self {
        Self {
            is_composite: false,
            types: vec![typ],
            reversed: vec![reversed],
            collections: HashMap::new(),
        }
    }

    pub(crate) fn composite(
        types: Vec<DataType>,
        reversed: Vec<bool>,
        collections: HashMap<String, DataType>,
    ) -> Self {
        Self {
            is_composite: true,
            types,
            reversed,
            collections,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.is_composite
    }

    /// The component types, in order.
    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    /// Per component: whether it is sorted in descending order.
    pub fn reversed(&self) -> &[bool] {
        &self.reversed
    }

    /// Collection columns of a legacy compact-storage table, by column name.
    pub fn collections(&self) -> &HashMap<String, DataType> {
        &self.collections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let udt = DataType::UserDefinedType {
            frozen: true,
            definition: UserTypeDefinition::Registered {
                keyspace: "ks".to_owned(),
                name: "Address".to_owned(),
                id: KeyspaceMetadata::new("ks").get_or_create_user_type("Address"),
            },
        };
        let typ = DataType::map(
            DataType::Native(NativeType::Text),
            DataType::list(udt, false),
            false,
        );
        assert_eq!(typ.to_string(), "map<text, list<frozen<\"Address\">>>");

        let tuple = DataType::tuple(
            vec![
                DataType::Native(NativeType::Int),
                DataType::Custom("org.apache.cassandra.db.marshal.PointType".to_owned()),
            ],
            true,
        );
        assert_eq!(
            tuple.to_string(),
            "frozen<tuple<int, 'org.apache.cassandra.db.marshal.PointType'>>"
        );
    }

    #[test]
    fn test_into_frozen_leaves_native_alone() {
        let native = DataType::Native(NativeType::Int).into_frozen();
        assert!(!native.is_frozen());

        let list = DataType::list(DataType::Native(NativeType::Int), false).into_frozen();
        assert!(list.is_frozen());
        assert_eq!(list.element_types(), vec![&DataType::Native(NativeType::Int)]);
    }

    #[test]
    fn test_resolve_registered_user_type() {
        let mut keyspace = KeyspaceMetadata::new("ks");
        let id = keyspace.define_user_type(
            "phone",
            vec![("number".to_owned(), DataType::Native(NativeType::Text))],
        );
        let definition = UserTypeDefinition::Registered {
            keyspace: "ks".to_owned(),
            name: "phone".to_owned(),
            id,
        };
        let udt = definition.resolve(&keyspace).unwrap();
        assert_eq!(
            udt.field_type("number"),
            Some(&DataType::Native(NativeType::Text))
        );
        assert_eq!(udt.field_type("missing"), None);
    }
}
