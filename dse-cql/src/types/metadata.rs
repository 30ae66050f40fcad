//! Per-keyspace registry of user defined types.
//!
//! User defined types may reference each other (and, through collections,
//! themselves), so parsed descriptors never own a UDT definition. Instead the
//! keyspace owns one slot per type name and descriptors carry a [`UdtId`]
//! pointing at it.

use std::collections::HashMap;

use super::{DataType, UserType};

/// Index of a user defined type within its [`KeyspaceMetadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UdtId(usize);

impl UdtId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyspaceMetadata {
    name: String,
    user_types: Vec<UserType>,
    ids_by_name: HashMap<String, UdtId>,
}

impl KeyspaceMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_types: Vec::new(),
            ids_by_name: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the slot of the type called `type_name`, creating an empty
    /// one if this is the first time the name is seen.
    ///
    /// Repeated calls with the same name return the same id, which is what
    /// lets recursive type definitions be parsed without recursing forever.
    pub fn get_or_create_user_type(&mut self, type_name: &str) -> UdtId {
        if let Some(id) = self.ids_by_name.get(type_name) {
            return *id;
        }
        let id = UdtId(self.user_types.len());
        self.user_types.push(UserType {
            keyspace: self.name.clone(),
            name: type_name.to_owned(),
            field_types: Vec::new(),
        });
        self.ids_by_name.insert(type_name.to_owned(), id);
        id
    }

    /// Sets the fields of the type called `type_name`, creating its slot if
    /// needed. Descriptors parsed earlier keep pointing at the same slot and
    /// thus observe the new fields.
    pub fn define_user_type(
        &mut self,
        type_name: &str,
        field_types: Vec<(String, DataType)>,
    ) -> UdtId {
        let id = self.get_or_create_user_type(type_name);
        self.user_types[id.0].field_types = field_types;
        id
    }

    pub fn user_type(&self, id: UdtId) -> Option<&UserType> {
        self.user_types.get(id.0)
    }

    pub fn user_type_by_name(&self, type_name: &str) -> Option<&UserType> {
        self.ids_by_name
            .get(type_name)
            .and_then(|id| self.user_type(*id))
    }

    pub fn user_types(&self) -> impl Iterator<Item = (UdtId, &UserType)> {
        self.user_types
            .iter()
            .enumerate()
            .map(|(idx, udt)| (UdtId(idx), udt))
    }

    pub fn is_empty(&self) -> bool {
        self.user_types.is_empty()
    }
}
