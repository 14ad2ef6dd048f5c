use std::any::{type_name, TypeId};

use indexmap::IndexMap;

use crate::error::{Error, Result};

// TypeRegistry — membership and ordinal position of types in an ordered list
//
// Graph nodes are identified by Rust types. The registry turns such a type
// into the small integer that addresses its storage slot:
//
//   registry = [Input, Hidden, Loss]
//   registry.index_of::<Hidden>() == Ok(1)
//
// Registration happens once, while a schema is built; afterwards the registry
// is only queried. Asking for a type that was never registered is a
// `Lookup` error: correct code never reaches it.

/// An ordered list of distinct types.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entries: IndexMap<TypeId, &'static str>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the members of a tuple type list, in order.
    ///
    /// ```
    /// use skein_core::TypeRegistry;
    ///
    /// let types = TypeRegistry::from_list::<(i32, f32, f64)>().unwrap();
    /// assert!(types.contains::<f32>());
    /// assert_eq!(types.index_of::<f64>().unwrap(), 2);
    /// ```
    pub fn from_list<L: TypeList>() -> Result<Self> {
        let mut registry = Self::new();
        for (id, name) in L::entries() {
            registry.register_id(id, name)?;
        }
        Ok(registry)
    }

    /// Append `K`, returning its position.
    pub fn register<K: 'static>(&mut self) -> Result<usize> {
        self.register_id(TypeId::of::<K>(), type_name::<K>())
    }

    /// Append a raw type identity, returning its position.
    pub fn register_id(&mut self, id: TypeId, name: &'static str) -> Result<usize> {
        if self.entries.contains_key(&id) {
            return Err(Error::schema_integrity(
                format!("`{}`", name),
                "type registered twice",
            ));
        }
        let (index, _) = self.entries.insert_full(id, name);
        Ok(index)
    }

    pub fn contains<K: 'static>(&self) -> bool {
        self.contains_id(TypeId::of::<K>())
    }

    pub fn contains_id(&self, id: TypeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Zero-based position of `K`.
    pub fn index_of<K: 'static>(&self) -> Result<usize> {
        self.index_of_id(TypeId::of::<K>(), type_name::<K>())
    }

    /// Zero-based position of a raw type identity; `name` only feeds the
    /// diagnostic.
    pub fn index_of_id(&self, id: TypeId, name: &str) -> Result<usize> {
        self.entries
            .get_index_of(&id)
            .ok_or_else(|| Error::lookup(name))
    }

    /// Name registered at position `index`.
    pub fn name_at(&self, index: usize) -> Option<&'static str> {
        self.entries.get_index(index).map(|(_, &name)| name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A tuple of types usable as an ordered type list.
pub trait TypeList {
    fn entries() -> Vec<(TypeId, &'static str)>;
}

macro_rules! impl_type_list {
    ($($name:ident),*) => {
        impl<$($name: 'static),*> TypeList for ($($name,)*) {
            fn entries() -> Vec<(TypeId, &'static str)> {
                vec![$((TypeId::of::<$name>(), type_name::<$name>())),*]
            }
        }
    };
}

impl TypeList for () {
    fn entries() -> Vec<(TypeId, &'static str)> {
        Vec::new()
    }
}

impl_type_list!(A);
impl_type_list!(A, B);
impl_type_list!(A, B, C);
impl_type_list!(A, B, C, D);
impl_type_list!(A, B, C, D, E);
impl_type_list!(A, B, C, D, E, F);
impl_type_list!(A, B, C, D, E, F, G);
impl_type_list!(A, B, C, D, E, F, G, H);
