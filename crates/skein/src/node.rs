// Node — a static identity for one tensor site
//
// A node is a Rust type. Its identity is the type itself, and it carries
// exactly one Shape:
//
//   skein::node! {
//       pub struct Input: [BATCH, FEATURE];
//       pub struct Pooled: [BATCH];
//   }
//
// Schemas refer to nodes through `NodeRef::of::<Input>()`, and a validated
// schema assigns each declared node a `NodeId`, the index of its storage
// slot in every Nestor built from the schema.

use std::any::TypeId;
use std::fmt;

use skein_core::{Result, Shape};

/// A tensor site, identified by its type.
pub trait Node: 'static {
    /// Human-readable name used in diagnostics.
    const NAME: &'static str;

    /// The threads of this node. Errors (duplicate names, zero extents)
    /// surface when a schema mentioning the node is built.
    fn shape() -> Result<Shape>;
}

/// Storage slot of a node within one schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type-erased handle to a [`Node`], used while declaring edges.
#[derive(Clone, Copy)]
pub struct NodeRef {
    type_id: TypeId,
    name: &'static str,
    shape: fn() -> Result<Shape>,
}

impl NodeRef {
    pub fn of<N: Node>() -> Self {
        NodeRef {
            type_id: TypeId::of::<N>(),
            name: N::NAME,
            shape: N::shape,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn shape(&self) -> Result<Shape> {
        (self.shape)()
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({})", self.name)
    }
}

/// Declare node marker types together with their threads.
///
/// ```
/// use skein::{node, Node, Thread};
///
/// const BATCH: Thread = Thread::new("batch", 4);
/// const FEATURE: Thread = Thread::new("feature", 8);
///
/// node! {
///     pub struct Input: [BATCH, FEATURE];
///     pub struct Pooled: [BATCH];
/// }
///
/// assert_eq!(Input::NAME, "Input");
/// assert_eq!(Input::shape().unwrap().elem_count(), 32);
/// ```
#[macro_export]
macro_rules! node {
    ($($(#[$meta:meta])* $vis:vis struct $name:ident : [$($thread:expr),* $(,)?];)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
            $vis struct $name;

            impl $crate::Node for $name {
                const NAME: &'static str = stringify!($name);

                fn shape() -> $crate::Result<$crate::Shape> {
                    $crate::Shape::new(vec![$($thread),*])
                }
            }
        )+
    };
}
