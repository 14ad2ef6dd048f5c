//! # skein
//!
//! Statically declared tensor computation graphs.
//!
//! A graph is declared once as a [`GraphSchema`]: a root node, further
//! nodes, and an ordered list of edges between them. Every node is a Rust
//! type carrying a fixed [`Shape`] of named threads, and every edge is one of
//!
//! - a **compute** edge running a caller-supplied [`Operation`],
//! - a **pullback**: a zero-copy view of a parent onto a subset of its threads,
//! - a **pushforward**: a [`Reduction`] collapsing the threads a child lacks.
//!
//! The schema is validated in full before anything runs. A [`Nestor`] then
//! binds it to value and gradient storage and runs forward and backward
//! passes over it.
//!
//! ```
//! use skein::prelude::*;
//!
//! const BATCH: Thread = Thread::new("batch", 4);
//! const FEATURE: Thread = Thread::new("feature", 8);
//!
//! node! {
//!     struct Input: [BATCH, FEATURE];
//!     struct Pooled: [BATCH];
//! }
//!
//! let schema = GraphSchema::<f32>::builder::<Input>()
//!     .node::<Pooled>()
//!     .pushforward::<Input, Pooled>(Sum)
//!     .build()?;
//!
//! let mut net = Nestor::<f32>::new(schema);
//! net.get::<Input>()?.fill(1.0)?;
//! net.forward()?;
//! assert_eq!(net.get::<Pooled>()?.to_vec()?, vec![8.0; 4]);
//! # Ok::<(), skein::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`schema`] — declaration and validation
//! - [`pullback`] / [`pushforward`] — view and reduction edges
//! - [`exec`] — forward and backward executors, [`ExecConfig`]
//! - [`nestor`] — the executable graph handle

pub mod edge;
pub mod exec;
pub mod nestor;
pub mod node;
pub mod op;
pub mod pullback;
pub mod pushforward;
pub mod reduction;
pub mod schema;
pub mod store;

/// Re-export core types.
pub use skein_core::{
    DType, Error, Layout, Ownership, Result, Shape, Tensor, Thread, TypeList, TypeRegistry,
    WithDType,
};

pub use edge::Edge;
pub use exec::{backward, forward, ExecConfig};
pub use nestor::Nestor;
pub use node::{Node, NodeId, NodeRef};
pub use op::Operation;
pub use pullback::Pullback;
pub use pushforward::Pushforward;
pub use reduction::{Mean, Reduction, Sum};
pub use schema::{GraphSchema, NodeInfo, SchemaBuilder};
pub use store::{GradStore, NodeStore};

/// Convenience prelude.
pub mod prelude {
    pub use crate::node;
    pub use crate::{
        Error, ExecConfig, GraphSchema, Mean, Nestor, Node, NodeRef, Operation, Reduction, Result,
        Shape, Sum, Tensor, Thread, WithDType,
    };
}
