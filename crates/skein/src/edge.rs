use std::fmt;
use std::sync::Arc;

use skein_core::WithDType;

use crate::node::NodeId;
use crate::op::Operation;
use crate::pullback::Pullback;
use crate::pushforward::Pushforward;

/// One validated step of a schema, producing exactly one node's value.
///
/// Edges only exist inside a built [`GraphSchema`](crate::GraphSchema):
/// their node ids are resolved and their shapes already checked.
pub enum Edge<T: WithDType> {
    /// `output = op(inputs...)`.
    Compute {
        output: NodeId,
        inputs: Vec<NodeId>,
        op: Arc<dyn Operation<T>>,
    },
    /// `child` is a zero-copy view of `parent`.
    View {
        parent: NodeId,
        child: NodeId,
        pullback: Pullback,
    },
    /// `child` is a reduction of `parent`.
    Reduce {
        parent: NodeId,
        child: NodeId,
        pushforward: Pushforward<T>,
    },
}

impl<T: WithDType> Edge<T> {
    /// The node this edge writes.
    pub fn output(&self) -> NodeId {
        match self {
            Edge::Compute { output, .. } => *output,
            Edge::View { child, .. } | Edge::Reduce { child, .. } => *child,
        }
    }

    /// The nodes this edge reads, in order.
    pub fn inputs(&self) -> &[NodeId] {
        match self {
            Edge::Compute { inputs, .. } => inputs,
            Edge::View { parent, .. } | Edge::Reduce { parent, .. } => std::slice::from_ref(parent),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Edge::Compute { .. } => "compute",
            Edge::View { .. } => "view",
            Edge::Reduce { .. } => "reduce",
        }
    }

    /// Operation or reduction name, for logs.
    pub fn label(&self) -> &str {
        match self {
            Edge::Compute { op, .. } => op.name(),
            Edge::View { .. } => "pullback",
            Edge::Reduce { pushforward, .. } => pushforward.reduction().name(),
        }
    }
}

impl<T: WithDType> fmt::Debug for Edge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Edge::{}({} {:?} -> {})",
            self.kind(),
            self.label(),
            self.inputs(),
            self.output()
        )
    }
}
