// GraphSchema — the static declaration of a computation graph
//
// A schema is a root node, a closed set of declared nodes and an ordered
// list of edges. It is the whole "program": built and validated once, then
// shared read-only by every Nestor that executes it.
//
//   let schema = GraphSchema::<f32>::builder::<Input>()
//       .node::<Weight>()
//       .node::<Hidden>()
//       .node::<Pooled>()
//       .compute::<Hidden>(MulOp, &[NodeRef::of::<Input>(), NodeRef::of::<Weight>()])
//       .pushforward::<Hidden, Pooled>(Sum)
//       .build()?;
//
// VALIDATION (all in `build`, before any storage exists):
//
//   1. every node shape is well formed                    → ShapeMismatch
//   2. every node an edge mentions was declared           → SchemaIntegrity
//   3. compute outputs match the op's shape contract,
//      views select a subset, reductions collapse threads → ShapeMismatch
//   4. no node has two writers; the root has none         → SchemaIntegrity
//   5. the dependency graph is acyclic                    → SchemaIntegrity
//   6. the declared order is topological                  → SchemaIntegrity
//
// Nodes without a writer (the root and any other declared leaves, such as
// weights) are caller-populated: forward() never touches them.
//
// WAVES: edges grouped by dependency depth. Edges within one wave read only
// nodes written by earlier waves, so a wave may run in parallel.

use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use skein_core::{Error, Result, Shape, TypeRegistry, WithDType};

use crate::edge::Edge;
use crate::node::{Node, NodeId, NodeRef};
use crate::op::Operation;
use crate::pullback::Pullback;
use crate::pushforward::Pushforward;
use crate::reduction::Reduction;

/// A declared node: its name and its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    name: &'static str,
    shape: Shape,
}

impl NodeInfo {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

/// The immutable, validated declaration of a graph.
#[derive(Debug)]
pub struct GraphSchema<T: WithDType> {
    registry: TypeRegistry,
    nodes: Vec<NodeInfo>,
    root: NodeId,
    edges: Vec<Edge<T>>,
    writers: Vec<Option<usize>>,
    outputs: Vec<NodeId>,
    waves: Vec<Vec<usize>>,
}

impl<T: WithDType> GraphSchema<T> {
    /// Start declaring a schema rooted at `R`.
    pub fn builder<R: Node>() -> SchemaBuilder<T> {
        SchemaBuilder::new(NodeRef::of::<R>())
    }

    /// The single-node, edge-free schema: a flat tensor with a gradient.
    pub fn flat<R: Node>() -> Result<Self> {
        Self::builder::<R>().build()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edges(&self) -> &[Edge<T>] {
        &self.edges
    }

    /// Nodes whose gradients are seeded by the caller before backward().
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// Edge indices grouped by dependency depth, each group in declared order.
    pub fn waves(&self) -> &[Vec<usize>] {
        &self.waves
    }

    pub fn id_of<N: Node>(&self) -> Result<NodeId> {
        self.id_of_ref(NodeRef::of::<N>())
    }

    pub fn id_of_ref(&self, node: NodeRef) -> Result<NodeId> {
        self.registry
            .index_of_id(node.type_id(), node.name())
            .map(NodeId)
    }

    pub fn contains<N: Node>(&self) -> bool {
        self.registry.contains::<N>()
    }

    pub fn node(&self, id: NodeId) -> Result<&NodeInfo> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| Error::lookup(format!("slot {}", id)))
    }

    pub fn shape_of(&self, id: NodeId) -> Result<&Shape> {
        self.node(id).map(NodeInfo::shape)
    }

    pub fn name_of(&self, id: NodeId) -> Result<&'static str> {
        self.node(id).map(NodeInfo::name)
    }

    /// Index of the edge writing `id`, or `None` for caller-populated nodes.
    pub fn writer_of(&self, id: NodeId) -> Option<usize> {
        self.writers.get(id.0).copied().flatten()
    }

    /// Whether `id` is populated by the caller rather than by an edge.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.writer_of(id).is_none()
    }
}

// SchemaBuilder — collects declarations; nothing is checked until build().

enum EdgeDecl<T: WithDType> {
    Compute {
        output: NodeRef,
        inputs: Vec<NodeRef>,
        op: Arc<dyn Operation<T>>,
    },
    View {
        parent: NodeRef,
        child: NodeRef,
    },
    Reduce {
        parent: NodeRef,
        child: NodeRef,
        reduction: Arc<dyn Reduction<T>>,
    },
}

impl<T: WithDType> EdgeDecl<T> {
    fn kind(&self) -> &'static str {
        match self {
            EdgeDecl::Compute { .. } => "compute",
            EdgeDecl::View { .. } => "view",
            EdgeDecl::Reduce { .. } => "reduce",
        }
    }
}

/// Declares the nodes and edges of a [`GraphSchema`].
pub struct SchemaBuilder<T: WithDType> {
    root: NodeRef,
    declared: Vec<NodeRef>,
    edges: Vec<EdgeDecl<T>>,
    outputs: Vec<NodeRef>,
}

impl<T: WithDType> SchemaBuilder<T> {
    fn new(root: NodeRef) -> Self {
        SchemaBuilder {
            root,
            declared: Vec::new(),
            edges: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Declare a node besides the root.
    pub fn node<N: Node>(mut self) -> Self {
        self.declared.push(NodeRef::of::<N>());
        self
    }

    /// `O = op(inputs...)`.
    pub fn compute<O: Node>(self, op: impl Operation<T> + 'static, inputs: &[NodeRef]) -> Self {
        self.compute_shared::<O>(Arc::new(op), inputs)
    }

    /// Like [`SchemaBuilder::compute`], reusing an already shared operation.
    pub fn compute_shared<O: Node>(mut self, op: Arc<dyn Operation<T>>, inputs: &[NodeRef]) -> Self {
        self.edges.push(EdgeDecl::Compute {
            output: NodeRef::of::<O>(),
            inputs: inputs.to_vec(),
            op,
        });
        self
    }

    /// `C` is a zero-copy view of `P`.
    pub fn pullback<P: Node, C: Node>(mut self) -> Self {
        self.edges.push(EdgeDecl::View {
            parent: NodeRef::of::<P>(),
            child: NodeRef::of::<C>(),
        });
        self
    }

    /// `C` is `P` reduced over the threads `C` lacks.
    pub fn pushforward<P: Node, C: Node>(mut self, reduction: impl Reduction<T> + 'static) -> Self {
        self.edges.push(EdgeDecl::Reduce {
            parent: NodeRef::of::<P>(),
            child: NodeRef::of::<C>(),
            reduction: Arc::new(reduction),
        });
        self
    }

    /// Designate `N` as an output. Without any designation the outputs are
    /// the written nodes no edge consumes (the root for an edge-free schema).
    pub fn output<N: Node>(mut self) -> Self {
        self.outputs.push(NodeRef::of::<N>());
        self
    }

    /// Validate every declaration and freeze the schema.
    pub fn build(self) -> Result<GraphSchema<T>> {
        let SchemaBuilder {
            root,
            declared,
            edges: decls,
            outputs: output_refs,
        } = self;

        // Nodes: registry slot order is declaration order, root first.
        let mut registry = TypeRegistry::new();
        let mut nodes = Vec::with_capacity(declared.len() + 1);
        for node in std::iter::once(root).chain(declared) {
            let site = format!("node `{}`", node.name());
            let shape = node.shape().map_err(|e| Error::shape_mismatch(&site, e.to_string()))?;
            registry
                .register_id(node.type_id(), node.name())
                .map_err(|_| Error::schema_integrity(&site, "declared more than once"))?;
            nodes.push(NodeInfo {
                name: node.name(),
                shape,
            });
        }

        let resolve = |node: &NodeRef, site: &str| -> Result<NodeId> {
            registry
                .index_of_id(node.type_id(), node.name())
                .map(NodeId)
                .map_err(|_| {
                    Error::schema_integrity(site, format!("node `{}` is not declared", node.name()))
                })
        };
        let shape_of = |id: NodeId| nodes[id.0].shape.clone();

        // Edges: resolve ids and check shapes.
        let mut edges = Vec::with_capacity(decls.len());
        for (index, decl) in decls.into_iter().enumerate() {
            let site = format!("edge #{} ({})", index, decl.kind());
            let edge = match decl {
                EdgeDecl::Compute { output, inputs, op } => {
                    if inputs.is_empty() {
                        return Err(Error::schema_integrity(&site, "compute edge without inputs"));
                    }
                    let output = resolve(&output, &site)?;
                    let inputs = inputs
                        .iter()
                        .map(|n| resolve(n, &site))
                        .collect::<Result<Vec<_>>>()?;
                    let input_shapes: Vec<Shape> = inputs.iter().map(|&i| shape_of(i)).collect();
                    let refs: Vec<&Shape> = input_shapes.iter().collect();
                    let promised = op.output_shape(&refs).map_err(|e| {
                        Error::shape_mismatch(&site, format!("`{}` rejects its inputs: {}", op.name(), e))
                    })?;
                    let declared = shape_of(output);
                    if !promised.same_threads(&declared) {
                        return Err(Error::shape_mismatch(
                            &site,
                            format!(
                                "`{}` produces {} but node `{}` is declared as {}",
                                op.name(),
                                promised,
                                nodes[output.0].name,
                                declared
                            ),
                        ));
                    }
                    Edge::Compute { output, inputs, op }
                }
                EdgeDecl::View { parent, child } => {
                    let parent = resolve(&parent, &site)?;
                    let child = resolve(&child, &site)?;
                    let pullback = Pullback::new(shape_of(parent), shape_of(child))
                        .map_err(|e| Error::shape_mismatch(&site, e.to_string()))?;
                    Edge::View {
                        parent,
                        child,
                        pullback,
                    }
                }
                EdgeDecl::Reduce {
                    parent,
                    child,
                    reduction,
                } => {
                    let parent = resolve(&parent, &site)?;
                    let child = resolve(&child, &site)?;
                    let pushforward =
                        Pushforward::with_shared(shape_of(parent), shape_of(child), reduction)
                            .map_err(|e| Error::shape_mismatch(&site, e.to_string()))?;
                    Edge::Reduce {
                        parent,
                        child,
                        pushforward,
                    }
                }
            };
            edges.push(edge);
        }

        let root_id = NodeId(0);
        let writers = assign_writers(&edges, &nodes, root_id)?;
        check_acyclic(&edges, &writers)?;
        check_order(&edges, &writers, &nodes)?;
        let waves = group_waves(&edges, &writers);

        let outputs = if output_refs.is_empty() {
            default_outputs(&edges, nodes.len(), root_id)
        } else {
            let mut ids = Vec::with_capacity(output_refs.len());
            for node in &output_refs {
                let id = resolve(node, "outputs")?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            ids
        };

        debug!(
            "built schema rooted at `{}`: {} nodes, {} edges, {} waves, {} outputs",
            nodes[0].name,
            nodes.len(),
            edges.len(),
            waves.len(),
            outputs.len()
        );

        Ok(GraphSchema {
            registry,
            nodes,
            root: root_id,
            edges,
            writers,
            outputs,
            waves,
        })
    }
}

/// Single-writer rule: map each node to the one edge that writes it.
fn assign_writers<T: WithDType>(
    edges: &[Edge<T>],
    nodes: &[NodeInfo],
    root: NodeId,
) -> Result<Vec<Option<usize>>> {
    let mut writers: Vec<Option<usize>> = vec![None; nodes.len()];
    for (index, edge) in edges.iter().enumerate() {
        let site = format!("edge #{} ({})", index, edge.kind());
        let out = edge.output();
        if out == root {
            return Err(Error::schema_integrity(
                site,
                format!("root `{}` is caller-populated and cannot be written", nodes[out.0].name),
            ));
        }
        if let Some(previous) = writers[out.0] {
            return Err(Error::schema_integrity(
                site,
                format!(
                    "node `{}` is already written by edge #{}",
                    nodes[out.0].name, previous
                ),
            ));
        }
        writers[out.0] = Some(index);
    }
    Ok(writers)
}

/// Kahn's algorithm over edge-to-edge dependencies.
fn check_acyclic<T: WithDType>(edges: &[Edge<T>], writers: &[Option<usize>]) -> Result<()> {
    let mut indegree = vec![0usize; edges.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); edges.len()];
    for (index, edge) in edges.iter().enumerate() {
        for input in edge.inputs() {
            if let Some(w) = writers[input.0] {
                indegree[index] += 1;
                dependents[w].push(index);
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..edges.len()).filter(|&e| indegree[e] == 0).collect();
    let mut visited = 0;
    while let Some(e) = ready.pop_front() {
        visited += 1;
        for &d in &dependents[e] {
            indegree[d] -= 1;
            if indegree[d] == 0 {
                ready.push_back(d);
            }
        }
    }

    if visited < edges.len() {
        let stuck: Vec<String> = (0..edges.len())
            .filter(|&e| indegree[e] > 0)
            .map(|e| format!("#{}", e))
            .collect();
        return Err(Error::schema_integrity(
            format!("edges {}", stuck.join(", ")),
            "dependency cycle",
        ));
    }
    Ok(())
}

/// Every edge may only read nodes written by an earlier edge (or leaves).
fn check_order<T: WithDType>(
    edges: &[Edge<T>],
    writers: &[Option<usize>],
    nodes: &[NodeInfo],
) -> Result<()> {
    for (index, edge) in edges.iter().enumerate() {
        for input in edge.inputs() {
            if let Some(w) = writers[input.0] {
                if w > index {
                    return Err(Error::schema_integrity(
                        format!("edge #{} ({})", index, edge.kind()),
                        format!(
                            "reads `{}` before edge #{} writes it",
                            nodes[input.0].name, w
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn group_waves<T: WithDType>(edges: &[Edge<T>], writers: &[Option<usize>]) -> Vec<Vec<usize>> {
    let mut level = vec![0usize; edges.len()];
    let mut waves: Vec<Vec<usize>> = Vec::new();
    for (index, edge) in edges.iter().enumerate() {
        let depth = edge
            .inputs()
            .iter()
            .filter_map(|input| writers[input.0])
            .map(|w| level[w] + 1)
            .max()
            .unwrap_or(0);
        level[index] = depth;
        if waves.len() <= depth {
            waves.resize_with(depth + 1, Vec::new);
        }
        waves[depth].push(index);
    }
    waves
}

fn default_outputs<T: WithDType>(edges: &[Edge<T>], node_count: usize, root: NodeId) -> Vec<NodeId> {
    if edges.is_empty() {
        return vec![root];
    }
    let mut consumed = vec![false; node_count];
    for edge in edges {
        for input in edge.inputs() {
            consumed[input.0] = true;
        }
    }
    edges
        .iter()
        .map(Edge::output)
        .filter(|out| !consumed[out.0])
        .collect()
}
