use log::{debug, trace};
use rayon::prelude::*;
use skein_core::{bail, Error, Result, Tensor, WithDType};

use super::ExecConfig;
use crate::edge::Edge;
use crate::node::NodeId;
use crate::schema::GraphSchema;
use crate::store::NodeStore;

/// Evaluate every edge of `schema`, writing results into `nodes`.
///
/// Leaf slots (the root and any other node without a writer) are read as
/// the caller left them. Running forward twice without touching the leaves
/// yields identical values.
pub fn forward<T: WithDType>(
    schema: &GraphSchema<T>,
    nodes: &mut NodeStore<T>,
    config: &ExecConfig,
) -> Result<()> {
    if nodes.len() != schema.len() {
        bail!(
            "node store holds {} slots, schema declares {} nodes",
            nodes.len(),
            schema.len()
        );
    }

    if !config.parallel {
        debug!("forward: {} edges, sequential", schema.edges().len());
        for index in 0..schema.edges().len() {
            let (out, value) = eval_edge(schema, index, nodes)?;
            nodes.set(out, value)?;
        }
        return Ok(());
    }

    debug!(
        "forward: {} edges in {} waves, parallel",
        schema.edges().len(),
        schema.waves().len()
    );
    for wave in schema.waves() {
        let store: &NodeStore<T> = nodes;
        let results = if wave.len() >= config.min_parallel_wave {
            wave.par_iter()
                .map(|&index| eval_edge(schema, index, store))
                .collect::<Result<Vec<_>>>()?
        } else {
            wave.iter()
                .map(|&index| eval_edge(schema, index, store))
                .collect::<Result<Vec<_>>>()?
        };
        for (out, value) in results {
            nodes.set(out, value)?;
        }
    }
    Ok(())
}

/// Compute the value of one edge's output from the current store.
fn eval_edge<T: WithDType>(
    schema: &GraphSchema<T>,
    index: usize,
    nodes: &NodeStore<T>,
) -> Result<(NodeId, Tensor<T>)> {
    let edge = &schema.edges()[index];
    trace!("forward edge #{}: {:?}", index, edge);
    let value = match edge {
        Edge::Compute { output, inputs, op } => {
            let values = inputs
                .iter()
                .map(|&id| nodes.get(id))
                .collect::<Result<Vec<_>>>()?;
            let result = op.apply(&values)?;
            let declared = schema.shape_of(*output)?;
            if !result.shape().same_threads(declared) {
                return Err(Error::op_failed(
                    op.name(),
                    format!(
                        "returned {} for node `{}` declared as {}",
                        result.shape(),
                        schema.name_of(*output)?,
                        declared
                    ),
                ));
            }
            result
        }
        Edge::View {
            parent, pullback, ..
        } => pullback.apply(nodes.get(*parent)?)?,
        Edge::Reduce {
            parent,
            pushforward,
            ..
        } => pushforward.apply(nodes.get(*parent)?)?,
    };
    Ok((edge.output(), value))
}
