use log::{debug, trace};
use skein_core::{bail, Error, Result, WithDType};

use crate::edge::Edge;
use crate::schema::GraphSchema;
use crate::store::{GradStore, NodeStore};

/// Propagate gradients from the seeded outputs back to every node.
///
/// Expects `nodes` to hold the values of a completed forward pass and every
/// non-seeded gradient slot to be zero. Contributions are accumulated, so a
/// node read by several edges ends up with their sum.
///
/// On error the contributions of edges already walked stay in `grads`;
/// `Nestor::backward` clears them before returning the error.
pub fn backward<T: WithDType>(
    schema: &GraphSchema<T>,
    nodes: &NodeStore<T>,
    grads: &mut GradStore<T>,
) -> Result<()> {
    if nodes.len() != schema.len() || grads.len() != schema.len() {
        bail!(
            "stores hold {} / {} slots, schema declares {} nodes",
            nodes.len(),
            grads.len(),
            schema.len()
        );
    }

    debug!("backward: {} edges", schema.edges().len());
    for (index, edge) in schema.edges().iter().enumerate().rev() {
        trace!("backward edge #{}: {:?}", index, edge);
        match edge {
            Edge::Compute { output, inputs, op } => {
                let values = inputs
                    .iter()
                    .map(|&id| nodes.get(id))
                    .collect::<Result<Vec<_>>>()?;
                let contributions = op.adjoint(grads.get(*output)?, &values)?;
                if contributions.len() != inputs.len() {
                    return Err(Error::op_failed(
                        op.name(),
                        format!(
                            "adjoint returned {} gradients for {} inputs",
                            contributions.len(),
                            inputs.len()
                        ),
                    ));
                }
                for (&id, contribution) in inputs.iter().zip(&contributions) {
                    grads.accumulate(id, contribution)?;
                }
            }
            Edge::View {
                parent,
                child,
                pullback,
            } => pullback.adjoint(grads.get(*child)?, grads.get(*parent)?)?,
            Edge::Reduce {
                parent,
                child,
                pushforward,
            } => {
                let contribution = pushforward.adjoint(grads.get(*child)?)?;
                grads.accumulate(*parent, &contribution)?;
            }
        }
    }
    Ok(())
}
