// Nestor — an executable instance of a GraphSchema
//
// A Nestor binds one shared, read-only schema to its own NodeStore and
// GradStore. Any number of Nestors may share a schema; none shares storage
// with another.
//
//   let mut net = Nestor::<f32>::new(schema);
//   net.set::<Input>(&batch)?;
//   net.forward()?;
//   net.seed_ones()?;
//   net.backward()?;
//   let g = net.grad::<Weight>()?;
//
// A schema with one node and no edges degenerates to a plain tensor with a
// gradient: forward() and backward() leave get(root) and grad(root) exactly
// as the caller wrote them.
//
// SEEDING: the Nestor keeps one seed per designated output, apart from the
// gradient slots. backward() zeroes every slot, adds the seeds into the
// outputs' slots and propagates. An output that another edge also reads
// collects more than its seed, so seeds never live in the slots themselves.
// Seeds persist across passes until rewritten with seed() / seed_ones().
//
// A failed backward() leaves every gradient zeroed rather than half summed.

use std::sync::Arc;

use skein_core::{Error, Result, Tensor, WithDType};

use crate::exec::{self, ExecConfig};
use crate::node::Node;
use crate::schema::GraphSchema;
use crate::store::{GradStore, NodeStore};

/// A schema together with the storage to run it.
#[derive(Debug)]
pub struct Nestor<T: WithDType> {
    schema: Arc<GraphSchema<T>>,
    nodes: NodeStore<T>,
    grads: GradStore<T>,
    seeds: Vec<Tensor<T>>,
    config: ExecConfig,
}

impl<T: WithDType> Nestor<T> {
    /// Allocate zeroed value and gradient slots for every node of `schema`.
    pub fn new(schema: impl Into<Arc<GraphSchema<T>>>) -> Self {
        Self::with_config(schema, ExecConfig::default())
    }

    pub fn with_config(schema: impl Into<Arc<GraphSchema<T>>>, config: ExecConfig) -> Self {
        let schema = schema.into();
        let nodes = NodeStore::for_schema(&schema);
        let grads = GradStore::for_schema(&schema);
        // Output ids were resolved against this schema's nodes by build().
        let seeds = schema
            .outputs()
            .iter()
            .map(|id| Tensor::zeros(schema.nodes()[id.index()].shape().clone()))
            .collect();
        Nestor {
            schema,
            nodes,
            grads,
            seeds,
            config,
        }
    }

    /// A flat tensor of `N`'s shape with a gradient.
    pub fn flat<N: Node>() -> Result<Self> {
        Ok(Self::new(GraphSchema::flat::<N>()?))
    }

    pub fn schema(&self) -> &Arc<GraphSchema<T>> {
        &self.schema
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    // Typed access

    /// The value of node `N`.
    pub fn get<N: Node>(&self) -> Result<&Tensor<T>> {
        self.nodes.get(self.schema.id_of::<N>()?)
    }

    /// Copy `value` into node `N`'s slot. Views already derived from the
    /// slot observe the new values.
    pub fn set<N: Node>(&mut self, value: &Tensor<T>) -> Result<()> {
        self.get::<N>()?.copy_from(value)
    }

    /// The gradient of node `N`.
    pub fn grad<N: Node>(&self) -> Result<&Tensor<T>> {
        self.grads.get(self.schema.id_of::<N>()?)
    }

    /// Alias of [`Nestor::grad`].
    pub fn d<N: Node>(&self) -> Result<&Tensor<T>> {
        self.grad::<N>()
    }

    // Seeding

    /// Set the backward seed of output node `N`.
    pub fn seed<N: Node>(&mut self, seed: &Tensor<T>) -> Result<()> {
        self.seed_of::<N>()?.copy_from(seed)
    }

    /// Seed every output with ones.
    pub fn seed_ones(&mut self) -> Result<()> {
        for seed in &self.seeds {
            seed.fill(T::one())?;
        }
        Ok(())
    }

    /// The current backward seed of output node `N`.
    pub fn seed_of<N: Node>(&self) -> Result<&Tensor<T>> {
        let id = self.schema.id_of::<N>()?;
        self.schema
            .outputs()
            .iter()
            .position(|&out| out == id)
            .and_then(|i| self.seeds.get(i))
            .ok_or_else(|| {
                Error::schema_integrity(
                    format!("seed `{}`", N::NAME),
                    "not a designated output of the schema",
                )
            })
    }

    // Execution

    pub fn forward(&mut self) -> Result<()> {
        exec::forward(&self.schema, &mut self.nodes, &self.config)
    }

    /// Propagate the seeds back through every edge. An edge-free schema has
    /// nothing to propagate and leaves its gradient as the caller wrote it.
    pub fn backward(&mut self) -> Result<()> {
        if self.schema.edges().is_empty() {
            return Ok(());
        }
        self.grads.zero()?;
        for (&id, seed) in self.schema.outputs().iter().zip(&self.seeds) {
            self.grads.accumulate(id, seed)?;
        }
        if let Err(e) = exec::backward(&self.schema, &self.nodes, &mut self.grads) {
            self.grads.zero()?;
            return Err(e);
        }
        Ok(())
    }

    pub fn nodes(&self) -> &NodeStore<T> {
        &self.nodes
    }

    pub fn grads(&self) -> &GradStore<T> {
        &self.grads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::Sum;
    use skein_core::{Shape, Thread};

    const BATCH: Thread = Thread::new("batch", 2);
    const FEATURE: Thread = Thread::new("feature", 3);

    crate::node! {
        struct Input: [BATCH, FEATURE];
        struct Pooled: [BATCH];
        struct Elsewhere: [FEATURE];
    }

    fn pooled_schema() -> GraphSchema<f64> {
        GraphSchema::builder::<Input>()
            .node::<Pooled>()
            .pushforward::<Input, Pooled>(Sum)
            .build()
            .unwrap()
    }

    #[test]
    fn test_flat_behaves_like_tensor() {
        let mut net = Nestor::<f64>::flat::<Input>().unwrap();
        net.get::<Input>().unwrap().set(&[1, 2], 7.0).unwrap();
        net.grad::<Input>().unwrap().set(&[0, 1], 3.0).unwrap();
        net.forward().unwrap();
        net.backward().unwrap();
        assert_eq!(net.get::<Input>().unwrap().get(&[1, 2]).unwrap(), 7.0);
        assert_eq!(net.d::<Input>().unwrap().get(&[0, 1]).unwrap(), 3.0);
        assert_eq!(net.grad::<Input>().unwrap().to_vec().unwrap().iter().sum::<f64>(), 3.0);
    }

    #[test]
    fn test_forward_backward() {
        let mut net = Nestor::<f64>::new(pooled_schema());
        let shape = Shape::try_from([BATCH, FEATURE]).unwrap();
        let input = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], shape).unwrap();
        net.set::<Input>(&input).unwrap();
        net.forward().unwrap();
        assert_eq!(net.get::<Pooled>().unwrap().to_vec().unwrap(), vec![6.0, 15.0]);
        net.seed_ones().unwrap();
        net.backward().unwrap();
        assert_eq!(net.grad::<Input>().unwrap().to_vec().unwrap(), vec![1.0; 6]);

        // A second pass starts from zeroed gradients.
        net.backward().unwrap();
        assert_eq!(net.grad::<Input>().unwrap().to_vec().unwrap(), vec![1.0; 6]);
    }

    #[test]
    fn test_seed_requires_output() {
        let mut net = Nestor::<f64>::new(pooled_schema());
        let ones = Tensor::ones(Shape::try_from([BATCH, FEATURE]).unwrap());
        assert!(matches!(
            net.seed::<Input>(&ones),
            Err(Error::SchemaIntegrity { .. })
        ));
        let seed = Tensor::from_vec(vec![2.0, 0.5], Shape::try_from([BATCH]).unwrap()).unwrap();
        net.seed::<Pooled>(&seed).unwrap();
        net.backward().unwrap();
        assert_eq!(
            net.grad::<Input>().unwrap().to_vec().unwrap(),
            vec![2.0, 2.0, 2.0, 0.5, 0.5, 0.5]
        );
    }

    #[test]
    fn test_consumed_output_keeps_its_seed() {
        // Input is seeded and also feeds the reduction into Pooled.
        let schema = GraphSchema::builder::<Input>()
            .node::<Pooled>()
            .pushforward::<Input, Pooled>(Sum)
            .output::<Input>()
            .output::<Pooled>()
            .build()
            .unwrap();
        let mut net = Nestor::<f64>::new(schema);
        net.seed_ones().unwrap();
        for _ in 0..3 {
            net.backward().unwrap();
            assert_eq!(net.grad::<Input>().unwrap().to_vec().unwrap(), vec![2.0; 6]);
            assert_eq!(net.seed_of::<Input>().unwrap().to_vec().unwrap(), vec![1.0; 6]);
        }
    }

    #[test]
    fn test_slot_shapes_are_fixed() {
        let mut net = Nestor::<f64>::new(pooled_schema());
        let wrong = Tensor::ones(Shape::try_from([FEATURE]).unwrap());
        assert!(matches!(
            net.set::<Input>(&wrong),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(net.seed::<Pooled>(&wrong).is_err());
        assert_eq!(net.get::<Input>().unwrap().shape(), &Input::shape().unwrap());
        assert_eq!(net.seed_of::<Pooled>().unwrap().shape(), &Pooled::shape().unwrap());

        // Same threads in another order are accepted and re-laid out.
        let flipped = Shape::try_from([FEATURE, BATCH]).unwrap();
        let t = Tensor::from_vec(vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0], flipped).unwrap();
        net.set::<Input>(&t).unwrap();
        assert_eq!(
            net.get::<Input>().unwrap().to_vec().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        net.forward().unwrap();
        assert_eq!(net.get::<Pooled>().unwrap().to_vec().unwrap(), vec![6.0, 15.0]);
    }

    #[test]
    fn test_unknown_node() {
        let net = Nestor::<f64>::new(pooled_schema());
        assert!(matches!(net.get::<Elsewhere>(), Err(Error::Lookup { .. })));
        assert!(net.grad::<Elsewhere>().is_err());
    }

    #[test]
    fn test_nestors_share_schema_not_storage() {
        let schema = Arc::new(pooled_schema());
        let a = Nestor::<f64>::new(Arc::clone(&schema));
        let b = Nestor::<f64>::new(Arc::clone(&schema));
        a.get::<Input>().unwrap().fill(1.0).unwrap();
        assert_eq!(b.get::<Input>().unwrap().to_vec().unwrap(), vec![0.0; 6]);
        assert!(Arc::ptr_eq(a.schema(), b.schema()));
    }
}
