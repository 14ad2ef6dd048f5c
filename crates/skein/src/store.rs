// NodeStore / GradStore — one tensor slot per declared node
//
// Both are arenas indexed by NodeId, allocated once per Nestor from its
// schema with zero tensors of each node's shape. The NodeStore holds primal
// values (views included, after forward()); the GradStore holds cotangents,
// always owned tensors of exactly the node's shape.
//
// GRADIENTS ACCUMULATE: a node consumed by several edges receives one
// contribution from each, so backward() only ever adds into a slot. Every
// slot is zeroed right before a pass and the outputs' seeds added back.
//
// Slots are never handed out mutably: a slot keeps its node's shape for the
// life of the store. Values change in place through the tensor, or through
// NodeStore::set, which checks the threads.

use skein_core::{Error, Result, Tensor, WithDType};

use crate::node::NodeId;
use crate::schema::GraphSchema;

fn missing_slot(id: NodeId) -> Error {
    Error::lookup(format!("slot {}", id))
}

/// Primal values, one per node.
#[derive(Debug, Clone)]
pub struct NodeStore<T: WithDType> {
    slots: Vec<Tensor<T>>,
}

impl<T: WithDType> NodeStore<T> {
    pub fn for_schema(schema: &GraphSchema<T>) -> Self {
        NodeStore {
            slots: schema
                .nodes()
                .iter()
                .map(|n| Tensor::zeros(n.shape().clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Result<&Tensor<T>> {
        self.slots.get(id.0).ok_or_else(|| missing_slot(id))
    }

    /// Replace a slot. A tensor with the same threads in another order is
    /// re-laid out (zero-copy) to the slot's shape.
    pub fn set(&mut self, id: NodeId, tensor: Tensor<T>) -> Result<()> {
        let slot = self.slots.get_mut(id.0).ok_or_else(|| missing_slot(id))?;
        *slot = tensor.permuted_to(slot.shape())?;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Tensor<T>)> {
        self.slots.iter().enumerate().map(|(i, t)| (NodeId(i), t))
    }
}

/// Gradients, one per node.
#[derive(Debug, Clone)]
pub struct GradStore<T: WithDType> {
    slots: Vec<Tensor<T>>,
}

impl<T: WithDType> GradStore<T> {
    pub fn for_schema(schema: &GraphSchema<T>) -> Self {
        GradStore {
            slots: schema
                .nodes()
                .iter()
                .map(|n| Tensor::zeros(n.shape().clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Result<&Tensor<T>> {
        self.slots.get(id.0).ok_or_else(|| missing_slot(id))
    }

    /// Add a contribution to a node's gradient.
    pub fn accumulate(&self, id: NodeId, contribution: &Tensor<T>) -> Result<()> {
        self.get(id)?.accumulate(contribution)
    }

    /// Zero every slot.
    pub fn zero(&self) -> Result<()> {
        for slot in &self.slots {
            slot.fill(T::zero())?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Tensor<T>)> {
        self.slots.iter().enumerate().map(|(i, t)| (NodeId(i), t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::Sum;
    use skein_core::{Shape, Thread};

    const ROW: Thread = Thread::new("row", 2);
    const COL: Thread = Thread::new("col", 3);

    crate::node! {
        struct Grid: [ROW, COL];
        struct Rows: [ROW];
    }

    fn schema() -> GraphSchema<f64> {
        GraphSchema::builder::<Grid>()
            .node::<Rows>()
            .pushforward::<Grid, Rows>(Sum)
            .build()
            .unwrap()
    }

    #[test]
    fn test_slots_sized_to_schema() {
        let schema = schema();
        let nodes = NodeStore::for_schema(&schema);
        let grads = GradStore::for_schema(&schema);
        assert_eq!(nodes.len(), 2);
        assert_eq!(grads.len(), 2);
        let rows = schema.id_of::<Rows>().unwrap();
        assert_eq!(nodes.get(rows).unwrap().shape(), grads.get(rows).unwrap().shape());
        assert!(nodes.get(NodeId(7)).is_err());
    }

    #[test]
    fn test_set_reorders_to_slot_shape() {
        let schema = schema();
        let mut nodes = NodeStore::for_schema(&schema);
        let grid = schema.root();
        let transposed = Shape::try_from([COL, ROW]).unwrap();
        let t = Tensor::from_vec(vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0], transposed).unwrap();
        nodes.set(grid, t).unwrap();
        let stored = nodes.get(grid).unwrap();
        assert_eq!(stored.shape(), schema.shape_of(grid).unwrap());
        assert_eq!(stored.to_vec().unwrap(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let wrong = Tensor::zeros(Shape::try_from([ROW]).unwrap());
        assert!(nodes.set(grid, wrong).is_err());
    }

    #[test]
    fn test_accumulate_and_zero() {
        let schema = schema();
        let grads = GradStore::for_schema(&schema);
        let rows = schema.id_of::<Rows>().unwrap();
        let one = Tensor::ones(Shape::try_from([ROW]).unwrap());
        grads.accumulate(rows, &one).unwrap();
        grads.accumulate(rows, &one).unwrap();
        assert_eq!(grads.get(rows).unwrap().to_vec().unwrap(), vec![2.0, 2.0]);
        grads.get(schema.root()).unwrap().fill(5.0).unwrap();
        grads.zero().unwrap();
        assert_eq!(grads.get(rows).unwrap().to_vec().unwrap(), vec![0.0, 0.0]);
        assert_eq!(grads.get(schema.root()).unwrap().to_vec().unwrap(), vec![0.0; 6]);
        assert_eq!(grads.get(rows).unwrap().shape(), schema.shape_of(rows).unwrap());
    }
}
