// Pullback — zero-copy view from a parent shape onto a subset of its threads
//
// Given From = {batch:4, feature:8} and To = {feature:8}, the pullback of a
// From-tensor is a To-tensor aliasing the same buffer. For each feature
// index it reads the element at batch = 0: threads dropped by the view are
// pinned at index 0. To may also list its threads in a different order than
// From, which yields a transposed view.
//
// Nothing is allocated or copied; writes through the view land in the
// parent's buffer.
//
// ADJOINT: the child gradient is scattered back into the same slice of the
// parent gradient, accumulating: grad_parent[slice] += grad_child.

use skein_core::{Error, Result, Shape, Tensor, WithDType};

/// A validated view mapping `from → to`, with `to ⊆ from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pullback {
    from: Shape,
    to: Shape,
}

impl Pullback {
    /// Rejects `to` unless every one of its threads appears in `from`.
    pub fn new(from: Shape, to: Shape) -> Result<Self> {
        let missing: Vec<String> = to
            .threads()
            .iter()
            .filter(|t| !from.contains(t))
            .map(|t| t.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::shape_mismatch(
                format!("pullback {} -> {}", from, to),
                format!("threads [{}] are not part of the parent", missing.join(", ")),
            ));
        }
        Ok(Pullback { from, to })
    }

    pub fn from_shape(&self) -> &Shape {
        &self.from
    }

    pub fn to_shape(&self) -> &Shape {
        &self.to
    }

    /// View `tensor` (of shape `from`) as a `to`-shaped alias.
    pub fn apply<T: WithDType>(&self, tensor: &Tensor<T>) -> Result<Tensor<T>> {
        if !tensor.shape().same_threads(&self.from) {
            return Err(Error::shape_mismatch(
                format!("pullback {} -> {}", self.from, self.to),
                format!("applied to a tensor of shape {}", tensor.shape()),
            ));
        }
        tensor.view(tensor.layout().select(&self.to)?)
    }

    /// Accumulate `grad_child` into the slice of `grad_parent` it was read
    /// from.
    pub fn adjoint<T: WithDType>(&self, grad_child: &Tensor<T>, grad_parent: &Tensor<T>) -> Result<()> {
        self.apply(grad_parent)?.accumulate(grad_child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::Thread;

    const BATCH: Thread = Thread::new("batch", 2);
    const FEATURE: Thread = Thread::new("feature", 3);

    fn parent() -> Shape {
        Shape::try_from([BATCH, FEATURE]).unwrap()
    }

    fn filled() -> Tensor<f64> {
        Tensor::from_vec(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], parent()).unwrap()
    }

    #[test]
    fn test_rejects_non_subset() {
        let to = Shape::try_from([Thread::new("hidden", 3)]).unwrap();
        assert!(matches!(
            Pullback::new(parent(), to),
            Err(Error::ShapeMismatch { .. })
        ));
        let resized = Shape::try_from([Thread::new("batch", 1)]).unwrap();
        assert!(Pullback::new(parent(), resized).is_err());
    }

    #[test]
    fn test_view_pins_dropped_thread() {
        let pb = Pullback::new(parent(), Shape::try_from([FEATURE]).unwrap()).unwrap();
        let t = filled();
        let v = pb.apply(&t).unwrap();
        assert!(v.is_view());
        assert!(v.shares_storage(&t));
        assert_eq!(v.to_vec().unwrap(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_write_through_view() {
        let pb = Pullback::new(parent(), Shape::try_from([BATCH]).unwrap()).unwrap();
        let t = filled();
        let v = pb.apply(&t).unwrap();
        v.set(&[1], 30.0).unwrap();
        assert_eq!(t.get(&[1, 0]).unwrap(), 30.0);
    }

    #[test]
    fn test_reordering_view() {
        let pb = Pullback::new(parent(), Shape::try_from([FEATURE, BATCH]).unwrap()).unwrap();
        let v = pb.apply(&filled()).unwrap();
        assert_eq!(v.to_vec().unwrap(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_adjoint_scatters_and_accumulates() {
        let child = Shape::try_from([FEATURE]).unwrap();
        let pb = Pullback::new(parent(), child.clone()).unwrap();
        let grad_parent = Tensor::<f64>::ones(parent());
        let grad_child = Tensor::from_vec(vec![1.0, 2.0, 3.0], child).unwrap();
        pb.adjoint(&grad_child, &grad_parent).unwrap();
        assert_eq!(
            grad_parent.to_vec().unwrap(),
            vec![2.0, 3.0, 4.0, 1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_apply_checks_source_shape() {
        let pb = Pullback::new(parent(), Shape::try_from([BATCH]).unwrap()).unwrap();
        let wrong = Tensor::<f64>::zeros(Shape::try_from([BATCH]).unwrap());
        assert!(pb.apply(&wrong).is_err());
    }
}
