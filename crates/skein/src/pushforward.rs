// Pushforward — materialising reduction onto a parent shape minus some threads
//
// Given From = {batch:4, feature:8} and To = {batch:4}, the collapsed set is
// C = {feature:8} and
//
//   out[b] = reduce(in[b, f] for f in 0..8)
//
// The result is a new, owned tensor. C must be non-empty (a reduction that
// collapses nothing is rejected) and To must contain nothing but threads
// of From.
//
// INDEX MAPPING: every source element is sent to the output element with
// the same surviving coordinates. That map is itself a strided layout over
// the source shape, with stride 0 on collapsed threads and the output's
// row-major stride on surviving ones, so `Layout::strided_indices` walks it.
//
// ADJOINT: grad_parent[p] += grad_scale * grad_child[map(p)], i.e. the child
// gradient broadcast across C, scaled by 1 (sum) or 1/|C| (mean).

use std::sync::Arc;

use skein_core::{Error, Layout, Result, Shape, Tensor, Thread, WithDType};

use crate::reduction::Reduction;

/// A validated reduction `from → to` collapsing `from \ to`.
pub struct Pushforward<T: WithDType> {
    from: Shape,
    to: Shape,
    collapsed: Vec<Thread>,
    reduction: Arc<dyn Reduction<T>>,
}

impl<T: WithDType> Clone for Pushforward<T> {
    fn clone(&self) -> Self {
        Pushforward {
            from: self.from.clone(),
            to: self.to.clone(),
            collapsed: self.collapsed.clone(),
            reduction: Arc::clone(&self.reduction),
        }
    }
}

impl<T: WithDType> std::fmt::Debug for Pushforward<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pushforward({} -> {}, {})",
            self.from,
            self.to,
            self.reduction.name()
        )
    }
}

impl<T: WithDType> Pushforward<T> {
    pub fn new(from: Shape, to: Shape, reduction: impl Reduction<T> + 'static) -> Result<Self> {
        Self::with_shared(from, to, Arc::new(reduction))
    }

    /// Like [`Pushforward::new`], reusing an already shared reduction.
    pub fn with_shared(from: Shape, to: Shape, reduction: Arc<dyn Reduction<T>>) -> Result<Self> {
        let site = || format!("pushforward {} -> {} ({})", from, to, reduction.name());
        if !to.is_subset_of(&from) {
            return Err(Error::shape_mismatch(
                site(),
                "child threads must all come from the parent",
            ));
        }
        let collapsed = from.complement(&to);
        if collapsed.is_empty() {
            return Err(Error::shape_mismatch(site(), "no thread is collapsed"));
        }
        Ok(Pushforward {
            from,
            to,
            collapsed,
            reduction,
        })
    }

    pub fn from_shape(&self) -> &Shape {
        &self.from
    }

    pub fn to_shape(&self) -> &Shape {
        &self.to
    }

    /// The threads removed by this reduction, in parent order.
    pub fn collapsed(&self) -> &[Thread] {
        &self.collapsed
    }

    /// Number of parent elements folded into each output element.
    pub fn group_size(&self) -> usize {
        self.collapsed.iter().map(|t| t.extent()).product()
    }

    pub fn reduction(&self) -> &dyn Reduction<T> {
        self.reduction.as_ref()
    }

    /// For each element of `source` in row-major order, the row-major index
    /// of the output element it reduces into.
    fn target_indices(&self, source: &Shape) -> Result<impl Iterator<Item = usize>> {
        let to_strides = self.to.stride_contiguous();
        let strides = source
            .threads()
            .iter()
            .map(|t| self.to.position(t.name()).map_or(0, |p| to_strides[p]))
            .collect();
        Ok(Layout::new(source.clone(), strides, 0)?.strided_indices())
    }

    fn check_parent(&self, shape: &Shape) -> Result<()> {
        if !shape.same_threads(&self.from) {
            return Err(Error::shape_mismatch(
                format!("pushforward {} -> {}", self.from, self.to),
                format!("applied to a tensor of shape {}", shape),
            ));
        }
        Ok(())
    }

    /// Reduce `tensor` into a freshly allocated `to`-shaped tensor.
    pub fn apply(&self, tensor: &Tensor<T>) -> Result<Tensor<T>> {
        self.check_parent(tensor.shape())?;
        let values = tensor.to_vec()?;
        let mut acc = vec![self.reduction.identity(); self.to.elem_count()];
        for (o, v) in self.target_indices(tensor.shape())?.zip(values) {
            acc[o] = self.reduction.combine(acc[o], v);
        }
        let n = self.group_size();
        let out = acc
            .into_iter()
            .map(|a| self.reduction.finish(a, n))
            .collect();
        Tensor::from_vec(out, self.to.clone())
    }

    /// Broadcast `grad_child` back over the collapsed threads, producing the
    /// parent's gradient contribution.
    pub fn adjoint(&self, grad_child: &Tensor<T>) -> Result<Tensor<T>> {
        let grad = grad_child.permuted_to(&self.to)?.to_vec()?;
        let scale = self.reduction.grad_scale(self.group_size());
        let out = self
            .target_indices(&self.from)?
            .map(|o| {
                if scale == 1.0 {
                    grad[o]
                } else {
                    T::from_f64(WithDType::to_f64(grad[o]) * scale)
                }
            })
            .collect();
        Tensor::from_vec(out, self.from.clone())
    }
}
