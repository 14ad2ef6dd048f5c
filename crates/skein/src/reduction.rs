// Reduction — the plug-in contract of a pushforward
//
// A reduction folds every element sharing the same surviving coordinates
// into one value:
//
//   acc = identity; for x in group { acc = combine(acc, x) }; finish(acc, n)
//
// `combine` must be associative and commutative so the result does not
// depend on traversal order. `n` is the number of elements per group, the
// product of the collapsed threads' extents.
//
// The adjoint of a reduction broadcasts the child gradient back over the
// collapsed threads, multiplied by `grad_scale(n)`:
//
//   Sum:  grad_scale = 1
//   Mean: grad_scale = 1 / n

use skein_core::WithDType;

/// Combining function plus optional final scaling.
pub trait Reduction<T: WithDType>: Send + Sync {
    fn name(&self) -> &str;

    /// Neutral element of `combine`.
    fn identity(&self) -> T;

    fn combine(&self, acc: T, value: T) -> T;

    /// Post-process a group's accumulator; `count` elements were combined.
    fn finish(&self, acc: T, _count: usize) -> T {
        acc
    }

    /// Factor applied to the child gradient when broadcasting it back.
    fn grad_scale(&self, _count: usize) -> f64 {
        1.0
    }
}

/// Elementwise addition over the collapsed threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl<T: WithDType> Reduction<T> for Sum {
    fn name(&self) -> &str {
        "sum"
    }

    fn identity(&self) -> T {
        T::zero()
    }

    fn combine(&self, acc: T, value: T) -> T {
        acc + value
    }
}

/// Sum divided by the number of combined elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

impl<T: WithDType> Reduction<T> for Mean {
    fn name(&self) -> &str {
        "mean"
    }

    fn identity(&self) -> T {
        T::zero()
    }

    fn combine(&self, acc: T, value: T) -> T {
        acc + value
    }

    fn finish(&self, acc: T, count: usize) -> T {
        T::from_f64(WithDType::to_f64(acc) / count as f64)
    }

    fn grad_scale(&self, count: usize) -> f64 {
        1.0 / count as f64
    }
}
