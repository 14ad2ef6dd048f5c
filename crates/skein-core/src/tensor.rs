use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dtype::{DType, WithDType};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::shape::Shape;

// Tensor — a typed buffer tagged with a shape
//
// A Tensor is either:
//
//   1. Owned: a freshly allocated, contiguous, zero-initialised buffer sized
//      to its shape's element count, or
//   2. A view: a non-owning alias of another tensor's buffer read through a
//      different Layout (see `layout.rs`). Reads and writes through a view
//      address the source buffer, so mutating one mutates the other.
//
// Which of the two a tensor is gets fixed when it is constructed and never
// changes; neither does its shape.
//
// MEMORY MODEL:
//
//   The buffer lives behind Arc<RwLock<Vec<T>>>. Cloning a Tensor is O(1)
//   and shares the buffer. A view holds its own Arc on the source buffer,
//   so it can never dangle; it just keeps the buffer alive for as long as
//   the view itself lives. Writes take the lock, which lets a store hand out
//   `&Tensor` while values are filled in place.

/// How a tensor came to hold its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Allocated by this tensor.
    Owned,
    /// Aliases the buffer of another tensor.
    View,
}

/// A shape-tagged buffer of `T` elements, owned or aliased.
pub struct Tensor<T: WithDType> {
    storage: Arc<RwLock<Vec<T>>>,
    layout: Layout,
    ownership: Ownership,
}

// Manual Clone: no `T: Clone` bound needed on the Arc.
impl<T: WithDType> Clone for Tensor<T> {
    fn clone(&self) -> Self {
        Tensor {
            storage: Arc::clone(&self.storage),
            layout: self.layout.clone(),
            ownership: self.ownership,
        }
    }
}

impl<T: WithDType> std::fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tensor(shape={}, dtype={}, {:?})",
            self.shape(),
            self.dtype(),
            self.ownership,
        )
    }
}

impl<T: WithDType> Tensor<T> {
    fn from_buffer(data: Vec<T>, shape: Shape) -> Self {
        Tensor {
            storage: Arc::new(RwLock::new(data)),
            layout: Layout::contiguous(shape),
            ownership: Ownership::Owned,
        }
    }

    // Creation

    /// Owned tensor filled with zeros.
    pub fn zeros(shape: Shape) -> Self {
        Self::full(shape, T::zero())
    }

    /// Owned tensor filled with ones.
    pub fn ones(shape: Shape) -> Self {
        Self::full(shape, T::one())
    }

    /// Owned tensor filled with `value`.
    pub fn full(shape: Shape, value: T) -> Self {
        let n = shape.elem_count();
        Self::from_buffer(vec![value; n], shape)
    }

    /// Owned tensor holding `data` in row-major order.
    pub fn from_vec(data: Vec<T>, shape: Shape) -> Result<Self> {
        let expected = shape.elem_count();
        if data.len() != expected {
            return Err(Error::ElementCountMismatch {
                shape,
                expected,
                got: data.len(),
            });
        }
        Ok(Self::from_buffer(data, shape))
    }

    /// Owned tensor converted from f64 values.
    pub fn from_f64_slice(data: &[f64], shape: Shape) -> Result<Self> {
        Self::from_vec(data.iter().map(|&v| T::from_f64(v)).collect(), shape)
    }

    /// Owned tensor with values drawn uniformly from [0, 1).
    pub fn rand(shape: Shape) -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let data = (0..shape.elem_count())
            .map(|_| T::from_f64(rng.gen::<f64>()))
            .collect();
        Self::from_buffer(data, shape)
    }

    // Views

    /// Alias this tensor's buffer through `layout`. No allocation, no copy.
    pub fn view(&self, layout: Layout) -> Result<Self> {
        let len = self.read_storage()?.len();
        if layout.elem_count() > 0 && layout.max_storage_index() >= len {
            return Err(Error::shape_mismatch(
                format!("view {}", layout.shape()),
                format!("layout addresses past a buffer of {} elements", len),
            ));
        }
        Ok(Tensor {
            storage: Arc::clone(&self.storage),
            layout,
            ownership: Ownership::View,
        })
    }

    /// Zero-copy reorder into `target`, which must hold the same threads.
    pub fn permuted_to(&self, target: &Shape) -> Result<Self> {
        if !self.shape().same_threads(target) {
            return Err(Error::shape_mismatch(
                format!("permute {} to {}", self.shape(), target),
                "thread sets differ",
            ));
        }
        if self.shape() == target {
            return Ok(self.clone());
        }
        self.view(self.layout.select(target)?)
    }

    /// Materialise an owned, contiguous copy.
    pub fn contiguous(&self) -> Result<Self> {
        Ok(Self::from_buffer(self.to_vec()?, self.shape().clone()))
    }

    // Accessors

    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn elem_count(&self) -> usize {
        self.layout.elem_count()
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_view(&self) -> bool {
        self.ownership == Ownership::View
    }

    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Whether both tensors address the same buffer.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    fn read_storage(&self) -> Result<RwLockReadGuard<'_, Vec<T>>> {
        self.storage
            .read()
            .map_err(|_| Error::msg("storage lock poisoned"))
    }

    fn write_storage(&self) -> Result<RwLockWriteGuard<'_, Vec<T>>> {
        self.storage
            .write()
            .map_err(|_| Error::msg("storage lock poisoned"))
    }

    fn checked_index(&self, index: &[usize]) -> Result<usize> {
        let in_bounds = index.len() == self.shape().rank()
            && index
                .iter()
                .zip(self.shape().threads())
                .all(|(&i, t)| i < t.extent());
        if !in_bounds {
            return Err(Error::IndexOutOfBounds {
                index: index.to_vec(),
                shape: self.shape().clone(),
            });
        }
        Ok(self.layout.flat_index(index))
    }

    // Element access

    /// Read the element at a multi-index (one coordinate per thread).
    pub fn get(&self, index: &[usize]) -> Result<T> {
        let at = self.checked_index(index)?;
        Ok(self.read_storage()?[at])
    }

    /// Write the element at a multi-index.
    pub fn set(&self, index: &[usize], value: T) -> Result<()> {
        let at = self.checked_index(index)?;
        self.write_storage()?[at] = value;
        Ok(())
    }

    /// All elements in row-major logical order.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let storage = self.read_storage()?;
        Ok(self.layout.strided_indices().map(|i| storage[i]).collect())
    }

    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        Ok(self.to_vec()?.into_iter().map(WithDType::to_f64).collect())
    }

    // In-place mutation
    //
    // These write through the layout, so on a view they touch exactly the
    // aliased elements of the source buffer.

    /// Overwrite every element with `value`.
    pub fn fill(&self, value: T) -> Result<()> {
        let mut storage = self.write_storage()?;
        for i in self.layout.strided_indices() {
            storage[i] = value;
        }
        Ok(())
    }

    /// Overwrite with the values of `src`, matched by thread name.
    pub fn copy_from(&self, src: &Self) -> Result<()> {
        self.zip_assign(src, |_, v| v)
    }

    /// Add `src` elementwise, matched by thread name.
    pub fn accumulate(&self, src: &Self) -> Result<()> {
        self.zip_assign(src, |acc, v| acc + v)
    }

    fn zip_assign(&self, src: &Self, f: impl Fn(T, T) -> T) -> Result<()> {
        // Values are read out first: `src` may alias this very buffer.
        let values = src.permuted_to(self.shape())?.to_vec()?;
        let mut storage = self.write_storage()?;
        for (i, v) in self.layout.strided_indices().zip(values) {
            storage[i] = f(storage[i], v);
        }
        Ok(())
    }
}
