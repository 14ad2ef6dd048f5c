use crate::error::{Error, Result};
use crate::shape::Shape;

// Layout — how a tensor's logical threads map onto flat storage
//
// A Layout pairs a Shape with one stride per thread and a base offset:
//
//   storage_index = offset + Σ coord[i] * stride[i]
//
// Owning tensors use the contiguous row-major layout of their shape. Views
// reuse the storage of another tensor with a different layout, which is what
// makes thread selection and reordering free:
//
//   {batch:2, feature:3} strides [3, 1]
//     select {feature}        → strides [1],    batch pinned at 0
//     select {feature, batch} → strides [1, 3], same six elements, transposed
//
// Threads dropped by `select` contribute nothing to the offset, i.e. they
// are fixed at index 0.

/// Layout describes how a tensor's logical shape maps to flat storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Vec<usize>,
    /// Offset into the storage buffer where this tensor's data starts.
    offset: usize,
}

impl Layout {
    /// Create a new contiguous (row-major) layout for the given shape.
    pub fn contiguous(shape: Shape) -> Self {
        let strides = shape.stride_contiguous();
        Layout {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Create a layout with explicit strides and offset (for views).
    pub fn new(shape: Shape, strides: Vec<usize>, offset: usize) -> Result<Self> {
        if strides.len() != shape.rank() {
            return Err(Error::shape_mismatch(
                format!("layout {}", shape),
                format!("{} strides given for rank {}", strides.len(), shape.rank()),
            ));
        }
        Ok(Layout {
            shape,
            strides,
            offset,
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    /// A layout is contiguous if its strides are the row-major ones for its
    /// shape and it starts at offset 0.
    pub fn is_contiguous(&self) -> bool {
        self.offset == 0 && self.strides == self.shape.stride_contiguous()
    }

    /// Storage index of a multi-dimensional coordinate. Callers check the
    /// coordinate against the shape first.
    pub(crate) fn flat_index(&self, index: &[usize]) -> usize {
        index
            .iter()
            .zip(&self.strides)
            .fold(self.offset, |acc, (&i, &s)| acc + i * s)
    }

    /// Map a logical (row-major) element number of this layout to its
    /// storage index. This is the index-mapping function of a view.
    pub fn source_index(&self, logical: usize) -> usize {
        self.flat_index(&self.shape.unravel(logical))
    }

    /// Largest storage index this layout can address.
    pub fn max_storage_index(&self) -> usize {
        self.shape
            .threads()
            .iter()
            .zip(&self.strides)
            .fold(self.offset, |acc, (t, &s)| acc + (t.extent() - 1) * s)
    }

    /// Re-express this layout over `target`, whose threads must all appear
    /// in the current shape. Threads of the current shape missing from
    /// `target` are pinned at index 0; the order of `target` is kept.
    pub fn select(&self, target: &Shape) -> Result<Layout> {
        let mut strides = Vec::with_capacity(target.rank());
        for thread in target.threads() {
            match self.shape.position(thread.name()) {
                Some(pos) if self.shape.threads()[pos] == *thread => {
                    strides.push(self.strides[pos]);
                }
                _ => {
                    return Err(Error::shape_mismatch(
                        format!("view {} of {}", target, self.shape),
                        format!("thread {} is not part of the source shape", thread),
                    ))
                }
            }
        }
        Ok(Layout {
            shape: target.clone(),
            strides,
            offset: self.offset,
        })
    }

    /// Iterator over all storage indices of this layout, in logical order.
    pub fn strided_indices(&self) -> StridedIter {
        StridedIter::new(self)
    }
}

// StridedIter — walks a layout's elements in row-major logical order,
// yielding the storage index of each one. For a contiguous layout this
// counts 0, 1, 2, ...; for a view it jumps through the shared buffer.

/// Iterator that yields flat storage indices for each element of a Layout.
pub struct StridedIter {
    current: Vec<usize>,
    dims: Vec<usize>,
    strides: Vec<usize>,
    offset: usize,
    remaining: usize,
    started: bool,
}

impl StridedIter {
    fn new(layout: &Layout) -> Self {
        StridedIter {
            current: vec![0; layout.rank()],
            dims: layout.shape().extents(),
            strides: layout.strides().to_vec(),
            offset: layout.offset(),
            remaining: layout.elem_count(),
            started: false,
        }
    }

    fn flat_index(&self) -> usize {
        self.current
            .iter()
            .zip(&self.strides)
            .fold(self.offset, |acc, (&c, &s)| acc + c * s)
    }

    /// Advance the multi-dimensional index by one (rightmost dimension first).
    fn advance(&mut self) {
        for i in (0..self.dims.len()).rev() {
            self.current[i] += 1;
            if self.current[i] < self.dims[i] {
                return;
            }
            self.current[i] = 0;
        }
    }
}

impl Iterator for StridedIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        if self.started {
            self.advance();
        }
        self.started = true;
        self.remaining -= 1;
        Some(self.flat_index())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridedIter {}
