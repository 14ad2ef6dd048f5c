use std::fmt;

use crate::error::{Error, Result};

// Shape — an ordered set of named dimensions
//
// A Thread is one named dimension with a fixed extent, e.g. `batch:32`.
// A Shape lists Threads; names are unique within a shape. Examples:
//
//   {}                      — scalar, 1 element
//   {batch:4}               — 4 elements
//   {batch:4, feature:8}    — 32 elements, row-major: feature is contiguous
//
// Thread identity is the (name, extent) pair: `batch:4` and `batch:8` are
// different threads and never unify. Shape equality (`==`) is order-relevant
// because it decides index mapping; `same_threads` is the order-free
// comparison used for storage compatibility.

/// A named dimension with a fixed, positive extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Thread {
    name: &'static str,
    extent: usize,
}

impl Thread {
    /// Declare a thread. Extent validity is checked when the thread is
    /// placed into a [`Shape`], so threads can live in `const` items.
    pub const fn new(name: &'static str, extent: usize) -> Self {
        Thread { name, extent }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn extent(&self) -> usize {
        self.extent
    }
}

impl fmt::Display for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.extent)
    }
}

/// Ordered, duplicate-free list of threads describing a tensor's layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<Thread>);

impl Shape {
    /// Build a shape, rejecting duplicate thread names and zero extents.
    pub fn new(threads: Vec<Thread>) -> Result<Self> {
        for (i, t) in threads.iter().enumerate() {
            if t.extent == 0 {
                return Err(Error::shape_mismatch(
                    format!("thread `{}`", t.name),
                    "extent must be positive",
                ));
            }
            if threads[..i].iter().any(|prev| prev.name == t.name) {
                return Err(Error::shape_mismatch(
                    format!("thread `{}`", t.name),
                    "duplicate thread name in one shape",
                ));
            }
        }
        Ok(Shape(threads))
    }

    /// The zero-thread shape (one element).
    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    pub fn threads(&self) -> &[Thread] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Extents in declaration order.
    pub fn extents(&self) -> Vec<usize> {
        self.0.iter().map(|t| t.extent).collect()
    }

    /// Total number of elements (product of extents, 1 for a scalar).
    pub fn elem_count(&self) -> usize {
        self.0.iter().map(|t| t.extent).product()
    }

    /// Row-major strides: the last thread is contiguous.
    pub fn stride_contiguous(&self) -> Vec<usize> {
        let mut strides = vec![0usize; self.rank()];
        let mut acc = 1;
        for i in (0..self.rank()).rev() {
            strides[i] = acc;
            acc *= self.0[i].extent;
        }
        strides
    }

    /// Position of the thread called `name`, if any.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|t| t.name == name)
    }

    pub fn thread(&self, name: &str) -> Option<Thread> {
        self.0.iter().find(|t| t.name == name).copied()
    }

    /// Whether this exact thread (name and extent) is part of the shape.
    pub fn contains(&self, thread: &Thread) -> bool {
        self.0.contains(thread)
    }

    /// Whether every thread of `self` also appears in `other`.
    pub fn is_subset_of(&self, other: &Shape) -> bool {
        self.0.iter().all(|t| other.contains(t))
    }

    /// Threads present in `self` but absent from `child`, in `self`'s order.
    pub fn complement(&self, child: &Shape) -> Vec<Thread> {
        self.0
            .iter()
            .filter(|t| !child.contains(t))
            .copied()
            .collect()
    }

    /// Order-independent equality of the thread sets.
    pub fn same_threads(&self, other: &Shape) -> bool {
        self.rank() == other.rank() && self.is_subset_of(other)
    }

    /// Decompose a row-major flat index into per-thread coordinates.
    pub fn unravel(&self, mut flat: usize) -> Vec<usize> {
        let mut coords = vec![0usize; self.rank()];
        for i in (0..self.rank()).rev() {
            let extent = self.0[i].extent;
            coords[i] = flat % extent;
            flat /= extent;
        }
        coords
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, "}}")
    }
}

impl TryFrom<Vec<Thread>> for Shape {
    type Error = Error;

    fn try_from(threads: Vec<Thread>) -> Result<Self> {
        Shape::new(threads)
    }
}

impl<const N: usize> TryFrom<[Thread; N]> for Shape {
    type Error = Error;

    fn try_from(threads: [Thread; N]) -> Result<Self> {
        Shape::new(threads.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH: Thread = Thread::new("batch", 4);
    const FEATURE: Thread = Thread::new("feature", 8);
    const HIDDEN: Thread = Thread::new("hidden", 3);

    #[test]
    fn test_scalar_shape() {
        let s = Shape::scalar();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.elem_count(), 1);
        assert!(s.stride_contiguous().is_empty());
    }

    #[test]
    fn test_elem_count_and_strides() {
        let s = Shape::try_from([BATCH, FEATURE, HIDDEN]).unwrap();
        assert_eq!(s.elem_count(), 96);
        assert_eq!(s.stride_contiguous(), vec![24, 3, 1]);
        assert_eq!(s.unravel(24 + 2 * 3 + 1), vec![1, 2, 1]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = Shape::new(vec![BATCH, Thread::new("batch", 2)]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_zero_extent_rejected() {
        assert!(Shape::new(vec![Thread::new("empty", 0)]).is_err());
    }

    #[test]
    fn test_subset_uses_full_identity() {
        let parent = Shape::try_from([BATCH, FEATURE]).unwrap();
        let child = Shape::try_from([FEATURE]).unwrap();
        let resized = Shape::try_from([Thread::new("feature", 2)]).unwrap();
        assert!(child.is_subset_of(&parent));
        assert!(!resized.is_subset_of(&parent));
    }

    #[test]
    fn test_complement() {
        let parent = Shape::try_from([BATCH, FEATURE, HIDDEN]).unwrap();
        let child = Shape::try_from([HIDDEN, BATCH]).unwrap();
        assert_eq!(parent.complement(&child), vec![FEATURE]);
        assert!(child.complement(&parent).is_empty());
    }

    #[test]
    fn test_same_threads_ignores_order() {
        let a = Shape::try_from([BATCH, FEATURE]).unwrap();
        let b = Shape::try_from([FEATURE, BATCH]).unwrap();
        assert!(a.same_threads(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_display() {
        let s = Shape::try_from([BATCH, FEATURE]).unwrap();
        assert_eq!(format!("{}", s), "{batch:4, feature:8}");
    }
}
