//! # skein-core
//!
//! Core tensor primitives for skein.
//!
//! This crate provides:
//! - [`Thread`] / [`Shape`] — named, sized dimensions and their ordered sets
//! - [`Layout`] — strided mapping from logical coordinates to flat storage
//! - [`Tensor`] — owned or aliased typed buffer tagged with a shape
//! - [`WithDType`] / [`DType`] — element types a tensor may hold
//! - [`TypeRegistry`] — ordinal lookup of types in an ordered type list
//! - [`Error`] / [`Result`] — the error type shared by every skein crate

pub mod dtype;
pub mod error;
pub mod layout;
pub mod registry;
pub mod shape;
pub mod tensor;

pub use dtype::{DType, WithDType};
pub use error::{Error, Result};
pub use layout::Layout;
pub use registry::{TypeList, TypeRegistry};
pub use shape::{Shape, Thread};
pub use tensor::{Ownership, Tensor};
