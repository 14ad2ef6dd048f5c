// Operation — the plug-in contract of a compute edge
//
// The engine performs no arithmetic. Every compute edge carries an
// Operation supplied by the caller, which provides:
//
//   output_shape(inputs)        — the shape contract, checked once when the
//                                 schema is built
//   apply(inputs)               — forward: input tensors → output tensor
//   adjoint(grad_out, inputs)   — backward: one gradient contribution per
//                                 input, in input order
//
// Example, elementwise a * b:
//   apply:   out = a * b
//   adjoint: [grad_out * b, grad_out * a]
//
// The engine accumulates what `adjoint` returns into the inputs' gradient
// slots; an operation never writes gradients itself. A node may appear more
// than once among an edge's inputs (x * x), and then receives one
// contribution per appearance.

use skein_core::{Result, Shape, Tensor, WithDType};

/// A pluggable tensor operation with its adjoint.
pub trait Operation<T: WithDType>: Send + Sync {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// The output shape this operation promises for the given input shapes,
    /// or a `ShapeMismatch` when the inputs are unacceptable.
    fn output_shape(&self, inputs: &[&Shape]) -> Result<Shape>;

    /// Compute the output value.
    fn apply(&self, inputs: &[&Tensor<T>]) -> Result<Tensor<T>>;

    /// Gradient contributions for each input, given the output gradient and
    /// the input values.
    fn adjoint(&self, grad_output: &Tensor<T>, inputs: &[&Tensor<T>]) -> Result<Vec<Tensor<T>>>;
}
