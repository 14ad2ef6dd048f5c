// Exec — running a GraphSchema over a NodeStore / GradStore
//
// forward() walks the edges in declared order (which build() proved to be
// topological) and writes each edge's result into its output slot. With
// `parallel` set, edges of one wave are evaluated concurrently on the rayon
// pool; each slot has a single writer, so the result does not depend on
// scheduling.
//
// backward() walks the edges in reverse, accumulating every edge's adjoint
// into the gradients of the nodes it read. It is always sequential: a node
// read by several edges receives their contributions in a fixed order, which
// keeps floating-point results reproducible.
//
//   let config = ExecConfig::default().with_parallel(true);
//   forward(&schema, &mut nodes, &config)?;
//   backward(&schema, &nodes, &mut grads)?;

mod backward;
mod forward;

pub use backward::backward;
pub use forward::forward;

/// Execution options for [`forward`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecConfig {
    /// Evaluate independent edges of a wave on the rayon pool (default: false).
    pub parallel: bool,
    /// Smallest wave worth dispatching to the pool (default: 2).
    pub min_parallel_wave: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            min_parallel_wave: 2,
        }
    }
}

impl ExecConfig {
    /// Enable or disable wave-parallel forward evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the smallest wave evaluated in parallel.
    pub fn with_min_parallel_wave(mut self, min: usize) -> Self {
        self.min_parallel_wave = min.max(1);
        self
    }
}
