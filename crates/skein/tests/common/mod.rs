// Shared test plug-ins: elementwise operations over equal thread sets.

#![allow(dead_code)]

use skein::prelude::*;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn same_shape(name: &str, inputs: &[&Shape]) -> Result<Shape> {
    match inputs {
        [a, b] if a.same_threads(b) => Ok((*a).clone()),
        _ => Err(Error::shape_mismatch(name, "expects two inputs with equal threads")),
    }
}

/// Elementwise `f(a, b)`, laid out like `a`.
fn zip_with(a: &Tensor<f64>, b: &Tensor<f64>, f: impl Fn(f64, f64) -> f64) -> Result<Tensor<f64>> {
    let b = b.permuted_to(a.shape())?.to_vec()?;
    let out = a.to_vec()?.into_iter().zip(b).map(|(x, y)| f(x, y)).collect();
    Tensor::from_vec(out, a.shape().clone())
}

/// `a + b`
pub struct Add;

impl Operation<f64> for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn output_shape(&self, inputs: &[&Shape]) -> Result<Shape> {
        same_shape("add", inputs)
    }

    fn apply(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>> {
        zip_with(inputs[0], inputs[1], |x, y| x + y)
    }

    fn adjoint(&self, grad: &Tensor<f64>, _inputs: &[&Tensor<f64>]) -> Result<Vec<Tensor<f64>>> {
        Ok(vec![grad.contiguous()?, grad.contiguous()?])
    }
}

/// `a * b`
pub struct Mul;

impl Operation<f64> for Mul {
    fn name(&self) -> &str {
        "mul"
    }

    fn output_shape(&self, inputs: &[&Shape]) -> Result<Shape> {
        same_shape("mul", inputs)
    }

    fn apply(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>> {
        zip_with(inputs[0], inputs[1], |x, y| x * y)
    }

    fn adjoint(&self, grad: &Tensor<f64>, inputs: &[&Tensor<f64>]) -> Result<Vec<Tensor<f64>>> {
        let (a, b) = (inputs[0], inputs[1]);
        Ok(vec![
            zip_with(b, grad, |y, g| y * g)?,
            zip_with(a, grad, |x, g| x * g)?,
        ])
    }
}

/// `k * a`, with an adjoint that wrongly returns two contributions when
/// `broken` is set.
pub struct Scale {
    pub k: f64,
    pub broken: bool,
}

impl Operation<f64> for Scale {
    fn name(&self) -> &str {
        "scale"
    }

    fn output_shape(&self, inputs: &[&Shape]) -> Result<Shape> {
        match inputs {
            [a] => Ok((*a).clone()),
            _ => Err(Error::shape_mismatch("scale", "expects one input")),
        }
    }

    fn apply(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>> {
        zip_with(inputs[0], inputs[0], |x, _| self.k * x)
    }

    fn adjoint(&self, grad: &Tensor<f64>, _inputs: &[&Tensor<f64>]) -> Result<Vec<Tensor<f64>>> {
        let g = zip_with(grad, grad, |g, _| self.k * g)?;
        if self.broken {
            Ok(vec![g.clone(), g])
        } else {
            Ok(vec![g])
        }
    }
}
