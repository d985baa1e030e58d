use log::debug;

use crate::{
  error::{ Error, Result },
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
};


/// An optimization strategy to be used with [Optimizer].

pub trait Strategy<R: Real> {
  fn update(&mut self, param: &Variable<R>, rate: R, step: usize) -> Result<Tensor<R>>;
}


/// Generic optimizer that applies a [Strategy] to trainable parameters in place.

#[derive(Debug)]
pub struct Optimizer<R: Real, S: Strategy<R>> {
  strategy: S,
  pub learning_rate: R,
  step: usize,
}

impl<R: Real, S: Strategy<R>> Optimizer<R, S> {
  pub fn new(learning_rate: R, strategy: S) -> Self {
    Self { strategy, learning_rate, step: 1 }
  }

  /// Number of updates applied so far.

  pub fn steps(&self) -> usize {
    self.step - 1
  }

  /// Update every parameter using the gradient it currently holds.

  pub fn step(&mut self, params: &[Variable<R>]) -> Result<()> {
    debug!("Optimizer step {} over {} parameters", self.step, params.len());
    for param in params {
      // Execute strategy
      let change = self.strategy.update(param, self.learning_rate, self.step)?;

      // Apply change
      let weights = param.tensor();
      weights.assign(&(weights + change));
    }
    self.step += 1;
    Ok(())
  }

  /// Back-propagate `loss`, update `params` and optionally reset gradients.
  ///
  /// Gradients accumulate across calls unless `reset` is set.

  pub fn minimize(&mut self, loss: &Variable<R>, params: &[Variable<R>], reset: bool) -> Result<()> {
    loss.backward()?;
    self.step(params)?;
    if reset {
      loss.reset();
    }
    Ok(())
  }
}


/// Stochastic Gradient Descent strategy

#[derive(Debug, Clone, Default)]
pub struct SGD;

impl<R: Real> Strategy<R> for SGD {
  fn update(&mut self, param: &Variable<R>, rate: R, _step: usize) -> Result<Tensor<R>> {
    let grad = param.grad().ok_or(Error::NoGradient)?;
    Ok(grad * -rate)
  }
}


#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;
  use crate::ops::{ NumericOps, Hops };

  #[test]
  fn sgd_descends() {
    let w = Tensor::vec(&[3.0, -2.0]).trained();
    let mut optimizer = Optimizer::new(0.25, SGD);
    // loss = sum(w^2), gradient 2w
    let loss = w.sqr().sum(0);
    optimizer.minimize(&loss, &loss.parameters(), true).unwrap();
    assert_eq!(w.tensor(), &Tensor::vec(&[1.5, -1.0]));
    assert_eq!(w.grad(), Some(&Tensor::vec(&[0.0, 0.0])));
    assert_eq!(optimizer.steps(), 1);
  }

  #[test]
  fn keeps_gradient_without_reset() {
    let w = Tensor::vec(&[1.0]).trained();
    let mut optimizer = Optimizer::new(0.1, SGD);
    for _ in 0..2 {
      let loss = (&w * 2.0).sum(0);
      optimizer.minimize(&loss, &[w.clone()], false).unwrap();
    }
    // Second update used the accumulated gradient 2 + 2
    assert_relative_eq!(w.item(), 1.0 - 0.2 - 0.4);
    assert_eq!(w.grad(), Some(&Tensor::vec(&[4.0])));
  }

  #[test]
  fn constant_cannot_be_optimized() {
    let c = Tensor::vec(&[1.0]).tracked();
    let mut optimizer = Optimizer::new(0.1, SGD);
    assert_eq!(optimizer.step(&[c]), Err(Error::NoGradient));
  }
}
