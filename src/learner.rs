use crate::{
  error::{ Error, Result },
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
  optimize::{ Optimizer, SGD },
  network::{ self, Dataset, Params, Gradients },
  ops::{ NumericOps, RealOps, Hops },
};


/// Loss and gradients computed for a single iteration.

#[derive(Debug, Clone)]
pub struct Step<T: Real> {
  pub loss: T,
  pub gradients: Gradients<T>,
}


/// A way of obtaining gradients for the network and applying them.

pub trait Learner<T: Real> {
  /// Forward pass, loss and gradients for the current parameters.
  fn compute(&mut self, data: &Dataset<T>) -> Result<Step<T>>;

  /// Update the parameters with the gradients from the last [compute](Learner::compute).
  fn apply(&mut self) -> Result<()>;

  /// Snapshot of the current parameter values.
  fn params(&self) -> Params<T>;

  /// Loss of the current parameters, without computing gradients.
  fn evaluate(&self, data: &Dataset<T>) -> Result<T> {
    let params = self.params();
    params.layout()?.check(data)?;
    let activations = network::forward(&params, &data.x)?;
    network::loss(&activations.a2, &data.y)
  }
}


/// Learner using the hand-derived gradients from [network::backward].

#[derive(Debug)]
pub struct ManualLearner<T: Real> {
  params: Params<T>,
  learning_rate: T,
  pending: Option<Gradients<T>>,
}

impl<T: Real> ManualLearner<T> {
  pub fn new(params: Params<T>, learning_rate: T) -> Self {
    Self { params, learning_rate, pending: None }
  }
}

impl<T: Real> Learner<T> for ManualLearner<T> {
  fn compute(&mut self, data: &Dataset<T>) -> Result<Step<T>> {
    self.params.layout()?.check(data)?;
    let activations = network::forward(&self.params, &data.x)?;
    let loss = network::loss(&activations.a2, &data.y)?;
    let gradients = network::backward(&self.params, &data.x, &data.y, &activations)?;
    self.pending = Some(gradients.clone());
    Ok(Step { loss, gradients })
  }

  fn apply(&mut self) -> Result<()> {
    let gradients = self.pending.take().ok_or(Error::NoGradient)?;
    self.params.descend(&gradients, self.learning_rate);
    Ok(())
  }

  fn params(&self) -> Params<T> {
    self.params.detach()
  }
}


/// Learner that records the network as a computation graph
/// and lets [Variable::backward] derive the gradients.

#[derive(Debug)]
pub struct AutogradLearner<T: Real> {
  params: Params<T>,
  w1: Variable<T>,
  b1: Variable<T>,
  w2: Variable<T>,
  b2: Variable<T>,
  optimizer: Optimizer<T, SGD>,
  zero_grad: bool,
  graph: Option<Variable<T>>,
}

impl<T: Real> AutogradLearner<T> {
  /// Parameter variables share storage with `params`, so optimizer
  /// updates are visible through both.
  ///
  /// With `zero_grad` unset, gradients keep accumulating across iterations.

  pub fn new(params: Params<T>, learning_rate: T, zero_grad: bool) -> Self {
    Self {
      w1: params.w1.trained(),
      b1: params.b1.trained(),
      w2: params.w2.trained(),
      b2: params.b2.trained(),
      params,
      optimizer: Optimizer::new(learning_rate, SGD),
      zero_grad,
      graph: None,
    }
  }

  fn variables(&self) -> [Variable<T>; 4] {
    [self.w1.clone(), self.b1.clone(), self.w2.clone(), self.b2.clone()]
  }

  fn gradient(var: &Variable<T>) -> Result<Tensor<T>> {
    var.grad().map(|grad| grad.detach() ).ok_or(Error::NoGradient)
  }
}

impl<T: Real> Learner<T> for AutogradLearner<T> {
  fn compute(&mut self, data: &Dataset<T>) -> Result<Step<T>> {
    self.params.layout()?.check(data)?;
    let x = data.x.tracked();
    let y = data.y.tracked();

    let a1 = (self.w1.mm(&x) + &self.b1).relu();
    let a2 = self.w2.mm(&a1) + &self.b2;
    let loss = (&a2 - &y).sqr().sum(0) * T::from(0.5).unwrap();

    // Drop gradients of a previous compute that was never applied
    if self.zero_grad {
      if let Some(graph) = self.graph.take() {
        graph.reset();
      }
    }
    loss.backward()?;

    let step = Step {
      loss: loss.try_item()?,
      gradients: Gradients {
        w1: Self::gradient(&self.w1)?,
        b1: Self::gradient(&self.b1)?,
        w2: Self::gradient(&self.w2)?,
        b2: Self::gradient(&self.b2)?,
      },
    };
    self.graph = Some(loss);
    Ok(step)
  }

  fn apply(&mut self) -> Result<()> {
    let graph = self.graph.take().ok_or(Error::NoGradient)?;
    self.optimizer.step(&self.variables())?;
    if self.zero_grad {
      graph.reset();
    }
    Ok(())
  }

  fn params(&self) -> Params<T> {
    self.params.detach()
  }
}


#[cfg(test)]
mod tests {
  use rand::{ SeedableRng, rngs::StdRng };
  use approx::assert_relative_eq;

  use super::*;
  use crate::network::Layout;

  fn setup(dims: &[usize], batch: usize, seed: u64) -> (Dataset<f64>, Params<f64>) {
    let layout = Layout::from_dims(dims).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let data = Dataset::generate(&layout, batch, &mut rng);
    let params = Params::generate(&layout, &mut rng);
    (data, params)
  }

  #[test]
  fn variants_agree() {
    let (data, params) = setup(&[12, 8, 3], 6, 5);
    let mut manual = ManualLearner::new(params.detach(), 1e-4);
    let mut auto = AutogradLearner::new(params, 1e-4, true);
    for _ in 0..10 {
      let a = manual.compute(&data).unwrap();
      let b = auto.compute(&data).unwrap();
      assert_relative_eq!(a.loss, b.loss, max_relative = 1e-10);
      assert!(a.gradients.relative_diff(&b.gradients) < 1e-10);
      manual.apply().unwrap();
      auto.apply().unwrap();
    }
    let (p, q) = (manual.params(), auto.params());
    for (a, b) in p.iter().zip(q.iter()) {
      for (a, b) in a.param_iter().zip(b.param_iter()) {
        assert_relative_eq!(a, b, max_relative = 1e-9, epsilon = 1e-12);
      }
    }
  }

  #[test]
  fn compute_is_idempotent() {
    let (data, params) = setup(&[12, 8, 3], 6, 5);
    let mut manual = ManualLearner::new(params.detach(), 1e-4);
    let mut auto = AutogradLearner::new(params, 1e-4, true);
    for _ in 0..2 {
      let a = manual.compute(&data).unwrap();
      let b = auto.compute(&data).unwrap();
      assert!(a.gradients.relative_diff(&b.gradients) < 1e-10);
    }
    manual.apply().unwrap();
    auto.apply().unwrap();
    let (p, q) = (manual.params(), auto.params());
    for (a, b) in p.iter().zip(q.iter()) {
      for (a, b) in a.param_iter().zip(b.param_iter()) {
        assert_relative_eq!(a, b, max_relative = 1e-9, epsilon = 1e-12);
      }
    }
  }

  #[test]
  fn variants_agree_on_full_network() {
    let (data, params) = setup(&[784, 100, 10], 64, 0);
    let mut manual = ManualLearner::new(params.detach(), 5e-6);
    let mut auto = AutogradLearner::new(params, 5e-6, true);
    for _ in 0..2500 {
      let a = manual.compute(&data).unwrap();
      let b = auto.compute(&data).unwrap();
      assert!(a.loss >= 0.0);
      assert_relative_eq!(a.loss, b.loss, max_relative = 1e-10);
      assert!(a.gradients.relative_diff(&b.gradients) < 1e-10);
      manual.apply().unwrap();
      auto.apply().unwrap();
    }
  }

  #[test]
  fn accumulation_without_reset() {
    let (data, params) = setup(&[12, 8, 3], 6, 5);
    let mut manual = ManualLearner::new(params.detach(), 1e-4);
    let mut auto = AutogradLearner::new(params, 1e-4, false);

    // First iteration starts from empty gradient buffers
    let a = manual.compute(&data).unwrap();
    let b = auto.compute(&data).unwrap();
    assert!(a.gradients.relative_diff(&b.gradients) < 1e-10);
    manual.apply().unwrap();
    auto.apply().unwrap();

    // Second one still carries the first gradient
    let a = manual.compute(&data).unwrap();
    let b = auto.compute(&data).unwrap();
    assert_relative_eq!(a.loss, b.loss, max_relative = 1e-10);
    assert!(a.gradients.relative_diff(&b.gradients) > 1e-3);
  }

  #[test]
  fn shares_parameter_storage() {
    let (data, params) = setup(&[4, 3, 2], 5, 0);
    let before = params.detach();
    let mut auto = AutogradLearner::new(params.clone(), 0.01, true);
    auto.compute(&data).unwrap();
    auto.apply().unwrap();
    assert!(params.w1 != before.w1);
    assert_eq!(auto.params().w1, params.w1);
  }

  #[test]
  fn evaluate_matches_compute() {
    let (data, params) = setup(&[4, 3, 2], 5, 3);
    let mut learner = ManualLearner::new(params, 0.01);
    let loss = learner.evaluate(&data).unwrap();
    assert_eq!(learner.compute(&data).unwrap().loss, loss);
    assert!(loss >= 0.0);
  }

  #[test]
  fn apply_requires_gradients() {
    let (_, params) = setup(&[4, 3, 2], 5, 3);
    let mut learner = AutogradLearner::new(params, 0.01, true);
    assert_eq!(learner.apply(), Err(Error::NoGradient));
  }

  #[test]
  fn mismatched_data() {
    let (_, params) = setup(&[4, 3, 2], 5, 3);
    let mut rng = StdRng::seed_from_u64(1);
    let data = Dataset::generate(&Layout::from_dims(&[5, 3, 2]).unwrap(), 5, &mut rng);
    let mut auto = AutogradLearner::new(params.clone(), 0.01, true);
    let mut manual = ManualLearner::new(params, 0.01);
    assert!(matches!(auto.compute(&data), Err(Error::ShapeMismatch { .. })));
    assert!(matches!(manual.compute(&data), Err(Error::ShapeMismatch { .. })));
  }
}
