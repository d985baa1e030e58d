use rand::{ SeedableRng, rngs::StdRng };
use num_traits::ToPrimitive;
use log::{ info, warn };

use crate::{
  error::Result,
  scalar::Real,
  network::{ Layout, Dataset, Params },
  learner::{ Learner, ManualLearner, AutogradLearner },
};


/// Literal constants of a training run.

#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig<T: Real> {
  pub batch: usize,
  pub dims: Vec<usize>,
  pub learning_rate: T,
  pub iterations: usize,
  pub log_every: usize,
  pub seed: u64,
  pub zero_grad: bool,
}

impl<T: Real> Default for TrainConfig<T> {
  fn default() -> Self {
    Self {
      batch: 64,
      dims: vec![784, 100, 10],
      learning_rate: T::from(5e-6).unwrap(),
      iterations: 2500,
      log_every: 100,
      seed: 0,
      zero_grad: true,
    }
  }
}


/// How gradients get computed.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backprop {
  Manual,
  Autograd,
}

impl std::fmt::Display for Backprop {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      Self::Manual => write!(f, "manual"),
      Self::Autograd => write!(f, "autograd"),
    }
  }
}


/// Loss observed at a logged iteration.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<T: Real> {
  pub iteration: usize,
  pub loss: T,
}

impl<T: Real> std::fmt::Display for Sample<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "{} {}", self.iteration, self.loss)
  }
}


/// Outcome of a training run.

#[derive(Debug, Clone)]
pub struct Report<T: Real> {
  pub samples: Vec<Sample<T>>,
  /// Loss of the parameters after the last update.
  pub final_loss: T,
  pub params: Params<T>,
}


/// Runs the training loop for a given [TrainConfig].

#[derive(Debug, Clone)]
pub struct Trainer<T: Real> {
  config: TrainConfig<T>,
}

impl<T: Real> Trainer<T> {
  pub fn new(config: TrainConfig<T>) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &TrainConfig<T> {
    &self.config
  }

  /// Generate data and initial parameters from the configured seed.

  pub fn setup(&self) -> Result<(Dataset<T>, Params<T>)> {
    let layout = Layout::from_dims(&self.config.dims)?;
    let mut rng = StdRng::seed_from_u64(self.config.seed);
    let data = Dataset::generate(&layout, self.config.batch, &mut rng);
    let params = Params::generate(&layout, &mut rng);
    Ok((data, params))
  }

  pub fn learner(&self, backprop: Backprop, params: Params<T>) -> Box<dyn Learner<T>> {
    let rate = self.config.learning_rate;
    match backprop {
      Backprop::Manual => Box::new(ManualLearner::new(params, rate)),
      Backprop::Autograd => Box::new(AutogradLearner::new(params, rate, self.config.zero_grad)),
    }
  }

  /// Train for the configured number of iterations, handing every
  /// sampled loss to `observer`.

  pub fn run<F>(&self, backprop: Backprop, mut observer: F) -> Result<Report<T>>
  where
    F: FnMut(&Sample<T>),
  {
    let config = &self.config;
    let (data, params) = self.setup()?;
    let mut learner = self.learner(backprop, params);
    info!("Training {:?} network with {backprop} gradients on a batch of {} for {} iterations",
      config.dims, config.batch, config.iterations);

    let mut samples = vec![];
    for iteration in 0..config.iterations {
      let step = learner.compute(&data)?;
      if config.log_every > 0 && iteration % config.log_every == 0 {
        let sample = Sample { iteration, loss: step.loss };
        if !is_finite(sample.loss) {
          warn!("Loss diverged at iteration {iteration}: {}", sample.loss);
        }
        info!("{sample}");
        observer(&sample);
        samples.push(sample);
      }
      learner.apply()?;
    }

    let final_loss = learner.evaluate(&data)?;
    info!("Finished {backprop} training with loss {final_loss}");
    Ok(Report { samples, final_loss, params: learner.params() })
  }
}

fn is_finite<T: Real>(value: T) -> bool {
  value.to_f64().map_or(false, f64::is_finite)
}


#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;
  use crate::error::Error;

  #[test]
  fn default_config() {
    let config = TrainConfig::<f32>::default();
    assert_eq!(config.batch, 64);
    assert_eq!(config.dims, vec![784, 100, 10]);
    assert_relative_eq!(config.learning_rate, 5e-6);
    assert_eq!(config.iterations, 2500);
    assert_eq!(config.log_every, 100);
    assert!(config.zero_grad);
  }

  #[test]
  fn sample_format() {
    assert_eq!(Sample { iteration: 300, loss: 12.5f32 }.to_string(), "300 12.5");
  }

  #[test]
  fn invalid_layout() {
    let config = TrainConfig::<f64> { dims: vec![784, 100], ..Default::default() };
    let result = Trainer::new(config).run(Backprop::Manual, |_| {} );
    assert_eq!(result.unwrap_err(), Error::InvalidLayout(vec![784, 100]));
  }

  #[test]
  fn variants_agree_over_run() {
    let config = TrainConfig::<f64> {
      batch: 8,
      dims: vec![20, 10, 4],
      learning_rate: 1e-4,
      iterations: 50,
      log_every: 10,
      ..Default::default()
    };
    let trainer = Trainer::new(config);
    let manual = trainer.run(Backprop::Manual, |_| {} ).unwrap();
    let auto = trainer.run(Backprop::Autograd, |_| {} ).unwrap();
    assert_eq!(manual.samples.len(), 5);
    for (a, b) in manual.samples.iter().zip(auto.samples.iter()) {
      assert_eq!(a.iteration, b.iteration);
      assert_relative_eq!(a.loss, b.loss, max_relative = 1e-9);
    }
    assert_relative_eq!(manual.final_loss, auto.final_loss, max_relative = 1e-9);
  }

  #[test]
  fn loss_decreases() {
    let trainer = Trainer::new(TrainConfig::<f32>::default());
    let mut printed = vec![];
    let report = trainer.run(Backprop::Manual, |sample| printed.push(sample.to_string()) ).unwrap();

    assert_eq!(report.samples.len(), 25);
    assert_eq!(printed.len(), 25);
    assert!(printed[0].starts_with("0 "));
    assert!(printed[24].starts_with("2400 "));

    assert_trend(&report);
  }

  #[test]
  fn autograd_loss_decreases() {
    let trainer = Trainer::new(TrainConfig::<f32>::default());
    let report = trainer.run(Backprop::Autograd, |_| {} ).unwrap();
    assert_eq!(report.samples.len(), 25);
    assert_trend(&report);
  }

  fn assert_trend(report: &Report<f32>) {
    let losses: Vec<f32> = report.samples.iter().map(|s| s.loss ).collect();
    assert!(losses.iter().all(|&loss| loss >= 0.0 && loss.is_finite() ));
    assert!(losses.windows(2).all(|w| w[1] <= w[0] ));
    assert!(losses[24] < losses[0]);
    assert!(report.final_loss < losses[0]);
  }
}
