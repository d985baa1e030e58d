// Two-layer ReLU network trained with automatic differentiation.

// The network gets re-executed for every iteration, recording a new
// computation graph that back-propagates into the trainable parameters.

use rand::{ SeedableRng, rngs::StdRng };

use microprop::{
  ops::*,
  Result,
  optimize::{ Optimizer, SGD },
  train::{ TrainConfig, Sample },
  network::{ Layout, Dataset, Params },
};

fn main() -> Result<()> {
  let config = TrainConfig::<f32>::default();

  // Random data and parameters
  let layout = Layout::from_dims(&config.dims)?;
  let mut rng = StdRng::seed_from_u64(config.seed);
  let data = Dataset::generate(&layout, config.batch, &mut rng);
  let params = Params::generate(&layout, &mut rng);

  // Track data, train parameters
  let x = data.x.tracked();
  let y = data.y.tracked();
  let w1 = params.w1.trained();
  let b1 = params.b1.trained();
  let w2 = params.w2.trained();
  let b2 = params.b2.trained();

  let mut optimizer = Optimizer::new(config.learning_rate, SGD);

  for iteration in 0..config.iterations {
    let a1 = (w1.mm(&x) + &b1).relu();
    let a2 = w2.mm(&a1) + &b2;
    let loss = (&a2 - &y).sqr().sum(0) * 0.5;
    if iteration % config.log_every == 0 {
      println!("{}", Sample { iteration, loss: loss.item() });
    }

    // Back-prop, update and zero the gradients for the next iteration
    optimizer.minimize(&loss, &[w1.clone(), b1.clone(), w2.clone(), b2.clone()], true)?;
  }

  Ok(())
}
