// Two-layer ReLU network trained with hand-derived gradients.

// Every iteration runs the forward pass, computes the loss and derives
// all four parameter gradients explicitly before taking a descent step.

use rand::{ SeedableRng, rngs::StdRng };

use microprop::{
  Result,
  train::{ TrainConfig, Sample },
  network::{ self, Layout, Dataset, Params },
};

fn main() -> Result<()> {
  let config = TrainConfig::<f32>::default();

  // Random data and parameters
  let layout = Layout::from_dims(&config.dims)?;
  let mut rng = StdRng::seed_from_u64(config.seed);
  let data = Dataset::generate(&layout, config.batch, &mut rng);
  let params = Params::generate(&layout, &mut rng);

  for iteration in 0..config.iterations {
    // Forward pass
    let activations = network::forward(&params, &data.x)?;
    let loss = network::loss(&activations.a2, &data.y)?;
    if iteration % config.log_every == 0 {
      println!("{}", Sample { iteration, loss });
    }

    // Backward pass and update
    let gradients = network::backward(&params, &data.x, &data.y, &activations)?;
    params.descend(&gradients, config.learning_rate);
  }

  Ok(())
}
