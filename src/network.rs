use rand::Rng;

use crate::{
  error::{ Error, Result },
  tensor::Tensor,
  scalar::Real,
  ops::{ BaseOps, NumericOps, RealOps, Hops },
};


/// Layer sizes of a two-layer fully connected network.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
  pub input: usize,
  pub hidden: usize,
  pub output: usize,
}

impl Layout {
  /// Parse an `[input, hidden, output]` list of layer sizes.

  pub fn from_dims(dims: &[usize]) -> Result<Self> {
    match *dims {
      [input, hidden, output] if input > 0 && hidden > 0 && output > 0 => {
        Ok(Self { input, hidden, output })
      },
      _ => Err(Error::InvalidLayout(dims.to_vec())),
    }
  }

  pub fn dims(&self) -> [usize; 3] {
    [self.input, self.hidden, self.output]
  }

  /// Make sure a batch of data fits this layout.

  pub fn check<T: Real>(&self, data: &Dataset<T>) -> Result<()> {
    let (x, y) = (&data.x.shape().dims, &data.y.shape().dims);
    if x.len() != 2 || x[0] != self.input {
      let batch = x.last().copied().unwrap_or(0);
      return Err(Error::mismatch("input", x, &[self.input, batch]))
    }
    if y.len() != 2 || y[0] != self.output || y[1] != x[1] {
      return Err(Error::mismatch("target", y, &[self.output, x[1]]))
    }
    Ok(())
  }
}


/// Input samples and targets, one column per sample.

#[derive(Debug, Clone)]
pub struct Dataset<T: Real> {
  pub x: Tensor<T>,
  pub y: Tensor<T>,
}

impl<T: Real> Dataset<T> {
  /// Draw standard normal inputs and targets, X before y.

  pub fn generate<R: Rng + ?Sized>(layout: &Layout, batch: usize, rng: &mut R) -> Self {
    let x = Tensor::randn_with(&[layout.input, batch], rng);
    let y = Tensor::randn_with(&[layout.output, batch], rng);
    Self { x, y }
  }

  pub fn batch(&self) -> usize {
    self.x.dim(-1)
  }
}


/// Weights and biases of both layers.
///
/// Biases are column vectors that get broadcast over the batch.

#[derive(Debug, Clone)]
pub struct Params<T: Real> {
  pub w1: Tensor<T>,
  pub b1: Tensor<T>,
  pub w2: Tensor<T>,
  pub b2: Tensor<T>,
}

impl<T: Real> Params<T> {
  /// Draw standard normal parameters in the order W1, W2, b1, b2.

  pub fn generate<R: Rng + ?Sized>(layout: &Layout, rng: &mut R) -> Self {
    let w1 = Tensor::randn_with(&[layout.hidden, layout.input], rng);
    let w2 = Tensor::randn_with(&[layout.output, layout.hidden], rng);
    let b1 = Tensor::randn_with(&[layout.hidden, 1], rng);
    let b2 = Tensor::randn_with(&[layout.output, 1], rng);
    Self { w1, b1, w2, b2 }
  }

  /// Recover the layout from the parameter shapes, verifying that they agree.

  pub fn layout(&self) -> Result<Layout> {
    let w1 = &self.w1.shape().dims;
    let w2 = &self.w2.shape().dims;
    if w1.len() != 2 || w2.len() != 2 || w2[1] != w1[0] {
      return Err(Error::mismatch("layers", w1, w2))
    }
    let layout = Layout::from_dims(&[w1[1], w1[0], w2[0]])?;
    for (bias, rows) in [(&self.b1, layout.hidden), (&self.b2, layout.output)] {
      if bias.shape().dims != [rows, 1] {
        return Err(Error::mismatch("bias", &bias.shape().dims, &[rows, 1]))
      }
    }
    Ok(layout)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Tensor<T>> {
    [&self.w1, &self.b1, &self.w2, &self.b2].into_iter()
  }

  /// Plain gradient descent, in place.

  pub fn descend(&self, gradients: &Gradients<T>, learning_rate: T) {
    for (param, grad) in self.iter().zip(gradients.iter()) {
      param.op_assign(grad, |p, g| *p -= learning_rate * g );
    }
  }

  /// Copy of the current values that no longer follows updates.

  pub fn detach(&self) -> Self {
    Self {
      w1: self.w1.detach(),
      b1: self.b1.detach(),
      w2: self.w2.detach(),
      b2: self.b2.detach(),
    }
  }
}


/// Intermediate results of a forward pass.

#[derive(Debug, Clone)]
pub struct Activations<T: Real> {
  pub z1: Tensor<T>,
  pub a1: Tensor<T>,
  pub z2: Tensor<T>,
  pub a2: Tensor<T>,
}


/// Loss gradients with the same shapes as the [Params] they belong to.

#[derive(Debug, Clone, PartialEq)]
pub struct Gradients<T: Real> {
  pub w1: Tensor<T>,
  pub b1: Tensor<T>,
  pub w2: Tensor<T>,
  pub b2: Tensor<T>,
}

impl<T: Real> Gradients<T> {
  pub fn iter(&self) -> impl Iterator<Item = &Tensor<T>> {
    [&self.w1, &self.b1, &self.w2, &self.b2].into_iter()
  }

  /// Largest absolute elementwise difference across all gradients.

  pub fn max_abs_diff(&self, other: &Self) -> T {
    self.iter()
      .zip(other.iter())
      .map(|(a, b)| max_abs(&(a - b)) )
      .fold(T::zero(), |acc, d| acc.max(d) )
  }

  /// Largest difference relative to the magnitude of the respective gradient.

  pub fn relative_diff(&self, other: &Self) -> T {
    self.iter()
      .zip(other.iter())
      .map(|(a, b)| {
        let scale = max_abs(a).max(max_abs(b));
        if scale == T::zero() { T::zero() } else { max_abs(&(a - b)) / scale }
      })
      .fold(T::zero(), |acc, d| acc.max(d) )
  }
}

fn max_abs<T: Real>(tensor: &Tensor<T>) -> T {
  tensor.param_iter().fold(T::zero(), |acc, a| acc.max(num_traits::Signed::abs(&a)) )
}


fn add_bias<T: Real>(z: Tensor<T>, bias: &Tensor<T>) -> Result<Tensor<T>> {
  let shape = z.shape().try_broadcast(bias.shape())?;
  if shape.dims != z.shape().dims {
    return Err(Error::mismatch("bias", &z.shape().dims, &bias.shape().dims))
  }
  Ok(z + bias)
}

/// Run both layers on a batch of column vectors.

pub fn forward<T: Real>(params: &Params<T>, x: &Tensor<T>) -> Result<Activations<T>> {
  let z1 = add_bias(params.w1.try_mm(x)?, &params.b1)?;
  let a1 = z1.relu();
  let z2 = add_bias(params.w2.try_mm(&a1)?, &params.b2)?;
  // Output layer is linear
  let a2 = z2.clone();
  Ok(Activations { z1, a1, z2, a2 })
}

/// Half the summed squared error.

pub fn loss<T: Real>(a2: &Tensor<T>, y: &Tensor<T>) -> Result<T> {
  if a2.shape().dims != y.shape().dims {
    return Err(Error::mismatch("loss", &a2.shape().dims, &y.shape().dims))
  }
  let half = T::from(0.5).unwrap();
  Ok((a2 - y).sqr().sum(0).item() * half)
}

/// Hand-derived gradients of [loss] with respect to every parameter.

pub fn backward<T: Real>(
  params: &Params<T>,
  x: &Tensor<T>,
  y: &Tensor<T>,
  activations: &Activations<T>,
) -> Result<Gradients<T>> {
  let ones = Tensor::ones(&[x.dim(-1), 1]);

  let delta2 = &activations.a2 - y;
  let w2 = delta2.try_mm(&activations.a1.t())?;
  let b2 = delta2.try_mm(&ones)?;

  let step: Tensor<T> = activations.z1.gt(&Tensor::scalar(T::zero())).numeric();
  let delta1 = params.w2.t().try_mm(&delta2)? * step;
  let w1 = delta1.try_mm(&x.t())?;
  let b1 = delta1.try_mm(&ones)?;

  Ok(Gradients { w1, b1, w2, b2 })
}
