use thiserror::Error;


/// Errors raised by checked tensor operations and the training pipeline.

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
  #[error("Shape mismatch in {op}: {lhs:?} vs {rhs:?}")]
  ShapeMismatch {
    op: &'static str,
    lhs: Vec<usize>,
    rhs: Vec<usize>,
  },

  #[error("Invalid layer sizes {0:?}: expected [input, hidden, output] with non-zero sizes")]
  InvalidLayout(Vec<usize>),

  #[error("Cannot compute gradients for a constant")]
  NoGradient,

  #[error("Expected a scalar, got shape {0:?}")]
  NotScalar(Vec<usize>),
}

pub type Result<T> = std::result::Result<T, Error>;


impl Error {
  pub(crate) fn mismatch(op: &'static str, lhs: &[usize], rhs: &[usize]) -> Self {
    Self::ShapeMismatch { op, lhs: lhs.to_vec(), rhs: rhs.to_vec() }
  }
}
