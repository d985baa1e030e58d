use std::ops::{ Add, Sub, Mul, Div };

use crate::internal::*;
use crate::Shape;
use crate::scalar::{ Inner, Numeric, Signed, Real };


/// Low-level compute kernels, implemented per inner type.

pub trait Cops: Sized {
  /// Multiply an `m x k` matrix with a `k x n` matrix into a new
  /// contiguous `m x n` buffer. Both inputs are read through their
  /// `[row, column]` strides, starting at the beginning of the slice.
  fn gemm(
    m: usize, k: usize, n: usize,
    lhs: &[Self], lhs_strides: [isize; 2],
    rhs: &[Self], rhs_strides: [isize; 2],
  ) -> Vec<Self>;
}


/// The four arithmetic operators, taking `Rhs` and producing `Output`.

pub trait Arithmetic<Rhs = Self, Output = Self>:
  Add<Rhs, Output = Output> + Sub<Rhs, Output = Output> +
  Mul<Rhs, Output = Output> + Div<Rhs, Output = Output> {}

impl<T, Rhs, Output> Arithmetic<Rhs, Output> for T where
  T: Add<Rhs, Output = Output> + Sub<Rhs, Output = Output> +
     Mul<Rhs, Output = Output> + Div<Rhs, Output = Output> {}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Inner] types.

pub trait BaseOps<I: Inner>: Clone {
  fn scalar(item: I) -> Self;
  fn shape(&self) -> &Shape;
  fn broadcast(&self, shape: &Shape) -> Self;
  fn reshape(&self, dims: &[usize]) -> Self;
  fn unsqueeze(&self, dim: isize) -> Self;
  fn transpose(&self, dim1: isize, dim2: isize) -> Self;
}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Numeric] inner types.

pub trait NumericOps<I: Numeric>: Arithmetic + Arithmetic<I, Self> + Sized {
  fn sum(&self, dim: isize) -> Self;
  fn mm(&self, rhs: &Self) -> Self;
}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Signed] inner types.

pub trait SignedOps<I: Signed>: std::ops::Neg {
  fn abs(&self) -> Self;
}


/// Differentiable mid-level operations.

pub trait RealOps<I: Real>: std::ops::Neg {
  fn pow(&self, rhs: &Self) -> Self;
  fn relu(&self) -> Self;
}


/// High-level operations, implemented exclusively on top of
/// Mops and other Hops. As a result, these are all
/// differentiable when called on a [Variable](crate::Variable).

pub trait Hops<I>: BaseOps<I> + NumericOps<I> + SignedOps<I> + RealOps<I>
where
  I: Real,
  for<'a> &'a Self: Arithmetic<&'a Self, Self> + Arithmetic<I, Self>,
{
  fn powf(&self, exp: I) -> Self {
    self.pow(&Self::scalar(exp))
  }

  fn sqr(&self) -> Self {
    self.powf(I::from(2.0).unwrap())
  }

  fn mean(&self, dim: isize) -> Self {
    let udim = negative_index(dim, self.shape().rank(), false);
    let n: usize = self.shape().dims[udim..].iter().product();
    let n = I::from(n).unwrap();
    &self.sum(dim) / n
  }

  /// Transpose the last two dimensions.

  fn t(&self) -> Self {
    self.transpose(-1, -2)
  }
}
