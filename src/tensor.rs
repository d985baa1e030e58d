use std::rc::Rc;
use std::cell::{ Ref, RefCell };

use rand::Rng;
use itertools::Itertools;

mod cops;
mod lops;

use crate::{
  internal::*,
  error::{ Error, Result },
  shape::Shape,
  variable::Variable,
  scalar::{ Inner, Numeric, Real },
  ops::{ BaseOps, Hops },
};


/// Multidimensional array.
///
/// Tensors may contain any type that satisfies [Inner], but
/// additional methods are available for [Numeric], [Real]
/// and [boolean](bool) inner types.
///
/// Cloning a tensor is cheap and produces a view onto the same storage.
/// [Real] tensor types can be wrapped in a [Variable] by
/// calling [tracked](Tensor::tracked) or [trained](Tensor::trained).

#[derive(Debug, Clone)]
pub struct Tensor<T: Inner> {
  shape: Shape,
  data: Rc<RefCell<Vec<T>>>,
}

impl<T: Real> Hops<T> for Tensor<T> {}

impl<T: Inner> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    if self.shape.squeeze().dims != rhs.shape.squeeze().dims { return false }
    let data_l = self.data.borrow();
    let data_r = rhs.data.borrow();
    for (i, j) in self.shape.iter().zip(rhs.shape.iter()) {
      if data_l[i] != data_r[j] { return false }
    }
    true
  }
}

impl<T: Inner> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn new(shape: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(shape), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  pub fn from_vec(vec: Vec<T>) -> Self {
    Self::new(&[vec.len()], vec)
  }

  pub fn fill(shape: &[usize], filler: T) -> Self {
    Self::new(shape, vec![filler; shape.iter().product()])
  }

  pub fn raw(&self) -> Ref<Vec<T>> {
    self.data.borrow()
  }

  pub fn into_raw(self) -> Vec<T> {
    let shape = self.shape.clone();
    if shape.contiguous() && shape.offset == 0 && self.data.borrow().len() == shape.size() {
      match Rc::try_unwrap(self.data) {
        Ok(cell) => cell.into_inner(),
        Err(data) => data.borrow().clone(),
      }
    } else {
      self.param_iter().collect()
    }
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn dim(&self, dim: isize) -> usize {
    self.shape[dim]
  }

  pub fn shared_with(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }

  /// Overwrite this tensor's values in place with those of `other`,
  /// broadcasting `other` if needed. Every view sharing this tensor's
  /// storage observes the change.

  pub fn assign(&self, other: &Self) {
    self.op_assign(other, |a, b| *a = b );
  }

  pub fn refill(&self, filler: T) {
    let mut data = self.data.borrow_mut();
    for i in self.shape.iter() {
      data[i] = filler;
    }
  }

  pub fn op_assign(&self, other: &Self, cb: impl Fn(&mut T, T)) {
    let other = other.broadcast(&self.shape);
    assert!(other.shape.dims == self.shape.dims,
      "Could not assign {} tensor to {} tensor", other.shape, self.shape);
    // Avoid clashing borrow when tensors share storage
    let other = if self.shared_with(&other) {
      other.detach()
    } else {
      other
    };
    let mut data = self.data.borrow_mut();
    let other_data = other.data.borrow();
    for (i, j) in self.shape.iter().zip(other.shape.iter()) {
      cb(&mut data[i], other_data[j]);
    }
  }

  pub fn contiguous(&self) -> Self {
    if self.shape.contiguous() {
      self.clone()
    } else {
      self.detach()
    }
  }

  /// Copy into fresh, contiguous storage.

  pub fn detach(&self) -> Self {
    self.vectorize(|a| a )
  }

  pub fn zip<O,F>(&self, rhs: &Self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn((T, T)) -> O,
  {
    let rhs = rhs.broadcast(&self.shape);
    let lhs = self.broadcast(&rhs.shape);
    let data: Vec<O> = lhs.param_iter()
      .zip_eq(rhs.param_iter())
      .map(cb)
      .collect();
    Tensor::new(&rhs.shape.dims, data)
  }

  pub fn vectorize<O,F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T) -> O,
  {
    let data = self.param_iter().map(cb).collect();
    Tensor::new(&self.shape.dims, data)
  }

  /// Collapse all dimensions from `dim` onwards into a single value each.

  pub fn collapse<O,F>(&self, dim: isize, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn(Self) -> O,
  {
    let dim = negative_index(dim, self.shape.rank(), false);
    let inner = &self.shape.dims[dim..];
    let chunk = inner.iter().product::<usize>().max(1);
    let raw = self.contiguous().into_raw();
    let data = raw
      .chunks(chunk)
      .map(|values| cb(Tensor::new(inner, values.to_vec())) )
      .collect();
    Tensor::new(&self.shape.dims[..dim], data)
  }

  pub fn param_iter(&self) -> TensorIterator<T> {
    TensorIterator::new(self)
  }

  pub fn item(&self) -> T {
    self.try_item().unwrap_or_else(|err| panic!("{err}") )
  }

  pub fn try_item(&self) -> Result<T> {
    if self.shape.squeeze().rank() != 0 {
      return Err(Error::NotScalar(self.shape.dims.clone()))
    }
    Ok(self.raw()[self.shape.index(&[])])
  }

  pub fn view(&self, shape: &[usize]) -> Self {
    let shape = self.shape.view(shape);
    let data = self.data.clone();
    Self { shape, data }
  }
}

impl<T: Numeric> Tensor<T> {
  pub fn ones(shape: &[usize]) -> Self {
    Self::fill(shape, T::one())
  }

  pub fn zeros(shape: &[usize]) -> Self {
    Self::fill(shape, T::zero())
  }

  pub fn arrange(shape: &[usize], start: T, step: T) -> Self {
    Self::new(shape, (0..shape.iter().product())
      .map(|i| T::from(i).unwrap() * step + start )
      .collect())
  }

  pub fn hot_encode(idx: usize, size: usize) -> Self {
    let mut a = vec![T::zero(); size];
    a[idx] = T::one();
    Self::from_vec(a)
  }

  pub fn add(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a + b )
  }

  pub fn sub(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a - b )
  }

  pub fn mul(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a * b )
  }

  pub fn div(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a / b )
  }

  /// Sum over a single dimension, keeping it with size one.

  pub fn sum_over(&self, dim: isize) -> Self {
    let dim = negative_index(dim, self.rank(), false) as isize;
    self
      .transpose(dim, -1)
      .collapse(-1, |values| values.param_iter().sum() )
      .unsqueeze(-1)
      .transpose(-1, dim)
      .contiguous()
  }

  pub fn gt(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |(a, b)| a > b )
  }

  /// Matrix product of two rank-2 tensors.

  pub fn try_mm(&self, rhs: &Self) -> Result<Self> {
    let (dims_l, dims_r) = (&self.shape.dims, &rhs.shape.dims);
    if self.rank() != 2 || rhs.rank() != 2 || dims_l[1] != dims_r[0] {
      return Err(Error::mismatch("mm", dims_l, dims_r))
    }
    let (m, k, n) = (dims_l[0], dims_l[1], dims_r[1]);
    let data = {
      let data_l = self.raw();
      let data_r = rhs.raw();
      T::gemm(
        m, k, n,
        &data_l[self.shape.offset..], [self.shape.strides[0], self.shape.strides[1]],
        &data_r[rhs.shape.offset..], [rhs.shape.strides[0], rhs.shape.strides[1]],
      )
    };
    Ok(Self::new(&[m, n], data))
  }
}

impl<T: Real> Tensor<T> {
  pub fn rand_with<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
    let len = shape.iter().product();
    Self::new(shape, (0..len).map(|_| rng.gen_range(T::zero()..T::one()) ).collect())
  }

  /// Standard normal samples drawn from `rng`.

  pub fn randn_with<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
    let len = shape.iter().product();
    let mut data = vec![T::zero(); len];
    for i in 0..(len + 1) / 2 {
      let j = i * 2;
      let (r1, r2): (T, T) = randn(rng);
      data[j] = r1;
      if j + 1 < len { data[j + 1] = r2 }
    }
    Self::new(shape, data)
  }

  pub fn randn(shape: &[usize]) -> Self {
    Self::randn_with(shape, &mut rand::thread_rng())
  }

  pub fn trained(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), true)
  }

  pub fn tracked(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), false)
  }
}

impl Tensor<bool> {
  pub fn numeric<O: Numeric>(&self) -> Tensor<O> {
    self.vectorize(|a| if a { O::one() } else { O::zero() })
  }
}

impl<T: Inner> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor{:?} ", self.shape.dims)?;
    print_chunks(0, &self.shape, &self.detach().raw(), f)?;
    Ok(())
  }
}

fn print_chunks<T: std::fmt::Debug>(idx: usize, shape: &Shape, vec: &[T], f: &mut std::fmt::Formatter) -> std::fmt::Result {
  let indent = (0..idx * 2).map(|_| " ").collect::<String>();
  if shape.rank() == 0 {
    write!(f, "{indent}{:?}", vec[0])?;
  } else if idx == shape.rank() - 1 {
    write!(f, "{indent}{:?}\n", vec)?;
  } else {
    let chunks = vec.chunks(vec.len() / shape.dims[idx]);
    write!(f, "{indent}[\n")?;
    for chunk in chunks {
      print_chunks(idx + 1, shape, chunk, f)?;
    }
    write!(f, "{indent}]\n")?;
  }
  Ok(())
}


pub struct TensorIterator<'a, T: Inner> {
  data: Ref<'a, Vec<T>>,
  shape_iter: Box<dyn Iterator<Item=usize> + 'a>,
}

impl<'a, T: Inner> TensorIterator<'a, T> {
  fn new(tensor: &'a Tensor<T>) -> Self {
    Self {
      data: tensor.data.borrow(),
      shape_iter: tensor.shape.iter(),
    }
  }
}

impl<T: Inner> Iterator for TensorIterator<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<Self::Item> {
    self.shape_iter.next().map(|i| self.data[i] )
  }
}


#[cfg(test)]
mod tests {
  use rand::{ SeedableRng, rngs::StdRng };

  use super::*;
  use crate::ops::NumericOps;

  #[test]
  fn broadcast() {
    let x = Tensor::new(&[1,2,3], vec![1, 2, 3, 4, 5, 6]);

    let y = Tensor::new(&[    1], vec![1]);
    assert_eq!(x.add(&y), Tensor::new(&[1,2,3], vec![2, 3, 4, 5, 6, 7]));

    let y = Tensor::new(&[    3], vec![1, 2, 3]);
    assert_eq!(x.add(&y), Tensor::new(&[1,2,3], vec![2, 4, 6, 5, 7, 9]));

    let y = Tensor::new(&[  2,3], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(x.add(&y), Tensor::new(&[1,2,3], vec![2, 4, 6, 8, 10, 12]));
  }

  #[test]
  fn bias_column() {
    let z = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    let b = Tensor::new(&[2,1], vec![10, 20]);
    assert_eq!(z.add(&b), Tensor::new(&[2,3], vec![11, 12, 13, 24, 25, 26]));
  }

  #[test]
  fn sum_over() {
    let a = Tensor::arrange(&[3,2,2], 0, 1).sum_over(1);
    assert_eq!(a.shape().dims, vec![3,1,2]);
    assert_eq!(a, Tensor::new(&[3,1,2], vec![2, 4, 10, 12, 18, 20]));

    let b = Tensor::arrange(&[2,3], 1, 1).sum_over(-1);
    assert_eq!(b.shape().dims, vec![2,1]);
    assert_eq!(b, Tensor::new(&[2,1], vec![6, 15]));
  }

  #[test]
  fn mm_shape_mismatch() {
    let x = Tensor::<f32>::zeros(&[100,784]);
    let y = Tensor::<f32>::zeros(&[700,64]);
    assert_eq!(x.try_mm(&y).unwrap_err(),
      Error::ShapeMismatch { op: "mm", lhs: vec![100,784], rhs: vec![700,64] });
  }

  #[test]
  fn mm_transposed() {
    let x = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(x.mm(&x.transpose(0, 1)), Tensor::new(&[2,2], vec![14, 32, 32, 77]));
  }

  #[test]
  fn assign_shared_view() {
    let x = Tensor::new(&[2,2], vec![1, 2, 3, 4]);
    let view = x.transpose(0, 1);
    x.assign(&view);
    assert_eq!(x, Tensor::new(&[2,2], vec![1, 3, 2, 4]));
  }

  #[test]
  fn refill() {
    let x = Tensor::new(&[3], vec![1.0, 2.0, 3.0]);
    let view = x.clone();
    x.refill(0.0);
    assert_eq!(view, Tensor::zeros(&[3]));
  }

  #[test]
  fn item() {
    assert_eq!(Tensor::new(&[1,1], vec![7]).item(), 7);
    assert_eq!(Tensor::vec(&[1, 2]).try_item(), Err(Error::NotScalar(vec![2])));
  }

  #[test]
  fn seeded_randn() {
    let a = Tensor::<f64>::randn_with(&[5,3], &mut StdRng::seed_from_u64(3));
    let b = Tensor::<f64>::randn_with(&[5,3], &mut StdRng::seed_from_u64(3));
    assert_eq!(a, b);
    assert_eq!(a.size(), 15);
  }

  #[test]
  fn uniform() {
    let a = Tensor::<f32>::rand_with(&[4,4], &mut StdRng::seed_from_u64(0));
    assert!(a.param_iter().all(|v| (0.0..1.0).contains(&v) ));
  }
}
