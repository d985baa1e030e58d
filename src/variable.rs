use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::fmt::Debug;

use rand::Rng;
use log::debug;

mod mops;

use crate::{
  internal::*,
  error::{ Error, Result },
  tensor::Tensor,
  scalar::Real,
  ops::{ BaseOps, NumericOps, SignedOps, Hops },
};


pub fn make_id() -> usize {
  static LAST_ID: AtomicUsize = AtomicUsize::new(0);
  LAST_ID.fetch_add(1, Ordering::Relaxed)
}


/// Unary computational operation that can also compute its derivative.

pub trait UnaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T>;
}


/// Binary computational operation that can also compute its derivative.

pub trait BinaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>);
}


#[derive(Debug)]
enum Op<T: Real> {
  Unary(Box<dyn UnaryOp<T>>),
  Binary(Box<dyn BinaryOp<T>>),
}


/// Node in a computation graph, containing a [Variable]'s data and gradient,
/// as well as the operation used to create it.

#[derive(Debug)]
struct Node<T: Real> {
  id: usize,
  cell: NodeCell<T>,
  op: Option<Op<T>>,
  previous: Vec<RcT<Self>>,
  trainable: bool,
}

#[derive(Debug)]
struct NodeCell<T: Real> {
  data: Tensor<T>,
  grad: Option<Tensor<T>>,
}

impl<T: Real> Node<T> {
  fn grad(&self) -> Option<&Tensor<T>> {
    self.cell.grad.as_ref()
  }

  fn reset_gradient(&self, filler: T) {
    if let Some(grad) = &self.cell.grad {
      grad.refill(filler);
    }
  }

  fn backward(&self) {
    if let (Some(op), Some(grad)) = (&self.op, &self.cell.grad) {
      let lhs = &self.previous[0];
      let changes = match op {
        Op::Unary(op) => vec![op.derive(&lhs.cell.data, grad)],
        Op::Binary(op) => {
          let rhs = &self.previous[1];
          let changes = op.derive(&lhs.cell.data, &rhs.cell.data, grad);
          vec![changes.0, changes.1]
        },
      };
      // Gradients accumulate until reset
      for (change, prev) in changes.iter().zip(self.previous.iter()) {
        if let Some(grad) = &prev.cell.grad {
          grad.op_assign(change, |a, b| *a += b );
        }
      }
    }
  }
}


/// Variables track the computational operations used to create them and allow
/// for computing their gradient with respect to all input variables involved.
///
/// They get created by calling [tracked](Tensor::tracked) or
/// [trained](Tensor::trained) on any differentiable [Tensor] type.
///
/// Variables dereference to their underlying [Tensor] automatically for
/// non-differentiable operations. Differentiable operations, on the other hand,
/// will always return another Variable.

#[derive(Debug, Clone)]
pub struct Variable<T: Real> {
  node: RcT<Node<T>>,
}

impl<T: Real> Hops<T> for Variable<T> {}

impl<T: Real> std::ops::Deref for Variable<T> {
  type Target = Tensor<T>;

  fn deref(&self) -> &Self::Target {
    &self.node.cell.data
  }
}

impl<T: Real> PartialEq for Variable<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.node.cell.data == rhs.node.cell.data
  }
}

impl<T: Real> Variable<T> {
  pub(crate) fn from_tensor(tensor: Tensor<T>, trainable: bool) -> Self {
    Self {
      node: RcT::new(Node {
        id: make_id(),
        cell: NodeCell {
          grad: trainable.then(|| Tensor::zeros(&tensor.shape().dims) ),
          data: tensor,
        },
        op: None,
        previous: vec![],
        trainable,
      }),
    }
  }

  fn operation(op: Op<T>, data: Tensor<T>, grad: bool, previous: Vec<RcT<Node<T>>>) -> Self {
    Self {
      node: RcT::new(Node {
        id: make_id(),
        cell: NodeCell {
          grad: grad.then(|| Tensor::zeros(&data.shape().dims) ),
          data,
        },
        op: Some(op),
        previous,
        trainable: false,
      }),
    }
  }

  pub fn tensor(&self) -> &Tensor<T> {
    &self.node.cell.data
  }

  pub fn grad(&self) -> Option<&Tensor<T>> {
    self.node.grad()
  }

  pub fn is_trainable(&self) -> bool {
    self.node.trainable
  }

  pub fn unary_op(&self, op: impl UnaryOp<T> + 'static) -> Self {
    let data = op.run(&self.node.cell.data);
    Self::operation(
      Op::Unary(Box::new(op)),
      data,
      self.grad().is_some(),
      vec![self.node.clone()],
    )
  }

  pub fn binary_op(&self, op: impl BinaryOp<T> + 'static, rhs: &Self) -> Self {
    let data = op.run(&self.node.cell.data, &rhs.node.cell.data);
    Self::operation(
      Op::Binary(Box::new(op)),
      data,
      self.grad().is_some() || rhs.grad().is_some(),
      vec![self.node.clone(), rhs.node.clone()],
    )
  }

  /// Compute gradients across this Variable's entire graph.
  ///
  /// Gradients of the graph's leaves get added to whatever their
  /// buffers already contain. Call [reset](Variable::reset) in between
  /// runs to start from zero.

  pub fn backward(&self) -> Result<()> {
    if self.grad().is_none() { return Err(Error::NoGradient) }
    let history = self.history();
    for node in history.iter().filter(|node| node.op.is_some() ) {
      node.reset_gradient(T::zero());
    }
    self.node.reset_gradient(T::one());
    for node in history.iter().rev() {
      node.backward();
    }
    Ok(())
  }

  /// List all trainable parameters in this Variable's graph.

  pub fn parameters(&self) -> Vec<Self> {
    self.history()
      .into_iter()
      .filter(|node| node.trainable )
      .map(|node| Self { node } )
      .collect()
  }

  /// Set gradients to zero for this Variable's entire graph.

  pub fn reset(&self) {
    let history = self.history();
    debug!("Resetting gradients of {} nodes", history.len());
    for node in history {
      node.reset_gradient(T::zero());
    }
  }

  fn history(&self) -> Vec<RcT<Node<T>>> {
    let mut history = vec![];
    Self::history_recurse(&self.node, &mut history, &mut HashSet::new());
    history
  }

  fn history_recurse(node: &RcT<Node<T>>, history: &mut Vec<RcT<Node<T>>>, visited: &mut HashSet<usize>) {
    if visited.contains(&node.id) { return }
    visited.insert(node.id);
    for prev in &node.previous {
      Self::history_recurse(prev, history, visited);
    }
    history.push(node.clone());
  }

  /// Compute a function's gradient with respect to a generated
  /// input numerically and compare it to the automatically derived
  /// solution.
  ///
  /// Supply any function to check that it gets differentiated correctly.
  /// Returns the mean absolute difference between both gradients.

  pub fn check_gradients<F, R>(shape: &[usize], rng: &mut R, generator: F) -> Result<T>
  where
    F: Fn(&Self) -> Self,
    R: Rng + ?Sized,
  {
    let eps = T::from(1e-3).unwrap();
    let two = T::from(2.0).unwrap();
    // Generate random input
    let input = Tensor::randn_with(shape, rng);
    let var = input.trained();
    // Compute gradient using auto diff
    let output = generator(&var).sum(0);
    output.backward()?;
    let grad = var.grad().ok_or(Error::NoGradient)?.detach();
    // Compute gradient numerically for every param in input
    let len = input.shape().size();
    let mut num_grad = vec![T::zero(); len];
    for i in 0..len {
      let epst = Tensor::hot_encode(i, len).reshape(shape) * eps;
      let prev = generator(&(&input - &epst).tracked()).sum(0);
      let next = generator(&(&input + &epst).tracked()).sum(0);
      num_grad[i] = (next.item() - prev.item()) / (two * eps);
    }
    let num_grad = Tensor::new(&grad.shape().dims, num_grad);
    // Return average difference between both gradients
    (grad - num_grad).abs().mean(0).try_item()
  }
}

impl<T: Real> std::fmt::Display for Variable<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let title = if self.node.trainable { "Trainable" } else {
      if self.node.cell.grad.is_some() { "Computed" } else { "Tracked" }
    };
    write!(f, "{title} {}", self.tensor())
  }
}


#[cfg(test)]
mod tests {
  use rand::{ SeedableRng, rngs::StdRng };
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::ops::RealOps;

  #[test]
  fn x_squared() {
    let x = Tensor::vec(&[3.0, 5.0]).trained();
    let z = &x * &x + 2.0;
    z.sum(0).backward().unwrap();
    assert_eq!(z, Tensor::vec(&[11.0, 27.0]).tracked());
    assert_eq!(x.grad(), Some(&Tensor::vec(&[6.0, 10.0])));
  }

  #[test]
  fn constant_has_no_gradient() {
    let x = Tensor::vec(&[1.0, 2.0]).tracked();
    assert_eq!((&x * 2.0).backward(), Err(Error::NoGradient));
  }

  #[test]
  fn accumulate_and_reset() {
    let w = Tensor::vec(&[1.0, -2.0]).trained();
    let loss = (&w * 3.0).sum(0);
    loss.backward().unwrap();
    loss.backward().unwrap();
    assert_eq!(w.grad(), Some(&Tensor::vec(&[6.0, 6.0])));

    // A fresh graph over the same parameter keeps accumulating
    let loss = (&w * 3.0).sum(0);
    loss.backward().unwrap();
    assert_eq!(w.grad(), Some(&Tensor::vec(&[9.0, 9.0])));

    loss.reset();
    assert_eq!(w.grad(), Some(&Tensor::vec(&[0.0, 0.0])));
  }

  #[test]
  fn retracking_creates_constant_view() {
    let w = Tensor::vec(&[1.0, 2.0]).trained();
    let c = w.tracked();
    assert!(c.grad().is_none());
    assert!(c.shared_with(&w));
    assert_eq!((&c * 2.0).backward(), Err(Error::NoGradient));
  }

  #[test]
  fn parameters() {
    let w = Tensor::<f64>::ones(&[2,3]).trained();
    let x = Tensor::<f64>::ones(&[3,4]).tracked();
    let b = Tensor::<f64>::zeros(&[2,1]).trained();
    let loss = (w.mm(&x) + &b).sum(0);
    let params = loss.parameters();
    assert_eq!(params.len(), 2);
    assert!(params.iter().all(|p| p.is_trainable() ));
  }

  #[test]
  fn bias_gradient_sums_batch() {
    let z = Tensor::new(&[2,3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).tracked();
    let b = Tensor::<f64>::zeros(&[2,1]).trained();
    (&z + &b).sum(0).backward().unwrap();
    assert_eq!(b.grad(), Some(&Tensor::new(&[2,1], vec![3.0, 3.0])));
  }

  #[test]
  fn gradients() {
    let mut rng = StdRng::seed_from_u64(1);
    let w = Tensor::<f64>::randn_with(&[3,4], &mut rng).tracked();
    let b = Tensor::<f64>::randn_with(&[3,1], &mut rng).tracked();

    let err = Variable::check_gradients(&[4,5], &mut rng, |x| (w.mm(x) + &b).relu().sqr() ).unwrap();
    assert_abs_diff_eq!(err, 0.0, epsilon = 1e-4);

    let err = Variable::check_gradients(&[3,5], &mut rng, |x| (x * 0.5 - 1.0) / (x.sqr() + 1.0) ).unwrap();
    assert_abs_diff_eq!(err, 0.0, epsilon = 1e-4);

    let err = Variable::<f64>::check_gradients(&[2,3], &mut rng, |x| x.t().reshape(&[6]).mean(0) ).unwrap();
    assert_abs_diff_eq!(err, 0.0, epsilon = 1e-6);
  }
}
