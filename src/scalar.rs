use rand::distributions::uniform::SampleUniform;
use num_traits::{NumAssignOps, Num, NumCast};

use crate::ops::Cops;


/// All types that may be used in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + std::fmt::Debug + 'static {}
impl<T: PartialEq + Clone + Copy + std::fmt::Debug + 'static> Inner for T {}


/// All numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits and provide a matrix kernel.

pub trait Numeric: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum + Cops {}
impl<T: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum + Cops> Numeric for T {}


/// All signed numeric types.

pub trait Signed: Numeric + num_traits::Signed {}
impl<T: Numeric + num_traits::Signed> Signed for T {}


/// All continuous numeric types.
///
/// Gradients can be computed for any [Variable](crate::Variable)
/// whose inner type satisfies this trait.

pub trait Real: Signed + num_traits::real::Real + SampleUniform + std::fmt::Display {}
impl<T: Signed + num_traits::real::Real + SampleUniform + std::fmt::Display> Real for T {}
