use rand::Rng;

use crate::{
  scalar::Real,
};


pub(crate) type RcT<T> = std::rc::Rc<T>;


#[inline]
pub fn negative_index(i: isize, n: usize, start_behind: bool) -> usize {
  if i < 0 {
    let offset = if start_behind { 1 } else { 0 };
    (n as isize + i + offset) as usize
  } else {
    i as usize
  }
}


// Polar Box-Muller transformation

pub fn randn<T: Real, R: Rng + ?Sized>(rng: &mut R) -> (T, T) {
  loop {
    let u = rng.gen_range(-T::one()..T::one());
    let v = rng.gen_range(-T::one()..T::one());
    let r = u * u + v * v;
    // Try again if outside interval
    if r == T::zero() || r >= T::one() { continue }
    let c = (T::from(-2.0).unwrap() * r.ln() / r).sqrt();
    return (u * c, v * c)
  }
}
