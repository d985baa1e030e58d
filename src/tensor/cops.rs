use num_traits::Zero;

use crate::ops::Cops;


fn portable_gemm<T>(
  m: usize, k: usize, n: usize,
  lhs: &[T], [rs_l, cs_l]: [isize; 2],
  rhs: &[T], [rs_r, cs_r]: [isize; 2],
) -> Vec<T>
where
  T: Copy + Zero + std::ops::Mul<Output = T>,
{
  let mut data = vec![T::zero(); m * n];
  for i in 0..m as isize {
    for j in 0..n as isize {
      let mut acc = T::zero();
      for p in 0..k as isize {
        acc = acc +
          lhs[(i * rs_l + p * cs_l) as usize] *
          rhs[(p * rs_r + j * cs_r) as usize];
      }
      data[i as usize * n + j as usize] = acc;
    }
  }
  data
}

macro_rules! portable_cops {
  ($($t:ty),*) => {
    $(
      impl Cops for $t {
        fn gemm(
          m: usize, k: usize, n: usize,
          lhs: &[Self], lhs_strides: [isize; 2],
          rhs: &[Self], rhs_strides: [isize; 2],
        ) -> Vec<Self> {
          portable_gemm(m, k, n, lhs, lhs_strides, rhs, rhs_strides)
        }
      }
    )*
  };
}

portable_cops!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

#[cfg(not(feature = "unsafe"))]
portable_cops!(f32, f64);


// Accelerated kernels for floating point types

#[cfg(feature = "unsafe")]
macro_rules! accelerated_cops {
  ($t:ty, $gemm:path) => {
    impl Cops for $t {
      fn gemm(
        m: usize, k: usize, n: usize,
        lhs: &[Self], [rs_l, cs_l]: [isize; 2],
        rhs: &[Self], [rs_r, cs_r]: [isize; 2],
      ) -> Vec<Self> {
        let mut data = vec![0.0; m * n];
        if m == 0 || n == 0 { return data }
        // Highest element read through the strides must lie within the slices
        debug_assert!(k == 0 ||
          (((m - 1) as isize * rs_l + (k - 1) as isize * cs_l) as usize) < lhs.len());
        debug_assert!(k == 0 ||
          (((k - 1) as isize * rs_r + (n - 1) as isize * cs_r) as usize) < rhs.len());
        unsafe {
          $gemm(
            m, k, n,
            1.0,
            lhs.as_ptr(), rs_l, cs_l,
            rhs.as_ptr(), rs_r, cs_r,
            0.0,
            data.as_mut_ptr(), n as isize, 1,
          );
        }
        data
      }
    }
  };
}

#[cfg(feature = "unsafe")]
accelerated_cops!(f32, matrixmultiply::sgemm);

#[cfg(feature = "unsafe")]
accelerated_cops!(f64, matrixmultiply::dgemm);


#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;

  #[test]
  fn portable_strided() {
    // [[1,2,3],[4,5,6]] times its transpose, read through swapped strides
    let a = [1, 2, 3, 4, 5, 6];
    let out = i32::gemm(2, 3, 2, &a, [3, 1], &a, [1, 3]);
    assert_eq!(out, vec![14, 32, 32, 77]);
  }

  #[test]
  fn float_kernel() {
    let a = [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
    let b = [0.5f64, -1.0, 2.0];
    let out = f64::gemm(2, 3, 1, &a, [3, 1], &b, [1, 1]);
    assert_relative_eq!(out[0], 4.5);
    assert_relative_eq!(out[1], 9.0);
  }

  #[test]
  fn broadcast_column() {
    // A stride of zero repeats the single column
    let a = [1.0f32, 1.0];
    let b = [3.0f32];
    let out = f32::gemm(2, 1, 3, &a, [1, 1], &b, [0, 0]);
    assert_eq!(out, vec![3.0; 6]);
  }
}
