//! Backpropagation for a two-layer ReLU network, computed both by hand
//! and through automatic differentiation, on top of a tiny tensor library.
//! CPU only. Few dependencies.
//!
//! # Features
//!
//! - **Safe auto-grad**: Non-differentiable operations return a separate
//! type that cannot be back-propagated, revealing gaps in your computation graph
//! at compile time.
//!
//! - **Broadcasting**: Tensors with differing but compatible shapes get
//! broadcasted to matching dimensions automatically for most operations.
//!
//! - **Zero-copy views**: Tensors may be reshaped, transposed and
//! broadcasted without actually copying any data in most situations.
//!
//! - **Two learners**: [ManualLearner](learner::ManualLearner) applies hand-derived
//! gradients, [AutogradLearner](learner::AutogradLearner) lets the computation
//! graph derive them. Both are driven by the same [Trainer](train::Trainer).
//!
//! # Examples
//!
//! Evaluating and minimizing a function:
//! ```
//! use microprop::{ ops::*, Tensor, optimize::{ Optimizer, SGD } };
//!
//! // Create trainable variables from tensors
//! let w = Tensor::vec(&[0.5, -1.0]).trained();
//!
//! let mut optimizer = Optimizer::new(0.05, SGD);
//!
//! for _ in 0..50 {
//!   // Track input data for compute operations to be recorded
//!   let x = Tensor::vec(&[1.0, 2.0]).tracked();
//!
//!   // Compute loss
//!   let loss = ((&x * &w).sum(0) - 3.0).sqr();
//!
//!   // Back-prop, optimize and reset gradients
//!   optimizer.minimize(&loss, &loss.parameters(), true).unwrap();
//! }
//! assert!(((w.raw()[0] + 2.0 * w.raw()[1]) - 3.0_f64).abs() < 1e-3);
//! ```
//!
//! Training the network:
//! ```
//! use microprop::train::{ Trainer, TrainConfig, Backprop };
//!
//! let config = TrainConfig::<f32> { iterations: 101, ..Default::default() };
//! let report = Trainer::new(config)
//!   .run(Backprop::Autograd, |sample| println!("{sample}") )
//!   .unwrap();
//!
//! assert_eq!(report.samples.len(), 2);
//! assert!(report.final_loss < report.samples[0].loss);
//! ```
//!
//! ## More examples
//! Check the `/demos` folder for the complete training programs.
//!
//!
//! # Optional features
//!
//! Some features can be toggled in your `Cargo.toml`.
//!
//! - `unsafe` *(default)*: Accelerated matrix math using [matrixmultiply] crate.
//! - `threading`: Multi-threaded matrix multiplication.

mod internal;
mod shape;
mod tensor;
mod variable;

pub mod error;
pub mod ops;
pub mod scalar;
pub mod optimize;
pub mod network;
pub mod learner;
pub mod train;

pub use error::{ Error, Result };
pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{ Variable, UnaryOp, BinaryOp };
