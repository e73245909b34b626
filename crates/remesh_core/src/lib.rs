//! The `remesh_core` crate provides the metric tensor primitive for
//! anisotropic unstructured mesh adaptation. A metric tensor is a symmetric
//! positive-semidefinite matrix attached to each mesh vertex; the adapter
//! measures edge lengths and element quality under it when coarsening,
//! refining, swapping and smoothing.
//!
//! Key components:
//! - **Traits**: `Scalar` (floating-point element abstraction, monomorphised
//!   for `f32`/`f64`).
//! - **Eigen**: fixed-size 2x2/3x3 symmetric eigendecomposition and
//!   recomposition on top of nalgebra.
//! - **Metric**: `MetricTensor` with positive-definiteness enforcement,
//!   spectral decomposition, length queries and metric intersection.

pub mod eigen;
pub mod metric;
pub mod traits;

pub use metric::{EigenDecomposition, MetricTensor};
pub use traits::Scalar;
