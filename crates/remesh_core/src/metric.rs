use std::fmt;

use anyhow::{anyhow, bail, Result};
use nalgebra::{Matrix2, Matrix3, SMatrix};
use num_traits::Float;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::eigen;
use crate::traits::Scalar;

/// Symmetric metric tensor attached to a mesh vertex.
///
/// A metric tensor is a symmetric positive-semidefinite d x d matrix
/// (d in {2, 3}) defining a local inner product; edge lengths are measured
/// as sqrt(e^T M e). Components are stored row-major as the full d*d
/// matrix. After any successful mutating operation other than [`scale`] and
/// the raw setters, the stored matrix is symmetric positive-semidefinite up
/// to round-off.
///
/// A default-constructed tensor is uninitialised (dimension 0, no storage).
/// The first `new`/`set_*` call fixes the dimension for the lifetime of the
/// object; resetting a different dimension is an error.
///
/// The zero matrix is a legal state meaning "no metric information" and is
/// left untouched by positive-definiteness enforcement and by
/// [`constrain`].
///
/// [`scale`]: MetricTensor::scale
/// [`constrain`]: MetricTensor::constrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTensor<T: Scalar> {
    dimension: usize,
    components: Vec<T>,
}

/// Spectral factors of a metric tensor.
///
/// `eigenvalues` holds the absolute values of the (real) eigenvalues in the
/// solver's native order; callers must not rely on a particular ordering.
/// `eigenvectors` is a row-major d*d matrix whose **rows** are the matching
/// eigenvectors, i.e. the transpose of the usual columns-as-eigenvectors
/// convention. [`MetricTensor::eigen_undecomp`] expects this layout, so the
/// two operations compose to the identity on positive-definite tensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenDecomposition<T: Scalar> {
    pub eigenvalues: Vec<T>,
    pub eigenvectors: Vec<T>,
}

impl<T: Scalar> EigenDecomposition<T> {
    fn zeros(dimension: usize) -> Self {
        Self {
            eigenvalues: vec![T::zero(); dimension],
            eigenvectors: vec![T::zero(); dimension * dimension],
        }
    }
}

impl<T: Scalar> Default for MetricTensor<T> {
    fn default() -> Self {
        Self {
            dimension: 0,
            components: Vec::new(),
        }
    }
}

impl<T: Scalar> MetricTensor<T> {
    /// Raw construction from a row-major d*d component buffer.
    ///
    /// Positive-definiteness is *not* enforced; use [`set_metric`] for
    /// field data of uncertain sign.
    ///
    /// [`set_metric`]: MetricTensor::set_metric
    pub fn new(dimension: usize, components: &[T]) -> Result<Self> {
        validate_shape(dimension, components.len())?;
        Ok(Self {
            dimension,
            components: components.to_vec(),
        })
    }

    /// Overwrite the components without enforcing positive-definiteness,
    /// subject to the dimension lock.
    pub fn set_components(&mut self, dimension: usize, components: &[T]) -> Result<()> {
        if self.dimension != 0 && self.dimension != dimension {
            bail!(
                "Metric tensor dimension is fixed at {}; cannot reset to {}.",
                self.dimension,
                dimension
            );
        }
        validate_shape(dimension, components.len())?;
        self.dimension = dimension;
        self.components.clear();
        self.components.extend_from_slice(components);
        Ok(())
    }

    /// Overwrite the components and enforce positive-definiteness.
    ///
    /// Errors if the tensor already holds a different dimension.
    pub fn set_metric(&mut self, dimension: usize, components: &[T]) -> Result<()> {
        self.set_components(dimension, components)?;
        Self::enforce_positive_definiteness(dimension, &mut self.components)
    }

    /// Spatial dimension, or 0 for an uninitialised tensor.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Row-major d*d component buffer.
    pub fn components(&self) -> &[T] {
        &self.components
    }

    /// Copy the components into a caller-supplied buffer.
    pub fn copy_components_into(&self, out: &mut [T]) -> Result<()> {
        if out.len() != self.components.len() {
            bail!(
                "Output buffer has {} entries, expected {}.",
                out.len(),
                self.components.len()
            );
        }
        out.copy_from_slice(&self.components);
        Ok(())
    }

    /// Multiply every component by `factor`.
    ///
    /// A positive factor preserves positive-definiteness, so none is
    /// re-enforced here.
    pub fn scale(&mut self, factor: T) {
        for component in &mut self.components {
            *component = *component * factor;
        }
    }

    /// Project a row-major matrix onto the positive-semidefinite cone by
    /// reflecting negative eigenvalues, in place.
    ///
    /// The eigendecomposition M = V L V^T is recomposed as V |L| V^T:
    /// eigenvectors are unchanged and only truly vanishing eigenvalues
    /// remain zero. The zero matrix is returned unchanged.
    pub fn enforce_positive_definiteness(dimension: usize, metric: &mut [T]) -> Result<()> {
        validate_shape(dimension, metric.len())?;
        if eigen::is_zero(metric) {
            return Ok(());
        }

        if dimension == 2 {
            let m = Matrix2::from_row_slice(metric);
            let (values, vectors) = eigen::decompose_2(&m);
            let folded = values.map(|v| Float::abs(v));
            write_row_major(&eigen::recompose_2(&folded, &vectors), metric);
        } else {
            let m = Matrix3::from_row_slice(metric);
            let (values, vectors) = eigen::decompose_3(&m);
            let folded = values.map(|v| Float::abs(v));
            write_row_major(&eigen::recompose_3(&folded, &vectors), metric);
        }
        Ok(())
    }

    /// Positive-definiteness enforcement that additionally flattens the 2D
    /// spectrum to the smaller eigenvalue magnitude, producing an isotropic
    /// tensor sized by the tighter direction.
    ///
    /// The 3D path applies the same fold as
    /// [`enforce_positive_definiteness`] without flattening.
    pub fn enforce_positive_definiteness_isotropic(dimension: usize, metric: &mut [T]) -> Result<()> {
        validate_shape(dimension, metric.len())?;
        if eigen::is_zero(metric) {
            return Ok(());
        }

        if dimension == 2 {
            let m = Matrix2::from_row_slice(metric);
            let (values, vectors) = eigen::decompose_2(&m);
            let smallest = Float::min(Float::abs(values[0]), Float::abs(values[1]));
            let folded = nalgebra::Vector2::new(smallest, smallest);
            write_row_major(&eigen::recompose_2(&folded, &vectors), metric);
        } else {
            let m = Matrix3::from_row_slice(metric);
            let (values, vectors) = eigen::decompose_3(&m);
            let folded = values.map(|v| Float::abs(v));
            write_row_major(&eigen::recompose_3(&folded, &vectors), metric);
        }
        Ok(())
    }

    /// Eigendecomposition with rows-as-eigenvectors export.
    ///
    /// The zero matrix yields zero-filled factors without invoking the
    /// solver. An unsupported dimension (reachable only on an uninitialised
    /// tensor) emits a diagnostic and also yields zero-filled factors.
    pub fn eigen_decomp(&self) -> EigenDecomposition<T> {
        match self.dimension {
            2 => {
                if eigen::is_zero(&self.components) {
                    return EigenDecomposition::zeros(2);
                }
                let m = Matrix2::from_row_slice(&self.components);
                let (values, vectors) = eigen::decompose_2(&m);
                let mut decomposition = EigenDecomposition::zeros(2);
                for k in 0..2 {
                    decomposition.eigenvalues[k] = Float::abs(values[k]);
                }
                write_row_major(&vectors.transpose(), &mut decomposition.eigenvectors);
                decomposition
            }
            3 => {
                if eigen::is_zero(&self.components) {
                    return EigenDecomposition::zeros(3);
                }
                let m = Matrix3::from_row_slice(&self.components);
                let (values, vectors) = eigen::decompose_3(&m);
                let mut decomposition = EigenDecomposition::zeros(3);
                for k in 0..3 {
                    decomposition.eigenvalues[k] = Float::abs(values[k]);
                }
                write_row_major(&vectors.transpose(), &mut decomposition.eigenvectors);
                decomposition
            }
            dimension => {
                warn!(
                    dimension,
                    "eigendecomposition is only supported for 2x2 and 3x3 metric tensors"
                );
                EigenDecomposition::zeros(dimension)
            }
        }
    }

    /// Rebuild the components from eigen factors in the
    /// [`EigenDecomposition`] layout: m[i,j] = sum_k |D_k| V[k,i] V[k,j].
    ///
    /// Eigenvalues pass through an absolute value, so any real input
    /// produces a positive-semidefinite tensor.
    pub fn eigen_undecomp(&mut self, eigenvalues: &[T], eigenvectors: &[T]) -> Result<()> {
        let d = self.dimension;
        if eigenvalues.len() != d || eigenvectors.len() != d * d {
            bail!(
                "Eigen factors hold {} values and {} vector entries, expected {} and {}.",
                eigenvalues.len(),
                eigenvectors.len(),
                d,
                d * d
            );
        }

        for i in 0..d {
            for j in 0..d {
                let mut sum = T::zero();
                for k in 0..d {
                    sum = sum + Float::abs(eigenvalues[k]) * eigenvectors[k * d + i] * eigenvectors[k * d + j];
                }
                self.components[i * d + j] = sum;
            }
        }
        Ok(())
    }

    /// Characteristic local edge length: sqrt(d / sum of eigenvalues).
    pub fn average_length(&self) -> T {
        let decomposition = self.eigen_decomp();
        let sum = decomposition
            .eigenvalues
            .iter()
            .fold(T::zero(), |acc, &v| acc + v);
        let mean = sum / T::from_usize(self.dimension).unwrap();
        Float::sqrt(T::one() / mean)
    }

    /// Longest edge length supported locally: sqrt(1 / min eigenvalue).
    pub fn max_length(&self) -> T {
        let decomposition = self.eigen_decomp();
        let min = decomposition
            .eigenvalues
            .iter()
            .copied()
            .fold(T::infinity(), Float::min);
        Float::sqrt(T::one() / min)
    }

    /// Shortest edge length supported locally: sqrt(1 / max eigenvalue).
    pub fn min_length(&self) -> T {
        let decomposition = self.eigen_decomp();
        let max = decomposition
            .eigenvalues
            .iter()
            .copied()
            .fold(T::zero(), Float::max);
        Float::sqrt(T::one() / max)
    }

    /// Metric intersection.
    ///
    /// With `preserve_small_edges` the result dominates both inputs along
    /// every direction (the tighter metric wins per direction); without it
    /// the result is dominated by both (the looser metric wins). The
    /// reduction happens in the whitened frame of the more isotropic of the
    /// two tensors, which is numerically the more stable reference; on an
    /// aspect-ratio tie `self` stays the reference.
    ///
    /// NaN components in `other` and the zero matrix on either side leave
    /// `self` unchanged.
    pub fn constrain(&mut self, other: &MetricTensor<T>, preserve_small_edges: bool) -> Result<()> {
        if other.dimension != self.dimension {
            bail!(
                "Cannot constrain a {}-dimensional metric with a {}-dimensional one.",
                self.dimension,
                other.dimension
            );
        }

        let d = self.dimension;
        for i in 0..d {
            for j in i..d {
                if Float::is_nan(other.components[i * d + j]) {
                    return Ok(());
                }
            }
        }

        match d {
            2 => constrain_2(&mut self.components, &other.components, preserve_small_edges),
            3 => constrain_3(&mut self.components, &other.components, preserve_small_edges),
            dimension => {
                warn!(
                    dimension,
                    "constrain is only supported for 2x2 and 3x3 metric tensors"
                );
                Ok(())
            }
        }
    }
}

impl<T: Scalar> fmt::Display for MetricTensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.dimension {
            for j in 0..self.dimension {
                write!(f, "{} ", self.components[i * self.dimension + j])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn validate_shape(dimension: usize, len: usize) -> Result<()> {
    if dimension != 2 && dimension != 3 {
        bail!("Metric tensor dimension must be 2 or 3, got {}.", dimension);
    }
    if len != dimension * dimension {
        bail!(
            "Component buffer has {} entries, expected {}.",
            len,
            dimension * dimension
        );
    }
    Ok(())
}

fn write_row_major<T: Scalar, const D: usize>(m: &SMatrix<T, D, D>, out: &mut [T]) {
    for i in 0..D {
        for j in 0..D {
            out[i * D + j] = m[(i, j)];
        }
    }
}

fn constrain_2<T: Scalar>(metric: &mut [T], other: &[T], preserve_small_edges: bool) -> Result<()> {
    // A zero matrix on either side carries no sizing information.
    if eigen::is_zero(other) || eigen::is_zero(metric) {
        return Ok(());
    }

    let m_self = Matrix2::from_row_slice(metric);
    let m_other = Matrix2::from_row_slice(other);

    let (values_self, _) = eigen::decompose_2(&m_self);
    let (values_other, _) = eigen::decompose_2(&m_other);
    let aspect_self = eigen::aspect_ratio(values_self.as_slice());
    let aspect_other = eigen::aspect_ratio(values_other.as_slice());

    let (reference, target) = if aspect_other > aspect_self {
        (m_other, m_self)
    } else {
        (m_self, m_other)
    };

    // Whitening factor F with F^T F = reference, built from the
    // rows-as-eigenvectors layout.
    let (values_r, vectors_r) = eigen::decompose_2(&reference);
    let scaling = values_r.map(|v| Float::sqrt(Float::abs(v)));
    let f = Matrix2::from_diagonal(&scaling) * vectors_r.transpose();
    let f_t = f.transpose();
    let f_inv = f
        .try_inverse()
        .ok_or_else(|| anyhow!("Whitening factor is singular during metric intersection."))?;

    // Push the target into the frame where the reference is the identity,
    // clamp its spectrum against 1, and pull the result back.
    let pushed = f_inv.transpose() * target * f_inv;
    let (values, vectors) = eigen::decompose_2(&pushed);
    let clamped = values.map(|v| {
        let v = Float::abs(v);
        if preserve_small_edges {
            Float::max(T::one(), v)
        } else {
            Float::min(T::one(), v)
        }
    });

    let constrained = f_t * eigen::recompose_2(&clamped, &vectors) * f_t.transpose();
    write_row_major(&constrained, metric);
    Ok(())
}

fn constrain_3<T: Scalar>(metric: &mut [T], other: &[T], preserve_small_edges: bool) -> Result<()> {
    if eigen::is_zero(other) || eigen::is_zero(metric) {
        return Ok(());
    }

    let m_self = Matrix3::from_row_slice(metric);
    let m_other = Matrix3::from_row_slice(other);

    let (values_self, _) = eigen::decompose_3(&m_self);
    let (values_other, _) = eigen::decompose_3(&m_other);
    let aspect_self = eigen::aspect_ratio(values_self.as_slice());
    let aspect_other = eigen::aspect_ratio(values_other.as_slice());

    let (reference, target) = if aspect_other > aspect_self {
        (m_other, m_self)
    } else {
        (m_self, m_other)
    };

    let (values_r, vectors_r) = eigen::decompose_3(&reference);
    let scaling = values_r.map(|v| Float::sqrt(Float::abs(v)));
    let f = Matrix3::from_diagonal(&scaling) * vectors_r.transpose();
    let f_t = f.transpose();
    let f_inv = f
        .try_inverse()
        .ok_or_else(|| anyhow!("Whitening factor is singular during metric intersection."))?;

    let pushed = f_inv.transpose() * target * f_inv;
    let (values, vectors) = eigen::decompose_3(&pushed);
    let clamped = values.map(|v| {
        let v = Float::abs(v);
        if preserve_small_edges {
            Float::max(T::one(), v)
        } else {
            Float::min(T::one(), v)
        }
    });

    let constrained = f_t * eigen::recompose_3(&clamped, &vectors) * f_t.transpose();
    write_row_major(&constrained, metric);
    Ok(())
}
