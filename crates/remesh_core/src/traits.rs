use nalgebra::RealField;
use num_traits::{Float, FromPrimitive};
use std::fmt::{Debug, Display};

/// A trait for floating-point types that can be used as metric tensor
/// components. `Float` supplies elementwise arithmetic and NaN handling,
/// `RealField` satisfies the nalgebra eigensolver bounds, and
/// `FromPrimitive` provides constant conversion.
///
/// `Float` and `RealField` both expose `abs`, `sqrt`, `min` and `max`;
/// call sites disambiguate through `Float` (e.g. `Float::abs(x)`).
pub trait Scalar: Float + FromPrimitive + RealField + Display + Debug + 'static {}

impl<T: Float + FromPrimitive + RealField + Display + Debug + 'static> Scalar for T {}
