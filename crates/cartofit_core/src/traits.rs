use anyhow::Result;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars by the equation engine and the fitting code.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {
    /// Converts an f64 literal into the scalar type.
    fn lit(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }

    /// The real part as f64, used when reporting operands.
    fn real(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }
}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A weighted nonlinear least-squares problem.
///
/// The solver owns the parameter vector; the problem maps it to residuals.
/// `residuals` is generic so the solver can run it with `Dual` numbers and
/// read the Jacobian off the infinitesimal parts.
pub trait LeastSquaresProblem {
    /// Length of the parameter vector.
    fn parameter_count(&self) -> usize;

    /// Length of the residual vector.
    fn residual_count(&self) -> usize;

    /// Indices of the parameters the solver may change.
    fn free_parameters(&self) -> Vec<usize> {
        (0..self.parameter_count()).collect()
    }

    /// Brings parameters back into their valid ranges before they are evaluated.
    fn normalize(&self, _params: &mut [f64]) {}

    /// Per-residual weights for the given parameters. A zero weight excludes the residual.
    fn weights(&self, params: &[f64]) -> Vec<f64>;

    /// Computes the residual vector into `out`.
    fn residuals<T: Scalar>(&self, params: &[T], weights: &[f64], out: &mut [T]) -> Result<()>;
}
