pub mod autodiff;
pub mod cartography;
pub mod constants;
pub mod equation_engine;
pub mod error;
pub mod estimator;
pub mod fitting;
pub mod helmert;
pub mod projection;
pub mod residuals;
/// The `cartofit_core` crate evaluates cartographic projection equations and
/// fits their parameters to measured map points.
/// It is generic over the scalar type, supporting both standard floating-point
/// arithmetic (`f64`) and automatic differentiation via Dual numbers.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `LeastSquaresProblem` (residual functors).
/// - **Equation Engine**: Infix to postfix translation and a guarded postfix evaluator with typed errors.
/// - **Projection**: Equation-defined projections, pole rotation and the Helmert seed.
/// - **Fitting**: Levenberg-Marquardt with exact Jacobians from `Dual` numbers.
pub mod traits;

pub use equation_engine::{parse_eq, Bindings, Equation, EquationCache};
pub use error::{ErrorKind, EvalError, EvalResult};
