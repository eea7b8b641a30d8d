use crate::autodiff::{seed, Dual};
use crate::traits::LeastSquaresProblem;
use anyhow::{anyhow, bail, Context, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Rejected steps tolerated in a row before the fit stops.
const MAX_REJECTED_STEPS: usize = 12;
const MIN_DAMPING: f64 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub initial_damping: f64,
    pub damping_factor: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
            initial_damping: 1e-3,
            damping_factor: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub parameters: Vec<f64>,
    pub weights: Vec<f64>,
    /// Weighted sum of squared residuals.
    pub cost: f64,
    /// Root mean square of the weighted residuals.
    pub rms: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimises the weighted sum of squared residuals of `problem`.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    initial: &[f64],
    settings: FitSettings,
) -> Result<FitReport> {
    let dim = problem.parameter_count();
    if initial.len() != dim {
        bail!(
            "Initial parameter dimension mismatch. Expected {}, got {}.",
            dim,
            initial.len()
        );
    }
    if settings.max_iterations == 0 {
        bail!("max_iterations must be greater than zero.");
    }
    if settings.tolerance <= 0.0 {
        bail!("tolerance must be positive.");
    }
    if settings.initial_damping <= 0.0 {
        bail!("initial_damping must be positive.");
    }
    if settings.damping_factor <= 1.0 {
        bail!("damping_factor must be greater than one.");
    }
    let free = problem.free_parameters();
    if free.is_empty() {
        bail!("Problem has no free parameters.");
    }
    if let Some(&index) = free.iter().find(|&&i| i >= dim) {
        bail!("Free parameter index {} is out of range.", index);
    }

    let n = problem.residual_count();
    let mut params = initial.to_vec();
    problem.normalize(&mut params);
    let mut weights = problem.weights(&params);
    if weights.len() != n {
        bail!(
            "Weight count mismatch. Expected {}, got {}.",
            n,
            weights.len()
        );
    }
    let mut residual = vec![0.0; n];
    problem
        .residuals(&params, &weights, &mut residual)
        .context("Failed to evaluate residuals at the initial parameters.")?;
    let mut cost = weighted_cost(&residual, &weights);
    if !cost.is_finite() {
        bail!("Initial cost is not finite.");
    }

    let mut damping = settings.initial_damping;
    let mut iterations = 0usize;
    let mut converged = false;

    while iterations < settings.max_iterations && !converged {
        iterations += 1;
        let jacobian = compute_jacobian(problem, &params, &weights, &free)?;
        let (normal, gradient) = normal_equations(&jacobian, &residual, &weights);

        let mut accepted = false;
        for _ in 0..MAX_REJECTED_STEPS {
            let Some(step) = damped_step(&normal, &gradient, damping) else {
                damping *= settings.damping_factor;
                continue;
            };

            let mut trial = params.clone();
            for (j, &index) in free.iter().enumerate() {
                trial[index] += step[j];
            }
            problem.normalize(&mut trial);
            let trial_weights = problem.weights(&trial);
            let mut trial_residual = vec![0.0; n];
            if let Err(err) = problem.residuals(&trial, &trial_weights, &mut trial_residual) {
                trace!(error = %err, damping, "trial step could not be evaluated");
                damping *= settings.damping_factor;
                continue;
            }

            let trial_cost = weighted_cost(&trial_residual, &trial_weights);
            if !(trial_cost.is_finite() && trial_cost <= cost) {
                trace!(trial_cost, cost, damping, "trial step rejected");
                damping *= settings.damping_factor;
                continue;
            }

            let decrease = cost - trial_cost;
            let step_norm = step.norm();
            let param_norm = params.iter().map(|v| v * v).sum::<f64>().sqrt();
            converged = decrease <= settings.tolerance * cost.max(settings.tolerance)
                || step_norm <= settings.tolerance * (param_norm + settings.tolerance);

            params = trial;
            weights = trial_weights;
            residual = trial_residual;
            cost = trial_cost;
            damping = (damping / settings.damping_factor).max(MIN_DAMPING);
            accepted = true;
            debug!(iteration = iterations, cost, damping, step_norm, "step accepted");
            break;
        }

        if !accepted {
            converged = gradient.norm() <= settings.tolerance.sqrt() * (1.0 + cost);
            debug!(
                iteration = iterations,
                cost,
                converged,
                "no acceptable step found, stopping"
            );
            break;
        }
    }

    let active = weights.iter().filter(|&&w| w != 0.0).count();
    let rms = if active == 0 {
        0.0
    } else {
        (cost / active as f64).sqrt()
    };

    Ok(FitReport {
        parameters: params,
        weights,
        cost,
        rms,
        iterations,
        converged,
    })
}

fn weighted_cost(residual: &[f64], weights: &[f64]) -> f64 {
    residual
        .iter()
        .zip(weights)
        .map(|(r, w)| w * r * r)
        .sum()
}

/// Jacobian of the residuals with respect to the free parameters, one
/// `Dual` pass per column.
fn compute_jacobian<P: LeastSquaresProblem>(
    problem: &P,
    params: &[f64],
    weights: &[f64],
    free: &[usize],
) -> Result<DMatrix<f64>> {
    let n = problem.residual_count();
    let mut data = Vec::with_capacity(n * free.len());
    let mut dual_out = vec![Dual::constant(0.0); n];

    for &index in free {
        let dual_params = seed(params, index);
        problem
            .residuals(&dual_params, weights, &mut dual_out)
            .with_context(|| format!("Failed to differentiate residuals for parameter {index}."))?;
        data.extend(dual_out.iter().map(|d| d.eps));
    }

    let jacobian = DMatrix::from_column_slice(n, free.len(), &data);
    if jacobian.iter().any(|v| !v.is_finite()) {
        return Err(anyhow!("Jacobian contains non-finite entries."));
    }
    Ok(jacobian)
}

/// `JᵀWJ` and `JᵀWr`.
fn normal_equations(
    jacobian: &DMatrix<f64>,
    residual: &[f64],
    weights: &[f64],
) -> (DMatrix<f64>, DVector<f64>) {
    let mut weighted = jacobian.clone();
    for (i, mut row) in weighted.row_iter_mut().enumerate() {
        row *= weights[i];
    }
    let transposed = weighted.transpose();
    let normal = &transposed * jacobian;
    let gradient = &transposed * DVector::from_column_slice(residual);
    (normal, gradient)
}

fn damped_step(normal: &DMatrix<f64>, gradient: &DVector<f64>, damping: f64) -> Option<DVector<f64>> {
    let mut damped = normal.clone();
    for i in 0..damped.nrows() {
        damped[(i, i)] += damping;
    }
    let rhs = -gradient;
    let step = match damped.clone().cholesky() {
        Some(cholesky) => cholesky.solve(&rhs),
        None => damped.lu().solve(&rhs)?,
    };
    step.iter().all(|v| v.is_finite()).then_some(step)
}

#[cfg(test)]
mod tests {
    use super::{levenberg_marquardt, FitSettings};
    use crate::traits::{LeastSquaresProblem, Scalar};
    use anyhow::Result;

    /// `y = p0 * exp(p1 * t)`.
    struct Exponential {
        samples: Vec<(f64, f64)>,
        excluded: Option<usize>,
    }

    impl Exponential {
        fn new(p0: f64, p1: f64) -> Self {
            let samples = (0..10)
                .map(|i| {
                    let t = i as f64 * 0.5;
                    (t, p0 * (p1 * t).exp())
                })
                .collect();
            Self {
                samples,
                excluded: None,
            }
        }
    }

    impl LeastSquaresProblem for Exponential {
        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            self.samples.len()
        }

        fn weights(&self, _params: &[f64]) -> Vec<f64> {
            (0..self.samples.len())
                .map(|i| if Some(i) == self.excluded { 0.0 } else { 1.0 })
                .collect()
        }

        fn residuals<T: Scalar>(&self, params: &[T], _weights: &[f64], out: &mut [T]) -> Result<()> {
            for (slot, &(t, y)) in out.iter_mut().zip(&self.samples) {
                *slot = params[0] * (params[1] * T::lit(t)).exp() - T::lit(y);
            }
            Ok(())
        }
    }

    fn assert_err_contains(result: Result<super::FitReport>, needle: &str) {
        let err = result.expect_err("expected an error");
        assert!(
            err.to_string().contains(needle),
            "error `{err}` should mention `{needle}`"
        );
    }

    #[test]
    fn fits_an_exponential_decay() {
        let problem = Exponential::new(2.0, -0.5);
        let report = levenberg_marquardt(&problem, &[1.0, 0.0], FitSettings::default()).unwrap();
        assert!(report.converged);
        assert!((report.parameters[0] - 2.0).abs() < 1e-6);
        assert!((report.parameters[1] + 0.5).abs() < 1e-6);
        assert!(report.rms < 1e-6);
        assert!(report.iterations <= 100);
    }

    #[test]
    fn zero_weight_removes_an_outlier() {
        let mut problem = Exponential::new(3.0, 0.2);
        problem.samples[4].1 += 50.0;
        problem.excluded = Some(4);
        let report = levenberg_marquardt(&problem, &[1.0, 0.0], FitSettings::default()).unwrap();
        assert!((report.parameters[0] - 3.0).abs() < 1e-6);
        assert!((report.parameters[1] - 0.2).abs() < 1e-6);
        assert_eq!(report.weights[4], 0.0);
    }

    #[test]
    fn exact_start_converges_immediately() {
        let problem = Exponential::new(1.5, 0.3);
        let report = levenberg_marquardt(&problem, &[1.5, 0.3], FitSettings::default()).unwrap();
        assert!(report.converged);
        assert_eq!(report.iterations, 1);
        assert!(report.cost < 1e-20);
    }

    #[test]
    fn rejects_invalid_settings() {
        let problem = Exponential::new(1.0, 1.0);
        assert_err_contains(
            levenberg_marquardt(&problem, &[1.0], FitSettings::default()),
            "dimension mismatch",
        );
        let settings = FitSettings {
            max_iterations: 0,
            ..FitSettings::default()
        };
        assert_err_contains(
            levenberg_marquardt(&problem, &[1.0, 1.0], settings),
            "max_iterations",
        );
        let settings = FitSettings {
            damping_factor: 1.0,
            ..FitSettings::default()
        };
        assert_err_contains(
            levenberg_marquardt(&problem, &[1.0, 1.0], settings),
            "damping_factor",
        );
    }

    #[test]
    fn settings_load_with_defaults() {
        let settings: FitSettings = serde_json::from_str(r#"{ "max_iterations": 20 }"#).unwrap();
        assert_eq!(settings.max_iterations, 20);
        assert_eq!(settings.tolerance, FitSettings::default().tolerance);
    }
}
