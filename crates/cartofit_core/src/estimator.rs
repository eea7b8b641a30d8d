//! Estimates projection parameters that carry a set of reference
//! geographic points onto a set of test map points.

use crate::cartography::{GeoPoint, PlanePoint};
use crate::constants::RO;
use crate::fitting::{levenberg_marquardt, FitSettings};
use crate::helmert::helmert_key;
use crate::projection::{Projection, ProjectionDef};
use crate::residuals::{param, ProjectionAspect, ProjectionResiduals};
use crate::traits::LeastSquaresProblem;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionFit {
    /// The input definition with the fitted parameters and shifts.
    pub projection: ProjectionDef,
    pub aspect: ProjectionAspect,
    /// Rotation of the projected points onto the test points, in degrees.
    pub rotation: f64,
    pub dx: f64,
    pub dy: f64,
    pub rms: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Reference points that could not be projected with the fitted parameters.
    pub excluded: Vec<usize>,
}

pub fn fit_projection(
    projection: &Projection,
    test: &[PlanePoint],
    reference: &[GeoPoint],
    aspect: ProjectionAspect,
    settings: FitSettings,
) -> Result<ProjectionFit> {
    let problem = ProjectionResiduals::new(projection, test, reference, aspect)?;
    let mut initial = problem.initial_parameters();
    problem.normalize(&mut initial);
    seed_from_helmert(&problem, test, &mut initial);

    let report = levenberg_marquardt(&problem, &initial, settings)
        .with_context(|| format!("Failed to fit projection {}.", projection.def().name))?;
    let alignment = problem.alignment(&report.parameters, &report.weights)?;

    let p = &report.parameters;
    let mut def = projection.def().clone();
    def.r = p[param::R];
    def.cart_pole = GeoPoint::new(p[param::LATP] * RO, p[param::LONP] * RO);
    def.lat0 = p[param::LAT0] * RO;
    def.lon0 = p[param::LON0] * RO;
    def.c = p[param::C];
    def.dx = alignment.dx;
    def.dy = alignment.dy;

    let m = problem.point_count();
    let excluded: Vec<usize> = (0..m).filter(|&i| report.weights[i] == 0.0).collect();

    info!(
        projection = %def.name,
        rms = report.rms,
        iterations = report.iterations,
        converged = report.converged,
        excluded = excluded.len(),
        "projection fitted"
    );

    Ok(ProjectionFit {
        projection: def,
        aspect: problem.aspect(),
        rotation: alignment.rotation,
        dx: alignment.dx,
        dy: alignment.dy,
        rms: report.rms,
        iterations: report.iterations,
        converged: report.converged,
        excluded,
    })
}

/// Replaces `R` and the rotation in `params` with the similarity that best
/// maps the initially projected points onto the test points.
fn seed_from_helmert(problem: &ProjectionResiduals<'_>, test: &[PlanePoint], params: &mut [f64]) {
    let (local, global): (Vec<PlanePoint>, Vec<PlanePoint>) = problem
        .project_points(params)
        .into_iter()
        .zip(test)
        .filter_map(|(projected, test)| projected.map(|p| (p, *test)))
        .unzip();

    match helmert_key(&global, &local, None) {
        Ok(key) => {
            params[param::R] *= key.scale();
            params[param::ALPHA] = key.rotation() / RO;
            problem.normalize(params);
            debug!(
                scale = key.scale(),
                rotation = key.rotation(),
                "initial estimate from Helmert transformation"
            );
        }
        Err(err) => warn!(error = %err, "Helmert seed unavailable, keeping initial parameters"),
    }
}
