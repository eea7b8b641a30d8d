//! Residuals between projected reference points and a test point set, as a
//! least-squares problem over the projection parameters.

use crate::cartography::{GeoPoint, PlanePoint};
use crate::constants::{MAX_C, MAX_LAT, RO};
use crate::projection::{Projection, ProjectionState};
use crate::traits::{LeastSquaresProblem, Scalar};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use tracing::{debug, trace};

pub const PARAMETER_COUNT: usize = 7;

/// Positions in the parameter vector `[R, latp, lonp, lat0, lon0, c, alpha]`.
/// Angles are stored in radians.
pub mod param {
    pub const R: usize = 0;
    pub const LATP: usize = 1;
    pub const LONP: usize = 2;
    pub const LAT0: usize = 3;
    pub const LON0: usize = 4;
    pub const C: usize = 5;
    pub const ALPHA: usize = 6;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionAspect {
    #[default]
    Normal,
    Transverse,
    Oblique,
}

impl ProjectionAspect {
    pub fn free_parameters(self) -> Vec<usize> {
        use param::*;
        match self {
            Self::Normal => vec![R, LAT0, LON0, C, ALPHA],
            Self::Transverse => vec![R, LONP, LAT0, C, ALPHA],
            Self::Oblique => vec![R, LATP, LONP, LAT0, C, ALPHA],
        }
    }
}

/// Shifts and rotation carrying the projected points onto the test points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub dx: f64,
    pub dy: f64,
    /// Degrees.
    pub rotation: f64,
}

struct Centred<T> {
    projected: Vec<Option<(T, T)>>,
    reference_mass: (T, T),
    test_mass: (f64, f64),
}

pub struct ProjectionResiduals<'a> {
    projection: &'a Projection,
    test: &'a [PlanePoint],
    reference: &'a [GeoPoint],
    aspect: ProjectionAspect,
}

impl<'a> ProjectionResiduals<'a> {
    pub fn new(
        projection: &'a Projection,
        test: &'a [PlanePoint],
        reference: &'a [GeoPoint],
        aspect: ProjectionAspect,
    ) -> Result<Self> {
        if test.is_empty() {
            bail!("Point sets are empty.");
        }
        if test.len() != reference.len() {
            bail!(
                "Test and reference point sets must have the same length ({} != {}).",
                test.len(),
                reference.len()
            );
        }
        Ok(Self {
            projection,
            test,
            reference,
            aspect,
        })
    }

    pub fn point_count(&self) -> usize {
        self.reference.len()
    }

    pub fn aspect(&self) -> ProjectionAspect {
        self.aspect
    }

    /// Parameter vector read from the projection definition, with no rotation.
    pub fn initial_parameters(&self) -> Vec<f64> {
        let def = self.projection.def();
        let mut params = vec![0.0; PARAMETER_COUNT];
        params[param::R] = def.r;
        params[param::LATP] = def.cart_pole.lat / RO;
        params[param::LONP] = def.cart_pole.lon / RO;
        params[param::LAT0] = def.lat0 / RO;
        params[param::LON0] = def.lon0 / RO;
        params[param::C] = def.c;
        params
    }

    /// Parameters in the units the projection equations expect.
    pub fn state<T: Scalar>(params: &[T]) -> ProjectionState<T> {
        let ro = T::lit(RO);
        ProjectionState {
            r: params[param::R],
            latp: params[param::LATP] * ro,
            lonp: params[param::LONP] * ro,
            lat0: params[param::LAT0] * ro,
            lon0: params[param::LON0] * ro,
            c: params[param::C],
        }
    }

    /// Projects every reference point; failures are `None`.
    pub fn project_points(&self, params: &[f64]) -> Vec<Option<PlanePoint>> {
        let state = Self::state(params);
        let mut stack = Vec::with_capacity(16);
        self.reference
            .iter()
            .enumerate()
            .map(|(i, point)| match self.projection.project_with(&state, point, &mut stack) {
                Ok((x, y)) => Some(PlanePoint::new(x, y)),
                Err(err) => {
                    debug!(index = i, lat = point.lat, lon = point.lon, error = %err, "reference point excluded");
                    None
                }
            })
            .collect()
    }

    pub fn alignment(&self, params: &[f64], weights: &[f64]) -> Result<Alignment> {
        let centred = self.centre(params, weights)?;
        let (xr, yr) = centred.reference_mass;
        let (xt, yt) = centred.test_mass;
        let (sin, cos) = params[param::ALPHA].sin_cos();
        Ok(Alignment {
            dx: xt - xr * cos + yr * sin,
            dy: yt - xr * sin - yr * cos,
            rotation: params[param::ALPHA] * RO,
        })
    }

    fn centre<T: Scalar>(&self, params: &[T], weights: &[f64]) -> Result<Centred<T>> {
        let state = Self::state(params);
        let mut projected = Vec::with_capacity(self.reference.len());
        let mut stack = Vec::with_capacity(16);
        let (mut xr, mut yr) = (T::zero(), T::zero());
        let (mut xt, mut yt) = (0.0, 0.0);
        let mut count = 0usize;

        for (i, (point, test)) in self.reference.iter().zip(self.test).enumerate() {
            if weights[i] == 0.0 {
                projected.push(None);
                continue;
            }
            match self.projection.project_with(&state, point, &mut stack) {
                Ok((x, y)) => {
                    xr = xr + x;
                    yr = yr + y;
                    xt += test.x;
                    yt += test.y;
                    count += 1;
                    projected.push(Some((x, y)));
                }
                Err(err) => {
                    trace!(index = i, error = %err, "weighted point failed to project");
                    projected.push(None);
                }
            }
        }
        if count == 0 {
            bail!("No reference point could be projected.");
        }

        let n = count as f64;
        Ok(Centred {
            projected,
            reference_mass: (xr / T::lit(n), yr / T::lit(n)),
            test_mass: (xt / n, yt / n),
        })
    }
}

/// `value` reduced by `period` once it leaves `[-limit, limit]`.
fn subtract_period(value: f64, limit: f64, period: f64) -> f64 {
    if value.abs() > limit {
        value % period
    } else {
        value
    }
}

fn wrap_pi(value: f64) -> f64 {
    if value.abs() > PI {
        (value + PI).rem_euclid(2.0 * PI) - PI
    } else {
        value
    }
}

impl LeastSquaresProblem for ProjectionResiduals<'_> {
    fn parameter_count(&self) -> usize {
        PARAMETER_COUNT
    }

    fn residual_count(&self) -> usize {
        2 * self.reference.len()
    }

    fn free_parameters(&self) -> Vec<usize> {
        self.aspect.free_parameters()
    }

    fn normalize(&self, params: &mut [f64]) {
        use param::*;
        let lat0_range = self.projection.def().lat0_interval().scaled(1.0 / RO);

        params[R] = params[R].abs();
        match self.aspect {
            ProjectionAspect::Normal => {
                params[LAT0] =
                    lat0_range.clamp(subtract_period(params[LAT0], FRAC_PI_2, FRAC_PI_2));
                params[LON0] = wrap_pi(params[LON0]);
            }
            ProjectionAspect::Transverse => {
                params[LATP] = 0.0;
                params[LONP] = wrap_pi(params[LONP]);
                params[LAT0] =
                    lat0_range.clamp(subtract_period(params[LAT0], FRAC_PI_2, FRAC_PI_2));
            }
            ProjectionAspect::Oblique => {
                params[LATP] = subtract_period(params[LATP], FRAC_PI_2, FRAC_PI_2);
                params[LONP] = wrap_pi(params[LONP]);
                params[LAT0] = subtract_period(params[LAT0], FRAC_PI_2, FRAC_PI_2);
                if !lat0_range.contains(params[LAT0]) {
                    params[LAT0] = lat0_range.midpoint();
                }
                if (params[LATP] - MAX_LAT / RO).abs() < 1.0 / RO {
                    params[LONP] = 0.0;
                }
            }
        }

        params[C] = params[C].abs();
        if params[C] > MAX_C {
            params[C] = (2.0 * MAX_C - params[C]).abs();
        }
        params[ALPHA] = wrap_pi(params[ALPHA]);
    }

    fn weights(&self, params: &[f64]) -> Vec<f64> {
        let m = self.reference.len();
        let mut weights = vec![0.0; 2 * m];
        for (i, projected) in self.project_points(params).iter().enumerate() {
            if projected.is_some() {
                weights[i] = 1.0;
                weights[i + m] = 1.0;
            }
        }
        weights
    }

    fn residuals<T: Scalar>(&self, params: &[T], weights: &[f64], out: &mut [T]) -> Result<()> {
        let m = self.reference.len();
        if out.len() != 2 * m || weights.len() != 2 * m {
            bail!(
                "Residual buffer mismatch. Expected {}, got {} residuals and {} weights.",
                2 * m,
                out.len(),
                weights.len()
            );
        }

        let centred = self.centre(params, weights)?;
        let (xr, yr) = centred.reference_mass;
        let (xt, yt) = centred.test_mass;
        let (sin, cos) = params[param::ALPHA].sin_cos();

        for (i, projected) in centred.projected.iter().enumerate() {
            match projected {
                Some((x, y)) => {
                    let (dx, dy) = (*x - xr, *y - yr);
                    let test = &self.test[i];
                    out[i] = dx * cos - dy * sin - T::lit(test.x - xt);
                    out[i + m] = dx * sin + dy * cos - T::lit(test.y - yt);
                }
                None => {
                    out[i] = T::zero();
                    out[i + m] = T::zero();
                }
            }
        }
        Ok(())
    }
}
