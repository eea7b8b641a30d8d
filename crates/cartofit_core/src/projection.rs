//! Map projections defined by a pair of text equations.

use crate::cartography::{
    lat_to_lat_trans, lon_to_lon_trans, reduce_lon, GeoPoint, LonDirection, PlanePoint,
};
use crate::constants::{MAX_LAT, MIN_LAT};
use crate::equation_engine::{Bindings, Equation};
use crate::error::EvalResult;
use crate::traits::Scalar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionFamily {
    Cylindrical,
    Conic,
    Azimuthal,
    PseudoCylindrical,
    PseudoAzimuthal,
}

impl ProjectionFamily {
    /// Range in which `lat0` is kept while fitting.
    pub fn default_lat0_interval(self) -> Interval {
        match self {
            Self::Cylindrical => Interval::new(0.0, 80.0),
            Self::Conic => Interval::new(MIN_LAT, MAX_LAT),
            Self::Azimuthal | Self::PseudoAzimuthal | Self::PseudoCylindrical => {
                Interval::new(0.0, 0.0)
            }
        }
    }

    /// Whether the semi-axes `a` and `b` are tied to the radius `R`.
    pub fn axes_follow_radius(self) -> bool {
        matches!(self, Self::Azimuthal | Self::PseudoAzimuthal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    /// Both bounds multiplied by `factor`, e.g. to change angle units.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.min * factor, self.max * factor)
    }
}

/// Everything needed to build a [`Projection`]; this is the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionDef {
    pub name: String,
    pub family: ProjectionFamily,
    #[serde(rename = "R")]
    pub r: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub lat0: f64,
    pub lat1: f64,
    pub lat2: f64,
    pub theta: f64,
    pub cart_pole: GeoPoint,
    pub lon0: f64,
    pub dx: f64,
    pub dy: f64,
    pub lon_dir: LonDirection,
    pub lat0_interval: Option<Interval>,
    pub x_equation: String,
    pub y_equation: String,
}

impl Default for ProjectionDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            family: ProjectionFamily::Cylindrical,
            r: 1.0,
            a: 1.0,
            b: 1.0,
            c: 0.0,
            lat0: 0.0,
            lat1: 0.0,
            lat2: 0.0,
            theta: 0.0,
            cart_pole: GeoPoint::new(MAX_LAT, 0.0),
            lon0: 0.0,
            dx: 0.0,
            dy: 0.0,
            lon_dir: LonDirection::Normal,
            lat0_interval: None,
            x_equation: String::new(),
            y_equation: String::new(),
        }
    }
}

impl ProjectionDef {
    pub fn lat0_interval(&self) -> Interval {
        self.lat0_interval
            .unwrap_or_else(|| self.family.default_lat0_interval())
    }

    /// The parameters a fit may change, read from this definition.
    pub fn state(&self) -> ProjectionState<f64> {
        ProjectionState {
            r: self.r,
            latp: self.cart_pole.lat,
            lonp: self.cart_pole.lon,
            lat0: self.lat0,
            lon0: self.lon0,
            c: self.c,
        }
    }
}

/// Fitted parameters in degrees, generic so derivatives can flow through them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionState<T> {
    pub r: T,
    pub latp: T,
    pub lonp: T,
    pub lat0: T,
    pub lon0: T,
    pub c: T,
}

#[derive(Debug, Clone)]
pub struct Projection {
    def: ProjectionDef,
    x: Equation,
    y: Equation,
}

impl Projection {
    pub fn new(def: ProjectionDef) -> EvalResult<Self> {
        let x = Equation::compile(&def.x_equation)?;
        let y = Equation::compile(&def.y_equation)?;
        Ok(Self { def, x, y })
    }

    pub fn def(&self) -> &ProjectionDef {
        &self.def
    }

    /// Projects `point` with the definition's own parameters and shifts.
    pub fn project(&self, point: &GeoPoint) -> EvalResult<PlanePoint> {
        let mut stack = Vec::with_capacity(16);
        let (x, y) = self.project_with(&self.def.state(), point, &mut stack)?;
        Ok(PlanePoint::new(x + self.def.dx, y + self.def.dy))
    }

    /// Projects `point` with the parameters in `state`, without shifts.
    /// `stack` is the operand stack shared by both equations and reused across calls.
    pub fn project_with<T: Scalar>(
        &self,
        state: &ProjectionState<T>,
        point: &GeoPoint,
        stack: &mut Vec<T>,
    ) -> EvalResult<(T, T)> {
        let lat = T::lit(point.lat);
        let lon = reduce_lon(T::lit(point.lon), state.lon0);
        let lat_trans = lat_to_lat_trans(lat, lon, state.latp, state.lonp);
        let lon_trans =
            lon_to_lon_trans(lat, lon, lat_trans, state.latp, state.lonp, self.def.lon_dir);

        let (a, b) = if self.def.family.axes_follow_radius() {
            (state.r, state.r)
        } else {
            (T::lit(self.def.a), T::lit(self.def.b))
        };
        let bindings = Bindings {
            lat: lat_trans,
            lon: lon_trans,
            r: state.r,
            a,
            b,
            c: state.c,
            lat0: state.lat0,
            lat1: T::lit(self.def.lat1),
            lat2: T::lit(self.def.lat2),
            theta: T::lit(self.def.theta),
            ..Bindings::default()
        };

        let x = self.x.evaluate_with_stack(&bindings, stack)?;
        let y = self.y.evaluate_with_stack(&bindings, stack)?;
        Ok((x, y))
    }
}
