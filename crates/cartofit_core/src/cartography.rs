//! Geographic and planar points, and the change of pole used by oblique
//! and transverse aspects. All angles are in degrees.

use crate::constants::{MAX_LAT, MAX_LON, MIN_LON};
use crate::traits::Scalar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanePoint {
    pub x: f64,
    pub y: f64,
}

impl PlanePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Orientation of the transformed longitude around the cartographic pole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LonDirection {
    #[default]
    Normal,
    Reversed,
}

fn to_rad<T: Scalar>() -> T {
    T::lit(std::f64::consts::PI / 180.0)
}

/// Longitude relative to `lon0`, wrapped into [-180, 180].
pub fn reduce_lon<T: Scalar>(lon: T, lon0: T) -> T {
    let mut reduced = lon - lon0;
    if !reduced.is_finite() {
        return reduced;
    }
    let full = T::lit(2.0 * MAX_LON);
    while reduced > T::lit(MAX_LON) {
        reduced = reduced - full;
    }
    while reduced < T::lit(MIN_LON) {
        reduced = reduced + full;
    }
    reduced
}

/// Latitude of `(lat, lon)` in the system whose pole lies at `(latp, lonp)`.
pub fn lat_to_lat_trans<T: Scalar>(lat: T, lon: T, latp: T, lonp: T) -> T {
    let r = to_rad::<T>();
    let (lat, latp, dlon) = (lat * r, latp * r, (lon - lonp) * r);
    let sine = lat.sin() * latp.sin() + lat.cos() * latp.cos() * dlon.cos();
    let one = T::one();
    let sine = if sine > one {
        one
    } else if sine < -one {
        -one
    } else {
        sine
    };
    sine.asin() / r
}

/// Longitude of `(lat, lon)` in the system whose pole lies at `(latp, lonp)`.
///
/// `lat_trans` is the already transformed latitude; at the transformed poles
/// the longitude is undefined and 0 is returned.
pub fn lon_to_lon_trans<T: Scalar>(
    lat: T,
    lon: T,
    lat_trans: T,
    latp: T,
    lonp: T,
    direction: LonDirection,
) -> T {
    if (lat_trans.abs() - T::lit(MAX_LAT)).abs() < T::lit(1.0e-9) {
        return T::zero();
    }
    let r = to_rad::<T>();
    let (lat, latp, dlon) = (lat * r, latp * r, (lon - lonp) * r);
    let y = lat.cos() * dlon.sin();
    let x = latp.sin() * lat.cos() * dlon.cos() - latp.cos() * lat.sin();
    let lon_trans = y.atan2(x) / r;
    match direction {
        LonDirection::Normal => lon_trans,
        LonDirection::Reversed => -lon_trans,
    }
}

/// Moves `point` into the system with the given cartographic pole.
pub fn to_oblique(point: GeoPoint, pole: GeoPoint, direction: LonDirection) -> GeoPoint {
    let lat = lat_to_lat_trans(point.lat, point.lon, pole.lat, pole.lon);
    let lon = lon_to_lon_trans(point.lat, point.lon, lat, pole.lat, pole.lon, direction);
    GeoPoint::new(lat, lon)
}
