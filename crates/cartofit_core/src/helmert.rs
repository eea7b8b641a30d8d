//! Two-dimensional Helmert (similarity) transformation between a local and a
//! global point set.

use crate::cartography::PlanePoint;
use crate::constants::RO;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Coefficients of `global = [c1 -c2; c2 c1] * (local - local_mass) + global_mass`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HelmertKey {
    pub x_mass_local: f64,
    pub y_mass_local: f64,
    pub x_mass_global: f64,
    pub y_mass_global: f64,
    pub c1: f64,
    pub c2: f64,
    /// Sum of the weights.
    pub k: f64,
    /// Weighted sum of squared reduced local coordinates.
    pub j: f64,
}

impl HelmertKey {
    pub fn scale(&self) -> f64 {
        self.c1.hypot(self.c2)
    }

    /// Rotation from local to global axes, in degrees.
    pub fn rotation(&self) -> f64 {
        self.c2.atan2(self.c1) * RO
    }

    pub fn transform_point(&self, local: &PlanePoint) -> PlanePoint {
        let x = local.x - self.x_mass_local;
        let y = local.y - self.y_mass_local;
        PlanePoint::new(
            self.c1 * x - self.c2 * y + self.x_mass_global,
            self.c2 * x + self.c1 * y + self.y_mass_global,
        )
    }

    pub fn transform(&self, local: &[PlanePoint]) -> Vec<PlanePoint> {
        local.iter().map(|p| self.transform_point(p)).collect()
    }
}

/// Estimates the key mapping `local` onto `global`.
///
/// Pairs are matched by index over the global points; `weights` defaults to
/// one per pair.
pub fn helmert_key(
    global: &[PlanePoint],
    local: &[PlanePoint],
    weights: Option<&[f64]>,
) -> Result<HelmertKey> {
    let n = global.len();
    if n < 2 || local.len() < 2 {
        bail!("Not enough points to compute a Helmert key (need at least 2).");
    }
    if n > local.len() {
        bail!(
            "Less local points than global points ({} < {}).",
            local.len(),
            n
        );
    }
    let unit = vec![1.0; n];
    let weights = weights.unwrap_or(&unit[..]);
    if weights.len() < n {
        bail!(
            "Weight count mismatch. Expected {}, got {}.",
            n,
            weights.len()
        );
    }

    let mut sums = [0.0; 4];
    let mut k = 0.0;
    for ((g, l), w) in global.iter().zip(local).zip(weights) {
        sums[0] += w * l.x;
        sums[1] += w * l.y;
        sums[2] += w * g.x;
        sums[3] += w * g.y;
        k += w;
    }
    if k == 0.0 {
        bail!("Sum of Helmert weights is zero.");
    }
    let [x_mass_local, y_mass_local, x_mass_global, y_mass_global] = sums.map(|s| s / k);

    let (mut j, mut k1, mut k2) = (0.0, 0.0, 0.0);
    for ((g, l), w) in global.iter().zip(local).zip(weights) {
        let (xl, yl) = (l.x - x_mass_local, l.y - y_mass_local);
        let (xg, yg) = (g.x - x_mass_global, g.y - y_mass_global);
        j += w * (xl * xl + yl * yl);
        k1 += w * (xg * xl + yg * yl);
        k2 += w * (yg * xl - xg * yl);
    }
    if j == 0.0 {
        bail!("Can not compute Helmert key, divider J = 0.");
    }

    Ok(HelmertKey {
        x_mass_local,
        y_mass_local,
        x_mass_global,
        y_mass_global,
        c1: k1 / j,
        c2: k2 / j,
        k,
        j,
    })
}
