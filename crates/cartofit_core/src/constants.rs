//! Numeric guard constants shared by the equation engine and the fitting code.

/// Largest magnitude an operand may take before an operation reports an overflow.
pub const MAX_FLOAT: f64 = 1.0e37;

/// Smallest magnitude accepted as a divisor, logarithm argument or tan/cot denominator.
pub const MIN_FLOAT: f64 = 1.0e-10;

/// Largest argument of `exp` and largest exponent of `^`.
pub const MAX_FLOAT_EXPONENT: f64 = 37.0;

/// Tolerance for `asin`/`acos` arguments that leave `[-1, 1]` through rounding.
pub const ARGUMENT_ROUND_ERROR: f64 = 1.0e-5;

pub const MAX_LAT: f64 = 90.0;
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LON: f64 = 180.0;
pub const MIN_LON: f64 = -180.0;

/// Upper bound of the projection constant `c` during fitting.
pub const MAX_C: f64 = 10.0;

/// Longest equation text, in bytes, the translator accepts.
pub const MAX_TEXT_LENGTH: usize = 1024;

/// Degrees per radian.
pub const RO: f64 = 180.0 / std::f64::consts::PI;
