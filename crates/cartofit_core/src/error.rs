use std::fmt;
use thiserror::Error;

/// Class of an equation evaluation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed expression: illegal character, missing operand, unknown name, empty input.
    Parse,
    /// An operand exceeds the bound of the operation.
    Overflow,
    /// Divisor magnitude below `MIN_FLOAT`.
    ZeroDivision,
    /// Operand outside the domain of a function.
    InvalidArgument,
    /// A derived denominator is too close to zero.
    Range,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Parse => "parse error",
            ErrorKind::Overflow => "overflow",
            ErrorKind::ZeroDivision => "division by zero",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Range => "range error",
        };
        f.write_str(name)
    }
}

/// Error raised while translating or evaluating an equation.
///
/// Always fatal to the current evaluation; recovery is up to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {}{message}{}", parse_prefix(.kind), render_operand(.operand))]
pub struct EvalError {
    pub kind: ErrorKind,
    pub message: String,
    /// The offending operand, for numeric errors.
    pub operand: Option<f64>,
}

fn parse_prefix(kind: &ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Parse => "can not parse equation, ",
        _ => "",
    }
}

fn render_operand(operand: &Option<f64>) -> String {
    match operand {
        Some(value) => format!(" (operand = {value})"),
        None => String::new(),
    }
}

impl EvalError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parse,
            message: message.into(),
            operand: None,
        }
    }

    pub fn numeric(kind: ErrorKind, message: impl Into<String>, operand: f64) -> Self {
        Self {
            kind,
            message: message.into(),
            operand: Some(operand),
        }
    }

    pub fn overflow(message: impl Into<String>, operand: f64) -> Self {
        Self::numeric(ErrorKind::Overflow, message, operand)
    }

    pub fn zero_division(message: impl Into<String>, operand: f64) -> Self {
        Self::numeric(ErrorKind::ZeroDivision, message, operand)
    }

    pub fn invalid_argument(message: impl Into<String>, operand: f64) -> Self {
        Self::numeric(ErrorKind::InvalidArgument, message, operand)
    }

    pub fn range(message: impl Into<String>, operand: f64) -> Self {
        Self::numeric(ErrorKind::Range, message, operand)
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::{ErrorKind, EvalError};

    #[test]
    fn display_includes_kind_message_and_operand() {
        let err = EvalError::zero_division("x / y, y = 0.", 0.0);
        assert_eq!(
            err.to_string(),
            "division by zero: x / y, y = 0. (operand = 0)"
        );
        assert_eq!(err.kind, ErrorKind::ZeroDivision);
    }

    #[test]
    fn numeric_errors_omit_the_parse_wording() {
        let err = EvalError::overflow("exp^x, x > MAX.", 38.0);
        assert_eq!(err.to_string(), "overflow: exp^x, x > MAX. (operand = 38)");
    }

    #[test]
    fn parse_errors_carry_no_operand() {
        let err = EvalError::parse("no equation.");
        assert_eq!(err.operand, None);
        assert_eq!(err.to_string(), "parse error: can not parse equation, no equation.");
    }
}
