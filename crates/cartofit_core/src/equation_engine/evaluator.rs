//! Stack machine evaluating translated equations.

use super::symbols::{Function, Symbol, Variable};
use super::translator::{Operator, PlusMinusKind, Postfix, Token};
use crate::constants::{ARGUMENT_ROUND_ERROR, MAX_FLOAT, MAX_FLOAT_EXPONENT, MIN_FLOAT, RO};
use crate::error::{EvalError, EvalResult};
use crate::traits::Scalar;

/// Values of the named variables for one evaluation. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bindings<T> {
    pub x: T,
    pub y: T,
    pub lat: T,
    pub lon: T,
    pub r: T,
    pub a: T,
    pub b: T,
    pub c: T,
    pub lat0: T,
    pub lat1: T,
    pub lat2: T,
    pub theta: T,
}

impl<T: Scalar> Default for Bindings<T> {
    fn default() -> Self {
        let z = T::zero();
        Self {
            x: z,
            y: z,
            lat: z,
            lon: z,
            r: z,
            a: z,
            b: z,
            c: z,
            lat0: z,
            lat1: z,
            lat2: z,
            theta: z,
        }
    }
}

impl<T: Scalar> Bindings<T> {
    /// Bindings for plain `f(x, y)` equations; every other variable is zero.
    pub fn planar(x: T, y: T) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn value(&self, variable: Variable) -> T {
        match variable {
            Variable::X => self.x,
            Variable::Y => self.y,
            Variable::Lat => self.lat,
            Variable::Lon => self.lon,
            Variable::R => self.r,
            Variable::A => self.a,
            Variable::B => self.b,
            Variable::C => self.c,
            Variable::Lat0 => self.lat0,
            Variable::Lat1 => self.lat1,
            Variable::Lat2 => self.lat2,
            Variable::Theta => self.theta,
        }
    }
}

/// Evaluates a postfix stream with a fresh operand stack.
pub fn evaluate<T: Scalar>(postfix: &Postfix, bindings: &Bindings<T>) -> EvalResult<T> {
    let mut stack = Vec::with_capacity(16);
    evaluate_with_stack(postfix, bindings, &mut stack)
}

/// Evaluates a postfix stream, reusing `stack` as the operand stack.
///
/// The stack is cleared on entry. Exactly one value must remain once the
/// stream is consumed.
pub fn evaluate_with_stack<T: Scalar>(
    postfix: &Postfix,
    bindings: &Bindings<T>,
    stack: &mut Vec<T>,
) -> EvalResult<T> {
    stack.clear();
    let mut tags = postfix.tags.iter();

    for token in &postfix.tokens {
        match token {
            Token::Number(value) => stack.push(T::lit(*value)),
            Token::Symbol(Symbol::Variable(variable)) => stack.push(bindings.value(*variable)),
            Token::Symbol(Symbol::Constant(constant)) => stack.push(T::lit(constant.value())),
            Token::Symbol(Symbol::Function(function)) => {
                let op = stack.pop().ok_or_else(|| {
                    EvalError::parse(format!("argument missing: {}(x).", function.name()))
                })?;
                stack.push(apply_function(*function, op)?);
            }
            Token::Unknown(name) => {
                return Err(EvalError::parse(format!("unknown variable {name}.")));
            }
            Token::Operator(operator) => {
                let kind = if operator.is_plus_minus() {
                    *tags.next().ok_or_else(|| {
                        EvalError::parse(format!(
                            "operator type missing for '{}'.",
                            operator.symbol()
                        ))
                    })?
                } else {
                    PlusMinusKind::Binary
                };

                let missing = || {
                    EvalError::parse(format!(
                        "argument missing for operation '{}'.",
                        operator.symbol()
                    ))
                };
                let op2 = stack.pop().ok_or_else(missing)?;
                let op1 = match kind {
                    PlusMinusKind::Binary => stack.pop().ok_or_else(missing)?,
                    PlusMinusKind::Unary => T::zero(),
                };
                stack.push(apply_operator(*operator, op1, op2)?);
            }
        }
    }

    let result = stack
        .pop()
        .ok_or_else(|| EvalError::parse("no equation."))?;
    if let Some(rest) = stack.last() {
        return Err(EvalError::parse(format!("bad argument: {:.4}.", rest.real())));
    }
    Ok(result)
}

fn bounded<T: Scalar>(op: T, what: &str) -> EvalResult<()> {
    if op.abs() > T::lit(MAX_FLOAT) {
        return Err(EvalError::overflow(format!("{what}, abs(x) > MAX."), op.real()));
    }
    Ok(())
}

/// Clamps rounding noise around ±1 for the inverse sine and cosine.
fn unit_argument<T: Scalar>(op: T, what: &str) -> EvalResult<T> {
    let one = T::one();
    let slack = T::lit(ARGUMENT_ROUND_ERROR);
    if op > one + slack || op < -one - slack {
        return Err(EvalError::invalid_argument(format!("{what}, x = "), op.real()));
    }
    Ok(if op > one {
        one
    } else if op < -one {
        -one
    } else {
        op
    })
}

fn apply_function<T: Scalar>(function: Function, op: T) -> EvalResult<T> {
    let to_rad = T::lit(std::f64::consts::PI / 180.0);
    let to_deg = T::lit(RO);
    let min = T::lit(MIN_FLOAT);
    let max = T::lit(MAX_FLOAT);

    match function {
        Function::Sin => {
            bounded(op, "sin(x)")?;
            Ok((op * to_rad).sin())
        }
        Function::Cos => {
            bounded(op, "cos(x)")?;
            Ok((op * to_rad).cos())
        }
        Function::Tan => {
            bounded(op, "tan(x)")?;
            let angle = op * to_rad;
            if angle.cos().abs() < min {
                return Err(EvalError::range("tan(x), x = ", op.real()));
            }
            Ok(angle.tan())
        }
        Function::Cot => {
            bounded(op, "cotg(x)")?;
            let angle = op * to_rad;
            if angle.sin().abs() < min {
                return Err(EvalError::range("cotg(x), x = ", op.real()));
            }
            Ok(angle.tan().recip())
        }
        Function::Asin => {
            bounded(op, "asin(x)")?;
            Ok(unit_argument(op, "asin(x)")?.asin() * to_deg)
        }
        Function::Acos => {
            bounded(op, "acos(x)")?;
            Ok(unit_argument(op, "acos(x)")?.acos() * to_deg)
        }
        Function::Atan => {
            bounded(op, "atan(x)")?;
            Ok(op.atan() * to_deg)
        }
        Function::Ln | Function::Log => {
            let name = function.name();
            if op > max {
                return Err(EvalError::overflow(format!("{name}(x), x > MAX."), op.real()));
            }
            if op <= min {
                return Err(EvalError::invalid_argument(format!("{name}(x), x = "), op.real()));
            }
            Ok(match function {
                Function::Ln => op.ln(),
                _ => op.log10(),
            })
        }
        Function::Exp => {
            if op > T::lit(MAX_FLOAT_EXPONENT) {
                return Err(EvalError::overflow("exp^x, x > MAX.", op.real()));
            }
            Ok(op.exp())
        }
        Function::Sqr => {
            if op.abs() > T::lit(MAX_FLOAT.sqrt()) {
                return Err(EvalError::overflow("sqr(x), x > MAX.", op.real()));
            }
            Ok(op * op)
        }
        Function::Sqrt => {
            if op > max {
                return Err(EvalError::overflow("sqrt(x), x > MAX.", op.real()));
            }
            if op < T::zero() {
                return Err(EvalError::invalid_argument("sqrt(x), x = ", op.real()));
            }
            Ok(op.sqrt())
        }
        Function::Abs => {
            bounded(op, "abs(x)")?;
            Ok(op.abs())
        }
        Function::Sign => {
            bounded(op, "sign(x)")?;
            Ok(if op > T::zero() {
                T::one()
            } else if op < T::zero() {
                -T::one()
            } else {
                T::zero()
            })
        }
    }
}

fn apply_operator<T: Scalar>(operator: Operator, op1: T, op2: T) -> EvalResult<T> {
    let max = T::lit(MAX_FLOAT);

    match operator {
        Operator::Pow => {
            if op2 > T::lit(MAX_FLOAT_EXPONENT) {
                return Err(EvalError::overflow("x^y, exponent > MAX.", op2.real()));
            }
            if op1 > max {
                return Err(EvalError::overflow("x^y, base > MAX.", op1.real()));
            }
            // Exponents below -MAX_FLOAT_EXPONENT are not cut to zero; powf decides.
            Ok(op1.powf(op2))
        }
        Operator::Mul => {
            if op1.abs() > max {
                return Err(EvalError::overflow("x * y, number > MAX.", op1.real()));
            }
            if op2.abs() > max {
                return Err(EvalError::overflow("x * y, number > MAX.", op2.real()));
            }
            Ok(op1 * op2)
        }
        Operator::Div => {
            if op2.abs() < T::lit(MIN_FLOAT) {
                return Err(EvalError::zero_division("x / y, y = 0.", op2.real()));
            }
            Ok(op1 / op2)
        }
        Operator::Add => {
            if op1.abs() + op2.abs() > max {
                let larger = if op1.abs() > op2.abs() { op1 } else { op2 };
                return Err(EvalError::overflow("x + y, result > MAX.", larger.real()));
            }
            Ok(op1 + op2)
        }
        Operator::Sub => {
            if op2.abs() > max {
                return Err(EvalError::overflow("x - y, number > MAX.", op2.real()));
            }
            if op1.abs() > max {
                return Err(EvalError::overflow("x - y, number > MAX.", op1.real()));
            }
            Ok(op1 - op2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{evaluate, evaluate_with_stack, Bindings};
    use crate::autodiff::Dual;
    use crate::equation_engine::translator::translate;
    use crate::error::{ErrorKind, EvalError, EvalResult};
    use proptest::prelude::*;

    fn eval_with(equation: &str, bindings: &Bindings<f64>) -> EvalResult<f64> {
        let postfix = translate(equation)?;
        evaluate(&postfix, bindings)
    }

    fn eval(equation: &str) -> EvalResult<f64> {
        eval_with(equation, &Bindings::default())
    }

    fn kind_of(equation: &str) -> ErrorKind {
        match eval(equation) {
            Ok(value) => panic!("expected {equation} to fail, got {value}"),
            Err(err) => err.kind,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12 * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn evaluates_with_precedence() {
        assert_close(eval("2+3*4").unwrap(), 14.0);
        assert_close(eval("2^3^2").unwrap(), 512.0);
        assert_close(eval("(2+3)*4").unwrap(), 20.0);
        assert_close(eval("8/4/2").unwrap(), 1.0);
        assert_close(eval("2^-1*3").unwrap(), 1.5);
        assert_close(eval("-2^2").unwrap(), -4.0);
    }

    #[test]
    fn unary_and_binary_plus_minus() {
        assert_close(eval("-5").unwrap(), -5.0);
        assert_close(eval("+5").unwrap(), 5.0);
        assert_close(eval("3-5").unwrap(), -2.0);
        assert_close(eval("3*-5").unwrap(), -15.0);
        assert_close(eval("-(2+3)").unwrap(), -5.0);

        let bindings = Bindings {
            a: 5.0,
            b: 3.0,
            ..Bindings::default()
        };
        assert_close(eval_with("a+-b", &bindings).unwrap(), 2.0);
        assert_close(eval_with("a- -b", &bindings).unwrap(), 8.0);
    }

    #[test]
    fn trigonometry_works_in_degrees() {
        assert_close(eval("sin(90)").unwrap(), 1.0);
        assert_close(eval("cos(0)").unwrap(), 1.0);
        assert_close(eval("tan(45)").unwrap(), 1.0);
        assert_close(eval("cotg(45)").unwrap(), 1.0);
        assert_close(eval("tg(45)").unwrap(), 1.0);
        assert_close(eval("atan(1)").unwrap(), 45.0);
        assert_close(eval("acos(0)").unwrap(), 90.0);
        assert_close(eval("asin(1.0000001)").unwrap(), 90.0);
        assert_close(eval("acos(-1.0000001)").unwrap(), 180.0);
    }

    #[test]
    fn binds_variables_and_constants() {
        let bindings = Bindings::planar(3.0, 4.0);
        assert_close(eval_with("sqrt(x*x+y*y)", &bindings).unwrap(), 5.0);

        let carto = Bindings {
            lat: 10.0,
            lon: 20.0,
            r: 2.0,
            a: 1.0,
            b: 7.0,
            c: 0.5,
            lat0: 30.0,
            lat1: 40.0,
            lat2: 50.0,
            theta: 60.0,
            ..Bindings::default()
        };
        assert_close(eval_with("b", &carto).unwrap(), 7.0);
        assert_close(eval_with("lon + lam + v", &carto).unwrap(), 60.0);
        assert_close(eval_with("phi + u - lat", &carto).unwrap(), 10.0);
        assert_close(eval_with("phi0 + u1 + lat2", &carto).unwrap(), 120.0);
        assert_close(eval_with("R*a*c + theta", &carto).unwrap(), 61.0);
        assert_close(eval("pi").unwrap(), std::f64::consts::PI);
        assert_close(eval("RO*Pi").unwrap(), 180.0);
        assert_close(eval("Ro*PI/180").unwrap(), 1.0);
    }

    #[test]
    fn remaining_functions() {
        assert_close(eval("ln(exp(2))").unwrap(), 2.0);
        assert_close(eval("log(1000)").unwrap(), 3.0);
        assert_close(eval("sqr(-3)").unwrap(), 9.0);
        assert_close(eval("abs(-3)").unwrap(), 3.0);
        assert_close(eval("sign(-3)").unwrap(), -1.0);
        assert_close(eval("sign(2)").unwrap(), 1.0);
        assert_close(eval("sign(0)").unwrap(), 0.0);
    }

    #[test]
    fn domain_guards_raise_typed_errors() {
        assert_eq!(kind_of("sqrt(-1)"), ErrorKind::InvalidArgument);
        assert_eq!(kind_of("1/0"), ErrorKind::ZeroDivision);
        assert_eq!(kind_of("ln(0)"), ErrorKind::InvalidArgument);
        assert_eq!(kind_of("log(-5)"), ErrorKind::InvalidArgument);
        assert_eq!(kind_of("asin(2)"), ErrorKind::InvalidArgument);
        assert_eq!(kind_of("acos(1.001)"), ErrorKind::InvalidArgument);
        assert_eq!(kind_of("tan(90)"), ErrorKind::Range);
        assert_eq!(kind_of("cotg(0)"), ErrorKind::Range);
        assert_eq!(kind_of("exp(38)"), ErrorKind::Overflow);
        assert_eq!(kind_of("sqr(10^19)"), ErrorKind::Overflow);
        assert_eq!(kind_of("2^38"), ErrorKind::Overflow);
    }

    #[test]
    fn overflow_guards_on_large_operands() {
        let huge = Bindings::planar(1.0e38, 1.0);
        let equations = [
            "x*2", "2*x", "x+1", "x-1", "1-x", "-x", "x^2", "sin(x)", "cos(x)", "tan(x)",
            "cotg(x)", "asin(x)", "acos(x)", "atan(x)", "abs(x)", "sign(x)", "ln(x)", "log(x)",
            "sqrt(x)",
        ];
        for equation in equations {
            let err = eval_with(equation, &huge).expect_err(equation);
            assert_eq!(err.kind, ErrorKind::Overflow, "{equation}");
            assert_eq!(err.operand, Some(1.0e38), "{equation}");
        }
    }

    #[test]
    fn division_guard_boundary() {
        let at_limit = Bindings::planar(1.0, 1.0e-10);
        assert_close(eval_with("x/y", &at_limit).unwrap(), 1.0e10);

        let below = Bindings::planar(1.0, 0.99e-10);
        let err = eval_with("x/y", &below).expect_err("divisor below MIN_FLOAT");
        assert_eq!(err.kind, ErrorKind::ZeroDivision);
        assert_eq!(err.operand, Some(0.99e-10));
    }

    #[test]
    fn dual_guards_follow_the_value() {
        for equation in ["sign(x)", "sqrt(0-x)", "exp(x)", "2^x", "ln(x+1)"] {
            let postfix = translate(equation).unwrap();
            for value in [0.0, 37.0] {
                let plain = evaluate(&postfix, &Bindings::planar(value, 0.0));
                for eps in [1.0, -1.0] {
                    let bindings = Bindings::planar(Dual::new(value, eps), Dual::constant(0.0));
                    let dual = evaluate(&postfix, &bindings);
                    match (&plain, &dual) {
                        (Ok(p), Ok(d)) => assert_eq!(*p, d.val, "{equation} at {value}"),
                        (Err(p), Err(d)) => assert_eq!(p.kind, d.kind, "{equation} at {value}"),
                        _ => panic!("{equation} at {value}: f64 {plain:?}, dual {dual:?}"),
                    }
                }
            }
        }
    }

    #[test]
    fn very_negative_exponents_still_call_pow() {
        let value = eval("2^-100").unwrap();
        assert_close(value, 2f64.powi(-100));
        assert!(value > 0.0);
    }

    #[test]
    fn stack_balance_errors() {
        let leftover = eval("3 4").expect_err("two operands");
        assert_eq!(leftover.kind, ErrorKind::Parse);
        assert!(leftover.message.contains("bad argument: 3.0000"));

        let empty = eval("").expect_err("empty");
        assert_eq!(empty, EvalError::parse("no equation."));

        let missing = eval("2+").expect_err("missing operand");
        assert!(missing.message.contains("argument missing"));

        let no_arg = eval("sin()").expect_err("missing function argument");
        assert!(no_arg.message.contains("sin(x)"));
    }

    #[test]
    fn unknown_identifier_names_the_token() {
        let err = eval("foo(x)").expect_err("unknown name");
        assert_eq!(err.kind, ErrorKind::Parse);
        assert!(err.message.contains("foo"));

        let err = eval("2*lat3").expect_err("unknown variable");
        assert!(err.message.contains("lat3"));
    }

    #[test]
    fn reused_stack_is_cleared_between_calls() {
        let mut stack = Vec::new();
        let bad = translate("1 2 3").unwrap();
        assert!(evaluate_with_stack(&bad, &Bindings::default(), &mut stack).is_err());
        let good = translate("1+2").unwrap();
        let value = evaluate_with_stack(&good, &Bindings::default(), &mut stack).unwrap();
        assert_close(value, 3.0);
    }

    #[test]
    fn evaluates_other_scalar_types() {
        let postfix = translate("2+3*4").unwrap();
        let single: f32 = evaluate(&postfix, &Bindings::default()).unwrap();
        assert_eq!(single, 14.0);

        let square = translate("x*x + sin(x)").unwrap();
        let bindings = Bindings::planar(Dual::new(30.0, 1.0), Dual::new(0.0, 0.0));
        let value = evaluate(&square, &bindings).unwrap();
        let to_rad = std::f64::consts::PI / 180.0;
        assert_close(value.val, 900.0 + (30.0 * to_rad).sin());
        assert_close(value.eps, 60.0 + to_rad * (30.0 * to_rad).cos());
    }

    proptest! {
        #[test]
        fn arbitrary_input_never_panics(equation in "[0-9a-z+*/^() .,-]{0,40}", x in -1.0e3..1.0e3f64) {
            let bindings = Bindings::planar(x, -x);
            let _ = eval_with(&equation, &bindings);
        }

        #[test]
        fn evaluation_is_deterministic(
            x in -1.0e6..1.0e6f64,
            y in -1.0e6..1.0e6f64,
            index in 0usize..5,
        ) {
            let equations = [
                "sqrt(x*x+y*y)",
                "ln(abs(x)+1) - y/3",
                "sin(x)*cos(y) + tan(x/7)",
                "x^2 - -y",
                "asin(x/(abs(x)+abs(y)+1))",
            ];
            let bindings = Bindings::planar(x, y);
            let first = eval_with(equations[index], &bindings);
            let second = eval_with(equations[index], &bindings);
            prop_assert_eq!(format!("{first:?}"), format!("{second:?}"));
        }
    }
}
