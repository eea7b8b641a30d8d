//! Text equations over cartographic variables.
//!
//! An equation is translated once from infix into a postfix stream
//! ([`translator`]) and then evaluated by a small stack machine
//! ([`evaluator`]) as often as needed, against a fresh set of [`Bindings`]
//! each time. Every guard violation surfaces as an [`EvalError`]; the engine
//! never substitutes a default value.

pub mod evaluator;
pub mod symbols;
pub mod translator;

pub use evaluator::{evaluate, evaluate_with_stack, Bindings};
pub use translator::{translate, Operator, PlusMinusKind, Postfix, Token};

use crate::error::{EvalError, EvalResult};
use crate::traits::Scalar;
use std::collections::HashMap;
use std::io::Write;
use tracing::{debug, warn};

/// An equation translated to postfix form, ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    source: String,
    postfix: Postfix,
}

impl Equation {
    pub fn compile(source: &str) -> EvalResult<Self> {
        let postfix = translate(source)?;
        Ok(Self {
            source: source.to_string(),
            postfix,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn postfix(&self) -> &Postfix {
        &self.postfix
    }

    pub fn evaluate<T: Scalar>(&self, bindings: &Bindings<T>) -> EvalResult<T> {
        evaluate(&self.postfix, bindings)
    }

    pub fn evaluate_with_stack<T: Scalar>(
        &self,
        bindings: &Bindings<T>,
        stack: &mut Vec<T>,
    ) -> EvalResult<T> {
        evaluate_with_stack(&self.postfix, bindings, stack)
    }
}

/// Translates and evaluates `equation` in one call.
///
/// When `diagnostics` is given, a failure is written to it before the error
/// is returned.
pub fn parse_eq<T: Scalar>(
    equation: &str,
    bindings: &Bindings<T>,
    diagnostics: Option<&mut dyn Write>,
) -> EvalResult<T> {
    let result = Equation::compile(equation).and_then(|compiled| compiled.evaluate(bindings));
    if let Err(err) = &result {
        report(equation, err, diagnostics);
    }
    result
}

fn report(equation: &str, err: &EvalError, diagnostics: Option<&mut dyn Write>) {
    debug!(equation, error = %err, "equation evaluation failed");
    if let Some(out) = diagnostics {
        if let Err(io_err) = writeln!(out, "{err}") {
            warn!(error = %io_err, "failed to write equation diagnostics");
        }
    }
}

/// Memoises translations per equation text.
///
/// Results are identical to [`parse_eq`]; only the translation work is shared.
#[derive(Debug, Default)]
pub struct EquationCache {
    compiled: HashMap<String, Equation>,
}

impl EquationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached translation, translating on first use.
    /// Translation failures are not cached.
    pub fn get_or_compile(&mut self, equation: &str) -> EvalResult<&Equation> {
        if !self.compiled.contains_key(equation) {
            let compiled = Equation::compile(equation)?;
            self.compiled.insert(equation.to_string(), compiled);
        }
        Ok(&self.compiled[equation])
    }

    pub fn evaluate<T: Scalar>(
        &mut self,
        equation: &str,
        bindings: &Bindings<T>,
        diagnostics: Option<&mut dyn Write>,
    ) -> EvalResult<T> {
        let result = self
            .get_or_compile(equation)
            .and_then(|compiled| compiled.evaluate(bindings));
        if let Err(err) = &result {
            report(equation, err, diagnostics);
        }
        result
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}
