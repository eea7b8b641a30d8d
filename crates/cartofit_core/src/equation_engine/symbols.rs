//! Names recognised inside equations.

use crate::constants::RO;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One-argument functions. Trigonometric ones work in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Cot,
    Asin,
    Acos,
    Atan,
    Ln,
    Log,
    Exp,
    Sqr,
    Sqrt,
    Abs,
    Sign,
}

impl Function {
    /// Canonical name, used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Cot => "cotg",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Ln => "ln",
            Function::Log => "log",
            Function::Exp => "exp",
            Function::Sqr => "sqr",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
            Function::Sign => "sign",
        }
    }
}

/// Variables bound per evaluation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    X,
    Y,
    Lat,
    Lon,
    R,
    A,
    B,
    C,
    Lat0,
    Lat1,
    Lat2,
    Theta,
}

impl Variable {
    pub fn name(self) -> &'static str {
        match self {
            Variable::X => "x",
            Variable::Y => "y",
            Variable::Lat => "lat",
            Variable::Lon => "lon",
            Variable::R => "R",
            Variable::A => "a",
            Variable::B => "b",
            Variable::C => "c",
            Variable::Lat0 => "lat0",
            Variable::Lat1 => "lat1",
            Variable::Lat2 => "lat2",
            Variable::Theta => "theta",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Pi,
    /// Degrees per radian.
    Ro,
}

impl Constant {
    pub fn name(self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::Ro => "RO",
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::Ro => RO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Function(Function),
    Variable(Variable),
    Constant(Constant),
}

impl Symbol {
    pub fn name(self) -> &'static str {
        match self {
            Symbol::Function(function) => function.name(),
            Symbol::Variable(variable) => variable.name(),
            Symbol::Constant(constant) => constant.name(),
        }
    }
}

static SYMBOLS: Lazy<HashMap<&'static str, Symbol>> = Lazy::new(|| {
    use Symbol::{Constant as C, Function as F, Variable as V};

    let entries: [(&'static str, Symbol); 43] = [
        ("sin", F(Function::Sin)),
        ("cos", F(Function::Cos)),
        ("tan", F(Function::Tan)),
        ("tg", F(Function::Tan)),
        ("cot", F(Function::Cot)),
        ("cotg", F(Function::Cot)),
        ("asin", F(Function::Asin)),
        ("acos", F(Function::Acos)),
        ("atan", F(Function::Atan)),
        ("ln", F(Function::Ln)),
        ("log", F(Function::Log)),
        ("exp", F(Function::Exp)),
        ("sqr", F(Function::Sqr)),
        ("sqrt", F(Function::Sqrt)),
        ("abs", F(Function::Abs)),
        ("sign", F(Function::Sign)),
        ("x", V(Variable::X)),
        ("y", V(Variable::Y)),
        ("R", V(Variable::R)),
        ("a", V(Variable::A)),
        ("b", V(Variable::B)),
        ("c", V(Variable::C)),
        ("lon", V(Variable::Lon)),
        ("lam", V(Variable::Lon)),
        ("v", V(Variable::Lon)),
        ("lat", V(Variable::Lat)),
        ("phi", V(Variable::Lat)),
        ("u", V(Variable::Lat)),
        ("lat0", V(Variable::Lat0)),
        ("phi0", V(Variable::Lat0)),
        ("u0", V(Variable::Lat0)),
        ("lat1", V(Variable::Lat1)),
        ("phi1", V(Variable::Lat1)),
        ("u1", V(Variable::Lat1)),
        ("lat2", V(Variable::Lat2)),
        ("phi2", V(Variable::Lat2)),
        ("u2", V(Variable::Lat2)),
        ("theta", V(Variable::Theta)),
        ("pi", C(Constant::Pi)),
        ("Pi", C(Constant::Pi)),
        ("PI", C(Constant::Pi)),
        ("RO", C(Constant::Ro)),
        ("Ro", C(Constant::Ro)),
    ];

    entries.into_iter().collect()
});

/// Resolves a name against the fixed symbol table. Names are case sensitive.
pub fn lookup(name: &str) -> Option<Symbol> {
    SYMBOLS.get(name).copied()
}
