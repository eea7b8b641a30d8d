//! Infix to postfix translation (shunting-yard with unary `+`/`-` detection).

use super::symbols::{lookup, Symbol};
use crate::constants::MAX_TEXT_LENGTH;
use crate::error::{EvalError, EvalResult};
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// Binary arithmetic operators, plus `+`/`-` which may also be unary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Pow,
    Mul,
    Div,
    Add,
    Sub,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '^' => Some(Operator::Pow),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Pow => '^',
            Operator::Mul => '*',
            Operator::Div => '/',
            Operator::Add => '+',
            Operator::Sub => '-',
        }
    }

    /// True for the operators that carry a [`PlusMinusKind`] tag.
    pub fn is_plus_minus(self) -> bool {
        matches!(self, Operator::Add | Operator::Sub)
    }
}

/// Whether a `+`/`-` takes one operand or two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlusMinusKind {
    Unary,
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Symbol(Symbol),
    /// A name missing from the symbol table; evaluating it fails.
    Unknown(String),
    Operator(Operator),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(value) => write!(f, "{value}"),
            Token::Symbol(symbol) => f.write_str(symbol.name()),
            Token::Unknown(name) => f.write_str(name),
            Token::Operator(op) => write!(f, "{}", op.symbol()),
        }
    }
}

/// Output of [`translate`]: the postfix token stream and one tag per `+`/`-`.
///
/// Tags are stored in the order their operators appear in `tokens`, which is
/// the order the evaluator consumes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Postfix {
    pub tokens: Vec<Token>,
    pub tags: Vec<PlusMinusKind>,
}

impl fmt::Display for Postfix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

/// Entries of the operator stack.
#[derive(Debug)]
enum Pending {
    LeftParen,
    /// Function, or unknown name written as a call.
    Call(Token),
    Operator(Operator, PlusMinusKind),
}

impl Pending {
    fn rank(&self) -> u8 {
        match self {
            Pending::LeftParen => 0,
            Pending::Call(_) => 4,
            Pending::Operator(_, PlusMinusKind::Unary) => 3,
            Pending::Operator(Operator::Pow, _) => 3,
            Pending::Operator(Operator::Mul | Operator::Div, _) => 2,
            Pending::Operator(Operator::Add | Operator::Sub, _) => 1,
        }
    }
}

/// What the previous token was, to tell unary `+`/`-` from binary ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Previous {
    Start,
    Operand,
    Operator,
    LeftParen,
}

struct Translator {
    output: Postfix,
    stack: Vec<Pending>,
    previous: Previous,
}

impl Translator {
    fn new() -> Self {
        Self {
            output: Postfix::default(),
            stack: Vec::new(),
            previous: Previous::Start,
        }
    }

    fn emit(&mut self, pending: Pending) {
        match pending {
            Pending::Operator(op, kind) => {
                if op.is_plus_minus() {
                    self.output.tags.push(kind);
                }
                self.output.tokens.push(Token::Operator(op));
            }
            Pending::Call(token) => self.output.tokens.push(token),
            Pending::LeftParen => {}
        }
    }

    fn operand(&mut self, token: Token) {
        self.output.tokens.push(token);
        self.previous = Previous::Operand;
    }

    fn call(&mut self, token: Token) {
        self.stack.push(Pending::Call(token));
        self.previous = Previous::Operator;
    }

    fn operator(&mut self, op: Operator) {
        let kind = if op.is_plus_minus() && self.previous != Previous::Operand {
            PlusMinusKind::Unary
        } else {
            PlusMinusKind::Binary
        };

        // A prefix operator has no left operand to close off.
        if kind == PlusMinusKind::Binary {
            let incoming = Pending::Operator(op, kind).rank();
            let right_assoc = op == Operator::Pow;
            while let Some(top) = self.stack.last() {
                let rank = top.rank();
                if rank == 0 || rank < incoming || (rank == incoming && right_assoc) {
                    break;
                }
                if let Some(pending) = self.stack.pop() {
                    self.emit(pending);
                }
            }
        }

        self.stack.push(Pending::Operator(op, kind));
        self.previous = Previous::Operator;
    }

    fn left_paren(&mut self) {
        self.stack.push(Pending::LeftParen);
        self.previous = Previous::LeftParen;
    }

    fn right_paren(&mut self, position: usize) -> EvalResult<()> {
        loop {
            match self.stack.pop() {
                Some(Pending::LeftParen) => break,
                Some(pending) => self.emit(pending),
                None => {
                    return Err(EvalError::parse(format!(
                        "unbalanced parentheses, unexpected ')' at position {position}."
                    )))
                }
            }
        }
        if matches!(self.stack.last(), Some(Pending::Call(_))) {
            if let Some(call) = self.stack.pop() {
                self.emit(call);
            }
        }
        self.previous = Previous::Operand;
        Ok(())
    }

    fn finish(mut self) -> EvalResult<Postfix> {
        while let Some(pending) = self.stack.pop() {
            if let Pending::LeftParen = pending {
                return Err(EvalError::parse("unbalanced parentheses, missing ')'."));
            }
            self.emit(pending);
        }
        Ok(self.output)
    }
}

/// Translates an infix equation into postfix order.
///
/// Fails with a parse error on an illegal character, unbalanced parentheses,
/// a malformed number, or input longer than `MAX_TEXT_LENGTH`. Unknown names
/// are not rejected here; they fail when evaluated.
pub fn translate(equation: &str) -> EvalResult<Postfix> {
    if equation.len() > MAX_TEXT_LENGTH {
        return Err(EvalError::parse(format!(
            "equation is longer than {MAX_TEXT_LENGTH} characters."
        )));
    }

    let mut translator = Translator::new();
    let mut chars = equation.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || (is_separator(c) && next_is_digit(equation, position)) {
            let number = scan_number(&mut chars)?;
            translator.operand(Token::Number(number));
        } else if c.is_ascii_alphabetic() {
            let name = scan_identifier(&mut chars);
            match lookup(&name) {
                Some(symbol @ Symbol::Function(_)) => translator.call(Token::Symbol(symbol)),
                Some(symbol) => translator.operand(Token::Symbol(symbol)),
                None if next_non_whitespace(&chars) == Some('(') => {
                    translator.call(Token::Unknown(name))
                }
                None => translator.operand(Token::Unknown(name)),
            }
        } else if let Some(op) = Operator::from_char(c) {
            chars.next();
            translator.operator(op);
        } else if c == '(' {
            chars.next();
            translator.left_paren();
        } else if c == ')' {
            chars.next();
            translator.right_paren(position)?;
        } else {
            return Err(EvalError::parse(format!(
                "illegal character '{c}' at position {position}."
            )));
        }
    }

    translator.finish()
}

fn is_separator(c: char) -> bool {
    c == '.' || c == ','
}

fn next_is_digit(text: &str, position: usize) -> bool {
    text[position + 1..]
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_digit())
}

fn scan_number(chars: &mut Peekable<CharIndices<'_>>) -> EvalResult<f64> {
    let mut text = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if c.is_ascii_digit() {
            text.push(c);
        } else if is_separator(c) {
            text.push('.');
        } else {
            break;
        }
        chars.next();
    }
    text.parse::<f64>()
        .map_err(|_| EvalError::parse(format!("invalid number '{text}'.")))
}

fn scan_identifier(chars: &mut Peekable<CharIndices<'_>>) -> String {
    let mut name = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

fn next_non_whitespace(chars: &Peekable<CharIndices<'_>>) -> Option<char> {
    chars.clone().map(|(_, c)| c).find(|c| !c.is_whitespace())
}
