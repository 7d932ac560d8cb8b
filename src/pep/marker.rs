//! Environment marker expressions: a boolean predicate over named
//! environment attributes, used to make a requirement conditional.
//!
//! Grammar (PEP 508 subset): comparisons between environment variables and
//! quoted strings, combined with `and`, `or` and parentheses. Ordering
//! operators compare version-wise when both operands look like versions.

use std::fmt;
use std::str::FromStr;

use crate::environment::MarkerEnv;
use crate::error::{LockError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerExpr {
    And(Box<MarkerExpr>, Box<MarkerExpr>),
    Or(Box<MarkerExpr>, Box<MarkerExpr>),
    Comparison {
        lhs: MarkerValue,
        op: MarkerOp,
        rhs: MarkerValue,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerValue {
    /// An environment attribute such as `sys_platform`.
    Variable(String),
    /// A quoted literal.
    Literal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    TildeEqual,
    In,
    NotIn,
}

impl MarkerExpr {
    pub fn evaluate(&self, env: &MarkerEnv) -> bool {
        match self {
            MarkerExpr::And(a, b) => a.evaluate(env) && b.evaluate(env),
            MarkerExpr::Or(a, b) => a.evaluate(env) || b.evaluate(env),
            MarkerExpr::Comparison { lhs, op, rhs } => {
                let left = lhs.resolve(env);
                let right = rhs.resolve(env);
                // extra names compare under their canonical form (PEP 685)
                if lhs.is_extra() || rhs.is_extra() {
                    return compare(
                        &super::canonicalize_name(left),
                        *op,
                        &super::canonicalize_name(right),
                    );
                }
                compare(left, *op, right)
            }
        }
    }
}

impl MarkerValue {
    fn is_extra(&self) -> bool {
        matches!(self, MarkerValue::Variable(name) if name == "extra")
    }

    fn resolve<'a>(&'a self, env: &'a MarkerEnv) -> &'a str {
        match self {
            MarkerValue::Variable(name) => env.get(name),
            MarkerValue::Literal(value) => value,
        }
    }
}

fn compare(lhs: &str, op: MarkerOp, rhs: &str) -> bool {
    match op {
        MarkerOp::Equal => lhs == rhs,
        MarkerOp::NotEqual => lhs != rhs,
        MarkerOp::In => rhs.contains(lhs),
        MarkerOp::NotIn => !rhs.contains(lhs),
        MarkerOp::LessThan | MarkerOp::LessEqual | MarkerOp::GreaterThan
        | MarkerOp::GreaterEqual | MarkerOp::TildeEqual => {
            match (parse_loose_version(lhs), parse_loose_version(rhs)) {
                (Some(l), Some(r)) => compare_versions(&l, op, &r),
                // Fall back to lexical ordering for non-version operands.
                _ => match op {
                    MarkerOp::LessThan => lhs < rhs,
                    MarkerOp::LessEqual => lhs <= rhs,
                    MarkerOp::GreaterThan => lhs > rhs,
                    MarkerOp::GreaterEqual => lhs >= rhs,
                    MarkerOp::TildeEqual => lhs == rhs,
                    _ => unreachable!(),
                },
            }
        }
    }
}

/// Parse the numeric release segments of a version-ish string. Returns
/// `None` when the string does not start with a digit.
fn parse_loose_version(s: &str) -> Option<Vec<u64>> {
    let s = s.trim();
    if !s.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let mut release = Vec::new();
    for part in s.split('.') {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            break;
        }
        release.push(digits.parse().ok()?);
    }
    Some(release)
}

fn compare_versions(lhs: &[u64], op: MarkerOp, rhs: &[u64]) -> bool {
    let len = lhs.len().max(rhs.len());
    let pad = |v: &[u64], i: usize| v.get(i).copied().unwrap_or(0);
    let mut ordering = std::cmp::Ordering::Equal;
    for i in 0..len {
        ordering = pad(lhs, i).cmp(&pad(rhs, i));
        if ordering != std::cmp::Ordering::Equal {
            break;
        }
    }
    match op {
        MarkerOp::LessThan => ordering.is_lt(),
        MarkerOp::LessEqual => ordering.is_le(),
        MarkerOp::GreaterThan => ordering.is_gt(),
        MarkerOp::GreaterEqual => ordering.is_ge(),
        // Compatible release: at least rhs, and equal on all but rhs's
        // last declared segment.
        MarkerOp::TildeEqual => {
            if rhs.is_empty() {
                return ordering.is_ge();
            }
            let prefix = rhs.len() - 1;
            ordering.is_ge() && lhs.iter().take(prefix).eq(rhs.iter().take(prefix))
        }
        _ => unreachable!(),
    }
}

impl FromStr for MarkerExpr {
    type Err = LockError;

    fn from_str(raw: &str) -> Result<Self> {
        let tokens = tokenize(raw)?;
        let mut parser = Parser {
            raw,
            tokens,
            pos: 0,
        };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("trailing tokens"));
        }
        Ok(expr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Op(MarkerOp),
    LParen,
    RParen,
}

fn tokenize(raw: &str) -> Result<Vec<Token>> {
    let invalid = |reason: &str| LockError::InvalidMarker {
        marker: raw.to_string(),
        reason: reason.to_string(),
    };
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '\'' | '"' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some(ch) => value.push(ch),
                        None => return Err(invalid("unterminated string")),
                    }
                }
                tokens.push(Token::Str(value));
            }
            '=' | '!' | '<' | '>' | '~' => {
                chars.next();
                let eq = chars.peek() == Some(&'=');
                if eq {
                    chars.next();
                }
                let op = match (c, eq) {
                    ('=', true) => {
                        // arbitrary equality `===` degrades to string equality
                        if chars.peek() == Some(&'=') {
                            chars.next();
                        }
                        MarkerOp::Equal
                    }
                    ('!', true) => MarkerOp::NotEqual,
                    ('<', true) => MarkerOp::LessEqual,
                    ('<', false) => MarkerOp::LessThan,
                    ('>', true) => MarkerOp::GreaterEqual,
                    ('>', false) => MarkerOp::GreaterThan,
                    ('~', true) => MarkerOp::TildeEqual,
                    _ => return Err(invalid("unknown operator")),
                };
                tokens.push(Token::Op(op));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            _ => return Err(invalid("unexpected character")),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    raw: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> LockError {
        LockError::InvalidMarker {
            marker: self.raw.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(k)) if k == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<MarkerExpr> {
        let mut lhs = self.parse_and()?;
        while self.eat_keyword("or") {
            let rhs = self.parse_and()?;
            lhs = MarkerExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<MarkerExpr> {
        let mut lhs = self.parse_atom()?;
        while self.eat_keyword("and") {
            let rhs = self.parse_atom()?;
            lhs = MarkerExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<MarkerExpr> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let expr = self.parse_or()?;
            match self.next() {
                Some(Token::RParen) => return Ok(expr),
                _ => return Err(self.error("expected ')'")),
            }
        }
        let lhs = self.parse_value()?;
        let op = self.parse_op()?;
        let rhs = self.parse_value()?;
        Ok(MarkerExpr::Comparison { lhs, op, rhs })
    }

    fn parse_value(&mut self) -> Result<MarkerValue> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(MarkerValue::Variable(name)),
            Some(Token::Str(value)) => Ok(MarkerValue::Literal(value)),
            _ => Err(self.error("expected variable or string")),
        }
    }

    fn parse_op(&mut self) -> Result<MarkerOp> {
        match self.next() {
            Some(Token::Op(op)) => Ok(op),
            Some(Token::Ident(k)) if k == "in" => Ok(MarkerOp::In),
            Some(Token::Ident(k)) if k == "not" => {
                if self.eat_keyword("in") {
                    Ok(MarkerOp::NotIn)
                } else {
                    Err(self.error("expected 'in' after 'not'"))
                }
            }
            _ => Err(self.error("expected comparison operator")),
        }
    }
}

impl fmt::Display for MarkerExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerExpr::And(a, b) => write!(f, "({a} and {b})"),
            MarkerExpr::Or(a, b) => write!(f, "({a} or {b})"),
            MarkerExpr::Comparison { lhs, op, rhs } => write!(f, "{lhs} {op} {rhs}"),
        }
    }
}

impl fmt::Display for MarkerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerValue::Variable(name) => write!(f, "{name}"),
            MarkerValue::Literal(value) => write!(f, "\"{value}\""),
        }
    }
}

impl fmt::Display for MarkerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            MarkerOp::Equal => "==",
            MarkerOp::NotEqual => "!=",
            MarkerOp::LessThan => "<",
            MarkerOp::LessEqual => "<=",
            MarkerOp::GreaterThan => ">",
            MarkerOp::GreaterEqual => ">=",
            MarkerOp::TildeEqual => "~=",
            MarkerOp::In => "in",
            MarkerOp::NotIn => "not in",
        };
        write!(f, "{op}")
    }
}
