//! Arithmetic and boolean expressions used by math addons, switch
//! conditions and mint rules.
//!
//! ```text
//! expr    := or
//! or      := and ("||" and)*
//! and     := eq ("&&" eq)*
//! eq      := cmp (("==" | "!=") cmp)*
//! cmp     := sum (("<" | "<=" | ">" | ">=") sum)*
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/" | "%") unary)*
//! unary   := ("-" | "!") unary | power
//! power   := atom ("^" unary)?
//! atom    := number | string | true | false | path | "(" expr ")"
//! ```

use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        if let Some((position, token)) = parser.tokens.get(parser.pos) {
            return Err(FormulaError::Syntax {
                position: *position,
                message: format!("unexpected {token:?}"),
            });
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Variable paths referenced by the expression, in first-use order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_vars(&self.expr, &mut out);
        out
    }

    pub fn evaluate(&self, scope: &Map<String, Value>) -> Result<Value, FormulaError> {
        eval(&self.expr, scope)
    }

    /// Evaluate and coerce to a number.
    pub fn evaluate_number(&self, scope: &Map<String, Value>) -> Result<f64, FormulaError> {
        to_number(&self.evaluate(scope)?)
    }

    /// Evaluate and coerce to a boolean.
    pub fn evaluate_bool(&self, scope: &Map<String, Value>) -> Result<bool, FormulaError> {
        Ok(truthy(&self.evaluate(scope)?))
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn collect_vars<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
    match expr {
        Expr::Var(name) => {
            if !out.contains(&name.as_str()) {
                out.push(name);
            }
        }
        Expr::Unary(_, inner) => collect_vars(inner, out),
        Expr::Binary(_, left, right) => {
            collect_vars(left, out);
            collect_vars(right, out);
        }
        Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) => {}
    }
}

// =============================================================================
// LEXER
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

const OPERATORS: [&str; 18] = [
    "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "^", "<", ">", "!", "=", "&", "|",
];

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, FormulaError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                i += 1;
                if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = text.parse::<f64>().map_err(|_| FormulaError::Syntax {
                position: start,
                message: format!("bad number '{text}'"),
            })?;
            tokens.push((start, Token::Number(value)));
        } else if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                i += 1;
            }
            tokens.push((start, Token::Ident(chars[start..i].iter().collect())));
        } else if c == '\'' || c == '"' {
            i += 1;
            let mut text = String::new();
            while i < chars.len() && chars[i] != c {
                text.push(chars[i]);
                i += 1;
            }
            if i >= chars.len() {
                return Err(FormulaError::Syntax {
                    position: start,
                    message: "unterminated string".into(),
                });
            }
            i += 1;
            tokens.push((start, Token::Str(text)));
        } else if c == '(' {
            tokens.push((start, Token::LParen));
            i += 1;
        } else if c == ')' {
            tokens.push((start, Token::RParen));
            i += 1;
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(*op))
                .ok_or_else(|| FormulaError::Syntax {
                    position: start,
                    message: format!("unexpected character '{c}'"),
                })?;
            let normalized = match *op {
                "=" => "==",
                "&" => "&&",
                "|" => "||",
                other => other,
            };
            i += op.chars().count();
            tokens.push((start, Token::Op(normalized)));
        }
    }
    Ok(tokens)
}

// =============================================================================
// PARSER
// =============================================================================

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some((_, Token::Op(op))) => Some(*op),
            _ => None,
        }
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or_else(|| self.tokens.last().map_or(0, |(p, _)| p + 1), |(p, _)| *p)
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, FormulaError>,
    ) -> Result<Expr, FormulaError> {
        let mut left = next(self)?;
        while let Some(op) = self.peek_op() {
            let Some((_, bin)) = ops.iter().find(|(text, _)| *text == op) else {
                break;
            };
            self.pos += 1;
            let right = next(self)?;
            left = Expr::Binary(*bin, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&[("||", BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&[("&&", BinaryOp::And)], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(
            &[
                ("<", BinaryOp::Lt),
                ("<=", BinaryOp::Le),
                (">", BinaryOp::Gt),
                (">=", BinaryOp::Ge),
            ],
            Self::sum,
        )
    }

    fn sum(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::product)
    }

    fn product(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        match self.peek_op() {
            Some("-") => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)))
            }
            Some("!") => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)))
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.atom()?;
        if self.peek_op() == Some("^") {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, FormulaError> {
        let position = self.position();
        let Some((_, token)) = self.tokens.get(self.pos).cloned() else {
            return Err(FormulaError::Syntax {
                position,
                message: "unexpected end of expression".into(),
            });
        };
        self.pos += 1;
        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                _ => Expr::Var(name),
            }),
            Token::LParen => {
                let inner = self.expr()?;
                match self.tokens.get(self.pos) {
                    Some((_, Token::RParen)) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(FormulaError::Syntax {
                        position: self.position(),
                        message: "expected ')'".into(),
                    }),
                }
            }
            other => Err(FormulaError::Syntax {
                position,
                message: format!("unexpected {other:?}"),
            }),
        }
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Look up a dotted path; a literal key containing dots wins over traversal.
pub fn lookup<'a>(scope: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(value) = scope.get(path) {
        return Some(value);
    }
    let mut parts = path.split('.');
    let mut current = scope.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn eval(expr: &Expr, scope: &Map<String, Value>) -> Result<Value, FormulaError> {
    match expr {
        Expr::Number(n) => number(*n),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Var(name) => lookup(scope, name)
            .cloned()
            .ok_or_else(|| FormulaError::UnknownVariable(name.clone())),
        Expr::Unary(UnaryOp::Neg, inner) => number(-to_number(&eval(inner, scope)?)?),
        Expr::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!truthy(&eval(inner, scope)?))),
        Expr::Binary(BinaryOp::And, left, right) => {
            Ok(Value::Bool(truthy(&eval(left, scope)?) && truthy(&eval(right, scope)?)))
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            Ok(Value::Bool(truthy(&eval(left, scope)?) || truthy(&eval(right, scope)?)))
        }
        Expr::Binary(op, left, right) => {
            let left = eval(left, scope)?;
            let right = eval(right, scope)?;
            binary(*op, &left, &right)
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, FormulaError> {
    match op {
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = match (to_number(left), to_number(right)) {
                (Ok(a), Ok(b)) if !left.is_string() || !right.is_string() => a == b,
                _ => left == right,
            };
            Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) if to_number(left).is_err() => a.cmp(b),
                _ => {
                    let (a, b) = (to_number(left)?, to_number(right)?);
                    a.partial_cmp(&b)
                        .ok_or_else(|| FormulaError::Type("cannot order NaN".into()))?
                }
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add => match (to_number(left), to_number(right)) {
            (Ok(a), Ok(b)) => number(a + b),
            _ => Ok(Value::String(format!("{}{}", as_text(left), as_text(right)))),
        },
        _ => {
            let (a, b) = (to_number(left)?, to_number(right)?);
            match op {
                BinaryOp::Sub => number(a - b),
                BinaryOp::Mul => number(a * b),
                BinaryOp::Div if b == 0.0 => Err(FormulaError::DivisionByZero),
                BinaryOp::Div => number(a / b),
                BinaryOp::Rem if b == 0.0 => Err(FormulaError::DivisionByZero),
                BinaryOp::Rem => number(a % b),
                _ => number(a.powf(b)),
            }
        }
    }
}

fn number(n: f64) -> Result<Value, FormulaError> {
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| FormulaError::Type(format!("{n} is not a finite number")))
}

/// Numeric view of a value; numeric strings and booleans coerce.
pub fn to_number(value: &Value) -> Result<f64, FormulaError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FormulaError::Type(format!("{n} is not representable"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FormulaError::Type(format!("'{s}' is not a number"))),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(FormulaError::Type(format!("{other} is not a number"))),
    }
}

#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_precedence() {
        let f = Formula::parse("2 + 3 * 4 ^ 2").unwrap();
        assert_eq!(f.evaluate_number(&Map::new()).unwrap(), 50.0);
        let f = Formula::parse("(2 + 3) * -4").unwrap();
        assert_eq!(f.evaluate_number(&Map::new()).unwrap(), -20.0);
    }

    #[test]
    fn test_variables_and_paths() {
        let s = scope(json!({"a": 10, "field": {"b": "2.5"}, "x.y": 1}));
        let f = Formula::parse("a * field.b + x.y").unwrap();
        assert_eq!(f.evaluate_number(&s).unwrap(), 26.0);
        assert_eq!(f.variables(), vec!["a", "field.b", "x.y"]);
    }

    #[test]
    fn test_conditions() {
        let s = scope(json!({"status": "approved", "amount": 12}));
        assert!(Formula::parse("status == 'approved' && amount > 10")
            .unwrap()
            .evaluate_bool(&s)
            .unwrap());
        assert!(!Formula::parse("status != \"approved\" || !(amount >= 12)")
            .unwrap()
            .evaluate_bool(&s)
            .unwrap());
        assert!(Formula::parse("amount = 12").unwrap().evaluate_bool(&s).unwrap());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(Formula::parse("1 +"), Err(FormulaError::Syntax { .. })));
        assert!(matches!(Formula::parse("(1"), Err(FormulaError::Syntax { .. })));
        assert!(matches!(Formula::parse("1 $ 2"), Err(FormulaError::Syntax { .. })));
        assert_eq!(
            Formula::parse("missing + 1").unwrap().evaluate(&Map::new()),
            Err(FormulaError::UnknownVariable("missing".into()))
        );
        assert_eq!(
            Formula::parse("1 / 0").unwrap().evaluate(&Map::new()),
            Err(FormulaError::DivisionByZero)
        );
    }
}
