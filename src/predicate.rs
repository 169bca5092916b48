//! Row selection expression language.
//!
//! Expressions are parsed once into an [`Expr`] tree and evaluated per row
//! by [`crate::select`]. Grammar, lowest precedence first:
//!
//! ```text
//! expr       := or
//! or         := and ("or" and)*
//! and        := not ("and" not)*
//! not        := "not" not | comparison
//! comparison := sum (compare_op sum)*          chained like `1 < c(1) < 5`
//! compare_op := == | != | < | > | <= | >= | in | not in
//! sum        := product (("+" | "-") product)*
//! product    := unary (("*" | "/" | "%") unary)*
//! unary      := "-" unary | primary
//! primary    := NUMBER | STRING | True | False
//!             | "(" expr ")" | "(" [expr ("," expr)*] ")" | "[" [expr ("," expr)*] "]"
//!             | c(ref) | C(refs) | D(refs) | A() | r(STRING, ref)
//! ref        := INTEGER | -INTEGER | STRING | NAME
//! refs       := "(" ref ("," ref)* ")" | ref ("," ref)*
//! ```
//!
//! `c(ref)` is the value of one column, `C(refs)` holds when a comparison
//! holds for every listed column, `D(refs)` when it holds for any of them,
//! `A()` is `D` over all columns and `r(pattern, ref)` is a regex search.

use regex::Regex;

use crate::columns::{Header, resolve_index};
use crate::error::{CampyonError, Result};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

/// A column reference inside an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRef {
    /// As written: `3`, `-1` or a column name.
    Unresolved(String),
    /// 1-based index after binding to a dataset.
    Resolved(usize),
}

impl ColumnRef {
    fn bind(&mut self, field_count: usize, header: Option<&Header>) -> Result<()> {
        if let ColumnRef::Unresolved(token) = self {
            *self = ColumnRef::Resolved(resolve_index(token, field_count, header)?);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// `C(...)`: every column must satisfy the comparison.
    All,
    /// `D(...)` and `A()`: at least one column must satisfy it.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Bool(bool),
    /// Tuple or list literal.
    List(Vec<Expr>),
    Column(ColumnRef),
    Group { kind: GroupKind, columns: Vec<ColumnRef> },
    AllColumns,
    Regex { pattern: Regex, column: ColumnRef },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare { op: CompareOp, left: Box<Expr>, right: Box<Expr> },
    Arith { op: ArithOp, left: Box<Expr>, right: Box<Expr> },
    Neg(Box<Expr>),
}

impl Expr {
    /// Resolve every column reference against a dataset's shape.
    pub fn bind(&mut self, field_count: usize, header: Option<&Header>) -> Result<()> {
        match self {
            Expr::Literal(_) | Expr::Bool(_) | Expr::AllColumns => Ok(()),
            Expr::Column(col) | Expr::Regex { column: col, .. } => col.bind(field_count, header),
            Expr::Group { columns, .. } => columns
                .iter_mut()
                .try_for_each(|c| c.bind(field_count, header)),
            Expr::List(items) => items
                .iter_mut()
                .try_for_each(|e| e.bind(field_count, header)),
            Expr::Not(e) | Expr::Neg(e) => e.bind(field_count, header),
            Expr::And(l, r)
            | Expr::Or(l, r)
            | Expr::Compare { left: l, right: r, .. }
            | Expr::Arith { left: l, right: r, .. } => {
                l.bind(field_count, header)?;
                r.bind(field_count, header)
            }
        }
    }

    /// True if the expression reads any column.
    pub fn references_columns(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::Bool(_) => false,
            Expr::Column(_) | Expr::Group { .. } | Expr::AllColumns | Expr::Regex { .. } => true,
            Expr::List(items) => items.iter().any(Expr::references_columns),
            Expr::Not(e) | Expr::Neg(e) => e.references_columns(),
            Expr::And(l, r)
            | Expr::Or(l, r)
            | Expr::Compare { left: l, right: r, .. }
            | Expr::Arith { left: l, right: r, .. } => {
                l.references_columns() || r.references_columns()
            }
        }
    }
}

/// Parse an expression.
pub fn parse(text: &str) -> Result<Expr> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' | ')' | '[' | ']' | ',' => {
                let token = match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    _ => Token::Comma,
                };
                tokens.push((offset, token));
                chars.next();
            }
            '+' | '-' | '*' | '/' | '%' => {
                let op = match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    _ => "%",
                };
                tokens.push((offset, Token::Op(op)));
                chars.next();
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let followed_by_eq = chars.next_if(|&(_, n)| n == '=').is_some();
                let op = match (c, followed_by_eq) {
                    ('=', true) => "==",
                    ('!', true) => "!=",
                    ('<', true) => "<=",
                    ('>', true) => ">=",
                    ('<', false) => "<",
                    ('>', false) => ">",
                    _ => {
                        return Err(CampyonError::SelectionParse {
                            offset,
                            message: format!("unexpected '{c}'"),
                        });
                    }
                };
                tokens.push((offset, Token::Op(op)));
            }
            '"' | '\'' => {
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, 't')) => s.push('\t'),
                            Some((_, other)) => s.push(other),
                            None => break,
                        },
                        q if q == c => {
                            closed = true;
                            break;
                        }
                        other => s.push(other),
                    }
                }
                if !closed {
                    return Err(CampyonError::SelectionParse {
                        offset,
                        message: "unterminated string".to_string(),
                    });
                }
                tokens.push((offset, Token::Str(s)));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut num = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    let exponent_sign =
                        (ch == '-' || ch == '+') && num.ends_with(['e', 'E']);
                    if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || exponent_sign {
                        num.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = if let Ok(i) = num.parse::<i64>() {
                    Token::Int(i)
                } else if let Ok(f) = num.parse::<f64>() {
                    Token::Float(f)
                } else {
                    return Err(CampyonError::SelectionParse {
                        offset,
                        message: format!("invalid number '{num}'"),
                    });
                };
                tokens.push((offset, token));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((offset, Token::Ident(ident)));
            }
            other => {
                return Err(CampyonError::SelectionParse {
                    offset,
                    message: format!("unexpected character '{other}'"),
                });
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(o, _)| *o)
            .unwrap_or(0)
    }

    fn error(&self, message: &str) -> CampyonError {
        CampyonError::SelectionParse {
            offset: self.offset(),
            message: message.to_string(),
        }
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == word)
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.is_keyword("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.is_keyword("and") {
            self.pos += 1;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.is_keyword("not") {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek()? {
            Token::Op("==") => CompareOp::Eq,
            Token::Op("!=") => CompareOp::Ne,
            Token::Op("<") => CompareOp::Lt,
            Token::Op(">") => CompareOp::Gt,
            Token::Op("<=") => CompareOp::Le,
            Token::Op(">=") => CompareOp::Ge,
            Token::Ident(w) if w == "in" => CompareOp::In,
            Token::Ident(w) if w == "not" => {
                if matches!(self.peek_at(1), Some(Token::Ident(w)) if w == "in") {
                    self.pos += 1;
                    CompareOp::NotIn
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let first = self.parse_sum()?;
        let mut result: Option<Expr> = None;
        let mut left = first.clone();
        while let Some(op) = self.compare_op() {
            let right = self.parse_sum()?;
            let cmp = Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right.clone()),
            };
            result = Some(match result {
                Some(prev) => Expr::And(Box::new(prev), Box::new(cmp)),
                None => cmp,
            });
            left = right;
        }
        Ok(result.unwrap_or(first))
    }

    fn parse_sum(&mut self) -> Result<Expr> {
        let mut left = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("+")) => ArithOp::Add,
                Some(Token::Op("-")) => ArithOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_product()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_product(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("*")) => ArithOp::Mul,
                Some(Token::Op("/")) => ArithOp::Div,
                Some(Token::Op("%")) => ArithOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.peek() == Some(&Token::Op("-")) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(match inner {
                Expr::Literal(Value::Int(i)) => Expr::Literal(Value::Int(-i)),
                Expr::Literal(Value::Float(f)) => Expr::Literal(Value::Float(-f)),
                other => Expr::Neg(Box::new(other)),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::LParen) => {
                if self.peek() == Some(&Token::RParen) {
                    self.pos += 1;
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.parse_or()?;
                if self.peek() == Some(&Token::Comma) {
                    let mut items = vec![first];
                    while self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                        if self.peek() == Some(&Token::RParen) {
                            break;
                        }
                        items.push(self.parse_or()?);
                    }
                    self.expect(Token::RParen, "')'")?;
                    return Ok(Expr::List(items));
                }
                self.expect(Token::RParen, "')'")?;
                Ok(first)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                while self.peek() != Some(&Token::RBracket) {
                    items.push(self.parse_or()?);
                    if self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                self.expect(Token::RBracket, "']'")?;
                Ok(Expr::List(items))
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "True" | "true" => Ok(Expr::Bool(true)),
                "False" | "false" => Ok(Expr::Bool(false)),
                _ if self.peek() == Some(&Token::LParen) => {
                    self.pos += 1;
                    self.parse_call(&name)
                }
                _ => {
                    self.pos -= 1;
                    Err(self.error(&format!("unexpected name '{name}'")))
                }
            },
            Some(_) => {
                self.pos -= 1;
                Err(self.error("unexpected token"))
            }
            None => Err(self.error("unexpected end of expression")),
        }
    }

    /// Parses the arguments of `name(`, consuming the closing parenthesis.
    fn parse_call(&mut self, name: &str) -> Result<Expr> {
        let expr = match name {
            "c" => Expr::Column(self.parse_column_ref()?),
            "C" | "D" => {
                let kind = if name == "C" {
                    GroupKind::All
                } else {
                    GroupKind::Any
                };
                Expr::Group {
                    kind,
                    columns: self.parse_column_refs()?,
                }
            }
            "A" => Expr::AllColumns,
            "r" => {
                let pattern = match self.next() {
                    Some(Token::Str(p)) => p,
                    _ => {
                        self.pos = self.pos.saturating_sub(1);
                        return Err(self.error("r() expects a quoted pattern"));
                    }
                };
                let pattern = Regex::new(&pattern)
                    .map_err(|e| self.error(&format!("invalid pattern: {e}")))?;
                self.expect(Token::Comma, "',' after pattern")?;
                Expr::Regex {
                    pattern,
                    column: self.parse_column_ref()?,
                }
            }
            other => {
                self.pos -= 2;
                return Err(self.error(&format!("unknown function '{other}'")));
            }
        };
        self.expect(Token::RParen, "')'")?;
        Ok(expr)
    }

    fn parse_column_ref(&mut self) -> Result<ColumnRef> {
        let negative = if self.peek() == Some(&Token::Op("-")) {
            self.pos += 1;
            true
        } else {
            false
        };
        match self.next() {
            Some(Token::Int(i)) if negative => Ok(ColumnRef::Unresolved(format!("-{i}"))),
            Some(Token::Int(i)) => Ok(ColumnRef::Unresolved(i.to_string())),
            Some(Token::Str(name)) | Some(Token::Ident(name)) if !negative => {
                Ok(ColumnRef::Unresolved(name))
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error("expected a column number or name"))
            }
        }
    }

    fn parse_column_refs(&mut self) -> Result<Vec<ColumnRef>> {
        let close = match self.peek() {
            Some(Token::LParen) => Some(Token::RParen),
            Some(Token::LBracket) => Some(Token::RBracket),
            _ => None,
        };
        if close.is_some() {
            self.pos += 1;
        }
        let mut refs = vec![self.parse_column_ref()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            if close.as_ref().is_some_and(|c| self.peek() == Some(c)) {
                break;
            }
            refs.push(self.parse_column_ref()?);
        }
        if let Some(close) = close {
            self.expect(close, "closing bracket")?;
        }
        Ok(refs)
    }
}
