//! Row selection.
//!
//! A [`RowSelector`] decides whether a data row survives. Two mutually
//! exclusive expression forms are accepted:
//!
//! - Function form: `c(1) > 3 and C((2,3)) != ''`, parsed once and bound
//!   to the dataset's columns (see [`crate::predicate`]).
//! - Placeholder form: `#1 > 3 and #2 == "x"`. Placeholders are replaced
//!   textually by each row's values (numbers inline, everything else
//!   quoted) and the result is parsed and evaluated per row.
//!
//! Any evaluation failure aborts the run; a broken expression is a
//! configuration bug, not bad data.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

use crate::columns::Header;
use crate::error::{CampyonError, Result};
use crate::predicate::{self, ArithOp, ColumnRef, CompareOp, Expr, GroupKind};
use crate::value::Value;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(\d+)").expect("static placeholder pattern"))
}

fn function_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[cCDAr]\s*\(").expect("static function pattern"))
}

/// A stretch of expression text, either code or a quoted literal.
enum Segment<'a> {
    Code(&'a str),
    Literal(&'a str),
}

/// Split `text` at string literals, honouring backslash escapes. An
/// unterminated literal runs to the end.
fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '"' && c != '\'' {
            continue;
        }
        if start < i {
            out.push(Segment::Code(&text[start..i]));
        }
        let mut end = text.len();
        while let Some((j, ch)) = chars.next() {
            if ch == '\\' {
                chars.next();
            } else if ch == c {
                end = j + ch.len_utf8();
                break;
            }
        }
        out.push(Segment::Literal(&text[i..end]));
        start = end;
    }
    if start < text.len() {
        out.push(Segment::Code(&text[start..]));
    }
    out
}

/// The code parts of `text`, literals blanked out.
fn code_only(text: &str) -> String {
    segments(text)
        .into_iter()
        .map(|seg| match seg {
            Segment::Code(code) => code,
            Segment::Literal(_) => " ",
        })
        .collect()
}

/// Rewrite the code parts of `text`, leaving literals untouched.
fn rewrite_code(text: &str, f: impl Fn(&str) -> String) -> String {
    segments(text)
        .into_iter()
        .map(|seg| match seg {
            Segment::Code(code) => f(code),
            Segment::Literal(lit) => lit.to_string(),
        })
        .collect()
}

/// Result of evaluating a sub-expression against one row.
#[derive(Debug, Clone)]
enum Eval {
    Scalar(Value),
    /// A column value together with its trimmed field text.
    Field { raw: String, value: Value },
    Bool(bool),
    List(Vec<Value>),
    Group { kind: GroupKind, values: Vec<Value> },
}

impl Eval {
    fn truthy(&self) -> bool {
        match self {
            Eval::Bool(b) => *b,
            Eval::Scalar(v) | Eval::Field { value: v, .. } => value_truthy(v),
            Eval::List(items) => !items.is_empty(),
            Eval::Group { kind, values } => combine(*kind, values.iter().map(value_truthy)),
        }
    }
}

fn value_truthy(v: &Value) -> bool {
    match v {
        Value::Str(s) => !s.is_empty(),
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
    }
}

fn combine(kind: GroupKind, mut results: impl Iterator<Item = bool>) -> bool {
    match kind {
        GroupKind::All => results.all(|b| b),
        GroupKind::Any => results.any(|b| b),
    }
}

/// Evaluates a bound expression against the fields of one row.
struct RowEnv<'a> {
    fields: &'a [&'a str],
}

impl RowEnv<'_> {
    /// Trimmed field text of a column.
    fn raw(&self, col: &ColumnRef) -> std::result::Result<&str, String> {
        match col {
            ColumnRef::Resolved(index) => self
                .fields
                .get(index - 1)
                .map(|raw| raw.trim())
                .ok_or_else(|| format!("column {index} is not present in this row")),
            ColumnRef::Unresolved(token) => Err(format!("column reference {token} is not bound")),
        }
    }

    fn column(&self, col: &ColumnRef) -> std::result::Result<Value, String> {
        self.raw(col).map(Value::coerce)
    }

    fn eval(&self, expr: &Expr) -> std::result::Result<Eval, String> {
        match expr {
            Expr::Literal(v) => Ok(Eval::Scalar(v.clone())),
            Expr::Bool(b) => Ok(Eval::Bool(*b)),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match self.eval(item)? {
                        e @ (Eval::Scalar(_) | Eval::Bool(_) | Eval::Field { .. }) => {
                            values.push(scalar(e)?)
                        }
                        _ => return Err("lists may only contain plain values".to_string()),
                    }
                }
                Ok(Eval::List(values))
            }
            Expr::Column(col) => {
                let raw = self.raw(col)?;
                Ok(Eval::Field {
                    raw: raw.to_string(),
                    value: Value::coerce(raw),
                })
            }
            Expr::Group { kind, columns } => {
                let values = columns
                    .iter()
                    .map(|c| self.column(c))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Eval::Group {
                    kind: *kind,
                    values,
                })
            }
            Expr::AllColumns => Ok(Eval::Group {
                kind: GroupKind::Any,
                values: self
                    .fields
                    .iter()
                    .map(|raw| Value::coerce(raw.trim()))
                    .collect(),
            }),
            Expr::Regex { pattern, column } => Ok(Eval::Bool(pattern.is_match(self.raw(column)?))),
            Expr::Not(inner) => Ok(Eval::Bool(!self.eval(inner)?.truthy())),
            Expr::And(l, r) => {
                if !self.eval(l)?.truthy() {
                    return Ok(Eval::Bool(false));
                }
                Ok(Eval::Bool(self.eval(r)?.truthy()))
            }
            Expr::Or(l, r) => {
                if self.eval(l)?.truthy() {
                    return Ok(Eval::Bool(true));
                }
                Ok(Eval::Bool(self.eval(r)?.truthy()))
            }
            Expr::Compare { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                compare(*op, &left, &right).map(Eval::Bool)
            }
            Expr::Arith { op, left, right } => {
                let left = scalar(self.eval(left)?)?;
                let right = scalar(self.eval(right)?)?;
                arith(*op, &left, &right).map(Eval::Scalar)
            }
            Expr::Neg(inner) => match scalar(self.eval(inner)?)? {
                Value::Int(i) => Ok(Eval::Scalar(
                    i.checked_neg()
                        .map(Value::Int)
                        .unwrap_or(Value::Float(-(i as f64))),
                )),
                Value::Float(f) => Ok(Eval::Scalar(Value::Float(-f))),
                Value::Str(s) => Err(format!("cannot negate string '{s}'")),
            },
        }
    }
}

fn scalar(e: Eval) -> std::result::Result<Value, String> {
    match e {
        Eval::Scalar(v) | Eval::Field { value: v, .. } => Ok(v),
        Eval::Bool(b) => Ok(Value::Int(b as i64)),
        Eval::List(_) => Err("arithmetic on a list".to_string()),
        Eval::Group { .. } => Err("arithmetic on a column group".to_string()),
    }
}

fn compare(op: CompareOp, left: &Eval, right: &Eval) -> std::result::Result<bool, String> {
    match (left, right) {
        (Eval::Group { .. }, Eval::Group { .. }) => {
            Err("cannot compare two column groups".to_string())
        }
        (Eval::Group { kind, values }, other) => {
            let mut results = Vec::with_capacity(values.len());
            for v in values {
                results.push(compare(op, &Eval::Scalar(v.clone()), other)?);
            }
            Ok(combine(*kind, results.into_iter()))
        }
        (other, Eval::Group { kind, values }) => {
            let mut results = Vec::with_capacity(values.len());
            for v in values {
                results.push(compare(op, other, &Eval::Scalar(v.clone()))?);
            }
            Ok(combine(*kind, results.into_iter()))
        }
        (_, Eval::List(items)) if matches!(op, CompareOp::In | CompareOp::NotIn) => {
            let needle = scalar(left.clone())?;
            let found = items.iter().any(|item| values_equal(&needle, item));
            Ok(found == (op == CompareOp::In))
        }
        (Eval::List(_), _) | (_, Eval::List(_)) => {
            Err("lists only support 'in' and 'not in'".to_string())
        }
        (_, Eval::Field { raw, .. } | Eval::Scalar(Value::Str(raw)))
            if matches!(op, CompareOp::In | CompareOp::NotIn) =>
        {
            let needle = match left {
                Eval::Field { raw, .. } => raw.clone(),
                other => scalar(other.clone())?.to_string(),
            };
            Ok(raw.contains(&needle) == (op == CompareOp::In))
        }
        _ => {
            let l = scalar(left.clone())?;
            let r = scalar(right.clone())?;
            compare_values(op, &l, &r)
        }
    }
}

fn compare_values(op: CompareOp, l: &Value, r: &Value) -> std::result::Result<bool, String> {
    let ordering = || order_values(l, r);
    Ok(match op {
        CompareOp::Eq => values_equal(l, r),
        CompareOp::Ne => !values_equal(l, r),
        CompareOp::Lt => ordering() == Some(Ordering::Less),
        CompareOp::Gt => ordering() == Some(Ordering::Greater),
        CompareOp::Le => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Ge => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        CompareOp::In => values_equal(l, r),
        CompareOp::NotIn => !values_equal(l, r),
    })
}

/// Numbers compare numerically, anything else by display string.
fn order_values(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(l.to_string().cmp(&r.to_string())),
        },
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    order_values(l, r) == Some(Ordering::Equal)
}

fn arith(op: ArithOp, l: &Value, r: &Value) -> std::result::Result<Value, String> {
    if let (Value::Str(a), Value::Str(b), ArithOp::Add) = (l, r, op) {
        return Ok(Value::Str(format!("{a}{b}")));
    }
    if let (Value::Int(a), Value::Int(b)) = (l, r) {
        let (a, b) = (*a, *b);
        let result = match op {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
            ArithOp::Mul => a.checked_mul(b),
            ArithOp::Rem if b == 0 => return Err("modulo by zero".to_string()),
            ArithOp::Rem => a.checked_rem_euclid(b).map(|m| if b < 0 && m != 0 { m + b } else { m }),
            ArithOp::Div => None,
        };
        if let Some(v) = result {
            return Ok(Value::Int(v));
        }
    }
    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(format!("unsupported operands for arithmetic: '{l}' and '{r}'"));
    };
    match op {
        ArithOp::Add => Ok(Value::Float(a + b)),
        ArithOp::Sub => Ok(Value::Float(a - b)),
        ArithOp::Mul => Ok(Value::Float(a * b)),
        ArithOp::Div if b == 0.0 => Err("division by zero".to_string()),
        ArithOp::Div => Ok(Value::Float(a / b)),
        ArithOp::Rem if b == 0.0 => Err("modulo by zero".to_string()),
        ArithOp::Rem => Ok(Value::Float(a - b * (a / b).floor())),
    }
}

/// Which of the two expression forms a selector uses.
#[derive(Debug, Clone)]
enum Mode {
    Function { source: Expr, bound: Option<Expr> },
    Placeholder { template: String },
}

/// Per-row keep/drop decision over a select expression.
#[derive(Debug, Clone)]
pub struct RowSelector {
    mode: Mode,
}

impl RowSelector {
    /// Parse a select expression, detecting its form.
    pub fn parse(text: &str) -> Result<Self> {
        let code = code_only(text);
        if placeholder_regex().is_match(&code) {
            if function_regex().is_match(&code) {
                return Err(CampyonError::InvalidPredicateMode(
                    "#N placeholders cannot be mixed with c(), C(), D(), A() or r()".to_string(),
                ));
            }
            // Validate the syntax once with dummy values.
            predicate::parse(&rewrite_code(text, |code| {
                placeholder_regex().replace_all(code, "0").into_owned()
            }))?;
            return Ok(Self {
                mode: Mode::Placeholder {
                    template: text.to_string(),
                },
            });
        }

        let source = predicate::parse(text)?;
        Ok(Self {
            mode: Mode::Function {
                source,
                bound: None,
            },
        })
    }

    /// True for the `#N` placeholder form.
    pub fn is_placeholder_mode(&self) -> bool {
        matches!(self.mode, Mode::Placeholder { .. })
    }

    /// Resolve column references against a dataset. Called again whenever
    /// the pipeline reinitializes for a new file.
    pub fn bind(&mut self, field_count: usize, header: Option<&Header>) -> Result<()> {
        match &mut self.mode {
            Mode::Function { source, bound } => {
                let mut expr = source.clone();
                expr.bind(field_count, header)?;
                *bound = Some(expr);
            }
            Mode::Placeholder { template } => {
                for caps in placeholder_regex().captures_iter(&code_only(template)) {
                    let token = &caps[1];
                    let index: usize = token.parse().unwrap_or(usize::MAX);
                    if index < 1 || index > field_count {
                        return Err(CampyonError::ColumnOutOfRange {
                            index: token.parse().unwrap_or(i64::MAX),
                            field_count,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Decide whether a row survives. `line` is the 1-based input line,
    /// used for error reporting.
    pub fn should_keep(&self, fields: &[&str], line: usize) -> Result<bool> {
        let eval_error = |message: String| CampyonError::SelectionEval { line, message };
        match &self.mode {
            Mode::Function { bound, .. } => {
                let expr = bound
                    .as_ref()
                    .ok_or_else(|| eval_error("selector used before binding".to_string()))?;
                let env = RowEnv { fields };
                env.eval(expr).map(|e| e.truthy()).map_err(eval_error)
            }
            Mode::Placeholder { template } => {
                let text = substitute_placeholders(template, fields);
                let expr = predicate::parse(&text).map_err(|e| eval_error(e.to_string()))?;
                let env = RowEnv { fields };
                env.eval(&expr).map(|e| e.truthy()).map_err(eval_error)
            }
        }
    }
}

/// Replace each `#N` outside string literals with column N's value.
/// Unknown columns are left in place and fail to parse.
fn substitute_placeholders(template: &str, fields: &[&str]) -> String {
    rewrite_code(template, |code| {
        placeholder_regex()
            .replace_all(code, |caps: &regex::Captures<'_>| {
                let field = caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| fields.get(i));
                match field {
                    Some(field) => placeholder_literal(field),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    })
}

/// Numbers inline, everything else as a quoted string.
fn placeholder_literal(field: &str) -> String {
    match field.trim().parse::<f64>() {
        Ok(f) if f.is_finite() => f.to_string(),
        _ => format!("\"{}\"", field.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(text: &str, field_count: usize) -> RowSelector {
        let mut s = RowSelector::parse(text).unwrap();
        s.bind(field_count, None).unwrap();
        s
    }

    fn keep(s: &RowSelector, fields: &[&str]) -> bool {
        s.should_keep(fields, 1).unwrap()
    }

    #[test]
    fn test_column_and_string_comparison() {
        let s = selector(r#"c(1) > 3 and c(2) == "x""#, 2);
        assert!(keep(&s, &["5", "x"]));
        assert!(!keep(&s, &["2", "x"]));
        assert!(!keep(&s, &["5", "y"]));
    }

    #[test]
    fn test_conjunction_group() {
        let s = selector("C((1,2)) > 4", 2);
        assert!(!keep(&s, &["5", "3"]));
        assert!(keep(&s, &["5", "6"]));
    }

    #[test]
    fn test_disjunction_group() {
        let s = selector("D((1,2)) > 4", 2);
        assert!(keep(&s, &["5", "3"]));
        assert!(!keep(&s, &["1", "3"]));
    }

    #[test]
    fn test_any_column() {
        let s = selector("A() == 'needle'", 3);
        assert!(keep(&s, &["a", "needle", "c"]));
        assert!(!keep(&s, &["a", "b", "c"]));
    }

    #[test]
    fn test_regex_search() {
        let s = selector("r('^ab+c', 2) and not r('z', -1)", 3);
        assert!(keep(&s, &["x", "abbbc", "y"]));
        assert!(!keep(&s, &["x", "ac", "y"]));
        assert!(!keep(&s, &["x", "abc", "zz"]));
    }

    #[test]
    fn test_numeric_coercion_and_trimming() {
        let s = selector("c(1) == 10", 1);
        assert!(keep(&s, &[" 10 "]));
        assert!(keep(&s, &["10.0"]));
        // Numeric vs string compares display strings.
        let s = selector("c(1) == '10'", 1);
        assert!(keep(&s, &["10"]));
        // Numbers compare numerically, not lexicographically.
        let s = selector("c(1) < 9", 1);
        assert!(!keep(&s, &["10"]));
    }

    #[test]
    fn test_membership() {
        let s = selector("c(1) in [1, 2, 'three']", 1);
        assert!(keep(&s, &["2"]));
        assert!(keep(&s, &["three"]));
        assert!(!keep(&s, &["4"]));
        let s = selector("'ell' in c(1)", 1);
        assert!(keep(&s, &["hello"]));
        let s = selector("c(1) not in (1, 2)", 1);
        assert!(keep(&s, &["3"]));
    }

    #[test]
    fn test_arithmetic() {
        let s = selector("c(1) + c(2) == 7 and c(1) * 2 > c(2) and c(1) / 2 == 2.5", 2);
        assert!(keep(&s, &["5", "2"]));
        let s = selector("c(1) % 3 == 1", 1);
        assert!(keep(&s, &["7"]));
        assert!(keep(&s, &["-2"]));
    }

    #[test]
    fn test_named_columns() {
        let header = Header::from_fields(&["ID", "SCORE"]);
        let mut s = RowSelector::parse("c('SCORE') >= 50").unwrap();
        s.bind(2, Some(&header)).unwrap();
        assert!(keep(&s, &["1", "50"]));
        assert!(!keep(&s, &["2", "49"]));
    }

    #[test]
    fn test_eval_errors_are_fatal() {
        let s = selector("c(1) / 0 > 1", 1);
        match s.should_keep(&["4"], 7) {
            Err(CampyonError::SelectionEval { line, .. }) => assert_eq!(line, 7),
            other => panic!("Expected SelectionEval, got {other:?}"),
        }
        let s = selector("c(1) - 'a' > 1", 1);
        assert!(s.should_keep(&["4"], 1).is_err());
        let s = selector("C(1, 2) == D(1, 2)", 2);
        assert!(s.should_keep(&["1", "2"], 1).is_err());
    }

    #[test]
    fn test_unbound_selector_errors() {
        let s = RowSelector::parse("c(1) == 1").unwrap();
        assert!(matches!(
            s.should_keep(&["1"], 1),
            Err(CampyonError::SelectionEval { .. })
        ));
    }

    #[test]
    fn test_placeholder_mode() {
        let s = selector("#1 > 3 and #2 == \"x\"", 2);
        assert!(s.is_placeholder_mode());
        assert!(keep(&s, &["5", "x"]));
        assert!(!keep(&s, &["2", "x"]));
    }

    #[test]
    fn test_placeholder_quotes_and_high_indices() {
        let fields: Vec<String> = (1..=12).map(|i| format!("v{i}")).collect();
        let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        let s = selector("#12 == 'v12' and #1 == 'v1'", 12);
        assert!(keep(&s, &refs));

        let s = selector("#1 == 'say \"hi\"'", 1);
        assert!(keep(&s, &["say \"hi\""]));
    }

    #[test]
    fn test_placeholder_out_of_range() {
        let mut s = RowSelector::parse("#3 == 1").unwrap();
        assert!(matches!(
            s.bind(2, None),
            Err(CampyonError::ColumnOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn test_mixed_modes_rejected() {
        assert!(matches!(
            RowSelector::parse("#1 == 2 and c(2) == 3"),
            Err(CampyonError::InvalidPredicateMode(_))
        ));
    }

    #[test]
    fn test_parse_error_surfaces() {
        assert!(matches!(
            RowSelector::parse("c(1) >"),
            Err(CampyonError::SelectionParse { .. })
        ));
        assert!(matches!(
            RowSelector::parse("#1 >"),
            Err(CampyonError::SelectionParse { .. })
        ));
    }

    #[test]
    fn test_regex_sees_field_text() {
        let s = selector("r('^00', 1)", 1);
        assert!(keep(&s, &["007"]));
        let s = selector("r('^1\\.50$', 1)", 1);
        assert!(keep(&s, &[" 1.50 "]));
        let s = selector("r('e3', 1)", 1);
        assert!(keep(&s, &["1e3"]));
    }

    #[test]
    fn test_substring_membership_sees_field_text() {
        let s = selector("'0' in c(1)", 1);
        assert!(keep(&s, &["007"]));
        let s = selector("c(1) in 'x1.50y'", 1);
        assert!(keep(&s, &["1.50"]));
        let s = selector("'9' not in c(1)", 1);
        assert!(keep(&s, &["1.50"]));
        // Comparison still uses the numeric value.
        let s = selector("c(1) == 7", 1);
        assert!(keep(&s, &["007"]));
    }

    #[test]
    fn test_negating_smallest_integer() {
        let s = selector("-c(1) > 0", 1);
        assert!(keep(&s, &["-9223372036854775808"]));
        let s = selector("-c(1) == -5", 1);
        assert!(keep(&s, &["5"]));
    }

    #[test]
    fn test_hash_inside_literal_is_not_a_placeholder() {
        let s = selector("c(1) == '#1'", 1);
        assert!(!s.is_placeholder_mode());
        assert!(keep(&s, &["#1"]));
        assert!(!keep(&s, &["1"]));

        let s = selector("#1 == 'a c(b'", 1);
        assert!(s.is_placeholder_mode());
        assert!(keep(&s, &["a c(b"]));
    }

    #[test]
    fn test_placeholder_values_are_not_substituted_again() {
        let s = selector("#1 == '#2' and #2 == 3", 2);
        assert!(keep(&s, &["#2", "3"]));
    }

    #[test]
    fn test_chained_comparison() {
        let s = selector("1 < c(1) < 5", 1);
        assert!(keep(&s, &["3"]));
        assert!(!keep(&s, &["7"]));
    }
}
