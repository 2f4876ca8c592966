/// Expression evaluator - evaluates expressions against rows
///
/// Comparison and logic follow SQL three-valued semantics: a NULL operand
/// makes a comparison unknown (`Value::Null`), AND/OR combine under Kleene
/// logic, and WHERE keeps only rows whose predicate is exactly true.
/// String comparison and LIKE are case-sensitive.
use super::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{DbError, Result};
use crate::types::{SqlRow, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Compiled LIKE pattern for fast matching
#[derive(Debug, Clone)]
enum CompiledPattern {
    /// Exact match: "abc" (no wildcards)
    Exact(String),
    /// Prefix match: "abc%"
    Prefix(String),
    /// Suffix match: "%abc"
    Suffix(String),
    /// Contains match: "%abc%"
    Contains(String),
    /// Anything else: segment-by-segment matching
    Complex(Vec<PatternSegment>),
}

#[derive(Debug, Clone)]
enum PatternSegment {
    Literal(String),
    AnyChar,  // _
    AnyChars, // %
}

impl CompiledPattern {
    fn compile(pattern: &str) -> Self {
        // Fast path: no wildcards
        if !pattern.contains('%') && !pattern.contains('_') {
            return CompiledPattern::Exact(pattern.to_string());
        }

        // Fast path: prefix match "abc%"
        if pattern.ends_with('%')
            && !pattern[..pattern.len() - 1].contains('%')
            && !pattern.contains('_')
        {
            return CompiledPattern::Prefix(pattern[..pattern.len() - 1].to_string());
        }

        // Fast path: suffix match "%abc"
        if pattern.starts_with('%') && !pattern[1..].contains('%') && !pattern.contains('_') {
            return CompiledPattern::Suffix(pattern[1..].to_string());
        }

        // Fast path: contains match "%abc%"
        if pattern.starts_with('%')
            && pattern.ends_with('%')
            && pattern.len() > 2
            && !pattern[1..pattern.len() - 1].contains('%')
            && !pattern.contains('_')
        {
            return CompiledPattern::Contains(pattern[1..pattern.len() - 1].to_string());
        }

        // Complex pattern: parse into segments
        let mut segments = Vec::new();
        let mut current_literal = String::new();

        for ch in pattern.chars() {
            match ch {
                '%' => {
                    if !current_literal.is_empty() {
                        segments.push(PatternSegment::Literal(current_literal.clone()));
                        current_literal.clear();
                    }
                    segments.push(PatternSegment::AnyChars);
                }
                '_' => {
                    if !current_literal.is_empty() {
                        segments.push(PatternSegment::Literal(current_literal.clone()));
                        current_literal.clear();
                    }
                    segments.push(PatternSegment::AnyChar);
                }
                c => {
                    current_literal.push(c);
                }
            }
        }

        if !current_literal.is_empty() {
            segments.push(PatternSegment::Literal(current_literal));
        }

        CompiledPattern::Complex(segments)
    }

    /// Anchored match against the full value
    #[inline]
    fn matches(&self, text: &str) -> bool {
        match self {
            CompiledPattern::Exact(pattern) => text == pattern,
            CompiledPattern::Prefix(prefix) => text.starts_with(prefix),
            CompiledPattern::Suffix(suffix) => text.ends_with(suffix),
            CompiledPattern::Contains(substring) => text.contains(substring),
            CompiledPattern::Complex(segments) => {
                let chars: Vec<char> = text.chars().collect();
                Self::match_segments(&chars, segments, 0, 0)
            }
        }
    }

    fn match_segments(text: &[char], segments: &[PatternSegment], ti: usize, si: usize) -> bool {
        if si >= segments.len() {
            return ti >= text.len();
        }

        match &segments[si] {
            PatternSegment::AnyChars => {
                // Match zero or more characters
                if Self::match_segments(text, segments, ti, si + 1) {
                    return true;
                }
                if ti < text.len() && Self::match_segments(text, segments, ti + 1, si) {
                    return true;
                }
                false
            }
            PatternSegment::AnyChar => {
                if ti < text.len() {
                    Self::match_segments(text, segments, ti + 1, si + 1)
                } else {
                    false
                }
            }
            PatternSegment::Literal(literal) => {
                let chars: Vec<char> = literal.chars().collect();
                if ti + chars.len() > text.len() {
                    return false;
                }
                for (i, &c) in chars.iter().enumerate() {
                    if text[ti + i] != c {
                        return false;
                    }
                }
                Self::match_segments(text, segments, ti + chars.len(), si + 1)
            }
        }
    }
}

pub struct ExprEvaluator {
    /// Pattern cache: pattern string -> compiled pattern
    pattern_cache: RefCell<HashMap<String, CompiledPattern>>,
}

impl Default for ExprEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprEvaluator {
    pub fn new() -> Self {
        Self {
            pattern_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Evaluate an expression against a row
    pub fn eval(&self, expr: &Expr, row: &SqlRow) -> Result<Value> {
        match expr {
            Expr::Column(name) => self.resolve_column(name, row),

            Expr::Literal(val) => Ok(val.clone()),

            Expr::Wildcard => Err(DbError::Type(
                "'*' is only valid inside COUNT(*)".to_string(),
            )),

            Expr::BinaryOp { left, op, right } => {
                let left_val = self.eval(left, row)?;
                let right_val = self.eval(right, row)?;
                self.eval_binary_op(op, left_val, right_val)
            }

            Expr::UnaryOp { op, expr } => {
                let val = self.eval(expr, row)?;
                self.eval_unary_op(op, val)
            }

            Expr::FunctionCall { name, args, .. } => self.eval_function(name, args, row),

            Expr::In {
                expr,
                list,
                negated,
            } => {
                let val = self.eval(expr, row)?;
                let mut saw_unknown = val.is_null();
                let mut found = false;

                for item in list {
                    let item_val = self.eval(item, row)?;
                    match val.sql_eq(&item_val)? {
                        Some(true) => {
                            found = true;
                            break;
                        }
                        Some(false) => {}
                        None => saw_unknown = true,
                    }
                }

                let result = if found {
                    Some(true)
                } else if saw_unknown {
                    None
                } else {
                    Some(false)
                };
                Ok(bool3_to_value(negate3(result, *negated)))
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let val = self.eval(expr, row)?;
                let low_val = self.eval(low, row)?;
                let high_val = self.eval(high, row)?;

                // value >= low AND value <= high
                let ge = val.compare(&low_val)?.map(|o| o != Ordering::Less);
                let le = val.compare(&high_val)?.map(|o| o != Ordering::Greater);
                let in_range = and3(ge, le);
                Ok(bool3_to_value(negate3(in_range, *negated)))
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let val = self.eval(expr, row)?;
                let pattern_val = self.eval(pattern, row)?;

                let result = match (val, pattern_val) {
                    (Value::Null, _) | (_, Value::Null) => None,
                    (Value::Text(s), Value::Text(p)) => Some(self.like_match(&s, &p)),
                    (v, p) => {
                        return Err(DbError::Type(format!(
                            "LIKE requires text operands, got {} and {}",
                            v.kind_name(),
                            p.kind_name()
                        )));
                    }
                };
                Ok(bool3_to_value(negate3(result, *negated)))
            }

            Expr::IsNull { expr, negated } => {
                let val = self.eval(expr, row)?;
                let is_null = val.is_null();
                Ok(Value::Bool(if *negated { !is_null } else { is_null }))
            }
        }
    }

    /// Whether a predicate holds for a row (unknown filters the row out)
    pub fn eval_predicate(&self, expr: &Expr, row: &SqlRow) -> Result<bool> {
        Ok(matches!(self.eval(expr, row)?, Value::Bool(true)))
    }

    /// Column lookup: exact key, then case-insensitive, then qualified
    /// suffix (`x` matches `t.x`)
    fn resolve_column(&self, name: &str, row: &SqlRow) -> Result<Value> {
        if let Some(val) = row.get(name) {
            return Ok(val.clone());
        }

        let name_lower = name.to_lowercase();
        for (key, value) in row.iter() {
            if key.to_lowercase() == name_lower {
                return Ok(value.clone());
            }
        }

        if !name.contains('.') {
            let suffix = format!(".{}", name_lower);
            for (key, value) in row.iter() {
                if key.to_lowercase().ends_with(&suffix) {
                    return Ok(value.clone());
                }
            }
        }

        Err(DbError::Schema(format!("Column '{}' not found", name)))
    }

    fn eval_binary_op(&self, op: &BinaryOperator, left: Value, right: Value) -> Result<Value> {
        match op {
            BinaryOperator::Eq => cmp_result(&left, &right, |o| o == Ordering::Equal),
            BinaryOperator::Ne => cmp_result(&left, &right, |o| o != Ordering::Equal),
            BinaryOperator::Lt => cmp_result(&left, &right, |o| o == Ordering::Less),
            BinaryOperator::Gt => cmp_result(&left, &right, |o| o == Ordering::Greater),
            BinaryOperator::Le => cmp_result(&left, &right, |o| o != Ordering::Greater),
            BinaryOperator::Ge => cmp_result(&left, &right, |o| o != Ordering::Less),

            BinaryOperator::And => {
                let l = value_to_bool3(&left)?;
                let r = value_to_bool3(&right)?;
                Ok(bool3_to_value(and3(l, r)))
            }
            BinaryOperator::Or => {
                let l = value_to_bool3(&left)?;
                let r = value_to_bool3(&right)?;
                Ok(bool3_to_value(or3(l, r)))
            }

            BinaryOperator::Add => numeric_op(left, right, "+", |a, b| a.wrapping_add(b), |a, b| a + b),
            BinaryOperator::Sub => numeric_op(left, right, "-", |a, b| a.wrapping_sub(b), |a, b| a - b),
            BinaryOperator::Mul => numeric_op(left, right, "*", |a, b| a.wrapping_mul(b), |a, b| a * b),
            BinaryOperator::Div => divide(left, right),
        }
    }

    fn eval_unary_op(&self, op: &UnaryOperator, val: Value) -> Result<Value> {
        match op {
            UnaryOperator::Not => {
                let b = value_to_bool3(&val)?;
                Ok(bool3_to_value(b.map(|v| !v)))
            }
            UnaryOperator::Minus => match val {
                Value::Null => Ok(Value::Null),
                Value::Integer(i) => Ok(Value::Integer(i.wrapping_neg())),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(DbError::Type(format!(
                    "Cannot negate {} value",
                    other.kind_name()
                ))),
            },
            UnaryOperator::Plus => match val {
                Value::Null | Value::Integer(_) | Value::Float(_) => Ok(val),
                other => Err(DbError::Type(format!(
                    "Unary '+' requires a numeric value, got {}",
                    other.kind_name()
                ))),
            },
        }
    }

    fn eval_function(&self, name: &str, args: &[Expr], row: &SqlRow) -> Result<Value> {
        match name.to_lowercase().as_str() {
            // Aggregates are computed by the executor over row groups
            "count" | "sum" | "avg" | "min" | "max" => Err(DbError::Type(format!(
                "Aggregate function {} is not allowed here",
                name.to_uppercase()
            ))),

            "upper" => {
                let val = self.single_arg(name, args, row)?;
                match val {
                    Value::Null => Ok(Value::Null),
                    Value::Text(s) => Ok(Value::Text(s.to_uppercase())),
                    other => Err(DbError::Type(format!(
                        "UPPER() requires a text argument, got {}",
                        other.kind_name()
                    ))),
                }
            }

            "lower" => {
                let val = self.single_arg(name, args, row)?;
                match val {
                    Value::Null => Ok(Value::Null),
                    Value::Text(s) => Ok(Value::Text(s.to_lowercase())),
                    other => Err(DbError::Type(format!(
                        "LOWER() requires a text argument, got {}",
                        other.kind_name()
                    ))),
                }
            }

            "length" => {
                let val = self.single_arg(name, args, row)?;
                match val {
                    Value::Null => Ok(Value::Null),
                    Value::Text(s) => Ok(Value::Integer(s.chars().count() as i64)),
                    other => Err(DbError::Type(format!(
                        "LENGTH() requires a text argument, got {}",
                        other.kind_name()
                    ))),
                }
            }

            "abs" => {
                let val = self.single_arg(name, args, row)?;
                match val {
                    Value::Null => Ok(Value::Null),
                    Value::Integer(i) => Ok(Value::Integer(i.wrapping_abs())),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => Err(DbError::Type(format!(
                        "ABS() requires a numeric argument, got {}",
                        other.kind_name()
                    ))),
                }
            }

            _ => Err(DbError::Schema(format!("Unknown function '{}'", name))),
        }
    }

    fn single_arg(&self, name: &str, args: &[Expr], row: &SqlRow) -> Result<Value> {
        if args.len() != 1 {
            return Err(DbError::Type(format!(
                "{}() takes exactly one argument",
                name.to_uppercase()
            )));
        }
        self.eval(&args[0], row)
    }

    fn like_match(&self, text: &str, pattern: &str) -> bool {
        let mut cache = self.pattern_cache.borrow_mut();
        let compiled = cache
            .entry(pattern.to_string())
            .or_insert_with(|| CompiledPattern::compile(pattern));
        compiled.matches(text)
    }
}

// ---------------------------------------------------------------------------
// Three-valued logic helpers
// ---------------------------------------------------------------------------

fn cmp_result(left: &Value, right: &Value, test: fn(Ordering) -> bool) -> Result<Value> {
    Ok(bool3_to_value(left.compare(right)?.map(test)))
}

fn value_to_bool3(value: &Value) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(DbError::Type(format!(
            "Expected a boolean condition, got {}",
            other.kind_name()
        ))),
    }
}

fn bool3_to_value(b: Option<bool>) -> Value {
    match b {
        Some(v) => Value::Bool(v),
        None => Value::Null,
    }
}

fn and3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn negate3(b: Option<bool>, negated: bool) -> Option<bool> {
    if negated {
        b.map(|v| !v)
    } else {
        b
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

fn numeric_op(
    left: Value,
    right: Value,
    op: &str,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(int_op(a, b))),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(a, b))),
        (Value::Integer(a), Value::Float(b)) => Ok(Value::Float(float_op(a as f64, b))),
        (Value::Float(a), Value::Integer(b)) => Ok(Value::Float(float_op(a, b as f64))),
        (a, b) => Err(DbError::Type(format!(
            "Cannot apply '{}' to {} and {}",
            op,
            a.kind_name(),
            b.kind_name()
        ))),
    }
}

/// Division always yields a float; dividing by zero yields NULL
fn divide(left: Value, right: Value) -> Result<Value> {
    let (a, b) = match (&left, &right) {
        (Value::Null, _) | (_, Value::Null) => return Ok(Value::Null),
        (Value::Integer(a), Value::Integer(b)) => (*a as f64, *b as f64),
        (Value::Float(a), Value::Float(b)) => (*a, *b),
        (Value::Integer(a), Value::Float(b)) => (*a as f64, *b),
        (Value::Float(a), Value::Integer(b)) => (*a, *b as f64),
        (a, b) => {
            return Err(DbError::Type(format!(
                "Cannot apply '/' to {} and {}",
                a.kind_name(),
                b.kind_name()
            )));
        }
    };

    if b == 0.0 {
        return Ok(Value::Null);
    }
    Ok(Value::Float(a / b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::lexer::Lexer;
    use crate::sql::parser::Parser;
    use crate::sql::Statement;

    fn eval_where(predicate: &str, row: &SqlRow) -> Result<Value> {
        let sql = format!("SELECT * FROM t WHERE {}", predicate);
        let tokens = Lexer::new(&sql).tokenize().unwrap();
        let stmt = Parser::new(tokens).parse().unwrap();
        let expr = match stmt {
            Statement::Select(s) => s.where_clause.unwrap(),
            _ => unreachable!(),
        };
        ExprEvaluator::new().eval(&expr, row)
    }

    fn row(pairs: &[(&str, Value)]) -> SqlRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_null_comparison_is_unknown() {
        let r = row(&[("x", Value::Null)]);
        assert_eq!(eval_where("x = 1", &r).unwrap(), Value::Null);
        assert_eq!(eval_where("x != 1", &r).unwrap(), Value::Null);
        assert_eq!(eval_where("x IS NULL", &r).unwrap(), Value::Bool(true));
        assert_eq!(eval_where("x IS NOT NULL", &r).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_kleene_and_or() {
        let r = row(&[("x", Value::Null), ("y", Value::Integer(1))]);
        // false AND unknown = false
        assert_eq!(eval_where("y = 2 AND x = 1", &r).unwrap(), Value::Bool(false));
        // true AND unknown = unknown
        assert_eq!(eval_where("y = 1 AND x = 1", &r).unwrap(), Value::Null);
        // true OR unknown = true
        assert_eq!(eval_where("y = 1 OR x = 1", &r).unwrap(), Value::Bool(true));
        // false OR unknown = unknown
        assert_eq!(eval_where("y = 2 OR x = 1", &r).unwrap(), Value::Null);
    }

    #[test]
    fn test_not_propagates_unknown() {
        let r = row(&[("x", Value::Null)]);
        assert_eq!(eval_where("NOT x = 1", &r).unwrap(), Value::Null);
    }

    #[test]
    fn test_in_semantics() {
        let r = row(&[("x", Value::Integer(2))]);
        assert_eq!(eval_where("x IN (1, 2, 3)", &r).unwrap(), Value::Bool(true));
        assert_eq!(eval_where("x IN (4, 5)", &r).unwrap(), Value::Bool(false));
        // No match but a NULL in the list -> unknown
        assert_eq!(eval_where("x IN (4, NULL)", &r).unwrap(), Value::Null);
        assert_eq!(
            eval_where("x NOT IN (1, 2, 3)", &r).unwrap(),
            Value::Bool(false)
        );

        let rn = row(&[("x", Value::Null)]);
        assert_eq!(eval_where("x IN (1, 2)", &rn).unwrap(), Value::Null);
    }

    #[test]
    fn test_between() {
        let r = row(&[("x", Value::Float(25.0))]);
        assert_eq!(
            eval_where("x BETWEEN 20 AND 40", &r).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_where("x NOT BETWEEN 20 AND 40", &r).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            eval_where("x BETWEEN 30 AND 40", &r).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_like_patterns() {
        let r = row(&[("name", Value::Text("Alice".into()))]);
        assert_eq!(eval_where("name LIKE 'A%'", &r).unwrap(), Value::Bool(true));
        assert_eq!(
            eval_where("name LIKE '%ice'", &r).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_where("name LIKE '%li%'", &r).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_where("name LIKE 'A_ice'", &r).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_where("name LIKE 'a%'", &r).unwrap(),
            Value::Bool(false),
            "LIKE is case-sensitive"
        );
        assert_eq!(
            eval_where("name LIKE 'Alice'", &r).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_where("name NOT LIKE 'B%'", &r).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_like_empty_percent_matches_empty() {
        let r = row(&[("s", Value::Text("".into()))]);
        assert_eq!(eval_where("s LIKE '%'", &r).unwrap(), Value::Bool(true));
        assert_eq!(eval_where("s LIKE '_'", &r).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_arithmetic() {
        let r = row(&[("a", Value::Integer(7)), ("b", Value::Float(2.0))]);
        assert_eq!(eval_where("a + 1 = 8", &r).unwrap(), Value::Bool(true));
        assert_eq!(eval_where("a * b = 14", &r).unwrap(), Value::Bool(true));
        // Division yields float
        assert_eq!(eval_where("a / 2 = 3.5", &r).unwrap(), Value::Bool(true));
        // Division by zero yields NULL
        assert_eq!(eval_where("a / 0 = 1", &r).unwrap(), Value::Null);
        // NULL propagates through arithmetic
        let rn = row(&[("a", Value::Null)]);
        assert_eq!(eval_where("a + 1 = 2", &rn).unwrap(), Value::Null);
    }

    #[test]
    fn test_integer_overflow_wraps() {
        let r = row(&[("a", Value::Integer(i64::MAX))]);
        let v = eval_where("a + 1 < 0", &r).unwrap();
        assert_eq!(v, Value::Bool(true));
    }

    #[test]
    fn test_cross_kind_comparison_fails() {
        let r = row(&[("a", Value::Integer(1))]);
        assert!(eval_where("a = 'one'", &r).is_err());
    }

    #[test]
    fn test_qualified_column_resolution() {
        let r = row(&[("u.id", Value::Integer(5))]);
        assert_eq!(eval_where("u.id = 5", &r).unwrap(), Value::Bool(true));
        // Bare name resolves through the qualifier
        assert_eq!(eval_where("id = 5", &r).unwrap(), Value::Bool(true));
        // Case-insensitive
        assert_eq!(eval_where("ID = 5", &r).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_unknown_column_is_schema_error() {
        let r = row(&[("a", Value::Integer(1))]);
        assert!(matches!(
            eval_where("ghost = 1", &r),
            Err(DbError::Schema(_))
        ));
    }

    #[test]
    fn test_scalar_functions() {
        let r = row(&[("s", Value::Text("Abc".into())), ("n", Value::Integer(-4))]);
        assert_eq!(
            eval_where("UPPER(s) = 'ABC'", &r).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_where("LOWER(s) = 'abc'", &r).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(eval_where("LENGTH(s) = 3", &r).unwrap(), Value::Bool(true));
        assert_eq!(eval_where("ABS(n) = 4", &r).unwrap(), Value::Bool(true));
    }
}
