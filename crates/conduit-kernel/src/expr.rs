//! Sandboxed expression evaluation for conditions, keys and `Eval` bodies.
//!
//! Expressions are evaluated over a single context variable `input` plus a
//! fixed set of functions (`len`, `any`, `all`, `min`, `max`, `abs`, `str`).
//! Supports:
//! - Literals: ints, floats, strings, `true`/`false`/`null`, lists
//! - Access chains: `input.user.name`, `input["key"]`, `input[0]`, `input[-1]`
//! - Arithmetic: `+`, `-`, `*`, `/`, `%` (ints stay ints except `/`)
//! - Comparisons: `==`, `!=`, `<`, `<=`, `>`, `>=`, `in`
//! - Boolean: `and`, `or`, `not`
//!
//! Does NOT support statements, loops, assignments or imports. Identifiers
//! with a leading underscore are rejected at parse time, which closes off
//! reserved-name probing before evaluation ever runs.

use conduit_types::value::{as_f64, compare, is_truthy, to_display_string, type_name};
use conduit_types::{ConduitError, ConduitResult, Value};
use serde_json::json;

/// A compiled expression, ready for repeated evaluation.
#[derive(Debug, Clone)]
pub struct Program {
    source: String,
    root: Expr,
}

impl Program {
    /// Parse and compile an expression.
    pub fn compile(source: &str) -> ConduitResult<Program> {
        let mut parser = Parser::new(source);
        let root = parser.parse_expr()?;
        parser.expect_end()?;
        Ok(Program {
            source: source.to_string(),
            root,
        })
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against an item bound as `input`.
    pub fn eval(&self, input: &Value) -> ConduitResult<Value> {
        eval_node(&self.root, input)
    }

    /// Evaluate and reduce to a boolean via truthiness.
    pub fn eval_bool(&self, input: &Value) -> ConduitResult<bool> {
        Ok(is_truthy(&self.eval(input)?))
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Input,
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    Call(Func, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Len,
    Any,
    All,
    Min,
    Max,
    Abs,
    Str,
}

impl Func {
    fn from_name(name: &str) -> Option<Func> {
        match name {
            "len" => Some(Func::Len),
            "any" => Some(Func::Any),
            "all" => Some(Func::All),
            "min" => Some(Func::Min),
            "max" => Some(Func::Max),
            "abs" => Some(Func::Abs),
            "str" => Some(Func::Str),
            _ => None,
        }
    }
}

fn err(msg: impl Into<String>) -> ConduitError {
    ConduitError::Expression(msg.into())
}

// ============================================================
// Parser
// ============================================================

/// Recursive descent parser over the raw source bytes.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.input[self.pos..].chars().next() {
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.input[self.pos..].chars().next()
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.input[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    /// Consume a keyword: like `eat` but the next char must not continue an
    /// identifier (so `international` is not `in ternational`).
    fn eat_keyword(&mut self, word: &str) -> bool {
        self.skip_whitespace();
        let rest = &self.input[self.pos..];
        if rest.starts_with(word) {
            let after = rest[word.len()..].chars().next();
            if !after.is_some_and(|c| c.is_alphanumeric() || c == '_') {
                self.pos += word.len();
                return true;
            }
        }
        false
    }

    fn expect(&mut self, token: &str) -> ConduitResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(err(format!(
                "expected '{}' at position {} in '{}'",
                token, self.pos, self.input
            )))
        }
    }

    fn expect_end(&mut self) -> ConduitResult<()> {
        self.skip_whitespace();
        if self.pos < self.input.len() {
            Err(err(format!(
                "unexpected trailing input at position {} in '{}'",
                self.pos, self.input
            )))
        } else {
            Ok(())
        }
    }

    fn parse_expr(&mut self) -> ConduitResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ConduitResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Binary(Box::new(left), BinOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ConduitResult<Expr> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Expr::Binary(Box::new(left), BinOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ConduitResult<Expr> {
        if self.eat_keyword("not") {
            let inner = self.parse_not()?;
            Ok(Expr::Not(Box::new(inner)))
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> ConduitResult<Expr> {
        let left = self.parse_additive()?;
        // Two-char operators first so `<=` does not lex as `<` `=`.
        let op = if self.eat("==") {
            BinOp::Eq
        } else if self.eat("!=") {
            BinOp::Ne
        } else if self.eat("<=") {
            BinOp::Le
        } else if self.eat(">=") {
            BinOp::Ge
        } else if self.eat("<") {
            BinOp::Lt
        } else if self.eat(">") {
            BinOp::Gt
        } else if self.eat_keyword("in") {
            BinOp::In
        } else {
            return Ok(left);
        };
        let right = self.parse_additive()?;
        Ok(Expr::Binary(Box::new(left), op, Box::new(right)))
    }

    fn parse_additive(&mut self) -> ConduitResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            if self.eat("+") {
                let right = self.parse_term()?;
                left = Expr::Binary(Box::new(left), BinOp::Add, Box::new(right));
            } else if self.eat("-") {
                let right = self.parse_term()?;
                left = Expr::Binary(Box::new(left), BinOp::Sub, Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_term(&mut self) -> ConduitResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            if self.eat("*") {
                let right = self.parse_unary()?;
                left = Expr::Binary(Box::new(left), BinOp::Mul, Box::new(right));
            } else if self.eat("/") {
                let right = self.parse_unary()?;
                left = Expr::Binary(Box::new(left), BinOp::Div, Box::new(right));
            } else if self.eat("%") {
                let right = self.parse_unary()?;
                left = Expr::Binary(Box::new(left), BinOp::Mod, Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_unary(&mut self) -> ConduitResult<Expr> {
        if self.eat("-") {
            let inner = self.parse_unary()?;
            Ok(Expr::Neg(Box::new(inner)))
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> ConduitResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(".") {
                let name = self.parse_identifier()?;
                expr = Expr::Attr(Box::new(expr), name);
            } else if self.eat("[") {
                let index = self.parse_expr()?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> ConduitResult<Expr> {
        let ch = self
            .peek()
            .ok_or_else(|| err(format!("unexpected end of expression '{}'", self.input)))?;

        if ch == '(' {
            self.expect("(")?;
            let inner = self.parse_expr()?;
            self.expect(")")?;
            return Ok(inner);
        }
        if ch == '[' {
            return self.parse_list();
        }
        if ch == '\'' || ch == '"' {
            return self.parse_string(ch);
        }
        if ch.is_ascii_digit() {
            return self.parse_number();
        }
        if ch.is_alphabetic() || ch == '_' {
            let name = self.parse_identifier()?;
            return self.parse_name(name);
        }
        Err(err(format!(
            "unexpected character '{}' at position {} in '{}'",
            ch, self.pos, self.input
        )))
    }

    fn parse_list(&mut self) -> ConduitResult<Expr> {
        self.expect("[")?;
        let mut items = Vec::new();
        if !self.eat("]") {
            loop {
                items.push(self.parse_expr()?);
                if self.eat("]") {
                    break;
                }
                self.expect(",")?;
            }
        }
        Ok(Expr::List(items))
    }

    fn parse_string(&mut self, quote: char) -> ConduitResult<Expr> {
        self.skip_whitespace();
        self.pos += 1; // opening quote
        let start = self.pos;
        while let Some(ch) = self.input[self.pos..].chars().next() {
            if ch == quote {
                let text = self.input[start..self.pos].to_string();
                self.pos += 1;
                return Ok(Expr::Literal(Value::String(text)));
            }
            self.pos += ch.len_utf8();
        }
        Err(err(format!("unterminated string in '{}'", self.input)))
    }

    fn parse_number(&mut self) -> ConduitResult<Expr> {
        self.skip_whitespace();
        let start = self.pos;
        let mut is_float = false;
        while let Some(ch) = self.input[self.pos..].chars().next() {
            if ch.is_ascii_digit() {
                self.pos += 1;
            } else if ch == '.' && !is_float {
                // A digit must follow, otherwise this is attribute access
                // on an integer literal (which we reject below anyway).
                let next = self.input[self.pos + 1..].chars().next();
                if next.is_some_and(|c| c.is_ascii_digit()) {
                    is_float = true;
                    self.pos += 1;
                } else {
                    break;
                }
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        if is_float {
            let f: f64 = text
                .parse()
                .map_err(|_| err(format!("invalid number '{text}'")))?;
            Ok(Expr::Literal(json!(f)))
        } else {
            let i: i64 = text
                .parse()
                .map_err(|_| err(format!("invalid number '{text}'")))?;
            Ok(Expr::Literal(json!(i)))
        }
    }

    fn parse_identifier(&mut self) -> ConduitResult<String> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.input[self.pos..].chars().next() {
            if ch.is_alphanumeric() || ch == '_' {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(err(format!(
                "expected identifier at position {} in '{}'",
                self.pos, self.input
            )));
        }
        let name = &self.input[start..self.pos];
        if name.starts_with('_') {
            return Err(err(format!("reserved name '{name}' is not allowed")));
        }
        Ok(name.to_string())
    }

    fn parse_name(&mut self, name: String) -> ConduitResult<Expr> {
        match name.as_str() {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" | "None" => return Ok(Expr::Literal(Value::Null)),
            "input" => return Ok(Expr::Input),
            _ => {}
        }
        if let Some(func) = Func::from_name(&name) {
            self.expect("(")?;
            let mut args = Vec::new();
            if !self.eat(")") {
                loop {
                    args.push(self.parse_expr()?);
                    if self.eat(")") {
                        break;
                    }
                    self.expect(",")?;
                }
            }
            return Ok(Expr::Call(func, args));
        }
        Err(err(format!("name '{name}' is not defined")))
    }
}

// ============================================================
// Evaluation
// ============================================================

fn eval_node(expr: &Expr, input: &Value) -> ConduitResult<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::List(items) => {
            let values = items
                .iter()
                .map(|e| eval_node(e, input))
                .collect::<ConduitResult<Vec<_>>>()?;
            Ok(Value::Array(values))
        }
        Expr::Input => Ok(input.clone()),
        Expr::Attr(base, name) => {
            let value = eval_node(base, input)?;
            match &value {
                Value::Object(map) => Ok(map.get(name.as_str()).cloned().unwrap_or(Value::Null)),
                other => Err(err(format!(
                    "cannot access '{}' on {}",
                    name,
                    type_name(other)
                ))),
            }
        }
        Expr::Index(base, index) => {
            let value = eval_node(base, input)?;
            let key = eval_node(index, input)?;
            index_value(&value, &key)
        }
        Expr::Neg(inner) => {
            let value = eval_node(inner, input)?;
            match &value {
                Value::Number(n) if !n.is_f64() => Ok(json!(-n.as_i64().unwrap_or(0))),
                Value::Number(n) => Ok(json!(-n.as_f64().unwrap_or(0.0))),
                other => Err(err(format!("cannot negate {}", type_name(other)))),
            }
        }
        Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&eval_node(inner, input)?))),
        Expr::Binary(left, op, right) => eval_binary(left, *op, right, input),
        Expr::Call(func, args) => eval_call(*func, args, input),
    }
}

fn index_value(value: &Value, key: &Value) -> ConduitResult<Value> {
    match (value, key) {
        (Value::Object(map), Value::String(k)) => {
            Ok(map.get(k.as_str()).cloned().unwrap_or(Value::Null))
        }
        (Value::Array(items), Value::Number(n)) => {
            let i = n
                .as_i64()
                .ok_or_else(|| err("array index must be an integer"))?;
            let idx = if i < 0 {
                items
                    .len()
                    .checked_sub(i.unsigned_abs() as usize)
                    .ok_or_else(|| err(format!("index {i} out of range")))?
            } else {
                i as usize
            };
            items
                .get(idx)
                .cloned()
                .ok_or_else(|| err(format!("index {i} out of range")))
        }
        (other, key) => Err(err(format!(
            "cannot index {} with {}",
            type_name(other),
            type_name(key)
        ))),
    }
}

fn eval_binary(left: &Expr, op: BinOp, right: &Expr, input: &Value) -> ConduitResult<Value> {
    // Short-circuit boolean operators before evaluating the right side.
    match op {
        BinOp::And => {
            let l = eval_node(left, input)?;
            return if is_truthy(&l) { eval_node(right, input) } else { Ok(l) };
        }
        BinOp::Or => {
            let l = eval_node(left, input)?;
            return if is_truthy(&l) { Ok(l) } else { eval_node(right, input) };
        }
        _ => {}
    }

    let l = eval_node(left, input)?;
    let r = eval_node(right, input)?;
    match op {
        BinOp::Add => arith(&l, &r, "+", |a, b| a + b, i64::checked_add),
        BinOp::Sub => arith(&l, &r, "-", |a, b| a - b, i64::checked_sub),
        BinOp::Mul => arith(&l, &r, "*", |a, b| a * b, i64::checked_mul),
        BinOp::Div => {
            let (a, b) = numeric_pair(&l, &r, "/")?;
            if b == 0.0 {
                return Err(err("division by zero"));
            }
            Ok(json!(a / b))
        }
        BinOp::Mod => {
            if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
                if b == 0 {
                    return Err(err("modulo by zero"));
                }
                return Ok(json!(a.rem_euclid(b)));
            }
            let (a, b) = numeric_pair(&l, &r, "%")?;
            if b == 0.0 {
                return Err(err("modulo by zero"));
            }
            Ok(json!(a % b))
        }
        BinOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinOp::Lt => ordered(&l, &r, "<").map(|o| Value::Bool(o == std::cmp::Ordering::Less)),
        BinOp::Le => ordered(&l, &r, "<=").map(|o| Value::Bool(o != std::cmp::Ordering::Greater)),
        BinOp::Gt => ordered(&l, &r, ">").map(|o| Value::Bool(o == std::cmp::Ordering::Greater)),
        BinOp::Ge => ordered(&l, &r, ">=").map(|o| Value::Bool(o != std::cmp::Ordering::Less)),
        BinOp::In => contains(&r, &l),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

/// Int-preserving arithmetic: both ints stay int (falling back to float on
/// overflow); string `+` concatenates.
fn arith(
    l: &Value,
    r: &Value,
    op: &str,
    float_op: fn(f64, f64) -> f64,
    int_op: fn(i64, i64) -> Option<i64>,
) -> ConduitResult<Value> {
    if op == "+" {
        if let (Value::String(a), Value::String(b)) = (l, r) {
            return Ok(Value::String(format!("{a}{b}")));
        }
        if let (Value::Array(a), Value::Array(b)) = (l, r) {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            return Ok(Value::Array(out));
        }
    }
    if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
        if let Some(result) = int_op(a, b) {
            return Ok(json!(result));
        }
    }
    let (a, b) = numeric_pair(l, r, op)?;
    Ok(json!(float_op(a, b)))
}

fn numeric_pair(l: &Value, r: &Value, op: &str) -> ConduitResult<(f64, f64)> {
    match (as_f64(l), as_f64(r)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(err(format!(
            "unsupported operands for '{}': {} and {}",
            op,
            type_name(l),
            type_name(r)
        ))),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    // Numeric equality crosses the int/float divide: 1 == 1.0.
    if let (Some(a), Some(b)) = (as_f64(l), as_f64(r)) {
        return a == b;
    }
    l == r
}

fn ordered(l: &Value, r: &Value, op: &str) -> ConduitResult<std::cmp::Ordering> {
    match (l, r) {
        (Value::Number(_), Value::Number(_))
        | (Value::String(_), Value::String(_))
        | (Value::Array(_), Value::Array(_))
        | (Value::Bool(_), Value::Bool(_)) => Ok(compare(l, r)),
        _ => Err(err(format!(
            "cannot compare {} {} {}",
            type_name(l),
            op,
            type_name(r)
        ))),
    }
}

fn contains(haystack: &Value, needle: &Value) -> ConduitResult<Value> {
    let found = match haystack {
        Value::Array(items) => items.iter().any(|v| values_equal(v, needle)),
        Value::String(s) => match needle {
            Value::String(sub) => s.contains(sub.as_str()),
            other => return Err(err(format!("cannot search string for {}", type_name(other)))),
        },
        Value::Object(map) => match needle {
            Value::String(key) => map.contains_key(key.as_str()),
            other => return Err(err(format!("cannot search object for {}", type_name(other)))),
        },
        other => return Err(err(format!("'{}' is not iterable", type_name(other)))),
    };
    Ok(Value::Bool(found))
}

fn eval_call(func: Func, args: &[Expr], input: &Value) -> ConduitResult<Value> {
    let values = args
        .iter()
        .map(|e| eval_node(e, input))
        .collect::<ConduitResult<Vec<_>>>()?;

    let arity = |n: usize| -> ConduitResult<()> {
        if values.len() == n {
            Ok(())
        } else {
            Err(err(format!(
                "{:?} expects {} argument(s), got {}",
                func,
                n,
                values.len()
            )))
        }
    };

    match func {
        Func::Len => {
            arity(1)?;
            let n = match &values[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => return Err(err(format!("{} has no length", type_name(other)))),
            };
            Ok(json!(n))
        }
        Func::Any => {
            arity(1)?;
            let items = expect_array(&values[0], "any")?;
            Ok(Value::Bool(items.iter().any(is_truthy)))
        }
        Func::All => {
            arity(1)?;
            let items = expect_array(&values[0], "all")?;
            Ok(Value::Bool(items.iter().all(is_truthy)))
        }
        Func::Min | Func::Max => {
            let items: Vec<Value> = if values.len() == 1 {
                expect_array(&values[0], "min/max")?.clone()
            } else {
                values.clone()
            };
            if items.is_empty() {
                return Err(err("min/max of empty sequence"));
            }
            let mut best = items[0].clone();
            for item in &items[1..] {
                let keep = compare(item, &best);
                let better = if func == Func::Min {
                    keep == std::cmp::Ordering::Less
                } else {
                    keep == std::cmp::Ordering::Greater
                };
                if better {
                    best = item.clone();
                }
            }
            Ok(best)
        }
        Func::Abs => {
            arity(1)?;
            match &values[0] {
                Value::Number(n) if !n.is_f64() => Ok(json!(n.as_i64().unwrap_or(0).abs())),
                Value::Number(n) => Ok(json!(n.as_f64().unwrap_or(0.0).abs())),
                other => Err(err(format!("cannot take abs of {}", type_name(other)))),
            }
        }
        Func::Str => {
            arity(1)?;
            Ok(Value::String(to_display_string(&values[0])))
        }
    }
}

fn expect_array<'v>(value: &'v Value, what: &str) -> ConduitResult<&'v Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(err(format!("{} expects an array, got {}", what, type_name(other)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str, input: Value) -> Value {
        Program::compile(src).unwrap().eval(&input).unwrap()
    }

    #[test]
    fn literals() {
        assert_eq!(eval("42", json!(null)), json!(42));
        assert_eq!(eval("3.5", json!(null)), json!(3.5));
        assert_eq!(eval("'hi'", json!(null)), json!("hi"));
        assert_eq!(eval("\"hi\"", json!(null)), json!("hi"));
        assert_eq!(eval("true", json!(null)), json!(true));
        assert_eq!(eval("null", json!(null)), json!(null));
        assert_eq!(eval("[1, 2, 3]", json!(null)), json!([1, 2, 3]));
    }

    #[test]
    fn attribute_and_index_access() {
        let item = json!({"a": {"b": [10, 20]}, "c": "x"});
        assert_eq!(eval("input.a.b[1]", item.clone()), json!(20));
        assert_eq!(eval("input['c']", item.clone()), json!("x"));
        assert_eq!(eval("input.a.b[-1]", item.clone()), json!(20));
        // Missing object keys resolve to null rather than erroring, so
        // filters can probe optional fields.
        assert_eq!(eval("input.missing", item), json!(null));
    }

    #[test]
    fn arithmetic_preserves_ints() {
        assert_eq!(eval("input.x * 2", json!({"x": 10})), json!(20));
        assert_eq!(eval("input.x * input.x", json!({"x": 10})), json!(100));
        assert_eq!(eval("7 % 3", json!(null)), json!(1));
        assert_eq!(eval("10 / 4", json!(null)), json!(2.5));
        assert_eq!(eval("1 + 2.5", json!(null)), json!(3.5));
        assert_eq!(eval("'a' + 'b'", json!(null)), json!("ab"));
    }

    #[test]
    fn comparisons_and_booleans() {
        assert_eq!(eval("input.a >= 2", json!({"a": 2})), json!(true));
        assert_eq!(eval("input.a >= 2", json!({"a": 1})), json!(false));
        assert_eq!(eval("1 < 2 and 2 < 3", json!(null)), json!(true));
        assert_eq!(eval("not (1 == 1)", json!(null)), json!(false));
        assert_eq!(eval("1 == 1.0", json!(null)), json!(true));
        assert_eq!(eval("'b' in 'abc'", json!(null)), json!(true));
        assert_eq!(eval("2 in [1, 2]", json!(null)), json!(true));
        assert_eq!(eval("'k' in input", json!({"k": 1})), json!(true));
    }

    #[test]
    fn short_circuit() {
        // The right side would error on null indexing; `or` must not reach it.
        assert_eq!(eval("true or input[0]", json!(null)), json!(true));
        assert_eq!(eval("false and input[0]", json!(null)), json!(false));
    }

    #[test]
    fn functions() {
        assert_eq!(eval("len(input)", json!([1, 2, 3])), json!(3));
        assert_eq!(eval("len('abc')", json!(null)), json!(3));
        assert_eq!(eval("any([0, 1])", json!(null)), json!(true));
        assert_eq!(eval("all([1, 0])", json!(null)), json!(false));
        assert_eq!(eval("min([3, 1, 2])", json!(null)), json!(1));
        assert_eq!(eval("max(3, 7)", json!(null)), json!(7));
        assert_eq!(eval("abs(-4)", json!(null)), json!(4));
        assert_eq!(eval("str(42)", json!(null)), json!("42"));
        assert_eq!(eval("str(input)", json!("s")), json!("s"));
    }

    #[test]
    fn reserved_names_rejected_at_parse_time() {
        assert!(Program::compile("input._private").is_err());
        assert!(Program::compile("__import__('os')").is_err());
        assert!(Program::compile("_x + 1").is_err());
    }

    #[test]
    fn unknown_names_rejected() {
        assert!(Program::compile("open('/etc/passwd')").is_err());
        assert!(Program::compile("foo").is_err());
    }

    #[test]
    fn parse_errors() {
        assert!(Program::compile("1 +").is_err());
        assert!(Program::compile("(1").is_err());
        assert!(Program::compile("'unterminated").is_err());
        assert!(Program::compile("1; 2").is_err());
        assert!(Program::compile("1 2").is_err());
    }

    #[test]
    fn division_by_zero_errors() {
        let p = Program::compile("1 / input.x").unwrap();
        assert!(p.eval(&json!({"x": 0})).is_err());
        assert_eq!(p.eval(&json!({"x": 2})).unwrap(), json!(0.5));
    }

    #[test]
    fn keyword_boundaries() {
        // `index` must not lex as `in dex`.
        let item = json!({"index": 5});
        assert_eq!(eval("input.index", item), json!(5));
        // `origin` is not `or igin`.
        assert!(Program::compile("origin").is_err());
    }
}
