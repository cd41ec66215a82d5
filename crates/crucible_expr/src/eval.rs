//! # Bounded Evaluator
//!
//! Walks an [`Expr`] tree against a [`Scope`] of bindings.
//!
//! The language has no loops and no user functions, so every program
//! terminates; the step budget additionally caps the work a single
//! evaluation may do inside a consensus-critical transition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ExprError, ExprResult};
use crate::lexer::lex;
use crate::numeric::{integral_f64_to_i64, Numeric};
use crate::parser::{parse, BinaryOp, Expr, UnaryOp};
use crate::rng::DeterministicRng;
use crate::value::Value;

/// Variable bindings visible to a program.
pub type Scope = BTreeMap<String, Value>;

/// Evaluation limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum program length in bytes.
    pub max_program_len: usize,
    /// Maximum nesting depth of the parsed tree.
    pub max_depth: usize,
    /// Maximum number of nodes visited during one evaluation.
    pub max_steps: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_program_len: 4096,
            max_depth: 64,
            max_steps: 10_000,
        }
    }
}

/// A parsed program, ready to evaluate any number of times.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    source: String,
    root: Expr,
}

impl Program {
    /// Parses `source` under the given limits.
    ///
    /// # Errors
    ///
    /// Lex/parse errors, or [`ExprError::LimitExceeded`] for oversized input.
    pub fn compile(source: &str, limits: &Limits) -> ExprResult<Self> {
        if source.len() > limits.max_program_len {
            return Err(ExprError::LimitExceeded(format!(
                "program is {} bytes, limit is {}",
                source.len(),
                limits.max_program_len
            )));
        }
        let tokens = lex(source)?;
        let root = parse(&tokens, limits.max_depth)?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Program text as compiled.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the program.
    ///
    /// # Errors
    ///
    /// Unbound references, type errors, arithmetic faults, or step budget
    /// exhaustion.
    pub fn eval(&self, scope: &Scope, rng: &mut DeterministicRng, limits: &Limits) -> ExprResult<Value> {
        let mut ev = Evaluator {
            scope,
            rng,
            steps_left: limits.max_steps,
        };
        ev.eval(&self.root)
    }
}

struct Evaluator<'a> {
    scope: &'a Scope,
    rng: &'a mut DeterministicRng,
    steps_left: u64,
}

impl Evaluator<'_> {
    fn tick(&mut self) -> ExprResult<()> {
        if self.steps_left == 0 {
            return Err(ExprError::LimitExceeded("evaluation step budget exhausted".into()));
        }
        self.steps_left -= 1;
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> ExprResult<Value> {
        self.tick()?;
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var(name) => self
                .scope
                .get(name)
                .cloned()
                .ok_or_else(|| ExprError::Unbound(name.clone())),
            Expr::Unary(op, inner) => {
                let v = self.eval(inner)?;
                eval_unary(*op, v)
            }
            Expr::Binary(BinaryOp::And, l, r) => {
                if self.eval_bool(l)? {
                    Ok(Value::Bool(self.eval_bool(r)?))
                } else {
                    Ok(Value::Bool(false))
                }
            }
            Expr::Binary(BinaryOp::Or, l, r) => {
                if self.eval_bool(l)? {
                    Ok(Value::Bool(true))
                } else {
                    Ok(Value::Bool(self.eval_bool(r)?))
                }
            }
            Expr::Binary(op, l, r) => {
                let lv = self.eval(l)?;
                let rv = self.eval(r)?;
                eval_binary(*op, lv, rv)
            }
            Expr::Ternary(cond, then, otherwise) => {
                if self.eval_bool(cond)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call { name, args } => self.call(name, args),
        }
    }

    fn eval_bool(&mut self, expr: &Expr) -> ExprResult<bool> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(ExprError::Type(format!("expected bool, got {}", other.kind()))),
        }
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> ExprResult<Value> {
        // has() consults the scope directly.
        if name == "has" {
            let [arg] = args else {
                return Err(arity(name, 1, args.len()));
            };
            return match self.eval(arg)? {
                Value::Str(field) => Ok(Value::Bool(self.scope.contains_key(&field))),
                other => Err(ExprError::Type(format!("has() takes a string, got {}", other.kind()))),
            };
        }

        let mut vals = Vec::with_capacity(args.len());
        for a in args {
            vals.push(self.eval(a)?);
        }

        match (name, vals.as_slice()) {
            ("rand", []) => Ok(Value::Float(self.rng.unit_f64())),
            ("rand", [Value::Int(n)]) => Ok(Value::Int(self.rng.below(*n)?)),
            ("randf", [lo, hi]) => {
                let lo = to_f64(lo)?;
                let hi = to_f64(hi)?;
                Ok(Value::Float(self.rng.range_f64(lo, hi)?))
            }
            ("min" | "max", [a, b]) => min_max(name == "min", a, b),
            ("abs", [Value::Int(v)]) => v
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| ExprError::Arithmetic("abs overflow".into())),
            ("abs", [Value::Float(v)]) => Ok(Value::Float(v.abs())),
            ("int", [v]) => to_int(v).map(Value::Int),
            ("double", [v]) => to_f64(v).map(Value::Float),
            ("string", [v]) => Ok(Value::Str(v.to_string())),
            ("size", [Value::Str(s)]) => {
                i64::try_from(s.chars().count())
                    .map(Value::Int)
                    .map_err(|_| ExprError::Arithmetic("size overflow".into()))
            }
            ("rand" | "abs" | "size", [_]) => Err(ExprError::Type(format!(
                "{name}() got {}",
                vals.iter().map(Value::kind).collect::<Vec<_>>().join(", ")
            ))),
            ("rand", _) => Err(arity(name, 1, vals.len())),
            ("randf" | "min" | "max", _) => Err(arity(name, 2, vals.len())),
            ("abs" | "int" | "double" | "string" | "size", _) => Err(arity(name, 1, vals.len())),
            _ => Err(ExprError::BadCall(format!("unknown function {name}()"))),
        }
    }
}

fn arity(name: &str, want: usize, got: usize) -> ExprError {
    ExprError::BadCall(format!("{name}() takes {want} argument(s), got {got}"))
}

fn to_f64(v: &Value) -> ExprResult<f64> {
    Numeric::from_value(v)?.to_f64()
}

fn to_int(v: &Value) -> ExprResult<i64> {
    match v {
        Value::Int(i) => Ok(*i),
        Value::Float(f) => integral_f64_to_i64(f.trunc()),
        Value::Str(s) => s.trim().parse::<i64>().map_err(|_| ExprError::Conversion {
            from: format!("string {s:?}"),
            to: "int",
        }),
        Value::Bool(_) => Err(ExprError::Conversion {
            from: "bool".into(),
            to: "int",
        }),
    }
}

fn finite(v: f64) -> ExprResult<Value> {
    if v.is_finite() {
        Ok(Value::Float(v))
    } else {
        Err(ExprError::Arithmetic(format!("non-finite result {v}")))
    }
}

fn min_max(is_min: bool, a: &Value, b: &Value) -> ExprResult<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(if is_min { *x.min(y) } else { *x.max(y) })),
        _ => {
            let x = to_f64(a)?;
            let y = to_f64(b)?;
            Ok(Value::Float(if is_min { x.min(y) } else { x.max(y) }))
        }
    }
}

fn eval_unary(op: UnaryOp, v: Value) -> ExprResult<Value> {
    match (op, v) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| ExprError::Arithmetic("negation overflow".into())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (op, v) => Err(ExprError::Type(format!("cannot apply {op:?} to {}", v.kind()))),
    }
}

fn eval_binary(op: BinaryOp, l: Value, r: Value) -> ExprResult<Value> {
    use BinaryOp::{Add, Div, Eq, Ge, Gt, Le, Lt, Mul, Ne, Rem, Sub};

    let overflow = || ExprError::Arithmetic(format!("integer overflow in {op:?}"));

    match (op, &l, &r) {
        (Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),

        (Add, Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
        (Sub, Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
        (Mul, Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
        (Div | Rem, Value::Int(_), Value::Int(0)) => Err(ExprError::Arithmetic("division by zero".into())),
        (Div, Value::Int(a), Value::Int(b)) => a.checked_div(*b).map(Value::Int).ok_or_else(overflow),
        (Rem, Value::Int(a), Value::Int(b)) => a.checked_rem(*b).map(Value::Int).ok_or_else(overflow),

        (Add | Sub | Mul | Div | Rem, Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let a = to_f64(&l)?;
            let b = to_f64(&r)?;
            if matches!(op, Div | Rem) && b == 0.0 {
                return Err(ExprError::Arithmetic("division by zero".into()));
            }
            finite(match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a % b,
            })
        }

        (Eq | Ne, _, _) => {
            let same = values_equal(&l, &r)?;
            Ok(Value::Bool(if op == Eq { same } else { !same }))
        }

        (Lt | Le | Gt | Ge, _, _) => {
            let ord = compare(&l, &r)?;
            Ok(Value::Bool(match op {
                Lt => ord.is_lt(),
                Le => ord.is_le(),
                Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }

        _ => Err(ExprError::Type(format!(
            "cannot apply {op:?} to {} and {}",
            l.kind(),
            r.kind()
        ))),
    }
}

fn values_equal(l: &Value, r: &Value) -> ExprResult<bool> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(a == b),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            #[allow(clippy::float_cmp)]
            let same = to_f64(l)? == to_f64(r)?;
            Ok(same)
        }
        _ => Err(ExprError::Type(format!("cannot compare {} with {}", l.kind(), r.kind()))),
    }
}

fn compare(l: &Value, r: &Value) -> ExprResult<std::cmp::Ordering> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let a = to_f64(l)?;
            let b = to_f64(r)?;
            a.partial_cmp(&b)
                .ok_or_else(|| ExprError::Arithmetic("unordered comparison".into()))
        }
        _ => Err(ExprError::Type(format!("cannot order {} and {}", l.kind(), r.kind()))),
    }
}
