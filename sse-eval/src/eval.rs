//! The AST-walking evaluator.

use crate::ast::*;
use crate::error::EvalError;
use crate::parser::parse;
use crate::registry::{EvalHost, FunctionRegistry};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sse_core::{Map, State, Value, SELF_KEY};
use std::cell::RefCell;
use std::collections::HashMap;

/// A safe, sandboxed evaluator for a single expression at a time.
///
/// Constructed with a name table (backed by the live simulation [`State`])
/// and a [`FunctionRegistry`]; deterministic given the same seed, state,
/// and registry (spec: "With a seeded RNG provided at construction, the
/// evaluator is deterministic given identical state and registry").
pub struct Evaluator {
    names: State,
    registry: FunctionRegistry,
    locals: RefCell<Vec<HashMap<String, Value>>>,
    rng: RefCell<ChaCha8Rng>,
}

impl Evaluator {
    /// Build an evaluator over `names` with the given registry, seeded
    /// for deterministic `random`/`randint` draws.
    pub fn new(names: State, registry: FunctionRegistry, seed: u64) -> Self {
        Self {
            names,
            registry,
            locals: RefCell::new(Vec::new()),
            rng: RefCell::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// The name table this evaluator reads from.
    pub fn state(&self) -> &State {
        &self.names
    }

    /// The function registry this evaluator calls into.
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Parse and evaluate `expr` against the current name table.
    pub fn eval(&self, expr: &str) -> Result<Value, EvalError> {
        let ast = parse(expr)?;
        self.visit(&ast)
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        for frame in self.locals.borrow().iter().rev() {
            if let Some(v) = frame.get(name) {
                return Ok(v.clone());
            }
        }
        if name == SELF_KEY {
            return Ok(self.names.view());
        }
        if let Some(v) = self.names.get(name) {
            return Ok(v);
        }
        if self.registry.contains(name) {
            // A bare reference to a registered function name without a
            // call — not a supported expression result on its own, but we
            // surface it as NameNotFound rather than panicking so callers
            // get a clear diagnostic instead of a confusing type error.
            return Err(EvalError::NameNotFound(format!(
                "`{name}` names a function; call it with `{name}(...)`"
            )));
        }
        Err(EvalError::NameNotFound(name.to_string()))
    }

    fn visit(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Float(v) => Ok(Value::Float(*v)),
            Expr::Str(v) => Ok(Value::Str(v.clone())),
            Expr::Bool(v) => Ok(Value::Bool(*v)),
            Expr::NoneLit => Ok(Value::None),
            Expr::Name(n) => self.lookup(n),
            Expr::Tuple(items) => Ok(Value::Tuple(
                items.iter().map(|e| self.visit(e)).collect::<Result<_, _>>()?,
            )),
            Expr::List(items) => Ok(Value::List(
                items.iter().map(|e| self.visit(e)).collect::<Result<_, _>>()?,
            )),
            Expr::Map(entries) => {
                let mut m = Map::new();
                for (k, v) in entries {
                    let key = self.visit(k)?;
                    let key_str = match key {
                        Value::Str(s) => s,
                        other => other.render(),
                    };
                    m.insert(key_str, self.visit(v)?);
                }
                Ok(Value::Map(m))
            }
            Expr::Unary(op, inner) => self.visit_unary(*op, inner),
            Expr::Binary(lhs, op, rhs) => self.visit_binary(lhs, *op, rhs),
            Expr::BoolOp(kind, operands) => self.visit_bool_op(*kind, operands),
            Expr::Compare(first, chain) => self.visit_compare(first, chain),
            Expr::Ternary(body, cond, alt) => {
                if self.visit(cond)?.truthy() {
                    self.visit(body)
                } else {
                    self.visit(alt)
                }
            }
            Expr::Attribute(recv, name) => self.visit_attribute(recv, name),
            Expr::Index(recv, sub) => self.visit_index(recv, sub),
            Expr::Call(callee, args) => self.visit_call(callee, args),
            Expr::ListComp {
                element,
                target,
                iter,
                cond,
            } => self.visit_list_comp(element, target, iter, cond.as_deref()),
        }
    }

    fn visit_unary(&self, op: UnOp, inner: &Expr) -> Result<Value, EvalError> {
        let v = self.visit(inner)?;
        match (op, &v) {
            (UnOp::Not, _) => Ok(Value::Bool(!v.truthy())),
            (UnOp::Pos, Value::Int(i)) => Ok(Value::Int(*i)),
            (UnOp::Pos, Value::Float(f)) => Ok(Value::Float(*f)),
            (UnOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
            (UnOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
            (UnOp::Invert, Value::Int(i)) => Ok(Value::Int(!i)),
            _ => Err(EvalError::BadOperand {
                op: format!("{op:?}"),
                detail: format!("unsupported operand {v:?}"),
            }),
        }
    }

    fn visit_binary(&self, lhs: &Expr, op: BinOp, rhs: &Expr) -> Result<Value, EvalError> {
        let l = self.visit(lhs)?;
        let r = self.visit(rhs)?;
        binary_op(op, &l, &r)
    }

    /// `and`/`or` always yield a plain `Bool`, never the short-circuited
    /// operand itself — a deliberate narrowing from real Python semantics,
    /// preserved from the original `visit_BoolOp`.
    fn visit_bool_op(&self, kind: BoolOpKind, operands: &[Expr]) -> Result<Value, EvalError> {
        let mut result = false;
        for (i, operand) in operands.iter().enumerate() {
            let truthy = self.visit(operand)?.truthy();
            if i == 0 {
                result = truthy;
            }
            match kind {
                BoolOpKind::And => {
                    if !truthy {
                        return Ok(Value::Bool(false));
                    }
                    result = truthy;
                }
                BoolOpKind::Or => {
                    if truthy {
                        return Ok(Value::Bool(true));
                    }
                    result = truthy;
                }
            }
        }
        Ok(Value::Bool(result))
    }

    /// Chained comparisons short-circuit to `false` on the first failing
    /// pairwise link, rebinding `left` to `right` after each success.
    fn visit_compare(&self, first: &Expr, chain: &[(CmpOp, Expr)]) -> Result<Value, EvalError> {
        let mut left = self.visit(first)?;
        for (op, rhs_expr) in chain {
            let right = self.visit(rhs_expr)?;
            if !compare(*op, &left, &right)? {
                return Ok(Value::Bool(false));
            }
            left = right;
        }
        Ok(Value::Bool(true))
    }

    fn visit_attribute(&self, recv: &Expr, name: &str) -> Result<Value, EvalError> {
        let v = self.visit(recv)?;
        match &v {
            Value::Map(m) => m
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::Subscript(format!("no attribute `{name}` on map"))),
            Value::Handle(h) => h
                .0
                .get_attr(name)
                .ok_or_else(|| EvalError::Subscript(format!("no attribute `{name}` on handle"))),
            other => Err(EvalError::UnsupportedSyntax {
                expr: format!("{other:?}.{name}"),
                detail: "attribute access is only supported on maps and registered handles".into(),
            }),
        }
    }

    fn visit_index(&self, recv: &Expr, sub: &Subscript) -> Result<Value, EvalError> {
        let v = self.visit(recv)?;
        match sub {
            Subscript::Index(idx_expr) => {
                let idx = self.visit(idx_expr)?;
                index_value(&v, &idx)
            }
            Subscript::Slice(lo, hi, step) => {
                let lo = lo.as_ref().map(|e| self.visit(e)).transpose()?;
                let hi = hi.as_ref().map(|e| self.visit(e)).transpose()?;
                let step = step.as_ref().map(|e| self.visit(e)).transpose()?;
                slice_value(&v, lo, hi, step)
            }
        }
    }

    fn visit_call(&self, callee: &Expr, args: &[Expr]) -> Result<Value, EvalError> {
        let name = match callee {
            Expr::Name(n) => n.clone(),
            other => {
                return Err(EvalError::Call(format!(
                    "only direct calls to registered function names are supported, found {other:?}"
                )))
            }
        };
        let Some(f) = self.registry.get(&name).cloned() else {
            return Err(EvalError::Call(format!("`{name}` is not a registered function")));
        };
        let values: Vec<Value> = args.iter().map(|a| self.visit(a)).collect::<Result<_, _>>()?;
        f(&values, self)
    }

    fn visit_list_comp(
        &self,
        element: &Expr,
        target: &Target,
        iter: &Expr,
        cond: Option<&Expr>,
    ) -> Result<Value, EvalError> {
        let iterable = self.visit(iter)?;
        let items: Vec<Value> = match iterable {
            Value::List(v) | Value::Tuple(v) => v,
            Value::Map(m) => m.keys().map(|k| Value::Str(k.clone())).collect(),
            other => {
                return Err(EvalError::UnsupportedSyntax {
                    expr: "comprehension".into(),
                    detail: format!("cannot iterate over {other:?}"),
                })
            }
        };

        let mut out = Vec::with_capacity(items.len());
        self.locals.borrow_mut().push(HashMap::new());
        let result = (|| {
            for item in items {
                {
                    let mut frames = self.locals.borrow_mut();
                    let frame = frames.last_mut().expect("frame just pushed");
                    frame.clear();
                    bind_target(frame, target, item)?;
                }
                if let Some(cond) = cond {
                    if !self.visit(cond)?.truthy() {
                        continue;
                    }
                }
                out.push(self.visit(element)?);
            }
            Ok(())
        })();
        self.locals.borrow_mut().pop();
        result?;
        Ok(Value::List(out))
    }
}

fn bind_target(frame: &mut HashMap<String, Value>, target: &Target, value: Value) -> Result<(), EvalError> {
    match target {
        Target::Name(n) => {
            frame.insert(n.clone(), value);
            Ok(())
        }
        Target::Tuple(names) => match value {
            Value::Tuple(items) | Value::List(items) => {
                if items.len() != names.len() {
                    return Err(EvalError::UnsupportedSyntax {
                        expr: "comprehension target".into(),
                        detail: format!(
                            "cannot unpack {} values into {} names",
                            items.len(),
                            names.len()
                        ),
                    });
                }
                for (n, v) in names.iter().zip(items) {
                    frame.insert(n.clone(), v);
                }
                Ok(())
            }
            other => Err(EvalError::UnsupportedSyntax {
                expr: "comprehension target".into(),
                detail: format!("cannot unpack {other:?} into a tuple target"),
            }),
        },
    }
}

impl EvalHost for Evaluator {
    fn random_f64(&self) -> f64 {
        self.rng.borrow_mut().gen::<f64>()
    }

    fn random_range(&self, lo: i64, hi: i64) -> i64 {
        self.rng.borrow_mut().gen_range(lo..=hi)
    }
}

fn numeric_pair(op: &str, l: &Value, r: &Value) -> Result<(f64, f64, bool), EvalError> {
    let to_f = |v: &Value| -> Option<f64> {
        match v {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    };
    let (Some(lf), Some(rf)) = (to_f(l), to_f(r)) else {
        return Err(EvalError::BadOperand {
            op: op.to_string(),
            detail: format!("unsupported operand types {l:?} and {r:?}"),
        });
    };
    let both_int = matches!(l, Value::Int(_)) && matches!(r, Value::Int(_));
    Ok((lf, rf, both_int))
}

fn binary_op(op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    use BinOp::*;
    match op {
        Add => match (l, r) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                let mut v = a.clone();
                v.extend(b.clone());
                Ok(Value::List(v))
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                let mut v = a.clone();
                v.extend(b.clone());
                Ok(Value::Tuple(v))
            }
            _ => {
                let (a, b, both_int) = numeric_pair("+", l, r)?;
                Ok(numeric_result(a + b, both_int))
            }
        },
        Sub => {
            let (a, b, both_int) = numeric_pair("-", l, r)?;
            Ok(numeric_result(a - b, both_int))
        }
        Mul => match (l, r) {
            (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
                Ok(Value::Str(s.repeat((*n).max(0) as usize)))
            }
            _ => {
                let (a, b, both_int) = numeric_pair("*", l, r)?;
                Ok(numeric_result(a * b, both_int))
            }
        },
        Div => {
            let (a, b, _) = numeric_pair("/", l, r)?;
            if b == 0.0 {
                return Err(EvalError::BadOperand {
                    op: "/".into(),
                    detail: "division by zero".into(),
                });
            }
            Ok(Value::Float(a / b))
        }
        FloorDiv => {
            let (a, b, both_int) = numeric_pair("//", l, r)?;
            if b == 0.0 {
                return Err(EvalError::BadOperand {
                    op: "//".into(),
                    detail: "division by zero".into(),
                });
            }
            Ok(numeric_result((a / b).floor(), both_int))
        }
        Mod => {
            let (a, b, both_int) = numeric_pair("%", l, r)?;
            if b == 0.0 {
                return Err(EvalError::BadOperand {
                    op: "%".into(),
                    detail: "modulo by zero".into(),
                });
            }
            let r = a % b;
            let r = if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r };
            Ok(numeric_result(r, both_int))
        }
        Pow => {
            let (a, b, both_int) = numeric_pair("**", l, r)?;
            Ok(numeric_result(a.powf(b), both_int && b >= 0.0))
        }
        BitAnd | BitOr | BitXor | Shl | Shr => {
            let (Value::Int(a), Value::Int(b)) = (l, r) else {
                return Err(EvalError::BadOperand {
                    op: format!("{op:?}"),
                    detail: "bitwise operators require integer operands".into(),
                });
            };
            Ok(Value::Int(match op {
                BitAnd => a & b,
                BitOr => a | b,
                BitXor => a ^ b,
                Shl => a << b,
                Shr => a >> b,
                _ => unreachable!(),
            }))
        }
    }
}

fn numeric_result(v: f64, as_int: bool) -> Value {
    if as_int {
        Value::Int(v as i64)
    } else {
        Value::Float(v)
    }
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> Result<bool, EvalError> {
    match op {
        CmpOp::Eq => Ok(l == r),
        CmpOp::Ne => Ok(l != r),
        CmpOp::In => Ok(contains(r, l)?),
        CmpOp::NotIn => Ok(!contains(r, l)?),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = ordered_compare(l, r)?;
            Ok(match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                CmpOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            })
        }
    }
}

fn ordered_compare(l: &Value, r: &Value) -> Result<std::cmp::Ordering, EvalError> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => {
            let (a, b, _) = numeric_pair("comparison", l, r)?;
            a.partial_cmp(&b).ok_or_else(|| EvalError::BadOperand {
                op: "comparison".into(),
                detail: "unorderable values (NaN)".into(),
            })
        }
    }
}

fn contains(container: &Value, needle: &Value) -> Result<bool, EvalError> {
    match container {
        Value::List(v) | Value::Tuple(v) => Ok(v.contains(needle)),
        Value::Str(s) => match needle {
            Value::Str(n) => Ok(s.contains(n.as_str())),
            _ => Err(EvalError::BadOperand {
                op: "in".into(),
                detail: "string membership requires a string needle".into(),
            }),
        },
        Value::Map(m) => match needle {
            Value::Str(k) => Ok(m.contains_key(k)),
            _ => Ok(false),
        },
        other => Err(EvalError::BadOperand {
            op: "in".into(),
            detail: format!("{other:?} is not a container"),
        }),
    }
}

fn index_value(recv: &Value, idx: &Value) -> Result<Value, EvalError> {
    match recv {
        Value::List(v) | Value::Tuple(v) => {
            let i = as_index(idx, v.len())?;
            v.get(i)
                .cloned()
                .ok_or_else(|| EvalError::Subscript(format!("index {i} out of range")))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = as_index(idx, chars.len())?;
            chars
                .get(i)
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| EvalError::Subscript(format!("index {i} out of range")))
        }
        Value::Map(m) => {
            let Value::Str(key) = idx else {
                return Err(EvalError::Subscript("map keys must be strings".into()));
            };
            m.get(key)
                .cloned()
                .ok_or_else(|| EvalError::Subscript(format!("key `{key}` not found")))
        }
        Value::Handle(h) => h
            .0
            .get_item(idx)
            .ok_or_else(|| EvalError::Subscript("handle does not support this subscript".into())),
        other => Err(EvalError::Subscript(format!("{other:?} is not subscriptable"))),
    }
}

fn as_index(idx: &Value, len: usize) -> Result<usize, EvalError> {
    let Value::Int(i) = idx else {
        return Err(EvalError::Subscript("index must be an integer".into()));
    };
    let i = if *i < 0 { *i + len as i64 } else { *i };
    if i < 0 {
        return Err(EvalError::Subscript(format!("index {i} out of range")));
    }
    Ok(i as usize)
}

fn slice_value(
    recv: &Value,
    lo: Option<Value>,
    hi: Option<Value>,
    step: Option<Value>,
) -> Result<Value, EvalError> {
    let step = match step {
        Some(Value::Int(s)) => s,
        None => 1,
        Some(other) => return Err(EvalError::Subscript(format!("slice step must be an int, got {other:?}"))),
    };
    if step == 0 {
        return Err(EvalError::Subscript("slice step cannot be zero".into()));
    }

    fn to_items(v: &Value) -> Result<Vec<Value>, EvalError> {
        match v {
            Value::List(v) | Value::Tuple(v) => Ok(v.clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            other => Err(EvalError::Subscript(format!("{other:?} is not sliceable"))),
        }
    }

    let items = to_items(recv)?;
    let len = items.len() as i64;
    let norm = |v: Option<Value>, default: i64| -> Result<i64, EvalError> {
        match v {
            None => Ok(default),
            Some(Value::Int(i)) => Ok(if i < 0 { (i + len).max(0) } else { i.min(len) }),
            Some(other) => Err(EvalError::Subscript(format!("slice bound must be an int, got {other:?}"))),
        }
    };

    let mut result = Vec::new();
    if step > 0 {
        let start = norm(lo, 0)?;
        let stop = norm(hi, len)?;
        let mut i = start;
        while i < stop {
            if i >= 0 && i < len {
                result.push(items[i as usize].clone());
            }
            i += step;
        }
    } else {
        let start = norm(lo, len - 1)?;
        let stop = norm(hi, -1)?;
        let mut i = start.min(len - 1);
        while i > stop {
            if i >= 0 && i < len {
                result.push(items[i as usize].clone());
            }
            i += step;
        }
    }

    match recv {
        Value::Str(_) => Ok(Value::Str(
            result
                .into_iter()
                .map(|v| match v {
                    Value::Str(s) => s,
                    _ => unreachable!(),
                })
                .collect(),
        )),
        Value::Tuple(_) => Ok(Value::Tuple(result)),
        _ => Ok(Value::List(result)),
    }
}
