//! The closed, injectable Function Registry.

use crate::error::EvalError;
use sse_core::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// What a registered function needs beyond its arguments: a source of
/// randomness, owned by the evaluator that constructed the registry call,
/// so that `random()`/`randint()` stay deterministic per the seeded-RNG
/// contract rather than drawing from ambient global state.
pub trait EvalHost {
    /// A uniform draw in `[0, 1)`.
    fn random_f64(&self) -> f64;
    /// A uniform integer draw in `[lo, hi]` inclusive, matching Python's
    /// `random.randint`.
    fn random_range(&self, lo: i64, hi: i64) -> i64;
}

/// A native function callable from expressions.
pub type NativeFn = Rc<dyn Fn(&[Value], &dyn EvalHost) -> Result<Value, EvalError>>;

/// Closed, pluggable set of functions callable from expressions. Read-only
/// once handed to an [`crate::Evaluator`]; embedders add task-specific
/// entries (gridworld helpers, environment constructors) via [`register`](Self::register)
/// before construction.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, NativeFn>,
}

impl FunctionRegistry {
    /// An empty registry with none of the seed functions.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// The seed set from the spec: math primitives, arithmetic/container
    /// builtins, string methods exposed as functions, `random`/`randint`,
    /// and descriptive statistics.
    pub fn with_seed_set() -> Self {
        let mut r = Self::empty();
        register_math(&mut r);
        register_builtins(&mut r);
        register_string_methods(&mut r);
        register_random(&mut r);
        register_statistics(&mut r);
        r
    }

    /// Register (or override) a function under `name`.
    pub fn register(&mut self, name: impl Into<String>, f: NativeFn) {
        self.functions.insert(name.into(), f);
    }

    /// Whether `name` is a registered function.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Look up a function by name.
    pub fn get(&self, name: &str) -> Option<&NativeFn> {
        self.functions.get(name)
    }
}

fn as_f64(v: &Value, ctx: &str) -> Result<f64, EvalError> {
    match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(EvalError::Call(format!("{ctx}: expected a number, got {other:?}"))),
    }
}

fn as_str<'a>(v: &'a Value, ctx: &str) -> Result<&'a str, EvalError> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::Call(format!("{ctx}: expected a string, got {other:?}"))),
    }
}

macro_rules! math1 {
    ($r:expr, $name:expr, $f:expr) => {
        $r.register(
            $name,
            Rc::new(move |args: &[Value], _h: &dyn EvalHost| {
                let x = as_f64(args.first().ok_or_else(|| {
                    EvalError::Call(format!("{} expects 1 argument", $name))
                })?, $name)?;
                Ok(Value::Float($f(x)))
            }),
        );
    };
}

fn register_math(r: &mut FunctionRegistry) {
    math1!(r, "sqrt", f64::sqrt);
    math1!(r, "exp", f64::exp);
    math1!(r, "log", f64::ln);
    math1!(r, "log10", f64::log10);
    math1!(r, "sin", f64::sin);
    math1!(r, "cos", f64::cos);
    math1!(r, "tan", f64::tan);
    math1!(r, "asin", f64::asin);
    math1!(r, "acos", f64::acos);
    math1!(r, "atan", f64::atan);
    math1!(r, "degrees", f64::to_degrees);
    math1!(r, "radians", f64::to_radians);

    r.register(
        "ceil",
        Rc::new(|args, _| Ok(Value::Int(as_f64(&args[0], "ceil")?.ceil() as i64))),
    );
    r.register(
        "floor",
        Rc::new(|args, _| Ok(Value::Int(as_f64(&args[0], "floor")?.floor() as i64))),
    );
    r.register("pi", Rc::new(|_, _| Ok(Value::Float(std::f64::consts::PI))));
    r.register("e", Rc::new(|_, _| Ok(Value::Float(std::f64::consts::E))));
}

fn register_builtins(r: &mut FunctionRegistry) {
    r.register(
        "abs",
        Rc::new(|args, _| match &args[0] {
            Value::Int(i) => Ok(Value::Int(i.abs())),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(EvalError::Call(format!("abs: expected a number, got {other:?}"))),
        }),
    );
    r.register(
        "round",
        Rc::new(|args, _| {
            let x = as_f64(&args[0], "round")?;
            if let Some(Value::Int(n)) = args.get(1) {
                let factor = 10f64.powi(*n as i32);
                Ok(Value::Float((x * factor).round() / factor))
            } else {
                Ok(Value::Int(x.round() as i64))
            }
        }),
    );
    r.register(
        "min",
        Rc::new(|args, _| reduce_numeric(args, "min", f64::min)),
    );
    r.register(
        "max",
        Rc::new(|args, _| reduce_numeric(args, "max", f64::max)),
    );
    r.register(
        "sum",
        Rc::new(|args, _| {
            let items = list_operand(args, "sum")?;
            let mut total = 0f64;
            let mut all_int = true;
            for item in items {
                match item {
                    Value::Int(i) => total += *i as f64,
                    Value::Float(f) => {
                        all_int = false;
                        total += f;
                    }
                    other => return Err(EvalError::Call(format!("sum: non-numeric element {other:?}"))),
                }
            }
            Ok(if all_int {
                Value::Int(total as i64)
            } else {
                Value::Float(total)
            })
        }),
    );
    r.register(
        "len",
        Rc::new(|args, _| match &args[0] {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(v) | Value::Tuple(v) => Ok(Value::Int(v.len() as i64)),
            Value::Map(m) => Ok(Value::Int(m.len() as i64)),
            other => Err(EvalError::Call(format!("len: unsized value {other:?}"))),
        }),
    );
    r.register(
        "sorted",
        Rc::new(|args, _| {
            let mut items = list_operand(args, "sorted")?.to_vec();
            items.sort_by(|a, b| cmp_values(a, b));
            Ok(Value::List(items))
        }),
    );
    r.register(
        "enumerate",
        Rc::new(|args, _| {
            let items = list_operand(args, "enumerate")?;
            Ok(Value::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| Value::Tuple(vec![Value::Int(i as i64), v.clone()]))
                    .collect(),
            ))
        }),
    );
    r.register(
        "zip",
        Rc::new(|args, _| {
            let lists: Vec<&[Value]> = args
                .iter()
                .map(|a| list_operand(std::slice::from_ref(a), "zip"))
                .collect::<Result<_, _>>()?;
            let len = lists.iter().map(|l| l.len()).min().unwrap_or(0);
            let mut out = Vec::with_capacity(len);
            for i in 0..len {
                out.push(Value::Tuple(lists.iter().map(|l| l[i].clone()).collect()));
            }
            Ok(Value::List(out))
        }),
    );
    r.register(
        "any",
        Rc::new(|args, _| Ok(Value::Bool(list_operand(args, "any")?.iter().any(Value::truthy)))),
    );
    r.register(
        "all",
        Rc::new(|args, _| Ok(Value::Bool(list_operand(args, "all")?.iter().all(Value::truthy)))),
    );
    r.register("str", Rc::new(|args, _| Ok(Value::Str(display_value(&args[0])))));
    r.register(
        "int",
        Rc::new(|args, _| match &args[0] {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Float(f) => Ok(Value::Int(*f as i64)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| EvalError::Call(format!("int: {e}"))),
            other => Err(EvalError::Call(format!("int: cannot convert {other:?}"))),
        }),
    );
    r.register(
        "float",
        Rc::new(|args, _| as_f64(&args[0], "float").map(Value::Float)),
    );
    r.register(
        "bool",
        Rc::new(|args, _| Ok(Value::Bool(args[0].truthy()))),
    );
    r.register(
        "dict",
        Rc::new(|args, _| match args.first() {
            None => Ok(Value::Map(Default::default())),
            Some(Value::Map(m)) => Ok(Value::Map(m.clone())),
            Some(other) => Err(EvalError::Call(format!("dict: cannot build from {other:?}"))),
        }),
    );
}

fn display_value(v: &Value) -> String {
    match v {
        Value::Str(s) => s.clone(),
        other => other.render(),
    }
}

fn list_operand<'a>(args: &'a [Value], ctx: &str) -> Result<&'a [Value], EvalError> {
    match args.first() {
        Some(Value::List(v)) | Some(Value::Tuple(v)) => Ok(v),
        Some(other) => Err(EvalError::Call(format!("{ctx}: expected a list, got {other:?}"))),
        None => Err(EvalError::Call(format!("{ctx} expects 1 argument"))),
    }
}

fn cmp_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        _ => as_f64(a, "sorted")
            .unwrap_or(f64::NAN)
            .partial_cmp(&as_f64(b, "sorted").unwrap_or(f64::NAN))
            .unwrap_or(std::cmp::Ordering::Equal),
    }
}

fn reduce_numeric(args: &[Value], name: &str, f: fn(f64, f64) -> f64) -> Result<Value, EvalError> {
    let items: Vec<Value> = if args.len() == 1 {
        list_operand(args, name)?.to_vec()
    } else {
        args.to_vec()
    };
    if items.is_empty() {
        return Err(EvalError::Call(format!("{name}: empty sequence")));
    }
    let mut all_int = true;
    let mut acc = as_f64(&items[0], name)?;
    if !matches!(items[0], Value::Int(_)) {
        all_int = false;
    }
    for item in &items[1..] {
        if !matches!(item, Value::Int(_)) {
            all_int = false;
        }
        acc = f(acc, as_f64(item, name)?);
    }
    Ok(if all_int {
        Value::Int(acc as i64)
    } else {
        Value::Float(acc)
    })
}

fn register_string_methods(r: &mut FunctionRegistry) {
    r.register(
        "lower",
        Rc::new(|args, _| Ok(Value::Str(as_str(&args[0], "lower")?.to_lowercase()))),
    );
    r.register(
        "upper",
        Rc::new(|args, _| Ok(Value::Str(as_str(&args[0], "upper")?.to_uppercase()))),
    );
    r.register(
        "title",
        Rc::new(|args, _| Ok(Value::Str(title_case(as_str(&args[0], "title")?)))),
    );
    r.register(
        "capitalize",
        Rc::new(|args, _| {
            let s = as_str(&args[0], "capitalize")?;
            let mut chars = s.chars();
            Ok(Value::Str(match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }))
        }),
    );
    r.register(
        "strip",
        Rc::new(|args, _| Ok(Value::Str(as_str(&args[0], "strip")?.trim().to_string()))),
    );
    r.register(
        "lstrip",
        Rc::new(|args, _| Ok(Value::Str(as_str(&args[0], "lstrip")?.trim_start().to_string()))),
    );
    r.register(
        "rstrip",
        Rc::new(|args, _| Ok(Value::Str(as_str(&args[0], "rstrip")?.trim_end().to_string()))),
    );
    r.register(
        "replace",
        Rc::new(|args, _| {
            let s = as_str(&args[0], "replace")?;
            let from = as_str(&args[1], "replace")?;
            let to = as_str(&args[2], "replace")?;
            Ok(Value::Str(s.replace(from, to)))
        }),
    );
    r.register(
        "split",
        Rc::new(|args, _| {
            let s = as_str(&args[0], "split")?;
            let parts: Vec<Value> = match args.get(1) {
                Some(sep) => s.split(as_str(sep, "split")?).map(|p| Value::Str(p.to_string())).collect(),
                None => s.split_whitespace().map(|p| Value::Str(p.to_string())).collect(),
            };
            Ok(Value::List(parts))
        }),
    );
    r.register(
        "join",
        Rc::new(|args, _| {
            let sep = as_str(&args[0], "join")?;
            let items = list_operand(&args[1..], "join")?;
            let strs: Vec<String> = items.iter().map(display_value).collect();
            Ok(Value::Str(strs.join(sep)))
        }),
    );
    r.register(
        "startswith",
        Rc::new(|args, _| Ok(Value::Bool(as_str(&args[0], "startswith")?.starts_with(as_str(&args[1], "startswith")?)))),
    );
    r.register(
        "endswith",
        Rc::new(|args, _| Ok(Value::Bool(as_str(&args[0], "endswith")?.ends_with(as_str(&args[1], "endswith")?)))),
    );
    r.register(
        "find",
        Rc::new(|args, _| {
            let s = as_str(&args[0], "find")?;
            let needle = as_str(&args[1], "find")?;
            Ok(Value::Int(s.find(needle).map(|i| i as i64).unwrap_or(-1)))
        }),
    );
    r.register(
        "count",
        Rc::new(|args, _| {
            let s = as_str(&args[0], "count")?;
            let needle = as_str(&args[1], "count")?;
            Ok(Value::Int(s.matches(needle).count() as i64))
        }),
    );
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn register_random(r: &mut FunctionRegistry) {
    r.register("random", Rc::new(|_, host| Ok(Value::Float(host.random_f64()))));
    r.register(
        "randint",
        Rc::new(|args, host| {
            let lo = match &args[0] {
                Value::Int(i) => *i,
                other => return Err(EvalError::Call(format!("randint: expected int, got {other:?}"))),
            };
            let hi = match &args[1] {
                Value::Int(i) => *i,
                other => return Err(EvalError::Call(format!("randint: expected int, got {other:?}"))),
            };
            Ok(Value::Int(host.random_range(lo, hi)))
        }),
    );
}

fn register_statistics(r: &mut FunctionRegistry) {
    r.register(
        "mean",
        Rc::new(|args, _| {
            let items = list_operand(args, "mean")?;
            let nums: Vec<f64> = items.iter().map(|v| as_f64(v, "mean")).collect::<Result<_, _>>()?;
            if nums.is_empty() {
                return Err(EvalError::Call("mean: empty sequence".into()));
            }
            Ok(Value::Float(nums.iter().sum::<f64>() / nums.len() as f64))
        }),
    );
    r.register(
        "median",
        Rc::new(|args, _| {
            let items = list_operand(args, "median")?;
            let mut nums: Vec<f64> = items.iter().map(|v| as_f64(v, "median")).collect::<Result<_, _>>()?;
            if nums.is_empty() {
                return Err(EvalError::Call("median: empty sequence".into()));
            }
            nums.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let mid = nums.len() / 2;
            Ok(Value::Float(if nums.len() % 2 == 0 {
                (nums[mid - 1] + nums[mid]) / 2.0
            } else {
                nums[mid]
            }))
        }),
    );
    r.register(
        "mode",
        Rc::new(|args, _| {
            let items = list_operand(args, "mode")?;
            let mut counts: Vec<(String, usize)> = Vec::new();
            for v in items {
                let key = v.render();
                if let Some(entry) = counts.iter_mut().find(|(k, _)| *k == key) {
                    entry.1 += 1;
                } else {
                    counts.push((key, 1));
                }
            }
            let best = counts
                .iter()
                .max_by_key(|(_, c)| *c)
                .ok_or_else(|| EvalError::Call("mode: empty sequence".into()))?;
            let idx = counts.iter().position(|c| c.0 == best.0).unwrap();
            Ok(items[idx].clone())
        }),
    );
    r.register(
        "stdev",
        Rc::new(|args, _| {
            let items = list_operand(args, "stdev")?;
            let nums: Vec<f64> = items.iter().map(|v| as_f64(v, "stdev")).collect::<Result<_, _>>()?;
            Ok(Value::Float(sample_stdev(&nums)?))
        }),
    );
    r.register(
        "variance",
        Rc::new(|args, _| {
            let items = list_operand(args, "variance")?;
            let nums: Vec<f64> = items.iter().map(|v| as_f64(v, "variance")).collect::<Result<_, _>>()?;
            Ok(Value::Float(sample_variance(&nums)?))
        }),
    );
}

fn sample_variance(nums: &[f64]) -> Result<f64, EvalError> {
    if nums.len() < 2 {
        return Err(EvalError::Call("variance: needs at least 2 data points".into()));
    }
    let mean = nums.iter().sum::<f64>() / nums.len() as f64;
    let ss: f64 = nums.iter().map(|x| (x - mean).powi(2)).sum();
    Ok(ss / (nums.len() - 1) as f64)
}

fn sample_stdev(nums: &[f64]) -> Result<f64, EvalError> {
    Ok(sample_variance(nums)?.sqrt())
}
