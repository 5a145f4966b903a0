//! Built-in primitive operators.
//!
//! Primitives are the strict boundary of the normal-order evaluator: the
//! evaluator forces every operand before calling a primitive, so each
//! implementation here receives fully evaluated values.
//!
//! ```scheme
//! (+ 1 2 3)            ; arithmetic over integers, overflow is an error
//! (< 1 2 3)            ; chained comparison
//! (cons 1 '(2 3))      ; list construction
//! (eq? 'a 'a)          ; identity on atoms
//! ```
//!
//! ## Error Handling
//!
//! - **Type Safety**: operators reject operands of the wrong type (`(+ 1 "a")` errors)
//! - **Overflow Detection**: arithmetic uses checked integer operations
//! - **Arity Checking**: every operator declares an [`Arity`] validated on each call
//!
//! `and`/`or`/`not` are primitives too. Since their operands are already
//! evaluated they do not short-circuit; they require booleans.
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with the signature `fn(&[Value]) -> Result<Value, Error>`
//! 2. **Add it to BUILTIN_OPS** with its identifier and arity
//! 3. **Add tests** covering edge cases and error conditions

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::Error;
use crate::ast::NumberType;
use crate::value::{SExp, Value};

/// Canonical primitive signature: fully evaluated operands in, value out
pub type PrimitiveFn = fn(&[Value]) -> Result<Value, Error>;

/// Number of operands an operator accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn validate(&self, arg_count: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(n) if arg_count != n => Err(Error::arity_error(n, arg_count)),
            Arity::AtLeast(n) if arg_count < n => Err(Error::arity_error(n, arg_count)),
            _ => Ok(()),
        }
    }
}

/// Definition of a primitive operator
#[derive(Clone)]
pub struct BuiltinOp {
    /// The identifier naming this operator in source text
    pub id: &'static str,
    pub func: PrimitiveFn,
    pub arity: Arity,
}

impl fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // Operators are uniquely identified by their id
        self.id == other.id
    }
}

//
// Builtin Function Implementations
//

fn numbers(args: &[Value]) -> Result<Vec<NumberType>, Error> {
    args.iter().map(NumberType::try_from).collect()
}

fn booleans(args: &[Value]) -> Result<Vec<bool>, Error> {
    args.iter().map(bool::try_from).collect()
}

// Macro to generate chained numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let nums = numbers(args)?;
            Ok(Value::Bool(nums.windows(2).all(|pair| pair[0] $op pair[1])))
        }
    };
}

numeric_comparison!(builtin_num_eq, ==);
numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    let mut sum: NumberType = 0;
    for n in numbers(args)? {
        sum = sum
            .checked_add(n)
            .ok_or_else(|| Error::EvalError("Integer overflow in addition".into()))?;
    }
    Ok(Value::Number(sum))
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    let nums = numbers(args)?;
    let [first, rest @ ..] = nums.as_slice() else {
        return Err(Error::arity_error(1, 0));
    };

    if rest.is_empty() {
        return first
            .checked_neg()
            .map(Value::Number)
            .ok_or_else(|| Error::EvalError("Integer overflow in negation".into()));
    }

    let mut result = *first;
    for n in rest {
        result = result
            .checked_sub(*n)
            .ok_or_else(|| Error::EvalError("Integer overflow in subtraction".into()))?;
    }
    Ok(Value::Number(result))
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    let mut product: NumberType = 1;
    for n in numbers(args)? {
        product = product
            .checked_mul(n)
            .ok_or_else(|| Error::EvalError("Integer overflow in multiplication".into()))?;
    }
    Ok(Value::Number(product))
}

fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    let nums = numbers(args)?;
    let [first, rest @ ..] = nums.as_slice() else {
        return Err(Error::arity_error(1, 0));
    };

    // (/ n) is the reciprocal 1/n
    let (mut result, divisors) = if rest.is_empty() {
        (1, std::slice::from_ref(first))
    } else {
        (*first, rest)
    };

    for d in divisors {
        if *d == 0 {
            return Err(Error::EvalError("Division by zero".into()));
        }
        result = result
            .checked_div(*d)
            .ok_or_else(|| Error::EvalError("Integer overflow in division".into()))?;
    }
    Ok(Value::Number(result))
}

fn builtin_not(args: &[Value]) -> Result<Value, Error> {
    match args {
        [b] => Ok(Value::Bool(!bool::try_from(b)?)),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

fn builtin_and(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(booleans(args)?.into_iter().all(|b| b)))
}

fn builtin_or(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(booleans(args)?.into_iter().any(|b| b)))
}

/// Identity on atoms: numbers, booleans, strings, symbols, the empty list and
/// primitives compare by value; pairs and closures never compare equal.
fn builtin_eq(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::arity_error(2, args.len()));
    };
    let same = match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::SExp(SExp::Symbol(x)), Value::SExp(SExp::Symbol(y))) => x == y,
        (Value::SExp(SExp::Empty), Value::SExp(SExp::Empty)) => true,
        (Value::Primitive(x), Value::Primitive(y)) => x == y,
        _ => false,
    };
    Ok(Value::Bool(same))
}

fn builtin_equal(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::arity_error(2, args.len()));
    };
    Ok(Value::Bool(a == b))
}

fn builtin_string_eq(args: &[Value]) -> Result<Value, Error> {
    let strings: Vec<&str> = args
        .iter()
        .map(|v| match v {
            Value::Str(s) => Ok(s.as_str()),
            other => Err(Error::TypeError(format!(
                "string=? expects strings, got {}",
                other.type_name()
            ))),
        })
        .collect::<Result<_, _>>()?;
    Ok(Value::Bool(strings.windows(2).all(|pair| pair[0] == pair[1])))
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    match args {
        [car, cdr] => Ok(Value::cons(car.clone(), cdr.clone())),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

fn builtin_car(args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::SExp(SExp::Pair(car, _))] => Ok(car.as_ref().clone()),
        [other] => Err(Error::EvalError(format!("car: {other} is not a pair"))),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

fn builtin_cdr(args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::SExp(SExp::Pair(_, cdr))] => Ok(cdr.as_ref().clone()),
        [other] => Err(Error::EvalError(format!("cdr: {other} is not a pair"))),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::list(args.iter().cloned()))
}

// Macro to generate single-operand type predicates
macro_rules! type_predicate {
    ($name:ident, $value:ident => $test:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            match args {
                [$value] => Ok(Value::Bool($test)),
                _ => Err(Error::arity_error(1, args.len())),
            }
        }
    };
}

type_predicate!(builtin_is_pair, v => v.is_pair());
type_predicate!(builtin_is_list, v => v.list_items().is_some());
type_predicate!(builtin_is_number, v => matches!(v, Value::Number(_)));
type_predicate!(builtin_is_boolean, v => matches!(v, Value::Bool(_)));
type_predicate!(builtin_is_symbol, v => matches!(v, Value::SExp(SExp::Symbol(_))));
type_predicate!(builtin_is_string, v => matches!(v, Value::Str(_)));
type_predicate!(builtin_is_procedure, v => v.is_procedure());

/// Global registry of all primitive operators.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn op(id: &'static str, arity: Arity, func: PrimitiveFn) -> BuiltinOp {
        BuiltinOp { id, func, arity }
    }

    vec![
        // Arithmetic operations
        op("+", Arity::Any, builtin_add),
        op("-", Arity::AtLeast(1), builtin_sub),
        op("*", Arity::Any, builtin_mul),
        op("/", Arity::AtLeast(1), builtin_div),
        // Comparison operations
        op("=", Arity::AtLeast(2), builtin_num_eq),
        op("<", Arity::AtLeast(2), builtin_lt),
        op(">", Arity::AtLeast(2), builtin_gt),
        op("<=", Arity::AtLeast(2), builtin_le),
        op(">=", Arity::AtLeast(2), builtin_ge),
        // Logical operations
        op("not", Arity::Exact(1), builtin_not),
        op("and", Arity::Any, builtin_and),
        op("or", Arity::Any, builtin_or),
        // Equality
        op("eq?", Arity::Exact(2), builtin_eq),
        op("equal?", Arity::Exact(2), builtin_equal),
        op("string=?", Arity::AtLeast(2), builtin_string_eq),
        // List operations
        op("cons", Arity::Exact(2), builtin_cons),
        op("car", Arity::Exact(1), builtin_car),
        op("cdr", Arity::Exact(1), builtin_cdr),
        op("list", Arity::Any, builtin_list),
        // Predicates
        op("pair?", Arity::Exact(1), builtin_is_pair),
        op("list?", Arity::Exact(1), builtin_is_list),
        op("number?", Arity::Exact(1), builtin_is_number),
        op("boolean?", Arity::Exact(1), builtin_is_boolean),
        op("symbol?", Arity::Exact(1), builtin_is_symbol),
        op("string?", Arity::Exact(1), builtin_is_string),
        op("procedure?", Arity::Exact(1), builtin_is_procedure),
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| {
        let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
        ops.iter().map(|op| (op.id, op)).collect()
    });

/// Get all primitive operators
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a primitive operator by its identifier
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}

/// Apply a primitive operator to fully evaluated operands.
pub fn apply_primitive(op: &BuiltinOp, args: &[Value]) -> Result<Value, Error> {
    op.arity.validate(args.len())?;
    (op.func)(args)
}
