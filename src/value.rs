//! Runtime values produced by evaluation.
//!
//! [`Value`] covers numbers, booleans, strings, quoted S-expression data,
//! primitive operators and closures. Equality and display follow Scheme
//! conventions: lists print as `(1 2 3)`, improper pairs as `(1 . 2)`,
//! and only `#f` is false.

use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::{Exp, NumberType, VarDecl, write_escaped_str};
use crate::builtinops::BuiltinOp;
use crate::evaluator::environment::Environment;

/// Quoted S-expression data that is neither a number, boolean nor string.
#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    Symbol(String),
    /// The empty list `()`
    Empty,
    /// A cons cell; proper lists are pair chains ending in `Empty`
    Pair(Rc<Value>, Rc<Value>),
}

/// A procedure value: parameters and body of a `lambda`, plus the
/// environment that was active when the `lambda` was evaluated.
#[derive(Clone)]
pub struct Closure {
    pub params: Rc<[VarDecl]>,
    /// Shared with the originating procedure expression
    pub body: Rc<[Exp]>,
    pub env: Environment,
}

impl Closure {
    pub fn new(params: Rc<[VarDecl]>, body: Rc<[Exp]>, env: Environment) -> Self {
        Closure { params, body, env }
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(|p| p.var.as_str()).collect();
        write!(f, "Closure(params={params:?}, body_len={})", self.body.len())
    }
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        // Two closures are the same procedure when they come from the same
        // lambda body and close over the same frame.
        Rc::ptr_eq(&self.body, &other.body)
            && self.params == other.params
            && self.env.ptr_eq(&other.env)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(NumberType),
    Bool(bool),
    Str(String),
    SExp(SExp),
    Primitive(&'static BuiltinOp),
    Closure(Closure),
}

impl Value {
    pub fn symbol(name: impl Into<String>) -> Self {
        Value::SExp(SExp::Symbol(name.into()))
    }

    pub fn empty() -> Self {
        Value::SExp(SExp::Empty)
    }

    pub fn cons(car: Value, cdr: Value) -> Self {
        Value::SExp(SExp::Pair(Rc::new(car), Rc::new(cdr)))
    }

    /// Build a proper list from the given elements
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        let items: Vec<Value> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(Value::empty(), |tail, head| Value::cons(head, tail))
    }

    /// Every value other than `#f` counts as true in a conditional
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::SExp(SExp::Pair(..)))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::Primitive(_) | Value::Closure(_))
    }

    /// Elements of a proper list, or `None` for anything else
    pub fn list_items(&self) -> Option<Vec<&Value>> {
        let mut items = Vec::new();
        let mut current = self;
        loop {
            match current {
                Value::SExp(SExp::Empty) => return Some(items),
                Value::SExp(SExp::Pair(car, cdr)) => {
                    items.push(car.as_ref());
                    current = cdr.as_ref();
                }
                _ => return None,
            }
        }
    }

    /// Short name of the value's type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::SExp(SExp::Symbol(_)) => "symbol",
            Value::SExp(SExp::Empty) => "empty list",
            Value::SExp(SExp::Pair(..)) => "pair",
            Value::Primitive(_) => "primitive",
            Value::Closure(_) => "closure",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

// Fallible conversions used by the primitive operators.

impl TryFrom<&Value> for NumberType {
    type Error = Error;

    fn try_from(value: &Value) -> Result<NumberType, Error> {
        if let Value::Number(n) = value {
            Ok(*n)
        } else {
            Err(Error::TypeError(format!(
                "expected number, got {}",
                value.type_name()
            )))
        }
    }
}

impl TryFrom<&Value> for bool {
    type Error = Error;

    fn try_from(value: &Value) -> Result<bool, Error> {
        if let Value::Bool(b) = value {
            Ok(*b)
        } else {
            Err(Error::TypeError(format!(
                "expected boolean, got {}",
                value.type_name()
            )))
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Str(s) => write_escaped_str(f, s),
            Value::SExp(SExp::Symbol(s)) => write!(f, "{s}"),
            Value::SExp(SExp::Empty) => write!(f, "()"),
            Value::SExp(SExp::Pair(car, cdr)) => {
                write!(f, "({car}")?;
                let mut tail = cdr.as_ref();
                loop {
                    match tail {
                        Value::SExp(SExp::Empty) => break,
                        Value::SExp(SExp::Pair(next_car, next_cdr)) => {
                            write!(f, " {next_car}")?;
                            tail = next_cdr.as_ref();
                        }
                        other => {
                            write!(f, " . {other}")?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::Primitive(op) => write!(f, "#<primitive:{}>", op.id),
            Value::Closure(closure) => {
                write!(f, "#<closure (")?;
                for (i, param) in closure.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")>")
            }
        }
    }
}
