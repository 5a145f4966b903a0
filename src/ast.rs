//! This module defines the expression tree evaluated by the interpreter. The main
//! enum, [`Exp`], is a closed sum type covering literals, primitive-operator
//! references, variable references, conditionals, procedures, applications,
//! `let`/`letrec`, assignment, quoted literals and definitions.
//!
//! Sub-expressions and body sequences are reference counted, so cloning an
//! expression is shallow. Closures and deferred bindings hold on to the very
//! same body slices as the expression they came from.
//!
//! Ergonomic constructors such as [`Exp::app`], [`Exp::proc`] and
//! [`Exp::let_exp`] are provided for building trees in code and tests.

use std::fmt;
use std::rc::Rc;

use crate::builtinops::BuiltinOp;
use crate::value::Value;

/// Type alias for number values in interpreter
pub type NumberType = i64;

/// Allowed non-alphanumeric characters in symbol names
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$%&^~.";

/// Keywords introducing special forms; never valid as variable names
pub(crate) const SPECIAL_FORMS: &[&str] =
    &["define", "lambda", "if", "let", "letrec", "set!", "quote"];

/// Check if a string is a valid symbol name
/// Valid: non-empty, no leading digit, no "-digit" prefix, alphanumeric + SYMBOL_SPECIAL_CHARS
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false,
        Some(first_char) => {
            if first_char.is_ascii_digit() {
                return false;
            }

            if first_char == '-'
                && let Some(second_char) = chars.next()
                && second_char.is_ascii_digit()
            {
                return false;
            }

            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// A name in binding position (procedure parameter, `let` or `define` target).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub var: String,
}

impl VarDecl {
    pub fn new(var: impl Into<String>) -> Self {
        VarDecl { var: var.into() }
    }
}

impl fmt::Display for VarDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.var)
    }
}

/// One `(name expression)` pair of a `let` or `letrec`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub var: VarDecl,
    pub val: Exp,
}

impl Binding {
    pub fn new(var: impl Into<String>, val: Exp) -> Self {
        Binding {
            var: VarDecl::new(var),
            val,
        }
    }
}

/// Program expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    Number(NumberType),
    Bool(bool),
    Str(String),
    /// Reference to a strict primitive operator
    PrimOp(&'static BuiltinOp),
    VarRef(String),
    If {
        test: Rc<Exp>,
        then: Rc<Exp>,
        alt: Rc<Exp>,
    },
    /// `(lambda (params...) body...)`
    Proc {
        params: Rc<[VarDecl]>,
        body: Rc<[Exp]>,
    },
    /// `(rator rands...)`
    App {
        rator: Rc<Exp>,
        rands: Rc<[Exp]>,
    },
    Let {
        bindings: Rc<[Binding]>,
        body: Rc<[Exp]>,
    },
    Letrec {
        bindings: Rc<[Binding]>,
        body: Rc<[Exp]>,
    },
    /// `(set! var val)`
    Set {
        var: String,
        val: Rc<Exp>,
    },
    /// Quoted literal; evaluates to the value it carries
    Lit(Value),
    Define {
        var: VarDecl,
        val: Rc<Exp>,
    },
}

/// An ordered sequence of top-level expressions; order is evaluation order.
pub type Program = Vec<Exp>;

impl Exp {
    pub fn var(name: impl Into<String>) -> Self {
        Exp::VarRef(name.into())
    }

    pub fn str(s: impl Into<String>) -> Self {
        Exp::Str(s.into())
    }

    pub fn if_exp(test: Exp, then: Exp, alt: Exp) -> Self {
        Exp::If {
            test: Rc::new(test),
            then: Rc::new(then),
            alt: Rc::new(alt),
        }
    }

    pub fn proc<S: Into<String>>(
        params: impl IntoIterator<Item = S>,
        body: impl IntoIterator<Item = Exp>,
    ) -> Self {
        Exp::Proc {
            params: params.into_iter().map(VarDecl::new).collect(),
            body: body.into_iter().collect(),
        }
    }

    pub fn app(rator: Exp, rands: impl IntoIterator<Item = Exp>) -> Self {
        Exp::App {
            rator: Rc::new(rator),
            rands: rands.into_iter().collect(),
        }
    }

    pub fn let_exp(
        bindings: impl IntoIterator<Item = Binding>,
        body: impl IntoIterator<Item = Exp>,
    ) -> Self {
        Exp::Let {
            bindings: bindings.into_iter().collect(),
            body: body.into_iter().collect(),
        }
    }

    pub fn letrec(
        bindings: impl IntoIterator<Item = Binding>,
        body: impl IntoIterator<Item = Exp>,
    ) -> Self {
        Exp::Letrec {
            bindings: bindings.into_iter().collect(),
            body: body.into_iter().collect(),
        }
    }

    pub fn define(name: impl Into<String>, val: Exp) -> Self {
        Exp::Define {
            var: VarDecl::new(name),
            val: Rc::new(val),
        }
    }
}

/// Write a string literal with the escapes the parser understands
pub(crate) fn write_escaped_str(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in s.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

fn write_seq<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_bindings(f: &mut fmt::Formatter<'_>, bindings: &[Binding]) -> fmt::Result {
    write!(f, "(")?;
    for (i, binding) in bindings.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "({} {})", binding.var, binding.val)?;
    }
    write!(f, ")")
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exp::Number(n) => write!(f, "{n}"),
            Exp::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Exp::Str(s) => write_escaped_str(f, s),
            Exp::PrimOp(op) => write!(f, "{}", op.id),
            Exp::VarRef(name) => write!(f, "{name}"),
            Exp::If { test, then, alt } => write!(f, "(if {test} {then} {alt})"),
            Exp::Proc { params, body } => {
                write!(f, "(lambda (")?;
                write_seq(f, params)?;
                write!(f, ") ")?;
                write_seq(f, body)?;
                write!(f, ")")
            }
            Exp::App { rator, rands } => {
                write!(f, "({rator}")?;
                for rand in rands.iter() {
                    write!(f, " {rand}")?;
                }
                write!(f, ")")
            }
            Exp::Let { bindings, body } => {
                write!(f, "(let ")?;
                write_bindings(f, bindings)?;
                write!(f, " ")?;
                write_seq(f, body)?;
                write!(f, ")")
            }
            Exp::Letrec { bindings, body } => {
                write!(f, "(letrec ")?;
                write_bindings(f, bindings)?;
                write!(f, " ")?;
                write_seq(f, body)?;
                write!(f, ")")
            }
            Exp::Set { var, val } => write!(f, "(set! {var} {val})"),
            Exp::Lit(value) => match value {
                Value::SExp(_) => write!(f, "'{value}"),
                other => write!(f, "{other}"),
            },
            Exp::Define { var, val } => write!(f, "(define {var} {val})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtinops::find_builtin_op;

    #[test]
    fn test_is_valid_symbol() {
        let cases = vec![
            ("x", true),
            ("fact", true),
            ("even?", true),
            ("set-car!", true),
            ("+", true),
            ("-", true),
            ("->string", true),
            ("", false),
            ("1abc", false),
            ("-5", false),
            ("a(b", false),
            ("with space", false),
        ];

        for (name, expected) in cases {
            assert_eq!(is_valid_symbol(name), expected, "symbol '{name}'");
        }
    }

    #[test]
    fn test_display_round_trips_surface_syntax() {
        let plus = find_builtin_op("+").map(Exp::PrimOp);
        let Some(plus) = plus else {
            panic!("+ must be registered");
        };

        let cases = vec![
            (Exp::Number(-3), "-3"),
            (Exp::Bool(false), "#f"),
            (Exp::str("a\"b"), "\"a\\\"b\""),
            (
                Exp::if_exp(Exp::Bool(true), Exp::Number(1), Exp::Number(2)),
                "(if #t 1 2)",
            ),
            (
                Exp::proc(["x", "y"], [Exp::app(plus, [Exp::var("x"), Exp::var("y")])]),
                "(lambda (x y) (+ x y))",
            ),
            (
                Exp::let_exp([Binding::new("x", Exp::Number(1))], [Exp::var("x")]),
                "(let ((x 1)) x)",
            ),
            (Exp::define("x", Exp::Number(3)), "(define x 3)"),
            (Exp::Lit(Value::symbol("a")), "'a"),
            (
                Exp::Lit(Value::list([Value::Number(1), Value::Number(2)])),
                "'(1 2)",
            ),
        ];

        for (exp, expected) in cases {
            assert_eq!(format!("{exp}"), expected);
        }
    }

    #[test]
    fn test_clone_shares_body() {
        let proc_exp = Exp::proc(["n"], [Exp::var("n")]);
        let copy = proc_exp.clone();
        match (&proc_exp, &copy) {
            (Exp::Proc { body: a, .. }, Exp::Proc { body: b, .. }) => {
                assert!(Rc::ptr_eq(a, b));
            }
            _ => panic!("expected procedures"),
        }
    }
}
