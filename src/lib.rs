//! normeval - normal-order evaluator for a small Scheme dialect
//!
//! This crate interprets a small, pure Scheme dialect with **call-by-name**
//! semantics: arguments to user-defined procedures are passed as unevaluated
//! expressions paired with the caller's environment, and are evaluated each
//! time the procedure body refers to them.
//!
//! ```scheme
//! ((lambda (x y) x) 1 (/ 1 0))   ; => 1, the division is never performed
//! (let ((unused (car '()))) 5)   ; => 5
//! (define fact
//!   (lambda (n) (if (= n 0) 1 (* n (fact (- n 1))))))
//! (fact 5)                       ; => 120
//! ```
//!
//! Primitive operators (`+`, `car`, `eq?`, ...) are strict: their operands are
//! evaluated before the primitive runs.
//!
//! Numbers are `i64`. Arithmetic is checked, so overflow is an error rather
//! than a wrap, and `/` is truncating integer division: `(/ 7 2)` is `3`,
//! `(/ -7 2)` is `-3`, and `(/ n)` is `1/n` truncated.
//!
//! ## Deferred bindings
//!
//! Nothing is memoized. A parameter referenced twice is evaluated twice. This
//! is observable (see [`evaluator::Evaluator::lookups`]) and is part of the
//! evaluator's contract, which distinguishes it from a call-by-need
//! interpreter.
//!
//! ## Modules
//!
//! - `ast`: expression tree produced by the parser and consumed by the evaluator
//! - `value`: runtime values, including closures and quoted data
//! - `builtinops`: strict primitive operators
//! - `evaluator`: the normal-order evaluator and its environment model
//! - `scheme`: parsing Scheme source text into the expression tree

use std::fmt;

/// Maximum parsing depth to prevent stack overflow attacks
/// This limits deeply nested structures in the S-expression parser
pub const MAX_PARSE_DEPTH: usize = 64;

/// Evaluation depth limit used by interactive front ends.
///
/// Library callers get an unlimited depth by default (see
/// [`evaluator::EvalConfig`]); a REPL wants runaway recursion reported as an
/// error rather than a stack overflow.
pub const DEFAULT_REPL_DEPTH: usize = 2048;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed literals)
    InvalidSyntax,
    /// Input ended before the expression was complete (EOF, unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
    /// Well-formed S-expression that is not a well-formed program form
    /// (e.g. `(if 1 2)`, `(lambda (x x) x)`, `()`)
    Malformed,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or form encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError for a form that parsed but is not well-formed
    pub fn malformed(message: impl Into<String>, found: impl fmt::Display) -> Self {
        Self::new(
            ParseErrorKind::Malformed,
            message,
            None,
            Some(found.to_string()),
        )
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), None)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the parser and the evaluator.
///
/// Every evaluation step returns `Result<_, Error>`; the first failure
/// short-circuits the enclosing evaluation and reaches the caller unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("ParseError: {0}")]
    ParseError(ParseError),
    /// Lookup reached the root frame without finding the name
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    /// A body or program with no expressions was evaluated
    #[error("Empty sequence: nothing to evaluate")]
    EmptySequence,
    /// The operator of an application evaluated to a non-callable value
    #[error("Bad procedure: {0}")]
    BadProcedure(String),
    /// An expression reached an evaluation rule it cannot satisfy
    #[error("Malformed expression: {0}")]
    MalformedExpression(String),
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("EvaluationError: {0}")]
    EvalError(String),
    #[error("{}", format_arity(*expected, *got, expression.as_deref()))]
    ArityError {
        expected: usize,
        got: usize,
        expression: Option<String>,
    },
}

fn format_arity(expected: usize, got: usize, expression: Option<&str>) -> String {
    match expression {
        Some(expr) => {
            format!("ArityError: expression {expr}: expected {expected} arguments, got {got}")
        }
        None => format!("ArityError: function expected {expected} arguments but got {got}"),
    }
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::ParseError(e)
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod value;

#[cfg(feature = "scheme")]
pub mod scheme;

pub use ast::{Binding, Exp, Program, VarDecl};
pub use evaluator::environment::{Deferred, Environment};
pub use evaluator::{EvalConfig, Evaluator, eval_exp, eval_program};
pub use value::{Closure, SExp, Value};

#[cfg(feature = "scheme")]
pub use evaluator::eval_normal_parse;
