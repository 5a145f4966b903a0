//! Normal-order evaluation.
//!
//! The evaluator interprets an [`Exp`] against an [`Environment`] and yields a
//! [`Value`] or the first [`Error`] encountered. Compound procedures are
//! non-strict: operands are bound unevaluated, together with the caller's
//! environment, and evaluated each time the body refers to them. Primitive
//! operators are strict and receive evaluated operands.

pub mod environment;

use std::cell::Cell;
use std::slice;

use tracing::{debug, trace};

use crate::Error;
use crate::ast::{Binding, Exp, VarDecl};
use crate::builtinops::apply_primitive;
use crate::value::{Closure, Value};
use self::environment::{Deferred, Environment};

/// Evaluation settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalConfig {
    /// Maximum recursion depth of the evaluator. `None` leaves deep recursion
    /// bounded only by the host stack.
    pub max_depth: Option<usize>,
}

impl EvalConfig {
    pub fn with_max_depth(max_depth: usize) -> Self {
        EvalConfig {
            max_depth: Some(max_depth),
        }
    }
}

/// A normal-order evaluator.
///
/// Holds the configuration and a count of variable lookups performed so
/// far. Each lookup of a deferred binding evaluates its expression again, so
/// the count grows with every reference, never only with the first.
#[derive(Debug, Default)]
pub struct Evaluator {
    config: EvalConfig,
    lookups: Cell<usize>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EvalConfig) -> Self {
        Evaluator {
            config,
            lookups: Cell::new(0),
        }
    }

    /// Number of variable references evaluated by this evaluator
    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }

    /// Evaluate a program against the empty environment.
    pub fn eval_program(&self, program: &[Exp]) -> Result<Value, Error> {
        debug!(expressions = program.len(), "evaluating program");
        self.eval_sequence(program, &Environment::empty())
    }

    /// Evaluate top-level forms against `env`, returning the value of the last
    /// expression (`None` when the forms end with a definition) and the
    /// environment extended with every definition.
    ///
    /// Used by interactive front ends that keep definitions across inputs.
    pub fn eval_toplevel(
        &self,
        forms: &[Exp],
        env: &Environment,
    ) -> Result<(Option<Value>, Environment), Error> {
        self.run_sequence(forms, env, 0)
    }

    /// Evaluate a single expression.
    pub fn eval(&self, exp: &Exp, env: &Environment) -> Result<Value, Error> {
        self.eval_with_depth(exp, env, 0)
    }

    /// Evaluate a body: definitions extend the environment for the rest of
    /// the sequence, and the value of the last expression is returned.
    pub fn eval_sequence(&self, exps: &[Exp], env: &Environment) -> Result<Value, Error> {
        self.eval_body(exps, env, 0)
    }

    fn eval_body(&self, exps: &[Exp], env: &Environment, depth: usize) -> Result<Value, Error> {
        match self.run_sequence(exps, env, depth)? {
            (Some(value), _) => Ok(value),
            // A body ending in a definition has nothing left to evaluate
            (None, _) => Err(Error::EmptySequence),
        }
    }

    fn run_sequence(
        &self,
        exps: &[Exp],
        env: &Environment,
        depth: usize,
    ) -> Result<(Option<Value>, Environment), Error> {
        if exps.is_empty() {
            return Err(Error::EmptySequence);
        }

        let mut env = env.clone();
        let mut remaining = exps;
        loop {
            match remaining {
                [] => return Ok((None, env)),
                [Exp::Define { var, val }, rest @ ..] => {
                    env = self.bind_definition(&env, var, val);
                    remaining = rest;
                }
                [last] => {
                    let value = self.eval_with_depth(last, &env, depth + 1)?;
                    return Ok((Some(value), env));
                }
                [exp, rest @ ..] => {
                    self.eval_with_depth(exp, &env, depth + 1)?;
                    remaining = rest;
                }
            }
        }
    }

    /// Procedure definitions get a recursive frame so the name is visible in
    /// the procedure's own body; anything else is bound as a deferred
    /// expression over the environment preceding the definition.
    fn bind_definition(&self, env: &Environment, var: &VarDecl, val: &Exp) -> Environment {
        debug!(name = %var, "binding definition");
        match val {
            Exp::Proc { params, body } => {
                env.extend_rec(vec![var.var.clone()], vec![params.clone()], vec![body.clone()])
            }
            other => env.extend(vec![var.var.clone()], vec![other.clone()], env),
        }
    }

    fn eval_with_depth(&self, exp: &Exp, env: &Environment, depth: usize) -> Result<Value, Error> {
        if let Some(max) = self.config.max_depth
            && depth >= max
        {
            return Err(Error::EvalError(format!(
                "Evaluation depth limit exceeded (max: {max})"
            )));
        }

        match exp {
            Exp::Number(n) => Ok(Value::Number(*n)),
            Exp::Bool(b) => Ok(Value::Bool(*b)),
            Exp::Str(s) => Ok(Value::Str(s.clone())),
            Exp::Lit(value) => Ok(value.clone()),
            Exp::PrimOp(op) => Ok(Value::Primitive(*op)),
            Exp::VarRef(name) => self.eval_var_ref(name, env, depth),
            Exp::If { test, then, alt } => {
                let test_value = self.eval_with_depth(test, env, depth + 1)?;
                if test_value.is_true() {
                    self.eval_with_depth(then, env, depth + 1)
                } else {
                    self.eval_with_depth(alt, env, depth + 1)
                }
            }
            Exp::Proc { params, body } => Ok(Value::Closure(Closure::new(
                params.clone(),
                body.clone(),
                env.clone(),
            ))),
            Exp::Let { bindings, body } => self.eval_let(bindings, body, env, depth),
            Exp::Letrec { bindings, body } => self.eval_letrec(bindings, body, env, depth),
            Exp::App { rator, rands } => {
                let procedure = self.eval_with_depth(rator, env, depth + 1)?;
                self.apply_procedure(&procedure, exp, rands, env, depth)
            }
            Exp::Set { var, .. } => Err(Error::MalformedExpression(format!(
                "cannot assign to '{var}': bindings are immutable"
            ))),
            Exp::Define { .. } => Err(Error::MalformedExpression(format!(
                "definition outside of a body or program: {exp}"
            ))),
        }
    }

    /// Look up the deferred binding and evaluate it now, in its own
    /// environment. Nothing is cached for the next lookup.
    fn eval_var_ref(&self, name: &str, env: &Environment, depth: usize) -> Result<Value, Error> {
        let Deferred { exp, env: exp_env } = env.lookup(name)?;
        self.lookups.set(self.lookups.get() + 1);
        trace!(name, "forcing deferred binding");
        self.eval_with_depth(&exp, &exp_env, depth + 1)
    }

    fn eval_let(
        &self,
        bindings: &[Binding],
        body: &[Exp],
        env: &Environment,
        depth: usize,
    ) -> Result<Value, Error> {
        let names = bindings.iter().map(|b| b.var.var.clone()).collect();
        let exps = bindings.iter().map(|b| b.val.clone()).collect();
        let frame = env.extend(names, exps, env);
        self.eval_body(body, &frame, depth + 1)
    }

    fn eval_letrec(
        &self,
        bindings: &[Binding],
        body: &[Exp],
        env: &Environment,
        depth: usize,
    ) -> Result<Value, Error> {
        let mut names = Vec::with_capacity(bindings.len());
        let mut params = Vec::with_capacity(bindings.len());
        let mut bodies = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let Exp::Proc {
                params: proc_params,
                body: proc_body,
            } = &binding.val
            else {
                return Err(Error::MalformedExpression(format!(
                    "letrec binding '{}' must be a lambda, got {}",
                    binding.var, binding.val
                )));
            };
            names.push(binding.var.var.clone());
            params.push(proc_params.clone());
            bodies.push(proc_body.clone());
        }

        let frame = env.extend_rec(names, params, bodies);
        self.eval_body(body, &frame, depth + 1)
    }

    /// Apply an evaluated operator to unevaluated operands.
    ///
    /// Primitives force every operand first. Closures bind the operand
    /// expressions, paired with the caller's environment, in a frame that
    /// extends the closure's own environment.
    fn apply_procedure(
        &self,
        procedure: &Value,
        app: &Exp,
        rands: &[Exp],
        env: &Environment,
        depth: usize,
    ) -> Result<Value, Error> {
        match procedure {
            Value::Primitive(op) => {
                let args = rands
                    .iter()
                    .map(|rand| self.eval_with_depth(rand, env, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                trace!(op = op.id, argc = args.len(), "applying primitive");
                apply_primitive(op, &args)
            }
            Value::Closure(closure) => {
                if closure.params.len() != rands.len() {
                    return Err(Error::arity_error_with_expr(
                        closure.params.len(),
                        rands.len(),
                        app.to_string(),
                    ));
                }
                trace!(params = %procedure, "applying closure");
                let names = closure.params.iter().map(|p| p.var.clone()).collect();
                let frame = closure.env.extend(names, rands.to_vec(), env);
                self.eval_body(&closure.body, &frame, depth + 1)
            }
            other => Err(Error::BadProcedure(format!(
                "{other} ({}) is not a procedure",
                other.type_name()
            ))),
        }
    }
}

/// Evaluate a program against the empty environment with default settings.
pub fn eval_program(program: &[Exp]) -> Result<Value, Error> {
    Evaluator::new().eval_program(program)
}

/// Evaluate a single expression as a one-expression program.
pub fn eval_exp(exp: &Exp) -> Result<Value, Error> {
    Evaluator::new().eval_program(slice::from_ref(exp))
}

/// Parse a single expression from source text and evaluate it.
#[cfg(feature = "scheme")]
pub fn eval_normal_parse(input: &str) -> Result<Value, Error> {
    let exp = crate::scheme::parse_exp(input)?;
    eval_exp(&exp)
}
