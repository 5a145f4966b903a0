//! Persistent environments for the normal-order evaluator.
//!
//! An [`Environment`] is a reference-counted chain of immutable frames.
//! Extending an environment allocates a new frame pointing at the old one;
//! nothing is ever mutated, so environments can be shared freely between
//! closures and evaluations.
//!
//! Ordinary frames bind names to [`Deferred`] pairs: the unevaluated
//! expression and the environment it has to be evaluated in. Recursive frames
//! bind names to procedure templates, rebuilt into a `lambda` expression over
//! the recursive frame on every lookup. Because the frame never stores a
//! closure pointing back at itself, no `Rc` cycle is created.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::{Exp, VarDecl};

/// An expression waiting to be evaluated in a particular environment.
///
/// Not a thunk: nothing is cached, and each evaluation of a `Deferred` runs
/// the expression again.
#[derive(Debug, Clone, PartialEq)]
pub struct Deferred {
    pub exp: Exp,
    pub env: Environment,
}

/// Procedure template stored by a recursive frame
#[derive(Debug, Clone)]
struct ProcTemplate {
    params: Rc<[VarDecl]>,
    body: Rc<[Exp]>,
}

enum Frame {
    Empty,
    Extended {
        names: Vec<String>,
        bindings: Vec<Deferred>,
        outer: Environment,
    },
    Recursive {
        names: Vec<String>,
        procs: Vec<ProcTemplate>,
        outer: Environment,
    },
}

/// Handle to a frame chain. Cloning is an `Rc` bump.
#[derive(Clone)]
pub struct Environment(Rc<Frame>);

impl Environment {
    /// The root environment; every lookup fails here
    pub fn empty() -> Self {
        Environment(Rc::new(Frame::Empty))
    }

    /// Bind each name to its expression, to be evaluated in `evaluation_env`.
    /// Lookups of other names continue in `self`.
    pub fn extend(
        &self,
        names: Vec<String>,
        exps: Vec<Exp>,
        evaluation_env: &Environment,
    ) -> Environment {
        debug_assert_eq!(names.len(), exps.len(), "one expression per name");
        let bindings = exps
            .into_iter()
            .map(|exp| Deferred {
                exp,
                env: evaluation_env.clone(),
            })
            .collect();
        Environment(Rc::new(Frame::Extended {
            names,
            bindings,
            outer: self.clone(),
        }))
    }

    /// Bind each name to a procedure whose closure captures the new frame
    /// itself, so the procedures can refer to themselves and to each other.
    pub fn extend_rec(
        &self,
        names: Vec<String>,
        params: Vec<Rc<[VarDecl]>>,
        bodies: Vec<Rc<[Exp]>>,
    ) -> Environment {
        debug_assert_eq!(names.len(), params.len(), "one parameter list per name");
        debug_assert_eq!(names.len(), bodies.len(), "one body per name");
        let procs = params
            .into_iter()
            .zip(bodies)
            .map(|(params, body)| ProcTemplate { params, body })
            .collect();
        Environment(Rc::new(Frame::Recursive {
            names,
            procs,
            outer: self.clone(),
        }))
    }

    /// Find the nearest binding of `name`, walking outward from this frame.
    pub fn lookup(&self, name: &str) -> Result<Deferred, Error> {
        let mut env = self;
        loop {
            match env.0.as_ref() {
                Frame::Empty => return Err(Error::UnboundVariable(name.to_owned())),
                Frame::Extended {
                    names,
                    bindings,
                    outer,
                } => {
                    if let Some(pos) = names.iter().position(|n| n == name) {
                        return Ok(bindings[pos].clone());
                    }
                    env = outer;
                }
                Frame::Recursive {
                    names,
                    procs,
                    outer,
                } => {
                    if let Some(pos) = names.iter().position(|n| n == name) {
                        let template = &procs[pos];
                        return Ok(Deferred {
                            exp: Exp::Proc {
                                params: template.params.clone(),
                                body: template.body.clone(),
                            },
                            env: env.clone(),
                        });
                    }
                    env = outer;
                }
            }
        }
    }

    /// True for the root frame
    pub fn is_empty(&self) -> bool {
        matches!(self.0.as_ref(), Frame::Empty)
    }

    /// Every name visible from this frame, nearest binding first. Shadowed
    /// names are reported once.
    pub fn bound_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut env = self;
        loop {
            let (names, outer) = match env.0.as_ref() {
                Frame::Empty => return result,
                Frame::Extended { names, outer, .. } | Frame::Recursive { names, outer, .. } => {
                    (names, outer)
                }
            };
            for name in names {
                if seen.insert(name.as_str()) {
                    result.push(name.clone());
                }
            }
            env = outer;
        }
    }

    /// Identity comparison: true when both handles point at the same frame
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Environment {
    // Only the names: printing bindings would recurse into every captured frame
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bound", &self.bound_names())
            .finish()
    }
}
