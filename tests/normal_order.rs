//! End-to-end behaviour of the normal-order evaluator: source text in,
//! values or errors out.

#![expect(clippy::unwrap_used)] // test code OK

use normeval::builtinops::find_builtin_op;
use normeval::scheme::parse_program;
use normeval::{Environment, Error, Evaluator, Exp, Value, eval_normal_parse, eval_program};
use pretty_assertions::assert_eq;

fn run(source: &str) -> Result<Value, Error> {
    eval_program(&parse_program(source).unwrap())
}

fn prim(id: &str) -> Exp {
    Exp::PrimOp(find_builtin_op(id).unwrap())
}

#[test]
fn test_end_to_end_scenarios() {
    let cases: Vec<(&str, Result<Value, Error>)> = vec![
        ("5", Ok(Value::Number(5))),
        ("(if #t 1 2)", Ok(Value::Number(1))),
        ("(define x 3) x", Ok(Value::Number(3))),
        ("((lambda (x y) x) 1 (/ 1 0))", Ok(Value::Number(1))),
        ("(let ((x (/ 1 0))) 5)", Ok(Value::Number(5))),
        (
            "(define fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1))))))
             (fact 5)",
            Ok(Value::Number(120)),
        ),
        (
            "(letrec ((even? (lambda (n) (if (= n 0) #t (odd? (- n 1)))))
                      (odd? (lambda (n) (if (= n 0) #f (even? (- n 1))))))
               (list (even? 7) (odd? 7)))",
            Ok(Value::list([Value::Bool(false), Value::Bool(true)])),
        ),
        // Only the chosen branch is evaluated
        ("(if (< 1 2) 'yes (car '()))", Ok(Value::symbol("yes"))),
        ("(if #f (car '()) \"no\")", Ok(Value::from("no"))),
        // Every value but #f selects the then-branch
        ("(if '() 1 2)", Ok(Value::Number(1))),
        ("(if 0 1 2)", Ok(Value::Number(1))),
        ("(5 3)", Err(Error::BadProcedure("5 (number) is not a procedure".into()))),
        ("nothing", Err(Error::UnboundVariable("nothing".into()))),
        ("(define x 3)", Err(Error::EmptySequence)),
        ("", Err(Error::EmptySequence)),
    ];

    for (source, expected) in cases {
        assert_eq!(run(source), expected, "{source}");
    }
}

#[test]
fn test_failing_operand_surfaces_only_when_used() {
    let source = "(define first (lambda (a b) a))
                  ((lambda (x) (first 1 x)) (/ 1 0))";
    assert_eq!(run(source), Ok(Value::Number(1)));

    let source = "((lambda (x) (first x 1)) (/ 1 0))";
    let program = parse_program(source).unwrap();
    let env = Environment::empty();
    let evaluator = Evaluator::new();
    let defs = parse_program("(define first (lambda (a b) a))").unwrap();
    let (_, env) = evaluator.eval_toplevel(&defs, &env).unwrap();
    assert_eq!(
        evaluator.eval_sequence(&program, &env),
        Err(Error::EvalError("Division by zero".into()))
    );
}

#[test]
fn test_toplevel_definitions_persist() {
    let evaluator = Evaluator::new();
    let env = Environment::empty();

    let (value, env) = evaluator
        .eval_toplevel(&parse_program("(define sq (lambda (n) (* n n)))").unwrap(), &env)
        .unwrap();
    assert_eq!(value, None);

    let (value, env) = evaluator
        .eval_toplevel(&parse_program("(define y (sq 4)) (+ y 1)").unwrap(), &env)
        .unwrap();
    assert_eq!(value, Some(Value::Number(17)));
    assert_eq!(env.bound_names(), vec!["y".to_owned(), "sq".to_owned()]);
}

#[test]
fn test_eval_normal_parse_reports_parse_errors() {
    assert_eq!(eval_normal_parse("((lambda (x) (* x x)) 7)"), Ok(Value::Number(49)));
    assert!(matches!(eval_normal_parse("(if 1)"), Err(Error::ParseError(_))));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn literal() -> impl Strategy<Value = (Exp, Value)> {
        prop_oneof![
            any::<i64>().prop_map(|n| (Exp::Number(n), Value::Number(n))),
            any::<bool>().prop_map(|b| (Exp::Bool(b), Value::Bool(b))),
            "[a-zA-Z0-9 ]{0,12}".prop_map(|s| (Exp::str(s.as_str()), Value::from(s))),
            "[a-z]{1,6}".prop_map(|s| (Exp::Lit(Value::symbol(s.as_str())), Value::symbol(s))),
        ]
    }

    /// Identifiers that are neither special forms nor primitive names
    fn free_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9?!-]{0,8}".prop_filter("must be an ordinary variable", |name| {
            !matches!(
                name.as_str(),
                "define" | "lambda" | "if" | "let" | "letrec" | "set!" | "quote"
            ) && find_builtin_op(name).is_none()
        })
    }

    proptest! {
        #[test]
        fn literals_evaluate_to_themselves((exp, expected) in literal(), shadow in free_identifier()) {
            let evaluator = Evaluator::new();
            let root = Environment::empty();
            let env = root.extend(vec![shadow], vec![Exp::Number(0)], &root);

            prop_assert_eq!(evaluator.eval(&exp, &root), Ok(expected.clone()));
            prop_assert_eq!(evaluator.eval(&exp, &env), Ok(expected));
            prop_assert_eq!(evaluator.lookups(), 0);
        }

        #[test]
        fn unbound_variables_fail(name in free_identifier()) {
            prop_assert_eq!(
                eval_normal_parse(&name),
                Err(Error::UnboundVariable(name.clone()))
            );
        }

        #[test]
        fn unused_operands_are_never_evaluated(n in any::<i64>()) {
            let source = format!("((lambda (x y) x) {n} (/ 1 0))");
            prop_assert_eq!(eval_normal_parse(&source), Ok(Value::Number(n)));
        }

        #[test]
        fn each_reference_reevaluates_the_operand(k in 1usize..8) {
            // ((lambda (x) (list x x ...)) ((lambda (y) y) 5))
            let body = Exp::app(prim("list"), vec![Exp::var("x"); k]);
            let operand = Exp::app(Exp::proc(["y"], [Exp::var("y")]), [Exp::Number(5)]);
            let exp = Exp::app(Exp::proc(["x"], [body]), [operand]);

            let evaluator = Evaluator::new();
            let value = evaluator.eval(&exp, &Environment::empty());
            prop_assert_eq!(value, Ok(Value::list(vec![Value::Number(5); k])));
            // One lookup of x and one of y per reference
            prop_assert_eq!(evaluator.lookups(), 2 * k);
        }
    }
}
