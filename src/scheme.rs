//! Scheme source text to expression tree.
//!
//! Parsing happens in two stages. The reader (built on `nom`) turns text into
//! an [`SExpr`] tree and knows nothing about special forms. The converter then
//! turns each `SExpr` into an [`Exp`], checking that special forms have the
//! right shape, that binders are valid identifiers, and that reserved words are
//! not used as variables. Primitive operator names become [`Exp::PrimOp`] and
//! quoted data becomes an [`Exp::Lit`] value.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{cut, not, opt, recognize, value},
    error::ErrorKind,
    multi::many0,
    sequence::{pair, preceded, terminated},
};

use crate::ast::{
    Binding, Exp, NumberType, Program, SPECIAL_FORMS, SYMBOL_SPECIAL_CHARS, VarDecl,
    is_valid_symbol,
};
use crate::builtinops::find_builtin_op;
use crate::value::Value;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Reader settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Treat `;` up to the end of the line as a comment
    pub handle_comments: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
        }
    }
}

/// A datum as read from source text, before any special form is recognized.
#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    Number(NumberType),
    Bool(bool),
    Str(String),
    Symbol(String),
    List(Vec<SExpr>),
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Number(n) => write!(f, "{n}"),
            SExpr::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            SExpr::Str(s) => write!(f, "{}", Value::Str(s.clone())),
            SExpr::Symbol(s) => write!(f, "{s}"),
            SExpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

/// Blank out `;` comments, keeping byte offsets intact so error positions
/// still point into the caller's text.
fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;

    for ch in input.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                out.push(ch);
            } else {
                out.extend(std::iter::repeat_n(' ', ch.len_utf8()));
            }
            continue;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }
        match ch {
            ';' => {
                in_comment = true;
                out.push(' ');
            }
            '"' => {
                in_string = true;
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Convert a nom failure into a [`ParseError`] positioned in `input`
fn nom_error_to_parse_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = input.len().saturating_sub(e.input.len());
            let char_offset = input[..offset].chars().count();
            if e.code == ErrorKind::TooLarge {
                return ParseError::with_context(
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                    input,
                    char_offset,
                );
            }
            if e.input.trim().is_empty() {
                return ParseError::with_context(
                    ParseErrorKind::Incomplete,
                    "Unexpected end of input",
                    input,
                    char_offset,
                );
            }
            let near: String = e.input.chars().take(10).collect();
            let message = match e.code {
                ErrorKind::Char => format!("Expected character at position {char_offset}"),
                ErrorKind::Tag => format!("Unexpected token at position {char_offset}"),
                _ => format!("Invalid syntax near '{near}'"),
            };
            let mut err =
                ParseError::with_context(ParseErrorKind::InvalidSyntax, message, input, char_offset);
            err.found = Some(near);
            err
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input")
        }
    }
}

/// Succeeds without consuming when an atom ends here
fn atom_end(input: &str) -> IResult<&str, ()> {
    not(satisfy(is_symbol_char)).parse(input)
}

/// Parse a number (integer only, decimal or hexadecimal)
fn parse_number(input: &str) -> IResult<&str, SExpr> {
    terminated(alt((parse_hexadecimal, parse_decimal)), atom_end).parse(input)
}

fn parse_decimal(input: &str) -> IResult<&str, SExpr> {
    let (rest, number_str) = recognize(pair(
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;

    match number_str.parse::<NumberType>() {
        Ok(n) => Ok((rest, SExpr::Number(n))),
        // Out of range; the symbol reader rejects digit-led names too
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// `#x1F` or `#X1f`
fn parse_hexadecimal(input: &str) -> IResult<&str, SExpr> {
    let (rest, _) = char('#').parse(input)?;
    let (rest, _) = alt((char('x'), char('X'))).parse(rest)?;
    let (rest, hex_digits) = take_while1(|c: char| c.is_ascii_hexdigit()).parse(rest)?;

    match NumberType::from_str_radix(hex_digits, 16) {
        Ok(n) => Ok((rest, SExpr::Number(n))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::HexDigit,
        ))),
    }
}

fn parse_bool(input: &str) -> IResult<&str, SExpr> {
    terminated(
        alt((
            value(SExpr::Bool(true), tag("#t")),
            value(SExpr::Bool(false), tag("#f")),
        )),
        atom_end,
    )
    .parse(input)
}

fn parse_symbol(input: &str) -> IResult<&str, SExpr> {
    let (remaining, candidate) = take_while1(is_symbol_char).parse(input)?;

    if is_valid_symbol(candidate) {
        Ok((remaining, SExpr::Symbol(candidate.into())))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )))
    }
}

/// A string literal with `\n \t \r \\ \"` escapes
fn parse_string(input: &str) -> IResult<&str, SExpr> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), SExpr::Str(text))),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some(_) => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Escaped,
                        )));
                    }
                    None => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            char_iter.as_str(),
                            ErrorKind::Char,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                text.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                // Unterminated
                return Err(nom::Err::Failure(nom::error::Error::new(
                    remaining,
                    ErrorKind::Char,
                )));
            }
        }
    }
}

/// Once `(` is consumed the list must close; `cut` keeps the error where the
/// list went wrong instead of backtracking to the opening parenthesis
fn parse_list(input: &str, depth: usize) -> IResult<&str, SExpr> {
    let (input, _) = char('(').parse(input)?;
    let (input, elements) =
        many0(preceded(multispace0, |input| parse_sexpr(input, depth + 1))).parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = cut(char(')')).parse(input)?;
    Ok((input, SExpr::List(elements)))
}

/// `'datum` reads as `(quote datum)`
fn parse_quote(input: &str, depth: usize) -> IResult<&str, SExpr> {
    let (input, _) = char('\'').parse(input)?;
    let (input, datum) =
        cut(preceded(multispace0, |input| parse_sexpr(input, depth + 1))).parse(input)?;
    Ok((
        input,
        SExpr::List(vec![SExpr::Symbol("quote".into()), datum]),
    ))
}

fn parse_sexpr(input: &str, depth: usize) -> IResult<&str, SExpr> {
    if depth >= MAX_PARSE_DEPTH {
        // Failure, not Error: alternatives and repetitions must not swallow it
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    alt((
        |input| parse_quote(input, depth),
        |input| parse_list(input, depth),
        parse_number,
        parse_bool,
        parse_string,
        parse_symbol,
    ))
    .parse(input)
}

/// Read exactly one datum, surrounded by optional whitespace
fn read_datum(source: &str) -> Result<SExpr, ParseError> {
    if source.trim().is_empty() {
        return Err(ParseError::from_message(
            ParseErrorKind::Incomplete,
            "Unexpected end of input",
        ));
    }
    match terminated(preceded(multispace0, |input| parse_sexpr(input, 0)), multispace0).parse(source)
    {
        Ok(("", datum)) => Ok(datum),
        Ok((remaining, _)) => {
            let offset = source.len() - remaining.len();
            let mut err = ParseError::with_context(
                ParseErrorKind::TrailingContent,
                format!("Unexpected remaining input: '{}'", remaining.trim_end()),
                source,
                source[..offset].chars().count(),
            );
            err.found = Some(remaining.trim_end().to_owned());
            Err(err)
        }
        Err(e) => Err(nom_error_to_parse_error(source, e)),
    }
}

/// Read every datum in the source
fn read_data(source: &str) -> Result<Vec<SExpr>, ParseError> {
    let result = terminated(
        many0(preceded(multispace0, |input| parse_sexpr(input, 0))),
        multispace0,
    )
    .parse(source);

    match result {
        Ok(("", data)) => Ok(data),
        // Re-read the leftover to report why it did not parse
        Ok((remaining, _)) => match preceded(multispace0, |input| parse_sexpr(input, 0))
            .parse(remaining)
        {
            Err(e) => Err(nom_error_to_parse_error(source, e)),
            Ok(_) => Err(ParseError::from_message(
                ParseErrorKind::InvalidSyntax,
                format!("Invalid syntax near '{}'", remaining.trim()),
            )),
        },
        Err(e) => Err(nom_error_to_parse_error(source, e)),
    }
}

fn prepare(input: &str, config: ParseConfig) -> String {
    if config.handle_comments {
        strip_comments(input)
    } else {
        input.to_owned()
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Where a form appears; `define` is only legal in sequence position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Sequence,
    Operand,
}

/// Turn a binder into a [`VarDecl`], rejecting names that can never be
/// referenced as variables
fn to_var_decl(datum: &SExpr, form: &SExpr) -> Result<VarDecl, ParseError> {
    let SExpr::Symbol(name) = datum else {
        return Err(ParseError::malformed(
            format!("Expected an identifier, got {datum}"),
            form,
        ));
    };
    if SPECIAL_FORMS.contains(&name.as_str()) {
        return Err(ParseError::malformed(
            format!("Reserved word '{name}' cannot be bound"),
            form,
        ));
    }
    if find_builtin_op(name).is_some() {
        return Err(ParseError::malformed(
            format!("Primitive operator '{name}' cannot be rebound"),
            form,
        ));
    }
    Ok(VarDecl::new(name.as_str()))
}

fn to_distinct_var_decls<'a>(
    names: impl IntoIterator<Item = &'a SExpr>,
    form: &SExpr,
) -> Result<Vec<VarDecl>, ParseError> {
    let mut seen = HashSet::new();
    let mut decls = Vec::new();
    for datum in names {
        let decl = to_var_decl(datum, form)?;
        if !seen.insert(decl.var.clone()) {
            return Err(ParseError::malformed(
                format!("Duplicate binding of '{}'", decl.var),
                form,
            ));
        }
        decls.push(decl);
    }
    Ok(decls)
}

/// A non-empty sequence of body forms
fn to_body(forms: &[SExpr], form: &SExpr) -> Result<Vec<Exp>, ParseError> {
    if forms.is_empty() {
        return Err(ParseError::malformed("Body must not be empty", form));
    }
    forms
        .iter()
        .map(|datum| to_exp(datum, Position::Sequence))
        .collect()
}

/// `((name exp) ...)` of `let` and `letrec`
fn to_bindings(datum: &SExpr, form: &SExpr) -> Result<Vec<Binding>, ParseError> {
    let SExpr::List(pairs) = datum else {
        return Err(ParseError::malformed(
            "Expected a list of (name expression) bindings",
            form,
        ));
    };
    let mut names = Vec::new();
    let mut vals = Vec::new();
    for binding in pairs {
        match binding {
            SExpr::List(parts) if parts.len() == 2 => {
                names.push(&parts[0]);
                vals.push(to_exp(&parts[1], Position::Operand)?);
            }
            other => {
                return Err(ParseError::malformed(
                    format!("Binding must have the form (name expression), got {other}"),
                    form,
                ));
            }
        }
    }
    let decls = to_distinct_var_decls(names, form)?;
    Ok(decls
        .into_iter()
        .zip(vals)
        .map(|(var, val)| Binding { var, val })
        .collect())
}

/// Convert quoted data into the value it denotes
fn datum_to_value(datum: &SExpr) -> Value {
    match datum {
        SExpr::Number(n) => Value::Number(*n),
        SExpr::Bool(b) => Value::Bool(*b),
        SExpr::Str(s) => Value::Str(s.clone()),
        SExpr::Symbol(s) => Value::symbol(s.as_str()),
        SExpr::List(items) => Value::list(items.iter().map(datum_to_value)),
    }
}

fn to_special_form(
    keyword: &str,
    args: &[SExpr],
    form: &SExpr,
    position: Position,
) -> Result<Exp, ParseError> {
    match (keyword, args) {
        ("quote", [datum]) => Ok(Exp::Lit(datum_to_value(datum))),
        ("quote", _) => Err(ParseError::malformed(
            "Expected (quote <datum>)",
            form,
        )),

        ("if", [test, then, alt]) => Ok(Exp::if_exp(
            to_exp(test, Position::Operand)?,
            to_exp(then, Position::Operand)?,
            to_exp(alt, Position::Operand)?,
        )),
        ("if", _) => Err(ParseError::malformed(
            "Expected (if <test> <then> <alt>)",
            form,
        )),

        ("lambda", [SExpr::List(params), body @ ..]) => {
            let params = to_distinct_var_decls(params, form)?;
            let body = to_body(body, form)?;
            Ok(Exp::Proc {
                params: params.into(),
                body: body.into(),
            })
        }
        ("lambda", _) => Err(ParseError::malformed(
            "Expected (lambda (<params>...) <body>...)",
            form,
        )),

        ("let" | "letrec", [bindings, body @ ..]) => {
            let bindings: Rc<[Binding]> = to_bindings(bindings, form)?.into();
            let body: Rc<[Exp]> = to_body(body, form)?.into();
            Ok(if keyword == "let" {
                Exp::Let { bindings, body }
            } else {
                Exp::Letrec { bindings, body }
            })
        }
        ("let" | "letrec", _) => Err(ParseError::malformed(
            format!("Expected ({keyword} ((<name> <exp>)...) <body>...)"),
            form,
        )),

        ("set!", [var, val]) => {
            let var = to_var_decl(var, form)?;
            Ok(Exp::Set {
                var: var.var,
                val: Rc::new(to_exp(val, Position::Operand)?),
            })
        }
        ("set!", _) => Err(ParseError::malformed("Expected (set! <name> <exp>)", form)),

        ("define", _) if position == Position::Operand => Err(ParseError::malformed(
            "define is only allowed at the top level of a program or body",
            form,
        )),
        ("define", [name @ SExpr::Symbol(_), val]) => {
            let var = to_var_decl(name, form)?;
            Ok(Exp::Define {
                var,
                val: Rc::new(to_exp(val, Position::Operand)?),
            })
        }
        // (define (name params...) body...) is shorthand for a named lambda
        ("define", [SExpr::List(signature), body @ ..]) if !signature.is_empty() => {
            let var = to_var_decl(&signature[0], form)?;
            let params = to_distinct_var_decls(&signature[1..], form)?;
            let body = to_body(body, form)?;
            Ok(Exp::Define {
                var,
                val: Rc::new(Exp::Proc {
                    params: params.into(),
                    body: body.into(),
                }),
            })
        }
        ("define", _) => Err(ParseError::malformed("Expected (define <name> <exp>)", form)),

        _ => Err(ParseError::malformed(
            format!("Unknown special form '{keyword}'"),
            form,
        )),
    }
}

fn to_exp(datum: &SExpr, position: Position) -> Result<Exp, ParseError> {
    match datum {
        SExpr::Number(n) => Ok(Exp::Number(*n)),
        SExpr::Bool(b) => Ok(Exp::Bool(*b)),
        SExpr::Str(s) => Ok(Exp::Str(s.clone())),
        SExpr::Symbol(name) => {
            if SPECIAL_FORMS.contains(&name.as_str()) {
                Err(ParseError::malformed(
                    format!("Reserved word '{name}' cannot be used as a variable"),
                    datum,
                ))
            } else if let Some(op) = find_builtin_op(name) {
                Ok(Exp::PrimOp(op))
            } else {
                Ok(Exp::VarRef(name.clone()))
            }
        }
        SExpr::List(items) => match items.as_slice() {
            [] => Err(ParseError::malformed("Empty application", datum)),
            [SExpr::Symbol(keyword), args @ ..] if SPECIAL_FORMS.contains(&keyword.as_str()) => {
                to_special_form(keyword, args, datum, position)
            }
            [rator, rands @ ..] => {
                let rator = to_exp(rator, Position::Operand)?;
                let rands = rands
                    .iter()
                    .map(|rand| to_exp(rand, Position::Operand))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Exp::app(rator, rands))
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Read source text into S-expressions without interpreting special forms.
pub fn read_sexprs(input: &str, config: ParseConfig) -> Result<Vec<SExpr>, Error> {
    Ok(read_data(&prepare(input, config))?)
}

/// Parse exactly one expression.
pub fn parse_exp(input: &str) -> Result<Exp, Error> {
    parse_exp_with_config(input, ParseConfig::default())
}

pub fn parse_exp_with_config(input: &str, config: ParseConfig) -> Result<Exp, Error> {
    let datum = read_datum(&prepare(input, config))?;
    Ok(to_exp(&datum, Position::Sequence)?)
}

/// Parse zero or more top-level forms into a [`Program`].
pub fn parse_program(input: &str) -> Result<Program, Error> {
    parse_program_with_config(input, ParseConfig::default())
}

pub fn parse_program_with_config(input: &str, config: ParseConfig) -> Result<Program, Error> {
    read_sexprs(input, config)?
        .iter()
        .map(|datum| to_exp(datum, Position::Sequence).map_err(Error::from))
        .collect()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    /// Test result variants for data-driven parser tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Exp),                    // Parsing should succeed with this expression
        Kind(ParseErrorKind),            // Parsing should fail with this kind of error
        SpecificError(&'static str),     // Parsing should fail with error containing this string
    }
    use ParseTestResult::*;

    fn success(exp: Exp) -> ParseTestResult {
        Success(exp)
    }

    fn prim(id: &str) -> Exp {
        Exp::PrimOp(find_builtin_op(id).unwrap())
    }

    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let test_id = format!("#{} '{input}'", i + 1);
            match (parse_exp(input), expected) {
                (Ok(actual), Success(expected_exp)) => {
                    assert_eq!(actual, expected_exp, "{test_id}");
                }
                (Err(Error::ParseError(err)), Kind(kind)) => {
                    assert_eq!(err.kind, kind, "{test_id}: {err}");
                }
                (Err(err), SpecificError(text)) => {
                    let msg = format!("{err}");
                    assert!(msg.contains(text), "{test_id}: expected '{text}' in: {msg}");
                }
                (Ok(actual), expected) => {
                    panic!("{test_id}: expected {expected:?}, got {actual:?}");
                }
                (Err(err), expected) => {
                    panic!("{test_id}: expected {expected:?}, got error {err:?}");
                }
            }
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        let test_cases = vec![
            // ===== NUMBERS =====
            ("42", success(Exp::Number(42))),
            ("-5", success(Exp::Number(-5))),
            ("#x1A", success(Exp::Number(26))),
            ("#Xff", success(Exp::Number(255))),
            ("9223372036854775807", success(Exp::Number(i64::MAX))),
            ("-9223372036854775808", success(Exp::Number(i64::MIN))),
            ("3.14", Kind(ParseErrorKind::InvalidSyntax)),
            ("123abc", Kind(ParseErrorKind::InvalidSyntax)),
            ("99999999999999999999", Kind(ParseErrorKind::InvalidSyntax)),
            ("#xG", Kind(ParseErrorKind::InvalidSyntax)),
            // ===== BOOLEANS =====
            ("#t", success(Exp::Bool(true))),
            ("#f", success(Exp::Bool(false))),
            ("#true", Kind(ParseErrorKind::InvalidSyntax)),
            ("#T", Kind(ParseErrorKind::InvalidSyntax)),
            // ===== STRINGS =====
            ("\"hello\"", success(Exp::str("hello"))),
            (r#""tab\there""#, success(Exp::str("tab\there"))),
            (r#""quote\"d""#, success(Exp::str("quote\"d"))),
            ("\"a ; not a comment\"", success(Exp::str("a ; not a comment"))),
            (r#""bad\zescape""#, Kind(ParseErrorKind::InvalidSyntax)),
            ("\"unterminated", Kind(ParseErrorKind::Incomplete)),
            // ===== VARIABLES AND PRIMITIVES =====
            ("fact", success(Exp::var("fact"))),
            ("even?", success(Exp::var("even?"))),
            ("+", success(prim("+"))),
            ("car", success(prim("car"))),
            ("lambda", SpecificError("Reserved word 'lambda'")),
            // ===== QUOTE =====
            ("'a", success(Exp::Lit(Value::symbol("a")))),
            ("(quote a)", success(Exp::Lit(Value::symbol("a")))),
            ("'()", success(Exp::Lit(Value::empty()))),
            (
                "'(1 (b) \"c\")",
                success(Exp::Lit(Value::list([
                    Value::from(1),
                    Value::list([Value::symbol("b")]),
                    Value::from("c"),
                ]))),
            ),
            ("'(lambda if)", success(Exp::Lit(Value::list([Value::symbol("lambda"), Value::symbol("if")])))),
            ("(quote)", Kind(ParseErrorKind::Malformed)),
            // ===== IF =====
            (
                "(if #t 1 2)",
                success(Exp::if_exp(Exp::Bool(true), Exp::Number(1), Exp::Number(2))),
            ),
            ("(if #t 1)", SpecificError("Expected (if <test> <then> <alt>)")),
            // ===== LAMBDA =====
            (
                "(lambda (x y) (+ x y))",
                success(Exp::proc(["x", "y"], [Exp::app(prim("+"), [Exp::var("x"), Exp::var("y")])])),
            ),
            ("(lambda () 1)", success(Exp::proc(Vec::<String>::new(), [Exp::Number(1)]))),
            ("(lambda (x x) x)", SpecificError("Duplicate binding of 'x'")),
            ("(lambda (x))", SpecificError("Body must not be empty")),
            ("(lambda (1) 1)", Kind(ParseErrorKind::Malformed)),
            ("(lambda (if) 1)", SpecificError("Reserved word 'if' cannot be bound")),
            ("(lambda (car) car)", SpecificError("Primitive operator 'car' cannot be rebound")),
            ("(lambda x x)", Kind(ParseErrorKind::Malformed)),
            // ===== LET / LETREC =====
            (
                "(let ((x 1) (y 2)) y)",
                success(Exp::let_exp(
                    [Binding::new("x", Exp::Number(1)), Binding::new("y", Exp::Number(2))],
                    [Exp::var("y")],
                )),
            ),
            (
                "(letrec ((f (lambda (n) (f n)))) f)",
                success(Exp::letrec(
                    [Binding::new("f", Exp::proc(["n"], [Exp::app(Exp::var("f"), [Exp::var("n")])]))],
                    [Exp::var("f")],
                )),
            ),
            ("(let () 5)", success(Exp::let_exp(Vec::new(), [Exp::Number(5)]))),
            ("(let ((x 1) (x 2)) x)", SpecificError("Duplicate binding")),
            ("(let ((x)) x)", SpecificError("(name expression)")),
            ("(let ((x 1)))", SpecificError("Body must not be empty")),
            ("(let x 1)", Kind(ParseErrorKind::Malformed)),
            // ===== SET! =====
            (
                "(set! x 5)",
                success(Exp::Set {
                    var: "x".into(),
                    val: Rc::new(Exp::Number(5)),
                }),
            ),
            ("(set! x)", Kind(ParseErrorKind::Malformed)),
            // ===== DEFINE =====
            ("(define x 3)", success(Exp::define("x", Exp::Number(3)))),
            (
                "(define (id v) v)",
                success(Exp::define("id", Exp::proc(["v"], [Exp::var("v")]))),
            ),
            ("(define x)", Kind(ParseErrorKind::Malformed)),
            ("(define 5 x)", Kind(ParseErrorKind::Malformed)),
            ("(f (define x 1))", SpecificError("only allowed at the top level")),
            // ===== APPLICATION =====
            ("(f)", success(Exp::app(Exp::var("f"), Vec::new()))),
            (
                "((lambda (x) x) 1)",
                success(Exp::app(Exp::proc(["x"], [Exp::var("x")]), [Exp::Number(1)])),
            ),
            ("(  f\n\t1  )", success(Exp::app(Exp::var("f"), [Exp::Number(1)]))),
            ("()", SpecificError("Empty application")),
            // ===== READER ERRORS =====
            ("", Kind(ParseErrorKind::Incomplete)),
            ("   ", Kind(ParseErrorKind::Incomplete)),
            ("(+ 1", Kind(ParseErrorKind::Incomplete)),
            ("'", Kind(ParseErrorKind::Incomplete)),
            ("(1 2 ]", SpecificError("Expected character at position 5")),
            ("(+ 1 2))", Kind(ParseErrorKind::TrailingContent)),
            ("1 2", Kind(ParseErrorKind::TrailingContent)),
            (")", Kind(ParseErrorKind::InvalidSyntax)),
            ("test@home", Kind(ParseErrorKind::TrailingContent)),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_comments() {
        let source = "; leading comment\n(+ 1 ; inline\n 2) ; trailing";
        assert_eq!(
            parse_exp(source).unwrap(),
            Exp::app(prim("+"), [Exp::Number(1), Exp::Number(2)])
        );

        let without = ParseConfig {
            handle_comments: false,
        };
        assert!(parse_exp_with_config(source, without).is_err());

        // Offsets survive comment removal
        assert_eq!(strip_comments("a;é\nb").len(), "a;é\nb".len());
    }

    #[test]
    fn test_parse_program() {
        let program = parse_program(
            "(define x 3)
             ; the answer
             x",
        )
        .unwrap();
        assert_eq!(program, vec![Exp::define("x", Exp::Number(3)), Exp::var("x")]);

        assert_eq!(parse_program("").unwrap(), Vec::new());
        assert_eq!(parse_program("  ; only a comment").unwrap(), Vec::new());

        let cases = vec![
            ("(define x 1) (+ x", ParseErrorKind::Incomplete),
            ("1 )", ParseErrorKind::InvalidSyntax),
            ("1 (if)", ParseErrorKind::Malformed),
        ];
        for (input, kind) in cases {
            match parse_program(input) {
                Err(Error::ParseError(err)) => assert_eq!(err.kind, kind, "'{input}': {err}"),
                other => panic!("'{input}': expected {kind:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_read_sexprs_keeps_special_forms_unread() {
        let data = read_sexprs("(if 1) 'x", ParseConfig::default()).unwrap();
        assert_eq!(
            data,
            vec![
                SExpr::List(vec![SExpr::Symbol("if".into()), SExpr::Number(1)]),
                SExpr::List(vec![SExpr::Symbol("quote".into()), SExpr::Symbol("x".into())]),
            ]
        );
        assert_eq!(format!("{}", data[0]), "(if 1)");
    }

    #[test]
    fn test_malformed_error_reports_form() {
        let Err(Error::ParseError(err)) = parse_exp("(if (f) 1)") else {
            panic!("expected a parse error");
        };
        assert_eq!(err.kind, ParseErrorKind::Malformed);
        assert_eq!(err.found.as_deref(), Some("(if (f) 1)"));
    }

    #[test]
    fn test_parser_depth_limits() {
        let parens_under_limit = format!(
            "{}f{}",
            "(".repeat(MAX_PARSE_DEPTH - 1),
            ")".repeat(MAX_PARSE_DEPTH - 1)
        );
        let quotes_under_limit = format!("{}a", "'".repeat(MAX_PARSE_DEPTH - 1));
        let deep_parens_at_limit = format!(
            "{}f{}",
            "(".repeat(MAX_PARSE_DEPTH),
            ")".repeat(MAX_PARSE_DEPTH)
        );
        let deep_quotes_at_limit = format!("{}a", "'".repeat(MAX_PARSE_DEPTH));

        run_parse_tests(vec![
            (deep_parens_at_limit.as_str(), Kind(ParseErrorKind::TooDeeplyNested)),
            (deep_quotes_at_limit.as_str(), Kind(ParseErrorKind::TooDeeplyNested)),
        ]);

        assert!(
            parse_exp(&parens_under_limit).is_ok(),
            "Parens just under depth limit should parse successfully"
        );
        assert!(
            parse_exp(&quotes_under_limit).is_ok(),
            "Quotes just under depth limit should parse successfully"
        );
    }
}
