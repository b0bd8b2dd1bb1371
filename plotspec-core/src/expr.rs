//! Row expressions for `filter` and `mutate`
//!
//! Grammar:
//! ```text
//! expr       := or_expr
//! or_expr    := and_expr (('or' | '||' | '|') and_expr)*
//! and_expr   := not_expr (('and' | '&&' | '&') not_expr)*
//! not_expr   := ('not' | '~' | '!') not_expr | comparison
//! comparison := additive (cmp_op additive | 'not'? 'in' list)?
//! additive   := term (('+' | '-') term)*
//! term       := unary (('*' | '/' | '//' | '%') unary)*
//! unary      := '-' unary | '+' unary | power
//! power      := atom ('**' unary)?
//! atom       := number | string | bool | 'None' | call | column | '(' expr ')'
//! column     := identifier | '`' any text '`'
//! ```
//!
//! Expressions evaluate column-wise against a whole DataSet.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, not, opt, peek, recognize, value},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

use crate::data::{parse_temporal, DataError, DataSet, Scalar};
use crate::suggest::format_unknown;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("Empty expression")]
    Empty,

    #[error("Syntax error in expression '{expr}': {detail}")]
    Syntax { expr: String, detail: String },

    #[error("{}", format_unknown("function", .0, Function::NAMES, crate::suggest::NAME_THRESHOLD))]
    UnknownFunction(String),

    #[error("Function '{name}' expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: &'static str,
        actual: usize,
    },

    #[error("Cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error(transparent)]
    Column(#[from] DataError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Sqrt,
    Log,
    Exp,
    Round,
    Floor,
    Ceil,
    Len,
    Lower,
    Upper,
}

impl Function {
    pub const NAMES: &'static [&'static str] = &[
        "abs", "sqrt", "log", "exp", "round", "floor", "ceil", "len", "lower", "upper",
    ];

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Function::Abs,
            "sqrt" => Function::Sqrt,
            "log" => Function::Log,
            "exp" => Function::Exp,
            "round" => Function::Round,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "len" => Function::Len,
            "lower" => Function::Lower,
            "upper" => Function::Upper,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Scalar),
    Column(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Call(String, Vec<Expr>),
}

/// Parse an expression string.
pub fn parse_expr(input: &str) -> Result<Expr, ExprError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ExprError::Empty);
    }

    let parsed = match or_expr(trimmed) {
        Ok(("", parsed)) => parsed,
        Ok((rest, _)) => {
            return Err(ExprError::Syntax {
                expr: trimmed.to_string(),
                detail: format!("unexpected input at '{}'", rest),
            })
        }
        Err(e) => {
            return Err(ExprError::Syntax {
                expr: trimmed.to_string(),
                detail: format!("{:?}", e),
            })
        }
    };

    parsed.check_functions()?;
    Ok(parsed)
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A keyword not followed by further identifier characters.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(kw), not(peek(satisfy(is_ident_char))))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)
}

fn fold_binary(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    rest.into_iter()
        .fold(first, |acc, (op, rhs)| Expr::Binary(op, Box::new(acc), Box::new(rhs)))
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("||"), tag("|"), keyword("or")))),
        and_expr,
    ))(input)?;
    let rest = rest.into_iter().map(|e| (BinaryOp::Or, e)).collect();
    Ok((input, fold_binary(first, rest)))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = not_expr(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("&&"), tag("&"), keyword("and")))),
        not_expr,
    ))(input)?;
    let rest = rest.into_iter().map(|e| (BinaryOp::And, e)).collect();
    Ok((input, fold_binary(first, rest)))
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(
            preceded(
                ws(alt((
                    keyword("not"),
                    tag("~"),
                    terminated(tag("!"), not(char('='))),
                ))),
                not_expr,
            ),
            |e| Expr::Not(Box::new(e)),
        ),
        comparison,
    ))(input)
}

fn comparison_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
    ))(input)
}

fn in_list(input: &str) -> IResult<&str, (bool, Vec<Expr>)> {
    let (input, negated) = map(opt(ws(keyword("not"))), |n| n.is_some())(input)?;
    let (input, _) = ws(keyword("in"))(input)?;
    let (input, list) = alt((
        delimited(
            char('['),
            separated_list0(ws(char(',')), additive),
            ws(char(']')),
        ),
        delimited(
            char('('),
            separated_list0(ws(char(',')), additive),
            ws(char(')')),
        ),
    ))(input)?;
    Ok((input, (negated, list)))
}

enum ComparisonTail {
    Op(BinaryOp, Expr),
    In(bool, Vec<Expr>),
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = additive(input)?;
    let (input, tail) = opt(alt((
        map(pair(ws(comparison_op), additive), |(op, rhs)| ComparisonTail::Op(op, rhs)),
        map(in_list, |(negated, list)| ComparisonTail::In(negated, list)),
    )))(input)?;

    let expr = match tail {
        None => lhs,
        Some(ComparisonTail::Op(op, rhs)) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
        Some(ComparisonTail::In(negated, list)) => Expr::In {
            expr: Box::new(lhs),
            list,
            negated,
        },
    };
    Ok((input, expr))
}

fn additive(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        ))),
        term,
    ))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::FloorDiv, tag("//")),
            value(BinaryOp::Div, tag("/")),
            value(BinaryOp::Mul, terminated(tag("*"), not(char('*')))),
            value(BinaryOp::Mod, tag("%")),
        ))),
        unary,
    ))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |e| Expr::Neg(Box::new(e))),
        preceded(ws(char('+')), unary),
        power,
    ))(input)
}

fn power(input: &str) -> IResult<&str, Expr> {
    let (input, base) = atom(input)?;
    let (input, exponent) = opt(preceded(ws(tag("**")), unary))(input)?;
    let expr = match exponent {
        Some(exp) => Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exp)),
        None => base,
    };
    Ok((input, expr))
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
    ))(input)
}

fn call(input: &str) -> IResult<&str, Expr> {
    let (input, (name, _, args)) = tuple((
        identifier,
        multispace0,
        delimited(
            char('('),
            separated_list0(ws(char(',')), or_expr),
            ws(char(')')),
        ),
    ))(input)?;
    Ok((input, Expr::Call(name.to_string(), args)))
}

fn atom(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(char('('), or_expr, ws(char(')'))),
        map(string_literal, |s| Expr::Literal(Scalar::text(s))),
        value(
            Expr::Literal(Scalar::Bool(true)),
            alt((keyword("True"), keyword("true"))),
        ),
        value(
            Expr::Literal(Scalar::Bool(false)),
            alt((keyword("False"), keyword("false"))),
        ),
        value(Expr::Literal(Scalar::Missing), keyword("None")),
        call,
        map(delimited(char('`'), take_while1(|c| c != '`'), char('`')), |s: &str| {
            Expr::Column(s.to_string())
        }),
        // Identifiers come before numbers so names like `nan_count` stay columns
        map(identifier, |s| Expr::Column(s.to_string())),
        map(double, |n| Expr::Literal(Scalar::number(n))),
    )))(input)
}

impl Expr {
    fn check_functions(&self) -> Result<(), ExprError> {
        match self {
            Expr::Literal(_) | Expr::Column(_) => Ok(()),
            Expr::Neg(e) | Expr::Not(e) => e.check_functions(),
            Expr::Binary(_, l, r) => {
                l.check_functions()?;
                r.check_functions()
            }
            Expr::In { expr, list, .. } => {
                expr.check_functions()?;
                list.iter().try_for_each(Expr::check_functions)
            }
            Expr::Call(name, args) => {
                if Function::from_name(name).is_none() {
                    return Err(ExprError::UnknownFunction(name.clone()));
                }
                args.iter().try_for_each(Expr::check_functions)
            }
        }
    }

    /// Column names referenced anywhere in the expression, in first-seen order.
    pub fn columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Column(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Neg(e) | Expr::Not(e) => e.collect_columns(out),
            Expr::Binary(_, l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Expr::In { expr, list, .. } => {
                expr.collect_columns(out);
                list.iter().for_each(|e| e.collect_columns(out));
            }
            Expr::Call(_, args) => args.iter().for_each(|e| e.collect_columns(out)),
        }
    }

    /// Evaluate against every row of `data`.
    pub fn evaluate(&self, data: &DataSet) -> Result<Vec<Scalar>, ExprError> {
        let rows = data.n_rows();
        match self {
            Expr::Literal(v) => Ok(vec![v.clone(); rows]),
            Expr::Column(name) => Ok(data.require_column(name)?.values.clone()),
            Expr::Neg(e) => e
                .evaluate(data)?
                .into_iter()
                .map(|v| match v {
                    Scalar::Missing => Ok(Scalar::Missing),
                    other => match other.as_f64() {
                        Some(n) => Ok(Scalar::number(-n)),
                        None => Err(ExprError::TypeMismatch {
                            op: "-",
                            left: other.kind_name(),
                            right: other.kind_name(),
                        }),
                    },
                })
                .collect(),
            Expr::Not(e) => Ok(e
                .evaluate(data)?
                .into_iter()
                .map(|v| match v {
                    Scalar::Missing => Scalar::Missing,
                    other => Scalar::Bool(!truthy(&other)),
                })
                .collect()),
            Expr::Binary(op, l, r) => {
                let left = l.evaluate(data)?;
                let right = r.evaluate(data)?;
                left.iter()
                    .zip(right.iter())
                    .map(|(a, b)| apply_binary(*op, a, b))
                    .collect()
            }
            Expr::In {
                expr,
                list,
                negated,
            } => {
                let subject = expr.evaluate(data)?;
                let candidates = list
                    .iter()
                    .map(|e| e.evaluate(data))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(subject
                    .iter()
                    .enumerate()
                    .map(|(row, v)| {
                        let found = candidates.iter().any(|c| scalar_eq(v, &c[row]));
                        Scalar::Bool(found != *negated)
                    })
                    .collect())
            }
            Expr::Call(name, args) => {
                let function = Function::from_name(name)
                    .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
                let args = args
                    .iter()
                    .map(|a| a.evaluate(data))
                    .collect::<Result<Vec<_>, _>>()?;
                apply_function(function, name, &args, rows)
            }
        }
    }
}

fn truthy(v: &Scalar) -> bool {
    match v {
        Scalar::Missing => false,
        Scalar::Bool(b) => *b,
        Scalar::Number(n) => *n != 0.0,
        Scalar::Text(s) => !s.is_empty(),
        Scalar::Temporal(_) => true,
    }
}

fn scalar_eq(a: &Scalar, b: &Scalar) -> bool {
    match (a, b) {
        (Scalar::Missing, _) | (_, Scalar::Missing) => false,
        (Scalar::Text(s), Scalar::Temporal(t)) | (Scalar::Temporal(t), Scalar::Text(s)) => {
            parse_temporal(s).map_or(false, |p| p == t.at())
        }
        (Scalar::Text(x), Scalar::Text(y)) => x == y,
        (Scalar::Temporal(x), Scalar::Temporal(y)) => x == y,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn scalar_order(
    op: BinaryOp,
    a: &Scalar,
    b: &Scalar,
) -> Result<Option<std::cmp::Ordering>, ExprError> {
    let ordering = match (a, b) {
        (Scalar::Missing, _) | (_, Scalar::Missing) => return Ok(None),
        (Scalar::Text(x), Scalar::Text(y)) => Some(x.cmp(y)),
        (Scalar::Temporal(x), Scalar::Temporal(y)) => Some(x.at().cmp(&y.at())),
        (Scalar::Temporal(t), Scalar::Text(s)) => parse_temporal(s).map(|p| t.at().cmp(&p)),
        (Scalar::Text(s), Scalar::Temporal(t)) => parse_temporal(s).map(|p| p.cmp(&t.at())),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };
    match ordering {
        Some(o) => Ok(Some(o)),
        None => Err(ExprError::TypeMismatch {
            op: op.symbol(),
            left: a.kind_name(),
            right: b.kind_name(),
        }),
    }
}

fn apply_binary(op: BinaryOp, a: &Scalar, b: &Scalar) -> Result<Scalar, ExprError> {
    use std::cmp::Ordering::*;

    match op {
        BinaryOp::And => Ok(Scalar::Bool(truthy(a) && truthy(b))),
        BinaryOp::Or => Ok(Scalar::Bool(truthy(a) || truthy(b))),
        BinaryOp::Eq => Ok(Scalar::Bool(scalar_eq(a, b))),
        BinaryOp::Ne => Ok(Scalar::Bool(!scalar_eq(a, b))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let result = scalar_order(op, a, b)?.map_or(false, |o| match op {
                BinaryOp::Lt => o == Less,
                BinaryOp::Le => o != Greater,
                BinaryOp::Gt => o == Greater,
                _ => o != Less,
            });
            Ok(Scalar::Bool(result))
        }
        _ => arithmetic(op, a, b),
    }
}

fn arithmetic(op: BinaryOp, a: &Scalar, b: &Scalar) -> Result<Scalar, ExprError> {
    if a.is_missing() || b.is_missing() {
        return Ok(Scalar::Missing);
    }
    if let (BinaryOp::Add, Scalar::Text(x), Scalar::Text(y)) = (op, a, b) {
        return Ok(Scalar::Text(format!("{}{}", x, y)));
    }
    let (x, y) = match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(ExprError::TypeMismatch {
                op: op.symbol(),
                left: a.kind_name(),
                right: b.kind_name(),
            })
        }
    };
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::FloorDiv => (x / y).floor(),
        // Sign follows the divisor
        BinaryOp::Mod => x - y * (x / y).floor(),
        BinaryOp::Pow => x.powf(y),
        _ => unreachable!("non-arithmetic operator {:?}", op),
    };
    Ok(Scalar::number(result))
}

fn apply_function(
    function: Function,
    name: &str,
    args: &[Vec<Scalar>],
    rows: usize,
) -> Result<Vec<Scalar>, ExprError> {
    let arity = |expected: &'static str, ok: bool| {
        if ok {
            Ok(())
        } else {
            Err(ExprError::Arity {
                name: name.to_string(),
                expected,
                actual: args.len(),
            })
        }
    };

    match function {
        Function::Round => arity("1 or 2", matches!(args.len(), 1 | 2))?,
        _ => arity("1", args.len() == 1)?,
    }

    let mut out = Vec::with_capacity(rows);
    for row in 0..rows {
        let v = &args[0][row];
        if v.is_missing() {
            out.push(Scalar::Missing);
            continue;
        }
        let result = match function {
            Function::Len | Function::Lower | Function::Upper => {
                let s = v.as_str().ok_or(ExprError::TypeMismatch {
                    op: Function::NAMES[function as usize],
                    left: v.kind_name(),
                    right: "text",
                })?;
                match function {
                    Function::Len => Scalar::Number(s.chars().count() as f64),
                    Function::Lower => Scalar::Text(s.to_lowercase()),
                    _ => Scalar::Text(s.to_uppercase()),
                }
            }
            _ => {
                let n = v.as_f64().ok_or(ExprError::TypeMismatch {
                    op: Function::NAMES[function as usize],
                    left: v.kind_name(),
                    right: "numeric",
                })?;
                let r = match function {
                    Function::Abs => n.abs(),
                    Function::Sqrt => n.sqrt(),
                    Function::Log => n.ln(),
                    Function::Exp => n.exp(),
                    Function::Floor => n.floor(),
                    Function::Ceil => n.ceil(),
                    _ => {
                        let digits = args.get(1).and_then(|d| d[row].as_f64()).unwrap_or(0.0);
                        let scale = 10f64.powi(digits as i32);
                        (n * scale).round() / scale
                    }
                };
                Scalar::number(r)
            }
        };
        out.push(result);
    }
    Ok(out)
}
