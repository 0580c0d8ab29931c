//! Expression evaluation
//!
//! Statements carry their expressions as raw text. The `Evaluator` trait is
//! the seam between the statement dispatcher and whatever evaluates that
//! text; `ExprEvaluator` is the built-in implementation: a small JavaScript
//! flavoured language with numbers, strings, booleans, null, lists, records,
//! the usual operators and the math library.
//!
//! Evaluation happens in two steps: parse the text into an `Expr` tree
//! (PEST grammar plus a Pratt parser for binary precedence), then walk the
//! tree against the caller's bindings. Parsed trees are cached by text since
//! loop conditions are evaluated over and over.

use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use thiserror::Error;

use super::types::Val;

pub mod math;


/* ===================== Public API ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("{0} is not defined")]
    UndefinedName(String),

    #[error("unknown function {0}")]
    UnknownFunction(String),

    #[error("{0} is not a function")]
    NotCallable(String),
}

/// Name resolution for bare identifiers
pub trait Bindings {
    fn lookup(&self, name: &str) -> Option<Val>;
}

impl Bindings for HashMap<String, Val> {
    fn lookup(&self, name: &str) -> Option<Val> {
        self.get(name).cloned()
    }
}

/// Host expression evaluator
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, text: &str, env: &dyn Bindings) -> Result<Val, ExprError>;
}

/// Parsed trees kept per evaluator; the cache starts over once full
const CACHE_LIMIT: usize = 1024;

/// Built-in evaluator
#[derive(Debug, Default)]
pub struct ExprEvaluator {
    cache: Mutex<HashMap<String, Arc<Expr>>>,
}

impl ExprEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn compile(&self, text: &str) -> Result<Arc<Expr>, ExprError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(expr) = cache.get(text) {
            return Ok(expr.clone());
        }
        let expr = Arc::new(parse(text)?);
        if cache.len() >= CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(text.to_string(), expr.clone());
        Ok(expr)
    }
}

impl Evaluator for ExprEvaluator {
    fn evaluate(&self, text: &str, env: &dyn Bindings) -> Result<Val, ExprError> {
        let expr = self.compile(text)?;
        eval(&expr, env)
    }
}

/* ===================== AST ===================== */

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Val),
    Ident(String),
    List(Vec<Expr>),
    Record(Vec<(String, Expr)>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        field: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    StrictEq,
    StrictNe,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

/* ===================== Parser ===================== */

#[derive(Parser)]
#[grammar = "interpreter/expressions/expr.pest"]
struct ExprParser;

fn pratt() -> &'static PrattParser<Rule> {
    static PRATT: OnceLock<PrattParser<Rule>> = OnceLock::new();
    PRATT.get_or_init(|| {
        PrattParser::new()
            .op(Op::infix(Rule::or, Assoc::Left))
            .op(Op::infix(Rule::and, Assoc::Left))
            .op(Op::infix(Rule::strict_eq, Assoc::Left)
                | Op::infix(Rule::strict_ne, Assoc::Left)
                | Op::infix(Rule::eq, Assoc::Left)
                | Op::infix(Rule::ne, Assoc::Left))
            .op(Op::infix(Rule::lt, Assoc::Left)
                | Op::infix(Rule::gt, Assoc::Left)
                | Op::infix(Rule::le, Assoc::Left)
                | Op::infix(Rule::ge, Assoc::Left))
            .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
            .op(Op::infix(Rule::mul, Assoc::Left)
                | Op::infix(Rule::div, Assoc::Left)
                | Op::infix(Rule::rem, Assoc::Left))
            .op(Op::infix(Rule::pow, Assoc::Right))
    })
}

/// Parse expression text into a tree
pub fn parse(text: &str) -> Result<Expr, ExprError> {
    let mut pairs = ExprParser::parse(Rule::expression, text)
        .map_err(|e| ExprError::Syntax(e.variant.message().to_string()))?;
    let expr = pairs
        .next()
        .and_then(|p| p.into_inner().next())
        .ok_or_else(|| ExprError::Syntax(format!("empty expression: {text}")))?;
    build_expr(expr)
}

fn malformed(rule: Rule) -> ExprError {
    ExprError::Syntax(format!("malformed {:?}", rule))
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    let rule = pair.as_rule();
    let mut inner = pair.into_inner();
    let cond = build_disjunction(inner.next().ok_or_else(|| malformed(rule))?)?;

    match (inner.next(), inner.next()) {
        (Some(then), Some(otherwise)) => Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(build_expr(then)?),
            otherwise: Box::new(build_expr(otherwise)?),
        }),
        _ => Ok(cond),
    }
}

fn build_disjunction(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    pratt()
        .map_primary(build_operand)
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::or => BinOp::Or,
                Rule::and => BinOp::And,
                Rule::strict_eq => BinOp::StrictEq,
                Rule::strict_ne => BinOp::StrictNe,
                Rule::eq => BinOp::Eq,
                Rule::ne => BinOp::Ne,
                Rule::lt => BinOp::Lt,
                Rule::gt => BinOp::Gt,
                Rule::le => BinOp::Le,
                Rule::ge => BinOp::Ge,
                Rule::add => BinOp::Add,
                Rule::sub => BinOp::Sub,
                Rule::mul => BinOp::Mul,
                Rule::div => BinOp::Div,
                Rule::rem => BinOp::Rem,
                Rule::pow => BinOp::Pow,
                other => return Err(malformed(other)),
            };
            Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs?),
                rhs: Box::new(rhs?),
            })
        })
        .parse(pair.into_inner())
}

/// `prefix* primary postfix*`: postfixes bind tighter than prefixes
fn build_operand(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    let mut prefixes = Vec::new();
    let mut expr = None;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::neg => prefixes.push(UnaryOp::Neg),
            Rule::not => prefixes.push(UnaryOp::Not),
            Rule::pos => prefixes.push(UnaryOp::Pos),
            Rule::call => {
                let callee = expr.take().ok_or_else(|| malformed(Rule::call))?;
                expr = Some(Expr::Call {
                    callee: Box::new(callee),
                    args: build_list(part.into_inner())?,
                });
            }
            Rule::member => {
                let object = expr.take().ok_or_else(|| malformed(Rule::member))?;
                let field = part
                    .into_inner()
                    .next()
                    .ok_or_else(|| malformed(Rule::member))?;
                expr = Some(Expr::Member {
                    object: Box::new(object),
                    field: field.as_str().to_string(),
                });
            }
            Rule::index => {
                let object = expr.take().ok_or_else(|| malformed(Rule::index))?;
                let index = part
                    .into_inner()
                    .next()
                    .ok_or_else(|| malformed(Rule::index))?;
                expr = Some(Expr::Index {
                    object: Box::new(object),
                    index: Box::new(build_expr(index)?),
                });
            }
            _ => expr = Some(build_primary(part)?),
        }
    }

    let mut expr = expr.ok_or_else(|| malformed(Rule::operand))?;
    for op in prefixes.into_iter().rev() {
        expr = Expr::Unary {
            op,
            expr: Box::new(expr),
        };
    }
    Ok(expr)
}

fn build_primary(pair: Pair<Rule>) -> Result<Expr, ExprError> {
    let rule = pair.as_rule();
    let expr = match rule {
        Rule::number => Expr::Lit(Val::Num(
            pair.as_str().parse().map_err(|_| malformed(rule))?,
        )),
        Rule::string => Expr::Lit(Val::Str(string_value(pair))),
        Rule::boolean => Expr::Lit(Val::Bool(pair.as_str() == "true")),
        Rule::null => Expr::Lit(Val::Null),
        Rule::undefined => Expr::Lit(Val::Undefined),
        Rule::ident => Expr::Ident(pair.as_str().to_string()),
        Rule::list => Expr::List(build_list(pair.into_inner())?),
        Rule::record => {
            let mut entries = Vec::new();
            for entry in pair.into_inner() {
                let mut parts = entry.into_inner();
                let key = parts.next().ok_or_else(|| malformed(rule))?;
                let key = match key.as_rule() {
                    Rule::string => string_value(key),
                    _ => key.as_str().to_string(),
                };
                let value = parts.next().ok_or_else(|| malformed(rule))?;
                entries.push((key, build_expr(value)?));
            }
            Expr::Record(entries)
        }
        Rule::expr => build_expr(pair)?,
        other => return Err(malformed(other)),
    };
    Ok(expr)
}

fn build_list(pairs: Pairs<Rule>) -> Result<Vec<Expr>, ExprError> {
    pairs.map(build_expr).collect()
}

/// Unescape the body of a quoted string literal
fn string_value(pair: Pair<Rule>) -> String {
    let raw = pair
        .into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or_default();

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/* ===================== Evaluation ===================== */

fn eval(expr: &Expr, env: &dyn Bindings) -> Result<Val, ExprError> {
    match expr {
        Expr::Lit(v) => Ok(v.clone()),
        Expr::Ident(name) => resolve(name, env),
        Expr::List(items) => Ok(Val::List(
            items
                .iter()
                .map(|e| eval(e, env))
                .collect::<Result<_, _>>()?,
        )),
        Expr::Record(entries) => {
            let mut map = HashMap::new();
            for (key, value) in entries {
                map.insert(key.clone(), eval(value, env)?);
            }
            Ok(Val::Obj(map))
        }
        Expr::Unary { op, expr } => {
            let v = eval(expr, env)?;
            Ok(match op {
                UnaryOp::Neg => Val::Num(-v.to_number()),
                UnaryOp::Pos => Val::Num(v.to_number()),
                UnaryOp::Not => Val::Bool(!v.is_truthy()),
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            let left = eval(lhs, env)?;
            match op {
                BinOp::And if !left.is_truthy() => Ok(left),
                BinOp::Or if left.is_truthy() => Ok(left),
                BinOp::And | BinOp::Or => eval(rhs, env),
                _ => Ok(binary(*op, &left, &eval(rhs, env)?)),
            }
        }
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            if eval(cond, env)?.is_truthy() {
                eval(then, env)
            } else {
                eval(otherwise, env)
            }
        }
        Expr::Member { object, field } => Ok(eval(object, env)?.field(field)),
        Expr::Index { object, index } => {
            let object = eval(object, env)?;
            let index = eval(index, env)?;
            Ok(index_value(&object, &index))
        }
        Expr::Call { callee, args } => {
            let name = match callee.as_ref() {
                Expr::Ident(name) => name.as_str(),
                Expr::Member { object, field } if **object == Expr::Ident("Math".into()) => {
                    field.as_str()
                }
                other => return Err(ExprError::NotCallable(describe(other))),
            };
            let args: Vec<Val> = args
                .iter()
                .map(|a| eval(a, env))
                .collect::<Result<_, _>>()?;
            math::call(name, &args)
        }
    }
}

/// Bindings first, then the math constants and the `Math` record
fn resolve(name: &str, env: &dyn Bindings) -> Result<Val, ExprError> {
    if let Some(v) = env.lookup(name) {
        return Ok(v);
    }
    if name == "Math" {
        return Ok(math::namespace());
    }
    if let Some(n) = math::constant(name) {
        return Ok(Val::Num(n));
    }
    Err(ExprError::UndefinedName(name.to_string()))
}

fn binary(op: BinOp, left: &Val, right: &Val) -> Val {
    match op {
        BinOp::Add => match (left, right) {
            (Val::Str(_) | Val::List(_) | Val::Obj(_), _)
            | (_, Val::Str(_) | Val::List(_) | Val::Obj(_)) => {
                Val::Str(format!("{}{}", left, right))
            }
            _ => Val::Num(left.to_number() + right.to_number()),
        },
        BinOp::Sub => Val::Num(left.to_number() - right.to_number()),
        BinOp::Mul => Val::Num(left.to_number() * right.to_number()),
        BinOp::Div => Val::Num(left.to_number() / right.to_number()),
        BinOp::Rem => Val::Num(left.to_number() % right.to_number()),
        BinOp::Pow => Val::Num(left.to_number().powf(right.to_number())),
        BinOp::Eq => Val::Bool(loose_eq(left, right)),
        BinOp::Ne => Val::Bool(!loose_eq(left, right)),
        BinOp::StrictEq => Val::Bool(left == right),
        BinOp::StrictNe => Val::Bool(left != right),
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => Val::Bool(compare(op, left, right)),
        // Short-circuit operators never reach here
        BinOp::And | BinOp::Or => Val::Undefined,
    }
}

fn loose_eq(left: &Val, right: &Val) -> bool {
    match (left, right) {
        (Val::Undefined | Val::Null, Val::Undefined | Val::Null) => true,
        (Val::Undefined | Val::Null, _) | (_, Val::Undefined | Val::Null) => false,
        (Val::Num(_) | Val::Bool(_), Val::Str(_) | Val::Bool(_) | Val::Num(_))
        | (Val::Str(_), Val::Num(_) | Val::Bool(_)) => left.to_number() == right.to_number(),
        _ => left == right,
    }
}

fn compare(op: BinOp, left: &Val, right: &Val) -> bool {
    if let (Val::Str(a), Val::Str(b)) = (left, right) {
        return match op {
            BinOp::Lt => a < b,
            BinOp::Gt => a > b,
            BinOp::Le => a <= b,
            _ => a >= b,
        };
    }
    let (a, b) = (left.to_number(), right.to_number());
    match op {
        BinOp::Lt => a < b,
        BinOp::Gt => a > b,
        BinOp::Le => a <= b,
        _ => a >= b,
    }
}

/// Whole non-negative numbers only. Huge values saturate to `usize::MAX`,
/// which is past the end of anything.
fn position(n: f64) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

fn index_value(object: &Val, index: &Val) -> Val {
    match (object, index) {
        (Val::List(items), Val::Num(n)) if position(*n).is_some() => position(*n)
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Val::Undefined),
        (Val::Str(s), Val::Num(n)) if position(*n).is_some() => position(*n)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Val::Str(c.to_string()))
            .unwrap_or(Val::Undefined),
        (_, Val::Str(key)) => object.field(key),
        (_, key) => object.field(&key.to_string()),
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member { object, field } => format!("{}.{}", describe(object), field),
        Expr::Lit(v) => v.to_string(),
        _ => "expression".to_string(),
    }
}
