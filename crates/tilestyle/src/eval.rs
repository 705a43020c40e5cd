//! Interpreter that applies parsed statements to a stylesheet
//!
//! Top-level statements declare sources, layers and document properties;
//! layer-body statements go through the [`LayerBuilder`]. Expressions are
//! evaluated eagerly into [`Value`]s: literal arithmetic folds natively, and
//! anything touching a feature field builds an [`Expression`].

use std::path::PathBuf;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::ast::surface::{Expr, Stmt, SurfaceArg};
use crate::ast::{Arg, BinOp, Literal, UnaryOp};
use crate::color::ColorValue;
use crate::expr::{Combinator, Expression, merge};
use crate::extension::ExtensionRegistry;
use crate::layer::{Layer, LayerBuilder, value_of};
use crate::stylesheet::Stylesheet;
use crate::value::{Value, ValueMap, ZoomRange};
use crate::{CompileError, TilestyleError, parse};

type Result<T> = std::result::Result<T, CompileError>;

/// Includes nested deeper than this are assumed to be cyclic
const MAX_INCLUDE_DEPTH: usize = 32;

/// Names in scope while evaluating an expression
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    extensions: &'a ExtensionRegistry,
    layer: Option<&'a Layer>,
}

impl<'a> Scope<'a> {
    pub fn top_level(sheet: &'a Stylesheet) -> Self {
        Self {
            extensions: sheet.extensions(),
            layer: None,
        }
    }

    pub fn layer(builder: &'a LayerBuilder<'_>) -> Self {
        Self {
            extensions: builder.stylesheet().extensions(),
            layer: Some(builder.layer()),
        }
    }
}

// ============ Statements ============

/// Apply top-level statements to `sheet`
pub fn eval_program(stmts: &[Stmt], sheet: &mut Stylesheet) -> std::result::Result<(), TilestyleError> {
    eval_top_level(stmts, sheet, 0)
}

fn eval_top_level(
    stmts: &[Stmt],
    sheet: &mut Stylesheet,
    depth: usize,
) -> std::result::Result<(), TilestyleError> {
    for stmt in stmts {
        let args = eval_args(&stmt.args, Scope::top_level(sheet))?;
        match stmt.name.as_str() {
            "source" => {
                no_block(stmt)?;
                let (name, options) = name_and_options(args, "source")?;
                sheet.source(name, options);
            }
            "layer" => {
                let (id, options) = name_and_options(args, "layer")?;
                let body = stmt.block.as_deref().unwrap_or_default();
                sheet.layer(&id, options, |b| eval_body(body, b))?;
            }
            "include" => {
                no_block(stmt)?;
                let filename = string_arg(&args, 0, "include")?;
                if depth >= MAX_INCLUDE_DEPTH {
                    return Err(CompileError::Argument(format!(
                        "include `{filename}` nested more than {MAX_INCLUDE_DEPTH} deep"
                    ))
                    .into());
                }
                let text = sheet
                    .resolver()
                    .resolve(sheet.base_dir(), &filename)
                    .map_err(|source| CompileError::Include {
                        path: PathBuf::from(&filename),
                        source,
                    })?;
                debug!("including `{filename}`");
                let included = parse::parse(&text)?;
                eval_top_level(&included, sheet, depth + 1)?;
            }
            name => {
                no_block(stmt)?;
                let value = args.into_iter().next().unwrap_or(Value::Null);
                sheet.set_property(name, value);
            }
        }
    }
    Ok(())
}

/// Apply statements inside a layer body
pub fn eval_body(stmts: &[Stmt], builder: &mut LayerBuilder<'_>) -> Result<()> {
    for stmt in stmts {
        let args = eval_args(&stmt.args, Scope::layer(builder))?;
        let body = stmt.block.as_deref().unwrap_or_default();
        match stmt.name.as_str() {
            "on" => builder.on(args, |child| eval_body(body, child))?,
            "cascade" => builder.cascade(args, |b| eval_body(body, b))?,
            "uncascaded" => {
                no_block(stmt)?;
                builder.uncascaded(args);
            }
            "filter" => {
                no_block(stmt)?;
                builder.filter(args);
            }
            "id" => {
                no_block(stmt)?;
                builder.id(string_arg(&args, 0, "id")?);
            }
            "suppress" => {
                no_block(stmt)?;
                builder.suppress();
            }
            name => {
                no_block(stmt)?;
                if let Some(value) = builder.call(name, args)? {
                    trace!("statement `{name}` evaluated to {} and was discarded", value.to_json());
                }
            }
        }
    }
    Ok(())
}

fn no_block(stmt: &Stmt) -> Result<()> {
    match stmt.block {
        Some(_) => Err(CompileError::Argument(format!(
            "`{}` does not take a block",
            stmt.name
        ))),
        None => Ok(()),
    }
}

/// `name, key: value, ...` → (name, options)
fn name_and_options(mut args: Vec<Value>, what: &str) -> Result<(String, ValueMap)> {
    let options = match args.last() {
        Some(Value::Map(_)) if args.len() > 1 => match args.pop() {
            Some(Value::Map(map)) => map,
            _ => IndexMap::new(),
        },
        _ => IndexMap::new(),
    };
    let name = string_arg(&args, 0, what)?;
    if args.len() > 1 {
        return Err(CompileError::Argument(format!(
            "{what} takes a name and options, got {} arguments",
            args.len()
        )));
    }
    Ok((name, options))
}

// ============ Expressions ============

/// Evaluate call arguments; keyword arguments become one trailing mapping
pub fn eval_args(args: &[SurfaceArg], scope: Scope<'_>) -> Result<Vec<Value>> {
    let mut positional = Vec::with_capacity(args.len());
    let mut keywords = IndexMap::new();
    for arg in args {
        match arg {
            Arg::Positional(e) => positional.push(eval_expr(e, scope)?),
            Arg::Keyword(name, e) => {
                keywords.insert(name.clone(), eval_expr(e, scope)?);
            }
        }
    }
    if !keywords.is_empty() {
        positional.push(Value::Map(keywords));
    }
    Ok(positional)
}

pub fn eval_expr(expr: &Expr, scope: Scope<'_>) -> Result<Value> {
    match expr {
        Expr::Literal(lit) => Ok(literal_value(lit)),
        Expr::Ident(name) => value_of(name, Vec::new(), scope.extensions),
        Expr::List(items) => Ok(Value::List(eval_list(items, scope)?)),
        Expr::Range(lower, upper) => eval_range(lower.as_deref(), upper.as_deref(), scope),
        Expr::Call(name, args) => eval_call(name, args, scope),
        Expr::Method(receiver, name, args) => eval_method(receiver, name, args, scope),
        Expr::Index(receiver, items) => eval_index(receiver, items, scope),
        Expr::BinaryOp(lhs, op, rhs) => {
            let lhs = eval_expr(lhs, scope)?;
            let rhs = eval_expr(rhs, scope)?;
            eval_binop(lhs, *op, rhs)
        }
        Expr::UnaryOp(op, operand) => eval_unaryop(*op, eval_expr(operand, scope)?),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn eval_list(items: &[Expr], scope: Scope<'_>) -> Result<Vec<Value>> {
    items.iter().map(|e| eval_expr(e, scope)).collect()
}

fn eval_range(lower: Option<&Expr>, upper: Option<&Expr>, scope: Scope<'_>) -> Result<Value> {
    let bound = |e: Option<&Expr>| -> Result<Option<serde_json::Number>> {
        let Some(e) = e else {
            return Ok(None);
        };
        let value = eval_expr(e, scope)?;
        value
            .as_number()
            .map(Some)
            .ok_or_else(|| CompileError::Argument(format!("zoom bound must be a number, got {}", value.to_json())))
    };
    Ok(Value::Range(ZoomRange::new(bound(lower)?, bound(upper)?)))
}

fn eval_call(name: &str, args: &[SurfaceArg], scope: Scope<'_>) -> Result<Value> {
    let args = eval_args(args, scope)?;
    match name {
        "current_value" => {
            let Some(layer) = scope.layer else {
                return Err(CompileError::Argument(
                    "current_value is only available inside a layer".to_string(),
                ));
            };
            let property = string_arg(&args, 0, name)?;
            Ok(layer.get(&property).cloned().unwrap_or(Value::Null))
        }
        "hsl" => {
            let [h, s, l] = three_numbers(&args, name)?;
            Ok(Value::Color(ColorValue::from_hsl(h, s, l)))
        }
        "hsluv" => {
            let [h, s, l] = three_numbers(&args, name)?;
            Ok(Value::Color(ColorValue::from_hsluv(h, s, l)))
        }
        _ => match value_of(name, args, scope.extensions)? {
            // a call that fell through to a field read names nothing we know
            Value::Expr(e) if e.operator() == Some("get") && !crate::expr::is_function(name) => {
                Err(CompileError::UnknownIdentifier(name.to_string()))
            }
            value => Ok(value),
        },
    }
}

const COLOR_METHODS: &[&str] = &[
    "darken", "lighten", "saturate", "desaturate", "spin", "greyscale", "grayscale", "mix",
    "rgb_mix",
];

fn eval_method(receiver: &Expr, name: &str, args: &[SurfaceArg], scope: Scope<'_>) -> Result<Value> {
    let receiver = eval_expr(receiver, scope)?;
    let args = eval_args(args, scope)?;

    if COLOR_METHODS.contains(&name) {
        let color = match &receiver {
            Value::Color(c) => Some(*c),
            Value::Int(n) => ColorValue::from_hex_int(*n),
            _ => None,
        };
        if let Some(color) = color {
            return eval_color_method(color, name, &args);
        }
    }

    let subject = receiver.into_expression();
    let result = match name {
        "in" | "is_in" => Some(subject.is_in(args)),
        "is" => Some(subject.eq(single_arg(args, name)?)),
        "at" => Some(subject.at(single_arg(args, name)?)),
        "index_of" => Some(subject.index_of(single_arg(args, name)?)),
        _ => subject.method(name, args),
    };
    result
        .map(Value::Expr)
        .ok_or_else(|| CompileError::Argument(format!("unknown method `.{name}`")))
}

fn eval_color_method(color: ColorValue, name: &str, args: &[Value]) -> Result<Value> {
    let mixed = |args: &[Value]| -> Result<(ColorValue, f64)> {
        let other = match args.first() {
            Some(Value::Color(c)) => *c,
            Some(Value::Int(n)) => ColorValue::from_hex_int(*n).ok_or_else(|| {
                CompileError::Argument(format!("{name}: {n:#x} is not a color"))
            })?,
            _ => return Err(CompileError::Argument(format!("{name} expects a color"))),
        };
        let weight = match args.get(1) {
            Some(v) => number(v, name)?,
            None => 50.0,
        };
        Ok((other, weight))
    };

    let color = match name {
        "darken" => color.darken(number_arg(args, 0, name)?),
        "lighten" => color.lighten(number_arg(args, 0, name)?),
        "saturate" => color.saturate(number_arg(args, 0, name)?),
        "desaturate" => color.desaturate(number_arg(args, 0, name)?),
        "spin" => color.spin(number_arg(args, 0, name)?),
        "greyscale" | "grayscale" => color.greyscale(),
        "mix" => {
            let (other, weight) = mixed(args)?;
            color.mix(other, weight)
        }
        "rgb_mix" => {
            let (other, weight) = mixed(args)?;
            color.rgb_mix(other, weight)
        }
        _ => return Err(CompileError::Argument(format!("unknown color method `.{name}`"))),
    };
    Ok(Value::Color(color))
}

/// `any[a, b]` / `all[a, b]` build combinators; anything else is `at`
fn eval_index(receiver: &Expr, items: &[Expr], scope: Scope<'_>) -> Result<Value> {
    let items = eval_list(items, scope)?;
    if let Expr::Ident(name) = receiver {
        match name.as_str() {
            "any" => return Ok(Expression::any(items).into()),
            "all" => return Ok(Expression::all(items).into()),
            _ => {}
        }
    }
    let receiver = eval_expr(receiver, scope)?;
    let index = single_arg(items, "[]")?;
    Ok(receiver.into_expression().at(index).into())
}

pub fn eval_binop(lhs: Value, op: BinOp, rhs: Value) -> Result<Value> {
    if let Some(folded) = fold(&lhs, op, &rhs)? {
        return Ok(folded);
    }
    let lhs = lhs.into_expression();
    Ok(match op {
        BinOp::Add => lhs.add(rhs),
        BinOp::Sub => lhs.sub(rhs),
        BinOp::Mul => lhs.mul(rhs),
        BinOp::Div => lhs.div(rhs),
        BinOp::Mod => lhs.modulo(rhs),
        BinOp::Pow => lhs.pow(rhs),
        BinOp::Eq => lhs.eq(rhs),
        BinOp::Ne => lhs.ne(rhs),
        BinOp::Lt => lhs.lt(rhs),
        BinOp::Le => lhs.le(rhs),
        BinOp::Gt => lhs.gt(rhs),
        BinOp::Ge => lhs.ge(rhs),
        BinOp::And => merge(Combinator::All, lhs, Some(rhs.into_expression())),
        BinOp::Or => merge(Combinator::Any, lhs, Some(rhs.into_expression())),
    }
    .into())
}

/// Evaluate natively when neither side is an expression
fn fold(lhs: &Value, op: BinOp, rhs: &Value) -> Result<Option<Value>> {
    if matches!(op, BinOp::And | BinOp::Or) || lhs.is_expression() || rhs.is_expression() {
        return Ok(None);
    }
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => fold_ints(*a, op, *b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (Some(a), Some(b)) = (as_f64(lhs), as_f64(rhs)) else {
                return Ok(None);
            };
            Ok(Some(fold_floats(a, op, b)))
        }
        (Value::String(a), Value::String(b)) => Ok(match op {
            BinOp::Add => Some(Value::String(format!("{a}{b}"))),
            BinOp::Eq => Some(Value::Bool(a == b)),
            BinOp::Ne => Some(Value::Bool(a != b)),
            BinOp::Lt => Some(Value::Bool(a < b)),
            BinOp::Le => Some(Value::Bool(a <= b)),
            BinOp::Gt => Some(Value::Bool(a > b)),
            BinOp::Ge => Some(Value::Bool(a >= b)),
            _ => None,
        }),
        _ => Ok(match op {
            BinOp::Eq => Some(Value::Bool(lhs == rhs)),
            BinOp::Ne => Some(Value::Bool(lhs != rhs)),
            _ => None,
        }),
    }
}

fn fold_ints(a: i64, op: BinOp, b: i64) -> Result<Option<Value>> {
    let overflow = || CompileError::Argument(format!("integer overflow in {a} {op:?} {b}"));
    let value = match op {
        BinOp::Add => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
        BinOp::Sub => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
        BinOp::Mul => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
        BinOp::Div | BinOp::Mod if b == 0 => {
            return Err(CompileError::Argument("division by zero".to_string()));
        }
        // floored, like native integer division
        BinOp::Div => {
            let q = a.checked_div(b).ok_or_else(overflow)?;
            Value::Int(if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q })
        }
        BinOp::Mod => {
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        BinOp::Pow => match u32::try_from(b) {
            Ok(exp) => Value::Int(a.checked_pow(exp).ok_or_else(overflow)?),
            Err(_) => Value::Float((a as f64).powf(b as f64)),
        },
        BinOp::Eq => Value::Bool(a == b),
        BinOp::Ne => Value::Bool(a != b),
        BinOp::Lt => Value::Bool(a < b),
        BinOp::Le => Value::Bool(a <= b),
        BinOp::Gt => Value::Bool(a > b),
        BinOp::Ge => Value::Bool(a >= b),
        BinOp::And | BinOp::Or => return Ok(None),
    };
    Ok(Some(value))
}

fn fold_floats(a: f64, op: BinOp, b: f64) -> Value {
    match op {
        BinOp::Add => Value::Float(a + b),
        BinOp::Sub => Value::Float(a - b),
        BinOp::Mul => Value::Float(a * b),
        BinOp::Div => Value::Float(a / b),
        BinOp::Mod => Value::Float(a - b * (a / b).floor()),
        BinOp::Pow => Value::Float(a.powf(b)),
        BinOp::Eq => Value::Bool(a == b),
        BinOp::Ne => Value::Bool(a != b),
        BinOp::Lt => Value::Bool(a < b),
        BinOp::Le => Value::Bool(a <= b),
        BinOp::Gt => Value::Bool(a > b),
        BinOp::Ge => Value::Bool(a >= b),
        BinOp::And | BinOp::Or => Value::Null,
    }
}

fn eval_unaryop(op: UnaryOp, operand: Value) -> Result<Value> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| CompileError::Argument(format!("integer overflow negating {n}"))),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, Value::Expr(e)) => Ok(Expression::raw("-", vec![Value::Expr(e)]).into()),
        (UnaryOp::Neg, other) => Err(CompileError::Argument(format!(
            "can't negate {}",
            other.to_json()
        ))),
        (UnaryOp::Not, Value::Expr(e)) => Ok(e.not().into()),
        (UnaryOp::Not, other) => Ok(Value::Bool(!other.is_truthy())),
    }
}

// ============ Argument helpers ============

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn number(value: &Value, fn_name: &str) -> Result<f64> {
    as_f64(value).ok_or_else(|| {
        CompileError::Argument(format!("{fn_name} expects a number, got {}", value.to_json()))
    })
}

fn number_arg(args: &[Value], idx: usize, fn_name: &str) -> Result<f64> {
    let value = args
        .get(idx)
        .ok_or_else(|| CompileError::Argument(format!("{fn_name} requires argument {}", idx + 1)))?;
    number(value, fn_name)
}

fn three_numbers(args: &[Value], fn_name: &str) -> Result<[f64; 3]> {
    if args.len() != 3 {
        return Err(CompileError::Argument(format!(
            "{fn_name} takes 3 arguments, got {}",
            args.len()
        )));
    }
    Ok([
        number_arg(args, 0, fn_name)?,
        number_arg(args, 1, fn_name)?,
        number_arg(args, 2, fn_name)?,
    ])
}

fn string_arg(args: &[Value], idx: usize, fn_name: &str) -> Result<String> {
    match args.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(CompileError::Argument(format!(
            "{fn_name} expects a string, got {}",
            other.to_json()
        ))),
        None => Err(CompileError::Argument(format!(
            "{fn_name} requires argument {}",
            idx + 1
        ))),
    }
}

fn single_arg(mut args: Vec<Value>, fn_name: &str) -> Result<Value> {
    if args.len() != 1 {
        return Err(CompileError::Argument(format!(
            "{fn_name} takes 1 argument, got {}",
            args.len()
        )));
    }
    Ok(args.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_expr;
    use serde_json::json;

    fn eval_str(src: &str) -> Value {
        let sheet = Stylesheet::new();
        eval_expr(&parse_expr(src).unwrap(), Scope::top_level(&sheet)).unwrap()
    }

    fn encoded(src: &str) -> serde_json::Value {
        eval_str(src).to_json()
    }

    #[test]
    fn literal_arithmetic_folds() {
        assert_eq!(eval_str("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval_str("7 / 2"), Value::Int(3));
        assert_eq!(eval_str("-7 / 2"), Value::Int(-4));
        assert_eq!(eval_str("-7 % 3"), Value::Int(2));
        assert_eq!(eval_str("2 ** 10"), Value::Int(1024));
        assert_eq!(eval_str("1.5 * 2"), Value::Float(3.0));
        assert_eq!(eval_str("3 > 2"), Value::Bool(true));
        assert_eq!(eval_str("'a' + 'b'"), Value::String("ab".into()));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let sheet = Stylesheet::new();
        let err = eval_expr(&parse_expr("1 / 0").unwrap(), Scope::top_level(&sheet)).unwrap_err();
        assert!(matches!(err, CompileError::Argument(_)));
    }

    #[test]
    fn field_comparisons_build_expressions() {
        assert_eq!(encoded("highway == :motorway"), json!(["==", ["get", "highway"], "motorway"]));
        assert_eq!(encoded("zoom >= 10"), json!([">=", ["zoom"], 10]));
        assert_eq!(encoded("2 * width"), json!(["*", 2, ["get", "width"]]));
    }

    #[test]
    fn boolean_operators_merge() {
        assert_eq!(
            encoded("a == 1 & b == 2 & c == 3"),
            json!(["all", ["==", ["get", "a"], 1], ["==", ["get", "b"], 2], ["==", ["get", "c"], 3]])
        );
        assert_eq!(
            encoded("any[a == 1, b == 2]"),
            json!(["any", ["==", ["get", "a"], 1], ["==", ["get", "b"], 2]])
        );
        assert_eq!(encoded("!has(:name)"), json!(["!", ["has", "name"]]));
    }

    #[test]
    fn dot_methods() {
        assert_eq!(
            encoded("kind.in(:river, :canal)"),
            json!(["in", ["get", "kind"], ["literal", ["river", "canal"]]])
        );
        assert_eq!(encoded("name.downcase"), json!(["downcase", ["get", "name"]]));
        assert_eq!(encoded("kind.is(:river)"), json!(["==", ["get", "kind"], "river"]));
        assert_eq!(encoded("names[0]"), json!(["at", 0, ["get", "names"]]));
    }

    #[test]
    fn unknown_call_is_an_error() {
        let sheet = Stylesheet::new();
        let err = eval_expr(&parse_expr("frobnicate(1)").unwrap(), Scope::top_level(&sheet))
            .unwrap_err();
        assert!(matches!(err, CompileError::UnknownIdentifier(ref n) if n == "frobnicate"));
    }

    #[test]
    fn color_helpers() {
        assert_eq!(encoded("hsl(0, 1, 0.5)"), json!("#ff0000"));
        assert_eq!(encoded("0xff0000.greyscale").as_str().map(str::len), Some(7));
        assert_eq!(encoded("0x000000.rgb_mix(0xffffff, 50)"), json!("#808080"));
    }

    #[test]
    fn ranges_evaluate_bounds() {
        assert_eq!(eval_str("10..13"), Value::Range(ZoomRange::between(10, 13)));
        assert_eq!(eval_str("..5"), Value::Range(ZoomRange::up_to(5)));
    }
}
