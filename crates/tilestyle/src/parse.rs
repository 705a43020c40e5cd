//! Parser for stylesheet source text
//!
//! Produces a list of surface::Stmt which the evaluator applies in order.
//! Statements end at a newline, `;` or `}`; inside an expression newlines
//! are only allowed after an opening bracket, a comma or a binary operator.

use winnow::ascii::{digit1, hex_digit1, multispace1, space0, space1, till_line_ending};
use winnow::combinator::{alt, cut_err, delimited, not, opt, preceded, repeat, separated, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::ast::surface::{Expr, Stmt, SurfaceArg};
use crate::ast::{BinOp, Literal, UnaryOp};

type PResult<T> = winnow::ModalResult<T>;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (line {}, column {}, offset {})",
            self.message, self.line, self.column, self.offset
        )
    }
}

impl std::error::Error for ParseError {}

/// Parse a whole stylesheet
pub fn parse(input: &str) -> Result<Vec<Stmt>, ParseError> {
    let mut stream = input;
    match statements.parse_next(&mut stream) {
        Ok(parsed) if stream.is_empty() => Ok(parsed),
        Ok(_) => {
            let offset = input.len() - stream.len();
            Err(build_parse_error(describe(stream), input, offset))
        }
        Err(_) => {
            let offset = input.len().saturating_sub(stream.len());
            Err(build_parse_error(describe(stream), input, offset))
        }
    }
}

/// Parse a single expression
pub fn parse_expr(input: &str) -> Result<Expr, ParseError> {
    let input = input.trim();
    let mut stream = input;
    match expr.parse_next(&mut stream) {
        Ok(parsed) if stream.trim().is_empty() => Ok(parsed),
        Ok(_) | Err(_) => {
            let offset = input.len().saturating_sub(stream.len());
            Err(build_parse_error(describe(stream), input, offset))
        }
    }
}

fn describe(rest: &str) -> String {
    match rest.chars().next() {
        None => "unexpected end of input".to_string(),
        Some('\n') | Some('\r') => "unexpected end of line".to_string(),
        Some(c) => format!("unexpected `{c}`"),
    }
}

fn build_parse_error(message: String, input: &str, offset: usize) -> ParseError {
    let (line, column) = offset_to_line_column(input, offset);
    ParseError {
        message,
        offset,
        line,
        column,
    }
}

fn offset_to_line_column(input: &str, offset: usize) -> (usize, usize) {
    let bounded = offset.min(input.len());
    let mut line = 1usize;
    let mut column = 1usize;

    for ch in input[..bounded].chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    (line, column)
}

// ============ Statements ============

fn statements(input: &mut &str) -> PResult<Vec<Stmt>> {
    let mut out = Vec::new();
    loop {
        separators.parse_next(input)?;
        if input.is_empty() || input.starts_with('}') {
            return Ok(out);
        }
        out.push(cut_err(statement).parse_next(input)?);
        sp.parse_next(input)?;
        if !at_statement_end(input) {
            return Err(ErrMode::Cut(ContextError::new()));
        }
    }
}

fn at_statement_end(input: &str) -> bool {
    input.is_empty()
        || input.starts_with(['\n', '\r', ';', '}'])
}

fn statement(input: &mut &str) -> PResult<Stmt> {
    let name = ident_str.parse_next(input)?;
    let args = opt(alt((paren_args, preceded(space1, call_args))))
        .parse_next(input)?
        .unwrap_or_default();
    let stmt = Stmt::new(name, args);
    Ok(match opt(preceded(sp, block)).parse_next(input)? {
        Some(body) => stmt.with_block(body),
        None => stmt,
    })
}

fn block(input: &mut &str) -> PResult<Vec<Stmt>> {
    delimited('{', statements, '}').parse_next(input)
}

// ============ Top-level expression (handles precedence) ============

fn expr(input: &mut &str) -> PResult<Expr> {
    range_expr.parse_next(input)
}

fn range_expr(input: &mut &str) -> PResult<Expr> {
    if opt("..").parse_next(input)?.is_some() {
        let upper = preceded(sp, or_expr).parse_next(input)?;
        return Ok(Expr::Range(None, Some(Box::new(upper))));
    }
    let lower = or_expr.parse_next(input)?;
    if opt(preceded(sp, "..")).parse_next(input)?.is_none() {
        return Ok(lower);
    }
    let upper = opt(preceded(sp, or_expr)).parse_next(input)?;
    Ok(Expr::Range(Some(Box::new(lower)), upper.map(Box::new)))
}

fn or_expr(input: &mut &str) -> PResult<Expr> {
    let first = and_expr.parse_next(input)?;
    let rest: Vec<Expr> = repeat(0.., preceded((sp, '|', ws), and_expr)).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |l, r| l.binop(BinOp::Or, r)))
}

fn and_expr(input: &mut &str) -> PResult<Expr> {
    let first = cmp_expr.parse_next(input)?;
    let rest: Vec<Expr> = repeat(0.., preceded((sp, '&', ws), cmp_expr)).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |l, r| l.binop(BinOp::And, r)))
}

fn cmp_expr(input: &mut &str) -> PResult<Expr> {
    let left = add_expr.parse_next(input)?;
    let rest: Option<(BinOp, Expr)> =
        opt((sp, cmp_op, ws, add_expr).map(|(_, op, _, e)| (op, e))).parse_next(input)?;
    match rest {
        Some((op, right)) => Ok(left.binop(op, right)),
        None => Ok(left),
    }
}

fn cmp_op(input: &mut &str) -> PResult<BinOp> {
    alt((
        "==".value(BinOp::Eq),
        "!=".value(BinOp::Ne),
        "<=".value(BinOp::Le),
        ">=".value(BinOp::Ge),
        "<".value(BinOp::Lt),
        ">".value(BinOp::Gt),
    ))
    .parse_next(input)
}

fn add_expr(input: &mut &str) -> PResult<Expr> {
    let first = mul_expr.parse_next(input)?;
    let rest: Vec<(BinOp, Expr)> =
        repeat(0.., (sp, add_op, ws, mul_expr).map(|(_, op, _, e)| (op, e))).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |l, (op, r)| l.binop(op, r)))
}

fn add_op(input: &mut &str) -> PResult<BinOp> {
    alt(('+'.value(BinOp::Add), '-'.value(BinOp::Sub))).parse_next(input)
}

fn mul_expr(input: &mut &str) -> PResult<Expr> {
    let first = pow_expr.parse_next(input)?;
    let rest: Vec<(BinOp, Expr)> =
        repeat(0.., (sp, mul_op, ws, pow_expr).map(|(_, op, _, e)| (op, e))).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |l, (op, r)| l.binop(op, r)))
}

fn mul_op(input: &mut &str) -> PResult<BinOp> {
    alt((
        terminated('*', not('*')).value(BinOp::Mul),
        '/'.value(BinOp::Div),
        '%'.value(BinOp::Mod),
    ))
    .parse_next(input)
}

/// `**` is right associative
fn pow_expr(input: &mut &str) -> PResult<Expr> {
    let base = unary_expr.parse_next(input)?;
    let exponent = opt(preceded((sp, "**", ws), pow_expr)).parse_next(input)?;
    Ok(match exponent {
        Some(e) => base.binop(BinOp::Pow, e),
        None => base,
    })
}

fn unary_expr(input: &mut &str) -> PResult<Expr> {
    alt((
        preceded(('-', sp), unary_expr).map(|e| Expr::UnaryOp(UnaryOp::Neg, Box::new(e))),
        preceded(('!', sp), unary_expr).map(|e| Expr::UnaryOp(UnaryOp::Not, Box::new(e))),
        postfix_expr,
    ))
    .parse_next(input)
}

// ============ Postfix expressions (.method and [index]) ============

enum Postfix {
    Method(String, Vec<SurfaceArg>),
    Index(Vec<Expr>),
}

fn postfix_expr(input: &mut &str) -> PResult<Expr> {
    let base = primary.parse_next(input)?;
    let ops: Vec<Postfix> = repeat(0.., postfix_op).parse_next(input)?;

    Ok(ops.into_iter().fold(base, |acc, op| match op {
        Postfix::Method(name, args) => acc.method(name, args),
        Postfix::Index(items) => Expr::Index(Box::new(acc), items),
    }))
}

fn postfix_op(input: &mut &str) -> PResult<Postfix> {
    alt((method_call, index_access)).parse_next(input)
}

fn method_call(input: &mut &str) -> PResult<Postfix> {
    preceded('.', (ident_str, opt(paren_args)))
        .map(|(name, args)| Postfix::Method(name, args.unwrap_or_default()))
        .parse_next(input)
}

fn index_access(input: &mut &str) -> PResult<Postfix> {
    delimited(('[', ws), expr_list, (ws, ']'))
        .map(Postfix::Index)
        .parse_next(input)
}

fn paren_args(input: &mut &str) -> PResult<Vec<SurfaceArg>> {
    delimited(('(', ws), opt(call_args), (ws, ')'))
        .map(|args| args.unwrap_or_default())
        .parse_next(input)
}

fn call_args(input: &mut &str) -> PResult<Vec<SurfaceArg>> {
    terminated(
        separated(1.., call_arg, (sp, ',', ws)),
        opt((sp, ',')), // trailing comma
    )
    .parse_next(input)
}

fn call_arg(input: &mut &str) -> PResult<SurfaceArg> {
    alt((
        // keyword arg: name: expr
        (ident_str, ':', not(':'), ws, expr).map(|(name, _, _, _, e)| SurfaceArg::kw(name, e)),
        // positional arg
        expr.map(SurfaceArg::pos),
    ))
    .parse_next(input)
}

fn expr_list(input: &mut &str) -> PResult<Vec<Expr>> {
    terminated(separated(1.., expr, (sp, ',', ws)), opt((sp, ','))).parse_next(input)
}

// ============ Primary expressions ============

fn primary(input: &mut &str) -> PResult<Expr> {
    alt((
        paren_expr,
        list_expr,
        literal.map(Expr::Literal),
        ident_or_call,
    ))
    .parse_next(input)
}

fn paren_expr(input: &mut &str) -> PResult<Expr> {
    delimited(('(', ws), expr, (ws, ')')).parse_next(input)
}

fn list_expr(input: &mut &str) -> PResult<Expr> {
    delimited(('[', ws), opt(expr_list), (ws, ']'))
        .map(|items| Expr::List(items.unwrap_or_default()))
        .parse_next(input)
}

fn ident_or_call(input: &mut &str) -> PResult<Expr> {
    (ident_str, opt(paren_args))
        .map(|(name, args)| match (name.as_str(), args) {
            (_, Some(args)) => Expr::Call(name, args),
            ("true", None) => Expr::Literal(Literal::Bool(true)),
            ("false", None) => Expr::Literal(Literal::Bool(false)),
            ("nil", None) => Expr::Literal(Literal::Null),
            (_, None) => Expr::Ident(name),
        })
        .parse_next(input)
}

// ============ Identifiers ============

fn ident_str(input: &mut &str) -> PResult<String> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .map(str::to_string)
        .parse_next(input)
}

// ============ Literals ============

fn literal(input: &mut &str) -> PResult<Literal> {
    alt((hex_lit, float_lit, int_lit, string_lit, symbol_lit)).parse_next(input)
}

fn hex_lit(input: &mut &str) -> PResult<Literal> {
    preceded(alt(("0x", "0X")), hex_digit1)
        .try_map(|s: &str| i64::from_str_radix(s, 16))
        .map(Literal::Int)
        .parse_next(input)
}

fn int_lit(input: &mut &str) -> PResult<Literal> {
    digit1
        .try_map(|s: &str| s.parse::<i64>())
        .map(Literal::Int)
        .parse_next(input)
}

fn float_lit(input: &mut &str) -> PResult<Literal> {
    (digit1, '.', digit1)
        .take()
        .try_map(|s: &str| s.parse::<f64>())
        .map(Literal::Float)
        .parse_next(input)
}

/// `:name` is shorthand for the string "name"
fn symbol_lit(input: &mut &str) -> PResult<Literal> {
    preceded(':', ident_str).map(Literal::String).parse_next(input)
}

fn string_lit(input: &mut &str) -> PResult<Literal> {
    alt((
        delimited('"', string_contents('"'), '"'),
        delimited('\'', string_contents('\''), '\''),
    ))
    .map(Literal::String)
    .parse_next(input)
}

fn string_contents<'a>(quote: char) -> impl FnMut(&mut &'a str) -> PResult<String> {
    move |input: &mut &'a str| {
        let text: &'a str = *input;
        let mut result = String::new();
        let mut escaped = false;
        for (idx, c) in text.char_indices() {
            if escaped {
                result.push(match c {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    _ => c, // Unknown escapes pass through
                });
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                *input = &text[idx..];
                return Ok(result);
            } else {
                result.push(c);
            }
        }
        Err(ErrMode::Backtrack(ContextError::new()))
    }
}

// ============ Whitespace ============

fn comment(input: &mut &str) -> PResult<()> {
    ('#', till_line_ending).void().parse_next(input)
}

/// Spaces, tabs and a trailing comment, never crossing a line
fn sp(input: &mut &str) -> PResult<()> {
    (space0, opt(comment)).void().parse_next(input)
}

/// Any whitespace including newlines and comments
fn ws(input: &mut &str) -> PResult<()> {
    repeat(0.., alt((multispace1.void(), comment))).parse_next(input)
}

/// Whitespace and `;` between statements
fn separators(input: &mut &str) -> PResult<()> {
    repeat(0.., alt((multispace1.void(), comment, ';'.void()))).parse_next(input)
}

// ============ Sanity Tests ============
// Most testing is done via integration tests in tests/integration.rs

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Arg;

    #[test]
    fn parse_literals() {
        assert_eq!(parse_expr("123").unwrap(), Expr::Literal(Literal::Int(123)));
        assert_eq!(parse_expr("0x888888").unwrap(), Expr::Literal(Literal::Int(0x888888)));
        assert!(matches!(
            parse_expr("3.14").unwrap(),
            Expr::Literal(Literal::Float(_))
        ));
        assert_eq!(parse_expr("true").unwrap(), Expr::Literal(Literal::Bool(true)));
        assert_eq!(parse_expr("nil").unwrap(), Expr::Literal(Literal::Null));
        assert_eq!(
            parse_expr(":motorway").unwrap(),
            Expr::Literal(Literal::String("motorway".into()))
        );
        assert_eq!(
            parse_expr(r#"'it\'s'"#).unwrap(),
            Expr::Literal(Literal::String("it's".into()))
        );
    }

    #[test]
    fn parse_operator_precedence() {
        // a * b + c should parse as (a * b) + c
        let result = parse_expr("a * b + c").unwrap();
        if let Expr::BinaryOp(left, BinOp::Add, _) = result {
            assert!(matches!(*left, Expr::BinaryOp(_, BinOp::Mul, _)));
        } else {
            panic!("Expected Add at top level");
        }

        // a & b | c should parse as (a & b) | c
        let result = parse_expr("a & b | c").unwrap();
        assert!(matches!(result, Expr::BinaryOp(_, BinOp::Or, _)));

        // 2 ** 3 ** 2 should parse as 2 ** (3 ** 2)
        let result = parse_expr("2 ** 3 ** 2").unwrap();
        if let Expr::BinaryOp(_, BinOp::Pow, right) = result {
            assert!(matches!(*right, Expr::BinaryOp(_, BinOp::Pow, _)));
        } else {
            panic!("Expected Pow at top level");
        }
    }

    #[test]
    fn parse_ranges() {
        assert!(matches!(
            parse_expr("10..13").unwrap(),
            Expr::Range(Some(_), Some(_))
        ));
        assert!(matches!(parse_expr("1..").unwrap(), Expr::Range(Some(_), None)));
        assert!(matches!(parse_expr("..5").unwrap(), Expr::Range(None, Some(_))));
    }

    #[test]
    fn parse_postfix() {
        let result = parse_expr("name.downcase.in(:a, :b)").unwrap();
        if let Expr::Method(inner, name, args) = result {
            assert_eq!(name, "in");
            assert_eq!(args.len(), 2);
            assert!(matches!(*inner, Expr::Method(_, ref n, _) if n == "downcase"));
        } else {
            panic!("Expected method call");
        }

        assert!(matches!(
            parse_expr("any[a == 1, b == 2]").unwrap(),
            Expr::Index(_, ref items) if items.len() == 2
        ));
    }

    #[test]
    fn parse_statements_and_blocks() {
        let program = parse(
            "version 8 # comment\n\
             source :osm, type: 'vector', default: true\n\
             layer :roads, zoom: 10..13 {\n  line_width 6; line_cap :round\n  on(14) { line_width 8 }\n}\n",
        )
        .unwrap();

        assert_eq!(program.len(), 3);
        assert_eq!(program[0].name, "version");
        assert_eq!(program[1].args.len(), 3);
        assert!(matches!(&program[1].args[1], Arg::Keyword(k, _) if k == "type"));

        let body = program[2].block.as_ref().unwrap();
        assert_eq!(body.len(), 3);
        let int = |n| Arg::pos(Expr::Literal(Literal::Int(n)));
        assert_eq!(
            body[2],
            Stmt::new("on", vec![int(14)]).with_block(vec![Stmt::new("line_width", vec![int(8)])])
        );
        assert_eq!(
            program[1].args[2],
            Arg::kw("default", Expr::Literal(Literal::Bool(true)))
        );
    }

    #[test]
    fn parse_multiline_arguments() {
        let program = parse("line_color match(highway,\n  :motorway, 0x0000ff,\n  0x888888\n)\n").unwrap();
        assert_eq!(program.len(), 1);
        assert!(matches!(
            &program[0].args[0],
            Arg::Positional(Expr::Call(name, args)) if name == "match" && args.len() == 4
        ));
    }

    #[test]
    fn parse_error_reports_position() {
        let err = parse("version 8\nline_width 6 )\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 14);
        assert_eq!(err.message, "unexpected `)`");

        assert!(parse("layer :x {\n line_width 1\n").is_err());
        assert!(parse("}").is_err());
    }
}
