//! Expression builder
//!
//! Immutable operator + operands trees for filters and data-driven values,
//! lowered to the nested-array form of the style expression language.
//!
//! - `Expression::new(name, ..)` maps convenience names to wire tokens once
//! - `merge` flattens `all`/`any` chains so repeated `&`/`|` stays shallow
//! - `encode` is plain structural recursion

use serde_json::Value as Json;

use crate::value::Value;

/// Convenience names that can't be used verbatim as wire tokens
const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("string_format", "format"),
    ("is_in", "in"),
    ("case_when", "case"),
    ("not", "!"),
    ("feature_id", "id"),
    ("subtract", "-"),
    ("divide", "/"),
    ("power", "^"),
    ("pow", "^"),
    // operator constructors
    ("eq", "=="),
    ("ne", "!="),
    ("lt", "<"),
    ("gt", ">"),
    ("le", "<="),
    ("ge", ">="),
    ("add", "+"),
    ("sub", "-"),
    ("mul", "*"),
    ("div", "/"),
    ("modulo", "%"),
];

/// Named functions of the expression language, in convenience form
pub const FUNCTIONS: &[&str] = &[
    // types
    "literal", "array", "typeof", "string", "number", "boolean", "object", "collator",
    "string_format", "image", "number_format", "to_string", "to_number", "to_boolean",
    "to_color",
    // variable binding
    "let", "var",
    // lookup
    "at", "is_in", "index_of", "slice", "global_state", "get", "has", "length",
    // decision
    "case_when", "match", "coalesce", "all", "any", "not", "within",
    // ramps
    "step", "interpolate", "interpolate_hcl", "interpolate_lab",
    // math
    "ln2", "pi", "e", "subtract", "divide", "pow", "sqrt", "log10", "ln", "log2",
    "sin", "cos", "tan", "asin", "acos", "atan", "min", "max", "round", "abs", "ceil",
    "floor", "distance",
    // color
    "to_rgba", "rgb", "rgba",
    // feature data
    "properties", "feature_state", "geometry_type", "feature_id", "line_progress",
    "accumulated",
    // camera, heatmap, terrain
    "zoom", "heatmap_density", "elevation", "distance_from_center", "pitch",
    // string
    "is_supported_script", "upcase", "downcase", "concat", "resolved_locale",
];

/// Functions that read naturally as methods on an expression (`x.length`)
pub const DOT_METHODS: &[&str] = &[
    "array", "boolean", "string_format", "image", "number", "number_format", "object",
    "string", "to_boolean", "to_color", "to_number", "to_string", "typeof", "length",
    "slice", "match", "downcase", "upcase", "is_supported_script", "to_rgba", "abs",
    "acos", "asin", "atan", "ceil", "cos", "floor", "ln", "log10", "log2", "round",
    "sin", "sqrt", "tan",
];

pub fn is_function(name: &str) -> bool {
    FUNCTIONS.contains(&name)
}

pub fn is_dot_method(name: &str) -> bool {
    DOT_METHODS.contains(&name)
}

/// Map a convenience name to its wire token.
///
/// Table entries win; anything else has underscores rewritten to hyphens
/// (`interpolate_hcl` → `interpolate-hcl`).
pub fn wire_token(name: &str) -> String {
    SUBSTITUTIONS
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or_else(|| name.replace('_', "-"))
}

/// The two boolean combinators used by merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    All,
    Any,
}

impl Combinator {
    pub fn token(self) -> &'static str {
        match self {
            Combinator::All => "all",
            Combinator::Any => "any",
        }
    }
}

/// An immutable expression node.
///
/// `operator == None` is a pass-through wrapper whose encoding is its sole
/// operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    operator: Option<String>,
    operands: Vec<Value>,
}

impl Expression {
    /// Build a node from a convenience name, substituting its wire token
    pub fn new(name: &str, operands: Vec<Value>) -> Self {
        Self::raw(wire_token(name), operands)
    }

    /// Build a node from an already-substituted wire token
    pub fn raw(token: impl Into<String>, operands: Vec<Value>) -> Self {
        Self {
            operator: Some(token.into()),
            operands,
        }
    }

    /// Wrap a literal so it can take part in expression arithmetic
    pub fn pass(value: impl Into<Value>) -> Self {
        Self {
            operator: None,
            operands: vec![value.into()],
        }
    }

    pub fn operator(&self) -> Option<&str> {
        self.operator.as_deref()
    }

    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    /// Nesting depth; leaves count as zero
    pub fn depth(&self) -> usize {
        1 + self
            .operands
            .iter()
            .filter_map(Value::as_expression)
            .map(Expression::depth)
            .max()
            .unwrap_or(0)
    }

    // ============ Catalogue ============

    /// `["get", field]`
    pub fn get(field: &str) -> Self {
        Self::raw("get", vec![Value::from(field)])
    }

    /// `literal(a, b, c)` wraps a list; a single mapping is wrapped unflattened
    pub fn literal(mut args: Vec<Value>) -> Self {
        if args.len() == 1 && matches!(args[0], Value::Map(_)) {
            Self::raw("literal", vec![args.remove(0)])
        } else {
            Self::raw("literal", vec![Value::List(args)])
        }
    }

    pub fn all(conditions: Vec<Value>) -> Self {
        Self::raw(Combinator::All.token(), conditions)
    }

    pub fn any(conditions: Vec<Value>) -> Self {
        Self::raw(Combinator::Any.token(), conditions)
    }

    /// A named catalogue function, or `None` if the name isn't in the catalogue
    pub fn function(name: &str, args: Vec<Value>) -> Option<Self> {
        if !is_function(name) {
            return None;
        }
        Some(match name {
            "literal" => Self::literal(args),
            _ => Self::new(name, args),
        })
    }

    /// `subject.method(args)` for names in the dot-method table
    pub fn method(self, name: &str, args: Vec<Value>) -> Option<Self> {
        if !is_dot_method(name) {
            return None;
        }
        Some(self.apply(name, args))
    }

    fn apply(self, name: &str, args: Vec<Value>) -> Self {
        let mut operands = Vec::with_capacity(args.len() + 1);
        operands.push(Value::Expr(self));
        operands.extend(args);
        Self::new(name, operands)
    }

    // ============ Operators ============

    pub fn eq(self, rhs: impl Into<Value>) -> Self {
        self.apply("eq", vec![rhs.into()])
    }

    pub fn ne(self, rhs: impl Into<Value>) -> Self {
        self.apply("ne", vec![rhs.into()])
    }

    pub fn lt(self, rhs: impl Into<Value>) -> Self {
        self.apply("lt", vec![rhs.into()])
    }

    pub fn gt(self, rhs: impl Into<Value>) -> Self {
        self.apply("gt", vec![rhs.into()])
    }

    pub fn le(self, rhs: impl Into<Value>) -> Self {
        self.apply("le", vec![rhs.into()])
    }

    pub fn ge(self, rhs: impl Into<Value>) -> Self {
        self.apply("ge", vec![rhs.into()])
    }

    pub fn add(self, rhs: impl Into<Value>) -> Self {
        self.apply("add", vec![rhs.into()])
    }

    pub fn sub(self, rhs: impl Into<Value>) -> Self {
        self.apply("sub", vec![rhs.into()])
    }

    pub fn mul(self, rhs: impl Into<Value>) -> Self {
        self.apply("mul", vec![rhs.into()])
    }

    pub fn div(self, rhs: impl Into<Value>) -> Self {
        self.apply("div", vec![rhs.into()])
    }

    pub fn modulo(self, rhs: impl Into<Value>) -> Self {
        self.apply("modulo", vec![rhs.into()])
    }

    pub fn pow(self, rhs: impl Into<Value>) -> Self {
        self.apply("pow", vec![rhs.into()])
    }

    pub fn index_of(self, needle: impl Into<Value>) -> Self {
        self.apply("index_of", vec![needle.into()])
    }

    /// `list[index]` → `["at", index, list]`
    pub fn at(self, index: impl Into<Value>) -> Self {
        Self::raw("at", vec![index.into(), Value::Expr(self)])
    }

    /// Membership test against a literal list: `["in", self, ["literal", [..]]]`
    pub fn is_in(self, values: Vec<Value>) -> Self {
        let flat = flatten(values);
        Self::raw(
            "in",
            vec![Value::Expr(self), Value::Expr(Self::literal(flat))],
        )
    }

    pub fn not(self) -> Self {
        Self::raw("!", vec![Value::Expr(self)])
    }

    // ============ Merge ============

    /// Combine with `all`, flattening existing `all` nodes
    pub fn and(self, other: Option<Expression>) -> Self {
        merge(Combinator::All, self, other)
    }

    /// Combine with `any`, flattening existing `any` nodes
    pub fn or(self, other: Option<Expression>) -> Self {
        merge(Combinator::Any, self, other)
    }

    // ============ Encode ============

    /// Lower to the nested-array wire form
    pub fn encode(&self) -> Json {
        let mut lowered = self.operands.iter().map(encode_operand);
        match &self.operator {
            None => lowered.next().unwrap_or(Json::Null),
            Some(op) => {
                let mut out = Vec::with_capacity(self.operands.len() + 1);
                out.push(Json::String(op.clone()));
                out.extend(lowered);
                Json::Array(out)
            }
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Merge `b` into `a` under `op`.
///
/// Never nests more than one level beyond its inputs: an operand that is
/// already an `op` node contributes its operands instead of itself.
pub fn merge(op: Combinator, a: Expression, b: Option<Expression>) -> Expression {
    let Some(b) = b else {
        return a;
    };
    let token = op.token();
    if a.operator() == Some(token) {
        let mut operands = a.operands;
        operands.push(Value::Expr(b));
        Expression::raw(token, operands)
    } else if b.operator() == Some(token) {
        let mut operands = Vec::with_capacity(b.operands.len() + 1);
        operands.push(Value::Expr(a));
        operands.extend(b.operands);
        Expression::raw(token, operands)
    } else {
        Expression::raw(token, vec![Value::Expr(a), Value::Expr(b)])
    }
}

/// `all`-merge where either side may be absent
pub fn and_optional(a: Option<Expression>, b: Option<Expression>) -> Option<Expression> {
    match a {
        None => b,
        Some(a) => Some(a.and(b)),
    }
}

/// Build a condition from zero or more arguments: none, one as-is, or `any`
pub fn condition_from(mut args: Vec<Value>) -> Option<Expression> {
    match args.len() {
        0 => None,
        1 => Some(args.remove(0).into_expression()),
        _ => Some(Expression::any(args)),
    }
}

fn flatten(values: Vec<Value>) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        match v {
            Value::List(items) => out.extend(flatten(items)),
            other => out.push(other),
        }
    }
    out
}

/// Mapping operands (option objects for `collator`, `format`, ...) get
/// hyphenated keys; everything else lowers unchanged.
fn encode_operand(value: &Value) -> Json {
    match value {
        Value::Map(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.replace('_', "-"), v.to_json()))
                .collect(),
        ),
        other => other.to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn field(name: &str) -> Expression {
        Expression::get(name)
    }

    #[test]
    fn substitutes_tokens_once_at_construction() {
        assert_eq!(wire_token("is_in"), "in");
        assert_eq!(wire_token("case_when"), "case");
        assert_eq!(wire_token("interpolate_hcl"), "interpolate-hcl");
        assert_eq!(wire_token("feature_id"), "id");
        // already-substituted tokens are left alone
        let e = Expression::raw("to-string", vec![]);
        assert_eq!(e.encode(), json!(["to-string"]));
    }

    #[test]
    fn comparison_puts_subject_first() {
        let e = field("highway").eq("primary");
        assert_eq!(e.encode(), json!(["==", ["get", "highway"], "primary"]));
    }

    #[test]
    fn at_puts_index_first() {
        let e = field("names").at(1);
        assert_eq!(e.encode(), json!(["at", 1, ["get", "names"]]));
    }

    #[test]
    fn is_in_wraps_flattened_literal() {
        let e = field("class").is_in(vec![
            Value::from("a"),
            Value::List(vec![Value::from("b"), Value::from("c")]),
        ]);
        assert_eq!(
            e.encode(),
            json!(["in", ["get", "class"], ["literal", ["a", "b", "c"]]])
        );
    }

    #[test]
    fn literal_of_single_map_is_unflattened() {
        let mut map = IndexMap::new();
        map.insert("font_scale".to_string(), Value::Float(0.8));
        let e = Expression::literal(vec![Value::Map(map)]);
        assert_eq!(e.encode(), json!(["literal", {"font-scale": 0.8}]));

        let e = Expression::literal(vec![1.into(), 2.into(), 3.into()]);
        assert_eq!(e.encode(), json!(["literal", [1, 2, 3]]));
    }

    #[test]
    fn literal_on_left_of_arithmetic() {
        let e = Expression::pass(100).sub(field("height"));
        assert_eq!(e.encode(), json!(["-", 100, ["get", "height"]]));
    }

    #[test]
    fn merge_flattens_left_chain() {
        let a = field("a").eq(1);
        let b = field("b").eq(2);
        let c = field("c").eq(3);
        let merged = a.and(Some(b)).and(Some(c));
        assert_eq!(merged.operator(), Some("all"));
        assert_eq!(merged.operands().len(), 3);
        assert_eq!(merged.depth(), 3);
    }

    #[test]
    fn merge_flattens_right_operand() {
        let right = field("b").eq(2).or(Some(field("c").eq(3)));
        let merged = field("a").eq(1).or(Some(right));
        assert_eq!(merged.operands().len(), 3);
    }

    #[test]
    fn merge_with_absent_returns_self() {
        let a = field("a").eq(1);
        assert_eq!(a.clone().and(None), a);
        assert_eq!(and_optional(None, Some(a.clone())), Some(a.clone()));
        assert_eq!(and_optional(None, None), None);
    }

    #[test]
    fn merge_mixed_combinators_nests() {
        let any = field("a").eq(1).or(Some(field("b").eq(2)));
        let merged = any.clone().and(Some(field("c").eq(3)));
        assert_eq!(merged.operator(), Some("all"));
        assert_eq!(merged.operands()[0], Value::Expr(any));
    }

    #[test]
    fn condition_from_arguments() {
        assert_eq!(condition_from(vec![]), None);
        let single = condition_from(vec![field("x").into()]).unwrap();
        assert_eq!(single, field("x"));
        let multi = condition_from(vec![field("x").into(), field("y").into()]).unwrap();
        assert_eq!(multi.operator(), Some("any"));
    }

    #[test]
    fn catalogue_functions_and_methods() {
        assert!(Expression::function("frobnicate", vec![]).is_none());
        let e = Expression::function("to_string", vec![field("ref").into()]).unwrap();
        assert_eq!(e.encode(), json!(["to-string", ["get", "ref"]]));
        let e = field("name").method("length", vec![]).unwrap();
        assert_eq!(e.encode(), json!(["length", ["get", "name"]]));
        assert!(field("name").method("get", vec![]).is_none());
    }
}
