//! Literal values flowing through the builder
//!
//! A property value is either a plain literal (number, string, bool, list,
//! mapping), a color, a zoom range, or an [`Expression`]. Lowering to JSON
//! happens once, at final assembly.

use std::ops::{RangeFrom, RangeInclusive, RangeToInclusive};

use indexmap::IndexMap;
use serde_json::Number;

use crate::color::ColorValue;
use crate::expr::Expression;

/// Insertion-ordered mapping used for property bags and option maps
pub type ValueMap = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(ValueMap),
    Range(ZoomRange),
    Color(ColorValue),
    Expr(Expression),
}

impl Value {
    /// True for everything except `Null` and `false`
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            Value::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, Value::Expr(_))
    }

    /// Use this value as a condition or expression operand.
    ///
    /// Expressions pass through; any other value is wrapped in a pass-through
    /// node so it encodes as itself.
    pub fn into_expression(self) -> Expression {
        match self {
            Value::Expr(e) => e,
            other => Expression::pass(other),
        }
    }

    /// Lower to JSON, encoding nested expressions
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::Number((*n).into()),
            Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Range(range) => Json::Array(vec![
                range.min.clone().map_or(Json::Null, Json::Number),
                range.max.clone().map_or(Json::Null, Json::Number),
            ]),
            Value::Color(c) => Json::String(c.to_hex_string()),
            Value::Expr(e) => e.encode(),
        }
    }

    /// The numeric payload as JSON number, if this is a finite number
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(n) => Some((*n).into()),
            Value::Float(f) => Number::from_f64(*f),
            _ => None,
        }
    }
}

/// A zoom selector with optional bounds.
///
/// A bound that is `None` is absent from the compiled layer entirely.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZoomRange {
    pub min: Option<Number>,
    pub max: Option<Number>,
}

impl ZoomRange {
    pub fn new(min: Option<Number>, max: Option<Number>) -> Self {
        Self { min, max }
    }

    pub fn between(min: impl Into<Number>, max: impl Into<Number>) -> Self {
        Self::new(Some(min.into()), Some(max.into()))
    }

    pub fn from_level(min: impl Into<Number>) -> Self {
        Self::new(Some(min.into()), None)
    }

    pub fn up_to(max: impl Into<Number>) -> Self {
        Self::new(None, Some(max.into()))
    }
}

impl From<RangeInclusive<i64>> for ZoomRange {
    fn from(r: RangeInclusive<i64>) -> Self {
        Self::between(*r.start(), *r.end())
    }
}

impl From<RangeFrom<i64>> for ZoomRange {
    fn from(r: RangeFrom<i64>) -> Self {
        Self::from_level(r.start)
    }
}

impl From<RangeToInclusive<i64>> for ZoomRange {
    fn from(r: RangeToInclusive<i64>) -> Self {
        Self::up_to(r.end)
    }
}

// ============ Conversions ============

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(map)
    }
}

impl From<ZoomRange> for Value {
    fn from(r: ZoomRange) -> Self {
        Value::Range(r)
    }
}

impl From<RangeInclusive<i64>> for Value {
    fn from(r: RangeInclusive<i64>) -> Self {
        Value::Range(r.into())
    }
}

impl From<RangeFrom<i64>> for Value {
    fn from(r: RangeFrom<i64>) -> Self {
        Value::Range(r.into())
    }
}

impl From<RangeToInclusive<i64>> for Value {
    fn from(r: RangeToInclusive<i64>) -> Self {
        Value::Range(r.into())
    }
}

impl From<ColorValue> for Value {
    fn from(c: ColorValue) -> Self {
        Value::Color(c)
    }
}

impl From<Expression> for Value {
    fn from(e: Expression) -> Self {
        Value::Expr(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lowers_nested_lists_with_expressions() {
        let v = Value::List(vec![Value::Int(1), Expression::get("name").into()]);
        assert_eq!(v.to_json(), json!([1, ["get", "name"]]));
    }

    #[test]
    fn non_finite_floats_lower_to_null() {
        assert_eq!(Value::Float(f64::NAN).to_json(), json!(null));
    }

    #[test]
    fn literal_becomes_pass_through_expression() {
        let e = Value::Int(5).into_expression();
        assert_eq!(e.operator(), None);
        assert_eq!(e.encode(), json!(5));
    }

    #[test]
    fn std_ranges_convert_to_zoom_ranges() {
        assert_eq!(ZoomRange::from(1..=5), ZoomRange::between(1, 5));
        assert_eq!(ZoomRange::from(3..).max, None);
        assert_eq!(ZoomRange::from(..=9).min, None);
    }
}
