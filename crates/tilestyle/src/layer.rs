//! Layer compiler
//!
//! A [`Layer`] is the mutable build state for one output layer. Layer bodies
//! receive a [`LayerBuilder`], which owns the layer while its body runs and
//! holds the stylesheet so that sub-layers can be appended in order.
//!
//! Derived layers:
//! - `on(..)` creates one direct child `{id}__{n}` and, for every recorded
//!   cascade, one sibling `{child}__{a,b,..}` carrying the cascade's overrides
//! - the uncascaded condition reaches direct children only

use indexmap::IndexMap;
use log::debug;
use serde_json::{Map, Value as Json};

use crate::CompileError;
use crate::expr::{Expression, and_optional, condition_from};
use crate::extension::ExtensionRegistry;
use crate::props::{self, PropertyClass, RenderType, Resolution, hyphenate, normalize};
use crate::stylesheet::{Sources, Stylesheet, default_source};
use crate::value::{Value, ValueMap};

/// Overrides replayed onto a cascade sibling when a sub-layer is derived
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeEntry {
    pub condition: Expression,
    pub overrides: ValueMap,
}

/// The render type a layer has settled on, and the property that settled it
#[derive(Debug, Clone, PartialEq)]
struct Deduced {
    render_type: RenderType,
    from: String,
}

#[derive(Debug, Clone)]
pub struct Layer {
    /// Properties in first-assignment order, including `id`, `source`,
    /// `source_layer` and `zoom`
    props: ValueMap,
    filter: Option<Expression>,
    deduced: Option<Deduced>,
    write: bool,
    cascades: Vec<CascadeEntry>,
    cascade_condition: Option<Expression>,
    uncascaded: Option<Expression>,
    child_count: usize,
}

impl Layer {
    /// A fresh layer seeded with `options`, inheriting the default source
    pub(crate) fn new(id: &str, options: ValueMap, sources: &Sources) -> Self {
        let mut props: ValueMap = options
            .into_iter()
            .map(|(k, v)| (normalize(&k), v))
            .collect();
        props.insert("id".to_string(), Value::from(id));

        let mut layer = Self {
            props,
            filter: None,
            deduced: None,
            write: true,
            cascades: Vec::new(),
            cascade_condition: None,
            uncascaded: None,
            child_count: 0,
        };
        layer.attach_source(id, sources);
        layer
    }

    /// A new layer sharing this one's property bag
    fn derive(&self, id: &str, sources: &Sources) -> Self {
        let mut layer = Self::new(id, self.props.clone(), sources);
        layer.deduced = self.deduced.clone();
        layer
    }

    fn attach_source(&mut self, id: &str, sources: &Sources) {
        if !self.has("source") {
            match default_source(sources) {
                Some(name) => {
                    self.props
                        .insert("source".to_string(), Value::from(name));
                }
                None => log::warn!("layer `{id}` has no source and no default source is marked"),
            }
        }
        if !self.has("source_layer") {
            let is_vector = self
                .props
                .get("source")
                .and_then(Value::as_str)
                .and_then(|name| sources.get(name))
                .and_then(|opts| opts.get("type"))
                .and_then(Value::as_str)
                == Some("vector");
            if is_vector {
                self.props
                    .insert("source_layer".to_string(), Value::from(id));
            }
        }
    }

    fn has(&self, key: &str) -> bool {
        self.props.get(key).is_some_and(Value::is_truthy)
    }

    pub fn id(&self) -> String {
        match self.props.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_json().to_string(),
            None => String::new(),
        }
    }

    pub fn props(&self) -> &ValueMap {
        &self.props
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.props.get(&normalize(name))
    }

    pub fn filter(&self) -> Option<&Expression> {
        self.filter.as_ref()
    }

    pub fn zoom(&self) -> Option<&Value> {
        self.props.get("zoom")
    }

    pub fn source(&self) -> Option<&str> {
        self.props.get("source").and_then(Value::as_str)
    }

    pub fn render_type(&self) -> Option<RenderType> {
        self.deduced.as_ref().map(|d| d.render_type)
    }

    pub fn cascades(&self) -> &[CascadeEntry] {
        &self.cascades
    }

    pub fn is_written(&self) -> bool {
        self.write
    }

    fn add_cascade_override(&mut self, condition: Expression, key: String, value: Value) {
        let id = self.id();
        if let Some(entry) = self
            .cascades
            .last_mut()
            .filter(|entry| entry.condition == condition)
        {
            debug!("layer `{id}`: amending cascade {condition} with `{key}`");
            entry.overrides.insert(key, value);
        } else {
            debug!("layer `{id}`: new cascade {condition} with `{key}`");
            let mut overrides = IndexMap::new();
            overrides.insert(key, value);
            self.cascades.push(CascadeEntry {
                condition,
                overrides,
            });
        }
    }

    /// Assemble the compiled layer object.
    ///
    /// Returns `Ok(None)` when neither layout nor paint has anything in it;
    /// such a layer has no visual effect and is dropped.
    pub fn compile(&self) -> Result<Option<Map<String, Json>>, CompileError> {
        let id = self.id();
        let mut layout = Map::new();
        let mut paint = Map::new();
        let mut fields: IndexMap<String, Json> = IndexMap::new();
        let mut deduced = None;
        let mut zoom = None;

        for (key, value) in &self.props {
            if key == "zoom" {
                zoom = Some(value);
                continue;
            }
            let name = hyphenate(key);
            let encoded = encode_property(&name, value);
            match props::classify(key) {
                Some(PropertyClass::Layout) => {
                    note_type(&mut deduced, &id, &name)?;
                    layout.insert(name, encoded);
                }
                Some(PropertyClass::Paint) => {
                    note_type(&mut deduced, &id, &name)?;
                    paint.insert(name, encoded);
                }
                Some(PropertyClass::TopLevel | PropertyClass::Hidden) => {
                    fields.insert(name, encoded);
                }
                None => {
                    return Err(CompileError::UnclassifiedProperty {
                        layer: id,
                        property: name,
                    });
                }
            }
        }

        if layout.is_empty() && paint.is_empty() {
            return Ok(None);
        }

        let mut out = Map::new();
        if !layout.is_empty() {
            out.insert("layout".to_string(), Json::Object(layout));
        }
        if !paint.is_empty() {
            out.insert("paint".to_string(), Json::Object(paint));
        }
        out.extend(fields);
        if let Some(d) = deduced {
            out.insert("type".to_string(), Json::String(d.render_type.to_string()));
        }
        if let Some(filter) = &self.filter {
            out.insert("filter".to_string(), filter.encode());
        }
        if let Some(zoom) = zoom {
            let (min, max) = zoom_bounds(zoom);
            if let Some(min) = min {
                out.insert("minzoom".to_string(), min);
            }
            if let Some(max) = max {
                out.insert("maxzoom".to_string(), max);
            }
        }
        Ok(Some(out))
    }
}

/// Record the type implied by `property`, failing if it contradicts one
/// already deduced.
fn note_type(
    deduced: &mut Option<Deduced>,
    layer: &str,
    property: &str,
) -> Result<(), CompileError> {
    let Some(render_type) = RenderType::from_property(property) else {
        return Ok(());
    };
    match deduced {
        Some(d) if d.render_type != render_type => Err(CompileError::TypeConflict {
            layer: layer.to_string(),
            property: property.to_string(),
            deduced: d.render_type,
            deduced_from: d.from.clone(),
        }),
        Some(_) => Ok(()),
        None => {
            *deduced = Some(Deduced {
                render_type,
                from: property.to_string(),
            });
            Ok(())
        }
    }
}

/// Integers in `*-color` properties become `#rrggbb`; everything else lowers
/// as-is.
fn encode_property(name: &str, value: &Value) -> Json {
    match value {
        Value::Int(n) if *n >= 0 && name.contains("-color") => Json::String(format!("#{n:06x}")),
        other => other.to_json(),
    }
}

/// Scalar zoom sets both bounds; ranges set only the bounds they have
fn zoom_bounds(zoom: &Value) -> (Option<Json>, Option<Json>) {
    match zoom {
        Value::Null => (None, None),
        Value::Range(range) => (
            range.min.clone().map(Json::Number),
            range.max.clone().map(Json::Number),
        ),
        other => {
            let level = other.to_json();
            (Some(level.clone()), Some(level))
        }
    }
}

fn is_zoom_selector(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_) | Value::Range(_))
}

/// `a`, `b`, .. `z`, `aa`, `ab`, ..
fn alpha_suffix(mut n: usize) -> String {
    let mut chars = Vec::new();
    loop {
        chars.push(char::from(b'a' + (n % 26) as u8));
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    chars.iter().rev().collect()
}

/// A catalogue function call for a name `resolve` classified as builtin
fn catalogue_call(function: &str, args: Vec<Value>) -> Result<Value, CompileError> {
    Expression::function(function, args)
        .map(Value::from)
        .ok_or_else(|| CompileError::UnknownIdentifier(function.to_string()))
}

/// What a name means where a value is expected: a catalogue call or a
/// feature field. Properties and extensions have no value.
pub(crate) fn value_of(
    name: &str,
    args: Vec<Value>,
    extensions: &ExtensionRegistry,
) -> Result<Value, CompileError> {
    match props::resolve(name, extensions) {
        Resolution::Builtin(function) => catalogue_call(function, args),
        Resolution::FieldAccess => Ok(Expression::get(name).into()),
        Resolution::Property(_) => Err(CompileError::Argument(format!(
            "property `{name}` can't be used as a value; use current_value(:{name})"
        ))),
        Resolution::Extension(_) => Err(CompileError::Argument(format!(
            "extension `{name}` can't be used as a value"
        ))),
    }
}

/// Handle passed to layer bodies
pub struct LayerBuilder<'s> {
    layer: Layer,
    sheet: &'s mut Stylesheet,
}

impl<'s> LayerBuilder<'s> {
    pub(crate) fn new(layer: Layer, sheet: &'s mut Stylesheet) -> Self {
        Self { layer, sheet }
    }

    pub(crate) fn finish(self) -> Layer {
        self.layer
    }

    /// The layer being built
    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &*self.sheet
    }

    /// Apply a name as a statement in this layer body.
    ///
    /// Extensions run, properties are assigned, and anything else evaluates
    /// to an expression which is returned.
    pub fn call(&mut self, name: &str, mut args: Vec<Value>) -> Result<Option<Value>, CompileError> {
        match props::resolve(name, self.sheet.extensions()) {
            Resolution::Extension(handler) => {
                handler(self, &args)?;
                Ok(None)
            }
            Resolution::Builtin(function) => catalogue_call(function, args).map(Some),
            Resolution::Property(_) => {
                let value = if args.len() == 1 {
                    args.remove(0)
                } else {
                    Value::List(args)
                };
                self.set(name, value)?;
                Ok(None)
            }
            Resolution::FieldAccess => Ok(Some(Expression::get(name).into())),
        }
    }

    /// Evaluate a name where a value is expected
    pub fn value_of(&self, name: &str, args: Vec<Value>) -> Result<Value, CompileError> {
        value_of(name, args, self.sheet.extensions())
    }

    /// Assign a property, or divert it into the active cascade
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), CompileError> {
        let key = normalize(name);
        let value = value.into();
        if let Some(condition) = self.layer.cascade_condition.clone() {
            self.layer.add_cascade_override(condition, key, value);
            return Ok(());
        }
        if props::classify(&key).is_some_and(PropertyClass::implies_type) {
            let id = self.layer.id();
            note_type(&mut self.layer.deduced, &id, &hyphenate(&key))?;
        }
        self.layer.props.insert(key, value);
        Ok(())
    }

    /// Assign a property computed from its current value
    pub fn update<F>(&mut self, name: &str, f: F) -> Result<(), CompileError>
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let value = f(self.layer.get(name));
        self.set(name, value)
    }

    pub fn current_value(&self, name: &str) -> Option<&Value> {
        self.layer.get(name)
    }

    pub fn literal(&self, args: Vec<Value>) -> Expression {
        Expression::literal(args)
    }

    pub fn any(&self, conditions: Vec<Value>) -> Expression {
        Expression::any(conditions)
    }

    pub fn all(&self, conditions: Vec<Value>) -> Expression {
        Expression::all(conditions)
    }

    /// Derive a sub-layer.
    ///
    /// A leading zoom level or range becomes the child's zoom; the remaining
    /// arguments are an extra condition (one as-is, several `any`-combined)
    /// AND-ed with this layer's filter.
    pub fn on<F>(&mut self, mut args: Vec<Value>, body: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut LayerBuilder<'_>) -> Result<(), CompileError>,
    {
        self.layer.child_count += 1;
        let child_id = format!("{}__{}", self.layer.id(), self.layer.child_count);
        let mut child = self.layer.derive(&child_id, self.sheet.sources());
        child.cascades = self.layer.cascades.clone();

        if args.first().is_some_and(is_zoom_selector) {
            child.props.insert("zoom".to_string(), args.remove(0));
        }

        let condition = if args.is_empty() {
            self.layer.filter.clone()
        } else {
            and_optional(condition_from(args), self.layer.filter.clone())
        };
        child.filter = and_optional(condition.clone(), self.layer.uncascaded.clone());

        let mut builder = LayerBuilder::new(child, &mut *self.sheet);
        body(&mut builder)?;
        let child = builder.finish();

        let siblings: Vec<Layer> = self
            .layer
            .cascades
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let id = format!("{}__{}", child.id(), alpha_suffix(i));
                let mut sibling = child.derive(&id, self.sheet.sources());
                sibling.filter = and_optional(condition.clone(), Some(entry.condition.clone()));
                for (key, value) in &entry.overrides {
                    sibling.props.insert(key.clone(), value.clone());
                }
                sibling
            })
            .collect();

        debug!(
            "layer `{}`: derived `{}` with {} cascade sibling(s)",
            self.layer.id(),
            child.id(),
            siblings.len()
        );
        self.sheet.push_layer(child);
        for sibling in siblings {
            self.sheet.push_layer(sibling);
        }
        Ok(())
    }

    /// Run `body` with property writes diverted into a cascade under the
    /// given condition. With no arguments there is no cascade and writes
    /// apply directly.
    pub fn cascade<F>(&mut self, args: Vec<Value>, body: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut LayerBuilder<'_>) -> Result<(), CompileError>,
    {
        self.layer.cascade_condition = condition_from(args);
        let result = body(self);
        self.layer.cascade_condition = None;
        result
    }

    /// Condition applied to direct children only; no arguments clears it
    pub fn uncascaded(&mut self, args: Vec<Value>) {
        self.layer.uncascaded = condition_from(args);
    }

    /// Set this layer's own condition; no arguments clears it
    pub fn filter(&mut self, args: Vec<Value>) {
        self.layer.filter = condition_from(args);
    }

    /// Rename the layer
    pub fn id(&mut self, name: impl Into<String>) {
        self.layer
            .props
            .insert("id".to_string(), Value::String(name.into()));
    }

    /// Keep the layer (and its bag) for derivation but don't write it out
    pub fn suppress(&mut self) {
        self.layer.write = false;
    }
}
