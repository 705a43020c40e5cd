//! Stylesheet assembler
//!
//! Owns the document properties, the source table and the ordered layer list,
//! and produces the final JSON document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, info};
use serde_json::{Map, Value as Json};

use crate::CompileError;
use crate::extension::ExtensionRegistry;
use crate::include::{FsResolver, IncludeResolver};
use crate::layer::{Layer, LayerBuilder};
use crate::value::{Value, ValueMap};

/// Source name → options, in declaration order
pub type Sources = IndexMap<String, ValueMap>;

/// Fields two layers must share for the later one to become a `ref`
pub const REF_FIELDS: &[&str] = &[
    "type",
    "source",
    "source-layer",
    "minzoom",
    "maxzoom",
    "filter",
    "layout",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Collapse layers sharing every [`REF_FIELDS`] entry into a `ref` to
    /// the first such layer
    pub dedupe_refs: bool,
}

pub struct Stylesheet {
    properties: ValueMap,
    sources: Sources,
    layers: Vec<Layer>,
    extensions: ExtensionRegistry,
    base_dir: PathBuf,
    resolver: Arc<dyn IncludeResolver>,
}

impl Default for Stylesheet {
    fn default() -> Self {
        Self {
            properties: IndexMap::new(),
            sources: IndexMap::new(),
            layers: Vec::new(),
            extensions: ExtensionRegistry::new(),
            base_dir: PathBuf::from("."),
            resolver: Arc::new(FsResolver),
        }
    }
}

impl std::fmt::Debug for Stylesheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stylesheet")
            .field("properties", &self.properties)
            .field("sources", &self.sources)
            .field("layers", &self.layers.len())
            .field("extensions", &self.extensions)
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

impl Stylesheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory `include` paths are resolved against
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn with_resolver(mut self, resolver: impl IncludeResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn resolver(&self) -> Arc<dyn IncludeResolver> {
        Arc::clone(&self.resolver)
    }

    /// Set a top-level document property (`version`, `glyphs`, ...)
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn properties(&self) -> &ValueMap {
        &self.properties
    }

    /// Declare a source. A truthy `default` option makes it the fallback for
    /// layers that don't name one.
    pub fn source(&mut self, name: impl Into<String>, options: ValueMap) {
        self.sources.insert(name.into(), options);
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.extensions
    }

    /// Register an extension macro for layer bodies
    pub fn register_extension<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut LayerBuilder<'_>, &[Value]) -> Result<(), CompileError> + Send + Sync + 'static,
    {
        self.extensions.register(name, handler);
    }

    /// Define a layer.
    ///
    /// The layer takes its place in the output before any sub-layers its body
    /// derives with `on`.
    pub fn layer<F>(&mut self, id: &str, options: ValueMap, body: F) -> Result<(), CompileError>
    where
        F: FnOnce(&mut LayerBuilder<'_>) -> Result<(), CompileError>,
    {
        let slot = self.layers.len();
        let layer = Layer::new(id, options, &self.sources);
        let mut builder = LayerBuilder::new(layer, self);
        body(&mut builder)?;
        let layer = builder.finish();
        self.layers.insert(slot, layer);
        Ok(())
    }

    pub(crate) fn push_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn compile(&self) -> Result<Json, CompileError> {
        self.compile_with(&CompileOptions::default())
    }

    pub fn compile_with(&self, options: &CompileOptions) -> Result<Json, CompileError> {
        let mut doc: Map<String, Json> = self
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();

        let sources: Map<String, Json> = self
            .sources
            .iter()
            .map(|(name, opts)| {
                let opts: Map<String, Json> = opts
                    .iter()
                    .filter(|(k, _)| k.as_str() != "default")
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                (name.clone(), Json::Object(opts))
            })
            .collect();

        let mut layers = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            if !layer.is_written() {
                debug!("layer `{}` suppressed", layer.id());
                continue;
            }
            match layer.compile()? {
                Some(compiled) => layers.push(compiled),
                None => debug!("layer `{}` dropped: no layout or paint output", layer.id()),
            }
        }

        if options.dedupe_refs {
            collapse_refs(&mut layers);
        }

        info!(
            "compiled {} layer(s) from {} source(s)",
            layers.len(),
            sources.len()
        );
        doc.insert("sources".to_string(), Json::Object(sources));
        doc.insert(
            "layers".to_string(),
            Json::Array(layers.into_iter().map(Json::Object).collect()),
        );
        Ok(Json::Object(doc))
    }
}

/// The first source marked `default`
pub(crate) fn default_source(sources: &Sources) -> Option<&str> {
    sources
        .iter()
        .find(|(_, opts)| opts.get("default").is_some_and(Value::is_truthy))
        .map(|(name, _)| name.as_str())
}

/// Replace the shared fields of later duplicate layers with a `ref` to the
/// first layer carrying them
fn collapse_refs(layers: &mut [Map<String, Json>]) {
    let mut seen: HashMap<String, String> = HashMap::new();
    for layer in layers.iter_mut() {
        let shared: Map<String, Json> = REF_FIELDS
            .iter()
            .filter_map(|field| layer.get(*field).map(|v| (field.to_string(), v.clone())))
            .collect();
        let key = Json::Object(shared).to_string();
        let Some(id) = layer.get("id").map(|id| match id {
            Json::String(s) => s.clone(),
            other => other.to_string(),
        }) else {
            continue;
        };

        match seen.get(&key) {
            Some(target) => {
                debug!("layer `{id}` refers to `{target}`");
                for field in REF_FIELDS {
                    layer.shift_remove(*field);
                }
                layer.insert("ref".to_string(), Json::String(target.clone()));
            }
            None => {
                seen.insert(key, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(pairs: &[(&str, Value)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn default_marker_is_stripped() {
        let mut sheet = Stylesheet::new();
        sheet.source(
            "osm",
            opts(&[("type", "vector".into()), ("default", true.into())]),
        );
        let doc = sheet.compile().unwrap();
        assert_eq!(doc["sources"], json!({"osm": {"type": "vector"}}));
    }

    #[test]
    fn first_default_source_wins() {
        let mut sheet = Stylesheet::new();
        sheet.source("a", opts(&[("type", "vector".into())]));
        sheet.source("b", opts(&[("default", true.into())]));
        sheet.source("c", opts(&[("default", true.into())]));
        assert_eq!(default_source(sheet.sources()), Some("b"));
    }

    #[test]
    fn document_key_order() {
        let mut sheet = Stylesheet::new();
        sheet.set_property("version", 8);
        sheet.set_property("name", "test");
        let doc = sheet.compile().unwrap();
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["version", "name", "sources", "layers"]);
    }

    #[test]
    fn parent_precedes_derived_layers() {
        let mut sheet = Stylesheet::new();
        sheet
            .layer("roads", ValueMap::new(), |l| {
                l.set("line_width", 1)?;
                l.on(vec![Value::Int(12)], |c| c.set("line_width", 2))
            })
            .unwrap();
        let ids: Vec<_> = sheet.layers().iter().map(Layer::id).collect();
        assert_eq!(ids, ["roads", "roads__1"]);
    }

    #[test]
    fn collapse_refs_points_at_first_match() {
        let mut layers = vec![
            json!({"id": "a", "type": "line", "source": "s", "paint": {"line-width": 1}}),
            json!({"id": "b", "type": "line", "source": "s", "paint": {"line-width": 2}}),
            json!({"id": "c", "type": "fill", "source": "s", "paint": {"fill-color": "red"}}),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect::<Vec<_>>();

        collapse_refs(&mut layers);
        assert_eq!(
            Json::Object(layers[1].clone()),
            json!({"id": "b", "paint": {"line-width": 2}, "ref": "a"})
        );
        assert!(!layers[2].contains_key("ref"));
    }
}
