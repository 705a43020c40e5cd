//! Extension macros
//!
//! A stylesheet can register named hooks that run against a layer body when
//! their name is used there, e.g. a `casing` macro that sets several line
//! properties at once. They take priority over every other meaning of a name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::CompileError;
use crate::layer::LayerBuilder;
use crate::value::Value;

/// Handler invoked with the layer builder and the call's arguments
pub type ExtensionFn =
    Arc<dyn Fn(&mut LayerBuilder<'_>, &[Value]) -> Result<(), CompileError> + Send + Sync + 'static>;

/// Registry of extension macros, owned by one stylesheet
#[derive(Default, Clone)]
pub struct ExtensionRegistry {
    handlers: HashMap<String, ExtensionFn>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an extension macro
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut LayerBuilder<'_>, &[Value]) -> Result<(), CompileError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<ExtensionFn> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ExtensionRegistry")
            .field("names", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_replaces_by_name() {
        let mut registry = ExtensionRegistry::new();
        assert!(registry.is_empty());

        registry.register("casing", |l, _| l.set("line_gap_width", 2));
        registry.register("casing", |l, _| l.set("line_gap_width", 3));
        registry.register("halo", |l, _| l.set("text_halo_width", 1));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("casing"));
        assert!(!registry.contains("shadow"));
        assert!(registry.get("halo").is_some());
        assert_eq!(format!("{registry:?}"), r#"ExtensionRegistry { names: ["casing", "halo"] }"#);
    }
}
